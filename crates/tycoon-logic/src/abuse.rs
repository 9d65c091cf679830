//! Anti-abuse heuristics - sliding windows, suspicion policy, plausibility.
//!
//! The server keeps one [`SlidingWindow`] per identity for rate limiting and
//! a second one for watched actions. The functions here are the pure parts:
//! admitting a timestamp, deciding when a burst counts as suspicious, and
//! bounding what a collection could plausibly be worth.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Timestamps (milliseconds) inside a trailing window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlidingWindow {
    timestamps: VecDeque<i64>,
}

impl SlidingWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every timestamp at or before `now - window_ms`.
    pub fn prune(&mut self, now_ms: i64, window_ms: i64) {
        let cutoff = now_ms - window_ms;
        while let Some(&front) = self.timestamps.front() {
            if front <= cutoff {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Unconditionally record a timestamp.
    pub fn record(&mut self, now_ms: i64) {
        self.timestamps.push_back(now_ms);
    }

    /// Prune, then admit `now` if the window holds fewer than `ceiling`
    /// entries. A rejected attempt is not recorded.
    ///
    /// ```
    /// use tycoon_logic::abuse::SlidingWindow;
    ///
    /// let mut window = SlidingWindow::new();
    /// assert!(window.try_admit(0, 60_000, 2));
    /// assert!(window.try_admit(1_000, 60_000, 2));
    /// assert!(!window.try_admit(2_000, 60_000, 2));
    /// // the first timestamp has aged out
    /// assert!(window.try_admit(60_000, 60_000, 2));
    /// ```
    pub fn try_admit(&mut self, now_ms: i64, window_ms: i64, ceiling: usize) -> bool {
        self.prune(now_ms, window_ms);
        if self.timestamps.len() >= ceiling {
            return false;
        }
        self.record(now_ms);
        true
    }
}

// ============================================================================
// SUSPICION
// ============================================================================

/// Actions the guard sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    CollectBusiness,
    HarvestCrop,
    PlantCrop,
    PvpAttack,
    BuyBusiness,
    Upgrade,
    Other,
}

impl ActionKind {
    /// Whether bursts of this action feed the suspicion score.
    pub fn is_watched(&self) -> bool {
        matches!(
            self,
            Self::CollectBusiness | Self::HarvestCrop | Self::PvpAttack | Self::BuyBusiness
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::CollectBusiness => "collect_business",
            Self::HarvestCrop => "harvest_crop",
            Self::PlantCrop => "plant_crop",
            Self::PvpAttack => "pvp_attack",
            Self::BuyBusiness => "buy_business",
            Self::Upgrade => "upgrade",
            Self::Other => "other",
        }
    }
}

/// Outcome of raising a suspicion counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Escalation {
    /// Counter raised but still below the block threshold.
    Flagged { score: u32 },
    /// Counter reached the block threshold.
    Block { score: u32 },
}

/// Raise a suspicion score by one and decide whether it blocks.
pub fn escalate(score: u32, block_threshold: u32) -> Escalation {
    let score = score.saturating_add(1);
    if score >= block_threshold {
        Escalation::Block { score }
    } else {
        Escalation::Flagged { score }
    }
}

/// Whether a burst of watched actions is suspicious.
pub fn burst_suspicious(count_in_window: usize, threshold: usize) -> bool {
    count_in_window > threshold
}

// ============================================================================
// PLAUSIBILITY
// ============================================================================

/// Highest income claim accepted for a collection.
///
/// Uses the same cycle formula as accrual, multiplied by the active
/// multiplier and a safety margin that absorbs modifier changes between
/// when the value was shown and when it was claimed.
pub fn income_claim_ceiling(base_per_cycle: i64, cycles: i64, multiplier: f64, margin: f64) -> i64 {
    let raw = (base_per_cycle.max(0) * cycles.max(0)) as f64;
    (raw * multiplier.max(1.0) * margin.max(1.0)).floor() as i64
}

pub fn claim_plausible(claimed: i64, ceiling: i64) -> bool {
    claimed <= ceiling
}

/// Coins per hour since the account was created.
pub fn wealth_per_hour(coins: i64, account_age_secs: i64) -> Option<f64> {
    if account_age_secs <= 0 {
        return None;
    }
    Some(coins as f64 / (account_age_secs as f64 / 3_600.0))
}

/// Whether an account got rich implausibly fast.
pub fn wealth_rate_suspicious(
    coins: i64,
    account_age_secs: i64,
    ceiling_per_hour: f64,
    wealth_floor: i64,
) -> bool {
    if coins <= wealth_floor {
        return false;
    }
    wealth_per_hour(coins, account_age_secs)
        .map(|rate| rate > ceiling_per_hour)
        .unwrap_or(false)
}
