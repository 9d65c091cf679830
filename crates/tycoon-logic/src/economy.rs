//! Economy analytics and upgrade pricing.
//!
//! Read-only views over balances and the catalogue: business return on
//! investment, how wealth is spread across players, and what the next
//! upgrade of an asset costs.

use serde::{Deserialize, Serialize};

use crate::catalogue::BusinessKind;
use crate::constants::{time, upgrades};

/// Return on investment for one business kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessRoi {
    pub kind: BusinessKind,
    pub cost: i64,
    pub income_per_hour: f64,
    /// Percent of the purchase price earned back in 30 days.
    pub monthly_roi_percent: f64,
    /// Hours until the purchase has paid for itself.
    pub payback_hours: f64,
}

/// ROI of a level-1 business of `kind`.
pub fn business_roi(kind: BusinessKind) -> BusinessRoi {
    let spec = kind.spec();
    let income_per_hour = spec.income as f64 * time::HOUR as f64 / spec.cycle_secs as f64;
    let monthly = income_per_hour * 24.0 * 30.0;
    BusinessRoi {
        kind,
        cost: spec.cost,
        income_per_hour,
        monthly_roi_percent: monthly / spec.cost as f64 * 100.0,
        payback_hours: spec.cost as f64 / income_per_hour,
    }
}

/// ROI for every kind in catalogue order.
pub fn roi_table() -> Vec<BusinessRoi> {
    BusinessKind::all().iter().map(|k| business_roi(*k)).collect()
}

// ============================================================================
// WEALTH DISTRIBUTION
// ============================================================================

/// Summary statistics over player balances.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WealthDistribution {
    pub players: usize,
    pub total: i64,
    pub mean: f64,
    pub median: i64,
    /// Coins held by the richest 1% (at least one player).
    pub top_1_percent_wealth: i64,
    /// Coins held by the richest 10% (at least one player).
    pub top_10_percent_wealth: i64,
    /// Top-10% share of all coins, in percent.
    pub inequality_percent: f64,
}

/// Sum of the `n` largest balances of a descending slice.
fn top_sum(descending: &[i64], n: usize) -> i64 {
    descending.iter().take(n.max(1)).sum()
}

pub fn wealth_distribution(balances: &[i64]) -> WealthDistribution {
    if balances.is_empty() {
        return WealthDistribution::default();
    }
    let mut sorted = balances.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));

    let players = sorted.len();
    let total: i64 = sorted.iter().sum();
    let top_10 = top_sum(&sorted, players / 10);
    let median = if players % 2 == 1 {
        sorted[players / 2]
    } else {
        (sorted[players / 2 - 1] + sorted[players / 2]) / 2
    };

    WealthDistribution {
        players,
        total,
        mean: total as f64 / players as f64,
        median,
        top_1_percent_wealth: top_sum(&sorted, players / 100),
        top_10_percent_wealth: top_10,
        inequality_percent: if total > 0 {
            top_10 as f64 / total as f64 * 100.0
        } else {
            0.0
        },
    }
}

// ============================================================================
// UPGRADES
// ============================================================================

/// Cost of upgrading a business from `level`: half the base price per level.
pub fn business_upgrade_cost(kind: BusinessKind, level: u32) -> i64 {
    kind.spec().cost * i64::from(level.max(1)) / 2
}

/// Cost of upgrading a farm from `level`.
pub fn farm_upgrade_cost(level: u32) -> i64 {
    upgrades::FARM_BASE_COST * i64::from(level.max(1)) * 4 / 5
}

/// Plot slots a farm gains per upgrade.
pub fn farm_slots_after_upgrade(slots: u32) -> u32 {
    slots.saturating_add(upgrades::FARM_SLOTS_PER_LEVEL)
}
