//! Catch-up accrual - turning elapsed time into resources.
//!
//! Nothing ticks per entity. Each asset stores the timestamp of its last
//! checkpoint and every read recomputes what accrued since then. Business
//! income is cycle based, energy is per whole minute, crops are a single
//! maturity deadline.
//!
//! ```
//! use tycoon_logic::accrual::business_income;
//! use tycoon_logic::catalogue::BusinessKind;
//!
//! // A level-1 cafe left alone for two hours has two cycles ready.
//! assert_eq!(business_income(BusinessKind::Cafe, 1, 7_200, 1.0, 10), 200);
//! ```

use serde::{Deserialize, Serialize};

use crate::catalogue::{BusinessKind, CropKind, VipTier};

/// Number of complete cycles in `elapsed_secs`.
pub fn cycles_elapsed(elapsed_secs: i64, cycle_secs: i64) -> i64 {
    if elapsed_secs <= 0 || cycle_secs <= 0 {
        0
    } else {
        elapsed_secs / cycle_secs
    }
}

/// Income of a single cycle before modifiers.
pub fn income_per_cycle(kind: BusinessKind, level: u32) -> i64 {
    kind.spec().income * i64::from(level.max(1))
}

/// Cycles that a collection right now would pay for.
///
/// Backlog beyond `backlog_cap` is not paid; it is dropped when the
/// checkpoint resets.
pub fn payable_cycles(kind: BusinessKind, elapsed_secs: i64, backlog_cap: i64) -> i64 {
    cycles_elapsed(elapsed_secs, kind.spec().cycle_secs).min(backlog_cap.max(0))
}

/// Collectable income for a business.
///
/// `multiplier` is the product of every active income factor (event windows
/// and the owner's VIP tier).
pub fn business_income(
    kind: BusinessKind,
    level: u32,
    elapsed_secs: i64,
    multiplier: f64,
    backlog_cap: i64,
) -> i64 {
    let cycles = payable_cycles(kind, elapsed_secs, backlog_cap);
    let raw = income_per_cycle(kind, level) * cycles;
    (raw as f64 * multiplier.max(0.0)).floor() as i64
}

/// Whether the background sweep should collect this business.
pub fn backlog_due(kind: BusinessKind, elapsed_secs: i64, backlog_cap: i64) -> bool {
    backlog_cap > 0 && cycles_elapsed(elapsed_secs, kind.spec().cycle_secs) >= backlog_cap
}

// ============================================================================
// ENERGY
// ============================================================================

/// Energy cap for a player, raised by an unexpired VIP tier.
pub fn max_energy(base: i64, vip: Option<VipTier>) -> i64 {
    base + vip.map(|t| t.benefits().energy_bonus).unwrap_or(0)
}

/// Result of an energy regeneration check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnergyRegen {
    /// Energy actually added (never pushes past the cap).
    pub added: i64,
    /// Energy after regeneration, never above the cap.
    pub energy: i64,
    /// Whether the regen checkpoint moves to now.
    pub advance_checkpoint: bool,
}

/// Compute energy regeneration since the last checkpoint.
///
/// Only whole minutes count. Energy above the cap, left over when a VIP
/// tier lapses, is clamped down to it. When nothing is addable the
/// checkpoint stays put, so partial minutes are never lost. When the player
/// is already at the cap the checkpoint still advances but nothing is
/// added.
pub fn energy_regen(
    current: i64,
    cap: i64,
    elapsed_secs: i64,
    rate_per_minute: i64,
    multiplier: f64,
) -> EnergyRegen {
    let current = current.min(cap);
    let minutes = elapsed_secs.max(0) / crate::constants::time::MINUTE;
    let addable = ((minutes * rate_per_minute.max(0)) as f64 * multiplier.max(0.0)).floor() as i64;
    if addable <= 0 {
        return EnergyRegen {
            added: 0,
            energy: current,
            advance_checkpoint: false,
        };
    }
    let added = addable.min((cap - current).max(0));
    EnergyRegen {
        added,
        energy: current + added,
        advance_checkpoint: true,
    }
}

// ============================================================================
// CROPS
// ============================================================================

/// Grow time after speed boosts.
pub fn crop_grow_secs(crop: CropKind, speed: f64) -> i64 {
    let speed = if speed > 0.0 { speed } else { 1.0 };
    (crop.spec().grow_secs as f64 / speed).floor() as i64
}

/// Whether a crop planted `elapsed_secs` ago has matured.
pub fn crop_ready(crop: CropKind, elapsed_secs: i64, speed: f64) -> bool {
    elapsed_secs >= crop_grow_secs(crop, speed)
}

/// Seconds until maturity, zero when ready.
pub fn crop_remaining_secs(crop: CropKind, elapsed_secs: i64, speed: f64) -> i64 {
    (crop_grow_secs(crop, speed) - elapsed_secs).max(0)
}

/// Coins from selling a full harvest.
pub fn harvest_value(crop: CropKind, slots: u32, price_multiplier: f64) -> i64 {
    let raw = crop.spec().sell_price * i64::from(slots);
    (raw as f64 * price_multiplier.max(0.0)).floor() as i64
}

/// Cost of planting every slot of a plot.
pub fn planting_cost(crop: CropKind, slots: u32) -> i64 {
    crop.spec().cost * i64::from(slots)
}
