//! Modifier windows - time-bounded global multipliers and flags.
//!
//! A window carries a payload of named values. Any number of windows may be
//! running at once; their factors compose multiplicatively by name and their
//! flags union. Running state is always derived from the window's bounds and
//! its `active` flag, never cached.
//!
//! # Window catalogue
//!
//! | Kind | Payload | Duration |
//! |------|---------|----------|
//! | `DoubleIncome` | `income_multiplier` ×2 | 2–6 h |
//! | `EnergyBoost` | `energy_multiplier` ×3 | 4 h |
//! | `BusinessDiscount` | `business_cost_multiplier` 0.5–0.8 | 8 h |
//! | `FlatBonus` | `bonus_coins` 500–2000 paid once | 1 h |
//! | `PvpTournament` | `pvp_experience_multiplier` ×2 | 24 h |
//! | `MarketShift` | `price_multiplier` ×1.5 or ×0.7 | 6 h |
//! | `GoldenHour` | income ×3, experience ×2, `free_energy` | 1 h |
//!
//! ```
//! use std::collections::BTreeMap;
//! use tycoon_logic::modifiers::{compose, ModifierValue};
//!
//! let mut a = BTreeMap::new();
//! a.insert("income_multiplier".to_string(), ModifierValue::Factor(2.0));
//! let mut b = BTreeMap::new();
//! b.insert("income_multiplier".to_string(), ModifierValue::Factor(1.5));
//! let effective = compose([&a, &b]);
//! assert_eq!(effective.factor("income_multiplier"), 3.0);
//! assert_eq!(effective.factor("energy_multiplier"), 1.0);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::{modifier_names, time};

/// Kinds of global modifier windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum WindowKind {
    DoubleIncome = 0,
    EnergyBoost = 1,
    BusinessDiscount = 2,
    FlatBonus = 3,
    PvpTournament = 4,
    MarketShift = 5,
    GoldenHour = 6,
}

impl WindowKind {
    pub const ALL: [WindowKind; 7] = [
        WindowKind::DoubleIncome,
        WindowKind::EnergyBoost,
        WindowKind::BusinessDiscount,
        WindowKind::FlatBonus,
        WindowKind::PvpTournament,
        WindowKind::MarketShift,
        WindowKind::GoldenHour,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::DoubleIncome => "double_income",
            Self::EnergyBoost => "energy_boost",
            Self::BusinessDiscount => "business_discount",
            Self::FlatBonus => "flat_bonus",
            Self::PvpTournament => "pvp_tournament",
            Self::MarketShift => "market_shift",
            Self::GoldenHour => "golden_hour",
        }
    }
}

/// One entry of a window payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ModifierValue {
    /// Multiplies every other factor with the same name.
    Factor(f64),
    /// Present/absent switch.
    Flag,
    /// Window-local quantity; never composed across windows.
    Amount(i64),
}

pub type Payload = BTreeMap<String, ModifierValue>;

/// A freshly generated window, before it is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowPlan {
    pub kind: WindowKind,
    pub duration_secs: i64,
    pub payload: Payload,
}

/// Generate the duration and payload for a window kind.
pub fn plan_window(kind: WindowKind, rng: &mut impl Rng) -> WindowPlan {
    let mut payload = Payload::new();
    let duration_secs = match kind {
        WindowKind::DoubleIncome => {
            payload.insert(
                modifier_names::INCOME_MULTIPLIER.into(),
                ModifierValue::Factor(2.0),
            );
            rng.gen_range(2..=6) * time::HOUR
        }
        WindowKind::EnergyBoost => {
            payload.insert(
                modifier_names::ENERGY_MULTIPLIER.into(),
                ModifierValue::Factor(3.0),
            );
            4 * time::HOUR
        }
        WindowKind::BusinessDiscount => {
            let discount: i64 = rng.gen_range(20..=50);
            payload.insert(
                modifier_names::BUSINESS_COST_MULTIPLIER.into(),
                ModifierValue::Factor(1.0 - discount as f64 / 100.0),
            );
            8 * time::HOUR
        }
        WindowKind::FlatBonus => {
            payload.insert(
                modifier_names::BONUS_COINS.into(),
                ModifierValue::Amount(rng.gen_range(500..=2_000)),
            );
            time::HOUR
        }
        WindowKind::PvpTournament => {
            payload.insert(
                modifier_names::PVP_EXPERIENCE_MULTIPLIER.into(),
                ModifierValue::Factor(2.0),
            );
            24 * time::HOUR
        }
        WindowKind::MarketShift => {
            let factor = if rng.gen_bool(0.5) { 1.5 } else { 0.7 };
            payload.insert(
                modifier_names::PRICE_MULTIPLIER.into(),
                ModifierValue::Factor(factor),
            );
            6 * time::HOUR
        }
        WindowKind::GoldenHour => {
            payload.insert(
                modifier_names::INCOME_MULTIPLIER.into(),
                ModifierValue::Factor(3.0),
            );
            payload.insert(
                modifier_names::EXPERIENCE_MULTIPLIER.into(),
                ModifierValue::Factor(2.0),
            );
            payload.insert(modifier_names::FREE_ENERGY.into(), ModifierValue::Flag);
            time::HOUR
        }
    };
    WindowPlan {
        kind,
        duration_secs,
        payload,
    }
}

/// Uniformly pick a window kind from the catalogue.
pub fn pick_kind(rng: &mut impl Rng) -> WindowKind {
    WindowKind::ALL[rng.gen_range(0..WindowKind::ALL.len())]
}

// ============================================================================
// LIFECYCLE
// ============================================================================

/// Lifecycle phase of a window at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowPhase {
    Scheduled,
    Active,
    Expired,
}

/// Phase of a window from its bounds. Times are any monotone unit
/// (the server passes unix seconds).
pub fn window_phase(start: i64, end: i64, active: bool, now: i64) -> WindowPhase {
    if !active || now > end {
        WindowPhase::Expired
    } else if now < start {
        WindowPhase::Scheduled
    } else {
        WindowPhase::Active
    }
}

/// Whether a window contributes to the effective modifier set now.
pub fn window_running(start: i64, end: i64, active: bool, now: i64) -> bool {
    window_phase(start, end, active, now) == WindowPhase::Active
}

// ============================================================================
// COMPOSITION
// ============================================================================

/// The effective modifier set derived from every running window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectiveModifiers {
    pub factors: BTreeMap<String, f64>,
    pub flags: BTreeSet<String>,
}

impl EffectiveModifiers {
    /// Composed factor for `name`; 1.0 when no window sets it.
    pub fn factor(&self, name: &str) -> f64 {
        self.factors.get(name).copied().unwrap_or(1.0)
    }

    pub fn has_flag(&self, name: &str) -> bool {
        self.flags.contains(name)
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty() && self.flags.is_empty()
    }
}

/// Compose payloads of running windows.
pub fn compose<'a>(payloads: impl IntoIterator<Item = &'a Payload>) -> EffectiveModifiers {
    let mut effective = EffectiveModifiers::default();
    for payload in payloads {
        for (name, value) in payload {
            match value {
                ModifierValue::Factor(f) => {
                    *effective.factors.entry(name.clone()).or_insert(1.0) *= f;
                }
                ModifierValue::Flag => {
                    effective.flags.insert(name.clone());
                }
                ModifierValue::Amount(_) => {}
            }
        }
    }
    effective
}

// ============================================================================
// CREATION GATE
// ============================================================================

/// Calendar position used by the creation gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarSlot {
    pub weekend: bool,
    pub hour: u32,
    pub minute: u32,
}

/// Per-tick chances of opening a new window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CreationOdds {
    pub base: f64,
    pub weekend: f64,
    pub peak_hour: f64,
    pub peak_hours: Vec<u32>,
    /// Peak bonus applies only in the first N minutes of a peak hour.
    pub peak_minutes: u32,
}

impl Default for CreationOdds {
    fn default() -> Self {
        Self {
            base: 0.3,
            weekend: 0.7,
            peak_hour: 0.5,
            peak_hours: vec![12, 18, 21],
            peak_minutes: 10,
        }
    }
}

/// Chance of creating a window this tick. The highest applicable chance wins.
pub fn creation_chance(slot: CalendarSlot, odds: &CreationOdds) -> f64 {
    let mut chance = odds.base;
    if slot.weekend {
        chance = chance.max(odds.weekend);
    }
    if odds.peak_hours.contains(&slot.hour) && slot.minute < odds.peak_minutes {
        chance = chance.max(odds.peak_hour);
    }
    chance.clamp(0.0, 1.0)
}

/// Roll the creation gate. Never opens while another window is running.
pub fn roll_creation(
    any_running: bool,
    slot: CalendarSlot,
    odds: &CreationOdds,
    rng: &mut impl Rng,
) -> bool {
    if any_running {
        return false;
    }
    rng.gen_bool(creation_chance(slot, odds))
}
