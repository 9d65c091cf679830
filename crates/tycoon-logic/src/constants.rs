//! Game constants - modifier names, balance defaults, time units.
//!
//! These are plain constants with no storage dependency. The server's
//! `GameConfig` uses the balance values as its defaults.

/// Names used as keys in modifier window payloads.
pub mod modifier_names {
    pub const INCOME_MULTIPLIER: &str = "income_multiplier";
    pub const ENERGY_MULTIPLIER: &str = "energy_multiplier";
    pub const SPEED_BOOST: &str = "speed_boost";
    pub const EXPERIENCE_MULTIPLIER: &str = "experience_multiplier";
    pub const PVP_EXPERIENCE_MULTIPLIER: &str = "pvp_experience_multiplier";
    pub const BUSINESS_COST_MULTIPLIER: &str = "business_cost_multiplier";
    pub const PRICE_MULTIPLIER: &str = "price_multiplier";
    pub const FREE_ENERGY: &str = "free_energy";
    pub const BONUS_COINS: &str = "bonus_coins";
}

pub mod time {
    pub const MINUTE: i64 = 60;
    pub const HOUR: i64 = 3_600;
    pub const DAY: i64 = 86_400;
}

/// Starting state and energy.
pub mod player {
    pub const STARTING_COINS: i64 = 1_000;
    pub const STARTING_ENERGY: i64 = 100;
    pub const MAX_ENERGY: i64 = 100;
    /// Energy regenerated per whole minute.
    pub const ENERGY_REGEN_PER_MINUTE: i64 = 1;
    pub const STARTING_FARM_SLOTS: u32 = 4;
    pub const DAILY_BONUS: i64 = 500;
}

pub mod progression {
    /// Experience for level L is `L * EXPERIENCE_BASE_UNIT`.
    pub const EXPERIENCE_BASE_UNIT: u64 = 1_000;
    /// Coins paid on reaching level L is `L * LEVEL_REWARD_PER_LEVEL`.
    pub const LEVEL_REWARD_PER_LEVEL: i64 = 100;
}

pub mod pvp {
    pub const ATTACK_COST: i64 = 50;
    pub const ATTACK_ENERGY: i64 = 30;
    pub const COOLDOWN_SECS: i64 = 3_600;
    /// Attacker may be at most this many levels above the defender.
    pub const LEVEL_MARGIN: u32 = 5;
    pub const DEFENDER_MIN_COINS: i64 = 100;
    pub const MIN_STEAL_PERCENT: u32 = 5;
    pub const MAX_STEAL_PERCENT: u32 = 15;
    pub const WINNER_EXPERIENCE: u64 = 100;
    pub const DEFENDER_EXPERIENCE: u64 = 50;
    /// Perturbation range applied to each side's power.
    pub const LUCK_MIN: f64 = 0.8;
    pub const LUCK_MAX: f64 = 1.2;
    /// Target finder: minimum coins a target must hold.
    pub const TARGET_MIN_COINS: i64 = 1_000;
    /// Target finder: levels below the attacker still considered.
    pub const TARGET_LEVELS_BELOW: u32 = 3;
}

pub mod upgrades {
    pub const BUSINESS_ENERGY: i64 = 20;
    pub const BUSINESS_EXPERIENCE: u64 = 50;
    pub const FARM_BASE_COST: i64 = 5_000;
    pub const FARM_ENERGY: i64 = 30;
    pub const FARM_EXPERIENCE: u64 = 75;
    pub const FARM_SLOTS_PER_LEVEL: u32 = 2;
    /// Experience per slot harvested.
    pub const HARVEST_EXPERIENCE_PER_SLOT: u64 = 5;
}

pub mod accrual {
    /// Uncollected cycles after which the background sweep collects, and the
    /// most cycles any single collection pays out.
    pub const MAX_BACKLOG_CYCLES: i64 = 10;
}

pub mod abuse {
    pub const MAX_ACTIONS_PER_MINUTE: usize = 10;
    pub const RATE_WINDOW_MS: i64 = 60_000;
    pub const SUSPICION_WINDOW_MS: i64 = 300_000;
    pub const SUSPICIOUS_ACTION_THRESHOLD: usize = 50;
    pub const AUTO_BLOCK_THRESHOLD: u32 = 5;
    pub const PLAUSIBILITY_MARGIN: f64 = 3.0;
    pub const WEALTH_PER_HOUR_CEILING: f64 = 20_000.0;
    pub const WEALTH_FLOOR: i64 = 50_000;
    pub const MAX_LEDGER_ENTRIES_PER_DAY: usize = 1_000;
}
