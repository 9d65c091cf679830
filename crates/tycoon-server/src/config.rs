//! Runtime configuration.
//!
//! Every field has a default, so a JSON file only needs the keys it
//! overrides. The defaults match `data/game_config.json`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tycoon_logic::constants::{abuse, accrual, player, progression, pvp as pvp_consts};
use tycoon_logic::modifiers::CreationOdds;
use tycoon_logic::pvp::PvpRules;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse game config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read game config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid game config: {0}")]
    Invalid(String),
}

/// Seconds between runs of each scheduled task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulePeriods {
    pub accrual_secs: u64,
    pub events_secs: u64,
    pub leaderboard_secs: u64,
    pub retention_secs: u64,
    pub anomaly_secs: u64,
}

impl Default for SchedulePeriods {
    fn default() -> Self {
        Self {
            accrual_secs: 60,
            events_secs: 600,
            leaderboard_secs: 300,
            retention_secs: 3_600,
            anomaly_secs: 3_600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    // Players
    pub starting_coins: i64,
    pub starting_energy: i64,
    pub max_energy: i64,
    pub energy_regen_per_minute: i64,
    pub starting_farm_slots: u32,
    pub daily_bonus: i64,

    // Progression
    pub experience_base_unit: u64,
    pub level_reward_per_level: i64,

    // PvP
    pub pvp: PvpRules,
    pub winner_experience: u64,
    pub defender_experience: u64,
    pub target_min_coins: i64,
    pub target_levels_below: u32,

    // Accrual & events
    pub max_backlog_cycles: i64,
    pub event_odds: CreationOdds,

    // Concurrency
    pub lock_timeout_ms: u64,

    // Anti-abuse
    pub max_actions_per_minute: usize,
    pub rate_window_ms: i64,
    pub suspicion_window_ms: i64,
    pub suspicious_action_threshold: usize,
    pub auto_block_threshold: u32,
    pub plausibility_margin: f64,
    pub wealth_per_hour_ceiling: f64,
    pub wealth_floor: i64,
    pub max_ledger_entries_per_day: usize,

    // Retention & reports
    pub ledger_retention_days: i64,
    pub audit_retention_days: i64,
    pub leaderboard_size: usize,

    pub schedule: SchedulePeriods,
    /// Fixed seed for deterministic runs; entropy when absent.
    pub rng_seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            starting_coins: player::STARTING_COINS,
            starting_energy: player::STARTING_ENERGY,
            max_energy: player::MAX_ENERGY,
            energy_regen_per_minute: player::ENERGY_REGEN_PER_MINUTE,
            starting_farm_slots: player::STARTING_FARM_SLOTS,
            daily_bonus: player::DAILY_BONUS,
            experience_base_unit: progression::EXPERIENCE_BASE_UNIT,
            level_reward_per_level: progression::LEVEL_REWARD_PER_LEVEL,
            pvp: PvpRules::default(),
            winner_experience: pvp_consts::WINNER_EXPERIENCE,
            defender_experience: pvp_consts::DEFENDER_EXPERIENCE,
            target_min_coins: pvp_consts::TARGET_MIN_COINS,
            target_levels_below: pvp_consts::TARGET_LEVELS_BELOW,
            max_backlog_cycles: accrual::MAX_BACKLOG_CYCLES,
            event_odds: CreationOdds::default(),
            lock_timeout_ms: 250,
            max_actions_per_minute: abuse::MAX_ACTIONS_PER_MINUTE,
            rate_window_ms: abuse::RATE_WINDOW_MS,
            suspicion_window_ms: abuse::SUSPICION_WINDOW_MS,
            suspicious_action_threshold: abuse::SUSPICIOUS_ACTION_THRESHOLD,
            auto_block_threshold: abuse::AUTO_BLOCK_THRESHOLD,
            plausibility_margin: abuse::PLAUSIBILITY_MARGIN,
            wealth_per_hour_ceiling: abuse::WEALTH_PER_HOUR_CEILING,
            wealth_floor: abuse::WEALTH_FLOOR,
            max_ledger_entries_per_day: abuse::MAX_LEDGER_ENTRIES_PER_DAY,
            ledger_retention_days: 30,
            audit_retention_days: 7,
            leaderboard_size: 100,
            schedule: SchedulePeriods::default(),
            rng_seed: None,
        }
    }
}

impl GameConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lock_timeout_ms == 0 {
            return Err(ConfigError::Invalid("lock_timeout_ms must be positive".into()));
        }
        if self.pvp.min_steal_percent > self.pvp.max_steal_percent {
            return Err(ConfigError::Invalid(format!(
                "steal range {}..{} is empty",
                self.pvp.min_steal_percent, self.pvp.max_steal_percent
            )));
        }
        if self.max_actions_per_minute == 0 {
            return Err(ConfigError::Invalid(
                "max_actions_per_minute must be positive".into(),
            ));
        }
        if self.experience_base_unit == 0 {
            return Err(ConfigError::Invalid("experience_base_unit must be positive".into()));
        }
        Ok(())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}
