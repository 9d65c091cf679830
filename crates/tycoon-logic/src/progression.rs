//! Experience and level progression.
//!
//! Level `L` requires `L * base_unit` experience. Adding experience loops
//! while the pool covers the current requirement, paying a coin reward for
//! every level gained. Because the requirement grows with level the loop
//! runs once per level gained and always terminates.
//!
//! ```
//! use tycoon_logic::progression::apply_experience;
//!
//! let p = apply_experience(1, 0, 5_000, 1_000, 100);
//! assert_eq!(p.level, 3);
//! assert_eq!(p.experience, 2_000);
//! assert_eq!(p.level_ups.len(), 2);
//! ```

use serde::{Deserialize, Serialize};

/// Experience needed to advance out of `level`.
pub fn required_experience(level: u32, base_unit: u64) -> u64 {
    u64::from(level.max(1)) * base_unit
}

/// A single level gained and its coin reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelUp {
    /// The level reached.
    pub level: u32,
    pub reward: i64,
}

/// State after applying experience.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progression {
    pub level: u32,
    pub experience: u64,
    pub level_ups: Vec<LevelUp>,
}

impl Progression {
    pub fn leveled_up(&self) -> bool {
        !self.level_ups.is_empty()
    }

    /// Sum of coin rewards across every level gained.
    pub fn total_reward(&self) -> i64 {
        self.level_ups.iter().map(|l| l.reward).sum()
    }
}

/// Add `gain` experience and cascade level-ups.
pub fn apply_experience(
    level: u32,
    experience: u64,
    gain: u64,
    base_unit: u64,
    reward_per_level: i64,
) -> Progression {
    let mut level = level.max(1);
    let mut experience = experience.saturating_add(gain);
    let mut level_ups = Vec::new();

    if base_unit == 0 {
        return Progression {
            level,
            experience,
            level_ups,
        };
    }

    loop {
        let needed = required_experience(level, base_unit);
        if experience < needed {
            break;
        }
        experience -= needed;
        level += 1;
        level_ups.push(LevelUp {
            level,
            reward: i64::from(level) * reward_per_level,
        });
    }

    Progression {
        level,
        experience,
        level_ups,
    }
}

/// Scale an experience gain by the active multiplier.
pub fn scaled_experience(base: u64, multiplier: f64) -> u64 {
    (base as f64 * multiplier.max(0.0)).floor() as u64
}
