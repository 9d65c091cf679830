//! PvP combat - eligibility, power scores, randomized outcome, narrative.
//!
//! Settlement (moving coins, writing ledger entries) lives in the server;
//! this module only decides who may attack, who wins and how much moves.
//!
//! ```
//! use tycoon_logic::pvp::{power_score, PowerInput};
//!
//! let input = PowerInput { level: 3, businesses: 2, farm_levels: vec![1], coins: 500, vip: None };
//! assert_eq!(power_score(&input), 30.0 + 10.0 + 3.0);
//! ```

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::catalogue::VipTier;
use crate::constants::pvp;

/// Tunables for PvP eligibility and settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PvpRules {
    pub attack_cost: i64,
    pub attack_energy: i64,
    pub cooldown_secs: i64,
    pub level_margin: u32,
    pub defender_min_coins: i64,
    pub min_steal_percent: u32,
    pub max_steal_percent: u32,
}

impl Default for PvpRules {
    fn default() -> Self {
        Self {
            attack_cost: pvp::ATTACK_COST,
            attack_energy: pvp::ATTACK_ENERGY,
            cooldown_secs: pvp::COOLDOWN_SECS,
            level_margin: pvp::LEVEL_MARGIN,
            defender_min_coins: pvp::DEFENDER_MIN_COINS,
            min_steal_percent: pvp::MIN_STEAL_PERCENT,
            max_steal_percent: pvp::MAX_STEAL_PERCENT,
        }
    }
}

/// Everything eligibility depends on, gathered under the pair lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttackContext {
    pub attacker_id: u64,
    pub defender_id: u64,
    pub attacker_level: u32,
    pub defender_level: u32,
    pub attacker_coins: i64,
    pub attacker_energy: i64,
    pub defender_coins: i64,
    /// Seconds since this attacker last attacked this defender, if ever.
    pub since_last_attack_secs: Option<i64>,
    /// Energy requirement waived (golden hour).
    pub free_energy: bool,
}

/// Why an attack is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttackDenial {
    SelfAttack,
    InsufficientCoins { needed: i64, available: i64 },
    InsufficientEnergy { needed: i64, available: i64 },
    OnCooldown { remaining_secs: i64 },
    LevelGap { attacker: u32, defender: u32 },
    DefenderTooPoor { coins: i64 },
}

/// Check every eligibility rule, first failure wins.
pub fn check_eligibility(ctx: &AttackContext, rules: &PvpRules) -> Result<(), AttackDenial> {
    if ctx.attacker_id == ctx.defender_id {
        return Err(AttackDenial::SelfAttack);
    }
    if ctx.attacker_coins < rules.attack_cost {
        return Err(AttackDenial::InsufficientCoins {
            needed: rules.attack_cost,
            available: ctx.attacker_coins,
        });
    }
    if !ctx.free_energy && ctx.attacker_energy < rules.attack_energy {
        return Err(AttackDenial::InsufficientEnergy {
            needed: rules.attack_energy,
            available: ctx.attacker_energy,
        });
    }
    if let Some(since) = ctx.since_last_attack_secs {
        if since < rules.cooldown_secs {
            return Err(AttackDenial::OnCooldown {
                remaining_secs: rules.cooldown_secs - since.max(0),
            });
        }
    }
    if ctx.attacker_level > ctx.defender_level.saturating_add(rules.level_margin) {
        return Err(AttackDenial::LevelGap {
            attacker: ctx.attacker_level,
            defender: ctx.defender_level,
        });
    }
    if ctx.defender_coins < rules.defender_min_coins {
        return Err(AttackDenial::DefenderTooPoor {
            coins: ctx.defender_coins,
        });
    }
    Ok(())
}

// ============================================================================
// POWER
// ============================================================================

/// Inputs to a player's combat power.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerInput {
    pub level: u32,
    pub businesses: usize,
    pub farm_levels: Vec<u32>,
    pub coins: i64,
    /// Unexpired VIP tier only.
    pub vip: Option<VipTier>,
}

/// `level*10 + businesses*5 + Σ farm_level*3 + log10(coins/1000)*5`,
/// the wealth term only above 1000 coins, scaled by the VIP factor.
pub fn power_score(input: &PowerInput) -> f64 {
    let base = f64::from(input.level) * 10.0;
    let business = input.businesses as f64 * 5.0;
    let farms: f64 = input.farm_levels.iter().map(|l| f64::from(*l) * 3.0).sum();
    let wealth = if input.coins > 1_000 {
        (input.coins as f64 / 1_000.0).log10() * 5.0
    } else {
        0.0
    };
    let total = base + business + farms + wealth;
    match input.vip {
        Some(tier) => total * tier.benefits().power_factor,
        None => total,
    }
}

// ============================================================================
// OUTCOME
// ============================================================================

/// Result of the randomized fight, before settlement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BattleOutcome {
    pub attacker_wins: bool,
    /// Powers after the luck perturbation.
    pub attacker_power: f64,
    pub defender_power: f64,
    pub steal_percent: u32,
    /// Coins moving from defender to attacker; zero when the defender wins.
    pub stolen: i64,
}

/// Perturb both powers and decide the winner.
///
/// Ties go to the defender.
pub fn resolve_battle(
    attacker_power: f64,
    defender_power: f64,
    defender_coins: i64,
    rules: &PvpRules,
    rng: &mut impl Rng,
) -> BattleOutcome {
    let attacker_final = attacker_power * rng.gen_range(pvp::LUCK_MIN..=pvp::LUCK_MAX);
    let defender_final = defender_power * rng.gen_range(pvp::LUCK_MIN..=pvp::LUCK_MAX);
    let attacker_wins = attacker_final > defender_final;

    let (steal_percent, stolen) = if attacker_wins {
        let lo = rules.min_steal_percent.min(rules.max_steal_percent);
        let hi = rules.max_steal_percent.max(rules.min_steal_percent);
        let pct = rng.gen_range(lo..=hi);
        (pct, steal_amount(defender_coins, pct))
    } else {
        (0, 0)
    };

    BattleOutcome {
        attacker_wins,
        attacker_power: attacker_final,
        defender_power: defender_final,
        steal_percent,
        stolen,
    }
}

/// `floor(coins * percent / 100)`, never more than the balance.
pub fn steal_amount(defender_coins: i64, percent: u32) -> i64 {
    let coins = defender_coins.max(0);
    (coins * i64::from(percent) / 100).min(coins)
}

// ============================================================================
// NARRATIVE
// ============================================================================

/// Flavor lines for the battle log. Purely cosmetic.
pub fn narrative(
    attacker: &str,
    defender: &str,
    outcome: &BattleOutcome,
    rng: &mut impl Rng,
) -> Vec<String> {
    let pool = [
        format!("{} unleashes a powerful strike!", attacker),
        format!("{} raises their guard!", defender),
        format!("{} lands a critical hit!", attacker),
        format!("{} counterattacks!", defender),
        "The struggle drags on...".to_string(),
        "Blows are traded back and forth!".to_string(),
    ];

    let mut log = vec![format!("{} launches an attack on {}!", attacker, defender)];
    let beats = rng.gen_range(2..=3);
    for _ in 0..beats {
        if let Some(line) = pool.choose(rng) {
            log.push(line.clone());
        }
    }
    if outcome.attacker_wins {
        log.push(format!("{} wins!", attacker));
        if outcome.stolen > 0 {
            log.push(format!("{} coins stolen!", outcome.stolen));
        }
    } else {
        log.push(format!("{} holds the line!", defender));
    }
    log
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ctx() -> AttackContext {
        AttackContext {
            attacker_id: 1,
            defender_id: 2,
            attacker_level: 5,
            defender_level: 5,
            attacker_coins: 1_000,
            attacker_energy: 100,
            defender_coins: 5_000,
            since_last_attack_secs: None,
            free_energy: false,
        }
    }

    #[test]
    fn test_eligible_default() {
        assert_eq!(check_eligibility(&ctx(), &PvpRules::default()), Ok(()));
    }

    #[test]
    fn test_self_attack() {
        let mut c = ctx();
        c.defender_id = c.attacker_id;
        assert_eq!(
            check_eligibility(&c, &PvpRules::default()),
            Err(AttackDenial::SelfAttack)
        );
    }

    #[test]
    fn test_insufficient_resources() {
        let mut c = ctx();
        c.attacker_coins = 49;
        assert!(matches!(
            check_eligibility(&c, &PvpRules::default()),
            Err(AttackDenial::InsufficientCoins { .. })
        ));
        let mut c = ctx();
        c.attacker_energy = 29;
        assert!(matches!(
            check_eligibility(&c, &PvpRules::default()),
            Err(AttackDenial::InsufficientEnergy { .. })
        ));
        c.free_energy = true;
        assert_eq!(check_eligibility(&c, &PvpRules::default()), Ok(()));
    }

    #[test]
    fn test_cooldown() {
        let mut c = ctx();
        c.since_last_attack_secs = Some(600);
        assert_eq!(
            check_eligibility(&c, &PvpRules::default()),
            Err(AttackDenial::OnCooldown {
                remaining_secs: 3_000
            })
        );
        c.since_last_attack_secs = Some(3_600);
        assert_eq!(check_eligibility(&c, &PvpRules::default()), Ok(()));
    }

    #[test]
    fn test_level_gap_regardless_of_resources() {
        let mut c = ctx();
        c.attacker_level = 10;
        c.defender_level = 4;
        c.attacker_coins = 1_000_000;
        assert_eq!(
            check_eligibility(&c, &PvpRules::default()),
            Err(AttackDenial::LevelGap {
                attacker: 10,
                defender: 4
            })
        );
        c.defender_level = 5;
        assert_eq!(check_eligibility(&c, &PvpRules::default()), Ok(()));
    }

    #[test]
    fn test_defender_too_poor() {
        let mut c = ctx();
        c.defender_coins = 99;
        assert_eq!(
            check_eligibility(&c, &PvpRules::default()),
            Err(AttackDenial::DefenderTooPoor { coins: 99 })
        );
    }

    #[test]
    fn test_power_score_components() {
        let input = PowerInput {
            level: 4,
            businesses: 3,
            farm_levels: vec![2, 1],
            coins: 100_000,
            vip: None,
        };
        // 40 + 15 + 9 + log10(100)*5
        assert!((power_score(&input) - 74.0).abs() < 1e-9);
    }

    #[test]
    fn test_power_score_vip() {
        let plain = PowerInput {
            level: 10,
            businesses: 0,
            farm_levels: vec![],
            coins: 0,
            vip: None,
        };
        let vip = PowerInput {
            vip: Some(VipTier::Ultimate),
            ..plain.clone()
        };
        assert!((power_score(&vip) - power_score(&plain) * 1.3).abs() < 1e-9);
    }

    #[test]
    fn test_steal_within_bounds() {
        let rules = PvpRules::default();
        let mut rng = StdRng::seed_from_u64(11);
        let mut wins = 0;
        for _ in 0..500 {
            let outcome = resolve_battle(100.0, 100.0, 10_000, &rules, &mut rng);
            if outcome.attacker_wins {
                wins += 1;
                assert!((5..=15).contains(&outcome.steal_percent));
                assert!(outcome.stolen >= 500 && outcome.stolen <= 1_500);
            } else {
                assert_eq!(outcome.stolen, 0);
            }
        }
        assert!(wins > 100 && wins < 400, "even fight should be close, got {}", wins);
    }

    #[test]
    fn test_overwhelming_power_always_wins() {
        let rules = PvpRules::default();
        let mut rng = StdRng::seed_from_u64(12);
        for _ in 0..100 {
            let outcome = resolve_battle(1_000.0, 10.0, 1_000, &rules, &mut rng);
            assert!(outcome.attacker_wins);
        }
    }

    #[test]
    fn test_steal_amount_clamped() {
        assert_eq!(steal_amount(1_000, 15), 150);
        assert_eq!(steal_amount(7, 15), 1);
        assert_eq!(steal_amount(0, 15), 0);
        assert_eq!(steal_amount(100, 200), 100);
    }

    #[test]
    fn test_narrative_mentions_settled_amount() {
        let mut rng = StdRng::seed_from_u64(5);
        let outcome = BattleOutcome {
            attacker_wins: true,
            attacker_power: 50.0,
            defender_power: 40.0,
            steal_percent: 10,
            stolen: 420,
        };
        let log = narrative("alice", "bob", &outcome, &mut rng);
        assert!(log.len() >= 5);
        assert!(log.iter().any(|l| l.contains("420 coins")));
    }
}
