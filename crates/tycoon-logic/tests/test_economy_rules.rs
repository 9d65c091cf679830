//! Integration tests chaining the pure economy rules together.
//!
//! Exercises: accrual → modifiers → progression → pvp → abuse
//!
//! All tests are pure logic - no storage, no locks, no clock.

use rand::rngs::StdRng;
use rand::SeedableRng;

use tycoon_logic::abuse::{claim_plausible, income_claim_ceiling, SlidingWindow};
use tycoon_logic::accrual::{
    business_income, energy_regen, harvest_value, income_per_cycle, payable_cycles, planting_cost,
};
use tycoon_logic::catalogue::{BusinessKind, CropKind, VipTier};
use tycoon_logic::constants::{abuse, accrual, modifier_names, progression as prog};
use tycoon_logic::modifiers::{compose, plan_window, WindowKind};
use tycoon_logic::progression::apply_experience;
use tycoon_logic::pvp::{
    check_eligibility, power_score, resolve_battle, AttackContext, PowerInput, PvpRules,
};

// ── Helpers ────────────────────────────────────────────────────────────

fn rng() -> StdRng {
    StdRng::seed_from_u64(42)
}

// ── Accrual under modifiers ────────────────────────────────────────────

#[test]
fn test_double_income_window_doubles_collection() {
    let mut rng = rng();
    let window = plan_window(WindowKind::DoubleIncome, &mut rng);
    let effective = compose([&window.payload]);
    let multiplier = effective.factor(modifier_names::INCOME_MULTIPLIER)
        * VipTier::Premium.benefits().income_multiplier;

    let plain = business_income(BusinessKind::Shop, 1, 7_200, 1.0, accrual::MAX_BACKLOG_CYCLES);
    let boosted = business_income(
        BusinessKind::Shop,
        1,
        7_200,
        multiplier,
        accrual::MAX_BACKLOG_CYCLES,
    );
    assert_eq!(plain, 300);
    assert_eq!(boosted, 900);
}

#[test]
fn test_collection_stays_plausible_with_stacked_windows() {
    let mut rng = rng();
    let double = plan_window(WindowKind::DoubleIncome, &mut rng).payload;
    let golden = plan_window(WindowKind::GoldenHour, &mut rng).payload;
    let multiplier = compose([&double, &golden]).factor(modifier_names::INCOME_MULTIPLIER);

    let elapsed = 5 * 3_600;
    let cycles = payable_cycles(BusinessKind::Cafe, elapsed, accrual::MAX_BACKLOG_CYCLES);
    let paid = business_income(
        BusinessKind::Cafe,
        2,
        elapsed,
        multiplier,
        accrual::MAX_BACKLOG_CYCLES,
    );
    let ceiling = income_claim_ceiling(
        income_per_cycle(BusinessKind::Cafe, 2),
        cycles,
        multiplier,
        abuse::PLAUSIBILITY_MARGIN,
    );
    assert!(claim_plausible(paid, ceiling));
}

#[test]
fn test_accrual_is_monotonic_in_time() {
    let mut last = 0;
    for elapsed in (0..20 * 3_600).step_by(600) {
        let income = business_income(
            BusinessKind::Cafe,
            1,
            elapsed,
            1.0,
            accrual::MAX_BACKLOG_CYCLES,
        );
        assert!(income >= last);
        last = income;
    }
    // capped at ten cycles
    assert_eq!(last, 1_000);
}

#[test]
fn test_energy_boost_triples_regen_up_to_cap() {
    let mut rng = rng();
    let boost = plan_window(WindowKind::EnergyBoost, &mut rng).payload;
    let multiplier = compose([&boost]).factor(modifier_names::ENERGY_MULTIPLIER);
    let regen = energy_regen(10, 100, 10 * 60, 1, multiplier);
    assert_eq!(regen.added, 30);
    let capped = energy_regen(90, 100, 10 * 60, 1, multiplier);
    assert_eq!(capped.added, 10);
}

#[test]
fn test_farm_cycle_profitable_at_neutral_prices() {
    for crop in CropKind::all() {
        let cost = planting_cost(*crop, 4);
        let value = harvest_value(*crop, 4, 1.0);
        assert!(value > cost, "{:?} loses money", crop);
    }
}

// ── Progression ────────────────────────────────────────────────────────

#[test]
fn test_battle_experience_feeds_progression() {
    let mut level = 1;
    let mut experience = 0;
    let mut rewards = 0;
    for _ in 0..30 {
        let p = apply_experience(
            level,
            experience,
            100,
            prog::EXPERIENCE_BASE_UNIT,
            prog::LEVEL_REWARD_PER_LEVEL,
        );
        level = p.level;
        experience = p.experience;
        rewards += p.total_reward();
    }
    // 3000 XP: 1000 for level 2, 2000 for level 3
    assert_eq!(level, 3);
    assert_eq!(experience, 0);
    assert_eq!(rewards, 200 + 300);
}

// ── PvP ────────────────────────────────────────────────────────────────

#[test]
fn test_stronger_player_wins_majority() {
    let rules = PvpRules::default();
    let mut rng = rng();
    let strong = power_score(&PowerInput {
        level: 8,
        businesses: 4,
        farm_levels: vec![3, 2],
        coins: 500_000,
        vip: Some(VipTier::Ultimate),
    });
    let weak = power_score(&PowerInput {
        level: 5,
        businesses: 1,
        farm_levels: vec![1],
        coins: 10_000,
        vip: None,
    });
    let ctx = AttackContext {
        attacker_id: 1,
        defender_id: 2,
        attacker_level: 8,
        defender_level: 5,
        attacker_coins: 500_000,
        attacker_energy: 100,
        defender_coins: 10_000,
        since_last_attack_secs: None,
        free_energy: false,
    };
    assert!(check_eligibility(&ctx, &rules).is_ok());

    let wins = (0..200)
        .filter(|_| resolve_battle(strong, weak, 10_000, &rules, &mut rng).attacker_wins)
        .count();
    assert!(wins > 150, "strong attacker won only {} of 200", wins);
}

// ── Abuse ──────────────────────────────────────────────────────────────

#[test]
fn test_rate_window_recovers_after_a_minute() {
    let mut window = SlidingWindow::new();
    let t0 = 5_000_000;
    for i in 0..abuse::MAX_ACTIONS_PER_MINUTE as i64 {
        assert!(window.try_admit(
            t0 + i,
            abuse::RATE_WINDOW_MS,
            abuse::MAX_ACTIONS_PER_MINUTE
        ));
    }
    assert!(!window.try_admit(t0 + 100, abuse::RATE_WINDOW_MS, abuse::MAX_ACTIONS_PER_MINUTE));
    assert!(window.try_admit(
        t0 + abuse::RATE_WINDOW_MS + 10,
        abuse::RATE_WINDOW_MS,
        abuse::MAX_ACTIONS_PER_MINUTE
    ));
}
