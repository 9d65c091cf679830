//! PvP eligibility, settlement and history.

use std::sync::Arc;

use tycoon_logic::entitlements::Entitlement;
use tycoon_server::{EntryKind, Game, GameConfig, GameError, Identity, ManualClock, PlayerId};

fn setup() -> (Game, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::at_unix(1_704_067_200));
    let config = GameConfig {
        rng_seed: Some(9),
        ..GameConfig::default()
    };
    (Game::new(config, clock.clone()), clock)
}

/// A player at `level` (reached through granted experience) holding at
/// least `extra` purchased coins.
fn player_at(game: &Game, identity: u64, level: u32, extra: i64) -> PlayerId {
    let id = game
        .get_or_create_player(Identity(identity), &format!("p{}", identity))
        .unwrap()
        .id;
    let xp: u64 = (1..u64::from(level)).map(|l| l * 1_000).sum();
    if xp > 0 {
        game.grant_experience(id, xp).unwrap();
    }
    if extra > 0 {
        game.credit_entitlement(id, &Entitlement::Coins { amount: extra })
            .unwrap();
    }
    assert_eq!(game.player(id).unwrap().level, level);
    id
}

#[test]
fn test_strong_attacker_wins_and_coins_are_conserved() {
    let (game, _) = setup();
    let attacker = player_at(&game, 1, 6, 0);
    let defender = player_at(&game, 2, 1, 10_000);
    let a_before = game.player(attacker).unwrap();
    let d_before = game.player(defender).unwrap();

    let battle = game.attempt_attack(attacker, defender).unwrap();
    assert!(battle.attacker_won());
    assert_eq!(battle.winner, attacker);
    assert!(battle.amount_stolen >= d_before.coins * 5 / 100);
    assert!(battle.amount_stolen <= d_before.coins * 15 / 100);
    assert!(!battle.log.is_empty());

    let linked = game.ledger().battle_entries(battle.id);
    assert_eq!(linked.len(), 2);
    assert_eq!(linked.iter().map(|e| e.amount).sum::<i64>(), 0);
    assert!(linked
        .iter()
        .any(|e| e.kind == EntryKind::PvpWin && e.player == attacker));
    assert!(linked
        .iter()
        .any(|e| e.kind == EntryKind::PvpLoss && e.player == defender));

    let a = game.player(attacker).unwrap();
    let d = game.player(defender).unwrap();
    assert_eq!(a.coins, a_before.coins - 50 + battle.amount_stolen);
    assert_eq!(d.coins, d_before.coins - battle.amount_stolen);
    assert_eq!(a.energy, 70);
    assert_eq!((a.pvp_wins, a.pvp_losses), (1, 0));
    assert_eq!((d.pvp_wins, d.pvp_losses), (0, 1));
    assert_eq!(a.experience, a_before.experience + 100);
    assert_eq!(game.battle(battle.id), Some(battle));
}

#[test]
fn test_defender_win_still_costs_the_fee() {
    let (game, _) = setup();
    let attacker = player_at(&game, 1, 1, 0);
    let defender = player_at(&game, 2, 6, 0);
    let d_before = game.player(defender).unwrap();

    let battle = game.attempt_attack(attacker, defender).unwrap();
    assert!(!battle.attacker_won());
    assert_eq!(battle.amount_stolen, 0);
    assert!(game.ledger().battle_entries(battle.id).is_empty());

    let a = game.player(attacker).unwrap();
    let d = game.player(defender).unwrap();
    assert_eq!(a.coins, 950);
    assert_eq!(a.energy, 70);
    assert_eq!(d.coins, d_before.coins);
    assert_eq!((a.pvp_wins, a.pvp_losses), (0, 1));
    assert_eq!((d.pvp_wins, d.pvp_losses), (1, 0));
    assert_eq!(d.experience, d_before.experience + 50);
}

#[test]
fn test_level_gap_refused() {
    let (game, _) = setup();
    let attacker = player_at(&game, 1, 10, 0);
    let defender = player_at(&game, 2, 4, 0);
    let before = game.player(attacker).unwrap();

    assert_eq!(
        game.attempt_attack(attacker, defender),
        Err(GameError::LevelGap {
            attacker: 10,
            defender: 4
        })
    );
    // refused attacks charge nothing
    let after = game.player(attacker).unwrap();
    assert_eq!(after.coins, before.coins);
    assert_eq!(after.energy, before.energy);
}

#[test]
fn test_cooldown_per_pair() {
    let (game, clock) = setup();
    let attacker = player_at(&game, 1, 1, 0);
    let first = player_at(&game, 2, 1, 0);
    let second = player_at(&game, 3, 1, 0);

    game.attempt_attack(attacker, first).unwrap();
    assert_eq!(
        game.attempt_attack(attacker, first),
        Err(GameError::OnCooldown {
            remaining_secs: 3_600
        })
    );
    // the cooldown is directional and per target
    assert!(game.attempt_attack(attacker, second).is_ok());
    assert!(game.attempt_attack(first, attacker).is_ok());

    clock.advance_secs(3_600);
    assert!(game.attempt_attack(attacker, first).is_ok());
}

#[test]
fn test_attack_needs_energy() {
    let (game, _) = setup();
    let attacker = player_at(&game, 1, 1, 0);
    let targets: Vec<PlayerId> = (2..=5).map(|i| player_at(&game, i, 1, 0)).collect();

    for target in &targets[..3] {
        game.attempt_attack(attacker, *target).unwrap();
    }
    assert_eq!(
        game.attempt_attack(attacker, targets[3]),
        Err(GameError::InsufficientEnergy {
            needed: 30,
            available: 10
        })
    );
}

#[test]
fn test_poor_defender_refused() {
    let clock = Arc::new(ManualClock::at_unix(1_704_067_200));
    let config = GameConfig {
        starting_coins: 90,
        ..GameConfig::default()
    };
    let game = Game::new(config, clock);
    let attacker = player_at(&game, 1, 1, 0);
    let defender = player_at(&game, 2, 1, 0);

    assert_eq!(
        game.attempt_attack(attacker, defender),
        Err(GameError::DefenderTooPoor { coins: 90 })
    );
    game.credit_entitlement(defender, &Entitlement::Coins { amount: 10 })
        .unwrap();
    assert!(game.attempt_attack(attacker, defender).is_ok());
}

#[test]
fn test_self_attack_and_missing_players() {
    let (game, _) = setup();
    let attacker = player_at(&game, 1, 1, 0);
    assert_eq!(
        game.attempt_attack(attacker, attacker),
        Err(GameError::SelfAttack)
    );
    assert_eq!(
        game.attempt_attack(attacker, PlayerId(404)).map_err(|e| e.kind()),
        Err(tycoon_server::ErrorKind::NotFound)
    );
}

#[test]
fn test_history_targets_and_rankings() {
    let (game, clock) = setup();
    let strong = player_at(&game, 1, 4, 0);
    let weak = player_at(&game, 2, 1, 10_000);
    let other = player_at(&game, 3, 2, 0);

    let targets = game.pvp_targets(strong, 10).unwrap();
    let ids: Vec<PlayerId> = targets.iter().map(|t| t.player).collect();
    assert_eq!(ids, vec![weak, other]);

    let first = game.attempt_attack(strong, weak).unwrap();
    clock.advance_secs(60);
    let second = game.attempt_attack(strong, other).unwrap();

    let history = game.battle_history(strong, 10);
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, second.id);
    assert_eq!(history[1].id, first.id);
    assert_eq!(game.battle_history(weak, 10).len(), 1);

    // both now on cooldown
    assert!(game.pvp_targets(strong, 10).unwrap().is_empty());

    let rankings = game.pvp_rankings(10);
    assert_eq!(rankings[0].player, strong);
    assert_eq!(rankings[0].wins, 2);
    assert_eq!(rankings[0].win_rate, 100.0);
}
