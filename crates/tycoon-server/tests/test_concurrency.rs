//! Invariants under real threads: no negative balances, no lost updates,
//! no deadlock between opposing attacks, flat bonus paid once.

use std::sync::Arc;
use std::thread;

use chrono::Duration;
use tycoon_logic::entitlements::Entitlement;
use tycoon_logic::modifiers::WindowKind;
use tycoon_server::{Game, GameConfig, GameError, Identity, ManualClock, PlayerId};

fn shared_game() -> (Arc<Game>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::at_unix(1_704_067_200));
    let config = GameConfig {
        rng_seed: Some(5),
        // bursts here are legitimate test traffic
        suspicious_action_threshold: 100_000,
        lock_timeout_ms: 2_000,
        ..GameConfig::default()
    };
    (Arc::new(Game::new(config, clock.clone())), clock)
}

fn reconcile(game: &Game, ids: &[PlayerId]) {
    for id in ids {
        let p = game.player(*id).unwrap();
        assert!(p.coins >= 0, "player {} went negative", id);
        assert_eq!(
            p.coins,
            game.config().starting_coins + game.ledger().net_for(*id),
            "player {} does not reconcile",
            id
        );
    }
}

#[test]
fn test_racing_purchases_never_overdraw() {
    let (game, _) = shared_game();
    let player = game.get_or_create_player(Identity(1), "spender").unwrap();
    // 1000 + 20000 + 2000 bonus = 23000: room for four cafes
    game.credit_entitlement(player.id, &Entitlement::Coins { amount: 20_000 })
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let game = Arc::clone(&game);
            let id = player.id;
            thread::spawn(move || game.buy_asset(id, "cafe").is_ok())
        })
        .collect();
    let bought = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(bought, 4);
    let state = game.player_state(player.id).unwrap();
    assert_eq!(state.businesses.len(), 4);
    assert_eq!(state.player.coins, 3_000);
    reconcile(&game, &[player.id]);
}

#[test]
fn test_racing_collects_pay_once() {
    let (game, clock) = shared_game();
    let player = game.get_or_create_player(Identity(1), "owner").unwrap();
    game.credit_entitlement(player.id, &Entitlement::Coins { amount: 4_000 })
        .unwrap();
    let cafe = game.buy_asset(player.id, "cafe").unwrap().id;
    clock.advance_secs(5 * 3_600);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let game = Arc::clone(&game);
            thread::spawn(move || game.collect_asset(cafe, Identity(1)))
        })
        .collect();
    let results: Vec<Result<_, GameError>> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();

    let paid: i64 = results
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .map(|c| c.amount)
        .sum();
    assert_eq!(paid, 500);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(GameError::NothingToCollect)))
            .count(),
        7
    );
    reconcile(&game, &[player.id]);
}

#[test]
fn test_opposing_attacks_do_not_deadlock() {
    let (game, _) = shared_game();
    let ids: Vec<PlayerId> = (1..=6)
        .map(|i| {
            game.get_or_create_player(Identity(i), &format!("p{}", i))
                .unwrap()
                .id
        })
        .collect();
    let starting_total: i64 = ids.len() as i64 * game.config().starting_coins;

    let handles: Vec<_> = ids
        .iter()
        .map(|attacker| {
            let game = Arc::clone(&game);
            let attacker = *attacker;
            let targets = ids.clone();
            thread::spawn(move || {
                let mut fees = 0;
                for defender in targets.into_iter().rev() {
                    match game.attempt_attack(attacker, defender) {
                        Ok(_) => fees += 50,
                        Err(err) => assert!(
                            matches!(
                                err,
                                GameError::SelfAttack
                                    | GameError::InsufficientEnergy { .. }
                                    | GameError::Conflict(_)
                            ),
                            "unexpected {:?}",
                            err
                        ),
                    }
                }
                fees
            })
        })
        .collect();
    let fees: i64 = handles.into_iter().map(|h| h.join().unwrap()).sum();

    assert!(fees > 0);
    reconcile(&game, &ids);
    let total: i64 = ids.iter().map(|id| game.player(*id).unwrap().coins).sum();
    // transfers cancel; only fees and defender level rewards change the total
    let rewards: i64 = game
        .ledger()
        .all()
        .iter()
        .filter(|e| e.reason.ends_with("reward"))
        .map(|e| e.amount)
        .sum();
    assert_eq!(total, starting_total - fees + rewards);

    for battle in ids.iter().flat_map(|id| game.battle_history(*id, 100)) {
        let linked = game.ledger().battle_entries(battle.id);
        assert_eq!(linked.iter().map(|e| e.amount).sum::<i64>(), 0);
    }
}

#[test]
fn test_flat_bonus_paid_once_under_contention() {
    let (game, clock) = shared_game();
    let ids: Vec<PlayerId> = (1..=5)
        .map(|i| game.get_or_create_player(Identity(i), "p").unwrap().id)
        .collect();
    let start = game.now() + Duration::minutes(5);
    let window = game.schedule_window(WindowKind::FlatBonus, start, 3_600).id;
    assert!(game.distribute_flat_bonus(window).is_err());
    clock.advance_secs(5 * 60);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let game = Arc::clone(&game);
            thread::spawn(move || game.distribute_flat_bonus(window).unwrap())
        })
        .collect();
    let paid: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(paid, ids.len());

    let coins: Vec<i64> = ids.iter().map(|id| game.player(*id).unwrap().coins).collect();
    assert!(coins.iter().all(|c| *c == coins[0] && *c > 1_000));
    reconcile(&game, &ids);
}
