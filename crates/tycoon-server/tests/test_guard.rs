//! Rate limiting, suspicion escalation and blocking.

use std::sync::Arc;

use tycoon_logic::entitlements::Entitlement;
use tycoon_server::tables::AuditKind;
use tycoon_server::{ErrorKind, Game, GameConfig, GameError, Identity, ManualClock};

fn setup() -> (Game, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::at_unix(1_704_067_200));
    (Game::new(GameConfig::default(), clock.clone()), clock)
}

#[test]
fn test_eleventh_action_in_a_minute_rejected() {
    let (game, clock) = setup();
    let who = Identity(7);
    for _ in 0..10 {
        assert!(game.rate_limit_check(who));
        clock.advance_millis(100);
    }
    assert!(!game.rate_limit_check(who));
    // other identities are unaffected
    assert!(game.rate_limit_check(Identity(8)));

    clock.advance_secs(60);
    assert!(game.rate_limit_check(who));
}

#[test]
fn test_burst_of_watched_actions_blocks() {
    let (game, _) = setup();
    let player = game.get_or_create_player(Identity(1), "bot").unwrap();
    let farm = game.player_state(player.id).unwrap().farms[0].id;

    for _ in 0..54 {
        assert_eq!(
            game.collect_asset(farm, Identity(1)),
            Err(GameError::NothingToCollect)
        );
    }
    assert_eq!(game.guard().suspicion_score(Identity(1)), 4);
    assert!(!game.is_blocked(Identity(1)));

    let err = game.collect_asset(farm, Identity(1)).unwrap_err();
    assert_eq!(err, GameError::Blocked(Identity(1)));
    assert_eq!(err.kind(), ErrorKind::Blocked);
    assert!(game.is_blocked(Identity(1)));

    let audit = game.guard().audit_for(Identity(1));
    assert_eq!(
        audit.iter().filter(|a| a.kind == AuditKind::Flagged).count(),
        5
    );
    assert!(audit.iter().any(|a| a.kind == AuditKind::Blocked));

    let report = game.security_report();
    assert_eq!(report.blocked, 1);
    assert_eq!(report.top_suspicious[0], (Identity(1), 5));
}

#[test]
fn test_blocked_identity_refused_everywhere() {
    let (game, _) = setup();
    let player = game.get_or_create_player(Identity(1), "cheat").unwrap();
    let victim = game.get_or_create_player(Identity(2), "victim").unwrap();
    let farm = game.player_state(player.id).unwrap().farms[0].id;
    game.guard().block(Identity(1), "manual", game.now());

    let blocked = Err(GameError::Blocked(Identity(1)));
    assert_eq!(game.buy_asset(player.id, "cafe").map(|_| ()), blocked);
    assert_eq!(
        game.plant_crop(farm, Identity(1), "wheat").map(|_| ()),
        blocked
    );
    assert_eq!(game.claim_daily_bonus(player.id).map(|_| ()), blocked);
    assert_eq!(
        game.attempt_attack(player.id, victim.id).map(|_| ()),
        blocked
    );
    assert_eq!(
        game.credit_entitlement(player.id, &Entitlement::EnergyPack),
        blocked
    );
    assert_eq!(game.player(player.id).unwrap().coins, 1_000);
}

#[test]
fn test_unblock_restores_access() {
    let (game, _) = setup();
    let player = game.get_or_create_player(Identity(1), "sorry").unwrap();
    game.guard().block(Identity(1), "manual", game.now());
    assert!(game.claim_daily_bonus(player.id).is_err());

    assert!(game.unblock(Identity(1), "ops"));
    assert!(!game.unblock(Identity(1), "ops"));
    assert_eq!(game.claim_daily_bonus(player.id), Ok(500));
    assert!(game
        .guard()
        .audit_for(Identity(1))
        .iter()
        .any(|a| a.kind == AuditKind::Unblocked && a.detail.contains("ops")));
}

#[test]
fn test_implausible_claim_rejected_and_flagged() {
    let (game, clock) = setup();
    let player = game.get_or_create_player(Identity(1), "claimer").unwrap();
    game.credit_entitlement(player.id, &Entitlement::Coins { amount: 4_000 })
        .unwrap();
    let cafe = game.buy_asset(player.id, "cafe").unwrap();
    clock.advance_secs(3_600);

    let err = game.validate_income_claim(cafe.id, 10_000).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert!(!err.is_retryable());
    assert_eq!(game.guard().suspicion_score(Identity(1)), 1);
    assert!(game
        .guard()
        .audit_for(Identity(1))
        .iter()
        .any(|a| a.kind == AuditKind::ClaimRejected));

    // the real amount is still collectable
    assert_eq!(game.collect_asset(cafe.id, Identity(1)).unwrap().amount, 100);
}
