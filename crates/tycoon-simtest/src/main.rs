//! Tycoon Headless Simulation Harness
//!
//! Drives the economy core on a manual clock and checks its invariants.
//! Runs entirely in-process: no front-end, no networking, no wall-clock
//! waiting.
//!
//! Usage:
//!   cargo run -p tycoon-simtest
//!   cargo run -p tycoon-simtest -- --verbose

use std::sync::Arc;
use std::time::Duration as StdDuration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tycoon_logic::catalogue::{BusinessKind, CropKind, VipTier};
use tycoon_logic::economy;
use tycoon_server::scheduler::run_once;
use tycoon_server::{
    Game, GameConfig, GameError, Identity, ManualClock, PlayerId, Scheduler, TaskKind,
    WorldSnapshot,
};

// ── Game config (same JSON the server ships with) ───────────────────────
const CONFIG_JSON: &str = include_str!("../../../data/game_config.json");

const START_UNIX: i64 = 1_704_067_200;
const PLAYERS: u64 = 24;
const STEP_SECS: i64 = 600;
const HOURS: i64 = 72;

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn main() {
    let verbose = std::env::args().any(|a| a == "--verbose");
    let filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    println!("=== Tycoon Simulation Harness ===\n");

    let mut results = Vec::new();

    // 1. Config file
    let config = match GameConfig::from_json(CONFIG_JSON) {
        Ok(c) => c,
        Err(e) => {
            println!("  ✗ config_parse: {}", e);
            std::process::exit(1);
        }
    };
    results.extend(validate_config(&config, verbose));

    // 2. Catalogue economics
    results.extend(validate_catalogue(verbose));

    // 3. Multi-day economy run
    let (game, clock, ids) = run_world(&config, verbose);
    results.extend(validate_world(&game, &ids, verbose));

    // 4. PvP settlement
    results.extend(validate_pvp(&game, &clock, &ids, verbose));

    // 5. Anti-abuse guard
    results.extend(validate_guard(&config, verbose));

    // 6. Snapshot round trip
    results.extend(validate_snapshot(&game, &clock, &ids, verbose));

    // 7. Scheduled tasks
    results.extend(validate_scheduler(game, verbose));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

/// Every player's balance is non-negative and equals starting coins plus
/// the net of its ledger entries. Returns the offenders.
fn unreconciled(game: &Game, ids: &[PlayerId]) -> Vec<PlayerId> {
    let starting = game.config().starting_coins;
    ids.iter()
        .copied()
        .filter(|id| match game.player(*id) {
            Ok(p) => p.coins < 0 || p.coins != starting + game.ledger().net_for(*id),
            Err(_) => true,
        })
        .collect()
}

// ── 1. Config ───────────────────────────────────────────────────────────

fn validate_config(config: &GameConfig, verbose: bool) -> Vec<TestResult> {
    println!("--- Config ---");
    let mut results = Vec::new();

    results.push(TestResult {
        name: "config_valid".into(),
        passed: config.validate().is_ok(),
        detail: match config.validate() {
            Ok(()) => "bundled config passes validation".into(),
            Err(e) => e.to_string(),
        },
    });

    // The bundled file and the compiled defaults must agree
    let defaults = GameConfig::default();
    let same = config.starting_coins == defaults.starting_coins
        && config.max_energy == defaults.max_energy
        && config.max_backlog_cycles == defaults.max_backlog_cycles
        && config.pvp == defaults.pvp
        && config.max_actions_per_minute == defaults.max_actions_per_minute
        && config.auto_block_threshold == defaults.auto_block_threshold;
    results.push(TestResult {
        name: "config_matches_defaults".into(),
        passed: same,
        detail: format!(
            "starting_coins={} max_energy={} backlog={} rate={}/min",
            config.starting_coins,
            config.max_energy,
            config.max_backlog_cycles,
            config.max_actions_per_minute
        ),
    });

    let keys = serde_json::from_str::<serde_json::Value>(CONFIG_JSON)
        .ok()
        .and_then(|v| v.as_object().map(|o| o.len()))
        .unwrap_or(0);
    results.push(TestResult {
        name: "config_has_keys".into(),
        passed: keys > 10,
        detail: format!("{} top-level keys", keys),
    });

    if verbose {
        println!("  lock timeout: {:?}", config.lock_timeout());
    }
    results
}

// ── 2. Catalogue ────────────────────────────────────────────────────────

fn validate_catalogue(verbose: bool) -> Vec<TestResult> {
    println!("--- Catalogue ---");
    let mut results = Vec::new();

    let table = economy::roi_table();
    if verbose {
        for roi in &table {
            println!(
                "  {:8} cost={:>7} {:>8.1}/h payback {:>6.1}h roi {:>6.1}%/month",
                roi.kind.spec().name,
                roi.cost,
                roi.income_per_hour,
                roi.payback_hours,
                roi.monthly_roi_percent
            );
        }
    }

    results.push(TestResult {
        name: "catalogue_roi_positive".into(),
        passed: table
            .iter()
            .all(|r| r.income_per_hour > 0.0 && r.payback_hours > 0.0),
        detail: format!("{} business kinds", table.len()),
    });

    let ascending = table.windows(2).all(|w| w[0].cost < w[1].cost);
    results.push(TestResult {
        name: "catalogue_costs_ascending".into(),
        passed: ascending,
        detail: "each business tier costs more than the last".into(),
    });

    let names_resolve = BusinessKind::all()
        .iter()
        .all(|k| BusinessKind::from_name(k.spec().name) == Some(*k))
        && CropKind::all()
            .iter()
            .all(|c| CropKind::from_name(c.spec().name) == Some(*c))
        && VipTier::all()
            .iter()
            .all(|t| VipTier::from_name(t.benefits().name) == Some(*t));
    results.push(TestResult {
        name: "catalogue_names_resolve".into(),
        passed: names_resolve,
        detail: "every kind is reachable by its catalogue name".into(),
    });

    let unknown_rejected = BusinessKind::from_name("casino").is_none()
        && CropKind::from_name("mandrake").is_none();
    results.push(TestResult {
        name: "catalogue_rejects_unknown".into(),
        passed: unknown_rejected,
        detail: "unknown names resolve to nothing".into(),
    });

    results
}

// ── 3. Economy run ──────────────────────────────────────────────────────

/// Simulate `HOURS` of play for `PLAYERS` players in `STEP_SECS` steps,
/// running the accrual and event systems every step.
fn run_world(config: &GameConfig, verbose: bool) -> (Arc<Game>, Arc<ManualClock>, Vec<PlayerId>) {
    println!("--- Economy Run ---");
    let clock = Arc::new(ManualClock::at_unix(START_UNIX));
    let config = GameConfig {
        rng_seed: Some(2024),
        ..config.clone()
    };
    let game = Arc::new(Game::new(config, clock.clone()));
    let mut rng = StdRng::seed_from_u64(7);

    let ids: Vec<PlayerId> = (1..=PLAYERS)
        .filter_map(|i| {
            game.get_or_create_player(Identity(i), &format!("player{}", i))
                .ok()
                .map(|p| p.id)
        })
        .collect();

    let mut failures = 0usize;
    let mut actions = 0usize;
    let steps = HOURS * 3_600 / STEP_SECS;
    for step in 0..steps {
        for (i, id) in ids.iter().enumerate() {
            let identity = Identity(i as u64 + 1);
            actions += 1;
            let outcome = match rng.gen_range(0..8) {
                0 => game.buy_asset(*id, "cafe").map(|_| ()),
                1 => game.claim_daily_bonus(*id).map(|_| ()),
                2 => collect_everything(&game, *id, identity),
                3 => plant_everything(&game, *id, identity, &mut rng),
                4 => upgrade_first_business(&game, *id, identity),
                _ => Ok(()),
            };
            if let Err(err) = outcome {
                log::debug!("step {} player {}: {}", step, id, err);
                failures += 1;
            }
        }
        game.run_accrual_tick();
        game.event_tick();
        clock.advance_secs(STEP_SECS);
    }

    if verbose {
        println!(
            "  {} steps, {} actions, {} refused, {} ledger entries, {} windows",
            steps,
            actions,
            failures,
            game.ledger().len(),
            game.windows().len()
        );
    }
    (game, clock, ids)
}

fn collect_everything(game: &Game, id: PlayerId, identity: Identity) -> Result<(), GameError> {
    let state = game.player_state(id)?;
    let assets = state
        .businesses
        .iter()
        .map(|b| b.id)
        .chain(state.farms.iter().map(|f| f.id));
    for asset in assets {
        match game.collect_asset(asset, identity) {
            Ok(_) | Err(GameError::NothingToCollect) | Err(GameError::CropNotReady { .. }) => {}
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

fn plant_everything(
    game: &Game,
    id: PlayerId,
    identity: Identity,
    rng: &mut StdRng,
) -> Result<(), GameError> {
    let state = game.player_state(id)?;
    let crops = CropKind::all();
    for farm in state.farms.iter().filter(|f| f.crop.is_none()) {
        let crop = crops[rng.gen_range(0..crops.len())];
        game.plant_crop(farm.id, identity, crop.spec().name)?;
    }
    Ok(())
}

fn upgrade_first_business(game: &Game, id: PlayerId, identity: Identity) -> Result<(), GameError> {
    match game.player_state(id)?.businesses.first() {
        Some(business) => game.upgrade_business(business.id, identity).map(|_| ()),
        None => Ok(()),
    }
}

fn validate_world(game: &Game, ids: &[PlayerId], verbose: bool) -> Vec<TestResult> {
    let mut results = Vec::new();

    let bad = unreconciled(game, ids);
    results.push(TestResult {
        name: "world_balances_reconcile".into(),
        passed: bad.is_empty(),
        detail: if bad.is_empty() {
            format!("{} players match starting coins + ledger net", ids.len())
        } else {
            format!("{} players off: {:?}", bad.len(), bad)
        },
    });

    let totals_match = ids.iter().all(|id| {
        let Ok(p) = game.player(*id) else {
            return false;
        };
        let entries = game.ledger().entries_for(*id);
        let earned: i64 = entries.iter().filter(|e| e.amount > 0).map(|e| e.amount).sum();
        let spent: i64 = entries.iter().filter(|e| e.amount < 0).map(|e| -e.amount).sum();
        p.total_earned == earned && p.total_spent == spent
    });
    results.push(TestResult {
        name: "world_totals_match_ledger".into(),
        passed: totals_match,
        detail: "total_earned / total_spent agree with the ledger".into(),
    });

    let max_energy = game.config().max_energy;
    let energy_ok = ids.iter().all(|id| {
        game.player(*id)
            .map(|p| (0..=max_energy).contains(&p.energy))
            .unwrap_or(false)
    });
    results.push(TestResult {
        name: "world_energy_in_range".into(),
        passed: energy_ok,
        detail: format!("every player has 0..={} energy", max_energy),
    });

    // Windows opened by the event system never overlap
    let mut windows = game.windows();
    windows.sort_by_key(|w| w.start_time);
    let overlapping = windows
        .windows(2)
        .filter(|pair| pair[1].start_time < pair[0].end_time)
        .count();
    results.push(TestResult {
        name: "world_windows_disjoint".into(),
        passed: overlapping == 0,
        detail: format!("{} windows, {} overlaps", windows.len(), overlapping),
    });

    let flat_unpaid = windows
        .iter()
        .filter(|w| w.kind == tycoon_logic::modifiers::WindowKind::FlatBonus)
        .filter(|w| w.distributed_at.is_none())
        .count();
    results.push(TestResult {
        name: "world_flat_bonus_paid".into(),
        passed: flat_unpaid == 0,
        detail: format!("{} flat bonus windows left unpaid", flat_unpaid),
    });

    let dist = game.wealth_distribution();
    if verbose {
        println!(
            "  wealth: total={} mean={:.0} median={} top10%={:.1}%",
            dist.total, dist.mean, dist.median, dist.inequality_percent
        );
    }
    let held: i64 = ids
        .iter()
        .filter_map(|id| game.player(*id).ok())
        .map(|p| p.coins)
        .sum();
    results.push(TestResult {
        name: "world_wealth_consistent".into(),
        passed: dist.players == ids.len() && dist.total == held,
        detail: format!("{} coins across {} players", dist.total, dist.players),
    });

    results
}

// ── 4. PvP ──────────────────────────────────────────────────────────────

fn validate_pvp(
    game: &Game,
    clock: &ManualClock,
    ids: &[PlayerId],
    verbose: bool,
) -> Vec<TestResult> {
    println!("--- PvP ---");
    let mut results = Vec::new();
    let rules = game.config().pvp.clone();

    let mut fought = 0usize;
    let mut steal_out_of_range = 0usize;
    let mut refused = 0usize;
    for round in 0..6 {
        for (i, attacker) in ids.iter().enumerate() {
            let defender = ids[(i + round + 1) % ids.len()];
            let before = game.player(defender).map(|p| p.coins).unwrap_or(0);
            match game.attempt_attack(*attacker, defender) {
                Ok(battle) => {
                    fought += 1;
                    if battle.attacker_won() {
                        let low = before * i64::from(rules.min_steal_percent) / 100;
                        let high = before * i64::from(rules.max_steal_percent) / 100;
                        if battle.amount_stolen < low || battle.amount_stolen > high {
                            steal_out_of_range += 1;
                        }
                    }
                }
                Err(err) => {
                    log::debug!("attack {} -> {} refused: {}", attacker, defender, err);
                    refused += 1;
                }
            }
        }
        clock.advance_secs(rules.cooldown_secs);
    }
    if verbose {
        println!("  {} battles fought, {} refused", fought, refused);
    }

    results.push(TestResult {
        name: "pvp_battles_fought".into(),
        passed: fought > 0,
        detail: format!("{} battles, {} refused", fought, refused),
    });

    let unbalanced = ids
        .iter()
        .flat_map(|id| game.battle_history(*id, usize::MAX))
        .filter(|b| {
            let entries = game.ledger().battle_entries(b.id);
            entries.iter().map(|e| e.amount).sum::<i64>() != 0
                || entries.len() != if b.attacker_won() { 2 } else { 0 }
        })
        .count();
    results.push(TestResult {
        name: "pvp_transfers_conserved".into(),
        passed: unbalanced == 0,
        detail: format!("{} battles with unbalanced transfers", unbalanced),
    });

    results.push(TestResult {
        name: "pvp_steal_in_range".into(),
        passed: steal_out_of_range == 0,
        detail: format!(
            "stolen amounts within {}-{}% of defender coins",
            rules.min_steal_percent, rules.max_steal_percent
        ),
    });

    let bad = unreconciled(game, ids);
    results.push(TestResult {
        name: "pvp_balances_reconcile".into(),
        passed: bad.is_empty(),
        detail: format!("{} players off after battles", bad.len()),
    });

    let rankings = game.pvp_rankings(5);
    results.push(TestResult {
        name: "pvp_rankings_sorted".into(),
        passed: rankings.windows(2).all(|w| w[0].wins >= w[1].wins),
        detail: format!("{} ranked players", rankings.len()),
    });

    results
}

// ── 5. Guard ────────────────────────────────────────────────────────────

fn validate_guard(config: &GameConfig, verbose: bool) -> Vec<TestResult> {
    println!("--- Anti-Abuse ---");
    let mut results = Vec::new();
    let clock = Arc::new(ManualClock::at_unix(START_UNIX));
    let game = Game::new(config.clone(), clock.clone());

    let who = Identity(900);
    let allowed = (0..config.max_actions_per_minute * 2)
        .filter(|_| game.rate_limit_check(who))
        .count();
    results.push(TestResult {
        name: "guard_rate_limit".into(),
        passed: allowed == config.max_actions_per_minute,
        detail: format!(
            "{} of {} burst actions allowed",
            allowed,
            config.max_actions_per_minute * 2
        ),
    });

    let bot = match game.get_or_create_player(Identity(901), "bot") {
        Ok(p) => p,
        Err(e) => {
            results.push(TestResult {
                name: "guard_player".into(),
                passed: false,
                detail: e.to_string(),
            });
            return results;
        }
    };
    let farm = game
        .player_state(bot.id)
        .ok()
        .and_then(|s| s.farms.first().map(|f| f.id));
    let mut attempts = 0;
    if let Some(farm) = farm {
        while !game.is_blocked(bot.identity) && attempts < 1_000 {
            let _ = game.collect_asset(farm, bot.identity);
            clock.advance_millis(100);
            attempts += 1;
        }
    }
    if verbose {
        println!("  bot blocked after {} watched actions", attempts);
    }
    results.push(TestResult {
        name: "guard_burst_blocks".into(),
        passed: game.is_blocked(bot.identity),
        detail: format!("blocked after {} watched actions", attempts),
    });

    let refused = matches!(
        game.claim_daily_bonus(bot.id),
        Err(GameError::Blocked(_))
    );
    results.push(TestResult {
        name: "guard_blocked_refused".into(),
        passed: refused,
        detail: "blocked identity refused by every reducer".into(),
    });

    let report = game.security_report();
    let bot_on_top = report
        .top_suspicious
        .first()
        .is_some_and(|(identity, _)| *identity == bot.identity);
    results.push(TestResult {
        name: "guard_report".into(),
        passed: report.blocked == 1 && bot_on_top,
        detail: format!(
            "{} blocked, {} suspicious",
            report.blocked,
            report.top_suspicious.len()
        ),
    });

    let released = game.unblock(bot.identity, "simtest") && game.claim_daily_bonus(bot.id).is_ok();
    results.push(TestResult {
        name: "guard_unblock".into(),
        passed: released && game.security_report().blocked == 0,
        detail: "unblocked identity can act again".into(),
    });

    results
}

// ── 6. Snapshot ─────────────────────────────────────────────────────────

fn validate_snapshot(
    game: &Game,
    clock: &Arc<ManualClock>,
    ids: &[PlayerId],
    verbose: bool,
) -> Vec<TestResult> {
    println!("--- Snapshot ---");
    let mut results = Vec::new();

    let encoded = game
        .snapshot()
        .map_err(|e| e.to_string())
        .and_then(|snapshot| snapshot.to_json().map_err(|e| e.to_string()));
    let json = match encoded {
        Ok(j) => j,
        Err(e) => {
            results.push(TestResult {
                name: "snapshot_encode".into(),
                passed: false,
                detail: e,
            });
            return results;
        }
    };
    if verbose {
        println!("  snapshot is {} bytes", json.len());
    }

    let restored = match WorldSnapshot::from_json(&json) {
        Ok(s) => Game::restore(s, game.config().clone(), clock.clone()),
        Err(e) => {
            results.push(TestResult {
                name: "snapshot_decode".into(),
                passed: false,
                detail: e.to_string(),
            });
            return results;
        }
    };

    let same_players = ids
        .iter()
        .all(|id| match (game.player_state(*id), restored.player_state(*id)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        });
    results.push(TestResult {
        name: "snapshot_players_restored".into(),
        passed: same_players && restored.player_count() == game.player_count(),
        detail: format!("{} players", restored.player_count()),
    });

    results.push(TestResult {
        name: "snapshot_ledger_restored".into(),
        passed: restored.ledger().all() == game.ledger().all(),
        detail: format!("{} ledger entries", restored.ledger().len()),
    });

    results.push(TestResult {
        name: "snapshot_reconciles".into(),
        passed: unreconciled(&restored, ids).is_empty(),
        detail: "restored balances still match the ledger".into(),
    });

    // New ids must not collide with restored ones
    let fresh = restored
        .get_or_create_player(Identity(10_000), "newcomer")
        .map(|p| !ids.contains(&p.id))
        .unwrap_or(false);
    results.push(TestResult {
        name: "snapshot_fresh_ids".into(),
        passed: fresh,
        detail: "ids allocated after restore are unused".into(),
    });

    results
}

// ── 7. Scheduler ────────────────────────────────────────────────────────

fn validate_scheduler(game: Arc<Game>, verbose: bool) -> Vec<TestResult> {
    println!("--- Scheduler ---");
    let mut results = Vec::new();

    for task in TaskKind::ALL {
        let summary = run_once(&game, task);
        if verbose {
            println!("  {}: {}", task.name(), summary);
        }
        results.push(TestResult {
            name: format!("scheduler_run_{}", task.name()),
            passed: !summary.is_empty(),
            detail: summary,
        });
    }

    let board = game.leaderboard();
    results.push(TestResult {
        name: "scheduler_leaderboard_refreshed".into(),
        passed: board.refreshed_at.is_some() && !board.by_coins.is_empty(),
        detail: format!("{} rows by coins", board.by_coins.len()),
    });

    let periods: Vec<(TaskKind, StdDuration)> = TaskKind::ALL
        .iter()
        .map(|t| (*t, StdDuration::from_millis(20)))
        .collect();
    let outcome = Scheduler::start_with(game, &periods).and_then(|mut scheduler| {
        let workers = scheduler.worker_count();
        std::thread::sleep(StdDuration::from_millis(100));
        scheduler.shutdown().map(|()| workers)
    });
    results.push(TestResult {
        name: "scheduler_threads_stop".into(),
        passed: matches!(outcome, Ok(n) if n == TaskKind::ALL.len()),
        detail: match outcome {
            Ok(n) => format!("{} workers started and joined", n),
            Err(e) => e.to_string(),
        },
    });

    results
}
