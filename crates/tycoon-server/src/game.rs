//! The `Game` handle: shared state plus the transaction discipline every
//! reducer and scheduled task goes through.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard, RwLock};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tycoon_logic::abuse::ActionKind;
use tycoon_logic::accrual::{energy_regen, max_energy};
use tycoon_logic::constants::modifier_names;
use tycoon_logic::modifiers::{compose, EffectiveModifiers};
use tycoon_logic::progression::{apply_experience, Progression};

use crate::clock::{Clock, SystemClock};
use crate::config::GameConfig;
use crate::error::GameError;
use crate::guard::{AbuseGuard, GuardLimits};
use crate::ledger::Ledger;
use crate::simulation::leaderboard::Leaderboard;
use crate::store::{PlayerStore, Txn};
use crate::tables::{
    BattleId, BattleRecord, EntryKind, Identity, LedgerEntry, ModifierWindow, PlayerId,
    PlayerState, WindowId,
};

/// Cooldown key: (attacker, defender).
pub type PairKey = (PlayerId, PlayerId);

pub struct Game {
    pub(crate) config: GameConfig,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) store: PlayerStore,
    pub(crate) ledger: Ledger,
    pub(crate) guard: AbuseGuard,
    pub(crate) windows: RwLock<Vec<ModifierWindow>>,
    pub(crate) battles: Mutex<Vec<BattleRecord>>,
    pub(crate) cooldowns: Mutex<HashMap<PairKey, DateTime<Utc>>>,
    pub(crate) leaderboard: RwLock<Leaderboard>,
    rng: Mutex<StdRng>,
    next_window: AtomicU64,
    next_battle: AtomicU64,
}

/// Persisted pieces a `Game` is rebuilt from.
pub(crate) struct Parts {
    pub store: PlayerStore,
    pub ledger: Ledger,
    pub guard: AbuseGuard,
    pub windows: Vec<ModifierWindow>,
    pub battles: Vec<BattleRecord>,
    pub cooldowns: HashMap<PairKey, DateTime<Utc>>,
}

impl Game {
    pub fn new(config: GameConfig, clock: Arc<dyn Clock>) -> Self {
        let parts = Parts {
            store: PlayerStore::new(config.lock_timeout()),
            ledger: Ledger::new(),
            guard: AbuseGuard::new(GuardLimits::from(&config)),
            windows: Vec::new(),
            battles: Vec::new(),
            cooldowns: HashMap::new(),
        };
        Self::from_parts(config, clock, parts)
    }

    pub fn with_system_clock(config: GameConfig) -> Self {
        Self::new(config, Arc::new(SystemClock))
    }

    pub(crate) fn from_parts(config: GameConfig, clock: Arc<dyn Clock>, parts: Parts) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let next_window = parts.windows.iter().map(|w| w.id.0).max().unwrap_or(0) + 1;
        let next_battle = parts.battles.iter().map(|b| b.id.0).max().unwrap_or(0) + 1;
        Self {
            config,
            clock,
            store: parts.store,
            ledger: parts.ledger,
            guard: parts.guard,
            windows: RwLock::new(parts.windows),
            battles: Mutex::new(parts.battles),
            cooldowns: Mutex::new(parts.cooldowns),
            leaderboard: RwLock::new(Leaderboard::default()),
            rng: Mutex::new(rng),
            next_window: AtomicU64::new(next_window),
            next_battle: AtomicU64::new(next_battle),
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn guard(&self) -> &AbuseGuard {
        &self.guard
    }

    pub fn player_count(&self) -> usize {
        self.store.len()
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.store.player_ids()
    }

    pub fn player(&self, id: PlayerId) -> Result<crate::tables::Player, GameError> {
        self.player_state(id).map(|s| s.player)
    }

    /// A consistent copy of the player and its assets.
    pub fn player_state(&self, id: PlayerId) -> Result<PlayerState, GameError> {
        let handle = self.store.handle(id)?;
        let guard = self.store.lock(&handle, id)?;
        Ok(guard.clone())
    }

    pub fn player_by_identity(&self, identity: Identity) -> Option<PlayerId> {
        self.store.lookup_identity(identity)
    }

    pub fn battle(&self, id: BattleId) -> Option<BattleRecord> {
        self.battles.lock().iter().find(|b| b.id == id).cloned()
    }

    pub fn windows(&self) -> Vec<ModifierWindow> {
        self.windows.read().clone()
    }

    pub(crate) fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        f(&mut self.rng.lock())
    }

    pub(crate) fn next_window_id(&self) -> WindowId {
        WindowId(self.next_window.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn next_battle_id(&self) -> BattleId {
        BattleId(self.next_battle.fetch_add(1, Ordering::Relaxed))
    }

    // ------------------------------------------------------------------------
    // Modifiers
    // ------------------------------------------------------------------------

    /// The effective modifier set, derived from stored windows on every call.
    pub fn modifiers_at(&self, now: DateTime<Utc>) -> EffectiveModifiers {
        let windows = self.windows.read();
        compose(
            windows
                .iter()
                .filter(|w| w.is_running(now))
                .map(|w| &w.payload),
        )
    }

    // ------------------------------------------------------------------------
    // Guard gate
    // ------------------------------------------------------------------------

    /// Refuse blocked identities and feed the action to the suspicion window.
    pub(crate) fn gate(&self, identity: Identity, action: ActionKind) -> Result<(), GameError> {
        if self.guard.is_blocked(identity) {
            return Err(GameError::Blocked(identity));
        }
        self.guard.record_action(identity, action, self.now());
        if self.guard.is_blocked(identity) {
            return Err(GameError::Blocked(identity));
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------------

    /// Run `f` against a copy of one player's state under its lock. On `Ok`
    /// the ledger entries and the new state are written before the lock is
    /// released; on `Err` nothing is written.
    pub(crate) fn transact<T>(
        &self,
        player: PlayerId,
        f: impl FnOnce(&mut Txn) -> Result<T, GameError>,
    ) -> Result<T, GameError> {
        let handle = self.store.handle(player)?;
        let mut guard = self.store.lock(&handle, player)?;
        let mut txn = Txn::begin(&guard, self.now());
        let out = f(&mut txn)?;
        self.commit(&mut guard, txn);
        Ok(out)
    }

    pub(crate) fn commit(
        &self,
        guard: &mut MutexGuard<'_, PlayerState>,
        txn: Txn,
    ) -> Vec<LedgerEntry> {
        let now = txn.now;
        let (state, entries) = txn.into_parts();
        let written = self.ledger.append(entries, now);
        **guard = state;
        written
    }

    /// Apply pending energy regeneration inside a transaction.
    pub(crate) fn regen_energy(&self, txn: &mut Txn, mods: &EffectiveModifiers) -> i64 {
        let now = txn.now;
        let player = &mut txn.state.player;
        let cap = max_energy(self.config.max_energy, player.active_vip(now));
        let elapsed = (now - player.last_energy_update).num_seconds();
        let regen = energy_regen(
            player.energy,
            cap,
            elapsed,
            self.config.energy_regen_per_minute,
            mods.factor(modifier_names::ENERGY_MULTIPLIER),
        );
        player.energy = regen.energy;
        if regen.advance_checkpoint {
            player.last_energy_update = now;
        }
        regen.added
    }

    /// Add experience inside a transaction, paying every level-up reward.
    pub(crate) fn add_experience(
        &self,
        txn: &mut Txn,
        gain: u64,
    ) -> Result<Progression, GameError> {
        let player = &txn.state.player;
        let progression = apply_experience(
            player.level,
            player.experience,
            gain,
            self.config.experience_base_unit,
            self.config.level_reward_per_level,
        );
        txn.state.player.level = progression.level;
        txn.state.player.experience = progression.experience;
        for level_up in &progression.level_ups {
            txn.credit(
                level_up.reward,
                EntryKind::Income,
                format!("Level {} reward", level_up.level),
            )?;
        }
        if progression.leveled_up() {
            log::info!(
                "Player {} reached level {}",
                txn.player_id(),
                progression.level
            );
        }
        Ok(progression)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::thread;
    use std::time::Duration;

    fn game() -> (Arc<Game>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_unix(1_704_067_200));
        let config = GameConfig {
            rng_seed: Some(1),
            lock_timeout_ms: 30,
            ..GameConfig::default()
        };
        (Arc::new(Game::new(config, clock.clone())), clock)
    }

    #[test]
    fn test_failed_transaction_writes_nothing() {
        let (game, _) = game();
        let player = game.get_or_create_player(Identity(1), "alice").unwrap();
        let result: Result<(), GameError> = game.transact(player.id, |txn| {
            txn.credit(500, EntryKind::Income, "phantom")?;
            txn.debit(10_000, EntryKind::Expense, "too much")
        });
        assert!(matches!(result, Err(GameError::InsufficientFunds { .. })));
        assert_eq!(game.player(player.id).unwrap().coins, 1_000);
        assert!(game.ledger().entries_for(player.id).is_empty());
    }

    #[test]
    fn test_held_lock_surfaces_conflict() {
        let (game, _) = game();
        let player = game.get_or_create_player(Identity(1), "alice").unwrap();
        let handle = game.store.handle(player.id).unwrap();
        let held = game.store.lock(&handle, player.id).unwrap();

        let contender = Arc::clone(&game);
        let id = player.id;
        let result = thread::spawn(move || contender.grant_experience(id, 10))
            .join()
            .unwrap();
        drop(held);

        let err = result.unwrap_err();
        assert_eq!(err, GameError::Conflict(player.id));
        assert!(err.is_retryable());
        // and succeeds once released
        thread::sleep(Duration::from_millis(5));
        assert!(game.grant_experience(player.id, 10).is_ok());
    }

    #[test]
    fn test_regen_uses_energy_multiplier() {
        let (game, clock) = game();
        let player = game.get_or_create_player(Identity(1), "alice").unwrap();
        game.transact(player.id, |txn| {
            txn.state.player.energy = 10;
            Ok(())
        })
        .unwrap();
        clock.advance_secs(600);
        let mods = game.modifiers_at(game.now());
        let added = game
            .transact(player.id, |txn| Ok(game.regen_energy(txn, &mods)))
            .unwrap();
        assert_eq!(added, 10);
        assert_eq!(game.player(player.id).unwrap().energy, 20);
    }

    #[test]
    fn test_level_rewards_written_in_same_commit() {
        let (game, _) = game();
        let player = game.get_or_create_player(Identity(1), "alice").unwrap();
        let progression = game
            .transact(player.id, |txn| game.add_experience(txn, 5_000))
            .unwrap();
        assert_eq!(progression.level, 3);
        let rewards: Vec<i64> = game
            .ledger()
            .entries_for(player.id)
            .iter()
            .map(|e| e.amount)
            .collect();
        assert_eq!(rewards, vec![200, 300]);
        assert_eq!(game.player(player.id).unwrap().coins, 1_500);
    }
}
