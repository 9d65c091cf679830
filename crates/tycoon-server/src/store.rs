//! Player store: per-player locks, lookup indexes and transactions.
//!
//! Each player's state sits behind its own mutex. Writers acquire it with a
//! timeout and surface [`GameError::Conflict`] instead of waiting forever.
//! Work happens on a [`Txn`], a private copy of the state plus the ledger
//! entries it wants to write; the caller commits both under the lock or
//! drops both on error.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::error::GameError;
use crate::ledger::NewEntry;
use crate::tables::{AssetId, BattleId, EntryKind, Identity, PlayerId, PlayerState};

pub type SharedState = Arc<Mutex<PlayerState>>;

#[derive(Debug)]
pub struct PlayerStore {
    players: RwLock<HashMap<PlayerId, SharedState>>,
    by_identity: RwLock<HashMap<Identity, PlayerId>>,
    asset_owner: RwLock<HashMap<AssetId, PlayerId>>,
    next_player: AtomicU64,
    next_asset: AtomicU64,
    lock_timeout: Duration,
}

impl PlayerStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self::from_states(Vec::new(), lock_timeout)
    }

    /// Rebuild the store and its indexes from persisted states.
    pub fn from_states(states: Vec<PlayerState>, lock_timeout: Duration) -> Self {
        let mut players = HashMap::new();
        let mut by_identity = HashMap::new();
        let mut asset_owner = HashMap::new();
        let mut max_player = 0;
        let mut max_asset = 0;
        for state in states {
            let id = state.player.id;
            max_player = max_player.max(id.0);
            for asset in state.asset_ids() {
                max_asset = max_asset.max(asset.0);
                asset_owner.insert(asset, id);
            }
            by_identity.insert(state.player.identity, id);
            players.insert(id, Arc::new(Mutex::new(state)));
        }
        Self {
            players: RwLock::new(players),
            by_identity: RwLock::new(by_identity),
            asset_owner: RwLock::new(asset_owner),
            next_player: AtomicU64::new(max_player + 1),
            next_asset: AtomicU64::new(max_asset + 1),
            lock_timeout,
        }
    }

    pub fn len(&self) -> usize {
        self.players.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.read().is_empty()
    }

    pub fn next_asset_id(&self) -> AssetId {
        AssetId(self.next_asset.fetch_add(1, Ordering::Relaxed))
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        let mut ids: Vec<PlayerId> = self.players.read().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn handle(&self, id: PlayerId) -> Result<SharedState, GameError> {
        self.players
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| GameError::not_found("player", id.0))
    }

    pub fn lookup_identity(&self, identity: Identity) -> Option<PlayerId> {
        self.by_identity.read().get(&identity).copied()
    }

    pub fn owner_of(&self, asset: AssetId) -> Result<PlayerId, GameError> {
        self.asset_owner
            .read()
            .get(&asset)
            .copied()
            .ok_or_else(|| GameError::not_found("asset", asset.0))
    }

    pub fn index_asset(&self, asset: AssetId, owner: PlayerId) {
        self.asset_owner.write().insert(asset, owner);
    }

    /// Lock a player's state, giving up after the configured timeout. A
    /// handle whose player was removed while we waited yields `NotFound`.
    pub fn lock<'a>(
        &self,
        handle: &'a SharedState,
        id: PlayerId,
    ) -> Result<MutexGuard<'a, PlayerState>, GameError> {
        let guard = handle.try_lock_for(self.lock_timeout).ok_or_else(|| {
            log::debug!("Lock timeout on player {}", id);
            GameError::Conflict(id)
        })?;
        let live = self
            .players
            .read()
            .get(&id)
            .is_some_and(|current| Arc::ptr_eq(current, handle));
        if !live {
            return Err(GameError::not_found("player", id.0));
        }
        Ok(guard)
    }

    /// Insert a new player unless the identity already exists. Returns the
    /// id of whichever player owns the identity afterwards.
    pub fn insert_if_absent(
        &self,
        identity: Identity,
        build: impl FnOnce(PlayerId) -> PlayerState,
    ) -> (PlayerId, bool) {
        let mut by_identity = self.by_identity.write();
        if let Some(existing) = by_identity.get(&identity) {
            return (*existing, false);
        }
        let id = PlayerId(self.next_player.fetch_add(1, Ordering::Relaxed));
        let state = build(id);
        {
            let mut owners = self.asset_owner.write();
            for asset in state.asset_ids() {
                owners.insert(asset, id);
            }
        }
        self.players.write().insert(id, Arc::new(Mutex::new(state)));
        by_identity.insert(identity, id);
        (id, true)
    }

    /// Drop a player and its indexes. The caller holds the player's lock.
    pub fn remove(&self, state: &PlayerState) {
        let id = state.player.id;
        self.players.write().remove(&id);
        self.by_identity.write().remove(&state.player.identity);
        let mut owners = self.asset_owner.write();
        for asset in state.asset_ids() {
            owners.remove(&asset);
        }
    }

    /// Every player handle, in ascending id order.
    pub fn handles(&self) -> Vec<(PlayerId, SharedState)> {
        let mut handles: Vec<(PlayerId, SharedState)> = self
            .players
            .read()
            .iter()
            .map(|(id, h)| (*id, Arc::clone(h)))
            .collect();
        handles.sort_by_key(|(id, _)| *id);
        handles
    }

    /// Clone every player state for read-side reports, skipping players
    /// whose lock times out.
    pub fn snapshot_states(&self) -> Vec<PlayerState> {
        self.handles()
            .iter()
            .filter_map(|(id, handle)| self.lock(handle, *id).ok().map(|g| PlayerState::clone(&g)))
            .collect()
    }
}

// ============================================================================
// TRANSACTIONS
// ============================================================================

/// Working copy of one player's state plus pending ledger entries.
#[derive(Debug, Clone)]
pub struct Txn {
    pub state: PlayerState,
    pub now: DateTime<Utc>,
    entries: Vec<NewEntry>,
}

impl Txn {
    pub fn begin(state: &PlayerState, now: DateTime<Utc>) -> Self {
        Self {
            state: state.clone(),
            now,
            entries: Vec::new(),
        }
    }

    pub fn player_id(&self) -> PlayerId {
        self.state.player.id
    }

    pub fn identity(&self) -> Identity {
        self.state.player.identity
    }

    pub fn pending(&self) -> &[NewEntry] {
        &self.entries
    }

    /// Add coins and queue the matching entry. Zero amounts are skipped; a
    /// balance that would overflow fails with `InvalidState`.
    pub fn credit(
        &mut self,
        amount: i64,
        kind: EntryKind,
        reason: impl Into<String>,
    ) -> Result<(), GameError> {
        self.credit_linked(amount, kind, reason, None)
    }

    pub fn credit_linked(
        &mut self,
        amount: i64,
        kind: EntryKind,
        reason: impl Into<String>,
        battle: Option<BattleId>,
    ) -> Result<(), GameError> {
        if amount <= 0 {
            return Ok(());
        }
        let player = &mut self.state.player;
        let (Some(coins), Some(earned)) = (
            player.coins.checked_add(amount),
            player.total_earned.checked_add(amount),
        ) else {
            return Err(GameError::InvalidState(format!(
                "crediting {} coins overflows player {}",
                amount, player.id
            )));
        };
        player.coins = coins;
        player.total_earned = earned;
        self.entries.push(NewEntry {
            player: player.id,
            amount,
            kind,
            reason: reason.into(),
            battle,
        });
        Ok(())
    }

    /// Remove coins, failing without side effects when the balance is short.
    pub fn debit(
        &mut self,
        amount: i64,
        kind: EntryKind,
        reason: impl Into<String>,
    ) -> Result<(), GameError> {
        self.debit_linked(amount, kind, reason, None)
    }

    pub fn debit_linked(
        &mut self,
        amount: i64,
        kind: EntryKind,
        reason: impl Into<String>,
        battle: Option<BattleId>,
    ) -> Result<(), GameError> {
        if amount <= 0 {
            return Ok(());
        }
        let player = &mut self.state.player;
        if player.coins < amount {
            return Err(GameError::InsufficientFunds {
                needed: amount,
                available: player.coins,
            });
        }
        player.coins -= amount;
        player.total_spent += amount;
        self.entries.push(NewEntry {
            player: player.id,
            amount: -amount,
            kind,
            reason: reason.into(),
            battle,
        });
        Ok(())
    }

    pub fn spend_energy(&mut self, amount: i64) -> Result<(), GameError> {
        let player = &mut self.state.player;
        if player.energy < amount {
            return Err(GameError::InsufficientEnergy {
                needed: amount,
                available: player.energy,
            });
        }
        player.energy -= amount;
        Ok(())
    }

    pub fn into_parts(self) -> (PlayerState, Vec<NewEntry>) {
        (self.state, self.entries)
    }
}
