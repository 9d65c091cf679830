//! Save/load of the whole world as JSON.
//!
//! Rate buckets, suspicion counters and the blocked set are not persisted;
//! they rebuild from live traffic. The audit trail is.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::Clock;
use crate::config::GameConfig;
use crate::error::GameError;
use crate::game::{Game, Parts};
use crate::guard::{AbuseGuard, GuardLimits};
use crate::ledger::Ledger;
use crate::store::PlayerStore;
use crate::tables::{AuditEntry, BattleRecord, LedgerEntry, ModifierWindow, PlayerId, PlayerState};

/// Bump when the snapshot layout changes.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("snapshot version {found} is not supported (expected {expected})")]
    Version { found: u32, expected: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CooldownEntry {
    pub attacker: PlayerId,
    pub defender: PlayerId,
    pub last_attack: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub version: u32,
    pub taken_at: DateTime<Utc>,
    pub players: Vec<PlayerState>,
    pub ledger: Vec<LedgerEntry>,
    pub windows: Vec<ModifierWindow>,
    pub battles: Vec<BattleRecord>,
    pub cooldowns: Vec<CooldownEntry>,
    pub audit: Vec<AuditEntry>,
}

impl WorldSnapshot {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_json::from_str(json)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::Version {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        Ok(snapshot)
    }

    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        std::fs::write(path, self.to_json()?).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let json = std::fs::read_to_string(path).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }
}

impl Game {
    /// Capture the world. Every player lock is held, in ascending id order,
    /// while players and the ledger are copied, so balances and entries
    /// agree. A busy player fails the whole capture with a retryable
    /// `Conflict`.
    pub fn snapshot(&self) -> Result<WorldSnapshot, GameError> {
        let handles = self.store.handles();
        let mut guards = Vec::with_capacity(handles.len());
        for (id, handle) in &handles {
            match self.store.lock(handle, *id) {
                Ok(guard) => guards.push(guard),
                // removed after listing, ledger entries included
                Err(GameError::NotFound { .. }) => {}
                Err(err) => {
                    log::warn!("Snapshot aborted: {}", err);
                    return Err(err);
                }
            }
        }
        let players: Vec<PlayerState> = guards.iter().map(|g| PlayerState::clone(g)).collect();
        let ledger = self.ledger.all();

        let mut cooldowns: Vec<CooldownEntry> = self
            .cooldowns
            .lock()
            .iter()
            .map(|((attacker, defender), at)| CooldownEntry {
                attacker: *attacker,
                defender: *defender,
                last_attack: *at,
            })
            .collect();
        cooldowns.sort_by_key(|c| (c.attacker, c.defender));

        let snapshot = WorldSnapshot {
            version: SNAPSHOT_VERSION,
            taken_at: self.now(),
            players,
            ledger,
            windows: self.windows(),
            battles: self.battles.lock().clone(),
            cooldowns,
            audit: self.guard.audit_trail(),
        };
        drop(guards);
        Ok(snapshot)
    }

    /// Rebuild a game from a snapshot. Id counters continue past the
    /// highest persisted id.
    pub fn restore(snapshot: WorldSnapshot, config: GameConfig, clock: Arc<dyn Clock>) -> Self {
        let cooldowns: HashMap<(PlayerId, PlayerId), DateTime<Utc>> = snapshot
            .cooldowns
            .into_iter()
            .map(|c| ((c.attacker, c.defender), c.last_attack))
            .collect();
        let parts = Parts {
            store: PlayerStore::from_states(snapshot.players, config.lock_timeout()),
            ledger: Ledger::from_entries(snapshot.ledger),
            guard: AbuseGuard::with_audit(GuardLimits::from(&config), snapshot.audit),
            windows: snapshot.windows,
            battles: snapshot.battles,
            cooldowns,
        };
        log::info!(
            "Restored snapshot taken at {} ({} players)",
            snapshot.taken_at,
            parts.store.len()
        );
        Self::from_parts(config, clock, parts)
    }
}
