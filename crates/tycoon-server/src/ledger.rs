//! Append-only ledger of balance changes.
//!
//! Entries are only ever appended. The two deletion paths are the retention
//! sweep and the cascade when a player is removed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::tables::{BattleId, EntryId, EntryKind, LedgerEntry, PlayerId};

/// An entry waiting for commit; id and timestamp are assigned on append.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub player: PlayerId,
    pub amount: i64,
    pub kind: EntryKind,
    pub reason: String,
    pub battle: Option<BattleId>,
}

#[derive(Debug)]
pub struct Ledger {
    entries: Mutex<Vec<LedgerEntry>>,
    next_id: AtomicU64,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::from_entries(Vec::new())
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<LedgerEntry>) -> Self {
        let next = entries.iter().map(|e| e.id.0).max().unwrap_or(0) + 1;
        Self {
            entries: Mutex::new(entries),
            next_id: AtomicU64::new(next),
        }
    }

    /// Write a batch in one step. Either every entry lands or none does.
    pub fn append(&self, batch: Vec<NewEntry>, now: DateTime<Utc>) -> Vec<LedgerEntry> {
        if batch.is_empty() {
            return Vec::new();
        }
        let mut entries = self.entries.lock();
        let written: Vec<LedgerEntry> = batch
            .into_iter()
            .map(|e| LedgerEntry {
                id: EntryId(self.next_id.fetch_add(1, Ordering::Relaxed)),
                player: e.player,
                amount: e.amount,
                kind: e.kind,
                reason: e.reason,
                battle: e.battle,
                created_at: now,
            })
            .collect();
        entries.extend(written.iter().cloned());
        written
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn all(&self) -> Vec<LedgerEntry> {
        self.entries.lock().clone()
    }

    pub fn entries_for(&self, player: PlayerId) -> Vec<LedgerEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.player == player)
            .cloned()
            .collect()
    }

    /// Sum of every signed amount written for `player`.
    pub fn net_for(&self, player: PlayerId) -> i64 {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.player == player)
            .map(|e| e.amount)
            .sum()
    }

    pub fn battle_entries(&self, battle: BattleId) -> Vec<LedgerEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.battle == Some(battle))
            .cloned()
            .collect()
    }

    pub fn count_since(&self, player: PlayerId, since: DateTime<Utc>) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.player == player && e.created_at >= since)
            .count()
    }

    /// Entry counts per player since `since`.
    pub fn counts_since(&self, since: DateTime<Utc>) -> HashMap<PlayerId, usize> {
        let mut counts = HashMap::new();
        for entry in self.entries.lock().iter().filter(|e| e.created_at >= since) {
            *counts.entry(entry.player).or_insert(0) += 1;
        }
        counts
    }

    /// Retention: drop entries written before `cutoff`.
    pub fn sweep_older_than(&self, cutoff: DateTime<Utc>) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|e| e.created_at >= cutoff);
        before - entries.len()
    }

    pub fn remove_player(&self, player: PlayerId) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|e| e.player != player);
        before - entries.len()
    }
}
