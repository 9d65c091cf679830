//! Periodic anomaly scan over balances and ledger volume.

use chrono::Duration;
use tycoon_logic::abuse::wealth_rate_suspicious;

use crate::game::Game;
use crate::tables::Identity;

impl Game {
    /// Flag players who got rich implausibly fast or wrote too many ledger
    /// entries in the last day. Returns the identities flagged this pass.
    pub fn detect_anomalies(&self) -> Vec<Identity> {
        let now = self.now();
        let counts = self.ledger.counts_since(now - Duration::days(1));
        let mut flagged = Vec::new();

        for state in self.store.snapshot_states() {
            let player = &state.player;
            if self.guard.is_blocked(player.identity) {
                continue;
            }
            let age = (now - player.created_at).num_seconds();
            if wealth_rate_suspicious(
                player.coins,
                age,
                self.config.wealth_per_hour_ceiling,
                self.config.wealth_floor,
            ) {
                self.guard.flag(
                    player.identity,
                    &format!("wealth rate: {} coins in {}s", player.coins, age),
                    now,
                );
                flagged.push(player.identity);
                continue;
            }
            let entries = counts.get(&player.id).copied().unwrap_or(0);
            if entries > self.config.max_ledger_entries_per_day {
                self.guard.flag(
                    player.identity,
                    &format!("{} ledger entries in 24h", entries),
                    now,
                );
                flagged.push(player.identity);
            }
        }
        if !flagged.is_empty() {
            log::warn!("Anomaly scan flagged {} players", flagged.len());
        }
        flagged
    }
}
