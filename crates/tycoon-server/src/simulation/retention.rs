//! Retention sweep - trims the ledger, audit trail and idle guard state.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::game::Game;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionReport {
    pub ledger_removed: usize,
    pub audit_removed: usize,
    pub windows_removed: usize,
    pub cooldowns_removed: usize,
    pub buckets_pruned: usize,
}

impl Game {
    pub fn run_retention(&self) -> RetentionReport {
        let now = self.now();
        let ledger_cutoff = now - Duration::days(self.config.ledger_retention_days);
        let audit_cutoff = now - Duration::days(self.config.audit_retention_days);

        let windows_removed = {
            let mut windows = self.windows.write();
            let before = windows.len();
            windows.retain(|w| w.active || w.end_time >= ledger_cutoff);
            before - windows.len()
        };
        let cooldowns_removed = {
            let cooldown = Duration::seconds(self.config.pvp.cooldown_secs);
            let mut cooldowns = self.cooldowns.lock();
            let before = cooldowns.len();
            cooldowns.retain(|_, at| now - *at < cooldown);
            before - cooldowns.len()
        };

        let report = RetentionReport {
            ledger_removed: self.ledger.sweep_older_than(ledger_cutoff),
            audit_removed: self.guard.sweep_audit_older_than(audit_cutoff),
            windows_removed,
            cooldowns_removed,
            buckets_pruned: self.guard.prune_idle_buckets(now),
        };
        log::info!(
            "Retention: {} ledger entries, {} audit entries, {} windows, {} cooldowns, {} buckets",
            report.ledger_removed,
            report.audit_removed,
            report.windows_removed,
            report.cooldowns_removed,
            report.buckets_pruned
        );
        report
    }
}
