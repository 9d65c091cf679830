//! Anti-abuse guard: rate limiting, suspicion scoring, blocking, audit.
//!
//! Counters are process-local and keyed by identity in `DashMap`s. Entry
//! access holds the shard lock, so each identity's bucket has a single
//! writer at a time. Losing this state on restart only weakens enforcement;
//! the audit trail is the durable part.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tycoon_logic::abuse::{burst_suspicious, escalate, ActionKind, Escalation, SlidingWindow};

use crate::config::GameConfig;
use crate::tables::{AuditEntry, AuditId, AuditKind, Identity};

/// Limits copied out of [`GameConfig`].
#[derive(Debug, Clone)]
pub struct GuardLimits {
    pub max_actions_per_minute: usize,
    pub rate_window_ms: i64,
    pub suspicion_window_ms: i64,
    pub suspicious_action_threshold: usize,
    pub auto_block_threshold: u32,
}

impl From<&GameConfig> for GuardLimits {
    fn from(config: &GameConfig) -> Self {
        Self {
            max_actions_per_minute: config.max_actions_per_minute,
            rate_window_ms: config.rate_window_ms,
            suspicion_window_ms: config.suspicion_window_ms,
            suspicious_action_threshold: config.suspicious_action_threshold,
            auto_block_threshold: config.auto_block_threshold,
        }
    }
}

/// Snapshot of guard state for operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityReport {
    pub blocked: usize,
    pub flagged: usize,
    /// Identities with a live rate-limit bucket.
    pub tracked: usize,
    /// Highest suspicion scores, descending.
    pub top_suspicious: Vec<(Identity, u32)>,
    pub audit_entries: usize,
}

#[derive(Debug)]
pub struct AbuseGuard {
    limits: GuardLimits,
    rate: DashMap<Identity, SlidingWindow>,
    watched: DashMap<Identity, SlidingWindow>,
    suspicion: DashMap<Identity, u32>,
    blocked: DashMap<Identity, DateTime<Utc>>,
    audit: Mutex<Vec<AuditEntry>>,
    next_audit: AtomicU64,
}

impl AbuseGuard {
    pub fn new(limits: GuardLimits) -> Self {
        Self::with_audit(limits, Vec::new())
    }

    pub fn with_audit(limits: GuardLimits, audit: Vec<AuditEntry>) -> Self {
        let next = audit.iter().map(|a| a.id.0).max().unwrap_or(0) + 1;
        Self {
            limits,
            rate: DashMap::new(),
            watched: DashMap::new(),
            suspicion: DashMap::new(),
            blocked: DashMap::new(),
            audit: Mutex::new(audit),
            next_audit: AtomicU64::new(next),
        }
    }

    // ------------------------------------------------------------------------
    // Rate limiting
    // ------------------------------------------------------------------------

    /// Admit one action for `identity` if it is under the per-minute ceiling.
    pub fn rate_limit_check(&self, identity: Identity, now: DateTime<Utc>) -> bool {
        let admitted = self.rate.entry(identity).or_default().try_admit(
            now.timestamp_millis(),
            self.limits.rate_window_ms,
            self.limits.max_actions_per_minute,
        );
        if !admitted {
            log::warn!("Rate limit exceeded for identity {}", identity);
        }
        admitted
    }

    // ------------------------------------------------------------------------
    // Suspicion
    // ------------------------------------------------------------------------

    /// Feed an action into the suspicion window. Returns the escalation when
    /// the action tipped the identity over the burst threshold.
    pub fn record_action(
        &self,
        identity: Identity,
        action: ActionKind,
        now: DateTime<Utc>,
    ) -> Option<Escalation> {
        if !action.is_watched() {
            return None;
        }
        let count = {
            let mut window = self.watched.entry(identity).or_default();
            window.prune(now.timestamp_millis(), self.limits.suspicion_window_ms);
            window.record(now.timestamp_millis());
            window.len()
        };
        if burst_suspicious(count, self.limits.suspicious_action_threshold) {
            Some(self.flag(
                identity,
                &format!(
                    "high activity rate: {} {} actions in window",
                    count,
                    action.name()
                ),
                now,
            ))
        } else {
            None
        }
    }

    /// Raise the suspicion counter, blocking once it reaches the threshold.
    pub fn flag(&self, identity: Identity, reason: &str, now: DateTime<Utc>) -> Escalation {
        let escalation = {
            let mut score = self.suspicion.entry(identity).or_insert(0);
            let escalation = escalate(*score, self.limits.auto_block_threshold);
            *score = match escalation {
                Escalation::Flagged { score } | Escalation::Block { score } => score,
            };
            escalation
        };
        log::warn!("Suspicious activity by identity {}: {}", identity, reason);
        self.push_audit(identity, AuditKind::Flagged, reason.to_string(), now);
        if let Escalation::Block { score } = escalation {
            self.block(identity, &format!("auto-blocked after {} flags: {}", score, reason), now);
        }
        escalation
    }

    /// Record a rejected income claim and flag the identity.
    pub fn reject_claim(&self, identity: Identity, claimed: i64, ceiling: i64, now: DateTime<Utc>) {
        let detail = format!("claimed {} against ceiling {}", claimed, ceiling);
        log::warn!("Implausible claim by identity {}: {}", identity, detail);
        self.push_audit(identity, AuditKind::ClaimRejected, detail.clone(), now);
        self.flag(identity, &format!("invalid income claim: {}", detail), now);
    }

    pub fn suspicion_score(&self, identity: Identity) -> u32 {
        self.suspicion.get(&identity).map(|s| *s).unwrap_or(0)
    }

    // ------------------------------------------------------------------------
    // Blocking
    // ------------------------------------------------------------------------

    pub fn block(&self, identity: Identity, reason: &str, now: DateTime<Utc>) {
        if self.blocked.insert(identity, now).is_none() {
            log::info!("Identity {} blocked: {}", identity, reason);
            self.push_audit(identity, AuditKind::Blocked, reason.to_string(), now);
        }
    }

    pub fn is_blocked(&self, identity: Identity) -> bool {
        self.blocked.contains_key(&identity)
    }

    /// Lift a block and clear the suspicion counter. Returns false when the
    /// identity was not blocked.
    pub fn unblock(&self, identity: Identity, admin: &str, now: DateTime<Utc>) -> bool {
        if self.blocked.remove(&identity).is_none() {
            return false;
        }
        self.suspicion.remove(&identity);
        self.watched.remove(&identity);
        log::info!("Identity {} unblocked by {}", identity, admin);
        self.push_audit(
            identity,
            AuditKind::Unblocked,
            format!("unblocked by {}", admin),
            now,
        );
        true
    }

    // ------------------------------------------------------------------------
    // Audit & housekeeping
    // ------------------------------------------------------------------------

    fn push_audit(&self, identity: Identity, kind: AuditKind, detail: String, now: DateTime<Utc>) {
        let entry = AuditEntry {
            id: AuditId(self.next_audit.fetch_add(1, Ordering::Relaxed)),
            identity,
            kind,
            detail,
            created_at: now,
        };
        self.audit.lock().push(entry);
    }

    pub fn audit_trail(&self) -> Vec<AuditEntry> {
        self.audit.lock().clone()
    }

    pub fn audit_for(&self, identity: Identity) -> Vec<AuditEntry> {
        self.audit
            .lock()
            .iter()
            .filter(|a| a.identity == identity)
            .cloned()
            .collect()
    }

    pub fn sweep_audit_older_than(&self, cutoff: DateTime<Utc>) -> usize {
        let mut audit = self.audit.lock();
        let before = audit.len();
        audit.retain(|a| a.created_at >= cutoff);
        before - audit.len()
    }

    /// Drop buckets with no timestamps left in their window.
    pub fn prune_idle_buckets(&self, now: DateTime<Utc>) -> usize {
        let now_ms = now.timestamp_millis();
        let before = self.rate.len() + self.watched.len();
        self.rate.retain(|_, window| {
            window.prune(now_ms, self.limits.rate_window_ms);
            !window.is_empty()
        });
        self.watched.retain(|_, window| {
            window.prune(now_ms, self.limits.suspicion_window_ms);
            !window.is_empty()
        });
        before - (self.rate.len() + self.watched.len())
    }

    pub fn report(&self, top: usize) -> SecurityReport {
        let mut scores: Vec<(Identity, u32)> =
            self.suspicion.iter().map(|e| (*e.key(), *e.value())).collect();
        scores.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        let flagged = scores.len();
        scores.truncate(top);
        SecurityReport {
            blocked: self.blocked.len(),
            flagged,
            tracked: self.rate.len(),
            top_suspicious: scores,
            audit_entries: self.audit.lock().len(),
        }
    }
}
