//! Record definitions for the persistent game state.
//!
//! Every record is keyed by a stable surrogate id. A player's businesses and
//! farms live inside its [`PlayerState`], which is the unit the store locks.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tycoon_logic::catalogue::{BusinessKind, CropKind, VipTier};
use tycoon_logic::modifiers::{window_phase, Payload, WindowKind, WindowPhase};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Surrogate key of a player.
    PlayerId
);
id_type!(
    /// External identity of a player (the front-end's user id).
    Identity
);
id_type!(
    /// Key shared by businesses and farm plots.
    AssetId
);
id_type!(BattleId);
id_type!(WindowId);
id_type!(EntryId);
id_type!(AuditId);

// ============================================================================
// PLAYERS
// ============================================================================

/// A VIP subscription, valid until `expires_at`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VipStatus {
    pub tier: VipTier,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub identity: Identity,
    pub username: String,
    /// Never negative.
    pub coins: i64,
    pub energy: i64,
    pub level: u32,
    pub experience: u64,
    pub last_energy_update: DateTime<Utc>,
    pub last_daily_bonus: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub vip: Option<VipStatus>,
    pub total_earned: i64,
    pub total_spent: i64,
    pub pvp_wins: u32,
    pub pvp_losses: u32,
}

impl Player {
    /// The VIP tier if the subscription has not expired.
    pub fn active_vip(&self, now: DateTime<Utc>) -> Option<VipTier> {
        self.vip
            .filter(|status| status.expires_at > now)
            .map(|status| status.tier)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Business {
    pub id: AssetId,
    pub owner: PlayerId,
    pub kind: BusinessKind,
    pub level: u32,
    pub last_collection: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A farm plot. Holds at most one crop at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Farm {
    pub id: AssetId,
    pub owner: PlayerId,
    pub crop: Option<CropKind>,
    pub planted_at: Option<DateTime<Utc>>,
    pub slots: u32,
    pub level: u32,
    pub created_at: DateTime<Utc>,
}

/// A player together with every asset it owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub player: Player,
    pub businesses: Vec<Business>,
    pub farms: Vec<Farm>,
}

impl PlayerState {
    pub fn business(&self, id: AssetId) -> Option<&Business> {
        self.businesses.iter().find(|b| b.id == id)
    }

    pub fn business_mut(&mut self, id: AssetId) -> Option<&mut Business> {
        self.businesses.iter_mut().find(|b| b.id == id)
    }

    pub fn farm(&self, id: AssetId) -> Option<&Farm> {
        self.farms.iter().find(|f| f.id == id)
    }

    pub fn farm_mut(&mut self, id: AssetId) -> Option<&mut Farm> {
        self.farms.iter_mut().find(|f| f.id == id)
    }

    pub fn asset_ids(&self) -> impl Iterator<Item = AssetId> + '_ {
        self.businesses
            .iter()
            .map(|b| b.id)
            .chain(self.farms.iter().map(|f| f.id))
    }
}

// ============================================================================
// LEDGER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    Income,
    Expense,
    PvpWin,
    PvpLoss,
}

/// Append-only record of a balance change. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub player: PlayerId,
    /// Signed: debits are negative.
    pub amount: i64,
    pub kind: EntryKind,
    pub reason: String,
    /// Set only on the two linked entries of a PvP transfer.
    pub battle: Option<BattleId>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// MODIFIER WINDOWS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifierWindow {
    pub id: WindowId,
    pub kind: WindowKind,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Advisory; cleared by the expiry sweep.
    pub active: bool,
    pub payload: Payload,
    /// Set once a flat-bonus window has paid out.
    pub distributed_at: Option<DateTime<Utc>>,
}

impl ModifierWindow {
    pub fn phase(&self, now: DateTime<Utc>) -> WindowPhase {
        window_phase(
            self.start_time.timestamp(),
            self.end_time.timestamp(),
            self.active,
            now.timestamp(),
        )
    }

    pub fn is_running(&self, now: DateTime<Utc>) -> bool {
        self.phase(now) == WindowPhase::Active
    }
}

// ============================================================================
// BATTLES & AUDIT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleRecord {
    pub id: BattleId,
    pub attacker: PlayerId,
    pub defender: PlayerId,
    pub winner: PlayerId,
    pub amount_stolen: i64,
    pub attacker_power: f64,
    pub defender_power: f64,
    /// Decorative narrative lines.
    pub log: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl BattleRecord {
    pub fn attacker_won(&self) -> bool {
        self.winner == self.attacker
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditKind {
    Flagged,
    ClaimRejected,
    Blocked,
    Unblocked,
}

/// Immutable anti-abuse audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditId,
    pub identity: Identity,
    pub kind: AuditKind,
    pub detail: String,
    pub created_at: DateTime<Utc>,
}
