//! Error type shared by every game operation.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tycoon_logic::pvp::AttackDenial;

use crate::tables::{AssetId, Identity, PlayerId};

/// Coarse classification reported to the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    InsufficientResource,
    RateLimited,
    Blocked,
    /// Lock contention. The only retryable kind.
    Conflict,
    ValidationFailed,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GameError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },
    #[error("asset {0} does not belong to the requester")]
    NotOwner(AssetId),
    #[error("nothing to collect")]
    NothingToCollect,
    #[error("unknown kind: {0}")]
    UnknownKind(String),
    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: i64, available: i64 },
    #[error("insufficient energy: need {needed}, have {available}")]
    InsufficientEnergy { needed: i64, available: i64 },
    #[error("a player cannot attack themselves")]
    SelfAttack,
    #[error("on cooldown for another {remaining_secs}s")]
    OnCooldown { remaining_secs: i64 },
    #[error("level gap too large: attacker {attacker}, defender {defender}")]
    LevelGap { attacker: u32, defender: u32 },
    #[error("defender has only {coins} coins")]
    DefenderTooPoor { coins: i64 },
    #[error("plot {0} already holds a crop")]
    PlotOccupied(AssetId),
    #[error("crop ready in {remaining_secs}s")]
    CropNotReady { remaining_secs: i64 },
    #[error("identity {0} is rate limited")]
    RateLimited(Identity),
    #[error("identity {0} is blocked")]
    Blocked(Identity),
    #[error("timed out waiting for player {0}")]
    Conflict(PlayerId),
    #[error("implausible claim: {claimed} exceeds ceiling {ceiling}")]
    ValidationFailed { claimed: i64, ceiling: i64 },
    #[error("{0}")]
    InvalidState(String),
}

impl GameError {
    pub fn not_found(entity: &'static str, id: u64) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::NotOwner(_)
            | Self::NothingToCollect
            | Self::UnknownKind(_)
            | Self::SelfAttack
            | Self::OnCooldown { .. }
            | Self::LevelGap { .. }
            | Self::DefenderTooPoor { .. }
            | Self::PlotOccupied(_)
            | Self::CropNotReady { .. }
            | Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::InsufficientFunds { .. } | Self::InsufficientEnergy { .. } => {
                ErrorKind::InsufficientResource
            }
            Self::RateLimited(_) => ErrorKind::RateLimited,
            Self::Blocked(_) => ErrorKind::Blocked,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::ValidationFailed { .. } => ErrorKind::ValidationFailed,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}

impl From<AttackDenial> for GameError {
    fn from(denial: AttackDenial) -> Self {
        match denial {
            AttackDenial::SelfAttack => Self::SelfAttack,
            AttackDenial::InsufficientCoins { needed, available } => {
                Self::InsufficientFunds { needed, available }
            }
            AttackDenial::InsufficientEnergy { needed, available } => {
                Self::InsufficientEnergy { needed, available }
            }
            AttackDenial::OnCooldown { remaining_secs } => Self::OnCooldown { remaining_secs },
            AttackDenial::LevelGap { attacker, defender } => Self::LevelGap { attacker, defender },
            AttackDenial::DefenderTooPoor { coins } => Self::DefenderTooPoor { coins },
        }
    }
}
