//! Entitlements credited from the billing collaborator.
//!
//! Billing decides *that* a purchase happened; these rules decide what the
//! purchase is worth in game terms.

use serde::{Deserialize, Serialize};

use crate::catalogue::VipTier;
use crate::constants::time;

/// A purchased entitlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Entitlement {
    Vip { tier: VipTier, days: u32 },
    Coins { amount: i64 },
    EnergyPack,
    ExperienceBoost,
}

impl Entitlement {
    pub fn describe(&self) -> String {
        match self {
            Self::Vip { tier, days } => format!("VIP {} for {} days", tier.benefits().name, days),
            Self::Coins { amount } => format!("{} coins", amount),
            Self::EnergyPack => "energy pack".to_string(),
            Self::ExperienceBoost => "experience boost".to_string(),
        }
    }
}

pub const ENERGY_PACK_AMOUNT: i64 = 200;
pub const EXPERIENCE_BOOST_AMOUNT: u64 = 5_000;

/// Bulk bonus on coin purchases: 20% from 50k, 10% from 20k.
pub fn coin_purchase_bonus(amount: i64) -> i64 {
    if amount >= 50_000 {
        amount / 5
    } else if amount >= 20_000 {
        amount / 10
    } else {
        0
    }
}

/// New VIP expiry (unix seconds). An unexpired subscription is extended
/// from its current expiry, otherwise the clock starts now.
pub fn vip_expiry(current_expiry: Option<i64>, now: i64, days: u32) -> i64 {
    let start = match current_expiry {
        Some(expiry) if expiry > now => expiry,
        _ => now,
    };
    start + i64::from(days) * time::DAY
}

/// Energy after an energy pack, never above the cap.
pub fn energy_after_pack(current: i64, cap: i64) -> i64 {
    current.saturating_add(ENERGY_PACK_AMOUNT).min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coin_bonus_tiers() {
        assert_eq!(coin_purchase_bonus(5_000), 0);
        assert_eq!(coin_purchase_bonus(20_000), 2_000);
        assert_eq!(coin_purchase_bonus(50_000), 10_000);
        assert_eq!(coin_purchase_bonus(150_000), 30_000);
    }

    #[test]
    fn test_vip_extends_active() {
        let now = 1_000_000;
        let active = now + time::DAY;
        assert_eq!(vip_expiry(Some(active), now, 30), active + 30 * time::DAY);
    }

    #[test]
    fn test_vip_restarts_expired() {
        let now = 1_000_000;
        assert_eq!(vip_expiry(Some(now - 5), now, 7), now + 7 * time::DAY);
        assert_eq!(vip_expiry(None, now, 7), now + 7 * time::DAY);
    }

    #[test]
    fn test_energy_pack_respects_cap() {
        assert_eq!(energy_after_pack(50, 100), 100);
        assert_eq!(energy_after_pack(50, 300), 250);
        assert_eq!(energy_after_pack(100, 100), 100);
    }

    #[test]
    fn test_energy_pack_clamps_to_lapsed_cap() {
        assert_eq!(energy_after_pack(250, 100), 100);
    }

    #[test]
    fn test_describe() {
        let vip = Entitlement::Vip {
            tier: VipTier::Premium,
            days: 30,
        };
        assert_eq!(vip.describe(), "VIP premium for 30 days");
        assert_eq!(Entitlement::Coins { amount: 10 }.describe(), "10 coins");
    }
}
