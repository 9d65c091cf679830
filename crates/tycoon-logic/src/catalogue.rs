//! Catalogue definitions - fixed specs for every purchasable kind.
//!
//! Businesses, crops and VIP tiers each have a small closed set of variants
//! with fixed economics. Lookups by name go through `from_name` so unknown
//! strings coming from the front-end can be rejected cleanly.

use serde::{Deserialize, Serialize};

/// Economics of a business kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessSpec {
    pub name: &'static str,
    /// Purchase price in coins.
    pub cost: i64,
    /// Coins produced per completed cycle at level 1.
    pub income: i64,
    /// Cycle length in seconds.
    pub cycle_secs: i64,
}

// ============================================================================
// BUSINESSES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BusinessKind {
    Cafe = 0,
    Shop = 1,
    Factory = 2,
    Bank = 3,
}

impl BusinessKind {
    pub fn spec(&self) -> BusinessSpec {
        match self {
            Self::Cafe => BusinessSpec {
                name: "cafe",
                cost: 5_000,
                income: 100,
                cycle_secs: 3_600, // 1 hour
            },
            Self::Shop => BusinessSpec {
                name: "shop",
                cost: 15_000,
                income: 300,
                cycle_secs: 7_200,
            },
            Self::Factory => BusinessSpec {
                name: "factory",
                cost: 50_000,
                income: 1_000,
                cycle_secs: 14_400,
            },
            Self::Bank => BusinessSpec {
                name: "bank",
                cost: 200_000,
                income: 5_000,
                cycle_secs: 28_800, // 8 hours
            },
        }
    }

    pub fn all() -> &'static [BusinessKind] {
        &[Self::Cafe, Self::Shop, Self::Factory, Self::Bank]
    }

    /// Look up a kind by its catalogue name (case-insensitive).
    pub fn from_name(name: &str) -> Option<BusinessKind> {
        Self::all()
            .iter()
            .copied()
            .find(|k| k.spec().name.eq_ignore_ascii_case(name.trim()))
    }
}

// ============================================================================
// CROPS
// ============================================================================

/// Economics of a crop, all amounts per farm slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropSpec {
    pub name: &'static str,
    pub cost: i64,
    pub sell_price: i64,
    pub grow_secs: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CropKind {
    Wheat = 0,
    Corn = 1,
    Potato = 2,
    Tomato = 3,
}

impl CropKind {
    pub fn spec(&self) -> CropSpec {
        match self {
            Self::Wheat => CropSpec {
                name: "wheat",
                cost: 50,
                sell_price: 80,
                grow_secs: 1_800,
            },
            Self::Corn => CropSpec {
                name: "corn",
                cost: 100,
                sell_price: 160,
                grow_secs: 3_600,
            },
            Self::Potato => CropSpec {
                name: "potato",
                cost: 200,
                sell_price: 320,
                grow_secs: 7_200,
            },
            Self::Tomato => CropSpec {
                name: "tomato",
                cost: 500,
                sell_price: 800,
                grow_secs: 14_400,
            },
        }
    }

    pub fn all() -> &'static [CropKind] {
        &[Self::Wheat, Self::Corn, Self::Potato, Self::Tomato]
    }

    pub fn from_name(name: &str) -> Option<CropKind> {
        Self::all()
            .iter()
            .copied()
            .find(|k| k.spec().name.eq_ignore_ascii_case(name.trim()))
    }
}

// ============================================================================
// VIP TIERS
// ============================================================================

/// Benefits granted while a VIP tier is unexpired.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VipBenefits {
    pub name: &'static str,
    /// Added to the base energy cap.
    pub energy_bonus: i64,
    pub income_multiplier: f64,
    /// Divides crop grow time.
    pub speed_boost: f64,
    /// Multiplies PvP power.
    pub power_factor: f64,
    /// One-off coins paid on purchase.
    pub welcome_bonus: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum VipTier {
    Basic = 0,
    Premium = 1,
    Ultimate = 2,
}

impl VipTier {
    pub fn benefits(&self) -> VipBenefits {
        match self {
            Self::Basic => VipBenefits {
                name: "basic",
                energy_bonus: 50,
                income_multiplier: 1.2,
                speed_boost: 1.1,
                power_factor: 1.1,
                welcome_bonus: 5_000,
            },
            Self::Premium => VipBenefits {
                name: "premium",
                energy_bonus: 100,
                income_multiplier: 1.5,
                speed_boost: 1.3,
                power_factor: 1.2,
                welcome_bonus: 15_000,
            },
            Self::Ultimate => VipBenefits {
                name: "ultimate",
                energy_bonus: 200,
                income_multiplier: 2.0,
                speed_boost: 1.5,
                power_factor: 1.3,
                welcome_bonus: 50_000,
            },
        }
    }

    pub fn all() -> &'static [VipTier] {
        &[Self::Basic, Self::Premium, Self::Ultimate]
    }

    pub fn from_name(name: &str) -> Option<VipTier> {
        Self::all()
            .iter()
            .copied()
            .find(|t| t.benefits().name.eq_ignore_ascii_case(name.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_lookup_by_name() {
        assert_eq!(BusinessKind::from_name("cafe"), Some(BusinessKind::Cafe));
        assert_eq!(BusinessKind::from_name(" Bank "), Some(BusinessKind::Bank));
        assert_eq!(BusinessKind::from_name("casino"), None);
    }

    #[test]
    fn test_business_costs_increase() {
        let costs: Vec<i64> = BusinessKind::all().iter().map(|k| k.spec().cost).collect();
        assert!(costs.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_crops_are_profitable() {
        for crop in CropKind::all() {
            let spec = crop.spec();
            assert!(spec.sell_price > spec.cost, "{} sells at a loss", spec.name);
            assert!(spec.grow_secs > 0);
        }
    }

    #[test]
    fn test_vip_tiers_scale() {
        let basic = VipTier::Basic.benefits();
        let ultimate = VipTier::Ultimate.benefits();
        assert!(ultimate.energy_bonus > basic.energy_bonus);
        assert!(ultimate.income_multiplier > basic.income_multiplier);
        assert_eq!(VipTier::from_name("PREMIUM"), Some(VipTier::Premium));
    }
}
