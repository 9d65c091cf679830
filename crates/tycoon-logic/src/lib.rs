//! Pure economy rules for Tycoon.
//!
//! This crate contains every rule of the game that is independent of
//! storage, locking or wall-clock time. Functions take plain data and
//! timestamps and return results, making them unit-testable and usable from
//! the server, the scenario harness and any future front-end.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`abuse`] | Sliding windows, suspicion escalation, plausibility bounds |
//! | [`accrual`] | Catch-up income, energy regeneration, crop maturity |
//! | [`catalogue`] | Business kinds, crop kinds and VIP tiers with fixed economics |
//! | [`constants`] | Tunables grouped by subsystem, modifier names |
//! | [`economy`] | ROI, wealth distribution, upgrade pricing |
//! | [`entitlements`] | What purchased entitlements are worth in game terms |
//! | [`modifiers`] | Event windows, payload composition, creation gate |
//! | [`progression`] | Experience thresholds and level-up cascade |
//! | [`pvp`] | Attack eligibility, power score, battle outcome, narrative |

pub mod abuse;
pub mod accrual;
pub mod catalogue;
pub mod constants;
pub mod economy;
pub mod entitlements;
pub mod modifiers;
pub mod progression;
pub mod pvp;
