//! Tycoon Server - transactional economy core.
//!
//! Owns the authoritative world: players and their assets, the append-only
//! ledger, modifier windows, battles and the anti-abuse guard. Front-ends
//! call the operations on [`Game`]; the [`scheduler`] drives the periodic
//! systems in [`simulation`].
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`tables`] | Persistent rows: players, assets, ledger, windows, battles, audit |
//! | [`store`] | Per-player locks, lookup indexes, transactions |
//! | [`ledger`] | Append-only balance history |
//! | [`guard`] | Rate limiting, suspicion scoring, blocking, audit trail |
//! | [`game`] | Shared state and the transaction discipline |
//! | [`reducers`] | Interactive operations |
//! | [`reports`] | Read-only queries |
//! | [`simulation`] | Accrual, events, leaderboards, retention, anomaly scan |
//! | [`scheduler`] | Worker threads for the periodic systems |
//! | [`snapshot`] | JSON save/load |
//!
//! # Locking
//!
//! A player's lock is always taken before any shared structure (windows,
//! ledger, cooldowns, guard, rng). Two player locks are taken in ascending
//! id order. Nothing acquires a player lock while holding a shared one.

pub mod clock;
pub mod config;
pub mod error;
pub mod game;
pub mod guard;
pub mod ledger;
pub mod reducers;
pub mod reports;
pub mod scheduler;
pub mod simulation;
pub mod snapshot;
pub mod store;
pub mod tables;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, GameConfig};
pub use error::{ErrorKind, GameError};
pub use game::Game;
pub use reducers::{Collected, GrantOutcome};
pub use scheduler::{Scheduler, TaskKind};
pub use snapshot::WorldSnapshot;
pub use tables::*;
