//! Scheduled systems - the periodic work the scheduler drives.
//!
//! | System | Default period | Entry point |
//! |--------|----------------|-------------|
//! | Accrual | 60 s | [`Game::run_accrual_tick`] |
//! | Events | 10 min | [`Game::event_tick`] |
//! | Leaderboard | 5 min | [`Game::refresh_leaderboard`] |
//! | Retention | 1 h | [`Game::run_retention`] |
//! | Anomalies | 1 h | [`Game::detect_anomalies`] |
//!
//! Each system takes player locks one player at a time and skips players
//! whose lock is contended rather than waiting on them.

pub mod accrual;
pub mod anomalies;
pub mod events;
pub mod leaderboard;
pub mod retention;
