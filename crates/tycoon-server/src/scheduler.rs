//! Background scheduler: one worker thread per periodic task.
//!
//! Workers sleep on a shared stop channel with a timeout equal to their
//! period. Dropping the sender (or calling [`Scheduler::shutdown`]) wakes
//! every worker with `Disconnected` and they exit.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use thiserror::Error;

use crate::config::SchedulePeriods;
use crate::game::Game;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Accrual,
    Events,
    Leaderboard,
    Retention,
    Anomalies,
}

impl TaskKind {
    pub const ALL: [TaskKind; 5] = [
        TaskKind::Accrual,
        TaskKind::Events,
        TaskKind::Leaderboard,
        TaskKind::Retention,
        TaskKind::Anomalies,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Accrual => "accrual",
            Self::Events => "events",
            Self::Leaderboard => "leaderboard",
            Self::Retention => "retention",
            Self::Anomalies => "anomalies",
        }
    }

    pub fn period(&self, periods: &SchedulePeriods) -> Duration {
        let secs = match self {
            Self::Accrual => periods.accrual_secs,
            Self::Events => periods.events_secs,
            Self::Leaderboard => periods.leaderboard_secs,
            Self::Retention => periods.retention_secs,
            Self::Anomalies => periods.anomaly_secs,
        };
        Duration::from_secs(secs.max(1))
    }
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("failed to spawn {task} worker: {reason}")]
    ThreadSpawnFailed { task: &'static str, reason: String },
    #[error("{task} worker panicked")]
    ThreadJoinFailed { task: &'static str },
}

/// Run one task immediately on the calling thread. Returns a one-line
/// summary for logs.
pub fn run_once(game: &Game, task: TaskKind) -> String {
    match task {
        TaskKind::Accrual => {
            let r = game.run_accrual_tick();
            format!(
                "{} players, {} businesses collected, {} coins",
                r.players, r.businesses_collected, r.coins_paid
            )
        }
        TaskKind::Events => match game.event_tick() {
            Some(w) => format!("opened window {} ({})", w.id, w.kind.name()),
            None => "no new window".to_string(),
        },
        TaskKind::Leaderboard => {
            let board = game.refresh_leaderboard();
            format!("{} rows", board.by_coins.len())
        }
        TaskKind::Retention => {
            let r = game.run_retention();
            format!(
                "{} ledger, {} audit entries removed",
                r.ledger_removed, r.audit_removed
            )
        }
        TaskKind::Anomalies => format!("{} flagged", game.detect_anomalies().len()),
    }
}

pub struct Scheduler {
    stop_tx: Option<Sender<()>>,
    workers: Vec<(TaskKind, JoinHandle<()>)>,
}

impl Scheduler {
    /// Spawn a worker for every task using the game's configured periods.
    pub fn start(game: Arc<Game>) -> Result<Self, SchedulerError> {
        let periods = game.config().schedule.clone();
        let tasks: Vec<(TaskKind, Duration)> = TaskKind::ALL
            .iter()
            .map(|t| (*t, t.period(&periods)))
            .collect();
        Self::start_with(game, &tasks)
    }

    /// Spawn workers for an explicit task list.
    pub fn start_with(
        game: Arc<Game>,
        tasks: &[(TaskKind, Duration)],
    ) -> Result<Self, SchedulerError> {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let mut scheduler = Self {
            stop_tx: Some(stop_tx),
            workers: Vec::new(),
        };
        for (task, period) in tasks {
            match spawn_worker(Arc::clone(&game), *task, *period, stop_rx.clone()) {
                Ok(handle) => scheduler.workers.push((*task, handle)),
                Err(err) => {
                    // already-spawned workers are stopped before reporting
                    let _ = scheduler.shutdown();
                    return Err(err);
                }
            }
        }
        log::info!("Scheduler started {} workers", scheduler.workers.len());
        Ok(scheduler)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stop every worker and wait for it to finish its current run.
    pub fn shutdown(&mut self) -> Result<(), SchedulerError> {
        self.stop_tx.take();
        let mut result = Ok(());
        for (task, handle) in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("{} worker panicked", task.name());
                result = Err(SchedulerError::ThreadJoinFailed { task: task.name() });
            }
        }
        log::info!("Scheduler stopped");
        result
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            let _ = self.shutdown();
        }
    }
}

fn spawn_worker(
    game: Arc<Game>,
    task: TaskKind,
    period: Duration,
    stop_rx: Receiver<()>,
) -> Result<JoinHandle<()>, SchedulerError> {
    thread::Builder::new()
        .name(format!("tycoon-{}", task.name()))
        .spawn(move || loop {
            match stop_rx.recv_timeout(period) {
                Ok(()) => break,
                Err(RecvTimeoutError::Timeout) => {
                    let summary = run_once(&game, task);
                    log::debug!("{} task: {}", task.name(), summary);
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        })
        .map_err(|err| SchedulerError::ThreadSpawnFailed {
            task: task.name(),
            reason: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::GameConfig;
    use crate::tables::Identity;

    #[test]
    fn test_periods_follow_config() {
        let periods = SchedulePeriods::default();
        assert_eq!(TaskKind::Accrual.period(&periods), Duration::from_secs(60));
        assert_eq!(TaskKind::Events.period(&periods), Duration::from_secs(600));
        let zero = SchedulePeriods {
            accrual_secs: 0,
            ..SchedulePeriods::default()
        };
        assert_eq!(TaskKind::Accrual.period(&zero), Duration::from_secs(1));
    }

    #[test]
    fn test_workers_run_and_stop() {
        let clock = Arc::new(ManualClock::at_unix(1_704_067_200));
        let game = Arc::new(Game::new(GameConfig::default(), clock));
        game.get_or_create_player(Identity(1), "a").unwrap();

        let mut scheduler = Scheduler::start_with(
            Arc::clone(&game),
            &[(TaskKind::Leaderboard, Duration::from_millis(10))],
        )
        .unwrap();
        assert_eq!(scheduler.worker_count(), 1);
        thread::sleep(Duration::from_millis(100));
        scheduler.shutdown().unwrap();

        assert!(game.leaderboard().refreshed_at.is_some());
        assert_eq!(scheduler.worker_count(), 0);
    }

    #[test]
    fn test_run_once_every_task() {
        let clock = Arc::new(ManualClock::at_unix(1_704_067_200));
        let game = Game::new(GameConfig::default(), clock);
        for task in TaskKind::ALL {
            assert!(!run_once(&game, task).is_empty());
        }
    }
}
