//! Event windows - creation, flat-bonus payout and expiry.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc, Weekday};
use tycoon_logic::constants::modifier_names;
use tycoon_logic::modifiers::{
    pick_kind, plan_window, roll_creation, CalendarSlot, ModifierValue, Payload, WindowKind,
    WindowPhase,
};

use crate::error::GameError;
use crate::game::Game;
use crate::tables::{EntryKind, ModifierWindow, WindowId};

fn calendar_slot(now: DateTime<Utc>) -> CalendarSlot {
    CalendarSlot {
        weekend: matches!(now.weekday(), Weekday::Sat | Weekday::Sun),
        hour: now.hour(),
        minute: now.minute(),
    }
}

impl Game {
    /// Expire finished windows, pay any flat bonus still owed, then roll for
    /// a new window. Returns the window created this tick, if any.
    pub fn event_tick(&self) -> Option<ModifierWindow> {
        let now = self.now();
        self.expire_windows();

        let owed: Vec<WindowId> = self
            .windows
            .read()
            .iter()
            .filter(|w| w.kind == WindowKind::FlatBonus && w.distributed_at.is_none())
            .filter(|w| w.is_running(now))
            .map(|w| w.id)
            .collect();
        for id in owed {
            if let Err(err) = self.distribute_flat_bonus(id) {
                log::warn!("Flat bonus for window {} failed: {}", id, err);
            }
        }

        let any_running = self.windows.read().iter().any(|w| w.is_running(now));
        let slot = calendar_slot(now);
        let plan = self.with_rng(|rng| {
            if roll_creation(any_running, slot, &self.config.event_odds, rng) {
                let kind = pick_kind(rng);
                Some(plan_window(kind, rng))
            } else {
                None
            }
        })?;
        Some(self.store_window(plan.kind, now, plan.duration_secs, plan.payload))
    }

    /// Store a window of `kind` running from `start` for `duration_secs`.
    /// A flat bonus that is already running pays out immediately.
    pub fn schedule_window(
        &self,
        kind: WindowKind,
        start: DateTime<Utc>,
        duration_secs: i64,
    ) -> ModifierWindow {
        let plan = self.with_rng(|rng| plan_window(kind, rng));
        self.store_window(kind, start, duration_secs, plan.payload)
    }

    fn store_window(
        &self,
        kind: WindowKind,
        start: DateTime<Utc>,
        duration_secs: i64,
        payload: Payload,
    ) -> ModifierWindow {
        let window = ModifierWindow {
            id: self.next_window_id(),
            kind,
            start_time: start,
            end_time: start + Duration::seconds(duration_secs.max(0)),
            active: true,
            payload,
            distributed_at: None,
        };
        self.windows.write().push(window.clone());
        log::info!(
            "Event window {} ({}) scheduled {} to {}",
            window.id,
            kind.name(),
            window.start_time,
            window.end_time
        );

        if kind == WindowKind::FlatBonus && window.is_running(self.now()) {
            if let Err(err) = self.distribute_flat_bonus(window.id) {
                log::warn!("Flat bonus for window {} failed: {}", window.id, err);
            }
        }
        window
    }

    /// Pay a flat-bonus window's coins to every unblocked player, at most
    /// once per window. Returns the number of players paid.
    ///
    /// The window is marked distributed before any payment, so a player
    /// whose lock is busy misses the bonus rather than risking a double
    /// payout.
    pub fn distribute_flat_bonus(&self, window: WindowId) -> Result<usize, GameError> {
        let now = self.now();
        let amount = {
            let mut windows = self.windows.write();
            let w = windows
                .iter_mut()
                .find(|w| w.id == window)
                .ok_or_else(|| GameError::not_found("window", window.0))?;
            if w.kind != WindowKind::FlatBonus {
                return Err(GameError::InvalidState(format!(
                    "window {} is not a flat bonus",
                    window
                )));
            }
            if w.distributed_at.is_some() {
                return Ok(0);
            }
            if !w.is_running(now) {
                return Err(GameError::InvalidState(format!(
                    "window {} is not running",
                    window
                )));
            }
            let amount = match w.payload.get(modifier_names::BONUS_COINS) {
                Some(ModifierValue::Amount(amount)) => *amount,
                _ => 0,
            };
            w.distributed_at = Some(now);
            amount
        };
        if amount <= 0 {
            return Ok(0);
        }

        let mut paid = 0;
        for id in self.player_ids() {
            let result = self.transact(id, |txn| {
                if self.guard.is_blocked(txn.identity()) {
                    return Ok(false);
                }
                txn.credit(amount, EntryKind::Income, "Event bonus")?;
                Ok(true)
            });
            match result {
                Ok(true) => paid += 1,
                Ok(false) => {}
                Err(err) => log::warn!("Event bonus skipped player {}: {}", id, err),
            }
        }
        log::info!("Window {} paid {} coins to {} players", window, amount, paid);
        Ok(paid)
    }

    /// Clear the `active` flag on windows past their end. Returns how many
    /// were cleared.
    pub fn expire_windows(&self) -> usize {
        let now = self.now();
        let mut windows = self.windows.write();
        let mut expired = 0;
        for w in windows.iter_mut() {
            if w.active && w.phase(now) == WindowPhase::Expired {
                w.active = false;
                expired += 1;
                log::info!("Event window {} ({}) ended", w.id, w.kind.name());
            }
        }
        expired
    }

    /// Deactivate a window early.
    pub fn cancel_window(&self, window: WindowId) -> Result<(), GameError> {
        let mut windows = self.windows.write();
        let w = windows
            .iter_mut()
            .find(|w| w.id == window)
            .ok_or_else(|| GameError::not_found("window", window.0))?;
        w.active = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::GameConfig;
    use crate::tables::Identity;
    use std::sync::Arc;
    use tycoon_logic::modifiers::CreationOdds;

    fn game(odds: CreationOdds) -> (Game, Arc<ManualClock>) {
        // 2024-01-03 is a Wednesday
        let clock = Arc::new(ManualClock::at_unix(1_704_240_000 + 9 * 3_600));
        let config = GameConfig {
            rng_seed: Some(11),
            event_odds: odds,
            ..GameConfig::default()
        };
        (Game::new(config, clock.clone()), clock)
    }

    fn always() -> CreationOdds {
        CreationOdds {
            base: 1.0,
            ..CreationOdds::default()
        }
    }

    #[test]
    fn test_calendar_slot() {
        let saturday = DateTime::from_timestamp(1_704_499_200 + 12 * 3_600 + 5 * 60, 0).unwrap();
        assert_eq!(
            calendar_slot(saturday),
            CalendarSlot {
                weekend: true,
                hour: 12,
                minute: 5
            }
        );
    }

    #[test]
    fn test_no_creation_while_running() {
        let (game, clock) = game(always());
        let first = game.event_tick().expect("window created");
        assert!(first.is_running(game.now()));
        assert!(game.event_tick().is_none());

        clock.set(first.end_time + Duration::seconds(1));
        assert!(game.event_tick().is_some());
        assert_eq!(game.windows().iter().filter(|w| w.active).count(), 1);
    }

    #[test]
    fn test_zero_odds_never_create() {
        let odds = CreationOdds {
            base: 0.0,
            weekend: 0.0,
            peak_hour: 0.0,
            ..CreationOdds::default()
        };
        let (game, _) = game(odds);
        for _ in 0..20 {
            assert!(game.event_tick().is_none());
        }
    }

    #[test]
    fn test_flat_bonus_paid_once() {
        let (game, _) = game(CreationOdds::default());
        let a = game.get_or_create_player(Identity(1), "a").unwrap();
        let b = game.get_or_create_player(Identity(2), "b").unwrap();
        let window = game.schedule_window(WindowKind::FlatBonus, game.now(), 3_600);
        let bonus = match window.payload[modifier_names::BONUS_COINS] {
            ModifierValue::Amount(n) => n,
            _ => unreachable!(),
        };

        assert_eq!(game.distribute_flat_bonus(window.id), Ok(0));
        game.event_tick();
        assert_eq!(game.player(a.id).unwrap().coins, 1_000 + bonus);
        assert_eq!(game.player(b.id).unwrap().coins, 1_000 + bonus);
        assert!(game.windows()[0].distributed_at.is_some());
    }

    #[test]
    fn test_future_window_not_running_yet() {
        let (game, clock) = game(CreationOdds::default());
        let start = game.now() + Duration::hours(1);
        let window = game.schedule_window(WindowKind::DoubleIncome, start, 3_600);
        assert_eq!(window.phase(game.now()), WindowPhase::Scheduled);
        assert_eq!(game.query_active_modifiers().factor("income_multiplier"), 1.0);
        clock.advance_secs(3_600);
        assert_eq!(game.query_active_modifiers().factor("income_multiplier"), 2.0);
        clock.advance_secs(3_601);
        assert_eq!(game.expire_windows(), 1);
        assert!(game.query_active_modifiers().is_empty());
    }

    #[test]
    fn test_cancel_window() {
        let (game, _) = game(CreationOdds::default());
        let window = game.schedule_window(WindowKind::GoldenHour, game.now(), 3_600);
        assert!(game.query_active_modifiers().has_flag("free_energy"));
        game.cancel_window(window.id).unwrap();
        assert!(!game.query_active_modifiers().has_flag("free_energy"));
    }
}
