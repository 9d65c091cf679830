//! Accrual sweep - energy regeneration and backlog collection.

use serde::{Deserialize, Serialize};
use tycoon_logic::accrual::backlog_due;

use crate::error::GameError;
use crate::game::Game;
use crate::tables::{AssetId, PlayerId};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualReport {
    pub players: usize,
    pub energy_restored: i64,
    pub businesses_collected: usize,
    pub coins_paid: i64,
    /// Players skipped because their lock was busy.
    pub skipped: usize,
}

impl Game {
    /// One accrual pass: energy first, then business backlogs.
    pub fn run_accrual_tick(&self) -> AccrualReport {
        let mut report = self.sweep_energy();
        let backlog = self.sweep_business_backlog();
        report.businesses_collected = backlog.businesses_collected;
        report.coins_paid = backlog.coins_paid;
        report.skipped += backlog.skipped;
        log::debug!(
            "Accrual: {} players, +{} energy, {} businesses paid {} coins, {} skipped",
            report.players,
            report.energy_restored,
            report.businesses_collected,
            report.coins_paid,
            report.skipped
        );
        report
    }

    /// Apply pending energy regeneration to every player.
    pub fn sweep_energy(&self) -> AccrualReport {
        let mut report = AccrualReport::default();
        for id in self.player_ids() {
            let result = self.transact(id, |txn| {
                let mods = self.modifiers_at(txn.now);
                Ok(self.regen_energy(txn, &mods))
            });
            match result {
                Ok(added) => {
                    report.players += 1;
                    report.energy_restored += added;
                }
                Err(err) => self.skip(id, &err, &mut report),
            }
        }
        report
    }

    /// Collect every business whose uncollected backlog reached the cap, so
    /// that income beyond the cap is not lost to absent owners.
    pub fn sweep_business_backlog(&self) -> AccrualReport {
        let mut report = AccrualReport::default();
        let cap = self.config.max_backlog_cycles;
        for id in self.player_ids() {
            let result = self.transact(id, |txn| {
                let now = txn.now;
                let due: Vec<AssetId> = txn
                    .state
                    .businesses
                    .iter()
                    .filter(|b| backlog_due(b.kind, (now - b.last_collection).num_seconds(), cap))
                    .map(|b| b.id)
                    .collect();
                if due.is_empty() {
                    return Ok((0, 0));
                }
                let mods = self.modifiers_at(now);
                let mut collected = 0;
                let mut paid = 0;
                for asset in due {
                    match self.collect_business_locked(txn, asset, &mods) {
                        Ok(amount) => {
                            collected += 1;
                            paid += amount;
                        }
                        Err(GameError::NothingToCollect) => {}
                        Err(err) => {
                            log::warn!("Backlog collection of asset {} failed: {}", asset, err)
                        }
                    }
                }
                Ok((collected, paid))
            });
            match result {
                Ok((collected, paid)) => {
                    report.players += 1;
                    report.businesses_collected += collected;
                    report.coins_paid += paid;
                }
                Err(err) => self.skip(id, &err, &mut report),
            }
        }
        report
    }

    fn skip(&self, id: PlayerId, err: &GameError, report: &mut AccrualReport) {
        report.skipped += 1;
        match err {
            GameError::Conflict(_) => log::debug!("Accrual skipped busy player {}", id),
            GameError::NotFound { .. } => {}
            other => log::warn!("Accrual failed for player {}: {}", id, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::clock::ManualClock;
    use crate::config::GameConfig;
    use crate::game::Game;
    use crate::tables::Identity;
    use std::sync::Arc;
    use tycoon_logic::entitlements::Entitlement;

    #[test]
    fn test_sweep_collects_capped_backlog() {
        let clock = Arc::new(ManualClock::at_unix(1_704_067_200));
        let game = Game::new(GameConfig::default(), clock.clone());
        let player = game.get_or_create_player(Identity(1), "idle").unwrap();
        game.credit_entitlement(player.id, &Entitlement::Coins { amount: 4_000 })
            .unwrap();
        let cafe = game.buy_asset(player.id, "cafe").unwrap();

        clock.advance_secs(9 * 3_600);
        assert_eq!(game.sweep_business_backlog().businesses_collected, 0);

        clock.advance_secs(6 * 3_600);
        let report = game.run_accrual_tick();
        assert_eq!(report.businesses_collected, 1);
        assert_eq!(report.coins_paid, 1_000);
        let state = game.player_state(player.id).unwrap();
        assert_eq!(state.player.coins, 1_000);
        assert_eq!(state.business(cafe.id).unwrap().last_collection, game.now());
    }

    #[test]
    fn test_energy_sweep_caps() {
        let clock = Arc::new(ManualClock::at_unix(1_704_067_200));
        let game = Game::new(GameConfig::default(), clock.clone());
        let player = game.get_or_create_player(Identity(1), "tired").unwrap();
        game.transact(player.id, |txn| {
            txn.state.player.energy = 95;
            Ok(())
        })
        .unwrap();
        clock.advance_secs(3_600);
        let report = game.sweep_energy();
        assert_eq!(report.energy_restored, 5);
        assert_eq!(game.player(player.id).unwrap().energy, 100);
    }
}
