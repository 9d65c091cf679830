//! Read-only queries: leaderboards, wealth, ROI, PvP history and security.

use serde::{Deserialize, Serialize};
use tycoon_logic::catalogue::BusinessKind;
use tycoon_logic::economy::{self, BusinessRoi, WealthDistribution};

use crate::error::GameError;
use crate::game::Game;
use crate::guard::SecurityReport;
use crate::simulation::leaderboard::Leaderboard;
use crate::tables::{BattleRecord, PlayerId};

/// A player that may currently be attacked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PvpTarget {
    pub player: PlayerId,
    pub username: String,
    pub level: u32,
    pub coins: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PvpRanking {
    pub player: PlayerId,
    pub username: String,
    pub wins: u32,
    pub losses: u32,
    pub win_rate: f64,
}

impl Game {
    /// The most recently refreshed leaderboard.
    pub fn leaderboard(&self) -> Leaderboard {
        self.leaderboard.read().clone()
    }

    pub fn wealth_distribution(&self) -> WealthDistribution {
        let balances: Vec<i64> = self
            .store
            .snapshot_states()
            .iter()
            .map(|s| s.player.coins)
            .collect();
        economy::wealth_distribution(&balances)
    }

    pub fn business_roi(&self, kind: &str) -> Result<BusinessRoi, GameError> {
        BusinessKind::from_name(kind)
            .map(economy::business_roi)
            .ok_or_else(|| GameError::UnknownKind(kind.to_string()))
    }

    pub fn security_report(&self) -> SecurityReport {
        self.guard.report(10)
    }

    /// Players `player` could attack right now, richest first.
    pub fn pvp_targets(&self, player: PlayerId, limit: usize) -> Result<Vec<PvpTarget>, GameError> {
        let me = self.player(player)?;
        let now = self.now();
        let low = me.level.saturating_sub(self.config.target_levels_below);
        let high = me.level + self.config.pvp.level_margin;
        let cooldowns = self.cooldowns.lock().clone();

        let mut targets: Vec<PvpTarget> = self
            .store
            .snapshot_states()
            .into_iter()
            .map(|s| s.player)
            .filter(|p| p.id != player)
            .filter(|p| p.level >= low && p.level <= high)
            .filter(|p| p.coins >= self.config.target_min_coins)
            .filter(|p| {
                cooldowns
                    .get(&(player, p.id))
                    .map(|at| (now - *at).num_seconds() >= self.config.pvp.cooldown_secs)
                    .unwrap_or(true)
            })
            .map(|p| PvpTarget {
                player: p.id,
                username: p.username,
                level: p.level,
                coins: p.coins,
            })
            .collect();
        targets.sort_by(|a, b| b.coins.cmp(&a.coins).then(a.player.cmp(&b.player)));
        targets.truncate(limit);
        Ok(targets)
    }

    /// Battles `player` took part in, newest first.
    pub fn battle_history(&self, player: PlayerId, limit: usize) -> Vec<BattleRecord> {
        let battles = self.battles.lock();
        battles
            .iter()
            .rev()
            .filter(|b| b.attacker == player || b.defender == player)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn pvp_rankings(&self, limit: usize) -> Vec<PvpRanking> {
        let mut rows: Vec<PvpRanking> = self
            .store
            .snapshot_states()
            .into_iter()
            .map(|s| s.player)
            .filter(|p| p.pvp_wins + p.pvp_losses > 0)
            .map(|p| {
                let fought = p.pvp_wins + p.pvp_losses;
                PvpRanking {
                    player: p.id,
                    username: p.username,
                    wins: p.pvp_wins,
                    losses: p.pvp_losses,
                    win_rate: f64::from(p.pvp_wins) / f64::from(fought) * 100.0,
                }
            })
            .collect();
        rows.sort_by(|a, b| b.wins.cmp(&a.wins).then(a.player.cmp(&b.player)));
        rows.truncate(limit);
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::GameConfig;
    use crate::tables::Identity;
    use std::sync::Arc;
    use tycoon_logic::entitlements::Entitlement;

    fn game() -> Game {
        let config = GameConfig {
            rng_seed: Some(3),
            ..GameConfig::default()
        };
        Game::new(config, Arc::new(ManualClock::at_unix(1_704_067_200)))
    }

    #[test]
    fn test_business_roi_lookup() {
        let game = game();
        let roi = game.business_roi("bank").unwrap();
        assert_eq!(roi.kind, BusinessKind::Bank);
        assert!(matches!(
            game.business_roi("mine"),
            Err(GameError::UnknownKind(_))
        ));
    }

    #[test]
    fn test_targets_filter_and_order() {
        let game = game();
        let me = game.get_or_create_player(Identity(1), "me").unwrap();
        let rich = game.get_or_create_player(Identity(2), "rich").unwrap();
        let poorer = game.get_or_create_player(Identity(3), "poorer").unwrap();
        let broke = game.get_or_create_player(Identity(4), "broke").unwrap();
        let veteran = game.get_or_create_player(Identity(5), "veteran").unwrap();

        game.credit_entitlement(rich.id, &Entitlement::Coins { amount: 9_000 })
            .unwrap();
        game.credit_entitlement(poorer.id, &Entitlement::Coins { amount: 4_000 })
            .unwrap();
        game.transact(broke.id, |txn| {
            txn.debit(500, crate::tables::EntryKind::Expense, "spent")
        })
        .unwrap();
        game.grant_experience(veteran.id, 100_000).unwrap();

        let targets = game.pvp_targets(me.id, 10).unwrap();
        let ids: Vec<PlayerId> = targets.iter().map(|t| t.player).collect();
        assert_eq!(ids, vec![rich.id, poorer.id]);
        assert_eq!(game.pvp_targets(me.id, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_wealth_distribution_counts_everyone() {
        let game = game();
        for i in 1..=4 {
            game.get_or_create_player(Identity(i), "p").unwrap();
        }
        let dist = game.wealth_distribution();
        assert_eq!(dist.players, 4);
        assert_eq!(dist.total, 4_000);
        assert_eq!(dist.median, 1_000);
    }
}
