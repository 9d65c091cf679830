//! Cached leaderboards, rebuilt on a schedule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::game::Game;
use crate::tables::{Player, PlayerId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    /// 1-based.
    pub rank: usize,
    pub player: PlayerId,
    pub username: String,
    pub value: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leaderboard {
    pub by_coins: Vec<LeaderboardRow>,
    pub by_level: Vec<LeaderboardRow>,
    pub by_pvp_wins: Vec<LeaderboardRow>,
    /// `None` until the first refresh.
    pub refreshed_at: Option<DateTime<Utc>>,
}

fn ranked(players: &[Player], size: usize, value: impl Fn(&Player) -> i64) -> Vec<LeaderboardRow> {
    let mut sorted: Vec<&Player> = players.iter().collect();
    // Ties by id so equal values keep a stable order.
    sorted.sort_by(|a, b| value(b).cmp(&value(a)).then(a.id.cmp(&b.id)));
    sorted
        .into_iter()
        .take(size)
        .enumerate()
        .map(|(i, p)| LeaderboardRow {
            rank: i + 1,
            player: p.id,
            username: p.username.clone(),
            value: value(p),
        })
        .collect()
}

impl Game {
    pub fn refresh_leaderboard(&self) -> Leaderboard {
        let players: Vec<Player> = self
            .store
            .snapshot_states()
            .into_iter()
            .map(|s| s.player)
            .collect();
        let size = self.config.leaderboard_size;
        let board = Leaderboard {
            by_coins: ranked(&players, size, |p| p.coins),
            by_level: ranked(&players, size, |p| i64::from(p.level)),
            by_pvp_wins: ranked(&players, size, |p| i64::from(p.pvp_wins)),
            refreshed_at: Some(self.now()),
        };
        *self.leaderboard.write() = board.clone();
        log::debug!("Leaderboard refreshed over {} players", players.len());
        board
    }
}
