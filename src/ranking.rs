use serde::Serialize;

use crate::player::Player;

/// Number of "virtual matches" at the global mean blended into every
/// player's score. Pulls low-sample players toward the global average so
/// a single lucky match cannot top the board.
pub const BAYESIAN_WEIGHT: f64 = 5.0;

/// Global average used when no player has recorded a match yet.
pub const DEFAULT_GLOBAL_AVERAGE: f64 = 5.0;

#[derive(Clone, Debug, Serialize)]
pub struct RankedPlayer {
    pub rank: usize,
    /// Smoothed score; `None` for players with no recorded matches.
    pub bayesian_rating: Option<f64>,
    #[serde(flatten)]
    pub player: Player,
}

pub fn bayesian_average(average_rating: f64, total_matches: u32, global_average: f64) -> f64 {
    (global_average * BAYESIAN_WEIGHT + average_rating * total_matches as f64)
        / (BAYESIAN_WEIGHT + total_matches as f64)
}

/// Mean of `average_rating` over players with at least one match.
pub fn global_average(players: &[Player]) -> f64 {
    let with_matches: Vec<&Player> = players.iter().filter(|p| p.total_matches > 0).collect();
    if with_matches.is_empty() {
        return DEFAULT_GLOBAL_AVERAGE;
    }
    with_matches.iter().map(|p| p.average_rating).sum::<f64>() / with_matches.len() as f64
}

/// Produces the leaderboard ordering: players with matches sorted by
/// smoothed score descending (ties broken by match count descending),
/// followed by zero-match players in their incoming order. Rank is the
/// 1-based position in the final sequence.
pub fn rank_players(players: Vec<Player>) -> Vec<RankedPlayer> {
    let global = global_average(&players);

    let (with_matches, without_matches): (Vec<Player>, Vec<Player>) =
        players.into_iter().partition(|p| p.total_matches > 0);

    let mut scored: Vec<(f64, Player)> = with_matches
        .into_iter()
        .map(|p| (bayesian_average(p.average_rating, p.total_matches, global), p))
        .collect();

    scored.sort_by(|(score_a, player_a), (score_b, player_b)| {
        score_b
            .partial_cmp(score_a)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(player_b.total_matches.cmp(&player_a.total_matches))
    });

    scored
        .into_iter()
        .map(|(score, player)| (Some(score), player))
        .chain(without_matches.into_iter().map(|p| (None, p)))
        .enumerate()
        .map(|(index, (bayesian_rating, player))| RankedPlayer {
            rank: index + 1,
            bayesian_rating,
            player,
        })
        .collect()
}
