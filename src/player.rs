use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

pub type PlayerId = Uuid;

/// A player's identity plus the denormalized running totals maintained by
/// match ingestion. `average_*` fields always equal the corresponding
/// total divided by `total_matches` (0 when no matches are recorded).
#[derive(Clone, Debug, Serialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub avatar: String,
    pub total_rating: f64,
    pub total_matches: u32,
    pub average_rating: f64,
    pub total_kills: u32,
    pub total_deaths: u32,
    pub total_assists: u32,
    pub average_kills: f64,
    pub average_deaths: f64,
    pub average_assists: f64,
    pub updated_at: DateTime<Utc>,
}

/// One match's contribution to a player's running totals.
#[derive(Clone, Copy, Debug)]
pub struct MatchContribution {
    pub rating: f64,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, avatar: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            avatar: avatar.into(),
            total_rating: 0.0,
            total_matches: 0,
            average_rating: 0.0,
            total_kills: 0,
            total_deaths: 0,
            total_assists: 0,
            average_kills: 0.0,
            average_deaths: 0.0,
            average_assists: 0.0,
            updated_at: Utc::now(),
        }
    }

    /// Mirrors the server-side increment statement used by the Postgres
    /// repository so both backends agree on the resulting totals.
    pub fn apply_contribution(&mut self, contribution: &MatchContribution, now: DateTime<Utc>) {
        self.total_matches += 1;
        self.total_rating += contribution.rating;
        self.total_kills += contribution.kills;
        self.total_deaths += contribution.deaths;
        self.total_assists += contribution.assists;

        let matches = self.total_matches as f64;
        self.average_rating = self.total_rating / matches;
        self.average_kills = self.total_kills as f64 / matches;
        self.average_deaths = self.total_deaths as f64 / matches;
        self.average_assists = self.total_assists as f64 / matches;
        self.updated_at = now;
    }

    pub fn zero_stats(&mut self, now: DateTime<Utc>) {
        self.total_rating = 0.0;
        self.total_matches = 0;
        self.average_rating = 0.0;
        self.total_kills = 0;
        self.total_deaths = 0;
        self.total_assists = 0;
        self.average_kills = 0.0;
        self.average_deaths = 0.0;
        self.average_assists = 0.0;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_contribution_updates_averages() {
        let mut player = Player::new(Uuid::new_v4(), "Yasuo", "");
        player.apply_contribution(
            &MatchContribution {
                rating: 8.0,
                kills: 10,
                deaths: 2,
                assists: 4,
            },
            Utc::now(),
        );
        player.apply_contribution(
            &MatchContribution {
                rating: 6.0,
                kills: 2,
                deaths: 6,
                assists: 8,
            },
            Utc::now(),
        );

        assert_eq!(player.total_matches, 2);
        assert!((player.average_rating - 7.0).abs() < 1e-9);
        assert!((player.average_kills - 6.0).abs() < 1e-9);
        assert!((player.average_deaths - 4.0).abs() < 1e-9);
        assert!((player.average_assists - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_stats_clears_everything() {
        let mut player = Player::new(Uuid::new_v4(), "Teemo", "");
        player.apply_contribution(
            &MatchContribution {
                rating: 9.5,
                kills: 12,
                deaths: 0,
                assists: 3,
            },
            Utc::now(),
        );
        player.zero_stats(Utc::now());

        assert_eq!(player.total_matches, 0);
        assert_eq!(player.total_rating, 0.0);
        assert_eq!(player.average_rating, 0.0);
        assert_eq!(player.total_kills, 0);
    }
}
