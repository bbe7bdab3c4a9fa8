use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    app::{
        ArcLeaderboardService, ArcMatchRepository, ArcPlayerRepository, ArcSnapshotRepository,
        ServiceResult,
    },
    leaderboard::with_read_retry,
    player::PlayerId,
};

/// A reset only takes a snapshot when at least this many players have
/// recorded a match; fewer would enshrine a meaningless podium.
pub const MIN_SNAPSHOT_PLAYERS: usize = 3;

#[derive(Clone, Debug, Serialize)]
pub struct SnapshotEntry {
    pub player_id: PlayerId,
    pub player_name: String,
    pub player_avatar: String,
    pub score: f64,
}

/// The frozen podium of one Sunday-to-Saturday week. At most one exists
/// per week; a repeated reset within the same week replaces it.
#[derive(Clone, Debug, Serialize)]
pub struct WeeklyTop3 {
    pub id: Uuid,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub top: [SnapshotEntry; 3],
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct WeeklyHonors {
    pub top1_count: u32,
    pub top2_count: u32,
    pub top3_count: u32,
}

/// The Sunday-to-Saturday week containing `date`.
pub fn week_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = date - Days::new(date.weekday().num_days_from_sunday() as u64);
    (start, start + Days::new(6))
}

/// How often a player held each podium spot across the snapshot log.
pub fn weekly_honors(snapshots: &[WeeklyTop3], player_id: PlayerId) -> WeeklyHonors {
    let mut honors = WeeklyHonors::default();
    for snapshot in snapshots {
        if snapshot.top[0].player_id == player_id {
            honors.top1_count += 1;
        }
        if snapshot.top[1].player_id == player_id {
            honors.top2_count += 1;
        }
        if snapshot.top[2].player_id == player_id {
            honors.top3_count += 1;
        }
    }
    honors
}

#[derive(Clone, Debug, Serialize)]
pub struct ResetOutcome {
    pub snapshot_taken: bool,
}

#[async_trait::async_trait]
pub trait ResetService {
    /// Freezes the current top 3 (when enough players are active), then
    /// wipes all matches, participants, and player stats.
    async fn reset_leaderboard(&self) -> ServiceResult<ResetOutcome>;
    async fn get_weekly_history(&self) -> ServiceResult<Vec<WeeklyTop3>>;
}

pub struct ResetServiceImpl {
    leaderboard_service: ArcLeaderboardService,
    player_repository: ArcPlayerRepository,
    match_repository: ArcMatchRepository,
    snapshot_repository: ArcSnapshotRepository,
}

impl ResetServiceImpl {
    pub fn new(
        leaderboard_service: ArcLeaderboardService,
        player_repository: ArcPlayerRepository,
        match_repository: ArcMatchRepository,
        snapshot_repository: ArcSnapshotRepository,
    ) -> Self {
        Self {
            leaderboard_service,
            player_repository,
            match_repository,
            snapshot_repository,
        }
    }
}

#[async_trait::async_trait]
impl ResetService for ResetServiceImpl {
    async fn reset_leaderboard(&self) -> ServiceResult<ResetOutcome> {
        let rankings = self.leaderboard_service.get_rankings(true).await?;
        let active: Vec<_> = rankings
            .into_iter()
            .filter(|r| r.player.total_matches > 0)
            .collect();

        let snapshot_taken = if active.len() >= MIN_SNAPSHOT_PLAYERS {
            let now = Utc::now();
            let (week_start, week_end) = week_bounds(now.date_naive());
            let top = [0usize, 1, 2].map(|i| {
                let ranked = &active[i];
                SnapshotEntry {
                    player_id: ranked.player.id,
                    player_name: ranked.player.name.clone(),
                    player_avatar: ranked.player.avatar.clone(),
                    score: ranked.bayesian_rating.unwrap_or(ranked.player.average_rating),
                }
            });
            self.snapshot_repository
                .upsert_snapshot(&WeeklyTop3 {
                    id: Uuid::new_v4(),
                    week_start,
                    week_end,
                    top,
                    created_at: now,
                })
                .await?;
            log::info!("Captured weekly top 3 for week starting {}", week_start);
            true
        } else {
            log::info!(
                "Skipping weekly snapshot: only {} active players",
                active.len()
            );
            false
        };

        // Participants reference matches, so they go first. No retry on
        // any of these: a failed write surfaces immediately.
        self.match_repository.delete_all_participants().await?;
        self.match_repository.delete_all_matches().await?;
        self.player_repository.reset_all_stats().await?;
        self.leaderboard_service.invalidate_cache();
        log::info!("Leaderboard reset complete");

        Ok(ResetOutcome { snapshot_taken })
    }

    async fn get_weekly_history(&self) -> ServiceResult<Vec<WeeklyTop3>> {
        with_read_retry("weekly snapshots", || self.snapshot_repository.get_snapshots()).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        leaderboard::{LeaderboardService, LeaderboardServiceImpl},
        persistence::{
            matches::{MatchRepository, MockMatchRepository},
            players::{MockPlayerRepository, PlayerRepository},
            snapshots::{MockSnapshotRepository, SnapshotRepository},
        },
        player::{MatchContribution, Player},
    };

    use super::*;

    fn entry(player_id: PlayerId, score: f64) -> SnapshotEntry {
        SnapshotEntry {
            player_id,
            player_name: String::new(),
            player_avatar: String::new(),
            score,
        }
    }

    fn snapshot(week_start: NaiveDate, top: [SnapshotEntry; 3]) -> WeeklyTop3 {
        WeeklyTop3 {
            id: Uuid::new_v4(),
            week_start,
            week_end: week_start + Days::new(6),
            top,
            created_at: Utc::now(),
        }
    }

    fn build_service() -> (
        ResetServiceImpl,
        Arc<MockPlayerRepository>,
        Arc<MockMatchRepository>,
        Arc<MockSnapshotRepository>,
    ) {
        let players = Arc::new(MockPlayerRepository::new());
        let matches = Arc::new(MockMatchRepository::new());
        let snapshots = Arc::new(MockSnapshotRepository::new());
        let leaderboard = Arc::new(LeaderboardServiceImpl::new(
            players.clone(),
            matches.clone(),
        ));
        let service = ResetServiceImpl::new(
            leaderboard,
            players.clone(),
            matches.clone(),
            snapshots.clone(),
        );
        (service, players, matches, snapshots)
    }

    fn active_player(name: &str, rating: f64) -> Player {
        let mut player = Player::new(Uuid::new_v4(), name, "");
        player.apply_contribution(
            &MatchContribution {
                rating,
                kills: 3,
                deaths: 3,
                assists: 3,
            },
            Utc::now(),
        );
        player
    }

    #[test]
    fn test_week_bounds_are_sunday_to_saturday() {
        // 2025-06-18 is a Wednesday.
        let (start, end) = week_bounds(NaiveDate::from_ymd_opt(2025, 6, 18).unwrap());
        assert_eq!(start, NaiveDate::from_ymd_opt(2025, 6, 15).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2025, 6, 21).unwrap());

        // A Sunday starts its own week.
        let sunday = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        assert_eq!(week_bounds(sunday).0, sunday);
    }

    #[test]
    fn test_weekly_honors_counts_positions() {
        let hero = Uuid::new_v4();
        let other = Uuid::new_v4();
        let week = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let snapshots = vec![
            snapshot(week, [entry(hero, 9.0), entry(other, 8.0), entry(other, 7.0)]),
            snapshot(
                week + Days::new(7),
                [entry(other, 9.0), entry(hero, 8.0), entry(other, 7.0)],
            ),
            snapshot(
                week + Days::new(14),
                [entry(hero, 9.0), entry(other, 8.0), entry(other, 7.0)],
            ),
        ];

        let honors = weekly_honors(&snapshots, hero);
        assert_eq!(honors.top1_count, 2);
        assert_eq!(honors.top2_count, 1);
        assert_eq!(honors.top3_count, 0);
        assert_eq!(weekly_honors(&snapshots, Uuid::new_v4()).top1_count, 0);
    }

    #[tokio::test]
    async fn test_reset_with_too_few_players_skips_snapshot() {
        let (service, players, matches, snapshots) = build_service();
        players.insert_player(active_player("a", 8.0));
        players.insert_player(active_player("b", 6.0));
        matches
            .create_match_with_participants(
                &crate::matches::Match {
                    id: Uuid::new_v4(),
                    match_date: Utc::now(),
                },
                &[],
            )
            .await
            .unwrap();

        let outcome = service.reset_leaderboard().await.unwrap();
        assert!(!outcome.snapshot_taken);
        assert!(snapshots.get_snapshots().await.unwrap().is_empty());
        // The wipe still happens.
        assert_eq!(matches.count_matches().await.unwrap(), 0);
        let remaining = players.get_players().await.unwrap();
        assert!(remaining.iter().all(|p| p.total_matches == 0));
    }

    #[tokio::test]
    async fn test_reset_snapshots_top_three_in_order() {
        let (service, players, _, _) = build_service();
        players.insert_player(active_player("bronze", 5.0));
        players.insert_player(active_player("gold", 9.0));
        players.insert_player(active_player("silver", 7.0));
        players.insert_player(Player::new(Uuid::new_v4(), "fresh", ""));

        let outcome = service.reset_leaderboard().await.unwrap();
        assert!(outcome.snapshot_taken);

        let history = service.get_weekly_history().await.unwrap();
        assert_eq!(history.len(), 1);
        let top = &history[0].top;
        assert_eq!(top[0].player_name, "gold");
        assert_eq!(top[1].player_name, "silver");
        assert_eq!(top[2].player_name, "bronze");
        assert!(top[0].score > top[1].score && top[1].score > top[2].score);

        let (week_start, week_end) = week_bounds(Utc::now().date_naive());
        assert_eq!(history[0].week_start, week_start);
        assert_eq!(history[0].week_end, week_end);
    }

    #[tokio::test]
    async fn test_second_reset_in_same_week_replaces_snapshot() {
        let (service, players, _, _) = build_service();
        for (name, rating) in [("a", 9.0), ("b", 7.0), ("c", 5.0)] {
            players.insert_player(active_player(name, rating));
        }
        service.reset_leaderboard().await.unwrap();

        // A second round of matches inside the same week, then another
        // reset: still one snapshot row for the week.
        for player in players.get_players().await.unwrap() {
            players
                .apply_match_result(
                    player.id,
                    &MatchContribution {
                        rating: 6.0,
                        kills: 1,
                        deaths: 1,
                        assists: 1,
                    },
                )
                .await
                .unwrap();
        }
        service.reset_leaderboard().await.unwrap();

        assert_eq!(service.get_weekly_history().await.unwrap().len(), 1);
    }
}
