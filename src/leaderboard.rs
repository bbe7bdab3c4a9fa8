use std::{future::Future, sync::Arc, time::Duration};

use serde::Serialize;

use crate::{
    app::{ArcMatchRepository, ArcPlayerRepository, ServiceError, ServiceResult},
    player::Player,
    ranking::{RankedPlayer, rank_players},
};

/// How long a fetched player list is served before the next read hits
/// the database again.
pub const PLAYER_CACHE_TTL: Duration = Duration::from_secs(30);

pub const READ_RETRY_ATTEMPTS: u32 = 3;
pub const READ_RETRY_BASE_DELAY_MS: u64 = 100;

/// Runs a read operation, retrying transient database failures with
/// exponential backoff. Exhausting the attempts maps to `Unavailable`;
/// any non-database error is returned as-is on the first occurrence.
/// Writes must never go through here.
pub async fn with_read_retry<T, F, Fut>(what: &str, op: F) -> ServiceResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = ServiceResult<T>>,
{
    let mut last_message = String::new();
    for attempt in 0..READ_RETRY_ATTEMPTS {
        match op().await {
            Ok(value) => return Ok(value),
            Err(ServiceError::Database(message)) => {
                log::warn!(
                    "Read of {} failed (attempt {}/{}): {}",
                    what,
                    attempt + 1,
                    READ_RETRY_ATTEMPTS,
                    message
                );
                last_message = message;
                if attempt + 1 < READ_RETRY_ATTEMPTS {
                    tokio::time::sleep(Duration::from_millis(READ_RETRY_BASE_DELAY_MS << attempt))
                        .await;
                }
            }
            Err(other) => return Err(other),
        }
    }
    Err(ServiceError::Unavailable(format!(
        "read of {} failed after {} attempts: {}",
        what, READ_RETRY_ATTEMPTS, last_message
    )))
}

#[derive(Clone, Debug, Serialize)]
pub struct LeaderboardSummary {
    pub total_matches: u64,
    /// Mean of per-player average ratings over active players; 0 when
    /// nobody has played yet.
    pub average_rating: f64,
    /// Players with at least one recorded match.
    pub active_players: usize,
}

#[async_trait::async_trait]
pub trait LeaderboardService {
    async fn get_players(&self, force_refresh: bool) -> ServiceResult<Arc<Vec<Player>>>;
    async fn get_rankings(&self, force_refresh: bool) -> ServiceResult<Vec<RankedPlayer>>;
    async fn get_summary(&self) -> ServiceResult<LeaderboardSummary>;
    fn invalidate_cache(&self);
}

pub struct LeaderboardServiceImpl {
    player_repository: ArcPlayerRepository,
    match_repository: ArcMatchRepository,
    cache: moka::sync::Cache<(), Arc<Vec<Player>>>,
}

impl LeaderboardServiceImpl {
    pub fn new(player_repository: ArcPlayerRepository, match_repository: ArcMatchRepository) -> Self {
        Self {
            player_repository,
            match_repository,
            cache: moka::sync::Cache::builder()
                .max_capacity(1)
                .time_to_live(PLAYER_CACHE_TTL)
                .build(),
        }
    }
}

#[async_trait::async_trait]
impl LeaderboardService for LeaderboardServiceImpl {
    async fn get_players(&self, force_refresh: bool) -> ServiceResult<Arc<Vec<Player>>> {
        if !force_refresh {
            if let Some(players) = self.cache.get(&()) {
                return Ok(players);
            }
        }
        let players =
            Arc::new(with_read_retry("players", || self.player_repository.get_players()).await?);
        self.cache.insert((), players.clone());
        Ok(players)
    }

    async fn get_rankings(&self, force_refresh: bool) -> ServiceResult<Vec<RankedPlayer>> {
        let players = self.get_players(force_refresh).await?;
        Ok(rank_players(players.as_ref().clone()))
    }

    async fn get_summary(&self) -> ServiceResult<LeaderboardSummary> {
        let players = self.get_players(false).await?;
        let total_matches =
            with_read_retry("match count", || self.match_repository.count_matches()).await?;
        let active: Vec<&Player> = players.iter().filter(|p| p.total_matches > 0).collect();
        let average_rating = if active.is_empty() {
            0.0
        } else {
            active.iter().map(|p| p.average_rating).sum::<f64>() / active.len() as f64
        };
        Ok(LeaderboardSummary {
            total_matches,
            average_rating,
            active_players: active.len(),
        })
    }

    fn invalidate_cache(&self) {
        self.cache.invalidate(&());
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use crate::persistence::{matches::MockMatchRepository, players::MockPlayerRepository};

    use super::*;

    fn service_with_mocks() -> (LeaderboardServiceImpl, Arc<MockPlayerRepository>) {
        let players = Arc::new(MockPlayerRepository::new());
        let matches = Arc::new(MockMatchRepository::new());
        let service = LeaderboardServiceImpl::new(players.clone(), matches);
        (service, players)
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failure() {
        let (service, players) = service_with_mocks();
        players.insert_player(Player::new(Uuid::new_v4(), "Ahri", ""));
        players.fail_next_reads(1);

        let result = service.get_players(true).await.unwrap();
        assert_eq!(result.len(), 1);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_maps_to_unavailable() {
        let (service, players) = service_with_mocks();
        players.fail_next_reads(READ_RETRY_ATTEMPTS);

        let error = service.get_players(true).await.unwrap_err();
        assert!(matches!(error, ServiceError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_cache_serves_until_invalidated() {
        let (service, players) = service_with_mocks();
        players.insert_player(Player::new(Uuid::new_v4(), "Ahri", ""));

        assert_eq!(service.get_players(false).await.unwrap().len(), 1);
        players.insert_player(Player::new(Uuid::new_v4(), "Garen", ""));

        // The cached list is still served.
        assert_eq!(service.get_players(false).await.unwrap().len(), 1);
        // Force refresh bypasses it.
        assert_eq!(service.get_players(true).await.unwrap().len(), 2);

        players.insert_player(Player::new(Uuid::new_v4(), "Lux", ""));
        service.invalidate_cache();
        assert_eq!(service.get_players(false).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_summary_counts_active_players_only() {
        let (service, players) = service_with_mocks();
        let mut veteran = Player::new(Uuid::new_v4(), "veteran", "");
        veteran.apply_contribution(
            &crate::player::MatchContribution {
                rating: 8.0,
                kills: 4,
                deaths: 2,
                assists: 6,
            },
            chrono::Utc::now(),
        );
        players.insert_player(veteran);
        players.insert_player(Player::new(Uuid::new_v4(), "fresh", ""));

        let summary = service.get_summary().await.unwrap();
        assert_eq!(summary.active_players, 1);
        assert!((summary.average_rating - 8.0).abs() < 1e-9);
    }
}
