use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    app::{ServiceError, ServiceResult},
    player::{MatchContribution, Player, PlayerId},
};

#[async_trait]
pub trait PlayerRepository {
    async fn get_players(&self) -> ServiceResult<Vec<Player>>;
    async fn get_player_by_id(&self, id: PlayerId) -> ServiceResult<Player>;
    /// Folds one match result into the player's running totals. Must be
    /// atomic with respect to concurrent submissions for the same player.
    async fn apply_match_result(
        &self,
        id: PlayerId,
        contribution: &MatchContribution,
    ) -> ServiceResult<()>;
    async fn reset_all_stats(&self) -> ServiceResult<()>;
}

pub struct PlayerRepositoryImpl {
    pool: PgPool,
}

impl PlayerRepositoryImpl {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn player_from_row(row: &PgRow) -> Result<Player, sqlx::Error> {
        Ok(Player {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            avatar: row.try_get("avatar")?,
            total_rating: row.try_get("total_rating")?,
            total_matches: row.try_get::<i32, _>("total_matches")? as u32,
            average_rating: row.try_get("average_rating")?,
            total_kills: row.try_get::<i32, _>("total_kills")? as u32,
            total_deaths: row.try_get::<i32, _>("total_deaths")? as u32,
            total_assists: row.try_get::<i32, _>("total_assists")? as u32,
            average_kills: row.try_get("average_kills")?,
            average_deaths: row.try_get("average_deaths")?,
            average_assists: row.try_get("average_assists")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl PlayerRepository for PlayerRepositoryImpl {
    async fn get_players(&self) -> ServiceResult<Vec<Player>> {
        let rows = sqlx::query("SELECT * FROM players ORDER BY average_rating DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| Self::player_from_row(row).map_err(ServiceError::from))
            .collect()
    }

    async fn get_player_by_id(&self, id: PlayerId) -> ServiceResult<Player> {
        let row = sqlx::query("SELECT * FROM players WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Self::player_from_row(&row)?),
            None => ServiceError::not_found(format!("no player with id {}", id)),
        }
    }

    async fn apply_match_result(
        &self,
        id: PlayerId,
        contribution: &MatchContribution,
    ) -> ServiceResult<()> {
        // Every right-hand side reads the pre-update row, so the averages
        // are computed from the same snapshot the totals are. A single
        // statement keeps concurrent submissions from losing increments.
        let result = sqlx::query(
            "UPDATE players SET \
                total_matches = total_matches + 1, \
                total_rating = total_rating + $2, \
                total_kills = total_kills + $3, \
                total_deaths = total_deaths + $4, \
                total_assists = total_assists + $5, \
                average_rating = (total_rating + $2) / (total_matches + 1), \
                average_kills = (total_kills + $3)::double precision / (total_matches + 1), \
                average_deaths = (total_deaths + $4)::double precision / (total_matches + 1), \
                average_assists = (total_assists + $5)::double precision / (total_matches + 1), \
                updated_at = now() \
            WHERE id = $1",
        )
        .bind(id)
        .bind(contribution.rating)
        .bind(contribution.kills as i32)
        .bind(contribution.deaths as i32)
        .bind(contribution.assists as i32)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound(format!("no player with id {}", id)));
        }
        Ok(())
    }

    async fn reset_all_stats(&self) -> ServiceResult<()> {
        sqlx::query(
            "UPDATE players SET \
                total_rating = 0, total_matches = 0, average_rating = 0, \
                total_kills = 0, total_deaths = 0, total_assists = 0, \
                average_kills = 0, average_deaths = 0, average_assists = 0, \
                updated_at = now()",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

pub struct MockPlayerRepository {
    players: dashmap::DashMap<PlayerId, Player>,
    fail_reads: std::sync::atomic::AtomicU32,
}

impl MockPlayerRepository {
    pub fn new() -> Self {
        Self {
            players: dashmap::DashMap::new(),
            fail_reads: std::sync::atomic::AtomicU32::new(0),
        }
    }

    pub fn insert_player(&self, player: Player) {
        self.players.insert(player.id, player);
    }

    /// Makes the next `count` read calls fail with a database error.
    pub fn fail_next_reads(&self, count: u32) {
        self.fail_reads
            .store(count, std::sync::atomic::Ordering::SeqCst);
    }

    fn check_read_failure(&self) -> ServiceResult<()> {
        let remaining = self.fail_reads.load(std::sync::atomic::Ordering::SeqCst);
        if remaining > 0 {
            self.fail_reads
                .store(remaining - 1, std::sync::atomic::Ordering::SeqCst);
            return Err(ServiceError::Database("simulated outage".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PlayerRepository for MockPlayerRepository {
    async fn get_players(&self) -> ServiceResult<Vec<Player>> {
        self.check_read_failure()?;
        let mut players: Vec<Player> = self.players.iter().map(|e| e.value().clone()).collect();
        players.sort_by(|a, b| {
            b.average_rating
                .partial_cmp(&a.average_rating)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(players)
    }

    async fn get_player_by_id(&self, id: PlayerId) -> ServiceResult<Player> {
        self.check_read_failure()?;
        self.players
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or_else(|| ServiceError::NotFound(format!("no player with id {}", id)))
    }

    async fn apply_match_result(
        &self,
        id: PlayerId,
        contribution: &MatchContribution,
    ) -> ServiceResult<()> {
        let mut entry = self
            .players
            .get_mut(&id)
            .ok_or_else(|| ServiceError::NotFound(format!("no player with id {}", id)))?;
        entry.apply_contribution(contribution, chrono::Utc::now());
        Ok(())
    }

    async fn reset_all_stats(&self) -> ServiceResult<()> {
        for mut entry in self.players.iter_mut() {
            entry.zero_stats(chrono::Utc::now());
        }
        Ok(())
    }
}
