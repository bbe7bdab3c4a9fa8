use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    app::{ServiceError, ServiceResult},
    matches::{Lane, Match, MatchParticipant, ParticipantRecord},
    player::PlayerId,
};

#[async_trait]
pub trait MatchRepository {
    /// Persists a match and all of its participant rows in one
    /// transaction; either everything lands or nothing does.
    async fn create_match_with_participants(
        &self,
        game: &Match,
        participants: &[MatchParticipant],
    ) -> ServiceResult<()>;
    /// All participant rows joined with player identity and match date,
    /// ordered by row creation time ascending.
    async fn get_participant_records(&self) -> ServiceResult<Vec<ParticipantRecord>>;
    async fn count_matches(&self) -> ServiceResult<u64>;
    async fn delete_all_participants(&self) -> ServiceResult<()>;
    async fn delete_all_matches(&self) -> ServiceResult<()>;
}

pub struct MatchRepositoryImpl {
    pool: PgPool,
}

impl MatchRepositoryImpl {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn record_from_row(row: &PgRow) -> ServiceResult<ParticipantRecord> {
        let lane_tag: String = row.try_get("lane")?;
        let lane = Lane::from_str(&lane_tag).map_err(ServiceError::Internal)?;
        Ok(ParticipantRecord {
            match_id: row.try_get("match_id")?,
            player_id: row.try_get("player_id")?,
            player_name: row.try_get("player_name")?,
            player_avatar: row.try_get("player_avatar")?,
            rating: row.try_get("rating")?,
            kills: row.try_get::<i32, _>("kills")? as u32,
            deaths: row.try_get::<i32, _>("deaths")? as u32,
            assists: row.try_get::<i32, _>("assists")? as u32,
            lane,
            match_date: row.try_get("match_date")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl MatchRepository for MatchRepositoryImpl {
    async fn create_match_with_participants(
        &self,
        game: &Match,
        participants: &[MatchParticipant],
    ) -> ServiceResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO matches (id, match_date) VALUES ($1, $2)")
            .bind(game.id)
            .bind(game.match_date)
            .execute(&mut *tx)
            .await?;
        for participant in participants {
            sqlx::query(
                "INSERT INTO match_participants \
                    (id, match_id, player_id, rating, kills, deaths, assists, lane, created_at) \
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(participant.id)
            .bind(participant.match_id)
            .bind(participant.player_id)
            .bind(participant.rating)
            .bind(participant.kills as i32)
            .bind(participant.deaths as i32)
            .bind(participant.assists as i32)
            .bind(participant.lane.as_str())
            .bind(participant.created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_participant_records(&self) -> ServiceResult<Vec<ParticipantRecord>> {
        let rows = sqlx::query(
            "SELECT mp.match_id, mp.player_id, p.name AS player_name, \
                    p.avatar AS player_avatar, mp.rating, mp.kills, mp.deaths, \
                    mp.assists, mp.lane, m.match_date, mp.created_at \
            FROM match_participants mp \
            JOIN players p ON p.id = mp.player_id \
            JOIN matches m ON m.id = mp.match_id \
            ORDER BY mp.created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::record_from_row).collect()
    }

    async fn count_matches(&self) -> ServiceResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM matches")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn delete_all_participants(&self) -> ServiceResult<()> {
        sqlx::query("DELETE FROM match_participants")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_all_matches(&self) -> ServiceResult<()> {
        sqlx::query("DELETE FROM matches")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

pub struct MockMatchRepository {
    matches: std::sync::Mutex<Vec<Match>>,
    participants: std::sync::Mutex<Vec<MatchParticipant>>,
    /// Player id to (name, avatar), standing in for the join against the
    /// players table.
    directory: dashmap::DashMap<PlayerId, (String, String)>,
}

impl MockMatchRepository {
    pub fn new() -> Self {
        Self {
            matches: std::sync::Mutex::new(Vec::new()),
            participants: std::sync::Mutex::new(Vec::new()),
            directory: dashmap::DashMap::new(),
        }
    }

    pub fn register_player(&self, id: PlayerId, name: &str, avatar: &str) {
        self.directory
            .insert(id, (name.to_string(), avatar.to_string()));
    }
}

#[async_trait]
impl MatchRepository for MockMatchRepository {
    async fn create_match_with_participants(
        &self,
        game: &Match,
        participants: &[MatchParticipant],
    ) -> ServiceResult<()> {
        self.matches.lock().unwrap().push(game.clone());
        self.participants
            .lock()
            .unwrap()
            .extend(participants.iter().cloned());
        Ok(())
    }

    async fn get_participant_records(&self) -> ServiceResult<Vec<ParticipantRecord>> {
        let matches = self.matches.lock().unwrap();
        let participants = self.participants.lock().unwrap();
        let mut records: Vec<ParticipantRecord> = participants
            .iter()
            .map(|participant| {
                let match_date = matches
                    .iter()
                    .find(|m| m.id == participant.match_id)
                    .map(|m| m.match_date)
                    .unwrap_or(participant.created_at);
                let (name, avatar) = self
                    .directory
                    .get(&participant.player_id)
                    .map(|e| e.value().clone())
                    .unwrap_or_else(|| ("Unknown".to_string(), String::new()));
                ParticipantRecord {
                    match_id: participant.match_id,
                    player_id: participant.player_id,
                    player_name: name,
                    player_avatar: avatar,
                    rating: participant.rating,
                    kills: participant.kills,
                    deaths: participant.deaths,
                    assists: participant.assists,
                    lane: participant.lane,
                    match_date,
                    created_at: participant.created_at,
                }
            })
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }

    async fn count_matches(&self) -> ServiceResult<u64> {
        Ok(self.matches.lock().unwrap().len() as u64)
    }

    async fn delete_all_participants(&self) -> ServiceResult<()> {
        self.participants.lock().unwrap().clear();
        Ok(())
    }

    async fn delete_all_matches(&self) -> ServiceResult<()> {
        self.matches.lock().unwrap().clear();
        Ok(())
    }
}
