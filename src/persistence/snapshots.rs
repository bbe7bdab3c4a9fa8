use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    app::ServiceResult,
    snapshot::{SnapshotEntry, WeeklyTop3},
};

#[async_trait]
pub trait SnapshotRepository {
    /// Inserts the snapshot, replacing an existing one for the same week.
    async fn upsert_snapshot(&self, snapshot: &WeeklyTop3) -> ServiceResult<()>;
    /// All snapshots, newest week first.
    async fn get_snapshots(&self) -> ServiceResult<Vec<WeeklyTop3>>;
}

pub struct SnapshotRepositoryImpl {
    pool: PgPool,
}

impl SnapshotRepositoryImpl {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn entry_from_row(row: &PgRow, prefix: &str) -> Result<SnapshotEntry, sqlx::Error> {
        Ok(SnapshotEntry {
            player_id: row.try_get(format!("{}_player_id", prefix).as_str())?,
            player_name: row.try_get(format!("{}_player_name", prefix).as_str())?,
            player_avatar: row.try_get(format!("{}_player_avatar", prefix).as_str())?,
            score: row.try_get(format!("{}_score", prefix).as_str())?,
        })
    }

    fn snapshot_from_row(row: &PgRow) -> Result<WeeklyTop3, sqlx::Error> {
        Ok(WeeklyTop3 {
            id: row.try_get("id")?,
            week_start: row.try_get("week_start_date")?,
            week_end: row.try_get("week_end_date")?,
            top: [
                Self::entry_from_row(row, "top1")?,
                Self::entry_from_row(row, "top2")?,
                Self::entry_from_row(row, "top3")?,
            ],
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl SnapshotRepository for SnapshotRepositoryImpl {
    async fn upsert_snapshot(&self, snapshot: &WeeklyTop3) -> ServiceResult<()> {
        sqlx::query(
            "INSERT INTO weekly_top3 \
                (id, week_start_date, week_end_date, \
                 top1_player_id, top1_player_name, top1_player_avatar, top1_score, \
                 top2_player_id, top2_player_name, top2_player_avatar, top2_score, \
                 top3_player_id, top3_player_name, top3_player_avatar, top3_score, \
                 created_at) \
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
            ON CONFLICT (week_start_date) DO UPDATE SET \
                week_end_date = EXCLUDED.week_end_date, \
                top1_player_id = EXCLUDED.top1_player_id, \
                top1_player_name = EXCLUDED.top1_player_name, \
                top1_player_avatar = EXCLUDED.top1_player_avatar, \
                top1_score = EXCLUDED.top1_score, \
                top2_player_id = EXCLUDED.top2_player_id, \
                top2_player_name = EXCLUDED.top2_player_name, \
                top2_player_avatar = EXCLUDED.top2_player_avatar, \
                top2_score = EXCLUDED.top2_score, \
                top3_player_id = EXCLUDED.top3_player_id, \
                top3_player_name = EXCLUDED.top3_player_name, \
                top3_player_avatar = EXCLUDED.top3_player_avatar, \
                top3_score = EXCLUDED.top3_score, \
                created_at = EXCLUDED.created_at",
        )
        .bind(snapshot.id)
        .bind(snapshot.week_start)
        .bind(snapshot.week_end)
        .bind(snapshot.top[0].player_id)
        .bind(&snapshot.top[0].player_name)
        .bind(&snapshot.top[0].player_avatar)
        .bind(snapshot.top[0].score)
        .bind(snapshot.top[1].player_id)
        .bind(&snapshot.top[1].player_name)
        .bind(&snapshot.top[1].player_avatar)
        .bind(snapshot.top[1].score)
        .bind(snapshot.top[2].player_id)
        .bind(&snapshot.top[2].player_name)
        .bind(&snapshot.top[2].player_avatar)
        .bind(snapshot.top[2].score)
        .bind(snapshot.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_snapshots(&self) -> ServiceResult<Vec<WeeklyTop3>> {
        let rows = sqlx::query("SELECT * FROM weekly_top3 ORDER BY week_start_date DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| Self::snapshot_from_row(row).map_err(crate::app::ServiceError::from))
            .collect()
    }
}

pub struct MockSnapshotRepository {
    snapshots: dashmap::DashMap<chrono::NaiveDate, WeeklyTop3>,
}

impl MockSnapshotRepository {
    pub fn new() -> Self {
        Self {
            snapshots: dashmap::DashMap::new(),
        }
    }
}

#[async_trait]
impl SnapshotRepository for MockSnapshotRepository {
    async fn upsert_snapshot(&self, snapshot: &WeeklyTop3) -> ServiceResult<()> {
        self.snapshots.insert(snapshot.week_start, snapshot.clone());
        Ok(())
    }

    async fn get_snapshots(&self) -> ServiceResult<Vec<WeeklyTop3>> {
        let mut snapshots: Vec<WeeklyTop3> =
            self.snapshots.iter().map(|e| e.value().clone()).collect();
        snapshots.sort_by(|a, b| b.week_start.cmp(&a.week_start));
        Ok(snapshots)
    }
}
