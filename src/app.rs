use std::sync::Arc;

use axum::response::IntoResponse;
use thiserror::Error;

use crate::{
    analytics::{AnalyticsService, AnalyticsServiceImpl},
    awards::{AwardService, AwardServiceImpl},
    ingest::{MatchService, MatchServiceImpl},
    leaderboard::{LeaderboardService, LeaderboardServiceImpl},
    persistence::{
        create_db_pool,
        matches::{MatchRepository, MatchRepositoryImpl},
        players::{PlayerRepository, PlayerRepositoryImpl},
        snapshots::{SnapshotRepository, SnapshotRepositoryImpl},
    },
    snapshot::{ResetService, ResetServiceImpl},
};

pub type ArcLeaderboardService = Arc<dyn LeaderboardService + Send + Sync + 'static>;
pub type ArcMatchService = Arc<dyn MatchService + Send + Sync + 'static>;
pub type ArcAwardService = Arc<dyn AwardService + Send + Sync + 'static>;
pub type ArcAnalyticsService = Arc<dyn AnalyticsService + Send + Sync + 'static>;
pub type ArcResetService = Arc<dyn ResetService + Send + Sync + 'static>;

pub type ArcPlayerRepository = Arc<dyn PlayerRepository + Send + Sync + 'static>;
pub type ArcMatchRepository = Arc<dyn MatchRepository + Send + Sync + 'static>;
pub type ArcSnapshotRepository = Arc<dyn SnapshotRepository + Send + Sync + 'static>;

#[derive(Clone)]
pub struct AppState {
    pub leaderboard_service: ArcLeaderboardService,
    pub match_service: ArcMatchService,
    pub award_service: ArcAwardService,
    pub analytics_service: ArcAnalyticsService,
    pub reset_service: ArcResetService,

    pub reset_secret: String,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("temporarily unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn not_found<T, R>(msg: T) -> ServiceResult<R>
    where
        T: Into<String>,
    {
        Err(ServiceError::NotFound(msg.into()))
    }

    pub fn unauthorized<T, R>(msg: T) -> ServiceResult<R>
    where
        T: Into<String>,
    {
        Err(ServiceError::Unauthorized(msg.into()))
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(error: sqlx::Error) -> Self {
        ServiceError::Database(error.to_string())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::http::Response<axum::body::Body> {
        let (status, body) = match self {
            ServiceError::Validation(violations) => (
                axum::http::StatusCode::BAD_REQUEST,
                serde_json::json!({ "errors": violations }),
            ),
            ServiceError::NotFound(msg) => (
                axum::http::StatusCode::NOT_FOUND,
                serde_json::json!({ "error": msg }),
            ),
            ServiceError::Unauthorized(msg) => (
                axum::http::StatusCode::UNAUTHORIZED,
                serde_json::json!({ "error": msg }),
            ),
            ServiceError::Database(msg) => (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": msg }),
            ),
            ServiceError::Unavailable(_) => (
                axum::http::StatusCode::SERVICE_UNAVAILABLE,
                serde_json::json!({ "error": "Service temporarily unavailable" }),
            ),
            ServiceError::Internal(msg) => (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": msg }),
            ),
        };
        (status, axum::Json(body)).into_response()
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

pub fn construct_app() -> AppState {
    let pool = create_db_pool();

    let player_repository: ArcPlayerRepository = Arc::new(PlayerRepositoryImpl::new(pool.clone()));
    let match_repository: ArcMatchRepository = Arc::new(MatchRepositoryImpl::new(pool.clone()));
    let snapshot_repository: ArcSnapshotRepository = Arc::new(SnapshotRepositoryImpl::new(pool));

    let leaderboard_service: ArcLeaderboardService = Arc::new(LeaderboardServiceImpl::new(
        player_repository.clone(),
        match_repository.clone(),
    ));

    let match_service: ArcMatchService = Arc::new(MatchServiceImpl::new(
        match_repository.clone(),
        player_repository.clone(),
        leaderboard_service.clone(),
    ));

    let award_service: ArcAwardService = Arc::new(AwardServiceImpl::new(match_repository.clone()));

    let analytics_service: ArcAnalyticsService = Arc::new(AnalyticsServiceImpl::new(
        player_repository.clone(),
        match_repository.clone(),
        snapshot_repository.clone(),
    ));

    let reset_service: ArcResetService = Arc::new(ResetServiceImpl::new(
        leaderboard_service.clone(),
        player_repository,
        match_repository,
        snapshot_repository,
    ));

    let reset_secret = std::env::var("RESET_SECRET").expect("RESET_SECRET env var not set");

    AppState {
        leaderboard_service,
        match_service,
        award_service,
        analytics_service,
        reset_service,
        reset_secret,
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;

    async fn response_body(error: ServiceError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_database_error_surfaces_backend_reason() {
        // A failed write is not retried, so the caller gets the backend's
        // own failure reason back.
        let (status, body) =
            response_body(ServiceError::Database("connection refused".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "connection refused");
    }

    #[tokio::test]
    async fn test_unavailable_stays_generic() {
        let (status, body) = response_body(ServiceError::Unavailable(
            "read of players failed after 3 attempts: timeout".to_string(),
        ))
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "Service temporarily unavailable");
    }

    #[tokio::test]
    async fn test_validation_error_lists_all_violations() {
        let (status, body) = response_body(ServiceError::Validation(vec![
            "first".to_string(),
            "second".to_string(),
        ]))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"], serde_json::json!(["first", "second"]));
    }
}
