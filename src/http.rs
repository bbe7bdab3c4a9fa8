use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;

use crate::{
    analytics::PlayerProfile,
    app::{AppState, ServiceError},
    awards::AwardsView,
    ingest::{MATCH_HISTORY_LIMIT, MatchSubmission, MatchSummary},
    leaderboard::LeaderboardSummary,
    player::PlayerId,
    ranking::RankedPlayer,
    snapshot::{ResetOutcome, WeeklyTop3},
};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/players", get(get_players))
        .route("/api/summary", get(get_summary))
        .route("/api/awards", get(get_awards))
        .route("/api/matches", get(get_matches).post(submit_match))
        .route("/api/players/{id}", get(get_player_profile))
        .route("/api/weekly", get(get_weekly_history))
        .route("/api/reset", post(reset_leaderboard))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Deserialize)]
struct RefreshQuery {
    force: Option<bool>,
}

#[derive(Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

async fn get_players(
    State(state): State<AppState>,
    Query(query): Query<RefreshQuery>,
) -> Result<Json<Vec<RankedPlayer>>, ServiceError> {
    let rankings = state
        .leaderboard_service
        .get_rankings(query.force.unwrap_or(false))
        .await?;
    Ok(Json(rankings))
}

async fn get_summary(
    State(state): State<AppState>,
) -> Result<Json<LeaderboardSummary>, ServiceError> {
    Ok(Json(state.leaderboard_service.get_summary().await?))
}

async fn get_awards(State(state): State<AppState>) -> Result<Json<AwardsView>, ServiceError> {
    Ok(Json(state.award_service.get_awards().await?))
}

async fn get_matches(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<MatchSummary>>, ServiceError> {
    let limit = query.limit.unwrap_or(MATCH_HISTORY_LIMIT);
    Ok(Json(state.match_service.get_match_history(limit).await?))
}

async fn submit_match(
    State(state): State<AppState>,
    Json(submission): Json<MatchSubmission>,
) -> Result<(StatusCode, Json<serde_json::Value>), ServiceError> {
    let match_id = state.match_service.submit_match(submission).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "match_id": match_id })),
    ))
}

async fn get_player_profile(
    State(state): State<AppState>,
    Path(id): Path<PlayerId>,
) -> Result<Json<PlayerProfile>, ServiceError> {
    Ok(Json(state.analytics_service.get_player_profile(id).await?))
}

async fn get_weekly_history(
    State(state): State<AppState>,
) -> Result<Json<Vec<WeeklyTop3>>, ServiceError> {
    Ok(Json(state.reset_service.get_weekly_history().await?))
}

async fn reset_leaderboard(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ResetOutcome>, ServiceError> {
    let provided = headers
        .get("x-reset-secret")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if provided.is_empty() || provided != state.reset_secret {
        return ServiceError::unauthorized("invalid reset secret");
    }
    Ok(Json(state.reset_service.reset_leaderboard().await?))
}
