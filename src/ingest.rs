use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use crate::{
    app::{ArcLeaderboardService, ArcMatchRepository, ArcPlayerRepository, ServiceError, ServiceResult},
    awards::{group_by_match, match_mvp},
    leaderboard::with_read_retry,
    matches::{Lane, Match, MatchId, MatchParticipant, ParticipantRecord},
    player::{MatchContribution, PlayerId},
};

/// How many matches the history endpoint returns by default.
pub const MATCH_HISTORY_LIMIT: usize = 20;

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct MatchSubmission {
    #[validate(
        length(min = 1, max = 5, message = "a match needs between 1 and 5 participants"),
        nested
    )]
    pub participants: Vec<ParticipantEntry>,
}

#[derive(Clone, Debug, Deserialize, Serialize, Validate)]
pub struct ParticipantEntry {
    pub player_id: PlayerId,
    #[validate(range(min = 1.0, max = 10.0, message = "rating must be between 1 and 10"))]
    pub rating: f64,
    #[validate(range(min = 0, message = "kills cannot be negative"))]
    pub kills: i32,
    #[validate(range(min = 0, message = "deaths cannot be negative"))]
    pub deaths: i32,
    #[validate(range(min = 0, message = "assists cannot be negative"))]
    pub assists: i32,
    pub lane: Lane,
}

fn collect_messages(errors: &ValidationErrors, prefix: &str, out: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for error in field_errors {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| error.code.to_string());
                    out.push(format!("{}: {}", path, message));
                }
            }
            ValidationErrorsKind::Struct(nested) => collect_messages(nested, &path, out),
            ValidationErrorsKind::List(nested_map) => {
                for (index, nested) in nested_map {
                    collect_messages(nested, &format!("{}[{}]", path, index), out);
                }
            }
        }
    }
}

/// All violations of one submission at once, so a client can fix its
/// form in one round trip. Duplicate participants are a violation too.
pub fn validate_submission(submission: &MatchSubmission) -> Vec<String> {
    let mut messages = Vec::new();
    if let Err(errors) = submission.validate() {
        collect_messages(&errors, "", &mut messages);
    }
    let mut seen: HashSet<PlayerId> = HashSet::new();
    for entry in &submission.participants {
        if !seen.insert(entry.player_id) {
            messages.push(format!(
                "participants: player {} appears more than once",
                entry.player_id
            ));
        }
    }
    messages.sort();
    messages
}

#[derive(Clone, Debug, Serialize)]
pub struct MatchSummary {
    pub id: MatchId,
    pub match_date: DateTime<Utc>,
    pub participants: Vec<ParticipantRecord>,
    pub mvp: Option<PlayerId>,
}

#[async_trait::async_trait]
pub trait MatchService {
    async fn submit_match(&self, submission: MatchSubmission) -> ServiceResult<MatchId>;
    /// The latest matches, newest first, each with its MVP.
    async fn get_match_history(&self, limit: usize) -> ServiceResult<Vec<MatchSummary>>;
}

pub struct MatchServiceImpl {
    match_repository: ArcMatchRepository,
    player_repository: ArcPlayerRepository,
    leaderboard_service: ArcLeaderboardService,
}

impl MatchServiceImpl {
    pub fn new(
        match_repository: ArcMatchRepository,
        player_repository: ArcPlayerRepository,
        leaderboard_service: ArcLeaderboardService,
    ) -> Self {
        Self {
            match_repository,
            player_repository,
            leaderboard_service,
        }
    }
}

#[async_trait::async_trait]
impl MatchService for MatchServiceImpl {
    async fn submit_match(&self, submission: MatchSubmission) -> ServiceResult<MatchId> {
        let violations = validate_submission(&submission);
        if !violations.is_empty() {
            return Err(ServiceError::Validation(violations));
        }

        let now = Utc::now();
        let game = Match {
            id: Uuid::new_v4(),
            match_date: now,
        };
        let participants: Vec<MatchParticipant> = submission
            .participants
            .iter()
            .map(|entry| MatchParticipant {
                id: Uuid::new_v4(),
                match_id: game.id,
                player_id: entry.player_id,
                rating: entry.rating,
                kills: entry.kills as u32,
                deaths: entry.deaths as u32,
                assists: entry.assists as u32,
                lane: entry.lane,
                created_at: now,
            })
            .collect();

        self.match_repository
            .create_match_with_participants(&game, &participants)
            .await?;

        for participant in &participants {
            let contribution = MatchContribution {
                rating: participant.rating,
                kills: participant.kills,
                deaths: participant.deaths,
                assists: participant.assists,
            };
            if let Err(error) = self
                .player_repository
                .apply_match_result(participant.player_id, &contribution)
                .await
            {
                log::error!(
                    "Failed to apply match {} to player {}: {}",
                    game.id,
                    participant.player_id,
                    error
                );
                return Err(error);
            }
        }

        self.leaderboard_service.invalidate_cache();
        log::info!(
            "Recorded match {} with {} participants",
            game.id,
            participants.len()
        );
        Ok(game.id)
    }

    async fn get_match_history(&self, limit: usize) -> ServiceResult<Vec<MatchSummary>> {
        let records = with_read_retry("participant records", || {
            self.match_repository.get_participant_records()
        })
        .await?;

        let mut summaries: Vec<MatchSummary> = group_by_match(&records)
            .into_iter()
            .map(|(id, participants)| MatchSummary {
                id,
                match_date: participants[0].match_date,
                mvp: match_mvp(&participants).map(|m| m.player_id),
                participants: participants.into_iter().cloned().collect(),
            })
            .collect();
        summaries.sort_by(|a, b| b.match_date.cmp(&a.match_date));
        summaries.truncate(limit);
        Ok(summaries)
    }
}
