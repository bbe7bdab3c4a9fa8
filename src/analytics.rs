use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    app::{ArcMatchRepository, ArcPlayerRepository, ArcSnapshotRepository, ServiceResult},
    awards::{group_by_match, match_mvp},
    leaderboard::with_read_retry,
    matches::{Lane, MatchId, ParticipantRecord},
    player::{Player, PlayerId},
    snapshot::{weekly_honors, WeeklyHonors},
};

/// Minimum appearances in a lane before a player enters that lane's
/// ranking.
pub const LANE_RANKING_MIN_APPEARANCES: u32 = 2;

/// Minimum shared matches before a duo shows up as a partnership.
pub const PARTNERSHIP_MIN_MATCHES: u32 = 3;

/// A rating at or above this counts as a good performance.
pub const GOOD_PERFORMANCE_RATING: f64 = 8.0;

/// A rating at or below this counts as a bad performance.
pub const BAD_PERFORMANCE_RATING: f64 = 4.0;

/// How many of the latest performances the profile shows.
pub const RECENT_PERFORMANCE_LIMIT: usize = 10;

#[derive(Clone, Debug, Serialize)]
pub struct RecentPerformance {
    pub match_id: MatchId,
    pub match_date: DateTime<Utc>,
    pub rating: f64,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub lane: Lane,
    pub mvp: bool,
}

/// The subject's standing within one lane, among all players who meet
/// the appearance threshold for it.
#[derive(Clone, Debug, Serialize)]
pub struct LaneRanking {
    pub lane: Lane,
    pub position: usize,
    pub total_players: usize,
    pub average_rating: f64,
}

/// A recurring teammate, split by the lane the partner played. The
/// averages and good/bad counts describe the SUBJECT's performances in
/// the shared matches, not the partner's.
#[derive(Clone, Debug, Serialize)]
pub struct Partnership {
    pub partner_id: PlayerId,
    pub partner_name: String,
    pub partner_avatar: String,
    pub lane: Lane,
    pub matches_played: u32,
    pub average_rating: f64,
    pub good_performances: u32,
    pub bad_performances: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct PlayerProfile {
    pub player: Player,
    pub recent_performances: Vec<RecentPerformance>,
    pub lane_rankings: Vec<LaneRanking>,
    pub partnerships: Vec<Partnership>,
    pub honors: WeeklyHonors,
}

/// Latest performances of one player, newest first, MVP-flagged against
/// the other participants of each match.
pub fn recent_performances(
    records: &[ParticipantRecord],
    player_id: PlayerId,
) -> Vec<RecentPerformance> {
    let groups = group_by_match(records);
    let mut own: Vec<RecentPerformance> = Vec::new();
    for participants in groups.values() {
        let mvp = match_mvp(participants);
        for record in participants {
            if record.player_id != player_id {
                continue;
            }
            own.push(RecentPerformance {
                match_id: record.match_id,
                match_date: record.match_date,
                rating: record.rating,
                kills: record.kills,
                deaths: record.deaths,
                assists: record.assists,
                lane: record.lane,
                mvp: mvp.is_some_and(|m| m.player_id == record.player_id),
            });
        }
    }
    own.sort_by(|a, b| b.match_date.cmp(&a.match_date));
    own.truncate(RECENT_PERFORMANCE_LIMIT);
    own
}

/// The subject's position in each lane ranking it qualifies for. A lane
/// ranking orders every player with at least
/// [`LANE_RANKING_MIN_APPEARANCES`] appearances in that lane by mean
/// rating, descending.
pub fn lane_rankings(records: &[ParticipantRecord], player_id: PlayerId) -> Vec<LaneRanking> {
    let mut rankings = Vec::new();
    for lane in Lane::ALL {
        let mut per_player: BTreeMap<PlayerId, (f64, u32)> = BTreeMap::new();
        for record in records.iter().filter(|r| r.lane == lane) {
            let entry = per_player.entry(record.player_id).or_insert((0.0, 0));
            entry.0 += record.rating;
            entry.1 += 1;
        }

        let mut eligible: Vec<(PlayerId, f64)> = per_player
            .into_iter()
            .filter(|(_, (_, appearances))| *appearances >= LANE_RANKING_MIN_APPEARANCES)
            .map(|(id, (total, appearances))| (id, total / appearances as f64))
            .collect();
        eligible.sort_by(|(id_a, mean_a), (id_b, mean_b)| {
            mean_b
                .partial_cmp(mean_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(id_a.cmp(id_b))
        });

        let Some(position) = eligible.iter().position(|(id, _)| *id == player_id) else {
            continue;
        };
        rankings.push(LaneRanking {
            lane,
            position: position + 1,
            total_players: eligible.len(),
            average_rating: eligible[position].1,
        });
    }
    rankings
}

/// Recurring duos of the subject, keyed by partner and the lane the
/// partner played, ordered by shared match count descending.
pub fn partnerships(records: &[ParticipantRecord], player_id: PlayerId) -> Vec<Partnership> {
    struct Duo<'a> {
        partner: &'a ParticipantRecord,
        matches_played: u32,
        own_rating_total: f64,
        good: u32,
        bad: u32,
    }

    let mut duos: BTreeMap<(PlayerId, Lane), Duo> = BTreeMap::new();
    for participants in group_by_match(records).values() {
        let Some(own) = participants.iter().find(|r| r.player_id == player_id) else {
            continue;
        };
        for partner in participants.iter().filter(|r| r.player_id != player_id) {
            let duo = duos
                .entry((partner.player_id, partner.lane))
                .or_insert(Duo {
                    partner: *partner,
                    matches_played: 0,
                    own_rating_total: 0.0,
                    good: 0,
                    bad: 0,
                });
            duo.matches_played += 1;
            duo.own_rating_total += own.rating;
            if own.rating >= GOOD_PERFORMANCE_RATING {
                duo.good += 1;
            }
            if own.rating <= BAD_PERFORMANCE_RATING {
                duo.bad += 1;
            }
        }
    }

    let mut result: Vec<Partnership> = duos
        .into_iter()
        .filter(|(_, duo)| duo.matches_played >= PARTNERSHIP_MIN_MATCHES)
        .map(|((partner_id, lane), duo)| Partnership {
            partner_id,
            partner_name: duo.partner.player_name.clone(),
            partner_avatar: duo.partner.player_avatar.clone(),
            lane,
            matches_played: duo.matches_played,
            average_rating: duo.own_rating_total / duo.matches_played as f64,
            good_performances: duo.good,
            bad_performances: duo.bad,
        })
        .collect();
    result.sort_by(|a, b| {
        b.matches_played
            .cmp(&a.matches_played)
            .then(a.partner_id.cmp(&b.partner_id))
    });
    result
}

#[async_trait::async_trait]
pub trait AnalyticsService {
    async fn get_player_profile(&self, player_id: PlayerId) -> ServiceResult<PlayerProfile>;
}

pub struct AnalyticsServiceImpl {
    player_repository: ArcPlayerRepository,
    match_repository: ArcMatchRepository,
    snapshot_repository: ArcSnapshotRepository,
}

impl AnalyticsServiceImpl {
    pub fn new(
        player_repository: ArcPlayerRepository,
        match_repository: ArcMatchRepository,
        snapshot_repository: ArcSnapshotRepository,
    ) -> Self {
        Self {
            player_repository,
            match_repository,
            snapshot_repository,
        }
    }
}

#[async_trait::async_trait]
impl AnalyticsService for AnalyticsServiceImpl {
    async fn get_player_profile(&self, player_id: PlayerId) -> ServiceResult<PlayerProfile> {
        let player = with_read_retry("player by id", || {
            self.player_repository.get_player_by_id(player_id)
        })
        .await?;
        let records = with_read_retry("participant records", || {
            self.match_repository.get_participant_records()
        })
        .await?;
        let snapshots = with_read_retry("weekly snapshots", || {
            self.snapshot_repository.get_snapshots()
        })
        .await?;

        Ok(PlayerProfile {
            recent_performances: recent_performances(&records, player_id),
            lane_rankings: lane_rankings(&records, player_id),
            partnerships: partnerships(&records, player_id),
            honors: weekly_honors(&snapshots, player_id),
            player,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use uuid::Uuid;

    use super::*;

    fn record(
        match_id: MatchId,
        player_id: PlayerId,
        name: &str,
        rating: f64,
        lane: Lane,
        day: u32,
    ) -> ParticipantRecord {
        let date = Utc.with_ymd_and_hms(2025, 7, day, 21, 0, 0).unwrap();
        ParticipantRecord {
            match_id,
            player_id,
            player_name: name.to_string(),
            player_avatar: String::new(),
            rating,
            kills: 3,
            deaths: 3,
            assists: 5,
            lane,
            match_date: date,
            created_at: date,
        }
    }

    #[test]
    fn test_lane_ranking_requires_two_appearances() {
        let subject = Uuid::new_v4();
        let rival = Uuid::new_v4();
        let records = vec![
            record(Uuid::new_v4(), subject, "subject", 8.0, Lane::Mid, 1),
            record(Uuid::new_v4(), subject, "subject", 6.0, Lane::Mid, 2),
            // One stellar game in jungle does not create a ranking there.
            record(Uuid::new_v4(), subject, "subject", 10.0, Lane::Jungle, 3),
            record(Uuid::new_v4(), rival, "rival", 9.0, Lane::Mid, 1),
            record(Uuid::new_v4(), rival, "rival", 9.0, Lane::Mid, 2),
        ];

        let rankings = lane_rankings(&records, subject);
        assert_eq!(rankings.len(), 1);
        assert_eq!(rankings[0].lane, Lane::Mid);
        assert_eq!(rankings[0].position, 2);
        assert_eq!(rankings[0].total_players, 2);
        assert!((rankings[0].average_rating - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_partnership_threshold_and_lane_split() {
        let subject = Uuid::new_v4();
        let partner = Uuid::new_v4();
        let mut records = Vec::new();
        // Three shared matches with the partner in SUP qualify; a fourth
        // shared match with the partner in TOP is a separate duo below
        // the threshold.
        for day in 1..=3u32 {
            let match_id = Uuid::new_v4();
            let rating = [9.0, 3.5, 6.0][day as usize - 1];
            records.push(record(match_id, subject, "subject", rating, Lane::Adc, day));
            records.push(record(match_id, partner, "partner", 5.0, Lane::Sup, day));
        }
        let match_id = Uuid::new_v4();
        records.push(record(match_id, subject, "subject", 7.0, Lane::Adc, 4));
        records.push(record(match_id, partner, "partner", 5.0, Lane::Top, 4));

        let duos = partnerships(&records, subject);
        assert_eq!(duos.len(), 1);
        assert_eq!(duos[0].partner_id, partner);
        assert_eq!(duos[0].lane, Lane::Sup);
        assert_eq!(duos[0].matches_played, 3);
        // Subject's own ratings: 9.0 good, 3.5 bad, 6.0 neither.
        assert_eq!(duos[0].good_performances, 1);
        assert_eq!(duos[0].bad_performances, 1);
        assert!((duos[0].average_rating - (9.0 + 3.5 + 6.0) / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_recent_performances_newest_first_with_mvp_flag() {
        let subject = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut records = Vec::new();
        for day in 1..=12u32 {
            let match_id = Uuid::new_v4();
            let subject_rating = if day == 12 { 9.5 } else { 5.0 };
            records.push(record(match_id, subject, "subject", subject_rating, Lane::Mid, day));
            records.push(record(match_id, other, "other", 7.0, Lane::Top, day));
        }

        let recent = recent_performances(&records, subject);
        assert_eq!(recent.len(), RECENT_PERFORMANCE_LIMIT);
        assert!(recent[0].match_date > recent[1].match_date);
        // The latest game out-rated the teammate.
        assert!(recent[0].mvp);
        assert!(!recent[1].mvp);
    }

    #[test]
    fn test_no_history_yields_empty_profile_parts() {
        let subject = Uuid::new_v4();
        assert!(recent_performances(&[], subject).is_empty());
        assert!(lane_rankings(&[], subject).is_empty());
        assert!(partnerships(&[], subject).is_empty());
    }
}
