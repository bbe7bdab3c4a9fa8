use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    app::{ArcMatchRepository, ServiceResult},
    leaderboard::with_read_retry,
    matches::{Lane, MatchId, ParticipantRecord},
    player::PlayerId,
};

/// Minimum appearances in a lane before a player can lead it.
pub const LANE_LEADER_MIN_APPEARANCES: u32 = 3;

/// Minimum total matches before a player appears in the MVP standings.
pub const MVP_MIN_MATCHES: u32 = 3;

/// How many MVP standings the presentation layer shows.
pub const TOP_MVP_LIMIT: usize = 3;

#[derive(Clone, Debug, Serialize)]
pub struct LaneLeader {
    pub lane: Lane,
    pub player_id: PlayerId,
    pub player_name: String,
    pub player_avatar: String,
    pub best_rating: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct BottomPerformer {
    pub player_id: PlayerId,
    pub player_name: String,
    pub player_avatar: String,
    pub worst_rating: f64,
    pub match_date: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct WorstKda {
    pub player_id: PlayerId,
    pub player_name: String,
    pub player_avatar: String,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub kda_ratio: f64,
    pub match_date: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct MvpStanding {
    pub player_id: PlayerId,
    pub player_name: String,
    pub player_avatar: String,
    pub mvp_count: u32,
    pub total_matches: u32,
    pub mvp_percentage: f64,
}

/// Zero deaths count as one for ratio purposes. A deliberate floor, so a
/// 0/0/0 row yields 0.0 instead of a division by zero.
pub fn kda_ratio(kills: u32, deaths: u32, assists: u32) -> f64 {
    (kills + assists) as f64 / deaths.max(1) as f64
}

/// Groups records per match, participants ordered by row creation then
/// player id. Every tie-break downstream leans on this ordering being
/// deterministic.
pub fn group_by_match(records: &[ParticipantRecord]) -> BTreeMap<MatchId, Vec<&ParticipantRecord>> {
    let mut groups: BTreeMap<MatchId, Vec<&ParticipantRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.match_id).or_default().push(record);
    }
    for participants in groups.values_mut() {
        participants.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then(a.player_id.cmp(&b.player_id))
        });
    }
    groups
}

/// The MVP of one match: strictly highest rating, first-encountered wins
/// ties.
pub fn match_mvp<'a>(participants: &[&'a ParticipantRecord]) -> Option<&'a ParticipantRecord> {
    let mut best: Option<&ParticipantRecord> = None;
    for participant in participants {
        match best {
            None => best = Some(*participant),
            Some(current) if participant.rating > current.rating => best = Some(*participant),
            _ => {}
        }
    }
    best
}

/// Per-lane leader by mean rating among players with at least
/// [`LANE_LEADER_MIN_APPEARANCES`] appearances in that lane. Lanes with
/// no eligible player are absent from the result.
pub fn lane_leaders(records: &[ParticipantRecord]) -> Vec<LaneLeader> {
    let mut leaders = Vec::new();
    for lane in Lane::ALL {
        let mut per_player: BTreeMap<PlayerId, (f64, u32, &ParticipantRecord)> = BTreeMap::new();
        for record in records.iter().filter(|r| r.lane == lane) {
            let entry = per_player.entry(record.player_id).or_insert((0.0, 0, record));
            entry.0 += record.rating;
            entry.1 += 1;
        }

        let mut best: Option<(f64, &ParticipantRecord)> = None;
        for (total_rating, appearances, record) in per_player.values() {
            if *appearances < LANE_LEADER_MIN_APPEARANCES {
                continue;
            }
            let mean = total_rating / *appearances as f64;
            match best {
                // Strict comparison keeps the lowest player id on equal
                // means (BTreeMap iterates ids in order).
                Some((best_mean, _)) if mean <= best_mean => {}
                _ => best = Some((mean, *record)),
            }
        }

        if let Some((mean, record)) = best {
            leaders.push(LaneLeader {
                lane,
                player_id: record.player_id,
                player_name: record.player_name.clone(),
                player_avatar: record.player_avatar.clone(),
                best_rating: mean,
            });
        }
    }
    leaders
}

/// The single worst-rated performance ever recorded. Ties go to the most
/// recent match.
pub fn bottom_performer(records: &[ParticipantRecord]) -> Option<BottomPerformer> {
    let mut worst: Option<&ParticipantRecord> = None;
    for record in records {
        let replace = match worst {
            None => true,
            Some(current) => {
                record.rating < current.rating
                    || (record.rating == current.rating && record.match_date > current.match_date)
            }
        };
        if replace {
            worst = Some(record);
        }
    }
    worst.map(|record| BottomPerformer {
        player_id: record.player_id,
        player_name: record.player_name.clone(),
        player_avatar: record.player_avatar.clone(),
        worst_rating: record.rating,
        match_date: record.match_date,
    })
}

/// The single worst KDA-ratio performance ever recorded, first-found on
/// ties.
pub fn worst_kda(records: &[ParticipantRecord]) -> Option<WorstKda> {
    let mut worst: Option<(f64, &ParticipantRecord)> = None;
    for record in records {
        let ratio = kda_ratio(record.kills, record.deaths, record.assists);
        match worst {
            Some((worst_ratio, _)) if ratio >= worst_ratio => {}
            _ => worst = Some((ratio, record)),
        }
    }
    worst.map(|(ratio, record)| WorstKda {
        player_id: record.player_id,
        player_name: record.player_name.clone(),
        player_avatar: record.player_avatar.clone(),
        kills: record.kills,
        deaths: record.deaths,
        assists: record.assists,
        kda_ratio: ratio,
        match_date: record.match_date,
    })
}

/// MVP counts per player over all matches. Eligible at
/// [`MVP_MIN_MATCHES`] total matches; sorted by MVP count, then MVP
/// percentage, then player id.
pub fn mvp_standings(records: &[ParticipantRecord]) -> Vec<MvpStanding> {
    struct Tally<'a> {
        mvp_count: u32,
        total_matches: u32,
        record: &'a ParticipantRecord,
    }

    let mut tallies: BTreeMap<PlayerId, Tally> = BTreeMap::new();
    for participants in group_by_match(records).values() {
        let mvp = match match_mvp(participants) {
            Some(mvp) => mvp,
            None => continue,
        };
        for participant in participants {
            let tally = tallies.entry(participant.player_id).or_insert(Tally {
                mvp_count: 0,
                total_matches: 0,
                record: *participant,
            });
            tally.total_matches += 1;
            if participant.player_id == mvp.player_id {
                tally.mvp_count += 1;
            }
        }
    }

    let mut standings: Vec<MvpStanding> = tallies
        .into_iter()
        .filter(|(_, tally)| tally.total_matches >= MVP_MIN_MATCHES)
        .map(|(player_id, tally)| MvpStanding {
            player_id,
            player_name: tally.record.player_name.clone(),
            player_avatar: tally.record.player_avatar.clone(),
            mvp_count: tally.mvp_count,
            total_matches: tally.total_matches,
            mvp_percentage: tally.mvp_count as f64 / tally.total_matches as f64 * 100.0,
        })
        .collect();

    standings.sort_by(|a, b| {
        b.mvp_count
            .cmp(&a.mvp_count)
            .then(
                b.mvp_percentage
                    .partial_cmp(&a.mvp_percentage)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
            .then(a.player_id.cmp(&b.player_id))
    });
    standings
}

#[derive(Clone, Debug, Serialize)]
pub struct AwardsView {
    pub lane_leaders: Vec<LaneLeader>,
    pub bottom_performer: Option<BottomPerformer>,
    pub worst_kda: Option<WorstKda>,
    pub top_mvps: Vec<MvpStanding>,
}

#[async_trait::async_trait]
pub trait AwardService {
    async fn get_awards(&self) -> ServiceResult<AwardsView>;
}

pub struct AwardServiceImpl {
    match_repository: ArcMatchRepository,
}

impl AwardServiceImpl {
    pub fn new(match_repository: ArcMatchRepository) -> Self {
        Self { match_repository }
    }
}

#[async_trait::async_trait]
impl AwardService for AwardServiceImpl {
    async fn get_awards(&self) -> ServiceResult<AwardsView> {
        let records = with_read_retry("participant records", || {
            self.match_repository.get_participant_records()
        })
        .await?;

        let mut top_mvps = mvp_standings(&records);
        top_mvps.truncate(TOP_MVP_LIMIT);

        Ok(AwardsView {
            lane_leaders: lane_leaders(&records),
            bottom_performer: bottom_performer(&records),
            worst_kda: worst_kda(&records),
            top_mvps,
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
        kda: (u32, u32, u32),
        lane: Lane,
        day: u32,
    ) -> ParticipantRecord {
        let date = Utc.with_ymd_and_hms(2025, 6, day, 20, 0, 0).unwrap();
        ParticipantRecord {
            match_id,
            player_id,
            player_name: name.to_string(),
            player_avatar: String::new(),
            rating,
            kills: kda.0,
            deaths: kda.1,
            assists: kda.2,
            lane,
            match_date: date,
            created_at: date,
        }
    }

    #[test]
    fn test_lane_leader_minimum_sample() {
        let m: Vec<MatchId> = (0..3).map(|_| Uuid::new_v4()).collect();
        let hot = Uuid::new_v4();
        let steady = Uuid::new_v4();
        let records = vec![
            // Two stellar games are below the threshold.
            record(m[0], hot, "hot", 10.0, (5, 1, 5), Lane::Mid, 1),
            record(m[1], hot, "hot", 10.0, (5, 1, 5), Lane::Mid, 2),
            // Three average games qualify.
            record(m[0], steady, "steady", 6.0, (2, 2, 2), Lane::Mid, 1),
            record(m[1], steady, "steady", 6.0, (2, 2, 2), Lane::Mid, 2),
            record(m[2], steady, "steady", 6.0, (2, 2, 2), Lane::Mid, 3),
        ];

        let leaders = lane_leaders(&records);
        assert_eq!(leaders.len(), 1);
        assert_eq!(leaders[0].lane, Lane::Mid);
        assert_eq!(leaders[0].player_name, "steady");
        assert!((leaders[0].best_rating - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_lane_without_eligible_player_is_absent() {
        let records = vec![record(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "solo",
            9.0,
            (1, 1, 1),
            Lane::Top,
            1,
        )];
        assert!(lane_leaders(&records).is_empty());
    }

    #[test]
    fn test_bottom_performer_tie_goes_to_most_recent() {
        let early = Uuid::new_v4();
        let late = Uuid::new_v4();
        let records = vec![
            record(Uuid::new_v4(), early, "early", 1.5, (0, 9, 1), Lane::Adc, 1),
            record(Uuid::new_v4(), late, "late", 1.5, (0, 8, 2), Lane::Sup, 9),
            record(Uuid::new_v4(), Uuid::new_v4(), "fine", 7.0, (4, 2, 6), Lane::Mid, 5),
        ];
        let worst = bottom_performer(&records).unwrap();
        assert_eq!(worst.player_name, "late");
        assert_eq!(worst.worst_rating, 1.5);
    }

    #[test]
    fn test_worst_kda_zero_death_floor() {
        assert_eq!(kda_ratio(0, 0, 0), 0.0);
        assert_eq!(kda_ratio(3, 0, 3), 6.0);

        let feeder = Uuid::new_v4();
        let records = vec![
            record(Uuid::new_v4(), Uuid::new_v4(), "afk", 5.0, (0, 0, 0), Lane::Top, 1),
            record(Uuid::new_v4(), feeder, "feeder", 4.0, (1, 12, 2), Lane::Mid, 2),
        ];
        // The 0/0/0 row floors to ratio 0, which is still worse than the
        // feeder's 0.25.
        let worst = worst_kda(&records).unwrap();
        assert_eq!(worst.player_name, "afk");
        assert_eq!(worst.kda_ratio, 0.0);
    }

    #[test]
    fn test_mvp_tie_is_deterministic() {
        let match_id = Uuid::new_v4();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let mut a = record(match_id, first, "first", 9.0, (5, 2, 5), Lane::Mid, 1);
        let mut b = record(match_id, second, "second", 9.0, (6, 3, 4), Lane::Adc, 1);
        a.created_at = Utc.with_ymd_and_hms(2025, 6, 1, 20, 0, 0).unwrap();
        b.created_at = Utc.with_ymd_and_hms(2025, 6, 1, 20, 0, 1).unwrap();
        let records = vec![b.clone(), a.clone()];

        // The earlier-created row wins the tie, regardless of input order,
        // and repeated computation picks the same participant.
        for _ in 0..3 {
            let groups = group_by_match(&records);
            let mvp = match_mvp(&groups[&match_id]).unwrap();
            assert_eq!(mvp.player_id, first);
        }
    }

    #[test]
    fn test_mvp_standings_threshold_and_order() {
        let star = Uuid::new_v4();
        let grinder = Uuid::new_v4();
        let casual = Uuid::new_v4();
        let mut records = Vec::new();
        // Three matches: star wins all three against grinder; casual only
        // plays twice and stays below the threshold.
        for day in 1..=3u32 {
            let match_id = Uuid::new_v4();
            records.push(record(match_id, star, "star", 9.0, (8, 1, 4), Lane::Mid, day));
            records.push(record(match_id, grinder, "grinder", 7.0, (3, 3, 6), Lane::Sup, day));
            if day <= 2 {
                records.push(record(match_id, casual, "casual", 9.5, (9, 0, 2), Lane::Adc, day));
            }
        }

        let standings = mvp_standings(&records);
        assert_eq!(standings.len(), 2);
        assert_eq!(standings[0].player_id, star);
        assert_eq!(standings[0].mvp_count, 1); // casual out-rated star twice
        assert_eq!(standings[0].total_matches, 3);
        assert_eq!(standings[1].player_id, grinder);
        assert_eq!(standings[1].mvp_count, 0);
    }

    #[test]
    fn test_empty_history_yields_absence() {
        assert!(bottom_performer(&[]).is_none());
        assert!(worst_kda(&[]).is_none());
        assert!(mvp_standings(&[]).is_empty());
        assert!(lane_leaders(&[]).is_empty());
    }
}
