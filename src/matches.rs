use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::player::PlayerId;

pub type MatchId = Uuid;

/// One of the five fixed positional assignments within a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Lane {
    Top,
    Jungle,
    Mid,
    Adc,
    Sup,
}

impl Lane {
    pub const ALL: [Lane; 5] = [Lane::Top, Lane::Jungle, Lane::Mid, Lane::Adc, Lane::Sup];

    pub fn as_str(&self) -> &'static str {
        match self {
            Lane::Top => "TOP",
            Lane::Jungle => "JUNGLE",
            Lane::Mid => "MID",
            Lane::Adc => "ADC",
            Lane::Sup => "SUP",
        }
    }
}

impl std::fmt::Display for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Lane {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TOP" => Ok(Lane::Top),
            "JUNGLE" => Ok(Lane::Jungle),
            "MID" => Ok(Lane::Mid),
            "ADC" => Ok(Lane::Adc),
            "SUP" => Ok(Lane::Sup),
            other => Err(format!("unknown lane tag: {}", other)),
        }
    }
}

/// One recorded game event. Immutable once created; removed only by the
/// full reset operation.
#[derive(Clone, Debug, Serialize)]
pub struct Match {
    pub id: MatchId,
    pub match_date: DateTime<Utc>,
}

/// One player's performance within one match.
#[derive(Clone, Debug, Serialize)]
pub struct MatchParticipant {
    pub id: Uuid,
    pub match_id: MatchId,
    pub player_id: PlayerId,
    pub rating: f64,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub lane: Lane,
    pub created_at: DateTime<Utc>,
}

/// A participant row joined with player identity and the match date.
/// Award derivation and analytics only ever see this typed view, never
/// raw rows.
#[derive(Clone, Debug, Serialize)]
pub struct ParticipantRecord {
    pub match_id: MatchId,
    pub player_id: PlayerId,
    pub player_name: String,
    pub player_avatar: String,
    pub rating: f64,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub lane: Lane,
    pub match_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_lane_round_trip() {
        for lane in Lane::ALL {
            assert_eq!(Lane::from_str(lane.as_str()), Ok(lane));
        }
    }

    #[test]
    fn test_unknown_lane_rejected() {
        assert!(Lane::from_str("FEED").is_err());
        assert!(Lane::from_str("top").is_err());
    }
}
