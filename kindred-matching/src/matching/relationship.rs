use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::pair::{NormalizedPair, PairKey, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipState {
    None,
    Pending,
    Matched,
    Unmatched,
}

impl RelationshipState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Pending => "pending",
            Self::Matched => "matched",
            Self::Unmatched => "unmatched",
        }
    }
}

impl fmt::Display for RelationshipState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "pending" => Ok(Self::Pending),
            "matched" => Ok(Self::Matched),
            "unmatched" => Ok(Self::Unmatched),
            _ => Err(format!("unknown relationship state: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Like,
    Unlike,
    Unmatch,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Unlike => "unlike",
            Self::Unmatch => "unmatch",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "like" => Ok(Self::Like),
            "unlike" => Ok(Self::Unlike),
            "unmatch" => Ok(Self::Unmatch),
            _ => Err(format!("unknown action: {s}")),
        }
    }
}

/// Side effect signalled by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchEvent {
    None,
    BecamePending,
    BecameMatched,
    BecameUnmatched,
}

impl MatchEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::BecamePending => "became_pending",
            Self::BecameMatched => "became_matched",
            Self::BecameUnmatched => "became_unmatched",
        }
    }
}

/// The single record kept per unordered profile pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Relationship {
    pub id: Uuid,
    pub pair_key: PairKey,
    pub profile_a: Uuid,
    pub profile_b: Uuid,
    pub liked_by_a: bool,
    pub liked_by_b: bool,
    pub state: RelationshipState,
    pub matched_at: Option<DateTime<Utc>>,
    pub unmatched_at: Option<DateTime<Utc>>,
    pub unmatched_by: Option<Uuid>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Relationship {
    /// Fresh row for a pair nobody has acted on yet.
    pub fn new(pair: &NormalizedPair, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            pair_key: pair.key.clone(),
            profile_a: pair.profile_a,
            profile_b: pair.profile_b,
            liked_by_a: false,
            liked_by_b: false,
            state: RelationshipState::None,
            matched_at: None,
            unmatched_at: None,
            unmatched_by: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn liked_by(&self, side: Side) -> bool {
        match side {
            Side::A => self.liked_by_a,
            Side::B => self.liked_by_b,
        }
    }

    pub(crate) fn set_liked(&mut self, side: Side, liked: bool) {
        match side {
            Side::A => self.liked_by_a = liked,
            Side::B => self.liked_by_b = liked,
        }
    }

    pub fn profile(&self, side: Side) -> Uuid {
        match side {
            Side::A => self.profile_a,
            Side::B => self.profile_b,
        }
    }

    /// The other participant, from `profile_id`'s point of view.
    pub fn partner_of(&self, profile_id: Uuid) -> Option<Uuid> {
        if profile_id == self.profile_a {
            Some(self.profile_b)
        } else if profile_id == self.profile_b {
            Some(self.profile_a)
        } else {
            None
        }
    }

    /// Flags and state agree with each other.
    pub fn is_consistent(&self) -> bool {
        match self.state {
            RelationshipState::None | RelationshipState::Unmatched => !self.liked_by_a && !self.liked_by_b,
            RelationshipState::Pending => self.liked_by_a != self.liked_by_b,
            RelationshipState::Matched => self.liked_by_a && self.liked_by_b && self.matched_at.is_some(),
        }
    }

    /// Same durable content, ignoring id, version and timestamps of the row itself.
    pub(crate) fn same_content(&self, other: &Relationship) -> bool {
        self.liked_by_a == other.liked_by_a
            && self.liked_by_b == other.liked_by_b
            && self.state == other.state
            && self.matched_at == other.matched_at
            && self.unmatched_at == other.unmatched_at
            && self.unmatched_by == other.unmatched_by
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::pair::normalize;

    #[test]
    fn states_parse_from_their_column_form() {
        for state in [
            RelationshipState::None,
            RelationshipState::Pending,
            RelationshipState::Matched,
            RelationshipState::Unmatched,
        ] {
            assert_eq!(state.as_str().parse::<RelationshipState>().unwrap(), state);
        }
        assert!("blocked".parse::<RelationshipState>().is_err());
    }

    #[test]
    fn actions_parse_case_insensitively() {
        assert_eq!("LIKE".parse::<Action>().unwrap(), Action::Like);
        assert_eq!("unmatch".parse::<Action>().unwrap(), Action::Unmatch);
        assert!("superlike".parse::<Action>().is_err());
    }

    #[test]
    fn new_relationship_is_blank() {
        let pair = normalize(Uuid::new_v4(), Uuid::new_v4());
        let rel = Relationship::new(&pair, Utc::now());

        assert_eq!(rel.state, RelationshipState::None);
        assert_eq!(rel.version, 0);
        assert!(!rel.liked_by_a && !rel.liked_by_b);
        assert!(rel.is_consistent());
        assert_eq!(rel.partner_of(pair.profile_a), Some(pair.profile_b));
        assert_eq!(rel.partner_of(Uuid::nil()), None);
    }

    #[test]
    fn event_serializes_snake_case() {
        let json = serde_json::to_string(&MatchEvent::BecameMatched).unwrap();
        assert_eq!(json, "\"became_matched\"");
    }
}
