use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::matching::pair::normalize;
use crate::matching::relationship::Relationship;
use crate::schema::relationships;
use crate::store::StoreError;

// --- Relationship rows ---

#[derive(Debug, Queryable, Selectable, Identifiable, Clone)]
#[diesel(table_name = relationships)]
pub struct RelationshipRow {
    pub id: Uuid,
    pub pair_key: String,
    pub profile_a: Uuid,
    pub profile_b: Uuid,
    pub liked_by_a: bool,
    pub liked_by_b: bool,
    pub state: String,
    pub matched_at: Option<DateTime<Utc>>,
    pub unmatched_at: Option<DateTime<Utc>>,
    pub unmatched_by: Option<Uuid>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = relationships)]
pub struct NewRelationship<'a> {
    pub pair_key: &'a str,
    pub profile_a: Uuid,
    pub profile_b: Uuid,
}

/// Columns a compare-and-swap may rewrite. `None` clears the column.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = relationships, treat_none_as_null = true)]
pub struct RelationshipChanges {
    pub liked_by_a: bool,
    pub liked_by_b: bool,
    pub state: String,
    pub matched_at: Option<DateTime<Utc>>,
    pub unmatched_at: Option<DateTime<Utc>>,
    pub unmatched_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Relationship> for RelationshipChanges {
    fn from(rel: &Relationship) -> Self {
        Self {
            liked_by_a: rel.liked_by_a,
            liked_by_b: rel.liked_by_b,
            state: rel.state.as_str().to_string(),
            matched_at: rel.matched_at,
            unmatched_at: rel.unmatched_at,
            unmatched_by: rel.unmatched_by,
            updated_at: rel.updated_at,
        }
    }
}

impl TryFrom<RelationshipRow> for Relationship {
    type Error = StoreError;

    fn try_from(row: RelationshipRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| StoreError::Corrupt {
            pair_key: row.pair_key.clone(),
            reason,
        };

        let state = row.state.parse().map_err(corrupt)?;
        // rebuild the key from the ids so a hand-edited pair_key cannot leak in
        let pair = normalize(row.profile_a, row.profile_b);
        if pair.key.as_str() != row.pair_key || pair.profile_a != row.profile_a {
            return Err(corrupt("pair_key does not match ordered profile ids".into()));
        }

        Ok(Relationship {
            id: row.id,
            pair_key: pair.key,
            profile_a: row.profile_a,
            profile_b: row.profile_b,
            liked_by_a: row.liked_by_a,
            liked_by_b: row.liked_by_b,
            state,
            matched_at: row.matched_at,
            unmatched_at: row.unmatched_at,
            unmatched_by: row.unmatched_by,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::relationship::RelationshipState;

    fn row_for(x: Uuid, y: Uuid) -> RelationshipRow {
        let pair = normalize(x, y);
        let now = Utc::now();
        RelationshipRow {
            id: Uuid::now_v7(),
            pair_key: pair.key.to_string(),
            profile_a: pair.profile_a,
            profile_b: pair.profile_b,
            liked_by_a: true,
            liked_by_b: false,
            state: "pending".into(),
            matched_at: None,
            unmatched_at: None,
            unmatched_by: None,
            version: 3,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn row_maps_to_relationship() {
        let row = row_for(Uuid::new_v4(), Uuid::new_v4());
        let rel = Relationship::try_from(row.clone()).unwrap();

        assert_eq!(rel.state, RelationshipState::Pending);
        assert_eq!(rel.pair_key.as_str(), row.pair_key);
        assert_eq!(rel.version, 3);
    }

    #[test]
    fn unknown_state_is_corrupt() {
        let mut row = row_for(Uuid::new_v4(), Uuid::new_v4());
        row.state = "blocked".into();

        let err = Relationship::try_from(row).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn swapped_profiles_are_corrupt() {
        let mut row = row_for(Uuid::from_u128(1), Uuid::from_u128(2));
        std::mem::swap(&mut row.profile_a, &mut row.profile_b);

        assert!(Relationship::try_from(row).is_err());
    }

    #[test]
    fn changes_mirror_the_relationship() {
        let rel = Relationship::try_from(row_for(Uuid::new_v4(), Uuid::new_v4())).unwrap();
        let changes = RelationshipChanges::from(&rel);

        assert_eq!(changes.state, "pending");
        assert!(changes.liked_by_a);
        assert!(changes.matched_at.is_none());
    }
}
