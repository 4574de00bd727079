use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use kindred_shared::clients::db::{self, DbPool};

use super::{CasOutcome, RelationshipStore, StoreError, StoreResult};
use crate::matching::pair::{NormalizedPair, PairKey};
use crate::matching::relationship::{Relationship, RelationshipState};
use crate::models::{NewRelationship, RelationshipChanges, RelationshipRow};
use crate::schema::relationships;

/// Relationship store backed by the `relationships` table.
///
/// Diesel is synchronous, so every query runs on the blocking pool. A query
/// that has started is never abandoned half-way: dropping the returned future
/// does not cancel the blocking task, and the statement itself is atomic.
#[derive(Clone)]
pub struct PgRelationshipStore {
    pool: DbPool,
}

fn db_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

impl PgRelationshipStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn run<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(db_err)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("blocking task failed: {e}")))?
    }
}

fn either_side(profile_id: Uuid) -> diesel::dsl::Or<
    diesel::dsl::Eq<relationships::profile_a, Uuid>,
    diesel::dsl::Eq<relationships::profile_b, Uuid>,
> {
    relationships::profile_a
        .eq(profile_id)
        .or(relationships::profile_b.eq(profile_id))
}

#[async_trait]
impl RelationshipStore for PgRelationshipStore {
    async fn get_or_create(&self, pair: &NormalizedPair) -> StoreResult<Relationship> {
        let pair = pair.clone();
        self.run(move |conn| {
            // losing a creation race is fine: someone else inserted the same row
            diesel::insert_into(relationships::table)
                .values(&NewRelationship {
                    pair_key: pair.key.as_str(),
                    profile_a: pair.profile_a,
                    profile_b: pair.profile_b,
                })
                .on_conflict(relationships::pair_key)
                .do_nothing()
                .execute(conn)
                .map_err(db_err)?;

            let row = relationships::table
                .filter(relationships::pair_key.eq(pair.key.as_str()))
                .select(RelationshipRow::as_select())
                .first::<RelationshipRow>(conn)
                .map_err(db_err)?;

            Relationship::try_from(row)
        })
        .await
    }

    async fn compare_and_swap(
        &self,
        key: &PairKey,
        expected_version: i64,
        next: &Relationship,
    ) -> StoreResult<CasOutcome> {
        let key = key.as_str().to_string();
        let changes = RelationshipChanges::from(next);

        self.run(move |conn| {
            let updated = diesel::update(
                relationships::table
                    .filter(relationships::pair_key.eq(key.as_str()))
                    .filter(relationships::version.eq(expected_version)),
            )
            .set((changes, relationships::version.eq(relationships::version + 1)))
            .returning(RelationshipRow::as_returning())
            .get_result::<RelationshipRow>(conn)
            .optional()
            .map_err(db_err)?;

            match updated {
                Some(row) => Ok(CasOutcome::Committed(Relationship::try_from(row)?)),
                None => Ok(CasOutcome::Conflict),
            }
        })
        .await
    }

    async fn get(&self, key: &PairKey) -> StoreResult<Option<Relationship>> {
        let key = key.as_str().to_string();
        self.run(move |conn| {
            relationships::table
                .filter(relationships::pair_key.eq(key.as_str()))
                .select(RelationshipRow::as_select())
                .first::<RelationshipRow>(conn)
                .optional()
                .map_err(db_err)?
                .map(Relationship::try_from)
                .transpose()
        })
        .await
    }

    async fn list_matched_for(
        &self,
        profile_id: Uuid,
        limit: u64,
        offset: u64,
    ) -> StoreResult<Vec<Relationship>> {
        self.run(move |conn| {
            relationships::table
                .filter(relationships::state.eq(RelationshipState::Matched.as_str()))
                .filter(either_side(profile_id))
                .order(relationships::matched_at.desc())
                .limit(limit as i64)
                .offset(offset as i64)
                .select(RelationshipRow::as_select())
                .load::<RelationshipRow>(conn)
                .map_err(db_err)?
                .into_iter()
                .map(Relationship::try_from)
                .collect()
        })
        .await
    }

    async fn count_matched_for(&self, profile_id: Uuid) -> StoreResult<u64> {
        self.run(move |conn| {
            let total: i64 = relationships::table
                .filter(relationships::state.eq(RelationshipState::Matched.as_str()))
                .filter(either_side(profile_id))
                .count()
                .get_result(conn)
                .map_err(db_err)?;
            Ok(total as u64)
        })
        .await
    }

    async fn purge_profile(&self, profile_id: Uuid) -> StoreResult<u64> {
        self.run(move |conn| {
            let deleted = diesel::delete(relationships::table.filter(either_side(profile_id)))
                .execute(conn)
                .map_err(db_err)?;
            Ok(deleted as u64)
        })
        .await
    }

    async fn ping(&self) -> StoreResult<()> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || db::ping(&pool))
            .await
            .map_err(db_err)?
            .map_err(StoreError::Unavailable)
    }
}
