//! In-memory relationship store for development and tests.
//!
//! Same contract as the Postgres store: one row per pair, version-guarded
//! writes. Data is lost on restart.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{CasOutcome, RelationshipStore, StoreError, StoreResult};
use crate::matching::pair::{NormalizedPair, PairKey};
use crate::matching::relationship::{Relationship, RelationshipState};

#[derive(Default)]
pub struct MemoryRelationshipStore {
    rows: Mutex<HashMap<PairKey, Relationship>>,
}

impl MemoryRelationshipStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(&self) -> StoreResult<MutexGuard<'_, HashMap<PairKey, Relationship>>> {
        self.rows
            .lock()
            .map_err(|_| StoreError::Unavailable("relationship map lock poisoned".into()))
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.rows().map(|rows| rows.len()).unwrap_or(0)
    }

    fn matched_for(rows: &HashMap<PairKey, Relationship>, profile_id: Uuid) -> Vec<Relationship> {
        rows.values()
            .filter(|r| r.state == RelationshipState::Matched)
            .filter(|r| r.profile_a == profile_id || r.profile_b == profile_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RelationshipStore for MemoryRelationshipStore {
    async fn get_or_create(&self, pair: &NormalizedPair) -> StoreResult<Relationship> {
        let mut rows = self.rows()?;
        let row = rows
            .entry(pair.key.clone())
            .or_insert_with(|| Relationship::new(pair, Utc::now()));
        Ok(row.clone())
    }

    async fn compare_and_swap(
        &self,
        key: &PairKey,
        expected_version: i64,
        next: &Relationship,
    ) -> StoreResult<CasOutcome> {
        let mut rows = self.rows()?;
        let Some(stored) = rows.get_mut(key) else {
            // purged underneath us; the caller re-reads and recreates
            return Ok(CasOutcome::Conflict);
        };
        if stored.version != expected_version {
            return Ok(CasOutcome::Conflict);
        }

        let mut committed = next.clone();
        committed.id = stored.id;
        committed.created_at = stored.created_at;
        committed.version = expected_version + 1;
        *stored = committed.clone();

        Ok(CasOutcome::Committed(committed))
    }

    async fn get(&self, key: &PairKey) -> StoreResult<Option<Relationship>> {
        Ok(self.rows()?.get(key).cloned())
    }

    async fn list_matched_for(
        &self,
        profile_id: Uuid,
        limit: u64,
        offset: u64,
    ) -> StoreResult<Vec<Relationship>> {
        let rows = self.rows()?;
        let mut matched = Self::matched_for(&rows, profile_id);
        drop(rows);
        matched.sort_by(|x, y| y.matched_at.cmp(&x.matched_at));

        Ok(matched
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count_matched_for(&self, profile_id: Uuid) -> StoreResult<u64> {
        let rows = self.rows()?;
        Ok(Self::matched_for(&rows, profile_id).len() as u64)
    }

    async fn purge_profile(&self, profile_id: Uuid) -> StoreResult<u64> {
        let mut rows = self.rows()?;
        let before = rows.len();
        rows.retain(|_, r| r.profile_a != profile_id && r.profile_b != profile_id);
        Ok((before - rows.len()) as u64)
    }

    async fn ping(&self) -> StoreResult<()> {
        self.rows().map(|_| ())
    }
}
