//! Durable relationship storage.
//!
//! Every write to a relationship goes through [`RelationshipStore::compare_and_swap`];
//! there is no unconditional update path.

use async_trait::async_trait;
use uuid::Uuid;

use crate::matching::pair::{NormalizedPair, PairKey};
use crate::matching::relationship::Relationship;

pub mod memory;
pub mod postgres;

pub use memory::MemoryRelationshipStore;
pub use postgres::PgRelationshipStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Transient: the backend could not be reached or the query failed.
    /// Always safe to retry.
    #[error("relationship store unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be mapped back to a relationship.
    #[error("corrupt relationship row {pair_key}: {reason}")]
    Corrupt { pair_key: String, reason: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of a version-guarded write.
#[derive(Debug, Clone)]
pub enum CasOutcome {
    /// The write landed; holds the stored row with its new version.
    Committed(Relationship),
    /// Another writer advanced the version since the snapshot was read.
    Conflict,
}

#[async_trait]
pub trait RelationshipStore: Send + Sync {
    /// Existing row for the pair, or a fresh one (state none, version 0).
    /// Concurrent first callers for the same pair all observe the same row.
    async fn get_or_create(&self, pair: &NormalizedPair) -> StoreResult<Relationship>;

    /// Persist `next` if the stored version still equals `expected_version`.
    /// The committed row carries `expected_version + 1`.
    async fn compare_and_swap(
        &self,
        key: &PairKey,
        expected_version: i64,
        next: &Relationship,
    ) -> StoreResult<CasOutcome>;

    async fn get(&self, key: &PairKey) -> StoreResult<Option<Relationship>>;

    /// Matched relationships involving `profile_id`, newest match first.
    async fn list_matched_for(
        &self,
        profile_id: Uuid,
        limit: u64,
        offset: u64,
    ) -> StoreResult<Vec<Relationship>>;

    async fn count_matched_for(&self, profile_id: Uuid) -> StoreResult<u64>;

    /// Delete every row referencing `profile_id`. Only used on account deletion.
    async fn purge_profile(&self, profile_id: Uuid) -> StoreResult<u64>;

    /// Cheap liveness probe for health checks.
    async fn ping(&self) -> StoreResult<()>;
}
