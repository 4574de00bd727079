//! Advisory pair-state cache in Redis.
//!
//! Written after commits and read by the "are we matched?" endpoint. Entries
//! can be stale for up to the TTL; nothing on the write path reads them.

use kindred_shared::clients::redis::RedisClient;

use super::pair::PairKey;
use super::relationship::{Relationship, RelationshipState};

#[derive(Clone)]
pub struct PairStateCache {
    redis: RedisClient,
    ttl_secs: u64,
}

fn cache_key(key: &PairKey) -> String {
    format!("matching:pair_state:{key}")
}

impl PairStateCache {
    pub fn new(redis: RedisClient, ttl_secs: u64) -> Self {
        Self { redis, ttl_secs }
    }

    /// Cached state, or `None` on a miss. Redis errors count as a miss.
    pub async fn get(&self, key: &PairKey) -> Option<RelationshipState> {
        match self.redis.get(&cache_key(key)).await {
            Ok(Some(raw)) => raw.parse().ok(),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, pair_key = %key, "pair cache read failed");
                None
            }
        }
    }

    pub async fn put(&self, rel: &Relationship) {
        if let Err(e) = self
            .redis
            .set(&cache_key(&rel.pair_key), rel.state.as_str(), self.ttl_secs)
            .await
        {
            tracing::warn!(error = %e, pair_key = %rel.pair_key, "pair cache write failed");
        }
    }

    pub async fn ping(&self) -> Result<(), redis::RedisError> {
        self.redis.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::pair::normalize;
    use uuid::Uuid;

    #[test]
    fn key_is_order_independent() {
        let (x, y) = (Uuid::from_u128(5), Uuid::from_u128(2));
        let key = cache_key(&normalize(x, y).key);

        assert_eq!(key, cache_key(&normalize(y, x).key));
        assert_eq!(key, format!("matching:pair_state:{y}:{x}"));
    }
}
