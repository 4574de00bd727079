//! Match notification dispatch.
//!
//! The coordinator calls a [`MatchNotifier`] at most once per committed
//! match or unmatch. Delivery is best-effort: any retrying happens inside the
//! notifier, and a final failure is reported back to be logged, never undone.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

use kindred_shared::clients::rabbitmq::{PublishError, RabbitMQClient};

use crate::events::publisher;
use crate::matching::pair::PairKey;

const MAX_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
#[error("notification dispatch failed: {0}")]
pub struct NotifyError(pub String);

impl From<PublishError> for NotifyError {
    fn from(err: PublishError) -> Self {
        Self(err.to_string())
    }
}

#[async_trait]
pub trait MatchNotifier: Send + Sync {
    /// Both participants liked each other.
    async fn notify_match(
        &self,
        key: &PairKey,
        profile_a: Uuid,
        profile_b: Uuid,
        matched_at: DateTime<Utc>,
    ) -> Result<(), NotifyError>;

    /// One participant ended an established match.
    async fn notify_unmatch(
        &self,
        key: &PairKey,
        profile_a: Uuid,
        profile_b: Uuid,
        unmatched_by: Uuid,
        unmatched_at: DateTime<Utc>,
    ) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, Copy)]
pub struct NotifyRetry {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl Default for NotifyRetry {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(100),
        }
    }
}

impl NotifyRetry {
    /// Exponential backoff for the given 1-based attempt, plus up to one base
    /// interval of jitter, capped at [`MAX_BACKOFF`].
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_backoff.as_millis() as u64;
        let exp = base.saturating_mul(1u64 << attempt.saturating_sub(1).min(16));
        let jitter = if base == 0 { 0 } else { rand::thread_rng().gen_range(0..=base) };
        Duration::from_millis(exp.saturating_add(jitter)).min(MAX_BACKOFF)
    }
}

/// Run `op` until it succeeds or `policy.max_attempts` is reached.
pub async fn with_retry<T, E, F, Fut>(policy: &NotifyRetry, what: &str, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    error = %e,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "{what} failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Publishes match lifecycle events to the `kindred.events` exchange; the
/// notification and messaging services fan them out to both participants.
pub struct RabbitMqNotifier {
    rabbitmq: RabbitMQClient,
    retry: NotifyRetry,
}

impl RabbitMqNotifier {
    pub fn new(rabbitmq: RabbitMQClient, retry: NotifyRetry) -> Self {
        Self { rabbitmq, retry }
    }
}

#[async_trait]
impl MatchNotifier for RabbitMqNotifier {
    async fn notify_match(
        &self,
        key: &PairKey,
        profile_a: Uuid,
        profile_b: Uuid,
        matched_at: DateTime<Utc>,
    ) -> Result<(), NotifyError> {
        let rabbitmq = &self.rabbitmq;
        with_retry(&self.retry, "match.created publish", move || {
            publisher::publish_match_created(rabbitmq, key, profile_a, profile_b, matched_at)
        })
        .await?;
        Ok(())
    }

    async fn notify_unmatch(
        &self,
        key: &PairKey,
        profile_a: Uuid,
        profile_b: Uuid,
        unmatched_by: Uuid,
        unmatched_at: DateTime<Utc>,
    ) -> Result<(), NotifyError> {
        let rabbitmq = &self.rabbitmq;
        with_retry(&self.retry, "match.ended publish", move || {
            publisher::publish_match_ended(
                rabbitmq,
                key,
                profile_a,
                profile_b,
                unmatched_by,
                unmatched_at,
            )
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> NotifyRetry {
        NotifyRetry {
            max_attempts: 3,
            base_backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = &AtomicU32::new(0);
        let result: Result<u32, String> = with_retry(&fast(), "publish", move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(format!("broker down ({n})"))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), String> = with_retry(&fast(), "publish", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("broker down".to_string())
        })
        .await;

        assert_eq!(result.unwrap_err(), "broker down");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let policy = NotifyRetry { max_attempts: 0, ..fast() };
        let calls = &AtomicU32::new(0);
        let _: Result<(), &str> = with_retry(&policy, "publish", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("nope")
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        let policy = NotifyRetry {
            max_attempts: 10,
            base_backoff: Duration::from_millis(100),
        };

        let first = policy.delay_for(1);
        assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(200));

        let third = policy.delay_for(3);
        assert!(third >= Duration::from_millis(400) && third <= Duration::from_millis(500));

        assert_eq!(policy.delay_for(30), MAX_BACKOFF);
    }
}
