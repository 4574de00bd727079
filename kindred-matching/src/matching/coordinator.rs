//! Runs one like/unlike/unmatch end to end against the relationship store.

use chrono::Utc;
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use super::error::{BadArgument, MatchError};
use super::pair::{normalize, NormalizedPair, Side};
use super::relationship::{Action, MatchEvent, Relationship, RelationshipState};
use super::state_machine::{transition, InvalidTransition};
use crate::notify::MatchNotifier;
use crate::profiles::{ProfileResolver, ProfileStatus};
use crate::store::{CasOutcome, RelationshipStore};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Compare-and-swap attempts before giving up with `Conflict`.
    pub max_attempts: u32,
    /// Pause after a lost race, multiplied by the attempt number.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_millis(2),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchOutcome {
    pub state: RelationshipState,
    pub event: MatchEvent,
    pub relationship: Relationship,
    /// Whether this call wrote a new version. An unlike can commit with event `None`.
    #[serde(skip)]
    pub committed: bool,
}

impl MatchOutcome {
    fn unchanged(relationship: Relationship) -> Self {
        Self {
            state: relationship.state,
            event: MatchEvent::None,
            relationship,
            committed: false,
        }
    }

    fn committed(relationship: Relationship, event: MatchEvent) -> Self {
        Self {
            state: relationship.state,
            event,
            relationship,
            committed: true,
        }
    }
}

pub struct MatchCoordinator {
    store: Arc<dyn RelationshipStore>,
    profiles: Arc<dyn ProfileResolver>,
    notifier: Arc<dyn MatchNotifier>,
    policy: RetryPolicy,
}

impl MatchCoordinator {
    pub fn new(
        store: Arc<dyn RelationshipStore>,
        profiles: Arc<dyn ProfileResolver>,
        notifier: Arc<dyn MatchNotifier>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            profiles,
            notifier,
            policy,
        }
    }

    pub fn store(&self) -> &Arc<dyn RelationshipStore> {
        &self.store
    }

    /// Apply `action` by `actor` towards `target`.
    ///
    /// Returns once the new state is durable. The deadline is only checked
    /// between steps: a write that has been sent is always awaited, so a
    /// `Timeout` means nothing was committed by this call.
    #[tracing::instrument(skip(self, deadline), fields(pair_key = tracing::field::Empty))]
    pub async fn record_action(
        &self,
        actor: Uuid,
        target: Uuid,
        action: Action,
        deadline: Instant,
    ) -> Result<MatchOutcome, MatchError> {
        let (pair, side) = acting_pair(actor, target)?;
        tracing::Span::current().record("pair_key", pair.key.as_str());

        before(deadline, self.check_profiles(actor, target, action)).await??;

        let max_attempts = self.policy.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            if Instant::now() >= deadline {
                return Err(MatchError::Timeout);
            }

            // only a like may bring a row into existence
            let snapshot = match action {
                Action::Like => before(deadline, self.store.get_or_create(&pair)).await??,
                Action::Unlike | Action::Unmatch => {
                    match before(deadline, self.store.get(&pair.key)).await?? {
                        Some(row) => row,
                        None => return withdraw_without_row(&pair, side, action),
                    }
                }
            };
            let step = transition(&snapshot, side, action, Utc::now())?;

            if step.is_noop(&snapshot) {
                tracing::debug!(state = %snapshot.state, "action already reflected, nothing to write");
                record_metric(action, MatchEvent::None);
                return Ok(MatchOutcome::unchanged(snapshot));
            }

            // never raced against the deadline: once sent, the write must be observed
            match self
                .store
                .compare_and_swap(&pair.key, snapshot.version, &step.next)
                .await?
            {
                CasOutcome::Committed(committed) => {
                    tracing::debug!(
                        attempt,
                        version = committed.version,
                        state = %committed.state,
                        event = step.event.as_str(),
                        "relationship updated"
                    );
                    record_metric(action, step.event);
                    self.after_commit(&committed, step.event).await;
                    return Ok(MatchOutcome::committed(committed, step.event));
                }
                CasOutcome::Conflict => {
                    counter!("matching_cas_conflicts_total").increment(1);
                    tracing::debug!(attempt, expected_version = snapshot.version, "lost write race, retrying");

                    if attempt < max_attempts {
                        let pause = self.policy.backoff * attempt;
                        tokio::time::sleep_until((Instant::now() + pause).min(deadline)).await;
                    }
                }
            }
        }

        tracing::warn!(attempts = max_attempts, %actor, %target, "giving up after repeated write conflicts");
        Err(MatchError::Conflict {
            attempts: max_attempts,
        })
    }

    pub async fn get_relationship(&self, x: Uuid, y: Uuid) -> Result<Option<Relationship>, MatchError> {
        let (pair, _) = acting_pair(x, y)?;
        Ok(self.store.get(&pair.key).await?)
    }

    /// One page of `profile_id`'s matches plus the total count.
    pub async fn list_matched_for(
        &self,
        profile_id: Uuid,
        limit: u64,
        offset: u64,
    ) -> Result<(Vec<Relationship>, u64), MatchError> {
        let items = self.store.list_matched_for(profile_id, limit, offset).await?;
        let total = self.store.count_matched_for(profile_id).await?;
        Ok((items, total))
    }

    pub async fn purge_profile(&self, profile_id: Uuid) -> Result<u64, MatchError> {
        let purged = self.store.purge_profile(profile_id).await?;
        tracing::info!(%profile_id, purged, "relationships purged");
        Ok(purged)
    }

    async fn check_profiles(&self, actor: Uuid, target: Uuid, action: Action) -> Result<(), MatchError> {
        self.require_active(actor).await?;
        // withdrawing never depends on the other side still being around
        if action == Action::Like {
            self.require_active(target).await?;
        }
        Ok(())
    }

    async fn require_active(&self, profile_id: Uuid) -> Result<(), MatchError> {
        let status = self
            .profiles
            .status(profile_id)
            .await
            .map_err(|e| MatchError::ProfileResolverUnavailable(e.to_string()))?;

        match status {
            ProfileStatus::Active => Ok(()),
            ProfileStatus::Inactive => Err(MatchError::ProfileInactive(profile_id)),
            ProfileStatus::Missing => Err(MatchError::ProfileNotFound(profile_id)),
        }
    }

    async fn after_commit(&self, rel: &Relationship, event: MatchEvent) {
        let result = match event {
            MatchEvent::BecameMatched => {
                counter!("matching_matches_total").increment(1);
                let Some(matched_at) = rel.matched_at else {
                    return;
                };
                self.notifier
                    .notify_match(&rel.pair_key, rel.profile_a, rel.profile_b, matched_at)
                    .await
            }
            MatchEvent::BecameUnmatched => {
                let (Some(by), Some(at)) = (rel.unmatched_by, rel.unmatched_at) else {
                    return;
                };
                self.notifier
                    .notify_unmatch(&rel.pair_key, rel.profile_a, rel.profile_b, by, at)
                    .await
            }
            MatchEvent::None | MatchEvent::BecamePending => return,
        };

        if let Err(e) = result {
            counter!("matching_dispatch_failures_total", "event" => event.as_str()).increment(1);
            tracing::error!(error = %e, pair_key = %rel.pair_key, event = event.as_str(), "match notification not delivered");
        }
    }
}

fn acting_pair(actor: Uuid, target: Uuid) -> Result<(NormalizedPair, Side), MatchError> {
    if actor == target {
        return Err(MatchError::InvalidArgument(BadArgument::SelfAction));
    }
    let pair = normalize(actor, target);
    let side = pair
        .side_of(actor)
        .ok_or(MatchError::InvalidArgument(BadArgument::NotInPair))?;
    Ok((pair, side))
}

/// Unlike or unmatch on a pair with no row. The answer comes from a blank
/// relationship that is never stored.
fn withdraw_without_row(pair: &NormalizedPair, side: Side, action: Action) -> Result<MatchOutcome, MatchError> {
    let blank = Relationship::new(pair, Utc::now());
    let step = transition(&blank, side, action, Utc::now())?;
    if !step.is_noop(&blank) {
        return Err(InvalidTransition {
            state: blank.state,
            action,
        }
        .into());
    }
    tracing::debug!(action = action.as_str(), "no relationship to withdraw from");
    record_metric(action, MatchEvent::None);
    Ok(MatchOutcome::unchanged(blank))
}

/// Run a cancellable step, failing with `Timeout` if the deadline passes first.
async fn before<T>(deadline: Instant, fut: impl std::future::Future<Output = T>) -> Result<T, MatchError> {
    tokio::time::timeout_at(deadline, fut)
        .await
        .map_err(|_| MatchError::Timeout)
}

fn record_metric(action: Action, event: MatchEvent) {
    counter!(
        "matching_actions_total",
        "action" => action.as_str(),
        "event" => event.as_str()
    )
    .increment(1);
}
