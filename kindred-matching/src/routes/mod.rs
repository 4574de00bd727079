use std::sync::Arc;

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use kindred_shared::errors::AppResult;
use kindred_shared::middleware::metrics_middleware;

use crate::matching::{Action, MatchEvent, MatchOutcome, Relationship, RelationshipState};
use crate::AppState;

pub mod health;
pub mod internal;
pub mod likes;
pub mod matches;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .route("/likes/:target_id", post(likes::like).delete(likes::unlike))
        .route("/matches", get(matches::list_matches))
        .route("/matches/check/:target_id", get(matches::check_match))
        .route("/matches/:target_id/unmatch", post(matches::unmatch))
        .route("/relationships/:target_id", get(matches::get_relationship))
        // Internal service-to-service endpoints (no auth)
        .route("/internal/actions", post(internal::record_action))
        .route("/internal/profiles/:id/relationships", delete(internal::purge_profile))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run one action with the configured deadline and refresh the pair cache.
pub(crate) async fn apply_action(
    state: &AppState,
    actor: Uuid,
    target: Uuid,
    action: Action,
) -> AppResult<MatchOutcome> {
    let deadline = Instant::now() + state.config.action_timeout();
    let outcome = state
        .coordinator
        .record_action(actor, target, action, deadline)
        .await?;

    if outcome.committed {
        state.cache.put(&outcome.relationship).await;
    }
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Response views
// ---------------------------------------------------------------------------

/// A relationship as seen by one of its participants.
#[derive(Debug, Serialize)]
pub struct RelationshipView {
    pub pair_key: String,
    pub partner_id: Uuid,
    pub state: RelationshipState,
    pub liked_by_me: bool,
    pub liked_by_partner: bool,
    pub matched_at: Option<DateTime<Utc>>,
    pub unmatched_at: Option<DateTime<Utc>>,
    pub unmatched_by: Option<Uuid>,
    pub version: i64,
}

impl RelationshipView {
    pub fn for_viewer(rel: &Relationship, viewer: Uuid) -> Self {
        let viewer_is_a = rel.profile_a == viewer;
        let (mine, theirs) = if viewer_is_a {
            (rel.liked_by_a, rel.liked_by_b)
        } else {
            (rel.liked_by_b, rel.liked_by_a)
        };

        Self {
            pair_key: rel.pair_key.to_string(),
            partner_id: if viewer_is_a { rel.profile_b } else { rel.profile_a },
            state: rel.state,
            liked_by_me: mine,
            liked_by_partner: theirs,
            matched_at: rel.matched_at,
            unmatched_at: rel.unmatched_at,
            unmatched_by: rel.unmatched_by,
            version: rel.version,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub state: RelationshipState,
    pub event: MatchEvent,
    pub matched: bool,
    pub relationship: RelationshipView,
}

impl ActionResponse {
    pub fn new(outcome: &MatchOutcome, viewer: Uuid) -> Self {
        Self {
            state: outcome.state,
            event: outcome.event,
            matched: outcome.state == RelationshipState::Matched,
            relationship: RelationshipView::for_viewer(&outcome.relationship, viewer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::pair::normalize;

    #[test]
    fn view_is_from_the_viewers_side() {
        let (lo, hi) = (Uuid::from_u128(1), Uuid::from_u128(2));
        let mut rel = Relationship::new(&normalize(hi, lo), Utc::now());
        rel.liked_by_b = true;
        rel.state = RelationshipState::Pending;

        let from_hi = RelationshipView::for_viewer(&rel, hi);
        assert_eq!(from_hi.partner_id, lo);
        assert!(from_hi.liked_by_me);
        assert!(!from_hi.liked_by_partner);

        let from_lo = RelationshipView::for_viewer(&rel, lo);
        assert_eq!(from_lo.partner_id, hi);
        assert!(!from_lo.liked_by_me);
        assert!(from_lo.liked_by_partner);
    }

    #[test]
    fn action_response_flags_matches() {
        let (p, q) = (Uuid::new_v4(), Uuid::new_v4());
        let mut rel = Relationship::new(&normalize(p, q), Utc::now());
        rel.liked_by_a = true;
        rel.liked_by_b = true;
        rel.state = RelationshipState::Matched;
        rel.matched_at = Some(Utc::now());

        let outcome = MatchOutcome {
            state: rel.state,
            event: MatchEvent::BecameMatched,
            relationship: rel,
            committed: true,
        };
        let json = serde_json::to_value(ActionResponse::new(&outcome, p)).unwrap();

        assert_eq!(json["matched"], true);
        assert_eq!(json["event"], "became_matched");
        assert_eq!(json["state"], "matched");
        assert_eq!(json["relationship"]["partner_id"], q.to_string());
    }
}
