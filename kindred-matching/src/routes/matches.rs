use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use kindred_shared::errors::{AppError, AppResult, ErrorCode};
use kindred_shared::types::api::ApiResponse;
use kindred_shared::types::auth::AuthUser;
use kindred_shared::types::pagination::{Paginated, PaginationParams};

use super::{apply_action, ActionResponse, RelationshipView};
use crate::matching::pair::normalize;
use crate::matching::{Action, BadArgument, MatchError, Relationship, RelationshipState};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct MatchSummary {
    pub pair_key: String,
    pub partner_id: Uuid,
    pub matched_at: Option<DateTime<Utc>>,
}

impl MatchSummary {
    fn for_viewer(rel: &Relationship, viewer: Uuid) -> Self {
        Self {
            pair_key: rel.pair_key.to_string(),
            partner_id: rel.partner_of(viewer).unwrap_or(rel.profile_b),
            matched_at: rel.matched_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CheckMatchResponse {
    pub matched: bool,
    pub state: RelationshipState,
    /// True when the answer came from the advisory cache and may be a few
    /// seconds stale.
    pub cached: bool,
}

// ---------------------------------------------------------------------------
// POST /matches/:target_id/unmatch
// ---------------------------------------------------------------------------

pub async fn unmatch(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(target_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ActionResponse>>> {
    let outcome = apply_action(&state, auth_user.id, target_id, Action::Unmatch).await?;

    tracing::info!(
        actor_id = %auth_user.id,
        target_id = %target_id,
        event = outcome.event.as_str(),
        "unmatch recorded"
    );

    Ok(Json(ApiResponse::ok(ActionResponse::new(&outcome, auth_user.id))))
}

// ---------------------------------------------------------------------------
// GET /matches
// ---------------------------------------------------------------------------

pub async fn list_matches(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<MatchSummary>>>> {
    let (items, total) = state
        .coordinator
        .list_matched_for(auth_user.id, params.limit(), params.offset())
        .await?;

    let items = items
        .iter()
        .map(|rel| MatchSummary::for_viewer(rel, auth_user.id))
        .collect();

    Ok(Json(ApiResponse::ok(Paginated::new(items, total, &params))))
}

// ---------------------------------------------------------------------------
// GET /matches/check/:target_id
// ---------------------------------------------------------------------------

pub async fn check_match(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(target_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<CheckMatchResponse>>> {
    if auth_user.id == target_id {
        return Err(MatchError::InvalidArgument(BadArgument::SelfAction).into());
    }

    let key = normalize(auth_user.id, target_id).key;
    if let Some(cached) = state.cache.get(&key).await {
        return Ok(Json(ApiResponse::ok(CheckMatchResponse {
            matched: cached == RelationshipState::Matched,
            state: cached,
            cached: true,
        })));
    }

    let current = match state.coordinator.get_relationship(auth_user.id, target_id).await? {
        Some(rel) => {
            state.cache.put(&rel).await;
            rel.state
        }
        None => RelationshipState::None,
    };

    Ok(Json(ApiResponse::ok(CheckMatchResponse {
        matched: current == RelationshipState::Matched,
        state: current,
        cached: false,
    })))
}

// ---------------------------------------------------------------------------
// GET /relationships/:target_id
// ---------------------------------------------------------------------------

pub async fn get_relationship(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(target_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<RelationshipView>>> {
    let rel = state
        .coordinator
        .get_relationship(auth_user.id, target_id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::RelationshipNotFound, "no relationship with this profile"))?;

    Ok(Json(ApiResponse::ok(RelationshipView::for_viewer(&rel, auth_user.id))))
}
