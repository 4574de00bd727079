use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use kindred_shared::errors::AppResult;
use kindred_shared::types::api::ApiResponse;
use kindred_shared::types::auth::AuthUser;

use super::{apply_action, ActionResponse};
use crate::matching::{Action, MatchEvent};
use crate::AppState;

// ---------------------------------------------------------------------------
// POST /likes/:target_id
// ---------------------------------------------------------------------------

pub async fn like(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(target_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ActionResponse>>> {
    let outcome = apply_action(&state, auth_user.id, target_id, Action::Like).await?;

    tracing::info!(
        actor_id = %auth_user.id,
        target_id = %target_id,
        event = outcome.event.as_str(),
        "like recorded"
    );

    let body = ActionResponse::new(&outcome, auth_user.id);
    if outcome.event == MatchEvent::BecameMatched {
        return Ok(Json(ApiResponse::ok_with_message(body, "It's a match!")));
    }
    Ok(Json(ApiResponse::ok(body)))
}

// ---------------------------------------------------------------------------
// DELETE /likes/:target_id
// ---------------------------------------------------------------------------

pub async fn unlike(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(target_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ActionResponse>>> {
    let outcome = apply_action(&state, auth_user.id, target_id, Action::Unlike).await?;

    tracing::info!(actor_id = %auth_user.id, target_id = %target_id, "like withdrawn");

    Ok(Json(ApiResponse::ok(ActionResponse::new(&outcome, auth_user.id))))
}
