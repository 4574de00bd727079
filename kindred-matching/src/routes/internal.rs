use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use kindred_shared::errors::{AppError, AppResult, ErrorCode};
use kindred_shared::types::api::ApiResponse;

use super::apply_action;
use crate::matching::{Action, MatchOutcome};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RecordActionRequest {
    pub actor_id: Uuid,
    pub target_id: Uuid,
    pub action: String,
}

#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub profile_id: Uuid,
    pub purged: u64,
}

fn parse_action(raw: &str) -> AppResult<Action> {
    raw.parse()
        .map_err(|e: String| AppError::new(ErrorCode::UnknownAction, e))
}

/// POST /internal/actions: record an action on behalf of another service (no auth)
pub async fn record_action(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RecordActionRequest>,
) -> AppResult<Json<ApiResponse<MatchOutcome>>> {
    let action = parse_action(&req.action)?;
    let outcome = apply_action(&state, req.actor_id, req.target_id, action).await?;

    tracing::debug!(
        actor_id = %req.actor_id,
        target_id = %req.target_id,
        action = action.as_str(),
        event = outcome.event.as_str(),
        "internal action recorded"
    );

    Ok(Json(ApiResponse::ok(outcome)))
}

/// DELETE /internal/profiles/:id/relationships: drop every relationship of a deleted account
pub async fn purge_profile(
    State(state): State<Arc<AppState>>,
    Path(profile_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<PurgeResponse>>> {
    let purged = state.coordinator.purge_profile(profile_id).await?;
    Ok(Json(ApiResponse::ok(PurgeResponse { profile_id, purged })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_parse_from_text() {
        assert_eq!(parse_action("like").unwrap(), Action::Like);
        assert_eq!(parse_action("Unmatch").unwrap(), Action::Unmatch);

        let err = parse_action("superlike").unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnknownAction);
    }

    #[test]
    fn request_body_shape() {
        let raw = serde_json::json!({
            "actor_id": Uuid::from_u128(1),
            "target_id": Uuid::from_u128(2),
            "action": "unlike",
        });
        let req: RecordActionRequest = serde_json::from_value(raw).unwrap();
        assert_eq!(parse_action(&req.action).unwrap(), Action::Unlike);
    }
}
