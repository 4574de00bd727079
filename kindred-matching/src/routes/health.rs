use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use kindred_shared::types::api::{HealthCheck, HealthResponse, HealthStatus};

use crate::AppState;

pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let (db, redis) = tokio::join!(state.coordinator.store().ping(), state.cache.ping());

    let rabbitmq = if state.rabbitmq.is_connected() {
        Ok(())
    } else {
        Err("channel closed")
    };

    let checks = vec![
        HealthCheck::from_probe("database", db),
        HealthCheck::from_probe("redis", redis),
        HealthCheck::from_probe("rabbitmq", rabbitmq),
    ];

    let resp = HealthResponse::healthy("kindred-matching", env!("CARGO_PKG_VERSION")).with_checks(checks);
    let status = match resp.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    (status, Json(resp))
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state.metrics_handle.render()
}
