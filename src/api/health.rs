// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;

use crate::pipeline::RequestContext;
use crate::state::AppState;

/// Simple status response.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub status: String,
}

/// Liveness probe handler.
///
/// Always returns 200 if the process is running.
/// Does not check dependencies - use readiness for that.
#[utoipa::path(
    get,
    path = "/liveness",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive")
    )
)]
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe handler.
///
/// Returns 200 only if the readiness check passes within its timeout.
#[utoipa::path(
    get,
    path = "/readiness",
    tag = "Health",
    responses(
        (status = 200, description = "Service is ready"),
        (status = 503, description = "Service is not ready")
    )
)]
pub async fn readiness(State(state): State<AppState>, ctx: RequestContext) -> StatusCode {
    match tokio::time::timeout(state.readiness_timeout, state.readiness.check()).await {
        Ok(Ok(())) => StatusCode::OK,
        Ok(Err(reason)) => {
            warn!(trace_id = %ctx.trace_id(), %reason, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
        Err(_) => {
            warn!(
                trace_id = %ctx.trace_id(),
                timeout_ms = state.readiness_timeout.as_millis() as u64,
                "Readiness check timed out"
            );
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Request counters since startup, in Prometheus text format.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Health",
    responses(
        (status = 200, description = "Current counters", body = String, content_type = "text/plain")
    )
)]
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    ([(CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], state.metrics.render())
}

/// Admin-only smoke test for the auth pipeline.
#[utoipa::path(
    get,
    path = "/test/auth",
    tag = "Health",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Caller is an admin", body = StatusResponse),
        (status = 401, description = "Missing or invalid token", body = crate::error::ErrorBody),
        (status = 403, description = "Caller is not an admin", body = crate::error::ErrorBody)
    )
)]
pub async fn test() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "OK".to_string(),
    })
}
