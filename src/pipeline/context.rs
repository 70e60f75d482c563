// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request-scoped context: trace id, capture time and verified claims.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::Claims;
use crate::error::PipelineError;
use crate::state::AppState;

/// Response header echoing the trace id.
pub static TRACE_ID_HEADER: HeaderName = HeaderName::from_static("x-trace-id");

/// Per-request values shared by every stage and the handler.
///
/// Inserted into the request extensions by [`init_context`]. The trace id and
/// capture time never change; claims are attached once by the authentication
/// stage.
#[derive(Debug, Clone)]
pub struct RequestContext {
    trace_id: Uuid,
    now: DateTime<Utc>,
    claims: Option<Arc<Claims>>,
}

impl RequestContext {
    pub fn new(trace_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            trace_id,
            now,
            claims: None,
        }
    }

    pub fn trace_id(&self) -> Uuid {
        self.trace_id
    }

    /// Instant the request entered the pipeline.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn claims(&self) -> Option<&Claims> {
        self.claims.as_deref()
    }

    pub(crate) fn with_claims(self, claims: Claims) -> Self {
        Self {
            claims: Some(Arc::new(claims)),
            ..self
        }
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = PipelineError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .ok_or_else(|| PipelineError::internal("request context missing"))
    }
}

/// First pipeline stage: assign a trace id and capture the request time.
pub async fn init_context(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let ctx = RequestContext::new(Uuid::new_v4(), state.clock.now());
    let trace_id = ctx.trace_id();
    request.extensions_mut().insert(ctx);

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&trace_id.to_string()) {
        response.headers_mut().insert(TRACE_ID_HEADER.clone(), value);
    }
    response
}
