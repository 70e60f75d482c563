// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication and authorization stages.
//!
//! Both are attached per route group with `route_layer`, so they only run for
//! routes that declared a [`Rule`]:
//!
//! ```rust,ignore
//! let admin = Router::new()
//!     .route("/test", get(handler))
//!     .route_layer(from_fn_with_state(Rule::AdminOnly, authorize))
//!     .route_layer(from_fn_with_state(state.clone(), authenticate));
//! ```
//!
//! The last `route_layer` runs first, so authentication always precedes
//! authorization.

use axum::{
    extract::{FromRequestParts, RawPathParams, Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use super::{authorize as evaluate, AuthError, Rule};
use crate::error::PipelineError;
use crate::pipeline::RequestContext;
use crate::state::AppState;

/// Verify the bearer token and attach its claims to the request context.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, PipelineError> {
    let ctx = request
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .ok_or_else(|| PipelineError::internal("request context missing"))?;

    let header = request
        .headers()
        .get(AUTHORIZATION)
        .map(|value| value.to_str().map_err(|_| AuthError::MalformedToken))
        .transpose()?;

    let claims = state.auth.authenticate(header, ctx.now())?;
    debug!(trace_id = %ctx.trace_id(), sub = %claims.sub, "Request authenticated");

    request.extensions_mut().insert(ctx.with_claims(claims));
    Ok(next.run(request).await)
}

/// Evaluate the route's rule against the authenticated claims.
pub async fn authorize(
    State(rule): State<Rule>,
    request: Request,
    next: Next,
) -> Result<Response, PipelineError> {
    let (mut parts, body) = request.into_parts();

    let ctx = parts
        .extensions
        .get::<RequestContext>()
        .cloned()
        .ok_or_else(|| PipelineError::internal("request context missing"))?;
    let claims = ctx.claims().ok_or(AuthError::MissingToken)?;

    let owner = match rule.owner_param() {
        Some(param) => {
            let params = RawPathParams::from_request_parts(&mut parts, &())
                .await
                .map_err(PipelineError::internal)?;
            let owner = params
                .iter()
                .find(|(key, _)| *key == param)
                .map(|(_, value)| value.to_string())
                .ok_or_else(|| {
                    PipelineError::Internal(format!("route has no path parameter {param}"))
                })?;
            Some(owner)
        }
        None => None,
    };

    evaluate(claims, rule, owner.as_deref())?;

    Ok(next.run(Request::from_parts(parts, body)).await)
}
