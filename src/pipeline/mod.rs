// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Request Pipeline
//!
//! Every request passes through an ordered chain of stages before reaching its
//! handler:
//!
//! | Stage     | Full chain | Reduced chain | Purpose                              |
//! |-----------|:----------:|:-------------:|--------------------------------------|
//! | Context   | yes        | yes           | trace id, capture time               |
//! | Logging   | yes        |               | one completion line per request      |
//! | Panic     | yes        |               | turn a handler panic into a 500      |
//! | Metrics   | yes        |               | request, error and in-flight counts  |
//! | Auth      | per route  |               | verify bearer token, attach claims   |
//! | Authorize | per route  |               | evaluate the route's [`Rule`]        |
//!
//! Probes (`/liveness`, `/readiness`, `/metrics`) and the API docs use the
//! reduced chain so that scraping them does not distort the request counters.

pub mod context;
pub mod logging;
pub mod metrics;
pub mod panic;

use std::sync::Arc;

use axum::{middleware::from_fn_with_state, Router};
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;

pub use context::{init_context, RequestContext, TRACE_ID_HEADER};
pub use metrics::Metrics;

use crate::auth::{middleware, Rule};
use crate::error::PipelineError;
use crate::state::AppState;

/// Wrap `routes` in the full chain. Unknown paths and unsupported methods
/// answer with the JSON error envelope.
pub fn full(routes: Router<AppState>, state: &AppState) -> Router<AppState> {
    routes
        .fallback(route_not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(
            ServiceBuilder::new()
                .layer(from_fn_with_state(state.clone(), init_context))
                .layer(logging::layer())
                .layer(CatchPanicLayer::custom(panic::recover(Arc::clone(
                    &state.metrics,
                ))))
                .layer(from_fn_with_state(Arc::clone(&state.metrics), metrics::track)),
        )
}

/// Wrap `routes` in the reduced chain used by probes.
pub fn reduced(routes: Router<AppState>, state: &AppState) -> Router<AppState> {
    routes.layer(from_fn_with_state(state.clone(), init_context))
}

/// Require an authenticated caller satisfying `rule` on every route in `routes`.
///
/// Must sit inside [`full`], which provides the request context.
pub fn guarded(routes: Router<AppState>, state: &AppState, rule: Rule) -> Router<AppState> {
    routes
        .route_layer(from_fn_with_state(rule, middleware::authorize))
        .route_layer(from_fn_with_state(state.clone(), middleware::authenticate))
}

async fn route_not_found() -> PipelineError {
    PipelineError::NotFound("route not found".to_string())
}

async fn method_not_allowed() -> PipelineError {
    PipelineError::MethodNotAllowed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::pipeline::metrics::{ERRORS_TOTAL, IN_FLIGHT, PANICS_TOTAL, REQUESTS_TOTAL};
    use crate::testing;
    use axum::{
        body::{to_bytes, Body},
        http::{header::AUTHORIZATION, Request, StatusCode},
        routing::get,
    };
    use tower::ServiceExt;

    async fn boom() -> &'static str {
        panic!("handler exploded")
    }

    fn app(state: &AppState) -> Router {
        let open = Router::new()
            .route("/ok", get(|| async { "ok" }))
            .route("/boom", get(boom));
        let admin = guarded(
            Router::new().route("/admin", get(|| async { "admin" })),
            state,
            Rule::AdminOnly,
        );
        let owner = guarded(
            Router::new().route("/users/{user_id}", get(|| async { "owner" })),
            state,
            Rule::Owner { param: "user_id" },
        );

        full(open.merge(admin).merge(owner), state).with_state(state.clone())
    }

    fn get_req(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn panic_is_contained_and_server_keeps_serving() {
        let state = testing::state();
        let app = app(&state);

        let response = app.clone().oneshot(get_req("/boom", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"{"error":"Internal Server Error"}"#);

        let response = app.oneshot(get_req("/ok", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        assert_eq!(state.metrics.value(PANICS_TOTAL), 1.0);
        assert_eq!(state.metrics.value(REQUESTS_TOTAL), 2.0);
        assert_eq!(state.metrics.value(IN_FLIGHT), 0.0);
    }

    #[tokio::test]
    async fn every_response_carries_a_trace_id() {
        let state = testing::state();
        let app = app(&state);

        for uri in ["/ok", "/admin", "/nowhere"] {
            let response = app.clone().oneshot(get_req(uri, None)).await.unwrap();
            assert!(response.headers().contains_key(&TRACE_ID_HEADER), "{uri}");
        }
    }

    #[tokio::test]
    async fn unknown_route_uses_error_envelope() {
        let state = testing::state();
        let response = app(&state).oneshot(get_req("/nowhere", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"{"error":"route not found"}"#);
        assert_eq!(state.metrics.value(ERRORS_TOTAL), 1.0);
    }

    #[tokio::test]
    async fn wrong_method_uses_error_envelope() {
        let state = testing::state();
        let request = Request::builder()
            .method("POST")
            .uri("/ok")
            .body(Body::empty())
            .unwrap();
        let response = app(&state).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(response.headers().contains_key(&TRACE_ID_HEADER));
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"{"error":"method not allowed"}"#);
        assert_eq!(state.metrics.value(ERRORS_TOTAL), 1.0);
    }

    #[tokio::test]
    async fn guarded_route_checks_authentication_before_rule() {
        let state = testing::state();
        let app = app(&state);
        let now = state.clock.now();

        let response = app.clone().oneshot(get_req("/admin", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let user = testing::token_for(&state.auth, "u1", &[Role::User], now);
        let response = app.clone().oneshot(get_req("/admin", Some(&user))).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let admin = testing::token_for(&state.auth, "a1", &[Role::Admin], now);
        let response = app.oneshot(get_req("/admin", Some(&admin))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn owner_rule_reads_path_parameter() {
        let state = testing::state();
        let app = app(&state);
        let now = state.clock.now();
        let token = testing::token_for(&state.auth, "u1", &[Role::User], now);

        let response = app
            .clone()
            .oneshot(get_req("/users/u1", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get_req("/users/u2", Some(&token))).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
