// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::FromRequest,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{Claims, Role, Rule},
    config::CorsOrigins,
    error::{ErrorBody, FieldError, PipelineError},
    pipeline,
    state::AppState,
    store::User,
};

pub mod auth;
pub mod health;
pub mod users;

/// JSON body whose rejections become field-level validation errors.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(PipelineError))]
pub struct JsonBody<T>(pub T);

pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/users/login", post(users::login))
        .route("/users/register", post(users::register));

    let user_only = pipeline::guarded(
        Router::new()
            .route("/users/me", get(users::me))
            .route("/auth/authenticate", get(auth::authenticate))
            .route("/auth/authorize", post(auth::authorize)),
        &state,
        Rule::UserOnly,
    );

    let owner = pipeline::guarded(
        Router::new().route("/users/{user_id}", get(users::get_user)),
        &state,
        Rule::Owner { param: "user_id" },
    );

    let admin_only = pipeline::guarded(
        Router::new()
            .route("/test", get(health::test))
            .route("/test/auth", get(health::test))
            .route("/auth/token/{kid}", get(auth::token)),
        &state,
        Rule::AdminOnly,
    );

    let probes = Router::new()
        .route("/liveness", get(health::liveness))
        .route("/readiness", get(health::readiness))
        .route("/metrics", get(health::metrics));

    let docs = Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()));

    let api = pipeline::full(
        public.merge(user_only).merge(owner).merge(admin_only),
        &state,
    );

    api.merge(pipeline::reduced(probes.merge(docs), &state))
        .with_state(state)
}

/// CORS policy for the configured origins. Credentials are only allowed for
/// an explicit origin list.
pub fn cors(origins: &CorsOrigins) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    match origins {
        CorsOrigins::Any => layer.allow_origin(Any),
        CorsOrigins::List(list) => {
            let values: Vec<HeaderValue> = list
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!(%origin, "Ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            layer
                .allow_origin(AllowOrigin::list(values))
                .allow_credentials(true)
        }
    }
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        users::login,
        users::register,
        users::me,
        users::get_user,
        auth::token,
        auth::authenticate,
        auth::authorize,
        health::liveness,
        health::readiness,
        health::metrics,
        health::test
    ),
    components(
        schemas(
            Claims,
            Role,
            User,
            ErrorBody,
            FieldError,
            users::LoginRequest,
            users::RegisterRequest,
            users::TokenResponse,
            users::UserMeResponse,
            auth::AuthorizeRequest,
            health::StatusResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Users", description = "Login, registration and user lookup"),
        (name = "Auth", description = "Token service for other backends"),
        (name = "Health", description = "Probes and counters")
    )
)]
struct ApiDoc;
