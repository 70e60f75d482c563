// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token service endpoints, for other services that delegate auth decisions.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;

use super::users::TokenResponse;
use super::JsonBody;
use crate::auth::{authorize as evaluate, Auth, Claims, Rule};
use crate::error::{ErrorBody, PipelineError};
use crate::pipeline::RequestContext;
use crate::state::AppState;

/// Body of POST /auth/authorize
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AuthorizeRequest {
    /// Owner of the resource being accessed; empty when there is none.
    #[serde(default, rename = "userID")]
    pub user_id: String,
    /// `admin-only` or `user-only`.
    pub rule: String,
    pub claims: Claims,
}

/// Re-sign the caller's claims under another loaded kid.
#[utoipa::path(
    get,
    path = "/auth/token/{kid}",
    tag = "Auth",
    security(("bearer" = [])),
    params(
        ("kid" = String, Path, description = "Key id to sign with")
    ),
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 403, description = "Caller is not an admin", body = ErrorBody),
        (status = 500, description = "Kid has no signing key", body = ErrorBody)
    )
)]
pub async fn token(
    State(state): State<AppState>,
    ctx: RequestContext,
    Auth(claims): Auth,
    Path(kid): Path<String>,
) -> Result<Json<TokenResponse>, PipelineError> {
    let token = state.auth.issue(&kid, &claims)?;
    info!(trace_id = %ctx.trace_id(), sub = %claims.sub, %kid, "Token re-issued");
    Ok(Json(TokenResponse { token }))
}

/// Return the verified claims of the presented token.
#[utoipa::path(
    get,
    path = "/auth/authenticate",
    tag = "Auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Token is valid", body = Claims),
        (status = 401, description = "Unauthorized", body = ErrorBody)
    )
)]
pub async fn authenticate(Auth(claims): Auth) -> Json<Claims> {
    Json(claims)
}

/// Evaluate a named rule against supplied claims.
#[utoipa::path(
    post,
    path = "/auth/authorize",
    tag = "Auth",
    security(("bearer" = [])),
    request_body = AuthorizeRequest,
    responses(
        (status = 204, description = "Rule satisfied"),
        (status = 400, description = "Unknown rule", body = ErrorBody),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 403, description = "Rule denied", body = ErrorBody)
    )
)]
pub async fn authorize(
    JsonBody(request): JsonBody<AuthorizeRequest>,
) -> Result<StatusCode, PipelineError> {
    let rule: Rule = request
        .rule
        .parse()
        .map_err(|err| PipelineError::validation("rule", format!("{err}")))?;

    let owner = Some(request.user_id.as_str()).filter(|id| !id.is_empty());
    evaluate(&request.claims, rule, owner)?;
    Ok(StatusCode::NO_CONTENT)
}
