// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints.

use std::collections::BTreeSet;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use super::JsonBody;
use crate::auth::{Auth, Claims, Role};
use crate::error::{ErrorBody, FieldErrors, PipelineError};
use crate::pipeline::RequestContext;
use crate::state::AppState;
use crate::store::{NewUser, User};

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    /// RS256 bearer token signed with the active kid.
    pub token: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirm: String,
}

/// Response for GET /users/me
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserMeResponse {
    pub user_id: String,
    pub name: String,
    #[schema(value_type = Vec<Role>)]
    pub roles: BTreeSet<Role>,
    pub issuer: String,
    /// Token expiry, seconds since the Unix epoch.
    pub expires_at: i64,
}

impl From<Claims> for UserMeResponse {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            name: claims.name,
            roles: claims.roles,
            issuer: claims.iss,
            expires_at: claims.exp,
        }
    }
}

/// Loose structural check: one `@`, non-empty local part, dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
                && !domain.ends_with('.')
        }
        None => false,
    }
}

/// Exchange email and password for a token.
#[utoipa::path(
    post,
    path = "/users/login",
    tag = "Users",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 400, description = "Invalid request body", body = ErrorBody),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ctx: RequestContext,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Result<Json<TokenResponse>, PipelineError> {
    let mut errors = FieldErrors::default();
    errors.check(is_valid_email(request.email.trim()), "email", "invalid email format");
    errors.check(!request.password.is_empty(), "password", "password is required");
    errors.into_result()?;

    let principal = state
        .users
        .authenticate(request.email.trim(), &request.password)
        .await?;

    let claims = state.auth.claims_for(&principal, ctx.now());
    let token = state.auth.issue(state.auth.active_kid(), &claims)?;

    info!(
        trace_id = %ctx.trace_id(),
        user_id = %principal.id,
        kid = %state.auth.active_kid(),
        "Token issued"
    );

    Ok(Json(TokenResponse { token }))
}

/// Create a regular user account.
#[utoipa::path(
    post,
    path = "/users/register",
    tag = "Users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid request body", body = ErrorBody),
        (status = 409, description = "Email already in use", body = ErrorBody)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ctx: RequestContext,
    JsonBody(request): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), PipelineError> {
    let mut errors = FieldErrors::default();
    errors.check(!request.name.trim().is_empty(), "name", "name is required");
    errors.check(is_valid_email(request.email.trim()), "email", "invalid email format");
    errors.check(
        request.password.chars().count() >= MIN_PASSWORD_LEN,
        "password",
        "password must be at least 8 characters",
    );
    errors.check(
        request.password == request.password_confirm,
        "password_confirm",
        "passwords do not match",
    );
    errors.into_result()?;

    let new_user = NewUser {
        name: request.name.trim().to_string(),
        email: request.email.trim().to_string(),
        password: request.password,
        roles: BTreeSet::from([Role::User]),
    };
    let user = state.users.register(new_user, ctx.now()).await?;

    info!(trace_id = %ctx.trace_id(), user_id = %user.id, "User registered");
    Ok((StatusCode::CREATED, Json(user)))
}

/// Get the current authenticated user's claims.
#[utoipa::path(
    get,
    path = "/users/me",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Caller identity", body = UserMeResponse),
        (status = 401, description = "Unauthorized - invalid or missing token", body = ErrorBody),
    )
)]
pub async fn me(Auth(claims): Auth) -> Json<UserMeResponse> {
    Json(claims.into())
}

/// Look up a user. Callers may only read their own account unless admin.
#[utoipa::path(
    get,
    path = "/users/{user_id}",
    tag = "Users",
    security(("bearer" = [])),
    params(
        ("user_id" = String, Path, description = "Identifier of the user")
    ),
    responses(
        (status = 200, description = "User", body = User),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 403, description = "Not the owner", body = ErrorBody),
        (status = 404, description = "No such user", body = ErrorBody)
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<User>, PipelineError> {
    Ok(Json(state.users.find(&user_id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use uuid::Uuid;

    fn ctx(state: &AppState) -> RequestContext {
        RequestContext::new(Uuid::new_v4(), state.clock.now())
    }

    fn registration(email: &str) -> RegisterRequest {
        RegisterRequest {
            name: "Ada".into(),
            email: email.into(),
            password: "correct horse".into(),
            password_confirm: "correct horse".into(),
        }
    }

    #[test]
    fn email_format() {
        assert!(is_valid_email("ada@example.com"));
        assert!(is_valid_email("a.b+c@mail.example.org"));
        assert!(!is_valid_email("ada"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("ada@localhost"));
        assert!(!is_valid_email("ada@example."));
        assert!(!is_valid_email("ada@@example.com"));
        assert!(!is_valid_email("ada lovelace@example.com"));
    }

    #[test]
    fn user_me_response_from_claims() {
        let now = chrono::Utc::now();
        let claims = testing::authenticator()
            .claims_for(&testing::principal("user_123", &[Role::User]), now);

        let response: UserMeResponse = claims.clone().into();
        assert_eq!(response.user_id, "user_123");
        assert_eq!(response.roles, BTreeSet::from([Role::User]));
        assert_eq!(response.issuer, "BackEnd");
        assert_eq!(response.expires_at, claims.exp);
    }

    #[tokio::test]
    async fn register_then_login_issues_token_for_new_user() {
        let state = testing::state();

        let (status, Json(user)) = register(
            State(state.clone()),
            ctx(&state),
            JsonBody(registration("Ada@Example.com")),
        )
        .await
        .expect("registration succeeds");
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.roles, BTreeSet::from([Role::User]));

        let Json(TokenResponse { token }) = login(
            State(state.clone()),
            ctx(&state),
            JsonBody(LoginRequest {
                email: "ada@example.com".into(),
                password: "correct horse".into(),
            }),
        )
        .await
        .expect("login succeeds");

        let header = format!("Bearer {token}");
        let claims = state
            .auth
            .authenticate(Some(header.as_str()), state.clock.now())
            .unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[tokio::test]
    async fn register_reports_every_invalid_field() {
        let state = testing::state();
        let request = RegisterRequest {
            name: " ".into(),
            email: "nope".into(),
            password: "short".into(),
            password_confirm: "different".into(),
        };

        let err = register(State(state.clone()), ctx(&state), JsonBody(request))
            .await
            .unwrap_err();
        let fields = match err {
            PipelineError::Validation(fields) => fields,
            other => panic!("expected validation error, got {other:?}"),
        };
        let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(names, ["name", "email", "password", "password_confirm"]);
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let state = testing::state();
        register(State(state.clone()), ctx(&state), JsonBody(registration("ada@example.com")))
            .await
            .unwrap();

        let err = register(State(state.clone()), ctx(&state), JsonBody(registration("ADA@example.com")))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Conflict(_)));
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let state = testing::state();
        register(State(state.clone()), ctx(&state), JsonBody(registration("ada@example.com")))
            .await
            .unwrap();

        let err = login(
            State(state.clone()),
            ctx(&state),
            JsonBody(LoginRequest {
                email: "ada@example.com".into(),
                password: "wrong horse".into(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn missing_user_is_not_found() {
        let state = testing::state();
        let err = get_user(State(state), Path("missing".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
    }
}
