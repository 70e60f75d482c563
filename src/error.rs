// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Pipeline errors and their translation to HTTP responses.
//!
//! [`PipelineError`]'s `IntoResponse` impl is the only place an error becomes
//! a response. Auth, authorization and internal failures are reported with the
//! generic status text; the precise cause travels in an [`ErrorRecord`]
//! response extension, which the logging stage writes to the request's log
//! line.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{AuthError, Denied};
use crate::store::DirectoryError;

/// One invalid input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub error: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            error: error.into(),
        }
    }
}

/// Accumulates field errors while validating a request.
#[derive(Debug, Default)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn push(&mut self, field: impl Into<String>, error: impl Into<String>) {
        self.0.push(FieldError::new(field, error));
    }

    /// Record `error` against `field` unless `valid` holds.
    pub fn check(&mut self, valid: bool, field: &str, error: &str) {
        if !valid {
            self.push(field, error);
        }
    }

    pub fn into_result(self) -> Result<(), PipelineError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::Validation(self.0))
        }
    }
}

/// Every failure a pipeline stage or handler can produce.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("data validation error")]
    Validation(Vec<FieldError>),
    #[error("authentication failed: {0}")]
    Auth(AuthError),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("{0}")]
    Conflict(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error envelope written to the client.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldError>>,
}

/// Server-side detail of a translated error, attached to the response.
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    pub kind: &'static str,
    pub detail: String,
}

impl PipelineError {
    pub fn validation(field: impl Into<String>, error: impl Into<String>) -> Self {
        PipelineError::Validation(vec![FieldError::new(field, error)])
    }

    pub fn internal(cause: impl std::fmt::Display) -> Self {
        PipelineError::Internal(cause.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            PipelineError::Validation(_) => StatusCode::BAD_REQUEST,
            PipelineError::Auth(_) => StatusCode::UNAUTHORIZED,
            PipelineError::Forbidden(_) => StatusCode::FORBIDDEN,
            PipelineError::NotFound(_) => StatusCode::NOT_FOUND,
            PipelineError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            PipelineError::Conflict(_) => StatusCode::CONFLICT,
            PipelineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "validation",
            PipelineError::Auth(_) => "auth",
            PipelineError::Forbidden(_) => "forbidden",
            PipelineError::NotFound(_) => "not_found",
            PipelineError::MethodNotAllowed => "method_not_allowed",
            PipelineError::Conflict(_) => "conflict",
            PipelineError::Internal(_) => "internal",
        }
    }

    /// Text that is safe to show the client.
    fn public_message(&self) -> String {
        match self {
            PipelineError::Validation(_) | PipelineError::MethodNotAllowed => self.to_string(),
            PipelineError::NotFound(msg) | PipelineError::Conflict(msg) => msg.clone(),
            PipelineError::Auth(_) | PipelineError::Forbidden(_) | PipelineError::Internal(_) => {
                self.status()
                    .canonical_reason()
                    .unwrap_or("Error")
                    .to_string()
            }
        }
    }

    fn detail(&self) -> String {
        match self {
            PipelineError::Validation(fields) => fields
                .iter()
                .map(|f| format!("{}: {}", f.field, f.error))
                .collect::<Vec<_>>()
                .join(", "),
            PipelineError::Auth(err) => format!("{} ({})", err, err.error_code()),
            other => other.to_string(),
        }
    }
}

impl From<AuthError> for PipelineError {
    fn from(err: AuthError) -> Self {
        if err.is_credential_failure() {
            PipelineError::Auth(err)
        } else {
            PipelineError::Internal(err.to_string())
        }
    }
}

impl From<Denied> for PipelineError {
    fn from(denied: Denied) -> Self {
        PipelineError::Forbidden(denied.to_string())
    }
}

impl From<JsonRejection> for PipelineError {
    fn from(rejection: JsonRejection) -> Self {
        PipelineError::validation("body", rejection.body_text())
    }
}

impl From<DirectoryError> for PipelineError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::DuplicateEmail => PipelineError::Conflict(err.to_string()),
            DirectoryError::NotFound => PipelineError::NotFound(err.to_string()),
            DirectoryError::InvalidCredentials => PipelineError::Auth(AuthError::InvalidCredentials),
            DirectoryError::Unavailable(_) => PipelineError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = self.status();
        let record = ErrorRecord {
            kind: self.kind(),
            detail: self.detail(),
        };
        let body = ErrorBody {
            error: self.public_message(),
            fields: match self {
                PipelineError::Validation(fields) => Some(fields),
                _ => None,
            },
        };

        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(record);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(err: PipelineError) -> (StatusCode, String, ErrorRecord) {
        let response = err.into_response();
        let status = response.status();
        let record = response.extensions().get::<ErrorRecord>().cloned().unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap(), record)
    }

    #[test]
    fn statuses_follow_error_category() {
        assert_eq!(PipelineError::validation("a", "b").status(), StatusCode::BAD_REQUEST);
        assert_eq!(PipelineError::Auth(AuthError::Expired).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(PipelineError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(PipelineError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            PipelineError::MethodNotAllowed.status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(PipelineError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            PipelineError::Internal("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn validation_error_lists_fields() {
        let mut errors = FieldErrors::default();
        errors.push("email", "invalid email format");
        errors.check(false, "password", "password is required");
        errors.check(true, "name", "never recorded");

        let (status, body, _) = body_of(errors.into_result().unwrap_err()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            r#"{"error":"data validation error","fields":[{"field":"email","error":"invalid email format"},{"field":"password","error":"password is required"}]}"#
        );
    }

    #[tokio::test]
    async fn auth_failures_share_one_generic_body() {
        for err in [AuthError::Expired, AuthError::BadSignature, AuthError::UnknownKey("k".into())] {
            let (status, body, record) = body_of(err.clone().into()).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body, r#"{"error":"Unauthorized"}"#);
            assert!(record.detail.contains(err.error_code()));
        }
    }

    #[tokio::test]
    async fn internal_error_hides_cause() {
        let (status, body, record) = body_of(PipelineError::internal("db exploded")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, r#"{"error":"Internal Server Error"}"#);
        assert_eq!(record.kind, "internal");
        assert!(record.detail.contains("db exploded"));
    }

    #[tokio::test]
    async fn not_found_and_conflict_keep_message() {
        let (_, body, _) = body_of(PipelineError::NotFound("user not found".into())).await;
        assert_eq!(body, r#"{"error":"user not found"}"#);

        let (status, body, _) = body_of(DirectoryError::DuplicateEmail.into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body, r#"{"error":"email already in use"}"#);
    }

    #[test]
    fn issuing_failures_become_internal() {
        let err: PipelineError = AuthError::KeyNotFound("k9".into()).into();
        assert!(matches!(err, PipelineError::Internal(_)));
    }

    #[test]
    fn invalid_credentials_are_unauthorized() {
        let err: PipelineError = DirectoryError::InvalidCredentials.into();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }
}
