// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

/// Authentication and token issuing failures.
///
/// Verification failures are distinct so they can be logged precisely, but
/// all of them reach the client as the same generic 401.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No Authorization header present
    #[error("authorization header is required")]
    MissingToken,
    /// Header is not `Bearer <token>` or the token is structurally invalid
    #[error("token is malformed")]
    MalformedToken,
    /// Header declares an algorithm other than RS256
    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),
    /// Token kid is absent from the key provider
    #[error("unknown signing key: {0}")]
    UnknownKey(String),
    /// Signature does not verify
    #[error("token signature is invalid")]
    BadSignature,
    /// `exp` is in the past
    #[error("token has expired")]
    Expired,
    /// `iat` is in the future
    #[error("token is not yet valid")]
    NotYetValid,
    /// `iss` differs from the configured issuer
    #[error("token issuer mismatch")]
    IssuerMismatch,
    /// Login collaborator rejected the credentials
    #[error("invalid credentials")]
    InvalidCredentials,
    /// Issuing with a kid that has no private key
    #[error("signing key not found: {0}")]
    KeyNotFound(String),
    /// Token encoding failed
    #[error("signing failed: {0}")]
    Signing(String),
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::MalformedToken => "malformed_token",
            AuthError::UnsupportedAlgorithm(_) => "unsupported_algorithm",
            AuthError::UnknownKey(_) => "unknown_key",
            AuthError::BadSignature => "bad_signature",
            AuthError::Expired => "expired",
            AuthError::NotYetValid => "not_yet_valid",
            AuthError::IssuerMismatch => "issuer_mismatch",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::KeyNotFound(_) => "key_not_found",
            AuthError::Signing(_) => "signing_error",
        }
    }

    /// True for failures caused by the caller's credentials (401), false for
    /// server-side issuing failures (500).
    pub fn is_credential_failure(&self) -> bool {
        !matches!(self, AuthError::KeyNotFound(_) | AuthError::Signing(_))
    }
}
