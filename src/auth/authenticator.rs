// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token issuance and bearer authentication.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::claims::{Principal, DEFAULT_TOKEN_TTL_SECS};
use super::keys::{KeyError, KeyStore};
use super::{token, AuthError, Claims};

/// Issues and verifies tokens against an immutable [`KeyStore`].
#[derive(Debug, Clone)]
pub struct Authenticator {
    keys: KeyStore,
    issuer: String,
    token_ttl: Duration,
}

impl Authenticator {
    pub fn new(keys: KeyStore, issuer: impl Into<String>) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
            token_ttl: Duration::seconds(DEFAULT_TOKEN_TTL_SECS),
        }
    }

    /// Set the lifetime of issued tokens.
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Same issuer and lifetime, different active kid.
    pub fn rotate(&self, kid: &str) -> Result<Self, KeyError> {
        Ok(Self {
            keys: self.keys.with_active_kid(kid)?,
            issuer: self.issuer.clone(),
            token_ttl: self.token_ttl,
        })
    }

    pub fn active_kid(&self) -> &str {
        self.keys.active_kid()
    }

    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    /// Claims for `principal` issued at `now` with the configured lifetime.
    pub fn claims_for(&self, principal: &Principal, now: DateTime<Utc>) -> Claims {
        Claims::for_principal(principal, self.issuer.clone(), now, self.token_ttl)
    }

    /// Sign `claims` with the private key registered under `kid`.
    ///
    /// # Errors
    /// `KeyNotFound` if `kid` has no private key, `Signing` if encoding fails.
    pub fn issue(&self, kid: &str, claims: &Claims) -> Result<String, AuthError> {
        let key = self
            .keys
            .resolve_private(kid)
            .map_err(|_| AuthError::KeyNotFound(kid.to_string()))?;

        token::encode(kid, claims, key)
    }

    /// Verify the value of an `Authorization` header at instant `now`.
    pub fn authenticate(
        &self,
        authorization: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Claims, AuthError> {
        let bearer = bearer_token(authorization)?;
        let kid = token::signing_kid(bearer)?;
        let key = self
            .keys
            .resolve_public(&kid)
            .map_err(|_| AuthError::UnknownKey(kid.clone()))?;

        let claims = token::decode(bearer, key, &self.issuer, now)?;
        debug!(kid = %kid, sub = %claims.sub, "Token verified");
        Ok(claims)
    }
}

/// Strip the `Bearer` scheme (case-insensitive) from a header value.
pub fn bearer_token(authorization: Option<&str>) -> Result<&str, AuthError> {
    let value = authorization
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(AuthError::MissingToken)?;

    let (scheme, token) = value.split_once(' ').ok_or(AuthError::MalformedToken)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::MalformedToken);
    }

    Ok(token)
}
