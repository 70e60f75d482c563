// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token claims and the principal they are minted from.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::roles::Role;

/// Default token lifetime.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

/// Identity returned by the login collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub roles: BTreeSet<Role>,
    pub name: String,
}

/// Claims carried in the token payload.
///
/// Field names follow the registered JWT claim names (`sub`, `iss`, `iat`,
/// `exp`) plus the custom `roles` and `name` claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Claims {
    /// Subject: the opaque user identifier.
    pub sub: String,
    /// Issuer; must match the configured issuer on verification.
    pub iss: String,
    /// Issued at (Unix seconds).
    pub iat: i64,
    /// Expires at (Unix seconds).
    pub exp: i64,
    /// Granted roles. Never empty for an authenticated principal.
    #[schema(value_type = Vec<Role>)]
    pub roles: BTreeSet<Role>,
    /// Display name.
    #[serde(default)]
    pub name: String,
}

impl Claims {
    /// Build the claims for a freshly authenticated principal.
    pub fn for_principal(
        principal: &Principal,
        issuer: impl Into<String>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            sub: principal.id.clone(),
            iss: issuer.into(),
            iat: now.timestamp(),
            exp: now
                .checked_add_signed(ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
                .timestamp(),
            roles: principal.roles.clone(),
            name: principal.name.clone(),
        }
    }

    /// Check if any granted role carries the required privilege.
    pub fn has_role(&self, required: Role) -> bool {
        self.roles.iter().any(|role| role.has_privilege(required))
    }

    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }

    /// True if the subject owns `owner_id` or the principal is an admin.
    pub fn owns_or_admin(&self, owner_id: &str) -> bool {
        self.sub == owner_id || self.is_admin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_principal() -> Principal {
        Principal {
            id: "user_123".to_string(),
            roles: BTreeSet::from([Role::User]),
            name: "Ada".to_string(),
        }
    }

    #[test]
    fn for_principal_sets_temporal_fields() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let claims = Claims::for_principal(
            &sample_principal(),
            "BackEnd",
            now,
            Duration::seconds(DEFAULT_TOKEN_TTL_SECS),
        );

        assert_eq!(claims.sub, "user_123");
        assert_eq!(claims.iss, "BackEnd");
        assert_eq!(claims.iat, now.timestamp());
        assert_eq!(claims.exp - claims.iat, 3600);
        assert_eq!(claims.exp, (now + Duration::hours(1)).timestamp());
    }

    #[test]
    fn unrepresentable_expiry_saturates() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let claims = Claims::for_principal(&sample_principal(), "BackEnd", now, Duration::MAX);

        assert_eq!(claims.exp, DateTime::<Utc>::MAX_UTC.timestamp());
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn serializes_with_registered_claim_names() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let claims = Claims::for_principal(&sample_principal(), "BackEnd", now, Duration::hours(1));
        let value = serde_json::to_value(&claims).unwrap();

        assert_eq!(value["sub"], "user_123");
        assert_eq!(value["roles"], serde_json::json!(["USER"]));
        assert_eq!(value["name"], "Ada");
        assert!(value["exp"].is_i64());
    }

    #[test]
    fn ownership_allows_subject_and_admin() {
        let now = Utc::now();
        let mut claims = Claims::for_principal(&sample_principal(), "BackEnd", now, Duration::hours(1));
        assert!(claims.owns_or_admin("user_123"));
        assert!(!claims.owns_or_admin("user_456"));

        claims.roles.insert(Role::Admin);
        assert!(claims.owns_or_admin("user_456"));
        assert!(claims.has_role(Role::User));
    }
}
