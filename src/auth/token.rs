// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! RS256 token codec.
//!
//! Header: `{"alg":"RS256","typ":"JWT","kid":...}`. Payload: [`Claims`].
//!
//! Temporal checks run against the caller-supplied instant rather than the
//! system clock, so every stage of a request agrees on "now". They are applied
//! to the unverified payload before the signature check: an expired token is
//! reported as expired whatever its signature.

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode_header, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Deserialize;

use super::{AuthError, Claims};

/// The only accepted signing algorithm.
pub const ALGORITHM: Algorithm = Algorithm::RS256;

/// Tolerated clock skew for `iat`, in seconds.
pub const CLOCK_SKEW_LEEWAY: i64 = 60;

/// Temporal fields read before the signature is checked.
#[derive(Debug, Deserialize)]
struct TemporalClaims {
    iat: i64,
    exp: i64,
}

/// Sign `claims` with `key`, stamping `kid` into the header.
pub fn encode(kid: &str, claims: &Claims, key: &EncodingKey) -> Result<String, AuthError> {
    let mut header = Header::new(ALGORITHM);
    header.kid = Some(kid.to_string());

    jsonwebtoken::encode(&header, claims, key).map_err(|e| AuthError::Signing(e.to_string()))
}

/// Read the kid from an unverified token header.
///
/// Rejects tokens whose header cannot be parsed, that declare an algorithm
/// other than RS256, or that carry no kid.
pub fn signing_kid(token: &str) -> Result<String, AuthError> {
    let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;

    if header.alg != ALGORITHM {
        return Err(AuthError::UnsupportedAlgorithm(format!("{:?}", header.alg)));
    }

    header.kid.ok_or(AuthError::MalformedToken)
}

/// Verify `token` against `key` and return its claims.
pub fn decode(
    token: &str,
    key: &DecodingKey,
    issuer: &str,
    now: DateTime<Utc>,
) -> Result<Claims, AuthError> {
    check_lifetime(token, now)?;

    let mut validation = Validation::new(ALGORITHM);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.set_required_spec_claims(&["exp", "iss", "sub"]);
    validation.set_issuer(&[issuer]);

    let claims = jsonwebtoken::decode::<Claims>(token, key, &validation)
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature => AuthError::BadSignature,
            ErrorKind::InvalidIssuer => AuthError::IssuerMismatch,
            ErrorKind::InvalidAlgorithm => {
                AuthError::UnsupportedAlgorithm("mismatched key algorithm".to_string())
            }
            ErrorKind::ExpiredSignature => AuthError::Expired,
            ErrorKind::ImmatureSignature => AuthError::NotYetValid,
            _ => AuthError::MalformedToken,
        })?
        .claims;

    if claims.roles.is_empty() {
        return Err(AuthError::MalformedToken);
    }

    Ok(claims)
}

fn check_lifetime(token: &str, now: DateTime<Utc>) -> Result<(), AuthError> {
    let temporal = jsonwebtoken::dangerous::insecure_decode::<TemporalClaims>(token)
        .map_err(|_| AuthError::MalformedToken)?
        .claims;

    let now = now.timestamp();
    if now > temporal.exp {
        return Err(AuthError::Expired);
    }
    if temporal.iat > now + CLOCK_SKEW_LEEWAY {
        return Err(AuthError::NotYetValid);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::testing;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use chrono::Duration;
    use std::collections::BTreeSet;

    fn claims_at(now: DateTime<Utc>) -> Claims {
        Claims {
            sub: "user_123".to_string(),
            iss: "BackEnd".to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
            roles: BTreeSet::from([Role::User]),
            name: "Ada".to_string(),
        }
    }

    fn signed(claims: &Claims) -> (String, DecodingKey) {
        let store = testing::key_store();
        let token = encode("k1", claims, store.resolve_private("k1").unwrap()).unwrap();
        (token, store.resolve_public("k1").unwrap().clone())
    }

    /// Replace the payload segment, keeping header and signature.
    fn with_payload(token: &str, payload: &serde_json::Value) -> String {
        let parts: Vec<&str> = token.split('.').collect();
        let body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload).unwrap());
        format!("{}.{}.{}", parts[0], body, parts[2])
    }

    #[test]
    fn header_carries_kid_and_algorithm() {
        let now = Utc::now();
        let (token, _) = signed(&claims_at(now));

        let header = decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::RS256);
        assert_eq!(header.kid.as_deref(), Some("k1"));
        assert_eq!(signing_kid(&token).unwrap(), "k1");
    }

    #[test]
    fn decode_returns_original_claims() {
        let now = Utc::now();
        let claims = claims_at(now);
        let (token, key) = signed(&claims);

        assert_eq!(decode(&token, &key, "BackEnd", now).unwrap(), claims);
    }

    #[test]
    fn expired_token_is_rejected_even_with_bad_signature() {
        let now = Utc::now();
        let claims = claims_at(now);
        let (token, key) = signed(&claims);
        let later = now + Duration::hours(2);

        assert_eq!(decode(&token, &key, "BackEnd", later), Err(AuthError::Expired));

        let mut tampered = serde_json::to_value(&claims).unwrap();
        tampered["sub"] = "someone_else".into();
        let forged = with_payload(&token, &tampered);
        assert_eq!(decode(&forged, &key, "BackEnd", later), Err(AuthError::Expired));
    }

    #[test]
    fn tampered_payload_fails_signature() {
        let now = Utc::now();
        let claims = claims_at(now);
        let (token, key) = signed(&claims);

        let mut tampered = serde_json::to_value(&claims).unwrap();
        tampered["roles"] = serde_json::json!(["ADMIN"]);
        let forged = with_payload(&token, &tampered);

        assert_eq!(decode(&forged, &key, "BackEnd", now), Err(AuthError::BadSignature));
    }

    #[test]
    fn issuer_mismatch_is_rejected() {
        let now = Utc::now();
        let (token, key) = signed(&claims_at(now));

        assert_eq!(decode(&token, &key, "Other", now), Err(AuthError::IssuerMismatch));
    }

    #[test]
    fn future_issued_at_is_rejected() {
        let now = Utc::now();
        let (token, key) = signed(&claims_at(now + Duration::minutes(10)));

        assert_eq!(decode(&token, &key, "BackEnd", now), Err(AuthError::NotYetValid));
    }

    #[test]
    fn empty_roles_are_rejected() {
        let now = Utc::now();
        let mut claims = claims_at(now);
        claims.roles.clear();
        let (token, key) = signed(&claims);

        assert_eq!(decode(&token, &key, "BackEnd", now), Err(AuthError::MalformedToken));
    }

    #[test]
    fn garbage_is_malformed() {
        assert_eq!(signing_kid("not-a-token"), Err(AuthError::MalformedToken));
    }

    #[test]
    fn hmac_header_is_unsupported() {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT","kid":"k1"}"#);
        let payload = URL_SAFE_NO_PAD.encode(r#"{"sub":"x"}"#);
        let token = format!("{header}.{payload}.c2ln");

        assert!(matches!(
            signing_kid(&token),
            Err(AuthError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn missing_kid_is_malformed() {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(r#"{"sub":"x"}"#);
        let token = format!("{header}.{payload}.c2ln");

        assert_eq!(signing_kid(&token), Err(AuthError::MalformedToken));
    }
}
