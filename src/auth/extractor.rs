// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for verified claims.
//!
//! ```rust,ignore
//! async fn me(Auth(claims): Auth) -> Json<UserMeResponse> {
//!     // claims.sub is the authenticated user id
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::{AuthError, Claims};
use crate::error::PipelineError;
use crate::pipeline::RequestContext;
use crate::state::AppState;

/// Claims of the authenticated caller.
///
/// On guarded routes the claims attached by the authentication stage are
/// reused. Elsewhere the bearer token is verified here, at the request's
/// capture time.
pub struct Auth(pub Claims);

impl FromRequestParts<AppState> for Auth {
    type Rejection = PipelineError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let ctx = RequestContext::from_request_parts(parts, state).await?;
        if let Some(claims) = ctx.claims() {
            return Ok(Auth(claims.clone()));
        }

        let header = parts
            .headers
            .get(AUTHORIZATION)
            .map(|value| value.to_str().map_err(|_| AuthError::MalformedToken))
            .transpose()?;

        Ok(Auth(state.auth.authenticate(header, ctx.now())?))
    }
}
