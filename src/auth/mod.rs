// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! RS256 bearer tokens signed with locally held RSA keys.
//!
//! ## Auth Flow
//!
//! 1. Client logs in with email and password (`POST /users/login`)
//! 2. Server signs a token with the active kid and returns it
//! 3. Client sends `Authorization: Bearer <token>`
//! 4. The authentication stage:
//!    - Reads `kid` from the token header and resolves its public key
//!    - Rejects expired tokens, then verifies signature and issuer
//!    - Attaches the verified [`Claims`] to the request context
//! 5. The authorization stage evaluates the route's [`Rule`]
//!
//! ## Security
//!
//! - Only RS256 is accepted; any other `alg` is rejected before key lookup
//! - Unknown kids are rejected, never retried against another key
//! - Clock skew tolerance for `iat` is 60 seconds; `exp` has none
//! - Clients only ever see `401 Unauthorized`; the precise cause is logged

pub mod authenticator;
pub mod claims;
pub mod error;
pub mod extractor;
pub mod keys;
pub mod middleware;
pub mod roles;
pub mod rules;
pub mod token;

pub use authenticator::{bearer_token, Authenticator};
pub use claims::{Claims, Principal};
pub use error::AuthError;
pub use extractor::Auth;
pub use keys::{KeyError, KeyStore};
pub use roles::Role;
pub use rules::{authorize, Denied, Rule, UnknownRule};
