// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authorization rules.
//!
//! Rules are a closed set fixed at compile time. Each route declares the rule
//! it needs when it is registered; evaluation is a pure function of the
//! verified claims and, for ownership checks, the owner id taken from the
//! request.

use std::fmt;
use std::str::FromStr;

use super::{Claims, Role};

/// Authorization predicate attached to a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Caller must hold the admin role.
    AdminOnly,
    /// Any authenticated caller. If an owner id is supplied at evaluation
    /// time the caller must own it or be an admin.
    UserOnly,
    /// Caller must own the resource named by path parameter `param`, or be
    /// an admin.
    Owner { param: &'static str },
}

/// Denial produced by [`authorize`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("rule {rule} denied subject {subject}")]
pub struct Denied {
    pub rule: Rule,
    pub subject: String,
}

/// Rule name that does not match any known rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown rule: {0}")]
pub struct UnknownRule(pub String);

impl Rule {
    /// Path parameter holding the owner id, for ownership rules.
    pub fn owner_param(&self) -> Option<&'static str> {
        match self {
            Rule::Owner { param } => Some(param),
            _ => None,
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::AdminOnly => f.write_str("admin-only"),
            Rule::UserOnly => f.write_str("user-only"),
            Rule::Owner { param } => write!(f, "user-only({param})"),
        }
    }
}

impl FromStr for Rule {
    type Err = UnknownRule;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin-only" => Ok(Rule::AdminOnly),
            "user-only" => Ok(Rule::UserOnly),
            other => Err(UnknownRule(other.to_string())),
        }
    }
}

/// Evaluate `rule` for `claims`.
///
/// `owner` is the id of the resource being accessed, when the request
/// carries one. Admins always pass ownership checks.
pub fn authorize(claims: &Claims, rule: Rule, owner: Option<&str>) -> Result<(), Denied> {
    let allowed = match (rule, owner) {
        (Rule::AdminOnly, _) => claims.has_role(Role::Admin),
        (Rule::UserOnly, None) => true,
        (Rule::UserOnly, Some(owner)) | (Rule::Owner { .. }, Some(owner)) => {
            claims.owns_or_admin(owner)
        }
        (Rule::Owner { .. }, None) => claims.is_admin(),
    };

    if allowed {
        Ok(())
    } else {
        Err(Denied {
            rule,
            subject: claims.sub.clone(),
        })
    }
}
