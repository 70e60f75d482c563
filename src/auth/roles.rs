// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Roles carried in the `roles` claim.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A role granted to a principal.
///
/// Serialized in uppercase (`"ADMIN"`, `"USER"`) to match the token wire format.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Full administrative access; bypasses ownership checks.
    Admin,
    /// Regular authenticated user.
    User,
}

impl Role {
    /// Check if this role has at least the privileges of the required role.
    pub fn has_privilege(&self, required: Role) -> bool {
        match (self, required) {
            (Role::Admin, _) => true,
            (Role::User, Role::User) => true,
            _ => false,
        }
    }
}
