// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User directory and readiness collaborators.
//!
//! The authentication core only needs three things from user storage: check a
//! password, create an account, and look an account up by id. Those live behind
//! [`UserDirectory`] so a database-backed implementation can replace the
//! in-memory one without touching the pipeline.

use std::collections::{BTreeSet, HashMap};

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{Principal, Role};

/// User directory errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    #[error("email already in use")]
    DuplicateEmail,
    #[error("user not found")]
    NotFound,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("user directory unavailable: {0}")]
    Unavailable(String),
}

/// A registered user as exposed by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[schema(value_type = Vec<Role>)]
    pub roles: BTreeSet<Role>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.id.clone(),
            roles: self.roles.clone(),
            name: self.name.clone(),
        }
    }
}

/// Input for [`UserDirectory::register`]. Already validated.
#[derive(Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub roles: BTreeSet<Role>,
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("roles", &self.roles)
            .finish_non_exhaustive()
    }
}

/// Credential check and account storage used by the login flow.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Return the principal for valid credentials.
    ///
    /// # Errors
    /// `InvalidCredentials` for an unknown email or a wrong password; the two
    /// cases are deliberately indistinguishable.
    async fn authenticate(&self, email: &str, password: &str) -> Result<Principal, DirectoryError>;

    async fn register(&self, user: NewUser, now: DateTime<Utc>) -> Result<User, DirectoryError>;

    async fn find(&self, id: &str) -> Result<User, DirectoryError>;
}

/// Dependency check behind the readiness probe.
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    async fn check(&self) -> Result<(), String>;
}

struct StoredUser {
    user: User,
    /// Argon2id PHC string; carries its own salt and parameters.
    password_hash: String,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

fn hash_password(password: &str) -> Result<String, DirectoryError> {
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
        .map_err(|err| DirectoryError::Unavailable(format!("password salt: {err}")))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| DirectoryError::Unavailable(format!("password hash: {err}")))
}

fn verify_password(password: &str, stored: &str) -> bool {
    PasswordHash::new(stored)
        .and_then(|hash| Argon2::default().verify_password(password.as_bytes(), &hash))
        .is_ok()
}

/// Process-local user directory with Argon2id password hashes.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<String, StoredUser>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn authenticate(&self, email: &str, password: &str) -> Result<Principal, DirectoryError> {
        let email = normalize_email(email);
        let users = self.users.read().await;
        let stored = users
            .values()
            .find(|stored| stored.user.email == email)
            .ok_or(DirectoryError::InvalidCredentials)?;

        if verify_password(password, &stored.password_hash) {
            Ok(stored.user.principal())
        } else {
            Err(DirectoryError::InvalidCredentials)
        }
    }

    async fn register(&self, new_user: NewUser, now: DateTime<Utc>) -> Result<User, DirectoryError> {
        let email = normalize_email(&new_user.email);
        let password_hash = hash_password(&new_user.password)?;
        let mut users = self.users.write().await;
        if users.values().any(|stored| stored.user.email == email) {
            return Err(DirectoryError::DuplicateEmail);
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            name: new_user.name,
            email,
            roles: new_user.roles,
            created_at: now,
        };
        users.insert(
            user.id.clone(),
            StoredUser {
                user: user.clone(),
                password_hash,
            },
        );
        Ok(user)
    }

    async fn find(&self, id: &str) -> Result<User, DirectoryError> {
        self.users
            .read()
            .await
            .get(id)
            .map(|stored| stored.user.clone())
            .ok_or(DirectoryError::NotFound)
    }
}

#[async_trait]
impl ReadinessProbe for InMemoryUserDirectory {
    async fn check(&self) -> Result<(), String> {
        Ok(())
    }
}
