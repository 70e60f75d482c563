// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signing key provider.
//!
//! Keys are read once at startup from a directory of `{kid}.pem` files. A file
//! holding a private key (PKCS#1 or PKCS#8) yields a signing and a verifying
//! key; a file holding only a public key yields a verify-only kid, which is how
//! retired keys stay usable for tokens that have not expired yet.
//!
//! ## Rotation
//!
//! The store is immutable. Rotating means building a new store with a
//! different active kid ([`KeyStore::with_active_kid`]); the loaded keys are
//! shared, so tokens signed under the previous active kid keep verifying.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use tracing::{debug, info};

const PEM_EXTENSION: &str = "pem";

/// Key provider errors.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("failed to read key directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read key file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("key {kid} could not be parsed: {reason}")]
    InvalidKey { kid: String, reason: String },
    #[error("key {kid} has unsupported PEM tag {tag:?}")]
    UnsupportedTag { kid: String, tag: String },
    #[error("key {0} is defined more than once")]
    DuplicateKid(String),
    #[error("active kid {0} is not loaded")]
    ActiveKidMissing(String),
    #[error("active kid {0} has no private key")]
    ActiveKidNotSigning(String),
    #[error("key not found: {0}")]
    NotFound(String),
}

#[derive(Clone)]
struct KeyEntry {
    private: Option<EncodingKey>,
    public: DecodingKey,
}

/// Immutable set of RSA keys indexed by kid, plus the active kid.
#[derive(Clone)]
pub struct KeyStore {
    keys: Arc<HashMap<String, KeyEntry>>,
    active_kid: String,
}

impl fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStore")
            .field("kids", &self.kids())
            .field("active_kid", &self.active_kid)
            .finish()
    }
}

impl KeyStore {
    /// Load every `*.pem` file in `dir`, using the file stem as the kid.
    ///
    /// # Errors
    /// Fails if the directory or any key file cannot be read or parsed, or if
    /// `active_kid` is not loaded with a private key.
    pub fn load_dir(dir: impl AsRef<Path>, active_kid: &str) -> Result<Self, KeyError> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir).map_err(|source| KeyError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut pems = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|source| KeyError::ReadDir {
                    path: dir.to_path_buf(),
                    source,
                })?
                .path();

            let is_pem = path.extension().and_then(|ext| ext.to_str()) == Some(PEM_EXTENSION);
            if !path.is_file() || !is_pem {
                debug!(path = %path.display(), "Skipping non-key file");
                continue;
            }
            let Some(kid) = path.file_stem().and_then(|stem| stem.to_str()) else {
                debug!(path = %path.display(), "Skipping key file with non-UTF-8 name");
                continue;
            };

            let bytes = fs::read(&path).map_err(|source| KeyError::ReadFile {
                path: path.clone(),
                source,
            })?;
            pems.push((kid.to_string(), bytes));
        }

        let store = Self::from_pems(pems, active_kid)?;
        info!(
            dir = %dir.display(),
            kids = ?store.kids(),
            active_kid = %store.active_kid,
            "Signing keys loaded"
        );
        Ok(store)
    }

    /// Build a store from in-memory `(kid, pem)` pairs.
    pub fn from_pems<I, K, P>(pems: I, active_kid: &str) -> Result<Self, KeyError>
    where
        I: IntoIterator<Item = (K, P)>,
        K: Into<String>,
        P: AsRef<[u8]>,
    {
        let mut keys = HashMap::new();
        for (kid, pem) in pems {
            let kid = kid.into();
            let entry = parse_entry(&kid, pem.as_ref())?;
            if keys.insert(kid.clone(), entry).is_some() {
                return Err(KeyError::DuplicateKid(kid));
            }
        }

        Self::with_keys(Arc::new(keys), active_kid)
    }

    fn with_keys(keys: Arc<HashMap<String, KeyEntry>>, active_kid: &str) -> Result<Self, KeyError> {
        match keys.get(active_kid) {
            None => return Err(KeyError::ActiveKidMissing(active_kid.to_string())),
            Some(entry) if entry.private.is_none() => {
                return Err(KeyError::ActiveKidNotSigning(active_kid.to_string()))
            }
            Some(_) => {}
        }

        Ok(Self {
            keys,
            active_kid: active_kid.to_string(),
        })
    }

    /// Return a store sharing these keys with a different active kid.
    pub fn with_active_kid(&self, kid: &str) -> Result<Self, KeyError> {
        Self::with_keys(Arc::clone(&self.keys), kid)
    }

    /// The kid used for all new issuance.
    pub fn active_kid(&self) -> &str {
        &self.active_kid
    }

    /// Loaded kids, sorted.
    pub fn kids(&self) -> Vec<&str> {
        let mut kids: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        kids.sort_unstable();
        kids
    }

    pub fn resolve_private(&self, kid: &str) -> Result<&EncodingKey, KeyError> {
        self.keys
            .get(kid)
            .and_then(|entry| entry.private.as_ref())
            .ok_or_else(|| KeyError::NotFound(kid.to_string()))
    }

    pub fn resolve_public(&self, kid: &str) -> Result<&DecodingKey, KeyError> {
        self.keys
            .get(kid)
            .map(|entry| &entry.public)
            .ok_or_else(|| KeyError::NotFound(kid.to_string()))
    }
}

fn invalid(kid: &str, reason: impl fmt::Display) -> KeyError {
    KeyError::InvalidKey {
        kid: kid.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_entry(kid: &str, bytes: &[u8]) -> Result<KeyEntry, KeyError> {
    let block = pem::parse(bytes).map_err(|e| invalid(kid, e))?;

    match block.tag() {
        "PRIVATE KEY" | "RSA PRIVATE KEY" => {
            let private = if block.tag() == "PRIVATE KEY" {
                RsaPrivateKey::from_pkcs8_der(block.contents()).map_err(|e| invalid(kid, e))?
            } else {
                RsaPrivateKey::from_pkcs1_der(block.contents()).map_err(|e| invalid(kid, e))?
            };
            let public_pem = RsaPublicKey::from(&private)
                .to_public_key_pem(LineEnding::LF)
                .map_err(|e| invalid(kid, e))?;

            Ok(KeyEntry {
                private: Some(EncodingKey::from_rsa_pem(bytes).map_err(|e| invalid(kid, e))?),
                public: DecodingKey::from_rsa_pem(public_pem.as_bytes())
                    .map_err(|e| invalid(kid, e))?,
            })
        }
        "PUBLIC KEY" | "RSA PUBLIC KEY" => {
            if block.tag() == "PUBLIC KEY" {
                RsaPublicKey::from_public_key_der(block.contents()).map_err(|e| invalid(kid, e))?;
            } else {
                RsaPublicKey::from_pkcs1_der(block.contents()).map_err(|e| invalid(kid, e))?;
            }

            Ok(KeyEntry {
                private: None,
                public: DecodingKey::from_rsa_pem(bytes).map_err(|e| invalid(kid, e))?,
            })
        }
        tag => Err(KeyError::UnsupportedTag {
            kid: kid.to_string(),
            tag: tag.to_string(),
        }),
    }
}
