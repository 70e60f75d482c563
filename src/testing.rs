// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared fixtures for unit tests.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, OnceLock};

use chrono::{DateTime, Duration, TimeZone, Utc};
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::RsaPrivateKey;

use crate::auth::{Authenticator, Claims, KeyStore, Principal, Role};
use crate::clock::Clock;
use crate::state::AppState;
use crate::store::InMemoryUserDirectory;

pub const ISSUER: &str = "BackEnd";

fn rsa_keys() -> &'static [RsaPrivateKey] {
    static KEYS: OnceLock<Vec<RsaPrivateKey>> = OnceLock::new();
    KEYS.get_or_init(|| {
        let mut rng = rand::thread_rng();
        (0..4)
            .map(|_| RsaPrivateKey::new(&mut rng, 2048).expect("generate rsa key"))
            .collect()
    })
}

/// PKCS#8 private key PEM for fixture key `i`.
pub fn private_pem(i: usize) -> String {
    rsa_keys()[i]
        .to_pkcs8_pem(LineEnding::LF)
        .expect("encode pkcs8")
        .to_string()
}

/// PKCS#1 private key PEM for fixture key `i`.
pub fn pkcs1_private_pem(i: usize) -> String {
    rsa_keys()[i]
        .to_pkcs1_pem(LineEnding::LF)
        .expect("encode pkcs1")
        .to_string()
}

/// SPKI public key PEM for fixture key `i`.
pub fn public_pem(i: usize) -> String {
    rsa_keys()[i]
        .to_public_key()
        .to_public_key_pem(LineEnding::LF)
        .expect("encode spki")
}

/// `k1` and `k2` can sign, `retired` only verifies. Active kid is `k1`.
pub fn key_store() -> KeyStore {
    KeyStore::from_pems(
        [
            ("k1", private_pem(0)),
            ("k2", private_pem(1)),
            ("retired", public_pem(2)),
        ],
        "k1",
    )
    .expect("fixture key store")
}

pub fn authenticator() -> Authenticator {
    Authenticator::new(key_store(), ISSUER)
}

/// Signs with a key the main fixture store has never seen.
pub fn foreign_authenticator() -> Authenticator {
    let keys = KeyStore::from_pems([("outsider", private_pem(3))], "outsider")
        .expect("foreign key store");
    Authenticator::new(keys, ISSUER)
}

/// Holds the private half of the `retired` key.
pub fn retired_signer() -> Authenticator {
    let keys =
        KeyStore::from_pems([("retired", private_pem(2))], "retired").expect("retired key store");
    Authenticator::new(keys, ISSUER)
}

pub fn principal(id: &str, roles: &[Role]) -> Principal {
    Principal {
        id: id.to_string(),
        roles: roles.iter().copied().collect::<BTreeSet<_>>(),
        name: format!("user {id}"),
    }
}

/// Sign a token for `id` with the active key, issued at `now`.
pub fn token_for(auth: &Authenticator, id: &str, roles: &[Role], now: DateTime<Utc>) -> String {
    let claims: Claims = auth.claims_for(&principal(id, roles), now);
    auth.issue(auth.active_kid(), &claims).expect("issue fixture token")
}

/// Settable clock for pipeline tests.
#[derive(Debug)]
pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.0.lock().expect("clock lock");
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().expect("clock lock")
    }
}

/// Application state over fixture keys, an empty directory and `clock`.
pub fn state_with_clock(clock: Arc<ManualClock>) -> AppState {
    AppState::new(
        Arc::new(authenticator()),
        Arc::new(InMemoryUserDirectory::new()),
    )
    .with_clock(clock)
}

pub fn state() -> AppState {
    state_with_clock(Arc::new(ManualClock::default()))
}
