// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read once from the environment at startup and is
//! immutable afterwards.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `3000` |
//! | `AUTH_KEYS_FOLDER` | Directory of `{kid}.pem` files | `zarf/keys/` |
//! | `AUTH_ACTIVEKID` | Kid used to sign new tokens | Required |
//! | `AUTH_ISSUER` | Issuer written to and expected in tokens | `BackEnd` |
//! | `AUTH_TOKEN_TTL_SECS` | Token lifetime in seconds, at most one year | `3600` |
//! | `SHUTDOWN_TIMEOUT_SECS` | Bound on graceful shutdown | `60` |
//! | `CORS_ALLOWED_ORIGINS` | Comma-separated origins, or `*` | `*` |
//! | `READINESS_TIMEOUT_MS` | Bound on the readiness check | `1000` |
//! | `SEED_ADMIN_EMAIL` | Bootstrap admin account email | Optional |
//! | `SEED_ADMIN_PASSWORD` | Bootstrap admin account password | Optional |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=info` |

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::TimeDelta;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const KEYS_FOLDER_ENV: &str = "AUTH_KEYS_FOLDER";
pub const ACTIVE_KID_ENV: &str = "AUTH_ACTIVEKID";
pub const ISSUER_ENV: &str = "AUTH_ISSUER";
pub const TOKEN_TTL_ENV: &str = "AUTH_TOKEN_TTL_SECS";
pub const SHUTDOWN_TIMEOUT_ENV: &str = "SHUTDOWN_TIMEOUT_SECS";
pub const CORS_ORIGINS_ENV: &str = "CORS_ALLOWED_ORIGINS";
pub const READINESS_TIMEOUT_ENV: &str = "READINESS_TIMEOUT_MS";
pub const SEED_ADMIN_EMAIL_ENV: &str = "SEED_ADMIN_EMAIL";
pub const SEED_ADMIN_PASSWORD_ENV: &str = "SEED_ADMIN_PASSWORD";

/// Environment variable selecting the log output format.
///
/// # Values
/// - `json`: one JSON object per event, for log shippers
/// - anything else: human-readable output
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_KEYS_FOLDER: &str = "zarf/keys/";
const DEFAULT_ISSUER: &str = "BackEnd";
const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;
const MAX_TOKEN_TTL_SECS: u64 = 365 * 24 * 60 * 60;
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 60;
const DEFAULT_READINESS_TIMEOUT_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing configuration: {0}")]
    Missing(&'static str),
    #[error("invalid configuration: {key}={value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl LogFormat {
    pub fn from_env() -> Self {
        Self::parse(std::env::var(LOG_FORMAT_ENV).ok().as_deref())
    }

    fn parse(value: Option<&str>) -> Self {
        match value.map(str::to_ascii_lowercase).as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Origins allowed by the CORS layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    Any,
    List(Vec<String>),
}

impl FromStr for CorsOrigins {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s == "*" {
            return Ok(CorsOrigins::Any);
        }

        let origins: Vec<String> = s
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();

        if origins.iter().any(|o| o == "*") {
            return Err(ConfigError::Invalid {
                key: CORS_ORIGINS_ENV,
                value: s.to_string(),
            });
        }
        Ok(CorsOrigins::List(origins))
    }
}

/// Account created at startup when both seed variables are set.
#[derive(Clone, PartialEq, Eq)]
pub struct SeedAdmin {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for SeedAdmin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeedAdmin")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub keys_folder: PathBuf,
    pub active_kid: String,
    pub issuer: String,
    pub token_ttl: TimeDelta,
    pub shutdown_timeout: Duration,
    pub cors_origins: CorsOrigins,
    pub readiness_timeout: Duration,
    pub seed_admin: Option<SeedAdmin>,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = parse_or(&get, HOST_ENV, DEFAULT_HOST.parse().ok())?;
        let port = parse_or(&get, PORT_ENV, Some(DEFAULT_PORT))?;
        let keys_folder = get(KEYS_FOLDER_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_KEYS_FOLDER));
        let active_kid = get(ACTIVE_KID_ENV).ok_or(ConfigError::Missing(ACTIVE_KID_ENV))?;
        let issuer = get(ISSUER_ENV).unwrap_or_else(|| DEFAULT_ISSUER.to_string());

        let token_ttl_secs: u64 = parse_or(&get, TOKEN_TTL_ENV, Some(DEFAULT_TOKEN_TTL_SECS))?;
        let token_ttl = Some(token_ttl_secs)
            .filter(|secs| (1..=MAX_TOKEN_TTL_SECS).contains(secs))
            .and_then(|secs| TimeDelta::try_seconds(secs as i64))
            .ok_or_else(|| ConfigError::Invalid {
                key: TOKEN_TTL_ENV,
                value: token_ttl_secs.to_string(),
            })?;
        let shutdown_secs: u64 =
            parse_or(&get, SHUTDOWN_TIMEOUT_ENV, Some(DEFAULT_SHUTDOWN_TIMEOUT_SECS))?;
        let readiness_ms: u64 =
            parse_or(&get, READINESS_TIMEOUT_ENV, Some(DEFAULT_READINESS_TIMEOUT_MS))?;

        let cors_origins = match get(CORS_ORIGINS_ENV) {
            Some(value) => value.parse()?,
            None => CorsOrigins::Any,
        };

        let seed_admin = match (get(SEED_ADMIN_EMAIL_ENV), get(SEED_ADMIN_PASSWORD_ENV)) {
            (Some(email), Some(password)) => Some(SeedAdmin { email, password }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(SEED_ADMIN_PASSWORD_ENV)),
            (None, Some(_)) => return Err(ConfigError::Missing(SEED_ADMIN_EMAIL_ENV)),
        };

        Ok(Config {
            host,
            port,
            keys_folder,
            active_kid,
            issuer,
            token_ttl,
            shutdown_timeout: Duration::from_secs(shutdown_secs),
            cors_origins,
            readiness_timeout: Duration::from_millis(readiness_ms),
            seed_admin,
            log_format: LogFormat::parse(get(LOG_FORMAT_ENV).as_deref()),
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: Option<T>) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { key, value }),
        None => default.ok_or(ConfigError::Missing(key)),
    }
}
