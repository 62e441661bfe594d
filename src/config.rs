// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, their defaults, and [`ServerConfig`], which
//! reads them once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `3001` |
//! | `DATA_DIR` | Directory holding the database file | `./data` |
//! | `SIGNING_KEY_PATH` | Ed25519 private key (PKCS#8 PEM) | `keys/demo.ed25519` |
//! | `VERIFYING_KEY_PATH` | Ed25519 public key (SPKI PEM) | `keys/demo.ed25519.pub` |
//! | `SESSION_TTL_SECS` | Token and session lifetime | `86400` |
//! | `SESSION_RETENTION_SECS` | How long expired sessions are kept | `604800` |
//! | `SWEEP_INTERVAL_SECS` | Session sweeper period | `3600` |
//! | `REQUEST_TIMEOUT_SECS` | Server request timeout | `10` |
//! | `INDENT_JSON` | Pretty-print JSON responses | `true` |
//! | `ADMIN_USER_IDS` | Comma-separated admin user ids | empty |
//! | `ADMIN_USERNAME` / `ADMIN_PASSWORD` | Seed an admin account | unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Environment variable name for the data directory.
///
/// The redb database file is created inside it on first start.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Private signing key. The server refuses to start if it cannot be loaded.
pub const SIGNING_KEY_PATH_ENV: &str = "SIGNING_KEY_PATH";

/// Public verifying key; must match the private key.
pub const VERIFYING_KEY_PATH_ENV: &str = "VERIFYING_KEY_PATH";

pub const SESSION_TTL_ENV: &str = "SESSION_TTL_SECS";
pub const SESSION_RETENTION_ENV: &str = "SESSION_RETENTION_SECS";
pub const SWEEP_INTERVAL_ENV: &str = "SWEEP_INTERVAL_SECS";
pub const REQUEST_TIMEOUT_ENV: &str = "REQUEST_TIMEOUT_SECS";
pub const INDENT_JSON_ENV: &str = "INDENT_JSON";
pub const ADMIN_USER_IDS_ENV: &str = "ADMIN_USER_IDS";
pub const ADMIN_USERNAME_ENV: &str = "ADMIN_USERNAME";
pub const ADMIN_PASSWORD_ENV: &str = "ADMIN_PASSWORD";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_SIGNING_KEY_PATH: &str = "keys/demo.ed25519";
pub const DEFAULT_VERIFYING_KEY_PATH: &str = "keys/demo.ed25519.pub";
pub const DEFAULT_SESSION_TTL_SECS: u64 = 86_400;
pub const DEFAULT_SESSION_RETENTION_SECS: u64 = 604_800;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3_600;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Upper bound for every duration setting (ten years).
pub const MAX_DURATION_SECS: u64 = 10 * 365 * 24 * 3_600;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} and {1} must be set together")]
    Incomplete(&'static str, &'static str),
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Credentials for the admin account seeded at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminSeed {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for AdminSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSeed")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything the process reads from its environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub signing_key_path: PathBuf,
    pub verifying_key_path: PathBuf,
    pub session_ttl: Duration,
    pub session_retention: Duration,
    pub sweep_interval: Duration,
    pub request_timeout: Duration,
    pub indent_json: bool,
    pub admin_user_ids: Vec<String>,
    pub admin_seed: Option<AdminSeed>,
    pub log_format: LogFormat,
}

impl ServerConfig {
    /// Read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`, which returns a variable's value
    /// if set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let host: IpAddr = parse_or(HOST_ENV, var(HOST_ENV), DEFAULT_HOST.parse().ok())?;
        let port: u16 = parse_or(PORT_ENV, var(PORT_ENV), Some(DEFAULT_PORT))?;

        let admin_seed = match (var(ADMIN_USERNAME_ENV), var(ADMIN_PASSWORD_ENV)) {
            (Some(username), Some(password)) => Some(AdminSeed { username, password }),
            (None, None) => None,
            _ => return Err(ConfigError::Incomplete(ADMIN_USERNAME_ENV, ADMIN_PASSWORD_ENV)),
        };

        let log_format = match var(LOG_FORMAT_ENV).as_deref().map(str::to_ascii_lowercase) {
            None => LogFormat::Pretty,
            Some(f) if f == "pretty" => LogFormat::Pretty,
            Some(f) if f == "json" => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: LOG_FORMAT_ENV,
                    value: other,
                    reason: "expected 'json' or 'pretty'".to_string(),
                })
            }
        };

        Ok(Self {
            bind_addr: SocketAddr::new(host, port),
            data_dir: var(DATA_DIR_ENV)
                .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())
                .into(),
            signing_key_path: var(SIGNING_KEY_PATH_ENV)
                .unwrap_or_else(|| DEFAULT_SIGNING_KEY_PATH.to_string())
                .into(),
            verifying_key_path: var(VERIFYING_KEY_PATH_ENV)
                .unwrap_or_else(|| DEFAULT_VERIFYING_KEY_PATH.to_string())
                .into(),
            session_ttl: seconds(SESSION_TTL_ENV, var(SESSION_TTL_ENV), DEFAULT_SESSION_TTL_SECS)?,
            session_retention: seconds(
                SESSION_RETENTION_ENV,
                var(SESSION_RETENTION_ENV),
                DEFAULT_SESSION_RETENTION_SECS,
            )?,
            sweep_interval: seconds(
                SWEEP_INTERVAL_ENV,
                var(SWEEP_INTERVAL_ENV),
                DEFAULT_SWEEP_INTERVAL_SECS,
            )?,
            request_timeout: seconds(
                REQUEST_TIMEOUT_ENV,
                var(REQUEST_TIMEOUT_ENV),
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?,
            indent_json: parse_or(INDENT_JSON_ENV, var(INDENT_JSON_ENV), Some(true))?,
            admin_user_ids: var(ADMIN_USER_IDS_ENV)
                .map(|ids| {
                    ids.split(',')
                        .map(str::trim)
                        .filter(|id| !id.is_empty())
                        .map(str::to_owned)
                        .collect()
                })
                .unwrap_or_default(),
            admin_seed,
            log_format,
        })
    }
}

fn parse_or<T>(name: &'static str, value: Option<String>, default: Option<T>) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        None => default.ok_or_else(|| ConfigError::Invalid {
            name,
            value: String::new(),
            reason: "no default available".to_string(),
        }),
    }
}

/// Number of seconds in `1..=MAX_DURATION_SECS`.
fn seconds(name: &'static str, value: Option<String>, default: u64) -> Result<Duration, ConfigError> {
    let secs: u64 = parse_or(name, value, Some(default))?;
    if !(1..=MAX_DURATION_SECS).contains(&secs) {
        return Err(ConfigError::Invalid {
            name,
            value: secs.to_string(),
            reason: format!("must be between 1 and {MAX_DURATION_SECS} seconds"),
        });
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config(&[]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3001".parse().unwrap());
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.signing_key_path, PathBuf::from("keys/demo.ed25519"));
        assert_eq!(config.session_ttl, Duration::from_secs(86_400));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert!(config.indent_json);
        assert!(config.admin_user_ids.is_empty());
        assert!(config.admin_seed.is_none());
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn values_are_read() {
        let config = config(&[
            (PORT_ENV, "8080"),
            (HOST_ENV, "127.0.0.1"),
            (SESSION_TTL_ENV, "60"),
            (INDENT_JSON_ENV, "false"),
            (ADMIN_USER_IDS_ENV, " a1, ,a2 "),
            (ADMIN_USERNAME_ENV, "root"),
            (ADMIN_PASSWORD_ENV, "hunter22"),
            (LOG_FORMAT_ENV, "JSON"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.session_ttl, Duration::from_secs(60));
        assert!(!config.indent_json);
        assert_eq!(config.admin_user_ids, vec!["a1", "a2"]);
        assert_eq!(config.admin_seed.unwrap().username, "root");
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn invalid_numbers_are_errors_not_defaults() {
        assert!(matches!(
            config(&[(PORT_ENV, "eighty")]),
            Err(ConfigError::Invalid { name: PORT_ENV, .. })
        ));
        assert!(matches!(
            config(&[(SESSION_TTL_ENV, "0")]),
            Err(ConfigError::Invalid { name: SESSION_TTL_ENV, .. })
        ));
        assert!(config(&[(LOG_FORMAT_ENV, "xml")]).is_err());
    }

    #[test]
    fn durations_beyond_ten_years_are_rejected() {
        for name in [SESSION_TTL_ENV, SESSION_RETENTION_ENV] {
            assert!(matches!(
                config(&[(name, "9000000000000")]),
                Err(ConfigError::Invalid { name: n, .. }) if n == name
            ));
        }

        let ceiling = MAX_DURATION_SECS.to_string();
        let config = config(&[(SESSION_TTL_ENV, ceiling.as_str())]).unwrap();
        assert_eq!(config.session_ttl, Duration::from_secs(MAX_DURATION_SECS));
        assert!(chrono::Duration::from_std(config.session_ttl)
            .ok()
            .and_then(|ttl| chrono::Utc::now().checked_add_signed(ttl))
            .is_some());
    }

    #[test]
    fn admin_seed_needs_both_halves() {
        assert!(matches!(
            config(&[(ADMIN_USERNAME_ENV, "root")]),
            Err(ConfigError::Incomplete(..))
        ));
    }

    #[test]
    fn admin_seed_debug_hides_password() {
        let seed = AdminSeed {
            username: "root".to_string(),
            password: "hunter22".to_string(),
        };
        assert!(!format!("{seed:?}").contains("hunter22"));
    }
}
