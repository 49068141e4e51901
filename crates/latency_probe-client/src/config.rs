// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Probe configuration from the environment.
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `MQTT_ENCRYPTION_KEY` | required | 64 hex chars, the 32-byte ChaCha20 key |
//! | `NTP_SERVER` | `time.nist.gov` | SNTP authority host |
//! | `NTP_CACHE_DURATION` | `30` | offset validity window, seconds |
//! | `NTP_TIMEOUT` | `5` | per-query timeout, seconds |
//! | `LATENCY_DB_PATH` | `database.db` | SQLite database file |

use std::path::PathBuf;
use std::time::Duration;

use latency_proto::key::Key;

use crate::authority::{DEFAULT_TIMEOUT, NtpAuthority};
use crate::clock::{ClockSource, DEFAULT_VALIDITY};
use crate::error::ConfigError;

/// Encryption key variable.
pub const ENV_KEY: &str = "MQTT_ENCRYPTION_KEY";
/// Authority host variable.
pub const ENV_NTP_SERVER: &str = "NTP_SERVER";
/// Validity window variable.
pub const ENV_CACHE_DURATION: &str = "NTP_CACHE_DURATION";
/// Query timeout variable.
pub const ENV_NTP_TIMEOUT: &str = "NTP_TIMEOUT";
/// Database path variable.
pub const ENV_DB_PATH: &str = "LATENCY_DB_PATH";

/// Default SNTP authority.
pub const DEFAULT_NTP_SERVER: &str = "time.nist.gov";
/// Default database file.
pub const DEFAULT_DB_PATH: &str = "database.db";

/// Everything needed to assemble a [`Probe`](crate::probe::Probe).
#[derive(Clone, Debug)]
pub struct ProbeConfig {
    /// Shared ChaCha20 key.
    pub key: Key,
    /// SNTP authority host.
    pub ntp_server: String,
    /// Offset validity window.
    pub cache_duration: Duration,
    /// Per-query timeout.
    pub query_timeout: Duration,
    /// SQLite database file.
    pub db_path: PathBuf,
}

impl ProbeConfig {
    /// Defaults for everything except the key.
    pub fn new(key: Key) -> Self {
        ProbeConfig {
            key,
            ntp_server: DEFAULT_NTP_SERVER.to_string(),
            cache_duration: DEFAULT_VALIDITY,
            query_timeout: DEFAULT_TIMEOUT,
            db_path: PathBuf::from(DEFAULT_DB_PATH),
        }
    }

    /// Read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`, which maps a variable name to its
    /// value. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let key_hex = get(ENV_KEY).ok_or(ConfigError::MissingVar { name: ENV_KEY })?;
        let mut config = ProbeConfig::new(Key::from_hex(&key_hex)?);

        if let Some(server) = get(ENV_NTP_SERVER) {
            config.ntp_server = server.trim().to_string();
        }
        if let Some(raw) = get(ENV_CACHE_DURATION) {
            config.cache_duration = parse_seconds(ENV_CACHE_DURATION, &raw)?;
        }
        if let Some(raw) = get(ENV_NTP_TIMEOUT) {
            config.query_timeout = parse_seconds(ENV_NTP_TIMEOUT, &raw)?;
        }
        if let Some(path) = get(ENV_DB_PATH) {
            config.db_path = PathBuf::from(path);
        }
        Ok(config)
    }

    /// Replace the authority host.
    pub fn with_ntp_server(mut self, server: impl Into<String>) -> Self {
        self.ntp_server = server.into();
        self
    }

    /// Replace the validity window.
    pub fn with_cache_duration(mut self, window: Duration) -> Self {
        self.cache_duration = window;
        self
    }

    /// Replace the per-query timeout.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Replace the database path.
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    /// The configured SNTP authority.
    pub fn authority(&self) -> NtpAuthority {
        NtpAuthority::new(self.ntp_server.clone()).with_timeout(self.query_timeout)
    }

    /// A clock over the configured authority and window.
    pub fn clock(&self) -> ClockSource {
        ClockSource::builder(std::sync::Arc::new(self.authority()))
            .validity(self.cache_duration)
            .build()
    }
}

// Positive, finite seconds.
fn parse_seconds(name: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidNumber {
        name,
        value: raw.to_string(),
    };
    let secs: f64 = raw.trim().parse().map_err(|_| invalid())?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(invalid());
    }
    Duration::try_from_secs_f64(secs).map_err(|_| invalid())
}
