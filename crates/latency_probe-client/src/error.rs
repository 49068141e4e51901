// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Custom error types for the latency probe client.
//!
//! Only [`ProbeError`] ever reaches callers of
//! [`Probe::measure`](crate::probe::Probe::measure). Clock failures are
//! absorbed inside [`ClockSource`](crate::clock::ClockSource) and store
//! failures are reduced to a `database_saved: false` flag, so neither appears
//! here as a request-level error.
//!
//! Callers that need the precise decryption failure can match on the inner
//! [`DecryptError`]:
//!
//! ```
//! use latency_client::error::ProbeError;
//! use latency_proto::error::{DecryptError, FormatError};
//!
//! fn describe(err: &ProbeError) -> &'static str {
//!     match err {
//!         ProbeError::Decrypt(DecryptError::Format(FormatError::TooShort { .. })) => "truncated",
//!         ProbeError::Decrypt(DecryptError::Format(_)) => "not a frame",
//!         ProbeError::Decrypt(DecryptError::Decode(_)) => "wrong key or corrupt",
//!         ProbeError::MissingPayload => "empty",
//!     }
//! }
//! ```

// Re-export proto error types so callers need only one import path.
pub use latency_proto::error::{DecodeError, DecryptError, FormatError, ParseError};
pub use latency_proto::key::KeyError;

use std::fmt;
use std::io;

/// Errors returned to the caller of a decrypt-and-measure request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProbeError {
    /// The request carried no payload.
    MissingPayload,
    /// The payload could not be decrypted to JSON.
    Decrypt(DecryptError),
}

impl ProbeError {
    /// A stable tag naming the failure kind.
    pub fn error_type(&self) -> &'static str {
        match self {
            ProbeError::MissingPayload => "MissingPayload",
            ProbeError::Decrypt(e) => e.kind(),
        }
    }

    /// The error response body returned by the request surface.
    pub fn to_response(&self) -> serde_json::Value {
        match self {
            ProbeError::MissingPayload => serde_json::json!({
                "status": "error",
                "message": self.to_string(),
            }),
            ProbeError::Decrypt(_) => serde_json::json!({
                "status": "error",
                "message": format!("Failed to process payload: {self}"),
                "error_type": self.error_type(),
            }),
        }
    }
}

/// Configuration errors.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// A required environment variable is unset or empty.
    MissingVar {
        /// Name of the variable.
        name: &'static str,
    },
    /// The encryption key is malformed.
    InvalidKey(KeyError),
    /// A numeric setting did not parse or was out of range.
    InvalidNumber {
        /// Name of the variable.
        name: &'static str,
        /// The rejected value.
        value: String,
    },
}

/// Persistence errors from a [`Store`](crate::store::Store).
#[derive(Debug)]
pub enum StoreError {
    /// The store is disabled and drops every measurement.
    Disabled,
    /// The store's internal lock was poisoned by a panicking writer.
    Poisoned,
    /// The blocking persistence task failed to complete.
    Task(String),
    /// SQLite rejected the statement.
    #[cfg(feature = "sqlite")]
    Sqlite(rusqlite::Error),
    /// Underlying I/O error (creating the database directory, etc.).
    Io(io::Error),
}

// ── Display implementations ─────────────────────────────────────────

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::MissingPayload => write!(f, "No payload found in request data"),
            ProbeError::Decrypt(e) => write!(f, "{e}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingVar { name } => {
                write!(f, "{name} environment variable is not set")
            }
            ConfigError::InvalidKey(e) => write!(f, "invalid encryption key: {e}"),
            ConfigError::InvalidNumber { name, value } => {
                write!(f, "invalid value for {name}: {value:?}")
            }
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Disabled => write!(f, "persistence is disabled"),
            StoreError::Poisoned => write!(f, "store lock poisoned"),
            StoreError::Task(msg) => write!(f, "persistence task failed: {msg}"),
            #[cfg(feature = "sqlite")]
            StoreError::Sqlite(e) => write!(f, "sqlite error: {e}"),
            StoreError::Io(e) => write!(f, "{e}"),
        }
    }
}

// ── Error trait implementations ─────────────────────────────────────

impl std::error::Error for ProbeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProbeError::Decrypt(e) => Some(e),
            ProbeError::MissingPayload => None,
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidKey(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            #[cfg(feature = "sqlite")]
            StoreError::Sqlite(e) => Some(e),
            StoreError::Io(e) => Some(e),
            _ => None,
        }
    }
}

// ── From conversions ────────────────────────────────────────────────

impl From<DecryptError> for ProbeError {
    fn from(err: DecryptError) -> ProbeError {
        ProbeError::Decrypt(err)
    }
}

impl From<KeyError> for ConfigError {
    fn from(err: KeyError) -> ConfigError {
        ConfigError::InvalidKey(err)
    }
}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> StoreError {
        StoreError::Io(err)
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> StoreError {
        StoreError::Sqlite(err)
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_type_tags() {
        assert_eq!(ProbeError::MissingPayload.error_type(), "MissingPayload");
        let err: ProbeError = DecryptError::Format(FormatError::TooShort { len: 4 }).into();
        assert_eq!(err.error_type(), "TooShort");
    }

    #[test]
    fn test_decrypt_error_response_shape() {
        let err: ProbeError = DecryptError::Decode(DecodeError::InvalidJson {
            detail: "EOF while parsing an object at line 1 column 13".into(),
        })
        .into();
        let body = err.to_response();
        assert_eq!(body["status"], "error");
        assert_eq!(body["error_type"], "InvalidJson");
        assert!(
            body["message"]
                .as_str()
                .unwrap()
                .starts_with("Failed to process payload: failed to parse decrypted message as JSON")
        );
    }

    #[test]
    fn test_missing_payload_response_shape() {
        let body = ProbeError::MissingPayload.to_response();
        assert_eq!(body["message"], "No payload found in request data");
        assert!(body.get("error_type").is_none());
    }

    #[test]
    fn test_config_error_display() {
        let e = ConfigError::MissingVar {
            name: "MQTT_ENCRYPTION_KEY",
        };
        assert_eq!(
            e.to_string(),
            "MQTT_ENCRYPTION_KEY environment variable is not set"
        );
        let e = ConfigError::InvalidNumber {
            name: "NTP_CACHE_DURATION",
            value: "soon".into(),
        };
        assert_eq!(e.to_string(), "invalid value for NTP_CACHE_DURATION: \"soon\"");
    }

    #[test]
    fn test_store_error_source() {
        use std::error::Error;
        let err: StoreError = io::Error::new(io::ErrorKind::PermissionDenied, "denied").into();
        assert!(err.source().is_some());
        assert!(StoreError::Disabled.source().is_none());
    }
}
