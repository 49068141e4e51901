// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Decrypt-and-measure facade.
//!
//! [`Probe`] ties the pieces together: a hex frame goes in, is decrypted with
//! the shared key, stamped by the [`ClockSource`], persisted through a
//! [`Store`] and returned as a [`Report`]. Only decryption can fail the call.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use latency_proto::cipher;
use latency_proto::key::Key;
use latency_proto::unix_time;

use crate::clock::{ClockSource, ClockStatus, SyncState};
use crate::config::ProbeConfig;
use crate::error::ProbeError;
use crate::recorder::{LatencyRecorder, Measurement};
use crate::store::{MeasurementKind, Store};

/// Note attached to a status report that had to perform the first sync.
pub const FRESH_SYNC_NOTE: &str = "Performed fresh sync as no previous sync was available";

/// Arrival time as shown in a [`Report`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ServerTimestamp {
    /// ISO-8601 UTC.
    pub timestamp_iso: Option<String>,
    /// Unix epoch seconds.
    pub timestamp_epoch: Option<f64>,
}

/// Result of one successful measurement.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Report {
    /// Always `"success"`.
    pub status: &'static str,
    /// Human-readable summary.
    pub message: &'static str,
    /// The decrypted, timestamp-normalized payload.
    pub payload: Value,
    /// Arrival time.
    pub server: ServerTimestamp,
    /// Whether the measurement reached the store.
    pub database_saved: bool,
    /// The measurement itself.
    pub latency_data: Measurement,
}

/// Clock diagnostics.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NtpStatusReport {
    /// Always `"success"`; reading the clock cannot fail.
    pub status: &'static str,
    /// Cache snapshot, taken after any sync this call performed.
    pub ntp_cache: ClockStatus,
    /// Corrected current time, epoch seconds.
    pub current_timestamp: f64,
    /// Corrected current time, ISO-8601 UTC.
    pub current_datetime: Option<String>,
    /// Authority name.
    pub server: String,
    /// Set when this call performed the first sync.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<&'static str>,
}

/// The latency probe.
#[derive(Clone, Debug)]
pub struct Probe {
    key: Key,
    recorder: LatencyRecorder,
}

impl Probe {
    /// Probe decrypting with `key`, timing with `clock` and saving to `store`.
    pub fn new(key: Key, clock: ClockSource, store: Arc<dyn Store>) -> Self {
        Probe {
            key,
            recorder: LatencyRecorder::new(clock, store),
        }
    }

    /// Probe assembled from configuration.
    pub fn from_config(config: &ProbeConfig, store: Arc<dyn Store>) -> Self {
        info!(
            server = %config.ntp_server,
            cache_s = config.cache_duration.as_secs_f64(),
            "probe configured"
        );
        Self::new(config.key.clone(), config.clock(), store)
    }

    /// The probe's clock.
    pub fn clock(&self) -> &ClockSource {
        self.recorder.clock()
    }

    /// Decrypt `framed_hex`, measure its latency and persist the result.
    ///
    /// # Errors
    ///
    /// - [`ProbeError::MissingPayload`] if `framed_hex` is empty.
    /// - [`ProbeError::Decrypt`] if the frame is malformed or the plaintext
    ///   is not UTF-8 JSON. Nothing is persisted in that case.
    pub async fn measure(&self, framed_hex: &str, kind: MeasurementKind) -> Result<Report, ProbeError> {
        if framed_hex.is_empty() {
            return Err(ProbeError::MissingPayload);
        }
        let payload = cipher::decrypt(framed_hex, &self.key).inspect_err(|e| {
            debug!(error = %e, kind = e.kind(), "error processing payload");
        })?;

        let recorded = self.recorder.record(payload, kind).await;
        let m = &recorded.measurement;
        debug!(
            ?kind,
            iteration = ?m.iteration(),
            difference_s = ?m.difference_seconds(),
            saved = recorded.database_saved,
            "measurement recorded"
        );
        Ok(Report {
            status: "success",
            message: "Message payload processed successfully",
            server: ServerTimestamp {
                timestamp_iso: m.server_timestamp_iso().map(str::to_string),
                timestamp_epoch: m.server_timestamp_epoch(),
            },
            database_saved: recorded.database_saved,
            latency_data: recorded.measurement,
            payload: recorded.payload,
        })
    }

    /// Like [`measure`](Self::measure) but always returns a response body,
    /// using the error shape on failure.
    pub async fn measure_response(&self, framed_hex: &str, kind: MeasurementKind) -> Value {
        match self.measure(framed_hex, kind).await {
            Ok(report) => serde_json::to_value(report).unwrap_or_else(|e| {
                serde_json::json!({ "status": "error", "message": e.to_string() })
            }),
            Err(e) => e.to_response(),
        }
    }

    /// Cache snapshot without side effects.
    pub fn clock_status(&self) -> ClockStatus {
        self.clock().status()
    }

    /// Cache snapshot plus the corrected current time.
    ///
    /// Reading the time syncs if the cache is empty or stale; the note is set
    /// only when there was no sample at all beforehand.
    pub async fn ntp_status(&self) -> NtpStatusReport {
        let clock = self.clock();
        let first_sync = clock.status().status == SyncState::NotSynced;
        let now = clock.now().await;
        NtpStatusReport {
            status: "success",
            ntp_cache: clock.status(),
            current_timestamp: now,
            current_datetime: unix_time::format_iso(now),
            server: clock.authority_name(),
            note: first_sync.then_some(FRESH_SYNC_NOTE),
        }
    }
}
