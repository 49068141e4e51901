// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Latency measurement from decrypted payloads.
//!
//! [`build`] takes the JSON document a publisher sent, stamps it with the
//! NTP-corrected arrival time and produces a [`Measurement`]. The payload's
//! own `timestamp` field (if any) is normalized:
//!
//! - parseable: replaced by `timestamp_iso` (the publisher's text, verbatim)
//!   and `timestamp_epoch`, and the original `timestamp` key is removed;
//! - unparseable: `timestamp_iso` carries the original value,
//!   `timestamp_epoch` is `null` and the `timestamp` key is left in place.
//!
//! `difference_seconds` is only present when both ends have an epoch value.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use latency_proto::unix_time;

use crate::clock::ClockSource;
use crate::error::StoreError;
use crate::store::{MeasurementKind, Store};

/// Payload key carrying the publisher's send time.
pub const TIMESTAMP_KEY: &str = "timestamp";

/// Payload key carrying the publisher's sequence number.
pub const ITERATION_KEY: &str = "iteration";

/// One latency observation. Immutable once built.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    iteration: Option<i64>,
    payload_timestamp_iso: Option<String>,
    payload_timestamp_epoch: Option<f64>,
    server_timestamp_iso: Option<String>,
    server_timestamp_epoch: Option<f64>,
    difference_seconds: Option<f64>,
}

impl Measurement {
    /// Assemble a measurement, deriving `difference_seconds`.
    pub fn new(
        iteration: Option<i64>,
        payload_timestamp_iso: Option<String>,
        payload_timestamp_epoch: Option<f64>,
        server_timestamp_iso: Option<String>,
        server_timestamp_epoch: Option<f64>,
    ) -> Self {
        let difference_seconds = match (server_timestamp_epoch, payload_timestamp_epoch) {
            (Some(server), Some(payload)) => Some(server - payload),
            _ => None,
        };
        Measurement {
            iteration,
            payload_timestamp_iso,
            payload_timestamp_epoch,
            server_timestamp_iso,
            server_timestamp_epoch,
            difference_seconds,
        }
    }

    /// Publisher sequence number.
    pub fn iteration(&self) -> Option<i64> {
        self.iteration
    }

    /// Publisher timestamp as sent, whether or not it parsed.
    pub fn payload_timestamp_iso(&self) -> Option<&str> {
        self.payload_timestamp_iso.as_deref()
    }

    /// Publisher timestamp in epoch seconds.
    pub fn payload_timestamp_epoch(&self) -> Option<f64> {
        self.payload_timestamp_epoch
    }

    /// Arrival time, ISO-8601 UTC.
    pub fn server_timestamp_iso(&self) -> Option<&str> {
        self.server_timestamp_iso.as_deref()
    }

    /// Arrival time in epoch seconds.
    pub fn server_timestamp_epoch(&self) -> Option<f64> {
        self.server_timestamp_epoch
    }

    /// `server_timestamp_epoch − payload_timestamp_epoch`.
    pub fn difference_seconds(&self) -> Option<f64> {
        self.difference_seconds
    }
}

/// A normalized payload together with its measurement.
#[derive(Clone, Debug, PartialEq)]
pub struct Recorded {
    /// The payload after timestamp normalization.
    pub payload: Value,
    /// The derived measurement.
    pub measurement: Measurement,
    /// Whether the measurement reached the store. Always `false` from [`build`].
    pub database_saved: bool,
}

/// Stamp `payload` with the corrected arrival time and derive a measurement.
///
/// The clock is read exactly once. Non-object payloads pass through untouched
/// and yield a measurement with only the server fields set.
pub async fn build(payload: Value, clock: &ClockSource) -> Recorded {
    let server_epoch = clock.now().await;
    build_at(payload, server_epoch)
}

/// [`build`] with an already-read arrival time.
pub fn build_at(mut payload: Value, server_epoch: f64) -> Recorded {
    let (server_timestamp_iso, server_timestamp_epoch) = match unix_time::format_iso(server_epoch) {
        Some(iso) => (Some(iso), Some(server_epoch)),
        None => {
            warn!(server_epoch, "arrival time not representable, omitting server timestamp");
            (None, None)
        }
    };

    let (iteration, payload_iso, payload_epoch) = match payload.as_object_mut() {
        Some(obj) => {
            let iteration = read_iteration(obj);
            let (iso, epoch) = normalize_timestamp(obj);
            (iteration, iso, epoch)
        }
        None => {
            debug!("payload is not a JSON object, recording arrival only");
            (None, None, None)
        }
    };

    let measurement = Measurement::new(
        iteration,
        payload_iso,
        payload_epoch,
        server_timestamp_iso,
        server_timestamp_epoch,
    );
    Recorded {
        payload,
        measurement,
        database_saved: false,
    }
}

fn read_iteration(obj: &Map<String, Value>) -> Option<i64> {
    let value = obj.get(ITERATION_KEY)?;
    let iteration = value.as_i64();
    if iteration.is_none() {
        debug!(%value, "iteration is not an integer, ignoring");
    }
    iteration
}

// Rewrites `timestamp` into `timestamp_iso`/`timestamp_epoch` in place.
fn normalize_timestamp(obj: &mut Map<String, Value>) -> (Option<String>, Option<f64>) {
    let Some(raw) = obj.get(TIMESTAMP_KEY).cloned() else {
        return (None, None);
    };

    let parsed = raw
        .as_str()
        .and_then(|s| unix_time::parse_iso(s).map(|epoch| (s.to_string(), epoch)));

    match parsed {
        Some((iso, epoch)) => {
            obj.remove(TIMESTAMP_KEY);
            obj.insert("timestamp_iso".into(), Value::String(iso.clone()));
            obj.insert("timestamp_epoch".into(), Value::from(epoch));
            (Some(iso), Some(epoch))
        }
        None => {
            debug!(timestamp = %raw, "could not parse payload timestamp");
            let as_text = match &raw {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            obj.insert("timestamp_iso".into(), raw);
            obj.insert("timestamp_epoch".into(), Value::Null);
            (Some(as_text), None)
        }
    }
}

/// Builds measurements and hands them to a [`Store`].
#[derive(Clone)]
pub struct LatencyRecorder {
    clock: ClockSource,
    store: Arc<dyn Store>,
}

impl std::fmt::Debug for LatencyRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatencyRecorder")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl LatencyRecorder {
    /// Recorder over `clock` persisting to `store`.
    pub fn new(clock: ClockSource, store: Arc<dyn Store>) -> Self {
        LatencyRecorder { clock, store }
    }

    /// The clock used for arrival times.
    pub fn clock(&self) -> &ClockSource {
        &self.clock
    }

    /// Build a measurement and persist it.
    ///
    /// A store failure is logged and reported through
    /// [`Recorded::database_saved`]; it never fails the call.
    pub async fn record(&self, payload: Value, kind: MeasurementKind) -> Recorded {
        let mut recorded = build(payload, &self.clock).await;
        let store = Arc::clone(&self.store);
        let measurement = recorded.measurement.clone();
        let saved = tokio::task::spawn_blocking(move || store.save(kind, &measurement))
            .await
            .unwrap_or_else(|e| Err(StoreError::Task(e.to_string())));
        recorded.database_saved = match saved {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, ?kind, "failed to persist measurement");
                false
            }
        };
        recorded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_difference_from_payload_timestamp() {
        let r = build_at(
            json!({ "iteration": 7, "timestamp": "1970-01-01T00:01:40Z" }),
            100.5,
        );
        let m = &r.measurement;
        assert_eq!(m.iteration(), Some(7));
        assert_eq!(m.payload_timestamp_epoch(), Some(100.0));
        assert_eq!(m.server_timestamp_epoch(), Some(100.5));
        assert_eq!(m.difference_seconds(), Some(0.5));
        assert_eq!(m.payload_timestamp_iso(), Some("1970-01-01T00:01:40Z"));
        assert_eq!(
            m.server_timestamp_iso(),
            Some("1970-01-01T00:01:40.500000+00:00")
        );
    }

    #[test]
    fn test_payload_timestamp_rewritten() {
        let r = build_at(
            json!({ "iteration": 1, "timestamp": "2024-01-01T00:00:00Z", "temp": 21.5 }),
            1_704_067_201.0,
        );
        assert_eq!(
            r.payload,
            json!({
                "iteration": 1,
                "temp": 21.5,
                "timestamp_iso": "2024-01-01T00:00:00Z",
                "timestamp_epoch": 1_704_067_200.0,
            })
        );
        assert_eq!(r.measurement.difference_seconds(), Some(1.0));
        assert!(!r.database_saved);
    }

    #[test]
    fn test_no_timestamp() {
        let r = build_at(json!({ "iteration": 3 }), 50.0);
        assert_eq!(r.payload, json!({ "iteration": 3 }));
        assert_eq!(r.measurement.payload_timestamp_iso(), None);
        assert_eq!(r.measurement.payload_timestamp_epoch(), None);
        assert_eq!(r.measurement.difference_seconds(), None);
        assert_eq!(r.measurement.server_timestamp_epoch(), Some(50.0));
    }

    #[test]
    fn test_unparseable_timestamp_kept() {
        let r = build_at(json!({ "iteration": 2, "timestamp": "yesterday" }), 50.0);
        assert_eq!(
            r.payload,
            json!({
                "iteration": 2,
                "timestamp": "yesterday",
                "timestamp_iso": "yesterday",
                "timestamp_epoch": null,
            })
        );
        assert_eq!(r.measurement.payload_timestamp_iso(), Some("yesterday"));
        assert_eq!(r.measurement.payload_timestamp_epoch(), None);
        assert_eq!(r.measurement.difference_seconds(), None);
    }

    #[test]
    fn test_numeric_timestamp_is_unparseable() {
        let r = build_at(json!({ "timestamp": 1700000000 }), 50.0);
        assert_eq!(r.payload["timestamp"], 1700000000);
        assert_eq!(r.payload["timestamp_iso"], 1700000000);
        assert!(r.payload["timestamp_epoch"].is_null());
        assert_eq!(r.measurement.payload_timestamp_iso(), Some("1700000000"));
        assert_eq!(r.measurement.difference_seconds(), None);
    }

    #[test]
    fn test_non_integer_iteration_ignored() {
        let r = build_at(json!({ "iteration": "seven" }), 1.0);
        assert_eq!(r.measurement.iteration(), None);
        assert_eq!(r.payload["iteration"], "seven");
    }

    #[test]
    fn test_non_object_payload() {
        let r = build_at(json!([1, 2, 3]), 10.0);
        assert_eq!(r.payload, json!([1, 2, 3]));
        assert_eq!(r.measurement.iteration(), None);
        assert_eq!(r.measurement.server_timestamp_epoch(), Some(10.0));
    }

    #[test]
    fn test_unrepresentable_arrival_time() {
        let r = build_at(json!({ "timestamp": "2024-01-01T00:00:00Z" }), f64::NAN);
        assert_eq!(r.measurement.server_timestamp_epoch(), None);
        assert_eq!(r.measurement.server_timestamp_iso(), None);
        assert_eq!(r.measurement.difference_seconds(), None);
        assert_eq!(r.measurement.payload_timestamp_epoch(), Some(1_704_067_200.0));
    }

    #[test]
    fn test_measurement_serializes_all_fields() {
        let m = Measurement::new(Some(1), None, None, Some("x".into()), Some(2.0));
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(
            json,
            json!({
                "iteration": 1,
                "payload_timestamp_iso": null,
                "payload_timestamp_epoch": null,
                "server_timestamp_iso": "x",
                "server_timestamp_epoch": 2.0,
                "difference_seconds": null,
            })
        );
    }

    struct Frozen;

    #[async_trait::async_trait]
    impl crate::authority::TimeAuthority for Frozen {
        async fn query(&self) -> std::io::Result<f64> {
            Ok(500.0)
        }

        fn name(&self) -> String {
            "frozen".into()
        }
    }

    struct PanickingStore;

    impl Store for PanickingStore {
        fn save(&self, _kind: MeasurementKind, _m: &Measurement) -> Result<(), StoreError> {
            panic!("disk on fire");
        }
    }

    #[tokio::test]
    async fn test_record_survives_panicking_store() {
        let clock = ClockSource::builder(Arc::new(Frozen))
            .time_source(Arc::new(crate::clock::ManualTime::new(500.0)))
            .build();
        let recorder = LatencyRecorder::new(clock, Arc::new(PanickingStore));

        let r = recorder
            .record(json!({ "iteration": 3 }), MeasurementKind::Subscribed)
            .await;
        assert!(!r.database_saved);
        assert_eq!(r.measurement.iteration(), Some(3));
        assert_eq!(r.measurement.server_timestamp_epoch(), Some(500.0));
    }
}
