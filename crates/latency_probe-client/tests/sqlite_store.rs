// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

mod common;

use std::sync::Arc;

use common::ScriptedAuthority;
use latency_client::clock::{ClockSource, ManualTime};
use latency_client::probe::Probe;
use latency_client::recorder::Measurement;
use latency_client::store::{MeasurementKind, SqliteStore, Store};
use latency_proto::cipher;
use latency_proto::key::Key;

#[test]
fn test_open_creates_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("probe").join("database.db");
    let store = SqliteStore::open(&path).unwrap();
    assert!(path.exists());
    assert!(store.published().unwrap().is_empty());
}

#[test]
fn test_rows_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("database.db");
    let m = Measurement::new(
        Some(12),
        Some("2024-01-01T00:00:00+00:00".into()),
        Some(1_704_067_200.0),
        Some("2024-01-01T00:00:00.125000+00:00".into()),
        Some(1_704_067_200.125),
    );

    {
        let store = SqliteStore::open(&path).unwrap();
        store.save(MeasurementKind::Published, &m).unwrap();
        store.save(MeasurementKind::Subscribed, &m).unwrap();
    }

    let store = SqliteStore::open(&path).unwrap();
    let published = store.published().unwrap();
    assert_eq!(published, vec![m.clone()]);
    assert_eq!(published[0].difference_seconds(), Some(0.125));
    assert_eq!(
        store.subscribed().unwrap(),
        vec![(Some(12), Some(1_704_067_200.125))]
    );
}

#[test]
fn test_nulls_round_trip() {
    let store = SqliteStore::open_in_memory().unwrap();
    let m = Measurement::new(None, Some("yesterday".into()), None, None, None);
    store.save(MeasurementKind::Published, &m).unwrap();
    assert_eq!(store.published().unwrap(), vec![m]);
}

#[tokio::test]
async fn test_probe_persists_to_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteStore::open(dir.path().join("database.db")).unwrap());
    let clock = ClockSource::builder(ScriptedAuthority::new(1_000.5))
        .time_source(Arc::new(ManualTime::new(1_000.0)))
        .build();
    let key = Key::from_bytes([0x11; 32]);
    let probe = Probe::new(key.clone(), clock, store.clone());

    for i in 0..3 {
        let framed = cipher::encrypt(
            format!(r#"{{"iteration":{i},"timestamp":"1970-01-01T00:16:40Z"}}"#).as_bytes(),
            &key,
            [i as u8; 8],
            0,
        );
        let report = probe.measure(&framed, MeasurementKind::Published).await.unwrap();
        assert!(report.database_saved);
    }
    let framed = cipher::encrypt(br#"{"iteration":99}"#, &key, [0xFF; 8], 0);
    probe.measure(&framed, MeasurementKind::Subscribed).await.unwrap();

    let published = store.published().unwrap();
    assert_eq!(published.len(), 3);
    for (i, m) in published.iter().enumerate() {
        assert_eq!(m.iteration(), Some(i as i64));
        assert_eq!(m.payload_timestamp_epoch(), Some(1_000.0));
        assert_eq!(m.difference_seconds(), Some(0.5));
    }
    assert_eq!(store.subscribed().unwrap(), vec![(Some(99), Some(1_000.5))]);
}
