// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Measurement persistence.
//!
//! Stores are synchronous and called from a blocking task. A failed save is
//! reported to the caller as `database_saved: false`; it never aborts a
//! measurement.
//!
//! | Store | Feature | Notes |
//! |-------|---------|-------|
//! | [`MemoryStore`] | - | Keeps every measurement in a `Vec`. |
//! | [`NullStore`] | - | Drops everything, every save reports [`StoreError::Disabled`]. |
//! | `SqliteStore` | `sqlite` | Two tables, one per [`MeasurementKind`]. |

use serde::Serialize;
use std::sync::Mutex;

use crate::error::StoreError;
use crate::recorder::Measurement;

/// Which side of the bus a measurement was taken on.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementKind {
    /// Publish-to-arrival latency. Every field is stored.
    Published,
    /// Subscriber arrival. Only the iteration and arrival time are stored.
    Subscribed,
}

/// A sink for measurements.
pub trait Store: Send + Sync {
    /// Persist one measurement.
    fn save(&self, kind: MeasurementKind, measurement: &Measurement) -> Result<(), StoreError>;
}

/// In-process store, mainly for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<(MeasurementKind, Measurement)>>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything saved so far, oldest first.
    pub fn records(&self) -> Vec<(MeasurementKind, Measurement)> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Number of saved measurements.
    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// `true` if nothing has been saved.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Store for MemoryStore {
    fn save(&self, kind: MeasurementKind, measurement: &Measurement) -> Result<(), StoreError> {
        self.records
            .lock()
            .map_err(|_| StoreError::Poisoned)?
            .push((kind, measurement.clone()));
        Ok(())
    }
}

/// Store that persists nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullStore;

impl Store for NullStore {
    fn save(&self, _kind: MeasurementKind, _measurement: &Measurement) -> Result<(), StoreError> {
        Err(StoreError::Disabled)
    }
}

#[cfg(feature = "sqlite")]
pub use self::sqlite::SqliteStore;

#[cfg(feature = "sqlite")]
mod sqlite {
    use rusqlite::{Connection, params};
    use std::path::Path;
    use std::sync::Mutex;
    use tracing::debug;

    use super::{MeasurementKind, Store};
    use crate::error::StoreError;
    use crate::recorder::Measurement;

    const SCHEMA: &str = "
        CREATE TABLE IF NOT EXISTS published_latency (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            iteration INTEGER,
            payload_timestamp_iso TEXT,
            payload_timestamp_epoch REAL,
            server_timestamp_iso TEXT,
            server_timestamp_epoch REAL,
            difference_seconds REAL
        );
        CREATE TABLE IF NOT EXISTS subscribed_arrival (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            iteration INTEGER,
            server_timestamp_iso TEXT,
            server_timestamp_epoch REAL
        );
    ";

    /// SQLite-backed store.
    #[derive(Debug)]
    pub struct SqliteStore {
        conn: Mutex<Connection>,
    }

    impl SqliteStore {
        /// Open (creating if needed) the database at `path`.
        pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
            let path = path.as_ref();
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)?;
            }
            debug!(path = %path.display(), "opening measurement database");
            Self::with_connection(Connection::open(path)?)
        }

        /// A private in-memory database.
        pub fn open_in_memory() -> Result<Self, StoreError> {
            Self::with_connection(Connection::open_in_memory()?)
        }

        fn with_connection(conn: Connection) -> Result<Self, StoreError> {
            conn.execute_batch(SCHEMA)?;
            Ok(SqliteStore {
                conn: Mutex::new(conn),
            })
        }

        /// Publish-side rows, oldest first.
        pub fn published(&self) -> Result<Vec<Measurement>, StoreError> {
            let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
            let mut stmt = conn.prepare(
                "SELECT iteration, payload_timestamp_iso, payload_timestamp_epoch,
                        server_timestamp_iso, server_timestamp_epoch
                 FROM published_latency ORDER BY id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(Measurement::new(
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            })?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        }

        /// Subscribe-side rows as `(iteration, server_timestamp_epoch)`.
        pub fn subscribed(&self) -> Result<Vec<(Option<i64>, Option<f64>)>, StoreError> {
            let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
            let mut stmt = conn.prepare(
                "SELECT iteration, server_timestamp_epoch FROM subscribed_arrival ORDER BY id",
            )?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        }
    }

    impl Store for SqliteStore {
        fn save(&self, kind: MeasurementKind, m: &Measurement) -> Result<(), StoreError> {
            let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
            match kind {
                MeasurementKind::Published => conn.execute(
                    "INSERT INTO published_latency (
                        iteration, payload_timestamp_iso, payload_timestamp_epoch,
                        server_timestamp_iso, server_timestamp_epoch, difference_seconds
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        m.iteration(),
                        m.payload_timestamp_iso(),
                        m.payload_timestamp_epoch(),
                        m.server_timestamp_iso(),
                        m.server_timestamp_epoch(),
                        m.difference_seconds(),
                    ],
                )?,
                MeasurementKind::Subscribed => conn.execute(
                    "INSERT INTO subscribed_arrival (
                        iteration, server_timestamp_iso, server_timestamp_epoch
                    ) VALUES (?1, ?2, ?3)",
                    params![
                        m.iteration(),
                        m.server_timestamp_iso(),
                        m.server_timestamp_epoch(),
                    ],
                )?,
            };
            debug!(?kind, iteration = ?m.iteration(), "measurement saved");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Measurement {
        Measurement::new(Some(4), None, None, Some("t".into()), Some(1.0))
    }

    #[test]
    fn test_memory_store_keeps_order() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        store.save(MeasurementKind::Published, &sample()).unwrap();
        store.save(MeasurementKind::Subscribed, &sample()).unwrap();
        let kinds: Vec<_> = store.records().into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            kinds,
            vec![MeasurementKind::Published, MeasurementKind::Subscribed]
        );
    }

    #[test]
    fn test_null_store_reports_disabled() {
        let err = NullStore.save(MeasurementKind::Published, &sample()).unwrap_err();
        assert!(matches!(err, StoreError::Disabled));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_sqlite_in_memory_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.save(MeasurementKind::Published, &sample()).unwrap();
        store.save(MeasurementKind::Subscribed, &sample()).unwrap();
        assert_eq!(store.published().unwrap(), vec![sample()]);
        assert_eq!(store.subscribed().unwrap(), vec![(Some(4), Some(1.0))]);
    }
}
