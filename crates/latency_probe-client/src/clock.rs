// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! NTP-corrected wall clock with a cached offset.
//!
//! [`ClockSource`] keeps the most recent `authority − local` offset together
//! with the local time it was sampled at. Reads are served from that cache
//! while it is younger than the validity window; once it goes stale the next
//! reader refreshes it.
//!
//! # Refresh discipline
//!
//! Staleness is checked without taking the refresh lock. A stale reader then
//! acquires the lock and hands it to a spawned task that re-checks staleness
//! before querying the authority, so N concurrent stale readers cause exactly
//! one query. The spawned task owns the lock guard, which means a caller that
//! is cancelled mid-refresh does not abandon the query or release the lock
//! early.
//!
//! # Failure handling
//!
//! A failed query never surfaces to readers. If an earlier sample exists it
//! is kept unchanged (and retried on the next stale read); otherwise a
//! zero-offset sample stamped with the current local time is stored so the
//! source still answers with local time.
//!
//! # Examples
//!
//! ```no_run
//! use latency_client::authority::NtpAuthority;
//! use latency_client::clock::ClockSource;
//!
//! # async fn example() {
//! let clock = ClockSource::new(NtpAuthority::new("time.nist.gov"));
//! let now = clock.now().await;
//! println!("corrected time: {now}");
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use latency_proto::unix_time;

use crate::authority::TimeAuthority;

/// Default cache validity window.
pub const DEFAULT_VALIDITY: Duration = Duration::from_secs(30);

/// Local wall-clock reading, abstracted so tests can freeze time.
pub trait TimeSource: Send + Sync {
    /// Current local time as Unix epoch seconds.
    fn now_epoch(&self) -> f64;
}

/// The host's system clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemTime;

impl TimeSource for SystemTime {
    fn now_epoch(&self) -> f64 {
        unix_time::now_epoch()
    }
}

/// A manually advanced clock for tests and simulations.
#[derive(Debug)]
pub struct ManualTime {
    bits: AtomicU64,
}

impl ManualTime {
    /// Start the clock at `epoch` seconds.
    pub fn new(epoch: f64) -> Self {
        ManualTime {
            bits: AtomicU64::new(epoch.to_bits()),
        }
    }

    /// Jump to `epoch` seconds.
    pub fn set(&self, epoch: f64) {
        self.bits.store(epoch.to_bits(), Ordering::SeqCst);
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        self.set(self.now_epoch() + by.as_secs_f64());
    }
}

impl TimeSource for ManualTime {
    fn now_epoch(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }
}

/// Where a cached offset came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleOrigin {
    /// Measured against the authority.
    Authority,
    /// Synthesized after the very first query failed.
    LocalFallback,
}

/// One cached offset measurement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClockSample {
    /// `authority_time − local_time` in seconds.
    pub offset: f64,
    /// Local epoch seconds at which the sample was taken.
    pub sampled_at: f64,
    /// Whether the offset was measured or synthesized.
    pub origin: SampleOrigin,
}

impl ClockSample {
    /// Seconds elapsed between sampling and `now`.
    pub fn age(&self, now: f64) -> f64 {
        now - self.sampled_at
    }

    /// `true` while `now` is within `window` of the sample.
    pub fn is_fresh(&self, now: f64, window: Duration) -> bool {
        self.age(now) <= window.as_secs_f64()
    }
}

/// Cache state reported by [`ClockSource::status`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// No sample has ever been stored.
    NotSynced,
    /// The sample is within the validity window.
    Valid,
    /// The sample is older than the validity window.
    Expired,
}

/// Snapshot of the clock cache. Has no side effects to obtain.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClockStatus {
    /// Cache state.
    pub status: SyncState,
    /// Cached offset in seconds.
    pub offset: Option<f64>,
    /// Seconds since the sample was taken.
    pub age_seconds: Option<f64>,
    /// Validity window in seconds.
    pub cache_duration: f64,
    /// Local time of the sample, ISO-8601.
    pub last_sync: Option<String>,
    /// Origin of the cached offset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<SampleOrigin>,
    /// Authority queries attempted since creation.
    pub sync_attempts: u64,
    /// Authority queries that failed since creation.
    pub sync_failures: u64,
}

struct ClockInner {
    authority: Arc<dyn TimeAuthority>,
    time: Arc<dyn TimeSource>,
    validity: Duration,
    sample: RwLock<Option<ClockSample>>,
    refresh: Arc<tokio::sync::Mutex<()>>,
    attempts: AtomicU64,
    failures: AtomicU64,
    // Bumped after every completed sync, successful or not.
    generation: AtomicU64,
}

impl ClockInner {
    fn snapshot(&self) -> Option<ClockSample> {
        *self.sample.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn store(&self, sample: ClockSample) {
        *self.sample.write().unwrap_or_else(PoisonError::into_inner) = Some(sample);
    }

    fn needs_refresh(&self, now: f64) -> bool {
        match self.snapshot() {
            Some(sample) => !sample.is_fresh(now, self.validity),
            None => true,
        }
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    // Caller must hold the refresh lock.
    async fn sync_offset(&self) {
        let local_time = self.time.now_epoch();
        self.attempts.fetch_add(1, Ordering::Relaxed);
        match self.authority.query().await {
            Ok(authority_time) => {
                let offset = authority_time - local_time;
                self.store(ClockSample {
                    offset,
                    sampled_at: local_time,
                    origin: SampleOrigin::Authority,
                });
                debug!(offset, authority = %self.authority.name(), "NTP sync successful");
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                if self.snapshot().is_some() {
                    warn!(error = %e, authority = %self.authority.name(), "NTP sync failed, keeping previous offset");
                } else {
                    warn!(error = %e, authority = %self.authority.name(), "NTP sync failed, falling back to local time");
                    self.store(ClockSample {
                        offset: 0.0,
                        sampled_at: self.time.now_epoch(),
                        origin: SampleOrigin::LocalFallback,
                    });
                }
            }
        }
        self.generation.fetch_add(1, Ordering::Release);
    }
}

/// Shared, cheaply cloneable NTP-corrected clock.
///
/// Clones share the same cache and refresh lock.
#[derive(Clone)]
pub struct ClockSource {
    inner: Arc<ClockInner>,
}

impl std::fmt::Debug for ClockSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClockSource")
            .field("authority", &self.inner.authority.name())
            .field("validity", &self.inner.validity)
            .field("sample", &self.inner.snapshot())
            .finish()
    }
}

/// Builder for [`ClockSource`].
pub struct ClockSourceBuilder {
    authority: Arc<dyn TimeAuthority>,
    time: Arc<dyn TimeSource>,
    validity: Duration,
}

impl ClockSourceBuilder {
    /// Set the cache validity window (default 30 s).
    pub fn validity(mut self, validity: Duration) -> Self {
        self.validity = validity;
        self
    }

    /// Replace the local time source (default [`SystemTime`]).
    pub fn time_source(mut self, time: Arc<dyn TimeSource>) -> Self {
        self.time = time;
        self
    }

    /// Build the clock. No query is made until the first read.
    pub fn build(self) -> ClockSource {
        ClockSource {
            inner: Arc::new(ClockInner {
                authority: self.authority,
                time: self.time,
                validity: self.validity,
                sample: RwLock::new(None),
                refresh: Arc::new(tokio::sync::Mutex::new(())),
                attempts: AtomicU64::new(0),
                failures: AtomicU64::new(0),
                generation: AtomicU64::new(0),
            }),
        }
    }
}

impl ClockSource {
    /// Clock over `authority` with the system clock and default validity.
    pub fn new(authority: impl TimeAuthority + 'static) -> Self {
        Self::builder(Arc::new(authority)).build()
    }

    /// Start configuring a clock over `authority`.
    pub fn builder(authority: Arc<dyn TimeAuthority>) -> ClockSourceBuilder {
        ClockSourceBuilder {
            authority,
            time: Arc::new(SystemTime),
            validity: DEFAULT_VALIDITY,
        }
    }

    /// Corrected current time as Unix epoch seconds.
    ///
    /// Local time is read before any refresh, so the result is that reading
    /// plus the (possibly just refreshed) offset. Never fails.
    pub async fn now(&self) -> f64 {
        let seen = self.inner.generation();
        let current = self.inner.time.now_epoch();
        if self.inner.needs_refresh(current) {
            self.refresh_if_stale(seen).await;
        }
        let offset = self.inner.snapshot().map_or(0.0, |s| s.offset);
        current + offset
    }

    /// Corrected current time as a UTC date-time.
    pub async fn now_datetime(&self) -> Option<DateTime<Utc>> {
        unix_time::to_datetime(self.now().await)
    }

    /// Query the authority now, regardless of cache age.
    ///
    /// Waits for any in-flight refresh first.
    pub async fn force_refresh(&self) {
        let guard = Arc::clone(&self.inner.refresh).lock_owned().await;
        self.run_refresh(guard, None).await;
    }

    /// Like [`force_refresh`](Self::force_refresh) but returns `false`
    /// immediately if a refresh is already in flight.
    pub async fn try_force_refresh(&self) -> bool {
        match Arc::clone(&self.inner.refresh).try_lock_owned() {
            Ok(guard) => {
                self.run_refresh(guard, None).await;
                true
            }
            Err(_) => false,
        }
    }

    async fn refresh_if_stale(&self, seen: u64) {
        let guard = Arc::clone(&self.inner.refresh).lock_owned().await;
        self.run_refresh(guard, Some(seen)).await;
    }

    // `seen` is the sync generation observed before queueing on the lock.
    // `None` forces a query.
    async fn run_refresh(&self, guard: tokio::sync::OwnedMutexGuard<()>, seen: Option<u64>) {
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let _guard = guard;
            match seen {
                Some(g) if inner.generation() != g && inner.snapshot().is_some() => {
                    debug!("offset sync completed by another caller");
                }
                Some(_) if !inner.needs_refresh(inner.time.now_epoch()) => {
                    debug!("offset refreshed by another caller");
                }
                _ => inner.sync_offset().await,
            }
        });
        if let Err(e) = task.await {
            warn!(error = %e, "clock refresh task failed");
        }
    }

    /// The cached sample, if any.
    pub fn sample(&self) -> Option<ClockSample> {
        self.inner.snapshot()
    }

    /// Cache state at the current local time.
    pub fn status(&self) -> ClockStatus {
        let now = self.inner.time.now_epoch();
        let validity = self.inner.validity;
        let sample = self.inner.snapshot();
        let status = match &sample {
            None => SyncState::NotSynced,
            Some(s) if s.is_fresh(now, validity) => SyncState::Valid,
            Some(_) => SyncState::Expired,
        };
        ClockStatus {
            status,
            offset: sample.map(|s| s.offset),
            age_seconds: sample.map(|s| s.age(now)),
            cache_duration: validity.as_secs_f64(),
            last_sync: sample.and_then(|s| unix_time::format_iso(s.sampled_at)),
            origin: sample.map(|s| s.origin),
            sync_attempts: self.inner.attempts.load(Ordering::Relaxed),
            sync_failures: self.inner.failures.load(Ordering::Relaxed),
        }
    }

    /// The cache validity window.
    pub fn validity(&self) -> Duration {
        self.inner.validity
    }

    /// Name of the backing authority.
    pub fn authority_name(&self) -> String {
        self.inner.authority.name()
    }

    /// Drop the cached sample so the next read queries the authority.
    pub async fn invalidate(&self) {
        let _guard = self.inner.refresh.lock().await;
        *self.inner.sample.write().unwrap_or_else(PoisonError::into_inner) = None;
        info!("clock cache invalidated");
    }
}
