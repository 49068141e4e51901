// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Background offset refresher.
//!
//! Without a refresher the first reader after expiry pays for the authority
//! round trip. [`ClockRefresher`] re-syncs a [`ClockSource`] on a fixed
//! interval shorter than its validity window so readers are normally served
//! from cache.
//!
//! The refresher goes through the same refresh lock as readers. A tick that
//! finds a refresh already in flight is skipped.
//!
//! ```no_run
//! use latency_client::authority::NtpAuthority;
//! use latency_client::clock::ClockSource;
//! use latency_client::refresher::ClockRefresher;
//!
//! # async fn example() {
//! let clock = ClockSource::new(NtpAuthority::new("time.nist.gov"));
//! let handle = ClockRefresher::new(clock.clone()).spawn();
//! // ... serve requests with `clock` ...
//! handle.shutdown().await;
//! # }
//! ```

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::clock::ClockSource;

/// Periodic re-sync of a [`ClockSource`].
#[derive(Debug)]
pub struct ClockRefresher {
    clock: ClockSource,
    interval: Duration,
}

impl ClockRefresher {
    /// Refresher at half the clock's validity window.
    pub fn new(clock: ClockSource) -> Self {
        let interval = clock.validity() / 2;
        ClockRefresher { clock, interval }
    }

    /// Override the refresh interval.
    ///
    /// An interval at or above the validity window still works but lets the
    /// cache expire between ticks.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// The configured refresh interval.
    pub fn refresh_interval(&self) -> Duration {
        self.interval
    }

    /// Run the refresh loop until `shutdown` flips to `true` or its sender
    /// is dropped. The first sync happens immediately.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        if self.interval >= self.clock.validity() {
            warn!(
                interval_s = self.interval.as_secs_f64(),
                validity_s = self.clock.validity().as_secs_f64(),
                "refresh interval does not beat cache expiry"
            );
        }
        info!(
            authority = %self.clock.authority_name(),
            interval_s = self.interval.as_secs_f64(),
            "clock refresher starting"
        );

        let mut ticker = tokio::time::interval(self.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !self.clock.try_force_refresh().await {
                        debug!("refresh already in flight, skipping tick");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("clock refresher stopped");
    }

    /// Spawn the loop on the current runtime.
    pub fn spawn(self) -> RefresherHandle {
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(self.run(rx));
        RefresherHandle {
            shutdown: tx,
            task: Some(task),
        }
    }
}

/// Handle to a spawned [`ClockRefresher`]. Dropping it aborts the loop.
#[derive(Debug)]
pub struct RefresherHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl RefresherHandle {
    /// Stop the loop and wait for it to exit.
    ///
    /// A refresh already in progress completes on its own task.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!(error = %e, "clock refresher task failed");
        }
    }

    /// `true` once the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for RefresherHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
