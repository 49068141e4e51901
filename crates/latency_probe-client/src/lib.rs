// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

/*!
End-to-end latency probe for encrypted pub/sub payloads.

Publishers encrypt a small JSON document (an `iteration` counter and a send
`timestamp`) with ChaCha20 and publish it as a hex frame. The probe decrypts
each frame, stamps it with an NTP-corrected arrival time and records the
difference.

# Example

```rust,no_run
use std::sync::Arc;

use latency_client::config::ProbeConfig;
use latency_client::probe::Probe;
use latency_client::store::{MeasurementKind, MemoryStore};

# async fn example() -> Result<(), Box<dyn std::error::Error>> {
let config = ProbeConfig::from_env()?;
let probe = Probe::from_config(&config, Arc::new(MemoryStore::new()));

let report = probe
    .measure("00000000000000000000000000000000...", MeasurementKind::Published)
    .await?;
println!("latency: {:?} s", report.latency_data.difference_seconds());
# Ok(())
# }
```

# Feature Flags

| Feature | Default | Description |
|---------|---------|-------------|
| `sqlite` | no | `SqliteStore` persistence via `rusqlite`. |
| `cli` | no | The `latency-probe` binary. Implies `sqlite`. |
*/

#![warn(missing_docs)]

// Re-export the wire-level modules for convenience.
pub use latency_proto::{cipher, key, unix_time};

/// Remote time authorities and the async SNTP query.
pub mod authority;

/// NTP-corrected clock with a cached, single-flight-refreshed offset.
pub mod clock;

/// Environment-driven configuration.
pub mod config;

/// Error types for measurement, configuration and persistence.
pub mod error;

/// Decrypt-and-measure facade.
pub mod probe;

/// Measurement construction from decrypted payloads.
pub mod recorder;

/// Periodic background resync of a clock.
pub mod refresher;

/// Measurement persistence backends.
pub mod store;

pub use clock::{ClockSource, ClockStatus, SyncState};
pub use probe::{Probe, Report};
pub use recorder::{LatencyRecorder, Measurement};
