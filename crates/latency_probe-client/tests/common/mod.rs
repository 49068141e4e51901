// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Shared helpers for integration tests.

// Integration test helpers are `pub` so each `tests/*.rs` file can import them
// via `mod common`, but not every file uses every helper.
#![allow(unreachable_pub, dead_code)]

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::UdpSocket;

use latency_client::authority::TimeAuthority;
use latency_proto::protocol;
use latency_proto::unix_time::{self, EPOCH_DELTA};

/// Returns `true` if the I/O error indicates a network-level failure that
/// should cause the test to be **skipped** (not panicked).
///
/// CI runners occasionally lack outbound UDP/123 access, causing errors such
/// as `ENETUNREACH` (101) or `EHOSTUNREACH` (113) in addition to the usual
/// `TimedOut` / `WouldBlock`.
pub fn is_network_skip_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::AddrNotAvailable
    ) || e.raw_os_error() == Some(101) // ENETUNREACH  (Network is unreachable)
      || e.raw_os_error() == Some(113) // EHOSTUNREACH (No route to host)
      || e.to_string().contains("Network is unreachable")
      || e.to_string().contains("No route to host")
      || e.to_string().contains("failed to lookup address")
}

/// A loopback SNTP server answering every request with a fixed skew from
/// the host clock.
pub struct MockTimeServer {
    pub addr: SocketAddr,
    pub requests: Arc<AtomicUsize>,
}

impl MockTimeServer {
    /// Serve replies whose transmit time is `now + skew_secs`.
    pub async fn spawn(skew_secs: i64) -> MockTimeServer {
        let sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = sock.local_addr().unwrap();
        let requests = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&requests);

        tokio::spawn(async move {
            let mut buf = [0u8; 128];
            loop {
                let Ok((len, peer)) = sock.recv_from(&mut buf).await else {
                    return;
                };
                if len < protocol::PACKED_SIZE_BYTES || buf[0] != protocol::CLIENT_REQUEST_FLAGS {
                    continue;
                }
                counter.fetch_add(1, Ordering::SeqCst);
                let transmit = (unix_time::now_epoch() as i64 + skew_secs + EPOCH_DELTA) as u32;
                let _ = sock.send_to(&protocol::server_reply(transmit), peer).await;
            }
        });

        MockTimeServer { addr, requests }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

/// In-process authority that counts queries and can be switched to fail.
pub struct ScriptedAuthority {
    pub time: f64,
    pub delay: Duration,
    pub queries: AtomicUsize,
    pub failing: AtomicBool,
}

impl ScriptedAuthority {
    pub fn new(time: f64) -> Arc<ScriptedAuthority> {
        Arc::new(ScriptedAuthority {
            time,
            delay: Duration::ZERO,
            queries: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        })
    }

    pub fn slow(time: f64, delay: Duration) -> Arc<ScriptedAuthority> {
        Arc::new(ScriptedAuthority {
            time,
            delay,
            queries: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        })
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TimeAuthority for ScriptedAuthority {
    async fn query(&self) -> io::Result<f64> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "NTP request timed out"));
        }
        Ok(self.time)
    }

    fn name(&self) -> String {
        "scripted".into()
    }
}
