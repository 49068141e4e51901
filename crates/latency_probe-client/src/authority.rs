// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Remote time authorities.
//!
//! A [`TimeAuthority`] answers one question: what time does the remote
//! reference think it is right now? [`NtpAuthority`] answers it with a single
//! SNTP exchange over UDP using [`tokio::net::UdpSocket`].
//!
//! The free functions [`request`] and [`request_with_timeout`] perform one
//! query against an explicit address and are what [`NtpAuthority`] uses
//! internally.
//!
//! # Runtime Requirements
//!
//! These functions must be called from within a Tokio runtime context.
//!
//! # Examples
//!
//! ```no_run
//! # async fn example() -> std::io::Result<()> {
//! let unix_secs = latency_client::authority::request("time.nist.gov:123").await?;
//! println!("authority time: {unix_secs}");
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{ToSocketAddrs, UdpSocket};
use tracing::{debug, warn};

use latency_proto::protocol;
use latency_proto::unix_time;

/// Default time for one complete query (DNS + send + receive).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A remote reference clock.
///
/// Implementations must be safe to query from many tasks; the
/// [`ClockSource`](crate::clock::ClockSource) guarantees at most one query is
/// in flight per source, but several sources may share an authority.
#[async_trait]
pub trait TimeAuthority: Send + Sync {
    /// Query the authority for its current time as Unix epoch seconds.
    async fn query(&self) -> io::Result<f64>;

    /// Human-readable name of the authority, used in logs and status reports.
    fn name(&self) -> String;
}

/// SNTP authority reached over UDP.
#[derive(Clone, Debug)]
pub struct NtpAuthority {
    host: String,
    port: u16,
    timeout: Duration,
}

impl NtpAuthority {
    /// Create an authority for `host` on the standard NTP port.
    pub fn new(host: impl Into<String>) -> Self {
        NtpAuthority {
            host: host.into(),
            port: protocol::PORT,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the UDP port (mock servers listen on ephemeral ports).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override the per-query timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The configured host name or address.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The configured per-query timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl TimeAuthority for NtpAuthority {
    async fn query(&self) -> io::Result<f64> {
        request_with_timeout((self.host.as_str(), self.port), self.timeout).await
    }

    fn name(&self) -> String {
        self.host.clone()
    }
}

/// Query an SNTP server with the default 5 second timeout.
///
/// Returns the server's transmit time in whole Unix seconds.
pub async fn request<A: ToSocketAddrs>(addr: A) -> io::Result<f64> {
    request_with_timeout(addr, DEFAULT_TIMEOUT).await
}

/// Query an SNTP server with a configurable timeout.
///
/// # Errors
///
/// - [`io::ErrorKind::TimedOut`] if no reply arrives within `timeout`.
/// - [`io::ErrorKind::InvalidInput`] if `addr` resolves to nothing.
/// - [`io::ErrorKind::InvalidData`] if the reply is shorter than 48 bytes.
/// - Any socket error from bind, send or receive.
pub async fn request_with_timeout<A: ToSocketAddrs>(
    addr: A,
    timeout: Duration,
) -> io::Result<f64> {
    tokio::time::timeout(timeout, request_inner(addr))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "NTP request timed out"))?
}

async fn request_inner<A: ToSocketAddrs>(addr: A) -> io::Result<f64> {
    let resolved_addrs = prefer_ipv4(tokio::net::lookup_host(addr).await?.collect());
    let Some(&target_addr) = resolved_addrs.first() else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "address resolved to no socket addresses",
        ));
    };

    let sock = UdpSocket::bind(bind_addr_for(&target_addr)).await?;
    let sz = sock.send_to(&protocol::client_request(), target_addr).await?;
    debug!(local = ?sock.local_addr(), sent = sz, target = %target_addr, "sent SNTP request");

    let mut recv_buf = [0u8; 1024];
    // Datagrams from other hosts are dropped; the caller's deadline bounds the wait.
    let recv_len = loop {
        let (recv_len, src_addr) = sock.recv_from(&mut recv_buf[..]).await?;
        if resolved_addrs.iter().any(|a| a.ip() == src_addr.ip()) {
            debug!(bytes = recv_len, from = %src_addr, "received SNTP reply");
            break recv_len;
        }
        warn!(from = %src_addr, "ignoring datagram from unexpected source address");
    };

    let raw = protocol::transmit_seconds(&recv_buf[..recv_len])?;
    let pivot = unix_time::now_epoch() as i64;
    Ok(unix_time::ntp_to_unix_seconds(raw, pivot) as f64)
}

/// Wildcard bind address matching the target's address family.
pub(crate) fn bind_addr_for(target: &SocketAddr) -> SocketAddr {
    match target {
        SocketAddr::V4(_) => SocketAddr::from(([0, 0, 0, 0], 0)),
        SocketAddr::V6(_) => SocketAddr::from(([0u16; 8], 0)),
    }
}

// IPv4 first, keeping IPv6 as fallback for v6-only hosts.
fn prefer_ipv4(addrs: Vec<SocketAddr>) -> Vec<SocketAddr> {
    let (mut v4, v6): (Vec<_>, Vec<_>) = addrs.into_iter().partition(SocketAddr::is_ipv4);
    v4.extend(v6);
    v4
}
