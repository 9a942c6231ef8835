//! UDP transport behind a readiness-polling interface.
//!
//! The intake loop only sees the `Transport` trait: wait until one or more
//! sockets are readable (or a timeout passes), then receive from each ready
//! socket. Every datagram is a self-contained message.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Every socket failure is returned as a `TransportError`

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::select_all;
use futures::FutureExt;
use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::{debug, info};

/// Largest payload accepted by default.
pub const DEFAULT_MAX_DATAGRAM_BYTES: usize = 200;

// ============================================================================
// Transport Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum TransportError {
    /// A socket could not be bound. Fatal at startup.
    #[error("failed to bind UDP socket on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// Waiting for readiness failed. Unrecoverable.
    #[error("failed to poll socket {index}: {source}")]
    Poll {
        index: usize,
        #[source]
        source: io::Error,
    },

    /// Receiving from a ready socket failed.
    #[error("failed to receive on socket {index}: {source}")]
    Receive {
        index: usize,
        #[source]
        source: io::Error,
    },

    /// The datagram exceeded the size limit and was discarded.
    #[error("datagram from {from} exceeds {limit} bytes")]
    Oversized { from: SocketAddr, limit: usize },

    /// The socket had nothing to read after all.
    #[error("socket {index} has no pending datagram")]
    NotReady { index: usize },

    /// No socket with this index.
    #[error("no socket with index {index}")]
    UnknownSocket { index: usize },

    /// Nothing to listen on.
    #[error("no ports configured")]
    NoSockets,
}

impl TransportError {
    /// Whether the intake loop can keep going after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Receive { .. } | Self::Oversized { .. } | Self::NotReady { .. }
        )
    }
}

// ============================================================================
// Transport Trait
// ============================================================================

/// Result of waiting for readability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Indices of the sockets with data pending, ascending.
    Ready(Vec<usize>),
    /// Nothing arrived within the timeout.
    Timeout,
}

/// One received datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub payload: Vec<u8>,
    pub from: SocketAddr,
}

/// A set of datagram sockets the intake loop can wait on.
#[async_trait]
pub trait Transport: Send {
    /// Waits up to `timeout` for any socket to become readable.
    async fn poll_readable(&mut self, timeout: Duration) -> Result<Readiness, TransportError>;

    /// Receives one datagram from the socket at `index` without blocking.
    async fn receive(&mut self, index: usize) -> Result<Datagram, TransportError>;
}

// ============================================================================
// UDP Transport
// ============================================================================

/// One UDP socket per configured port, all on the same address.
pub struct UdpTransport {
    sockets: Vec<UdpSocket>,
    max_datagram_bytes: usize,
    /// One byte larger than the limit so oversized datagrams are detectable
    buf: Vec<u8>,
}

impl UdpTransport {
    /// Binds a socket on `addr` for each port, in order.
    ///
    /// Port 0 picks an ephemeral port; see `local_addrs`.
    ///
    /// # Errors
    ///
    /// - `TransportError::NoSockets` if `ports` is empty
    /// - `TransportError::Bind` if any socket fails to bind
    pub async fn bind(
        addr: IpAddr,
        ports: &[u16],
        max_datagram_bytes: usize,
    ) -> Result<Self, TransportError> {
        if ports.is_empty() {
            return Err(TransportError::NoSockets);
        }

        let mut sockets = Vec::with_capacity(ports.len());
        for &port in ports {
            let bind_addr = SocketAddr::new(addr, port);
            let socket = UdpSocket::bind(bind_addr)
                .await
                .map_err(|source| TransportError::Bind {
                    addr: bind_addr,
                    source,
                })?;

            info!(
                addr = %socket.local_addr().unwrap_or(bind_addr),
                "Listening for datagrams"
            );
            sockets.push(socket);
        }

        Ok(Self {
            sockets,
            max_datagram_bytes,
            buf: vec![0u8; max_datagram_bytes + 1],
        })
    }

    /// Actual bound addresses, in port order.
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.sockets
            .iter()
            .filter_map(|s| s.local_addr().ok())
            .collect()
    }

    pub fn socket_count(&self) -> usize {
        self.sockets.len()
    }

    pub fn max_datagram_bytes(&self) -> usize {
        self.max_datagram_bytes
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn poll_readable(&mut self, timeout: Duration) -> Result<Readiness, TransportError> {
        if self.sockets.is_empty() {
            return Err(TransportError::NoSockets);
        }

        let waits = self.sockets.iter().map(|s| Box::pin(s.readable()));

        match tokio::time::timeout(timeout, select_all(waits)).await {
            Err(_) => Ok(Readiness::Timeout),
            Ok((Err(source), index, _)) => Err(TransportError::Poll { index, source }),
            Ok((Ok(()), first, _)) => {
                let mut ready = vec![first];
                for (index, socket) in self.sockets.iter().enumerate() {
                    if index != first && matches!(socket.readable().now_or_never(), Some(Ok(()))) {
                        ready.push(index);
                    }
                }
                ready.sort_unstable();
                Ok(Readiness::Ready(ready))
            }
        }
    }

    async fn receive(&mut self, index: usize) -> Result<Datagram, TransportError> {
        let socket = self
            .sockets
            .get(index)
            .ok_or(TransportError::UnknownSocket { index })?;

        match socket.try_recv_from(&mut self.buf) {
            Ok((len, from)) if len > self.max_datagram_bytes => Err(TransportError::Oversized {
                from,
                limit: self.max_datagram_bytes,
            }),
            Ok((len, from)) => {
                debug!(index, from = %from, bytes = len, "Datagram read");
                Ok(Datagram {
                    payload: self.buf[..len].to_vec(),
                    from,
                })
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                Err(TransportError::NotReady { index })
            }
            Err(source) => Err(TransportError::Receive { index, source }),
        }
    }
}
