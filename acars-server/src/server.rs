//! UDP ingestion loop for acarsdec output.
//!
//! acarsdec sends one fixed-column text record per datagram. The loop
//! receives, decodes and hands each message to a [`MessageHandler`], one
//! datagram at a time: a slow handler backpressures the socket and the OS
//! receive buffer absorbs (or drops) the excess.

use std::future::Future;
use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::{error, info, warn};

use acars_core::decode;

use crate::handler::MessageHandler;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind UDP socket on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to receive UDP packet: {0}")]
    Socket(#[from] io::Error),
}

/// Datagram counters, reported when the loop exits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    pub received: u64,
    pub decoded: u64,
    pub rejected: u64,
}

/// Bound UDP socket, ready to run.
pub struct Server {
    socket: UdpSocket,
    max_packet_size: usize,
}

impl Server {
    pub async fn bind(addr: &str, max_packet_size: usize) -> Result<Self, ServerError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        Ok(Server {
            socket,
            max_packet_size,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receive until `shutdown` completes or the socket fails.
    ///
    /// Undecodable datagrams are logged and dropped; they never stop the
    /// loop. A receive error is fatal and returned to the caller.
    pub async fn run<H, F>(self, handler: &H, shutdown: F) -> Result<IngestStats, ServerError>
    where
        H: MessageHandler + ?Sized,
        F: Future<Output = ()>,
    {
        let mut buf = vec![0u8; self.max_packet_size];
        let mut stats = IngestStats::default();

        let local = self.local_addr()?;
        info!(addr = %local, port = local.port(), "listening for ACARS datagrams");

        tokio::pin!(shutdown);

        loop {
            let (len, peer) = tokio::select! {
                _ = &mut shutdown => {
                    info!(
                        received = stats.received,
                        decoded = stats.decoded,
                        rejected = stats.rejected,
                        "shutdown requested"
                    );
                    break;
                }
                res = self.socket.recv_from(&mut buf) => match res {
                    Ok(r) => r,
                    Err(e) => {
                        error!(error = %e, "failed to receive UDP packet");
                        return Err(ServerError::Socket(e));
                    }
                },
            };

            stats.received += 1;
            match decode(&buf[..len]) {
                Ok(message) => {
                    stats.decoded += 1;
                    handler.handle(message).await;
                }
                Err(e) => {
                    stats.rejected += 1;
                    warn!(%peer, len, error = %e, "dropping undecodable datagram");
                }
            }
        }

        Ok(stats)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
