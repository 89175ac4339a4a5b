//! Async datagram socket abstraction.
//!
//! [`Socket`] is a thin wrapper around `tokio::net::UdpSocket` that speaks
//! [`crate::message::Message`] instead of raw bytes.  It exposes two styles:
//!
//! - awaitable `send_to` / `recv_from`, used by the reliable channel;
//! - readiness + `try_*` calls, used by the dispatcher's event loop (and by
//!   the channel to clear stale datagrams).
//!
//! All protocol logic lives elsewhere; this module owns only byte I/O.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::UdpSocket;

use crate::message::{Message, MessageError, BUFFER_SIZE};

/// Errors that can arise from socket operations.
#[derive(Debug, Error)]
pub enum SocketError {
    /// Underlying I/O error from the OS.
    #[error("socket I/O error: {0}")]
    Io(#[from] io::Error),
    /// A datagram arrived from `from` but could not be decoded.
    #[error("undecodable datagram from {from}: {source}")]
    Message {
        from: SocketAddr,
        #[source]
        source: MessageError,
    },
}

/// An async, message-oriented UDP socket.
///
/// All methods are `&self` so the socket can be shared across tasks if needed.
#[derive(Debug)]
pub struct Socket {
    /// Address this socket is bound to (filled in after OS assigns ephemeral port).
    pub local_addr: SocketAddr,
    inner: UdpSocket,
}

impl Socket {
    /// Bind a new socket to `local_addr`.
    ///
    /// Passing port `0` lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr) -> Result<Self, SocketError> {
        let inner = UdpSocket::bind(local_addr).await?;
        let local_addr = inner.local_addr()?;
        Ok(Self { local_addr, inner })
    }

    /// Encode `message` and send it as a single datagram to `dest`.
    pub async fn send_to(&self, message: &Message, dest: SocketAddr) -> Result<(), SocketError> {
        self.send_datagram(&message.encode(), dest).await
    }

    /// Send already-encoded bytes as a single datagram to `dest`.
    pub async fn send_datagram(&self, bytes: &[u8], dest: SocketAddr) -> Result<(), SocketError> {
        self.inner.send_to(bytes, dest).await?;
        Ok(())
    }

    /// Receive the next datagram and decode it into a [`Message`].
    ///
    /// Datagrams longer than [`BUFFER_SIZE`] are truncated by the OS.  A
    /// datagram that fails to decode is returned as [`SocketError::Message`]
    /// carrying the sender so the caller can log it and keep reading.
    pub async fn recv_from(&self) -> Result<(Message, SocketAddr), SocketError> {
        let mut buf = [0u8; BUFFER_SIZE];
        let (n, from) = self.inner.recv_from(&mut buf).await?;
        let message =
            Message::decode(&buf[..n]).map_err(|source| SocketError::Message { from, source })?;
        Ok((message, from))
    }

    // -----------------------------------------------------------------------
    // Readiness API (dispatcher)
    // -----------------------------------------------------------------------

    /// Wait until the socket may have a datagram to read.
    pub async fn readable(&self) -> io::Result<()> {
        self.inner.readable().await
    }

    /// Wait until the socket can accept an outbound datagram.
    pub async fn writable(&self) -> io::Result<()> {
        self.inner.writable().await
    }

    /// Read one datagram without waiting.
    ///
    /// Returns `ErrorKind::WouldBlock` when the readiness event was spurious.
    pub fn try_recv_datagram(&self) -> io::Result<(Vec<u8>, SocketAddr)> {
        let mut buf = [0u8; BUFFER_SIZE];
        let (n, from) = self.inner.try_recv_from(&mut buf)?;
        Ok((buf[..n].to_vec(), from))
    }

    /// Send one already-encoded datagram without waiting.
    pub fn try_send_datagram(&self, bytes: &[u8], dest: SocketAddr) -> io::Result<usize> {
        self.inner.try_send_to(bytes, dest)
    }
}
