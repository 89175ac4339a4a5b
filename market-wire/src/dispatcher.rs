//! Single-threaded, readiness-driven request loop shared by every server role.
//!
//! # Architecture
//!
//! ```text
//!            ┌──────────────── Dispatcher ────────────────┐
//!  datagram  │  AWAIT_READABLE                            │
//!  ─────────▶│    readable() → try_recv → decode          │
//!            │    handler.handle(request, from) ──────────┼──▶ role logic
//!            │  AWAIT_WRITABLE(dest, bytes)               │
//!  ◀─────────│    writable() → try_send_to(dest)          │
//!   reply    └────────────────────────────────────────────┘
//! ```
//!
//! One socket serves every peer.  Requests are handled strictly one at a
//! time: while a handler awaits (the store's downstream calls, for example)
//! further datagrams wait in the socket's receive queue.
//!
//! # Error policy
//! - Undecodable datagrams and handler [`ProtocolError`]s are logged and the
//!   exchange is dropped without a reply.
//! - A failed read or write is logged and the state returns to
//!   `AWAIT_READABLE`; the loop keeps running.
//! - Only a failure of the readiness wait itself ends [`Dispatcher::run`].

use std::future::Future;
use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use thiserror::Error;

use crate::message::{Message, MessageError, Opcode};
use crate::socket::{Socket, SocketError};
use crate::state::DispatchState;

// ---------------------------------------------------------------------------
// Handler seam
// ---------------------------------------------------------------------------

/// Role-specific request logic plugged into a [`Dispatcher`].
#[async_trait]
pub trait Handler: Send {
    /// Short role name used in log lines.
    fn name(&self) -> &str;

    /// Produce the reply for one request.
    ///
    /// Returning an error drops the exchange: the peer gets no reply.
    async fn handle(&mut self, request: Message, from: SocketAddr) -> Result<Message, ProtocolError>;
}

/// A request the role cannot act on.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error(transparent)]
    Message(#[from] MessageError),
    /// Valid opcode, but not one this role serves.
    #[error("unexpected opcode {0}")]
    UnexpectedOpcode(Opcode),
    #[error("bad {opcode} payload: {reason}")]
    BadPayload { opcode: Opcode, reason: String },
}

impl ProtocolError {
    pub fn bad_payload(opcode: Opcode, reason: impl Into<String>) -> Self {
        Self::BadPayload {
            opcode,
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Event loop owning one server socket and its role handler.
#[derive(Debug)]
pub struct Dispatcher<H> {
    socket: Socket,
    handler: H,
    state: DispatchState,
}

impl<H: Handler> Dispatcher<H> {
    /// Bind the server socket.  Failure here is fatal to the role.
    pub async fn bind(local_addr: SocketAddr, handler: H) -> Result<Self, SocketError> {
        let socket = Socket::bind(local_addr).await?;
        Ok(Self::new(socket, handler))
    }

    pub fn new(socket: Socket, handler: H) -> Self {
        Self {
            socket,
            handler,
            state: DispatchState::default(),
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn state(&self) -> &DispatchState {
        &self.state
    }

    /// Serve until the socket's readiness wait fails.
    pub async fn run(&mut self) -> io::Result<()> {
        log::info!(
            "[dispatch] {} serving on {}",
            self.handler.name(),
            self.socket.local_addr
        );
        loop {
            self.step().await?;
        }
    }

    /// Serve until `shutdown` resolves.
    ///
    /// A request being handled when `shutdown` fires is abandoned.
    pub async fn serve_until<F>(&mut self, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()>,
    {
        let name = self.handler.name().to_string();
        tokio::select! {
            result = self.run() => result,
            _ = shutdown => {
                log::info!("[dispatch] {name} shutting down");
                Ok(())
            }
        }
    }

    /// Perform one readiness-driven transition.
    pub async fn step(&mut self) -> io::Result<()> {
        match &self.state {
            DispatchState::AwaitReadable => {
                self.socket.readable().await?;
                match self.socket.try_recv_datagram() {
                    Ok((bytes, from)) => self.on_datagram(&bytes, from).await,
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                    Err(e) => {
                        log::warn!("[dispatch] {} read failed: {e}", self.handler.name());
                        self.state.reset();
                    }
                }
            }
            DispatchState::AwaitWritable(out) => {
                self.socket.writable().await?;
                let result = self.socket.try_send_datagram(&out.datagram, out.dest);
                let dest = out.dest;
                match result {
                    Ok(n) => {
                        log::debug!("[dispatch] {} → {dest} ({n} bytes)", self.handler.name());
                        self.state.reset();
                    }
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                    Err(e) => {
                        log::warn!(
                            "[dispatch] {} reply to {dest} failed: {e}",
                            self.handler.name()
                        );
                        self.state.reset();
                    }
                }
            }
        }
        Ok(())
    }

    /// Decode, handle, and queue the reply for one inbound datagram.
    async fn on_datagram(&mut self, bytes: &[u8], from: SocketAddr) {
        let request = match Message::decode(bytes) {
            Ok(request) => request,
            Err(e) => {
                log::warn!(
                    "[dispatch] {} ignoring datagram from {from}: {e}",
                    self.handler.name()
                );
                return;
            }
        };
        log::debug!("[dispatch] {} ← {from} {request}", self.handler.name());

        match self.handler.handle(request, from).await {
            Ok(reply) => self.state.queue_reply(from, &reply),
            Err(e) => log::warn!(
                "[dispatch] {} ignoring request from {from}: {e}",
                self.handler.name()
            ),
        }
    }
}
