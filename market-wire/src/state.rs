//! Dispatcher finite-state machine types.
//!
//! The dispatcher serves every peer through one datagram socket and keeps a
//! single piece of state for it:
//!
//! ```text
//!   AWAIT_READABLE ──read + handle──▶ AWAIT_WRITABLE(dest, bytes)
//!         ▲                                   │
//!         └──────── sent / send failed ◀──────┘
//! ```
//!
//! Datagram sockets have no implicit peer, so the reply's destination travels
//! with the write-pending buffer.  Transitions are driven by
//! [`crate::dispatcher::Dispatcher`]; this module only holds the types.

use std::net::SocketAddr;

use crate::message::Message;

/// An encoded reply waiting for write readiness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundReply {
    pub dest: SocketAddr,
    pub datagram: Vec<u8>,
}

impl OutboundReply {
    pub fn new(dest: SocketAddr, reply: &Message) -> Self {
        Self {
            dest,
            datagram: reply.encode(),
        }
    }
}

/// All possible states of the dispatcher FSM.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DispatchState {
    /// Registered for read readiness; initial state.
    #[default]
    AwaitReadable,
    /// A reply is buffered and waits for write readiness.
    AwaitWritable(OutboundReply),
}

impl DispatchState {
    /// Buffer `reply` for `dest` and move to `AwaitWritable`.
    pub fn queue_reply(&mut self, dest: SocketAddr, reply: &Message) {
        *self = Self::AwaitWritable(OutboundReply::new(dest, reply));
    }

    /// The buffered reply, if any, without changing state.
    pub fn pending(&self) -> Option<&OutboundReply> {
        match self {
            Self::AwaitReadable => None,
            Self::AwaitWritable(out) => Some(out),
        }
    }

    /// Clear the buffer and return to `AwaitReadable`.
    pub fn reset(&mut self) {
        *self = Self::AwaitReadable;
    }

    pub fn is_readable(&self) -> bool {
        matches!(self, Self::AwaitReadable)
    }
}

impl std::fmt::Display for DispatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AwaitReadable => write!(f, "AWAIT_READABLE"),
            Self::AwaitWritable(out) => write!(f, "AWAIT_WRITABLE({})", out.dest),
        }
    }
}
