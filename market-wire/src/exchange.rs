//! Bookkeeping for the single request a channel has in flight.
//!
//! [`PendingExchange`] records where a request is going, the exact bytes to
//! retransmit, and the deadline of the current attempt.  It does **not** touch
//! the socket; [`crate::channel::ReliableChannel`] owns the send/receive loop
//! and calls into this type.
//!
//! # Stop-and-wait contract
//! - At most **one** exchange is in flight per channel.
//! - Every retransmission resends the identical datagram.
//! - The exchange ends only when a reply from `dest` is accepted.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::time::Instant;

use crate::message::Message;
use crate::timer::{RetransmitTimer, TimerConfig};

/// A request that has been sent but not yet answered.
#[derive(Debug, Clone)]
pub struct PendingExchange {
    /// Where the request (and every retransmission) goes.
    pub dest: SocketAddr,
    /// The request as built by the caller.
    pub request: Message,
    encoded: Vec<u8>,
    timer: RetransmitTimer,
    /// How many times the request has been handed to the network (1 = first send).
    tx_count: u32,
    started_at: Instant,
}

impl PendingExchange {
    /// Start an exchange; the first transmission is counted and the timer armed.
    pub fn start(dest: SocketAddr, request: Message, timer: TimerConfig) -> Self {
        let encoded = request.encode();
        Self {
            dest,
            request,
            encoded,
            timer: RetransmitTimer::new(timer),
            tx_count: 1,
            started_at: Instant::now(),
        }
    }

    /// The datagram to put on the wire, identical for every attempt.
    pub fn datagram(&self) -> &[u8] {
        &self.encoded
    }

    /// Record a retransmission and re-arm the timer.
    pub fn on_retransmit(&mut self) {
        self.tx_count += 1;
        self.timer.arm();
    }

    /// Time left in the current attempt.
    pub fn remaining(&self) -> Duration {
        self.timer.remaining()
    }

    pub fn is_expired(&self) -> bool {
        self.timer.is_expired()
    }

    /// `true` if a datagram from `from` may answer this exchange.
    pub fn accepts_reply_from(&self, from: SocketAddr) -> bool {
        from == self.dest
    }

    pub fn tx_count(&self) -> u32 {
        self.tx_count
    }

    /// Wall time since the first transmission.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}
