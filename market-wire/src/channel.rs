//! Reliable request/reply over an unreliable datagram socket.
//!
//! [`ReliableChannel::request`] implements stop-and-wait ARQ:
//!
//! ```text
//!   send(request) ──▶ wait ≤ timeout ──reply from dest──▶ return reply
//!        ▲                 │
//!        └── retransmit ◀──┘ timeout elapsed
//! ```
//!
//! - The same datagram is resent after every timeout, forever: there is no
//!   retry cap, no back-off and no overall deadline.  Callers that need one
//!   wrap the call in `tokio::time::timeout`.
//! - The wait is a timed receive, not a polling loop.
//! - Send and receive failures are logged and treated like a lost datagram.
//! - Requests carry no sequence number.  A delayed original and its
//!   retransmission can both be processed by the receiver (at-least-once).
//!   Every datagram already queued when an exchange starts belongs to an
//!   earlier exchange and is discarded before the request is sent.  While
//!   waiting, only replies from the request's destination are accepted.
//!
//! When built with a [`SimulatorConfig`], every transmission (original or
//! retransmission) first passes through a [`LossSimulator`].

use std::io;
use std::net::SocketAddr;

use tokio::time::timeout;

use crate::exchange::PendingExchange;
use crate::message::Message;
use crate::simulator::{LossSimulator, SimulatorConfig};
use crate::socket::{Socket, SocketError};
use crate::timer::TimerConfig;

/// Settings shared by every outbound channel a process opens.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelConfig {
    pub timer: TimerConfig,
    /// `Some` switches on fault injection.
    pub simulator: Option<SimulatorConfig>,
}

/// One endpoint issuing request/reply exchanges, one at a time.
///
/// `request` takes `&mut self`, so a second exchange cannot start on the same
/// channel before the first has its reply.
#[derive(Debug)]
pub struct ReliableChannel {
    socket: Socket,
    timer: TimerConfig,
    simulator: Option<LossSimulator>,
}

impl ReliableChannel {
    /// Bind a channel socket to `local_addr` (port `0` for an ephemeral port).
    pub async fn bind(local_addr: SocketAddr, config: &ChannelConfig) -> Result<Self, SocketError> {
        let socket = Socket::bind(local_addr).await?;
        Ok(Self::from_socket(socket, config))
    }

    /// Wrap an already bound socket.
    pub fn from_socket(socket: Socket, config: &ChannelConfig) -> Self {
        Self {
            socket,
            timer: config.timer,
            simulator: config.simulator.as_ref().map(LossSimulator::new),
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr
    }

    /// `(dropped, passed)` transmissions when fault injection is on.
    pub fn loss_stats(&self) -> Option<(u64, u64)> {
        self.simulator.as_ref().map(LossSimulator::stats)
    }

    /// Send `request` to `dest` and wait until a reply from `dest` arrives.
    ///
    /// Never gives up; see the module docs.
    pub async fn request(&mut self, dest: SocketAddr, request: Message) -> Message {
        self.discard_stale();
        let mut exchange = PendingExchange::start(dest, request, self.timer);
        log::debug!("[channel] → {} {}", dest, exchange.request);
        self.transmit(&exchange).await;

        loop {
            match timeout(exchange.remaining(), self.socket.recv_from()).await {
                Ok(Ok((reply, from))) if exchange.accepts_reply_from(from) => {
                    log::debug!(
                        "[channel] ← {} {} after {} transmission(s), {:?}",
                        from,
                        reply,
                        exchange.tx_count(),
                        exchange.elapsed()
                    );
                    return reply;
                }
                Ok(Ok((reply, from))) => {
                    log::debug!("[channel] ignoring {reply} from {from}; waiting on {dest}");
                }
                Ok(Err(SocketError::Message { from, source })) => {
                    log::warn!("[channel] dropping undecodable reply from {from}: {source}");
                }
                Ok(Err(SocketError::Io(e))) => {
                    log::warn!("[channel] receive failed ({e}); treating as lost");
                    tokio::time::sleep(exchange.remaining()).await;
                }
                Err(_elapsed) => {}
            }

            if exchange.is_expired() {
                exchange.on_retransmit();
                log::info!(
                    "[channel] timeout expired; retransmitting {} to {} (attempt {})",
                    exchange.request.opcode,
                    dest,
                    exchange.tx_count()
                );
                self.transmit(&exchange).await;
            }
        }
    }

    /// Drop everything queued on the socket, typically replies to the
    /// retransmissions of an exchange that has already completed.
    fn discard_stale(&self) {
        loop {
            match self.socket.try_recv_datagram() {
                Ok((bytes, from)) => match Message::decode(&bytes) {
                    Ok(stale) => log::info!("[channel] discarding stale {stale} from {from}"),
                    Err(e) => log::info!("[channel] discarding stale datagram from {from}: {e}"),
                },
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) => {
                    log::warn!("[channel] draining stale datagrams failed: {e}");
                    return;
                }
            }
        }
    }

    /// Hand the exchange's datagram to the network, unless the simulator eats it.
    async fn transmit(&mut self, exchange: &PendingExchange) {
        if let Some(sim) = self.simulator.as_mut() {
            if sim.should_drop() {
                log::debug!(
                    "[channel] simulated loss of {} to {}",
                    exchange.request.opcode,
                    exchange.dest
                );
                return;
            }
        }
        if let Err(e) = self
            .socket
            .send_datagram(exchange.datagram(), exchange.dest)
            .await
        {
            log::warn!("[channel] send to {} failed ({e}); treating as lost", exchange.dest);
        }
    }
}
