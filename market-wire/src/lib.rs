//! `market-wire`: the messaging substrate shared by every marketplace role.
//!
//! # Architecture
//!
//! ```text
//!   client side                               server side
//!  ┌────────────────┐   request datagram   ┌──────────────────┐
//!  │ ReliableChannel│─────────────────────▶│    Dispatcher    │
//!  │ (stop-and-wait)│◀─────────────────────│ (readiness loop) │
//!  └───────┬────────┘    reply datagram    └────────┬─────────┘
//!          │ PendingExchange + timer                │ Handler (role logic)
//!  ┌───────▼────────────────────────────────────────▼─────────┐
//!  │                 Socket  (tokio UdpSocket)                │
//!  └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`message`]    — wire format (opcode + text payload)
//! - [`socket`]     — async UDP socket speaking [`message::Message`]
//! - [`channel`]    — reliable request/reply via timeout and retransmit
//! - [`exchange`]   — state of the one request a channel has in flight
//! - [`timer`]      — fixed retransmit timeout
//! - [`simulator`]  — optional loss injection for exercising retries
//! - [`dispatcher`] — single-threaded server loop and the [`dispatcher::Handler`] seam
//! - [`state`]      — dispatcher state machine types

pub mod channel;
pub mod dispatcher;
pub mod exchange;
pub mod message;
pub mod simulator;
pub mod socket;
pub mod state;
pub mod timer;

pub use channel::{ChannelConfig, ReliableChannel};
pub use dispatcher::{Dispatcher, Handler, ProtocolError};
pub use message::{Message, MessageError, Opcode, BUFFER_SIZE};
pub use simulator::SimulatorConfig;
pub use socket::{Socket, SocketError};
pub use timer::TimerConfig;
