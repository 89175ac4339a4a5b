//! Optional packet-loss injection for exercising the retransmit path.
//!
//! Real networks drop datagrams rarely enough that the reliable channel's
//! retry loop would almost never run during local testing.  A
//! [`LossSimulator`] sits in front of every outbound send of a
//! [`crate::channel::ReliableChannel`] and discards each one (original or
//! retransmission) independently with probability `loss_rate`.
//!
//! The simulator is only consulted when a channel is built with a
//! [`SimulatorConfig`]; without one, every send reaches the socket.
//!
//! A fixed `seed` makes the drop sequence reproducible across runs.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Loss rate used when fault injection is switched on without an explicit rate.
pub const DEFAULT_LOSS_RATE: f64 = 0.5;

/// Configuration for the fault-injection model.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorConfig {
    /// Probability in `[0.0, 1.0]` that any given send is silently dropped.
    pub loss_rate: f64,
    /// Seed for the drop sequence; `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            loss_rate: DEFAULT_LOSS_RATE,
            seed: None,
        }
    }
}

impl SimulatorConfig {
    pub fn with_loss_rate(loss_rate: f64) -> Self {
        Self {
            loss_rate,
            ..Self::default()
        }
    }
}

/// Decides, send by send, whether the simulated network eats a datagram.
#[derive(Debug)]
pub struct LossSimulator {
    loss_rate: f64,
    rng: StdRng,
    dropped: u64,
    passed: u64,
}

impl LossSimulator {
    pub fn new(config: &SimulatorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let loss_rate = if config.loss_rate.is_nan() {
            0.0
        } else {
            config.loss_rate.clamp(0.0, 1.0)
        };
        Self {
            loss_rate,
            rng,
            dropped: 0,
            passed: 0,
        }
    }

    /// `true` if the next send must be discarded instead of transmitted.
    pub fn should_drop(&mut self) -> bool {
        let drop = self.rng.gen_bool(self.loss_rate);
        if drop {
            self.dropped += 1;
        } else {
            self.passed += 1;
        }
        drop
    }

    /// `(dropped, passed)` counts since construction.
    pub fn stats(&self) -> (u64, u64) {
        (self.dropped, self.passed)
    }
}
