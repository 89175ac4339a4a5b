//! Command-line surface and runtime settings for every role.
//!
//! One binary serves all five roles through subcommands.  Ports are
//! positional and must lie strictly between 1024 and 65535; the shared
//! network options tune the reliable channel each role uses for its
//! outbound requests.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use market_wire::{ChannelConfig, SimulatorConfig, TimerConfig};
use thiserror::Error;

/// Ports at or below this value are refused.
pub const PORT_FLOOR: u16 = 1024;
/// Ports at or above this value are refused.
pub const PORT_CEILING: u16 = 65535;

/// Fatal configuration problems; the process exits before serving.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("port {0} outside {floor}..{ceiling} (exclusive)", floor = PORT_FLOOR, ceiling = PORT_CEILING)]
    PortOutOfRange(u32),
    #[error("invalid argument {0:?}")]
    InvalidArgument(String),
    #[error("cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: {reason}")]
    BadRecord { line: usize, reason: String },
}

/// `clap` value parser for role ports.
pub fn parse_port(s: &str) -> Result<u16, ConfigError> {
    let port: u32 = s
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidArgument(s.to_string()))?;
    if port <= u32::from(PORT_FLOOR) || port >= u32::from(PORT_CEILING) {
        return Err(ConfigError::PortOutOfRange(port));
    }
    Ok(port as u16)
}

fn parse_probability(s: &str) -> Result<f64, ConfigError> {
    match s.trim().parse::<f64>() {
        Ok(p) if (0.0..=1.0).contains(&p) => Ok(p),
        _ => Err(ConfigError::InvalidArgument(s.to_string())),
    }
}

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

/// Registry, bank, content repository, store and client of a small
/// marketplace speaking a datagram request/reply protocol.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub role: Role,

    #[command(flatten)]
    pub net: NetOptions,
}

#[derive(Debug, Subcommand)]
pub enum Role {
    /// Run the name server (service registry).
    NameServer {
        #[arg(value_parser = parse_port)]
        port: u16,
    },
    /// Run the bank (payment approval).
    Bank {
        #[arg(value_parser = parse_port)]
        port: u16,
        #[arg(value_parser = parse_port)]
        registry_port: u16,
    },
    /// Run the content repository.
    Content {
        #[arg(value_parser = parse_port)]
        port: u16,
        /// File of "id content" lines.
        content_file: PathBuf,
        #[arg(value_parser = parse_port)]
        registry_port: u16,
    },
    /// Run the store (order orchestration).
    Store {
        #[arg(value_parser = parse_port)]
        port: u16,
        /// File of "id price" lines.
        stock_file: PathBuf,
        #[arg(value_parser = parse_port)]
        registry_port: u16,
    },
    /// Ask the store for its listing (0) or buy order number 1-10.
    Client {
        #[arg(value_parser = clap::value_parser!(u8).range(0..=10))]
        request: u8,
        #[arg(value_parser = parse_port)]
        registry_port: u16,
    },
}

/// Options shared by every role.
#[derive(Debug, Clone, clap::Args)]
pub struct NetOptions {
    /// Host the name server runs on.
    #[arg(long, global = true, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub registry_host: IpAddr,

    /// Address other roles should use to reach this one.
    #[arg(long, global = true, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub advertise_ip: IpAddr,

    /// Retransmit timeout for outbound requests, in milliseconds.
    #[arg(long, global = true, default_value_t = 1000)]
    pub timeout_ms: u64,

    /// Drop each outbound send with this probability (0.5 if no value given).
    #[arg(
        long,
        global = true,
        num_args = 0..=1,
        default_missing_value = "0.5",
        value_parser = parse_probability
    )]
    pub loss_rate: Option<f64>,

    /// Seed for simulated loss, for reproducible runs.
    #[arg(long, global = true)]
    pub seed: Option<u64>,
}

impl NetOptions {
    pub fn registry_addr(&self, registry_port: u16) -> SocketAddr {
        SocketAddr::new(self.registry_host, registry_port)
    }

    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            timer: TimerConfig {
                timeout: Duration::from_millis(self.timeout_ms),
            },
            simulator: self.loss_rate.map(|loss_rate| SimulatorConfig {
                seed: self.seed,
                ..SimulatorConfig::with_loss_rate(loss_rate)
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_bounds_are_exclusive() {
        assert!(matches!(parse_port("1024"), Err(ConfigError::PortOutOfRange(1024))));
        assert!(matches!(parse_port("65535"), Err(ConfigError::PortOutOfRange(65535))));
        assert_eq!(parse_port("1025").unwrap(), 1025);
        assert_eq!(parse_port("65534").unwrap(), 65534);
    }

    #[test]
    fn port_rejects_garbage() {
        assert!(matches!(parse_port("abc"), Err(ConfigError::InvalidArgument(_))));
        assert!(matches!(parse_port("-5"), Err(ConfigError::InvalidArgument(_))));
        assert!(matches!(parse_port("70000"), Err(ConfigError::PortOutOfRange(70000))));
    }

    #[test]
    fn parses_store_subcommand() {
        let cli = Cli::try_parse_from(["marketplace", "store", "24000", "stock.txt", "21000"]).unwrap();
        match cli.role {
            Role::Store {
                port,
                stock_file,
                registry_port,
            } => {
                assert_eq!(port, 24000);
                assert_eq!(stock_file, PathBuf::from("stock.txt"));
                assert_eq!(registry_port, 21000);
            }
            other => panic!("unexpected role {other:?}"),
        }
        assert_eq!(cli.net.registry_addr(21000), "127.0.0.1:21000".parse().unwrap());
    }

    #[test]
    fn wrong_argument_count_is_rejected() {
        assert!(Cli::try_parse_from(["marketplace", "bank", "22000"]).is_err());
        assert!(Cli::try_parse_from(["marketplace", "name-server", "21000", "1"]).is_err());
    }

    #[test]
    fn client_request_range() {
        assert!(Cli::try_parse_from(["marketplace", "client", "10", "21000"]).is_ok());
        assert!(Cli::try_parse_from(["marketplace", "client", "11", "21000"]).is_err());
    }

    #[test]
    fn channel_defaults_have_no_loss() {
        let cli = Cli::try_parse_from(["marketplace", "name-server", "21000"]).unwrap();
        let cfg = cli.net.channel_config();
        assert_eq!(cfg.timer.timeout, Duration::from_millis(1000));
        assert!(cfg.simulator.is_none());
    }

    #[test]
    fn bare_loss_flag_means_one_half() {
        let cli = Cli::try_parse_from([
            "marketplace",
            "bank",
            "22000",
            "21000",
            "--loss-rate",
            "--seed",
            "9",
        ])
        .unwrap();
        let sim = cli.net.channel_config().simulator.unwrap();
        assert_eq!(sim.loss_rate, 0.5);
        assert_eq!(sim.seed, Some(9));
    }

    #[test]
    fn loss_rate_must_be_probability() {
        assert!(Cli::try_parse_from(["marketplace", "name-server", "21000", "--loss-rate", "1.5"]).is_err());
    }
}
