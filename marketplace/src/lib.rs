//! Marketplace roles built on `market_wire`.
//!
//! ```text
//!                 ┌──────────────┐
//!      register / │  NameServer  │ lookup
//!     ┌──────────►│  (registry)  │◄───────────┐
//!     │           └──────────────┘            │
//!  ┌──┴───┐  ┌─────────┐                  ┌───┴────┐
//!  │ Bank │  │ Content │                  │ Client │
//!  └──▲───┘  └────▲────┘                  └───┬────┘
//!     │ validate  │ fetch                     │ list / buy
//!     │      ┌────┴──┐                        │
//!     └──────┤ Store │◄───────────────────────┘
//!            └───────┘
//! ```
//!
//! Every server role is a [`market_wire::Dispatcher`] with a role-specific
//! [`market_wire::Handler`]; every outbound call goes through a
//! [`market_wire::ReliableChannel`].

pub mod bank;
pub mod catalog;
pub mod client;
pub mod config;
pub mod content;
pub mod registry;
pub mod server;
pub mod store;

pub use catalog::{CatalogItem, ContentItem};
pub use config::{Cli, ConfigError, NetOptions, Role};
pub use registry::{Registry, RegistryClient, RegistryError, ServiceRecord};
pub use server::{RoleSettings, StartupError};
