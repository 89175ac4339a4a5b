//! Role startup.
//!
//! Every server role follows the same sequence:
//!
//! ```text
//!   bind dispatcher socket ──► register "<Name>\n<ip>\n<port>" ──► [discover peers] ──► serve
//! ```
//!
//! The functions here stop before "serve" and hand back a ready
//! [`Dispatcher`]; the caller decides how long to run it.  Any failure on
//! the way is a [`StartupError`] and the process exits.

use std::net::{IpAddr, SocketAddr};

use market_wire::{ChannelConfig, Dispatcher, Handler, ReliableChannel, Socket, SocketError};
use thiserror::Error;

use crate::bank::BankHandler;
use crate::catalog::{CatalogItem, ContentItem};
use crate::content::{ContentHandler, ContentRepository};
use crate::registry::{RegistryClient, RegistryError, RegistryHandler, ServiceRecord};
use crate::store::{ChannelDownstream, StoreHandler};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: SocketError,
    },
    #[error("{0} registration with NameServer failed")]
    RegistrationRefused(String),
    #[error("{0} has not registered")]
    NotRegistered(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Where a role listens, how it is advertised, and where the registry is.
#[derive(Debug, Clone)]
pub struct RoleSettings {
    pub bind: SocketAddr,
    pub advertise_ip: IpAddr,
    pub registry: SocketAddr,
    pub channel: ChannelConfig,
}

pub async fn name_server(settings: &RoleSettings) -> Result<Dispatcher<RegistryHandler>, StartupError> {
    bind(settings.bind, RegistryHandler::new()).await
}

pub async fn bank(settings: &RoleSettings) -> Result<Dispatcher<BankHandler>, StartupError> {
    let dispatcher = bind(settings.bind, BankHandler::new()).await?;
    register("Bank", settings, dispatcher.local_addr().port()).await?;
    Ok(dispatcher)
}

pub async fn content(
    settings: &RoleSettings,
    items: Vec<ContentItem>,
) -> Result<Dispatcher<ContentHandler>, StartupError> {
    let repo = ContentRepository::new(items);
    log::info!("[content] loaded {} item(s)", repo.len());
    let dispatcher = bind(settings.bind, ContentHandler::new(repo)).await?;
    register("Content", settings, dispatcher.local_addr().port()).await?;
    Ok(dispatcher)
}

/// Register the store, then resolve Bank and Content and open one session
/// to each for the lifetime of the process.
pub async fn store(
    settings: &RoleSettings,
    catalog: Vec<CatalogItem>,
) -> Result<Dispatcher<StoreHandler<ChannelDownstream>>, StartupError> {
    log::info!("[store] loaded {} item(s)", catalog.len());
    let socket = Socket::bind(settings.bind)
        .await
        .map_err(|source| StartupError::Bind {
            addr: settings.bind,
            source,
        })?;
    let port = socket.local_addr.port();

    let mut channel = register("Store", settings, port).await?;
    let bank_addr = discover(&mut channel, settings.registry, "Bank").await?;
    let content_addr = discover(&mut channel, settings.registry, "Content").await?;
    log::info!("[store] bank at {bank_addr}, content at {content_addr}");

    let downstream = ChannelDownstream::connect(settings.bind.ip(), bank_addr, content_addr, &settings.channel)
        .await
        .map_err(|source| StartupError::Bind {
            addr: SocketAddr::new(settings.bind.ip(), 0),
            source,
        })?;
    Ok(Dispatcher::new(socket, StoreHandler::new(catalog, downstream)))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn bind<H: Handler>(addr: SocketAddr, handler: H) -> Result<Dispatcher<H>, StartupError> {
    Dispatcher::bind(addr, handler)
        .await
        .map_err(|source| StartupError::Bind { addr, source })
}

/// Register `name` at the advertised address and return the channel used,
/// so callers can keep talking to the registry on it.
async fn register(name: &str, settings: &RoleSettings, port: u16) -> Result<ReliableChannel, StartupError> {
    let local = SocketAddr::new(settings.bind.ip(), 0);
    let mut channel = ReliableChannel::bind(local, &settings.channel)
        .await
        .map_err(|source| StartupError::Bind { addr: local, source })?;

    let record = ServiceRecord::new(name, settings.advertise_ip.to_string(), port);
    match RegistryClient::new(&mut channel, settings.registry).register(&record).await {
        Ok(()) => Ok(channel),
        Err(RegistryError::AlreadyRegistered(_)) => Err(StartupError::RegistrationRefused(name.to_string())),
        Err(e) => Err(e.into()),
    }
}

async fn discover(channel: &mut ReliableChannel, registry: SocketAddr, name: &str) -> Result<SocketAddr, StartupError> {
    match RegistryClient::new(channel, registry).discover(name).await {
        Ok(addr) => Ok(addr),
        Err(RegistryError::NotFound(_)) => Err(StartupError::NotRegistered(name.to_string())),
        Err(e) => Err(e.into()),
    }
}
