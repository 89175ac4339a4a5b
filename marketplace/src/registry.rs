//! Service registry: the process-wide name → address directory.
//!
//! Server side: [`Registry`] holds the records and [`RegistryHandler`] serves
//! `REGISTER` / `LOOKUP` from a dispatcher.  Client side: [`RegistryClient`]
//! issues the same two requests over a [`ReliableChannel`].
//!
//! Records are never updated, expired or removed.  A name registered by a
//! process that has since died keeps resolving to its old address.

use std::collections::HashMap;
use std::net::SocketAddr;

use async_trait::async_trait;
use market_wire::{Handler, Message, MessageError, Opcode, ProtocolError, ReliableChannel};
use thiserror::Error;

/// Reply payload for a successful registration.
pub const REGISTERED: &str = "Registration with NameServer succeeded.";
/// Reply payload for a duplicate registration.
pub const ALREADY_REGISTERED: &str = "FAIL";
/// Reply payload for a lookup of an unknown name.
pub const NOT_REGISTERED: &str = "Error: Process has not registered with the Name Server\n";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("{0} is already registered")]
    AlreadyRegistered(String),
    #[error("{0} has not registered")]
    NotFound(String),
    #[error("malformed service record: {0}")]
    BadRecord(String),
    #[error(transparent)]
    Message(#[from] MessageError),
}

// ---------------------------------------------------------------------------
// ServiceRecord
// ---------------------------------------------------------------------------

/// Where a named service can be reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRecord {
    pub name: String,
    /// Host as advertised by the service (an IP literal or a hostname).
    pub address: String,
    pub port: u16,
}

impl ServiceRecord {
    pub fn new(name: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            port,
        }
    }

    /// Parse `name`, `address`, `port` from the leading payload fields.
    pub fn from_fields(fields: &[&str]) -> Result<Self, RegistryError> {
        let [name, address, port, ..] = fields else {
            return Err(RegistryError::BadRecord(format!(
                "expected name, address and port, got {} field(s)",
                fields.len()
            )));
        };
        let port = port
            .trim()
            .parse::<u16>()
            .map_err(|_| RegistryError::BadRecord(format!("port {port:?}")))?;
        if name.is_empty() || address.is_empty() {
            return Err(RegistryError::BadRecord("empty name or address".into()));
        }
        Ok(Self::new(*name, *address, port))
    }

    fn to_message(&self, opcode: Opcode) -> Result<Message, MessageError> {
        Message::from_fields(opcode, &[self.name.as_str(), self.address.as_str(), &self.port.to_string()])
    }

    /// Resolve `address:port` to a socket address.
    pub async fn resolve(&self) -> Result<SocketAddr, RegistryError> {
        tokio::net::lookup_host((self.address.as_str(), self.port))
            .await
            .map_err(|e| RegistryError::BadRecord(format!("{}: {e}", self.address)))?
            .next()
            .ok_or_else(|| RegistryError::BadRecord(format!("{} has no address", self.address)))
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// In-memory directory keyed by service name.
#[derive(Debug, Default)]
pub struct Registry {
    records: HashMap<String, ServiceRecord>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `record`; a name that is already present is refused, not overwritten.
    pub fn register(&mut self, record: ServiceRecord) -> Result<(), RegistryError> {
        if self.records.contains_key(&record.name) {
            return Err(RegistryError::AlreadyRegistered(record.name));
        }
        self.records.insert(record.name.clone(), record);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&ServiceRecord, RegistryError> {
        self.records
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Server side
// ---------------------------------------------------------------------------

/// Serves `REGISTER` and `LOOKUP` for a [`Registry`].
#[derive(Debug, Default)]
pub struct RegistryHandler {
    registry: Registry,
}

impl RegistryHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn on_register(&mut self, request: &Message) -> Result<Message, ProtocolError> {
        let record = ServiceRecord::from_fields(&request.fields())
            .map_err(|e| ProtocolError::bad_payload(Opcode::Register, e.to_string()))?;
        let summary = format!("{} {} {}", record.name, record.address, record.port);
        match self.registry.register(record) {
            Ok(()) => {
                log::info!("[registry] registered: {summary}");
                Ok(Message::new(Opcode::Success, REGISTERED))
            }
            Err(e) => {
                log::warn!("[registry] registration failed: {e}");
                Ok(Message::new(Opcode::Fail, ALREADY_REGISTERED))
            }
        }
    }

    fn on_lookup(&self, request: &Message) -> Result<Message, ProtocolError> {
        let name = request.fields().first().copied().unwrap_or_default();
        match self.registry.lookup(name) {
            Ok(record) => {
                log::debug!("[registry] lookup {name} → {}:{}", record.address, record.port);
                let payload = format!("{}\n{}\n{}\n", record.name, record.address, record.port);
                Ok(Message::new(Opcode::Success, payload))
            }
            Err(e) => {
                log::info!("[registry] lookup failed: {e}");
                Ok(Message::new(Opcode::Fail, NOT_REGISTERED))
            }
        }
    }
}

#[async_trait]
impl Handler for RegistryHandler {
    fn name(&self) -> &str {
        "NameServer"
    }

    async fn handle(&mut self, request: Message, _from: SocketAddr) -> Result<Message, ProtocolError> {
        match request.opcode {
            Opcode::Register => self.on_register(&request),
            Opcode::Lookup => self.on_lookup(&request),
            other => Err(ProtocolError::UnexpectedOpcode(other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Client side
// ---------------------------------------------------------------------------

/// Registry requests issued over a caller-owned reliable channel.
pub struct RegistryClient<'a> {
    channel: &'a mut ReliableChannel,
    registry: SocketAddr,
}

impl<'a> RegistryClient<'a> {
    pub fn new(channel: &'a mut ReliableChannel, registry: SocketAddr) -> Self {
        Self { channel, registry }
    }

    /// Register `record`; a `FAIL` reply means the name is taken.
    pub async fn register(&mut self, record: &ServiceRecord) -> Result<(), RegistryError> {
        let request = record.to_message(Opcode::Register)?;
        let reply = self.channel.request(self.registry, request).await;
        match reply.opcode {
            Opcode::Success => {
                log::info!("[registry] {}", reply.payload.trim_end());
                Ok(())
            }
            _ => Err(RegistryError::AlreadyRegistered(record.name.clone())),
        }
    }

    /// Look `name` up; a `FAIL` reply means it never registered.
    pub async fn lookup(&mut self, name: &str) -> Result<ServiceRecord, RegistryError> {
        let request = Message::from_fields(Opcode::Lookup, &[name])?;
        let reply = self.channel.request(self.registry, request).await;
        match reply.opcode {
            Opcode::Success => ServiceRecord::from_fields(&reply.fields()),
            _ => Err(RegistryError::NotFound(name.to_string())),
        }
    }

    /// Look `name` up and resolve it to a socket address.
    pub async fn discover(&mut self, name: &str) -> Result<SocketAddr, RegistryError> {
        self.lookup(name).await?.resolve().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    #[test]
    fn second_register_is_refused() {
        let mut reg = Registry::new();
        for name in ["Bank", "Content", "Store", ""] {
            reg.register(ServiceRecord::new(name, "10.0.0.1", 22000)).unwrap();
            assert_eq!(
                reg.register(ServiceRecord::new(name, "10.0.0.2", 23000)),
                Err(RegistryError::AlreadyRegistered(name.to_string()))
            );
        }
        assert_eq!(reg.len(), 4);
    }

    #[test]
    fn lookup_returns_stored_address() {
        let mut reg = Registry::new();
        reg.register(ServiceRecord::new("Bank", "10.0.0.1", 22000)).unwrap();
        reg.register(ServiceRecord::new("Bank", "10.9.9.9", 1)).unwrap_err();

        let rec = reg.lookup("Bank").unwrap();
        assert_eq!((rec.address.as_str(), rec.port), ("10.0.0.1", 22000));
        assert_eq!(
            reg.lookup("Store"),
            Err(RegistryError::NotFound("Store".into()))
        );
    }

    #[test]
    fn record_from_fields_validates() {
        assert_eq!(
            ServiceRecord::from_fields(&["Store", "127.0.0.1", "24000"]).unwrap(),
            ServiceRecord::new("Store", "127.0.0.1", 24000)
        );
        assert!(ServiceRecord::from_fields(&["Store", "127.0.0.1"]).is_err());
        assert!(ServiceRecord::from_fields(&["Store", "127.0.0.1", "port"]).is_err());
        assert!(ServiceRecord::from_fields(&["Store", "127.0.0.1", "70000"]).is_err());
    }

    #[tokio::test]
    async fn handler_register_then_duplicate() {
        let mut h = RegistryHandler::new();
        let req = Message::new(Opcode::Register, "Bank\n127.0.0.1\n22000\n");

        let first = h.handle(req.clone(), peer()).await.unwrap();
        assert_eq!(first, Message::new(Opcode::Success, REGISTERED));

        let second = h.handle(req, peer()).await.unwrap();
        assert_eq!(second, Message::new(Opcode::Fail, ALREADY_REGISTERED));
        assert_eq!(h.registry().len(), 1);
    }

    #[tokio::test]
    async fn handler_lookup() {
        let mut h = RegistryHandler::new();
        h.handle(Message::new(Opcode::Register, "Content\n127.0.0.1\n23000"), peer())
            .await
            .unwrap();

        let hit = h.handle(Message::new(Opcode::Lookup, "Content\n"), peer()).await.unwrap();
        assert_eq!(hit, Message::new(Opcode::Success, "Content\n127.0.0.1\n23000\n"));

        let miss = h.handle(Message::new(Opcode::Lookup, "Bank"), peer()).await.unwrap();
        assert_eq!(miss, Message::new(Opcode::Fail, NOT_REGISTERED));
    }

    #[tokio::test]
    async fn handler_rejects_bad_register_and_foreign_opcodes() {
        let mut h = RegistryHandler::new();
        let bad = h.handle(Message::new(Opcode::Register, "Bank\n127.0.0.1"), peer()).await;
        assert!(matches!(bad, Err(ProtocolError::BadPayload { opcode: Opcode::Register, .. })));

        let foreign = h.handle(Message::empty(Opcode::BuyRequest), peer()).await;
        assert_eq!(foreign, Err(ProtocolError::UnexpectedOpcode(Opcode::BuyRequest)));
        assert!(h.registry().is_empty());
    }

    #[tokio::test]
    async fn record_resolves_ip_literal() {
        let rec = ServiceRecord::new("Bank", "127.0.0.1", 22000);
        assert_eq!(rec.resolve().await.unwrap(), "127.0.0.1:22000".parse().unwrap());
    }
}
