//! Client role: find the store through the registry, send one request,
//! render the reply for the terminal.

use std::net::{IpAddr, SocketAddr};

use market_wire::{ChannelConfig, Message, Opcode, ReliableChannel, SocketError};
use thiserror::Error;

use crate::registry::{RegistryClient, RegistryError};

/// Card number sent with every purchase.
pub const CARD_NUMBER: &str = "1234567891234567";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Store has not registered")]
    StoreNotRegistered,
    #[error("store lookup failed: {0}")]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Socket(#[from] SocketError),
    #[error("store replied with unexpected {}", .0.opcode)]
    UnexpectedReply(Message),
}

/// What the user asked for on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    ListItems,
    /// 1-based position in the store listing.
    Buy(u8),
}

impl Request {
    /// `0` lists, anything else buys that order number.
    pub fn from_number(n: u8) -> Self {
        match n {
            0 => Self::ListItems,
            n => Self::Buy(n),
        }
    }

    pub fn to_message(self) -> Message {
        match self {
            Self::ListItems => Message::empty(Opcode::ListItemsRequest),
            Self::Buy(n) => Message::new(Opcode::BuyRequest, format!("{n}\n{CARD_NUMBER}")),
        }
    }
}

/// Turn the store's reply into the text printed to stdout.
pub fn render(request: Request, reply: &Message) -> Result<String, ClientError> {
    match (request, reply.opcode) {
        (Request::ListItems, Opcode::Success) => Ok(reply.payload.clone()),
        (Request::Buy(_), Opcode::Success) => match reply.fields()[..] {
            [id, content, price, ..] => Ok(format!("{id} ($ {price}) CONTENT {content}\n")),
            _ => Err(ClientError::UnexpectedReply(reply.clone())),
        },
        (Request::Buy(_), Opcode::Fail) => match reply.fields()[..] {
            [id, reason, ..] => Ok(format!("{id} {reason}\n")),
            _ => Err(ClientError::UnexpectedReply(reply.clone())),
        },
        _ => Err(ClientError::UnexpectedReply(reply.clone())),
    }
}

/// Discover the store, send `request` and return the rendered reply.
///
/// Both round trips share one channel bound to an ephemeral port on `local_ip`.
pub async fn run(
    request: Request,
    registry: SocketAddr,
    local_ip: IpAddr,
    config: &ChannelConfig,
) -> Result<String, ClientError> {
    let mut channel = ReliableChannel::bind(SocketAddr::new(local_ip, 0), config).await?;

    let store = match RegistryClient::new(&mut channel, registry).discover("Store").await {
        Ok(addr) => addr,
        Err(RegistryError::NotFound(_)) => return Err(ClientError::StoreNotRegistered),
        Err(e) => return Err(e.into()),
    };
    log::debug!("[client] store at {store}, sending {request:?}");

    let reply = channel.request(store, request.to_message()).await;
    render(request, &reply)
}
