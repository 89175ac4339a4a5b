//! Store: lists the catalog and orchestrates purchases.
//!
//! ```text
//!  client ── BUY_REQUEST ──► StoreHandler::purchase
//!                               │ order n → catalog[n-1]
//!                               ▼
//!                         Downstream::validate ──► Bank
//!                               │
//!                  ┌── declined ┴ approved ──┐
//!                  ▼                         ▼
//!         FAIL "<id>\ntransaction     Downstream::fetch_content ──► Content
//!               aborted"                     │
//!                                            ▼
//!                                SUCCESS "<id>\n<content>\n<price>"
//! ```
//!
//! Purchases are resolved one at a time: the dispatcher does not read the
//! next datagram until the handler has returned, so Bank and Content round
//! trips never overlap.  Content is only contacted after an approval.

use std::net::SocketAddr;

use async_trait::async_trait;
use market_wire::{
    ChannelConfig, Handler, Message, MessageError, Opcode, ProtocolError, ReliableChannel, SocketError,
};
use thiserror::Error;

use crate::catalog::{format_price, CatalogItem};

pub const TRANSACTION_ABORTED: &str = "transaction aborted";
pub const INVALID_ORDER: &str = "invalid order number";
pub const CONTENT_UNAVAILABLE: &str = "content unavailable";

// ---------------------------------------------------------------------------
// Downstream services
// ---------------------------------------------------------------------------

/// Bank decision for one payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Approved,
    Declined,
}

#[derive(Debug, Error, PartialEq)]
pub enum DownstreamError {
    #[error("{service} replied with unexpected {opcode}")]
    UnexpectedReply { service: &'static str, opcode: Opcode },
    #[error(transparent)]
    Message(#[from] MessageError),
}

/// The two services a purchase depends on.
#[async_trait]
pub trait Downstream: Send {
    async fn validate(&mut self, item: &CatalogItem, card: &str) -> Result<Verdict, DownstreamError>;

    /// `Ok(None)` when the repository has no content for `item_id`.
    async fn fetch_content(&mut self, item_id: i64) -> Result<Option<String>, DownstreamError>;
}

/// Bank and Content reached over long-lived reliable channels, one per
/// service, opened at startup.
pub struct ChannelDownstream {
    bank: ReliableChannel,
    bank_addr: SocketAddr,
    content: ReliableChannel,
    content_addr: SocketAddr,
}

impl ChannelDownstream {
    pub async fn connect(
        local_ip: std::net::IpAddr,
        bank_addr: SocketAddr,
        content_addr: SocketAddr,
        config: &ChannelConfig,
    ) -> Result<Self, SocketError> {
        let ephemeral = SocketAddr::new(local_ip, 0);
        let bank = ReliableChannel::bind(ephemeral, config).await?;
        let content = ReliableChannel::bind(ephemeral, config).await?;
        log::debug!(
            "[store] bank session {} → {bank_addr}, content session {} → {content_addr}",
            bank.local_addr(),
            content.local_addr()
        );
        Ok(Self {
            bank,
            bank_addr,
            content,
            content_addr,
        })
    }
}

#[async_trait]
impl Downstream for ChannelDownstream {
    async fn validate(&mut self, item: &CatalogItem, card: &str) -> Result<Verdict, DownstreamError> {
        let request = Message::from_fields(
            Opcode::ValidateTransaction,
            &[item.id.to_string(), format_price(&item.price), card.to_string()],
        )?;
        let reply = self.bank.request(self.bank_addr, request).await;
        match reply.opcode {
            Opcode::Ok => Ok(Verdict::Approved),
            Opcode::NotOk => Ok(Verdict::Declined),
            opcode => Err(DownstreamError::UnexpectedReply { service: "Bank", opcode }),
        }
    }

    async fn fetch_content(&mut self, item_id: i64) -> Result<Option<String>, DownstreamError> {
        let request = Message::new(Opcode::ContentRequest, item_id.to_string());
        let reply = self.content.request(self.content_addr, request).await;
        match reply.opcode {
            Opcode::Success => {
                // "<id>\n<content>"
                let content = reply.fields().get(1).map(|c| c.to_string());
                Ok(content)
            }
            Opcode::Fail => Ok(None),
            opcode => Err(DownstreamError::UnexpectedReply { service: "Content", opcode }),
        }
    }
}

// ---------------------------------------------------------------------------
// Orders and outcomes
// ---------------------------------------------------------------------------

/// A parsed `BUY_REQUEST`: 1-based position in the listing plus card number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub number: i64,
    pub card: String,
}

impl Order {
    pub fn parse(request: &Message) -> Result<Self, ProtocolError> {
        let bad = |reason: String| ProtocolError::bad_payload(Opcode::BuyRequest, reason);
        let fields = request.fields();
        let [number, card, ..] = fields[..] else {
            return Err(bad("expected order number and card number".into()));
        };
        let number = number
            .trim()
            .parse::<i64>()
            .map_err(|_| bad(format!("order number {number:?}")))?;
        Ok(Self {
            number,
            card: card.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseOutcome {
    Delivered { item: CatalogItem, content: String },
    Declined { item_id: i64 },
    InvalidOrder { number: i64 },
    ContentUnavailable { item_id: i64 },
}

impl PurchaseOutcome {
    pub fn into_reply(self) -> Message {
        match self {
            Self::Delivered { item, content } => Message::new(
                Opcode::Success,
                format!("{}\n{}\n{}", item.id, content, format_price(&item.price)),
            ),
            Self::Declined { item_id } => {
                Message::new(Opcode::Fail, format!("{item_id}\n{TRANSACTION_ABORTED}"))
            }
            Self::InvalidOrder { number } => Message::new(Opcode::Fail, format!("{number}\n{INVALID_ORDER}")),
            Self::ContentUnavailable { item_id } => {
                Message::new(Opcode::Fail, format!("{item_id}\n{CONTENT_UNAVAILABLE}"))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

pub struct StoreHandler<D> {
    catalog: Vec<CatalogItem>,
    downstream: D,
}

impl<D: Downstream> StoreHandler<D> {
    pub fn new(catalog: Vec<CatalogItem>, downstream: D) -> Self {
        Self { catalog, downstream }
    }

    pub fn downstream(&self) -> &D {
        &self.downstream
    }

    /// `"1. <id> <price>\n2. <id> <price>\n..."`, in stock-file order.
    pub fn listing(&self) -> String {
        self.catalog
            .iter()
            .enumerate()
            .map(|(i, item)| format!("{}. {} {}\n", i + 1, item.id, format_price(&item.price)))
            .collect()
    }

    fn item_for(&self, number: i64) -> Option<&CatalogItem> {
        let index = usize::try_from(number).ok()?.checked_sub(1)?;
        self.catalog.get(index)
    }

    pub async fn purchase(&mut self, order: &Order) -> PurchaseOutcome {
        let Some(item) = self.item_for(order.number).cloned() else {
            log::warn!("[store] order {} outside 1..={}", order.number, self.catalog.len());
            return PurchaseOutcome::InvalidOrder { number: order.number };
        };

        match self.downstream.validate(&item, &order.card).await {
            Ok(Verdict::Approved) => {}
            Ok(Verdict::Declined) => {
                log::info!("[store] item {} declined by bank", item.id);
                return PurchaseOutcome::Declined { item_id: item.id };
            }
            Err(e) => {
                log::error!("[store] bank validation for item {} failed: {e}", item.id);
                return PurchaseOutcome::Declined { item_id: item.id };
            }
        }

        match self.downstream.fetch_content(item.id).await {
            Ok(Some(content)) => {
                log::info!("[store] item {} delivered", item.id);
                PurchaseOutcome::Delivered { item, content }
            }
            Ok(None) => {
                log::warn!("[store] item {} approved but has no content", item.id);
                PurchaseOutcome::ContentUnavailable { item_id: item.id }
            }
            Err(e) => {
                log::error!("[store] content fetch for item {} failed: {e}", item.id);
                PurchaseOutcome::ContentUnavailable { item_id: item.id }
            }
        }
    }
}

#[async_trait]
impl<D: Downstream> Handler for StoreHandler<D> {
    fn name(&self) -> &str {
        "Store"
    }

    async fn handle(&mut self, request: Message, from: SocketAddr) -> Result<Message, ProtocolError> {
        match request.opcode {
            Opcode::ListItemsRequest => {
                log::debug!("[store] listing for {from}");
                Ok(Message::new(Opcode::Success, self.listing()))
            }
            Opcode::BuyRequest => {
                let order = Order::parse(&request)?;
                log::debug!("[store] order {} from {from}", order.number);
                Ok(self.purchase(&order).await.into_reply())
            }
            other => Err(ProtocolError::UnexpectedOpcode(other)),
        }
    }
}
