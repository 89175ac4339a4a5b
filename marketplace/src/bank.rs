//! Bank: approves or declines a payment.
//!
//! The rule is a pure function of the item id; card number and price are
//! parsed (a malformed request is still a protocol error) but otherwise
//! ignored.  No ledger is kept.

use std::net::SocketAddr;
use std::str::FromStr;

use async_trait::async_trait;
use market_wire::{Handler, Message, Opcode, ProtocolError};
use rust_decimal::Decimal;

/// Approve iff `item_id` is odd.  Zero is even; negative odd ids approve.
pub fn approve(item_id: i64) -> bool {
    item_id % 2 != 0
}

/// A parsed `VALIDATE_TRANSACTION` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    pub item_id: i64,
    pub price: Decimal,
    pub card: String,
}

impl Payment {
    pub fn parse(request: &Message) -> Result<Self, ProtocolError> {
        let bad = |reason: String| ProtocolError::bad_payload(Opcode::ValidateTransaction, reason);
        let fields = request.fields();
        let [id, price, card, ..] = fields[..] else {
            return Err(bad("expected item id, price and card number".into()));
        };
        let item_id = id.trim().parse::<i64>().map_err(|_| bad(format!("item id {id:?}")))?;
        let price = Decimal::from_str(price.trim()).map_err(|e| bad(format!("price {price:?}: {e}")))?;
        Ok(Self {
            item_id,
            price,
            card: card.to_string(),
        })
    }
}

#[derive(Debug, Default)]
pub struct BankHandler {
    approved: u64,
    declined: u64,
}

impl BankHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(approved, declined)` decisions so far.
    pub fn decisions(&self) -> (u64, u64) {
        (self.approved, self.declined)
    }
}

#[async_trait]
impl Handler for BankHandler {
    fn name(&self) -> &str {
        "Bank"
    }

    async fn handle(&mut self, request: Message, _from: SocketAddr) -> Result<Message, ProtocolError> {
        if request.opcode != Opcode::ValidateTransaction {
            return Err(ProtocolError::UnexpectedOpcode(request.opcode));
        }
        let payment = Payment::parse(&request)?;
        if approve(payment.item_id) {
            self.approved += 1;
            log::info!("[bank] {} OK", payment.item_id);
            Ok(Message::empty(Opcode::Ok))
        } else {
            self.declined += 1;
            log::info!("[bank] {} NOT OK", payment.item_id);
            Ok(Message::empty(Opcode::NotOk))
        }
    }
}
