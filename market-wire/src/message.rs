//! Wire-format definitions for marketplace messages.
//!
//! Every datagram exchanged between roles is a [`Message`].  This module is
//! responsible for:
//! - Defining the closed set of [`Opcode`]s shared by every role.
//! - Serialising a [`Message`] into a byte buffer ready for transmission.
//! - Deserialising a raw byte slice back into a [`Message`], returning errors
//!   for truncated or malformed input.
//!
//! No I/O happens here.
//!
//! # Wire format
//!
//! The opcode is a **big-endian** signed 32-bit integer.  The payload is UTF-8
//! text filling the rest of the datagram; there is no length prefix.
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                            Opcode                             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                  Payload (UTF-8, '\n'-separated) ...          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Payload fields are joined with [`FIELD_DELIMITER`] and never escaped, so a
//! field must not contain the delimiter itself.  [`Message::from_fields`]
//! enforces that when building a request.

use std::fmt;

use thiserror::Error;

/// Byte length of the fixed opcode header on the wire.
pub const OPCODE_LEN: usize = 4;

/// Largest datagram any role sends or accepts.
///
/// Receivers read into a buffer of this size; anything longer is cut off by
/// the transport, so catalogs and content must stay well below it.
pub const BUFFER_SIZE: usize = 1024;

/// Separator between payload fields.
pub const FIELD_DELIMITER: char = '\n';

// ---------------------------------------------------------------------------
// Opcode
// ---------------------------------------------------------------------------

/// Semantic type of a [`Message`].
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// `name\nip\nport`, client → registry.
    Register = 1,
    /// `name`, client → registry.
    Lookup = 2,
    /// Generic positive reply.
    Success = 3,
    /// Generic negative reply.
    Fail = 4,
    /// Bank approved the transaction (empty payload).
    Ok = 7,
    /// Bank declined the transaction (empty payload).
    NotOk = 8,
    /// `itemId\nprice\ncardNumber`, store → bank.
    ValidateTransaction = 9,
    /// `itemId`, store → content.
    ContentRequest = 10,
    /// Empty payload, client → store.
    ListItemsRequest = 11,
    /// `orderNumber\ncardNumber`, client → store.
    BuyRequest = 12,
}

impl Opcode {
    pub fn from_i32(value: i32) -> Option<Self> {
        Some(match value {
            1 => Opcode::Register,
            2 => Opcode::Lookup,
            3 => Opcode::Success,
            4 => Opcode::Fail,
            7 => Opcode::Ok,
            8 => Opcode::NotOk,
            9 => Opcode::ValidateTransaction,
            10 => Opcode::ContentRequest,
            11 => Opcode::ListItemsRequest,
            12 => Opcode::BuyRequest,
            _ => return None,
        })
    }

    pub fn to_i32(self) -> i32 {
        self as i32
    }

    fn name(self) -> &'static str {
        match self {
            Opcode::Register => "REGISTER",
            Opcode::Lookup => "LOOKUP",
            Opcode::Success => "SUCCESS",
            Opcode::Fail => "FAIL",
            Opcode::Ok => "OK",
            Opcode::NotOk => "NOT_OK",
            Opcode::ValidateTransaction => "VALIDATE_TRANSACTION",
            Opcode::ContentRequest => "CONTENT_REQUEST",
            Opcode::ListItemsRequest => "LIST_ITEMS_REQUEST",
            Opcode::BuyRequest => "BUY_REQUEST",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.to_i32())
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A complete protocol datagram: opcode + text payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub opcode: Opcode,
    pub payload: String,
}

impl Message {
    pub fn new(opcode: Opcode, payload: impl Into<String>) -> Self {
        Self {
            opcode,
            payload: payload.into(),
        }
    }

    /// A message carrying no payload (`OK`, `NOT_OK`, `LIST_ITEMS_REQUEST`).
    pub fn empty(opcode: Opcode) -> Self {
        Self::new(opcode, String::new())
    }

    /// Join `fields` with [`FIELD_DELIMITER`].
    ///
    /// Returns [`MessageError::DelimiterInField`] if any field contains the
    /// delimiter, since the receiver would split it into two fields.
    pub fn from_fields<S: AsRef<str>>(opcode: Opcode, fields: &[S]) -> Result<Self, MessageError> {
        let mut payload = String::new();
        for (i, field) in fields.iter().enumerate() {
            let field = field.as_ref();
            if field.contains(FIELD_DELIMITER) {
                return Err(MessageError::DelimiterInField(field.to_string()));
            }
            if i > 0 {
                payload.push(FIELD_DELIMITER);
            }
            payload.push_str(field);
        }
        Ok(Self::new(opcode, payload))
    }

    /// Split the payload into its delimiter-separated fields.
    ///
    /// Trailing empty fields are dropped, so `"Bank\n127.0.0.1\n22000\n"`
    /// yields three fields and an empty payload yields none.
    pub fn fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = self.payload.split(FIELD_DELIMITER).collect();
        while fields.last().is_some_and(|f| f.is_empty()) {
            fields.pop();
        }
        fields
    }

    /// Serialise this message into a newly allocated byte vector.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(OPCODE_LEN + self.payload.len());
        buf.extend_from_slice(&self.opcode.to_i32().to_be_bytes());
        buf.extend_from_slice(self.payload.as_bytes());
        buf
    }

    /// Parse a [`Message`] from a raw datagram.
    ///
    /// Returns [`Err`] if:
    /// - `buf` is shorter than [`OPCODE_LEN`],
    /// - the opcode is not part of the protocol, or
    /// - the payload is not valid UTF-8.
    pub fn decode(buf: &[u8]) -> Result<Self, MessageError> {
        let Some((head, body)) = buf.split_first_chunk::<OPCODE_LEN>() else {
            return Err(MessageError::Malformed { len: buf.len() });
        };
        let raw = i32::from_be_bytes(*head);
        let opcode = Opcode::from_i32(raw).ok_or(MessageError::UnknownOpcode(raw))?;
        let payload = std::str::from_utf8(body).map_err(|_| MessageError::InvalidUtf8)?;
        Ok(Self::new(opcode, payload))
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.opcode, self.payload)
    }
}

/// Errors that can arise when building or parsing a message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    /// Datagram shorter than the fixed opcode header.
    #[error("malformed message: {len} bytes, need at least {OPCODE_LEN}")]
    Malformed { len: usize },
    /// Opcode outside the protocol's closed set.
    #[error("unknown opcode {0}")]
    UnknownOpcode(i32),
    /// Payload bytes are not UTF-8.
    #[error("payload is not valid UTF-8")]
    InvalidUtf8,
    /// A field would be split in two by the receiver.
    #[error("field {0:?} contains the field delimiter")]
    DelimiterInField(String),
}
