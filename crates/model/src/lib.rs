//! Decoded `book` channel packets, as they leave the wire decoder.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Exchange {
    Bitfinex,
}

/// One level record exactly as sent on the wire: `[price, count, amount]`.
///
/// `amount` keeps the exchange's sign convention (positive bid, negative
/// ask). Removals carry `count == 0` and `amount == ±1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLevel {
    pub price: Decimal,
    pub count: u32,
    pub amount: Decimal,
}

impl RawLevel {
    pub fn new(price: Decimal, count: u32, amount: Decimal) -> Self {
        Self {
            price,
            count,
            amount,
        }
    }
}

/// A classified packet for one book channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookPacket {
    /// Full replacement of the book.
    Snapshot(Vec<RawLevel>),
    /// Single-level upsert or removal.
    Update(RawLevel),
    /// Reference checksum published by the exchange.
    Checksum(i32),
    /// Keep-alive with no book content.
    Heartbeat,
}

impl BookPacket {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Snapshot(_) => "snapshot",
            Self::Update(_) => "update",
            Self::Checksum(_) => "checksum",
            Self::Heartbeat => "heartbeat",
        }
    }
}

/// A packet tagged with the channel it arrived on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelPacket {
    pub exchange: Exchange,
    pub channel_id: u64,
    pub packet: BookPacket,
}
