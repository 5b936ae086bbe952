//! Price level representation.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Side of the book a level rests on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Bid,
    Ask,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Bid => write!(f, "bid"),
            Side::Ask => write!(f, "ask"),
        }
    }
}

/// A single aggregated price level in the order book.
///
/// `amount` is always the positive size resting at `price`; which side it
/// belongs to is carried by `side`, never by the sign of `amount`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    /// The price at this level.
    pub price: Decimal,
    /// Number of orders resting at this price. Zero signals removal.
    pub count: u32,
    /// The total amount available at this price.
    pub amount: Decimal,
    /// Side of the book.
    pub side: Side,
}

impl PriceLevel {
    /// Creates a new price level.
    pub fn new(price: Decimal, count: u32, amount: Decimal, side: Side) -> Self {
        Self {
            price,
            count,
            amount,
            side,
        }
    }

    /// Convenience constructor for a bid level.
    pub fn bid(price: Decimal, count: u32, amount: Decimal) -> Self {
        Self::new(price, count, amount, Side::Bid)
    }

    /// Convenience constructor for an ask level.
    pub fn ask(price: Decimal, count: u32, amount: Decimal) -> Self {
        Self::new(price, count, amount, Side::Ask)
    }

    /// Returns true if this level is a removal instruction.
    pub fn is_removal(&self) -> bool {
        self.count == 0
    }
}
