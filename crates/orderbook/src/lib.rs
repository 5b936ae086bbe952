//! Managed order book kept in sync with an exchange `book` channel.
//!
//! The book is loaded from a snapshot of price levels and then maintained by
//! single-level deltas. Each side lives in a [`SideLedger`] backed by a
//! `BTreeMap` keyed by `Decimal` price, and [`OrderBook::checksum`] produces
//! the CRC-32 value the exchange publishes so drift can be detected.
//!
//! # Example
//!
//! ```rust
//! use orderbook::{BookConfig, OrderBook, PriceLevel};
//! use rust_decimal_macros::dec;
//!
//! let mut book = OrderBook::new(BookConfig::new("tBTCUSD")).unwrap();
//!
//! // Apply initial snapshot
//! book.apply_snapshot(&[
//!     PriceLevel::bid(dec!(100), 1, dec!(5)),
//!     PriceLevel::bid(dec!(99), 2, dec!(3)),
//!     PriceLevel::ask(dec!(101), 1, dec!(4)),
//!     PriceLevel::ask(dec!(102), 1, dec!(2)),
//! ])
//! .unwrap();
//!
//! // Remove the best bid
//! book.apply_update(PriceLevel::bid(dec!(100), 0, dec!(1))).unwrap();
//!
//! assert_eq!(book.top_bid().unwrap(), dec!(99));
//! assert_eq!(book.bid_amount(), dec!(3));
//! println!("Spread: {:?}", book.spread());
//! println!("Checksum: {}", book.checksum());
//! ```

mod book;
pub mod checksum;
mod config;
mod error;
mod ledger;
mod level;

pub use book::{BookState, BookSummary, OrderBook, UpdateEffect};
pub use config::{BookConfig, Frequency, Precision, DEFAULT_CHECKSUM_DEPTH};
pub use error::OrderBookError;
pub use ledger::{RankedLevels, SideLedger};
pub use level::{PriceLevel, Side};
