//! Order book error types.

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors that can occur during order book operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderBookError {
    /// Malformed level data (non-positive price or amount, zero count on upsert).
    #[error("invalid level at {price}: {reason}")]
    InvalidLevel { price: Decimal, reason: String },

    /// Snapshot rejected as a whole (duplicate price on one side, zero count).
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// The side of a level could not be determined from its wire data.
    #[error("cannot determine side for level at {0}")]
    UnknownSide(Decimal),

    /// A price query needed a side that has no levels.
    #[error("order book is empty on the required side")]
    EmptyBook,

    /// Local checksum disagrees with the reference value.
    #[error("checksum mismatch: expected {expected}, computed {actual}")]
    ChecksumMismatch { expected: i32, actual: i32 },

    /// Order book not initialized with snapshot.
    #[error("order book not initialized - apply snapshot first")]
    NotInitialized,

    /// Invalid book configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl OrderBookError {
    pub(crate) fn invalid_level(price: Decimal, reason: impl Into<String>) -> Self {
        Self::InvalidLevel {
            price,
            reason: reason.into(),
        }
    }
}
