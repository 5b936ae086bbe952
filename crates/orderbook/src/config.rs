//! Book subscription configuration.
//!
//! Echoes the channel parameters the book was subscribed with, plus the
//! depth used for checksum computation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::OrderBookError;

/// Default number of levels per side covered by the checksum.
pub const DEFAULT_CHECKSUM_DEPTH: usize = 25;

/// Price aggregation level of the subscribed book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Precision {
    /// Five significant figures.
    #[default]
    P0,
    /// Four significant figures.
    P1,
    /// Three significant figures.
    P2,
    /// Two significant figures.
    P3,
    /// One significant figure.
    P4,
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Self::P0 => "P0",
            Self::P1 => "P1",
            Self::P2 => "P2",
            Self::P3 => "P3",
            Self::P4 => "P4",
        };
        write!(f, "{tag}")
    }
}

impl FromStr for Precision {
    type Err = OrderBookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "P0" => Ok(Self::P0),
            "P1" => Ok(Self::P1),
            "P2" => Ok(Self::P2),
            "P3" => Ok(Self::P3),
            "P4" => Ok(Self::P4),
            _ => Err(OrderBookError::InvalidConfig(format!(
                "invalid precision '{s}', expected P0..P4"
            ))),
        }
    }
}

/// Update frequency of the subscribed book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Frequency {
    /// Realtime.
    #[default]
    F0,
    /// Batched every two seconds.
    F1,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::F0 => write!(f, "F0"),
            Self::F1 => write!(f, "F1"),
        }
    }
}

impl FromStr for Frequency {
    type Err = OrderBookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "F0" | "REALTIME" => Ok(Self::F0),
            "F1" => Ok(Self::F1),
            _ => Err(OrderBookError::InvalidConfig(format!(
                "invalid frequency '{s}', expected F0 or F1"
            ))),
        }
    }
}

/// Configuration accepted at book construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookConfig {
    /// Trading pair symbol, e.g. `tBTCUSD`.
    pub symbol: String,
    /// Price aggregation level.
    pub precision: Precision,
    /// Update frequency.
    pub frequency: Frequency,
    /// Number of levels per side the subscription delivers.
    pub length: u32,
    /// Number of levels per side covered by the checksum.
    pub checksum_depth: usize,
    /// Expected number of levels per side, used to pre-size snapshot buffers.
    pub initial_capacity_hint: Option<usize>,
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            symbol: "tBTCUSD".to_string(),
            precision: Precision::default(),
            frequency: Frequency::default(),
            length: 25,
            checksum_depth: DEFAULT_CHECKSUM_DEPTH,
            initial_capacity_hint: None,
        }
    }
}

impl BookConfig {
    /// Creates a configuration for `symbol` with default channel parameters.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Self::default()
        }
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.length = length;
        self
    }

    pub fn with_checksum_depth(mut self, depth: usize) -> Self {
        self.checksum_depth = depth;
        self
    }

    pub fn with_capacity_hint(mut self, hint: usize) -> Self {
        self.initial_capacity_hint = Some(hint);
        self
    }

    /// Checks the configuration for values the book cannot work with.
    pub fn validate(&self) -> Result<(), OrderBookError> {
        if self.symbol.trim().is_empty() {
            return Err(OrderBookError::InvalidConfig("symbol must not be empty".into()));
        }
        if self.checksum_depth == 0 {
            return Err(OrderBookError::InvalidConfig(
                "checksum depth must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Capacity to reserve for one side of a snapshot.
    pub(crate) fn side_capacity(&self) -> usize {
        self.initial_capacity_hint
            .unwrap_or(self.length as usize)
    }
}
