//! Book feed settings loaded from the environment.
//!
//! | Variable                | Meaning                         | Default   |
//! |-------------------------|---------------------------------|-----------|
//! | `BOOK_SYMBOL`           | trading pair                    | `tBTCUSD` |
//! | `BOOK_PRECISION`        | `P0`..`P4`                      | `P0`      |
//! | `BOOK_FREQUENCY`        | `F0` or `F1`                    | `F0`      |
//! | `BOOK_LENGTH`           | levels per side subscribed      | `25`      |
//! | `BOOK_CHECKSUM_DEPTH`   | levels per side in the checksum | `25`      |
//! | `BOOK_CHANNEL_CAPACITY` | event channel buffer            | `1024`    |

use orderbook::{BookConfig, OrderBookError};
use thiserror::Error;

/// Error loading settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A variable was set but could not be parsed.
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },

    /// The resulting book configuration was rejected.
    #[error(transparent)]
    Book(#[from] OrderBookError),
}

/// Settings for one managed book feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSettings {
    pub book: BookConfig,
    /// Capacity of the book event channel.
    pub channel_capacity: usize,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            book: BookConfig::default(),
            channel_capacity: 1024,
        }
    }
}

impl FeedSettings {
    /// Load settings from `BOOK_*` environment variables.
    ///
    /// Unset variables fall back to defaults; set but malformed ones are errors.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let mut settings = Self::default();
        let book = &mut settings.book;

        if let Some(symbol) = lookup("BOOK_SYMBOL") {
            book.symbol = symbol;
        }
        if let Some(value) = lookup("BOOK_PRECISION") {
            book.precision = value.parse()?;
        }
        if let Some(value) = lookup("BOOK_FREQUENCY") {
            book.frequency = value.parse()?;
        }
        if let Some(value) = lookup("BOOK_LENGTH") {
            book.length = parse_number("BOOK_LENGTH", value)?;
        }
        if let Some(value) = lookup("BOOK_CHECKSUM_DEPTH") {
            book.checksum_depth = parse_number("BOOK_CHECKSUM_DEPTH", value)?;
        }
        if let Some(value) = lookup("BOOK_CHANNEL_CAPACITY") {
            settings.channel_capacity = parse_number("BOOK_CHANNEL_CAPACITY", value)?;
        }

        settings.book.validate()?;
        Ok(settings)
    }
}

fn parse_number<T: std::str::FromStr>(
    key: &'static str,
    value: String,
) -> Result<T, SettingsError> {
    value
        .trim()
        .parse()
        .map_err(|_| SettingsError::InvalidValue { key, value })
}
