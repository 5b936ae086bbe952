//! Managed order book maintained from a snapshot and single-level deltas.

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::checksum;
use crate::config::BookConfig;
use crate::error::OrderBookError;
use crate::ledger::SideLedger;
use crate::level::{PriceLevel, Side};

/// Lifecycle state of the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BookState {
    /// No snapshot applied yet.
    Empty,
    /// At least one snapshot applied.
    Populated,
}

/// What an applied update did to the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateEffect {
    /// A new price level was added.
    Inserted,
    /// An existing level was replaced.
    Replaced(PriceLevel),
    /// A level was removed.
    Removed(PriceLevel),
    /// A removal for a price that was not in the book.
    NoOp,
}

/// Local order book for one symbol, precision and depth.
///
/// The book is mutated only through [`OrderBook::apply_snapshot`] and
/// [`OrderBook::apply_update`]. Both validate before touching any ledger, so
/// a rejected packet leaves the book exactly as it was.
#[derive(Debug, Clone)]
pub struct OrderBook {
    config: BookConfig,
    bids: SideLedger,
    asks: SideLedger,
    state: BookState,
    /// Updates applied since the last snapshot.
    updates_since_snapshot: u64,
    /// Buffer hashed by the most recent checksum verification.
    last_checksum_input: Option<String>,
}

impl OrderBook {
    /// Creates a new empty order book.
    pub fn new(config: BookConfig) -> Result<Self, OrderBookError> {
        config.validate()?;
        Ok(Self {
            config,
            bids: SideLedger::new(Side::Bid),
            asks: SideLedger::new(Side::Ask),
            state: BookState::Empty,
            updates_since_snapshot: 0,
            last_checksum_input: None,
        })
    }

    /// Returns the symbol this order book tracks.
    pub fn symbol(&self) -> &str {
        &self.config.symbol
    }

    /// Returns the configuration the book was created with.
    pub fn config(&self) -> &BookConfig {
        &self.config
    }

    pub fn state(&self) -> BookState {
        self.state
    }

    /// Returns whether the order book has been initialized with a snapshot.
    pub fn is_populated(&self) -> bool {
        self.state == BookState::Populated
    }

    pub fn updates_since_snapshot(&self) -> u64 {
        self.updates_since_snapshot
    }

    pub fn last_checksum_input(&self) -> Option<&str> {
        self.last_checksum_input.as_deref()
    }

    /// Returns the ledger for `side`.
    pub fn ledger(&self, side: Side) -> &SideLedger {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    fn ledger_mut(&mut self, side: Side) -> &mut SideLedger {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }

    /// Replaces the whole book with `levels`, routing each by its side.
    ///
    /// Fails with `InvalidSnapshot` on a duplicate price within one side or a
    /// zero count, and with `InvalidLevel` on a non-positive price or amount.
    pub fn apply_snapshot(&mut self, levels: &[PriceLevel]) -> Result<(), OrderBookError> {
        let capacity = self.config.side_capacity();
        let mut bid_levels = Vec::with_capacity(capacity);
        let mut ask_levels = Vec::with_capacity(capacity);
        for level in levels {
            match level.side {
                Side::Bid => bid_levels.push(*level),
                Side::Ask => ask_levels.push(*level),
            }
        }

        let bids = SideLedger::bulk_load(Side::Bid, bid_levels)?;
        let asks = SideLedger::bulk_load(Side::Ask, ask_levels)?;

        self.bids = bids;
        self.asks = asks;
        self.state = BookState::Populated;
        self.updates_since_snapshot = 0;

        info!(
            symbol = %self.config.symbol,
            bids = self.bids.len(),
            asks = self.asks.len(),
            "order book snapshot applied"
        );
        self.warn_if_crossed();
        Ok(())
    }

    /// Applies a single-level delta.
    ///
    /// A zero count removes the level at that price (absent prices are
    /// ignored); anything else inserts or replaces it. Applying the same
    /// update twice leaves the book as applying it once.
    pub fn apply_update(&mut self, level: PriceLevel) -> Result<UpdateEffect, OrderBookError> {
        if !self.is_populated() {
            return Err(OrderBookError::NotInitialized);
        }

        let ledger = self.ledger_mut(level.side);
        let effect = if level.is_removal() {
            match ledger.remove(level.price) {
                Some(removed) => UpdateEffect::Removed(removed),
                None => UpdateEffect::NoOp,
            }
        } else {
            match ledger.upsert(level)? {
                Some(previous) => UpdateEffect::Replaced(previous),
                None => UpdateEffect::Inserted,
            }
        };

        self.updates_since_snapshot += 1;
        debug!(
            symbol = %self.config.symbol,
            side = %level.side,
            price = %level.price,
            count = level.count,
            amount = %level.amount,
            effect = ?effect,
            "order book update applied"
        );
        if !matches!(effect, UpdateEffect::NoOp | UpdateEffect::Removed(_)) {
            self.warn_if_crossed();
        }
        Ok(effect)
    }

    /// Returns true if the best ask is below the best bid.
    pub fn is_crossed(&self) -> bool {
        match (self.bids.best(), self.asks.best()) {
            (Some(bid), Some(ask)) => ask.price < bid.price,
            _ => false,
        }
    }

    fn warn_if_crossed(&self) {
        if let (Some(bid), Some(ask)) = (self.bids.best(), self.asks.best()) {
            if ask.price < bid.price {
                warn!(
                    symbol = %self.config.symbol,
                    best_bid = %bid.price,
                    best_ask = %ask.price,
                    "order book crossed"
                );
            }
        }
    }

    /// Returns the best (highest) bid price level.
    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids.best().copied()
    }

    /// Returns the best (lowest) ask price level.
    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks.best().copied()
    }

    /// Returns the best bid price.
    pub fn top_bid(&self) -> Result<Decimal, OrderBookError> {
        self.best_bid().map(|l| l.price).ok_or(OrderBookError::EmptyBook)
    }

    /// Returns the best ask price.
    pub fn top_ask(&self) -> Result<Decimal, OrderBookError> {
        self.best_ask().map(|l| l.price).ok_or(OrderBookError::EmptyBook)
    }

    /// Returns the spread (best ask - best bid).
    pub fn spread(&self) -> Result<Decimal, OrderBookError> {
        Ok(self.top_ask()? - self.top_bid()?)
    }

    /// Returns the mid price (average of best bid and best ask).
    pub fn mid_price(&self) -> Result<Decimal, OrderBookError> {
        Ok((self.top_ask()? + self.top_bid()?) / Decimal::TWO)
    }

    /// Returns the spread in basis points of the mid price.
    pub fn spread_bps(&self) -> Result<Decimal, OrderBookError> {
        let mid = self.mid_price()?;
        if mid.is_zero() {
            return Err(OrderBookError::EmptyBook);
        }
        Ok(self.spread()? / mid * Decimal::from(10000))
    }

    /// Total amount resting on the bid side.
    pub fn bid_amount(&self) -> Decimal {
        self.bids.total_amount()
    }

    /// Total amount resting on the ask side.
    pub fn ask_amount(&self) -> Decimal {
        self.asks.total_amount()
    }

    /// Returns the top N bid price levels (highest to lowest).
    pub fn top_bids(&self, n: usize) -> Vec<PriceLevel> {
        self.bids.top_n(n).copied().collect()
    }

    /// Returns the top N ask price levels (lowest to highest).
    pub fn top_asks(&self, n: usize) -> Vec<PriceLevel> {
        self.asks.top_n(n).copied().collect()
    }

    /// Returns the total bid amount at or above `price`.
    pub fn bid_depth_at(&self, price: Decimal) -> Decimal {
        self.bids.depth_at(price)
    }

    /// Returns the total ask amount at or below `price`.
    pub fn ask_depth_at(&self, price: Decimal) -> Decimal {
        self.asks.depth_at(price)
    }

    /// Returns the total number of bid levels.
    pub fn bid_levels(&self) -> usize {
        self.bids.len()
    }

    /// Returns the total number of ask levels.
    pub fn ask_levels(&self) -> usize {
        self.asks.len()
    }

    /// Computes the checksum over the configured depth of both sides.
    pub fn checksum(&self) -> i32 {
        let depth = self.config.checksum_depth;
        checksum::checksum(self.bids.top_n(depth), self.asks.top_n(depth), depth)
    }

    /// Returns the buffer the checksum is computed over.
    pub fn checksum_input(&self) -> String {
        let depth = self.config.checksum_depth;
        checksum::checksum_input(self.bids.top_n(depth), self.asks.top_n(depth), depth)
    }

    /// Compares the local checksum against a reference value.
    ///
    /// The hashed buffer is kept in [`OrderBook::last_checksum_input`] either
    /// way. A mismatch means the book has drifted; apply a fresh snapshot.
    pub fn verify_checksum(&mut self, expected: i32) -> Result<(), OrderBookError> {
        let input = self.checksum_input();
        let actual = checksum::signed_crc32(input.as_bytes());
        self.last_checksum_input = Some(input);

        if actual != expected {
            warn!(
                symbol = %self.config.symbol,
                expected,
                actual,
                updates_since_snapshot = self.updates_since_snapshot,
                "checksum mismatch"
            );
            return Err(OrderBookError::ChecksumMismatch { expected, actual });
        }
        Ok(())
    }

    /// Returns a read-only summary of the current state.
    pub fn summary(&self) -> BookSummary {
        BookSummary {
            symbol: self.config.symbol.clone(),
            best_bid: self.best_bid(),
            best_ask: self.best_ask(),
            spread: self.spread().ok(),
            mid_price: self.mid_price().ok(),
            bid_amount: self.bid_amount(),
            ask_amount: self.ask_amount(),
            bid_levels: self.bid_levels(),
            ask_levels: self.ask_levels(),
            checksum: self.checksum(),
        }
    }

    /// Clears all data and resets the order book to the empty state.
    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
        self.state = BookState::Empty;
        self.updates_since_snapshot = 0;
        self.last_checksum_input = None;
    }
}

/// A read-only snapshot of an order book's state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookSummary {
    /// Trading pair symbol.
    pub symbol: String,
    /// Best bid level (highest price someone is willing to buy).
    pub best_bid: Option<PriceLevel>,
    /// Best ask level (lowest price someone is willing to sell).
    pub best_ask: Option<PriceLevel>,
    /// Spread (best ask - best bid).
    pub spread: Option<Decimal>,
    /// Mid price (average of best bid and best ask).
    pub mid_price: Option<Decimal>,
    /// Total bid amount.
    pub bid_amount: Decimal,
    /// Total ask amount.
    pub ask_amount: Decimal,
    /// Number of bid price levels.
    pub bid_levels: usize,
    /// Number of ask price levels.
    pub ask_levels: usize,
    /// Checksum over the configured depth.
    pub checksum: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn scenario_snapshot() -> Vec<PriceLevel> {
        vec![
            PriceLevel::bid(dec!(100), 1, dec!(5)),
            PriceLevel::bid(dec!(99), 2, dec!(3)),
            PriceLevel::ask(dec!(101), 1, dec!(4)),
            PriceLevel::ask(dec!(102), 1, dec!(2)),
        ]
    }

    fn populated_book() -> OrderBook {
        let mut book = OrderBook::new(BookConfig::new("tBTCUSD")).unwrap();
        book.apply_snapshot(&scenario_snapshot()).unwrap();
        book
    }

    #[test]
    fn test_empty_book() {
        let book = OrderBook::new(BookConfig::new("tBTCUSD")).unwrap();
        assert_eq!(book.symbol(), "tBTCUSD");
        assert_eq!(book.state(), BookState::Empty);
        assert!(book.best_bid().is_none());
        assert!(book.best_ask().is_none());
        assert_eq!(book.top_bid(), Err(OrderBookError::EmptyBook));
        assert_eq!(book.spread(), Err(OrderBookError::EmptyBook));
        assert_eq!(book.mid_price(), Err(OrderBookError::EmptyBook));
        assert_eq!(book.bid_amount(), Decimal::ZERO);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let result = OrderBook::new(BookConfig::new("tBTCUSD").with_checksum_depth(0));
        assert!(matches!(result, Err(OrderBookError::InvalidConfig(_))));
    }

    #[test]
    fn test_snapshot_scenario_queries() {
        let book = populated_book();

        assert!(book.is_populated());
        assert_eq!(book.top_bid(), Ok(dec!(100)));
        assert_eq!(book.top_ask(), Ok(dec!(101)));
        assert_eq!(book.spread(), Ok(dec!(1)));
        assert_eq!(book.mid_price(), Ok(dec!(100.5)));
        assert_eq!(book.bid_amount(), dec!(8));
        assert_eq!(book.ask_amount(), dec!(6));
    }

    #[test]
    fn test_snapshot_read_back_sorted() {
        let mut book = OrderBook::new(BookConfig::default()).unwrap();
        let levels = vec![
            PriceLevel::ask(dec!(103), 2, dec!(1)),
            PriceLevel::bid(dec!(98), 1, dec!(2)),
            PriceLevel::ask(dec!(101), 1, dec!(4)),
            PriceLevel::bid(dec!(100), 1, dec!(5)),
            PriceLevel::bid(dec!(99), 2, dec!(3)),
        ];
        book.apply_snapshot(&levels).unwrap();

        let bids = book.top_bids(3);
        assert_eq!(
            bids,
            vec![
                PriceLevel::bid(dec!(100), 1, dec!(5)),
                PriceLevel::bid(dec!(99), 2, dec!(3)),
                PriceLevel::bid(dec!(98), 1, dec!(2)),
            ]
        );
        let asks = book.top_asks(2);
        assert_eq!(
            asks,
            vec![
                PriceLevel::ask(dec!(101), 1, dec!(4)),
                PriceLevel::ask(dec!(103), 2, dec!(1)),
            ]
        );
    }

    #[test]
    fn test_removal_update() {
        let mut book = populated_book();

        let effect = book.apply_update(PriceLevel::bid(dec!(100), 0, dec!(0))).unwrap();

        assert!(matches!(effect, UpdateEffect::Removed(_)));
        assert_eq!(book.top_bid(), Ok(dec!(99)));
        assert_eq!(book.bid_amount(), dec!(3));
        assert!(book.top_bids(10).iter().all(|l| l.price != dec!(100)));
    }

    #[test]
    fn test_replace_update() {
        let mut book = populated_book();
        book.apply_update(PriceLevel::bid(dec!(100), 0, dec!(0))).unwrap();

        let effect = book.apply_update(PriceLevel::bid(dec!(99), 3, dec!(7))).unwrap();

        assert!(matches!(effect, UpdateEffect::Replaced(_)));
        assert_eq!(book.bid_amount(), dec!(7));
        assert_eq!(book.top_bid(), Ok(dec!(99)));
    }

    #[test]
    fn test_updates_are_idempotent() {
        let mut once = populated_book();
        let mut twice = populated_book();
        let upsert = PriceLevel::ask(dec!(101.5), 2, dec!(1.25));
        let removal = PriceLevel::ask(dec!(102), 0, dec!(1));

        once.apply_update(upsert).unwrap();
        once.apply_update(removal).unwrap();

        twice.apply_update(upsert).unwrap();
        twice.apply_update(upsert).unwrap();
        twice.apply_update(removal).unwrap();
        let effect = twice.apply_update(removal).unwrap();

        assert_eq!(effect, UpdateEffect::NoOp);
        assert_eq!(once.top_asks(25), twice.top_asks(25));
        assert_eq!(once.ask_amount(), twice.ask_amount());
        assert_eq!(once.checksum(), twice.checksum());
    }

    #[test]
    fn test_update_before_snapshot_fails() {
        let mut book = OrderBook::new(BookConfig::default()).unwrap();
        let result = book.apply_update(PriceLevel::bid(dec!(100), 1, dec!(1)));
        assert_eq!(result, Err(OrderBookError::NotInitialized));
    }

    #[test]
    fn test_invalid_update_leaves_book_untouched() {
        let mut book = populated_book();
        let before = book.top_bids(25);

        let result = book.apply_update(PriceLevel::bid(dec!(-1), 1, dec!(1)));
        assert!(matches!(result, Err(OrderBookError::InvalidLevel { .. })));
        assert_eq!(book.top_bids(25), before);
        assert_eq!(book.updates_since_snapshot(), 0);
    }

    #[test]
    fn test_invalid_snapshot_leaves_book_untouched() {
        let mut book = populated_book();
        let checksum_before = book.checksum();

        let duplicate = vec![
            PriceLevel::bid(dec!(90), 1, dec!(1)),
            PriceLevel::bid(dec!(90), 2, dec!(2)),
        ];
        assert!(matches!(
            book.apply_snapshot(&duplicate),
            Err(OrderBookError::InvalidSnapshot(_))
        ));

        let zero_count = vec![
            PriceLevel::bid(dec!(90), 1, dec!(1)),
            PriceLevel::ask(dec!(91), 0, dec!(2)),
        ];
        assert!(matches!(
            book.apply_snapshot(&zero_count),
            Err(OrderBookError::InvalidSnapshot(_))
        ));

        assert_eq!(book.checksum(), checksum_before);
        assert_eq!(book.top_bid(), Ok(dec!(100)));
    }

    #[test]
    fn test_same_price_on_both_sides_is_not_duplicate() {
        let mut book = OrderBook::new(BookConfig::default()).unwrap();
        let levels = vec![
            PriceLevel::bid(dec!(100), 1, dec!(1)),
            PriceLevel::ask(dec!(100), 1, dec!(1)),
        ];
        assert!(book.apply_snapshot(&levels).is_ok());
        assert_eq!(book.spread(), Ok(dec!(0)));
    }

    #[test]
    fn test_snapshot_resync_replaces_everything() {
        let mut book = populated_book();
        book.apply_update(PriceLevel::bid(dec!(95), 1, dec!(10))).unwrap();

        book.apply_snapshot(&[PriceLevel::ask(dec!(200), 1, dec!(1))])
            .unwrap();

        assert_eq!(book.bid_levels(), 0);
        assert_eq!(book.ask_levels(), 1);
        assert_eq!(book.top_bid(), Err(OrderBookError::EmptyBook));
        assert_eq!(book.updates_since_snapshot(), 0);
    }

    #[test]
    fn test_ordering_invariant_after_updates() {
        let mut book = populated_book();
        for (price, amount) in [(dec!(97), dec!(1)), (dec!(99.5), dec!(2)), (dec!(96), dec!(3))] {
            book.apply_update(PriceLevel::bid(price, 1, amount)).unwrap();
        }
        for (price, amount) in [(dec!(104), dec!(1)), (dec!(101.5), dec!(2))] {
            book.apply_update(PriceLevel::ask(price, 1, amount)).unwrap();
        }

        let bids = book.top_bids(25);
        assert!(bids.windows(2).all(|w| w[0].price > w[1].price));
        let asks = book.top_asks(25);
        assert!(asks.windows(2).all(|w| w[0].price < w[1].price));
    }

    #[test]
    fn test_crossed_book_is_flagged_not_rejected() {
        let mut book = populated_book();
        book.apply_update(PriceLevel::bid(dec!(101.5), 1, dec!(1))).unwrap();

        assert!(book.is_crossed());
        assert_eq!(book.spread(), Ok(dec!(-0.5)));
    }

    #[test]
    fn test_checksum_covers_configured_depth() {
        let book = populated_book();
        assert_eq!(book.checksum_input(), "100:5:101:-4:99:3:102:-2");

        let mut shallow = OrderBook::new(BookConfig::default().with_checksum_depth(1)).unwrap();
        shallow.apply_snapshot(&scenario_snapshot()).unwrap();
        assert_eq!(shallow.checksum_input(), "100:5:101:-4");
        assert_ne!(shallow.checksum(), book.checksum());
    }

    #[test]
    fn test_checksum_reference_values() {
        // Reference values computed independently with zlib's crc32.
        let mut book = populated_book();
        assert_eq!(book.checksum(), -1_716_940_290);

        book.apply_update(PriceLevel::bid(dec!(100), 0, dec!(0))).unwrap();
        book.apply_update(PriceLevel::bid(dec!(99), 3, dec!(7))).unwrap();
        assert_eq!(book.checksum_input(), "99:7:101:-4:102:-2");
        assert_eq!(book.checksum(), 1_286_120_088);
    }

    #[test]
    fn test_checksum_deterministic_across_books() {
        let mut a = populated_book();
        let mut b = populated_book();
        let update = PriceLevel::ask(dec!(101), 3, dec!(0.75));
        a.apply_update(update).unwrap();
        b.apply_update(update).unwrap();

        assert_eq!(a.checksum(), a.checksum());
        assert_eq!(a.checksum(), b.checksum());
    }

    #[test]
    fn test_verify_checksum() {
        let mut book = populated_book();
        let expected = book.checksum();

        assert!(book.verify_checksum(expected).is_ok());
        assert_eq!(book.last_checksum_input(), Some("100:5:101:-4:99:3:102:-2"));

        let result = book.verify_checksum(expected.wrapping_add(1));
        assert_eq!(
            result,
            Err(OrderBookError::ChecksumMismatch {
                expected: expected.wrapping_add(1),
                actual: expected,
            })
        );
    }

    #[test]
    fn test_summary() {
        let book = populated_book();
        let summary = book.summary();

        assert_eq!(summary.symbol, "tBTCUSD");
        assert_eq!(summary.best_bid.unwrap().price, dec!(100));
        assert_eq!(summary.best_ask.unwrap().price, dec!(101));
        assert_eq!(summary.mid_price, Some(dec!(100.5)));
        assert_eq!(summary.bid_levels, 2);
        assert_eq!(summary.checksum, book.checksum());

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["symbol"], "tBTCUSD");
    }

    #[test]
    fn test_depth_at_price() {
        let book = populated_book();
        assert_eq!(book.bid_depth_at(dec!(99)), dec!(8));
        assert_eq!(book.ask_depth_at(dec!(101)), dec!(4));
    }

    #[test]
    fn test_spread_bps() {
        let book = populated_book();
        // Spread = 1.0, mid = 100.5
        let spread_bps = book.spread_bps().unwrap();
        assert!(spread_bps > dec!(99) && spread_bps < dec!(100));
    }

    #[test]
    fn test_clear() {
        let mut book = populated_book();
        book.clear();

        assert_eq!(book.state(), BookState::Empty);
        assert!(book.best_bid().is_none());
        assert!(book.last_checksum_input().is_none());
    }
}
