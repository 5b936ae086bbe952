//! One side of the order book.

use std::collections::btree_map::Values;
use std::collections::BTreeMap;
use std::iter::Rev;

use either::Either;
use rust_decimal::Decimal;

use crate::error::OrderBookError;
use crate::level::{PriceLevel, Side};

/// Iterator over a ledger's levels in rank order (best price first).
pub type RankedLevels<'a> =
    Either<Rev<Values<'a, Decimal, PriceLevel>>, Values<'a, Decimal, PriceLevel>>;

/// Price-ordered collection of the active levels of one side.
///
/// Levels are keyed by price in a `BTreeMap`, so the mapping and the ordering
/// are the same structure and can never disagree. Bids iterate from the
/// highest key, asks from the lowest; rank 0 is always the best price.
#[derive(Debug, Clone)]
pub struct SideLedger {
    side: Side,
    levels: BTreeMap<Decimal, PriceLevel>,
    /// Running sum of `amount` across `levels`.
    total_amount: Decimal,
}

impl SideLedger {
    /// Creates an empty ledger for the given side.
    pub fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
            total_amount: Decimal::ZERO,
        }
    }

    /// Builds a ledger from a full set of levels in one pass.
    ///
    /// Every level is validated and prices must be unique; nothing is built if
    /// any check fails.
    pub fn bulk_load(side: Side, mut levels: Vec<PriceLevel>) -> Result<Self, OrderBookError> {
        let mut ledger = Self::new(side);
        for level in &levels {
            if level.count == 0 {
                return Err(OrderBookError::InvalidSnapshot(format!(
                    "{} level at {} has zero count",
                    side, level.price
                )));
            }
            ledger.validate(level)?;
        }

        levels.sort_unstable_by(|a, b| a.price.cmp(&b.price));
        if let Some(pair) = levels.windows(2).find(|w| w[0].price == w[1].price) {
            return Err(OrderBookError::InvalidSnapshot(format!(
                "duplicate {} price {}",
                side, pair[0].price
            )));
        }

        ledger.total_amount = levels.iter().map(|l| l.amount).sum();
        ledger.levels = levels.into_iter().map(|l| (l.price, l)).collect();
        Ok(ledger)
    }

    /// Returns the side this ledger holds.
    pub fn side(&self) -> Side {
        self.side
    }

    /// Checks that `level` may rest in this ledger.
    pub fn validate(&self, level: &PriceLevel) -> Result<(), OrderBookError> {
        if level.side != self.side {
            return Err(OrderBookError::invalid_level(
                level.price,
                format!("{} level routed to {} ledger", level.side, self.side),
            ));
        }
        if level.price <= Decimal::ZERO {
            return Err(OrderBookError::invalid_level(level.price, "price must be positive"));
        }
        if level.count == 0 {
            return Err(OrderBookError::invalid_level(
                level.price,
                "zero count on upsert, use remove",
            ));
        }
        if level.amount <= Decimal::ZERO {
            return Err(OrderBookError::invalid_level(
                level.price,
                format!("amount must be positive, got {}", level.amount),
            ));
        }
        Ok(())
    }

    /// Inserts a level, or replaces the level already resting at its price.
    ///
    /// Returns the replaced level, if any.
    pub fn upsert(&mut self, level: PriceLevel) -> Result<Option<PriceLevel>, OrderBookError> {
        self.validate(&level)?;

        let previous = self.levels.insert(level.price, level);
        if let Some(old) = &previous {
            self.total_amount -= old.amount;
        }
        self.total_amount += level.amount;
        Ok(previous)
    }

    /// Removes the level at `price`. Removing an absent price is a no-op.
    pub fn remove(&mut self, price: Decimal) -> Option<PriceLevel> {
        let removed = self.levels.remove(&price)?;
        self.total_amount -= removed.amount;
        Some(removed)
    }

    /// Returns the best level, or `None` if the ledger is empty.
    pub fn best(&self) -> Option<&PriceLevel> {
        self.iter().next()
    }

    /// Returns up to `n` levels in rank order.
    ///
    /// The iterator borrows the ledger, so it always reflects the current state
    /// and calling this again yields the same sequence until the next mutation.
    pub fn top_n(&self, n: usize) -> impl Iterator<Item = &PriceLevel> + '_ {
        self.iter().take(n)
    }

    /// Iterates all levels in rank order.
    pub fn iter(&self) -> RankedLevels<'_> {
        match self.side {
            Side::Bid => Either::Left(self.levels.values().rev()),
            Side::Ask => Either::Right(self.levels.values()),
        }
    }

    /// Returns the level resting at exactly `price`.
    pub fn get(&self, price: Decimal) -> Option<&PriceLevel> {
        self.levels.get(&price)
    }

    /// Returns the sum of `amount` across all levels.
    pub fn total_amount(&self) -> Decimal {
        self.total_amount
    }

    /// Returns the cumulative amount from the best level down to and
    /// including `price` (bids at or above it, asks at or below it).
    pub fn depth_at(&self, price: Decimal) -> Decimal {
        match self.side {
            Side::Bid => self.levels.range(price..).map(|(_, l)| l.amount).sum(),
            Side::Ask => self.levels.range(..=price).map(|(_, l)| l.amount).sum(),
        }
    }

    /// Returns the number of levels.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Returns true if the ledger has no levels.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Removes every level.
    pub fn clear(&mut self) {
        self.levels.clear();
        self.total_amount = Decimal::ZERO;
    }
}
