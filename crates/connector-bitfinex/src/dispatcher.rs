//! Routes classified book packets into the managed order book.
//!
//! One dispatcher drives one book. Packets are applied strictly in the order
//! `dispatch` is called; the write lock is held for the whole apply and then
//! downgraded before the observer runs, so readers only ever see a book
//! between packets.

use std::sync::Arc;

use connector_core::{BookObserver, ConnectorError};
use metrics::SharedMetrics;
use model::{BookPacket, ChannelPacket, RawLevel};
use orderbook::{BookConfig, OrderBook, OrderBookError, UpdateEffect};
use parking_lot::{RwLock, RwLockWriteGuard};
use tracing::{debug, info, warn};

use crate::parser::{level_from_raw, levels_from_raw, parse_message, ParsedMessage};

/// Order book shared between the dispatcher (writer) and readers.
pub type SharedBook = Arc<RwLock<OrderBook>>;

/// Create a new shared, empty order book.
pub fn create_shared_book(config: BookConfig) -> Result<SharedBook, OrderBookError> {
    Ok(Arc::new(RwLock::new(OrderBook::new(config)?)))
}

/// What a dispatched packet did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The book was replaced; observer notified.
    SnapshotApplied { bids: usize, asks: usize },
    /// A single level changed; observer notified.
    UpdateApplied(UpdateEffect),
    /// The local checksum matched the reference value.
    ChecksumVerified(i32),
    /// A checksum arrived before any snapshot and was not checked.
    ChecksumSkipped,
    /// Keep-alive, nothing to do.
    Heartbeat,
}

/// Applies decoded packets to one book and notifies an observer.
pub struct UpdateDispatcher {
    book: SharedBook,
    observer: Box<dyn BookObserver>,
    metrics: SharedMetrics,
    /// Only packets from this channel are applied, when set.
    channel_id: Option<u64>,
    needs_resync: bool,
}

impl UpdateDispatcher {
    pub fn new(book: SharedBook, observer: Box<dyn BookObserver>, metrics: SharedMetrics) -> Self {
        Self {
            book,
            observer,
            metrics,
            channel_id: None,
            needs_resync: false,
        }
    }

    /// Restrict the dispatcher to packets from one channel.
    pub fn with_channel(mut self, channel_id: u64) -> Self {
        self.channel_id = Some(channel_id);
        self
    }

    /// Returns a handle readers can query.
    pub fn book(&self) -> SharedBook {
        Arc::clone(&self.book)
    }

    /// Returns true after a checksum mismatch until the next snapshot.
    pub fn needs_resync(&self) -> bool {
        self.needs_resync
    }

    /// Parse a raw websocket frame and dispatch it if it belongs to this book.
    ///
    /// Returns `Ok(None)` for control events, unknown frames and packets for
    /// other channels.
    pub fn dispatch_message(
        &mut self,
        text: &str,
    ) -> Result<Option<DispatchOutcome>, ConnectorError> {
        self.metrics.inc_messages_received();

        let parsed = match parse_message(text) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.metrics.inc_parse_errors();
                warn!(error = %e, "Failed to parse book message");
                return Err(e);
            }
        };

        match parsed {
            ParsedMessage::Book(packet) => self.dispatch_channel_packet(packet),
            ParsedMessage::Event(event) => {
                debug!(event = %event.event, channel_id = ?event.channel_id, "Book channel event");
                Ok(None)
            }
            ParsedMessage::Unknown => Ok(None),
        }
    }

    /// Dispatch a packet tagged with its channel.
    pub fn dispatch_channel_packet(
        &mut self,
        packet: ChannelPacket,
    ) -> Result<Option<DispatchOutcome>, ConnectorError> {
        if self.channel_id.is_some_and(|id| id != packet.channel_id) {
            return Ok(None);
        }
        self.dispatch(packet.packet).map(Some)
    }

    /// Apply one packet to the book.
    ///
    /// On any error the book is left as it was before the packet and the
    /// observer is not called.
    pub fn dispatch(&mut self, packet: BookPacket) -> Result<DispatchOutcome, ConnectorError> {
        let kind = packet.kind();
        let result = match packet {
            BookPacket::Snapshot(levels) => self.apply_snapshot(&levels),
            BookPacket::Update(level) => self.apply_update(&level),
            BookPacket::Checksum(expected) => self.verify_checksum(expected),
            BookPacket::Heartbeat => {
                self.metrics.inc_heartbeats_received();
                Ok(DispatchOutcome::Heartbeat)
            }
        };

        if let Err(e) = &result {
            if !matches!(e, OrderBookError::ChecksumMismatch { .. }) {
                self.metrics.inc_rejected_packets();
                warn!(packet = kind, error = %e, "Rejected book packet");
            }
        }
        result.map_err(ConnectorError::from)
    }

    fn apply_snapshot(&mut self, raw: &[RawLevel]) -> Result<DispatchOutcome, OrderBookError> {
        let levels = levels_from_raw(raw)?;

        let mut book = self.book.write();
        book.apply_snapshot(&levels)?;
        let outcome = DispatchOutcome::SnapshotApplied {
            bids: book.bid_levels(),
            asks: book.ask_levels(),
        };

        if self.needs_resync {
            info!(symbol = %book.symbol(), "Book resynchronized from snapshot");
        }
        self.needs_resync = false;
        self.metrics.inc_snapshots_applied();

        let book = RwLockWriteGuard::downgrade(book);
        self.observer.on_book(&book);
        Ok(outcome)
    }

    fn apply_update(&mut self, raw: &RawLevel) -> Result<DispatchOutcome, OrderBookError> {
        let level = level_from_raw(raw)?;

        let mut book = self.book.write();
        let effect = book.apply_update(level)?;
        self.metrics.inc_updates_applied();

        let book = RwLockWriteGuard::downgrade(book);
        self.observer.on_book(&book);
        Ok(DispatchOutcome::UpdateApplied(effect))
    }

    fn verify_checksum(&mut self, expected: i32) -> Result<DispatchOutcome, OrderBookError> {
        let mut book = self.book.write();
        if !book.is_populated() {
            debug!(symbol = %book.symbol(), "Checksum before snapshot, skipping");
            return Ok(DispatchOutcome::ChecksumSkipped);
        }

        match book.verify_checksum(expected) {
            Ok(()) => {
                self.metrics.inc_checksums_verified();
                Ok(DispatchOutcome::ChecksumVerified(expected))
            }
            Err(OrderBookError::ChecksumMismatch { expected, actual }) => {
                self.needs_resync = true;
                self.metrics.inc_checksum_mismatches();

                let book = RwLockWriteGuard::downgrade(book);
                self.observer.on_checksum_mismatch(&book, expected, actual);
                Err(OrderBookError::ChecksumMismatch { expected, actual })
            }
            Err(e) => Err(e),
        }
    }
}
