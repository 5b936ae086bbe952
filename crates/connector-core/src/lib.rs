//! Boundary types shared by book connectors: errors, the notification sink
//! and the event channel consumers read from.

use std::collections::VecDeque;
use std::sync::Arc;

use orderbook::{BookSummary, OrderBook, OrderBookError};
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Book error: {0}")]
    Book(#[from] OrderBookError),

    #[error("Event channel closed")]
    ChannelClosed,
}

impl From<serde_json::Error> for ConnectorError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Receives the book after every packet that changed it.
///
/// `on_book` runs while the dispatcher still holds a read lock on the book,
/// so implementations should copy what they need and return quickly.
pub trait BookObserver: Send + Sync {
    /// Called once per applied snapshot or update.
    fn on_book(&self, book: &OrderBook);

    /// Called when the book failed a checksum and needs a fresh snapshot.
    fn on_checksum_mismatch(&self, _book: &OrderBook, _expected: i32, _actual: i32) {}
}

/// Event delivered to channel consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum BookEvent {
    /// The managed book changed.
    Updated(BookSummary),
    /// The managed book no longer matches the exchange.
    ChecksumMismatch {
        symbol: String,
        expected: i32,
        actual: i32,
    },
}

pub type EventSender = mpsc::Sender<BookEvent>;
pub type EventReceiver = mpsc::Receiver<BookEvent>;

pub fn create_event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    mpsc::channel(capacity)
}

/// Observer that queues one [`BookEvent`] per notification.
///
/// The dispatcher calls observers synchronously under the book lock, so the
/// queue only buffers; the async side drains it with [`EventQueue::forward`]
/// after each dispatch, awaiting channel capacity instead of dropping events.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    events: Arc<Mutex<VecDeque<BookEvent>>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: BookEvent) {
        self.events.lock().push_back(event);
    }

    /// Takes every queued event, oldest first.
    pub fn drain(&self) -> Vec<BookEvent> {
        self.events.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Sends every queued event in order, waiting for capacity as needed.
    ///
    /// Returns the number of events sent.
    pub async fn forward(&self, sender: &EventSender) -> Result<usize, ConnectorError> {
        let events = self.drain();
        let count = events.len();
        for event in events {
            sender
                .send(event)
                .await
                .map_err(|_| ConnectorError::ChannelClosed)?;
        }
        Ok(count)
    }
}

impl BookObserver for EventQueue {
    fn on_book(&self, book: &OrderBook) {
        self.push(BookEvent::Updated(book.summary()));
    }

    fn on_checksum_mismatch(&self, book: &OrderBook, expected: i32, actual: i32) {
        self.push(BookEvent::ChecksumMismatch {
            symbol: book.symbol().to_string(),
            expected,
            actual,
        });
    }
}
