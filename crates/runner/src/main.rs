//! Replays recorded `book` channel frames (one JSON frame per line) through
//! the managed order book and logs the book after every change.
//!
//! Usage: `book-replay [FILE]` (reads stdin when no file is given).

use common::FeedSettings;
use connector_bitfinex::{create_shared_book, UpdateDispatcher};
use connector_core::{create_event_channel, BookEvent, ConnectorError, EventQueue, EventSender};
use metrics::create_metrics;
use orderbook::OrderBookError;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{info, warn};

type FrameSource = Box<dyn AsyncBufRead + Unpin + Send>;

async fn open_source(path: Option<&str>) -> anyhow::Result<FrameSource> {
    let reader: FrameSource = match path {
        Some(path) => Box::new(BufReader::new(tokio::fs::File::open(path).await?)),
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };
    Ok(reader)
}

async fn replay(
    source: FrameSource,
    mut dispatcher: UpdateDispatcher,
    events: EventQueue,
    sender: EventSender,
    mut shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let mut lines = source.lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match dispatcher.dispatch_message(&line) {
                    Ok(_) => {}
                    Err(ConnectorError::Book(OrderBookError::ChecksumMismatch { .. })) => {
                        warn!("Book out of sync, waiting for the next snapshot");
                    }
                    // Already logged and counted by the dispatcher; keep going.
                    Err(_) => {}
                }
                events.forward(&sender).await?;
            }
            Ok(()) = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    if dispatcher.needs_resync() {
        warn!("Replay ended with the book still out of sync");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    common::init_logging();

    let settings = FeedSettings::from_env()?;
    let path = std::env::args().nth(1);

    info!(
        symbol = %settings.book.symbol,
        precision = %settings.book.precision,
        frequency = %settings.book.frequency,
        length = settings.book.length,
        checksum_depth = settings.book.checksum_depth,
        source = path.as_deref().unwrap_or("stdin"),
        "Starting managed book replay"
    );

    let (sender, mut receiver) = create_event_channel(settings.channel_capacity);
    let metrics = create_metrics();
    let book = create_shared_book(settings.book.clone())?;
    let events = EventQueue::new();
    let dispatcher = UpdateDispatcher::new(book, Box::new(events.clone()), metrics.clone());

    // Create shutdown signal channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, initiating shutdown");
            let _ = shutdown_tx.send(true);
        }
    });

    let source = open_source(path.as_deref()).await?;
    let replay_handle = tokio::spawn(replay(source, dispatcher, events, sender, shutdown_rx));

    // Log the managed book as it changes
    while let Some(event) = receiver.recv().await {
        match event {
            BookEvent::Updated(summary) => {
                info!(
                    symbol = %summary.symbol,
                    spread = ?summary.spread,
                    mid_price = ?summary.mid_price,
                    best_ask = ?summary.best_ask.map(|l| l.price),
                    ask_amount = %summary.ask_amount,
                    best_bid = ?summary.best_bid.map(|l| l.price),
                    bid_amount = %summary.bid_amount,
                    checksum = summary.checksum,
                    "Managed book updated"
                );
            }
            BookEvent::ChecksumMismatch {
                symbol,
                expected,
                actual,
            } => {
                warn!(symbol = %symbol, expected, actual, "Managed book checksum mismatch");
            }
        }
    }

    replay_handle.await??;

    let snapshot = metrics.snapshot();
    println!("\n{}", snapshot);
    info!(status = %snapshot.health_status(), "Replay complete");
    Ok(())
}
