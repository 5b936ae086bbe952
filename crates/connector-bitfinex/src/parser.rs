use connector_core::ConnectorError;
use model::{BookPacket, ChannelPacket, Exchange, RawLevel};
use orderbook::{OrderBookError, PriceLevel, Side};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

/// Control message sent as a JSON object (`info`, `subscribed`, `error`, ...).
#[derive(Debug, Deserialize)]
pub struct BitfinexEventRaw {
    pub event: String,
    #[serde(rename = "chanId")]
    pub channel_id: Option<u64>,
    pub channel: Option<String>,
    pub symbol: Option<String>,
    #[serde(rename = "prec")]
    pub precision: Option<String>,
    #[serde(rename = "freq")]
    pub frequency: Option<String>,
    #[serde(rename = "len")]
    pub length: Option<String>,
    pub msg: Option<String>,
}

#[derive(Debug)]
pub enum ParsedMessage {
    Book(ChannelPacket),
    Event(BitfinexEventRaw),
    Unknown,
}

fn parse_error(msg: impl Into<String>) -> ConnectorError {
    ConnectorError::Parse(msg.into())
}

/// Parse a JSON number (or numeric string) into a Decimal, accepting the
/// exponent notation the exchange uses for very small values.
fn parse_decimal(value: &Value) -> Result<Decimal, ConnectorError> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => return Err(parse_error(format!("expected number, got {other}"))),
    };
    let parsed = if text.contains(['e', 'E']) {
        Decimal::from_scientific(&text)
    } else {
        Decimal::from_str(&text)
    };
    parsed.map_err(|e| parse_error(format!("invalid decimal '{text}': {e}")))
}

fn parse_count(value: &Value) -> Result<u32, ConnectorError> {
    value
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| parse_error(format!("invalid count {value}")))
}

/// Parse a `[price, count, amount]` record.
fn parse_level(value: &Value) -> Result<RawLevel, ConnectorError> {
    match value.as_array().map(Vec::as_slice) {
        Some([price, count, amount]) => Ok(RawLevel::new(
            parse_decimal(price)?,
            parse_count(count)?,
            parse_decimal(amount)?,
        )),
        _ => Err(parse_error(format!("malformed level record {value}"))),
    }
}

/// Classify a channel payload by shape: an array of records is a snapshot,
/// a single record is an update.
fn parse_payload(payload: &[Value]) -> Result<BookPacket, ConnectorError> {
    match payload {
        [Value::String(tag), ..] if tag == "hb" => Ok(BookPacket::Heartbeat),
        [Value::String(tag), checksum, ..] if tag == "cs" => checksum
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .map(BookPacket::Checksum)
            .ok_or_else(|| parse_error(format!("invalid checksum {checksum}"))),
        [Value::Array(items), ..] if items.iter().all(Value::is_array) => items
            .iter()
            .map(parse_level)
            .collect::<Result<Vec<_>, _>>()
            .map(BookPacket::Snapshot),
        [record @ Value::Array(_), ..] => parse_level(record).map(BookPacket::Update),
        _ => Err(parse_error("unrecognised channel payload")),
    }
}

/// Parse one websocket frame from the `book` channel.
///
/// Object frames are control events; array frames are
/// `[chanId, payload, ...]` and are classified into a [`BookPacket`].
pub fn parse_message(text: &str) -> Result<ParsedMessage, ConnectorError> {
    let raw: Value = serde_json::from_str(text)?;

    match raw {
        Value::Object(_) => {
            let event: BitfinexEventRaw = serde_json::from_value(raw)?;
            Ok(ParsedMessage::Event(event))
        }
        Value::Array(items) => {
            let Some((channel, payload)) = items.split_first() else {
                return Ok(ParsedMessage::Unknown);
            };
            let Some(channel_id) = channel.as_u64() else {
                return Ok(ParsedMessage::Unknown);
            };
            Ok(ParsedMessage::Book(ChannelPacket {
                exchange: Exchange::Bitfinex,
                channel_id,
                packet: parse_payload(payload)?,
            }))
        }
        _ => Ok(ParsedMessage::Unknown),
    }
}

/// Convert a wire record into a book level.
///
/// The side comes from the sign of `amount`: positive is a bid, negative an
/// ask. Removals still carry the sign (`amount == ±1`). A zero amount leaves
/// the side undetermined.
pub fn level_from_raw(raw: &RawLevel) -> Result<PriceLevel, OrderBookError> {
    let side = if raw.amount > Decimal::ZERO {
        Side::Bid
    } else if raw.amount < Decimal::ZERO {
        Side::Ask
    } else {
        return Err(OrderBookError::UnknownSide(raw.price));
    };
    Ok(PriceLevel::new(raw.price, raw.count, raw.amount.abs(), side))
}

/// Convert every record of a snapshot, failing on the first bad one.
pub fn levels_from_raw(raw: &[RawLevel]) -> Result<Vec<PriceLevel>, OrderBookError> {
    raw.iter().map(level_from_raw).collect()
}
