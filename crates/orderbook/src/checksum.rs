//! Top-of-book checksum compatible with the exchange's `cs` messages.
//!
//! For each rank `i` below `depth` the bid (price, amount) and then the ask
//! (price, -amount) are appended, skipping a side that has run out of levels.
//! Values are joined with `:` and hashed with CRC-32 (IEEE). The exchange
//! publishes the result as a signed 32-bit integer.

use rust_decimal::Decimal;

use crate::level::PriceLevel;

/// Builds the exact string fed into the CRC.
pub fn checksum_input<'a>(
    bids: impl IntoIterator<Item = &'a PriceLevel>,
    asks: impl IntoIterator<Item = &'a PriceLevel>,
    depth: usize,
) -> String {
    let bids: Vec<&PriceLevel> = bids.into_iter().take(depth).collect();
    let asks: Vec<&PriceLevel> = asks.into_iter().take(depth).collect();

    let mut fields = Vec::with_capacity((bids.len() + asks.len()) * 2);
    for i in 0..bids.len().max(asks.len()) {
        if let Some(bid) = bids.get(i) {
            fields.push(format_number(bid.price));
            fields.push(format_number(bid.amount));
        }
        if let Some(ask) = asks.get(i) {
            fields.push(format_number(ask.price));
            fields.push(format_number(-ask.amount));
        }
    }
    fields.join(":")
}

/// Computes the checksum over the top `depth` levels of each side.
pub fn checksum<'a>(
    bids: impl IntoIterator<Item = &'a PriceLevel>,
    asks: impl IntoIterator<Item = &'a PriceLevel>,
    depth: usize,
) -> i32 {
    signed_crc32(checksum_input(bids, asks, depth).as_bytes())
}

/// CRC-32 of `data`, reinterpreted as the signed value the exchange sends.
pub fn signed_crc32(data: &[u8]) -> i32 {
    crc32fast::hash(data) as i32
}

/// Formats a decimal the way the exchange's reference client prints numbers:
/// shortest form without trailing zeros, switching to exponent notation
/// below 1e-6 and from 1e21 upwards.
pub fn format_number(value: Decimal) -> String {
    if value.is_zero() {
        return "0".to_string();
    }

    let normalized = value.normalize();
    let digits = normalized.mantissa().unsigned_abs().to_string();
    let exponent = digits.len() as i64 - 1 - i64::from(normalized.scale());

    if (-6..21).contains(&exponent) {
        return normalized.to_string();
    }

    let sign = if normalized.is_sign_negative() { "-" } else { "" };
    let (lead, rest) = digits.split_at(1);
    let rest = rest.trim_end_matches('0');
    let fraction = if rest.is_empty() {
        String::new()
    } else {
        format!(".{rest}")
    };
    let exp_sign = if exponent >= 0 { "+" } else { "-" };
    format!("{sign}{lead}{fraction}e{exp_sign}{}", exponent.unsigned_abs())
}
