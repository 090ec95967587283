// ===============================
// src/normalize.rs
// ===============================
//
// RawFill (text, as stored) -> Fill (typed), then canonical order
// (symbol, positionSide, time, id). Bad numeric cells degrade to 0.0;
// time/id/side are structural and fail the batch.
//

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;
use tracing::warn;

use crate::domain::{Fill, PositionMode, RawFill, Side};

#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    #[error("fill #{index} ({symbol}): unparseable time {value:?}")]
    Time { index: usize, symbol: String, value: String },
    #[error("fill #{index} ({symbol}): unparseable id {value:?}")]
    Id { index: usize, symbol: String, value: String },
    #[error("fill #{index} ({symbol}): unknown side {value:?}")]
    Side { index: usize, symbol: String, value: String },
}

/// Lenient decimal parse: empty -> 0.0, garbage / NaN / inf -> 0.0 with a warning.
pub fn parse_decimal(field: &'static str, raw: &str) -> f64 {
    let s = raw.trim();
    if s.is_empty() {
        return 0.0;
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => {
            warn!(field, value = %s, "unparseable numeric field, using 0.0");
            0.0
        }
    }
}

/// Like `parse_decimal`, but a negative value is malformed too (qty, price).
pub fn parse_unsigned(field: &'static str, raw: &str) -> f64 {
    match parse_decimal(field, raw) {
        v if v < 0.0 => {
            warn!(field, value = %raw.trim(), "negative value, using 0.0");
            0.0
        }
        v => v,
    }
}

/// Epoch millis, RFC 3339, or naive `YYYY-MM-DD HH:MM:SS[.f]` (taken as UTC).
pub fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(ms) = s.parse::<i64>() {
        return Utc.timestamp_millis_opt(ms).single();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

pub fn normalize_one(index: usize, raw: &RawFill) -> Result<Fill, NormalizeError> {
    let symbol = raw.symbol.trim().to_string();

    let time = parse_time(&raw.time).ok_or_else(|| NormalizeError::Time {
        index,
        symbol: symbol.clone(),
        value: raw.time.clone(),
    })?;
    let id = raw.id.trim().parse::<u64>().map_err(|_| NormalizeError::Id {
        index,
        symbol: symbol.clone(),
        value: raw.id.clone(),
    })?;
    let side = Side::parse(&raw.side).ok_or_else(|| NormalizeError::Side {
        index,
        symbol: symbol.clone(),
        value: raw.side.clone(),
    })?;

    Ok(Fill {
        mode: PositionMode::parse_or_default(&raw.position_side),
        side,
        qty: parse_unsigned("qty", &raw.qty),
        price: parse_unsigned("price", &raw.price),
        commission: parse_decimal("commission", &raw.commission),
        realized_pnl: parse_decimal("realizedPnl", &raw.realized_pnl),
        time,
        id,
        symbol,
    })
}

/// Typed fills in processing order. Pure function of the input set.
pub fn normalize(raw: &[RawFill]) -> Result<Vec<Fill>, NormalizeError> {
    let mut fills = raw
        .iter()
        .enumerate()
        .map(|(i, r)| normalize_one(i, r))
        .collect::<Result<Vec<_>, _>>()?;

    fills.sort_by(|a, b| {
        a.symbol
            .cmp(&b.symbol)
            .then(a.mode.cmp(&b.mode))
            .then(a.time.cmp(&b.time))
            .then(a.id.cmp(&b.id))
    });
    Ok(fills)
}
