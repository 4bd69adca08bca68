use crate::error::ReplayError;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_DEPTH_LEVELS: usize = 5;
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const TIMESTAMP_FORMAT_ISO: &str = "%Y-%m-%dT%H:%M:%S%.f";
const MISSING_CLOCK_LABEL: &str = "--";
const MISSING_SHORT_CLOCK_LABEL: &str = "--:--";

/// Aggressor side of a trade relative to the book just before it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    /// Executed at or through the best bid.
    Inner,
    /// Executed at or through the best ask.
    Outer,
    Neutral,
}

impl TradeSide {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inner => "inner",
            Self::Outer => "outer",
            Self::Neutral => "neutral",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub time_us: i64,
    pub price: f64,
    pub volume: u64,
    pub side: TradeSide,
}

impl Trade {
    pub fn notional(&self) -> f64 {
        self.price * self.volume as f64
    }
}

/// A trade row as delivered upstream, before classification.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRow {
    pub time_us: i64,
    pub price: f64,
    pub volume: u64,
}

impl TradeRow {
    pub fn classified(&self, side: TradeSide) -> Trade {
        Trade {
            time_us: self.time_us,
            price: self.price,
            volume: self.volume,
            side,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriceLevel {
    pub price: f64,
    pub volume: u64,
}

/// Best-five book at one instant. Replaces the previous snapshot wholesale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DepthSnapshot {
    pub timestamp_us: i64,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

impl DepthSnapshot {
    /// Sorts bids descending and asks ascending, keeping at most five levels per side.
    pub fn new(timestamp_us: i64, mut bids: Vec<PriceLevel>, mut asks: Vec<PriceLevel>) -> Self {
        bids.sort_by(|lhs, rhs| rhs.price.total_cmp(&lhs.price));
        asks.sort_by(|lhs, rhs| lhs.price.total_cmp(&rhs.price));
        bids.truncate(MAX_DEPTH_LEVELS);
        asks.truncate(MAX_DEPTH_LEVELS);
        Self {
            timestamp_us,
            bids,
            asks,
        }
    }

    pub fn best_bid(&self) -> Option<f64> {
        self.bids.first().map(|level| level.price)
    }

    pub fn best_ask(&self) -> Option<f64> {
        self.asks.first().map(|level| level.price)
    }
}

/// Cumulative statistics over the trades visible at one timeline position.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub open: f64,
    pub current: f64,
    pub high: f64,
    pub low: f64,
    /// Volume-weighted average price of the visible trades.
    pub average: f64,
    pub total_volume: u64,
    pub trade_count: usize,
    pub change: f64,
    pub change_pct: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradeWire {
    pub time: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub volume: Option<i64>,
}

impl TryFrom<TradeWire> for TradeRow {
    type Error = ReplayError;

    fn try_from(value: TradeWire) -> Result<Self, Self::Error> {
        let time_us = parse_timestamp_us(&value.time)?;
        let price = value.price.ok_or_else(|| {
            ReplayError::InvalidArgument(format!("trade at '{}' has no price", value.time))
        })?;
        if !price.is_finite() {
            return Err(ReplayError::InvalidArgument(format!(
                "trade at '{}' has a non-finite price",
                value.time
            )));
        }
        let volume = value
            .volume
            .and_then(|volume| u64::try_from(volume).ok())
            .ok_or_else(|| {
                ReplayError::InvalidArgument(format!(
                    "trade at '{}' needs a non-negative volume",
                    value.time
                ))
            })?;

        Ok(Self {
            time_us,
            price,
            volume,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceLevelWire {
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub volume: Option<i64>,
}

impl PriceLevelWire {
    fn into_level(self) -> Option<PriceLevel> {
        let price = self.price.filter(|price| price.is_finite())?;
        let volume = u64::try_from(self.volume?).ok()?;
        Some(PriceLevel { price, volume })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DepthWire {
    pub timestamp: String,
    #[serde(default)]
    pub bids: Vec<PriceLevelWire>,
    #[serde(default)]
    pub asks: Vec<PriceLevelWire>,
}

impl TryFrom<DepthWire> for DepthSnapshot {
    type Error = ReplayError;

    /// Only an unreadable timestamp rejects the row; incomplete levels are dropped one by one.
    fn try_from(value: DepthWire) -> Result<Self, Self::Error> {
        let timestamp_us = parse_timestamp_us(&value.timestamp)?;
        let bid_count = value.bids.len();
        let ask_count = value.asks.len();
        let bids: Vec<PriceLevel> = value
            .bids
            .into_iter()
            .filter_map(PriceLevelWire::into_level)
            .collect();
        let asks: Vec<PriceLevel> = value
            .asks
            .into_iter()
            .filter_map(PriceLevelWire::into_level)
            .collect();

        let dropped = (bid_count - bids.len()) + (ask_count - asks.len());
        if dropped > 0 {
            tracing::debug!(
                timestamp = %value.timestamp,
                dropped,
                "dropped malformed depth levels"
            );
        }

        Ok(Self::new(timestamp_us, bids, asks))
    }
}

/// Session payload as served by `/api/data/{date}/{code}`. Server-side
/// classifications and statistics are ignored and recomputed locally.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionPayloadWire {
    #[serde(default)]
    pub stock_code: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub trades: Vec<TradeWire>,
    #[serde(default)]
    pub depth_history: Vec<DepthWire>,
}

/// Decoded rows for one (date, instrument) session.
#[derive(Debug, Clone, Default)]
pub struct SessionRows {
    pub instrument: Option<String>,
    pub date: Option<String>,
    pub trades: Vec<TradeRow>,
    pub depths: Vec<DepthSnapshot>,
}

impl SessionRows {
    pub fn new(trades: Vec<TradeRow>, depths: Vec<DepthSnapshot>) -> Self {
        Self {
            instrument: None,
            date: None,
            trades,
            depths,
        }
    }
}

impl From<SessionPayloadWire> for SessionRows {
    fn from(value: SessionPayloadWire) -> Self {
        let mut trades = Vec::with_capacity(value.trades.len());
        for wire in value.trades {
            match TradeRow::try_from(wire) {
                Ok(row) => trades.push(row),
                Err(error) => tracing::warn!("skipping trade row: {error}"),
            }
        }

        let mut depths = Vec::with_capacity(value.depth_history.len());
        for wire in value.depth_history {
            match DepthSnapshot::try_from(wire) {
                Ok(snapshot) => depths.push(snapshot),
                Err(error) => tracing::warn!("skipping depth row: {error}"),
            }
        }

        Self {
            instrument: value.stock_code,
            date: value.date,
            trades,
            depths,
        }
    }
}

pub fn parse_session_payload(payload: &mut [u8]) -> Result<SessionRows, ReplayError> {
    let wire: SessionPayloadWire = simd_json::serde::from_slice(payload)?;
    Ok(wire.into())
}

/// Parses an upstream wall-clock timestamp into microseconds on a UTC-naive scale.
pub fn parse_timestamp_us(raw: &str) -> Result<i64, ReplayError> {
    let trimmed = raw.trim();
    let parsed = NaiveDateTime::parse_from_str(trimmed, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, TIMESTAMP_FORMAT_ISO))?;
    Ok(parsed.and_utc().timestamp_micros())
}

pub fn format_timestamp(timestamp_us: i64) -> String {
    match DateTime::<Utc>::from_timestamp_micros(timestamp_us) {
        Some(value) => value.naive_utc().format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
        None => timestamp_us.to_string(),
    }
}

/// `HH:MM:SS.mmm`
pub fn format_clock(timestamp_us: Option<i64>) -> String {
    timestamp_us
        .and_then(DateTime::<Utc>::from_timestamp_micros)
        .map(|value| value.format("%H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| MISSING_CLOCK_LABEL.to_string())
}

/// `HH:MM`
pub fn format_clock_short(timestamp_us: Option<i64>) -> String {
    timestamp_us
        .and_then(DateTime::<Utc>::from_timestamp_micros)
        .map(|value| value.format("%H:%M").to_string())
        .unwrap_or_else(|| MISSING_SHORT_CLOCK_LABEL.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_session_payload_and_ignores_server_fields() {
        let mut payload = br#"{
            "stock_code":"2330","date":"20240105",
            "trades":[{"time":"2024-01-05 09:00:01.250000","price":580.0,"volume":3,"inner_outer":"x","flag":0}],
            "depth_history":[{"timestamp":"2024-01-05 09:00:00.000000",
                "bids":[{"price":579.0,"volume":10},{"price":579.5,"volume":4}],
                "asks":[{"price":581.0,"volume":7},{"price":580.5,"volume":2}]}],
            "stats":{"current_price":1.0}
        }"#
        .to_vec();

        let rows = parse_session_payload(&mut payload).expect("payload should parse");

        assert_eq!(rows.instrument.as_deref(), Some("2330"));
        assert_eq!(rows.trades.len(), 1);
        assert_eq!(rows.trades[0].volume, 3);
        assert_eq!(rows.depths.len(), 1);
        assert_eq!(rows.depths[0].best_bid(), Some(579.5));
        assert_eq!(rows.depths[0].best_ask(), Some(580.5));
    }

    #[test]
    fn drops_malformed_level_but_keeps_depth_row() {
        let mut payload = br#"{"depth_history":[{"timestamp":"2024-01-05 09:00:00.000000",
            "bids":[{"price":null,"volume":10},{"price":99.0,"volume":5}],
            "asks":[{"price":101.0}]}]}"#
            .to_vec();

        let rows = parse_session_payload(&mut payload).expect("payload should parse");

        assert_eq!(rows.depths.len(), 1);
        assert_eq!(rows.depths[0].bids, vec![PriceLevel { price: 99.0, volume: 5 }]);
        assert!(rows.depths[0].asks.is_empty());
    }

    #[test]
    fn skips_trade_without_price() {
        let mut payload = br#"{"trades":[
            {"time":"2024-01-05 09:00:01.000000","volume":3},
            {"time":"2024-01-05 09:00:02.000000","price":10.5,"volume":1}]}"#
            .to_vec();

        let rows = parse_session_payload(&mut payload).expect("payload should parse");

        assert_eq!(rows.trades.len(), 1);
        assert_eq!(rows.trades[0].price, 10.5);
        assert!(rows.depths.is_empty());
    }

    #[test]
    fn rejects_broken_payload() {
        let mut payload = br#"{"trades":[{"time":12}"#.to_vec();
        assert!(parse_session_payload(&mut payload).is_err());
    }

    #[test]
    fn truncates_depth_to_five_levels() {
        let bids = (0..7)
            .map(|offset| PriceLevel {
                price: 100.0 - offset as f64,
                volume: 1,
            })
            .collect();
        let snapshot = DepthSnapshot::new(0, bids, Vec::new());

        assert_eq!(snapshot.bids.len(), MAX_DEPTH_LEVELS);
        assert_eq!(snapshot.best_bid(), Some(100.0));
        assert_eq!(snapshot.best_ask(), None);
    }

    #[test]
    fn keeps_microsecond_precision() {
        let first = parse_timestamp_us("2024-01-05 09:00:00.000001").expect("valid timestamp");
        let second = parse_timestamp_us("2024-01-05T09:00:00.000002").expect("valid timestamp");

        assert_eq!(second - first, 1);
        assert_eq!(format_timestamp(first), "2024-01-05 09:00:00.000001");
        assert!(parse_timestamp_us("09:00").is_err());
    }

    #[test]
    fn formats_clock_labels() {
        let timestamp = parse_timestamp_us("2024-01-05 13:24:05.678900").expect("valid timestamp");

        assert_eq!(format_clock(Some(timestamp)), "13:24:05.678");
        assert_eq!(format_clock_short(Some(timestamp)), "13:24");
        assert_eq!(format_clock(None), "--");
        assert_eq!(format_clock_short(None), "--:--");
    }
}
