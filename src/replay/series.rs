use crate::market::types::{SessionStats, Trade};
use serde::{Deserialize, Serialize};

pub const MINUTE_US: i64 = 60_000_000;

/// Per-trade series in ascending time order. Entry `k` of every running
/// column covers `trades[..=k]`, so statistics for any visible prefix are a
/// single lookup.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSeries {
    timestamps: Vec<i64>,
    prices: Vec<f64>,
    volumes: Vec<u64>,
    cumulative_volumes: Vec<u64>,
    vwap: Vec<f64>,
    #[serde(skip)]
    running_high: Vec<f64>,
    #[serde(skip)]
    running_low: Vec<f64>,
}

impl ChartSeries {
    pub fn from_trades(trades: &[Trade]) -> Self {
        let len = trades.len();
        let mut series = Self {
            timestamps: Vec::with_capacity(len),
            prices: Vec::with_capacity(len),
            volumes: Vec::with_capacity(len),
            cumulative_volumes: Vec::with_capacity(len),
            vwap: Vec::with_capacity(len),
            running_high: Vec::with_capacity(len),
            running_low: Vec::with_capacity(len),
        };

        let mut cumulative_volume = 0_u64;
        let mut cumulative_value = 0.0_f64;
        let mut high = f64::NEG_INFINITY;
        let mut low = f64::INFINITY;

        for trade in trades {
            cumulative_volume = cumulative_volume.saturating_add(trade.volume);
            cumulative_value += trade.notional();
            high = high.max(trade.price);
            low = low.min(trade.price);

            series.timestamps.push(trade.time_us);
            series.prices.push(trade.price);
            series.volumes.push(trade.volume);
            series.cumulative_volumes.push(cumulative_volume);
            series
                .vwap
                .push(weighted_average(cumulative_value, cumulative_volume));
            series.running_high.push(high);
            series.running_low.push(low);
        }

        series
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn prices(&self) -> &[f64] {
        &self.prices
    }

    pub fn volumes(&self) -> &[u64] {
        &self.volumes
    }

    pub fn cumulative_volumes(&self) -> &[u64] {
        &self.cumulative_volumes
    }

    pub fn vwap(&self) -> &[f64] {
        &self.vwap
    }

    /// Statistics over the first `trade_count` trades, `None` when nothing is visible.
    pub fn stats_for(&self, trade_count: usize) -> Option<SessionStats> {
        let last = trade_count.min(self.len()).checked_sub(1)?;
        let open = self.prices[0];
        let current = self.prices[last];
        let change = current - open;
        let change_pct = if open == 0.0 {
            0.0
        } else {
            change / open * 100.0
        };

        Some(SessionStats {
            open,
            current,
            high: self.running_high[last],
            low: self.running_low[last],
            average: self.vwap[last],
            total_volume: self.cumulative_volumes[last],
            trade_count: last + 1,
            change,
            change_pct,
        })
    }
}

fn weighted_average(cumulative_value: f64, cumulative_volume: u64) -> f64 {
    if cumulative_volume == 0 {
        0.0
    } else {
        cumulative_value / cumulative_volume as f64
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ZoomMode {
    /// Series end at the current index.
    #[default]
    Dynamic,
    /// Series span the whole timeline, unplayed points left empty.
    Full,
}

/// Trade price and VWAP carried forward onto every timeline position.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedSeries {
    pub labels: Vec<i64>,
    pub prices: Vec<Option<f64>>,
    pub vwap: Vec<Option<f64>>,
}

/// One-minute bar over visible trades.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MinuteBar {
    pub t: i64,
    pub o: f64,
    pub h: f64,
    pub l: f64,
    pub c: f64,
    pub v: u64,
    pub cumulative_volume: u64,
}

impl MinuteBar {
    pub fn from_trade(bucket_open_time: i64, trade: &Trade, cumulative_volume: u64) -> Self {
        Self {
            t: bucket_open_time,
            o: trade.price,
            h: trade.price,
            l: trade.price,
            c: trade.price,
            v: trade.volume,
            cumulative_volume,
        }
    }

    pub fn apply_trade(&mut self, trade: &Trade) {
        self.h = self.h.max(trade.price);
        self.l = self.l.min(trade.price);
        self.c = trade.price;
        self.v = self.v.saturating_add(trade.volume);
        self.cumulative_volume = self.cumulative_volume.saturating_add(trade.volume);
    }
}

pub fn bucket_open_time(timestamp_us: i64, bucket_us: i64) -> i64 {
    if bucket_us <= 0 {
        return timestamp_us;
    }
    timestamp_us - timestamp_us.rem_euclid(bucket_us)
}

/// Buckets ascending trades into one-minute bars.
pub fn minute_bars(trades: &[Trade]) -> Vec<MinuteBar> {
    let mut bars: Vec<MinuteBar> = Vec::new();
    let mut cumulative_volume = 0_u64;

    for trade in trades {
        let bucket_open = bucket_open_time(trade.time_us, MINUTE_US);
        match bars.last_mut() {
            Some(current) if current.t == bucket_open => current.apply_trade(trade),
            _ => bars.push(MinuteBar::from_trade(
                bucket_open,
                trade,
                cumulative_volume.saturating_add(trade.volume),
            )),
        }
        cumulative_volume = cumulative_volume.saturating_add(trade.volume);
    }

    bars
}
