//! Session context: the classified trades, depth history, unified timeline and
//! every lookup structure derived from them, built once per (date, instrument).

use crate::config::ReplayConfig;
use crate::market::classifier::classify_trades;
use crate::market::types::{DepthSnapshot, SessionRows, SessionStats, Trade};
use crate::replay::series::{minute_bars, ChartSeries, MinuteBar, ProjectedSeries, ZoomMode};
use crate::replay::timeline::{
    downsample, merge, resolve_downsample_interval, AUTO_DOWNSAMPLE_THRESHOLD,
    DEFAULT_DOWNSAMPLE_INTERVAL_MS,
};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineOptions {
    /// Explicit thinning interval; 0 lets oversized timelines thin automatically.
    pub interval_ms: u64,
    pub auto_threshold: usize,
    pub auto_interval_ms: u64,
}

impl Default for TimelineOptions {
    fn default() -> Self {
        Self {
            interval_ms: 0,
            auto_threshold: AUTO_DOWNSAMPLE_THRESHOLD,
            auto_interval_ms: DEFAULT_DOWNSAMPLE_INTERVAL_MS,
        }
    }
}

impl From<&ReplayConfig> for TimelineOptions {
    fn from(config: &ReplayConfig) -> Self {
        Self {
            interval_ms: config.timeline_interval_ms,
            auto_threshold: config.auto_downsample_threshold,
            auto_interval_ms: config.auto_downsample_interval_ms,
        }
    }
}

/// Where a timeline position lands in the trade and depth arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimelineCursor {
    /// Trades with `time_us <= timeline[i]`.
    pub trade_count: usize,
    /// Latest snapshot with `timestamp_us <= timeline[i]`.
    pub depth_index: Option<usize>,
}

/// World state at one timeline position.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayFrame<'a> {
    pub index: usize,
    pub timestamp_us: Option<i64>,
    pub depth: Option<&'a DepthSnapshot>,
    /// Oldest first.
    pub visible_trades: &'a [Trade],
    pub stats: Option<SessionStats>,
}

impl<'a> ReplayFrame<'a> {
    pub fn trades_newest_first(&self) -> impl Iterator<Item = &'a Trade> {
        self.visible_trades.iter().rev()
    }

    pub fn last_trade(&self) -> Option<&'a Trade> {
        self.visible_trades.last()
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackProgress {
    /// 1-based position for display.
    pub position: usize,
    pub total: usize,
    pub percent: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ReplaySession {
    instrument: Option<String>,
    date: Option<String>,
    trades: Vec<Trade>,
    depths: Vec<DepthSnapshot>,
    timeline: Vec<i64>,
    raw_timeline_len: usize,
    downsample_interval_ms: Option<u64>,
    cursors: Vec<TimelineCursor>,
    series: ChartSeries,
}

impl ReplaySession {
    pub fn build(rows: SessionRows, options: TimelineOptions) -> Self {
        let SessionRows {
            instrument,
            date,
            mut trades,
            mut depths,
        } = rows;

        // stable: equal timestamps keep their upstream order
        trades.sort_by_key(|trade| trade.time_us);
        depths.sort_by_key(|depth| depth.timestamp_us);

        let trades = classify_trades(&trades, &depths);

        let trade_times: Vec<i64> = trades.iter().map(|trade| trade.time_us).collect();
        let depth_times: Vec<i64> = depths.iter().map(|depth| depth.timestamp_us).collect();
        let merged = merge(&trade_times, &depth_times);
        let raw_timeline_len = merged.len();

        let downsample_interval_ms = resolve_downsample_interval(
            raw_timeline_len,
            options.interval_ms,
            options.auto_threshold,
            options.auto_interval_ms,
        );
        let timeline = match downsample_interval_ms {
            Some(interval_ms) => {
                let thinned = downsample(&merged, interval_ms);
                tracing::info!(
                    interval_ms,
                    before = raw_timeline_len,
                    after = thinned.len(),
                    "downsampled session timeline"
                );
                thinned
            }
            None => merged,
        };

        let cursors = build_cursors(&timeline, &trades, &depths);
        let series = ChartSeries::from_trades(&trades);

        tracing::info!(
            instrument = instrument.as_deref().unwrap_or("-"),
            date = date.as_deref().unwrap_or("-"),
            trades = trades.len(),
            depths = depths.len(),
            timeline = timeline.len(),
            "session timeline built"
        );

        Self {
            instrument,
            date,
            trades,
            depths,
            timeline,
            raw_timeline_len,
            downsample_interval_ms,
            cursors,
            series,
        }
    }

    pub fn instrument(&self) -> Option<&str> {
        self.instrument.as_deref()
    }

    pub fn date(&self) -> Option<&str> {
        self.date.as_deref()
    }

    pub fn timeline(&self) -> &[i64] {
        &self.timeline
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn depths(&self) -> &[DepthSnapshot] {
        &self.depths
    }

    pub fn series(&self) -> &ChartSeries {
        &self.series
    }

    pub fn len(&self) -> usize {
        self.timeline.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timeline.is_empty()
    }

    pub fn last_index(&self) -> usize {
        self.timeline.len().saturating_sub(1)
    }

    pub fn raw_timeline_len(&self) -> usize {
        self.raw_timeline_len
    }

    pub fn downsample_interval_ms(&self) -> Option<u64> {
        self.downsample_interval_ms
    }

    pub fn clamp_index(&self, index: usize) -> usize {
        index.min(self.last_index())
    }

    pub fn timestamp_at(&self, index: usize) -> Option<i64> {
        self.timeline.get(self.clamp_index(index)).copied()
    }

    pub fn cursor_at(&self, index: usize) -> TimelineCursor {
        self.cursors
            .get(self.clamp_index(index))
            .copied()
            .unwrap_or_default()
    }

    /// Book, visible trades and running statistics as of `timeline[index]`.
    /// Out-of-range indices are clamped; an empty session yields an empty frame.
    pub fn state_at(&self, index: usize) -> ReplayFrame<'_> {
        let index = self.clamp_index(index);
        let cursor = self.cursor_at(index);

        ReplayFrame {
            index,
            timestamp_us: self.timeline.get(index).copied(),
            depth: cursor.depth_index.and_then(|depth| self.depths.get(depth)),
            visible_trades: &self.trades[..cursor.trade_count],
            stats: self.series.stats_for(cursor.trade_count),
        }
    }

    /// Statistics over the whole session.
    pub fn summary_stats(&self) -> Option<SessionStats> {
        self.series.stats_for(self.trades.len())
    }

    pub fn progress(&self, index: usize) -> Option<PlaybackProgress> {
        if self.is_empty() {
            return None;
        }
        let index = self.clamp_index(index);
        Some(PlaybackProgress {
            position: index + 1,
            total: self.len(),
            percent: self.progress_pct(index),
        })
    }

    /// Position of `index` along the timeline in percent.
    pub fn progress_pct(&self, index: usize) -> f64 {
        let last = self.last_index();
        if last == 0 {
            return 0.0;
        }
        self.clamp_index(index) as f64 / last as f64 * 100.0
    }

    /// Latest trade price and VWAP at each timeline position up to `index`.
    pub fn projected_series(&self, index: usize, mode: ZoomMode) -> ProjectedSeries {
        if self.is_empty() {
            return ProjectedSeries::default();
        }

        let index = self.clamp_index(index);
        let mut projected = ProjectedSeries {
            labels: self.timeline[..=index].to_vec(),
            prices: Vec::with_capacity(index + 1),
            vwap: Vec::with_capacity(index + 1),
        };

        for cursor in &self.cursors[..=index] {
            let last_trade = cursor.trade_count.checked_sub(1);
            projected
                .prices
                .push(last_trade.map(|trade| self.series.prices()[trade]));
            projected
                .vwap
                .push(last_trade.map(|trade| self.series.vwap()[trade]));
        }

        if mode == ZoomMode::Full {
            projected.labels = self.timeline.clone();
            projected.prices.resize(self.len(), None);
            projected.vwap.resize(self.len(), None);
        }

        projected
    }

    pub fn minute_bars(&self, index: usize) -> Vec<MinuteBar> {
        minute_bars(self.state_at(index).visible_trades)
    }
}

/// Two-pointer walk mapping every timeline position to its trade prefix and
/// active depth snapshot.
fn build_cursors(
    timeline: &[i64],
    trades: &[Trade],
    depths: &[DepthSnapshot],
) -> Vec<TimelineCursor> {
    let mut cursors = Vec::with_capacity(timeline.len());
    let mut trade_count = 0;
    let mut depth_count = 0;

    for &timestamp in timeline {
        while trade_count < trades.len() && trades[trade_count].time_us <= timestamp {
            trade_count += 1;
        }
        while depth_count < depths.len() && depths[depth_count].timestamp_us <= timestamp {
            depth_count += 1;
        }
        cursors.push(TimelineCursor {
            trade_count,
            depth_index: depth_count.checked_sub(1),
        });
    }

    cursors
}
