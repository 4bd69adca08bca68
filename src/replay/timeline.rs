//! Unified playback clock: every distinct instant at which a trade printed or
//! the book changed becomes one addressable timeline position.

pub const AUTO_DOWNSAMPLE_THRESHOLD: usize = 50_000;
pub const DEFAULT_DOWNSAMPLE_INTERVAL_MS: u64 = 100;

const MICROS_PER_MILLI: i64 = 1_000;

/// Union of both timestamp sets, sorted ascending with exact duplicates removed.
pub fn merge(trade_times: &[i64], depth_times: &[i64]) -> Vec<i64> {
    let mut timeline = Vec::with_capacity(trade_times.len() + depth_times.len());
    timeline.extend_from_slice(trade_times);
    timeline.extend_from_slice(depth_times);
    timeline.sort_unstable();
    timeline.dedup();
    timeline
}

/// Thins a sorted timeline so that consecutive kept points are at least
/// `min_interval_ms` apart. The first and last input points always survive.
pub fn downsample(timeline: &[i64], min_interval_ms: u64) -> Vec<i64> {
    let (Some(&first), Some(&last)) = (timeline.first(), timeline.last()) else {
        return Vec::new();
    };
    if min_interval_ms == 0 {
        return timeline.to_vec();
    }

    let min_gap_us = i64::try_from(min_interval_ms)
        .unwrap_or(i64::MAX)
        .saturating_mul(MICROS_PER_MILLI);
    let mut kept = vec![first];
    let mut last_kept = first;

    for &timestamp in &timeline[1..] {
        if timestamp.saturating_sub(last_kept) >= min_gap_us {
            kept.push(timestamp);
            last_kept = timestamp;
        }
    }

    if last_kept != last {
        kept.push(last);
    }
    kept
}

/// Interval to thin with, if any. An explicit interval always wins; otherwise
/// oversized timelines fall back to `auto_interval_ms`.
pub fn resolve_downsample_interval(
    timeline_len: usize,
    explicit_interval_ms: u64,
    auto_threshold: usize,
    auto_interval_ms: u64,
) -> Option<u64> {
    if explicit_interval_ms > 0 {
        Some(explicit_interval_ms)
    } else if timeline_len > auto_threshold {
        Some(auto_interval_ms)
    } else {
        None
    }
}
