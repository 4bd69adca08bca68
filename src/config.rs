use crate::error::ReplayError;
use crate::replay::timeline::{AUTO_DOWNSAMPLE_THRESHOLD, DEFAULT_DOWNSAMPLE_INTERVAL_MS};
use crate::replay::window;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PLAYBACK_RATE: f64 = 1.0;
pub const MIN_PLAYBACK_RATE: f64 = 0.1;
pub const MAX_PLAYBACK_RATE: f64 = 1_000.0;
pub const PLAYBACK_SPEEDS: [f64; 5] = [0.5, 1.0, 2.0, 5.0, 10.0];
pub const DEFAULT_TIMELINE_INTERVAL_MS: u64 = 0;
pub const MAX_TIMELINE_INTERVAL_MS: u64 = 60_000;
pub const DEFAULT_AUTO_DOWNSAMPLE_THRESHOLD: usize = AUTO_DOWNSAMPLE_THRESHOLD;
pub const MIN_AUTO_DOWNSAMPLE_THRESHOLD: usize = 1_000;
pub const MAX_AUTO_DOWNSAMPLE_THRESHOLD: usize = 10_000_000;
pub const DEFAULT_AUTO_DOWNSAMPLE_INTERVAL_MS: u64 = DEFAULT_DOWNSAMPLE_INTERVAL_MS;
pub const MIN_AUTO_DOWNSAMPLE_INTERVAL_MS: u64 = 1;
pub const MAX_AUTO_DOWNSAMPLE_INTERVAL_MS: u64 = 60_000;
pub const DEFAULT_ZOOM_STEP_PCT: f64 = window::DEFAULT_ZOOM_STEP_PCT;
pub const MIN_ZOOM_STEP_PCT: f64 = 1.0;
pub const MAX_ZOOM_STEP_PCT: f64 = 50.0;
pub const DEFAULT_SKIP_STEP: usize = 10;
pub const MIN_SKIP_STEP: usize = 1;
pub const MAX_SKIP_STEP: usize = 10_000;
pub const DEFAULT_DATA_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const MIN_REQUEST_TIMEOUT_MS: u64 = 100;
pub const MAX_REQUEST_TIMEOUT_MS: u64 = 120_000;

const DATA_BASE_URL_ENV: &str = "REPLAY_DATA_URL";

fn resolve_data_base_url() -> String {
    std::env::var(DATA_BASE_URL_ENV)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_DATA_BASE_URL.to_string())
}

pub fn validate_playback_rate(rate: f64) -> Result<f64, ReplayError> {
    if !rate.is_finite() || !(MIN_PLAYBACK_RATE..=MAX_PLAYBACK_RATE).contains(&rate) {
        return Err(ReplayError::InvalidArgument(format!(
            "playbackRate must be between {MIN_PLAYBACK_RATE} and {MAX_PLAYBACK_RATE}"
        )));
    }
    Ok(rate)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayArgs {
    pub playback_rate: Option<f64>,
    pub timeline_interval_ms: Option<u64>,
    pub auto_downsample_threshold: Option<usize>,
    pub auto_downsample_interval_ms: Option<u64>,
    pub zoom_step_pct: Option<f64>,
    pub skip_step: Option<usize>,
    pub data_base_url: Option<String>,
    pub request_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReplayConfig {
    pub playback_rate: f64,
    pub timeline_interval_ms: u64,
    pub auto_downsample_threshold: usize,
    pub auto_downsample_interval_ms: u64,
    pub zoom_step_pct: f64,
    pub skip_step: usize,
    pub data_base_url: String,
    pub request_timeout_ms: u64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            playback_rate: DEFAULT_PLAYBACK_RATE,
            timeline_interval_ms: DEFAULT_TIMELINE_INTERVAL_MS,
            auto_downsample_threshold: DEFAULT_AUTO_DOWNSAMPLE_THRESHOLD,
            auto_downsample_interval_ms: DEFAULT_AUTO_DOWNSAMPLE_INTERVAL_MS,
            zoom_step_pct: DEFAULT_ZOOM_STEP_PCT,
            skip_step: DEFAULT_SKIP_STEP,
            data_base_url: DEFAULT_DATA_BASE_URL.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl ReplayArgs {
    pub fn normalize(self) -> Result<ReplayConfig, ReplayError> {
        let playback_rate =
            validate_playback_rate(self.playback_rate.unwrap_or(DEFAULT_PLAYBACK_RATE))?;

        let timeline_interval_ms = self
            .timeline_interval_ms
            .unwrap_or(DEFAULT_TIMELINE_INTERVAL_MS);
        if timeline_interval_ms > MAX_TIMELINE_INTERVAL_MS {
            return Err(ReplayError::InvalidArgument(format!(
                "timelineIntervalMs must be at most {MAX_TIMELINE_INTERVAL_MS}"
            )));
        }

        let auto_downsample_threshold = self
            .auto_downsample_threshold
            .unwrap_or(DEFAULT_AUTO_DOWNSAMPLE_THRESHOLD);
        if !(MIN_AUTO_DOWNSAMPLE_THRESHOLD..=MAX_AUTO_DOWNSAMPLE_THRESHOLD)
            .contains(&auto_downsample_threshold)
        {
            return Err(ReplayError::InvalidArgument(format!(
                "autoDownsampleThreshold must be between {MIN_AUTO_DOWNSAMPLE_THRESHOLD} and {MAX_AUTO_DOWNSAMPLE_THRESHOLD}"
            )));
        }

        let auto_downsample_interval_ms = self
            .auto_downsample_interval_ms
            .unwrap_or(DEFAULT_AUTO_DOWNSAMPLE_INTERVAL_MS);
        if !(MIN_AUTO_DOWNSAMPLE_INTERVAL_MS..=MAX_AUTO_DOWNSAMPLE_INTERVAL_MS)
            .contains(&auto_downsample_interval_ms)
        {
            return Err(ReplayError::InvalidArgument(format!(
                "autoDownsampleIntervalMs must be between {MIN_AUTO_DOWNSAMPLE_INTERVAL_MS} and {MAX_AUTO_DOWNSAMPLE_INTERVAL_MS}"
            )));
        }

        let zoom_step_pct = self.zoom_step_pct.unwrap_or(DEFAULT_ZOOM_STEP_PCT);
        if !zoom_step_pct.is_finite()
            || !(MIN_ZOOM_STEP_PCT..=MAX_ZOOM_STEP_PCT).contains(&zoom_step_pct)
        {
            return Err(ReplayError::InvalidArgument(format!(
                "zoomStepPct must be between {MIN_ZOOM_STEP_PCT} and {MAX_ZOOM_STEP_PCT}"
            )));
        }

        let skip_step = self.skip_step.unwrap_or(DEFAULT_SKIP_STEP);
        if !(MIN_SKIP_STEP..=MAX_SKIP_STEP).contains(&skip_step) {
            return Err(ReplayError::InvalidArgument(format!(
                "skipStep must be between {MIN_SKIP_STEP} and {MAX_SKIP_STEP}"
            )));
        }

        let data_base_url = self
            .data_base_url
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(resolve_data_base_url)
            .trim_end_matches('/')
            .to_string();
        if !(data_base_url.starts_with("http://") || data_base_url.starts_with("https://")) {
            return Err(ReplayError::InvalidArgument(
                "dataBaseUrl must be an http(s) URL".to_string(),
            ));
        }

        let request_timeout_ms = self
            .request_timeout_ms
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS);
        if !(MIN_REQUEST_TIMEOUT_MS..=MAX_REQUEST_TIMEOUT_MS).contains(&request_timeout_ms) {
            return Err(ReplayError::InvalidArgument(format!(
                "requestTimeoutMs must be between {MIN_REQUEST_TIMEOUT_MS} and {MAX_REQUEST_TIMEOUT_MS}"
            )));
        }

        Ok(ReplayConfig {
            playback_rate,
            timeline_interval_ms,
            auto_downsample_threshold,
            auto_downsample_interval_ms,
            zoom_step_pct,
            skip_step,
            data_base_url,
            request_timeout_ms,
        })
    }
}
