use crate::config::{validate_playback_rate, DEFAULT_PLAYBACK_RATE};
use crate::error::ReplayError;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    pub index: usize,
    pub len: usize,
    pub rate: f64,
    pub generation: u64,
}

/// Cursor over a timeline of `len` points plus the play/pause state machine.
///
/// Every transition into or out of `Playing` bumps `generation`; a timer armed
/// under an older generation must not advance the cursor.
#[derive(Debug, Clone)]
pub struct PlaybackController {
    index: usize,
    len: usize,
    state: PlaybackState,
    rate: f64,
    generation: u64,
}

impl Default for PlaybackController {
    fn default() -> Self {
        Self::new(0, DEFAULT_PLAYBACK_RATE)
    }
}

impl PlaybackController {
    pub fn new(len: usize, rate: f64) -> Self {
        Self {
            index: 0,
            len,
            state: PlaybackState::Stopped,
            rate: validate_playback_rate(rate).unwrap_or(DEFAULT_PLAYBACK_RATE),
            generation: 0,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn last_index(&self) -> usize {
        self.len.saturating_sub(1)
    }

    pub fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            state: self.state,
            index: self.index,
            len: self.len,
            rate: self.rate,
            generation: self.generation,
        }
    }

    /// Starts playing and returns the generation a timer must carry. `None`
    /// when already playing or when there is nothing to advance through.
    /// Playing from the last point rewinds to the first.
    pub fn play(&mut self) -> Option<u64> {
        if self.is_playing() || self.len < 2 {
            return None;
        }
        if self.index >= self.last_index() {
            self.index = 0;
        }
        self.state = PlaybackState::Playing;
        self.generation = self.generation.wrapping_add(1);
        tracing::debug!(index = self.index, generation = self.generation, "playback started");
        Some(self.generation)
    }

    /// Returns whether playback was running.
    pub fn pause(&mut self) -> bool {
        if !self.is_playing() {
            return false;
        }
        self.stop();
        tracing::debug!(index = self.index, generation = self.generation, "playback paused");
        true
    }

    fn stop(&mut self) {
        self.state = PlaybackState::Stopped;
        self.generation = self.generation.wrapping_add(1);
    }

    /// Advances one point while playing, stopping once the last point is reached.
    /// Returns whether the cursor moved.
    pub fn tick(&mut self) -> bool {
        if !self.is_playing() {
            return false;
        }
        if self.index >= self.last_index() {
            self.stop();
            return false;
        }

        self.index += 1;
        if self.index >= self.last_index() {
            self.stop();
            tracing::debug!(index = self.index, "playback reached the end");
        }
        true
    }

    /// Jumps to `index` (clamped) without touching the play state.
    pub fn seek(&mut self, index: usize) -> usize {
        self.index = index.min(self.last_index());
        self.index
    }

    /// Relative seek by `delta` points, clamped at both ends.
    pub fn skip(&mut self, delta: i64) -> usize {
        let magnitude = usize::try_from(delta.unsigned_abs()).unwrap_or(usize::MAX);
        let target = if delta < 0 {
            self.index.saturating_sub(magnitude)
        } else {
            self.index.saturating_add(magnitude)
        };
        self.seek(target)
    }

    /// Single-step navigation: pauses first, then moves by `delta`.
    pub fn navigate(&mut self, delta: i64) -> usize {
        self.pause();
        self.skip(delta)
    }

    /// Takes effect from the next armed tick.
    pub fn set_rate(&mut self, rate: f64) -> Result<f64, ReplayError> {
        self.rate = validate_playback_rate(rate)?;
        Ok(self.rate)
    }

    /// `1000 / rate` milliseconds between ticks.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.rate)
    }

    /// Rebinds to a freshly built timeline: stopped, back at the first point.
    pub fn reset(&mut self, len: usize) {
        self.stop();
        self.len = len;
        self.index = 0;
    }
}
