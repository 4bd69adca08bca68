//! Zoomed view over the timeline expressed in percent of its length.

use serde::{Deserialize, Serialize};
use std::ops::Range;

pub const MIN_VIEWPORT_PCT: f64 = 10.0;
pub const MAX_VIEWPORT_PCT: f64 = 100.0;
pub const DEFAULT_ZOOM_STEP_PCT: f64 = 10.0;

// Relative tolerance for treating a percent-derived position as a whole index.
const POSITION_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", from = "ViewportWire")]
pub struct Viewport {
    start_pct: f64,
    size_pct: f64,
}

/// Untrusted viewport as sent by a caller; clamped through [`Viewport::new`].
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ViewportWire {
    start_pct: f64,
    size_pct: f64,
}

impl From<ViewportWire> for Viewport {
    fn from(wire: ViewportWire) -> Self {
        Self::new(wire.start_pct, wire.size_pct)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            start_pct: 0.0,
            size_pct: MAX_VIEWPORT_PCT,
        }
    }
}

impl Viewport {
    /// Clamps into a legal viewport: size within `[10, 100]`, start within
    /// `[0, 100 - size]`.
    pub fn new(start_pct: f64, size_pct: f64) -> Self {
        let size_pct = if size_pct.is_finite() {
            size_pct.clamp(MIN_VIEWPORT_PCT, MAX_VIEWPORT_PCT)
        } else {
            MAX_VIEWPORT_PCT
        };
        let mut viewport = Self {
            start_pct: 0.0,
            size_pct,
        };
        viewport.set_start(start_pct);
        viewport
    }

    pub fn start_pct(&self) -> f64 {
        self.start_pct
    }

    pub fn size_pct(&self) -> f64 {
        self.size_pct
    }

    pub fn end_pct(&self) -> f64 {
        self.start_pct + self.size_pct
    }

    fn max_start(&self) -> f64 {
        (MAX_VIEWPORT_PCT - self.size_pct).max(0.0)
    }

    /// Pans without resizing.
    pub fn set_start(&mut self, start_pct: f64) {
        self.start_pct = if start_pct.is_finite() {
            start_pct.clamp(0.0, self.max_start())
        } else {
            0.0
        };
    }

    pub fn zoom_in(&mut self, step_pct: f64) {
        self.size_pct = (self.size_pct - step_pct.abs()).max(MIN_VIEWPORT_PCT);
        self.start_pct = self.start_pct.min(self.max_start());
    }

    pub fn zoom_out(&mut self, step_pct: f64) {
        self.size_pct = (self.size_pct + step_pct.abs()).min(MAX_VIEWPORT_PCT);
        self.start_pct = self.start_pct.min(self.max_start());
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Centers the window on `current_pct` as far as the edges allow.
    pub fn recenter(&mut self, current_pct: f64) {
        self.set_start(current_pct - self.size_pct / 2.0);
    }

    /// Recenters only when `current_pct` has left the window. Returns whether it moved.
    pub fn recenter_if_outside(&mut self, current_pct: f64) -> bool {
        if (self.start_pct..=self.end_pct()).contains(&current_pct) {
            return false;
        }
        self.recenter(current_pct);
        true
    }

    /// Half-open index range covered over a timeline of `total` points.
    pub fn to_index_range(&self, total: usize) -> Range<usize> {
        if total == 0 {
            return 0..0;
        }
        let end_position = snap_position(pct_to_position(self.end_pct(), total));
        let start_position = snap_position(pct_to_position(self.start_pct, total));
        let end = (end_position.ceil() as usize).min(total);
        let start = (start_position.floor() as usize).min(end);
        start..end
    }

    /// Inverse of [`Viewport::to_index_range`], widened to the minimum size when needed.
    pub fn from_index_range(range: Range<usize>, total: usize) -> Self {
        if total == 0 {
            return Self::default();
        }
        let start = range.start.min(total);
        let end = range.end.clamp(start, total);
        Self::new(
            start as f64 * 100.0 / total as f64,
            (end - start) as f64 * 100.0 / total as f64,
        )
    }

    /// Maps a horizontal pixel offset inside a `width_px` wide plot to a timeline index.
    pub fn pixel_to_index(&self, x_px: f64, width_px: f64, total: usize) -> Option<usize> {
        let range = self.to_index_range(total);
        if range.is_empty() {
            return None;
        }
        if width_px.is_nan() || width_px <= 0.0 || !x_px.is_finite() {
            return Some(range.start);
        }

        let visible = range.len();
        let fraction = (x_px / width_px).clamp(0.0, 1.0);
        let offset = ((fraction * visible as f64).floor() as usize).min(visible - 1);
        Some(range.start + offset)
    }

    /// Timestamps shown at the left and right edge of the window.
    pub fn edge_labels(&self, timeline: &[i64]) -> Option<(i64, i64)> {
        let total = timeline.len();
        if total == 0 {
            return None;
        }
        let last = total - 1;
        let start_position = snap_position(pct_to_position(self.start_pct, total));
        let end_position = snap_position(pct_to_position(self.end_pct(), total));
        let start = (start_position.floor() as usize).min(last);
        let end = (end_position.ceil() as usize)
            .saturating_sub(1)
            .clamp(start, last);
        Some((timeline[start], timeline[end]))
    }
}

fn pct_to_position(pct: f64, total: usize) -> f64 {
    pct * total as f64 / 100.0
}

/// Pulls a position that is a rounding error away from a whole index onto it,
/// so `floor`/`ceil` do not widen the range by one.
fn snap_position(position: f64) -> f64 {
    let nearest = position.round();
    if (position - nearest).abs() <= POSITION_EPSILON * nearest.abs().max(1.0) {
        nearest
    } else {
        position
    }
}

pub fn to_index_range(viewport: &Viewport, total: usize) -> Range<usize> {
    viewport.to_index_range(total)
}

pub fn to_viewport(range: Range<usize>, total: usize) -> Viewport {
    Viewport::from_index_range(range, total)
}

pub fn pixel_to_index(x_px: f64, width_px: f64, viewport: &Viewport, total: usize) -> Option<usize> {
    viewport.pixel_to_index(x_px, width_px, total)
}
