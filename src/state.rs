use crate::config::ReplayConfig;
use crate::error::ReplayError;
use crate::market::source::{fetch_dates, fetch_instruments, fetch_session, load_session_file};
use crate::market::types::SessionRows;
use crate::replay::driver::run_playback;
use crate::replay::playback::{PlaybackController, PlaybackStatus};
use crate::replay::session::{ReplayFrame, ReplaySession, TimelineOptions};
use crate::replay::window::Viewport;
use parking_lot::{Mutex, RwLock};
use reqwest::Client;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct PlaybackHandle {
    pub cancellation_token: CancellationToken,
    pub join_handle: JoinHandle<()>,
}

/// Owns the loaded session, its playback cursor, the chart viewport and the
/// single playback timer. One instance per replay view.
pub struct ReplayRuntime {
    config: ReplayConfig,
    http_client: Client,
    session: RwLock<Arc<ReplaySession>>,
    controller: Arc<Mutex<PlaybackController>>,
    viewport: Mutex<Viewport>,
    playback: tokio::sync::Mutex<Option<PlaybackHandle>>,
    status_tx: watch::Sender<PlaybackStatus>,
}

impl ReplayRuntime {
    pub fn new(config: ReplayConfig) -> Result<Self, ReplayError> {
        let http_client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        let controller = PlaybackController::new(0, config.playback_rate);
        let (status_tx, _) = watch::channel(controller.status());

        Ok(Self {
            config,
            http_client,
            session: RwLock::new(Arc::new(ReplaySession::default())),
            controller: Arc::new(Mutex::new(controller)),
            viewport: Mutex::new(Viewport::default()),
            playback: tokio::sync::Mutex::new(None),
            status_tx,
        })
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackStatus> {
        self.status_tx.subscribe()
    }

    pub fn session(&self) -> Arc<ReplaySession> {
        self.session.read().clone()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.controller.lock().status()
    }

    pub fn current_index(&self) -> usize {
        self.controller.lock().index()
    }

    /// Runs `read` against the frame at the playback cursor.
    pub fn with_current_frame<R>(&self, read: impl FnOnce(ReplayFrame<'_>) -> R) -> R {
        let session = self.session();
        let index = self.current_index();
        read(session.state_at(index))
    }

    pub async fn list_dates(&self) -> Result<Vec<String>, ReplayError> {
        fetch_dates(&self.http_client, &self.config.data_base_url).await
    }

    pub async fn list_instruments(&self, date: &str) -> Result<Vec<String>, ReplayError> {
        fetch_instruments(&self.http_client, &self.config.data_base_url, date).await
    }

    pub async fn load_session(
        &self,
        date: &str,
        instrument: &str,
    ) -> Result<Arc<ReplaySession>, ReplayError> {
        let rows = fetch_session(
            &self.http_client,
            &self.config.data_base_url,
            date,
            instrument,
        )
        .await?;
        Ok(self.install_rows(rows).await)
    }

    pub async fn load_session_file(
        &self,
        path: &Path,
        date: &str,
        instrument: &str,
    ) -> Result<Arc<ReplaySession>, ReplayError> {
        let rows = load_session_file(path, date, instrument).await?;
        Ok(self.install_rows(rows).await)
    }

    /// Stops any running timer, then replaces the session wholesale.
    pub async fn install_rows(&self, rows: SessionRows) -> Arc<ReplaySession> {
        self.stop_timer().await;

        let session = Arc::new(ReplaySession::build(
            rows,
            TimelineOptions::from(&self.config),
        ));
        {
            let mut writable = self.session.write();
            *writable = Arc::clone(&session);
        }
        let status = {
            let mut writable = self.controller.lock();
            writable.reset(session.len());
            writable.status()
        };
        self.viewport.lock().reset();
        self.status_tx.send_replace(status);

        session
    }

    pub async fn play(&self) -> PlaybackStatus {
        let mut playback_slot = self.playback.lock().await;
        if let Some(handle) = playback_slot.take() {
            if handle.join_handle.is_finished() || !self.controller.lock().is_playing() {
                handle.cancellation_token.cancel();
                let _ = handle.join_handle.await;
            } else {
                *playback_slot = Some(handle);
                return self.status();
            }
        }

        let (generation, status) = {
            let mut writable = self.controller.lock();
            (writable.play(), writable.status())
        };
        let Some(generation) = generation else {
            return status;
        };
        self.status_tx.send_replace(status);

        let cancellation_token = CancellationToken::new();
        let join_handle = tokio::spawn(run_playback(
            Arc::clone(&self.controller),
            generation,
            self.status_tx.clone(),
            cancellation_token.clone(),
        ));
        *playback_slot = Some(PlaybackHandle {
            cancellation_token,
            join_handle,
        });

        status
    }

    pub async fn pause(&self) -> PlaybackStatus {
        self.stop_timer().await;
        self.publish()
    }

    pub async fn toggle(&self) -> PlaybackStatus {
        if self.controller.lock().is_playing() {
            self.pause().await
        } else {
            self.play().await
        }
    }

    async fn stop_timer(&self) {
        let existing_handle = {
            let mut playback_slot = self.playback.lock().await;
            // pause under the slot lock so no new timer can be armed in between
            self.controller.lock().pause();
            playback_slot.take()
        };
        if let Some(handle) = existing_handle {
            handle.cancellation_token.cancel();
            let _ = handle.join_handle.await;
        }
    }

    /// Immediate; playback keeps running from the new position.
    pub fn seek(&self, index: usize) -> PlaybackStatus {
        self.controller.lock().seek(index);
        self.publish()
    }

    pub fn skip(&self, delta: i64) -> PlaybackStatus {
        self.controller.lock().skip(delta);
        self.publish()
    }

    pub fn skip_forward(&self) -> PlaybackStatus {
        self.skip(self.skip_step())
    }

    pub fn skip_backward(&self) -> PlaybackStatus {
        self.skip(-self.skip_step())
    }

    fn skip_step(&self) -> i64 {
        i64::try_from(self.config.skip_step).unwrap_or(i64::MAX)
    }

    /// Single-step navigation. Stops the timer before moving.
    pub async fn navigate(&self, delta: i64) -> PlaybackStatus {
        self.stop_timer().await;
        self.controller.lock().navigate(delta);
        self.publish()
    }

    pub fn set_rate(&self, rate: f64) -> Result<PlaybackStatus, ReplayError> {
        self.controller.lock().set_rate(rate)?;
        Ok(self.publish())
    }

    fn publish(&self) -> PlaybackStatus {
        let status = self.status();
        self.status_tx.send_replace(status);
        status
    }

    pub fn viewport(&self) -> Viewport {
        *self.viewport.lock()
    }

    pub fn visible_range(&self) -> Range<usize> {
        self.viewport().to_index_range(self.session().len())
    }

    pub fn zoom_in(&self) -> Viewport {
        let mut writable = self.viewport.lock();
        writable.zoom_in(self.config.zoom_step_pct);
        *writable
    }

    pub fn zoom_out(&self) -> Viewport {
        let mut writable = self.viewport.lock();
        writable.zoom_out(self.config.zoom_step_pct);
        *writable
    }

    pub fn reset_zoom(&self) -> Viewport {
        let mut writable = self.viewport.lock();
        writable.reset();
        *writable
    }

    pub fn pan_to(&self, start_pct: f64) -> Viewport {
        let mut writable = self.viewport.lock();
        writable.set_start(start_pct);
        *writable
    }

    /// Keeps the playback cursor on screen, recentering only when it has left the window.
    pub fn follow_cursor(&self) -> Viewport {
        let current_pct = self.session().progress_pct(self.current_index());
        let mut writable = self.viewport.lock();
        writable.recenter_if_outside(current_pct);
        *writable
    }

    /// Seeks to the point under a click at `x_px` inside the plot.
    pub fn seek_to_pixel(&self, x_px: f64, width_px: f64) -> Option<PlaybackStatus> {
        let total = self.session().len();
        let index = self.viewport().pixel_to_index(x_px, width_px, total)?;
        Some(self.seek(index))
    }

    pub async fn shutdown(&self) {
        self.stop_timer().await;
        self.publish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::types::{DepthSnapshot, PriceLevel, TradeRow};
    use crate::replay::playback::PlaybackState;

    fn rows(count: i64) -> SessionRows {
        let trades = (0..count)
            .map(|step| TradeRow {
                time_us: step * 1_000,
                price: 100.0 + step as f64,
                volume: 1,
            })
            .collect();
        let depths = vec![DepthSnapshot::new(
            0,
            vec![PriceLevel {
                price: 99.0,
                volume: 5,
            }],
            vec![PriceLevel {
                price: 101.0,
                volume: 5,
            }],
        )];
        SessionRows::new(trades, depths)
    }

    fn runtime() -> ReplayRuntime {
        ReplayRuntime::new(ReplayConfig::default()).expect("default runtime should build")
    }

    #[tokio::test(start_paused = true)]
    async fn plays_loaded_session_to_the_end() {
        let runtime = runtime();
        runtime.install_rows(rows(5)).await;
        let mut status_rx = runtime.subscribe();

        let status = runtime.play().await;
        assert_eq!(status.state, PlaybackState::Playing);

        while status_rx.borrow_and_update().state == PlaybackState::Playing {
            status_rx.changed().await.expect("runtime keeps the sender");
        }

        assert_eq!(runtime.current_index(), 4);
        assert_eq!(runtime.status().state, PlaybackState::Stopped);
        runtime.with_current_frame(|frame| {
            assert_eq!(frame.visible_trades.len(), 5);
        });
    }

    #[tokio::test(start_paused = true)]
    async fn pause_freezes_the_cursor() {
        let runtime = runtime();
        runtime.install_rows(rows(50)).await;

        runtime.play().await;
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        let paused = runtime.pause().await;
        tokio::time::sleep(Duration::from_millis(5_000)).await;

        assert_eq!(paused.state, PlaybackState::Stopped);
        assert_eq!(paused.index, 3);
        assert_eq!(runtime.current_index(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn play_twice_keeps_one_timer() {
        let runtime = runtime();
        runtime.install_rows(rows(50)).await;

        let first = runtime.play().await;
        let second = runtime.play().await;
        tokio::time::sleep(Duration::from_millis(2_500)).await;

        assert_eq!(first.generation, second.generation);
        assert_eq!(runtime.current_index(), 2);
        runtime.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn reload_stops_playback_and_rewinds() {
        let runtime = runtime();
        runtime.install_rows(rows(50)).await;
        runtime.play().await;
        tokio::time::sleep(Duration::from_millis(2_500)).await;

        let session = runtime.install_rows(rows(8)).await;

        assert_eq!(session.len(), 8);
        assert_eq!(runtime.status().state, PlaybackState::Stopped);
        assert_eq!(runtime.current_index(), 0);
        assert_eq!(runtime.viewport(), Viewport::default());
    }

    #[tokio::test]
    async fn navigate_pauses_and_steps() {
        let runtime = runtime();
        runtime.install_rows(rows(50)).await;
        runtime.seek(10);
        runtime.play().await;

        let status = runtime.navigate(-1).await;

        assert_eq!(status.state, PlaybackState::Stopped);
        assert_eq!(status.index, 9);
    }

    #[tokio::test]
    async fn skip_uses_configured_step() {
        let runtime = runtime();
        runtime.install_rows(rows(50)).await;

        assert_eq!(runtime.skip_forward().index, 10);
        assert_eq!(runtime.skip_forward().index, 20);
        assert_eq!(runtime.skip_backward().index, 10);
        assert_eq!(runtime.seek(1_000).index, 49);
    }

    #[tokio::test]
    async fn viewport_follows_cursor() {
        let runtime = runtime();
        runtime.install_rows(rows(101)).await;
        for _ in 0..8 {
            runtime.zoom_in();
        }
        assert_eq!(runtime.viewport().size_pct(), 20.0);

        runtime.seek(50);
        let viewport = runtime.follow_cursor();
        assert_eq!(viewport.start_pct(), 40.0);
        assert_eq!(runtime.visible_range(), 40..61);

        let status = runtime.seek_to_pixel(0.0, 200.0).expect("session is loaded");
        assert_eq!(status.index, 40);
    }

    #[tokio::test]
    async fn rejects_invalid_rate() {
        let runtime = runtime();

        assert!(runtime.set_rate(0.0).is_err());
        let status = runtime.set_rate(10.0).expect("ui speed is valid");
        assert_eq!(status.rate, 10.0);
    }

    #[tokio::test]
    async fn empty_session_cannot_play() {
        let runtime = runtime();
        let status = runtime.play().await;

        assert_eq!(status.state, PlaybackState::Stopped);
        runtime.with_current_frame(|frame| {
            assert!(frame.stats.is_none());
            assert!(frame.depth.is_none());
        });
    }
}
