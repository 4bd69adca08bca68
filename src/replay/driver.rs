//! Periodic playback timer.

use crate::replay::playback::{PlaybackController, PlaybackStatus};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Advances `controller` once per tick interval until playback stops, the
/// generation changes or `cancel_token` fires. The interval is re-read before
/// every sleep so rate changes apply from the next tick.
pub async fn run_playback(
    controller: Arc<Mutex<PlaybackController>>,
    generation: u64,
    status_tx: watch::Sender<PlaybackStatus>,
    cancel_token: CancellationToken,
) {
    loop {
        let interval = {
            let readable = controller.lock();
            if !is_current(&readable, generation) {
                break;
            }
            readable.tick_interval()
        };

        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {
                let (status, still_playing) = {
                    let mut writable = controller.lock();
                    if !is_current(&writable, generation) {
                        break;
                    }
                    writable.tick();
                    (writable.status(), writable.is_playing())
                };

                status_tx.send_replace(status);
                if !still_playing {
                    break;
                }
            }
        }
    }

    tracing::debug!(generation, "playback timer exited");
}

fn is_current(controller: &PlaybackController, generation: u64) -> bool {
    controller.is_playing() && controller.generation() == generation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::playback::PlaybackState;
    use std::time::Duration;

    type Started = (
        Arc<Mutex<PlaybackController>>,
        u64,
        watch::Receiver<PlaybackStatus>,
        watch::Sender<PlaybackStatus>,
    );

    fn start(len: usize, rate: f64) -> Started {
        let controller = Arc::new(Mutex::new(PlaybackController::new(len, rate)));
        let generation = controller.lock().play().expect("timeline can play");
        let (status_tx, status_rx) = watch::channel(controller.lock().status());
        (controller, generation, status_rx, status_tx)
    }

    #[tokio::test(start_paused = true)]
    async fn runs_to_the_end_and_stops() {
        let (controller, generation, status_rx, status_tx) = start(5, 1.0);
        let cancel_token = CancellationToken::new();

        tokio::spawn(run_playback(
            Arc::clone(&controller),
            generation,
            status_tx,
            cancel_token,
        ))
        .await
        .expect("driver should finish");

        assert_eq!(controller.lock().index(), 4);
        assert_eq!(controller.lock().state(), PlaybackState::Stopped);
        assert_eq!(status_rx.borrow().index, 4);
        assert_eq!(status_rx.borrow().state, PlaybackState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_interval() {
        let (controller, generation, _status_rx, status_tx) = start(100, 2.0);
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(run_playback(
            Arc::clone(&controller),
            generation,
            status_tx,
            cancel_token.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(1_250)).await;
        assert_eq!(controller.lock().index(), 2);

        cancel_token.cancel();
        handle.await.expect("driver should exit on cancel");
        assert_eq!(controller.lock().index(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_prevents_armed_tick() {
        let (controller, generation, _status_rx, status_tx) = start(100, 1.0);
        let handle = tokio::spawn(run_playback(
            Arc::clone(&controller),
            generation,
            status_tx,
            CancellationToken::new(),
        ));

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert!(controller.lock().pause());

        // no cancel: the stale generation alone must stop the timer
        handle.await.expect("driver should exit after pause");
        assert_eq!(controller.lock().index(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn seek_while_playing_continues_from_new_position() {
        let (controller, generation, _status_rx, status_tx) = start(100, 1.0);
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(run_playback(
            Arc::clone(&controller),
            generation,
            status_tx,
            cancel_token.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(500)).await;
        controller.lock().seek(50);
        tokio::time::sleep(Duration::from_millis(1_000)).await;

        assert_eq!(controller.lock().index(), 51);
        assert!(controller.lock().is_playing());

        cancel_token.cancel();
        handle.await.expect("driver should exit on cancel");
    }
}
