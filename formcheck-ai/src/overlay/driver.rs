//! Render driver
//!
//! Invokes `render_tick` at a fixed cadence and publishes each description on
//! a watch channel. Pulls state only; never performs I/O or writes the session.
//! Playhead and viewport are read from the player on every tick.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::scheduler::RenderDescription;
use super::text::TextMeasure;
use crate::session::SessionControls;

pub struct RenderDriver {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
    frames: watch::Receiver<RenderDescription>,
}

impl RenderDriver {
    /// Start rendering at the configured frame rate
    pub fn spawn(controls: SessionControls, measure: Arc<dyn TextMeasure>) -> Self {
        let frame_rate = controls.config().frame_rate.max(1);
        let period = Duration::from_secs_f64(1.0 / frame_rate as f64);
        let (tx, frames) = watch::channel(RenderDescription::Clear);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            debug!(frame_rate, "Render driver started");

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let frame = controls.render_frame(None, None, measure.as_ref()).await;
                        tx.send_if_modified(|current| {
                            if *current == frame {
                                false
                            } else {
                                *current = frame;
                                true
                            }
                        });
                    }
                }
            }

            debug!("Render driver stopped");
        });

        Self {
            cancel,
            handle: Some(handle),
            frames,
        }
    }

    /// Receiver that always holds the latest description
    pub fn subscribe(&self) -> watch::Receiver<RenderDescription> {
        self.frames.clone()
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    /// Detach the overlay and wait for the loop to exit
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for RenderDriver {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
