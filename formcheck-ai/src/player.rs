//! Media player seam
//!
//! The core never owns a decoder. It reads the playhead and asks for seeks
//! through `MediaPlayer`. `RemotePlayer` is the implementation used by the
//! service: the UI reports its playhead over HTTP and receives seek/play
//! requests over SSE.

use chrono::Utc;
use formcheck_common::events::{EventBus, FormcheckEvent};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use tracing::debug;

use crate::overlay::scheduler::Viewport;

/// Playhead snapshot read once per frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlaybackCursor {
    pub current_time: f64,
    pub duration: f64,
}

/// Playback control surface the core depends on
pub trait MediaPlayer: Send + Sync {
    fn current_time(&self) -> f64;
    fn duration(&self) -> f64;
    fn is_paused(&self) -> bool;
    fn seek(&self, position: f64);
    fn play(&self);
    fn pause(&self);

    /// Size of the surface the overlay is drawn on
    fn viewport(&self) -> Viewport {
        Viewport::default()
    }

    fn cursor(&self) -> PlaybackCursor {
        PlaybackCursor {
            current_time: self.current_time(),
            duration: self.duration(),
        }
    }
}

/// Last state reported by the UI
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerReport {
    pub current_time: f64,
    pub duration: f64,
    pub paused: bool,
    /// Video element size; omitted reports keep the last known size
    #[serde(default)]
    pub viewport: Option<Viewport>,
}

impl Default for PlayerReport {
    fn default() -> Self {
        Self {
            current_time: 0.0,
            duration: 0.0,
            paused: true,
            viewport: None,
        }
    }
}

/// Player mirrored from UI reports
pub struct RemotePlayer {
    state: RwLock<PlayerReport>,
    event_bus: EventBus,
}

impl RemotePlayer {
    pub fn new(event_bus: EventBus) -> Self {
        Self {
            state: RwLock::new(PlayerReport::default()),
            event_bus,
        }
    }

    /// Accept a playhead report; non-finite or negative values are clamped to 0
    ///
    /// A viewport with a non-positive side is ignored.
    pub fn report(&self, report: PlayerReport) {
        let clean = |v: f64| if v.is_finite() && v > 0.0 { v } else { 0.0 };
        let viewport = report
            .viewport
            .filter(|v| clean(v.width) > 0.0 && clean(v.height) > 0.0);

        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let viewport = viewport.or(state.viewport);
        *state = PlayerReport {
            current_time: clean(report.current_time),
            duration: clean(report.duration),
            paused: report.paused,
            viewport,
        };
    }

    pub fn snapshot(&self) -> PlayerReport {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn update(&self, f: impl FnOnce(&mut PlayerReport)) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        f(&mut state);
    }
}

impl MediaPlayer for RemotePlayer {
    fn current_time(&self) -> f64 {
        self.snapshot().current_time
    }

    fn duration(&self) -> f64 {
        self.snapshot().duration
    }

    fn is_paused(&self) -> bool {
        self.snapshot().paused
    }

    fn viewport(&self) -> Viewport {
        self.snapshot().viewport.unwrap_or_default()
    }

    fn seek(&self, position: f64) {
        let position = position.max(0.0);
        // Mirror the seek locally so the next frame uses the new playhead
        self.update(|s| s.current_time = position);
        debug!(position, "Seek requested");
        self.event_bus.emit_lossy(FormcheckEvent::SeekRequested {
            position,
            timestamp: Utc::now(),
        });
    }

    fn play(&self) {
        self.update(|s| s.paused = false);
        self.event_bus.emit_lossy(FormcheckEvent::PlaybackToggleRequested {
            play: true,
            timestamp: Utc::now(),
        });
    }

    fn pause(&self) {
        self.update(|s| s.paused = true);
        self.event_bus.emit_lossy(FormcheckEvent::PlaybackToggleRequested {
            play: false,
            timestamp: Utc::now(),
        });
    }
}
