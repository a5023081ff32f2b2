//! formcheck-ai library interface
//!
//! Video form analysis service: submits workout videos to a remote AI
//! analyzer, tracks the job, and renders the feedback overlay that the UI
//! draws over the playing video.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod overlay;
pub mod player;
pub mod services;
pub mod session;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use formcheck_common::events::EventBus;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::overlay::scheduler::{OverlayConfig, RenderDescription};
use crate::overlay::text::{MonospaceMeasure, TextMeasure};
use crate::overlay::RenderDriver;
use crate::player::RemotePlayer;
use crate::services::{AnalyzerApi, JobOrchestrator, OrchestratorConfig};
use crate::session::{Session, SessionControls};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<RwLock<Session>>,
    pub orchestrator: Arc<JobOrchestrator>,
    pub controls: SessionControls,
    pub player: Arc<RemotePlayer>,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Latest frame from the render driver
    pub frames: watch::Receiver<RenderDescription>,
    pub measure: Arc<dyn TextMeasure>,
    render_driver: Arc<Mutex<RenderDriver>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Most recent job failure, reported by `/health`
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    /// Wire the session, orchestrator, player and render driver together
    ///
    /// Must be called inside a tokio runtime (the render driver is spawned).
    pub fn new(
        api: Arc<dyn AnalyzerApi>,
        orchestrator_config: OrchestratorConfig,
        overlay_config: OverlayConfig,
        event_bus: EventBus,
    ) -> Self {
        let session = Arc::new(RwLock::new(Session::default()));
        let player = Arc::new(RemotePlayer::new(event_bus.clone()));
        let orchestrator = Arc::new(JobOrchestrator::new(
            api,
            Arc::clone(&session),
            event_bus.clone(),
            orchestrator_config,
        ));
        let last_error = orchestrator.last_error();
        let controls = SessionControls::new(
            Arc::clone(&session),
            player.clone(),
            event_bus.clone(),
            overlay_config,
        );
        let measure: Arc<dyn TextMeasure> = Arc::new(MonospaceMeasure::default());
        let render_driver = RenderDriver::spawn(controls.clone(), Arc::clone(&measure));

        Self {
            session,
            orchestrator,
            controls,
            player,
            event_bus,
            frames: render_driver.subscribe(),
            measure,
            render_driver: Arc::new(Mutex::new(render_driver)),
            startup_time: Utc::now(),
            last_error,
        }
    }

    /// Stop the live job and the render loop
    pub async fn shutdown(&self) {
        self.orchestrator.shutdown().await;
        self.render_driver.lock().await.stop().await;
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::health_routes())
        .merge(api::job_routes())
        .merge(api::analysis_routes())
        .merge(api::overlay_routes())
        .merge(api::player_routes())
        .route("/events", get(api::event_stream))
        .route("/overlay/stream", get(api::overlay_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
