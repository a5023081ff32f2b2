//! Overlay controls and per-frame render
//!
//! - POST /overlay/toggle
//! - POST /issues/:index/jump
//! - GET /overlay/frame

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::overlay::scheduler::{RenderDescription, Viewport};
use crate::player::{MediaPlayer, PlaybackCursor};
use crate::session::JumpTarget;
use crate::{ApiResult, AppState};

#[derive(Debug, Serialize, Deserialize)]
pub struct OverlayToggleResponse {
    pub show_overlay: bool,
}

/// POST /overlay/toggle
pub async fn toggle_overlay(State(state): State<AppState>) -> Json<OverlayToggleResponse> {
    let show_overlay = state.controls.toggle_overlay().await;
    Json(OverlayToggleResponse { show_overlay })
}

/// POST /issues/:index/jump
pub async fn jump_to_issue(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> ApiResult<Json<JumpTarget>> {
    let target = state.controls.jump_to_issue(index).await?;
    Ok(Json(target))
}

/// Frame query; omitted fields fall back to the last player report
#[derive(Debug, Default, Deserialize)]
pub struct FrameQuery {
    pub current_time: Option<f64>,
    pub duration: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

/// GET /overlay/frame
pub async fn render_frame(
    State(state): State<AppState>,
    Query(query): Query<FrameQuery>,
) -> Json<RenderDescription> {
    let reported = state.player.snapshot();
    let cursor = PlaybackCursor {
        current_time: query.current_time.unwrap_or(reported.current_time),
        duration: query.duration.unwrap_or(reported.duration),
    };
    let reported_viewport = state.player.viewport();
    let viewport = Viewport {
        width: query.width.unwrap_or(reported_viewport.width),
        height: query.height.unwrap_or(reported_viewport.height),
    };

    let frame = state
        .controls
        .render_frame(Some(cursor), Some(viewport), state.measure.as_ref())
        .await;
    Json(frame)
}

pub fn overlay_routes() -> Router<AppState> {
    Router::new()
        .route("/overlay/toggle", post(toggle_overlay))
        .route("/overlay/frame", get(render_frame))
        .route("/issues/:index/jump", post(jump_to_issue))
}
