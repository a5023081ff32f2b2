//! Player reports and playback control

use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::player::PlayerReport;
use crate::{ApiError, ApiResult, AppState};

/// POST /player
///
/// The UI reports its playhead so frames and jumps use the real position.
pub async fn report_player(State(state): State<AppState>, Json(report): Json<PlayerReport>) -> StatusCode {
    state.player.report(report);
    StatusCode::NO_CONTENT
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlaybackResponse {
    pub playing: bool,
}

/// POST /player/toggle-playback
///
/// Rejected with 409 while a job is live.
pub async fn toggle_playback(State(state): State<AppState>) -> ApiResult<Json<PlaybackResponse>> {
    let playing = state
        .controls
        .toggle_playback()
        .await
        .ok_or_else(|| ApiError::Conflict("Playback is locked while analysis is running".to_string()))?;
    Ok(Json(PlaybackResponse { playing }))
}

pub fn player_routes() -> Router<AppState> {
    Router::new()
        .route("/player", post(report_player))
        .route("/player/toggle-playback", post(toggle_playback))
}
