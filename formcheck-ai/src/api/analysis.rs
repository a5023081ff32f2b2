//! Analysis result endpoints

use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use formcheck_common::{AnalysisResult, Severity};
use serde::{Deserialize, Serialize};

use crate::overlay::ranking::{rank_top, DEFAULT_TOP_ISSUES};
use crate::overlay::scheduler::{severity_color, ScoreTier};
use crate::session::SessionError;
use crate::{ApiError, ApiResult, AppState};

/// GET /analysis
pub async fn get_analysis(State(state): State<AppState>) -> ApiResult<Json<AnalysisResult>> {
    let session = state.session.read().await;
    let result = session.result.as_deref().ok_or(SessionError::NoAnalysis)?;
    Ok(Json(result.clone()))
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SummaryIssue {
    pub rank: usize,
    pub index: usize,
    pub body_part: String,
    pub issue: String,
    pub correction: String,
    pub severity: Severity,
    pub color: String,
    pub confidence: Option<f64>,
    pub timestamp: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub form_score: f64,
    pub label: String,
    pub color: String,
    pub confidence: f64,
    pub rep_count: Option<u32>,
    pub issue_count: usize,
    pub top_issues: Vec<SummaryIssue>,
}

/// GET /analysis/summary?limit=3
pub async fn get_summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> ApiResult<Json<SummaryResponse>> {
    let session = state.session.read().await;
    let result = session.result.as_deref().ok_or(SessionError::NoAnalysis)?;

    let score = result.clamped_score();
    let tier = ScoreTier::from_score(score);
    let top_issues = rank_top(&result.events, query.limit.unwrap_or(DEFAULT_TOP_ISSUES))
        .into_iter()
        .enumerate()
        .map(|(position, ranked)| SummaryIssue {
            rank: position + 1,
            index: ranked.index,
            body_part: ranked.event.body_part.clone(),
            issue: ranked.event.issue.clone(),
            correction: ranked.event.correction.clone(),
            severity: ranked.event.severity,
            color: severity_color(ranked.event.severity).to_string(),
            confidence: ranked.event.confidence,
            timestamp: ranked.event.time_expression.clone(),
        })
        .collect();

    Ok(Json(SummaryResponse {
        form_score: score,
        label: tier.label().to_string(),
        color: tier.color().to_string(),
        confidence: result.confidence,
        rep_count: result.rep_count,
        issue_count: result.events.len(),
        top_issues,
    }))
}

/// GET /analysis/export
///
/// Served as an attachment named `form-analysis-<millis>.json`.
pub async fn export_analysis(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let export = state.session.read().await.export(Utc::now())?;
    let body = serde_json::to_string_pretty(&export)
        .map_err(|e| ApiError::Internal(format!("Failed to serialize export: {}", e)))?;

    let disposition = format!("attachment; filename=\"{}\"", export.filename());
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

pub fn analysis_routes() -> Router<AppState> {
    Router::new()
        .route("/analysis", get(get_analysis))
        .route("/analysis/summary", get(get_summary))
        .route("/analysis/export", get(export_analysis))
}
