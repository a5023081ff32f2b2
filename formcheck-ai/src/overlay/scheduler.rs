//! Per-frame overlay composition
//!
//! `render_tick` turns the current session values into a `RenderDescription`:
//! score badge, active-issue caption, and optionally the compact analytics
//! panel. It is a pure function of its input; cadence belongs to the caller
//! (see `overlay::driver`).

use chrono::{DateTime, Utc};
use formcheck_common::analysis::MAX_FORM_SCORE;
use formcheck_common::{AnalysisResult, Severity};
use serde::Serialize;
use std::time::Duration;

use super::activation::{select_active, ActivationSource, SelectionOverride, DEFAULT_POINT_TOLERANCE_SECS};
use super::ranking::{rank_top, DEFAULT_TOP_ISSUES};
use super::text::{truncate_to_width, FittedText, TextMeasure};
use super::timestamp::{self, TimeInterval, DEFAULT_JUMP_DWELL_SECS};
use crate::player::PlaybackCursor;

const CAPTION_FONT_PX: f64 = 16.0;
const PANEL_TITLE_FONT_PX: f64 = 10.0;
const NEUTRAL_COLOR: &str = "#6b7280";

/// Overlay layout and timing settings
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayConfig {
    /// Draw the analytics panel next to the caption
    pub include_analytics_panel: bool,
    /// Horizontal space kept free around the caption
    pub caption_margin: f64,
    /// Width of the analytics panel (also reserved from the caption)
    pub panel_width: f64,
    pub panel_padding: f64,
    /// Caption content never shrinks below this many characters
    pub caption_min_chars: usize,
    /// Panel text never shrinks below this many characters
    pub panel_min_chars: usize,
    pub body_part_max_width: f64,
    pub top_issue_count: usize,
    pub point_tolerance_secs: f64,
    pub jump_dwell_secs: f64,
    /// How long a manual jump overrides playback activation
    pub selection_override: Duration,
    /// Render driver cadence
    pub frame_rate: u32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            include_analytics_panel: true,
            caption_margin: 80.0,
            panel_width: 320.0,
            panel_padding: 12.0,
            caption_min_chars: 20,
            panel_min_chars: 10,
            body_part_max_width: 140.0,
            top_issue_count: DEFAULT_TOP_ISSUES,
            point_tolerance_secs: DEFAULT_POINT_TOLERANCE_SECS,
            jump_dwell_secs: DEFAULT_JUMP_DWELL_SECS,
            selection_override: Duration::from_secs(5),
            frame_rate: 30,
        }
    }
}

impl OverlayConfig {
    /// Widest caption that leaves room for the margin and the panel
    pub fn caption_max_width(&self, viewport_width: f64) -> f64 {
        let reserved = if self.include_analytics_panel {
            self.caption_margin + self.panel_width
        } else {
            self.caption_margin
        };
        (viewport_width - reserved).max(0.0)
    }

    /// Width available for a panel line next to the rank badge
    fn panel_text_width(&self) -> f64 {
        (self.panel_width - self.panel_padding * 2.0 - 28.0).max(0.0)
    }
}

/// Drawing surface size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, serde::Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
        }
    }
}

/// Score tier; one threshold table drives both label and color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreTier {
    Excellent,
    Good,
    Fair,
    NeedsWork,
    Poor,
}

impl ScoreTier {
    pub fn from_score(score: f64) -> Self {
        if score >= 9.0 {
            ScoreTier::Excellent
        } else if score >= 7.0 {
            ScoreTier::Good
        } else if score >= 5.0 {
            ScoreTier::Fair
        } else if score >= 3.0 {
            ScoreTier::NeedsWork
        } else {
            ScoreTier::Poor
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ScoreTier::Excellent => "Excellent",
            ScoreTier::Good => "Good",
            ScoreTier::Fair => "Fair",
            ScoreTier::NeedsWork => "Needs Work",
            ScoreTier::Poor => "Poor",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            ScoreTier::Excellent => "#22c55e",
            ScoreTier::Good => "#84cc16",
            ScoreTier::Fair => "#f59e0b",
            ScoreTier::NeedsWork => "#ea580c",
            ScoreTier::Poor => "#dc2626",
        }
    }
}

/// Stroke/fill color for a severity
pub fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "#dc2626",
        Severity::High => "#ea580c",
        Severity::Medium => "#f59e0b",
        Severity::Low => "#22c55e",
        Severity::Unknown => NEUTRAL_COLOR,
    }
}

/// `8` → `"8"`, `7.5` → `"7.5"`
fn format_score(score: f64) -> String {
    if score.fract() == 0.0 {
        format!("{:.0}", score)
    } else {
        let text = format!("{:.2}", score);
        text.trim_end_matches('0').to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBadge {
    pub score: f64,
    /// `"7.5/10"`
    pub text: String,
    pub tier: ScoreTier,
    pub label: &'static str,
    pub color: &'static str,
}

impl ScoreBadge {
    pub fn from_result(result: &AnalysisResult) -> Self {
        let score = result.clamped_score();
        let tier = ScoreTier::from_score(score);
        Self {
            score,
            text: format!("{}/{}", format_score(score), format_score(MAX_FORM_SCORE)),
            tier,
            label: tier.label(),
            color: tier.color(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Caption {
    pub event_index: usize,
    pub text: String,
    pub truncated: bool,
    pub severity: Severity,
    pub border_color: &'static str,
    pub source: ActivationSource,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBar {
    pub label: &'static str,
    pub value: f64,
    /// Filled share of the bar, 0.0-1.0
    pub fraction: f64,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeverityBadge {
    pub label: &'static str,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueItem {
    /// 1-based position in the summary
    pub rank: usize,
    pub event_index: usize,
    pub body_part: FittedText,
    pub correction: FittedText,
    pub badge: SeverityBadge,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsPanel {
    pub ideal: ScoreBar,
    pub actual: ScoreBar,
    /// Points missing from a perfect score, when any
    pub gap: Option<f64>,
    pub top_issues: Vec<IssueItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayFrame {
    pub score_badge: ScoreBadge,
    pub caption: Option<Caption>,
    pub analytics: Option<AnalyticsPanel>,
}

/// What the drawing surface should show this frame
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderDescription {
    /// Clear the surface, draw nothing
    Clear,
    Frame(OverlayFrame),
}

/// Everything one frame depends on
pub struct RenderInput<'a> {
    pub result: Option<&'a AnalysisResult>,
    pub cursor: PlaybackCursor,
    pub show_overlay: bool,
    pub selection: Option<SelectionOverride>,
    pub now: DateTime<Utc>,
    pub viewport: Viewport,
    pub config: &'a OverlayConfig,
    pub measure: &'a dyn TextMeasure,
}

/// Compose one frame
///
/// Identical input always yields an identical description.
pub fn render_tick(input: &RenderInput<'_>) -> RenderDescription {
    let Some(result) = input.result.filter(|_| input.show_overlay) else {
        return RenderDescription::Clear;
    };

    let config = input.config;
    let intervals: Vec<TimeInterval> = result
        .events
        .iter()
        .map(|e| timestamp::parse(e.time_expression.as_deref(), input.cursor.duration))
        .collect();

    let caption = select_active(
        &result.events,
        &intervals,
        input.cursor.current_time,
        input.selection,
        input.now,
        config.point_tolerance_secs,
    )
    .map(|active| {
        let full = format!("{}: {}", active.event.body_part, active.event.issue);
        let fitted = truncate_to_width(
            &full,
            config.caption_max_width(input.viewport.width),
            CAPTION_FONT_PX,
            config.caption_min_chars,
            input.measure,
        );
        Caption {
            event_index: active.index,
            text: fitted.text,
            truncated: fitted.truncated,
            severity: active.event.severity,
            border_color: severity_color(active.event.severity),
            source: active.source,
        }
    });

    let analytics = (config.include_analytics_panel && !result.events.is_empty())
        .then(|| analytics_panel(result, config, input.measure));

    RenderDescription::Frame(OverlayFrame {
        score_badge: ScoreBadge::from_result(result),
        caption,
        analytics,
    })
}

fn analytics_panel(
    result: &AnalysisResult,
    config: &OverlayConfig,
    measure: &dyn TextMeasure,
) -> AnalyticsPanel {
    let score = result.clamped_score();
    let tier = ScoreTier::from_score(score);
    let gap = MAX_FORM_SCORE - score;

    let top_issues = rank_top(&result.events, config.top_issue_count)
        .into_iter()
        .enumerate()
        .map(|(position, ranked)| IssueItem {
            rank: position + 1,
            event_index: ranked.index,
            body_part: truncate_to_width(
                &ranked.event.body_part,
                config.body_part_max_width,
                PANEL_TITLE_FONT_PX,
                config.panel_min_chars,
                measure,
            ),
            correction: truncate_to_width(
                &format!("✓ {}", ranked.event.correction),
                config.panel_text_width(),
                PANEL_TITLE_FONT_PX,
                config.panel_min_chars,
                measure,
            ),
            badge: SeverityBadge {
                label: ranked.event.severity.badge_label(),
                color: severity_color(ranked.event.severity),
            },
        })
        .collect();

    AnalyticsPanel {
        ideal: ScoreBar {
            label: "Ideal",
            value: MAX_FORM_SCORE,
            fraction: 1.0,
            color: ScoreTier::Excellent.color(),
        },
        actual: ScoreBar {
            label: "Actual",
            value: score,
            fraction: score / MAX_FORM_SCORE,
            color: tier.color(),
        },
        gap: (gap > 0.0).then_some(gap),
        top_issues,
    }
}
