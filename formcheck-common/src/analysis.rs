//! Analysis result model
//!
//! Shapes returned by the remote AI analyzer. Field names follow the analyzer's
//! wire format (`form_score`, `feedback_pairs`, `body_part`, ...). Every field
//! is optional on the wire: a partially filled feedback pair still renders.

use serde::{Deserialize, Deserializer, Serialize};

/// Maximum form score reported by the analyzer
pub const MAX_FORM_SCORE: f64 = 10.0;

/// Severity of a single feedback event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    /// Missing or unrecognized severity
    #[default]
    Unknown,
}

impl Severity {
    /// Lenient parse; anything unrecognized is `Unknown`
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" => Severity::High,
            "medium" => Severity::Medium,
            "low" => Severity::Low,
            _ => Severity::Unknown,
        }
    }

    /// Sort rank, lower is more urgent. `Unknown` ranks with `Low`.
    pub fn rank(self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::High => 1,
            Severity::Medium => 2,
            Severity::Low | Severity::Unknown => 3,
        }
    }

    /// Uppercase badge label
    pub fn badge_label(self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
            Severity::Unknown => "UNKNOWN",
        }
    }
}

fn deserialize_severity<'de, D>(deserializer: D) -> Result<Severity, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().map(Severity::parse).unwrap_or_default())
}

fn deserialize_lossy_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.unwrap_or_default())
}

/// One piece of AI-generated form feedback tied to a body part and a time expression
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeedbackEvent {
    #[serde(default, deserialize_with = "deserialize_lossy_string")]
    pub body_part: String,

    #[serde(default, deserialize_with = "deserialize_lossy_string")]
    pub issue: String,

    #[serde(default, deserialize_with = "deserialize_lossy_string")]
    pub correction: String,

    #[serde(default, deserialize_with = "deserialize_severity")]
    pub severity: Severity,

    /// Analyzer confidence, 0-100
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    /// Raw time expression (`"01:05"`, `"00:10-00:20"`, `"throughout video"`)
    #[serde(default, rename = "timestamp", skip_serializing_if = "Option::is_none")]
    pub time_expression: Option<String>,
}

impl FeedbackEvent {
    /// Confidence with missing treated as 0
    pub fn confidence_or_zero(&self) -> f64 {
        self.confidence.filter(|c| c.is_finite()).unwrap_or(0.0)
    }
}

/// Final analysis for one completed job
///
/// Replaced wholesale when a new job completes; never mutated in place.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Form score, 0-10
    #[serde(default)]
    pub form_score: f64,

    /// Overall analyzer confidence, 0-100
    #[serde(default)]
    pub confidence: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rep_count: Option<u32>,

    /// Feedback events in analyzer order
    #[serde(default, rename = "feedback_pairs")]
    pub events: Vec<FeedbackEvent>,

    /// Rendered overlay video produced server-side, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_overlays_url: Option<String>,
}

impl AnalysisResult {
    /// Form score clamped into `[0, MAX_FORM_SCORE]`; NaN reads as 0
    pub fn clamped_score(&self) -> f64 {
        if self.form_score.is_nan() {
            0.0
        } else {
            self.form_score.clamp(0.0, MAX_FORM_SCORE)
        }
    }
}
