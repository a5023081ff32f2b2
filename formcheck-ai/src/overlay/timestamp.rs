//! Feedback time expressions
//!
//! The analyzer tags each feedback event with a loose time expression:
//! `"01:05"` (a cue point), `"00:10-00:20"` (a range) or a sentinel such as
//! `"throughout video"`. Expressions that cannot be read resolve to a global
//! interval so a malformed timestamp never hides feedback.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

/// Forward dwell applied when jumping to a cue point
pub const DEFAULT_JUMP_DWELL_SECS: f64 = 2.0;

static TIME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+):(\d+)(?:-(\d+):(\d+))?").expect("time pattern is a valid regex")
});

const SENTINELS: [&str; 2] = ["throughout video", "n/a"];

/// A time expression that matched no known form
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    #[error("Malformed timestamp: {0:?}")]
    Malformed(String),
}

/// End of a parsed interval
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "at", rename_all = "snake_case")]
pub enum IntervalEnd {
    /// Explicit end, inclusive
    At(f64),
    /// Cue point with no explicit end
    Open,
}

/// Normalized interval derived from a time expression
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeInterval {
    pub start_sec: f64,
    pub end: IntervalEnd,
    /// Always active (sentinel or unreadable expression)
    pub is_global: bool,
}

impl TimeInterval {
    /// The whole video
    pub fn global(video_duration: f64) -> Self {
        Self {
            start_sec: 0.0,
            end: IntervalEnd::At(sanitize_duration(video_duration)),
            is_global: true,
        }
    }

    /// Cue point at `start_sec`
    pub fn point(start_sec: f64) -> Self {
        Self {
            start_sec,
            end: IntervalEnd::Open,
            is_global: false,
        }
    }

    /// Range; reversed ends are swapped
    pub fn range(start_sec: f64, end_sec: f64) -> Self {
        let (start_sec, end_sec) = if end_sec < start_sec {
            (end_sec, start_sec)
        } else {
            (start_sec, end_sec)
        };
        Self {
            start_sec,
            end: IntervalEnd::At(end_sec),
            is_global: false,
        }
    }

    /// `(start, end)` used when the user jumps to this interval
    ///
    /// Cue points get a fixed forward dwell of `dwell_secs`.
    pub fn jump_window(&self, dwell_secs: f64) -> (f64, f64) {
        match self.end {
            IntervalEnd::At(end) => (self.start_sec, end),
            IntervalEnd::Open => (self.start_sec, self.start_sec + dwell_secs),
        }
    }
}

fn sanitize_duration(duration: f64) -> f64 {
    if duration.is_finite() && duration > 0.0 {
        duration
    } else {
        0.0
    }
}

fn is_sentinel(expression: &str) -> bool {
    let normalized = expression.trim().to_ascii_lowercase();
    normalized.is_empty() || SENTINELS.contains(&normalized.as_str())
}

fn clock_seconds(minutes: &str, seconds: &str) -> Option<f64> {
    let minutes: u64 = minutes.parse().ok()?;
    let seconds: u64 = seconds.parse().ok()?;
    Some(minutes.checked_mul(60)?.checked_add(seconds)? as f64)
}

/// Parse a time expression, reporting unreadable input
///
/// Sentinels and missing expressions are not errors; they parse as global.
pub fn parse_strict(
    expression: Option<&str>,
    video_duration: f64,
) -> Result<TimeInterval, TimestampError> {
    let Some(expression) = expression.filter(|e| !is_sentinel(e)) else {
        return Ok(TimeInterval::global(video_duration));
    };

    let malformed = || TimestampError::Malformed(expression.to_string());
    let caps = TIME_PATTERN.captures(expression).ok_or_else(malformed)?;

    let start = clock_seconds(&caps[1], &caps[2]).ok_or_else(malformed)?;

    match (caps.get(3), caps.get(4)) {
        (Some(end_min), Some(end_sec)) => {
            let end = clock_seconds(end_min.as_str(), end_sec.as_str()).ok_or_else(malformed)?;
            Ok(TimeInterval::range(start, end))
        }
        _ => Ok(TimeInterval::point(start)),
    }
}

/// Parse a time expression, failing open
///
/// Unreadable expressions become global intervals.
pub fn parse(expression: Option<&str>, video_duration: f64) -> TimeInterval {
    parse_strict(expression, video_duration).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "Treating unreadable timestamp as always active");
        TimeInterval::global(video_duration)
    })
}
