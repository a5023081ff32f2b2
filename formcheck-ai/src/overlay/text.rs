//! Text measurement and width-bounded truncation

use serde::Serialize;

/// Marker appended to truncated text
pub const ELLIPSIS: &str = "...";

/// Measures rendered text width in pixels
///
/// The drawing surface lives outside the core, so the presentation layer may
/// supply its own metrics; `MonospaceMeasure` is the built-in approximation.
pub trait TextMeasure: Send + Sync {
    fn width(&self, text: &str, font_px: f64) -> f64;
}

/// Every character is `advance_ratio * font_px` wide
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonospaceMeasure {
    pub advance_ratio: f64,
}

impl Default for MonospaceMeasure {
    fn default() -> Self {
        // Average advance of a bold system-ui face
        Self { advance_ratio: 0.6 }
    }
}

impl TextMeasure for MonospaceMeasure {
    fn width(&self, text: &str, font_px: f64) -> f64 {
        text.chars().count() as f64 * font_px * self.advance_ratio
    }
}

/// Result of fitting text to a width
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FittedText {
    pub text: String,
    pub truncated: bool,
}

/// Fit `text` into `max_width`, dropping trailing characters and appending `...`
///
/// At least `min_chars` characters of the original content always survive,
/// even when that overflows `max_width`. The result is never wider than `text`.
pub fn truncate_to_width(
    text: &str,
    max_width: f64,
    font_px: f64,
    min_chars: usize,
    measure: &dyn TextMeasure,
) -> FittedText {
    if measure.width(text, font_px) <= max_width {
        return FittedText {
            text: text.to_string(),
            truncated: false,
        };
    }

    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= min_chars {
        return FittedText {
            text: text.to_string(),
            truncated: false,
        };
    }

    let mut keep = chars.len();
    loop {
        keep -= 1;
        let mut candidate: String = chars[..keep].iter().collect();
        candidate.push_str(ELLIPSIS);

        let candidate_width = measure.width(&candidate, font_px);
        if candidate_width <= max_width {
            return FittedText {
                text: candidate,
                truncated: true,
            };
        }

        if keep <= min_chars {
            // Floor reached; the ellipsis must not make the text wider
            if candidate_width >= measure.width(text, font_px) {
                return FittedText {
                    text: text.to_string(),
                    truncated: false,
                };
            }
            return FittedText {
                text: candidate,
                truncated: true,
            };
        }
    }
}
