//! Severity ordering for the "quick analysis" summary

use formcheck_common::FeedbackEvent;
use serde::Serialize;

/// Number of events shown in the summary
pub const DEFAULT_TOP_ISSUES: usize = 3;

/// A feedback event with its position in the analyzer's list
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankedEvent<'a> {
    pub index: usize,
    pub event: &'a FeedbackEvent,
}

/// Up to `k` events, most urgent first
///
/// Ordered by severity rank, then confidence descending (missing counts as 0).
/// The sort is stable so ties keep analyzer order. `events` is not modified.
pub fn rank_top(events: &[FeedbackEvent], k: usize) -> Vec<RankedEvent<'_>> {
    let mut ranked: Vec<RankedEvent<'_>> = events
        .iter()
        .enumerate()
        .map(|(index, event)| RankedEvent { index, event })
        .collect();

    ranked.sort_by(|a, b| {
        a.event
            .severity
            .rank()
            .cmp(&b.event.severity.rank())
            .then_with(|| {
                b.event
                    .confidence_or_zero()
                    .total_cmp(&a.event.confidence_or_zero())
            })
    });

    ranked.truncate(k);
    ranked
}
