//! Which feedback event is relevant at the current playback position

use chrono::{DateTime, Utc};
use formcheck_common::FeedbackEvent;
use serde::{Deserialize, Serialize};

use super::timestamp::{IntervalEnd, TimeInterval};

/// Symmetric window around a cue point during passive playback
pub const DEFAULT_POINT_TOLERANCE_SECS: f64 = 3.0;

/// Manual selection of a feedback event, honored until `expires_at`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionOverride {
    pub index: usize,
    pub expires_at: DateTime<Utc>,
}

impl SelectionOverride {
    /// Still in force at `now`
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Why an event was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationSource {
    /// User jump in force
    Selection,
    /// Playback position falls within the event's interval
    Playback,
}

/// The event to caption this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveEvent<'a> {
    pub index: usize,
    pub event: &'a FeedbackEvent,
    pub source: ActivationSource,
}

/// Is an interval active at `current_time`?
///
/// Ranges are inclusive at both ends; cue points use a strict symmetric
/// tolerance; global intervals are always active.
pub fn is_active(interval: &TimeInterval, current_time: f64, point_tolerance_secs: f64) -> bool {
    if interval.is_global {
        return true;
    }

    match interval.end {
        IntervalEnd::At(end) => current_time >= interval.start_sec && current_time <= end,
        IntervalEnd::Open => (current_time - interval.start_sec).abs() < point_tolerance_secs,
    }
}

/// Pick the event to caption
///
/// A live selection with a valid index wins. Otherwise the first event in
/// analyzer order whose interval is active. `intervals` is parallel to `events`.
pub fn select_active<'a>(
    events: &'a [FeedbackEvent],
    intervals: &[TimeInterval],
    current_time: f64,
    selection: Option<SelectionOverride>,
    now: DateTime<Utc>,
    point_tolerance_secs: f64,
) -> Option<ActiveEvent<'a>> {
    if let Some(selection) = selection.filter(|s| s.is_live(now)) {
        if let Some(event) = events.get(selection.index) {
            return Some(ActiveEvent {
                index: selection.index,
                event,
                source: ActivationSource::Selection,
            });
        }
    }

    events
        .iter()
        .zip(intervals)
        .position(|(_, interval)| is_active(interval, current_time, point_tolerance_secs))
        .map(|index| ActiveEvent {
            index,
            event: &events[index],
            source: ActivationSource::Playback,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::timestamp::parse;
    use chrono::Duration;

    fn event(issue: &str, time: &str) -> FeedbackEvent {
        FeedbackEvent {
            body_part: "Knees".to_string(),
            issue: issue.to_string(),
            time_expression: Some(time.to_string()),
            ..Default::default()
        }
    }

    fn intervals(events: &[FeedbackEvent]) -> Vec<TimeInterval> {
        events
            .iter()
            .map(|e| parse(e.time_expression.as_deref(), 120.0))
            .collect()
    }

    #[test]
    fn test_range_is_inclusive() {
        let interval = parse(Some("00:10-00:20"), 120.0);
        let tol = DEFAULT_POINT_TOLERANCE_SECS;
        assert!(is_active(&interval, 10.0, tol));
        assert!(is_active(&interval, 20.0, tol));
        assert!(is_active(&interval, 15.5, tol));
        assert!(!is_active(&interval, 9.999, tol));
        assert!(!is_active(&interval, 20.001, tol));
    }

    #[test]
    fn test_point_tolerance_is_strict() {
        let interval = parse(Some("01:05"), 120.0);
        let tol = DEFAULT_POINT_TOLERANCE_SECS;
        assert!(!is_active(&interval, 62.0, tol));
        assert!(is_active(&interval, 63.0, tol));
        assert!(is_active(&interval, 65.0, tol));
        assert!(is_active(&interval, 67.0, tol));
        assert!(!is_active(&interval, 68.0, tol));
    }

    #[test]
    fn test_global_always_active() {
        let interval = parse(Some("throughout video"), 120.0);
        assert!(is_active(&interval, 0.0, 3.0));
        assert!(is_active(&interval, 1_000.0, 3.0));
    }

    #[test]
    fn test_first_active_in_list_order_wins() {
        let events = vec![
            event("late", "00:30-00:40"),
            event("early", "00:05-00:35"),
            event("also", "00:32"),
        ];
        let parsed = intervals(&events);
        let now = Utc::now();

        let active = select_active(&events, &parsed, 33.0, None, now, 3.0).unwrap();
        assert_eq!(active.index, 0);
        assert_eq!(active.source, ActivationSource::Playback);

        let active = select_active(&events, &parsed, 10.0, None, now, 3.0).unwrap();
        assert_eq!(active.index, 1);

        assert!(select_active(&events, &parsed, 100.0, None, now, 3.0).is_none());
    }

    #[test]
    fn test_live_selection_overrides_playback() {
        let events = vec![event("a", "00:05"), event("b", "01:00")];
        let parsed = intervals(&events);
        let now = Utc::now();
        let selection = SelectionOverride {
            index: 1,
            expires_at: now + Duration::seconds(5),
        };

        let active = select_active(&events, &parsed, 5.0, Some(selection), now, 3.0).unwrap();
        assert_eq!(active.index, 1);
        assert_eq!(active.source, ActivationSource::Selection);
    }

    #[test]
    fn test_expired_selection_falls_back() {
        let events = vec![event("a", "00:05"), event("b", "01:00")];
        let parsed = intervals(&events);
        let t0 = Utc::now();
        let selection = SelectionOverride {
            index: 1,
            expires_at: t0 + Duration::seconds(5),
        };

        let at = |ms: i64| t0 + Duration::milliseconds(ms);
        let honored = select_active(&events, &parsed, 5.0, Some(selection), at(4_900), 3.0).unwrap();
        assert_eq!(honored.index, 1);

        let fallback = select_active(&events, &parsed, 5.0, Some(selection), at(5_100), 3.0).unwrap();
        assert_eq!(fallback.index, 0);
        assert_eq!(fallback.source, ActivationSource::Playback);
    }

    #[test]
    fn test_selection_with_stale_index_is_ignored() {
        let events = vec![event("a", "00:05")];
        let parsed = intervals(&events);
        let now = Utc::now();
        let selection = SelectionOverride {
            index: 7,
            expires_at: now + Duration::seconds(5),
        };

        let active = select_active(&events, &parsed, 5.0, Some(selection), now, 3.0).unwrap();
        assert_eq!(active.index, 0);
    }
}
