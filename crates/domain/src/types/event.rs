//! Calendar event types
//!
//! Events are owned by the remote calendar service; the core never caches
//! them beyond the current turn, so every resolution re-queries live state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An event as read from the calendar gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub attendees: Vec<String>,
    /// Opaque last-known version token (provider etag), used for
    /// optimistic-concurrency checks on every mutation.
    pub version: String,
    #[serde(default)]
    pub html_link: Option<String>,
}

/// Fields needed to create a new event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDraft {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub attendees: Vec<String>,
    /// IANA zone the event should display in.
    #[serde(default)]
    pub timezone: Option<String>,
}

/// Half-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}

/// One page of query results. Callers that only need "the next matching
/// event" stop requesting pages as soon as they are satisfied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventPage {
    pub events: Vec<CalendarEvent>,
    pub next_page_token: Option<String>,
}

/// Compact event reference used in clarification candidate lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSummary {
    pub id: String,
    pub title: String,
    pub start: DateTime<Utc>,
}

impl From<&CalendarEvent> for EventSummary {
    fn from(event: &CalendarEvent) -> Self {
        Self { id: event.id.clone(), title: event.title.clone(), start: event.start }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn time_range_is_half_open() {
        let start = Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).single().expect("valid");
        let end = Utc.with_ymd_and_hms(2024, 6, 10, 10, 0, 0).single().expect("valid");
        let range = TimeRange::new(start, end);

        assert!(range.contains(start));
        assert!(range.contains(start + chrono::Duration::minutes(59)));
        assert!(!range.contains(end));
    }

    #[test]
    fn summary_borrows_identity_from_event() {
        let event = CalendarEvent {
            id: "evt-1".into(),
            title: "Standup".into(),
            description: None,
            start: Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).single().expect("valid"),
            end: Utc.with_ymd_and_hms(2024, 6, 10, 9, 15, 0).single().expect("valid"),
            attendees: vec![],
            version: "\"etag-1\"".into(),
            html_link: None,
        };

        let summary = EventSummary::from(&event);
        assert_eq!(summary.id, "evt-1");
        assert_eq!(summary.title, "Standup");
        assert_eq!(summary.start, event.start);
    }
}
