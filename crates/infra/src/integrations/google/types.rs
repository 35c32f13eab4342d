//! Google Calendar API wire types

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use voxcal_domain::{CalendarEvent, VoxCalError};

/// Name of the private extended property carrying the idempotency key.
pub const IDEMPOTENCY_PROPERTY: &str = "voxcalIdempotencyKey";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GoogleEventsResponse {
    #[serde(default)]
    pub items: Vec<GoogleEvent>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GoogleEvent {
    pub id: String,
    pub etag: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub start: GoogleEventTime,
    pub end: GoogleEventTime,
    pub attendees: Option<Vec<GoogleAttendee>>,
    pub html_link: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GoogleEventTime {
    pub date_time: Option<String>,
    /// Set instead of `dateTime` for all-day events.
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GoogleAttendee {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GoogleCalendarMeta {
    pub time_zone: Option<String>,
}

/// Write-side event payload (create and patch).
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GoogleEventWrite {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<GoogleEventTimeWrite>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<GoogleEventTimeWrite>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendees: Option<Vec<GoogleAttendeeWrite>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extended_properties: Option<GoogleExtendedPropertiesWrite>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GoogleEventTimeWrite {
    pub date_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct GoogleAttendeeWrite {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct GoogleExtendedPropertiesWrite {
    pub private: HashMap<String, String>,
}

impl GoogleEvent {
    /// Map the wire event into the domain model. Events whose timestamps
    /// cannot be parsed are data errors from the provider.
    pub fn into_domain(self) -> Result<CalendarEvent, VoxCalError> {
        let start = parse_event_time(&self.start, &self.id)?;
        let end = parse_event_time(&self.end, &self.id)?;

        let attendees = self
            .attendees
            .map(|list| {
                list.into_iter()
                    .filter_map(|a| {
                        let trimmed = a.email.trim();
                        if trimmed.is_empty() {
                            warn!(event_id = %self.id, "empty attendee email");
                            None
                        } else {
                            Some(trimmed.to_string())
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(CalendarEvent {
            id: self.id,
            title: self.summary.filter(|s| !s.trim().is_empty()).unwrap_or_else(|| "(untitled)".to_string()),
            description: self.description,
            start,
            end,
            attendees,
            version: self.etag,
            html_link: self.html_link,
        })
    }
}

fn parse_event_time(time: &GoogleEventTime, event_id: &str) -> Result<DateTime<Utc>, VoxCalError> {
    if let Some(date_time) = &time.date_time {
        return DateTime::parse_from_rfc3339(date_time)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                VoxCalError::InvalidInput(format!("bad event time for {event_id}: {e}"))
            });
    }
    // All-day events carry a bare date; midnight UTC is close enough for
    // window matching.
    if let Some(date) = &time.date {
        let naive = chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|e| VoxCalError::InvalidInput(format!("bad event date for {event_id}: {e}")))?;
        return naive
            .and_hms_opt(0, 0, 0)
            .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
            .ok_or_else(|| VoxCalError::InvalidInput(format!("bad event date for {event_id}")));
    }
    Err(VoxCalError::InvalidInput(format!("event {event_id} has no start/end time")))
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_timed_event_into_domain() {
        let event: GoogleEvent = serde_json::from_value(serde_json::json!({
            "id": "evt-1",
            "etag": "\"etag-3\"",
            "summary": "Standup",
            "start": { "dateTime": "2024-06-10T09:30:00-04:00" },
            "end": { "dateTime": "2024-06-10T09:45:00-04:00" },
            "attendees": [{ "email": "maria@example.com" }, { "email": "  " }],
            "htmlLink": "https://calendar.google.com/event?eid=abc"
        }))
        .expect("valid wire event");

        let domain = event.into_domain().expect("should map");
        assert_eq!(domain.id, "evt-1");
        assert_eq!(domain.version, "\"etag-3\"");
        assert_eq!(domain.attendees, vec!["maria@example.com".to_string()]);
        assert_eq!(domain.start.to_rfc3339(), "2024-06-10T13:30:00+00:00");
    }

    #[test]
    fn maps_all_day_event_to_midnight() {
        let event: GoogleEvent = serde_json::from_value(serde_json::json!({
            "id": "evt-2",
            "etag": "\"etag-1\"",
            "summary": "Conference",
            "start": { "date": "2024-06-12" },
            "end": { "date": "2024-06-13" }
        }))
        .expect("valid wire event");

        let domain = event.into_domain().expect("should map");
        assert_eq!(domain.start.to_rfc3339(), "2024-06-12T00:00:00+00:00");
    }

    #[test]
    fn missing_times_are_rejected() {
        let event: GoogleEvent = serde_json::from_value(serde_json::json!({
            "id": "evt-3",
            "etag": "\"etag-1\"",
            "start": {},
            "end": {}
        }))
        .expect("valid wire event");

        assert!(event.into_domain().is_err());
    }

    #[test]
    fn untitled_events_get_placeholder() {
        let event: GoogleEvent = serde_json::from_value(serde_json::json!({
            "id": "evt-4",
            "etag": "\"etag-1\"",
            "summary": "   ",
            "start": { "dateTime": "2024-06-10T09:00:00Z" },
            "end": { "dateTime": "2024-06-10T10:00:00Z" }
        }))
        .expect("valid wire event");

        assert_eq!(event.into_domain().expect("should map").title, "(untitled)");
    }
}
