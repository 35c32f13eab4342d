//! Google Calendar gateway
//!
//! Thin retrying adapter over the Calendar v3 API. All retry/backoff policy
//! lives in the shared [`HttpClient`]; this module maps wire formats and
//! HTTP statuses onto the domain model, and enforces optimistic concurrency
//! by sending the caller's last-known etag as `If-Match`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::{Method, Response};
use tracing::{debug, warn};
use voxcal_core::CalendarGateway;
use voxcal_domain::{
    CalendarEvent, EventDraft, EventPage, EventPatch, Result, TimeRange, TimeSpec, VoxCalError,
};

use crate::http::HttpClient;

use super::auth::GoogleAuthManager;
use super::types::{
    GoogleAttendeeWrite, GoogleCalendarMeta, GoogleEvent, GoogleEventTimeWrite, GoogleEventWrite,
    GoogleEventsResponse, GoogleExtendedPropertiesWrite, IDEMPOTENCY_PROPERTY,
};

const GOOGLE_CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Page size requested from the events list endpoint.
const PAGE_SIZE: usize = 50;

/// Google Calendar implementation of the calendar gateway port.
pub struct GoogleCalendarGateway {
    http: HttpClient,
    auth: GoogleAuthManager,
    calendar_id: String,
    api_base: String,
}

impl GoogleCalendarGateway {
    pub fn new(http: HttpClient, auth: GoogleAuthManager, calendar_id: impl Into<String>) -> Self {
        Self {
            http,
            auth,
            calendar_id: calendar_id.into(),
            api_base: GOOGLE_CALENDAR_API_BASE.to_string(),
        }
    }

    /// Override the API base URL (for testing against a mock server).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    fn events_url(&self) -> String {
        format!("{}/calendars/{}/events", self.api_base, self.calendar_id)
    }

    fn event_url(&self, event_id: &str) -> String {
        format!("{}/{}", self.events_url(), event_id)
    }

    async fn parse_event_response(&self, context: &str, response: Response) -> Result<CalendarEvent> {
        if !response.status().is_success() {
            return Err(error_from_response(context, response).await);
        }
        let event: GoogleEvent = response.json().await.map_err(|e| {
            VoxCalError::InvalidInput(format!("failed to parse {context} response: {e}"))
        })?;
        event.into_domain()
    }
}

#[async_trait]
impl CalendarGateway for GoogleCalendarGateway {
    async fn create(
        &self,
        draft: &EventDraft,
        idempotency_key: Option<&str>,
    ) -> Result<CalendarEvent> {
        let token = self.auth.access_token().await?;

        let extended_properties = idempotency_key.map(|key| GoogleExtendedPropertiesWrite {
            private: HashMap::from([(IDEMPOTENCY_PROPERTY.to_string(), key.to_string())]),
        });

        let body = GoogleEventWrite {
            summary: Some(draft.title.clone()),
            description: draft.description.clone(),
            start: Some(write_time(draft.start, draft.timezone.as_deref())),
            end: Some(write_time(draft.end, draft.timezone.as_deref())),
            attendees: attendees_write(&draft.attendees),
            extended_properties,
        };

        debug!(calendar_id = %self.calendar_id, title = %draft.title, "creating event");

        let request =
            self.http.request(Method::POST, self.events_url()).bearer_auth(token).json(&body);
        let response = self.http.send(request).await?;
        self.parse_event_response("create", response).await
    }

    async fn update(
        &self,
        event_id: &str,
        patch: &EventPatch,
        expected_version: &str,
    ) -> Result<CalendarEvent> {
        let token = self.auth.access_token().await?;

        let body = GoogleEventWrite {
            summary: patch.title.clone(),
            description: patch.description.clone(),
            start: patch_time(&patch.start)?,
            end: patch_time(&patch.end)?,
            attendees: patch.attendees.as_deref().and_then(attendees_write),
            extended_properties: None,
        };

        debug!(event_id, "patching event");

        let request = self
            .http
            .request(Method::PATCH, self.event_url(event_id))
            .bearer_auth(token)
            .header(reqwest::header::IF_MATCH, expected_version)
            .json(&body);
        let response = self.http.send(request).await?;
        self.parse_event_response("update", response).await
    }

    async fn delete(&self, event_id: &str, expected_version: &str) -> Result<()> {
        let token = self.auth.access_token().await?;

        debug!(event_id, "deleting event");

        let request = self
            .http
            .request(Method::DELETE, self.event_url(event_id))
            .bearer_auth(token)
            .header(reqwest::header::IF_MATCH, expected_version);
        let response = self.http.send(request).await?;

        if response.status().is_success() {
            return Ok(());
        }
        Err(error_from_response("delete", response).await)
    }

    async fn query(
        &self,
        range: TimeRange,
        text_filter: Option<&str>,
        page_token: Option<&str>,
    ) -> Result<EventPage> {
        let token = self.auth.access_token().await?;

        let mut params: Vec<(&str, String)> = vec![
            ("timeMin", range.start.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("timeMax", range.end.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
            ("maxResults", PAGE_SIZE.to_string()),
        ];
        if let Some(needle) = text_filter {
            params.push(("q", needle.to_string()));
        }
        if let Some(cursor) = page_token {
            params.push(("pageToken", cursor.to_string()));
        }

        let request =
            self.http.request(Method::GET, self.events_url()).bearer_auth(token).query(&params);
        let response = self.http.send(request).await?;

        if !response.status().is_success() {
            return Err(error_from_response("query", response).await);
        }

        let body: GoogleEventsResponse = response
            .json()
            .await
            .map_err(|e| VoxCalError::InvalidInput(format!("failed to parse query response: {e}")))?;

        let events = body
            .items
            .into_iter()
            .filter_map(|event| match event.into_domain() {
                Ok(event) => Some(event),
                Err(err) => {
                    // Provider data is canonical; skip what we cannot read.
                    warn!(error = %err, "skipping unreadable calendar event");
                    None
                }
            })
            .collect();

        Ok(EventPage { events, next_page_token: body.next_page_token })
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<CalendarEvent>> {
        let token = self.auth.access_token().await?;

        let params: Vec<(&str, String)> = vec![
            ("privateExtendedProperty", format!("{IDEMPOTENCY_PROPERTY}={key}")),
            ("maxResults", "1".to_string()),
        ];

        let request =
            self.http.request(Method::GET, self.events_url()).bearer_auth(token).query(&params);
        let response = self.http.send(request).await?;

        if !response.status().is_success() {
            return Err(error_from_response("idempotency lookup", response).await);
        }

        let body: GoogleEventsResponse = response.json().await.map_err(|e| {
            VoxCalError::InvalidInput(format!("failed to parse lookup response: {e}"))
        })?;

        match body.items.into_iter().next() {
            Some(event) => Ok(Some(event.into_domain()?)),
            None => Ok(None),
        }
    }

    async fn primary_timezone(&self) -> Result<String> {
        let token = self.auth.access_token().await?;

        let url = format!("{}/calendars/{}", self.api_base, self.calendar_id);
        let request = self.http.request(Method::GET, url).bearer_auth(token);
        let response = self.http.send(request).await?;

        if !response.status().is_success() {
            return Err(error_from_response("calendar metadata", response).await);
        }

        let meta: GoogleCalendarMeta = response.json().await.map_err(|e| {
            VoxCalError::InvalidInput(format!("failed to parse calendar metadata: {e}"))
        })?;

        meta.time_zone.ok_or_else(|| {
            VoxCalError::InvalidInput(format!("calendar {} reports no timezone", self.calendar_id))
        })
    }
}

fn write_time(
    instant: chrono::DateTime<chrono::Utc>,
    timezone: Option<&str>,
) -> GoogleEventTimeWrite {
    GoogleEventTimeWrite {
        date_time: instant.to_rfc3339_opts(SecondsFormat::Secs, true),
        time_zone: timezone.map(str::to_string),
    }
}

/// Patched times must already be absolute; a relative spec this deep is a
/// resolver defect.
fn patch_time(spec: &Option<TimeSpec>) -> Result<Option<GoogleEventTimeWrite>> {
    match spec {
        None => Ok(None),
        Some(spec) => match spec.as_absolute() {
            Some(instant) => Ok(Some(GoogleEventTimeWrite {
                date_time: instant.to_rfc3339_opts(SecondsFormat::Secs, true),
                time_zone: None,
            })),
            None => Err(VoxCalError::Internal("unresolved time reached the gateway".into())),
        },
    }
}

fn attendees_write(attendees: &[String]) -> Option<Vec<GoogleAttendeeWrite>> {
    if attendees.is_empty() {
        return None;
    }
    Some(attendees.iter().map(|email| GoogleAttendeeWrite { email: email.clone() }).collect())
}

async fn error_from_response(context: &str, response: Response) -> VoxCalError {
    let status = response.status();
    let body = response.text().await.unwrap_or_else(|_| "unknown error".to_string());

    match status.as_u16() {
        401 | 403 => VoxCalError::Auth(format!("{context} rejected ({status}): {body}")),
        404 | 410 => VoxCalError::NotFound(format!("{context}: event not found ({status})")),
        409 | 412 => VoxCalError::Conflict(format!("{context}: version token mismatch ({status})")),
        429 => VoxCalError::Network(format!("{context}: rate limited after retries")),
        500..=599 => VoxCalError::Network(format!("{context} failed ({status}): {body}")),
        _ => VoxCalError::InvalidInput(format!("{context} failed ({status}): {body}")),
    }
}
