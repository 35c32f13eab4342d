//! Port interfaces for the calendar pipeline
//!
//! These traits define the boundaries between core business logic
//! and infrastructure implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use voxcal_domain::{
    CalendarAction, CalendarEvent, EventDraft, EventPage, EventPatch, Result, TimeRange, Utterance,
};

/// Trait for the calendar provider adapter.
///
/// Mutating calls carry the event's last-known version token and fail with
/// `Conflict` when the remote version differs, so a calendar that changed
/// since it was last queried is never blindly overwritten. Retry/backoff
/// for transient transport failures lives inside the implementation.
#[async_trait]
pub trait CalendarGateway: Send + Sync {
    /// Create a new event. The idempotency key, when given, is stored with
    /// the event so a retried create can be detected.
    async fn create(
        &self,
        draft: &EventDraft,
        idempotency_key: Option<&str>,
    ) -> Result<CalendarEvent>;

    /// Patch an existing event. `expected_version` is the version token the
    /// caller last saw for this event.
    async fn update(
        &self,
        event_id: &str,
        patch: &EventPatch,
        expected_version: &str,
    ) -> Result<CalendarEvent>;

    /// Delete an event, guarded by its last-known version token.
    async fn delete(&self, event_id: &str, expected_version: &str) -> Result<()>;

    /// Fetch one page of events in the range, ordered by start time.
    /// Callers stop requesting pages as soon as they are satisfied.
    async fn query(
        &self,
        range: TimeRange,
        text_filter: Option<&str>,
        page_token: Option<&str>,
    ) -> Result<EventPage>;

    /// Look up an event previously created with the given idempotency key.
    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<CalendarEvent>>;

    /// IANA timezone of the account's primary calendar.
    async fn primary_timezone(&self) -> Result<String>;
}

/// Trait for deriving a structured action draft from an utterance.
#[async_trait]
pub trait IntentExtractor: Send + Sync {
    /// Single model round trip: utterance + current time + a bounded window
    /// of recent events in, `CalendarAction` draft out. `pending` carries
    /// the blocked action when this utterance answers a clarification
    /// question. Unparseable model output fails with `Extraction`.
    async fn extract(
        &self,
        utterance: &Utterance,
        current_time: DateTime<Utc>,
        recent_events: &[CalendarEvent],
        pending: Option<&CalendarAction>,
    ) -> Result<CalendarAction>;
}
