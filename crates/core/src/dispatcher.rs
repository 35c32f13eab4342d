//! Dispatcher - executes resolved actions against the calendar gateway
//!
//! Applies the confirmation and idempotency policies, maps optimistic
//! concurrency conflicts to user-facing rejections, and renders the short
//! natural-language summaries echoed back to the user. Every dispatch is a
//! single atomic gateway operation; there is no multi-step rollback.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{info, warn};
use voxcal_domain::constants::{DISPATCH_MIN_CONFIDENCE, MAX_QUERY_RESULTS};
use voxcal_domain::{
    ActionKind, ActionResult, CalendarAction, CalendarEvent, EventDraft, EventPatch, Result,
    TimeRange, TimeSpec, VoxCalError,
};

use crate::ports::CalendarGateway;

/// Executes resolved calendar actions.
pub struct Dispatcher {
    gateway: Arc<dyn CalendarGateway>,
}

impl Dispatcher {
    pub fn new(gateway: Arc<dyn CalendarGateway>) -> Self {
        Self { gateway }
    }

    /// Execute a resolved action, returning the user-facing result.
    ///
    /// Policy gates run before any gateway call: a rejected action has
    /// touched nothing.
    pub async fn dispatch(&self, action: &CalendarAction) -> Result<ActionResult> {
        if !action.is_resolved() {
            return Err(VoxCalError::Internal(
                "unresolved action reached the dispatcher".to_string(),
            ));
        }

        if action.confidence < DISPATCH_MIN_CONFIDENCE {
            return Ok(ActionResult::rejected(format!(
                "confidence too low to {} without checking first",
                action.kind.verb()
            )));
        }

        if action.requires_confirmation() && !action.confirmed {
            return Ok(ActionResult::rejected(format!(
                "needs confirmation: say yes to {}",
                action.describe()
            )));
        }

        let tz = display_zone(action);

        let outcome = match &action.kind {
            ActionKind::Create { .. } => self.dispatch_create(action, &tz).await,
            ActionKind::Update { target, patch } => {
                self.dispatch_update(target_id(target)?, target_version(target)?, patch, &tz).await
            }
            ActionKind::Delete { target } => {
                self.dispatch_delete(target_id(target)?, target_version(target)?, target).await
            }
            ActionKind::Query { start, days_ahead, text_filter } => {
                self.dispatch_query(start, *days_ahead, text_filter.as_deref(), &tz).await
            }
        };

        match outcome {
            Ok(result) => Ok(result),
            // Conflict means a human (or another client) edited the event
            // since we looked; blind retry could overwrite that edit.
            Err(VoxCalError::Conflict(_)) => {
                warn!(verb = action.kind.verb(), "version token mismatch, rejecting");
                Ok(ActionResult::rejected("calendar changed, please retry"))
            }
            Err(VoxCalError::NotFound(_)) => {
                Ok(ActionResult::rejected("that event no longer exists"))
            }
            Err(other) => Err(other),
        }
    }

    async fn dispatch_create(&self, action: &CalendarAction, tz: &Tz) -> Result<ActionResult> {
        let ActionKind::Create { title, start, end, description, attendees, .. } = &action.kind
        else {
            return Err(VoxCalError::Internal("create dispatch on non-create action".into()));
        };

        let (Some(title), Some(start), Some(end)) =
            (title.clone(), absolute(start), absolute(end))
        else {
            return Err(VoxCalError::Internal("resolved create missing required fields".into()));
        };

        // A retried dispatch after a transport timeout may find the event
        // already created; one event per idempotency key.
        if let Some(key) = action.idempotency_key.as_deref() {
            if let Some(existing) = self.gateway.find_by_idempotency_key(key).await? {
                info!(event_id = %existing.id, "create already applied, returning existing event");
                return Ok(ActionResult::Applied {
                    event_id: Some(existing.id.clone()),
                    summary: format!(
                        "{} (already scheduled)",
                        event_summary(&existing.title, existing.start, tz)
                    ),
                });
            }
        }

        let draft = EventDraft {
            title,
            description: description.clone(),
            start,
            end,
            attendees: attendees.clone(),
            timezone: action.timezone.clone(),
        };

        let created = self.gateway.create(&draft, action.idempotency_key.as_deref()).await?;
        info!(event_id = %created.id, "event created");

        Ok(ActionResult::Applied {
            event_id: Some(created.id.clone()),
            summary: event_summary(&created.title, created.start, tz),
        })
    }

    async fn dispatch_update(
        &self,
        event_id: &str,
        expected_version: &str,
        patch: &EventPatch,
        tz: &Tz,
    ) -> Result<ActionResult> {
        let updated = self.gateway.update(event_id, patch, expected_version).await?;
        info!(event_id = %updated.id, "event updated");

        Ok(ActionResult::Applied {
            event_id: Some(updated.id.clone()),
            summary: format!("Updated {}", event_summary(&updated.title, updated.start, tz)),
        })
    }

    async fn dispatch_delete(
        &self,
        event_id: &str,
        expected_version: &str,
        target: &voxcal_domain::EventTarget,
    ) -> Result<ActionResult> {
        self.gateway.delete(event_id, expected_version).await?;
        info!(event_id, "event deleted");

        Ok(ActionResult::Applied {
            event_id: Some(event_id.to_string()),
            summary: format!("Deleted \"{}\"", target.description),
        })
    }

    async fn dispatch_query(
        &self,
        start: &Option<TimeSpec>,
        days_ahead: Option<u32>,
        text_filter: Option<&str>,
        tz: &Tz,
    ) -> Result<ActionResult> {
        let Some(start) = start.as_ref().and_then(TimeSpec::as_absolute) else {
            return Err(VoxCalError::Internal("resolved query missing start".into()));
        };
        let days = i64::from(days_ahead.unwrap_or(1));
        let range = TimeRange::new(start, start + chrono::Duration::days(days));

        let mut events: Vec<CalendarEvent> = Vec::new();
        let mut page_token: Option<String> = None;
        for _ in 0..MAX_QUERY_RESULTS {
            let page = self.gateway.query(range, text_filter, page_token.as_deref()).await?;
            events.extend(page.events);
            if events.len() >= MAX_QUERY_RESULTS {
                events.truncate(MAX_QUERY_RESULTS);
                break;
            }
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        let summary = render_agenda(&events, range, tz);
        Ok(ActionResult::Applied { event_id: None, summary })
    }
}

fn target_id(target: &voxcal_domain::EventTarget) -> Result<&str> {
    target
        .event_id
        .as_deref()
        .ok_or_else(|| VoxCalError::Internal("resolved target missing event id".into()))
}

fn target_version(target: &voxcal_domain::EventTarget) -> Result<&str> {
    target
        .version
        .as_deref()
        .ok_or_else(|| VoxCalError::Internal("resolved target missing version token".into()))
}

fn absolute(spec: &Option<TimeSpec>) -> Option<DateTime<Utc>> {
    spec.as_ref().and_then(TimeSpec::as_absolute)
}

/// Zone used for summary rendering. Resolution always fills the zone in;
/// UTC is only a fallback for defensively-handled drafts.
fn display_zone(action: &CalendarAction) -> Tz {
    action
        .timezone
        .as_deref()
        .and_then(|name| Tz::from_str(name).ok())
        .unwrap_or(chrono_tz::UTC)
}

/// "Call with Maria, Jun 11 2:00 PM"
fn event_summary(title: &str, start: DateTime<Utc>, tz: &Tz) -> String {
    format!("{}, {}", title, start.with_timezone(tz).format("%b %-d %-I:%M %p"))
}

fn render_agenda(events: &[CalendarEvent], range: TimeRange, tz: &Tz) -> String {
    if events.is_empty() {
        return format!(
            "No events between {} and {}",
            range.start.with_timezone(tz).format("%b %-d"),
            range.end.with_timezone(tz).format("%b %-d")
        );
    }

    let lines: Vec<String> = events
        .iter()
        .map(|event| {
            format!("- {} {}", event.start.with_timezone(tz).format("%b %-d %-I:%M %p"), event.title)
        })
        .collect();

    format!("{} event(s):\n{}", events.len(), lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono_tz::America::New_York;

    use super::*;

    #[test]
    fn summary_renders_in_local_zone() {
        let start = Utc.with_ymd_and_hms(2024, 6, 11, 18, 0, 0).single().expect("valid");
        assert_eq!(event_summary("Call with Maria", start, &New_York), "Call with Maria, Jun 11 2:00 PM");
    }

    #[test]
    fn agenda_mentions_empty_window() {
        let range = TimeRange::new(
            Utc.with_ymd_and_hms(2024, 6, 10, 4, 0, 0).single().expect("valid"),
            Utc.with_ymd_and_hms(2024, 6, 11, 4, 0, 0).single().expect("valid"),
        );
        let agenda = render_agenda(&[], range, &New_York);
        assert!(agenda.starts_with("No events"));
    }
}
