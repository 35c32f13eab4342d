//! Calendar action model
//!
//! A `CalendarAction` is the structured representation of what the user
//! wants done. It starts life as a draft produced by the intent extractor
//! (possibly carrying unresolved relative times and free-text targets) and
//! is progressively resolved until every ambiguous field is absolute. The
//! dispatcher only accepts resolved actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One user input turn, transcription-agnostic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Utterance {
    pub text: String,
    pub received_at: DateTime<Utc>,
    /// IANA zone the utterance should be interpreted in, when known.
    pub timezone: Option<String>,
}

impl Utterance {
    pub fn new(text: impl Into<String>, received_at: DateTime<Utc>) -> Self {
        Self { text: text.into(), received_at, timezone: None }
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }
}

/// A point in time that may still be a natural-language expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TimeSpec {
    /// Fully resolved instant.
    Absolute(DateTime<Utc>),
    /// Unresolved expression such as "tomorrow 2pm" or "next friday".
    Relative(String),
}

impl TimeSpec {
    pub fn is_absolute(&self) -> bool {
        matches!(self, TimeSpec::Absolute(_))
    }

    pub fn as_absolute(&self) -> Option<DateTime<Utc>> {
        match self {
            TimeSpec::Absolute(ts) => Some(*ts),
            TimeSpec::Relative(_) => None,
        }
    }
}

/// Reference to an existing event, free-text until resolution pins it to a
/// concrete id and version token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventTarget {
    /// What the user called it ("my 3pm meeting", "the standup").
    pub description: String,
    /// Optional time hint narrowing the search window.
    #[serde(default)]
    pub time_hint: Option<TimeSpec>,
    /// Concrete event id, set by the resolver.
    #[serde(default)]
    pub event_id: Option<String>,
    /// Last-known version token of the event, set by the resolver.
    #[serde(default)]
    pub version: Option<String>,
}

impl EventTarget {
    pub fn is_resolved(&self) -> bool {
        self.event_id.is_some() && self.version.is_some()
    }
}

/// Field changes for an Update action. `None` means "leave unchanged".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub start: Option<TimeSpec>,
    #[serde(default)]
    pub end: Option<TimeSpec>,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub attendees: Option<Vec<String>>,
}

impl EventPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.start.is_none()
            && self.end.is_none()
            && self.duration_minutes.is_none()
            && self.description.is_none()
            && self.attendees.is_none()
    }

    /// Whether applying this patch moves the event in time.
    pub fn changes_time(&self) -> bool {
        self.start.is_some() || self.end.is_some() || self.duration_minutes.is_some()
    }

    pub fn changes_attendees(&self) -> bool {
        self.attendees.is_some()
    }
}

/// Tagged variant over the four calendar operations.
///
/// This is also the wire schema the intent extractor parses model output
/// into; unknown tags or missing required fields fail the parse rather
/// than defaulting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    Create {
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        start: Option<TimeSpec>,
        #[serde(default)]
        end: Option<TimeSpec>,
        #[serde(default)]
        duration_minutes: Option<i64>,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        attendees: Vec<String>,
    },
    Update {
        target: EventTarget,
        patch: EventPatch,
    },
    Delete {
        target: EventTarget,
    },
    Query {
        #[serde(default)]
        start: Option<TimeSpec>,
        #[serde(default)]
        days_ahead: Option<u32>,
        #[serde(default)]
        text_filter: Option<String>,
    },
}

impl ActionKind {
    pub fn verb(&self) -> &'static str {
        match self {
            ActionKind::Create { .. } => "create",
            ActionKind::Update { .. } => "update",
            ActionKind::Delete { .. } => "delete",
            ActionKind::Query { .. } => "query",
        }
    }
}

/// A calendar action with its extraction metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarAction {
    pub kind: ActionKind,
    /// Extractor-assigned confidence in [0, 1].
    pub confidence: f32,
    /// Set by the conversation loop after the user explicitly approved the
    /// echoed action. Required for destructive variants.
    #[serde(default)]
    pub confirmed: bool,
    /// Client-generated token preventing duplicate creation on retry.
    #[serde(default)]
    pub idempotency_key: Option<String>,
    /// IANA zone used for time resolution and summaries. Filled by the
    /// resolver from the primary calendar when the draft omits it.
    #[serde(default)]
    pub timezone: Option<String>,
}

impl CalendarAction {
    pub fn new(kind: ActionKind, confidence: f32) -> Self {
        Self { kind, confidence, confirmed: false, idempotency_key: None, timezone: None }
    }

    /// An action is resolved iff every ambiguous field has been converted
    /// to an absolute value: all times absolute, targets pinned to an event
    /// id + version, and Create carrying title, start, and end.
    pub fn is_resolved(&self) -> bool {
        fn spec_resolved(spec: &Option<TimeSpec>) -> bool {
            spec.as_ref().map(TimeSpec::is_absolute).unwrap_or(true)
        }

        match &self.kind {
            ActionKind::Create { title, start, end, .. } => {
                title.is_some()
                    && matches!(start, Some(TimeSpec::Absolute(_)))
                    && matches!(end, Some(TimeSpec::Absolute(_)))
            }
            ActionKind::Update { target, patch } => {
                target.is_resolved() && spec_resolved(&patch.start) && spec_resolved(&patch.end)
            }
            ActionKind::Delete { target } => target.is_resolved(),
            ActionKind::Query { start, .. } => spec_resolved(start),
        }
    }

    /// Destructive or attendee-affecting actions require explicit prior
    /// user confirmation before dispatch.
    pub fn requires_confirmation(&self) -> bool {
        match &self.kind {
            ActionKind::Delete { .. } => true,
            ActionKind::Update { patch, .. } => patch.changes_time() || patch.changes_attendees(),
            ActionKind::Create { .. } | ActionKind::Query { .. } => false,
        }
    }

    /// Short echo-back text used when asking the user to confirm.
    pub fn describe(&self) -> String {
        match &self.kind {
            ActionKind::Create { title, .. } => {
                format!("create \"{}\"", title.as_deref().unwrap_or("untitled event"))
            }
            ActionKind::Update { target, .. } => format!("update \"{}\"", target.description),
            ActionKind::Delete { target } => format!("delete \"{}\"", target.description),
            ActionKind::Query { .. } => "list events".to_string(),
        }
    }
}
