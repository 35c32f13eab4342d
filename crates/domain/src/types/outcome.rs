//! Turn outcome types
//!
//! A clarification is a normal control-flow outcome requiring another user
//! turn, never an error.

use serde::{Deserialize, Serialize};

use super::action::CalendarAction;
use super::event::EventSummary;

/// Question back to the user plus the partially-resolved action it blocks
/// on. The lifecycle ends when the next utterance supplies the missing
/// field and re-enters the resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClarificationRequest {
    pub question: String,
    pub pending: CalendarAction,
    /// Candidate events when the question is "which one did you mean?".
    #[serde(default)]
    pub candidates: Vec<EventSummary>,
}

impl ClarificationRequest {
    pub fn new(question: impl Into<String>, pending: CalendarAction) -> Self {
        Self { question: question.into(), pending, candidates: Vec::new() }
    }

    pub fn with_candidates(mut self, candidates: Vec<EventSummary>) -> Self {
        self.candidates = candidates;
        self
    }
}

/// Outcome of resolving an action draft against live calendar state.
#[derive(Debug, Clone)]
pub enum Resolution {
    Resolved(CalendarAction),
    NeedsClarification(ClarificationRequest),
}

/// Terminal result of one conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionResult {
    /// The action was executed. Queries report here with no event id.
    Applied { event_id: Option<String>, summary: String },
    /// The action was refused; nothing touched the calendar.
    Rejected { reason: String },
    /// Another user turn is needed before anything can execute.
    Clarify(ClarificationRequest),
}

impl ActionResult {
    pub fn rejected(reason: impl Into<String>) -> Self {
        ActionResult::Rejected { reason: reason.into() }
    }
}
