//! Action resolver - turns extractor drafts into executable actions
//!
//! Resolution converts every ambiguous field (free-text target, relative
//! time) into an absolute value, re-querying live calendar state each turn.
//! When the calendar offers zero or several plausible referents the
//! resolver asks instead of guessing: calendar mutation is destructive, so
//! a silent pick among equally-plausible events is never acceptable.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::debug;
use voxcal_domain::constants::{
    CLARIFY_CONFIDENCE_THRESHOLD, DEFAULT_EVENT_DURATION_MINUTES, DEFAULT_QUERY_DAYS_AHEAD,
    TARGET_LOOKAHEAD_DAYS,
};
use voxcal_domain::utils::timeparse::{resolve_time_expression, TimeExpression};
use voxcal_domain::{
    ActionKind, CalendarAction, CalendarEvent, ClarificationRequest, EventPatch, EventSummary,
    EventTarget, Resolution, Result, TimeRange, TimeSpec, VoxCalError,
};

use crate::ports::CalendarGateway;

/// How close an event's start must be to a stated time hint to count as
/// "the 3pm meeting".
const TIME_HINT_TOLERANCE_MINUTES: i64 = 45;

/// Hard cap on result pages fetched while hunting for a target.
const MAX_TARGET_PAGES: usize = 10;

/// Resolves action drafts against live calendar state.
pub struct ActionResolver {
    gateway: Arc<dyn CalendarGateway>,
}

/// Outcome of matching a free-text target against the calendar.
enum TargetMatch {
    One(Box<CalendarEvent>),
    Clarify { question: String, candidates: Vec<EventSummary> },
}

/// Outcome of resolving one time expression.
enum SpecOutcome {
    Resolved(TimeExpression),
    Unparseable(String),
}

impl ActionResolver {
    pub fn new(gateway: Arc<dyn CalendarGateway>) -> Self {
        Self { gateway }
    }

    /// Validate a draft against the calendar, producing either a fully
    /// resolved action or a clarification request.
    pub async fn resolve(&self, draft: CalendarAction, now: DateTime<Utc>) -> Result<Resolution> {
        // The extractor flagging its own uncertainty overrides structural
        // completeness: prefer asking over guessing.
        if draft.confidence < CLARIFY_CONFIDENCE_THRESHOLD {
            let question = format!(
                "I'm not confident I understood. Did you want me to {}?",
                draft.describe()
            );
            return Ok(Resolution::NeedsClarification(ClarificationRequest::new(question, draft)));
        }

        let tz = self.timezone_for(&draft).await?;
        let local_now = now.with_timezone(&tz);

        let mut action = draft;
        action.timezone = Some(tz.name().to_string());

        match action.kind.clone() {
            ActionKind::Create { title, start, end, duration_minutes, description, attendees } => {
                self.resolve_create(
                    action,
                    title,
                    start,
                    end,
                    duration_minutes,
                    description,
                    attendees,
                    local_now,
                )
            }
            ActionKind::Update { target, patch } => {
                self.resolve_update(action, target, patch, local_now).await
            }
            ActionKind::Delete { target } => self.resolve_delete(action, target, local_now).await,
            ActionKind::Query { start, days_ahead, text_filter } => {
                self.resolve_query(action, start, days_ahead, text_filter, local_now)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_create(
        &self,
        mut action: CalendarAction,
        title: Option<String>,
        start: Option<TimeSpec>,
        end: Option<TimeSpec>,
        duration_minutes: Option<i64>,
        description: Option<String>,
        attendees: Vec<String>,
        local_now: DateTime<Tz>,
    ) -> Result<Resolution> {
        let Some(title) = title else {
            return Ok(clarify("What should I call the event?", action));
        };

        let Some(start_spec) = start else {
            return Ok(clarify(format!("When should \"{title}\" start?"), action));
        };

        let start_at = match resolve_spec(&start_spec, local_now) {
            SpecOutcome::Resolved(expr) if expr.has_time_of_day => expr.instant,
            SpecOutcome::Resolved(expr) => {
                let day = expr.instant.format("%b %-d");
                return Ok(clarify(format!("What time on {day} should \"{title}\" start?"), action));
            }
            SpecOutcome::Unparseable(raw) => {
                return Ok(clarify(
                    format!("I couldn't make out the time \"{raw}\". When did you mean?"),
                    action,
                ));
            }
        };

        let end_at = match end {
            Some(end_spec) => match resolve_spec(&end_spec, local_now) {
                SpecOutcome::Resolved(expr) => expr.instant,
                SpecOutcome::Unparseable(raw) => {
                    return Ok(clarify(
                        format!("I couldn't make out the end time \"{raw}\". When should it end?"),
                        action,
                    ));
                }
            },
            None => {
                let minutes = duration_minutes.unwrap_or(DEFAULT_EVENT_DURATION_MINUTES);
                start_at + Duration::minutes(minutes)
            }
        };

        if end_at <= start_at {
            return Ok(clarify(
                format!("\"{title}\" would end before it starts. When should it end?"),
                action,
            ));
        }

        action.kind = ActionKind::Create {
            title: Some(title),
            start: Some(TimeSpec::Absolute(start_at.with_timezone(&Utc))),
            end: Some(TimeSpec::Absolute(end_at.with_timezone(&Utc))),
            duration_minutes,
            description,
            attendees,
        };
        Ok(Resolution::Resolved(action))
    }

    async fn resolve_update(
        &self,
        mut action: CalendarAction,
        target: EventTarget,
        mut patch: EventPatch,
        local_now: DateTime<Tz>,
    ) -> Result<Resolution> {
        if patch.is_empty() {
            return Ok(clarify(
                format!("What should I change about \"{}\"?", target.description),
                action,
            ));
        }

        let event = match self.match_target(&target, local_now).await? {
            TargetMatch::One(event) => *event,
            TargetMatch::Clarify { question, candidates } => {
                return Ok(Resolution::NeedsClarification(
                    ClarificationRequest::new(question, action).with_candidates(candidates),
                ));
            }
        };

        // Resolve patched times; a moved start keeps the original duration
        // unless the user also gave an end or a duration.
        let new_start = match &patch.start {
            Some(spec) => match resolve_spec(spec, local_now) {
                SpecOutcome::Resolved(expr) if expr.has_time_of_day => {
                    Some(expr.instant.with_timezone(&Utc))
                }
                SpecOutcome::Resolved(expr) => {
                    let day = expr.instant.format("%b %-d");
                    return Ok(clarify(
                        format!("What time on {day} should \"{}\" move to?", event.title),
                        action,
                    ));
                }
                SpecOutcome::Unparseable(raw) => {
                    return Ok(clarify(
                        format!("I couldn't make out the time \"{raw}\". When did you mean?"),
                        action,
                    ));
                }
            },
            None => None,
        };

        let new_end = match &patch.end {
            Some(spec) => match resolve_spec(spec, local_now) {
                SpecOutcome::Resolved(expr) => Some(expr.instant.with_timezone(&Utc)),
                SpecOutcome::Unparseable(raw) => {
                    return Ok(clarify(
                        format!("I couldn't make out the end time \"{raw}\". When should it end?"),
                        action,
                    ));
                }
            },
            None => match (new_start, patch.duration_minutes) {
                (Some(start), Some(minutes)) => Some(start + Duration::minutes(minutes)),
                (Some(start), None) => Some(start + (event.end - event.start)),
                (None, Some(minutes)) => Some(event.start + Duration::minutes(minutes)),
                (None, None) => None,
            },
        };

        patch.start = new_start.map(TimeSpec::Absolute);
        patch.end = new_end.map(TimeSpec::Absolute);

        let resolved_target = EventTarget {
            description: target.description,
            time_hint: target.time_hint,
            event_id: Some(event.id),
            version: Some(event.version),
        };

        action.kind = ActionKind::Update { target: resolved_target, patch };
        Ok(Resolution::Resolved(action))
    }

    async fn resolve_delete(
        &self,
        mut action: CalendarAction,
        target: EventTarget,
        local_now: DateTime<Tz>,
    ) -> Result<Resolution> {
        let event = match self.match_target(&target, local_now).await? {
            TargetMatch::One(event) => *event,
            TargetMatch::Clarify { question, candidates } => {
                return Ok(Resolution::NeedsClarification(
                    ClarificationRequest::new(question, action).with_candidates(candidates),
                ));
            }
        };

        let resolved_target = EventTarget {
            description: target.description,
            time_hint: target.time_hint,
            event_id: Some(event.id),
            version: Some(event.version),
        };

        action.kind = ActionKind::Delete { target: resolved_target };
        Ok(Resolution::Resolved(action))
    }

    fn resolve_query(
        &self,
        mut action: CalendarAction,
        start: Option<TimeSpec>,
        days_ahead: Option<u32>,
        text_filter: Option<String>,
        local_now: DateTime<Tz>,
    ) -> Result<Resolution> {
        let start_at = match start {
            Some(spec) => match resolve_spec(&spec, local_now) {
                SpecOutcome::Resolved(expr) if expr.has_time_of_day => expr.instant,
                SpecOutcome::Resolved(expr) => start_of_day(expr.instant),
                SpecOutcome::Unparseable(raw) => {
                    return Ok(clarify(
                        format!("I couldn't make out \"{raw}\". Which day did you mean?"),
                        action,
                    ));
                }
            },
            None => start_of_day(local_now),
        };

        action.kind = ActionKind::Query {
            start: Some(TimeSpec::Absolute(start_at.with_timezone(&Utc))),
            days_ahead: Some(days_ahead.unwrap_or(DEFAULT_QUERY_DAYS_AHEAD)),
            text_filter,
        };
        Ok(Resolution::Resolved(action))
    }

    /// Find the event a free-text target refers to.
    ///
    /// Tie-break policy: exactly one candidate in the stated window wins;
    /// zero or several become a clarification.
    async fn match_target(
        &self,
        target: &EventTarget,
        local_now: DateTime<Tz>,
    ) -> Result<TargetMatch> {
        let hint = match &target.time_hint {
            Some(spec) => match resolve_spec(spec, local_now) {
                SpecOutcome::Resolved(expr) => Some(expr),
                SpecOutcome::Unparseable(raw) => {
                    return Ok(TargetMatch::Clarify {
                        question: format!(
                            "I couldn't make out the time \"{raw}\". Which event did you mean?"
                        ),
                        candidates: Vec::new(),
                    });
                }
            },
            None => None,
        };

        let window = match &hint {
            Some(expr) => {
                let day_start = start_of_day(expr.instant);
                TimeRange::new(
                    day_start.with_timezone(&Utc),
                    (day_start + Duration::days(1)).with_timezone(&Utc),
                )
            }
            None => TimeRange::new(
                local_now.with_timezone(&Utc),
                (local_now + Duration::days(TARGET_LOOKAHEAD_DAYS)).with_timezone(&Utc),
            ),
        };

        let pool = self.fetch_window(window).await?;
        debug!(
            description = %target.description,
            pool_size = pool.len(),
            "matching target against calendar window"
        );

        let tokens = meaningful_tokens(&target.description);
        let mut matches: Vec<&CalendarEvent> = if tokens.is_empty() {
            pool.iter().collect()
        } else {
            pool.iter().filter(|event| title_matches(&event.title, &tokens)).collect()
        };

        if let Some(expr) = &hint {
            if expr.has_time_of_day {
                let near: Vec<&CalendarEvent> = matches
                    .iter()
                    .copied()
                    .filter(|event| near_hint(event, expr.instant.with_timezone(&Utc)))
                    .collect();
                // "my 3pm" carries no title words; fall back to time
                // proximity over the whole window when titles filtered
                // everything out.
                matches = if near.is_empty() && !tokens.is_empty() {
                    pool.iter()
                        .filter(|event| near_hint(event, expr.instant.with_timezone(&Utc)))
                        .collect()
                } else {
                    near
                };
            }
        }

        match matches.len() {
            0 => Ok(TargetMatch::Clarify {
                question: format!(
                    "I couldn't find an event matching \"{}\". Which one did you mean?",
                    target.description
                ),
                candidates: Vec::new(),
            }),
            1 => Ok(TargetMatch::One(Box::new(matches[0].clone()))),
            _ => {
                let candidates: Vec<EventSummary> =
                    matches.iter().map(|event| EventSummary::from(*event)).collect();
                let listing = candidates
                    .iter()
                    .map(|c| {
                        format!(
                            "\"{}\" on {}",
                            c.title,
                            c.start.with_timezone(&local_now.timezone()).format("%b %-d at %-I:%M %p")
                        )
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                Ok(TargetMatch::Clarify {
                    question: format!(
                        "I found several events matching \"{}\": {}. Which one did you mean?",
                        target.description, listing
                    ),
                    candidates,
                })
            }
        }
    }

    /// Collect the window's events page by page, stopping at the page cap.
    async fn fetch_window(&self, window: TimeRange) -> Result<Vec<CalendarEvent>> {
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_TARGET_PAGES {
            let page = self.gateway.query(window, None, page_token.as_deref()).await?;
            events.extend(page.events);
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => return Ok(events),
            }
        }

        debug!(window_start = %window.start, "target window truncated at page cap");
        Ok(events)
    }

    /// Zone precedence: the action's own declared/inferred zone, else the
    /// account's primary calendar zone. Never a hardcoded default.
    async fn timezone_for(&self, action: &CalendarAction) -> Result<Tz> {
        let name = match &action.timezone {
            Some(name) => name.clone(),
            None => self.gateway.primary_timezone().await?,
        };
        Tz::from_str(&name)
            .map_err(|_| VoxCalError::InvalidInput(format!("unknown timezone: {name}")))
    }
}

fn clarify(question: impl Into<String>, pending: CalendarAction) -> Resolution {
    Resolution::NeedsClarification(ClarificationRequest::new(question, pending))
}

fn resolve_spec(spec: &TimeSpec, local_now: DateTime<Tz>) -> SpecOutcome {
    match spec {
        TimeSpec::Absolute(instant) => SpecOutcome::Resolved(TimeExpression {
            instant: instant.with_timezone(&local_now.timezone()),
            has_time_of_day: true,
        }),
        TimeSpec::Relative(raw) => match resolve_time_expression(raw, local_now) {
            Some(expr) => SpecOutcome::Resolved(expr),
            None => SpecOutcome::Unparseable(raw.clone()),
        },
    }
}

fn start_of_day(instant: DateTime<Tz>) -> DateTime<Tz> {
    let tz = instant.timezone();
    instant
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|naive| tz.from_local_datetime(&naive).earliest())
        .unwrap_or(instant)
}

fn near_hint(event: &CalendarEvent, hint: DateTime<Utc>) -> bool {
    (event.start - hint).num_minutes().abs() <= TIME_HINT_TOLERANCE_MINUTES
}

/// Words in a target description that can plausibly appear in a title.
/// Articles, prepositions, generic nouns, and time-ish words are noise.
fn meaningful_tokens(description: &str) -> Vec<String> {
    const STOPWORDS: &[&str] = &[
        "my", "the", "a", "an", "that", "this", "with", "on", "at", "for", "to", "meeting",
        "appointment", "event", "today", "tomorrow", "tonight", "next", "monday", "tuesday",
        "wednesday", "thursday", "friday", "saturday", "sunday",
    ];

    description
        .to_lowercase()
        .split_whitespace()
        .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|word| !word.is_empty())
        .filter(|word| !STOPWORDS.contains(word))
        .filter(|word| !word.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false))
        .filter(|word| *word != "am" && *word != "pm" && *word != "noon" && *word != "midnight")
        .map(str::to_string)
        .collect()
}

fn title_matches(title: &str, tokens: &[String]) -> bool {
    let title = title.to_lowercase();
    tokens.iter().any(|token| title.contains(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_drop_noise_words() {
        assert_eq!(meaningful_tokens("the Standup meeting"), vec!["standup"]);
        assert_eq!(meaningful_tokens("my 3pm meeting"), Vec::<String>::new());
        assert_eq!(meaningful_tokens("call with Maria"), vec!["call", "maria"]);
    }

    #[test]
    fn title_match_is_case_insensitive() {
        assert!(title_matches("Weekly Standup", &["standup".to_string()]));
        assert!(!title_matches("Dentist", &["standup".to_string()]));
    }
}
