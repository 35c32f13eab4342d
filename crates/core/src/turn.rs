//! Conversation turn service
//!
//! Sequences one turn through the pipeline: extract, resolve, dispatch.
//! Turns from the same user are strictly serialised so two in-flight
//! actions can never race on the same calendar state.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, info, Instrument};
use uuid::Uuid;
use voxcal_domain::constants::MAX_CONTEXT_EVENTS;
use voxcal_domain::{
    ActionResult, CalendarAction, CalendarEvent, Resolution, Result, TimeRange, Utterance,
};

use crate::dispatcher::Dispatcher;
use crate::ports::{CalendarGateway, IntentExtractor};
use crate::resolver::ActionResolver;

/// Lookback/lookahead of the context window handed to the extractor.
const CONTEXT_LOOKBACK_HOURS: i64 = 24;
const CONTEXT_LOOKAHEAD_DAYS: i64 = 7;

/// What one turn produced. The resolved action is handed back so the
/// conversation loop can re-dispatch it once the user confirms.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub result: ActionResult,
    /// Present when the turn got as far as a fully resolved action.
    pub action: Option<CalendarAction>,
}

/// Runs one conversation turn end to end.
pub struct TurnService {
    extractor: Arc<dyn IntentExtractor>,
    gateway: Arc<dyn CalendarGateway>,
    resolver: ActionResolver,
    dispatcher: Dispatcher,
    /// Serialises turns; held across the whole extract-resolve-dispatch
    /// sequence.
    turn_lock: tokio::sync::Mutex<()>,
}

impl TurnService {
    pub fn new(extractor: Arc<dyn IntentExtractor>, gateway: Arc<dyn CalendarGateway>) -> Self {
        Self {
            extractor,
            gateway: gateway.clone(),
            resolver: ActionResolver::new(gateway.clone()),
            dispatcher: Dispatcher::new(gateway),
            turn_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Process one utterance. `pending` carries the action a previous
    /// clarification question blocked on, if any.
    pub async fn process(
        &self,
        utterance: &Utterance,
        pending: Option<&CalendarAction>,
    ) -> Result<TurnOutcome> {
        let _turn = self.turn_lock.lock().await;
        let turn_id = Uuid::new_v4();
        let span = tracing::info_span!("turn", %turn_id);

        async {
            let now = utterance.received_at;
            let context = self.context_events(now).await?;
            debug!(context_events = context.len(), "extracted calendar context");

            let mut draft = self.extractor.extract(utterance, now, &context, pending).await?;
            info!(
                verb = draft.kind.verb(),
                confidence = draft.confidence,
                "intent extracted"
            );

            if draft.timezone.is_none() {
                draft.timezone = utterance.timezone.clone();
            }
            if draft.idempotency_key.is_none() {
                draft.idempotency_key = Some(idempotency_key(utterance));
            }

            match self.resolver.resolve(draft, now).await? {
                Resolution::Resolved(action) => {
                    let result = self.dispatcher.dispatch(&action).await?;
                    Ok(TurnOutcome { result, action: Some(action) })
                }
                Resolution::NeedsClarification(request) => {
                    info!(question = %request.question, "clarification needed");
                    Ok(TurnOutcome { result: ActionResult::Clarify(request), action: None })
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Re-dispatch an action the user has explicitly confirmed. The
    /// conversation loop calls this after echoing the action back and
    /// reading an affirmative reply.
    pub async fn confirm(&self, mut action: CalendarAction) -> Result<ActionResult> {
        let _turn = self.turn_lock.lock().await;
        action.confirmed = true;
        self.dispatcher.dispatch(&action).await
    }

    /// Bounded window of recent and upcoming events used as disambiguation
    /// context for the extractor. One page is enough; the cap bounds
    /// prompt size.
    async fn context_events(&self, now: DateTime<Utc>) -> Result<Vec<CalendarEvent>> {
        let range = TimeRange::new(
            now - Duration::hours(CONTEXT_LOOKBACK_HOURS),
            now + Duration::days(CONTEXT_LOOKAHEAD_DAYS),
        );
        let page = self.gateway.query(range, None, None).await?;
        let mut events = page.events;
        events.truncate(MAX_CONTEXT_EVENTS);
        Ok(events)
    }
}

/// Client-generated token tying retried dispatches of the same request
/// together: hash of the utterance text and its timestamp.
fn idempotency_key(utterance: &Utterance) -> String {
    let mut hasher = Sha256::new();
    hasher.update(utterance.text.as_bytes());
    hasher.update(utterance.received_at.timestamp().to_be_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..32].to_string()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn idempotency_key_is_stable_per_utterance() {
        let at = Utc.with_ymd_and_hms(2024, 6, 10, 13, 0, 0).single().expect("valid");
        let a = Utterance::new("schedule lunch tomorrow", at);
        let b = Utterance::new("schedule lunch tomorrow", at);
        assert_eq!(idempotency_key(&a), idempotency_key(&b));
    }

    #[test]
    fn idempotency_key_differs_across_turns() {
        let first = Utterance::new(
            "schedule lunch tomorrow",
            Utc.with_ymd_and_hms(2024, 6, 10, 13, 0, 0).single().expect("valid"),
        );
        let later = Utterance::new(
            "schedule lunch tomorrow",
            Utc.with_ymd_and_hms(2024, 6, 10, 13, 5, 0).single().expect("valid"),
        );
        assert_ne!(idempotency_key(&first), idempotency_key(&later));
    }
}
