//! Anthropic Messages API client for intent extraction

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::json;
use tracing::{debug, info};
use voxcal_core::IntentExtractor;
use voxcal_domain::{CalendarAction, CalendarEvent, Result, Utterance, VoxCalError};

use crate::http::HttpClient;

use super::types::{
    ActionPayload, ContentBlock, MessageParam, MessagesRequest, MessagesResponse, ToolChoice,
    ToolDefinition,
};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Name of the single tool the model is forced to call.
const TOOL_NAME: &str = "submit_calendar_action";

/// Intent extractor backed by the Anthropic Messages API.
pub struct AnthropicExtractor {
    http: HttpClient,
    api_key: String,
    model: String,
    api_url: String,
}

impl AnthropicExtractor {
    pub fn new(api_key: String, http: HttpClient) -> Self {
        Self {
            http,
            api_key,
            model: DEFAULT_MODEL.to_string(),
            api_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the API URL (for testing against a mock server).
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    fn build_system_prompt(
        &self,
        current_time: DateTime<Utc>,
        timezone: Option<&str>,
        recent_events: &[CalendarEvent],
        pending: Option<&CalendarAction>,
    ) -> String {
        let zone = timezone.unwrap_or("UTC");
        let mut prompt = format!(
            "You are a calendar assistant. Translate the user's request into \
             exactly one calendar action via the {TOOL_NAME} tool.\n\
             Current time: {} ({zone}).\n\
             Keep relative dates like 'tomorrow' or 'next friday' as relative \
             time expressions; use absolute RFC 3339 timestamps only when the \
             user names an explicit date. Report your confidence honestly: \
             use a low value when the request is ambiguous.\n",
            current_time.to_rfc3339()
        );

        if !recent_events.is_empty() {
            prompt.push_str("\nEvents on the user's calendar:\n");
            for event in recent_events {
                prompt.push_str(&format!(
                    "- \"{}\" at {} (id: {})\n",
                    event.title,
                    event.start.to_rfc3339(),
                    event.id
                ));
            }
        }

        if let Some(pending) = pending {
            let pending_json =
                serde_json::to_string(pending).unwrap_or_else(|_| "<unserialisable>".to_string());
            prompt.push_str(&format!(
                "\nThe user is answering a clarification question about this \
                 drafted action: {pending_json}\n\
                 Merge their answer into a complete action of the same type.\n"
            ));
        }

        prompt
    }

    fn tool_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: TOOL_NAME.to_string(),
            description: "Submit the structured calendar action the user asked for.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "action": {
                        "type": "object",
                        "description": "Tagged calendar action",
                        "properties": {
                            "type": {
                                "type": "string",
                                "enum": ["create", "update", "delete", "query"]
                            },
                            "title": { "type": "string" },
                            "start": { "$ref": "#/definitions/time_spec" },
                            "end": { "$ref": "#/definitions/time_spec" },
                            "duration_minutes": { "type": "integer" },
                            "description": { "type": "string" },
                            "attendees": { "type": "array", "items": { "type": "string" } },
                            "target": {
                                "type": "object",
                                "properties": {
                                    "description": { "type": "string" },
                                    "time_hint": { "$ref": "#/definitions/time_spec" }
                                },
                                "required": ["description"]
                            },
                            "patch": {
                                "type": "object",
                                "properties": {
                                    "title": { "type": "string" },
                                    "start": { "$ref": "#/definitions/time_spec" },
                                    "end": { "$ref": "#/definitions/time_spec" },
                                    "duration_minutes": { "type": "integer" },
                                    "description": { "type": "string" },
                                    "attendees": { "type": "array", "items": { "type": "string" } }
                                }
                            },
                            "days_ahead": { "type": "integer" },
                            "text_filter": { "type": "string" }
                        },
                        "required": ["type"]
                    },
                    "confidence": {
                        "type": "number",
                        "minimum": 0.0,
                        "maximum": 1.0,
                        "description": "How sure you are that this is what the user wants"
                    }
                },
                "required": ["action", "confidence"],
                "definitions": {
                    "time_spec": {
                        "type": "object",
                        "properties": {
                            "kind": { "type": "string", "enum": ["absolute", "relative"] },
                            "value": { "type": "string" }
                        },
                        "required": ["kind", "value"]
                    }
                }
            }),
        }
    }

    async fn call_api(&self, system: String, user_message: String) -> Result<ActionPayload> {
        let request_payload = MessagesRequest {
            model: self.model.clone(),
            max_tokens: DEFAULT_MAX_TOKENS,
            system,
            tools: vec![self.tool_definition()],
            tool_choice: ToolChoice { choice_type: "tool".to_string(), name: TOOL_NAME.to_string() },
            messages: vec![MessageParam { role: "user".to_string(), content: user_message }],
        };

        let request = self
            .http
            .request(Method::POST, &self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request_payload);

        // Transport retries live in HttpClient; a semantically bad response
        // is never retried.
        let response = self.http.send(request).await?;
        let status = response.status();
        debug!(status = status.as_u16(), "received model response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "unknown error".to_string());
            return Err(match status.as_u16() {
                401 | 403 => VoxCalError::Auth(format!("model API rejected key ({status})")),
                429 => VoxCalError::Network("model API rate limited after retries".to_string()),
                500..=599 => VoxCalError::Network(format!("model API failed ({status}): {body}")),
                _ => VoxCalError::Internal(format!("model API failed ({status}): {body}")),
            });
        }

        let envelope: MessagesResponse = response
            .json()
            .await
            .map_err(|e| VoxCalError::Extraction(format!("unreadable model response: {e}")))?;

        parse_tool_use(envelope.content)
    }
}

/// Strict parse of the forced tool call. Missing block, wrong tool, or a
/// payload that fails schema validation all surface as `Extraction`.
fn parse_tool_use(content: Vec<ContentBlock>) -> Result<ActionPayload> {
    let block = content
        .into_iter()
        .find(|block| block.block_type == "tool_use" && block.name.as_deref() == Some(TOOL_NAME))
        .ok_or_else(|| {
            VoxCalError::Extraction("model response contained no tool call".to_string())
        })?;

    let input = block
        .input
        .ok_or_else(|| VoxCalError::Extraction("tool call carried no input".to_string()))?;

    let payload: ActionPayload = serde_json::from_value(input)
        .map_err(|e| VoxCalError::Extraction(format!("tool input did not match schema: {e}")))?;

    if !(0.0..=1.0).contains(&payload.confidence) {
        return Err(VoxCalError::Extraction(format!(
            "confidence {} outside [0, 1]",
            payload.confidence
        )));
    }

    Ok(payload)
}

#[async_trait]
impl IntentExtractor for AnthropicExtractor {
    async fn extract(
        &self,
        utterance: &Utterance,
        current_time: DateTime<Utc>,
        recent_events: &[CalendarEvent],
        pending: Option<&CalendarAction>,
    ) -> Result<CalendarAction> {
        let system = self.build_system_prompt(
            current_time,
            utterance.timezone.as_deref(),
            recent_events,
            pending,
        );

        let payload = self.call_api(system, utterance.text.clone()).await?;

        info!(
            verb = payload.action.verb(),
            confidence = payload.confidence,
            "model produced action draft"
        );

        let mut action = CalendarAction::new(payload.action, payload.confidence);
        action.timezone = utterance.timezone.clone();
        Ok(action)
    }
}
