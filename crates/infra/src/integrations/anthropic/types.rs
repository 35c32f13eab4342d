//! Anthropic Messages API wire types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use voxcal_domain::ActionKind;

/// Request payload for the Messages API.
#[derive(Debug, Serialize)]
pub(crate) struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub system: String,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: ToolChoice,
    pub messages: Vec<MessageParam>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Forces the model to answer through the named tool.
#[derive(Debug, Serialize)]
pub(crate) struct ToolChoice {
    #[serde(rename = "type")]
    pub choice_type: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct MessageParam {
    pub role: String,
    pub content: String,
}

/// Response envelope from the Messages API.
#[derive(Debug, Deserialize)]
pub(crate) struct MessagesResponse {
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub input: Option<Value>,
}

/// The tool input the model must produce: the tagged action union plus the
/// model's own confidence. Anything that fails to parse into this shape is
/// an extraction error, never silently defaulted.
#[derive(Debug, Deserialize)]
pub(crate) struct ActionPayload {
    pub action: ActionKind,
    pub confidence: f32,
}
