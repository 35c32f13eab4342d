//! Anthropic Messages API integration
//!
//! Implements the core `IntentExtractor` port: one forced-tool model round
//! trip per utterance, strictly parsed into a `CalendarAction` draft.

pub mod client;
pub mod types;

pub use client::AnthropicExtractor;
