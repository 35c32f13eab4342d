//! # VoxCal Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - HTTP client with the centralised retry policy
//! - Google Calendar gateway (OAuth token refresh, etag concurrency)
//! - Anthropic Messages API intent extractor
//! - Configuration loading and tracing bootstrap
//!
//! ## Architecture
//! - Implements traits defined in `voxcal-core`
//! - Depends on `voxcal-domain` and `voxcal-core`
//! - Contains all "impure" code (network I/O, environment access)

pub mod config;
pub mod errors;
pub mod http;
pub mod integrations;
pub mod observability;

// Re-export commonly used items
pub use config::AppConfig;
pub use errors::InfraError;
pub use http::HttpClient;
pub use integrations::anthropic::AnthropicExtractor;
pub use integrations::google::GoogleCalendarGateway;
