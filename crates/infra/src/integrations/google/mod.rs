//! Google Calendar integration
//!
//! Implements the core `CalendarGateway` port against the Calendar v3 REST
//! API with etag-based optimistic concurrency and idempotency keys stored
//! in private extended properties.

pub mod auth;
pub mod gateway;
pub mod types;

pub use auth::GoogleAuthManager;
pub use gateway::GoogleCalendarGateway;
