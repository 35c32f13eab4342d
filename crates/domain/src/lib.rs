//! # VoxCal Domain
//!
//! Business domain types and models for VoxCal.
//!
//! This crate contains:
//! - Domain data types (Utterance, CalendarAction, CalendarEvent, ...)
//! - Domain error types and Result definitions
//! - Domain constants (confidence thresholds, context limits)
//! - The relative time-expression parser
//!
//! ## Architecture
//! - No dependencies on other VoxCal crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod constants;
pub mod errors;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use errors::*;
pub use types::*;
// Re-export the relative time parser
pub use utils::timeparse::{resolve_time_expression, TimeExpression};
