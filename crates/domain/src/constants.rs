//! Domain constants shared across crates.

/// Extraction confidence below this forces a clarification turn even when
/// the drafted action is structurally complete.
pub const CLARIFY_CONFIDENCE_THRESHOLD: f32 = 0.5;

/// The dispatcher refuses to execute actions below this confidence.
pub const DISPATCH_MIN_CONFIDENCE: f32 = 0.5;

/// Maximum number of recent/upcoming events included as extraction context.
/// Bounds prompt size regardless of calendar density.
pub const MAX_CONTEXT_EVENTS: usize = 20;

/// Default event length when the user gives a start but no end or duration.
pub const DEFAULT_EVENT_DURATION_MINUTES: i64 = 60;

/// Lookahead window (days) when resolving a target with no time hint.
pub const TARGET_LOOKAHEAD_DAYS: i64 = 14;

/// Default query window when the user asks "what's on my calendar".
pub const DEFAULT_QUERY_DAYS_AHEAD: u32 = 1;

/// Upper bound on events rendered in a query listing.
pub const MAX_QUERY_RESULTS: usize = 50;
