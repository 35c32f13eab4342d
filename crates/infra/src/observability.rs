//! Tracing bootstrap.

use tracing_subscriber::EnvFilter;

/// Environment variable controlling the log filter.
const LOG_ENV_VAR: &str = "VOXCAL_LOG";

/// Initialise the global tracing subscriber.
///
/// Filter comes from `VOXCAL_LOG` (standard `EnvFilter` syntax), defaulting
/// to `info`. Safe to call once at process start; later calls are ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
