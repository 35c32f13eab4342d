//! Configuration loader
//!
//! Secrets come from environment variables only and are checked once at
//! startup, before the pipeline is reachable; a missing secret is a fatal
//! `Config` error. Non-secret tuning falls back from environment variables
//! to a probed TOML file to built-in defaults.
//!
//! ## Environment Variables
//! - `ANTHROPIC_API_KEY`: model provider API key (required)
//! - `GOOGLE_CALENDAR_CLIENT_ID`: OAuth client id (required)
//! - `GOOGLE_CALENDAR_CLIENT_SECRET`: OAuth client secret (required)
//! - `GOOGLE_CALENDAR_REFRESH_TOKEN`: stored refresh token (required)
//! - `VOXCAL_MODEL`: model override
//! - `VOXCAL_CALENDAR_ID`: calendar to operate on (default `primary`)
//! - `VOXCAL_REQUEST_TIMEOUT_SECS`: per-call timeout (default 30)
//!
//! ## File Locations
//! `./voxcal.toml` or `./config.toml`, probed in the current working
//! directory and one parent up.

use std::path::PathBuf;

use serde::Deserialize;
use voxcal_domain::{Result, VoxCalError};

/// Full application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub anthropic_api_key: String,
    pub google: GoogleConfig,
    pub settings: Settings,
}

/// Google Calendar OAuth material. The interactive authorization that
/// produces the refresh token happens outside this process.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

/// Non-secret tuning knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub model: String,
    pub calendar_id: String,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            calendar_id: "primary".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl AppConfig {
    /// Load configuration: secrets from the environment, tuning from
    /// environment > file > defaults.
    ///
    /// # Errors
    /// Returns `VoxCalError::Config` when a required secret is missing or
    /// a value fails to parse.
    pub fn load() -> Result<Self> {
        let anthropic_api_key = required_env("ANTHROPIC_API_KEY")?;
        let google = GoogleConfig {
            client_id: required_env("GOOGLE_CALENDAR_CLIENT_ID")?,
            client_secret: required_env("GOOGLE_CALENDAR_CLIENT_SECRET")?,
            refresh_token: required_env("GOOGLE_CALENDAR_REFRESH_TOKEN")?,
        };

        let mut settings = load_settings_file()?.unwrap_or_default();
        if let Ok(model) = std::env::var("VOXCAL_MODEL") {
            settings.model = model;
        }
        if let Ok(calendar_id) = std::env::var("VOXCAL_CALENDAR_ID") {
            settings.calendar_id = calendar_id;
        }
        if let Ok(timeout) = std::env::var("VOXCAL_REQUEST_TIMEOUT_SECS") {
            settings.request_timeout_secs = timeout.parse::<u64>().map_err(|e| {
                VoxCalError::Config(format!("Invalid VOXCAL_REQUEST_TIMEOUT_SECS: {e}"))
            })?;
        }

        Ok(Self { anthropic_api_key, google, settings })
    }
}

/// Parse tuning settings from the first probed TOML file, if any exists.
fn load_settings_file() -> Result<Option<Settings>> {
    let Some(path) = probe_config_paths() else {
        return Ok(None);
    };
    settings_from_file(&path).map(Some)
}

/// Parse tuning settings from a specific TOML file.
///
/// # Errors
/// Returns `VoxCalError::Config` when the file is unreadable or invalid.
pub fn settings_from_file(path: &std::path::Path) -> Result<Settings> {
    tracing::info!(path = %path.display(), "loading settings from file");

    let contents = std::fs::read_to_string(path)
        .map_err(|e| VoxCalError::Config(format!("Failed to read config file: {e}")))?;
    toml::from_str(&contents)
        .map_err(|e| VoxCalError::Config(format!("Invalid TOML in {}: {e}", path.display())))
}

/// Probe standard locations for a settings file.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend([
            cwd.join("voxcal.toml"),
            cwd.join("config.toml"),
            cwd.join("../voxcal.toml"),
            cwd.join("../config.toml"),
        ]);
    }

    candidates.into_iter().find(|path| path.exists())
}

/// Get required environment variable.
///
/// # Errors
/// Returns `VoxCalError::Config` if the variable is not set.
fn required_env(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| VoxCalError::Config(format!("Missing required environment variable: {key}")))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use once_cell::sync::Lazy;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const SECRET_VARS: &[&str] = &[
        "ANTHROPIC_API_KEY",
        "GOOGLE_CALENDAR_CLIENT_ID",
        "GOOGLE_CALENDAR_CLIENT_SECRET",
        "GOOGLE_CALENDAR_REFRESH_TOKEN",
    ];

    fn set_all_secrets() {
        for var in SECRET_VARS {
            std::env::set_var(var, "test-value");
        }
    }

    fn clear_all_secrets() {
        for var in SECRET_VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn loads_with_all_secrets_present() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        set_all_secrets();
        std::env::remove_var("VOXCAL_MODEL");
        std::env::remove_var("VOXCAL_REQUEST_TIMEOUT_SECS");

        let config = AppConfig::load().expect("config should load");
        assert_eq!(config.anthropic_api_key, "test-value");
        assert_eq!(config.settings.calendar_id, "primary");
        assert_eq!(config.settings.request_timeout_secs, 30);

        clear_all_secrets();
    }

    #[test]
    fn missing_secret_is_fatal() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        set_all_secrets();
        std::env::remove_var("ANTHROPIC_API_KEY");

        let result = AppConfig::load();
        assert!(matches!(result, Err(VoxCalError::Config(_))));

        clear_all_secrets();
    }

    #[test]
    fn env_overrides_model() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        set_all_secrets();
        std::env::set_var("VOXCAL_MODEL", "claude-test-model");

        let config = AppConfig::load().expect("config should load");
        assert_eq!(config.settings.model, "claude-test-model");

        std::env::remove_var("VOXCAL_MODEL");
        clear_all_secrets();
    }

    #[test]
    fn invalid_timeout_is_rejected() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        set_all_secrets();
        std::env::set_var("VOXCAL_REQUEST_TIMEOUT_SECS", "not-a-number");

        let result = AppConfig::load();
        assert!(matches!(result, Err(VoxCalError::Config(_))));

        std::env::remove_var("VOXCAL_REQUEST_TIMEOUT_SECS");
        clear_all_secrets();
    }

    #[test]
    fn settings_parse_from_toml() {
        let parsed: Settings = toml::from_str(
            r#"
model = "claude-test"
calendar_id = "work"
request_timeout_secs = 10
"#,
        )
        .expect("valid settings toml");
        assert_eq!(parsed.model, "claude-test");
        assert_eq!(parsed.calendar_id, "work");
        assert_eq!(parsed.request_timeout_secs, 10);
    }

    #[test]
    fn settings_toml_fields_are_optional() {
        let parsed: Settings = toml::from_str("model = \"claude-test\"").expect("valid toml");
        assert_eq!(parsed.model, "claude-test");
        assert_eq!(parsed.calendar_id, "primary");
    }

    #[test]
    fn settings_load_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(b"calendar_id = \"work\"\nrequest_timeout_secs = 15\n")
            .expect("write settings");

        let settings = settings_from_file(file.path()).expect("should load");
        assert_eq!(settings.calendar_id, "work");
        assert_eq!(settings.request_timeout_secs, 15);
    }

    #[test]
    fn invalid_settings_file_is_config_error() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(b"calendar_id = [not toml").expect("write settings");

        let result = settings_from_file(file.path());
        assert!(matches!(result, Err(VoxCalError::Config(_))));
    }
}
