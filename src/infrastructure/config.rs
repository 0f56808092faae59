//! Configuration file management.
//!
//! Handles loading and creating TOML configuration files and applying
//! environment overrides.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{AppConfig, AppError, Result};

/// Environment variable overriding `api.organization_id`.
pub const ORG_ID_ENV: &str = "CLAUDE_ORG_ID";
/// Environment variable overriding `api.session_key`.
pub const SESSION_KEY_ENV: &str = "CLAUDE_SESSION_KEY";

/// Default configuration file content.
const DEFAULT_CONFIG: &str = r#"# Claude Chat Export Configuration
# Auto-generated - edit as needed

[api]
base_url = "https://claude.ai"

# Organization to export from (or set CLAUDE_ORG_ID)
# organization_id = "00000000-0000-0000-0000-000000000000"

# Value of the sessionKey cookie (or set CLAUDE_SESSION_KEY)
# session_key = "sk-ant-..."

# Request timeout in seconds
timeout_secs = 30

[export]
# Default format: json, markdown or text
format = "markdown"

# Include created/updated/model metadata in markdown and text output
include_metadata = true

# Conversations fetched concurrently per batch
batch_size = 3

# Pause between batches in milliseconds
batch_delay_ms = 200

# Directory receiving bulk exports
output_dir = "claude-exports"

# Default model by date, used when a conversation has no model recorded.
# Dates are quoted YYYY-MM-DD strings (UTC).
[[models.timeline]]
since = "2023-07-11"
model = "claude-2.0"

[[models.timeline]]
since = "2023-11-21"
model = "claude-2.1"

[[models.timeline]]
since = "2024-03-04"
model = "claude-3-sonnet-20240229"

[[models.timeline]]
since = "2024-06-20"
model = "claude-3-5-sonnet-20240620"

[[models.timeline]]
since = "2024-10-22"
model = "claude-3-5-sonnet-20241022"

[[models.timeline]]
since = "2025-02-24"
model = "claude-3-7-sonnet-20250219"

[[models.timeline]]
since = "2025-05-22"
model = "claude-sonnet-4-20250514"
"#;

/// Load configuration from the given file, the default location, or built-in defaults.
///
/// Environment overrides are applied afterwards and the result is validated.
///
/// # Errors
/// Returns error if a file exists but cannot be read, parsed or validated.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config_path = path.map_or_else(config_file_path, Path::to_path_buf);

    let mut config = if config_path.exists() {
        load_config_from_file(&config_path)?
    } else {
        if path.is_some() {
            return Err(AppError::Config {
                message: format!("Config file not found: {}", config_path.display()),
            });
        }
        tracing::debug!(path = %config_path.display(), "No config file, using defaults");
        AppConfig::default()
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    config
        .validate()
        .map_err(|message| AppError::Config { message })?;

    Ok(config)
}

/// Load configuration from a specific file.
///
/// # Errors
/// Returns error if file cannot be read or parsed.
pub fn load_config_from_file(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::io(format!("Failed to read config file: {}", path.display()), e))?;

    toml::from_str(&content).map_err(|e| AppError::Config {
        message: format!("Failed to parse config file: {e}"),
    })
}

/// Applies environment overrides through a lookup function.
fn apply_env_overrides(config: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(org) = lookup(ORG_ID_ENV).filter(|v| !v.trim().is_empty()) {
        config.api.organization_id = Some(org);
    }
    if let Some(key) = lookup(SESSION_KEY_ENV).filter(|v| !v.trim().is_empty()) {
        config.api.session_key = Some(key);
    }
}

/// Create the default configuration file if it doesn't exist.
///
/// Returns `true` when a new file was written.
///
/// # Errors
/// Returns error if file cannot be created.
pub fn ensure_config_exists(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::io("Failed to create config directory", e))?;
    }

    fs::write(path, DEFAULT_CONFIG)
        .map_err(|e| AppError::io("Failed to create default config", e))?;

    tracing::info!(path = %path.display(), "Created default configuration");

    Ok(true)
}

/// Get the path to the configuration file.
#[must_use]
pub fn config_file_path() -> PathBuf {
    AppConfig::default_config_file()
}
