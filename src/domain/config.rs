//! Application configuration models.
//!
//! Contains the API connection settings, export defaults and the
//! default-model timeline used to infer models for older conversations.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::models::ExportFormat;

/// Connection settings for the conversation API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the service.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Organization whose conversations are exported.
    #[serde(default)]
    pub organization_id: Option<String>,

    /// Session cookie value used for authentication.
    #[serde(default)]
    pub session_key: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            organization_id: None,
            session_key: None,
            timeout_secs: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "https://claude.ai".to_string()
}

const fn default_timeout() -> u64 {
    30
}

/// Export defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Encoding used when none is given on the command line.
    #[serde(default)]
    pub format: ExportFormat,

    /// Whether to include created/updated/model metadata.
    #[serde(default = "default_include_metadata")]
    pub include_metadata: bool,

    /// Conversations fetched concurrently per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between batches in milliseconds.
    #[serde(default = "default_batch_delay")]
    pub batch_delay_ms: u64,

    /// Directory that receives bulk export archives.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: ExportFormat::default(),
            include_metadata: default_include_metadata(),
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay(),
            output_dir: default_output_dir(),
        }
    }
}

const fn default_include_metadata() -> bool {
    true
}

const fn default_batch_size() -> usize {
    3
}

const fn default_batch_delay() -> u64 {
    200
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("claude-exports")
}

/// One step of the default-model history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    /// First day (UTC) on which `model` became the default.
    pub since: NaiveDate,
    /// Model identifier.
    pub model: String,
}

impl TimelineEntry {
    /// Instant at which this entry takes effect.
    #[must_use]
    pub fn effective_at(&self) -> DateTime<Utc> {
        self.since.and_time(NaiveTime::MIN).and_utc()
    }
}

/// Model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Default-model timeline, ascending by date after load.
    #[serde(default = "default_timeline")]
    pub timeline: Vec<TimelineEntry>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            timeline: default_timeline(),
        }
    }
}

fn default_timeline() -> Vec<TimelineEntry> {
    [
        ((2023, 7, 11), "claude-2.0"),
        ((2023, 11, 21), "claude-2.1"),
        ((2024, 3, 4), "claude-3-sonnet-20240229"),
        ((2024, 6, 20), "claude-3-5-sonnet-20240620"),
        ((2024, 10, 22), "claude-3-5-sonnet-20241022"),
        ((2025, 2, 24), "claude-3-7-sonnet-20250219"),
        ((2025, 5, 22), "claude-sonnet-4-20250514"),
    ]
    .into_iter()
    .filter_map(|((y, m, d), model)| {
        NaiveDate::from_ymd_opt(y, m, d).map(|since| TimelineEntry {
            since,
            model: model.to_string(),
        })
    })
    .collect()
}

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// API connection settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Export defaults.
    #[serde(default)]
    pub export: ExportConfig,

    /// Model inference settings.
    #[serde(default)]
    pub models: ModelsConfig,
}

impl AppConfig {
    /// Get the default configuration directory path.
    #[must_use]
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("claude-chat-export")
    }

    /// Get the default config file path.
    #[must_use]
    pub fn default_config_file() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Checks invariants and normalizes the timeline order.
    ///
    /// # Errors
    /// Returns a message describing the first invalid setting.
    pub fn validate(&mut self) -> Result<(), String> {
        if self.export.batch_size == 0 {
            return Err("export.batch_size must be at least 1".into());
        }
        if self.models.timeline.is_empty() {
            return Err("models.timeline must contain at least one entry".into());
        }
        if let Some(entry) = self.models.timeline.iter().find(|e| e.model.trim().is_empty()) {
            return Err(format!("models.timeline entry {} has an empty model", entry.since));
        }
        self.models.timeline.sort_by_key(|e| e.since);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.api.base_url, "https://claude.ai");
        assert_eq!(config.export.batch_size, 3);
        assert_eq!(config.export.batch_delay_ms, 200);
        assert!(config.export.include_metadata);
        assert_eq!(config.models.timeline.len(), 7);
    }

    #[test]
    fn test_default_timeline_is_sorted() {
        let timeline = default_timeline();
        assert!(timeline.windows(2).all(|w| w[0].since < w[1].since));
    }

    #[test]
    fn test_validate_sorts_timeline() {
        let mut config = AppConfig::default();
        config.models.timeline.reverse();
        assert!(config.validate().is_ok());
        assert_eq!(config.models.timeline[0].model, "claude-2.0");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.export.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.models.timeline.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_effective_at_is_utc_midnight() {
        let entry = TimelineEntry {
            since: NaiveDate::from_ymd_opt(2024, 6, 20).unwrap(),
            model: "m".into(),
        };
        assert_eq!(entry.effective_at().to_rfc3339(), "2024-06-20T00:00:00+00:00");
    }
}
