use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding `backend.base_url`
pub const API_BASE_ENV: &str = "PERSONA_CHAT_API_BASE";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub backend: BackendConfig,
    #[serde(default)]
    pub quota: QuotaConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub survey: SurveyConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Tried in order until one returns a non-empty character list
    #[serde(default = "default_my_characters_paths")]
    pub my_characters_paths: Vec<String>,
    #[serde(default = "default_send_path")]
    pub send_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuotaConfig {
    #[serde(default = "default_threshold")]
    pub threshold: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_auth_redirect_delay_ms")]
    pub auth_redirect_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StorageConfig {
    /// Absent means storage lives in memory only
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_console")]
    pub console: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SurveyConfig {
    #[serde(default = "default_survey_url")]
    pub url: String,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auth_redirect_delay_ms: default_auth_redirect_delay_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            console: default_console(),
        }
    }
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            url: default_survey_url(),
        }
    }
}

// Default value functions
fn default_timeout_secs() -> u64 {
    30
}

fn default_my_characters_paths() -> Vec<String> {
    [
        "/characters/my-characters",
        "/api/characters/my-characters",
        "/characters/my",
        "/api/characters/my",
        // the catalogue may already be filtered to the caller's assignment
        "/characters",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

fn default_send_path() -> String {
    "/chat/send".to_string()
}

fn default_threshold() -> u32 {
    15
}

fn default_auth_redirect_delay_ms() -> u64 {
    1500
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_console() -> bool {
    false
}

fn default_survey_url() -> String {
    "https://docs.google.com/forms/d/e/1FAIpQLSeRZ74lzonv3_uGe1uSZbV8NvSGslNiuLCtrm81g-FN_usAag/viewform?usp=header"
        .to_string()
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SessionConfig {
    pub fn auth_redirect_delay(&self) -> Duration {
        Duration::from_millis(self.auth_redirect_delay_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let mut config = Self::from_toml(&content)?;

        if let Ok(base_url) = std::env::var(API_BASE_ENV) {
            if !base_url.is_empty() {
                config.backend.base_url = base_url;
            }
        }

        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Config pointing at `base_url` with every other section defaulted
    pub fn for_backend(base_url: impl Into<String>) -> Self {
        Self {
            backend: BackendConfig {
                base_url: base_url.into(),
                timeout_secs: default_timeout_secs(),
                my_characters_paths: default_my_characters_paths(),
                send_path: default_send_path(),
            },
            quota: QuotaConfig::default(),
            session: SessionConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
            survey: SurveyConfig::default(),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        // Validate backend config
        let base_url = self.backend.base_url.trim();
        if base_url.is_empty() {
            bail!("backend.base_url must not be empty");
        }

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            bail!(
                "backend.base_url must start with http:// or https://, got '{}'",
                base_url
            );
        }

        if self.backend.timeout_secs == 0 {
            bail!("backend.timeout_secs must be greater than 0");
        }

        if let Some(path) = self
            .backend
            .my_characters_paths
            .iter()
            .chain(std::iter::once(&self.backend.send_path))
            .find(|p| !p.starts_with('/'))
        {
            bail!("Backend paths must start with '/', got '{}'", path);
        }

        // Validate quota config
        if self.quota.threshold == 0 {
            bail!("quota.threshold must be greater than 0");
        }

        // Validate logging config
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            bail!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            );
        }

        let valid_formats = ["json", "console"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            bail!(
                "Invalid log format '{}'. Must be one of: json, console",
                self.logging.format
            );
        }

        if self.survey.url.is_empty() {
            bail!("survey.url must not be empty");
        }

        Ok(())
    }
}
