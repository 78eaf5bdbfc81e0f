//! Configuration management and loading for testlog.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use testlog_logging::LoggingConfig;

/// Configuration format types supported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigFormat {
    Json,
    #[default]
    Yaml,
}

impl ConfigFormat {
    /// `.json` is JSON; everything else is read as YAML.
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => ConfigFormat::Json,
            _ => ConfigFormat::Yaml,
        }
    }
}

/// Main testlog configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestlogConfig {
    /// SQLite database holding test cases, stats and failure reasons.
    #[serde(default = "default_database")]
    pub database: PathBuf,

    /// Root of the on-disk content store for artifact payloads.
    #[serde(default = "default_content_dir")]
    pub content_dir: PathBuf,

    /// How long a writer waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Bounded retries for the lookup-or-reserve step under contention.
    #[serde(default = "default_reservation_attempts")]
    pub reservation_attempts: u32,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_database() -> PathBuf {
    PathBuf::from("./testlog.sqlite3")
}

fn default_content_dir() -> PathBuf {
    PathBuf::from("./.testlog-content")
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_reservation_attempts() -> u32 {
    3
}

impl Default for TestlogConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            content_dir: default_content_dir(),
            busy_timeout_ms: default_busy_timeout_ms(),
            reservation_attempts: default_reservation_attempts(),
            logging: LoggingConfig::default(),
        }
    }
}

impl TestlogConfig {
    pub fn validate(&self) -> Result<()> {
        if self.reservation_attempts == 0 {
            anyhow::bail!("reservation_attempts must be at least 1");
        }
        Ok(())
    }
}

/// Load configuration from a file
pub fn load_config(path: impl AsRef<Path>) -> Result<TestlogConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;

    let config: TestlogConfig = match ConfigFormat::for_path(path) {
        ConfigFormat::Json => serde_json::from_str(&contents)
            .with_context(|| format!("parse JSON config {}", path.display()))?,
        ConfigFormat::Yaml => serde_yaml::from_str(&contents)
            .with_context(|| format!("parse YAML config {}", path.display()))?,
    };
    config.validate()?;
    Ok(config)
}

/// Save configuration to a file
pub fn save_config(config: &TestlogConfig, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let contents = match ConfigFormat::for_path(path) {
        ConfigFormat::Json => {
            serde_json::to_string_pretty(config).context("serialize JSON config")?
        }
        ConfigFormat::Yaml => serde_yaml::to_string(config).context("serialize YAML config")?,
    };

    std::fs::write(path, contents).with_context(|| format!("write config {}", path.display()))?;
    Ok(())
}
