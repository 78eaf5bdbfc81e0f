//! Logging configuration and tracing subscriber setup for testlog.
//!
//! Library crates only emit `tracing` events. Binaries call [`init`] once to
//! install a stderr subscriber filtered by [`LoggingConfig::targets`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding a target filter (`info,testlog_engine=debug`).
/// Overrides the configured levels when set and parseable.
pub const LOG_ENV: &str = "TESTLOG_LOG";

/// Log level for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Compact,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum log level to output
    #[serde(default)]
    pub level: LogLevel,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default = "default_true")]
    pub timestamps: bool,
    /// Enable colors (for terminal output)
    #[serde(default = "default_true")]
    pub colors: bool,
    /// Per-target levels, keyed by tracing target (crate path, e.g. `testlog_engine`).
    #[serde(default)]
    pub component_levels: HashMap<String, LogLevel>,
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Plain,
            timestamps: true,
            colors: true,
            component_levels: HashMap::new(),
        }
    }
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_component_level(mut self, component: impl Into<String>, level: LogLevel) -> Self {
        self.component_levels.insert(component.into(), level);
        self
    }

    /// Build the per-target filter for this configuration.
    pub fn targets(&self) -> Targets {
        let mut targets = Targets::new().with_default(self.level.to_level_filter());
        for (component, level) in &self.component_levels {
            targets = targets.with_target(component.clone(), level.to_level_filter());
        }
        targets
    }
}

/// Install a global stderr subscriber.
///
/// Returns `false` if a subscriber was already installed (tests, embedding
/// applications); the existing one is left alone.
pub fn init(config: &LoggingConfig) -> bool {
    let targets = std::env::var(LOG_ENV)
        .ok()
        .and_then(|raw| raw.parse::<Targets>().ok())
        .unwrap_or_else(|| config.targets());

    let layer = match (config.format, config.timestamps) {
        (LogFormat::Plain, true) => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(config.colors)
            .boxed(),
        (LogFormat::Plain, false) => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(config.colors)
            .without_time()
            .boxed(),
        (LogFormat::Compact, true) => tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_ansi(config.colors)
            .boxed(),
        (LogFormat::Compact, false) => tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_ansi(config.colors)
            .without_time()
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(targets))
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_respect_component_levels() {
        let targets = LoggingConfig::new()
            .with_level(LogLevel::Warn)
            .with_component_level("testlog_engine", LogLevel::Debug)
            .targets();

        assert!(targets.would_enable("testlog_engine", &tracing::Level::DEBUG));
        assert!(!targets.would_enable("testlog_merge", &tracing::Level::INFO));
        assert!(targets.would_enable("testlog_merge", &tracing::Level::WARN));
    }

    #[test]
    fn config_defaults_from_empty_json() {
        let config: LoggingConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, LoggingConfig::default());
    }

    #[test]
    fn config_yaml_roundtrip() {
        let config = LoggingConfig::new()
            .with_format(LogFormat::Compact)
            .with_component_level("testlog_ledger_sqlite", LogLevel::Trace);
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("compact"));
        let back: LoggingConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn init_is_idempotent() {
        let config = LoggingConfig::new().with_level(LogLevel::Off);
        let _ = init(&config);
        assert!(!init(&config));
    }
}
