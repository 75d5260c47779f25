//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `roomstate.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::time::Duration;

use serde::Deserialize;

use roomstate_adapter_memory::StaticSettings;
use roomstate_app::rule_engine::EngineConfig;
use roomstate_domain::automation::PresenceCategory;
use roomstate_domain::environment::EnvironmentalThresholds;
use roomstate_domain::id::AreaId;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Rule engine timing.
    pub engine: EngineSection,
    /// Thresholds for environmental attributes.
    pub environment: EnvironmentalThresholds,
    /// Where definitions are read from.
    pub definitions: DefinitionsConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Runtime automation switches.
    pub automation: AutomationConfig,
}

/// Rule engine timing, in seconds.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Quiet period before a burst of changes is acted upon.
    pub debounce_secs: u64,
    /// Cooldown for activity-triggered enter actions.
    pub activity_cooldown_secs: u64,
    /// Cooldown for environmental enter and exit actions.
    pub environmental_cooldown_secs: u64,
    /// Capacity of the in-process event channels.
    pub channel_capacity: usize,
}

/// Definitions file location.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DefinitionsConfig {
    /// Path to the TOML definitions document.
    pub path: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Areas and presence categories switched off at startup.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    pub disabled_areas: Vec<AreaId>,
    pub disabled_categories: Vec<PresenceCategory>,
}

impl Config {
    /// Load configuration from `roomstate.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("roomstate.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("ROOMSTATE_DEFINITIONS") {
            self.definitions.path = val;
        }
        if let Ok(val) = std::env::var("ROOMSTATE_DEBOUNCE_SECS") {
            if let Ok(secs) = val.parse() {
                self.engine.debounce_secs = secs;
            }
        }
        if let Ok(val) = std::env::var("ROOMSTATE_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.channel_capacity == 0 {
            return Err(ConfigError::Validation(
                "channel capacity must be non-zero".to_string(),
            ));
        }
        if self.definitions.path.trim().is_empty() {
            return Err(ConfigError::Validation(
                "definitions path must not be empty".to_string(),
            ));
        }
        if self.environment.dark_lux > self.environment.bright_lux {
            return Err(ConfigError::Validation(
                "dark_lux must not exceed bright_lux".to_string(),
            ));
        }
        Ok(())
    }

    /// Timing knobs handed to the rule engine.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            debounce: Duration::from_secs(self.engine.debounce_secs),
            activity_cooldown: Duration::from_secs(self.engine.activity_cooldown_secs),
            environmental_cooldown: Duration::from_secs(self.engine.environmental_cooldown_secs),
        }
    }

    /// Settings provider seeded from the `[automation]` and `[environment]`
    /// sections.
    #[must_use]
    pub fn settings(&self) -> StaticSettings {
        StaticSettings::new()
            .with_disabled_areas(self.automation.disabled_areas.iter().cloned())
            .with_disabled_categories(self.automation.disabled_categories.iter().copied())
            .with_thresholds(self.environment)
    }
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            debounce_secs: 2,
            activity_cooldown_secs: 30,
            environmental_cooldown_secs: 60,
            channel_capacity: 256,
        }
    }
}

impl Default for DefinitionsConfig {
    fn default() -> Self {
        Self {
            path: "definitions.toml".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "roomstated=info,roomstate_app=info,roomstate_adapter_memory=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
