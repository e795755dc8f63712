//! Configuration management for reqtrace
//!
//! Loads the tracer thresholds, seed ranking and the category pattern table
//! from a TOML file, applies environment overrides and validates the result.
//! Components never read configuration themselves; callers build them from a
//! loaded `Config` and pass them down.

use crate::entropy::{EntropyScorer, DEFAULT_MIN_LENGTH};
use crate::error::{ReqtraceError, Result};
use crate::patterns::{default_categories, CategoryConfig, Classifier};
use crate::report::ReportBuilder;
use crate::seeds::{CategoryPriority, SeedDiscoverer};
use crate::tokens::Tokenizer;
use crate::tracer::{TraceLimits, Tracer};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

mod validator;

pub use validator::ConfigValidator;

pub const SCHEMA_VERSION: &str = "1.0.0";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub tracer: TracerConfig,
    pub seeds: SeedsConfig,
    /// Ordered pattern table
    #[serde(rename = "category", default = "default_categories")]
    pub categories: Vec<CategoryConfig>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Thresholds and budgets for tracing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracerConfig {
    pub entropy_threshold: f64,
    pub min_token_length: usize,
    pub max_depth: usize,
    pub max_nodes: usize,
    /// Wall-clock budget per trace in milliseconds, 0 for none
    #[serde(default)]
    pub deadline_ms: u64,
}

/// Seed discovery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedsConfig {
    pub limit: usize,
    /// Category names, highest priority first
    #[serde(default)]
    pub priority: Vec<String>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ReqtraceError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ReqtraceError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        // Apply environment variable overrides
        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Load from `path` when given, else the default location, else built-in defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        let default_path = Self::default_path()?;
        if default_path.exists() {
            return Self::load(&default_path);
        }

        tracing::debug!("No config file at {:?}, using defaults", default_path);
        let mut config = Self::default();
        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ReqtraceError::Io {
                source: e,
                context: format!("Failed to create config directory: {:?}", parent),
            })?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ReqtraceError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: REQTRACE_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("REQTRACE_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "TRACER__ENTROPY_THRESHOLD" => {
                self.tracer.entropy_threshold = parse_env(path, value)?;
            }
            "TRACER__MIN_TOKEN_LENGTH" => {
                self.tracer.min_token_length = parse_env(path, value)?;
            }
            "TRACER__MAX_DEPTH" => {
                self.tracer.max_depth = parse_env(path, value)?;
            }
            "TRACER__MAX_NODES" => {
                self.tracer.max_nodes = parse_env(path, value)?;
            }
            "TRACER__DEADLINE_MS" => {
                self.tracer.deadline_ms = parse_env(path, value)?;
            }
            "SEEDS__LIMIT" => {
                self.seeds.limit = parse_env(path, value)?;
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            ReqtraceError::Config("Cannot determine config directory".to_string())
        })?;

        Ok(config_dir.join("reqtrace").join("config.toml"))
    }

    /// Compile the pattern table
    pub fn classifier(&self) -> Result<Arc<Classifier>> {
        Ok(Arc::new(Classifier::new(&self.categories)?))
    }

    pub fn scorer(&self) -> EntropyScorer {
        EntropyScorer::new(self.tracer.min_token_length)
    }

    /// Trace limits, with the deadline counted from now
    pub fn trace_limits(&self) -> TraceLimits {
        let limits = TraceLimits::new(self.tracer.max_depth, self.tracer.max_nodes);
        if self.tracer.deadline_ms > 0 {
            limits.with_timeout(Duration::from_millis(self.tracer.deadline_ms))
        } else {
            limits
        }
    }

    pub fn build_tracer(&self, classifier: Arc<Classifier>) -> Result<Tracer> {
        Ok(Tracer::new(
            Tokenizer::new(classifier)?,
            self.scorer(),
            self.tracer.entropy_threshold,
        ))
    }

    pub fn build_discoverer(&self, classifier: Arc<Classifier>) -> Result<SeedDiscoverer> {
        Ok(SeedDiscoverer::new(
            Tokenizer::new(classifier)?,
            self.scorer(),
            self.tracer.entropy_threshold,
            CategoryPriority::new(&self.seeds.priority),
        ))
    }

    pub fn build_reporter(&self, classifier: Arc<Classifier>) -> Result<ReportBuilder> {
        Ok(ReportBuilder::new(
            Tokenizer::new(classifier)?,
            self.scorer(),
            self.tracer.entropy_threshold,
        ))
    }
}

fn parse_env<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| ReqtraceError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}'", value),
    })
}

impl Default for Config {
    fn default() -> Self {
        let categories = default_categories();
        let priority = categories.iter().map(|c| c.name.clone()).collect();

        Self {
            meta: MetaConfig {
                schema_version: SCHEMA_VERSION.to_string(),
                created_at: current_timestamp(),
            },
            tracer: TracerConfig {
                entropy_threshold: 3.0,
                min_token_length: DEFAULT_MIN_LENGTH,
                max_depth: 5,
                max_nodes: 500,
                deadline_ms: 0,
            },
            seeds: SeedsConfig {
                limit: 10,
                priority,
            },
            categories,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.tracer.max_nodes = 42;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.tracer.max_nodes, 42);
        assert_eq!(loaded.categories, config.categories);
        assert_eq!(loaded.seeds.priority, config.seeds.priority);
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = Config::load(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ReqtraceError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_parse_minimal_toml() {
        let content = r#"
            [_meta]
            schema_version = "1.0.0"

            [tracer]
            entropy_threshold = 3.5
            min_token_length = 8
            max_depth = 3
            max_nodes = 100

            [seeds]
            limit = 5
            priority = ["session_ids"]

            [[category]]
            name = "session_ids"
            pattern = '[a-f0-9]{32}'
        "#;

        let config: Config = toml::from_str(content).unwrap();
        assert_eq!(config.tracer.deadline_ms, 0);
        assert_eq!(config.categories.len(), 1);
        assert_eq!(config.categories[0].name, "session_ids");
        assert!(ConfigValidator::validate(&config).is_ok());
        assert_eq!(config.scorer().min_length(), 8);
    }

    #[test]
    fn test_env_value_parsing() {
        let mut config = Config::default();
        config
            .set_value_from_env("TRACER__MAX_DEPTH", "9")
            .unwrap();
        assert_eq!(config.tracer.max_depth, 9);

        assert!(config
            .set_value_from_env("TRACER__MAX_NODES", "many")
            .is_err());
    }

    #[test]
    fn test_components_from_config() {
        let config = Config::default();
        let classifier = config.classifier().unwrap();
        assert_eq!(classifier.len(), config.categories.len());
        assert!(config.build_tracer(classifier.clone()).is_ok());
        assert!(config.build_discoverer(classifier.clone()).is_ok());
        assert!(config.build_reporter(classifier).is_ok());
        assert!(config.trace_limits().deadline.is_none());
    }
}
