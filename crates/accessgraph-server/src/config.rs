//! Server configuration.
//!
//! Sources, lowest precedence first:
//! 1. Defaults of every section
//! 2. An optional YAML file (path in `ACCESSGRAPH_CONFIG`)
//! 3. Environment variables prefixed `ACCESSGRAPH_`, with `__` between
//!    nested keys (`ACCESSGRAPH_ENGINE__CACHE__TTL_MS=5000`)

use std::path::Path;

use accessgraph_db::DbConfig;
use accessgraph_engine::{EngineConfig, KetoConfig};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use thiserror::Error;

pub const ENV_PREFIX: &str = "ACCESSGRAPH";

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("failed to read configuration: {0}")]
    Source(#[from] ConfigError),

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Plain,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Json,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub db: DbConfig,
    pub engine: EngineConfig,
    pub keto: KetoConfig,
    pub logging: LoggingConfig,
}

impl ServerConfig {
    /// Load from the optional YAML file at `path`, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigLoadError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigLoadError::FileNotFound {
                    path: path.display().to_string(),
                });
            }
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml));
        }
        Self::finish(builder.add_source(environment()))
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigLoadError> {
        let config: ServerConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigLoadError::Invalid {
                message: format!(
                    "logging.level must be one of {valid_levels:?}, got {}",
                    self.logging.level
                ),
            });
        }
        if self.keto.page_size == 0 {
            return Err(ConfigLoadError::Invalid {
                message: "keto.page_size must be greater than 0".into(),
            });
        }
        if self.engine.default_namespace.trim().is_empty() {
            return Err(ConfigLoadError::Invalid {
                message: "engine.default_namespace must not be empty".into(),
            });
        }
        Ok(())
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use accessgraph_engine::InvalidationStrategy;

    use super::*;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        environment().source(Some(map))
    }

    #[test]
    fn defaults_apply_without_sources() {
        let config = ServerConfig::finish(Config::builder().add_source(env(&[]))).unwrap();
        assert_eq!(config.db.namespace, "accessgraph");
        assert_eq!(config.engine.edge_retry_attempts, 2);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.engine.cache.enabled);
    }

    #[test]
    fn yaml_sections_are_read() {
        let yaml = r#"
db:
  url: "db.internal:8000"
engine:
  store_timeout_ms: 1500
  cache:
    ttl_ms: 1000
    invalidation: flush_all
keto:
  read_url: "http://keto:4466"
logging:
  format: plain
"#;
        let builder = Config::builder().add_source(File::from_str(yaml, FileFormat::Yaml));
        let config = ServerConfig::finish(builder).unwrap();
        assert_eq!(config.db.url, "db.internal:8000");
        assert_eq!(config.db.database, "main");
        assert_eq!(config.engine.store_timeout_ms, 1500);
        assert_eq!(config.engine.cache.ttl_ms, 1000);
        assert_eq!(config.engine.cache.invalidation, InvalidationStrategy::FlushAll);
        assert!(config.engine.cache.enabled);
        assert_eq!(config.keto.read_url, "http://keto:4466");
        assert_eq!(config.logging.format, LogFormat::Plain);
    }

    #[test]
    fn environment_overrides_file() {
        let yaml = "engine:\n  edge_retry_attempts: 5\n";
        let builder = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .add_source(env(&[
                ("ACCESSGRAPH_ENGINE__EDGE_RETRY_ATTEMPTS", "7"),
                ("ACCESSGRAPH_DB__PASSWORD", "s3cret"),
            ]));
        let config = ServerConfig::finish(builder).unwrap();
        assert_eq!(config.engine.edge_retry_attempts, 7);
        assert_eq!(config.db.password, "s3cret");
    }

    #[test]
    fn invalid_log_level_is_rejected() {
        let builder = Config::builder().add_source(env(&[("ACCESSGRAPH_LOGGING__LEVEL", "loud")]));
        let err = ServerConfig::finish(builder).unwrap_err();
        assert!(matches!(err, ConfigLoadError::Invalid { .. }));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = ServerConfig::load(Some(Path::new("/nonexistent/accessgraph.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigLoadError::FileNotFound { .. }));
    }
}
