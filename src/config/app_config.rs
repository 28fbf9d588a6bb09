use serde::Deserialize;
use std::{collections::HashMap, env, fs, path::PathBuf};
use tracing::Level;

use super::loader::{expand_path, DEFAULT_ENV_PREFIX};
use crate::errors::ConfigError;
use crate::logging::{parse_level, LogFormat, LoggingConfig, LoggingEnvironment};

// Configuration location constants
pub const CONFIG_DIR_NAME: &str = "wirebox";
pub const CONFIG_FILE_NAME: &str = "config.toml";

// Environment variables read by `from_partial_and_env`
pub const ENV_LOG_ENVIRONMENT: &str = "WIREBOX_LOG_ENVIRONMENT";
pub const ENV_LOG_LEVEL: &str = "WIREBOX_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "WIREBOX_LOG_FORMAT";
pub const ENV_DEFINITIONS: &str = "WIREBOX_DEFINITIONS";

/// Main Application Configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    /// Definition file used when none is given on the command line
    pub definitions: Option<PathBuf>,
    /// Prefix of parameter override variables
    pub env_prefix: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            definitions: None,
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
        }
    }
}

/// Partial Application Configuration for loading from files
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialAppConfig {
    logging: Option<PartialLoggingConfig>,
    definitions: Option<String>,
    env_prefix: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialLoggingConfig {
    environment: Option<String>,
    level: Option<String>,
    format: Option<String>,
    show_target: Option<bool>,
    show_thread_ids: Option<bool>,
}

impl AppConfig {
    /// Load from the user config file (if any) and the process environment
    pub fn load() -> Result<Self, ConfigError> {
        let partial = match Self::user_config_path() {
            Some(path) if path.exists() => Self::read_partial(&path)?,
            _ => PartialAppConfig::default(),
        };
        Self::from_partial_and_env(partial, env::vars().collect())
    }

    /// `<config dir>/wirebox/config.toml`
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    pub fn read_partial(path: &std::path::Path) -> Result<PartialAppConfig, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::FileRead(path.to_path_buf(), e))?;
        toml::from_str(&content).map_err(|e| ConfigError::TomlParse(path.display().to_string(), e))
    }

    /// Environment variables take precedence over file values.
    /// `logging.environment` selects a preset; explicit keys override it.
    pub fn from_partial_and_env(
        partial: PartialAppConfig,
        env_map: HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let defaults = AppConfig::default();
        let file_logging = partial.logging.unwrap_or_default();

        let environment_name = env_map
            .get(ENV_LOG_ENVIRONMENT)
            .cloned()
            .or(file_logging.environment);
        let base = match environment_name {
            Some(name) => {
                let environment = name.parse::<LoggingEnvironment>().map_err(|reason| {
                    ConfigError::InvalidValue {
                        key: "logging.environment".to_string(),
                        reason,
                    }
                })?;
                LoggingConfig::for_environment(environment)
            }
            None => defaults.logging,
        };

        let level_name = env_map.get(ENV_LOG_LEVEL).cloned().or(file_logging.level);
        let level = match level_name {
            Some(name) => parse_log_level(&name)?,
            None => base.level,
        };

        let format_name = env_map.get(ENV_LOG_FORMAT).cloned().or(file_logging.format);
        let format = match format_name {
            Some(name) => name.parse::<LogFormat>().map_err(|reason| ConfigError::InvalidValue {
                key: "logging.format".to_string(),
                reason,
            })?,
            None => base.format,
        };

        let definitions = env_map
            .get(ENV_DEFINITIONS)
            .cloned()
            .or(partial.definitions)
            .map(|raw| expand_path(std::path::Path::new(&raw)));

        Ok(Self {
            logging: LoggingConfig {
                level,
                format,
                show_target: file_logging.show_target.unwrap_or(base.show_target),
                show_thread_ids: file_logging.show_thread_ids.unwrap_or(base.show_thread_ids),
                ..base
            },
            definitions,
            env_prefix: partial.env_prefix.unwrap_or(defaults.env_prefix),
        })
    }
}

pub fn parse_log_level(name: &str) -> Result<Level, ConfigError> {
    parse_level(name).ok_or_else(|| ConfigError::InvalidValue {
        key: "logging.level".to_string(),
        reason: format!("unknown log level '{}'", name),
    })
}
