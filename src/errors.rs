use std::path::PathBuf;
use thiserror::Error;

use crate::infrastructure::container::ContainerError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Container error: {0}")]
    Container(#[from] ContainerError),
    #[error("Logging setup failed: {0}")]
    Logging(String),
    #[error("I/O error while {0}: {1}")]
    IO(String, #[source] std::io::Error),
    #[error("Application error: {0}")]
    Generic(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read file '{}': {}", .0.display(), .1)]
    FileRead(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse TOML from '{0}': {1}")]
    TomlParse(String, #[source] toml::de::Error),
    #[error("Service '{service}' has invalid scope '{scope}'")]
    InvalidScope { service: String, scope: String },
    #[error("Service '{service}' argument #{index} is invalid: {reason}")]
    InvalidArgument {
        service: String,
        index: usize,
        reason: String,
    },
    #[error("Service '{service}' uses unknown constructor '{constructor}'")]
    UnknownConstructor { service: String, constructor: String },
    #[error("Definition import cycle through '{}'", .0.display())]
    ImportCycle(PathBuf),
    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
    #[error(transparent)]
    Container(#[from] ContainerError),
}
