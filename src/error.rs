//! Error types for mailroute.

use std::path::PathBuf;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Item error: {0}")]
    Item(#[from] ItemError),

    #[error("Processor error: {0}")]
    Processor(#[from] ProcessorError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Processor registration and lookup errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Processor id is invalid: {0:?}")]
    InvalidId(String),

    #[error("Processor id already registered: {0}")]
    DuplicateRegistration(String),

    #[error("Processor {0} is not registered")]
    UnknownProcessor(String),
}

/// Errors raised by an item while persisting or reading itself.
#[derive(Debug, thiserror::Error)]
pub enum ItemError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ItemError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Processor execution errors.
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error("Item error: {0}")]
    Item(#[from] ItemError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Extraction of {archive} failed: {reason}")]
    Extraction { archive: PathBuf, reason: String },

    #[error("Wrong password for {archive}")]
    InvalidPassword { archive: PathBuf },

    #[error("Rule table {path} is unusable: {reason}")]
    RuleTable { path: PathBuf, reason: String },

    #[error("Text recognition failed: {0}")]
    Recognition(String),

    #[error("Password prompt failed: {0}")]
    Prompt(String),

    #[error("Invalid parameters for processor {processor}: {reason}")]
    InvalidParameters { processor: String, reason: String },
}

/// Errors that stop a whole engine run.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Cannot prepare destination {path}: {source}")]
    Destination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for mailroute.
pub type Result<T> = std::result::Result<T, Error>;
