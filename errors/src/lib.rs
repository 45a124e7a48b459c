//! # Configuration Errors
//!
//! Error taxonomy for the section tree, the serialization registry and the
//! YAML persistence layer.
//!
//! - Uses `thiserror` for structured error definitions
//! - Usage errors (`DetachedSection`, `UnsupportedOperation`) are bugs in the
//!   calling code
//! - Data errors (`InvalidConfig`, `SerializationError`) come from
//!   user-editable documents and are recoverable

use thiserror::Error;

/// Section tree errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Section handle {handle} is not attached to this tree")]
    DetachedSection { handle: String },

    #[error("Unsupported operation: {operation}")]
    UnsupportedOperation { operation: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error(transparent)]
    Serialization(#[from] SerializationError)
}

impl ConfigError {
    /// Shorthand for an [`ConfigError::InvalidConfig`] with the given reason.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into()
        }
    }

    /// Returns `true` for errors caused by the document rather than by the
    /// calling code.
    pub fn is_data_error(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. } | Self::Serialization(_))
    }
}

/// Typed object (de)serialization errors
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("Serialized map does not contain the type key '{type_key}'")]
    MissingTypeKey { type_key: String },

    #[error("Cannot have a null or non-string alias (type key '{type_key}')")]
    NullAlias { type_key: String },

    #[error("Specified class does not exist ('{alias}')")]
    UnknownAlias { alias: String },

    #[error("Could not reconstruct {type_name}: every strategy failed")]
    ReconstructionFailed { type_name: String }
}

/// Configuration file errors
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error
    },

    #[error("Stream IO error: {0}")]
    Stream(#[from] std::io::Error),

    #[error("Invalid configuration in {origin}: {source}")]
    InvalidConfig {
        origin: String,
        #[source]
        source: ConfigError
    }
}

impl ConfigFileError {
    pub fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source
        }
    }
}
