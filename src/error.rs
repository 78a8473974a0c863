//! Error types for the dataset pipeline.

use thiserror::Error;

/// Main error type for the dataset pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// No usable raw rows, or no valid sliding-window samples.
    #[error("Data error: {0}")]
    DataError(String),

    /// An operation was requested before the state it depends on exists.
    #[error("State error: {0}")]
    StateError(String),

    /// A matrix does not match the declared asset count × horizon count.
    #[error("Shape error in {context}: expected {expected}, got {actual}")]
    ShapeError {
        context: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// Coarse failure category handed to presentation layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Data,
    State,
    Shape,
    Config,
    Io,
}

impl PipelineError {
    /// Build a shape error from anything displayable.
    pub fn shape(
        context: impl Into<String>,
        expected: impl std::fmt::Display,
        actual: impl std::fmt::Display,
    ) -> Self {
        PipelineError::ShapeError {
            context: context.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// The failure kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::DataError(_) | PipelineError::CsvError(_) => ErrorKind::Data,
            PipelineError::StateError(_) => ErrorKind::State,
            PipelineError::ShapeError { .. } => ErrorKind::Shape,
            PipelineError::ConfigError(_) | PipelineError::TomlError(_) => ErrorKind::Config,
            PipelineError::IoError(_) | PipelineError::JsonError(_) => ErrorKind::Io,
        }
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
