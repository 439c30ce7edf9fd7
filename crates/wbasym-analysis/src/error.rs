//! Error types for the analysis driver.

use thiserror::Error;

/// Errors raised while configuring or running the event loop.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Event record or tree I/O failure.
    #[error(transparent)]
    Event(#[from] wbasym_event::EventError),

    /// I/O error with the offending path.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File involved.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// YAML settings parse error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unknown channel or charge selection code.
    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    /// Malformed data-taking era label.
    #[error("invalid era '{0}': expected 'era<YYYY>[suffix]', e.g. 'era2016'")]
    InvalidEra(String),

    /// Unusable normalization histogram.
    #[error("normalization error: {0}")]
    Normalization(String),

    /// Inconsistent run configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result alias for analysis operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;

pub(crate) fn io_error(path: &std::path::Path, source: std::io::Error) -> AnalysisError {
    AnalysisError::Io { path: path.display().to_string(), source }
}
