//! Error types for event-record and tree I/O.

use thiserror::Error;

/// Errors that can occur filling, writing or reading event trees.
#[derive(Error, Debug)]
pub enum EventError {
    /// I/O error on the underlying file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow array/schema error.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet read/write error.
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A bounded field received more entries than it can hold.
    #[error("capacity exceeded for '{field}': at most {capacity} entries, got {requested}")]
    CapacityExceeded {
        /// Column name of the overflowing field.
        field: &'static str,
        /// Declared capacity.
        capacity: usize,
        /// Number of entries requested.
        requested: usize,
    },

    /// Required column missing from an input table.
    #[error("missing column: {0}")]
    MissingColumn(String),

    /// A count column disagrees with its list payload, or parallel lists differ in length.
    ///
    /// For a count column, `expected` is the declared count and `actual` the list length.
    /// For parallel track lists, `expected` is the length of the first list of the set.
    #[error("inconsistent count for '{field}' at row {row}: expected {expected}, got {actual}")]
    InconsistentCount {
        /// Column name.
        field: String,
        /// Row index within the file.
        row: u64,
        /// Expected length.
        expected: usize,
        /// Observed length.
        actual: usize,
    },

    /// Null where every event field requires a value.
    #[error("null value in '{field}' at row {row}")]
    NullValue {
        /// Column name.
        field: String,
        /// Row index within the file.
        row: u64,
    },

    /// Table schema does not match the event-tree schema.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Invalid histogram binning.
    #[error("invalid histogram binning: {0}")]
    HistogramBinning(String),

    /// Missing or malformed key-value metadata.
    #[error("metadata error: {0}")]
    Metadata(String),
}

/// Result alias for event operations.
pub type Result<T> = std::result::Result<T, EventError>;
