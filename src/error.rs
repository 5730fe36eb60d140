//! Error types for cbreport
//!
//! All errors are derived from `thiserror` for convenient error handling
//! and automatic `From` implementations. Any error raised while a report
//! is being aggregated aborts that report; no partial aggregate is ever
//! published.

use rust_decimal::Decimal;
use thiserror::Error;

/// Main error type for cbreport operations
#[derive(Error, Debug)]
pub enum ReportError {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A billing row carried a cost field that is not a decimal number
    #[error("invalid cost amount {value:?}")]
    InvalidCost {
        /// The raw field value that failed to parse
        value: String,
    },

    /// A cost increment was negative
    #[error("negative cost increment: {0}")]
    NegativeCost(Decimal),

    /// A cost total left the representable range when truncated
    #[error("cost total exceeds representable range")]
    CostOverflow,

    /// Invalid date format
    #[error("Invalid date format: {0}")]
    InvalidDate(String),

    /// A billing row carried an unparseable usage timestamp
    #[error("invalid usage timestamp {0:?}")]
    InvalidTimestamp(String),

    /// An aggregation dimension name did not match any known dimension
    #[error("unknown aggregation dimension: {0}")]
    UnknownDimension(String),

    /// An aggregation pass was requested with no dimensions
    #[error("aggregation requires at least one dimension")]
    EmptyDimensions,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience type alias for Results in cbreport
pub type Result<T> = std::result::Result<T, ReportError>;
