//! Error taxonomy for collection runs.
//!
//! Only failures that stop a whole source or a whole record are errors. A field
//! that cannot be normalized or a join key without a match is not: those
//! degrade to the `"N/A"` sentinel inside the pipeline and never reach this type.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarvestError {
    /// A whole external source could not be fetched or did not have the
    /// expected shape (missing link, missing table, empty sheet).
    #[error("source {source_name} unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    /// One record could not be processed; the batch carries on without it.
    #[error("record {context} failed: {reason}")]
    RecordFailure { context: String, reason: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML configuration error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl HarvestError {
    pub fn unavailable(source_name: impl Into<String>, reason: impl ToString) -> Self {
        HarvestError::SourceUnavailable {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn record(context: impl Into<String>, reason: impl ToString) -> Self {
        HarvestError::RecordFailure {
            context: context.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HarvestError>;
