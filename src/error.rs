use plotters::drawing::DrawingAreaErrorKind;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, normalizing or plotting the usage samples.
/// None of them is recovered: the run stops before the image is written.
#[derive(Debug, Error)]
pub enum UsageError {
    /// The input csv could not be opened or read
    #[error("could not read {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    /// Malformed csv, e.g., a row with a different number of fields
    #[error("invalid csv: {0}")]
    Csv(#[from] csv::Error),

    /// A required column is not in the header (after trimming)
    #[error("missing required column '{column}'")]
    MissingColumn { column: String },

    #[error("line {line}: could not parse timestamp '{value}'")]
    Timestamp { line: u64, value: String },

    #[error("line {line}: could not parse '{value}' in column '{column}' as a number")]
    Number {
        line: u64,
        column: String,
        value: String,
    },

    /// Drawing or png encoding failed, this includes unwritable destinations
    #[error("could not render the chart: {message}")]
    Render { message: String },
}

impl UsageError {
    pub fn missing_column(column: impl Into<String>) -> Self {
        UsageError::MissingColumn {
            column: column.into(),
        }
    }
}

impl<E> From<DrawingAreaErrorKind<E>> for UsageError
where
    E: std::error::Error + Send + Sync,
{
    fn from(e: DrawingAreaErrorKind<E>) -> Self {
        UsageError::Render {
            message: e.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, UsageError>;
