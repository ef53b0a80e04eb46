//! Analyzer error types

use feedback_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("the source table does not contain column \"{column}\"")]
    MissingColumn { column: String },

    #[error("analysis returned no text segment for record {record}")]
    MissingTextSegment { record: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    App(#[from] AppError),
}
