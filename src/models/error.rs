use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Malformed input at row {row}: {reason}")]
    MalformedInput { row: usize, reason: String },

    #[error("No records to group by {key}")]
    InsufficientHistory { key: &'static str },

    #[error("No training rows dated before {cutoff}")]
    EmptyTrainingSet { cutoff: NaiveDate },

    #[error("No fixtures to predict on or after {cutoff}")]
    EmptyInferenceSet { cutoff: NaiveDate },

    #[error("Fixture not found: {fixture_id}")]
    NotFound { fixture_id: String },

    #[error("Classifier failed: {0}")]
    Classifier(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
