use std::path::PathBuf;

use cohort_codelists::CodelistError;
use cohort_model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StudyError {
    #[error("study definition '{study}' is invalid: {source}")]
    Definition {
        study: String,
        #[source]
        source: ModelError,
    },

    #[error("unknown study '{name}' (expected one of: {})", known.join(", "))]
    UnknownStudy { name: String, known: Vec<String> },

    #[error("flow-chart order is [{}], expected [{}]", found.join(", "), expected.join(", "))]
    FlowChartOrder {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("flow-chart population must be all subjects")]
    FlowChartPopulation,

    #[error("extract file not found: {path}")]
    MissingExtract { path: PathBuf },

    #[error("failed to read extract: {0}")]
    Extract(#[from] CodelistError),

    #[error("extract {path} has no column '{column}'")]
    MissingColumn { path: PathBuf, column: String },

    #[error("row {row} of {path}: '{value}' is not a valid {expected} for '{column}'")]
    InvalidValue {
        path: PathBuf,
        row: usize,
        column: String,
        value: String,
        expected: String,
    },
}

pub type Result<T> = std::result::Result<T, StudyError>;
