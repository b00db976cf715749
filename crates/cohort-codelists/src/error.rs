use std::path::PathBuf;

use cohort_model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodelistError {
    #[error("codelist source file not found: {path}")]
    MissingSourceFile { path: PathBuf },

    #[error("column '{column}' not found in {path} (available: {})", available.join(", "))]
    SchemaMismatch {
        path: PathBuf,
        column: String,
        available: Vec<String>,
    },

    #[error("failed to read CSV {path}: {message}")]
    Csv { path: PathBuf, message: String },

    #[error("codelist '{name}' is registered more than once")]
    DuplicateName { name: String },

    #[error("no codelist registered as '{name}'")]
    UnknownCodelist { name: String },

    #[error("invalid codelist '{name}': {source}")]
    Invalid {
        name: String,
        #[source]
        source: ModelError,
    },

    #[error("cannot resolve codelist reference '{reference}': {source}")]
    Resolve {
        reference: String,
        #[source]
        source: ModelError,
    },
}

impl CodelistError {
    pub(crate) fn csv(path: impl Into<PathBuf>, err: &csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CodelistError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_mismatch_lists_available_headers() {
        let err = CodelistError::SchemaMismatch {
            path: PathBuf::from("codelists/opensafely-ethnicity.csv"),
            column: "CTV3Code".to_string(),
            available: vec!["Code".to_string(), "Grouping_6".to_string()],
        };
        insta::assert_snapshot!(
            err.to_string(),
            @"column 'CTV3Code' not found in codelists/opensafely-ethnicity.csv (available: Code, Grouping_6)"
        );
    }
}
