use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{subject} failed validation with {errors} error(s) and {warnings} warning(s)")]
    ValidationFailed {
        subject: String,
        errors: usize,
        warnings: usize,
    },
}

pub type Result<T> = std::result::Result<T, ValidationError>;
