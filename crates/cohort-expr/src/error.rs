use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    #[error("empty expression")]
    Empty,

    #[error("invalid expression at offset {offset}: unexpected input near `{near}`")]
    Parse { offset: usize, near: String },

    #[error("invalid expression: unexpected end of input")]
    UnexpectedEnd,

    #[error("unknown variable `{name}`")]
    UnknownVariable { name: String },
}

pub type Result<T> = std::result::Result<T, ExprError>;
