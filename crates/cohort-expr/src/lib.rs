//! Condition language used by categorisation rules and population filters.
//!
//! Conditions are boolean expressions over named variables, for example
//! `most_recent_smoking_code = 'N' AND ever_smoked`. This crate parses
//! them into an [`Expr`] tree and evaluates that tree against a [`Scope`].

pub mod ast;
pub mod error;
pub mod eval;
pub mod parser;
pub mod value;

pub use ast::{CompareOp, Expr};
pub use error::{ExprError, Result};
pub use eval::{MissingScope, Scope};
pub use parser::parse;
pub use value::Value;
