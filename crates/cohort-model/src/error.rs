use cohort_expr::ExprError;
use thiserror::Error;

use crate::system::CodingSystem;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("unknown coding system `{input}` (expected icd10, ctv3 or snomed)")]
    UnknownCodingSystem { input: String },

    #[error("codelist contains an empty code")]
    EmptyCode,

    #[error("duplicate code `{code}` in codelist")]
    DuplicateCode { code: String },

    #[error("cannot combine a {found} codelist with {expected} codelists")]
    SystemMismatch {
        expected: CodingSystem,
        found: CodingSystem,
    },

    #[error("code `{code}` is assigned to both category `{first}` and `{second}`")]
    ConflictingCategory {
        code: String,
        first: String,
        second: String,
    },

    #[error("cannot filter an uncategorised codelist by category")]
    NoCategories,

    #[error("cannot combine an empty list of codelists")]
    EmptyCombination,

    #[error("invalid date expression `{input}`")]
    InvalidDateExpr { input: String },

    #[error("unknown date format `{input}` (expected YYYY, YYYY-MM or YYYY-MM-DD)")]
    InvalidDateFormat { input: String },

    #[error("date expression `{expr}` falls outside the supported calendar range")]
    DateOutOfRange { expr: String },

    #[error("categorisation has no DEFAULT category")]
    MissingDefault,

    #[error("categorisation declares more than one DEFAULT category: {labels}")]
    MultipleDefaults { labels: String },

    #[error("category `{label}` is declared more than once")]
    DuplicateCategory { label: String },

    #[error("invalid condition for `{label}`: {source}")]
    InvalidCondition {
        label: String,
        #[source]
        source: ExprError,
    },

    #[error("variable `{name}` is defined more than once")]
    DuplicateVariable { name: String },

    #[error("sub-variable `{name}` of `{parent}` shadows a top-level variable")]
    SubVariableShadowsColumn { parent: String, name: String },

    #[error("sub-variable `{name}` of `{parent}` is itself a categorisation")]
    NestedCategorisation { parent: String, name: String },

    #[error("study definition `{study}` has no population")]
    MissingPopulation { study: String },

    #[error("dependency cycle between variables: {}", cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },

    #[error("variable `{name}`: {source}")]
    InVariable {
        name: String,
        #[source]
        source: Box<ModelError>,
    },
}

impl ModelError {
    pub(crate) fn in_variable(name: impl Into<String>, source: ModelError) -> Self {
        Self::InVariable {
            name: name.into(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_error_names_the_variable() {
        let err = ModelError::in_variable(
            "smoking_status",
            ModelError::DuplicateCategory {
                label: "S".to_string(),
            },
        );
        assert_eq!(
            err.to_string(),
            "variable `smoking_status`: category `S` is declared more than once"
        );
    }

    #[test]
    fn cycle_lists_the_path() {
        let err = ModelError::DependencyCycle {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "dependency cycle between variables: a -> b -> a");
    }
}
