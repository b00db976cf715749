//! Ordered first-match categorisation.
//!
//! A categorisation is a list of `(label, condition)` rules tried in
//! declared order plus one default label. Overlapping conditions are
//! resolved by declaration order, so the rules are kept in a `Vec` and
//! never in a map.

use std::collections::{BTreeSet, HashSet};

use serde::{Serialize, Serializer};

use cohort_expr::{Expr, ExprError, Scope};

use crate::error::{ModelError, Result};
use crate::expectations::Expectations;
use crate::patients::WithExpectations;
use crate::query::Query;
use crate::variable::Variable;

/// Source text marking the fallback category.
pub const DEFAULT_MARKER: &str = "DEFAULT";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryRule {
    pub label: String,
    #[serde(serialize_with = "serialize_expr")]
    pub condition: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Categorisation {
    rules: Vec<CategoryRule>,
    default: String,
    /// Every label in declared order, the default included.
    declared: Vec<String>,
    sub_variables: Vec<Variable>,
    #[serde(skip_serializing_if = "Expectations::is_empty")]
    expectations: Expectations,
}

impl Categorisation {
    /// Build from declared `(label, source)` pairs.
    ///
    /// Exactly one source must be `DEFAULT`; it may appear in any position.
    pub fn new(declared: &[(&str, &str)]) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut defaults = Vec::new();
        let mut rules = Vec::new();
        for (label, source) in declared {
            let label = label.trim();
            if !seen.insert(label) {
                return Err(ModelError::DuplicateCategory {
                    label: label.to_string(),
                });
            }
            if source.trim() == DEFAULT_MARKER {
                defaults.push(label.to_string());
                continue;
            }
            let condition = cohort_expr::parse(source).map_err(|source| {
                ModelError::InvalidCondition {
                    label: label.to_string(),
                    source,
                }
            })?;
            rules.push(CategoryRule {
                label: label.to_string(),
                condition,
            });
        }

        let default = match defaults.as_slice() {
            [] => return Err(ModelError::MissingDefault),
            [only] => only.clone(),
            many => {
                return Err(ModelError::MultipleDefaults {
                    labels: many.join(", "),
                });
            }
        };

        Ok(Self {
            rules,
            default,
            declared: declared
                .iter()
                .map(|(label, _)| label.trim().to_string())
                .collect(),
            sub_variables: Vec::new(),
            expectations: Expectations::default(),
        })
    }

    /// Attach a sub-variable the conditions may reference.
    #[must_use]
    pub fn with_sub_variable(mut self, name: &str, query: impl Into<Query>) -> Self {
        self.sub_variables.push(Variable::new(name, query));
        self
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    pub fn default_label(&self) -> &str {
        &self.default
    }

    /// Labels in declared order, the default included.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.declared.iter().map(String::as_str)
    }

    pub fn sub_variables(&self) -> &[Variable] {
        &self.sub_variables
    }

    pub fn expectations(&self) -> &Expectations {
        &self.expectations
    }

    /// Every name the conditions read.
    pub fn references(&self) -> BTreeSet<String> {
        self.rules
            .iter()
            .flat_map(|rule| rule.condition.variables())
            .collect()
    }

    /// Label of the first rule whose condition holds, else the default.
    pub fn evaluate(&self, scope: &dyn Scope) -> std::result::Result<&str, ExprError> {
        for rule in &self.rules {
            if rule.condition.is_satisfied(scope)? {
                return Ok(&rule.label);
            }
        }
        Ok(&self.default)
    }
}

impl WithExpectations for Categorisation {
    fn expectations_mut(&mut self) -> &mut Expectations {
        &mut self.expectations
    }
}

pub(crate) fn serialize_expr<S: Serializer>(
    expr: &Expr,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(expr)
}
