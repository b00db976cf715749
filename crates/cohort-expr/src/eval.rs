use std::collections::{BTreeMap, HashMap};

use crate::ast::Expr;
use crate::error::{ExprError, Result};
use crate::value::Value;

/// Source of variable values during evaluation.
///
/// `None` means the name is not defined at all, which is an error.
/// A defined variable with no recorded value returns `Some(Value::Missing)`.
pub trait Scope {
    fn lookup(&self, name: &str) -> Option<Value>;
}

impl Scope for HashMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl Scope for BTreeMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

/// Scope in which every name is defined and every value is missing.
///
/// Models a subject with no records in any source table.
#[derive(Debug, Clone, Copy, Default)]
pub struct MissingScope;

impl Scope for MissingScope {
    fn lookup(&self, _name: &str) -> Option<Value> {
        Some(Value::Missing)
    }
}

impl Expr {
    /// Evaluate the expression to a value.
    ///
    /// `AND` and `OR` short-circuit and yield booleans, as do `NOT` and
    /// comparisons. A bare variable yields its own value.
    pub fn evaluate(&self, scope: &dyn Scope) -> Result<Value> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Variable(name) => scope
                .lookup(name)
                .ok_or_else(|| ExprError::UnknownVariable { name: name.clone() }),
            Expr::Not(inner) => Ok(Value::Bool(!inner.evaluate(scope)?.is_truthy())),
            Expr::And(left, right) => {
                if !left.evaluate(scope)?.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(right.evaluate(scope)?.is_truthy()))
            }
            Expr::Or(left, right) => {
                if left.evaluate(scope)?.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(right.evaluate(scope)?.is_truthy()))
            }
            Expr::Compare { left, op, right } => {
                let left = left.evaluate(scope)?;
                let right = right.evaluate(scope)?;
                Ok(Value::Bool(op.holds(left.compare(&right))))
            }
        }
    }

    /// Evaluate the expression as a condition.
    pub fn is_satisfied(&self, scope: &dyn Scope) -> Result<bool> {
        Ok(self.evaluate(scope)?.is_truthy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn scope(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn unknown_variable_is_an_error() {
        let expr = parse("undefined_thing").unwrap();
        let err = expr.evaluate(&scope(&[])).unwrap_err();
        assert_eq!(
            err,
            ExprError::UnknownVariable {
                name: "undefined_thing".to_string()
            }
        );
    }

    #[test]
    fn short_circuit_skips_unknown_names() {
        let values = scope(&[("flag", Value::Bool(false))]);
        assert!(!parse("flag AND missing_name").unwrap().is_satisfied(&values).unwrap());
        let values = scope(&[("flag", Value::Bool(true))]);
        assert!(parse("flag OR missing_name").unwrap().is_satisfied(&values).unwrap());
    }

    #[test]
    fn comparisons_with_missing_are_false() {
        let expr = parse("bmi != 30").unwrap();
        assert!(!expr.is_satisfied(&MissingScope).unwrap());
        let expr = parse("NOT bmi = 30").unwrap();
        assert!(expr.is_satisfied(&MissingScope).unwrap());
    }
}
