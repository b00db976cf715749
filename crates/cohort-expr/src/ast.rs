use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use crate::value::Value;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    /// Whether the operator holds for an ordering. Incomparable operands
    /// (`None`) never satisfy any operator, including `!=`.
    pub fn holds(&self, ordering: Option<Ordering>) -> bool {
        let Some(ordering) = ordering else {
            return false;
        };
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed condition expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Variable(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        left: Box<Expr>,
        op: CompareOp,
        right: Box<Expr>,
    },
}

impl Expr {
    pub fn variable(name: impl Into<String>) -> Self {
        Expr::Variable(name.into())
    }

    #[must_use]
    pub fn and(self, rhs: Self) -> Self {
        Expr::And(Box::new(self), Box::new(rhs))
    }

    #[must_use]
    pub fn or(self, rhs: Self) -> Self {
        Expr::Or(Box::new(self), Box::new(rhs))
    }

    #[must_use]
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    #[must_use]
    pub fn compare(self, op: CompareOp, rhs: Self) -> Self {
        Expr::Compare {
            left: Box::new(self),
            op,
            right: Box::new(rhs),
        }
    }

    /// Names of every variable the expression reads.
    pub fn variables(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables(&self, names: &mut BTreeSet<String>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Variable(name) => {
                names.insert(name.clone());
            }
            Expr::Not(inner) => inner.collect_variables(names),
            Expr::And(left, right) | Expr::Or(left, right) => {
                left.collect_variables(names);
                right.collect_variables(names);
            }
            Expr::Compare { left, right, .. } => {
                left.collect_variables(names);
                right.collect_variables(names);
            }
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Or(..) => 1,
            Expr::And(..) => 2,
            Expr::Not(_) => 3,
            Expr::Compare { .. } => 4,
            Expr::Literal(_) | Expr::Variable(_) => 5,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, parent: u8) -> fmt::Result {
        if self.precedence() < parent {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let own = self.precedence();
        match self {
            Expr::Literal(value) => write!(f, "{value}"),
            Expr::Variable(name) => f.write_str(name),
            Expr::Not(inner) => {
                f.write_str("NOT ")?;
                inner.fmt_operand(f, own)
            }
            Expr::And(left, right) => {
                left.fmt_operand(f, own)?;
                f.write_str(" AND ")?;
                right.fmt_operand(f, own)
            }
            Expr::Or(left, right) => {
                left.fmt_operand(f, own)?;
                f.write_str(" OR ")?;
                right.fmt_operand(f, own)
            }
            Expr::Compare { left, op, right } => {
                left.fmt_operand(f, own + 1)?;
                write!(f, " {op} ")?;
                right.fmt_operand(f, own + 1)
            }
        }
    }
}
