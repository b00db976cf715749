//! Parser for the condition language.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! or         := and ("OR" and)*
//! and        := not ("AND" not)*
//! not        := "NOT" not | comparison
//! comparison := primary (op primary)?
//! primary    := "(" or ")" | literal | identifier
//! op         := "=" | "==" | "!=" | "<>" | "<" | "<=" | ">" | ">="
//! literal    := 'text' | "text" | integer | decimal | TRUE | FALSE
//! ```
//!
//! Keywords are case-insensitive and may span lines, since study authors
//! write long conditions as indented multi-line strings.

use std::str::FromStr;

use nom::IResult;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_while};
use nom::character::complete::{char, digit1, multispace0, satisfy};
use nom::combinator::{all_consuming, map, opt, recognize, value, verify};
use nom::error::{Error as NomError, ErrorKind};
use nom::multi::many0;
use nom::sequence::{delimited, pair, preceded, tuple};

use crate::ast::{CompareOp, Expr};
use crate::error::{ExprError, Result};
use crate::value::Value;

const KEYWORDS: &[&str] = &["AND", "OR", "NOT", "TRUE", "FALSE"];

/// Parse a condition expression.
pub fn parse(input: &str) -> Result<Expr> {
    if input.trim().is_empty() {
        return Err(ExprError::Empty);
    }
    match all_consuming(delimited(multispace0, or_expr, multispace0))(input) {
        Ok((_, expr)) => Ok(expr),
        Err(nom::Err::Error(err) | nom::Err::Failure(err)) => {
            let near: String = err.input.trim_start().chars().take(24).collect();
            if near.is_empty() {
                return Err(ExprError::UnexpectedEnd);
            }
            Err(ExprError::Parse {
                offset: input.len() - err.input.trim_start().len(),
                near,
            })
        }
        Err(nom::Err::Incomplete(_)) => Err(ExprError::UnexpectedEnd),
    }
}

impl FromStr for Expr {
    type Err = ExprError;

    fn from_str(s: &str) -> Result<Self> {
        parse(s)
    }
}

fn or_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = and_expr(input)?;
    let (input, rest) = many0(preceded(keyword("OR"), and_expr))(input)?;
    Ok((input, rest.into_iter().fold(first, Expr::or)))
}

fn and_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = not_expr(input)?;
    let (input, rest) = many0(preceded(keyword("AND"), not_expr))(input)?;
    Ok((input, rest.into_iter().fold(first, Expr::and)))
}

fn not_expr(input: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(keyword("NOT"), not_expr), Expr::not),
        comparison,
    ))(input)
}

fn comparison(input: &str) -> IResult<&str, Expr> {
    let (input, left) = primary(input)?;
    let (input, tail) = opt(pair(
        delimited(multispace0, compare_op, multispace0),
        primary,
    ))(input)?;
    let expr = match tail {
        Some((op, right)) => left.compare(op, right),
        None => left,
    };
    Ok((input, expr))
}

fn primary(input: &str) -> IResult<&str, Expr> {
    delimited(
        multispace0,
        alt((
            delimited(char('('), or_expr, preceded(multispace0, char(')'))),
            map(literal, Expr::Literal),
            map(identifier, Expr::variable),
        )),
        multispace0,
    )(input)
}

fn compare_op(input: &str) -> IResult<&str, CompareOp> {
    alt((
        value(CompareOp::Le, tag("<=")),
        value(CompareOp::Ge, tag(">=")),
        value(CompareOp::Ne, tag("!=")),
        value(CompareOp::Ne, tag("<>")),
        value(CompareOp::Eq, tag("==")),
        value(CompareOp::Eq, tag("=")),
        value(CompareOp::Lt, tag("<")),
        value(CompareOp::Gt, tag(">")),
    ))(input)
}

fn literal(input: &str) -> IResult<&str, Value> {
    alt((string_literal, number_literal, boolean_literal))(input)
}

fn string_literal(input: &str) -> IResult<&str, Value> {
    map(
        alt((
            delimited(char('\''), take_while(|c: char| c != '\''), char('\'')),
            delimited(char('"'), take_while(|c: char| c != '"'), char('"')),
        )),
        Value::from,
    )(input)
}

fn number_literal(input: &str) -> IResult<&str, Value> {
    let (rest, text) = recognize(tuple((
        opt(char('-')),
        digit1,
        opt(pair(char('.'), digit1)),
    )))(input)?;
    let parsed = if text.contains('.') {
        text.parse::<f64>().ok().map(Value::Float)
    } else {
        text.parse::<i64>().ok().map(Value::Int)
    };
    match parsed {
        Some(value) => Ok((rest, value)),
        None => Err(nom::Err::Error(NomError::new(input, ErrorKind::Digit))),
    }
}

fn boolean_literal(input: &str) -> IResult<&str, Value> {
    alt((
        value(Value::Bool(true), exact_word("TRUE")),
        value(Value::Bool(false), exact_word("FALSE")),
    ))(input)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    verify(word, |w: &str| !is_keyword(w))(input)
}

fn word(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

fn exact_word<'a>(expected: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    verify(word, move |w: &str| w.eq_ignore_ascii_case(expected))
}

fn keyword<'a>(expected: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    preceded(multispace0, exact_word(expected))
}

fn is_keyword(word: &str) -> bool {
    KEYWORDS.iter().any(|kw| word.eq_ignore_ascii_case(kw))
}
