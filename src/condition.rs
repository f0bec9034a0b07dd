//! WHERE-clause grammar: a single `column operator literal` comparison.

use std::fmt;

use crate::error::{Error, Result};
use crate::tokenizer::{Token, TokenStream, Tokenizer};

/// The comparison operators a condition may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    /// `=` or `==`
    Eq,
    /// `!=`
    NotEq,
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `>=`
    GtEq,
    /// `<=`
    LtEq,
    /// `LIKE`, matched case-insensitively
    Like,
}

impl ComparisonOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::GtEq => ">=",
            Self::LtEq => "<=",
            Self::Like => "like",
        }
    }

    /// Maps an operator token, `==` is folded into `=`.
    ///
    /// # Errors
    /// Returns [Error::UnsupportedOperator] for a run of `=!<>` outside the supported set.
    fn from_token(token: &Token) -> Result<Self> {
        match token {
            Token::Equal | Token::DoubleEqual => Ok(Self::Eq),
            Token::NotEqual => Ok(Self::NotEq),
            Token::Greater => Ok(Self::Gt),
            Token::Lower => Ok(Self::Lt),
            Token::GreaterEqual => Ok(Self::GtEq),
            Token::LowerEqual => Ok(Self::LtEq),
            Token::Like => Ok(Self::Like),
            Token::UnknownOperator(op) => Err(Error::UnsupportedOperator(op.clone())),
            other => Err(Error::ConditionSyntax(format!(
                "expected a comparison operator, found {other}"
            ))),
        }
    }
}

/// A parsed WHERE condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Column name as written; resolved against the schema before execution.
    pub column: String,
    pub op: ComparisonOp,
    /// The literal as text, quotes already removed.
    pub literal: String,
}

impl Condition {
    pub fn new(column: impl Into<String>, op: ComparisonOp, literal: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            op,
            literal: literal.into(),
        }
    }

    /// Parses one comparison starting at token `start` and returns it together
    /// with the number of tokens consumed. Trailing tokens are left to the caller.
    ///
    /// The column may be spelled like a keyword (`desc`, `order`). An unquoted
    /// literal runs over every token glued to it, so `12abc` or `2024-01-05`
    /// stay one literal.
    pub(crate) fn parse_tokens(stream: &TokenStream, start: usize) -> Result<(Self, usize)> {
        let mut position = start;

        let column = match stream.token(position) {
            token if token.is_name() => stream.text(position..position + 1),
            other => {
                return Err(Error::ConditionSyntax(format!(
                    "expected a column name, found {other}"
                )));
            }
        };
        position += 1;

        let op = ComparisonOp::from_token(stream.token(position))?;
        position += 1;

        let literal = match stream.token(position) {
            Token::String(s) => {
                position += 1;
                s.clone()
            }
            token if is_bare(token) => {
                let first = position;
                position += 1;
                while is_bare(stream.token(position)) && stream.is_adjacent(position) {
                    position += 1;
                }
                let literal = stream.text(first..position);
                if literal == "-" {
                    return Err(Error::ConditionSyntax(format!(
                        "expected a number after '-', found {}",
                        stream.token(position)
                    )));
                }
                literal
            }
            other => {
                return Err(Error::ConditionSyntax(format!(
                    "expected a literal, found {other}"
                )));
            }
        };

        Ok((Self { column, op, literal }, position - start))
    }
}

/// Tokens an unquoted literal can be made of.
fn is_bare(token: &Token) -> bool {
    matches!(
        token,
        Token::Number(_) | Token::Minus | Token::Star | Token::Symbol(_)
    ) || token.is_name()
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.column, self.op.symbol(), self.literal)
    }
}

/// Parses a standalone condition such as `age >= 25` or `name LIKE 'Jo%'`.
///
/// Only a single comparison is accepted: boolean connectives fail with
/// [Error::ConditionSyntax].
///
/// ```
/// # use coldb::condition::{parse_condition, ComparisonOp};
/// let cond = parse_condition("name LIKE 'Jo%'").unwrap();
/// assert_eq!(cond.column, "name");
/// assert_eq!(cond.op, ComparisonOp::Like);
/// assert_eq!(cond.literal, "Jo%");
/// ```
pub fn parse_condition(input: &str) -> Result<Condition> {
    if input.trim().is_empty() {
        return Err(Error::ConditionSyntax("empty condition".into()));
    }
    let stream = Tokenizer::new(input).tokenize_stream().map_err(|e| match e {
        Error::StatementSyntax(msg) => Error::ConditionSyntax(msg),
        other => other,
    })?;

    let (condition, consumed) = Condition::parse_tokens(&stream, 0)?;
    let rest = &stream.tokens()[consumed.min(stream.len())..];
    match rest {
        [Token::Eof] | [Token::Semicolon, Token::Eof] => Ok(condition),
        [token, ..] => Err(Error::ConditionSyntax(format!(
            "unexpected {token} after condition, expected: column operator value"
        ))),
        [] => Ok(condition),
    }
}
