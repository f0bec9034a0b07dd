use std::cmp::Ordering;

use regex::{Regex, RegexBuilder};

use crate::condition::{ComparisonOp, Condition};
use crate::value::{Value, compare_canonical};

/// A [Condition] ready to be evaluated against stored values.
///
/// `LIKE` patterns are translated and compiled once, when the predicate is built.
#[derive(Debug, Clone)]
pub struct Predicate {
    condition: Condition,
    literal: String,
    like: Option<Regex>,
}

impl Predicate {
    pub fn new(condition: Condition) -> Self {
        let literal = strip_quotes(&condition.literal).to_string();
        let like = match condition.op {
            ComparisonOp::Like => like_regex(&literal),
            _ => None,
        };
        Self {
            condition,
            literal,
            like,
        }
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    /// Name of the column this predicate reads.
    pub fn column(&self) -> &str {
        &self.condition.column
    }

    /// Evaluates the predicate against one stored value.
    pub fn matches(&self, value: &Value) -> bool {
        let field = value.canonical();
        let literal = self.literal.as_str();

        match self.condition.op {
            ComparisonOp::Eq => equals(&field, literal),
            ComparisonOp::NotEq => !equals(&field, literal),
            ComparisonOp::Gt => compare_canonical(&field, literal) == Ordering::Greater,
            ComparisonOp::Lt => compare_canonical(&field, literal) == Ordering::Less,
            ComparisonOp::GtEq => {
                equals(&field, literal) || compare_canonical(&field, literal) == Ordering::Greater
            }
            ComparisonOp::LtEq => {
                equals(&field, literal) || compare_canonical(&field, literal) == Ordering::Less
            }
            ComparisonOp::Like => self
                .like
                .as_ref()
                .is_some_and(|regex| regex.is_match(&field)),
        }
    }
}

/// Evaluates `condition` against `value`.
///
/// ```
/// # use coldb::{Value, condition::parse_condition, predicate::evaluate};
/// let cond = parse_condition("age > 9").unwrap();
/// assert!(evaluate(&Value::Int(10), &cond));
/// assert!(!evaluate(&Value::Int(8), &cond));
/// ```
pub fn evaluate(value: &Value, condition: &Condition) -> bool {
    Predicate::new(condition.clone()).matches(value)
}

fn equals(field: &str, literal: &str) -> bool {
    if literal.eq_ignore_ascii_case("null") {
        return field == "NULL" || field.is_empty();
    }
    field.trim() == literal.trim()
}

fn strip_quotes(literal: &str) -> &str {
    let quoted = literal.len() >= 2
        && ((literal.starts_with('\'') && literal.ends_with('\''))
            || (literal.starts_with('"') && literal.ends_with('"')));
    if quoted {
        &literal[1..literal.len() - 1]
    } else {
        literal
    }
}

/// Translates a LIKE pattern into an anchored, case-insensitive regex:
/// `%` matches any sequence, `_` any single character.
fn like_regex(pattern: &str) -> Option<Regex> {
    let mut translated = String::with_capacity(pattern.len() + 8);
    translated.push('^');
    for ch in pattern.chars() {
        match ch {
            '%' => translated.push_str(".*"),
            '_' => translated.push('.'),
            other => translated.push_str(&regex::escape(&other.to_string())),
        }
    }
    translated.push('$');

    match RegexBuilder::new(&translated).case_insensitive(true).build() {
        Ok(regex) => Some(regex),
        Err(e) => {
            log::warn!("invalid LIKE pattern {pattern:?}: {e}");
            None
        }
    }
}
