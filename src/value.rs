use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde_json::Value as Json;

/// Represents a single data value stored in a column file.
///
/// Column files are JSON arrays, so every JSON value maps onto one variant.
/// Arrays and objects are kept as an opaque [Value::Composite] and only ever
/// compared through their serialized form.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// represents an empty or missing value.
    Null,
    /// A boolean value.
    Bool(bool),
    /// A 64-bit signed integer value.
    Int(i64),
    /// A 64-bit floating-point value.
    Float(f64),
    /// A UTF-8 string value, wrapped in an [Arc] for cheap cloning.
    Text(Arc<str>),
    /// Any other JSON document (array or object).
    Composite(Json),
}

impl Value {
    /// Returns `true` if the value is [Value::Null].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the inner integer value if this is a [Value::Int].
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Human readable name of the runtime type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "string",
            Self::Composite(_) => "composite",
        }
    }

    /// The normalized text form used by comparisons and LIKE matching.
    ///
    /// ```
    /// # use coldb::Value;
    /// assert_eq!(Value::Null.canonical(), "NULL");
    /// assert_eq!(Value::Float(2.50).canonical(), "2.5");
    /// assert_eq!(Value::Float(3.0).canonical(), "3");
    /// assert_eq!(Value::Bool(true).canonical(), "true");
    /// ```
    pub fn canonical(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => canonical_float(*f),
            Self::Text(s) => s.to_string(),
            Self::Composite(json) => json.to_string(),
        }
    }

    /// Loose equality: numbers compare by value across int/float, everything
    /// else structurally. Used for unique checks and change detection.
    pub fn same_as(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Float(b)) | (Self::Float(b), Self::Int(a)) => (*a as f64) == *b,
            _ => self == other,
        }
    }

    /// Ordering key used by `ORDER BY`.
    pub fn sort_key(&self) -> SortKey {
        SortKey::from_canonical(self.canonical())
    }

    pub fn from_json(json: Json) -> Self {
        match json {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Self::Text(s.into()),
            other => Self::Composite(other),
        }
    }

    pub fn to_json(&self) -> Json {
        match self {
            Self::Null => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Int(i) => Json::from(*i),
            Self::Float(f) => Json::from(*f),
            Self::Text(s) => Json::String(s.to_string()),
            Self::Composite(json) => json.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// Renders like C's `%f` then drops trailing zeros and a dangling dot.
fn canonical_float(f: f64) -> String {
    let mut text = format!("{f:.6}");
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed);
    }
    text
}

/// Compares two canonical texts: numerically when both sides are numbers
/// (as floats if either contains a dot), otherwise byte-wise.
pub fn compare_canonical(left: &str, right: &str) -> Ordering {
    let (l, r) = (left.trim(), right.trim());
    if l.contains('.') || r.contains('.') {
        if let (Ok(a), Ok(b)) = (l.parse::<f64>(), r.parse::<f64>()) {
            if let Some(ord) = a.partial_cmp(&b) {
                return ord;
            }
        }
    } else if let (Ok(a), Ok(b)) = (l.parse::<i64>(), r.parse::<i64>()) {
        return a.cmp(&b);
    }
    left.cmp(right)
}

/// A total order over canonical texts: numbers first (by value), then text.
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    Int(i64),
    Float(f64),
    Text(String),
}

impl SortKey {
    fn from_canonical(text: String) -> Self {
        let trimmed = text.trim();
        if trimmed.contains('.') {
            if let Ok(f) = trimmed.parse::<f64>() {
                if !f.is_nan() {
                    return Self::Float(f);
                }
            }
        } else if let Ok(i) = trimmed.parse::<i64>() {
            return Self::Int(i);
        }
        Self::Text(text)
    }

    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Int(a), Self::Float(b)) => (*a as f64).total_cmp(b),
            (Self::Float(a), Self::Int(b)) => a.total_cmp(&(*b as f64)),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Text(_), _) => Ordering::Greater,
            (_, Self::Text(_)) => Ordering::Less,
        }
    }
}

/// Turns a raw literal from an INSERT or SET clause into a [Value].
///
/// ```
/// # use coldb::value::{classify_literal, Value};
/// assert_eq!(classify_literal("NULL"), Value::Null);
/// assert_eq!(classify_literal("TRUE"), Value::Bool(true));
/// assert_eq!(classify_literal("'Alice'"), Value::Text("Alice".into()));
/// assert_eq!(classify_literal("-42"), Value::Int(-42));
/// assert_eq!(classify_literal("1.5"), Value::Float(1.5));
/// assert_eq!(classify_literal("hello"), Value::Text("hello".into()));
/// ```
pub fn classify_literal(raw: &str) -> Value {
    let raw = raw.trim();
    match raw {
        "NULL" | "null" => return Value::Null,
        "true" | "TRUE" => return Value::Bool(true),
        "false" | "FALSE" => return Value::Bool(false),
        _ => {}
    }
    if raw.len() >= 2
        && ((raw.starts_with('\'') && raw.ends_with('\''))
            || (raw.starts_with('"') && raw.ends_with('"')))
    {
        return Value::Text(raw[1..raw.len() - 1].into());
    }
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if all_digits(digits) {
        if let Ok(i) = raw.parse::<i64>() {
            return Value::Int(i);
        }
    } else if let Some((int_part, frac_part)) = digits.split_once('.') {
        if all_digits(int_part) && all_digits(frac_part) {
            if let Ok(f) = raw.parse::<f64>() {
                return Value::Float(f);
            }
        }
    }
    Value::Text(raw.into())
}
