use crate::value::Value;

/// The type family a declared column type belongs to.
/// Declared types are free text in the schema, only the family is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// `INT` / `INTEGER`: 64-bit signed integers.
    Int,
    /// `FLOAT` / `DOUBLE` / `REAL`: integers or floating-point numbers.
    Float,
    /// `BOOL` / `BOOLEAN`.
    Bool,
    /// Any other declared type is stored as text.
    Text,
}

impl DataType {
    /// Classifies a declared type string such as `"INT"` or `"VARCHAR(20)"`.
    pub fn from_declared(declared: &str) -> Self {
        let base = declared.split('(').next().unwrap_or_default();
        match base.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" => Self::Int,
            "float" | "double" | "real" => Self::Float,
            "bool" | "boolean" => Self::Bool,
            _ => Self::Text,
        }
    }

    /// Returns true if a non-null `value` may be stored in a column of this family.
    /// `NULL` is accepted by every family, nullability is checked separately.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::Int, Value::Int(_)) => true,
            (Self::Float, Value::Int(_) | Value::Float(_)) => true,
            (Self::Bool, Value::Bool(_)) => true,
            (Self::Text, Value::Text(_)) => true,
            _ => false,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Int => "integer",
            Self::Float => "float",
            Self::Bool => "boolean",
            Self::Text => "string",
        }
    }
}
