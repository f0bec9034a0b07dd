use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value as Json};

use crate::error::{Error, Result};
use crate::value::Value;

/// Reads the persisted sequence of one column.
///
/// A column file holds a single JSON object `{"<name>": [v0, v1, ...]}`.
/// An empty file is an empty column.
///
/// # Errors
/// Returns [Error::Io] if the file cannot be read and [Error::Corrupt] if it is
/// not a JSON object holding an array under `name`.
pub fn read_column(path: &Path, name: &str) -> Result<Vec<Value>> {
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(vec![]);
    }

    let document: Json = serde_json::from_slice(&bytes).map_err(|e| Error::corrupt(path, e))?;
    let Json::Object(mut object) = document else {
        return Err(Error::corrupt(path, "expected a JSON object"));
    };
    match object.remove(name) {
        Some(Json::Array(items)) => Ok(items.into_iter().map(Value::from_json).collect()),
        Some(_) => Err(Error::corrupt(
            path,
            format!("entry {name:?} is not an array"),
        )),
        None => Err(Error::corrupt(path, format!("missing entry {name:?}"))),
    }
}

/// Serializes a column as `{"<name>": [...]}`, the same shape [read_column] expects.
///
/// ```
/// # use coldb::{Value, column::encode_column};
/// let bytes = encode_column("age", &[Value::Int(3), Value::Null]).unwrap();
/// let text = String::from_utf8(bytes).unwrap();
/// assert_eq!(text, "{\n    \"age\": [\n        3,\n        null\n    ]\n}");
/// ```
pub fn encode_column(name: &str, values: &[Value]) -> Result<Vec<u8>> {
    let mut object = Map::new();
    object.insert(
        name.to_string(),
        Json::Array(values.iter().map(Value::to_json).collect()),
    );
    to_pretty_json(&Json::Object(object))
}

/// JSON with four-space indentation, the layout of every file the engine writes.
pub(crate) fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| Error::corrupt("<memory>", e))?;
    Ok(out)
}
