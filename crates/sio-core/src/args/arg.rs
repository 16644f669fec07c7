//! Event arguments
//!
//! `Arg` is the value handed to and returned from handlers. It is JSON
//! plus two extra cases: raw bytes, which travel as binary attachments, and
//! `Absent`, which fills declared parameter slots the peer did not send.

use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

const PLACEHOLDER_KEY: &str = "_placeholder";
const PLACEHOLDER_NUM: &str = "num";

/// A single event argument
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Arg {
    /// Declared by the handler but not supplied by the peer
    #[default]
    Absent,
    /// JSON `null`
    Null,
    /// JSON boolean
    Bool(bool),
    /// JSON number
    Number(Number),
    /// JSON string
    String(String),
    /// Raw bytes carried as a binary attachment
    Binary(Vec<u8>),
    /// JSON array
    Array(Vec<Arg>),
    /// JSON object
    Object(BTreeMap<String, Arg>),
}

impl Arg {
    /// Build an argument from a JSON value, resolving attachment
    /// placeholders against `attachments`.
    #[must_use]
    pub fn from_value(value: Value, attachments: &[Vec<u8>]) -> Self {
        if let Some(bytes) = placeholder_index(&value).and_then(|i| attachments.get(i)) {
            return Self::Binary(bytes.clone());
        }

        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(
                items
                    .into_iter()
                    .map(|item| Self::from_value(item, attachments))
                    .collect(),
            ),
            Value::Object(map) => Self::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from_value(v, attachments)))
                    .collect(),
            ),
        }
    }

    /// Convert to JSON, moving binary payloads into `attachments` and
    /// leaving placeholders in their place. `Absent` encodes as `null`.
    #[must_use]
    pub fn into_value(self, attachments: &mut Vec<Vec<u8>>) -> Value {
        match self {
            Self::Absent | Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(b),
            Self::Number(n) => Value::Number(n),
            Self::String(s) => Value::String(s),
            Self::Binary(bytes) => {
                attachments.push(bytes);
                placeholder(attachments.len() - 1)
            }
            Self::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| item.into_value(attachments))
                    .collect(),
            ),
            Self::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, v.into_value(attachments)))
                    .collect::<Map<_, _>>(),
            ),
        }
    }

    /// Short name of this argument's kind
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Binary(_) => "binary",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    /// Check if the slot was not supplied
    #[must_use]
    pub const fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Check if the slot is absent or `null`
    #[must_use]
    pub const fn is_nullish(&self) -> bool {
        matches!(self, Self::Absent | Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Number(n) => n.as_u64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Arg]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Arg>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }
}

/// JSON kind name used in decode errors
pub(crate) const fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Attachment placeholder for attachment `num`
#[must_use]
pub fn placeholder(num: usize) -> Value {
    let mut map = Map::with_capacity(2);
    map.insert(PLACEHOLDER_KEY.to_string(), Value::Bool(true));
    map.insert(PLACEHOLDER_NUM.to_string(), Value::from(num));
    Value::Object(map)
}

/// The attachment index referenced by `value`, if it is a placeholder
#[must_use]
pub fn placeholder_index(value: &Value) -> Option<usize> {
    let map = value.as_object()?;
    if map.len() != 2 || map.get(PLACEHOLDER_KEY) != Some(&Value::Bool(true)) {
        return None;
    }
    map.get(PLACEHOLDER_NUM)
        .and_then(Value::as_u64)
        .and_then(|n| usize::try_from(n).ok())
}

/// Encode outgoing arguments into JSON values and attachments
#[must_use]
pub fn encode_args(args: Vec<Arg>) -> (Vec<Value>, Vec<Vec<u8>>) {
    let mut attachments = Vec::new();
    let values = args
        .into_iter()
        .map(|arg| arg.into_value(&mut attachments))
        .collect();
    (values, attachments)
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for Arg {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Arg {
    fn from(value: i32) -> Self {
        Self::Number(value.into())
    }
}

impl From<i64> for Arg {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<u32> for Arg {
    fn from(value: u32) -> Self {
        Self::Number(value.into())
    }
}

impl From<u64> for Arg {
    fn from(value: u64) -> Self {
        Self::Number(value.into())
    }
}

impl From<usize> for Arg {
    fn from(value: usize) -> Self {
        Self::Number(value.into())
    }
}

impl From<f64> for Arg {
    /// Non-finite floats have no JSON form and become `Null`.
    fn from(value: f64) -> Self {
        Number::from_f64(value).map_or(Self::Null, Self::Number)
    }
}

impl From<Vec<u8>> for Arg {
    fn from(value: Vec<u8>) -> Self {
        Self::Binary(value)
    }
}

impl From<&[u8]> for Arg {
    fn from(value: &[u8]) -> Self {
        Self::Binary(value.to_vec())
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Self::from_value(value, &[])
    }
}

impl From<Vec<Arg>> for Arg {
    fn from(value: Vec<Arg>) -> Self {
        Self::Array(value)
    }
}

impl<T: Into<Arg>> From<Option<T>> for Arg {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl std::fmt::Display for Arg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Absent => write!(f, "<absent>"),
            Self::Binary(bytes) => write!(f, "<binary {} bytes>", bytes.len()),
            other => {
                let mut scratch = Vec::new();
                write!(f, "{}", other.clone().into_value(&mut scratch))
            }
        }
    }
}
