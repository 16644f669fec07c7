//! Declared argument shapes
//!
//! Handlers declare one `ArgShape` per parameter when they are registered.
//! Inbound JSON is checked against those shapes positionally.

use super::arg::{placeholder_index, value_kind, Arg};
use crate::error::ArgumentDecodeError;
use serde_json::Value;

/// Expected shape of one handler parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgShape {
    /// Any JSON value or binary attachment
    Any,
    Bool,
    /// Any JSON number
    Number,
    /// A JSON number representable as `i64` or `u64`
    Integer,
    String,
    /// A binary attachment
    Binary,
    Array,
    Object,
}

impl ArgShape {
    /// Get the name of this shape
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Bool => "bool",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::String => "string",
            Self::Binary => "binary",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// Decode `value` against this shape.
    ///
    /// `null` is accepted for every shape. On mismatch the received JSON
    /// kind is returned.
    pub fn decode(self, value: &Value, attachments: &[Vec<u8>]) -> Result<Arg, &'static str> {
        let is_binary = placeholder_index(value).is_some_and(|i| i < attachments.len());

        let matches = match (self, value) {
            (Self::Any, _) | (_, Value::Null) => true,
            (Self::Binary, _) => is_binary,
            (_, _) if is_binary => false,
            (Self::Bool, Value::Bool(_))
            | (Self::Number, Value::Number(_))
            | (Self::String, Value::String(_))
            | (Self::Array, Value::Array(_))
            | (Self::Object, Value::Object(_)) => true,
            (Self::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            _ => false,
        };

        if matches {
            Ok(Arg::from_value(value.clone(), attachments))
        } else if is_binary {
            Err("binary")
        } else {
            Err(value_kind(value))
        }
    }
}

impl std::fmt::Display for ArgShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Decode `values` positionally against `shapes`.
///
/// Missing trailing values become `Arg::Absent`; values beyond the declared
/// shapes are ignored.
pub fn decode_args(
    values: &[Value],
    attachments: &[Vec<u8>],
    shapes: &[ArgShape],
) -> Result<Vec<Arg>, ArgumentDecodeError> {
    shapes
        .iter()
        .enumerate()
        .map(|(position, &shape)| match values.get(position) {
            None => Ok(Arg::Absent),
            Some(value) => shape
                .decode(value, attachments)
                .map_err(|found| ArgumentDecodeError {
                    position,
                    expected: shape,
                    found,
                }),
        })
        .collect()
}
