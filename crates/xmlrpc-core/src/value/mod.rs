//! The XML-RPC value model.
//!
//! [`Value`] is the untyped form of every parameter and result. Application
//! types cross into it through serde: [`to_value`] encodes anything that
//! implements `Serialize` and [`from_value`] decodes into anything that
//! implements `Deserialize`.
//!
//! | Rust | XML-RPC |
//! |---|---|
//! | `i8`, `i16`, `i32`, `u8`, `u16` | `int` |
//! | `i64`, `u64` | `i8` |
//! | `u32` | `int`, or `i8` above `i32::MAX` |
//! | `f32`, `f64` | `double` |
//! | `bool` | `boolean` |
//! | `String`, `&str`, `char`, unit enum variants | `string` |
//! | byte buffers (`serialize_bytes`) | `base64` |
//! | sequences, tuples | `array` |
//! | structs, maps with string keys | `struct` |
//! | `NaiveDateTime` with [`iso8601`] | `dateTime.iso8601` |
//!
//! XML-RPC has no nil, so `None` cannot be encoded; skip such fields with
//! `#[serde(skip_serializing_if = "Option::is_none")]`. Struct member names
//! follow field names and can be changed with `#[serde(rename = "...")]`.

mod de;
mod ser;

pub use de::from_value;
pub use ser::to_value;

use chrono::NaiveDateTime;
use std::collections::BTreeMap;

/// Format of `<dateTime.iso8601>` payloads, e.g. `19980717T14:08:55`.
pub const ISO8601_FORMAT: &str = "%Y%m%dT%H:%M:%S";

/// Newtype-struct name that marks a dateTime passing through serde.
pub(crate) const DATETIME_TOKEN: &str = "$xmlrpc::private::DateTime";

/// A single XML-RPC value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `<int>`, `<i4>` or `<i2>`.
    Int(i32),
    /// `<i8>`, the 64-bit extension.
    I8(i64),
    Bool(bool),
    String(String),
    Double(f64),
    DateTime(NaiveDateTime),
    Base64(Vec<u8>),
    Array(Vec<Value>),
    Struct(BTreeMap<String, Value>),
}

impl Value {
    /// The XML-RPC type name, as used in method signatures.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::I8(_) => "i8",
            Value::Bool(_) => "boolean",
            Value::String(_) => "string",
            Value::Double(_) => "double",
            Value::DateTime(_) => "dateTime.iso8601",
            Value::Base64(_) => "base64",
            Value::Array(_) => "array",
            Value::Struct(_) => "struct",
        }
    }

    /// Integer payload of `int` or `i8`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(i64::from(*v)),
            Value::I8(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric payload of `int`, `i8` or `double`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            // i64 -> f64 is lossy above 2^53, same as any XML-RPC peer
            other => other.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Struct(v) => Some(v),
            _ => None,
        }
    }

    /// Look up a struct member by name.
    pub fn get(&self, member: &str) -> Option<&Value> {
        self.as_struct().and_then(|m| m.get(member))
    }

    /// Build an `int` when the value fits in 32 bits, `i8` otherwise.
    pub fn integer(v: i64) -> Self {
        match i32::try_from(v) {
            Ok(small) => Value::Int(small),
            Err(_) => Value::I8(v),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I8(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Base64(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Struct(v)
    }
}

/// Serde support for `NaiveDateTime` fields as `dateTime.iso8601`.
///
/// ```
/// use chrono::NaiveDateTime;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Event {
///     #[serde(with = "xmlrpc_core::value::iso8601")]
///     at: NaiveDateTime,
/// }
/// ```
pub mod iso8601 {
    use super::{DATETIME_TOKEN, ISO8601_FORMAT};
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(t: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_newtype_struct(DATETIME_TOKEN, &t.format(ISO8601_FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, ISO8601_FORMAT).map_err(de::Error::custom)
    }
}
