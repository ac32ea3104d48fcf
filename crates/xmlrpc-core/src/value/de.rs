//! Deserialization of [`Value`]s into application types.

use super::{Value, ISO8601_FORMAT};
use crate::error::{Result, XmlRpcError};
use chrono::NaiveDateTime;
use serde::de::value::{MapDeserializer, SeqDeserializer};
use serde::de::{
    self, DeserializeOwned, DeserializeSeed, Deserializer, EnumAccess, IntoDeserializer, MapAccess,
    SeqAccess, Unexpected, VariantAccess, Visitor,
};
use serde::{forward_to_deserialize_any, Deserialize};
use std::collections::BTreeMap;
use std::fmt;

/// Convert a [`Value`] into any deserializable type.
///
/// Missing struct members become `None` for `Option` fields; members without
/// a matching field are ignored.
///
/// # Example
///
/// ```rust
/// use serde::Deserialize;
/// use xmlrpc_core::value::from_value;
/// use xmlrpc_core::Value;
///
/// #[derive(Deserialize)]
/// struct Bounds {
///     #[serde(rename = "lowerBound")]
///     lower: i32,
///     #[serde(rename = "upperBound")]
///     upper: Option<i32>,
/// }
///
/// let mut members = std::collections::BTreeMap::new();
/// members.insert("lowerBound".to_string(), Value::Int(18));
/// let bounds: Bounds = from_value(Value::Struct(members))?;
/// assert_eq!(bounds.lower, 18);
/// assert_eq!(bounds.upper, None);
/// # Ok::<(), xmlrpc_core::XmlRpcError>(())
/// ```
pub fn from_value<T>(value: Value) -> Result<T>
where
    T: DeserializeOwned,
{
    T::deserialize(value)
}

impl de::Error for XmlRpcError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        XmlRpcError::Convert {
            message: msg.to_string(),
        }
    }
}

impl Value {
    fn unexpected(&self) -> Unexpected<'_> {
        match self {
            Value::Int(v) => Unexpected::Signed(i64::from(*v)),
            Value::I8(v) => Unexpected::Signed(*v),
            Value::Bool(v) => Unexpected::Bool(*v),
            Value::String(v) => Unexpected::Str(v),
            Value::Double(v) => Unexpected::Float(*v),
            Value::DateTime(_) => Unexpected::Other("dateTime.iso8601"),
            Value::Base64(v) => Unexpected::Bytes(v),
            Value::Array(_) => Unexpected::Seq,
            Value::Struct(_) => Unexpected::Map,
        }
    }

    fn invalid_type(&self, expected: &dyn de::Expected) -> XmlRpcError {
        de::Error::invalid_type(self.unexpected(), expected)
    }
}

fn format_datetime(t: &NaiveDateTime) -> String {
    t.format(ISO8601_FORMAT).to_string()
}

fn visit_array<'de, V>(items: Vec<Value>, visitor: V) -> Result<V::Value>
where
    V: Visitor<'de>,
{
    let mut seq = SeqDeserializer::<_, XmlRpcError>::new(items.into_iter());
    let value = visitor.visit_seq(&mut seq)?;
    seq.end()?;
    Ok(value)
}

fn visit_struct<'de, V>(members: BTreeMap<String, Value>, visitor: V) -> Result<V::Value>
where
    V: Visitor<'de>,
{
    let mut map = MapDeserializer::<_, XmlRpcError>::new(members.into_iter());
    let value = visitor.visit_map(&mut map)?;
    map.end()?;
    Ok(value)
}

impl<'de> IntoDeserializer<'de, XmlRpcError> for Value {
    type Deserializer = Value;

    fn into_deserializer(self) -> Value {
        self
    }
}

impl<'de> Deserializer<'de> for Value {
    type Error = XmlRpcError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        match self {
            Value::Int(v) => visitor.visit_i32(v),
            Value::I8(v) => visitor.visit_i64(v),
            Value::Bool(v) => visitor.visit_bool(v),
            Value::String(v) => visitor.visit_string(v),
            Value::Double(v) => visitor.visit_f64(v),
            // Value's own visitor turns this back into a DateTime
            Value::DateTime(v) => visitor.visit_newtype_struct(Value::String(format_datetime(&v))),
            Value::Base64(v) => visitor.visit_byte_buf(v),
            Value::Array(items) => visit_array(items, visitor),
            Value::Struct(members) => visit_struct(members, visitor),
        }
    }

    fn deserialize_str<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_string(visitor)
    }

    fn deserialize_string<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        match self {
            Value::DateTime(v) => visitor.visit_string(format_datetime(&v)),
            other => other.deserialize_any(visitor),
        }
    }

    /// `base64` also reads as a sequence of bytes, so `Vec<u8>` fields work.
    fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        match self {
            Value::Base64(bytes) => {
                let mut seq = SeqDeserializer::<_, XmlRpcError>::new(bytes.into_iter());
                let value = visitor.visit_seq(&mut seq)?;
                seq.end()?;
                Ok(value)
            }
            other => other.deserialize_any(visitor),
        }
    }

    // XML-RPC has no nil; absent struct members are handled by serde itself
    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_some(self)
    }

    /// A `()` target discards the value.
    fn deserialize_unit<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V>(self, _name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        match self {
            Value::String(variant) => visitor.visit_enum(EnumDeserializer {
                variant,
                value: None,
            }),
            Value::Struct(members) => {
                let mut iter = members.into_iter();
                match (iter.next(), iter.next()) {
                    (Some((variant, value)), None) => visitor.visit_enum(EnumDeserializer {
                        variant,
                        value: Some(value),
                    }),
                    _ => Err(de::Error::invalid_value(
                        Unexpected::Map,
                        &"a struct with exactly one member",
                    )),
                }
            }
            other => Err(other.invalid_type(&"string or struct")),
        }
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char bytes byte_buf
        unit_struct tuple tuple_struct map struct identifier
    }
}

/// Externally tagged enum: a bare variant name or `{variant: content}`.
struct EnumDeserializer {
    variant: String,
    value: Option<Value>,
}

impl<'de> EnumAccess<'de> for EnumDeserializer {
    type Error = XmlRpcError;
    type Variant = VariantDeserializer;

    fn variant_seed<S>(self, seed: S) -> Result<(S::Value, VariantDeserializer)>
    where
        S: DeserializeSeed<'de>,
    {
        let variant = seed.deserialize(Value::String(self.variant))?;
        Ok((variant, VariantDeserializer { value: self.value }))
    }
}

struct VariantDeserializer {
    value: Option<Value>,
}

impl<'de> VariantAccess<'de> for VariantDeserializer {
    type Error = XmlRpcError;

    fn unit_variant(self) -> Result<()> {
        match self.value {
            None => Ok(()),
            Some(value) => Err(value.invalid_type(&"unit variant")),
        }
    }

    fn newtype_variant_seed<S>(self, seed: S) -> Result<S::Value>
    where
        S: DeserializeSeed<'de>,
    {
        match self.value {
            Some(value) => seed.deserialize(value),
            None => Err(de::Error::invalid_type(
                Unexpected::UnitVariant,
                &"newtype variant",
            )),
        }
    }

    fn tuple_variant<V>(self, _len: usize, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        match self.value {
            Some(Value::Array(items)) => visit_array(items, visitor),
            Some(other) => Err(other.invalid_type(&"tuple variant")),
            None => Err(de::Error::invalid_type(
                Unexpected::UnitVariant,
                &"tuple variant",
            )),
        }
    }

    fn struct_variant<V>(self, _fields: &'static [&'static str], visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        match self.value {
            Some(Value::Struct(members)) => visit_struct(members, visitor),
            Some(other) => Err(other.invalid_type(&"struct variant")),
            None => Err(de::Error::invalid_type(
                Unexpected::UnitVariant,
                &"struct variant",
            )),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an XML-RPC value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i8<E: de::Error>(self, v: i8) -> std::result::Result<Value, E> {
        Ok(Value::Int(i32::from(v)))
    }

    fn visit_i16<E: de::Error>(self, v: i16) -> std::result::Result<Value, E> {
        Ok(Value::Int(i32::from(v)))
    }

    fn visit_i32<E: de::Error>(self, v: i32) -> std::result::Result<Value, E> {
        Ok(Value::Int(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Value, E> {
        Ok(Value::I8(v))
    }

    fn visit_u8<E: de::Error>(self, v: u8) -> std::result::Result<Value, E> {
        Ok(Value::Int(i32::from(v)))
    }

    fn visit_u16<E: de::Error>(self, v: u16) -> std::result::Result<Value, E> {
        Ok(Value::Int(i32::from(v)))
    }

    fn visit_u32<E: de::Error>(self, v: u32) -> std::result::Result<Value, E> {
        Ok(Value::integer(i64::from(v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Value, E> {
        i64::try_from(v)
            .map(Value::I8)
            .map_err(|_| E::invalid_value(Unexpected::Unsigned(v), &self))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Value, E> {
        Ok(Value::Double(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> std::result::Result<Value, E> {
        Ok(Value::Base64(v.to_vec()))
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> std::result::Result<Value, E> {
        Ok(Value::Base64(v))
    }

    fn visit_some<D>(self, deserializer: D) -> std::result::Result<Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer)
    }

    /// Only reached for dateTime values, see `deserialize_any`.
    fn visit_newtype_struct<D>(self, deserializer: D) -> std::result::Result<Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, ISO8601_FORMAT)
            .map(Value::DateTime)
            .map_err(|_| de::Error::invalid_value(Unexpected::Str(&s), &"dateTime.iso8601"))
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut members = BTreeMap::new();
        while let Some((name, value)) = map.next_entry::<String, Value>()? {
            members.insert(name, value);
        }
        Ok(Value::Struct(members))
    }
}
