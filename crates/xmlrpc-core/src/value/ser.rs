//! Serialization of application types into [`Value`]s.

use super::{Value, DATETIME_TOKEN, ISO8601_FORMAT};
use crate::error::{Result, XmlRpcError};
use chrono::NaiveDateTime;
use serde::ser::{self, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Convert any serializable value into a [`Value`].
///
/// # Example
///
/// ```rust
/// use serde::Serialize;
/// use xmlrpc_core::value::to_value;
/// use xmlrpc_core::Value;
///
/// #[derive(Serialize)]
/// struct Bounds {
///     #[serde(rename = "lowerBound")]
///     lower: i32,
/// }
///
/// let v = to_value(&Bounds { lower: 18 })?;
/// assert_eq!(v.get("lowerBound"), Some(&Value::Int(18)));
/// # Ok::<(), xmlrpc_core::XmlRpcError>(())
/// ```
pub fn to_value<T>(value: &T) -> Result<Value>
where
    T: Serialize + ?Sized,
{
    value.serialize(ValueSerializer)
}

impl ser::Error for XmlRpcError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        XmlRpcError::Encode {
            message: msg.to_string(),
        }
    }
}

fn unsupported(what: &str) -> XmlRpcError {
    XmlRpcError::Encode {
        message: format!("{} cannot be represented in XML-RPC", what),
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Int(v) => serializer.serialize_i32(*v),
            Value::I8(v) => serializer.serialize_i64(*v),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::String(v) => serializer.serialize_str(v),
            Value::Double(v) => serializer.serialize_f64(*v),
            Value::DateTime(v) => serializer
                .serialize_newtype_struct(DATETIME_TOKEN, &v.format(ISO8601_FORMAT).to_string()),
            Value::Base64(v) => serializer.serialize_bytes(v),
            Value::Array(v) => v.serialize(serializer),
            Value::Struct(v) => v.serialize(serializer),
        }
    }
}

struct ValueSerializer;

impl Serializer for ValueSerializer {
    type Ok = Value;
    type Error = XmlRpcError;

    type SerializeSeq = ArrayBuilder;
    type SerializeTuple = ArrayBuilder;
    type SerializeTupleStruct = ArrayBuilder;
    type SerializeTupleVariant = VariantBuilder<ArrayBuilder>;
    type SerializeMap = StructBuilder;
    type SerializeStruct = StructBuilder;
    type SerializeStructVariant = VariantBuilder<StructBuilder>;

    fn serialize_bool(self, v: bool) -> Result<Value> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value> {
        Ok(Value::Int(i32::from(v)))
    }

    fn serialize_i16(self, v: i16) -> Result<Value> {
        Ok(Value::Int(i32::from(v)))
    }

    fn serialize_i32(self, v: i32) -> Result<Value> {
        Ok(Value::Int(v))
    }

    fn serialize_i64(self, v: i64) -> Result<Value> {
        Ok(Value::I8(v))
    }

    fn serialize_u8(self, v: u8) -> Result<Value> {
        Ok(Value::Int(i32::from(v)))
    }

    fn serialize_u16(self, v: u16) -> Result<Value> {
        Ok(Value::Int(i32::from(v)))
    }

    fn serialize_u32(self, v: u32) -> Result<Value> {
        Ok(Value::integer(i64::from(v)))
    }

    fn serialize_u64(self, v: u64) -> Result<Value> {
        i64::try_from(v)
            .map(Value::I8)
            .map_err(|_| unsupported(&format!("u64 {}", v)))
    }

    fn serialize_f32(self, v: f32) -> Result<Value> {
        Ok(Value::Double(f64::from(v)))
    }

    fn serialize_f64(self, v: f64) -> Result<Value> {
        Ok(Value::Double(v))
    }

    fn serialize_char(self, v: char) -> Result<Value> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value> {
        Ok(Value::Base64(v.to_vec()))
    }

    fn serialize_none(self) -> Result<Value> {
        Err(unsupported("None"))
    }

    fn serialize_some<T>(self, value: &T) -> Result<Value>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value> {
        Err(unsupported("()"))
    }

    fn serialize_unit_struct(self, name: &'static str) -> Result<Value> {
        Err(unsupported(&format!("unit struct {}", name)))
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Value> {
        Ok(Value::String(variant.to_string()))
    }

    fn serialize_newtype_struct<T>(self, name: &'static str, value: &T) -> Result<Value>
    where
        T: Serialize + ?Sized,
    {
        if name != DATETIME_TOKEN {
            return value.serialize(self);
        }
        match value.serialize(self)? {
            Value::String(s) => NaiveDateTime::parse_from_str(&s, ISO8601_FORMAT)
                .map(Value::DateTime)
                .map_err(|e| XmlRpcError::Encode {
                    message: format!("invalid dateTime {:?}: {}", s, e),
                }),
            other => Err(unsupported(&format!("dateTime from {}", other.type_name()))),
        }
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value>
    where
        T: Serialize + ?Sized,
    {
        let mut members = BTreeMap::new();
        members.insert(variant.to_string(), to_value(value)?);
        Ok(Value::Struct(members))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<ArrayBuilder> {
        Ok(ArrayBuilder {
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<ArrayBuilder> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<ArrayBuilder> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<VariantBuilder<ArrayBuilder>> {
        Ok(VariantBuilder {
            variant,
            inner: ArrayBuilder {
                items: Vec::with_capacity(len),
            },
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<StructBuilder> {
        Ok(StructBuilder::default())
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<StructBuilder> {
        Ok(StructBuilder::default())
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<VariantBuilder<StructBuilder>> {
        Ok(VariantBuilder {
            variant,
            inner: StructBuilder::default(),
        })
    }
}

struct ArrayBuilder {
    items: Vec<Value>,
}

impl ArrayBuilder {
    fn push<T>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.items.push(to_value(value)?);
        Ok(())
    }
}

impl ser::SerializeSeq for ArrayBuilder {
    type Ok = Value;
    type Error = XmlRpcError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.push(value)
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Array(self.items))
    }
}

impl ser::SerializeTuple for ArrayBuilder {
    type Ok = Value;
    type Error = XmlRpcError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.push(value)
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Array(self.items))
    }
}

impl ser::SerializeTupleStruct for ArrayBuilder {
    type Ok = Value;
    type Error = XmlRpcError;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.push(value)
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Array(self.items))
    }
}

#[derive(Default)]
struct StructBuilder {
    members: BTreeMap<String, Value>,
    next_key: Option<String>,
}

impl StructBuilder {
    fn insert<T>(&mut self, name: String, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.members.insert(name, to_value(value)?);
        Ok(())
    }
}

/// Member names must be strings; integer keys are written in decimal.
fn member_name(key: Value) -> Result<String> {
    match key {
        Value::String(s) => Ok(s),
        Value::Int(i) => Ok(i.to_string()),
        Value::I8(i) => Ok(i.to_string()),
        other => Err(XmlRpcError::Encode {
            message: format!("struct member names must be strings, saw {}", other.type_name()),
        }),
    }
}

impl ser::SerializeMap for StructBuilder {
    type Ok = Value;
    type Error = XmlRpcError;

    fn serialize_key<T>(&mut self, key: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.next_key = Some(member_name(to_value(key)?)?);
        Ok(())
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let name = self
            .next_key
            .take()
            .ok_or_else(|| unsupported("map value without a key"))?;
        self.insert(name, value)
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Struct(self.members))
    }
}

impl ser::SerializeStruct for StructBuilder {
    type Ok = Value;
    type Error = XmlRpcError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.insert(key.to_string(), value)
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Struct(self.members))
    }
}

/// Externally tagged enum variant: `{variant: inner}`.
struct VariantBuilder<B> {
    variant: &'static str,
    inner: B,
}

impl<B> VariantBuilder<B> {
    fn wrap(variant: &'static str, inner: Value) -> Value {
        let mut members = BTreeMap::new();
        members.insert(variant.to_string(), inner);
        Value::Struct(members)
    }
}

impl ser::SerializeTupleVariant for VariantBuilder<ArrayBuilder> {
    type Ok = Value;
    type Error = XmlRpcError;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.inner.push(value)
    }

    fn end(self) -> Result<Value> {
        Ok(Self::wrap(self.variant, Value::Array(self.inner.items)))
    }
}

impl ser::SerializeStructVariant for VariantBuilder<StructBuilder> {
    type Ok = Value;
    type Error = XmlRpcError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.inner.insert(key.to_string(), value)
    }

    fn end(self) -> Result<Value> {
        Ok(Self::wrap(self.variant, Value::Struct(self.inner.members)))
    }
}
