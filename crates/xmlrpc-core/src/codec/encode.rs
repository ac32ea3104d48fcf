//! Serialization of calls, responses and faults.

use crate::error::{Fault, Result, XmlRpcError};
use crate::value::{Value, ISO8601_FORMAT};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use quick_xml::escape::escape;

pub const XML_HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

struct Encoder {
    out: String,
}

impl Encoder {
    fn new() -> Self {
        Self {
            out: String::from(XML_HEADER),
        }
    }

    fn write(&mut self, s: &str) {
        self.out.push_str(s);
    }

    fn text(&mut self, s: &str) {
        self.out.push_str(&escape(s));
    }

    fn tagged(&mut self, tag: &str, text: &str) {
        self.write("<");
        self.write(tag);
        self.write(">");
        self.text(text);
        self.write("</");
        self.write(tag);
        self.write(">");
    }

    fn value(&mut self, v: &Value) -> Result<()> {
        self.write("<value>");
        match v {
            Value::Int(i) => self.tagged("int", &i.to_string()),
            Value::I8(i) => self.tagged("i8", &i.to_string()),
            Value::Bool(b) => self.tagged("boolean", if *b { "1" } else { "0" }),
            Value::String(s) => self.tagged("string", s),
            Value::Double(d) => self.tagged("double", &format_double(*d)?),
            Value::DateTime(t) => {
                self.tagged("dateTime.iso8601", &t.format(ISO8601_FORMAT).to_string())
            }
            Value::Base64(bytes) => self.tagged("base64", &STANDARD.encode(bytes)),
            Value::Array(items) => {
                self.write("<array><data>");
                for item in items {
                    self.value(item)?;
                }
                self.write("</data></array>");
            }
            Value::Struct(members) => {
                self.write("<struct>");
                for (name, member) in members {
                    self.write("<member>");
                    self.tagged("name", name);
                    self.value(member)?;
                    self.write("</member>");
                }
                self.write("</struct>");
            }
        }
        self.write("</value>");
        Ok(())
    }

    fn finish(self) -> String {
        self.out
    }
}

/// XML-RPC doubles have no exponent form and no NaN/infinity.
fn format_double(d: f64) -> Result<String> {
    if !d.is_finite() {
        return Err(XmlRpcError::Encode {
            message: format!("{} is not representable as an XML-RPC double", d),
        });
    }
    let s = d.to_string();
    if s.contains('.') {
        Ok(s)
    } else {
        Ok(format!("{}.0", s))
    }
}

/// Serialize a `<methodCall>`.
pub fn write_request(method: &str, params: &[Value]) -> Result<String> {
    let mut enc = Encoder::new();
    enc.write("<methodCall>");
    enc.tagged("methodName", method);
    enc.write("<params>");
    for param in params {
        enc.write("<param>");
        enc.value(param)?;
        enc.write("</param>");
    }
    enc.write("</params>");
    enc.write("</methodCall>");
    Ok(enc.finish())
}

/// Serialize a successful `<methodResponse>`.
pub fn write_response(value: &Value) -> Result<String> {
    let mut enc = Encoder::new();
    enc.write("<methodResponse><params><param>");
    enc.value(value)?;
    enc.write("</param></params></methodResponse>");
    Ok(enc.finish())
}

/// Serialize a `<fault>` response.
pub fn write_fault(fault: &Fault) -> String {
    let mut enc = Encoder::new();
    enc.write("<methodResponse><fault><value><struct>");
    enc.write("<member><name>faultCode</name><value>");
    let tag = if i32::try_from(fault.code).is_ok() { "int" } else { "i8" };
    enc.tagged(tag, &fault.code.to_string());
    enc.write("</value></member>");
    enc.write("<member><name>faultString</name><value>");
    enc.tagged("string", &fault.message);
    enc.write("</value></member>");
    enc.write("</struct></value></fault></methodResponse>");
    enc.finish()
}
