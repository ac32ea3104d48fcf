//! Pull parser for calls and responses.

use super::{MethodCall, MethodResponse};
use crate::config::CodecConfig;
use crate::error::{Fault, Result, XmlRpcError};
use crate::value::{Value, ISO8601_FORMAT};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::NaiveDateTime;
use quick_xml::events::{BytesCData, Event};
use quick_xml::Reader;
use std::collections::BTreeMap;
use tracing::trace;

/// What the next event is, with element names resolved to local names.
#[derive(Debug, PartialEq)]
enum Token {
    Start(String),
    End(String),
    Text,
    Eof,
    Other,
}

struct Decoder<'a> {
    reader: Reader<&'a [u8]>,
    peeked: Option<Event<'a>>,
    /// Number of `<value>` elements currently open
    depth: usize,
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

fn cdata_text(cdata: BytesCData<'_>) -> Result<String> {
    String::from_utf8(cdata.into_inner().into_owned())
        .map_err(|e| XmlRpcError::protocol(format!("CDATA is not valid UTF-8: {}", e)))
}

impl<'a> Decoder<'a> {
    fn new(xml: &'a str) -> Self {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().expand_empty_elements = true;
        Self {
            reader,
            peeked: None,
            depth: 0,
        }
    }

    fn next(&mut self) -> Result<Event<'a>> {
        match self.peeked.take() {
            Some(event) => Ok(event),
            None => Ok(self.reader.read_event()?),
        }
    }

    fn peek(&mut self) -> Result<&Event<'a>> {
        let event = match self.peeked.take() {
            Some(event) => event,
            None => self.reader.read_event()?,
        };
        Ok(self.peeked.insert(event))
    }

    fn peek_token(&mut self) -> Result<Token> {
        Ok(match self.peek()? {
            Event::Start(e) => Token::Start(local_name(e.local_name().as_ref())),
            Event::End(e) => Token::End(local_name(e.local_name().as_ref())),
            Event::Text(_) | Event::CData(_) => Token::Text,
            Event::Eof => Token::Eof,
            _ => Token::Other,
        })
    }

    /// Skip text, comments and processing instructions up to the next tag.
    fn peek_elem(&mut self) -> Result<Token> {
        loop {
            match self.peek_token()? {
                Token::Text | Token::Other => {
                    self.next()?;
                }
                token => return Ok(token),
            }
        }
    }

    fn start(&mut self, name: &str) -> Result<()> {
        match self.peek_elem()? {
            Token::Start(found) if found == name => {
                self.next()?;
                Ok(())
            }
            Token::Start(found) => Err(XmlRpcError::protocol(format!(
                "expected start element <{}>, saw start element <{}>",
                name, found
            ))),
            Token::End(found) => Err(XmlRpcError::protocol(format!(
                "expected start element <{}>, saw end element </{}>",
                name, found
            ))),
            _ => Err(XmlRpcError::protocol(format!(
                "unexpected end of document, expected <{}>",
                name
            ))),
        }
    }

    fn end(&mut self, name: &str) -> Result<()> {
        match self.peek_elem()? {
            Token::End(found) if found == name => {
                self.next()?;
                Ok(())
            }
            Token::End(found) => Err(XmlRpcError::protocol(format!(
                "expected end element </{}>, saw end element </{}>",
                name, found
            ))),
            Token::Start(found) => Err(XmlRpcError::protocol(format!(
                "expected end element </{}>, saw start element <{}>",
                name, found
            ))),
            _ => Err(XmlRpcError::protocol(format!(
                "unexpected end of document, expected </{}>",
                name
            ))),
        }
    }

    /// Collect character data up to the next tag. May be empty.
    fn read_text(&mut self) -> Result<String> {
        let mut text = String::new();
        loop {
            match self.peek_token()? {
                Token::Text | Token::Other => {}
                _ => return Ok(text),
            }
            match self.next()? {
                Event::Text(e) => text.push_str(&e.unescape()?),
                Event::CData(e) => text.push_str(&cdata_text(e)?),
                _ => {}
            }
        }
    }

    /// Only whitespace, comments and processing instructions may follow the root.
    fn finish(&mut self) -> Result<()> {
        loop {
            match self.next()? {
                Event::Eof => return Ok(()),
                Event::Text(e) if e.iter().all(u8::is_ascii_whitespace) => {}
                Event::Comment(_) | Event::PI(_) => {}
                other => {
                    return Err(XmlRpcError::protocol(format!(
                        "unexpected content after document end: {:?}",
                        other
                    )))
                }
            }
        }
    }

    /// Parse the contents of a `<value>` whose start tag is already consumed.
    /// Stops before `</value>`.
    fn parse_value(&mut self) -> Result<Value> {
        if self.depth >= CodecConfig::MAX_VALUE_DEPTH {
            return Err(XmlRpcError::protocol(format!(
                "value nesting too deep (limit {})",
                CodecConfig::MAX_VALUE_DEPTH
            )));
        }
        self.depth += 1;
        let value = self.parse_value_contents();
        self.depth -= 1;
        value
    }

    fn parse_value_contents(&mut self) -> Result<Value> {
        let mut implicit = String::new();
        let type_name = loop {
            match self.peek_token()? {
                Token::Start(name) => break name,
                // untyped text is a string
                Token::End(_) => return Ok(Value::String(implicit)),
                Token::Eof => {
                    return Err(XmlRpcError::protocol("unexpected end of document in <value>"))
                }
                Token::Text | Token::Other => implicit.push_str(&self.read_text()?),
            }
        };
        trace!("parse_value, new type {}", type_name);

        self.start(&type_name)?;
        let value = match type_name.as_str() {
            "array" => self.parse_array()?,
            "struct" => self.parse_struct()?,
            scalar => {
                let text = self.read_text()?;
                parse_scalar(scalar, &text)?
            }
        };
        self.end(&type_name)?;
        Ok(value)
    }

    fn parse_array(&mut self) -> Result<Value> {
        self.start("data")?;
        let mut items = Vec::new();
        loop {
            match self.peek_elem()? {
                Token::Start(_) => {
                    self.start("value")?;
                    items.push(self.parse_value()?);
                    self.end("value")?;
                }
                _ => {
                    self.end("data")?;
                    return Ok(Value::Array(items));
                }
            }
        }
    }

    fn parse_struct(&mut self) -> Result<Value> {
        let mut members = BTreeMap::new();
        loop {
            match self.peek_elem()? {
                Token::Start(_) => {
                    self.start("member")?;
                    self.start("name")?;
                    let name = self.read_text()?;
                    self.end("name")?;
                    self.start("value")?;
                    let value = self.parse_value()?;
                    self.end("value")?;
                    self.end("member")?;
                    members.insert(name, value);
                }
                _ => return Ok(Value::Struct(members)),
            }
        }
    }

    /// Parse `<param><value>...</value></param>`.
    fn parse_param(&mut self) -> Result<Value> {
        self.start("param")?;
        self.start("value")?;
        let value = self.parse_value()?;
        self.end("value")?;
        self.end("param")?;
        Ok(value)
    }
}

fn invalid(type_name: &str, text: &str) -> XmlRpcError {
    XmlRpcError::protocol(format!("invalid value {:?} for {}", text, type_name))
}

fn parse_scalar(type_name: &str, text: &str) -> Result<Value> {
    let trimmed = text.trim();
    match type_name {
        "string" => Ok(Value::String(text.to_string())),
        "boolean" => match trimmed {
            "0" => Ok(Value::Bool(false)),
            "1" => Ok(Value::Bool(true)),
            _ => Err(invalid(type_name, text)),
        },
        "int" | "i4" | "i2" => trimmed
            .parse::<i32>()
            .map(Value::Int)
            .map_err(|_| invalid(type_name, text)),
        "i8" => trimmed
            .parse::<i64>()
            .map(Value::I8)
            .map_err(|_| invalid(type_name, text)),
        "double" => trimmed
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|_| invalid(type_name, text)),
        "dateTime.iso8601" => NaiveDateTime::parse_from_str(trimmed, ISO8601_FORMAT)
            .map(Value::DateTime)
            .map_err(|_| invalid(type_name, text)),
        "base64" => {
            let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            STANDARD
                .decode(compact.as_bytes())
                .map(Value::Base64)
                .map_err(|_| invalid(type_name, text))
        }
        other => Err(XmlRpcError::protocol(format!("unexpected type {}", other))),
    }
}

fn fault_from_value(value: Value) -> Result<Fault> {
    let code = value
        .get("faultCode")
        .and_then(Value::as_i64)
        .ok_or_else(|| XmlRpcError::protocol("fault is missing an integer faultCode"))?;
    let message = value
        .get("faultString")
        .and_then(Value::as_str)
        .ok_or_else(|| XmlRpcError::protocol("fault is missing a string faultString"))?;
    Ok(Fault::new(code, message))
}

/// Parse a `<methodCall>` document.
pub fn parse_request(xml: &str) -> Result<MethodCall> {
    let mut d = Decoder::new(xml);

    d.start("methodCall")?;
    d.start("methodName")?;
    let method_name = d.read_text()?.trim().to_string();
    d.end("methodName")?;
    if method_name.is_empty() {
        return Err(XmlRpcError::protocol("empty methodName"));
    }

    let mut params = Vec::new();
    if d.peek_elem()? == Token::Start("params".to_string()) {
        d.start("params")?;
        while let Token::Start(_) = d.peek_elem()? {
            params.push(d.parse_param()?);
        }
        d.end("params")?;
    }

    d.end("methodCall")?;
    d.finish()?;
    Ok(MethodCall {
        method_name,
        params,
    })
}

/// Parse a `<methodResponse>` document.
///
/// Multiple `<param>` entries are tolerated; the last one wins.
pub fn parse_response(xml: &str) -> Result<MethodResponse> {
    let mut d = Decoder::new(xml);

    d.start("methodResponse")?;
    if d.peek_elem()? == Token::Start("fault".to_string()) {
        d.start("fault")?;
        d.start("value")?;
        let value = d.parse_value()?;
        d.end("value")?;
        d.end("fault")?;
        d.end("methodResponse")?;
        d.finish()?;
        return Ok(MethodResponse::Fault(fault_from_value(value)?));
    }

    d.start("params")?;
    let mut result = None;
    loop {
        match d.peek_elem()? {
            Token::Start(_) => {
                trace!("new param");
                result = Some(d.parse_param()?);
            }
            _ => {
                d.end("params")?;
                break;
            }
        }
    }
    d.end("methodResponse")?;
    d.finish()?;

    result
        .map(MethodResponse::Success)
        .ok_or_else(|| XmlRpcError::protocol("methodResponse has no params"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(inner: &str) -> String {
        format!(
            "<?xml version=\"1.0\"?>\n<methodResponse>\n  <params>\n    <param>\n      \
             <value>{}</value>\n    </param>\n  </params>\n</methodResponse>\n",
            inner
        )
    }

    fn success(xml: &str) -> Value {
        match parse_response(xml).unwrap() {
            MethodResponse::Success(v) => v,
            MethodResponse::Fault(f) => panic!("unexpected fault {:?}", f),
        }
    }

    #[test]
    fn test_resp_boolean() {
        assert_eq!(
            success(&response("<boolean>1</boolean>")),
            Value::Bool(true)
        );
        assert!(parse_response(&response("<boolean>yes</boolean>")).is_err());
    }

    #[test]
    fn test_resp_double() {
        assert_eq!(
            success(&response("<double>-12.214</double>")),
            Value::Double(-12.214)
        );
    }

    #[test]
    fn test_resp_integers() {
        assert_eq!(success(&response("<int>42</int>")), Value::Int(42));
        assert_eq!(success(&response("<i4>-7</i4>")), Value::Int(-7));
        assert_eq!(
            success(&response("<i8>9223372036854775807</i8>")),
            Value::I8(i64::MAX)
        );
        assert!(parse_response(&response("<int>2147483648</int>")).is_err());
    }

    #[test]
    fn test_resp_strings() {
        assert_eq!(
            success(&response("<string>hello world</string>")),
            Value::from("hello world")
        );
        assert_eq!(success(&response("<string></string>")), Value::from(""));
        assert_eq!(success(&response("<string/>")), Value::from(""));
        assert_eq!(
            success(&response("<string>  padded  </string>")),
            Value::from("  padded  ")
        );
        assert_eq!(
            success(&response("<string>a &lt;&amp;&gt; b</string>")),
            Value::from("a <&> b")
        );
    }

    #[test]
    fn test_resp_implicit_string() {
        assert_eq!(success(&response("implicit")), Value::from("implicit"));
        assert_eq!(success(&response("")), Value::from(""));
    }

    #[test]
    fn test_resp_array() {
        let xml = response(
            "<array><data>\n<value><int>1</int></value>\n<value>two</value>\n\
             <value><array><data></data></array></value>\n</data></array>",
        );
        assert_eq!(
            success(&xml),
            Value::Array(vec![
                Value::Int(1),
                Value::from("two"),
                Value::Array(vec![])
            ])
        );
    }

    #[test]
    fn test_resp_struct() {
        let xml = response(
            "<struct>\n<member><name>lowerBound</name><value><i4>18</i4></value></member>\n\
             <member><name>upperBound</name><value><i4>139</i4></value></member>\n</struct>",
        );
        let v = success(&xml);
        assert_eq!(v.get("lowerBound"), Some(&Value::Int(18)));
        assert_eq!(v.get("upperBound"), Some(&Value::Int(139)));
    }

    #[test]
    fn test_resp_multicall() {
        let xml = response(
            "<array><data>\
             <value><array><data><value><int>5</int></value></data></array></value>\
             <value><struct>\
             <member><name>faultCode</name><value><int>-32601</int></value></member>\
             <member><name>faultString</name><value><string>nope</string></value></member>\
             </struct></value>\
             </data></array>",
        );
        let v = success(&xml);
        let items = v.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], Value::Array(vec![Value::Int(5)]));
        assert_eq!(items[1].get("faultCode"), Some(&Value::Int(-32601)));
    }

    #[test]
    fn test_resp_base64_and_datetime() {
        assert_eq!(
            success(&response("<base64>aGVs\nbG8=</base64>")),
            Value::Base64(b"hello".to_vec())
        );
        assert_eq!(success(&response("<base64/>")), Value::Base64(vec![]));
        let v = success(&response(
            "<dateTime.iso8601>19980717T14:08:55</dateTime.iso8601>",
        ));
        assert_eq!(
            v,
            Value::DateTime(
                chrono::NaiveDate::from_ymd_opt(1998, 7, 17)
                    .unwrap()
                    .and_hms_opt(14, 8, 55)
                    .unwrap()
            )
        );
    }

    #[test]
    fn test_resp_fault() {
        let xml = "<?xml version=\"1.0\"?>\n<methodResponse><fault><value><struct>\
                   <member><name>faultCode</name><value><int>4</int></value></member>\
                   <member><name>faultString</name><value><string>Too many parameters.</string></value></member>\
                   </struct></value></fault></methodResponse>";
        assert_eq!(
            parse_response(xml).unwrap(),
            MethodResponse::Fault(Fault::new(4, "Too many parameters."))
        );
    }

    #[test]
    fn test_resp_fault_with_i8_code() {
        let xml = "<methodResponse><fault><value><struct>\
                   <member><name>faultCode</name><value><i8>9876543210</i8></value></member>\
                   <member><name>faultString</name><value>wide</value></member>\
                   </struct></value></fault></methodResponse>";
        assert_eq!(
            parse_response(xml).unwrap(),
            MethodResponse::Fault(Fault::new(9_876_543_210, "wide"))
        );
    }

    fn nested_arrays(depth: usize) -> String {
        format!(
            "{}<value><int>1</int></value>{}",
            "<value><array><data>".repeat(depth),
            "</data></array></value>".repeat(depth)
        )
    }

    fn nested_call(depth: usize) -> String {
        format!(
            "<methodCall><methodName>upper</methodName><params><param>{}</param></params></methodCall>",
            nested_arrays(depth)
        )
    }

    #[test]
    fn test_nesting_within_limit() {
        let call = parse_request(&nested_call(CodecConfig::MAX_VALUE_DEPTH - 1)).unwrap();
        let mut v = &call.params[0];
        let mut levels = 0;
        while let Some(items) = v.as_array() {
            v = &items[0];
            levels += 1;
        }
        assert_eq!(levels, CodecConfig::MAX_VALUE_DEPTH - 1);
        assert_eq!(v, &Value::Int(1));
    }

    #[test]
    fn test_nesting_past_limit_is_rejected() {
        let err = parse_request(&nested_call(CodecConfig::MAX_VALUE_DEPTH)).unwrap_err();
        assert!(err.to_string().contains("nesting too deep"));
        assert_eq!(err.to_fault_code(), -32600);

        // unterminated openers are cut off before the end of input is reached
        let xml = format!(
            "<methodCall><methodName>upper</methodName><params><param>{}",
            "<value><array><data>".repeat(40_000)
        );
        assert!(matches!(
            parse_request(&xml),
            Err(XmlRpcError::Protocol { .. })
        ));

        let xml = response(&format!(
            "<struct><member><name>k</name>{}</member></struct>",
            nested_arrays(CodecConfig::MAX_VALUE_DEPTH)
        ));
        assert!(parse_response(&xml).is_err());
    }

    #[test]
    fn test_resp_malformed() {
        assert!(parse_response("").is_err());
        assert!(parse_response("<methodResponse><params></params></methodResponse>").is_err());
        assert!(parse_response(&response("<nil/>")).is_err());
        assert!(parse_response(&format!("{}<extra/>", response("<int>1</int>"))).is_err());
        assert!(parse_response("<methodResponse><params><param><value><int>1</int></value></param></params>").is_err());
    }

    #[test]
    fn test_request_roundtrip_through_encoder() {
        let params = vec![
            Value::Array(vec![Value::Int(10), Value::Int(20)]),
            Value::Int(1),
        ];
        let xml = super::super::write_request("index", &params).unwrap();
        let call = parse_request(&xml).unwrap();
        assert_eq!(call.method_name, "index");
        assert_eq!(call.params, params);
    }

    #[test]
    fn test_request_without_params() {
        let call = parse_request(
            "<?xml version=\"1.0\"?><methodCall><methodName>system.listMethods</methodName></methodCall>",
        )
        .unwrap();
        assert_eq!(call.method_name, "system.listMethods");
        assert!(call.params.is_empty());
    }

    #[test]
    fn test_request_with_comments_and_whitespace() {
        let call = parse_request(
            "<?xml version=\"1.0\"?>\n<!-- generated -->\n<methodCall>\n  <methodName> upper </methodName>\n  \
             <params>\n    <param><value><![CDATA[a<b]]></value></param>\n  </params>\n</methodCall>\n",
        )
        .unwrap();
        assert_eq!(call.method_name, "upper");
        assert_eq!(call.params, vec![Value::from("a<b")]);
    }

    #[test]
    fn test_request_malformed() {
        assert!(matches!(
            parse_request("<methodCall><methodName>x</methodName>"),
            Err(XmlRpcError::Protocol { .. })
        ));
        assert!(parse_request("<methodCall><methodName></methodName></methodCall>").is_err());
        assert!(parse_request("<methodCall><methodName>x</oops></methodCall>").is_err());
        assert!(parse_request("not xml at all").is_err());
    }
}
