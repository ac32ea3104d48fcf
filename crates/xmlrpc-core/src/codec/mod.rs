//! XML-RPC wire format.
//!
//! A call is a `<methodCall>` naming a method and carrying positional
//! `<params>`; the answer is a `<methodResponse>` holding either one
//! `<param>` or a `<fault>`.
//!
//! ```text
//! <methodCall>
//!   <methodName>add</methodName>
//!   <params><param><value><int>2</int></value></param>...</params>
//! </methodCall>
//! ```

mod decode;
mod encode;

pub use decode::{parse_request, parse_response};
pub use encode::{write_fault, write_request, write_response, XML_HEADER};

use crate::error::{Fault, Result, XmlRpcError};
use crate::value::Value;

/// Content type of every XML-RPC request and response body.
pub const CONTENT_TYPE: &str = "text/xml";

/// A decoded `<methodCall>`.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub method_name: String,
    pub params: Vec<Value>,
}

impl MethodCall {
    pub fn new(method_name: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            method_name: method_name.into(),
            params,
        }
    }

    pub fn from_xml(xml: &str) -> Result<Self> {
        parse_request(xml)
    }

    pub fn to_xml(&self) -> Result<String> {
        write_request(&self.method_name, &self.params)
    }
}

/// A decoded `<methodResponse>`.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodResponse {
    Success(Value),
    Fault(Fault),
}

impl MethodResponse {
    pub fn from_xml(xml: &str) -> Result<Self> {
        parse_response(xml)
    }

    pub fn to_xml(&self) -> Result<String> {
        match self {
            MethodResponse::Success(value) => write_response(value),
            MethodResponse::Fault(fault) => Ok(write_fault(fault)),
        }
    }

    /// Turn a fault into `XmlRpcError::Fault`.
    pub fn into_result(self) -> Result<Value> {
        match self {
            MethodResponse::Success(value) => Ok(value),
            MethodResponse::Fault(fault) => Err(XmlRpcError::Fault(fault)),
        }
    }
}

impl From<Result<Value>> for MethodResponse {
    fn from(result: Result<Value>) -> Self {
        match result {
            Ok(value) => MethodResponse::Success(value),
            Err(e) => MethodResponse::Fault(e.to_fault()),
        }
    }
}
