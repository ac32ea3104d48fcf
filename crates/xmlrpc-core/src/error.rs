//! Error types for the XML-RPC layer.
//!
//! Every error a procedure or the codec can raise maps onto an XML-RPC fault
//! code, so the server can always answer with a `<fault>` instead of failing
//! the request.

use std::fmt;
use thiserror::Error;

/// An explicit error returned by the remote XML-RPC server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub code: i64,
    pub message: String,
}

impl Fault {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (fault code {})", self.message, self.code)
    }
}

impl std::error::Error for Fault {}

/// Main error type for XML-RPC operations.
#[derive(Debug, Error)]
pub enum XmlRpcError {
    // Remote errors
    #[error("Fault from server: {0}")]
    Fault(Fault),

    // Wire errors
    #[error("Malformed XML: {message}")]
    Xml {
        message: String,
        #[source]
        source: Option<quick_xml::Error>,
    },

    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("Cannot encode value: {message}")]
    Encode { message: String },

    #[error("Cannot convert value: {message}")]
    Convert { message: String },

    // Transport errors
    #[error("HTTP response not successful (status {status})")]
    HttpStatus { status: u16 },

    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("Invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    // Dispatch errors
    #[error("method \"{0}\" is not supported")]
    MethodNotFound(String),

    #[error("{method}() takes {expected} argument(s) ({given} given)")]
    ArgumentCount {
        method: String,
        expected: usize,
        given: usize,
    },

    #[error("{method}(): expected {expected}, got {actual}")]
    TypeMismatch {
        method: String,
        expected: String,
        actual: String,
    },

    #[error("{method}(): index {index} out of range for length {len}")]
    IndexOutOfRange {
        method: String,
        index: i64,
        len: usize,
    },

    #[error("{method}(): integer overflow")]
    Overflow { method: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for XML-RPC operations.
pub type Result<T> = std::result::Result<T, XmlRpcError>;

impl From<quick_xml::Error> for XmlRpcError {
    fn from(err: quick_xml::Error) -> Self {
        XmlRpcError::Xml {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for XmlRpcError {
    fn from(err: reqwest::Error) -> Self {
        XmlRpcError::Network {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<Fault> for XmlRpcError {
    fn from(fault: Fault) -> Self {
        XmlRpcError::Fault(fault)
    }
}

impl XmlRpcError {
    /// Shorthand for a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        XmlRpcError::Protocol {
            message: message.into(),
        }
    }

    /// Convert to an XML-RPC fault code.
    ///
    /// Codes follow the XML-RPC fault code interoperability convention:
    /// - -32700: parse error, not well formed
    /// - -32600: well-formed XML that is not a valid XML-RPC message
    /// - -32601: requested method not found
    /// - -32602: invalid method parameters
    /// - -32603: internal XML-RPC error
    /// - -32500: application error
    pub fn to_fault_code(&self) -> i64 {
        match self {
            XmlRpcError::Fault(fault) => fault.code,

            XmlRpcError::Xml { .. } => -32700,

            XmlRpcError::Protocol { .. } => -32600,

            XmlRpcError::MethodNotFound(_) => -32601,

            XmlRpcError::ArgumentCount { .. }
            | XmlRpcError::TypeMismatch { .. }
            | XmlRpcError::Convert { .. } => -32602,

            XmlRpcError::IndexOutOfRange { .. } | XmlRpcError::Overflow { .. } => -32500,

            // All other errors are internal errors
            _ => -32603,
        }
    }

    /// Render this error as the fault sent back to the caller.
    pub fn to_fault(&self) -> Fault {
        match self {
            XmlRpcError::Fault(fault) => fault.clone(),
            other => Fault::new(other.to_fault_code(), other.to_string()),
        }
    }

    /// Returns the server fault, if this error is one.
    pub fn as_fault(&self) -> Option<&Fault> {
        match self {
            XmlRpcError::Fault(fault) => Some(fault),
            _ => None,
        }
    }
}
