//! XML-RPC core - value model, wire codec, client and the fixture procedures.
//!
//! This crate holds everything that does not need an HTTP server: encoding and
//! decoding of `<methodCall>` / `<methodResponse>` documents, the async
//! [`Client`], and the [`MethodRegistry`] that maps procedure names
//! (`add`, `subtract`, `index`, `upper`, `title` plus the `system.*`
//! introspection methods) to handlers.
//!
//! # Example
//!
//! ```rust
//! use xmlrpc_core::{MethodCall, MethodRegistry, MethodResponse, Value};
//!
//! let registry = MethodRegistry::fixture();
//! let call = MethodCall::from_xml(
//!     "<methodCall><methodName>add</methodName><params>\
//!      <param><value><int>2</int></value></param>\
//!      <param><value><int>3</int></value></param>\
//!      </params></methodCall>",
//! )?;
//! let response = MethodResponse::from(registry.dispatch(&call.method_name, &call.params));
//! assert_eq!(response, MethodResponse::Success(Value::Int(5)));
//! # Ok::<(), xmlrpc_core::XmlRpcError>(())
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod procedures;
pub mod registry;
pub mod value;

// Re-export commonly used types
pub use client::Client;
pub use codec::{MethodCall, MethodResponse};
pub use config::{ClientConfig, CodecConfig, EndpointConfig};
pub use error::{Fault, Result, XmlRpcError};
pub use registry::{MethodRegistry, MethodRegistryBuilder};
pub use value::{from_value, to_value, Value};
