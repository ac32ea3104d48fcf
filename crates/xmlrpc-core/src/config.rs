//! Centralized configuration for the fixture endpoint and client.
//!
//! The endpoint address is fixed; nothing here is read from files or the
//! environment.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Endpoint-level configuration.
pub struct EndpointConfig;

impl EndpointConfig {
    /// Host name used in the advertised base URL.
    pub const HOST: &'static str = "localhost";
    /// Address the listener binds to.
    pub const BIND_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
    pub const PORT: u16 = 8000;
    /// Paths that accept XML-RPC POSTs.
    pub const RPC_PATHS: [&'static str; 2] = ["/", "/RPC2"];
    pub const MAX_REQUEST_BYTES: usize = 1_048_576; // 1MB

    /// Base URL printed on startup, e.g. `http://localhost:8000/`.
    pub fn base_url(port: u16) -> String {
        format!("http://{}:{}/", Self::HOST, port)
    }
}

/// Limits applied while decoding XML-RPC documents.
pub struct CodecConfig;

impl CodecConfig {
    /// Deepest `<value>` nesting accepted in a call or response. Each level
    /// costs a stack frame, so this also bounds decoder stack use.
    pub const MAX_VALUE_DEPTH: usize = 128;
}

/// Client-side configuration.
pub struct ClientConfig;

impl ClientConfig {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
}
