//! XML-RPC fixture server.
//!
//! Serves the procedures registered in [`xmlrpc_core::MethodRegistry`] over
//! HTTP. The binary binds `127.0.0.1:8000`; tests call
//! [`server::start_server`] with port 0 instead.

pub mod handler;
pub mod server;
