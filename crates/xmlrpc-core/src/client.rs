//! Async XML-RPC client.

use crate::codec::{self, parse_response, write_request, MethodCall};
use crate::config::ClientConfig;
use crate::error::{Fault, Result, XmlRpcError};
use crate::registry::MULTICALL;
use crate::value::{from_value, to_value, Value};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, trace};
use url::Url;

/// Holds everything needed to call methods on one XML-RPC server.
///
/// # Example
///
/// ```rust,ignore
/// use xmlrpc_core::{Client, Value};
///
/// let client = Client::new("http://localhost:8000/")?;
/// let sum: i64 = client.call_as("add", &[Value::Int(1), Value::Int(2)]).await?;
/// assert_eq!(sum, 3);
///
/// let diff: f64 = client.call_with("subtract", &(1.5, 2)).await?;
/// assert_eq!(diff, -0.5);
/// ```
#[derive(Debug, Clone)]
pub struct Client {
    url: Url,
    http: reqwest::Client,
}

impl Client {
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| XmlRpcError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let http = reqwest::Client::builder()
            .timeout(ClientConfig::REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { url, http })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Call `method` with positional `params`.
    ///
    /// A `<fault>` answer is returned as `XmlRpcError::Fault`; an invalid
    /// exchange as `XmlRpcError::Protocol` or `XmlRpcError::Xml`.
    pub async fn call(&self, method: &str, params: &[Value]) -> Result<Value> {
        let body = write_request(method, params)?;
        debug!("XML-RPC call {} to {}", method, self.url);
        trace!("request body: {}", body);

        let response = self
            .http
            .post(self.url.clone())
            .header(CONTENT_TYPE, codec::CONTENT_TYPE)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(XmlRpcError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let text = response.text().await?;
        trace!("response body: {}", text);
        parse_response(&text)?.into_result()
    }

    /// Call `method` and convert the result into `T`.
    pub async fn call_as<T>(&self, method: &str, params: &[Value]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        from_value(self.call(method, params).await?)
    }

    /// Call `method` with parameters taken from any serializable value.
    ///
    /// A tuple or sequence supplies one parameter per element; any other value
    /// is sent as the only parameter. Wrap a single array argument in a
    /// one-element tuple.
    ///
    /// ```rust,ignore
    /// let third: String = client.call_with("index", &("abc", 2)).await?;
    /// ```
    pub async fn call_with<P, T>(&self, method: &str, params: &P) -> Result<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let params = match to_value(params)? {
            Value::Array(items) => items,
            single => vec![single],
        };
        self.call_as(method, &params).await
    }

    /// Run several calls in one `system.multicall` round trip.
    ///
    /// The outer result fails only if the multicall itself fails; each entry
    /// carries its own result or fault.
    pub async fn multicall(&self, calls: &[MethodCall]) -> Result<Vec<Result<Value>>> {
        let entries = calls
            .iter()
            .map(|call| {
                let mut members = BTreeMap::new();
                members.insert(
                    "methodName".to_string(),
                    Value::from(call.method_name.as_str()),
                );
                members.insert("params".to_string(), Value::Array(call.params.clone()));
                Value::Struct(members)
            })
            .collect();

        let results: Vec<Value> = self
            .call_as(MULTICALL, &[Value::Array(entries)])
            .await?;
        if results.len() != calls.len() {
            return Err(XmlRpcError::protocol(format!(
                "multicall returned {} results for {} calls",
                results.len(),
                calls.len()
            )));
        }
        Ok(results.into_iter().map(multicall_entry).collect())
    }
}

fn multicall_entry(entry: Value) -> Result<Value> {
    match entry {
        Value::Array(mut items) if items.len() == 1 => Ok(items.remove(0)),
        Value::Struct(_) => {
            let code = entry.get("faultCode").and_then(Value::as_i64);
            let message = entry.get("faultString").and_then(Value::as_str);
            match (code, message) {
                (Some(code), Some(message)) => Err(XmlRpcError::Fault(Fault::new(code, message))),
                _ => Err(XmlRpcError::protocol("malformed fault in multicall result")),
            }
        }
        other => Err(XmlRpcError::protocol(format!(
            "unexpected multicall entry of type {}",
            other.type_name()
        ))),
    }
}
