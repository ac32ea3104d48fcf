//! Integration tests for the XML-RPC fixture server.
//!
//! Each test starts the server on an OS-assigned loopback port and talks to it
//! through `xmlrpc_core::Client`, the same way an external test suite would.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use xmlrpc_core::{
    Client, EndpointConfig, Fault, MethodCall, MethodRegistry, MethodResponse, Value, XmlRpcError,
};
use xmlrpc_server::server::start_server;

/// Start a fixture server and return its address.
async fn start_fixture() -> SocketAddr {
    start_server(
        MethodRegistry::fixture(),
        IpAddr::V4(Ipv4Addr::LOCALHOST),
        0,
    )
    .await
    .expect("Failed to start server")
}

async fn fixture_client() -> Client {
    let addr = start_fixture().await;
    Client::new(&format!("http://{}/", addr)).expect("Failed to create client")
}

fn ints(values: &[i32]) -> Value {
    Value::Array(values.iter().copied().map(Value::Int).collect())
}

/// Unwrap a fault, failing the test on any other outcome.
fn expect_fault(result: xmlrpc_core::Result<Value>) -> Fault {
    match result {
        Err(XmlRpcError::Fault(fault)) => fault,
        other => panic!("expected fault, got {:?}", other),
    }
}

// =============================================================================
// Introspection
// =============================================================================

#[tokio::test]
async fn test_list_methods() {
    let client = fixture_client().await;
    let methods: Vec<Value> = client.call_as("system.listMethods", &[]).await.unwrap();
    let names: Vec<&str> = methods.iter().filter_map(Value::as_str).collect();

    let fixture: Vec<&str> = names
        .iter()
        .copied()
        .filter(|name| !name.starts_with("system."))
        .collect();
    assert_eq!(fixture, vec!["add", "index", "subtract", "title", "upper"]);
    assert!(names.contains(&"system.methodSignature"));
    assert!(names.contains(&"system.methodHelp"));
}

#[tokio::test]
async fn test_method_signature_and_help() {
    let client = fixture_client().await;

    let signatures: Vec<Value> = client
        .call_as("system.methodSignature", &[Value::from("add")])
        .await
        .unwrap();
    assert!(signatures.contains(&Value::Array(vec![
        Value::from("int"),
        Value::from("int"),
        Value::from("int"),
    ])));

    let help: String = client
        .call_as("system.methodHelp", &[Value::from("upper")])
        .await
        .unwrap();
    assert!(!help.is_empty());

    let fault = expect_fault(
        client
            .call("system.methodHelp", &[Value::from("missing")])
            .await,
    );
    assert_eq!(fault.code, -32601);
}

// =============================================================================
// Procedures
// =============================================================================

#[tokio::test]
async fn test_add_and_subtract() {
    let client = fixture_client().await;

    let sum: i64 = client
        .call_as("add", &[Value::Int(2), Value::Int(3)])
        .await
        .unwrap();
    assert_eq!(sum, 5);

    let sum: f64 = client
        .call_as("add", &[Value::Double(0.5), Value::Int(-2)])
        .await
        .unwrap();
    assert_eq!(sum, -1.5);

    let wide = client
        .call("add", &[Value::I8(1 << 40), Value::Int(1)])
        .await
        .unwrap();
    assert_eq!(wide, Value::I8((1 << 40) + 1));

    let diff: i64 = client
        .call_as("subtract", &[Value::Int(5), Value::Int(3)])
        .await
        .unwrap();
    assert_eq!(diff, 2);
}

#[tokio::test]
async fn test_index() {
    let client = fixture_client().await;

    let v = client
        .call("index", &[ints(&[10, 20, 30]), Value::Int(1)])
        .await
        .unwrap();
    assert_eq!(v, Value::Int(20));

    let v = client
        .call("index", &[Value::from("abc"), Value::Int(0)])
        .await
        .unwrap();
    assert_eq!(v, Value::from("a"));

    let fault = expect_fault(
        client
            .call("index", &[ints(&[10, 20, 30]), Value::Int(5)])
            .await,
    );
    assert_eq!(fault.code, -32500);
}

#[tokio::test]
async fn test_upper_and_title() {
    let client = fixture_client().await;

    let s: String = client
        .call_as("upper", &[Value::from("hello")])
        .await
        .unwrap();
    assert_eq!(s, "HELLO");

    let s: String = client.call_as("upper", &[Value::from("")]).await.unwrap();
    assert_eq!(s, "");

    let s: String = client
        .call_as("title", &[Value::from("hello world")])
        .await
        .unwrap();
    assert_eq!(s, "Hello World");

    let fault = expect_fault(client.call("title", &[Value::Int(3)]).await);
    assert_eq!(fault.code, -32602);
}

// =============================================================================
// Fault handling
// =============================================================================

#[tokio::test]
async fn test_server_survives_faults() {
    let client = fixture_client().await;

    let fault = expect_fault(
        client
            .call("index", &[ints(&[1, 2, 3]), Value::Int(10)])
            .await,
    );
    assert_eq!(fault.code, -32500);

    let fault = expect_fault(client.call("no_such_method", &[]).await);
    assert_eq!(fault.code, -32601);

    let fault = expect_fault(client.call("add", &[Value::Int(1)]).await);
    assert_eq!(fault.code, -32602);

    // Still serving after three faults
    let sum: i64 = client
        .call_as("add", &[Value::Int(2), Value::Int(3)])
        .await
        .unwrap();
    assert_eq!(sum, 5);
}

#[tokio::test]
async fn test_malformed_request_gets_fault() {
    let addr = start_fixture().await;
    let http = reqwest::Client::new();

    let response = http
        .post(format!("http://{}/", addr))
        .header("content-type", "text/xml")
        .body("<methodCall><methodName>add</methodName><params>")
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body = response.text().await.unwrap();
    assert!(body.contains("<fault>"));

    // The next well-formed call still works
    let client = Client::new(&format!("http://{}/RPC2", addr)).unwrap();
    let s: String = client
        .call_as("upper", &[Value::from("ok")])
        .await
        .unwrap();
    assert_eq!(s, "OK");
}

/// Post a raw body to `/` and return the status and response text.
async fn post_raw(
    addr: SocketAddr,
    body: impl Into<reqwest::Body>,
) -> reqwest::Result<(u16, String)> {
    let response = reqwest::Client::new()
        .post(format!("http://{}/", addr))
        .header("content-type", "text/xml")
        .body(body)
        .timeout(Duration::from_secs(30))
        .send()
        .await?;
    let status = response.status().as_u16();
    Ok((status, response.text().await?))
}

async fn assert_still_serving(addr: SocketAddr) {
    let client = Client::new(&format!("http://{}/", addr)).unwrap();
    let s: String = client
        .call_as("upper", &[Value::from("alive")])
        .await
        .unwrap();
    assert_eq!(s, "ALIVE");
}

#[tokio::test]
async fn test_deeply_nested_request_gets_fault() {
    let addr = start_fixture().await;

    // ~800 KB of openers, under the body cap
    let body = format!(
        "<methodCall><methodName>upper</methodName><params><param>{}",
        "<value><array><data>".repeat(40_000)
    );
    assert!(body.len() < EndpointConfig::MAX_REQUEST_BYTES);

    let (status, xml) = post_raw(addr, body).await.unwrap();
    assert_eq!(status, 200);
    match MethodResponse::from_xml(&xml).unwrap() {
        MethodResponse::Fault(fault) => assert_eq!(fault.code, -32600),
        other => panic!("expected fault, got {:?}", other),
    }

    assert_still_serving(addr).await;
}

#[tokio::test]
async fn test_oversized_request_is_rejected() {
    let addr = start_fixture().await;

    let body = vec![b' '; EndpointConfig::MAX_REQUEST_BYTES + 1];
    // The server may close the connection before the upload finishes
    if let Ok((status, _)) = post_raw(addr, body).await {
        assert_eq!(status, 413);
    }

    assert_still_serving(addr).await;
}

#[tokio::test]
async fn test_unknown_path_is_http_error() {
    let addr = start_fixture().await;
    let client = Client::new(&format!("http://{}/nowhere", addr)).unwrap();
    let err = client.call("upper", &[Value::from("x")]).await.unwrap_err();
    assert!(matches!(err, XmlRpcError::HttpStatus { status: 404 }));
}

// =============================================================================
// Multicall and concurrency
// =============================================================================

#[tokio::test]
async fn test_multicall() {
    let client = fixture_client().await;
    let results = client
        .multicall(&[
            MethodCall::new("add", vec![Value::Int(1), Value::Int(2)]),
            MethodCall::new("index", vec![ints(&[1]), Value::Int(3)]),
            MethodCall::new("title", vec![Value::from("multi call")]),
        ])
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap(), &Value::Int(3));
    assert_eq!(
        results[1].as_ref().unwrap_err().as_fault().map(|f| f.code),
        Some(-32500)
    );
    assert_eq!(results[2].as_ref().unwrap(), &Value::from("Multi Call"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_get_their_own_answers() {
    let client = fixture_client().await;

    let mut handles = Vec::new();
    for i in 0..32 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            let sum: i64 = client
                .call_as("add", &[Value::Int(i), Value::Int(i)])
                .await
                .unwrap();
            (i, sum)
        }));
    }

    for handle in handles {
        let (i, sum) = handle.await.unwrap();
        assert_eq!(sum, i64::from(i) * 2);
    }
}

#[tokio::test]
async fn test_struct_arguments_round_trip_through_index() {
    let client = fixture_client().await;

    let mut members = BTreeMap::new();
    members.insert("name".to_string(), Value::from("fixture"));
    members.insert("bytes".to_string(), Value::Base64(vec![0, 1, 2]));
    let element = Value::Struct(members);

    let v = client
        .call(
            "index",
            &[Value::Array(vec![Value::Int(0), element.clone()]), Value::Int(-1)],
        )
        .await
        .unwrap();
    assert_eq!(v, element);
}

// =============================================================================
// Typed records
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Station {
    #[serde(rename = "stationName")]
    name: String,
    elevation: i32,
    readings: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    operator: Option<String>,
}

#[tokio::test]
async fn test_records_round_trip_through_index() {
    let client = fixture_client().await;
    let stations = vec![
        Station {
            name: "Harbor".into(),
            elevation: 4,
            readings: vec![12.5, 13.0],
            operator: Some("port authority".into()),
        },
        Station {
            name: "Summit".into(),
            elevation: 2_100,
            readings: vec![],
            operator: None,
        },
    ];

    let last: Station = client
        .call_with("index", &(stations.clone(), -1))
        .await
        .unwrap();
    assert_eq!(last, stations[1]);

    let first: Station = client
        .call_with("index", &(&stations, 0))
        .await
        .unwrap();
    assert_eq!(first, stations[0]);

    // Member names on the wire follow the serde renames
    let raw = client
        .call_with::<_, Value>("index", &(&stations, 0))
        .await
        .unwrap();
    assert_eq!(raw.get("stationName"), Some(&Value::from("Harbor")));

    let sum: i64 = client.call_with("add", &(40, 2)).await.unwrap();
    assert_eq!(sum, 42);

    let shouted: String = client.call_with("upper", "quiet").await.unwrap();
    assert_eq!(shouted, "QUIET");
}
