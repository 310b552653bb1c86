//! Integration tests for the request state machine: retry behavior,
//! redirects, credential refresh, integrity checks, and abort handling,
//! all driven through a scripted in-memory transport.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;
use tokio::sync::Mutex;

use nimbus_client::{
    Client, ClientConfig, Credentials, CredentialsError, HttpMethod, Headers, Member, Operation,
    Protocol, ProvideCredentials, Region, SdkError, ServiceSchema, Shape, ShapeRef,
    SigningAlgorithm, StructureShape, Transport, TransportError, WireRequest, WireResponse,
};

/// Transport that replays a fixed script of responses and records every
/// request it carried.
#[derive(Debug)]
struct ScriptedTransport {
    script: Mutex<VecDeque<Result<WireResponse, TransportError>>>,
    calls: AtomicU32,
    hosts: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    fn new(script: Vec<Result<WireResponse, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicU32::new(0),
            hosts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &WireRequest) -> Result<WireResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.hosts.lock().await.push(request.host.clone());
        self.script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::new("script exhausted")))
    }
}

fn json_response(status: u16, body: &str) -> Result<WireResponse, TransportError> {
    Ok(WireResponse {
        status,
        headers: Headers::new(),
        body: Bytes::from(body.to_string()),
    })
}

fn response_with_header(
    status: u16,
    body: &str,
    name: &str,
    value: &str,
) -> Result<WireResponse, TransportError> {
    let mut headers = Headers::new();
    headers.set(name, value);
    Ok(WireResponse {
        status,
        headers,
        body: Bytes::from(body.to_string()),
    })
}

fn test_schema() -> Arc<ServiceSchema> {
    let mut schema = ServiceSchema::new(
        "widgets",
        "2024-01-01",
        Protocol::Json,
        SigningAlgorithm::V4,
    );
    schema.target_prefix = Some("Widgets".to_string());
    let body = ShapeRef::inline(Shape::Structure(
        StructureShape::new().member("Name", Member::new(ShapeRef::inline(Shape::String))),
    ));
    schema.add_operation(
        Operation::new("DescribeWidget", HttpMethod::Post, "/")
            .input(body.clone())
            .output(body),
    );
    Arc::new(schema)
}

fn client_with(
    transport: Arc<ScriptedTransport>,
    max_retries: u32,
    credentials: Arc<dyn ProvideCredentials>,
) -> Client {
    let config = ClientConfig::builder()
        .region(Region::new("us-east-1").unwrap())
        .max_retries(max_retries)
        .build()
        .unwrap();
    Client::with_transport(test_schema(), config, credentials, transport).unwrap()
}

fn static_credentials() -> Arc<dyn ProvideCredentials> {
    Arc::new(nimbus_client::StaticProvider::new(Credentials::new(
        "AKID", "secret",
    )))
}

#[tokio::test]
async fn test_exactly_n_attempts_when_budget_allows() {
    // Two failures then success: three attempts with budget for them.
    let transport = ScriptedTransport::new(vec![
        json_response(500, "{}"),
        json_response(500, "{}"),
        json_response(200, r#"{"Name":"abc"}"#),
    ]);
    let client = client_with(Arc::clone(&transport), 3, static_credentials());

    let data = client
        .invoke("DescribeWidget", json!({"Name": "abc"}))
        .unwrap()
        .send()
        .await
        .unwrap();

    assert_eq!(data, json!({"Name": "abc"}));
    assert_eq!(transport.calls(), 3);
}

#[tokio::test]
async fn test_terminal_error_when_budget_exhausted() {
    let transport = ScriptedTransport::new(vec![
        json_response(500, "{}"),
        json_response(500, "{}"),
        json_response(200, r#"{"Name":"abc"}"#),
    ]);
    let client = client_with(Arc::clone(&transport), 1, static_credentials());

    let error = client
        .invoke("DescribeWidget", json!({"Name": "abc"}))
        .unwrap()
        .send()
        .await
        .unwrap_err();

    // Budget of one retry means two attempts, then the 500 surfaces.
    assert_eq!(transport.calls(), 2);
    assert!(matches!(error, SdkError::Unknown { status: 500 }));
}

#[tokio::test]
async fn test_throttling_code_is_retried() {
    let transport = ScriptedTransport::new(vec![
        json_response(400, r#"{"__type":"ThrottlingException","message":"slow down"}"#),
        json_response(200, r#"{"Name":"abc"}"#),
    ]);
    let client = client_with(Arc::clone(&transport), 3, static_credentials());

    let data = client
        .invoke("DescribeWidget", json!({}))
        .unwrap()
        .send()
        .await
        .unwrap();
    assert_eq!(data, json!({"Name": "abc"}));
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn test_client_error_is_terminal() {
    let transport = ScriptedTransport::new(vec![json_response(
        404,
        r#"{"__type":"ResourceNotFound","message":"no such widget"}"#,
    )]);
    let client = client_with(Arc::clone(&transport), 3, static_credentials());

    let error = client
        .invoke("DescribeWidget", json!({}))
        .unwrap()
        .send()
        .await
        .unwrap_err();

    assert_eq!(transport.calls(), 1);
    match error {
        SdkError::Service(service) => {
            assert_eq!(service.code, "ResourceNotFound");
            assert_eq!(service.status, 404);
        }
        other => panic!("expected service error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_network_errors_are_retried() {
    let transport = ScriptedTransport::new(vec![
        Err(TransportError::new("connection reset")),
        json_response(200, r#"{"Name":"abc"}"#),
    ]);
    let client = client_with(Arc::clone(&transport), 3, static_credentials());

    let data = client
        .invoke("DescribeWidget", json!({}))
        .unwrap()
        .send()
        .await
        .unwrap();
    assert_eq!(data, json!({"Name": "abc"}));
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn test_redirect_is_followed_to_new_host() {
    let transport = ScriptedTransport::new(vec![
        response_with_header(
            307,
            "",
            "Location",
            "https://widgets.eu-west-1.amazonaws.com/",
        ),
        json_response(200, r#"{"Name":"abc"}"#),
    ]);
    let client = client_with(Arc::clone(&transport), 0, static_credentials());

    // Zero retry budget: the redirect must not consume an attempt.
    let data = client
        .invoke("DescribeWidget", json!({}))
        .unwrap()
        .send()
        .await
        .unwrap();
    assert_eq!(data, json!({"Name": "abc"}));
    assert_eq!(transport.calls(), 2);

    let hosts = transport.hosts.lock().await.clone();
    assert_eq!(
        hosts,
        vec![
            "widgets.us-east-1.amazonaws.com".to_string(),
            "widgets.eu-west-1.amazonaws.com".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_checksum_mismatch_is_retried() {
    // A wrong declared checksum first, then the correct one.
    let body = r#"{"Name":"abc"}"#;
    let correct = crc32fast::hash(body.as_bytes()).to_string();
    let transport = ScriptedTransport::new(vec![
        response_with_header(200, body, "x-amz-crc32", "1"),
        response_with_header(200, body, "x-amz-crc32", &correct),
    ]);
    let client = client_with(Arc::clone(&transport), 3, static_credentials());

    let data = client
        .invoke("DescribeWidget", json!({}))
        .unwrap()
        .send()
        .await
        .unwrap();
    assert_eq!(data, json!({"Name": "abc"}));
    assert_eq!(transport.calls(), 2);
}

/// Provider that counts refreshes and records invalidations.
#[derive(Debug, Default)]
struct RefreshTrackingProvider {
    provides: AtomicU32,
    invalidations: AtomicU32,
}

#[async_trait]
impl ProvideCredentials for RefreshTrackingProvider {
    async fn provide(&self) -> Result<Credentials, CredentialsError> {
        let n = self.provides.fetch_add(1, Ordering::SeqCst);
        Ok(Credentials::new(format!("AKID-{n}"), "secret").with_session_token("token"))
    }

    fn invalidate(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_expired_token_invalidates_credentials_and_retries() {
    let transport = ScriptedTransport::new(vec![
        json_response(403, r#"{"__type":"ExpiredTokenException","message":"expired"}"#),
        json_response(200, r#"{"Name":"abc"}"#),
    ]);
    let provider = Arc::new(RefreshTrackingProvider::default());
    let client = client_with(Arc::clone(&transport), 3, Arc::clone(&provider) as _);

    let data = client
        .invoke("DescribeWidget", json!({}))
        .unwrap()
        .send()
        .await
        .unwrap();

    assert_eq!(data, json!({"Name": "abc"}));
    assert_eq!(transport.calls(), 2);
    assert_eq!(provider.invalidations.load(Ordering::SeqCst), 1);
    // One resolution per attempt: the second attempt re-resolved after
    // the forced invalidation.
    assert!(provider.provides.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn test_abort_before_send_is_terminal() {
    let transport = ScriptedTransport::new(vec![json_response(200, r#"{"Name":"abc"}"#)]);
    let client = client_with(Arc::clone(&transport), 3, static_credentials());

    let request = client.invoke("DescribeWidget", json!({})).unwrap();
    let handle = request.abort_handle();
    handle.abort();

    let error = request.send().await.unwrap_err();
    assert!(matches!(error, SdkError::Aborted));
    assert_eq!(error.code(), "RequestAbortedError");
    // No retry is scheduled after an abort.
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_validation_failure_never_reaches_transport() {
    let transport = ScriptedTransport::new(vec![]);
    let client = client_with(Arc::clone(&transport), 3, static_credentials());

    let error = client
        .invoke("DescribeWidget", json!({"Name": 42}))
        .unwrap()
        .send()
        .await
        .unwrap_err();

    assert!(matches!(error, SdkError::Validation(_)));
    assert_eq!(transport.calls(), 0);
}
