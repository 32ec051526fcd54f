//! Reqwest transport tests against a mock provider

use std::sync::Arc;

use httpmock::prelude::*;
use serde_json::{Value, json};

use integration_gateway::manifest::{AuthShape, HttpMethod};
use integration_gateway::proxy::{
    AuthenticatedHttp, HttpTransport, PreparedRequest, StaticCredentialSource, TransportError,
};

fn transport(provider: &str, credential: &str) -> HttpTransport {
    let credentials = Arc::new(StaticCredentialSource::new().with(provider, credential));
    HttpTransport::new(credentials, "integration-gateway-test").unwrap()
}

fn request(base_url: &str, method: HttpMethod, path: &str) -> PreparedRequest {
    PreparedRequest {
        on_behalf_of: "u-1".to_string(),
        provider: "notion".to_string(),
        operation: "query_database".to_string(),
        auth: AuthShape::Bearer,
        method,
        base_url: base_url.to_string(),
        path: path.to_string(),
        query: Vec::new(),
        body: None,
    }
}

#[tokio::test]
async fn sends_credential_query_and_body() {
    let server = MockServer::start();
    let query = server.mock(|when, then| {
        when.method(POST)
            .path("/databases/db1/query")
            .header("authorization", "Bearer secret-token")
            .query_param("dry_run", "true")
            .json_body(json!({ "page_size": 10 }));
        then.status(200).json_body(json!({ "results": [] }));
    });

    let mut req = request(&server.base_url(), HttpMethod::Post, "/databases/db1/query");
    req.query = vec![("dry_run".to_string(), "true".to_string())];
    req.body = Some(json!({ "page_size": 10 }));

    let result = transport("notion", "secret-token").send(req).await.unwrap();
    assert_eq!(result, json!({ "results": [] }));
    query.assert_calls(1);
}

#[tokio::test]
async fn basic_auth_credential_is_encoded() {
    let server = MockServer::start();
    let jobs = server.mock(|when, then| {
        when.method(GET)
            .path("/jobs")
            .header("authorization", "Basic a2V5Og==");
        then.status(200).json_body(json!([]));
    });

    let mut req = request(&server.base_url(), HttpMethod::Get, "/jobs");
    req.auth = AuthShape::Basic;

    transport("notion", "key:").send(req).await.unwrap();
    jobs.assert_calls(1);
}

#[tokio::test]
async fn repeated_query_keys_are_preserved() {
    let server = MockServer::start();
    let messages = server.mock(|when, then| {
        when.method(GET)
            .path("/users/me/messages")
            .query_param("labelIds", "INBOX")
            .query_param("labelIds", "UNREAD");
        then.status(200).json_body(json!({ "messages": [] }));
    });

    let mut req = request(&server.base_url(), HttpMethod::Get, "/users/me/messages");
    req.query = vec![
        ("labelIds".to_string(), "INBOX".to_string()),
        ("labelIds".to_string(), "UNREAD".to_string()),
    ];

    transport("notion", "t").send(req).await.unwrap();
    messages.assert_calls(1);
}

#[tokio::test]
async fn empty_success_body_is_null() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(DELETE).path("/candidates/7");
        then.status(204);
    });

    let result = transport("notion", "t")
        .send(request(&server.base_url(), HttpMethod::Delete, "/candidates/7"))
        .await
        .unwrap();
    assert_eq!(result, Value::Null);
}

#[tokio::test]
async fn non_json_success_body_is_returned_as_text() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/export");
        then.status(200).body("a,b\n1,2\n");
    });

    let result = transport("notion", "t")
        .send(request(&server.base_url(), HttpMethod::Get, "/export"))
        .await
        .unwrap();
    assert_eq!(result, Value::String("a,b\n1,2\n".to_string()));
}

#[tokio::test]
async fn error_status_is_reported_with_truncated_body() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/pages/p1");
        then.status(429).body("x".repeat(2000));
    });

    let err = transport("notion", "t")
        .send(request(&server.base_url(), HttpMethod::Get, "/pages/p1"))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(429));
    match err {
        TransportError::Status { body, .. } => assert_eq!(body.len(), 500),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn missing_credential_fails_before_sending() {
    let server = MockServer::start();
    let any = server.mock(|when, then| {
        when.method(GET);
        then.status(200);
    });

    let err = transport("hubspot", "t")
        .send(request(&server.base_url(), HttpMethod::Get, "/pages/p1"))
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::Credentials(_)));
    assert_eq!(err.status(), None);
    any.assert_calls(0);
}

#[tokio::test]
async fn unreachable_provider_is_a_network_error() {
    let err = transport("notion", "t")
        .send(request("http://127.0.0.1:9", HttpMethod::Get, "/pages/p1"))
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::Network(_)));
    assert!(!err.to_string().contains("127.0.0.1:9"));
}
