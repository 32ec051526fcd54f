//! Proxy execution tests
//!
//! Runs invocations through the executor and the gateway facade with a
//! recording fake in place of the authenticated HTTP capability.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use integration_gateway::access::{
    AccessLevel, AccessResolver, Category, ConnectionStatus, MemoryStore, UserContext,
};
use integration_gateway::error::{ACTION_BLOCKED, ACTION_UNAVAILABLE, ErrorClass};
use integration_gateway::gateway::Gateway;
use integration_gateway::manifest::{HttpMethod, ManifestRegistry, parse_manifest};
use integration_gateway::proxy::{AuthenticatedHttp, PreparedRequest, ProxyExecutor, TransportError};
use integration_gateway::status::FeatureCatalog;
use integration_gateway::tools::{GeneratedTool, generate_tools};
use integration_gateway::Error;

/// Records every request and answers with a canned result.
#[derive(Default)]
struct RecordingHttp {
    requests: Mutex<Vec<PreparedRequest>>,
    delay: Option<Duration>,
    fail_with: Option<u16>,
}

impl RecordingHttp {
    fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    fn failing(status: u16) -> Self {
        Self {
            fail_with: Some(status),
            ..Self::default()
        }
    }

    fn sent(&self) -> Vec<PreparedRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl AuthenticatedHttp for RecordingHttp {
    async fn send(&self, request: PreparedRequest) -> Result<Value, TransportError> {
        self.requests.lock().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(status) = self.fail_with {
            return Err(TransportError::Status {
                status,
                body: "secret upstream detail".to_string(),
            });
        }
        Ok(json!({ "ok": true, "path": request.path }))
    }
}

const USER: &str = "u-1";
const ORG: &str = "acme";

fn connected_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    for provider in ["greenhouse", "notion", "gmail"] {
        store.set_connection(USER, provider, ConnectionStatus::Connected, AccessLevel::ReadWrite);
    }
    store
}

fn gateway(http: Arc<RecordingHttp>, store: Arc<MemoryStore>, call_timeout: Duration) -> Gateway {
    let registry = Arc::new(ManifestRegistry::builtin().unwrap());
    let resolver = AccessResolver::new(registry.clone(), store.clone(), store);
    let executor = ProxyExecutor::new(registry.clone(), http);
    Gateway::new(registry, resolver, executor, FeatureCatalog::default(), call_timeout)
}

fn tool(registry: &ManifestRegistry, name: &str) -> GeneratedTool {
    let provider = registry.provider_for_tool(name).unwrap();
    generate_tools(provider, AccessLevel::ReadWrite)
        .into_iter()
        .find(|t| t.name == name)
        .unwrap()
}

#[tokio::test]
async fn invocation_partitions_arguments_and_encodes_path() {
    // GIVEN: a connected notion user
    let http = Arc::new(RecordingHttp::default());
    let gw = gateway(http.clone(), connected_store(), Duration::from_secs(5));

    // WHEN: querying a database with an id that needs encoding and an unknown arg
    let result = gw
        .call_tool(
            &UserContext::new(USER, ORG),
            "notion_query_database",
            json!({
                "database_id": "a/b c",
                "filter": { "property": "Status" },
                "unknown": "dropped"
            }),
        )
        .await
        .unwrap();

    // THEN: path value is one encoded segment, body holds body fields plus defaults
    assert_eq!(result["ok"], json!(true));
    let sent = http.sent();
    assert_eq!(sent.len(), 1);
    let request = &sent[0];
    assert_eq!(request.method, HttpMethod::Post);
    assert_eq!(request.path, "/databases/a%2Fb%20c/query");
    assert_eq!(request.on_behalf_of, USER);
    assert_eq!(
        request.body,
        Some(json!({ "filter": { "property": "Status" }, "page_size": 25 }))
    );
    assert!(request.query.is_empty());
}

#[tokio::test]
async fn query_parameters_are_coerced_and_defaulted() {
    let http = Arc::new(RecordingHttp::default());
    let gw = gateway(http.clone(), connected_store(), Duration::from_secs(5));

    gw.call_tool(
        &UserContext::new(USER, ORG),
        "greenhouse_list_jobs",
        json!({ "status": "open", "page": "2" }),
    )
    .await
    .unwrap();

    let request = &http.sent()[0];
    assert_eq!(request.path, "/jobs");
    let mut query = request.query.clone();
    query.sort();
    assert_eq!(
        query,
        vec![
            ("page".to_string(), "2".to_string()),
            ("per_page".to_string(), "50".to_string()),
            ("status".to_string(), "open".to_string()),
        ]
    );
    assert!(request.body.is_none());
}

#[tokio::test]
async fn invalid_arguments_never_reach_the_provider() {
    let http = Arc::new(RecordingHttp::default());
    let gw = gateway(http.clone(), connected_store(), Duration::from_secs(5));

    let err = gw
        .call_tool(
            &UserContext::new(USER, ORG),
            "greenhouse_get_job",
            json!({ "job_id": "not-a-number" }),
        )
        .await
        .unwrap_err();

    assert_eq!(err.class(), ErrorClass::Caller);
    assert!(err.public_message().contains("job_id"));
    assert!(http.sent().is_empty());
}

#[tokio::test]
async fn path_traversal_value_is_rejected() {
    let http = Arc::new(RecordingHttp::default());
    let gw = gateway(http.clone(), connected_store(), Duration::from_secs(5));

    let err = gw
        .call_tool(&UserContext::new(USER, ORG), "notion_get_page", json!({ "page_id": ".." }))
        .await
        .unwrap_err();

    assert_eq!(err.class(), ErrorClass::Caller);
    assert!(http.sent().is_empty());
}

#[tokio::test]
async fn write_tool_is_unavailable_at_read_only() {
    // GIVEN: the org caps ats at read-only
    let store = connected_store();
    store.set_org_ceiling(ORG, Category::Ats, AccessLevel::ReadOnly);
    let http = Arc::new(RecordingHttp::default());
    let gw = gateway(http.clone(), store, Duration::from_secs(5));

    // WHEN: calling a write tool by name
    let err = gw
        .call_tool(
            &UserContext::new(USER, ORG),
            "greenhouse_add_candidate_note",
            json!({ "candidate_id": 1, "user_id": 2, "body": "hi" }),
        )
        .await
        .unwrap_err();

    // THEN: indistinguishable from a tool that does not exist
    assert!(matches!(err, Error::ToolUnavailable(_)));
    assert_eq!(err.public_message(), ACTION_UNAVAILABLE);
    assert!(http.sent().is_empty());
}

#[tokio::test]
async fn lowering_the_chosen_level_drops_write_tools_on_the_next_request() {
    // GIVEN: a read-write greenhouse connection with the write tool listed
    let store = connected_store();
    let http = Arc::new(RecordingHttp::default());
    let gw = gateway(http.clone(), store.clone(), Duration::from_secs(5));
    let user = UserContext::new(USER, ORG);
    let note = json!({ "candidate_id": 1, "user_id": 2, "body": "hi" });

    let names: Vec<String> = gw.list_tools(&user).await.into_iter().map(|t| t.name).collect();
    assert!(names.contains(&"greenhouse_add_candidate_note".to_string()));
    gw.call_tool(&user, "greenhouse_add_candidate_note", note.clone())
        .await
        .unwrap();

    // WHEN: the user lowers their own level to read-only
    assert!(store.set_access_choice(USER, "greenhouse", AccessLevel::ReadOnly));

    // THEN: the next listing and call see it, reads still work
    let names: Vec<String> = gw.list_tools(&user).await.into_iter().map(|t| t.name).collect();
    assert!(!names.contains(&"greenhouse_add_candidate_note".to_string()));
    assert!(names.contains(&"greenhouse_list_jobs".to_string()));

    let err = gw
        .call_tool(&user, "greenhouse_add_candidate_note", note)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ToolUnavailable(_)));
    assert_eq!(http.sent().len(), 1);

    // AND: a provider the user never connected has no choice to change
    assert!(!store.set_access_choice(USER, "hubspot", AccessLevel::ReadOnly));
}

#[tokio::test]
async fn dangerous_tool_cannot_be_called_by_name() {
    let http = Arc::new(RecordingHttp::default());
    let gw = gateway(http.clone(), connected_store(), Duration::from_secs(5));

    let err = gw
        .call_tool(
            &UserContext::new(USER, ORG),
            "greenhouse_reject_application",
            json!({ "application_id": 1, "rejection_reason_id": 2 }),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ToolUnavailable(_)));
    assert!(http.sent().is_empty());
}

#[tokio::test]
async fn executor_enforces_blocklist_on_a_wrongly_generated_tool() {
    // GIVEN: a manifest whose operation lands on a blocklisted path
    let manifest = parse_manifest(
        r"
provider: acme_ats
display_name: Acme ATS
category: ats
base_url: https://api.acme.test
auth:
  type: bearer
operations:
  - id: get_user_permissions
    method: GET
    path: /users/{user_id}/permissions
    access: read
    description: Read a user's permission set
    params:
      user_id:
        type: string
        required: true
blocklist:
  - /users/*/permissions
",
    )
    .unwrap();
    let registry = Arc::new(ManifestRegistry::from_manifests(vec![manifest]).unwrap());
    let http = Arc::new(RecordingHttp::default());
    let executor = ProxyExecutor::new(registry.clone(), http.clone());

    // AND: a tool compiled for it, as a buggy generator might
    let manifest = registry.get_manifest("acme_ats").unwrap();
    let buggy = GeneratedTool::compile(manifest, manifest.operation("get_user_permissions").unwrap());

    // WHEN: executing it
    let err = executor
        .execute(USER, &buggy, &json!({ "user_id": "7" }))
        .await
        .unwrap_err();

    // THEN: blocked with a generic message, and nothing was sent
    assert_eq!(err.class(), ErrorClass::Policy);
    assert_eq!(err.public_message(), ACTION_BLOCKED);
    assert!(http.sent().is_empty());

    // AND: the verdict is deterministic
    let again = executor.prepare(USER, &buggy, &json!({ "user_id": "7" })).unwrap_err();
    assert_eq!(again.class(), ErrorClass::Policy);
}

#[tokio::test]
async fn vanished_operation_is_an_integrity_fault_with_generic_message() {
    let registry = ManifestRegistry::builtin().unwrap();
    let mut stale = tool(&registry, "greenhouse_get_job");
    stale.operation_id = "get_job_v0".to_string();

    let http = Arc::new(RecordingHttp::default());
    let executor = ProxyExecutor::new(Arc::new(registry), http.clone());
    let err = executor
        .execute(USER, &stale, &json!({ "job_id": 1 }))
        .await
        .unwrap_err();

    assert_eq!(err.class(), ErrorClass::Integrity);
    assert_eq!(err.public_message(), ACTION_UNAVAILABLE);
    assert_eq!(err.public_code(), "unavailable");
    assert!(http.sent().is_empty());
}

#[tokio::test]
async fn upstream_failure_keeps_context_but_hides_body() {
    let http = Arc::new(RecordingHttp::failing(503));
    let gw = gateway(http.clone(), connected_store(), Duration::from_secs(5));

    let err = gw
        .call_tool(&UserContext::new(USER, ORG), "gmail_list_messages", json!({}))
        .await
        .unwrap_err();

    assert_eq!(err.class(), ErrorClass::Upstream);
    match &err {
        Error::Upstream {
            provider,
            operation,
            status,
            ..
        } => {
            assert_eq!(provider, "gmail");
            assert_eq!(operation, "list_messages");
            assert_eq!(*status, Some(503));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!err.public_message().contains("secret"));
}

#[tokio::test]
async fn slow_provider_times_out_as_upstream_error() {
    let http = Arc::new(RecordingHttp::slow(Duration::from_millis(500)));
    let gw = gateway(http.clone(), connected_store(), Duration::from_millis(20));

    let err = gw
        .call_tool(&UserContext::new(USER, ORG), "greenhouse_list_jobs", json!({}))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UpstreamTimeout { timeout_ms: 20, .. }));
    assert_eq!(err.class(), ErrorClass::Upstream);
}
