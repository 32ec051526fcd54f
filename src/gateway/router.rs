//! HTTP router and handlers

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    body::Bytes,
    error_handling::HandleErrorLayer,
    extract::{DefaultBodyLimit, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use tower::{BoxError, ServiceBuilder, timeout::TimeoutLayer};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::debug;

use super::Gateway;
use crate::Error;
use crate::access::UserContext;
use crate::tools::ToolDescriptor;

/// Header carrying the caller's user id
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the caller's organization id
pub const ORG_ID_HEADER: &str = "x-org-id";
/// Header carrying the caller's role; `admin` marks an org admin
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Shared application state
pub struct AppState {
    /// The service facade
    pub gateway: Arc<Gateway>,
}

/// Create the router
///
/// Identity is established upstream of this service and forwarded in the
/// `x-user-id`, `x-org-id` and `x-user-role` headers.
pub fn create_router(state: Arc<AppState>, max_body_size: usize, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/tools", get(list_tools_handler))
        .route("/v1/tools/summary", get(tool_summary_handler))
        .route("/v1/tools/{name}", post(call_tool_handler))
        .route("/v1/features/{id}", get(feature_status_handler))
        .route("/v1/access", get(access_handler))
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_middleware_error(err: BoxError) -> Response {
    if err.is::<tower::timeout::error::Elapsed>() {
        error_body(
            StatusCode::REQUEST_TIMEOUT,
            "caller",
            "request_timeout",
            "Request timed out",
        )
    } else {
        error_body(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            "internal",
            crate::error::ACTION_UNAVAILABLE,
        )
    }
}

fn error_body(status: StatusCode, class: &str, code: &str, message: &str) -> Response {
    (
        status,
        Json(json!({
            "error": {
                "class": class,
                "code": code,
                "message": message
            }
        })),
    )
        .into_response()
}

/// Render a gateway error with only its public text.
fn error_response(err: &Error) -> Response {
    error_body(
        err.http_status(),
        err.class().as_str(),
        err.public_code(),
        &err.public_message(),
    )
}

fn unauthenticated(message: &str) -> Response {
    error_body(StatusCode::UNAUTHORIZED, "caller", "unauthenticated", message)
}

/// Extract the caller identity from forwarded headers.
fn user_from_headers(headers: &HeaderMap) -> Result<UserContext, Response> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let user_id = header(USER_ID_HEADER)
        .ok_or_else(|| unauthenticated("Missing x-user-id header"))?;
    let org_id = header(ORG_ID_HEADER)
        .ok_or_else(|| unauthenticated("Missing x-org-id header"))?;

    let user = UserContext::new(user_id, org_id);
    Ok(match header(USER_ROLE_HEADER) {
        Some(role) if role.eq_ignore_ascii_case("admin") => user.admin(),
        _ => user,
    })
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "providers": state.gateway.registry().len(),
        "features": state.gateway.features().len()
    }))
}

async fn list_tools_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let user = match user_from_headers(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };

    let tools: Vec<ToolDescriptor> = state
        .gateway
        .list_tools(&user)
        .await
        .iter()
        .map(|tool| tool.to_descriptor())
        .collect();

    Json(json!({ "tools": tools })).into_response()
}

async fn tool_summary_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let user = match user_from_headers(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };

    Json(json!({ "providers": state.gateway.tool_summaries(&user).await })).into_response()
}

async fn call_tool_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let user = match user_from_headers(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };

    let arguments = if body.is_empty() {
        Value::Null
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "Rejected malformed tool arguments");
                return error_body(
                    StatusCode::BAD_REQUEST,
                    "caller",
                    "invalid_json",
                    "Request body is not valid JSON",
                );
            }
        }
    };

    match state.gateway.call_tool(&user, &name, arguments).await {
        Ok(result) => Json(json!({ "result": result })).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn feature_status_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let user = match user_from_headers(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };

    match state.gateway.feature_status(&user, &id).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn access_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let user = match user_from_headers(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };

    Json(state.gateway.access_profile(&user).await).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn identity_requires_user_and_org() {
        assert!(user_from_headers(&headers(&[])).is_err());
        assert!(user_from_headers(&headers(&[(USER_ID_HEADER, "u1")])).is_err());
        assert!(user_from_headers(&headers(&[(USER_ID_HEADER, " "), (ORG_ID_HEADER, "o1")])).is_err());
    }

    #[test]
    fn admin_role_is_case_insensitive() {
        let user = user_from_headers(&headers(&[
            (USER_ID_HEADER, "u1"),
            (ORG_ID_HEADER, "o1"),
            (USER_ROLE_HEADER, "Admin"),
        ]))
        .unwrap();
        assert!(user.is_admin);

        let user = user_from_headers(&headers(&[
            (USER_ID_HEADER, "u1"),
            (ORG_ID_HEADER, "o1"),
            (USER_ROLE_HEADER, "member"),
        ]))
        .unwrap();
        assert!(!user.is_admin);
        assert_eq!(user.org_id, "o1");
    }

    #[test]
    fn error_response_uses_public_status() {
        let response = error_response(&Error::Integrity("op vanished".to_string()));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
