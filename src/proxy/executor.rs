//! Proxy executor - turns a tool invocation into a provider call
//!
//! Each invocation runs the same pipeline:
//!
//! 1. Re-resolve the operation from the registry (never trust the tool).
//! 2. Validate and normalize arguments against the tool's schema.
//! 3. Partition arguments into path, body and query values.
//! 4. Interpolate the path template, encoding each value as one segment.
//! 5. Check the realized path against the manifest blocklist.
//! 6. Send through the authenticated HTTP capability.
//! 7. Return the provider's response unmodified, or a classified error.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, error, warn};
use url::Url;

use super::blocklist::Blocklist;
use super::transport::{AuthenticatedHttp, PreparedRequest};
use crate::manifest::{ManifestRegistry, ProviderOperation};
use crate::tools::GeneratedTool;
use crate::{Error, Result};

/// Arguments split by placement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartitionedArguments {
    /// Values for path placeholders
    pub path: Map<String, Value>,
    /// Query pairs, in key order
    pub query: Vec<(String, String)>,
    /// JSON body, present whenever the operation declares body fields
    pub body: Option<Map<String, Value>>,
}

/// Split validated arguments by where the operation declares them.
///
/// Placeholders win over body and query declarations. Undeclared names and
/// null query values are dropped.
#[must_use]
pub fn partition_arguments(op: &ProviderOperation, args: &Map<String, Value>) -> PartitionedArguments {
    let placeholders = op.path_placeholders();
    let mut out = PartitionedArguments {
        body: (!op.body.is_empty()).then(Map::new),
        ..PartitionedArguments::default()
    };

    for (name, value) in args {
        if placeholders.iter().any(|p| p == name) {
            out.path.insert(name.clone(), value.clone());
        } else if op.body.contains_key(name) {
            if let Some(body) = out.body.as_mut() {
                body.insert(name.clone(), value.clone());
            }
        } else if op.params.contains_key(name) {
            push_query(&mut out.query, name, value);
        } else {
            debug!(param = %name, operation = %op.id, "Dropping undeclared argument");
        }
    }

    out
}

fn push_query(query: &mut Vec<(String, String)>, name: &str, value: &Value) {
    match value {
        Value::Null => {}
        Value::Array(items) => {
            for item in items {
                if !item.is_null() {
                    query.push((name.to_string(), query_scalar(item)));
                }
            }
        }
        other => query.push((name.to_string(), query_scalar(other))),
    }
}

fn query_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        // Nested structures travel as JSON text.
        other => other.to_string(),
    }
}

/// Percent-encode a value as exactly one path segment.
///
/// Separators (`/`, `\`), `?`, `#` and `%` are encoded. Values that are empty
/// or consist only of dot segments are rejected, since they would change
/// which resource the path addresses.
pub fn encode_path_segment(name: &str, raw: &str) -> Result<String> {
    if raw.is_empty() || raw == "." || raw == ".." {
        return Err(Error::InvalidArguments(format!(
            "path parameter '{name}' must not be empty, '.' or '..'"
        )));
    }

    let mut url = Url::parse("http://segment.invalid/")
        .map_err(|e| Error::Internal(format!("segment encoder base URL: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| Error::Internal("segment encoder URL cannot be a base".to_string()))?
        .clear()
        .push(raw);

    let encoded = url.path().trim_start_matches('/').to_string();
    if encoded.is_empty() {
        return Err(Error::InvalidArguments(format!(
            "path parameter '{name}' has no usable value"
        )));
    }
    Ok(encoded)
}

/// Substitute `{name}` placeholders with encoded values.
///
/// A placeholder with no value (missing or null) fails with
/// [`Error::MissingPathParameter`]. Only scalars are accepted.
pub fn interpolate_path(template: &str, values: &Map<String, Value>) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start + 1..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let name = &rest[start + 1..start + 1 + len];

        let raw = match values.get(name) {
            None | Some(Value::Null) => return Err(Error::MissingPathParameter(name.to_string())),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            Some(_) => {
                return Err(Error::InvalidArguments(format!(
                    "path parameter '{name}' must be a string, number or boolean"
                )));
            }
        };
        out.push_str(&encode_path_segment(name, &raw)?);
        rest = &rest[start + 2 + len..];
    }
    out.push_str(rest);

    Ok(out)
}

/// Executes tool invocations against provider APIs.
#[derive(Clone)]
pub struct ProxyExecutor {
    registry: Arc<ManifestRegistry>,
    http: Arc<dyn AuthenticatedHttp>,
}

impl ProxyExecutor {
    /// Create an executor.
    pub fn new(registry: Arc<ManifestRegistry>, http: Arc<dyn AuthenticatedHttp>) -> Self {
        Self { registry, http }
    }

    /// Run steps 1 to 5 and return the request that would be sent.
    pub fn prepare(
        &self,
        on_behalf_of: &str,
        tool: &GeneratedTool,
        arguments: &Value,
    ) -> Result<PreparedRequest> {
        let Some((manifest, op)) = self.registry.find_operation(&tool.provider, &tool.operation_id)
        else {
            error!(
                provider = %tool.provider,
                operation = %tool.operation_id,
                tool = %tool.name,
                "Operation not found in registry; this should never happen"
            );
            return Err(Error::Integrity(format!(
                "operation {}.{} not found",
                tool.provider, tool.operation_id
            )));
        };

        let validation = tool.input_schema.validate(arguments);
        if !validation.is_valid() {
            return Err(Error::InvalidArguments(
                validation.format_error(&tool.input_schema),
            ));
        }

        let parts = partition_arguments(op, &validation.coerced);
        let path = interpolate_path(&op.path, &parts.path)?;

        let blocklist = Blocklist::compile(&manifest.blocklist).map_err(|e| {
            error!(provider = %manifest.provider, error = %e, "Blocklist failed to compile; this should never happen");
            Error::Integrity(e.to_string())
        })?;
        if let Some(pattern) = blocklist.first_match(&path) {
            warn!(
                provider = %manifest.provider,
                operation = %op.id,
                pattern,
                "Blocked request to blocklisted path"
            );
            return Err(Error::Blocked {
                provider: manifest.provider.clone(),
                operation: op.id.clone(),
            });
        }

        Ok(PreparedRequest {
            on_behalf_of: on_behalf_of.to_string(),
            provider: manifest.provider.clone(),
            operation: op.id.clone(),
            auth: manifest.auth.clone(),
            method: op.method,
            base_url: manifest.base_url.clone(),
            path,
            query: parts.query,
            body: parts.body.map(Value::Object),
        })
    }

    /// Execute a tool invocation.
    pub async fn execute(
        &self,
        on_behalf_of: &str,
        tool: &GeneratedTool,
        arguments: &Value,
    ) -> Result<Value> {
        let request = self.prepare(on_behalf_of, tool, arguments)?;
        let provider = request.provider.clone();
        let operation = request.operation.clone();

        debug!(
            provider = %provider,
            operation = %operation,
            method = %request.method,
            path = %request.path,
            "Sending provider request"
        );

        self.http.send(request).await.map_err(|e| Error::Upstream {
            provider,
            operation,
            status: e.status(),
            message: e.to_string(),
        })
    }
}
