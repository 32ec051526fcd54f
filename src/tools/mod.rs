//! Tool generation from provider manifests
//!
//! A tool is one manifest operation that survived the access filter, with its
//! parameter descriptors compiled into an [`InputSchema`]. Tool lists are
//! recomputed from scratch whenever access may have changed.

mod schema;

use access_core::{AccessLevel, Category, OperationAccess};
use serde::Serialize;
use serde_json::Value;

pub use schema::{
    FieldKind, FieldSchema, InputSchema, SchemaValidationResult, ValidationViolation,
};

use crate::manifest::{HttpMethod, ProviderManifest, ProviderOperation};

/// Agent-visible name of an operation.
///
/// Stable across calls; renaming an operation id is a breaking change.
#[must_use]
pub fn tool_name(provider: &str, operation_id: &str) -> String {
    format!("{provider}_{operation_id}")
}

/// Whether an operation may be exposed at `level`.
#[must_use]
pub fn is_operation_allowed(op: &ProviderOperation, level: AccessLevel) -> bool {
    access_core::is_operation_allowed(op.access, level)
}

/// Operations of a manifest exposed at `level`, in declaration order.
#[must_use]
pub fn filter_operations_by_access(
    manifest: &ProviderManifest,
    level: AccessLevel,
) -> Vec<&ProviderOperation> {
    manifest
        .operations
        .iter()
        .filter(|op| is_operation_allowed(op, level))
        .collect()
}

/// A runtime-generated, schema-validated wrapper around one operation.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedTool {
    /// `{provider}_{operation}`
    pub name: String,
    /// Agent-facing description
    pub description: String,
    /// Compiled argument schema
    pub input_schema: InputSchema,
    /// Provider id
    pub provider: String,
    /// Operation id
    pub operation_id: String,
    /// HTTP method
    pub method: HttpMethod,
    /// Path template
    pub path: String,
    /// Provider category
    pub category: Category,
    /// Required access tier
    pub access: OperationAccess,
}

impl GeneratedTool {
    /// Compile one operation, without checking access.
    #[must_use]
    pub fn compile(manifest: &ProviderManifest, op: &ProviderOperation) -> Self {
        Self {
            name: tool_name(&manifest.provider, &op.id),
            description: build_description(manifest, op),
            input_schema: InputSchema::compile(op),
            provider: manifest.provider.clone(),
            operation_id: op.id.clone(),
            method: op.method,
            path: op.path.clone(),
            category: manifest.category,
            access: op.access,
        }
    }

    /// Serializable descriptor for listing to agents.
    #[must_use]
    pub fn to_descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.to_json_schema(),
            annotations: ToolAnnotations {
                read_only_hint: self.access == OperationAccess::Read,
                destructive_hint: matches!(
                    self.access,
                    OperationAccess::Delete | OperationAccess::Dangerous
                ),
            },
        }
    }
}

/// Tool as listed to agents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    /// Tool name
    pub name: String,
    /// Description
    pub description: String,
    /// JSON Schema of the arguments
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
    /// Behavior hints
    pub annotations: ToolAnnotations,
}

/// Hints about tool behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToolAnnotations {
    /// Tool does not modify provider state
    #[serde(rename = "readOnlyHint")]
    pub read_only_hint: bool,
    /// Tool may delete data
    #[serde(rename = "destructiveHint")]
    pub destructive_hint: bool,
}

fn build_description(manifest: &ProviderManifest, op: &ProviderOperation) -> String {
    let base = if op.description.is_empty() {
        format!("{} {}", op.method, op.path)
    } else {
        op.description.clone()
    };
    let hints = if op.response_hints.is_empty() {
        String::new()
    } else {
        format!(" [returns: {}]", op.response_hints.join(", "))
    };
    format!("{base} ({}){hints}", manifest.label())
}

/// Tools a manifest yields at `level`.
///
/// `None` and `Disabled` always yield nothing; `Dangerous` operations are
/// never generated.
#[must_use]
pub fn generate_tools(manifest: &ProviderManifest, level: AccessLevel) -> Vec<GeneratedTool> {
    filter_operations_by_access(manifest, level)
        .into_iter()
        .map(|op| GeneratedTool::compile(manifest, op))
        .collect()
}

/// Operation counts for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ToolSummary {
    /// Operations in the manifest
    pub total: usize,
    /// Exposed read operations
    pub read: usize,
    /// Exposed write and delete operations
    pub write: usize,
    /// Operations hidden at this level
    pub filtered: usize,
}

/// Count what `generate_tools` would expose at `level`.
#[must_use]
pub fn get_tool_summary(manifest: &ProviderManifest, level: AccessLevel) -> ToolSummary {
    let allowed = filter_operations_by_access(manifest, level);
    let read = allowed
        .iter()
        .filter(|op| op.access == OperationAccess::Read)
        .count();
    ToolSummary {
        total: manifest.operations.len(),
        read,
        write: allowed.len() - read,
        filtered: manifest.operations.len() - allowed.len(),
    }
}
