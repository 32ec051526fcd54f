//! Structural validator for provider manifests.
//!
//! A manifest is a deployed security artifact: it decides which endpoints an
//! agent can reach and at which access tier. This module catches the mistakes
//! that would otherwise surface as confusing runtime failures, or worse, as
//! an endpoint exposed at the wrong tier.
//!
//! All checks run in a single pass so the caller gets every issue at once.
//! [`IssueSeverity::Error`] issues keep the manifest out of the registry;
//! warnings are logged and the manifest is accepted.

use std::collections::{BTreeMap, HashMap, HashSet};

use access_core::OperationAccess;

use super::definition::{HttpMethod, ParamKind, ParameterDef, ProviderManifest, ProviderOperation};
use crate::tools::tool_name;

// ── Public types ──────────────────────────────────────────────────────────────

/// Severity of a structural validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IssueSeverity {
    /// The manifest cannot be served safely; registry construction fails.
    Error,
    /// The manifest works but has a smell that should be fixed.
    Warning,
}

impl std::fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => f.write_str("ERROR"),
            Self::Warning => f.write_str("WARN"),
        }
    }
}

/// A single structural validation finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// Severity level.
    pub severity: IssueSeverity,
    /// Short code identifying the check (e.g. `"MAN-008"`).
    pub code: &'static str,
    /// Human-readable description of the issue.
    pub message: String,
    /// YAML field path for context (e.g. `"operations.get_job.path"`).
    pub field: Option<String>,
}

impl Issue {
    fn error(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Error,
            code,
            message: message.into(),
            field: None,
        }
    }

    fn warning(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Warning,
            code,
            message: message.into(),
            field: None,
        }
    }

    fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(field) = &self.field {
            write!(f, "[{}] {} ({}): {}", self.severity, self.code, field, self.message)
        } else {
            write!(f, "[{}] {}: {}", self.severity, self.code, self.message)
        }
    }
}

/// Whether any issue in the slice is an error.
#[must_use]
pub fn has_errors(issues: &[Issue]) -> bool {
    issues.iter().any(|i| i.severity == IssueSeverity::Error)
}

// ── Entry points ──────────────────────────────────────────────────────────────

/// Validate a single parsed manifest.
#[must_use]
pub fn validate_manifest(manifest: &ProviderManifest) -> Vec<Issue> {
    let mut issues = Vec::new();

    check_provider_id(&manifest.provider, &mut issues);
    check_display_name(manifest, &mut issues);
    check_base_url(&manifest.base_url, &mut issues);
    check_operations(manifest, &mut issues);
    check_blocklist(&manifest.blocklist, &mut issues);
    check_rate_limit(manifest, &mut issues);

    issues
}

/// Validate a set of manifests, adding cross-manifest duplicate detection.
///
/// Returns a map from provider id to its issues. Only manifests with at least
/// one issue appear.
#[must_use]
pub fn validate_manifests(manifests: &[ProviderManifest]) -> BTreeMap<String, Vec<Issue>> {
    let mut results: BTreeMap<String, Vec<Issue>> = BTreeMap::new();

    for manifest in manifests {
        let issues = validate_manifest(manifest);
        if !issues.is_empty() {
            results
                .entry(manifest.provider.clone())
                .or_default()
                .extend(issues);
        }
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for manifest in manifests {
        *counts.entry(manifest.provider.as_str()).or_default() += 1;
    }
    for (provider, count) in counts {
        if count > 1 {
            results.entry(provider.to_string()).or_default().push(
                Issue::error(
                    "MAN-020",
                    format!("provider '{provider}' is declared by {count} manifests"),
                )
                .with_field("provider"),
            );
        }
    }

    check_tool_name_collisions(manifests, &mut results);

    results
}

/// MAN-021: `{provider}_{operation}` must name one operation across all manifests.
fn check_tool_name_collisions(
    manifests: &[ProviderManifest],
    results: &mut BTreeMap<String, Vec<Issue>>,
) {
    let mut owners: HashMap<String, (&str, &str)> = HashMap::new();
    for manifest in manifests {
        for op in &manifest.operations {
            let name = tool_name(&manifest.provider, &op.id);
            match owners.get(&name).copied() {
                Some((provider, _)) if provider == manifest.provider => {}
                Some((provider, operation)) => {
                    let message = format!(
                        "tool name '{name}' is produced by both {provider}.{operation} and {}.{}",
                        manifest.provider, op.id
                    );
                    let sides = [(provider, operation), (manifest.provider.as_str(), op.id.as_str())];
                    for (owner, op_id) in sides {
                        results.entry(owner.to_string()).or_default().push(
                            Issue::error("MAN-021", message.clone())
                                .with_field(format!("operations.{op_id}.id")),
                        );
                    }
                }
                None => {
                    owners.insert(name, (&manifest.provider, &op.id));
                }
            }
        }
    }
}

// ── Individual checks ─────────────────────────────────────────────────────────

fn is_identifier(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_ascii_lowercase())
        && s.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// MAN-001: provider id must be a lowercase identifier.
fn check_provider_id(provider: &str, issues: &mut Vec<Issue>) {
    if provider.is_empty() {
        issues.push(Issue::error("MAN-001", "provider is required").with_field("provider"));
    } else if !is_identifier(provider) {
        issues.push(
            Issue::error(
                "MAN-001",
                format!(
                    "provider '{provider}' must start with a letter and contain only lowercase letters, digits and underscores"
                ),
            )
            .with_field("provider"),
        );
    }
}

/// MAN-002: display name should be set.
fn check_display_name(manifest: &ProviderManifest, issues: &mut Vec<Issue>) {
    if manifest.display_name.trim().is_empty() {
        issues.push(
            Issue::warning("MAN-002", "display_name is empty; the provider id is shown instead")
                .with_field("display_name"),
        );
    }
}

/// MAN-003: base URL must be absolute; plain HTTP is only tolerated with a warning.
fn check_base_url(base_url: &str, issues: &mut Vec<Issue>) {
    match url::Url::parse(base_url) {
        Ok(url) if url.host().is_none() => {
            issues.push(
                Issue::error("MAN-003", format!("base_url '{base_url}' has no host"))
                    .with_field("base_url"),
            );
        }
        Ok(url) if url.scheme() == "https" => {}
        Ok(url) if url.scheme() == "http" => {
            issues.push(
                Issue::warning(
                    "MAN-003",
                    format!("base_url '{base_url}' is not https; credentials travel in clear text"),
                )
                .with_field("base_url"),
            );
        }
        Ok(url) => {
            issues.push(
                Issue::error(
                    "MAN-003",
                    format!("base_url scheme '{}' is not supported", url.scheme()),
                )
                .with_field("base_url"),
            );
        }
        Err(e) => {
            issues.push(
                Issue::error("MAN-003", format!("base_url '{base_url}' is not a valid URL: {e}"))
                    .with_field("base_url"),
            );
        }
    }
}

/// MAN-004 .. MAN-014: per-operation checks.
fn check_operations(manifest: &ProviderManifest, issues: &mut Vec<Issue>) {
    if manifest.operations.is_empty() {
        issues.push(
            Issue::warning("MAN-004", "manifest declares no operations; it yields no tools")
                .with_field("operations"),
        );
        return;
    }

    let mut seen = HashSet::new();
    for op in &manifest.operations {
        let ctx = format!("operations.{}", op.id);

        // MAN-005
        if !is_identifier(&op.id) {
            issues.push(
                Issue::error(
                    "MAN-005",
                    format!("operation id '{}' must be a lowercase identifier", op.id),
                )
                .with_field(format!("{ctx}.id")),
            );
        }

        // MAN-006
        if !seen.insert(op.id.as_str()) {
            issues.push(
                Issue::error("MAN-006", format!("operation id '{}' is declared twice", op.id))
                    .with_field(format!("{ctx}.id")),
            );
        }

        check_operation_path(op, &ctx, issues);
        check_operation_params(op, &ctx, issues);
        check_operation_tier(op, &ctx, issues);

        // MAN-012
        if op.description.trim().is_empty() {
            issues.push(
                Issue::warning(
                    "MAN-012",
                    "description is empty; agents pick tools by description",
                )
                .with_field(format!("{ctx}.description")),
            );
        }
    }
}

/// MAN-007: path must start with `/`.
/// MAN-008: each placeholder needs a parameter in `params`.
/// MAN-009: placeholder parameters must be required.
fn check_operation_path(op: &ProviderOperation, ctx: &str, issues: &mut Vec<Issue>) {
    if !op.path.starts_with('/') {
        issues.push(
            Issue::error("MAN-007", format!("path '{}' must start with '/'", op.path))
                .with_field(format!("{ctx}.path")),
        );
    }

    for name in op.path_placeholders() {
        match op.params.get(&name) {
            None => issues.push(
                Issue::error(
                    "MAN-008",
                    format!("path placeholder '{{{name}}}' has no matching entry in params"),
                )
                .with_field(format!("{ctx}.path")),
            ),
            Some(def) if !def.required => issues.push(
                Issue::error(
                    "MAN-009",
                    format!("path parameter '{name}' must be marked required"),
                )
                .with_field(format!("{ctx}.params.{name}")),
            ),
            Some(_) => {}
        }
    }
}

/// MAN-010: a name may be a query/path param or a body field, not both.
/// MAN-014: defaults should be among the enum values.
fn check_operation_params(op: &ProviderOperation, ctx: &str, issues: &mut Vec<Issue>) {
    for name in op.params.keys() {
        if op.body.contains_key(name) {
            issues.push(
                Issue::error(
                    "MAN-010",
                    format!("'{name}' is declared in both params and body"),
                )
                .with_field(format!("{ctx}.body.{name}")),
            );
        }
    }

    for (name, def) in op.params.iter().chain(op.body.iter()) {
        check_parameter_def(def, &format!("{ctx}.{name}"), issues);
    }
}

fn check_parameter_def(def: &ParameterDef, ctx: &str, issues: &mut Vec<Issue>) {
    if let (Some(default), Some(values)) = (&def.default, &def.enum_values) {
        if !values.contains(default) {
            issues.push(
                Issue::warning(
                    "MAN-014",
                    format!("default {default} is not one of the enum values"),
                )
                .with_field(ctx.to_string()),
            );
        }
    }

    match &def.kind {
        ParamKind::Array { items } => check_parameter_def(items, &format!("{ctx}[]"), issues),
        ParamKind::Object { properties } => {
            for (name, nested) in properties {
                check_parameter_def(nested, &format!("{ctx}.{name}"), issues);
            }
        }
        _ => {}
    }
}

/// MAN-013: the declared tier must be plausible for the HTTP method.
///
/// A `read` operation issuing DELETE would hand deletion to read-only users,
/// so that combination is an error. `read` over POST is accepted because many
/// APIs expose search that way.
fn check_operation_tier(op: &ProviderOperation, ctx: &str, issues: &mut Vec<Issue>) {
    match (op.access, op.method) {
        (OperationAccess::Read, HttpMethod::Delete) => issues.push(
            Issue::error("MAN-013", "read operation uses DELETE")
                .with_field(format!("{ctx}.access")),
        ),
        (OperationAccess::Read, HttpMethod::Put | HttpMethod::Patch) => issues.push(
            Issue::warning(
                "MAN-013",
                format!("read operation uses {}; check the access tier", op.method),
            )
            .with_field(format!("{ctx}.access")),
        ),
        (OperationAccess::Write | OperationAccess::Delete, HttpMethod::Get) => issues.push(
            Issue::warning(
                "MAN-013",
                format!("{} operation uses GET; check the access tier", op.access.as_str()),
            )
            .with_field(format!("{ctx}.access")),
        ),
        _ => {}
    }
}

/// MAN-011: blocklist entries must be valid absolute glob patterns.
fn check_blocklist(blocklist: &[String], issues: &mut Vec<Issue>) {
    for (idx, pattern) in blocklist.iter().enumerate() {
        if !pattern.starts_with('/') {
            issues.push(
                Issue::error(
                    "MAN-011",
                    format!("blocklist pattern '{pattern}' must start with '/'"),
                )
                .with_field(format!("blocklist[{idx}]")),
            );
        }
        if pattern.contains('#') {
            issues.push(
                Issue::error(
                    "MAN-011",
                    format!("blocklist pattern '{pattern}' contains '#', which request paths never carry"),
                )
                .with_field(format!("blocklist[{idx}]")),
            );
        }
        if let Err(e) = glob::Pattern::new(pattern) {
            issues.push(
                Issue::error(
                    "MAN-011",
                    format!("blocklist pattern '{pattern}' is not a valid glob: {e}"),
                )
                .with_field(format!("blocklist[{idx}]")),
            );
        }
    }
}

/// MAN-016: a zero-request rate limit is meaningless.
fn check_rate_limit(manifest: &ProviderManifest, issues: &mut Vec<Issue>) {
    if let Some(limit) = &manifest.rate_limit {
        if limit.requests == 0 || limit.window.is_zero() {
            issues.push(
                Issue::warning("MAN-016", "rate_limit needs non-zero requests and window")
                    .with_field("rate_limit"),
            );
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> ProviderManifest {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn codes(issues: &[Issue]) -> Vec<&'static str> {
        issues.iter().map(|i| i.code).collect()
    }

    const VALID: &str = r"
provider: greenhouse
display_name: Greenhouse
category: ats
base_url: https://harvest.greenhouse.io/v1
auth:
  type: basic
operations:
  - id: get_job
    method: GET
    path: /jobs/{job_id}
    access: read
    description: Fetch one job
    params:
      job_id:
        type: integer
        required: true
blocklist:
  - /users/*/permissions
";

    #[test]
    fn valid_manifest_has_no_issues() {
        // GIVEN: a well-formed manifest
        let manifest = parse(VALID);
        // WHEN: validating
        let issues = validate_manifest(&manifest);
        // THEN: nothing is reported
        assert!(issues.is_empty(), "unexpected issues: {issues:?}");
    }

    #[test]
    fn placeholder_without_param_is_error() {
        let manifest = parse(&VALID.replace("/jobs/{job_id}", "/jobs/{id}"));
        let issues = validate_manifest(&manifest);
        assert!(codes(&issues).contains(&"MAN-008"));
        assert!(has_errors(&issues));
    }

    #[test]
    fn optional_placeholder_param_is_error() {
        let manifest = parse(&VALID.replace("required: true", "required: false"));
        let issues = validate_manifest(&manifest);
        assert_eq!(codes(&issues), vec!["MAN-009"]);
    }

    #[test]
    fn read_over_delete_is_error() {
        let manifest = parse(&VALID.replace("method: GET", "method: DELETE"));
        let issues = validate_manifest(&manifest);
        assert!(issues
            .iter()
            .any(|i| i.code == "MAN-013" && i.severity == IssueSeverity::Error));
    }

    #[test]
    fn bad_provider_id_and_base_url_are_errors() {
        let manifest = parse(
            &VALID
                .replace("provider: greenhouse", "provider: Green-House")
                .replace("https://harvest.greenhouse.io/v1", "not a url"),
        );
        let found = codes(&validate_manifest(&manifest));
        assert!(found.contains(&"MAN-001"));
        assert!(found.contains(&"MAN-003"));
    }

    #[test]
    fn relative_blocklist_pattern_is_error() {
        let manifest = parse(&VALID.replace("- /users/*/permissions", "- users/*"));
        assert!(codes(&validate_manifest(&manifest)).contains(&"MAN-011"));
    }

    #[test]
    fn http_base_url_is_only_a_warning() {
        let manifest = parse(&VALID.replace("https://", "http://"));
        let issues = validate_manifest(&manifest);
        assert_eq!(codes(&issues), vec!["MAN-003"]);
        assert!(!has_errors(&issues));
    }

    #[test]
    fn duplicate_providers_are_reported() {
        let a = parse(VALID);
        let b = parse(VALID);
        let results = validate_manifests(&[a, b]);
        let issues = &results["greenhouse"];
        assert!(codes(issues).contains(&"MAN-020"));
    }

    #[test]
    fn colliding_tool_names_across_providers_are_reported() {
        // GIVEN: two providers whose prefix and operation ids concatenate alike
        let google = parse(
            &VALID
                .replace("provider: greenhouse", "provider: google")
                .replace("id: get_job", "id: calendar_get_job"),
        );
        let calendar = parse(&VALID.replace("provider: greenhouse", "provider: google_calendar"));

        // WHEN: validating them together
        let results = validate_manifests(&[google, calendar]);

        // THEN: both sides carry the collision as an error
        for provider in ["google", "google_calendar"] {
            let issues = &results[provider];
            assert!(codes(issues).contains(&"MAN-021"), "{provider}: {issues:?}");
            assert!(has_errors(issues));
        }
        assert!(results["google"][0].message.contains("google_calendar_get_job"));
    }

    #[test]
    fn fragment_in_blocklist_pattern_is_error() {
        let manifest = parse(&VALID.replace("- /users/*/permissions", "- /users/*#top"));
        assert!(codes(&validate_manifest(&manifest)).contains(&"MAN-011"));
    }

    #[test]
    fn duplicate_operation_ids_are_reported() {
        let mut manifest = parse(VALID);
        let op = manifest.operations[0].clone();
        manifest.operations.push(op);
        assert!(codes(&validate_manifest(&manifest)).contains(&"MAN-006"));
    }

    #[test]
    fn issue_display_includes_field() {
        let issue = Issue::error("MAN-007", "path must start with '/'").with_field("operations.x.path");
        assert_eq!(
            issue.to_string(),
            "[ERROR] MAN-007 (operations.x.path): path must start with '/'"
        );
    }
}
