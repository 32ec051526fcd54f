//! Provider manifest types
//!
//! These types map directly to the YAML manifest format.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use access_core::{Category, OperationAccess};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declarative description of one provider's callable API surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderManifest {
    /// Unique provider id (also the tool name prefix)
    #[serde(default)]
    pub provider: String,

    /// Human-readable provider name
    #[serde(default)]
    pub display_name: String,

    /// Integration category
    pub category: Category,

    /// API base URL; operation paths are appended to it
    pub base_url: String,

    /// Provider API version the operations were written against
    #[serde(default)]
    pub api_version: String,

    /// Authentication shape (never a credential)
    pub auth: AuthShape,

    /// Callable operations, in declaration order
    #[serde(default)]
    pub operations: Vec<ProviderOperation>,

    /// Path patterns that must never be reached, whatever the access level
    #[serde(default)]
    pub blocklist: Vec<String>,

    /// Advisory request budget
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitHint>,
}

impl ProviderManifest {
    /// Look up an operation by id.
    #[must_use]
    pub fn operation(&self, id: &str) -> Option<&ProviderOperation> {
        self.operations.iter().find(|op| op.id == id)
    }

    /// Name shown to users, falling back to the provider id.
    #[must_use]
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.provider
        } else {
            &self.display_name
        }
    }
}

/// How requests to a provider are authenticated.
///
/// Only the shape lives in a manifest. The credential itself is attached by
/// the authenticated HTTP capability at send time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthShape {
    /// `Authorization: Bearer <token>`
    Bearer,
    /// `Authorization: Basic base64(<user:password>)`
    Basic,
    /// Custom header carrying an API key
    ApiKey {
        /// Header name (e.g. `X-Api-Key`)
        header: String,
        /// Optional value prefix (e.g. `Token`)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prefix: Option<String>,
    },
    /// OAuth 2.0 access token, sent as a bearer token
    Oauth2 {
        /// Scopes the connection must hold
        #[serde(default)]
        scopes: Vec<String>,
    },
}

impl AuthShape {
    /// Header the credential is written to.
    #[must_use]
    pub fn header_name(&self) -> &str {
        match self {
            Self::ApiKey { header, .. } => header,
            Self::Bearer | Self::Basic | Self::Oauth2 { .. } => "Authorization",
        }
    }
}

/// Advisory rate limit; not enforced by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitHint {
    /// Requests allowed per window
    pub requests: u32,
    /// Window length
    #[serde(with = "crate::config::humantime_serde")]
    pub window: Duration,
}

/// HTTP method of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
}

impl HttpMethod {
    /// Method name as sent on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One callable endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderOperation {
    /// Operation id, unique within the manifest
    pub id: String,

    /// HTTP method
    pub method: HttpMethod,

    /// Path template with `{name}` placeholders
    pub path: String,

    /// Required access tier
    pub access: OperationAccess,

    /// Description shown to the agent
    #[serde(default)]
    pub description: String,

    /// Path and query parameters
    #[serde(default)]
    pub params: BTreeMap<String, ParameterDef>,

    /// JSON body fields
    #[serde(default)]
    pub body: BTreeMap<String, ParameterDef>,

    /// Field names worth reading in the response (documentation only)
    #[serde(default)]
    pub response_hints: Vec<String>,
}

impl ProviderOperation {
    /// Placeholder names in the path template, in order of appearance.
    #[must_use]
    pub fn path_placeholders(&self) -> Vec<String> {
        path_placeholders(&self.path)
    }
}

/// Recursive parameter descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    /// Structural type (with nested `items` / `properties`)
    #[serde(flatten)]
    pub kind: ParamKind,

    /// String format checked at validation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<StringFormat>,

    /// Whether the caller must supply a value
    #[serde(default)]
    pub required: bool,

    /// Value used when an optional parameter is omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Allowed values
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,

    /// Description shown to the agent
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Structural type of a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParamKind {
    /// UTF-8 string
    String,
    /// Whole number
    Integer,
    /// Any JSON number
    Number,
    /// `true` / `false`
    Boolean,
    /// Homogeneous list
    Array {
        /// Element descriptor
        items: Box<ParameterDef>,
    },
    /// Object with named fields
    Object {
        /// Field descriptors
        #[serde(default)]
        properties: BTreeMap<String, ParameterDef>,
    },
}

impl ParamKind {
    /// JSON Schema type name.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array { .. } => "array",
            Self::Object { .. } => "object",
        }
    }
}

/// String formats with dedicated validators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StringFormat {
    /// `local@domain.tld`
    Email,
    /// `YYYY-MM-DD`
    Date,
    /// RFC 3339 timestamp
    DateTime,
    /// Absolute URI
    Uri,
}

impl StringFormat {
    /// JSON Schema format name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Date => "date",
            Self::DateTime => "date-time",
            Self::Uri => "uri",
        }
    }
}

/// Extract `{name}` placeholders from a path template.
///
/// Unterminated braces are ignored.
#[must_use]
pub fn path_placeholders(path: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = path;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            break;
        };
        let name = &after[..end];
        if !name.is_empty() && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
        rest = &after[end + 1..];
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parameter_def_parses_nested_types() {
        let yaml = r"
type: array
description: Interview attendees
items:
  type: object
  properties:
    email:
      type: string
      format: email
      required: true
    optional:
      type: boolean
      default: false
";
        let def: ParameterDef = serde_yaml::from_str(yaml).unwrap();
        let ParamKind::Array { items } = &def.kind else {
            panic!("expected array, got {:?}", def.kind);
        };
        let ParamKind::Object { properties } = &items.kind else {
            panic!("expected object items");
        };
        assert_eq!(properties["email"].format, Some(StringFormat::Email));
        assert!(properties["email"].required);
        assert_eq!(properties["optional"].default, Some(json!(false)));
        assert_eq!(def.description, "Interview attendees");
    }

    #[test]
    fn parameter_def_parses_enum_keyword() {
        let def: ParameterDef =
            serde_yaml::from_str("type: string\nenum: [open, closed, draft]").unwrap();
        assert_eq!(def.kind, ParamKind::String);
        assert_eq!(
            def.enum_values,
            Some(vec![json!("open"), json!("closed"), json!("draft")])
        );
        assert!(!def.required);
    }

    #[test]
    fn auth_shape_variants_parse() {
        let bearer: AuthShape = serde_yaml::from_str("type: bearer").unwrap();
        assert_eq!(bearer, AuthShape::Bearer);
        assert_eq!(bearer.header_name(), "Authorization");

        let key: AuthShape =
            serde_yaml::from_str("type: api_key\nheader: X-Api-Key").unwrap();
        assert_eq!(key.header_name(), "X-Api-Key");

        let oauth: AuthShape =
            serde_yaml::from_str("type: oauth2\nscopes: [calendar.readonly]").unwrap();
        assert!(matches!(oauth, AuthShape::Oauth2 { ref scopes } if scopes.len() == 1));
    }

    #[test]
    fn http_method_is_uppercase_on_the_wire() {
        let m: HttpMethod = serde_yaml::from_str("PATCH").unwrap();
        assert_eq!(m, HttpMethod::Patch);
        assert_eq!(m.to_string(), "PATCH");
    }

    #[test]
    fn rate_limit_window_uses_human_durations() {
        let hint: RateLimitHint = serde_yaml::from_str("requests: 50\nwindow: 10s").unwrap();
        assert_eq!(hint.requests, 50);
        assert_eq!(hint.window, Duration::from_secs(10));
    }

    #[test]
    fn placeholders_are_extracted_in_order_without_duplicates() {
        assert_eq!(
            path_placeholders("/users/{user_id}/messages/{id}/{user_id}"),
            vec!["user_id".to_string(), "id".to_string()]
        );
        assert!(path_placeholders("/plain/path").is_empty());
        assert!(path_placeholders("/broken/{open").is_empty());
    }
}
