//! Error types for the integration gateway

use std::io;

use axum::http::StatusCode;
use thiserror::Error;

/// Result type alias for the integration gateway
pub type Result<T> = std::result::Result<T, Error>;

/// Generic text shown to end users for faults they cannot act on.
pub const ACTION_UNAVAILABLE: &str = "This action is currently unavailable";

/// Generic text shown to end users for blocklist hits.
pub const ACTION_BLOCKED: &str = "This action is not permitted for this integration";

/// Integration gateway errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Manifest could not be parsed or failed structural validation
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Tool name not in the caller's current tool list
    #[error("Tool not available: {0}")]
    ToolUnavailable(String),

    /// Feature id not in the catalog
    #[error("Unknown feature: {0}")]
    UnknownFeature(String),

    /// Arguments failed schema validation
    #[error("{0}")]
    InvalidArguments(String),

    /// A path placeholder had no usable value
    #[error("Missing required path parameter '{0}'")]
    MissingPathParameter(String),

    /// Realized path matched the manifest blocklist
    #[error("Blocked by provider policy: {provider}.{operation}")]
    Blocked {
        /// Provider id
        provider: String,
        /// Operation id
        operation: String,
    },

    /// Provider API failed
    #[error("Upstream error from {provider}.{operation}: {message}")]
    Upstream {
        /// Provider id
        provider: String,
        /// Operation id
        operation: String,
        /// HTTP status returned by the provider, if any
        status: Option<u16>,
        /// Transport or provider message (credential-free)
        message: String,
    },

    /// Provider API did not answer in time
    #[error("Upstream timeout from {provider}.{operation} after {timeout_ms}ms")]
    UpstreamTimeout {
        /// Provider id
        provider: String,
        /// Operation id
        operation: String,
        /// Applied timeout
        timeout_ms: u128,
    },

    /// Referenced manifest or operation vanished between generation and execution
    #[error("Integrity fault: {0}")]
    Integrity(String),

    /// Record store failure
    #[error("Store error: {0}")]
    Store(#[from] crate::access::StoreError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse error taxonomy used for propagation and presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Bad or missing arguments, unknown tool; correctable by the caller
    Caller,
    /// Blocklist hit or access forbids the operation; never retried
    Policy,
    /// Provider failure or timeout; retry is the caller's decision
    Upstream,
    /// Deployment or generator bug
    Integrity,
    /// Anything else on our side
    Internal,
}

impl ErrorClass {
    /// Stable wire identifier.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Caller => "caller",
            Self::Policy => "policy",
            Self::Upstream => "upstream",
            Self::Integrity => "integrity",
            Self::Internal => "internal",
        }
    }
}

impl Error {
    /// Classify this error.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidArguments(_)
            | Self::MissingPathParameter(_)
            | Self::ToolUnavailable(_)
            | Self::UnknownFeature(_) => ErrorClass::Caller,
            Self::Blocked { .. } => ErrorClass::Policy,
            Self::Upstream { .. } | Self::UpstreamTimeout { .. } => ErrorClass::Upstream,
            Self::Integrity(_) => ErrorClass::Integrity,
            Self::Config(_)
            | Self::Manifest(_)
            | Self::Store(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Internal(_) => ErrorClass::Internal,
        }
    }

    /// Message safe to show to the end user.
    ///
    /// Integrity and internal faults collapse to [`ACTION_UNAVAILABLE`], the
    /// same text an unknown tool gets, so callers cannot tell a bug from a
    /// policy gap. Blocklist hits get [`ACTION_BLOCKED`] with no detail.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidArguments(_)
            | Self::MissingPathParameter(_)
            | Self::UnknownFeature(_) => self.to_string(),
            Self::Blocked { .. } => ACTION_BLOCKED.to_string(),
            Self::Upstream {
                provider, status, ..
            } => match status {
                Some(code) => format!("The {provider} API returned an error (HTTP {code})"),
                None => format!("The {provider} API could not be reached"),
            },
            Self::UpstreamTimeout { provider, .. } => {
                format!("The {provider} API did not respond in time")
            }
            Self::ToolUnavailable(_)
            | Self::Integrity(_)
            | Self::Config(_)
            | Self::Manifest(_)
            | Self::Store(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Internal(_) => ACTION_UNAVAILABLE.to_string(),
        }
    }

    /// Stable machine-readable code for callers.
    ///
    /// Integrity faults share `unavailable` with unknown tools.
    #[must_use]
    pub fn public_code(&self) -> &'static str {
        match self {
            Self::InvalidArguments(_) | Self::MissingPathParameter(_) => "invalid_arguments",
            Self::UnknownFeature(_) => "unknown_feature",
            Self::ToolUnavailable(_) | Self::Integrity(_) => "unavailable",
            Self::Blocked { .. } => "blocked",
            Self::Upstream { .. } => "upstream_error",
            Self::UpstreamTimeout { .. } => "upstream_timeout",
            _ => "internal",
        }
    }

    /// HTTP status used by the HTTP surface.
    #[must_use]
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::UnknownFeature(_) | Self::ToolUnavailable(_) | Self::Integrity(_) => {
                StatusCode::NOT_FOUND
            }
            Self::InvalidArguments(_) | Self::MissingPathParameter(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::Blocked { .. } => StatusCode::FORBIDDEN,
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Self::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
