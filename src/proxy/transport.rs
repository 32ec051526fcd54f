//! Authenticated HTTP capability
//!
//! The executor hands a fully prepared request to an [`AuthenticatedHttp`]
//! implementation, which attaches the user's credential and sends it.
//!
//! # Security
//!
//! - Credentials are fetched at send time and never stored on the request
//! - Credentials are never logged or included in error messages
//! - Provider error bodies are truncated before they leave this module

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Response};
use serde_json::Value;
use tracing::debug;

use crate::manifest::{AuthShape, HttpMethod};
use crate::{Error, Result};

/// Provider error bodies are cut to this many characters.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Outbound call, ready to send except for the credential.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    /// User the call is made for
    pub on_behalf_of: String,
    /// Provider id
    pub provider: String,
    /// Operation id
    pub operation: String,
    /// Authentication shape from the manifest
    pub auth: AuthShape,
    /// HTTP method
    pub method: HttpMethod,
    /// Provider base URL
    pub base_url: String,
    /// Interpolated, encoded path
    pub path: String,
    /// Query pairs (repeated keys allowed)
    pub query: Vec<(String, String)>,
    /// JSON body
    pub body: Option<Value>,
}

impl PreparedRequest {
    /// Full URL without the query string.
    #[must_use]
    pub fn url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.path)
    }
}

/// Failure of the authenticated HTTP capability.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Provider answered with a non-success status
    #[error("provider returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Truncated response body
        body: String,
    },

    /// Network failure before a response arrived
    #[error("request failed: {0}")]
    Network(String),

    /// No usable credential for this user and provider
    #[error("credential unavailable: {0}")]
    Credentials(String),
}

impl TransportError {
    /// HTTP status, if the provider answered.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Network(_) | Self::Credentials(_) => None,
        }
    }
}

/// Sends a prepared request with the user's credential attached.
#[async_trait]
pub trait AuthenticatedHttp: Send + Sync {
    /// Send and return the parsed response body.
    async fn send(&self, request: PreparedRequest) -> std::result::Result<Value, TransportError>;
}

/// Source of per-user provider credentials.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Raw credential for `provider` on behalf of `user_id`.
    ///
    /// For basic auth this is `user:password`.
    async fn credential(
        &self,
        user_id: &str,
        provider: &str,
    ) -> std::result::Result<String, TransportError>;
}

/// Credentials from environment variables.
///
/// Suitable for single-tenant deployments where one service account per
/// provider acts for every user. A provider's credential comes from an
/// explicit `env:VAR` reference when configured, else from
/// `{prefix}{PROVIDER}` (upper-cased).
#[derive(Debug, Clone)]
pub struct EnvCredentialSource {
    prefix: String,
    references: HashMap<String, String>,
}

impl EnvCredentialSource {
    /// Create a source with a variable prefix and explicit references.
    #[must_use]
    pub fn new(prefix: impl Into<String>, references: HashMap<String, String>) -> Self {
        Self {
            prefix: prefix.into(),
            references,
        }
    }

    /// Environment variable holding the credential for `provider`.
    pub fn variable_for(&self, provider: &str) -> std::result::Result<String, TransportError> {
        match self.references.get(provider) {
            Some(reference) => reference
                .strip_prefix("env:")
                .map(ToString::to_string)
                .ok_or_else(|| {
                    TransportError::Credentials(format!(
                        "credential reference for '{provider}' must use the env: scheme"
                    ))
                }),
            None => Ok(format!("{}{}", self.prefix, provider.to_uppercase())),
        }
    }
}

#[async_trait]
impl CredentialSource for EnvCredentialSource {
    async fn credential(
        &self,
        _user_id: &str,
        provider: &str,
    ) -> std::result::Result<String, TransportError> {
        let var = self.variable_for(provider)?;
        std::env::var(&var).map_err(|_| {
            TransportError::Credentials(format!(
                "environment variable '{var}' not set (required for {provider})"
            ))
        })
    }
}

/// Fixed credentials keyed by provider.
///
/// Intended for local development and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialSource {
    credentials: HashMap<String, String>,
}

impl StaticCredentialSource {
    /// Create an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a credential for a provider.
    #[must_use]
    pub fn with(mut self, provider: impl Into<String>, credential: impl Into<String>) -> Self {
        self.credentials.insert(provider.into(), credential.into());
        self
    }
}

#[async_trait]
impl CredentialSource for StaticCredentialSource {
    async fn credential(
        &self,
        _user_id: &str,
        provider: &str,
    ) -> std::result::Result<String, TransportError> {
        self.credentials.get(provider).cloned().ok_or_else(|| {
            TransportError::Credentials(format!("no credential configured for {provider}"))
        })
    }
}

/// [`AuthenticatedHttp`] over reqwest.
pub struct HttpTransport {
    client: Client,
    credentials: Arc<dyn CredentialSource>,
}

impl HttpTransport {
    /// Create a transport.
    pub fn new(credentials: Arc<dyn CredentialSource>, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            credentials,
        })
    }

    async fn handle_response(response: Response) -> std::result::Result<Value, TransportError> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: error_text.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::Network(format!("failed to read response: {e}")))?;

        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned())))
    }
}

#[async_trait]
impl AuthenticatedHttp for HttpTransport {
    async fn send(&self, request: PreparedRequest) -> std::result::Result<Value, TransportError> {
        let credential = self
            .credentials
            .credential(&request.on_behalf_of, &request.provider)
            .await?;
        let headers = auth_headers(&request.auth, &credential)?;

        let method = to_reqwest_method(request.method);
        let url = request.url();
        let mut builder = self.client.request(method, &url).headers(headers);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let started = Instant::now();
        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Network(e.without_url().to_string()))?;

        debug!(
            provider = %request.provider,
            operation = %request.operation,
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis(),
            "Provider responded"
        );

        Self::handle_response(response).await
    }
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

/// Build the auth header for a shape and credential.
pub fn auth_headers(
    auth: &AuthShape,
    credential: &str,
) -> std::result::Result<HeaderMap, TransportError> {
    let header_name: HeaderName = auth
        .header_name()
        .parse()
        .map_err(|_| TransportError::Credentials("invalid auth header name".to_string()))?;

    let value = match auth {
        AuthShape::Bearer | AuthShape::Oauth2 { .. } => format!("Bearer {credential}"),
        AuthShape::Basic => format!("Basic {}", STANDARD.encode(credential)),
        AuthShape::ApiKey { prefix, .. } => match prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() => format!("{prefix} {credential}"),
            _ => credential.to_string(),
        },
    };

    let mut header_value: HeaderValue = value
        .parse()
        // Don't include credential in error message
        .map_err(|_| TransportError::Credentials("invalid credential format".to_string()))?;
    header_value.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(header_name, header_value);
    Ok(headers)
}
