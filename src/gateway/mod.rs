//! Service facade and HTTP surface
//!
//! [`Gateway`] ties the pieces together and implements the three exposed
//! interfaces: list tools for a user, invoke a tool, and report a feature's
//! status. Nothing is cached between calls; every request re-resolves access
//! and regenerates tools so that a revoked connection or tightened policy
//! takes effect immediately.

mod router;
mod server;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

pub use router::{AppState, create_router};
pub use server::Server;

use crate::access::{AccessProfile, AccessResolver, MemoryStore, UserContext};
use crate::config::Config;
use crate::error::ErrorClass;
use crate::manifest::ManifestRegistry;
use crate::proxy::{AuthenticatedHttp, EnvCredentialSource, HttpTransport, ProxyExecutor};
use crate::status::{FeatureCatalog, FeatureStatusReport, get_status};
use crate::tools::{GeneratedTool, ToolSummary, generate_tools, get_tool_summary};
use crate::{Error, Result};

/// The integration gateway service.
pub struct Gateway {
    registry: Arc<ManifestRegistry>,
    resolver: AccessResolver,
    executor: ProxyExecutor,
    features: FeatureCatalog,
    call_timeout: Duration,
}

impl Gateway {
    /// Assemble a gateway from its parts.
    pub fn new(
        registry: Arc<ManifestRegistry>,
        resolver: AccessResolver,
        executor: ProxyExecutor,
        features: FeatureCatalog,
        call_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            resolver,
            executor,
            features,
            call_timeout,
        }
    }

    /// Build the production gateway from configuration.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let registry = Arc::new(
            ManifestRegistry::load(config.manifests.builtin, &config.manifests.directories).await?,
        );

        let store = match &config.store.snapshot {
            Some(path) => {
                let store = MemoryStore::load_snapshot_file(Path::new(path)).await?;
                info!(path = %path, "Loaded access snapshot");
                store
            }
            None => {
                warn!("No access snapshot configured; every user starts unconnected");
                MemoryStore::new()
            }
        };
        let store = Arc::new(store);
        let resolver = AccessResolver::new(registry.clone(), store.clone(), store);

        let credentials = Arc::new(EnvCredentialSource::new(
            config.credentials.env_prefix.clone(),
            config.credentials.providers.clone(),
        ));
        let http: Arc<dyn AuthenticatedHttp> =
            Arc::new(HttpTransport::new(credentials, &config.proxy.user_agent)?);
        let executor = ProxyExecutor::new(registry.clone(), http);

        let features = FeatureCatalog::from_definitions(config.features.clone())?;

        Ok(Self::new(
            registry,
            resolver,
            executor,
            features,
            config.proxy.call_timeout,
        ))
    }

    /// Manifest registry.
    #[must_use]
    pub fn registry(&self) -> &ManifestRegistry {
        &self.registry
    }

    /// Feature catalog.
    #[must_use]
    pub fn features(&self) -> &FeatureCatalog {
        &self.features
    }

    /// Access profile for a user (one consistent snapshot).
    pub async fn access_profile(&self, user: &UserContext) -> AccessProfile {
        self.resolver.resolve(user).await
    }

    /// Every tool the user may call right now, ordered by provider.
    pub async fn list_tools(&self, user: &UserContext) -> Vec<GeneratedTool> {
        let profile = self.resolver.resolve(user).await;
        let tools: Vec<GeneratedTool> = self
            .registry
            .manifests()
            .into_iter()
            .flat_map(|manifest| generate_tools(manifest, profile.provider_level(&manifest.provider)))
            .collect();
        debug!(user = %user.user_id, count = tools.len(), "Generated tool list");
        tools
    }

    /// Per-provider tool summaries for diagnostics.
    pub async fn tool_summaries(&self, user: &UserContext) -> BTreeMap<String, ToolSummary> {
        let profile = self.resolver.resolve(user).await;
        self.registry
            .manifests()
            .into_iter()
            .map(|manifest| {
                (
                    manifest.provider.clone(),
                    get_tool_summary(manifest, profile.provider_level(&manifest.provider)),
                )
            })
            .collect()
    }

    /// Invoke a tool by name on behalf of a user.
    ///
    /// The tool must be in the user's current tool list; anything else is
    /// [`Error::ToolUnavailable`].
    pub async fn call_tool(&self, user: &UserContext, name: &str, arguments: Value) -> Result<Value> {
        let invocation_id = Uuid::new_v4();
        let span = info_span!(
            "invocation",
            id = %invocation_id,
            user = %user.user_id,
            tool = %name
        );

        async {
            let result = self.call_tool_inner(user, name, &arguments).await;
            if let Err(e) = &result {
                match e.class() {
                    // Already logged at error level where it was detected
                    ErrorClass::Integrity => {}
                    ErrorClass::Internal => error!(error = %e, "Invocation failed"),
                    ErrorClass::Policy | ErrorClass::Upstream => warn!(error = %e, "Invocation failed"),
                    ErrorClass::Caller => debug!(error = %e, "Invocation rejected"),
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn call_tool_inner(&self, user: &UserContext, name: &str, arguments: &Value) -> Result<Value> {
        let manifest = self
            .registry
            .provider_for_tool(name)
            .ok_or_else(|| Error::ToolUnavailable(name.to_string()))?;

        let Some(access) = self.resolver.resolve_provider(user, &manifest.provider).await else {
            return Err(Error::ToolUnavailable(name.to_string()));
        };

        let tool = generate_tools(manifest, access.level)
            .into_iter()
            .find(|t| t.name == name)
            .ok_or_else(|| {
                debug!(provider = %manifest.provider, level = %access.level, "Tool not exposed at this access level");
                Error::ToolUnavailable(name.to_string())
            })?;

        match tokio::time::timeout(
            self.call_timeout,
            self.executor.execute(&user.user_id, &tool, arguments),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::UpstreamTimeout {
                provider: tool.provider,
                operation: tool.operation_id,
                timeout_ms: self.call_timeout.as_millis(),
            }),
        }
    }

    /// Status of a catalog feature for a user.
    pub async fn feature_status(
        &self,
        user: &UserContext,
        feature_id: &str,
    ) -> Result<FeatureStatusReport> {
        let feature = self
            .features
            .get(feature_id)
            .ok_or_else(|| Error::UnknownFeature(feature_id.to_string()))?;

        let profile = self.resolver.resolve(user).await;
        let mut disabled = profile.disabled_features.clone();
        if profile.is_feature_disabled(feature_id) {
            disabled.insert(feature_id.to_string());
        }

        Ok(get_status(
            feature_id,
            &feature.requirements,
            &profile.effective,
            &disabled,
            user.is_admin,
        ))
    }
}
