//! Access resolution across org policy, connection records and user choice.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use access_core::{AccessLevel, Category, ConnectionSignal, EffectiveAccess, resolve_access};
use serde::Serialize;
use tracing::{debug, warn};

use super::store::{ConnectionStore, OrgPolicy, OrgPolicyStore};
use crate::manifest::ManifestRegistry;

/// Identity of the caller, established by the surrounding system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    /// User id
    pub user_id: String,
    /// Organization id
    pub org_id: String,
    /// Whether the user administers the organization
    pub is_admin: bool,
}

impl UserContext {
    /// Non-admin user.
    pub fn new(user_id: impl Into<String>, org_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            org_id: org_id.into(),
            is_admin: false,
        }
    }

    /// Mark as org admin.
    #[must_use]
    pub fn admin(mut self) -> Self {
        self.is_admin = true;
        self
    }
}

/// Resolved level for one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProviderAccess {
    /// Category of the provider
    pub category: Category,
    /// Effective level
    pub level: AccessLevel,
}

/// Everything the resolver knows about one user at one instant.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AccessProfile {
    /// Level per provider id
    pub providers: BTreeMap<String, ProviderAccess>,
    /// Level per category (max over the category's providers)
    pub effective: EffectiveAccess,
    /// Features the org admin has switched off
    pub disabled_features: HashSet<String>,
    /// Set when the disabled-feature list could not be read
    #[serde(skip)]
    pub features_unknown: bool,
}

impl AccessProfile {
    /// Level for a provider; unknown providers read as `None`.
    #[must_use]
    pub fn provider_level(&self, provider: &str) -> AccessLevel {
        self.providers
            .get(provider)
            .map_or(AccessLevel::None, |p| p.level)
    }

    /// Whether a feature is switched off. Unreadable lists disable everything.
    #[must_use]
    pub fn is_feature_disabled(&self, feature_id: &str) -> bool {
        self.features_unknown || self.disabled_features.contains(feature_id)
    }
}

/// Reads the three access signals and combines them per provider.
///
/// Every read failure resolves to the restrictive side: an unreadable org
/// policy disables every category, an unreadable connection counts as not
/// connected, an unreadable feature list disables every feature.
#[derive(Clone)]
pub struct AccessResolver {
    registry: Arc<ManifestRegistry>,
    connections: Arc<dyn ConnectionStore>,
    policies: Arc<dyn OrgPolicyStore>,
}

impl AccessResolver {
    /// Create a resolver.
    pub fn new(
        registry: Arc<ManifestRegistry>,
        connections: Arc<dyn ConnectionStore>,
        policies: Arc<dyn OrgPolicyStore>,
    ) -> Self {
        Self {
            registry,
            connections,
            policies,
        }
    }

    /// Resolve one provider. `None` when the provider has no manifest.
    pub async fn resolve_provider(
        &self,
        user: &UserContext,
        provider: &str,
    ) -> Option<ProviderAccess> {
        let manifest = self.registry.get_manifest(provider)?;

        let (policy, connection) = futures::join!(
            self.read_org_policy(&user.org_id),
            self.read_connection(&user.user_id, provider),
        );

        let level = resolve_access(ceiling(policy.as_ref(), manifest.category), connection);
        debug!(
            user = %user.user_id,
            provider,
            level = %level,
            "Resolved provider access"
        );

        Some(ProviderAccess {
            category: manifest.category,
            level,
        })
    }

    /// Resolve every registered provider.
    ///
    /// Each store is read once through its snapshot method, so all providers
    /// see the same policy and the same set of connection records.
    pub async fn resolve(&self, user: &UserContext) -> AccessProfile {
        let manifests = self.registry.manifests();
        let providers: Vec<&str> = manifests.iter().map(|m| m.provider.as_str()).collect();

        let (org, connections) = futures::join!(
            self.policies.get_org_records(&user.org_id),
            self.connections.get_connections(&user.user_id, &providers),
        );

        let connections = connections.unwrap_or_else(|e| {
            warn!(user = %user.user_id, error = %e, "Connections unreadable; treating as not connected");
            HashMap::new()
        });

        let mut profile = AccessProfile::default();
        let policy = match org {
            Ok(records) => {
                profile.disabled_features = records.disabled_features;
                Some(records.policy)
            }
            Err(e) => {
                warn!(org = %user.org_id, error = %e, "Org records unreadable; disabling all categories and features");
                profile.features_unknown = true;
                None
            }
        };

        for category in Category::ALL {
            profile.effective.set(category, AccessLevel::None);
        }

        for manifest in &manifests {
            let connection = connections.get(&manifest.provider).copied();
            let level = resolve_access(ceiling(policy.as_ref(), manifest.category), connection);
            profile.providers.insert(
                manifest.provider.clone(),
                ProviderAccess {
                    category: manifest.category,
                    level,
                },
            );
            profile.effective.merge_max(manifest.category, level);
        }

        debug!(
            user = %user.user_id,
            providers = profile.providers.len(),
            "Resolved access profile"
        );
        profile
    }

    /// `None` means the policy is unreadable.
    async fn read_org_policy(&self, org_id: &str) -> Option<OrgPolicy> {
        match self.policies.get_org_policy(org_id).await {
            Ok(policy) => Some(policy),
            Err(e) => {
                warn!(org = %org_id, error = %e, "Org policy unreadable; disabling all categories");
                None
            }
        }
    }

    async fn read_connection(&self, user_id: &str, provider: &str) -> Option<ConnectionSignal> {
        match self.connections.get_connection(user_id, provider).await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(user = %user_id, provider, error = %e, "Connection unreadable; treating as not connected");
                None
            }
        }
    }
}

/// Ceiling for a category. An unreadable policy yields `Disabled`.
fn ceiling(policy: Option<&OrgPolicy>, category: Category) -> Option<AccessLevel> {
    match policy {
        Some(policy) => policy.get(&category).copied(),
        None => Some(AccessLevel::Disabled),
    }
}
