//! Record stores feeding the access resolver.
//!
//! Connection records and org policy are owned by other parts of the system.
//! The resolver reads them through these traits and never writes.
//!
//! Each trait has a snapshot read used for whole-profile resolution. The
//! two stores are independent of each other, so a write landing between the
//! two snapshot reads is picked up by the next resolution.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use access_core::{AccessLevel, Category, ConnectionSignal, ConnectionStatus};
use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::RwLock;
use serde::Deserialize;

/// Per-category admin ceilings for one organization.
///
/// A category with no entry has no ceiling.
pub type OrgPolicy = BTreeMap<Category, AccessLevel>;

/// Errors that can occur when reading access records.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing store could not be reached.
    #[error("Record store unavailable: {0}")]
    Unavailable(String),

    /// A record could not be read or decoded.
    #[error("Failed to read records: {0}")]
    Read(String),

    /// IO error while loading a snapshot.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot file is not valid YAML.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Per-user connection records.
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// Connection of `user_id` to `provider`, if one was ever made.
    async fn get_connection(
        &self,
        user_id: &str,
        provider: &str,
    ) -> Result<Option<ConnectionSignal>, StoreError>;

    /// Connections of `user_id` to each of `providers` in one read.
    ///
    /// Providers without a connection are absent from the map. The default
    /// issues one read per provider, so it is only as consistent as the
    /// backing store; any failed read fails the whole call.
    async fn get_connections(
        &self,
        user_id: &str,
        providers: &[&str],
    ) -> Result<HashMap<String, ConnectionSignal>, StoreError> {
        let reads = join_all(
            providers
                .iter()
                .map(|provider| self.get_connection(user_id, provider)),
        )
        .await;

        let mut connections = HashMap::new();
        for (provider, read) in providers.iter().zip(reads) {
            if let Some(connection) = read? {
                connections.insert((*provider).to_string(), connection);
            }
        }
        Ok(connections)
    }
}

/// Admin policy and feature switches of one organization, read together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrgRecords {
    /// Category ceilings
    pub policy: OrgPolicy,
    /// Feature ids switched off
    pub disabled_features: HashSet<String>,
}

/// Per-organization admin policy.
#[async_trait]
pub trait OrgPolicyStore: Send + Sync {
    /// Category ceilings set by the org admin.
    async fn get_org_policy(&self, org_id: &str) -> Result<OrgPolicy, StoreError>;

    /// Feature ids the org admin has switched off.
    async fn get_org_disabled_features(&self, org_id: &str)
    -> Result<HashSet<String>, StoreError>;

    /// Policy and disabled features in one read.
    ///
    /// The default reads them separately.
    async fn get_org_records(&self, org_id: &str) -> Result<OrgRecords, StoreError> {
        let (policy, disabled_features) = futures::try_join!(
            self.get_org_policy(org_id),
            self.get_org_disabled_features(org_id),
        )?;
        Ok(OrgRecords {
            policy,
            disabled_features,
        })
    }
}

/// In-memory implementation of both stores.
///
/// Used by the server when records come from a snapshot file, and by tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    connections: RwLock<HashMap<(String, String), ConnectionSignal>>,
    policies: RwLock<HashMap<String, OrgPolicy>>,
    disabled_features: RwLock<HashMap<String, HashSet<String>>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a connection (replaces any existing one).
    pub fn set_connection(
        &self,
        user_id: &str,
        provider: &str,
        status: ConnectionStatus,
        access_level_choice: AccessLevel,
    ) {
        self.connections.write().insert(
            (user_id.to_string(), provider.to_string()),
            ConnectionSignal {
                status,
                access_level_choice,
            },
        );
    }

    /// Mark an existing connection revoked. Returns `false` if there was none.
    pub fn revoke_connection(&self, user_id: &str, provider: &str) -> bool {
        let mut connections = self.connections.write();
        match connections.get_mut(&(user_id.to_string(), provider.to_string())) {
            Some(conn) => {
                conn.status = ConnectionStatus::Revoked;
                true
            }
            None => false,
        }
    }

    /// Change the user's chosen level on an existing connection.
    pub fn set_access_choice(&self, user_id: &str, provider: &str, level: AccessLevel) -> bool {
        let mut connections = self.connections.write();
        match connections.get_mut(&(user_id.to_string(), provider.to_string())) {
            Some(conn) => {
                conn.access_level_choice = level;
                true
            }
            None => false,
        }
    }

    /// Set the admin ceiling for one category.
    pub fn set_org_ceiling(&self, org_id: &str, category: Category, level: AccessLevel) {
        self.policies
            .write()
            .entry(org_id.to_string())
            .or_default()
            .insert(category, level);
    }

    /// Remove the admin ceiling for one category.
    pub fn clear_org_ceiling(&self, org_id: &str, category: Category) {
        if let Some(policy) = self.policies.write().get_mut(org_id) {
            policy.remove(&category);
        }
    }

    /// Switch a feature off for an organization.
    pub fn disable_feature(&self, org_id: &str, feature_id: &str) {
        self.disabled_features
            .write()
            .entry(org_id.to_string())
            .or_default()
            .insert(feature_id.to_string());
    }

    /// Switch a feature back on for an organization.
    pub fn enable_feature(&self, org_id: &str, feature_id: &str) {
        if let Some(features) = self.disabled_features.write().get_mut(org_id) {
            features.remove(feature_id);
        }
    }

    /// Build a store from a snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let store = Self::new();
        for (org_id, org) in snapshot.orgs {
            for (category, level) in org.policy {
                store.set_org_ceiling(&org_id, category, level);
            }
            for feature in org.disabled_features {
                store.disable_feature(&org_id, &feature);
            }
        }
        for conn in snapshot.connections {
            store.set_connection(&conn.user, &conn.provider, conn.status, conn.access_level_choice);
        }
        store
    }

    /// Load a store from a YAML snapshot file.
    pub async fn load_snapshot_file(path: &Path) -> Result<Self, StoreError> {
        let content = tokio::fs::read_to_string(path).await?;
        let snapshot: StoreSnapshot = serde_yaml::from_str(&content)?;
        Ok(Self::from_snapshot(snapshot))
    }
}

#[async_trait]
impl ConnectionStore for MemoryStore {
    async fn get_connection(
        &self,
        user_id: &str,
        provider: &str,
    ) -> Result<Option<ConnectionSignal>, StoreError> {
        Ok(self
            .connections
            .read()
            .get(&(user_id.to_string(), provider.to_string()))
            .copied())
    }

    async fn get_connections(
        &self,
        user_id: &str,
        providers: &[&str],
    ) -> Result<HashMap<String, ConnectionSignal>, StoreError> {
        let connections = self.connections.read();
        Ok(providers
            .iter()
            .filter_map(|provider| {
                connections
                    .get(&(user_id.to_string(), (*provider).to_string()))
                    .map(|connection| ((*provider).to_string(), *connection))
            })
            .collect())
    }
}

#[async_trait]
impl OrgPolicyStore for MemoryStore {
    async fn get_org_policy(&self, org_id: &str) -> Result<OrgPolicy, StoreError> {
        Ok(self.policies.read().get(org_id).cloned().unwrap_or_default())
    }

    async fn get_org_disabled_features(
        &self,
        org_id: &str,
    ) -> Result<HashSet<String>, StoreError> {
        Ok(self
            .disabled_features
            .read()
            .get(org_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_org_records(&self, org_id: &str) -> Result<OrgRecords, StoreError> {
        // Writers take one lock at a time, so holding both here cannot deadlock.
        let policies = self.policies.read();
        let disabled = self.disabled_features.read();
        Ok(OrgRecords {
            policy: policies.get(org_id).cloned().unwrap_or_default(),
            disabled_features: disabled.get(org_id).cloned().unwrap_or_default(),
        })
    }
}

/// YAML snapshot of access records.
///
/// ```yaml
/// orgs:
///   acme:
///     policy:
///       ats: read-only
///     disabled_features: [auto_scheduling]
/// connections:
///   - user: u1
///     provider: greenhouse
///     status: connected
///     access_level_choice: read-write
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct StoreSnapshot {
    /// Per-org policy and feature switches
    #[serde(default)]
    pub orgs: HashMap<String, OrgSnapshot>,
    /// Connection records
    #[serde(default)]
    pub connections: Vec<ConnectionSnapshot>,
}

/// One organization in a snapshot.
#[derive(Debug, Default, Deserialize)]
pub struct OrgSnapshot {
    /// Category ceilings
    #[serde(default)]
    pub policy: OrgPolicy,
    /// Disabled feature ids
    #[serde(default)]
    pub disabled_features: Vec<String>,
}

/// One connection in a snapshot.
#[derive(Debug, Deserialize)]
pub struct ConnectionSnapshot {
    /// User id
    pub user: String,
    /// Provider id
    pub provider: String,
    /// Connection status
    pub status: ConnectionStatus,
    /// Level chosen by the user
    #[serde(default = "default_choice")]
    pub access_level_choice: AccessLevel,
}

fn default_choice() -> AccessLevel {
    AccessLevel::ReadWrite
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trips_connections() {
        let store = MemoryStore::new();
        assert!(store.get_connection("u1", "gmail").await.unwrap().is_none());

        store.set_connection("u1", "gmail", ConnectionStatus::Connected, AccessLevel::ReadOnly);
        let conn = store.get_connection("u1", "gmail").await.unwrap().unwrap();
        assert_eq!(conn.status, ConnectionStatus::Connected);
        assert_eq!(conn.access_level_choice, AccessLevel::ReadOnly);

        assert!(store.revoke_connection("u1", "gmail"));
        let conn = store.get_connection("u1", "gmail").await.unwrap().unwrap();
        assert_eq!(conn.status, ConnectionStatus::Revoked);
        assert!(!store.revoke_connection("u2", "gmail"));
    }

    #[tokio::test]
    async fn policy_and_features_are_scoped_per_org() {
        let store = MemoryStore::new();
        store.set_org_ceiling("acme", Category::Ats, AccessLevel::ReadOnly);
        store.disable_feature("acme", "auto_scheduling");

        let policy = store.get_org_policy("acme").await.unwrap();
        assert_eq!(policy.get(&Category::Ats), Some(&AccessLevel::ReadOnly));
        assert!(store.get_org_policy("other").await.unwrap().is_empty());

        let disabled = store.get_org_disabled_features("acme").await.unwrap();
        assert!(disabled.contains("auto_scheduling"));

        store.enable_feature("acme", "auto_scheduling");
        assert!(store.get_org_disabled_features("acme").await.unwrap().is_empty());

        store.clear_org_ceiling("acme", Category::Ats);
        assert!(store.get_org_policy("acme").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn snapshot_reads_return_everything_at_once() {
        let store = MemoryStore::new();
        store.set_org_ceiling("acme", Category::Crm, AccessLevel::Disabled);
        store.disable_feature("acme", "deal_digest");
        store.set_connection("u1", "gmail", ConnectionStatus::Connected, AccessLevel::ReadOnly);
        store.set_connection("u2", "notion", ConnectionStatus::Connected, AccessLevel::ReadWrite);

        let records = store.get_org_records("acme").await.unwrap();
        assert_eq!(records.policy[&Category::Crm], AccessLevel::Disabled);
        assert!(records.disabled_features.contains("deal_digest"));
        assert_eq!(store.get_org_records("other").await.unwrap(), OrgRecords::default());

        let connections = store
            .get_connections("u1", &["gmail", "notion", "hubspot"])
            .await
            .unwrap();
        assert_eq!(connections.len(), 1);
        assert_eq!(connections["gmail"].access_level_choice, AccessLevel::ReadOnly);
    }

    #[tokio::test]
    async fn snapshot_file_loads() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("access.yaml");
        std::fs::write(
            &path,
            r"
orgs:
  acme:
    policy:
      ats: read-only
      time-tracking: disabled
    disabled_features: [auto_scheduling]
connections:
  - user: u1
    provider: greenhouse
    status: connected
  - user: u1
    provider: gmail
    status: revoked
    access_level_choice: read-only
",
        )
        .unwrap();

        let store = MemoryStore::load_snapshot_file(&path).await.unwrap();
        let policy = store.get_org_policy("acme").await.unwrap();
        assert_eq!(policy[&Category::TimeTracking], AccessLevel::Disabled);

        let gh = store.get_connection("u1", "greenhouse").await.unwrap().unwrap();
        assert_eq!(gh.access_level_choice, AccessLevel::ReadWrite);
        let gmail = store.get_connection("u1", "gmail").await.unwrap().unwrap();
        assert_eq!(gmail.status, ConnectionStatus::Revoked);
    }

    #[tokio::test]
    async fn missing_snapshot_is_io_error() {
        let err = MemoryStore::load_snapshot_file(Path::new("/nonexistent/access.yaml"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }
}
