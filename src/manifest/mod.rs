//! Provider manifests and the registry that serves them
//!
//! A manifest is one immutable record per provider, parsed from YAML and
//! validated against a single shared shape. Dispatch is a table lookup by
//! provider id.
//!
//! # Example manifest
//!
//! ```yaml
//! provider: greenhouse
//! display_name: Greenhouse
//! category: ats
//! base_url: https://harvest.greenhouse.io/v1
//! auth:
//!   type: basic
//! operations:
//!   - id: get_job
//!     method: GET
//!     path: /jobs/{job_id}
//!     access: read
//!     description: Fetch a single job by id
//!     params:
//!       job_id:
//!         type: integer
//!         required: true
//! blocklist:
//!   - /users/*/permissions
//! ```

mod definition;
mod loader;
mod parser;
pub mod validator;

use std::collections::HashMap;

use access_core::Category;
use tracing::{info, warn};

pub use definition::*;
pub use loader::ManifestLoader;
pub use parser::{parse_manifest, parse_manifest_file};

use crate::{Error, Result};
use validator::{IssueSeverity, validate_manifests};

/// Manifests compiled into the binary.
const BUILTIN_MANIFESTS: &[(&str, &str)] = &[
    ("greenhouse", include_str!("../../manifests/greenhouse.yaml")),
    ("hubspot", include_str!("../../manifests/hubspot.yaml")),
    ("gmail", include_str!("../../manifests/gmail.yaml")),
    ("google_calendar", include_str!("../../manifests/google_calendar.yaml")),
    ("notion", include_str!("../../manifests/notion.yaml")),
    ("harvest", include_str!("../../manifests/harvest.yaml")),
];

/// Parse the built-in manifests without validating them.
pub fn builtin_manifests() -> Result<Vec<ProviderManifest>> {
    BUILTIN_MANIFESTS
        .iter()
        .map(|(name, content)| {
            parse_manifest(content)
                .map_err(|e| Error::Manifest(format!("built-in manifest '{name}': {e}")))
        })
        .collect()
}

/// Immutable lookup table of provider manifests.
///
/// Built once at startup. There is no runtime registration: adding a
/// provider means deploying a new manifest.
#[derive(Debug, Default)]
pub struct ManifestRegistry {
    manifests: HashMap<String, ProviderManifest>,
}

impl ManifestRegistry {
    /// Build a registry from parsed manifests.
    ///
    /// Fails if any manifest has an error-severity issue, including
    /// duplicate provider ids. Warnings are logged.
    pub fn from_manifests(manifests: Vec<ProviderManifest>) -> Result<Self> {
        let results = validate_manifests(&manifests);

        let mut errors = Vec::new();
        for (provider, issues) in &results {
            for issue in issues {
                match issue.severity {
                    IssueSeverity::Error => errors.push(format!("{provider}: {issue}")),
                    IssueSeverity::Warning => {
                        warn!(provider = %provider, code = issue.code, "{}", issue.message);
                    }
                }
            }
        }
        if !errors.is_empty() {
            return Err(Error::Manifest(errors.join("; ")));
        }

        let manifests: HashMap<_, _> = manifests
            .into_iter()
            .map(|m| (m.provider.clone(), m))
            .collect();

        Ok(Self { manifests })
    }

    /// Registry holding only the built-in manifests.
    pub fn builtin() -> Result<Self> {
        Self::from_manifests(builtin_manifests()?)
    }

    /// Assemble the startup registry from built-ins and manifest directories.
    pub async fn load(include_builtin: bool, directories: &[String]) -> Result<Self> {
        let mut manifests = if include_builtin {
            builtin_manifests()?
        } else {
            Vec::new()
        };
        manifests.extend(ManifestLoader::load_directories(directories).await);

        let registry = Self::from_manifests(manifests)?;
        info!(
            providers = registry.len(),
            builtin = include_builtin,
            "Manifest registry ready"
        );
        Ok(registry)
    }

    /// Manifest for a provider.
    #[must_use]
    pub fn get_manifest(&self, provider: &str) -> Option<&ProviderManifest> {
        self.manifests.get(provider)
    }

    /// Sorted provider ids.
    #[must_use]
    pub fn list_providers(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.manifests.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Whether a provider has a manifest.
    #[must_use]
    pub fn is_supported(&self, provider: &str) -> bool {
        self.manifests.contains_key(provider)
    }

    /// Resolve `(provider, operation)` to its definitions.
    #[must_use]
    pub fn find_operation(
        &self,
        provider: &str,
        operation_id: &str,
    ) -> Option<(&ProviderManifest, &ProviderOperation)> {
        let manifest = self.manifests.get(provider)?;
        let op = manifest.operation(operation_id)?;
        Some((manifest, op))
    }

    /// Manifests in a category, sorted by provider id.
    #[must_use]
    pub fn providers_in_category(&self, category: Category) -> Vec<&ProviderManifest> {
        let mut found: Vec<_> = self
            .manifests
            .values()
            .filter(|m| m.category == category)
            .collect();
        found.sort_unstable_by(|a, b| a.provider.cmp(&b.provider));
        found
    }

    /// All manifests, sorted by provider id.
    #[must_use]
    pub fn manifests(&self) -> Vec<&ProviderManifest> {
        let mut all: Vec<_> = self.manifests.values().collect();
        all.sort_unstable_by(|a, b| a.provider.cmp(&b.provider));
        all
    }

    /// Provider owning a tool name of the form `{provider}_{operation}`.
    ///
    /// Provider ids may themselves contain underscores, so the longest
    /// registered prefix wins.
    #[must_use]
    pub fn provider_for_tool(&self, tool_name: &str) -> Option<&ProviderManifest> {
        self.manifests
            .values()
            .filter(|m| {
                tool_name
                    .strip_prefix(m.provider.as_str())
                    .and_then(|rest| rest.strip_prefix('_'))
                    .is_some_and(|op| !op.is_empty())
            })
            .max_by_key(|m| m.provider.len())
    }

    /// Number of providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.manifests.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }
}
