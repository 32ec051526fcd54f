//! Feature catalog loaded from configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::FeatureRequirements;
use crate::{Error, Result};

/// One feature and what it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureDefinition {
    /// Stable feature id (slug)
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Short description
    #[serde(default)]
    pub description: String,
    /// Category requirements
    #[serde(default)]
    pub requirements: FeatureRequirements,
}

/// Features known to this deployment, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct FeatureCatalog {
    features: BTreeMap<String, FeatureDefinition>,
}

impl FeatureCatalog {
    /// Build from definitions. Duplicate or empty ids are a config error.
    pub fn from_definitions(definitions: Vec<FeatureDefinition>) -> Result<Self> {
        let mut features = BTreeMap::new();
        for def in definitions {
            if def.id.trim().is_empty() {
                return Err(Error::Config("feature id must not be empty".to_string()));
            }
            if features.contains_key(&def.id) {
                return Err(Error::Config(format!("feature '{}' is defined twice", def.id)));
            }
            features.insert(def.id.clone(), def);
        }
        Ok(Self { features })
    }

    /// Feature by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&FeatureDefinition> {
        self.features.get(id)
    }

    /// All features, sorted by id.
    pub fn iter(&self) -> impl Iterator<Item = &FeatureDefinition> {
        self.features.values()
    }

    /// Number of features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}
