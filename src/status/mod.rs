//! Feature availability rendering
//!
//! A feature declares which categories it needs and at what level. Given a
//! user's effective access, [`get_status`] classifies it:
//!
//! - `disabled` when the org admin switched it off (no reason given),
//! - `available` when every requirement is met,
//! - `limited` otherwise, with one limitation per unmet requirement and a
//!   single guidance sentence.
//!
//! A feature is never hidden for insufficient access; it degrades to
//! `limited` so users can discover what to fix.

mod catalog;

use std::collections::{BTreeMap, HashSet};

use access_core::{AccessLevel, Category, EffectiveAccess};
use serde::{Deserialize, Serialize};

pub use catalog::{FeatureCatalog, FeatureDefinition};

/// Level a feature needs in one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequiredAccess {
    /// Read operations
    #[serde(alias = "read-only")]
    Read,
    /// Write operations
    #[serde(alias = "read-write")]
    Write,
}

impl RequiredAccess {
    fn satisfied_by(self, level: AccessLevel) -> bool {
        match self {
            Self::Read => level.can_read(),
            Self::Write => level.can_write(),
        }
    }
}

/// Requirements of one feature.
pub type FeatureRequirements = BTreeMap<Category, RequiredAccess>;

/// Availability class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureStatus {
    /// Every requirement met
    Available,
    /// Usable in part; see limitations
    Limited,
    /// Switched off by the org admin
    Disabled,
}

/// Rendered status of one feature for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureStatusReport {
    /// Availability class
    pub status: FeatureStatus,
    /// One entry per unmet requirement
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub limitations: Vec<String>,
    /// What the user can do about it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidance: Option<String>,
}

/// Remediation kinds, in the order they are suggested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Remediation {
    Connect,
    RaiseLevel,
    AskAdmin,
    EnableYourself,
}

/// Classify a feature for a user.
#[must_use]
pub fn get_status(
    feature_id: &str,
    requirements: &FeatureRequirements,
    effective: &EffectiveAccess,
    org_disabled_features: &HashSet<String>,
    is_admin: bool,
) -> FeatureStatusReport {
    if org_disabled_features.contains(feature_id) {
        return FeatureStatusReport {
            status: FeatureStatus::Disabled,
            limitations: Vec::new(),
            guidance: None,
        };
    }

    let mut limitations = Vec::new();
    let mut remediations: BTreeMap<Remediation, Vec<Category>> = BTreeMap::new();

    for (&category, &required) in requirements {
        let level = effective.get(category);
        if required.satisfied_by(level) {
            continue;
        }

        let label = category.label();
        let remediation = match level {
            AccessLevel::None => {
                limitations.push(format!("{label} is not connected"));
                Remediation::Connect
            }
            AccessLevel::Disabled => {
                limitations.push(format!("{label} access has been disabled by your admin"));
                if is_admin {
                    Remediation::EnableYourself
                } else {
                    Remediation::AskAdmin
                }
            }
            // Only a write requirement can be unmet at read-only.
            AccessLevel::ReadOnly | AccessLevel::ReadWrite => {
                limitations.push(format!(
                    "{label} access is read-only, but this feature needs write access"
                ));
                Remediation::RaiseLevel
            }
        };
        remediations.entry(remediation).or_default().push(category);
    }

    if limitations.is_empty() {
        return FeatureStatusReport {
            status: FeatureStatus::Available,
            limitations,
            guidance: None,
        };
    }

    let actions: Vec<String> = remediations
        .iter()
        .map(|(remediation, categories)| describe(*remediation, categories))
        .collect();

    FeatureStatusReport {
        status: FeatureStatus::Limited,
        limitations,
        guidance: Some(format!("To use this feature, {}.", join_alternatives(&actions))),
    }
}

fn describe(remediation: Remediation, categories: &[Category]) -> String {
    let labels: Vec<String> = categories.iter().map(|c| c.label().to_string()).collect();
    let labels = join_with(&labels, "and");
    match remediation {
        Remediation::Connect => format!("connect {labels} in settings"),
        Remediation::RaiseLevel => {
            format!("update your {labels} access level to read-write in settings")
        }
        Remediation::AskAdmin => format!("ask your admin to enable {labels} access"),
        Remediation::EnableYourself => format!("enable {labels} access in your organization settings"),
    }
}

/// `a`, `a or b`, `a, b, or c`.
fn join_alternatives(items: &[String]) -> String {
    join_with(items, "or")
}

fn join_with(items: &[String], conjunction: &str) -> String {
    match items {
        [] => String::new(),
        [only] => only.clone(),
        [first, second] => format!("{first} {conjunction} {second}"),
        [init @ .., last] => format!("{}, {conjunction} {last}", init.join(", ")),
    }
}
