//! Access algebra for the integration gateway.
//!
//! Everything in this crate is pure: no I/O, no clocks, no shared state.
//! The gateway feeds it the three signals it reads from its stores and gets
//! back a decision, which keeps the full combination space cheap to test.
//!
//! # Ordering
//!
//! [`AccessLevel`] is ordered by capability:
//!
//! ```text
//! None < Disabled < ReadOnly < ReadWrite
//! ```
//!
//! `None` and `Disabled` both grant nothing. They only differ in how the
//! absence of access is explained to a user ("nothing connected" vs
//! "turned off by an administrator").

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Integration category a provider belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    /// Applicant tracking systems
    Ats,
    /// Customer relationship management
    Crm,
    /// Mailboxes
    Email,
    /// Calendars
    Calendar,
    /// Document and record databases
    Database,
    /// Time tracking
    TimeTracking,
}

impl Category {
    /// All categories, in display order.
    pub const ALL: [Category; 6] = [
        Category::Ats,
        Category::Crm,
        Category::Email,
        Category::Calendar,
        Category::Database,
        Category::TimeTracking,
    ];

    /// Stable wire identifier (`time-tracking`, `ats`, ...).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ats => "ats",
            Self::Crm => "crm",
            Self::Email => "email",
            Self::Calendar => "calendar",
            Self::Database => "database",
            Self::TimeTracking => "time-tracking",
        }
    }

    /// Human-readable label used in user-facing messages.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Ats => "ATS",
            Self::Crm => "CRM",
            Self::Email => "Email",
            Self::Calendar => "Calendar",
            Self::Database => "Database",
            Self::TimeTracking => "Time tracking",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown category '{s}'"))
    }
}

/// Resolved permission level for one category or provider.
///
/// Variant order is capability order, so `min`/`max` behave as expected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessLevel {
    /// Nothing configured (no live connection).
    #[default]
    None,
    /// Turned off on purpose (administrator or user).
    Disabled,
    /// Read operations only.
    ReadOnly,
    /// Read and write operations (dangerous operations stay excluded).
    ReadWrite,
}

impl AccessLevel {
    /// Stable wire identifier.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Disabled => "disabled",
            Self::ReadOnly => "read-only",
            Self::ReadWrite => "read-write",
        }
    }

    /// Whether this level permits read operations.
    #[must_use]
    pub fn can_read(self) -> bool {
        matches!(self, Self::ReadOnly | Self::ReadWrite)
    }

    /// Whether this level permits write operations.
    #[must_use]
    pub fn can_write(self) -> bool {
        matches!(self, Self::ReadWrite)
    }

    /// Whether this level grants anything at all.
    #[must_use]
    pub fn grants_any(self) -> bool {
        self.can_read()
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "disabled" => Ok(Self::Disabled),
            "read-only" | "read_only" | "readonly" => Ok(Self::ReadOnly),
            "read-write" | "read_write" | "readwrite" => Ok(Self::ReadWrite),
            other => Err(format!(
                "unknown access level '{other}' (expected read-write, read-only, disabled or none)"
            )),
        }
    }
}

/// Access tier an operation requires, ordered by increasing restrictiveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationAccess {
    /// Side-effect free lookups.
    Read,
    /// Creates or updates.
    Write,
    /// Single-record deletes.
    Delete,
    /// Bulk deletes, anonymization and similar; never generated.
    Dangerous,
}

impl OperationAccess {
    /// Stable wire identifier.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Delete => "delete",
            Self::Dangerous => "dangerous",
        }
    }
}

impl fmt::Display for OperationAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an operation with the given tier may be exposed at `level`.
///
/// - `None` / `Disabled`: nothing.
/// - `ReadOnly`: `Read` only.
/// - `ReadWrite`: everything except `Dangerous`.
#[must_use]
pub fn is_operation_allowed(access: OperationAccess, level: AccessLevel) -> bool {
    match level {
        AccessLevel::None | AccessLevel::Disabled => false,
        AccessLevel::ReadOnly => access == OperationAccess::Read,
        AccessLevel::ReadWrite => access != OperationAccess::Dangerous,
    }
}

/// State of a user's connection to a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Live and usable.
    Connected,
    /// Revoked by the user or the provider.
    Revoked,
    /// Broken (failed refresh, provider error).
    Error,
}

/// Connection signal: status plus the user's own chosen level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSignal {
    /// Connection status.
    pub status: ConnectionStatus,
    /// Level the user selected for this connection.
    pub access_level_choice: AccessLevel,
}

/// Combine the three signals into an effective level (most restrictive wins).
///
/// 1. No live connection ⇒ `None`.
/// 2. Org ceiling `Disabled` (or an invalid `None` ceiling) ⇒ `Disabled`.
/// 3. Otherwise `min(org ceiling, user choice)`. An unset ceiling defaults to
///    `ReadWrite`; a user choice that grants nothing resolves to `Disabled`.
#[must_use]
pub fn resolve_access(
    org_ceiling: Option<AccessLevel>,
    connection: Option<ConnectionSignal>,
) -> AccessLevel {
    let Some(connection) = connection else {
        return AccessLevel::None;
    };
    if connection.status != ConnectionStatus::Connected {
        return AccessLevel::None;
    }

    let ceiling = org_ceiling.unwrap_or(AccessLevel::ReadWrite);
    if !ceiling.grants_any() {
        return AccessLevel::Disabled;
    }

    let choice = if connection.access_level_choice.grants_any() {
        connection.access_level_choice
    } else {
        AccessLevel::Disabled
    };

    ceiling.min(choice)
}

/// Per-category access levels for one user.
///
/// Derived on every request and never stored. Categories that were never
/// resolved read as [`AccessLevel::None`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectiveAccess {
    levels: BTreeMap<Category, AccessLevel>,
}

impl EffectiveAccess {
    /// Empty map (everything `None`).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Level for a category.
    #[must_use]
    pub fn get(&self, category: Category) -> AccessLevel {
        self.levels.get(&category).copied().unwrap_or_default()
    }

    /// Set the level for a category, replacing any previous value.
    pub fn set(&mut self, category: Category, level: AccessLevel) {
        self.levels.insert(category, level);
    }

    /// Raise a category to `level` if that is more permissive than the current value.
    pub fn merge_max(&mut self, category: Category, level: AccessLevel) {
        let entry = self.levels.entry(category).or_default();
        if level > *entry {
            *entry = level;
        }
    }

    /// Iterate over explicitly resolved categories.
    pub fn iter(&self) -> impl Iterator<Item = (Category, AccessLevel)> + '_ {
        self.levels.iter().map(|(c, l)| (*c, *l))
    }
}

impl FromIterator<(Category, AccessLevel)> for EffectiveAccess {
    fn from_iter<I: IntoIterator<Item = (Category, AccessLevel)>>(iter: I) -> Self {
        Self {
            levels: iter.into_iter().collect(),
        }
    }
}
