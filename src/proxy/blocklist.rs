//! Path blocklist matching.
//!
//! Patterns are globs over realized request paths. `*` matches within one
//! segment, `**` across segments. A pattern also blocks everything beneath
//! the path it matches, so `/files/trash` covers `/files/trash/123`.
//! Matching is case-insensitive and ignores trailing slashes, repeated
//! slashes, query strings and fragments.

use glob::{MatchOptions, Pattern};

use crate::{Error, Result};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Compiled blocklist for one manifest.
#[derive(Debug, Clone, Default)]
pub struct Blocklist {
    patterns: Vec<Pattern>,
}

impl Blocklist {
    /// Compile manifest blocklist patterns.
    pub fn compile(patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Pattern::new(&collapse_slashes(p))
                    .map_err(|e| Error::Manifest(format!("invalid blocklist pattern '{p}': {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// First pattern blocking `path`, if any.
    #[must_use]
    pub fn first_match(&self, path: &str) -> Option<&str> {
        let path = normalize_path(path);
        let candidates = ancestors(&path);
        self.patterns
            .iter()
            .find(|pattern| {
                candidates
                    .iter()
                    .any(|candidate| pattern.matches_with(candidate, MATCH_OPTIONS))
            })
            .map(Pattern::as_str)
    }

    /// Whether `path` is blocked.
    #[must_use]
    pub fn is_blocked(&self, path: &str) -> bool {
        self.first_match(path).is_some()
    }

    /// Number of patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether there are no patterns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Patterns keep `?` as the single-character wildcard.
fn collapse_slashes(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

fn normalize_path(path: &str) -> String {
    collapse_slashes(path.split(['?', '#']).next().unwrap_or_default())
}

/// `/a/b/c` yields `/a`, `/a/b`, `/a/b/c`.
fn ancestors(path: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        current.push('/');
        current.push_str(segment);
        out.push(current.clone());
    }
    if out.is_empty() {
        out.push("/".to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocklist(patterns: &[&str]) -> Blocklist {
        Blocklist::compile(&patterns.iter().map(ToString::to_string).collect::<Vec<_>>()).unwrap()
    }

    #[test]
    fn exact_and_descendant_paths_are_blocked() {
        let list = blocklist(&["/files/trash"]);
        assert!(list.is_blocked("/files/trash"));
        assert!(list.is_blocked("/files/trash/123"));
        assert!(!list.is_blocked("/files/trashcan"));
        assert!(!list.is_blocked("/files"));
    }

    #[test]
    fn single_star_stays_within_a_segment() {
        let list = blocklist(&["/users/*/permissions"]);
        assert!(list.is_blocked("/users/42/permissions"));
        assert!(list.is_blocked("/users/42/permissions/7"));
        assert!(!list.is_blocked("/users/42/roles/permissions"));
    }

    #[test]
    fn double_star_spans_segments() {
        let list = blocklist(&["/settings/**"]);
        assert!(list.is_blocked("/settings/a/b/c"));
    }

    #[test]
    fn normalization_defeats_trivial_bypasses() {
        let list = blocklist(&["/users/*/settings"]);
        assert!(list.is_blocked("/users/me/settings/"));
        assert!(list.is_blocked("//users//me//settings"));
        assert!(list.is_blocked("/USERS/me/Settings"));
        assert!(list.is_blocked("/users/me/settings?x=1"));
    }

    #[test]
    fn encoded_separator_does_not_match_as_separator() {
        // A value "me/settings" is encoded into a single segment.
        let list = blocklist(&["/users/*/settings"]);
        assert!(!list.is_blocked("/users/me%2Fsettings"));
    }

    #[test]
    fn first_match_names_the_pattern() {
        let list = blocklist(&["/company", "/users/*/billable_rates"]);
        assert_eq!(list.first_match("/users/9/billable_rates"), Some("/users/*/billable_rates"));
        assert_eq!(list.first_match("/projects"), None);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn question_mark_in_pattern_matches_one_character() {
        // GIVEN: a pattern using the single-character wildcard
        let list = blocklist(&["/files/?"]);

        // THEN: it matches one-character segments only, not the parent subtree
        assert_eq!(list.first_match("/files/a"), Some("/files/?"));
        assert!(list.is_blocked("/files/a/def"));
        assert!(!list.is_blocked("/files/abc"));
        assert!(!list.is_blocked("/files/abc/def"));
        assert!(!list.is_blocked("/files"));
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let err = Blocklist::compile(&["/a/[".to_string()]).unwrap_err();
        assert!(matches!(err, Error::Manifest(_)));
    }
}
