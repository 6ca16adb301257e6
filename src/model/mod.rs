//! Data model shared by the target resolver, fetch coordinator, cursor
//! codec, and alias assigner.
//!
//! Target / `IssuesPage` / Issue form a tree — there are no cyclic
//! relations here, so everything below is plain owned data, not `Rc`/`Arc`
//! graphs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single `(org, project)` pair identifying one project to list from.
///
/// Equality and hashing are on the slug pair only; `org_display` /
/// `project_display` / `source` are metadata carried for user-facing
/// messages and do not affect dedup.
#[derive(Debug, Clone)]
pub struct Target {
    pub org: String,
    pub project: String,
    pub org_display: Option<String>,
    pub project_display: Option<String>,
    /// Human-readable provenance, e.g. "detected from `.env.local`".
    pub source: Option<String>,
}

impl Target {
    #[must_use]
    pub fn new(org: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            project: project.into(),
            org_display: None,
            project_display: None,
            source: None,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// `org/project`, the key used for dedup, caching, and cursor maps.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}/{}", self.org, self.project)
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        self.org == other.org && self.project == other.project
    }
}
impl Eq for Target {}

impl std::hash::Hash for Target {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.org.hash(state);
        self.project.hash(state);
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.org, self.project)
    }
}

/// An opaque issue record, immutable within a single response.
///
/// `raw` retains the full service payload so `--json` output can re-emit
/// the issue object byte-faithfully, per the JSON output contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub short_id: String,
    pub title: String,
    pub level: String,
    pub count: String,
    pub user_count: u64,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    pub project_slug: String,
    pub permalink: String,
    #[serde(default = "serde_json::Value::default", skip_serializing_if = "serde_json::Value::is_null")]
    pub raw: serde_json::Value,
}

impl Issue {
    /// Sort key accessor for `count`, treating unparsable/missing as zero.
    #[must_use]
    pub fn count_value(&self) -> u64 {
        self.count.parse().unwrap_or(0)
    }

    /// Epoch-sorts missing dates last for descending-date sorts.
    #[must_use]
    pub fn last_seen_or_epoch(&self) -> DateTime<Utc> {
        self.last_seen.unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH)
    }

    #[must_use]
    pub fn first_seen_or_epoch(&self) -> DateTime<Utc> {
        self.first_seen.unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH)
    }
}

/// Ordered page of issues plus an optional opaque continuation cursor.
#[derive(Debug, Clone, Default)]
pub struct IssuesPage {
    pub issues: Vec<Issue>,
    pub next_cursor: Option<String>,
}

/// A regional API root: `(name, url)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    pub url: String,
}

/// Persisted org slug → region URL mapping.
#[derive(Debug, Clone)]
pub struct OrgRegion {
    pub org_slug: String,
    pub url: String,
}

/// One row of the alias table: `(alias, org_slug, project_slug)`.
///
/// Alias is always lowercase; validity requires the caller's fingerprint
/// to match the one recorded when the entry was written, or no
/// fingerprint supplied at all (legacy rows pass).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectAliasEntry {
    pub alias: String,
    pub org_slug: String,
    pub project_slug: String,
}

/// Per-target opaque pagination cursor. `None` means exhausted.
pub type Cursor = Option<String>;

/// Ordered sequence of per-target cursors, aligned to the stable sorted
/// target order used to build the owning context key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompoundCursor(pub Vec<Cursor>);

impl CompoundCursor {
    #[must_use]
    pub fn exhausted(len: usize) -> Self {
        Self(vec![None; len])
    }

    /// True when at least one segment is non-empty: a `next_page` exists
    /// iff any cursor segment is non-empty.
    #[must_use]
    pub fn has_next_page(&self) -> bool {
        self.0.iter().any(Option::is_some)
    }
}

/// String fingerprint of the query parameters that determine whether two
/// invocations may share a cursor chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextKey(pub String);

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `(command_key, context_key) -> cursor_string` persisted row.
#[derive(Debug, Clone)]
pub struct PaginationEntry {
    pub command_key: String,
    pub context_key: String,
    pub cursor: String,
}

/// Outcome of fetching one target, tagged rather than thrown: only
/// `AuthError` is allowed to propagate out of a fetch task.
#[derive(Debug)]
pub enum FetchResult {
    Ok {
        target: Target,
        issues: Vec<Issue>,
        next_cursor: Option<String>,
    },
    Failure {
        target: Target,
        error: crate::error::Error,
    },
}

impl FetchResult {
    #[must_use]
    pub fn target(&self) -> &Target {
        match self {
            Self::Ok { target, .. } | Self::Failure { target, .. } => target,
        }
    }
}

/// Sort key accepted by the `list` pipeline; all orderings are descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SortKey {
    #[value(name = "date")]
    Date,
    #[value(name = "new")]
    New,
    #[value(name = "freq")]
    Freq,
    #[value(name = "user")]
    User,
}

impl Default for SortKey {
    fn default() -> Self {
        Self::Date
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use clap::ValueEnum;
        let name = self.to_possible_value().expect("SortKey has no skipped variants").get_name().to_string();
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_equality_ignores_display_fields() {
        let a = Target::new("acme", "frontend");
        let mut b = Target::new("acme", "frontend");
        b.source = Some("env".into());
        assert_eq!(a, b);
    }

    #[test]
    fn target_key_format() {
        assert_eq!(Target::new("acme", "frontend").key(), "acme/frontend");
    }

    #[test]
    fn compound_cursor_has_next_page() {
        assert!(!CompoundCursor::exhausted(3).has_next_page());
        let mut c = CompoundCursor::exhausted(2);
        c.0[0] = Some("abc".into());
        assert!(c.has_next_page());
    }

    #[test]
    fn issue_count_value_parses_or_zero() {
        let mut issue = sample_issue();
        issue.count = "42".into();
        assert_eq!(issue.count_value(), 42);
        issue.count = "garbage".into();
        assert_eq!(issue.count_value(), 0);
    }

    fn sample_issue() -> Issue {
        Issue {
            id: "1".into(),
            short_id: "FRONTEND-1".into(),
            title: "t".into(),
            level: "error".into(),
            count: "0".into(),
            user_count: 0,
            first_seen: None,
            last_seen: None,
            project_slug: "frontend".into(),
            permalink: "https://example.test/issues/1".into(),
            raw: serde_json::Value::Null,
        }
    }
}
