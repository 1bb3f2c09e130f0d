//! Domain model for issues pulled from the tracker.
//!
//! These types are what the aggregators consume. They are decoupled from the
//! wire shapes in [`crate::jira`] so that optional or malformed upstream fields
//! are resolved exactly once, at conversion time.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder for a required timestamp that could not be parsed.
pub fn unknown_timestamp() -> DateTime<FixedOffset> {
    DateTime::<Utc>::MIN_UTC.fixed_offset()
}

/// A validated Jira project key (e.g., "KAFKA").
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ProjectKey(String);

impl ProjectKey {
    /// Accepts ASCII letters, digits, `_` and `-`. Anything else could
    /// alter the JQL it is interpolated into.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let valid = !trimmed.is_empty()
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        valid.then(|| Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ProjectKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid project key '{raw}'")))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Status {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Priority {
    pub name: String,
}

/// A user reference. Only constructed when the display name is non-blank.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserRef {
    pub display_name: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Issue {
    pub key: String,
    pub created: DateTime<FixedOffset>,
    pub resolved: Option<DateTime<FixedOffset>>,
    pub status: Status,
    pub priority: Option<Priority>,
    pub reporter: Option<UserRef>,
    pub assignee: Option<UserRef>,
}

impl Issue {
    /// Returns `resolved - created` when both are known.
    pub fn lifetime(&self) -> Option<chrono::TimeDelta> {
        if self.created == unknown_timestamp() {
            return None;
        }
        self.resolved.map(|resolved| resolved - self.created)
    }
}

/// One page returned by the search endpoint.
#[derive(Clone, Debug, Default)]
pub struct SearchPage {
    /// Total declared by upstream; `0` when the server omits it.
    pub total: usize,
    pub issues: Vec<Issue>,
}

/// The complete, merged result of a paginated search.
#[derive(Clone, Debug, Default)]
pub struct IssueSearchResult {
    pub total: usize,
    pub issues: Vec<Issue>,
}

/// One field change inside a history entry, as reported upstream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeItem {
    pub field: String,
    pub from_string: String,
    pub to_string: String,
}

/// One changelog history entry before merging.
#[derive(Clone, Debug, PartialEq)]
pub struct RawHistory {
    pub created: DateTime<FixedOffset>,
    pub items: Vec<ChangeItem>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub from_status: String,
    pub to_status: String,
    #[serde(rename = "changeDate")]
    pub changed_at: DateTime<FixedOffset>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_key_parse() {
        assert_eq!(ProjectKey::parse(" KAFKA ").unwrap().as_str(), "KAFKA");
        assert!(ProjectKey::parse("MY_PROJ-2").is_some());
        assert!(ProjectKey::parse("").is_none());
        assert!(ProjectKey::parse("KAFKA OR project=X").is_none());
        assert!(ProjectKey::parse("../admin").is_none());
    }

    #[test]
    fn test_lifetime_ignores_unknown_created() {
        let resolved = DateTime::parse_from_rfc3339("2024-01-02T00:00:00Z").unwrap();
        let issue = Issue {
            key: "K-1".to_string(),
            created: unknown_timestamp(),
            resolved: Some(resolved),
            status: Status::default(),
            priority: None,
            reporter: None,
            assignee: None,
        };
        assert!(issue.lifetime().is_none());
    }
}
