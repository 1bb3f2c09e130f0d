//! Status history extraction from issue changelogs.

use crate::error::UpstreamError;
use crate::jira::IssueTracker;
use crate::status::is_closed;
use crate::types::{Issue, RawHistory, StatusChange};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashMap;

const STATUS_FIELD: &str = "status";

/// Keeps the status transition of each history entry, in arrival order.
///
/// Entries are neither sorted nor deduplicated. An entry that touches several
/// fields contributes its first status item only.
pub fn merge_history(raw: &[RawHistory]) -> Vec<StatusChange> {
    raw.iter()
        .filter_map(|history| {
            history
                .items
                .iter()
                .find(|item| item.field == STATUS_FIELD)
                .map(|item| StatusChange {
                    from_status: item.from_string.clone(),
                    to_status: item.to_string.clone(),
                    changed_at: history.created,
                })
        })
        .collect()
}

/// Fetches and merges changelogs for the closed issues in `issues`.
///
/// Open issues are skipped without a request. At most `concurrency` requests
/// are in flight; the first failure fails the whole operation.
pub async fn fetch_histories(
    tracker: &dyn IssueTracker,
    issues: &[Issue],
    concurrency: usize,
) -> Result<HashMap<String, Vec<StatusChange>>, UpstreamError> {
    let closed: Vec<String> = issues
        .iter()
        .filter(|issue| is_closed(&issue.status.name))
        .map(|issue| issue.key.clone())
        .collect();

    tracing::debug!(closed = closed.len(), "Fetching changelogs");

    stream::iter(closed)
        .map(|key| async move {
            let raw = tracker.changelog(&key).await?;
            Ok::<_, UpstreamError>((key, merge_history(&raw)))
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SearchQuery;
    use crate::types::{unknown_timestamp, ChangeItem, SearchPage, Status};
    use async_trait::async_trait;
    use chrono::{DateTime, FixedOffset};
    use std::sync::Mutex;

    fn at(raw: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(raw).unwrap()
    }

    fn item(field: &str, from: &str, to: &str) -> ChangeItem {
        ChangeItem {
            field: field.to_string(),
            from_string: from.to_string(),
            to_string: to.to_string(),
        }
    }

    #[test]
    fn test_merge_keeps_status_items_in_order() {
        let raw = vec![
            RawHistory {
                created: at("2024-01-03T00:00:00Z"),
                items: vec![item("status", "In Progress", "Closed")],
            },
            RawHistory {
                created: at("2024-01-02T00:00:00Z"),
                items: vec![item("assignee", "", "Bob")],
            },
            RawHistory {
                created: at("2024-01-01T00:00:00Z"),
                items: vec![
                    item("priority", "Low", "High"),
                    item("status", "Open", "In Progress"),
                    item("status", "ignored", "ignored"),
                ],
            },
        ];

        let merged = merge_history(&raw);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].to_status, "Closed");
        assert_eq!(merged[0].changed_at, at("2024-01-03T00:00:00Z"));
        assert_eq!(merged[1].from_status, "Open");
        assert_eq!(merged[1].to_status, "In Progress");
    }

    struct RecordingTracker {
        requested: Mutex<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl IssueTracker for RecordingTracker {
        async fn search(
            &self,
            _query: &SearchQuery,
            _start_at: usize,
            _max_results: usize,
        ) -> Result<SearchPage, UpstreamError> {
            Ok(SearchPage::default())
        }

        async fn changelog(&self, issue_key: &str) -> Result<Vec<RawHistory>, UpstreamError> {
            self.requested.lock().unwrap().push(issue_key.to_string());
            if self.fail_on == Some(issue_key) {
                return Err(UpstreamError::Status {
                    url: issue_key.to_string(),
                    status: 500,
                });
            }
            Ok(vec![RawHistory {
                created: at("2024-01-01T00:00:00Z"),
                items: vec![item("status", "Open", "Closed")],
            }])
        }
    }

    fn issue(key: &str, status: &str) -> Issue {
        Issue {
            key: key.to_string(),
            created: unknown_timestamp(),
            resolved: None,
            status: Status {
                name: status.to_string(),
            },
            priority: None,
            reporter: None,
            assignee: None,
        }
    }

    #[tokio::test]
    async fn test_only_closed_issues_are_fetched() {
        let tracker = RecordingTracker {
            requested: Mutex::new(Vec::new()),
            fail_on: None,
        };
        let issues = vec![
            issue("K-1", "Closed"),
            issue("K-2", "Open"),
            issue("K-3", "Решено"),
        ];

        let histories = fetch_histories(&tracker, &issues, 2).await.unwrap();

        let mut requested = tracker.requested.lock().unwrap().clone();
        requested.sort();
        assert_eq!(requested, vec!["K-1", "K-3"]);
        assert_eq!(histories.len(), 2);
        assert_eq!(histories["K-1"][0].to_status, "Closed");
        assert!(!histories.contains_key("K-2"));
    }

    #[tokio::test]
    async fn test_one_failure_fails_all() {
        let tracker = RecordingTracker {
            requested: Mutex::new(Vec::new()),
            fail_on: Some("K-2"),
        };
        let issues = vec![issue("K-1", "Done"), issue("K-2", "Done"), issue("K-3", "Done")];

        let err = fetch_histories(&tracker, &issues, 1).await.unwrap_err();

        assert_eq!(err.status(), Some(500));
    }
}
