//! Service layer for computing analytics reports.
//!
//! This module implements `AnalyticsQuerier`, which acts as the main entry point for
//! producing each report. For every request it:
//! 1. Fetches the complete issue set for the report's search query.
//! 2. For the status-time report, fetches changelogs of closed issues.
//! 3. Runs the matching aggregation from [`crate::metrics`].
//!
//! Reports are recomputed on every call. Repeated upstream requests are absorbed by
//! the response cache inside the tracker client.

use crate::changelog;
use crate::config::AppConfig;
use crate::error::UpstreamError;
use crate::fetcher;
use crate::jira::IssueTracker;
use crate::metrics::{
    self, DailyTaskFlowReport, OpenTimeHistogramReport, PriorityDistributionReport,
    StatusTimeDistributionReport, TopUsersReport, WorklogHistogramReport,
};
use crate::query::SearchQuery;
use crate::types::{IssueSearchResult, ProjectKey};
use std::sync::Arc;

#[derive(Clone)]
pub struct AnalyticsQuerier {
    tracker: Arc<dyn IssueTracker>,
    page_size: usize,
    changelog_concurrency: usize,
}

impl AnalyticsQuerier {
    pub fn new(tracker: Arc<dyn IssueTracker>, config: &AppConfig) -> Self {
        Self {
            tracker,
            page_size: config.jira_page_size,
            changelog_concurrency: config.changelog_concurrency_limit,
        }
    }

    async fn fetch(
        &self,
        project_key: &ProjectKey,
        query: SearchQuery,
    ) -> Result<IssueSearchResult, UpstreamError> {
        let result = fetcher::fetch_all(self.tracker.as_ref(), &query, self.page_size).await?;
        tracing::info!(
            project_key = %project_key,
            issues = result.issues.len(),
            total = result.total,
            "Fetched issues"
        );
        Ok(result)
    }

    pub async fn daily_task_flow(
        &self,
        project_key: &ProjectKey,
    ) -> Result<DailyTaskFlowReport, UpstreamError> {
        let result = self
            .fetch(project_key, SearchQuery::daily_flow(project_key))
            .await?;
        Ok(metrics::daily_task_flow(project_key, &result))
    }

    pub async fn priority_distribution(
        &self,
        project_key: &ProjectKey,
    ) -> Result<PriorityDistributionReport, UpstreamError> {
        let result = self
            .fetch(project_key, SearchQuery::priorities(project_key))
            .await?;
        Ok(metrics::priority_distribution(project_key, &result))
    }

    pub async fn status_time_distribution(
        &self,
        project_key: &ProjectKey,
    ) -> Result<StatusTimeDistributionReport, UpstreamError> {
        let result = self
            .fetch(project_key, SearchQuery::status_time(project_key))
            .await?;
        let histories = changelog::fetch_histories(
            self.tracker.as_ref(),
            &result.issues,
            self.changelog_concurrency,
        )
        .await?;
        tracing::info!(
            project_key = %project_key,
            changelogs = histories.len(),
            "Fetched changelogs"
        );
        Ok(metrics::status_time_distribution(
            project_key,
            &result,
            &histories,
        ))
    }

    pub async fn top_contributors(
        &self,
        project_key: &ProjectKey,
    ) -> Result<TopUsersReport, UpstreamError> {
        let result = self
            .fetch(project_key, SearchQuery::contributors(project_key))
            .await?;
        Ok(metrics::top_contributors(project_key, &result))
    }

    pub async fn open_time_histogram(
        &self,
        project_key: &ProjectKey,
    ) -> Result<OpenTimeHistogramReport, UpstreamError> {
        let result = self
            .fetch(project_key, SearchQuery::closed_lifetimes(project_key))
            .await?;
        Ok(metrics::open_time_histogram(project_key, &result))
    }

    pub async fn worklog_histogram(
        &self,
        project_key: &ProjectKey,
    ) -> Result<WorklogHistogramReport, UpstreamError> {
        let result = self
            .fetch(project_key, SearchQuery::closed_lifetimes(project_key))
            .await?;
        Ok(metrics::worklog_histogram(project_key, &result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{unknown_timestamp, Issue, RawHistory, SearchPage, Status};
    use async_trait::async_trait;

    /// One closed issue, no history.
    struct SingleIssue;

    #[async_trait]
    impl IssueTracker for SingleIssue {
        async fn search(
            &self,
            _query: &SearchQuery,
            start_at: usize,
            _max_results: usize,
        ) -> Result<SearchPage, UpstreamError> {
            if start_at > 0 {
                return Ok(SearchPage::default());
            }
            Ok(SearchPage {
                total: 1,
                issues: vec![Issue {
                    key: "K-1".to_string(),
                    created: unknown_timestamp(),
                    resolved: None,
                    status: Status {
                        name: "Closed".to_string(),
                    },
                    priority: None,
                    reporter: None,
                    assignee: None,
                }],
            })
        }

        async fn changelog(&self, _issue_key: &str) -> Result<Vec<RawHistory>, UpstreamError> {
            Ok(Vec::new())
        }
    }

    fn assert_send<T: Send>(value: T) -> T {
        value
    }

    #[tokio::test]
    async fn test_status_time_future_is_send() {
        let querier = AnalyticsQuerier::new(Arc::new(SingleIssue), &AppConfig::default());
        let project = ProjectKey::parse("KAFKA").unwrap();

        let handle = tokio::spawn(async move {
            assert_send(querier.status_time_distribution(&project)).await
        });
        let report = handle.await.unwrap().unwrap();

        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].issue_key, "K-1");
        assert!(report.issues[0].intervals.is_empty());
    }
}
