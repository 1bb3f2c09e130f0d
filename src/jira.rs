//! Jira REST v2 client.
//!
//! The wire types below mirror Jira's JSON and are converted into the domain
//! model from [`crate::types`] as soon as a page arrives. Every GET goes
//! through the injected [`ResponseCache`], keyed by the full request URL.

use crate::cache::ResponseCache;
use crate::config::AppConfig;
use crate::dates;
use crate::error::UpstreamError;
use crate::query::SearchQuery;
use crate::types::{
    unknown_timestamp, ChangeItem, Issue, Priority, RawHistory, SearchPage, Status, UserRef,
};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// The two upstream operations the analytics need.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Fetches one page of search results starting at `start_at`.
    async fn search(
        &self,
        query: &SearchQuery,
        start_at: usize,
        max_results: usize,
    ) -> Result<SearchPage, UpstreamError>;

    /// Fetches the raw change history of one issue.
    async fn changelog(&self, issue_key: &str) -> Result<Vec<RawHistory>, UpstreamError>;
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ApiSearchResponse {
    #[serde(default)]
    total: Option<usize>,
    #[serde(default)]
    issues: Vec<ApiIssue>,
}

#[derive(Debug, Deserialize)]
struct ApiIssue {
    key: String,
    #[serde(default)]
    fields: ApiIssueFields,
}

#[derive(Debug, Deserialize)]
struct ApiIssueFields {
    #[serde(default = "unknown_timestamp", deserialize_with = "dates::deserialize_required")]
    created: DateTime<FixedOffset>,
    #[serde(default, deserialize_with = "dates::deserialize_optional")]
    resolutiondate: Option<DateTime<FixedOffset>>,
    status: Option<ApiStatus>,
    priority: Option<ApiPriority>,
    reporter: Option<ApiUser>,
    assignee: Option<ApiUser>,
}

impl Default for ApiIssueFields {
    fn default() -> Self {
        Self {
            created: unknown_timestamp(),
            resolutiondate: None,
            status: None,
            priority: None,
            reporter: None,
            assignee: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiPriority {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    #[serde(rename = "displayName", default)]
    display_name: String,
}

/// Accepts both `{histories}` and the `expand=changelog` issue shape
/// `{changelog: {histories}}`.
#[derive(Debug, Default, Deserialize)]
struct ApiChangelogResponse {
    #[serde(default)]
    histories: Vec<ApiHistory>,
    changelog: Option<ApiChangelog>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiChangelog {
    #[serde(default)]
    histories: Vec<ApiHistory>,
}

#[derive(Debug, Deserialize)]
struct ApiHistory {
    #[serde(default = "unknown_timestamp", deserialize_with = "dates::deserialize_required")]
    created: DateTime<FixedOffset>,
    #[serde(default)]
    items: Vec<ApiChangeItem>,
}

#[derive(Debug, Deserialize)]
struct ApiChangeItem {
    #[serde(default)]
    field: String,
    #[serde(rename = "fromString", default)]
    from_string: Option<String>,
    #[serde(rename = "toString", default)]
    to_string: Option<String>,
}

impl ApiUser {
    fn into_domain(self) -> Option<UserRef> {
        if self.display_name.trim().is_empty() {
            return None;
        }
        Some(UserRef {
            display_name: self.display_name,
        })
    }
}

impl ApiIssue {
    fn into_domain(self) -> Issue {
        let fields = self.fields;
        let status = fields
            .status
            .map(|status| Status { name: status.name })
            .unwrap_or_default();

        Issue {
            key: self.key,
            created: fields.created,
            resolved: fields.resolutiondate,
            status,
            priority: fields.priority.map(|p| Priority { name: p.name }),
            reporter: fields.reporter.and_then(ApiUser::into_domain),
            assignee: fields.assignee.and_then(ApiUser::into_domain),
        }
    }
}

impl ApiSearchResponse {
    fn into_page(self) -> SearchPage {
        SearchPage {
            total: self.total.unwrap_or(0),
            issues: self.issues.into_iter().map(ApiIssue::into_domain).collect(),
        }
    }
}

impl ApiChangelogResponse {
    fn into_histories(self) -> Vec<RawHistory> {
        let histories = match self.changelog {
            Some(changelog) if self.histories.is_empty() => changelog.histories,
            _ => self.histories,
        };

        histories
            .into_iter()
            .map(|history| RawHistory {
                created: history.created,
                items: history
                    .items
                    .into_iter()
                    .map(|item| ChangeItem {
                        field: item.field,
                        from_string: item.from_string.unwrap_or_default(),
                        to_string: item.to_string.unwrap_or_default(),
                    })
                    .collect(),
            })
            .collect()
    }
}

// ============================================================================
// Client
// ============================================================================

#[derive(Clone)]
pub struct JiraClient {
    http: reqwest::Client,
    base_url: Url,
    cache: Arc<dyn ResponseCache>,
    cache_ttl: Duration,
}

impl JiraClient {
    pub fn new(config: &AppConfig, cache: Arc<dyn ResponseCache>) -> anyhow::Result<Self> {
        let mut base = config.jira_base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = &config.jira_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .user_agent(concat!("jira-analytics/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url,
            cache,
            cache_ttl: config.cache_ttl(),
        })
    }

    fn search_url(&self, query: &SearchQuery, start_at: usize, max_results: usize) -> Url {
        let mut url = self.endpoint("search");
        url.query_pairs_mut()
            .append_pair("jql", &query.jql)
            .append_pair("fields", &query.fields_param())
            .append_pair("startAt", &start_at.to_string())
            .append_pair("maxResults", &max_results.to_string());
        url
    }

    fn changelog_url(&self, issue_key: &str) -> Url {
        let mut url = self.endpoint("issue");
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(issue_key);
        }
        url.query_pairs_mut()
            .append_pair("expand", "changelog")
            .append_pair("fields", "status");
        url
    }

    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(path);
        }
        url
    }

    /// GETs `url` and deserializes the body, consulting the cache first.
    /// Only bodies that deserialize successfully are cached.
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, UpstreamError> {
        let key = url.to_string();

        if let Some(body) = self.cache.get(&key).await {
            tracing::debug!(url = %key, "Using cached response");
            return serde_json::from_str(&body)
                .map_err(|source| UpstreamError::Deserialization { url: key, source });
        }

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| UpstreamError::Transport {
                url: key.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                url: key,
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|source| UpstreamError::Transport {
                url: key.clone(),
                source,
            })?;

        let value = serde_json::from_str(&body).map_err(|source| {
            UpstreamError::Deserialization {
                url: key.clone(),
                source,
            }
        })?;

        tracing::debug!(url = %key, "Caching response");
        self.cache.set(key, Arc::from(body), self.cache_ttl).await;

        Ok(value)
    }
}

#[async_trait]
impl IssueTracker for JiraClient {
    async fn search(
        &self,
        query: &SearchQuery,
        start_at: usize,
        max_results: usize,
    ) -> Result<SearchPage, UpstreamError> {
        let url = self.search_url(query, start_at, max_results);
        let response: ApiSearchResponse = self.get_json(url).await?;
        Ok(response.into_page())
    }

    async fn changelog(&self, issue_key: &str) -> Result<Vec<RawHistory>, UpstreamError> {
        let url = self.changelog_url(issue_key);
        let response: ApiChangelogResponse = self.get_json(url).await?;
        Ok(response.into_histories())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MokaResponseCache;
    use crate::types::ProjectKey;

    fn client(base: &str) -> JiraClient {
        let config = AppConfig {
            jira_base_url: base.to_string(),
            ..AppConfig::default()
        };
        JiraClient::new(&config, Arc::new(MokaResponseCache::new(10))).unwrap()
    }

    #[test]
    fn test_issue_conversion() {
        let json = r#"{
            "total": 1,
            "issues": [{
                "key": "KAFKA-1",
                "fields": {
                    "created": "2024-01-15T10:30:00.000+0000",
                    "resolutiondate": "garbage",
                    "status": {"name": "Closed", "statusCategory": {"name": "Done"}},
                    "priority": null,
                    "reporter": {"displayName": "Ann", "accountId": "a1"},
                    "assignee": {"displayName": "  ", "accountId": "b2"}
                }
            }]
        }"#;
        let response: ApiSearchResponse = serde_json::from_str(json).unwrap();
        let page = response.into_page();

        assert_eq!(page.total, 1);
        let issue = &page.issues[0];
        assert_eq!(issue.key, "KAFKA-1");
        assert!(issue.resolved.is_none());
        assert_eq!(issue.status.name, "Closed");
        assert!(issue.priority.is_none());
        assert_eq!(issue.reporter.as_ref().unwrap().display_name, "Ann");
        assert!(issue.assignee.is_none());
    }

    #[test]
    fn test_missing_fields_and_total() {
        let response: ApiSearchResponse =
            serde_json::from_str(r#"{"issues": [{"key": "K-2"}]}"#).unwrap();
        let page = response.into_page();
        assert_eq!(page.total, 0);
        assert_eq!(page.issues[0].created, unknown_timestamp());
        assert_eq!(page.issues[0].status.name, "");
    }

    #[test]
    fn test_null_total_falls_back_to_zero() {
        let response: ApiSearchResponse =
            serde_json::from_str(r#"{"total": null, "issues": [{"key": "K-3"}]}"#).unwrap();
        let page = response.into_page();
        assert_eq!(page.total, 0);
        assert_eq!(page.issues.len(), 1);
    }

    #[test]
    fn test_changelog_shapes() {
        let top_level = r#"{"histories": [
            {"created": "2024-01-02T00:00:00.000+0000",
             "items": [{"field": "status", "fromString": "Open", "toString": "In Progress"}]}
        ]}"#;
        let expanded = r#"{"key": "K-1", "changelog": {"histories": [
            {"created": "2024-01-02T00:00:00.000+0000",
             "items": [{"field": "assignee", "fromString": null, "toString": "Bob"}]}
        ]}}"#;

        let first: ApiChangelogResponse = serde_json::from_str(top_level).unwrap();
        let histories = first.into_histories();
        assert_eq!(histories.len(), 1);
        assert_eq!(histories[0].items[0].to_string, "In Progress");

        let second: ApiChangelogResponse = serde_json::from_str(expanded).unwrap();
        let histories = second.into_histories();
        assert_eq!(histories.len(), 1);
        assert_eq!(histories[0].items[0].field, "assignee");
        assert_eq!(histories[0].items[0].from_string, "");
    }

    #[test]
    fn test_urls() {
        let client = client("https://jira.example.com/rest/api/2");
        let project = ProjectKey::parse("KAFKA").unwrap();

        let url = client.search_url(&SearchQuery::priorities(&project), 50, 25);
        assert_eq!(url.path(), "/rest/api/2/search");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("jql".to_string(), "project=KAFKA".to_string())));
        assert!(pairs.contains(&("fields".to_string(), "priority".to_string())));
        assert!(pairs.contains(&("startAt".to_string(), "50".to_string())));
        assert!(pairs.contains(&("maxResults".to_string(), "25".to_string())));

        let url = client.changelog_url("KAFKA-7");
        assert_eq!(url.path(), "/rest/api/2/issue/KAFKA-7");
        assert_eq!(url.query(), Some("expand=changelog&fields=status"));
    }
}
