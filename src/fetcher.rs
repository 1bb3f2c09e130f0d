use crate::error::UpstreamError;
use crate::jira::IssueTracker;
use crate::query::SearchQuery;
use crate::types::IssueSearchResult;

/// Fetches every page of `query` and merges them in arrival order.
///
/// The first page's `total` is the expected size, or the first page's length
/// when the server reports `0`. Stops at the first empty page or once the
/// expected size is reached. Any failing page aborts the whole fetch.
pub async fn fetch_all(
    tracker: &dyn IssueTracker,
    query: &SearchQuery,
    page_size: usize,
) -> Result<IssueSearchResult, UpstreamError> {
    let mut issues = Vec::new();
    let mut start_at = 0;
    let mut expected: Option<usize> = None;

    loop {
        let page = tracker.search(query, start_at, page_size).await?;
        let page_len = page.issues.len();

        let total = *expected.get_or_insert(if page.total != 0 {
            page.total
        } else {
            page_len
        });

        if page_len == 0 {
            if issues.len() < total {
                tracing::warn!(
                    jql = %query.jql,
                    fetched = issues.len(),
                    total,
                    "Empty page before reaching declared total"
                );
            }
            break;
        }

        issues.extend(page.issues);

        if issues.len() >= total {
            break;
        }

        start_at += page_len;
    }

    let total = expected.unwrap_or(0);
    tracing::debug!(jql = %query.jql, fetched = issues.len(), total, "Fetched all pages");

    Ok(IssueSearchResult { total, issues })
}
