//! The six analytics reports.
//!
//! Every function here is pure: it borrows the fetched issues (and, for the
//! status-time report, the merged histories) and builds a fresh report.

use crate::buckets::{
    self, Bucket, TimeUnit, LIFETIME_EDGES_HOURS, OPEN_TIME_EDGES_DAYS, STATUS_TIME_EDGES_DAYS,
};
use crate::status::is_closed;
use crate::types::{unknown_timestamp, Issue, IssueSearchResult, ProjectKey, StatusChange};
use chrono::{DateTime, FixedOffset, NaiveDate, TimeDelta};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Number of users kept in the top contributors report.
pub const TOP_CONTRIBUTORS_LIMIT: usize = 30;

/// Label used when a closed issue without transitions has a blank status.
const FALLBACK_STATUS: &str = "Open";

const MILLIS_PER_HOUR: f64 = 3_600_000.0;
const MILLIS_PER_DAY: f64 = 86_400_000.0;

fn hours(delta: TimeDelta) -> f64 {
    delta.num_milliseconds() as f64 / MILLIS_PER_HOUR
}

fn days(delta: TimeDelta) -> f64 {
    delta.num_milliseconds() as f64 / MILLIS_PER_DAY
}

// ============================================================================
// Daily task flow
// ============================================================================

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailyFlowItem {
    pub date: NaiveDate,
    pub created_count: usize,
    /// Issues created on `date` that have been resolved at any time.
    pub resolved_count: usize,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DailyTaskFlowReport {
    pub project_key: ProjectKey,
    pub daily_flow: Vec<DailyFlowItem>,
}

/// Groups issues by creation date, ascending.
pub fn daily_task_flow(project_key: &ProjectKey, result: &IssueSearchResult) -> DailyTaskFlowReport {
    let mut by_date: BTreeMap<NaiveDate, (usize, usize)> = BTreeMap::new();

    for issue in &result.issues {
        let entry = by_date.entry(issue.created.date_naive()).or_default();
        entry.0 += 1;
        if issue.resolved.is_some() {
            entry.1 += 1;
        }
    }

    DailyTaskFlowReport {
        project_key: project_key.clone(),
        daily_flow: by_date
            .into_iter()
            .map(|(date, (created_count, resolved_count))| DailyFlowItem {
                date,
                created_count,
                resolved_count,
            })
            .collect(),
    }
}

// ============================================================================
// Priority distribution
// ============================================================================

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriorityStats {
    pub priority: String,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PriorityDistributionReport {
    pub project_key: ProjectKey,
    pub total_issues: usize,
    pub distribution: Vec<PriorityStats>,
}

/// Counts issues per priority. Percentages are relative to all issues,
/// including those without a priority.
pub fn priority_distribution(
    project_key: &ProjectKey,
    result: &IssueSearchResult,
) -> PriorityDistributionReport {
    let total_issues = result.issues.len();
    let mut groups: Vec<(&str, usize)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for priority in result.issues.iter().filter_map(|i| i.priority.as_ref()) {
        let name = priority.name.as_str();
        match index.get(name) {
            Some(&slot) => groups[slot].1 += 1,
            None => {
                index.insert(name, groups.len());
                groups.push((name, 1));
            }
        }
    }

    // Stable sort, so equal counts keep encounter order.
    groups.sort_by(|a, b| b.1.cmp(&a.1));

    PriorityDistributionReport {
        project_key: project_key.clone(),
        total_issues,
        distribution: groups
            .into_iter()
            .map(|(name, count)| PriorityStats {
                priority: name.to_string(),
                count,
                percentage: count as f64 / total_issues as f64 * 100.0,
            })
            .collect(),
    }
}

// ============================================================================
// Status time distribution
// ============================================================================

/// Time spent in one status, in days.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusInterval {
    pub status: String,
    pub days: f64,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct IssueStatusTime {
    pub issue_key: String,
    pub created: DateTime<FixedOffset>,
    pub resolution_date: Option<DateTime<FixedOffset>>,
    pub current_status: String,
    pub status_changes: Vec<StatusChange>,
    pub intervals: Vec<StatusInterval>,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StatusHistogram {
    pub status: String,
    /// Non-empty buckets only.
    pub data: Vec<Bucket>,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StatusTimeDistributionReport {
    pub project_key: ProjectKey,
    pub issues: Vec<IssueStatusTime>,
    pub histograms: Vec<StatusHistogram>,
}

/// Splits an issue's life into per-status intervals. Non-positive intervals,
/// intervals with a blank status and intervals starting at an unknown
/// creation time are dropped.
pub fn status_intervals(issue: &Issue, changes: &[StatusChange]) -> Vec<StatusInterval> {
    let mut intervals = Vec::new();
    let mut push = |status: &str, from: DateTime<FixedOffset>, to: DateTime<FixedOffset>| {
        if from == unknown_timestamp() {
            return;
        }
        let span = days(to - from);
        if span > 0.0 && !status.is_empty() {
            intervals.push(StatusInterval {
                status: status.to_string(),
                days: span,
            });
        }
    };

    let (Some(first), Some(last)) = (changes.first(), changes.last()) else {
        if let Some(resolved) = issue.resolved {
            let status = match issue.status.name.as_str() {
                "" => FALLBACK_STATUS,
                name => name,
            };
            push(status, issue.created, resolved);
        }
        return intervals;
    };

    push(&first.from_status, issue.created, first.changed_at);

    for pair in changes.windows(2) {
        push(&pair[0].to_status, pair[0].changed_at, pair[1].changed_at);
    }

    if let Some(resolved) = issue.resolved {
        push(&last.to_status, last.changed_at, resolved);
    }

    intervals
}

/// Builds per-status time intervals for closed issues, plus one histogram per
/// status (day buckets, empty buckets omitted).
///
/// Issues missing from `histories` are treated as having no transitions.
pub fn status_time_distribution(
    project_key: &ProjectKey,
    result: &IssueSearchResult,
    histories: &HashMap<String, Vec<StatusChange>>,
) -> StatusTimeDistributionReport {
    let issues: Vec<IssueStatusTime> = result
        .issues
        .iter()
        .filter(|issue| is_closed(&issue.status.name))
        .map(|issue| {
            let changes = histories.get(&issue.key).cloned().unwrap_or_default();
            let intervals = status_intervals(issue, &changes);
            IssueStatusTime {
                issue_key: issue.key.clone(),
                created: issue.created,
                resolution_date: issue.resolved,
                current_status: issue.status.name.clone(),
                status_changes: changes,
                intervals,
            }
        })
        .collect();

    let mut per_status: Vec<(&str, Vec<f64>)> = Vec::new();
    for interval in issues.iter().flat_map(|issue| &issue.intervals) {
        match per_status
            .iter_mut()
            .find(|(status, _)| *status == interval.status)
        {
            Some((_, values)) => values.push(interval.days),
            None => per_status.push((interval.status.as_str(), vec![interval.days])),
        }
    }

    let histograms = per_status
        .into_iter()
        .map(|(status, values)| StatusHistogram {
            status: status.to_string(),
            data: buckets::bucket(&values, &STATUS_TIME_EDGES_DAYS, TimeUnit::Days)
                .into_iter()
                .filter(|bucket| bucket.count > 0)
                .collect(),
        })
        .filter(|histogram| !histogram.data.is_empty())
        .collect();

    StatusTimeDistributionReport {
        project_key: project_key.clone(),
        issues,
        histograms,
    }
}

// ============================================================================
// Top contributors
// ============================================================================

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub user_name: String,
    pub total_count: usize,
    pub reporter_count: usize,
    pub assignee_count: usize,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TopUsersReport {
    pub project_key: ProjectKey,
    pub top_users: Vec<UserStats>,
}

/// Ranks users by reporter + assignee appearances. Ties keep the order in
/// which users were first seen.
pub fn top_contributors(project_key: &ProjectKey, result: &IssueSearchResult) -> TopUsersReport {
    let mut users: Vec<UserStats> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for issue in &result.issues {
        let roles = [(issue.reporter.as_ref(), true), (issue.assignee.as_ref(), false)];
        for (user, is_reporter) in roles {
            let Some(user) = user else { continue };
            let name = user.display_name.as_str();
            if name.trim().is_empty() {
                continue;
            }
            let slot = *index.entry(name).or_insert_with(|| {
                users.push(UserStats {
                    user_name: name.to_string(),
                    total_count: 0,
                    reporter_count: 0,
                    assignee_count: 0,
                });
                users.len() - 1
            });

            let stats = &mut users[slot];
            if is_reporter {
                stats.reporter_count += 1;
            } else {
                stats.assignee_count += 1;
            }
            stats.total_count = stats.reporter_count + stats.assignee_count;
        }
    }

    users.sort_by(|a, b| b.total_count.cmp(&a.total_count));
    users.truncate(TOP_CONTRIBUTORS_LIMIT);

    TopUsersReport {
        project_key: project_key.clone(),
        top_users: users,
    }
}

// ============================================================================
// Open time and lifetime histograms
// ============================================================================

/// An issue in the search-response shape `{key, fields: {created, resolutiondate}}`.
#[derive(Debug, Serialize, Clone)]
pub struct IssueLifetime {
    pub key: String,
    pub fields: LifetimeFields,
}

#[derive(Debug, Serialize, Clone)]
pub struct LifetimeFields {
    pub created: DateTime<FixedOffset>,
    #[serde(rename = "resolutiondate")]
    pub resolution_date: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct OpenTimeHistogramReport {
    pub project_key: ProjectKey,
    /// The issues the histogram was computed from, for callers that bucket
    /// differently.
    pub issues: Vec<IssueLifetime>,
    pub histogram: Vec<Bucket>,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorklogHistogramItem {
    pub time_range: String,
    pub task_count: usize,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct WorklogHistogramReport {
    pub project_key: ProjectKey,
    pub histogram: Vec<WorklogHistogramItem>,
}

/// Positive creation-to-resolution durations.
fn lifetimes<'a>(result: &'a IssueSearchResult) -> impl Iterator<Item = TimeDelta> + 'a {
    result
        .issues
        .iter()
        .filter_map(Issue::lifetime)
        .filter(|delta| *delta > TimeDelta::zero())
}

/// Histogram of days from creation to resolution.
pub fn open_time_histogram(
    project_key: &ProjectKey,
    result: &IssueSearchResult,
) -> OpenTimeHistogramReport {
    let values: Vec<f64> = lifetimes(result).map(days).collect();

    OpenTimeHistogramReport {
        project_key: project_key.clone(),
        issues: result
            .issues
            .iter()
            .map(|issue| IssueLifetime {
                key: issue.key.clone(),
                fields: LifetimeFields {
                    created: issue.created,
                    resolution_date: issue.resolved,
                },
            })
            .collect(),
        histogram: buckets::bucket(&values, &OPEN_TIME_EDGES_DAYS, TimeUnit::Days),
    }
}

/// Histogram of hours from creation to resolution.
///
/// Despite the name this measures issue lifetime, not logged work.
pub fn worklog_histogram(
    project_key: &ProjectKey,
    result: &IssueSearchResult,
) -> WorklogHistogramReport {
    if result.issues.is_empty() {
        return WorklogHistogramReport {
            project_key: project_key.clone(),
            histogram: Vec::new(),
        };
    }

    let values: Vec<f64> = lifetimes(result).map(hours).collect();

    WorklogHistogramReport {
        project_key: project_key.clone(),
        histogram: buckets::bucket(&values, &LIFETIME_EDGES_HOURS, TimeUnit::Hours)
            .into_iter()
            .map(|bucket| WorklogHistogramItem {
                time_range: bucket.label,
                task_count: bucket.count,
            })
            .collect(),
    }
}
