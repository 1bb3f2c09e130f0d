//! The search query issued for each report.

use crate::types::ProjectKey;

/// A JQL expression plus the issue fields to return.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchQuery {
    pub jql: String,
    pub fields: &'static [&'static str],
}

impl SearchQuery {
    /// Comma-joined field list as the search endpoint expects it.
    pub fn fields_param(&self) -> String {
        self.fields.join(",")
    }

    /// Issues currently in the Closed status. Shared by the open-time and
    /// lifetime histograms.
    pub fn closed_lifetimes(project: &ProjectKey) -> Self {
        Self {
            jql: format!("project={project} AND status=Closed"),
            fields: &["created", "resolutiondate"],
        }
    }

    /// Issues that were Closed at any point.
    pub fn status_time(project: &ProjectKey) -> Self {
        Self {
            jql: format!("project={project} AND status was Closed"),
            fields: &["status", "created", "resolutiondate"],
        }
    }

    pub fn daily_flow(project: &ProjectKey) -> Self {
        Self {
            jql: format!("project={project}"),
            fields: &["created", "status", "resolutiondate"],
        }
    }

    pub fn contributors(project: &ProjectKey) -> Self {
        Self {
            jql: format!("project={project}"),
            fields: &["reporter", "assignee"],
        }
    }

    pub fn priorities(project: &ProjectKey) -> Self {
        Self {
            jql: format!("project={project}"),
            fields: &["priority"],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queries_are_scoped_to_project() {
        let project = ProjectKey::parse("KAFKA").unwrap();
        let query = SearchQuery::status_time(&project);
        assert_eq!(query.jql, "project=KAFKA AND status was Closed");
        assert_eq!(query.fields_param(), "status,created,resolutiondate");
        assert_eq!(
            SearchQuery::closed_lifetimes(&project).jql,
            "project=KAFKA AND status=Closed"
        );
    }
}
