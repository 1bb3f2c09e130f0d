//! Application configuration and environment variable parsing.
//!
//! This module handles loading configuration settings from the environment (e.g., .env file).
//! It defines the `AppConfig` struct which governs the upstream Jira connection,
//! pagination, response cache TTLs, and the HTTP listener.

use serde::Deserialize;
use std::time::Duration as StdDuration;

const DEFAULT_JIRA_BASE_URL: &str = "https://issues.apache.org/jira/rest/api/2/";

/// Application configuration loaded from environment variables.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    /// Base URL of the Jira REST v2 API.
    #[serde(default = "default_jira_base_url")]
    pub jira_base_url: String,

    /// Optional personal access token, sent as a bearer token.
    #[serde(default)]
    pub jira_token: Option<String>,

    /// Requested `maxResults` per search page. Servers may return fewer.
    #[serde(default = "default_page_size")]
    pub jira_page_size: usize,

    /// Timeout for a single upstream request, in seconds.
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,

    /// Time to live for cached upstream responses in seconds.
    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,

    /// Maximum number of responses to keep in the cache.
    #[serde(default = "default_cache_max_capacity")]
    pub cache_max_capacity: u64,

    /// Maximum number of changelog requests in flight per report.
    #[serde(default = "default_changelog_concurrency_limit")]
    pub changelog_concurrency_limit: usize,

    /// Origins allowed by CORS.
    /// Expected format: comma-separated list.
    /// Example: "http://localhost:5173,https://analytics.example.com"
    #[serde(
        default = "default_cors_origins",
        deserialize_with = "deserialize_comma_list"
    )]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Emit logs as JSON lines instead of human-readable text.
    #[serde(default)]
    pub log_json: bool,
}

fn default_jira_base_url() -> String {
    DEFAULT_JIRA_BASE_URL.to_string()
}

fn default_page_size() -> usize {
    1000
}

fn default_request_timeout_seconds() -> u64 {
    30
}

fn default_cache_ttl_seconds() -> u64 {
    30 * 60
}

fn default_cache_max_capacity() -> u64 {
    10_000
}

fn default_changelog_concurrency_limit() -> usize {
    8
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "http://localhost:3000".to_string(),
    ]
}

fn default_port() -> u16 {
    3000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            jira_base_url: default_jira_base_url(),
            jira_token: None,
            jira_page_size: default_page_size(),
            request_timeout_seconds: default_request_timeout_seconds(),
            cache_ttl_seconds: default_cache_ttl_seconds(),
            cache_max_capacity: default_cache_max_capacity(),
            changelog_concurrency_limit: default_changelog_concurrency_limit(),
            cors_origins: default_cors_origins(),
            port: default_port(),
            log_json: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let config: Self = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.jira_page_size == 0 {
            anyhow::bail!("JIRA_PAGE_SIZE must be greater than zero");
        }
        if self.changelog_concurrency_limit == 0 {
            anyhow::bail!("CHANGELOG_CONCURRENCY_LIMIT must be greater than zero");
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> StdDuration {
        StdDuration::from_secs(self.cache_ttl_seconds)
    }

    pub fn request_timeout(&self) -> StdDuration {
        StdDuration::from_secs(self.request_timeout_seconds)
    }
}

fn deserialize_comma_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Ok(parse_comma_list(&s))
}

fn parse_comma_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const VARS: [&str; 6] = [
        "JIRA_BASE_URL",
        "JIRA_PAGE_SIZE",
        "CACHE_TTL_SECONDS",
        "CHANGELOG_CONCURRENCY_LIMIT",
        "CORS_ORIGINS",
        "LOG_JSON",
    ];

    fn clear() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        env::set_var("JIRA_BASE_URL", "https://jira.example.com/rest/api/2/");
        env::set_var("JIRA_PAGE_SIZE", "100");
        env::set_var("CACHE_TTL_SECONDS", "60");
        env::set_var("CHANGELOG_CONCURRENCY_LIMIT", "4");
        env::set_var("CORS_ORIGINS", "http://a.test, http://b.test,");
        env::set_var("LOG_JSON", "true");

        let config = AppConfig::from_env().expect("Failed to load config");

        assert_eq!(config.jira_base_url, "https://jira.example.com/rest/api/2/");
        assert_eq!(config.jira_page_size, 100);
        assert_eq!(config.cache_ttl(), StdDuration::from_secs(60));
        assert_eq!(config.changelog_concurrency_limit, 4);
        assert_eq!(config.cors_origins, vec!["http://a.test", "http://b.test"]);
        assert!(config.log_json);

        clear();
    }

    #[test]
    #[serial]
    fn test_config_defaults() {
        clear();
        let config = AppConfig::from_env().expect("Failed to load config");

        assert_eq!(config.jira_base_url, DEFAULT_JIRA_BASE_URL);
        assert_eq!(config.jira_page_size, 1000);
        assert_eq!(config.cache_ttl_seconds, 1800);
        assert_eq!(config.request_timeout(), StdDuration::from_secs(30));
        assert_eq!(config.cors_origins.len(), 2);
    }

    #[test]
    #[serial]
    fn test_config_invalid_values() {
        clear();
        env::set_var("JIRA_PAGE_SIZE", "lots");
        assert!(AppConfig::from_env().is_err());

        env::set_var("JIRA_PAGE_SIZE", "0");
        assert!(AppConfig::from_env().is_err());

        clear();
    }
}
