pub mod buckets;
pub mod cache;
pub mod changelog;
pub mod config;
pub mod dates;
pub mod error;
pub mod fetcher;
pub mod jira;
pub mod metrics;
pub mod querier;
pub mod query;
pub mod status;
pub mod types;

use axum::{
    extract::{Path, State},
    http::{HeaderValue, StatusCode},
    routing::get,
    Json, Router,
};
use cache::MokaResponseCache;
use config::AppConfig;
use error::UpstreamError;
use jira::{IssueTracker, JiraClient};
use querier::AnalyticsQuerier;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use types::ProjectKey;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

/// Shared application state accessible to all request handlers.
pub struct AppState {
    /// Service computing the analytics reports.
    pub querier: AnalyticsQuerier,
    /// Application configuration loaded from environment variables.
    pub config: AppConfig,
}

impl AppState {
    /// Initializes the application state with a cached Jira client.
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let cache = Arc::new(MokaResponseCache::new(config.cache_max_capacity));
        let client = JiraClient::new(&config, cache)?;
        Ok(Self::with_tracker(config, Arc::new(client)))
    }

    /// Builds the state around an arbitrary tracker implementation.
    pub fn with_tracker(config: AppConfig, tracker: Arc<dyn IssueTracker>) -> Self {
        let querier = AnalyticsQuerier::new(tracker, &config);
        Self { querier, config }
    }
}

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

pub fn create_app(state: Arc<AppState>) -> Router {
    let serve_dir = ServeDir::new("dist").not_found_service(ServeFile::new("dist/index.html"));

    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_check))
        .route(
            "/api/jira-analytics/{project_key}/open-time-histogram",
            get(get_open_time_histogram),
        )
        .route(
            "/api/jira-analytics/{project_key}/status-time-distribution",
            get(get_status_time_distribution),
        )
        .route(
            "/api/jira-analytics/{project_key}/daily-task-flow",
            get(get_daily_task_flow),
        )
        .route("/api/jira-analytics/{project_key}/top-users", get(get_top_users))
        .route(
            "/api/jira-analytics/{project_key}/priority-distribution",
            get(get_priority_distribution),
        )
        .route(
            "/api/jira-analytics/{project_key}/worklog-histogram",
            get(get_worklog_histogram),
        )
        .fallback_service(serve_dir)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "jira-analytics",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Logs a report outcome and maps upstream failures to an HTTP status.
fn respond<T>(project_key: &ProjectKey, report: &str, result: Result<T, UpstreamError>) -> ApiResult<T> {
    match result {
        Ok(value) => {
            tracing::debug!(project_key = %project_key, report, "Returning report");
            Ok(Json(value))
        }
        Err(e) => {
            tracing::error!(project_key = %project_key, report, "Failed to build report: {}", e);

            let failure = match e.status() {
                Some(404) => (StatusCode::NOT_FOUND, "Project Not Found".to_string()),
                Some(429) => (
                    StatusCode::TOO_MANY_REQUESTS,
                    "Jira Rate Limit Exceeded".to_string(),
                ),
                Some(status @ (401 | 403)) => (
                    StatusCode::BAD_GATEWAY,
                    format!("Jira rejected the request credentials (HTTP {status})"),
                ),
                _ => (
                    StatusCode::BAD_GATEWAY,
                    "Upstream Jira request failed".to_string(),
                ),
            };
            Err(failure)
        }
    }
}

pub async fn get_open_time_histogram(
    Path(project_key): Path<ProjectKey>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<metrics::OpenTimeHistogramReport> {
    let result = state.querier.open_time_histogram(&project_key).await;
    respond(&project_key, "open-time-histogram", result)
}

pub async fn get_status_time_distribution(
    Path(project_key): Path<ProjectKey>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<metrics::StatusTimeDistributionReport> {
    let result = state.querier.status_time_distribution(&project_key).await;
    respond(&project_key, "status-time-distribution", result)
}

pub async fn get_daily_task_flow(
    Path(project_key): Path<ProjectKey>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<metrics::DailyTaskFlowReport> {
    let result = state.querier.daily_task_flow(&project_key).await;
    respond(&project_key, "daily-task-flow", result)
}

pub async fn get_top_users(
    Path(project_key): Path<ProjectKey>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<metrics::TopUsersReport> {
    let result = state.querier.top_contributors(&project_key).await;
    respond(&project_key, "top-users", result)
}

pub async fn get_priority_distribution(
    Path(project_key): Path<ProjectKey>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<metrics::PriorityDistributionReport> {
    let result = state.querier.priority_distribution(&project_key).await;
    respond(&project_key, "priority-distribution", result)
}

pub async fn get_worklog_histogram(
    Path(project_key): Path<ProjectKey>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<metrics::WorklogHistogramReport> {
    let result = state.querier.worklog_histogram(&project_key).await;
    respond(&project_key, "worklog-histogram", result)
}
