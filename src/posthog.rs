use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::time::Duration;
use tracing::info;

use crate::error::DigestError;
use crate::types::{Config, MetricWindow, Project};

/// Per-request timeout so one slow project delays the run instead of
/// wedging it.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Which distinct-user count a trends query should compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveUserKind {
    Daily,
    Weekly,
    Monthly,
}

impl ActiveUserKind {
    fn math(&self) -> &'static str {
        match self {
            ActiveUserKind::Daily => "dau",
            ActiveUserKind::Weekly => "weekly_active",
            ActiveUserKind::Monthly => "monthly_active",
        }
    }
}

/// Read-only access to the analytics provider.
///
/// The collector is generic over this trait so the pipeline can run against
/// an in-memory source in tests.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// All projects reachable with the credential, ordered by provider id.
    async fn list_projects(&self) -> Result<Vec<Project>, DigestError>;

    /// Highest-volume custom event names over `window`, excluding
    /// provider-internal events, at most `limit` of them.
    async fn top_events(
        &self,
        project_id: &str,
        window: MetricWindow,
        limit: usize,
    ) -> Result<Vec<String>, DigestError>;

    async fn active_users(
        &self,
        project_id: &str,
        kind: ActiveUserKind,
        window: MetricWindow,
    ) -> Result<u64, DigestError>;

    /// Total pageviews plus the top pages (path, views) over `window`.
    async fn pageviews(
        &self,
        project_id: &str,
        window: MetricWindow,
    ) -> Result<(u64, Vec<(String, u64)>), DigestError>;

    /// Occurrences of one event over `window`; zero occurrences is `0`,
    /// not an error.
    async fn event_count(
        &self,
        project_id: &str,
        event: &str,
        window: MetricWindow,
    ) -> Result<u64, DigestError>;
}

/// HTTP client for the PostHog query API (regional endpoint).
pub struct PostHogClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl PostHogClient {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_base_url(&config.posthog_api_key, config.region.base_url())
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build PostHog HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    async fn query(&self, project_id: &str, query: Value) -> Result<Value, DigestError> {
        let url = format!("{}/api/projects/{}/query/", self.base_url, project_id);
        let res = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({ "query": query }))
            .send()
            .await
            .map_err(|e| DigestError::project_fetch(project_id, e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(DigestError::project_fetch(
                project_id,
                format!("API error {}: {}", status.as_u16(), snippet),
            ));
        }
        res.json()
            .await
            .map_err(|e| DigestError::project_fetch(project_id, e.to_string()))
    }
}

fn hogql_timestamp(t: chrono::DateTime<chrono::Utc>) -> String {
    t.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[derive(Debug, Deserialize)]
struct TrendsResponse {
    #[serde(default)]
    results: Vec<TrendSeries>,
}

#[derive(Debug, Deserialize)]
struct TrendSeries {
    #[serde(default)]
    data: Vec<f64>,
}

/// Last data point of a trends series, or 0 when the series is empty.
fn extract_trend_value(result: Value) -> u64 {
    serde_json::from_value::<TrendsResponse>(result)
        .ok()
        .and_then(|r| r.results.into_iter().next())
        .and_then(|s| s.data.last().copied())
        .map(|v| v.max(0.0) as u64)
        .unwrap_or(0)
}

/// Provider ids are numeric; compare them as numbers so report order is
/// stable across pages instead of lexical.
fn compare_project_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

#[async_trait]
impl MetricsSource for PostHogClient {
    async fn list_projects(&self) -> Result<Vec<Project>, DigestError> {
        let url = format!("{}/api/projects/", self.base_url);
        let res = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| DigestError::Discovery(e.to_string()))?;

        let status = res.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            let body = res.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(DigestError::Authentication(format!(
                "HTTP {}: {}",
                status.as_u16(),
                snippet
            )));
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(DigestError::Discovery(format!(
                "failed to list projects: HTTP {} - {}",
                status.as_u16(),
                snippet
            )));
        }

        let data: Value = res
            .json()
            .await
            .map_err(|e| DigestError::Discovery(e.to_string()))?;

        // The endpoint returns either a paginated object or a bare array.
        let results = data
            .get("results")
            .and_then(|r| r.as_array())
            .or_else(|| data.as_array())
            .cloned()
            .unwrap_or_default();

        let mut projects = Vec::new();
        for item in results {
            let id = match item.get("id") {
                Some(Value::Number(n)) => n.to_string(),
                Some(Value::String(s)) if !s.is_empty() => s.clone(),
                _ => continue,
            };
            let display_name = item
                .get("name")
                .and_then(|n| n.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| format!("Project {}", id));
            info!("discovered project: {} (id {})", display_name, id);
            projects.push(Project { id, display_name });
        }
        projects.sort_by(|a, b| compare_project_ids(&a.id, &b.id));
        Ok(projects)
    }

    async fn top_events(
        &self,
        project_id: &str,
        window: MetricWindow,
        limit: usize,
    ) -> Result<Vec<String>, DigestError> {
        let sql = format!(
            "SELECT event, count() AS count \
             FROM events \
             WHERE timestamp >= toDateTime('{}') \
               AND timestamp < toDateTime('{}') \
               AND event NOT LIKE '$%' \
               AND event NOT LIKE '!%' \
             GROUP BY event \
             ORDER BY count DESC \
             LIMIT {}",
            hogql_timestamp(window.start),
            hogql_timestamp(window.end),
            limit
        );
        let result = self
            .query(project_id, json!({ "kind": "HogQLQuery", "query": sql }))
            .await?;

        let rows = result
            .get("results")
            .and_then(|r| r.as_array())
            .cloned()
            .unwrap_or_default();
        let events: Vec<String> = rows
            .iter()
            .filter_map(|row| row.get(0))
            .filter_map(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .take(limit)
            .map(str::to_string)
            .collect();
        Ok(events)
    }

    async fn active_users(
        &self,
        project_id: &str,
        kind: ActiveUserKind,
        window: MetricWindow,
    ) -> Result<u64, DigestError> {
        let query = json!({
            "kind": "TrendsQuery",
            "series": [{ "kind": "EventsNode", "event": "$pageview", "math": kind.math() }],
            "dateRange": {
                "date_from": window.start.to_rfc3339(),
                "date_to": window.end.to_rfc3339(),
            },
        });
        let result = self.query(project_id, query).await?;
        Ok(extract_trend_value(result))
    }

    async fn pageviews(
        &self,
        project_id: &str,
        window: MetricWindow,
    ) -> Result<(u64, Vec<(String, u64)>), DigestError> {
        let sql = format!(
            "SELECT properties.$current_url AS page, count() AS views \
             FROM events \
             WHERE event = '$pageview' \
               AND timestamp >= toDateTime('{}') \
               AND timestamp < toDateTime('{}') \
             GROUP BY page \
             ORDER BY views DESC \
             LIMIT 10",
            hogql_timestamp(window.start),
            hogql_timestamp(window.end),
        );
        let result = self
            .query(project_id, json!({ "kind": "HogQLQuery", "query": sql }))
            .await?;

        let rows = result
            .get("results")
            .and_then(|r| r.as_array())
            .cloned()
            .unwrap_or_default();

        let mut total = 0u64;
        let mut top_pages = Vec::new();
        for row in &rows {
            let views = row.get(1).and_then(|v| v.as_u64()).unwrap_or(0);
            total += views;
            if top_pages.len() < crate::types::TOP_PAGES_CAP {
                if let Some(page) = row.get(0).and_then(|v| v.as_str()).filter(|p| !p.is_empty())
                {
                    let path: String = page.chars().take(50).collect();
                    top_pages.push((path, views));
                }
            }
        }
        Ok((total, top_pages))
    }

    async fn event_count(
        &self,
        project_id: &str,
        event: &str,
        window: MetricWindow,
    ) -> Result<u64, DigestError> {
        let query = json!({
            "kind": "TrendsQuery",
            "series": [{ "kind": "EventsNode", "event": event, "math": "total" }],
            "dateRange": {
                "date_from": window.start.to_rfc3339(),
                "date_to": window.end.to_rfc3339(),
            },
        });
        let result = self.query(project_id, query).await?;
        Ok(extract_trend_value(result))
    }
}
