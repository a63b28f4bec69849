//! Google Search Console search analytics client.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};
use ts_rs::TS;

use super::{
    config::SearchConsoleConfig,
    date_range::DateRange,
    google_api::{classify_google_error, fetch_access_token},
    vendor::{Platform, VendorError, map_reqwest_error},
};

pub const DEFAULT_ROW_LIMIT: u32 = 250;
pub const MAX_ROW_LIMIT: u32 = 25_000;

/// Search performance for one query string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct SearchQueryRecord {
    pub query: String,
    pub impressions: u64,
    pub clicks: u64,
    /// Click-through rate in percent.
    pub ctr: f64,
    /// Average ranking position, 1 is the top.
    pub position: f64,
}

impl SearchQueryRecord {
    pub fn new(query: impl Into<String>, impressions: u64, clicks: u64, ctr: f64, position: f64) -> Self {
        Self {
            query: query.into(),
            impressions,
            clicks,
            ctr,
            position,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchAnalyticsRow {
    #[serde(default)]
    keys: Vec<String>,
    #[serde(default)]
    clicks: f64,
    #[serde(default)]
    impressions: f64,
    #[serde(default)]
    ctr: f64,
    #[serde(default)]
    position: f64,
}

#[derive(Debug, Deserialize)]
struct SearchAnalyticsResponse {
    #[serde(default)]
    rows: Vec<SearchAnalyticsRow>,
}

impl From<SearchAnalyticsRow> for SearchQueryRecord {
    fn from(row: SearchAnalyticsRow) -> Self {
        SearchQueryRecord {
            query: row.keys.into_iter().next().unwrap_or_default(),
            impressions: row.impressions.max(0.0).round() as u64,
            clicks: row.clicks.max(0.0).round() as u64,
            ctr: row.ctr * 100.0,
            position: row.position,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchConsoleClient {
    http: Client,
    config: SearchConsoleConfig,
}

impl SearchConsoleClient {
    pub fn new(http: Client, config: SearchConsoleConfig) -> Self {
        Self { http, config }
    }

    pub fn is_configured(&self) -> bool {
        self.config.oauth.is_complete()
    }

    pub fn default_site_url(&self) -> Option<&str> {
        self.config.default_site_url.as_deref()
    }

    /// Per-query performance for a verified property, e.g. `https://luigis.example/`
    /// or `sc-domain:luigis.example`.
    pub async fn query_search_analytics(
        &self,
        site_url: &str,
        range: &DateRange,
        row_limit: u32,
    ) -> Result<Vec<SearchQueryRecord>, VendorError> {
        let platform = Platform::SearchConsole;
        if !self.is_configured() {
            return Err(VendorError::ConfigurationMissing { platform });
        }

        let access_token = fetch_access_token(&self.http, platform, &self.config.oauth).await?;
        let encoded_site: String = url::form_urlencoded::byte_serialize(site_url.as_bytes()).collect();
        let url = format!(
            "{}/sites/{}/searchAnalytics/query",
            self.config.api_url.trim_end_matches('/'),
            encoded_site
        );

        debug!(site_url = %site_url, since = %range.since, until = %range.until, "Querying Search Console");

        let res = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(&json!({
                "startDate": range.since_str(),
                "endDate": range.until_str(),
                "dimensions": ["query"],
                "rowLimit": row_limit.clamp(1, MAX_ROW_LIMIT),
                "startRow": 0,
            }))
            .send()
            .await
            .map_err(|e| map_reqwest_error(platform, e))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            let err = classify_google_error(platform, status, &body);
            warn!(site_url = %site_url, code = err.code(), error = %err, "Search Console request failed");
            return Err(err);
        }

        let payload: SearchAnalyticsResponse = res.json().await.map_err(|e| {
            VendorError::api(platform, None, format!("invalid search analytics response: {e}"))
        })?;
        Ok(payload
            .rows
            .into_iter()
            .map(SearchQueryRecord::from)
            .filter(|r| !r.query.is_empty())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use axum::{Json, Router, extract::Path, routing::post};
    use chrono::NaiveDate;
    use serde_json::{Value, json};

    use super::*;
    use crate::services::{google_api::GoogleOAuthCredentials, test_support::serve};

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 5, 31).unwrap(),
        )
        .unwrap()
    }

    fn client(base: &str, refresh_token: &str) -> SearchConsoleClient {
        SearchConsoleClient::new(
            Client::new(),
            SearchConsoleConfig {
                oauth: GoogleOAuthCredentials {
                    client_id: "id".to_string(),
                    client_secret: "secret".to_string(),
                    refresh_token: refresh_token.to_string(),
                    token_url: format!("{base}/token"),
                },
                default_site_url: None,
                api_url: base.to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_query_search_analytics_against_stub() {
        let router = Router::new()
            .route("/token", post(|| async { Json(json!({"access_token": "tok"})) }))
            .route(
                "/sites/{site}/searchAnalytics/query",
                post(|Path(site): Path<String>, Json(body): Json<Value>| async move {
                    assert_eq!(site, "https://luigis.example/");
                    assert_eq!(body["dimensions"][0], "query");
                    assert_eq!(body["startDate"], "2025-05-01");
                    Json(json!({
                        "rows": [
                            {"keys": ["luigis menu"], "clicks": 40.0, "impressions": 400.0, "ctr": 0.1, "position": 1.5},
                            {"keys": ["pizza near me"], "clicks": 12.0, "impressions": 900.0, "ctr": 0.0133, "position": 7.2}
                        ],
                        "responseAggregationType": "byProperty"
                    }))
                }),
            );
        let base = serve(router).await;

        let rows = client(&base, "refresh")
            .query_search_analytics("https://luigis.example/", &range(), DEFAULT_ROW_LIMIT)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].query, "luigis menu");
        assert_eq!(rows[0].impressions, 400);
        assert!((rows[0].ctr - 10.0).abs() < 1e-9);
        assert!((rows[1].position - 7.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_unconfigured_is_configuration_missing() {
        let err = client("http://127.0.0.1:9", "")
            .query_search_analytics("https://luigis.example/", &range(), 10)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CONFIGURATION_MISSING");
    }
}
