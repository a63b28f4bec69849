//! Meta (Facebook/Instagram) Marketing API adapter.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::{AdMetricRecord, AdPlatform, VendorInsight, cost_per_click, ctr_percent};
use crate::services::{
    config::MetaAdsConfig,
    date_range::DateRange,
    vendor::{Numeric, Platform, VendorError, classify_status, map_reqwest_error, opt_u64},
};

const INSIGHT_FIELDS: &str =
    "campaign_name,impressions,clicks,spend,reach,frequency,ctr,cpc,actions";

/// `paging.next` links followed per query before giving up.
const MAX_PAGES: usize = 20;

/// Action types counted as conversions.
const CONVERSION_ACTIONS: &[&str] = &[
    "lead",
    "purchase",
    "complete_registration",
    "offsite_conversion.fb_pixel_lead",
    "offsite_conversion.fb_pixel_purchase",
    "offsite_conversion.fb_pixel_complete_registration",
    "onsite_conversion.lead_grouped",
];

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MetaAction {
    pub action_type: String,
    pub value: Numeric,
}

/// One row of the Graph API insights edge. Numbers arrive as strings.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct MetaInsightRow {
    #[serde(default)]
    pub campaign_name: Option<String>,
    #[serde(default)]
    pub publisher_platform: Option<String>,
    #[serde(default)]
    pub impressions: Option<Numeric>,
    #[serde(default)]
    pub clicks: Option<Numeric>,
    #[serde(default)]
    pub spend: Option<Numeric>,
    #[serde(default)]
    pub reach: Option<Numeric>,
    #[serde(default)]
    pub frequency: Option<Numeric>,
    #[serde(default)]
    pub ctr: Option<Numeric>,
    #[serde(default)]
    pub cpc: Option<Numeric>,
    #[serde(default)]
    pub actions: Vec<MetaAction>,
}

impl MetaInsightRow {
    pub fn conversions(&self) -> u64 {
        self.actions
            .iter()
            .filter(|a| CONVERSION_ACTIONS.contains(&a.action_type.as_str()))
            .map(|a| a.value.as_u64())
            .sum()
    }

    pub fn normalize(&self) -> AdMetricRecord {
        let impressions = opt_u64(&self.impressions);
        let clicks = opt_u64(&self.clicks);
        let spend = self.spend.as_ref().map(Numeric::as_decimal).unwrap_or_default();
        let ctr = match &self.ctr {
            Some(ctr) => ctr.as_f64(),
            None => ctr_percent(clicks, impressions),
        };
        let cpc = match &self.cpc {
            Some(cpc) => cpc.as_f64(),
            None => cost_per_click(spend, clicks),
        };
        let label = self
            .campaign_name
            .clone()
            .or_else(|| self.publisher_platform.clone())
            .unwrap_or_else(|| "Account".to_string());

        AdMetricRecord {
            platform: Platform::MetaAds,
            label,
            impressions,
            clicks,
            spend,
            conversions: self.conversions(),
            ctr,
            cpc,
            reach: self.reach.as_ref().map(Numeric::as_u64),
            frequency: self.frequency.as_ref().map(Numeric::as_f64),
        }
    }
}

#[derive(Debug, Deserialize)]
struct InsightsResponse {
    #[serde(default)]
    data: Vec<MetaInsightRow>,
    #[serde(default)]
    paging: Paging,
}

#[derive(Debug, Default, Deserialize)]
struct Paging {
    /// Absolute URL of the next page, absent on the last one.
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphErrorEnvelope {
    error: GraphError,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<i64>,
}

/// Map a Graph API error to the vendor taxonomy. Scope problems are checked
/// first since Meta reports them with several different codes.
pub fn classify_meta_error(status: reqwest::StatusCode, body: &str) -> VendorError {
    let platform = Platform::MetaAds;
    let parsed = serde_json::from_str::<GraphErrorEnvelope>(body).ok();
    let message = parsed
        .as_ref()
        .map(|e| e.error.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.chars().take(500).collect());
    let code = parsed.as_ref().and_then(|e| e.error.code);
    let lower = message.to_lowercase();

    if lower.contains("ads_management")
        || lower.contains("ads_read")
        || lower.contains("permission")
        || matches!(code, Some(10) | Some(200..=299))
    {
        return VendorError::Permission { platform, message };
    }
    if matches!(code, Some(102) | Some(190))
        || lower.contains("access token")
        || lower.contains("session has expired")
    {
        return VendorError::Authentication { platform, message };
    }
    match code {
        Some(_) => VendorError::api(platform, Some(status.as_u16()), message),
        None => classify_status(platform, status, message),
    }
}

/// Prefix bare numeric ids with `act_`.
pub fn normalize_account_id(account: &str) -> String {
    let account = account.trim();
    if account.starts_with("act_") {
        account.to_string()
    } else {
        format!("act_{account}")
    }
}

#[derive(Debug, Clone)]
pub struct MetaAdsClient {
    http: Client,
    config: MetaAdsConfig,
}

impl MetaAdsClient {
    pub fn new(http: Client, config: MetaAdsConfig) -> Self {
        Self { http, config }
    }

    pub fn default_account(&self) -> Option<&str> {
        self.config.default_account_id.as_deref()
    }

    async fn query_insights(
        &self,
        account: &str,
        range: &DateRange,
        params: &[(&str, &str)],
    ) -> Result<Vec<MetaInsightRow>, VendorError> {
        let account = normalize_account_id(account);
        let url = format!("{}/{}/insights", self.config.api_url.trim_end_matches('/'), account);
        let time_range = json!({ "since": range.since_str(), "until": range.until_str() }).to_string();

        debug!(account = %account, since = %range.since, until = %range.until, "Fetching Meta insights");

        let mut request = self
            .http
            .get(&url)
            .query(&[
                ("access_token", self.config.access_token.as_str()),
                ("time_range", time_range.as_str()),
                ("limit", "500"),
            ])
            .query(params);

        let mut rows = Vec::new();
        for page in 1..=MAX_PAGES {
            let payload = self.fetch_page(&account, request).await?;
            rows.extend(payload.data);
            match payload.paging.next {
                Some(next) if page < MAX_PAGES => request = self.http.get(next),
                Some(_) => {
                    warn!(account = %account, pages = MAX_PAGES, rows = rows.len(), "Meta insights truncated, more pages available");
                    break;
                }
                None => break,
            }
        }
        Ok(rows)
    }

    async fn fetch_page(
        &self,
        account: &str,
        request: RequestBuilder,
    ) -> Result<InsightsResponse, VendorError> {
        let res = request
            .send()
            .await
            .map_err(|e| map_reqwest_error(Platform::MetaAds, e))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            let err = classify_meta_error(status, &body);
            warn!(account = %account, code = err.code(), error = %err, "Meta insights request failed");
            return Err(err);
        }

        res.json().await.map_err(|e| {
            VendorError::api(Platform::MetaAds, None, format!("invalid insights response: {e}"))
        })
    }
}

#[async_trait]
impl AdPlatform for MetaAdsClient {
    fn platform(&self) -> Platform {
        Platform::MetaAds
    }

    fn is_configured(&self) -> bool {
        !self.config.access_token.trim().is_empty()
    }

    async fn fetch_insights(
        &self,
        account: &str,
        range: &DateRange,
    ) -> Result<Vec<VendorInsight>, VendorError> {
        let rows = self
            .query_insights(account, range, &[("level", "campaign"), ("fields", INSIGHT_FIELDS)])
            .await?;
        Ok(rows.into_iter().map(VendorInsight::MetaAds).collect())
    }

    async fn fetch_breakdown(
        &self,
        account: &str,
        range: &DateRange,
    ) -> Result<Vec<VendorInsight>, VendorError> {
        let rows = self
            .query_insights(
                account,
                range,
                &[
                    ("level", "account"),
                    ("fields", "impressions,clicks,spend,reach,ctr,cpc,actions"),
                    ("breakdowns", "publisher_platform"),
                ],
            )
            .await?;
        Ok(rows.into_iter().map(VendorInsight::MetaAds).collect())
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        Json, Router,
        extract::Query,
        http::{HeaderMap, StatusCode},
        routing::get,
    };
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use serde_json::{Value, json};
    use std::collections::HashMap;

    use super::*;
    use crate::services::test_support::serve;

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 5, 31).unwrap(),
        )
        .unwrap()
    }

    fn client(api_url: String, token: &str) -> MetaAdsClient {
        MetaAdsClient::new(
            Client::new(),
            MetaAdsConfig {
                access_token: token.to_string(),
                api_url,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_normalize_graph_row() {
        let row: MetaInsightRow = serde_json::from_value(json!({
            "campaign_name": "Summer Patio",
            "impressions": "12400",
            "clicks": "310",
            "spend": "152.37",
            "reach": "8100",
            "frequency": "1.53",
            "ctr": "2.5",
            "cpc": "0.49",
            "actions": [
                {"action_type": "link_click", "value": "310"},
                {"action_type": "lead", "value": "12"},
                {"action_type": "offsite_conversion.fb_pixel_purchase", "value": "3"}
            ],
            "date_start": "2025-05-01",
            "date_stop": "2025-05-31"
        }))
        .unwrap();

        let record = VendorInsight::MetaAds(row).normalize();
        assert_eq!(record.platform, Platform::MetaAds);
        assert_eq!(record.label, "Summer Patio");
        assert_eq!(record.impressions, 12_400);
        assert_eq!(record.clicks, 310);
        assert_eq!(record.spend, Decimal::new(15237, 2));
        assert_eq!(record.conversions, 15);
        assert_eq!(record.reach, Some(8_100));
        assert_eq!(record.frequency, Some(1.53));
        assert!((record.ctr - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_missing_rates_are_derived() {
        let row = MetaInsightRow {
            impressions: Some(Numeric::Text("1000".into())),
            clicks: Some(Numeric::Text("20".into())),
            spend: Some(Numeric::Text("10".into())),
            ..Default::default()
        };
        let record = row.normalize();
        assert!((record.ctr - 2.0).abs() < 1e-9);
        assert!((record.cpc - 0.5).abs() < 1e-9);
        assert_eq!(record.reach, None);
        assert_eq!(record.label, "Account");
    }

    #[test]
    fn test_classify_meta_errors() {
        let body = r#"{"error":{"message":"(#200) Ad account owner has NOT grant ads_management or ads_read permission","type":"OAuthException","code":200}}"#;
        let err = classify_meta_error(reqwest::StatusCode::FORBIDDEN, body);
        assert_eq!(err.code(), "PERMISSION_ERROR");
        assert!(!err.solution().is_empty());

        let body = r#"{"error":{"message":"Error validating access token: Session has expired","type":"OAuthException","code":190}}"#;
        let err = classify_meta_error(reqwest::StatusCode::BAD_REQUEST, body);
        assert_eq!(err.code(), "AUTHENTICATION_ERROR");

        let body = r#"{"error":{"message":"Unsupported get request","type":"GraphMethodException","code":100}}"#;
        let err = classify_meta_error(reqwest::StatusCode::BAD_REQUEST, body);
        assert_eq!(err.code(), "API_ERROR");
    }

    #[test]
    fn test_normalize_account_id() {
        assert_eq!(normalize_account_id("123"), "act_123");
        assert_eq!(normalize_account_id(" act_123 "), "act_123");
    }

    #[test]
    fn test_is_configured() {
        assert!(!client("http://localhost".into(), " ").is_configured());
        assert!(client("http://localhost".into(), "EAAB").is_configured());
    }

    #[tokio::test]
    async fn test_get_insights_against_stub() {
        let base = serve(Router::new().route(
            "/{account}/insights",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(params.get("access_token").map(String::as_str), Some("EAAB"));
                assert_eq!(params.get("level").map(String::as_str), Some("campaign"));
                let time_range: Value =
                    serde_json::from_str(params.get("time_range").unwrap()).unwrap();
                assert_eq!(time_range["since"], "2025-05-01");
                Json(json!({
                    "data": [
                        {"campaign_name": "Brunch", "impressions": "500", "clicks": "25", "spend": "12.50"},
                        {"campaign_name": "Happy Hour", "impressions": "700", "clicks": "14", "spend": "7.00"}
                    ],
                    "paging": {"cursors": {}}
                }))
            }),
        ))
        .await;

        let records = client(base, "EAAB")
            .get_insights("123", &range())
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].label, "Brunch");
        assert_eq!(records[1].spend, Decimal::new(700, 2));
    }

    #[tokio::test]
    async fn test_follows_paging_next() {
        let base = serve(Router::new().route(
            "/{account}/insights",
            get(|headers: HeaderMap, Query(params): Query<HashMap<String, String>>| async move {
                match params.get("after").map(String::as_str) {
                    None => {
                        let host = headers["host"].to_str().unwrap();
                        Json(json!({
                            "data": [{"campaign_name": "Brunch", "impressions": "500", "clicks": "25"}],
                            "paging": {"next": format!("http://{host}/act_123/insights?access_token=EAAB&after=p2")}
                        }))
                    }
                    Some("p2") => Json(json!({
                        "data": [{"campaign_name": "Catering", "impressions": "90", "clicks": "3"}],
                        "paging": {"cursors": {"before": "p2"}}
                    })),
                    Some(other) => panic!("unexpected cursor {other}"),
                }
            }),
        ))
        .await;

        let records = client(base, "EAAB")
            .get_insights("123", &range())
            .await
            .unwrap();
        let labels: Vec<_> = records.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["Brunch", "Catering"]);
    }

    #[tokio::test]
    async fn test_permission_error_from_stub() {
        let base = serve(Router::new().route(
            "/{account}/insights",
            get(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"error": {"message": "(#200) Requires ads_management permission", "code": 200}})),
                )
            }),
        ))
        .await;

        let err = client(base, "EAAB")
            .get_insights("act_123", &range())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PERMISSION_ERROR");
    }

    #[tokio::test]
    async fn test_unconfigured_client_does_not_call_network() {
        let err = client("http://127.0.0.1:9".into(), "")
            .get_insights("act_123", &range())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            VendorError::ConfigurationMissing {
                platform: Platform::MetaAds
            }
        );
    }
}
