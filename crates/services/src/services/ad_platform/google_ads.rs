//! Google Ads API adapter (REST `googleAds:search` with GAQL).

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::{AdMetricRecord, AdPlatform, VendorInsight, cost_per_click, ctr_percent};
use crate::services::{
    config::GoogleAdsConfig,
    date_range::DateRange,
    google_api::{classify_google_error, fetch_access_token},
    vendor::{Numeric, Platform, VendorError, map_reqwest_error, opt_f64, opt_u64},
};

const MICROS_PER_UNIT: i64 = 1_000_000;
/// Result pages requested per query before giving up.
const MAX_PAGES: usize = 20;

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleAdsCampaign {
    #[serde(default)]
    pub id: Option<Numeric>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleAdsMetrics {
    #[serde(default)]
    pub impressions: Option<Numeric>,
    #[serde(default)]
    pub clicks: Option<Numeric>,
    #[serde(default)]
    pub cost_micros: Option<Numeric>,
    #[serde(default)]
    pub conversions: Option<Numeric>,
    /// Ratio, not percent.
    #[serde(default)]
    pub ctr: Option<Numeric>,
    #[serde(default)]
    pub average_cpc: Option<Numeric>,
}

/// One `GoogleAdsRow` from the search response.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleAdsRow {
    #[serde(default)]
    pub campaign: GoogleAdsCampaign,
    #[serde(default)]
    pub metrics: GoogleAdsMetrics,
}

fn micros_to_units(micros: &Numeric) -> Decimal {
    micros.as_decimal() / Decimal::from(MICROS_PER_UNIT)
}

impl GoogleAdsRow {
    pub fn normalize(&self) -> AdMetricRecord {
        let metrics = &self.metrics;
        let impressions = opt_u64(&metrics.impressions);
        let clicks = opt_u64(&metrics.clicks);
        let spend = metrics
            .cost_micros
            .as_ref()
            .map(micros_to_units)
            .unwrap_or_default();
        let ctr = match &metrics.ctr {
            Some(_) => opt_f64(&metrics.ctr) * 100.0,
            None => ctr_percent(clicks, impressions),
        };
        let cpc = match &metrics.average_cpc {
            Some(_) => opt_f64(&metrics.average_cpc) / MICROS_PER_UNIT as f64,
            None => cost_per_click(spend, clicks),
        };
        let label = self.campaign.name.clone().unwrap_or_else(|| {
            self.campaign
                .id
                .as_ref()
                .map(|id| format!("Campaign {}", id.as_u64()))
                .unwrap_or_else(|| "Account".to_string())
        });

        AdMetricRecord {
            platform: Platform::GoogleAds,
            label,
            impressions,
            clicks,
            spend,
            conversions: opt_u64(&metrics.conversions),
            ctr,
            cpc,
            reach: None,
            frequency: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    results: Vec<GoogleAdsRow>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// `123-456-7890` → `1234567890`.
pub fn normalize_customer_id(customer_id: &str) -> String {
    customer_id.chars().filter(char::is_ascii_digit).collect()
}

pub fn campaign_query(range: &DateRange) -> String {
    format!(
        "SELECT campaign.id, campaign.name, metrics.impressions, metrics.clicks, \
         metrics.cost_micros, metrics.conversions, metrics.ctr, metrics.average_cpc \
         FROM campaign \
         WHERE segments.date BETWEEN '{}' AND '{}' AND campaign.status != 'REMOVED' \
         ORDER BY metrics.impressions DESC",
        range.since_str(),
        range.until_str()
    )
}

#[derive(Debug, Clone)]
pub struct GoogleAdsClient {
    http: Client,
    config: GoogleAdsConfig,
}

impl GoogleAdsClient {
    pub fn new(http: Client, config: GoogleAdsConfig) -> Self {
        Self { http, config }
    }

    pub fn default_account(&self) -> Option<&str> {
        self.config.default_customer_id.as_deref()
    }

    async fn search_page(
        &self,
        url: &str,
        access_token: &str,
        customer_id: &str,
        body: &Value,
    ) -> Result<SearchResponse, VendorError> {
        let mut request = self
            .http
            .post(url)
            .bearer_auth(access_token)
            .header("developer-token", &self.config.developer_token)
            .json(body);
        if let Some(login_customer_id) = &self.config.login_customer_id {
            request = request.header("login-customer-id", normalize_customer_id(login_customer_id));
        }

        let res = request
            .send()
            .await
            .map_err(|e| map_reqwest_error(Platform::GoogleAds, e))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            let err = classify_google_error(Platform::GoogleAds, status, &body);
            warn!(customer_id = %customer_id, code = err.code(), error = %err, "Google Ads request failed");
            return Err(err);
        }

        res.json().await.map_err(|e| {
            VendorError::api(Platform::GoogleAds, None, format!("invalid search response: {e}"))
        })
    }
}

#[async_trait]
impl AdPlatform for GoogleAdsClient {
    fn platform(&self) -> Platform {
        Platform::GoogleAds
    }

    fn is_configured(&self) -> bool {
        !self.config.developer_token.trim().is_empty() && self.config.oauth.is_complete()
    }

    async fn fetch_insights(
        &self,
        account: &str,
        range: &DateRange,
    ) -> Result<Vec<VendorInsight>, VendorError> {
        let customer_id = normalize_customer_id(account);
        let access_token =
            fetch_access_token(&self.http, Platform::GoogleAds, &self.config.oauth).await?;
        let url = format!(
            "{}/customers/{}/googleAds:search",
            self.config.api_url.trim_end_matches('/'),
            customer_id
        );

        debug!(customer_id = %customer_id, since = %range.since, until = %range.until, "Fetching Google Ads campaigns");

        let query = campaign_query(range);
        let mut rows = Vec::new();
        let mut page_token: Option<String> = None;
        for page in 1..=MAX_PAGES {
            let mut body = json!({ "query": query });
            if let Some(token) = &page_token {
                body["pageToken"] = json!(token);
            }
            let payload = self
                .search_page(&url, &access_token, &customer_id, &body)
                .await?;
            rows.extend(payload.results);
            match payload.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) if page < MAX_PAGES => page_token = Some(token),
                Some(_) => {
                    warn!(customer_id = %customer_id, pages = MAX_PAGES, rows = rows.len(), "Google Ads results truncated, more pages available");
                    break;
                }
                None => break,
            }
        }
        Ok(rows
            .into_iter()
            .map(VendorInsight::GoogleAds)
            .collect())
    }
}
