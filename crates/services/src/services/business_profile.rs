//! Google Business Profile performance client.

use chrono::{Datelike, NaiveDate};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use ts_rs::TS;

use super::{
    config::BusinessProfileConfig,
    date_range::DateRange,
    google_api::{classify_google_error, fetch_access_token},
    vendor::{Numeric, Platform, VendorError, map_reqwest_error},
};

const DAILY_METRICS: &[&str] = &[
    "BUSINESS_IMPRESSIONS_DESKTOP_MAPS",
    "BUSINESS_IMPRESSIONS_DESKTOP_SEARCH",
    "BUSINESS_IMPRESSIONS_MOBILE_MAPS",
    "BUSINESS_IMPRESSIONS_MOBILE_SEARCH",
    "WEBSITE_CLICKS",
    "CALL_CLICKS",
    "BUSINESS_DIRECTION_REQUESTS",
    "BUSINESS_CONVERSATIONS",
    "BUSINESS_BOOKINGS",
    "BUSINESS_FOOD_ORDERS",
];

/// Totals over the requested window for one location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct BusinessProfileMetrics {
    pub impressions_maps: u64,
    pub impressions_search: u64,
    pub website_clicks: u64,
    pub call_clicks: u64,
    pub direction_requests: u64,
    pub conversations: u64,
    pub bookings: u64,
    pub food_orders: u64,
}

impl BusinessProfileMetrics {
    pub fn total_impressions(&self) -> u64 {
        self.impressions_maps + self.impressions_search
    }

    /// Customer actions: website, call and direction clicks plus bookings and orders.
    pub fn total_actions(&self) -> u64 {
        self.website_clicks
            + self.call_clicks
            + self.direction_requests
            + self.conversations
            + self.bookings
            + self.food_orders
    }

    fn add(&mut self, metric: &str, value: u64) {
        match metric {
            "BUSINESS_IMPRESSIONS_DESKTOP_MAPS" | "BUSINESS_IMPRESSIONS_MOBILE_MAPS" => {
                self.impressions_maps += value
            }
            "BUSINESS_IMPRESSIONS_DESKTOP_SEARCH" | "BUSINESS_IMPRESSIONS_MOBILE_SEARCH" => {
                self.impressions_search += value
            }
            "WEBSITE_CLICKS" => self.website_clicks += value,
            "CALL_CLICKS" => self.call_clicks += value,
            "BUSINESS_DIRECTION_REQUESTS" => self.direction_requests += value,
            "BUSINESS_CONVERSATIONS" => self.conversations += value,
            "BUSINESS_BOOKINGS" => self.bookings += value,
            "BUSINESS_FOOD_ORDERS" => self.food_orders += value,
            _ => {}
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatedValue {
    /// Omitted by the API when the value is zero.
    #[serde(default)]
    value: Option<Numeric>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimeSeries {
    #[serde(default)]
    dated_values: Vec<DatedValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DailyMetricTimeSeries {
    daily_metric: String,
    #[serde(default)]
    time_series: TimeSeries,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MultiDailyMetricTimeSeries {
    #[serde(default)]
    daily_metric_time_series: Vec<DailyMetricTimeSeries>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FetchMultiResponse {
    #[serde(default)]
    multi_daily_metric_time_series: Vec<MultiDailyMetricTimeSeries>,
}

fn sum_response(response: FetchMultiResponse) -> BusinessProfileMetrics {
    let mut metrics = BusinessProfileMetrics::default();
    for series in response
        .multi_daily_metric_time_series
        .iter()
        .flat_map(|m| &m.daily_metric_time_series)
    {
        let total: u64 = series
            .time_series
            .dated_values
            .iter()
            .filter_map(|d| d.value.as_ref())
            .map(Numeric::as_u64)
            .sum();
        metrics.add(&series.daily_metric, total);
    }
    metrics
}

fn date_params(prefix: &str, date: NaiveDate) -> [(String, String); 3] {
    [
        (format!("{prefix}.year"), date.year().to_string()),
        (format!("{prefix}.month"), date.month().to_string()),
        (format!("{prefix}.day"), date.day().to_string()),
    ]
}

/// Accepts `locations/123` or `123`.
pub fn normalize_location_id(location_id: &str) -> String {
    location_id
        .trim()
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

#[derive(Debug, Clone)]
pub struct BusinessProfileClient {
    http: Client,
    config: BusinessProfileConfig,
}

impl BusinessProfileClient {
    pub fn new(http: Client, config: BusinessProfileConfig) -> Self {
        Self { http, config }
    }

    pub fn is_configured(&self) -> bool {
        self.config.oauth.is_complete()
    }

    pub fn default_location(&self) -> Option<&str> {
        self.config.default_location_id.as_deref()
    }

    pub async fn fetch_performance(
        &self,
        location_id: &str,
        range: &DateRange,
    ) -> Result<BusinessProfileMetrics, VendorError> {
        let platform = Platform::BusinessProfile;
        if !self.is_configured() {
            return Err(VendorError::ConfigurationMissing { platform });
        }

        let location = normalize_location_id(location_id);
        let access_token = fetch_access_token(&self.http, platform, &self.config.oauth).await?;
        let url = format!(
            "{}/locations/{}:fetchMultiDailyMetricsTimeSeries",
            self.config.api_url.trim_end_matches('/'),
            location
        );

        let mut query: Vec<(String, String)> = DAILY_METRICS
            .iter()
            .map(|m| ("dailyMetrics".to_string(), m.to_string()))
            .collect();
        query.extend(date_params("dailyRange.start_date", range.since));
        query.extend(date_params("dailyRange.end_date", range.until));

        debug!(location = %location, since = %range.since, until = %range.until, "Fetching Business Profile performance");

        let res = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&query)
            .send()
            .await
            .map_err(|e| map_reqwest_error(platform, e))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            let err = classify_google_error(platform, status, &body);
            warn!(location = %location, code = err.code(), error = %err, "Business Profile request failed");
            return Err(err);
        }

        let payload: FetchMultiResponse = res.json().await.map_err(|e| {
            VendorError::api(platform, None, format!("invalid performance response: {e}"))
        })?;
        Ok(sum_response(payload))
    }
}
