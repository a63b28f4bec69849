//! Vendor-agnostic ad metrics and the adapter interface each ad platform implements.

use async_trait::async_trait;
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::{
    date_range::DateRange,
    vendor::{Platform, VendorError},
};

pub mod google_ads;
pub mod meta_ads;

pub use google_ads::{GoogleAdsClient, GoogleAdsRow};
pub use meta_ads::{MetaAdsClient, MetaInsightRow};

/// Performance snapshot for one campaign, ad set, publisher or account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct AdMetricRecord {
    pub platform: Platform,
    pub label: String,
    pub impressions: u64,
    pub clicks: u64,
    #[ts(type = "string")]
    pub spend: Decimal,
    pub conversions: u64,
    /// Click-through rate in percent.
    pub ctr: f64,
    /// Cost per click in account currency.
    pub cpc: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reach: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<f64>,
}

/// Raw vendor rows, one variant per platform.
#[derive(Debug, Clone, PartialEq)]
pub enum VendorInsight {
    GoogleAds(GoogleAdsRow),
    MetaAds(MetaInsightRow),
}

impl VendorInsight {
    pub fn platform(&self) -> Platform {
        match self {
            VendorInsight::GoogleAds(_) => Platform::GoogleAds,
            VendorInsight::MetaAds(_) => Platform::MetaAds,
        }
    }

    pub fn normalize(&self) -> AdMetricRecord {
        match self {
            VendorInsight::GoogleAds(row) => row.normalize(),
            VendorInsight::MetaAds(row) => row.normalize(),
        }
    }
}

/// Click-through rate in percent; zero when there were no impressions.
pub fn ctr_percent(clicks: u64, impressions: u64) -> f64 {
    if impressions == 0 {
        0.0
    } else {
        clicks as f64 / impressions as f64 * 100.0
    }
}

pub fn cost_per_click(spend: Decimal, clicks: u64) -> f64 {
    if clicks == 0 {
        0.0
    } else {
        (spend / Decimal::from(clicks)).to_f64().unwrap_or(0.0)
    }
}

/// Sums over a set of records, with ctr/cpc derived from the sums.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct AdTotals {
    pub impressions: u64,
    pub clicks: u64,
    #[ts(type = "string")]
    pub spend: Decimal,
    pub conversions: u64,
    pub ctr: f64,
    pub cpc: f64,
}

impl AdTotals {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a AdMetricRecord>) -> Self {
        let mut totals = AdTotals::default();
        for record in records {
            totals.impressions += record.impressions;
            totals.clicks += record.clicks;
            totals.spend += record.spend;
            totals.conversions += record.conversions;
        }
        totals.ctr = ctr_percent(totals.clicks, totals.impressions);
        totals.cpc = cost_per_click(totals.spend, totals.clicks);
        totals
    }

    pub fn merge(&self, other: &AdTotals) -> AdTotals {
        let mut merged = AdTotals {
            impressions: self.impressions + other.impressions,
            clicks: self.clicks + other.clicks,
            spend: self.spend + other.spend,
            conversions: self.conversions + other.conversions,
            ..Default::default()
        };
        merged.ctr = ctr_percent(merged.clicks, merged.impressions);
        merged.cpc = cost_per_click(merged.spend, merged.clicks);
        merged
    }
}

/// Account references that mean "no real account was supplied".
pub fn is_placeholder_account(account: Option<&str>) -> bool {
    let Some(account) = account.map(str::trim) else {
        return true;
    };
    let lower = account.to_ascii_lowercase();
    let digits = lower.trim_start_matches("act_").replace('-', "");
    account.is_empty()
        || lower == "demo"
        || lower == "act_"
        || lower.starts_with("your_")
        || lower.starts_with("act_your")
        || lower.contains("placeholder")
        || (!digits.is_empty() && digits.chars().all(|c| c == '0'))
}

/// Adapter implemented once per ad platform.
#[async_trait]
pub trait AdPlatform: Send + Sync {
    fn platform(&self) -> Platform;

    /// True iff every required credential is a non-empty string.
    fn is_configured(&self) -> bool;

    /// Per-campaign rows for the account and window.
    async fn fetch_insights(
        &self,
        account: &str,
        range: &DateRange,
    ) -> Result<Vec<VendorInsight>, VendorError>;

    /// Secondary breakdown (e.g. by publisher). Empty for platforms without one.
    async fn fetch_breakdown(
        &self,
        _account: &str,
        _range: &DateRange,
    ) -> Result<Vec<VendorInsight>, VendorError> {
        Ok(Vec::new())
    }

    async fn get_insights(
        &self,
        account: &str,
        range: &DateRange,
    ) -> Result<Vec<AdMetricRecord>, VendorError> {
        if !self.is_configured() {
            return Err(VendorError::ConfigurationMissing {
                platform: self.platform(),
            });
        }
        let rows = self.fetch_insights(account, range).await?;
        Ok(rows.iter().map(VendorInsight::normalize).collect())
    }

    async fn get_breakdown(
        &self,
        account: &str,
        range: &DateRange,
    ) -> Result<Vec<AdMetricRecord>, VendorError> {
        if !self.is_configured() {
            return Err(VendorError::ConfigurationMissing {
                platform: self.platform(),
            });
        }
        let rows = self.fetch_breakdown(account, range).await?;
        Ok(rows.iter().map(VendorInsight::normalize).collect())
    }
}
