//! Per-platform ad insights with demo fallback, and the cross-platform summary.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use ts_rs::TS;

use super::{
    ad_platform::{AdMetricRecord, AdPlatform, AdTotals, is_placeholder_account},
    date_range::DateRange,
    demo,
    vendor::{ErrorAnnotation, Platform, VendorError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
pub enum DemoReason {
    NotConfigured,
    NoAccount,
    VendorError,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct PlatformInsights {
    pub platform: Platform,
    pub demo: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub demo_reason: Option<DemoReason>,
    pub totals: AdTotals,
    pub campaigns: Vec<AdMetricRecord>,
    pub platform_breakdown: Vec<AdMetricRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorAnnotation>,
}

impl PlatformInsights {
    fn live(platform: Platform, campaigns: Vec<AdMetricRecord>, breakdown: Vec<AdMetricRecord>) -> Self {
        Self {
            platform,
            demo: false,
            demo_reason: None,
            totals: AdTotals::from_records(&campaigns),
            campaigns,
            platform_breakdown: breakdown,
            error: None,
        }
    }

    pub fn demo(platform: Platform, reason: DemoReason, error: Option<&VendorError>) -> Self {
        let campaigns = demo::campaigns(platform);
        Self {
            platform,
            demo: true,
            demo_reason: Some(reason),
            totals: AdTotals::from_records(&campaigns),
            campaigns,
            platform_breakdown: demo::breakdown(platform),
            error: error.map(VendorError::annotation),
        }
    }
}

/// Fetch one platform's insights. Never fails: unconfigured adapters,
/// placeholder accounts and vendor errors all yield demo data.
pub async fn platform_insights(
    adapter: &dyn AdPlatform,
    account: Option<&str>,
    range: &DateRange,
) -> PlatformInsights {
    let platform = adapter.platform();
    if !adapter.is_configured() {
        debug!(platform = %platform, "Not configured, serving demo data");
        let missing = VendorError::ConfigurationMissing { platform };
        return PlatformInsights::demo(platform, DemoReason::NotConfigured, Some(&missing));
    }
    let account = match account {
        Some(account) if !is_placeholder_account(Some(account)) => account,
        _ => {
            debug!(platform = %platform, "No account supplied, serving demo data");
            return PlatformInsights::demo(platform, DemoReason::NoAccount, None);
        }
    };

    let (campaigns, breakdown) = futures::join!(
        adapter.get_insights(account, range),
        adapter.get_breakdown(account, range)
    );
    match campaigns.and_then(|c| breakdown.map(|b| (c, b))) {
        Ok((campaigns, breakdown)) => PlatformInsights::live(platform, campaigns, breakdown),
        Err(e) => {
            warn!(platform = %platform, code = e.code(), error = %e, "Vendor request failed, serving demo data");
            PlatformInsights::demo(platform, DemoReason::VendorError, Some(&e))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub date_range: DateRange,
    /// True when any platform fell back to demo data.
    pub demo: bool,
    /// Sum over platforms that returned live data.
    pub totals: AdTotals,
    /// Sum over platforms showing demo data, never mixed into `totals`.
    pub demo_totals: AdTotals,
    pub platforms: Vec<PlatformInsights>,
}

/// Query every ad platform concurrently and combine the results.
pub async fn dashboard(
    adapters: &[(&dyn AdPlatform, Option<&str>)],
    range: &DateRange,
) -> DashboardSummary {
    let platforms = join_all(
        adapters
            .iter()
            .map(|(adapter, account)| platform_insights(*adapter, *account, range)),
    )
    .await;

    let sum = |demo: bool| {
        platforms
            .iter()
            .filter(|p| p.demo == demo)
            .fold(AdTotals::default(), |acc, p| acc.merge(&p.totals))
    };
    DashboardSummary {
        date_range: *range,
        demo: platforms.iter().any(|p| p.demo),
        totals: sum(false),
        demo_totals: sum(true),
        platforms,
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::*;
    use crate::services::ad_platform::VendorInsight;

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 5, 31).unwrap(),
        )
        .unwrap()
    }

    struct FakeAdapter {
        configured: bool,
        result: Result<Vec<AdMetricRecord>, VendorError>,
    }

    #[async_trait]
    impl AdPlatform for FakeAdapter {
        fn platform(&self) -> Platform {
            Platform::MetaAds
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn fetch_insights(
            &self,
            _account: &str,
            _range: &DateRange,
        ) -> Result<Vec<VendorInsight>, VendorError> {
            unreachable!("get_insights is overridden")
        }

        async fn get_insights(
            &self,
            _account: &str,
            _range: &DateRange,
        ) -> Result<Vec<AdMetricRecord>, VendorError> {
            self.result.clone()
        }
    }

    fn live_record() -> AdMetricRecord {
        AdMetricRecord {
            platform: Platform::MetaAds,
            label: "Live".to_string(),
            impressions: 1_000,
            clicks: 50,
            spend: Decimal::new(2500, 2),
            conversions: 3,
            ctr: 5.0,
            cpc: 0.5,
            reach: None,
            frequency: None,
        }
    }

    #[tokio::test]
    async fn test_unconfigured_serves_demo_without_calls() {
        let adapter = FakeAdapter {
            configured: false,
            result: Err(VendorError::api(Platform::MetaAds, None, "must not be called")),
        };
        let insights = platform_insights(&adapter, Some("act_123"), &range()).await;
        assert!(insights.demo);
        assert_eq!(insights.demo_reason, Some(DemoReason::NotConfigured));
        assert_eq!(insights.error.unwrap().code, "CONFIGURATION_MISSING");
        assert_eq!(insights.campaigns, demo::campaigns(Platform::MetaAds));
    }

    #[tokio::test]
    async fn test_placeholder_account_serves_demo() {
        let adapter = FakeAdapter {
            configured: true,
            result: Ok(vec![live_record()]),
        };
        let insights = platform_insights(&adapter, Some("act_your_account_id"), &range()).await;
        assert!(insights.demo);
        assert_eq!(insights.demo_reason, Some(DemoReason::NoAccount));
        assert!(insights.error.is_none());
    }

    #[tokio::test]
    async fn test_permission_error_keeps_demo_breakdown() {
        let adapter = FakeAdapter {
            configured: true,
            result: Err(VendorError::Permission {
                platform: Platform::MetaAds,
                message: "(#200) Requires ads_management permission".to_string(),
            }),
        };
        let insights = platform_insights(&adapter, Some("act_123"), &range()).await;

        assert!(insights.demo);
        let error = insights.error.clone().unwrap();
        assert_eq!(error.code, "PERMISSION_ERROR");
        assert!(!error.solution.is_empty());
        assert_eq!(insights.platform_breakdown.len(), 4);

        let json = serde_json::to_value(&insights).unwrap();
        assert!(json["platformBreakdown"].is_array());
        assert_eq!(json["demo"], true);
    }

    #[tokio::test]
    async fn test_live_insights() {
        let adapter = FakeAdapter {
            configured: true,
            result: Ok(vec![live_record()]),
        };
        let insights = platform_insights(&adapter, Some("act_123"), &range()).await;
        assert!(!insights.demo);
        assert_eq!(insights.totals.impressions, 1_000);
        assert!(insights.platform_breakdown.is_empty());
        assert!(insights.error.is_none());
    }

    #[tokio::test]
    async fn test_dashboard_merges_platforms() {
        let live = FakeAdapter {
            configured: true,
            result: Ok(vec![live_record()]),
        };
        let unconfigured = FakeAdapter {
            configured: false,
            result: Ok(Vec::new()),
        };
        let summary = dashboard(
            &[
                (&live as &dyn AdPlatform, Some("act_1")),
                (&unconfigured as &dyn AdPlatform, None),
            ],
            &range(),
        )
        .await;

        assert_eq!(summary.platforms.len(), 2);
        assert!(summary.demo);
        assert_eq!(summary.totals, AdTotals::from_records(&[live_record()]));
        assert_eq!(
            summary.demo_totals,
            AdTotals::from_records(&demo::campaigns(Platform::MetaAds))
        );
    }

    #[tokio::test]
    async fn test_all_demo_dashboard_has_empty_live_totals() {
        let unconfigured = FakeAdapter {
            configured: false,
            result: Ok(Vec::new()),
        };
        let summary = dashboard(&[(&unconfigured as &dyn AdPlatform, None)], &range()).await;

        assert_eq!(summary.totals, AdTotals::default());
        assert!(summary.demo_totals.impressions > 0);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["totals"]["impressions"], 0);
        assert!(json["demoTotals"]["impressions"].as_u64().unwrap() > 0);
    }
}
