//! Representative placeholder data served when a vendor is unconfigured or failing.

use rust_decimal::Decimal;

use super::{
    ad_platform::{AdMetricRecord, cost_per_click, ctr_percent},
    business_profile::BusinessProfileMetrics,
    search_console::SearchQueryRecord,
    vendor::Platform,
};

fn record(
    platform: Platform,
    label: &str,
    impressions: u64,
    clicks: u64,
    spend_cents: i64,
    conversions: u64,
    reach: Option<u64>,
) -> AdMetricRecord {
    let spend = Decimal::new(spend_cents, 2);
    AdMetricRecord {
        platform,
        label: label.to_string(),
        impressions,
        clicks,
        spend,
        conversions,
        ctr: ctr_percent(clicks, impressions),
        cpc: cost_per_click(spend, clicks),
        reach,
        frequency: reach.filter(|r| *r > 0).map(|r| impressions as f64 / r as f64),
    }
}

pub fn campaigns(platform: Platform) -> Vec<AdMetricRecord> {
    match platform {
        Platform::MetaAds => vec![
            record(platform, "Weekend Brunch Promo", 45_200, 1_130, 41_250, 86, Some(28_400)),
            record(platform, "Happy Hour Awareness", 38_900, 740, 29_875, 41, Some(25_100)),
            record(platform, "Catering Lead Gen", 12_600, 315, 18_920, 22, Some(9_800)),
        ],
        Platform::GoogleAds => vec![
            record(platform, "Search - Brand", 18_400, 1_650, 74_250, 128, None),
            record(platform, "Search - Local Italian", 26_300, 1_180, 88_500, 74, None),
            record(platform, "Performance Max - Delivery", 54_100, 960, 60_480, 39, None),
        ],
        Platform::SearchConsole | Platform::BusinessProfile => Vec::new(),
    }
}

/// Publisher split for Meta; sums match [`campaigns`].
pub fn breakdown(platform: Platform) -> Vec<AdMetricRecord> {
    match platform {
        Platform::MetaAds => vec![
            record(platform, "facebook", 52_100, 1_190, 48_930, 82, None),
            record(platform, "instagram", 36_800, 870, 35_215, 56, None),
            record(platform, "audience_network", 5_400, 85, 4_120, 7, None),
            record(platform, "messenger", 2_400, 40, 1_780, 4, None),
        ],
        _ => Vec::new(),
    }
}

pub fn search_queries() -> Vec<SearchQueryRecord> {
    let rows: [(&str, u64, u64, f64); 12] = [
        ("italian restaurant near me", 4_820, 312, 4.2),
        ("pizza near me", 3_960, 198, 6.8),
        ("luigi's trattoria", 1_240, 684, 1.1),
        ("luigi's menu", 860, 402, 1.3),
        ("best pasta downtown", 1_530, 96, 5.4),
        ("luigi's hours", 410, 188, 1.2),
        ("italian food delivery", 2_210, 87, 8.9),
        ("restaurant reservations tonight", 980, 41, 9.6),
        ("directions to luigi's", 350, 142, 1.4),
        ("luigi's phone number", 220, 96, 1.5),
        ("gluten free pizza", 1_140, 35, 11.2),
        ("brunch specials", 760, 28, 7.7),
    ];
    rows.into_iter()
        .map(|(query, impressions, clicks, position)| {
            SearchQueryRecord::new(query, impressions, clicks, ctr_percent(clicks, impressions), position)
        })
        .collect()
}

pub fn business_profile() -> BusinessProfileMetrics {
    BusinessProfileMetrics {
        impressions_maps: 6_840,
        impressions_search: 9_215,
        website_clicks: 412,
        call_clicks: 138,
        direction_requests: 295,
        conversations: 12,
        bookings: 47,
        food_orders: 63,
    }
}
