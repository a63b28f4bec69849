use axum::{
    Router,
    extract::{Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use serde::{Deserialize, Serialize};
use services::services::{
    dashboard::{PlatformInsights, platform_insights},
    date_range::DateRange,
};
use ts_rs::TS;

use super::{RangeQuery, param_or};
use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct MetaInsightsQuery {
    pub account_id: Option<String>,
}

/// Vendor endpoints answer with the insights object itself rather than the
/// `ApiResponse` envelope.
#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct InsightsResponse {
    #[serde(flatten)]
    #[ts(flatten)]
    pub insights: PlatformInsights,
    pub date_range: DateRange,
}

/// GET /api/meta-ads/insights
pub async fn get_insights(
    State(state): State<AppState>,
    Query(query): Query<MetaInsightsQuery>,
    Query(range): Query<RangeQuery>,
) -> Result<ResponseJson<InsightsResponse>, ApiError> {
    let range = range.resolve()?;
    let client = state.meta_ads();
    let account = param_or(query.account_id.as_deref(), client.default_account());
    let insights = platform_insights(client, account.as_deref(), &range).await;
    Ok(ResponseJson(InsightsResponse {
        insights,
        date_range: range,
    }))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().route("/meta-ads/insights", get(get_insights))
}
