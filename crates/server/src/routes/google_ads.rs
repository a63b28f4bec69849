use axum::{
    Router,
    extract::{Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use serde::Deserialize;
use services::services::dashboard::platform_insights;

use super::{RangeQuery, meta_ads::InsightsResponse, param_or};
use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct GoogleAdsInsightsQuery {
    pub customer_id: Option<String>,
}

/// GET /api/google-ads/insights
pub async fn get_insights(
    State(state): State<AppState>,
    Query(query): Query<GoogleAdsInsightsQuery>,
    Query(range): Query<RangeQuery>,
) -> Result<ResponseJson<InsightsResponse>, ApiError> {
    let range = range.resolve()?;
    let client = state.google_ads();
    let customer = param_or(query.customer_id.as_deref(), client.default_account());
    let insights = platform_insights(client, customer.as_deref(), &range).await;
    Ok(ResponseJson(InsightsResponse {
        insights,
        date_range: range,
    }))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().route("/google-ads/insights", get(get_insights))
}
