use axum::{
    Router,
    extract::{Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use serde::{Deserialize, Serialize};
use services::services::{
    business_profile::{BusinessProfileMetrics, normalize_location_id},
    date_range::DateRange,
    demo,
    vendor::{ErrorAnnotation, Platform, VendorError},
};
use tracing::warn;
use ts_rs::TS;
use uuid::Uuid;

use super::{RangeQuery, clients::find_optional_client, param_or};
use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct PerformanceQuery {
    /// Supplies the location when `location_id` is not given.
    pub client_id: Option<Uuid>,
    pub location_id: Option<String>,
}

#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceResponse {
    pub demo: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
    pub date_range: DateRange,
    pub metrics: BusinessProfileMetrics,
    pub total_impressions: u64,
    pub total_actions: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorAnnotation>,
}

/// GET /api/business-profile/performance
pub async fn get_performance(
    State(state): State<AppState>,
    Query(query): Query<PerformanceQuery>,
    Query(range): Query<RangeQuery>,
) -> Result<ResponseJson<PerformanceResponse>, ApiError> {
    let range = range.resolve()?;
    let owner = find_optional_client(&state, query.client_id).await?;
    let client = state.business_profile();
    let owner_location = owner
        .as_ref()
        .and_then(|c| c.business_profile_location_id.as_deref())
        .filter(|l| !l.trim().is_empty());
    let location = param_or(
        query.location_id.as_deref(),
        owner_location.or(client.default_location()),
    )
        .map(|l| normalize_location_id(&l))
        .filter(|l| !l.is_empty());

    // Err(None): configured, but no location to query.
    let outcome: Result<BusinessProfileMetrics, Option<VendorError>> =
        match (&location, client.is_configured()) {
            (_, false) => Err(Some(VendorError::ConfigurationMissing {
                platform: Platform::BusinessProfile,
            })),
            (None, true) => Err(None),
            (Some(location), true) => client.fetch_performance(location, &range).await.map_err(Some),
        };

    let is_demo = outcome.is_err();
    let (metrics, error) = match outcome {
        Ok(metrics) => (metrics, None),
        Err(e) => {
            if let Some(e) = &e {
                warn!(code = e.code(), error = %e, "Serving demo Business Profile metrics");
            }
            (demo::business_profile(), e.map(|e| e.annotation()))
        }
    };

    Ok(ResponseJson(PerformanceResponse {
        demo: is_demo,
        location_id: location,
        date_range: range,
        total_impressions: metrics.total_impressions(),
        total_actions: metrics.total_actions(),
        metrics,
        error,
    }))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().route("/business-profile/performance", get(get_performance))
}
