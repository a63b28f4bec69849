use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use services::services::{
    ad_platform::AdPlatform,
    dashboard::{DashboardSummary, dashboard},
};
use utils::response::ApiResponse;
use uuid::Uuid;

use super::{RangeQuery, clients::find_client, param_or};
use crate::{AppState, error::ApiError};

/// GET /api/clients/{client_id}/dashboard
/// Every ad platform queried in parallel; failing or unconfigured ones are
/// replaced by demo data.
pub async fn get_dashboard(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
    Query(range): Query<RangeQuery>,
) -> Result<ResponseJson<ApiResponse<DashboardSummary>>, ApiError> {
    let range = range.resolve()?;
    let client = find_client(&state, client_id).await?;

    let meta_account = param_or(
        client.meta_ad_account_id.as_deref(),
        state.meta_ads().default_account(),
    );
    let google_customer = param_or(
        client.google_ads_customer_id.as_deref(),
        state.google_ads().default_account(),
    );
    let adapters: [(&dyn AdPlatform, Option<&str>); 2] = [
        (state.meta_ads(), meta_account.as_deref()),
        (state.google_ads(), google_customer.as_deref()),
    ];

    let summary = dashboard(&adapters, &range).await;
    Ok(ResponseJson(ApiResponse::success(summary)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().route("/clients/{client_id}/dashboard", get(get_dashboard))
}
