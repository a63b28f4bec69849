use axum::{
    Router,
    extract::{Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use serde::{Deserialize, Serialize};
use services::services::{
    date_range::DateRange,
    demo,
    query_categorizer::{QueryCategorizer, SearchInsights},
    search_console::{DEFAULT_ROW_LIMIT, MAX_ROW_LIMIT, SearchQueryRecord},
    validation::ValidationError,
    vendor::{ErrorAnnotation, Platform, VendorError},
};
use tracing::warn;
use ts_rs::TS;
use uuid::Uuid;

use super::{RangeQuery, clients::find_optional_client, param_or};
use crate::{AppState, error::ApiError};

/// Brand used to label the canned queries.
const DEMO_BRAND: &str = "luigi's";
const TOP_QUERIES: usize = 10;

#[derive(Debug, Deserialize)]
pub struct SearchQueriesQuery {
    /// Supplies the site URL and brand terms when they are not given here.
    pub client_id: Option<Uuid>,
    pub site_url: Option<String>,
    /// Comma-separated brand terms for the restaurant-name category.
    pub brand: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct SearchQueriesResponse {
    pub demo: bool,
    pub site_url: String,
    pub date_range: DateRange,
    pub queries: Vec<SearchQueryRecord>,
    pub insights: SearchInsights,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorAnnotation>,
}

fn brand_terms(brand: Option<&str>) -> Vec<String> {
    brand
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// GET /api/search-console/queries
pub async fn get_queries(
    State(state): State<AppState>,
    Query(query): Query<SearchQueriesQuery>,
    Query(range): Query<RangeQuery>,
) -> Result<ResponseJson<SearchQueriesResponse>, ApiError> {
    let owner = find_optional_client(&state, query.client_id).await?;
    let client = state.search_console();
    let owner_site = owner
        .as_ref()
        .and_then(|c| c.search_console_site_url.as_deref())
        .filter(|s| !s.trim().is_empty());
    let site_url = param_or(query.site_url.as_deref(), owner_site.or(client.default_site_url()))
        .ok_or(ValidationError::MissingParameter("site_url"))?;
    let range = range.resolve()?;
    let limit = query.limit.unwrap_or(DEFAULT_ROW_LIMIT).clamp(1, MAX_ROW_LIMIT);
    let mut brand = brand_terms(query.brand.as_deref());
    if brand.is_empty()
        && let Some(owner) = &owner
    {
        brand = owner.effective_brand_terms();
    }

    let result = if client.is_configured() {
        client.query_search_analytics(&site_url, &range, limit).await
    } else {
        Err(VendorError::ConfigurationMissing {
            platform: Platform::SearchConsole,
        })
    };

    let (queries, error, categorizer) = match result {
        Ok(rows) => (rows, None, QueryCategorizer::new(&brand)),
        Err(e) => {
            warn!(site_url = %site_url, code = e.code(), error = %e, "Serving demo search queries");
            let categorizer = if brand.is_empty() {
                QueryCategorizer::new([DEMO_BRAND])
            } else {
                QueryCategorizer::new(&brand)
            };
            (demo::search_queries(), Some(e.annotation()), categorizer)
        }
    };

    Ok(ResponseJson(SearchQueriesResponse {
        demo: error.is_some(),
        insights: categorizer.insights(&queries, TOP_QUERIES),
        site_url,
        date_range: range,
        queries,
        error,
    }))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().route("/search-console/queries", get(get_queries))
}
