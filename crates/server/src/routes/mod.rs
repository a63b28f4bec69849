use axum::{Router, routing::get};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use services::services::{date_range::DateRange, validation::ValidationError};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

pub mod business_profile;
pub mod checklist;
pub mod clients;
pub mod dashboard;
pub mod funnel;
pub mod google_ads;
pub mod health;
pub mod meta_ads;
pub mod search_console;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health::health_check))
        .merge(clients::router(&state))
        .merge(funnel::router(&state))
        .merge(checklist::router(&state))
        .merge(dashboard::router(&state))
        .merge(meta_ads::router(&state))
        .merge(google_ads::router(&state))
        .merge(search_console::router(&state))
        .merge(business_profile::router(&state));

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// `since`/`until` or `days` query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub since: Option<String>,
    pub until: Option<String>,
    pub days: Option<i64>,
}

impl RangeQuery {
    pub fn resolve(&self) -> Result<DateRange, ValidationError> {
        DateRange::from_params(self.since.as_deref(), self.until.as_deref(), self.days, today())
    }
}

/// Request parameter, falling back to a configured default.
pub(crate) fn param_or(value: Option<&str>, default: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or(default)
        .map(str::to_string)
}
