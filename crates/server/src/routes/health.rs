use axum::{extract::State, response::Json as ResponseJson};
use serde::Serialize;
use services::services::{
    ad_platform::AdPlatform, database_validator::DatabaseValidator, vendor::Platform,
};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

#[derive(Debug, Serialize, TS)]
pub struct PlatformStatus {
    pub platform: Platform,
    pub configured: bool,
}

#[derive(Debug, Serialize, TS)]
pub struct HealthStatus {
    pub status: String,
    pub database: String,
    pub pending_writes: usize,
    pub platforms: Vec<PlatformStatus>,
}

/// GET /api/health
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<HealthStatus>>, ApiError> {
    let validation = DatabaseValidator::new(state.db().pool.clone()).validate().await?;
    let platforms = vec![
        PlatformStatus {
            platform: Platform::MetaAds,
            configured: state.meta_ads().is_configured(),
        },
        PlatformStatus {
            platform: Platform::GoogleAds,
            configured: state.google_ads().is_configured(),
        },
        PlatformStatus {
            platform: Platform::SearchConsole,
            configured: state.search_console().is_configured(),
        },
        PlatformStatus {
            platform: Platform::BusinessProfile,
            configured: state.business_profile().is_configured(),
        },
    ];

    Ok(ResponseJson(ApiResponse::success(HealthStatus {
        status: if validation.is_ok() { "ok" } else { "degraded" }.to_string(),
        database: validation.summary(),
        pending_writes: state.write_cache().len().await,
        platforms,
    })))
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use crate::routes::test_support::{spawn_app, unconfigured_config};

    #[tokio::test]
    async fn test_health_reports_schema_and_platforms() {
        let (base, _state) = spawn_app(unconfigured_config()).await;
        let body: Value = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["status"], "ok");
        assert_eq!(body["data"]["pending_writes"], 0);
        let platforms = body["data"]["platforms"].as_array().unwrap();
        assert_eq!(platforms.len(), 4);
        assert!(platforms.iter().all(|p| p["configured"] == false));
    }
}
