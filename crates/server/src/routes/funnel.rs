use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, put},
};
use serde::Deserialize;
use services::services::funnel::{FunnelUpdate, FunnelView, SourceEdit};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use super::today;
use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize, TS)]
pub struct SetStageTotal {
    pub value: i64,
}

/// GET /api/clients/{client_id}/funnel
/// Loads the funnel and corrects totals that drifted from their sources.
pub async fn get_funnel(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<FunnelView>>, ApiError> {
    let view = state.funnel_service().load(client_id, today()).await?;
    Ok(ResponseJson(ApiResponse::success(view)))
}

/// PUT /api/clients/{client_id}/funnel/{stage}
pub async fn set_stage_total(
    State(state): State<AppState>,
    Path((client_id, stage)): Path<(Uuid, String)>,
    axum::Json(payload): axum::Json<SetStageTotal>,
) -> Result<ResponseJson<ApiResponse<FunnelUpdate>>, ApiError> {
    let update = state
        .funnel_service()
        .set_stage_total(client_id, &stage, payload.value, today())
        .await?;
    Ok(ResponseJson(ApiResponse::success(update)))
}

/// PUT /api/clients/{client_id}/funnel/{stage}/sources/{index}
pub async fn edit_source(
    State(state): State<AppState>,
    Path((client_id, stage, index)): Path<(Uuid, String, usize)>,
    axum::Json(payload): axum::Json<SourceEdit>,
) -> Result<ResponseJson<ApiResponse<FunnelUpdate>>, ApiError> {
    let update = state
        .funnel_service()
        .edit_source(client_id, &stage, index, &payload, today())
        .await?;
    Ok(ResponseJson(ApiResponse::success(update)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/clients/{client_id}/funnel",
        Router::new()
            .route("/", get(get_funnel))
            .route("/{stage}", put(set_stage_total))
            .route("/{stage}/sources/{index}", put(edit_source)),
    )
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use crate::routes::test_support::{spawn_app, unconfigured_config};

    async fn create_client(http: &reqwest::Client, base: &str) -> String {
        let body: Value = http
            .post(format!("{base}/clients"))
            .json(&json!({"name": "Luigi's"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        body["data"]["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_funnel_edit_flow() {
        let (base, _state) = spawn_app(unconfigured_config()).await;
        let http = reqwest::Client::new();
        let id = create_client(&http, &base).await;

        let view: Value = http
            .get(format!("{base}/clients/{id}/funnel"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(view["data"]["stages"][0]["value"], 24_500);

        // Verbatim total, reconciled on the next load.
        let update: Value = http
            .put(format!("{base}/clients/{id}/funnel/impressions"))
            .json(&json!({"value": 20_000}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(update["data"]["stage"]["value"], 20_000);
        assert_eq!(update["data"]["persisted"], true);

        let view: Value = http
            .get(format!("{base}/clients/{id}/funnel"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(view["data"]["corrected"], json!(["impressions"]));
        assert_eq!(view["data"]["stages"][0]["value"], 24_500);
        assert!(view["data"]["stages"][0]["notes"].as_str().is_some());

        let update: Value = http
            .put(format!("{base}/clients/{id}/funnel/impressions/sources/2"))
            .json(&json!({"value": 4_000}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(update["data"]["stage"]["value"], 25_300);
    }

    #[tokio::test]
    async fn test_funnel_rejections() {
        let (base, _state) = spawn_app(unconfigured_config()).await;
        let http = reqwest::Client::new();
        let id = create_client(&http, &base).await;
        http.get(format!("{base}/clients/{id}/funnel")).send().await.unwrap();

        let res = http
            .put(format!("{base}/clients/{id}/funnel/impressions"))
            .json(&json!({"value": -5}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 400);

        let res = http
            .put(format!("{base}/clients/{id}/funnel/impressions/sources/0"))
            .json(&json!({"name": " "}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 400);

        let res = http
            .put(format!("{base}/clients/{id}/funnel/impressions/sources/9"))
            .json(&json!({"value": 1}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 404);

        let res = http
            .put(format!("{base}/clients/{id}/funnel/impressions/sources/0"))
            .json(&json!({"value": i64::MAX}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 400);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error_data"]["code"], "VALIDATION_ERROR");

        let res = http
            .put(format!("{base}/clients/{id}/funnel/unknown"))
            .json(&json!({"value": 1}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 404);

        let res = http
            .get(format!("{base}/clients/{}/funnel", uuid::Uuid::new_v4()))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 404);
    }
}
