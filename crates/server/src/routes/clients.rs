use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::client::{Client, CreateClient, UpdateClient};
use services::services::validation::non_empty;
use tracing::info;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

pub(crate) async fn find_client(state: &AppState, client_id: Uuid) -> Result<Client, ApiError> {
    Client::find_by_id(&state.db().pool, client_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("client {client_id} not found")))
}

/// Resolve an optional `client_id` query parameter; an unknown id is a 404.
pub(crate) async fn find_optional_client(
    state: &AppState,
    client_id: Option<Uuid>,
) -> Result<Option<Client>, ApiError> {
    match client_id {
        Some(id) => find_client(state, id).await.map(Some),
        None => Ok(None),
    }
}

/// GET /api/clients
pub async fn list_clients(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<Client>>>, ApiError> {
    let clients = Client::find_all(&state.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(clients)))
}

/// POST /api/clients
pub async fn create_client(
    State(state): State<AppState>,
    axum::Json(mut payload): axum::Json<CreateClient>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Client>>), ApiError> {
    payload.name = non_empty("name", &payload.name)?;
    let client = Client::create(&state.db().pool, &payload).await?;
    info!(client_id = %client.id, slug = %client.slug, "Client created");
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(client))))
}

/// GET /api/clients/{client_id}
pub async fn get_client(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Client>>, ApiError> {
    let client = find_client(&state, client_id).await?;
    Ok(ResponseJson(ApiResponse::success(client)))
}

/// PUT /api/clients/{client_id}
pub async fn update_client(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
    axum::Json(mut payload): axum::Json<UpdateClient>,
) -> Result<ResponseJson<ApiResponse<Client>>, ApiError> {
    if let Some(name) = &payload.name {
        payload.name = Some(non_empty("name", name)?);
    }
    let client = Client::update(&state.db().pool, client_id, &payload)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("client {client_id} not found")))?;
    Ok(ResponseJson(ApiResponse::success(client)))
}

/// DELETE /api/clients/{client_id}
/// Funnel and checklist rows go with it.
pub async fn delete_client(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let deleted = Client::delete(&state.db().pool, client_id).await?;
    if deleted == 0 {
        return Err(ApiError::NotFound(format!("client {client_id} not found")));
    }
    info!(client_id = %client_id, "Client deleted");
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/clients", get(list_clients).post(create_client))
        .route(
            "/clients/{client_id}",
            get(get_client).put(update_client).delete(delete_client),
        )
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use crate::routes::test_support::{spawn_app, unconfigured_config};

    #[tokio::test]
    async fn test_client_crud() {
        let (base, _state) = spawn_app(unconfigured_config()).await;
        let http = reqwest::Client::new();

        let res = http
            .post(format!("{base}/clients"))
            .json(&json!({"name": "Luigi's Trattoria", "brand_terms": ["luigi"]}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 201);
        let body: Value = res.json().await.unwrap();
        let id = body["data"]["id"].as_str().unwrap().to_string();
        assert_eq!(body["data"]["slug"], "luigi-s-trattoria");

        let res = http
            .put(format!("{base}/clients/{id}"))
            .json(&json!({"website": "https://luigis.example"}))
            .send()
            .await
            .unwrap();
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["data"]["website"], "https://luigis.example");
        assert_eq!(body["data"]["name"], "Luigi's Trattoria");

        let list: Value = http
            .get(format!("{base}/clients"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(list["data"].as_array().unwrap().len(), 1);

        let res = http.delete(format!("{base}/clients/{id}")).send().await.unwrap();
        assert_eq!(res.status(), 200);
        let res = http.get(format!("{base}/clients/{id}")).send().await.unwrap();
        assert_eq!(res.status(), 404);
    }

    #[tokio::test]
    async fn test_create_client_rejects_blank_name() {
        let (base, _state) = spawn_app(unconfigured_config()).await;
        let res = reqwest::Client::new()
            .post(format!("{base}/clients"))
            .json(&json!({"name": "   "}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 400);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error_data"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_duplicate_slug_conflicts() {
        let (base, _state) = spawn_app(unconfigured_config()).await;
        let http = reqwest::Client::new();
        for expected in [201, 409] {
            let res = http
                .post(format!("{base}/clients"))
                .json(&json!({"name": "Luigi's"}))
                .send()
                .await
                .unwrap();
            assert_eq!(res.status(), expected);
        }
    }
}
