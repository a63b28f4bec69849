use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use db::{
    models::checklist::{
        ChecklistItem, ChecklistSection, ChecklistSubtask, ClientChecklist, UpsertChecklistItem,
        UpsertChecklistSection, UpsertChecklistSubtask,
    },
    seed::seed_checklist,
};
use serde::Deserialize;
use services::services::validation::non_empty;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use super::clients::find_client;
use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize, TS)]
pub struct SetCompleted {
    pub completed: bool,
}

/// GET /api/clients/{client_id}/checklist
pub async fn get_checklist(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<ClientChecklist>>, ApiError> {
    find_client(&state, client_id).await?;
    let checklist = ClientChecklist::load(&state.db().pool, client_id).await?;
    Ok(ResponseJson(ApiResponse::success(checklist)))
}

/// POST /api/clients/{client_id}/checklist/seed
/// Upserts the default onboarding checklist; existing completion state is kept.
pub async fn seed_default_checklist(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<ClientChecklist>>, ApiError> {
    find_client(&state, client_id).await?;
    seed_checklist(&state.db().pool, client_id).await?;
    let checklist = ClientChecklist::load(&state.db().pool, client_id).await?;
    Ok(ResponseJson(ApiResponse::success(checklist)))
}

/// POST /api/clients/{client_id}/checklist/sections
pub async fn upsert_section(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
    axum::Json(mut payload): axum::Json<UpsertChecklistSection>,
) -> Result<ResponseJson<ApiResponse<ChecklistSection>>, ApiError> {
    find_client(&state, client_id).await?;
    payload.section_key = non_empty("section_key", &payload.section_key)?;
    payload.title = non_empty("title", &payload.title)?;
    let section = ChecklistSection::upsert(&state.db().pool, client_id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(section)))
}

/// POST /api/checklist/sections/{section_id}/items
pub async fn upsert_item(
    State(state): State<AppState>,
    Path(section_id): Path<Uuid>,
    axum::Json(mut payload): axum::Json<UpsertChecklistItem>,
) -> Result<ResponseJson<ApiResponse<ChecklistItem>>, ApiError> {
    payload.item_key = non_empty("item_key", &payload.item_key)?;
    payload.title = non_empty("title", &payload.title)?;
    let item = ChecklistItem::upsert(&state.db().pool, section_id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(item)))
}

/// POST /api/checklist/items/{item_id}/subtasks
pub async fn upsert_subtask(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    axum::Json(mut payload): axum::Json<UpsertChecklistSubtask>,
) -> Result<ResponseJson<ApiResponse<ChecklistSubtask>>, ApiError> {
    payload.subtask_key = non_empty("subtask_key", &payload.subtask_key)?;
    payload.title = non_empty("title", &payload.title)?;
    let subtask = ChecklistSubtask::upsert(&state.db().pool, item_id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(subtask)))
}

/// PUT /api/checklist/items/{item_id}
pub async fn set_item_completed(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    axum::Json(payload): axum::Json<SetCompleted>,
) -> Result<ResponseJson<ApiResponse<ChecklistItem>>, ApiError> {
    let item = ChecklistItem::set_completed(&state.db().pool, item_id, payload.completed)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("checklist item {item_id} not found")))?;
    Ok(ResponseJson(ApiResponse::success(item)))
}

/// PUT /api/checklist/subtasks/{subtask_id}
pub async fn set_subtask_completed(
    State(state): State<AppState>,
    Path(subtask_id): Path<Uuid>,
    axum::Json(payload): axum::Json<SetCompleted>,
) -> Result<ResponseJson<ApiResponse<ChecklistSubtask>>, ApiError> {
    let subtask = ChecklistSubtask::set_completed(&state.db().pool, subtask_id, payload.completed)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("checklist subtask {subtask_id} not found")))?;
    Ok(ResponseJson(ApiResponse::success(subtask)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new()
        .nest(
            "/clients/{client_id}/checklist",
            Router::new()
                .route("/", get(get_checklist))
                .route("/seed", post(seed_default_checklist))
                .route("/sections", post(upsert_section)),
        )
        .nest(
            "/checklist",
            Router::new()
                .route("/sections/{section_id}/items", post(upsert_item))
                .route("/items/{item_id}", put(set_item_completed))
                .route("/items/{item_id}/subtasks", post(upsert_subtask))
                .route("/subtasks/{subtask_id}", put(set_subtask_completed)),
        )
}
