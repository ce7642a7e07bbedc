// src/handlers/settings.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::{common::error::AppError, config::AppState, models::settings::ServiceAreaSettings};

// GET /api/settings
#[utoipa::path(
    get,
    path = "/api/settings",
    tag = "Settings",
    responses(
        (status = 200, description = "Listas de área de atendimento e origens", body = ServiceAreaSettings)
    ),
    security(("api_jwt" = []))
)]
pub async fn get_settings(State(app_state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let settings = app_state.settings_service.get_settings().await?;

    Ok((StatusCode::OK, Json(settings)))
}

// PUT /api/settings (admin)
#[utoipa::path(
    put,
    path = "/api/settings",
    tag = "Settings",
    request_body = ServiceAreaSettings,
    responses(
        (status = 200, description = "Configurações salvas", body = ServiceAreaSettings),
        (status = 403, description = "Apenas admin")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_settings(
    State(app_state): State<AppState>,
    Json(payload): Json<ServiceAreaSettings>,
) -> Result<impl IntoResponse, AppError> {
    let updated = app_state.settings_service.replace_settings(payload).await?;

    Ok((StatusCode::OK, Json(updated)))
}

// POST /api/settings/{list}/{value} (admin)
#[utoipa::path(
    post,
    path = "/api/settings/{list}/{value}",
    tag = "Settings",
    params(
        ("list" = String, Path, description = "standard-zips, travel-fee-zips ou customer-sources"),
        ("value" = String, Path, description = "CEP ou origem a adicionar")
    ),
    responses(
        (status = 200, description = "Lista atualizada", body = ServiceAreaSettings),
        (status = 400, description = "Lista desconhecida"),
        (status = 403, description = "Apenas admin")
    ),
    security(("api_jwt" = []))
)]
pub async fn add_entry(
    State(app_state): State<AppState>,
    Path((list, value)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let updated = app_state.settings_service.add_entry(&list, &value).await?;

    Ok((StatusCode::OK, Json(updated)))
}

// DELETE /api/settings/{list}/{value} (admin)
#[utoipa::path(
    delete,
    path = "/api/settings/{list}/{value}",
    tag = "Settings",
    params(
        ("list" = String, Path, description = "standard-zips, travel-fee-zips ou customer-sources"),
        ("value" = String, Path, description = "CEP ou origem a remover")
    ),
    responses(
        (status = 200, description = "Lista atualizada", body = ServiceAreaSettings),
        (status = 403, description = "Apenas admin")
    ),
    security(("api_jwt" = []))
)]
pub async fn remove_entry(
    State(app_state): State<AppState>,
    Path((list, value)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let updated = app_state.settings_service.remove_entry(&list, &value).await?;

    Ok((StatusCode::OK, Json(updated)))
}
