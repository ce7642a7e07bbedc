// src/handlers/drafts.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::account::{AccountFieldUpdate, ContactFieldUpdate, PhoneFieldUpdate},
    services::account_editor::DraftView,
};

// Resposta das operações que criam uma entrada (contato ou telefone)
#[derive(Debug, Serialize, ToSchema)]
pub struct AddedEntry {
    pub index: usize,
    pub draft: DraftView,
}

// POST /api/accounts/{id}/draft
#[utoipa::path(
    post,
    path = "/api/accounts/{id}/draft",
    tag = "Drafts",
    params(("id" = String, Path, description = "ID da conta")),
    responses(
        (status = 200, description = "Rascunho aberto (ou reaproveitado)", body = DraftView),
        (status = 404, description = "Conta não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn open_draft(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<DraftView>, AppError> {
    Ok(Json(app_state.draft_service.open(user.identity.uid, &id).await?))
}

// GET /api/accounts/{id}/draft
#[utoipa::path(
    get,
    path = "/api/accounts/{id}/draft",
    tag = "Drafts",
    params(("id" = String, Path, description = "ID da conta")),
    responses(
        (status = 200, description = "Estado do rascunho", body = DraftView),
        (status = 404, description = "Nenhum rascunho aberto")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_draft(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<DraftView>, AppError> {
    Ok(Json(app_state.draft_service.view(user.identity.uid, &id).await?))
}

// DELETE /api/accounts/{id}/draft
#[utoipa::path(
    delete,
    path = "/api/accounts/{id}/draft",
    tag = "Drafts",
    params(("id" = String, Path, description = "ID da conta")),
    responses(
        (status = 204, description = "Rascunho fechado"),
        (status = 404, description = "Nenhum rascunho aberto")
    ),
    security(("api_jwt" = []))
)]
pub async fn close_draft(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    app_state.draft_service.close(user.identity.uid, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// POST /api/accounts/{id}/draft/edit
#[utoipa::path(
    post,
    path = "/api/accounts/{id}/draft/edit",
    tag = "Drafts",
    params(("id" = String, Path, description = "ID da conta")),
    responses((status = 200, description = "Modo de edição", body = DraftView)),
    security(("api_jwt" = []))
)]
pub async fn begin_edit(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<DraftView>, AppError> {
    Ok(Json(app_state.draft_service.begin_edit(user.identity.uid, &id).await?))
}

// POST /api/accounts/{id}/draft/cancel
#[utoipa::path(
    post,
    path = "/api/accounts/{id}/draft/cancel",
    tag = "Drafts",
    params(("id" = String, Path, description = "ID da conta")),
    responses((status = 200, description = "Edição descartada", body = DraftView)),
    security(("api_jwt" = []))
)]
pub async fn cancel_edit(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<DraftView>, AppError> {
    Ok(Json(app_state.draft_service.cancel_edit(user.identity.uid, &id).await?))
}

// POST /api/accounts/{id}/draft/save
#[utoipa::path(
    post,
    path = "/api/accounts/{id}/draft/save",
    tag = "Drafts",
    params(("id" = String, Path, description = "ID da conta")),
    responses(
        (status = 200, description = "Conta salva", body = DraftView),
        (status = 409, description = "Rascunho fora do modo de edição"),
        (status = 422, description = "CEP fora da área sem override"),
        (status = 503, description = "Falha de escrita: o rascunho foi mantido")
    ),
    security(("api_jwt" = []))
)]
pub async fn save_draft(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<DraftView>, AppError> {
    Ok(Json(app_state.draft_service.save(user.identity.uid, &id).await?))
}

// PATCH /api/accounts/{id}/draft
#[utoipa::path(
    patch,
    path = "/api/accounts/{id}/draft",
    tag = "Drafts",
    request_body = AccountFieldUpdate,
    params(("id" = String, Path, description = "ID da conta")),
    responses((status = 200, description = "Campo atualizado", body = DraftView)),
    security(("api_jwt" = []))
)]
pub async fn update_account_field(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
    Json(update): Json<AccountFieldUpdate>,
) -> Result<Json<DraftView>, AppError> {
    let (_, view) = app_state
        .draft_service
        .edit(user.identity.uid, &id, |editor| editor.update_account_field(update))
        .await?;
    Ok(Json(view))
}

// POST /api/accounts/{id}/draft/contacts
#[utoipa::path(
    post,
    path = "/api/accounts/{id}/draft/contacts",
    tag = "Drafts",
    params(("id" = String, Path, description = "ID da conta")),
    responses((status = 201, description = "Contato adicionado e ativo", body = AddedEntry)),
    security(("api_jwt" = []))
)]
pub async fn add_contact(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let (index, draft) = app_state
        .draft_service
        .edit(user.identity.uid, &id, |editor| editor.add_contact())
        .await?;
    Ok((StatusCode::CREATED, Json(AddedEntry { index, draft })))
}

// PATCH /api/accounts/{id}/draft/contacts/{contact}
#[utoipa::path(
    patch,
    path = "/api/accounts/{id}/draft/contacts/{contact}",
    tag = "Drafts",
    request_body = ContactFieldUpdate,
    params(
        ("id" = String, Path, description = "ID da conta"),
        ("contact" = usize, Path, description = "Índice do contato")
    ),
    responses((status = 200, description = "Contato atualizado", body = DraftView)),
    security(("api_jwt" = []))
)]
pub async fn update_contact_field(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((id, contact)): Path<(String, usize)>,
    Json(update): Json<ContactFieldUpdate>,
) -> Result<Json<DraftView>, AppError> {
    let (_, view) = app_state
        .draft_service
        .edit(user.identity.uid, &id, |editor| editor.update_contact_field(contact, update))
        .await?;
    Ok(Json(view))
}

// POST /api/accounts/{id}/draft/contacts/{contact}/select
#[utoipa::path(
    post,
    path = "/api/accounts/{id}/draft/contacts/{contact}/select",
    tag = "Drafts",
    params(
        ("id" = String, Path, description = "ID da conta"),
        ("contact" = usize, Path, description = "Índice do contato")
    ),
    responses((status = 200, description = "Contato ativo", body = DraftView)),
    security(("api_jwt" = []))
)]
pub async fn select_contact(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((id, contact)): Path<(String, usize)>,
) -> Result<Json<DraftView>, AppError> {
    let (_, view) = app_state
        .draft_service
        .edit(user.identity.uid, &id, |editor| editor.select_contact(contact))
        .await?;
    Ok(Json(view))
}

// POST /api/accounts/{id}/draft/contacts/{contact}/default
#[utoipa::path(
    post,
    path = "/api/accounts/{id}/draft/contacts/{contact}/default",
    tag = "Drafts",
    params(
        ("id" = String, Path, description = "ID da conta"),
        ("contact" = usize, Path, description = "Índice do contato")
    ),
    responses((status = 200, description = "Contato de obra definido", body = DraftView)),
    security(("api_jwt" = []))
)]
pub async fn set_default_contact(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((id, contact)): Path<(String, usize)>,
) -> Result<Json<DraftView>, AppError> {
    let (_, view) = app_state
        .draft_service
        .edit(user.identity.uid, &id, |editor| editor.set_default_contact(contact))
        .await?;
    Ok(Json(view))
}

// POST /api/accounts/{id}/draft/contacts/{contact}/archive
#[utoipa::path(
    post,
    path = "/api/accounts/{id}/draft/contacts/{contact}/archive",
    tag = "Drafts",
    params(
        ("id" = String, Path, description = "ID da conta"),
        ("contact" = usize, Path, description = "Índice do contato")
    ),
    responses(
        (status = 200, description = "Contato arquivado", body = DraftView),
        (status = 409, description = "Último contato ativo")
    ),
    security(("api_jwt" = []))
)]
pub async fn archive_contact(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((id, contact)): Path<(String, usize)>,
) -> Result<Json<DraftView>, AppError> {
    let (_, view) = app_state
        .draft_service
        .edit(user.identity.uid, &id, |editor| editor.archive_contact(contact))
        .await?;
    Ok(Json(view))
}

// POST /api/accounts/{id}/draft/contacts/{contact}/restore
#[utoipa::path(
    post,
    path = "/api/accounts/{id}/draft/contacts/{contact}/restore",
    tag = "Drafts",
    params(
        ("id" = String, Path, description = "ID da conta"),
        ("contact" = usize, Path, description = "Índice do contato")
    ),
    responses((status = 200, description = "Contato restaurado", body = DraftView)),
    security(("api_jwt" = []))
)]
pub async fn restore_contact(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((id, contact)): Path<(String, usize)>,
) -> Result<Json<DraftView>, AppError> {
    let (_, view) = app_state
        .draft_service
        .edit(user.identity.uid, &id, |editor| editor.restore_contact(contact))
        .await?;
    Ok(Json(view))
}

// POST /api/accounts/{id}/draft/contacts/{contact}/phones
#[utoipa::path(
    post,
    path = "/api/accounts/{id}/draft/contacts/{contact}/phones",
    tag = "Drafts",
    params(
        ("id" = String, Path, description = "ID da conta"),
        ("contact" = usize, Path, description = "Índice do contato")
    ),
    responses((status = 201, description = "Telefone adicionado", body = AddedEntry)),
    security(("api_jwt" = []))
)]
pub async fn add_phone(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((id, contact)): Path<(String, usize)>,
) -> Result<impl IntoResponse, AppError> {
    let (index, draft) = app_state
        .draft_service
        .edit(user.identity.uid, &id, |editor| editor.add_phone(contact))
        .await?;
    Ok((StatusCode::CREATED, Json(AddedEntry { index, draft })))
}

// PATCH /api/accounts/{id}/draft/contacts/{contact}/phones/{phone}
#[utoipa::path(
    patch,
    path = "/api/accounts/{id}/draft/contacts/{contact}/phones/{phone}",
    tag = "Drafts",
    request_body = PhoneFieldUpdate,
    params(
        ("id" = String, Path, description = "ID da conta"),
        ("contact" = usize, Path, description = "Índice do contato"),
        ("phone" = usize, Path, description = "Índice do telefone")
    ),
    responses((status = 200, description = "Telefone atualizado", body = DraftView)),
    security(("api_jwt" = []))
)]
pub async fn update_phone_field(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((id, contact, phone)): Path<(String, usize, usize)>,
    Json(update): Json<PhoneFieldUpdate>,
) -> Result<Json<DraftView>, AppError> {
    let (_, view) = app_state
        .draft_service
        .edit(user.identity.uid, &id, |editor| editor.update_phone_field(contact, phone, update))
        .await?;
    Ok(Json(view))
}
