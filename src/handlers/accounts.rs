// src/handlers/accounts.rs

use std::convert::Infallible;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    Json,
};
use futures_util::{stream, Stream};
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    db::{AccountRepository, Snapshot, Subscription},
    middleware::auth::AuthenticatedUser,
    models::account::{Account, CreateAccountPayload, SearchQuery},
    services::session::Session,
};

// POST /api/accounts
#[utoipa::path(
    post,
    path = "/api/accounts",
    tag = "Accounts",
    request_body = CreateAccountPayload,
    responses(
        (status = 201, description = "Conta criada", body = Account),
        (status = 400, description = "Contato ou endereço faltando"),
        (status = 422, description = "CEP fora da área sem override"),
        (status = 503, description = "Falha de escrita")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_account(
    State(app_state): State<AppState>,
    Json(payload): Json<CreateAccountPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let account = app_state.account_service.create_account(payload).await?;

    Ok((StatusCode::CREATED, Json(account)))
}

// GET /api/accounts
#[utoipa::path(
    get,
    path = "/api/accounts",
    tag = "Accounts",
    responses(
        (status = 200, description = "Contas mais recentes primeiro", body = Vec<Account>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_accounts(State(app_state): State<AppState>) -> Result<Json<Vec<Account>>, AppError> {
    Ok(Json(app_state.account_service.list_recent().await?))
}

// GET /api/accounts/search?q=
#[utoipa::path(
    get,
    path = "/api/accounts/search",
    tag = "Accounts",
    params(
        ("q" = String, Query, description = "Termo de busca (vazio lista as recentes)")
    ),
    responses(
        (status = 200, description = "Contas encontradas", body = Vec<Account>)
    ),
    security(("api_jwt" = []))
)]
pub async fn search_accounts(
    State(app_state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Account>>, AppError> {
    Ok(Json(app_state.account_service.search(&query.q).await?))
}

// GET /api/accounts/follow-ups
#[utoipa::path(
    get,
    path = "/api/accounts/follow-ups",
    tag = "Accounts",
    responses(
        (status = 200, description = "Contas com retorno agendado, mais próximas primeiro", body = Vec<Account>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_follow_ups(State(app_state): State<AppState>) -> Result<Json<Vec<Account>>, AppError> {
    Ok(Json(app_state.account_service.list_follow_ups().await?))
}

// GET /api/accounts/{id}
#[utoipa::path(
    get,
    path = "/api/accounts/{id}",
    tag = "Accounts",
    params(
        ("id" = String, Path, description = "ID da conta")
    ),
    responses(
        (status = 200, description = "Conta", body = Account),
        (status = 404, description = "Conta não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_account(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Account>, AppError> {
    Ok(Json(app_state.account_service.get_account(&id).await?))
}

// POST /api/accounts/{id}/address-history/{index}/restore
#[utoipa::path(
    post,
    path = "/api/accounts/{id}/address-history/{index}/restore",
    tag = "Accounts",
    params(
        ("id" = String, Path, description = "ID da conta"),
        ("index" = usize, Path, description = "Posição no histórico (0 = mais recente)")
    ),
    responses(
        (status = 200, description = "Endereço restaurado", body = Account),
        (status = 404, description = "Conta ou entrada inexistente"),
        (status = 409, description = "Conta em edição por este usuário")
    ),
    security(("api_jwt" = []))
)]
pub async fn restore_address(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((id, index)): Path<(String, usize)>,
) -> Result<Json<Account>, AppError> {
    let account = app_state
        .account_service
        .restore_address(user.identity.uid, &id, index)
        .await?;
    Ok(Json(account))
}

// GET /api/accounts/stream
#[utoipa::path(
    get,
    path = "/api/accounts/stream",
    tag = "Accounts",
    responses(
        (status = 200, description = "Fluxo SSE da lista de contas recentes (text/event-stream)")
    ),
    security(("api_jwt" = []))
)]
pub async fn stream_accounts(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let subscription = app_state.account_service.subscribe_recent().await?;
    tracing::debug!("Stream de contas recentes aberto para {}", user.identity.email);
    Ok(Sse::new(live_events(subscription, user.session, list_event)).keep_alive(KeepAlive::default()))
}

// GET /api/accounts/follow-ups/stream
#[utoipa::path(
    get,
    path = "/api/accounts/follow-ups/stream",
    tag = "Accounts",
    responses(
        (status = 200, description = "Fluxo SSE da lista de retornos agendados (text/event-stream)")
    ),
    security(("api_jwt" = []))
)]
pub async fn stream_follow_ups(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let subscription = app_state.account_service.subscribe_follow_ups().await?;
    tracing::debug!("Stream de retornos aberto para {}", user.identity.email);
    Ok(Sse::new(live_events(subscription, user.session, list_event)).keep_alive(KeepAlive::default()))
}

// GET /api/accounts/{id}/stream
#[utoipa::path(
    get,
    path = "/api/accounts/{id}/stream",
    tag = "Accounts",
    params(
        ("id" = String, Path, description = "ID da conta")
    ),
    responses(
        (status = 200, description = "Fluxo SSE de snapshots da conta (text/event-stream)")
    ),
    security(("api_jwt" = []))
)]
pub async fn stream_account(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let subscription = app_state.account_service.subscribe(&id).await?;
    tracing::debug!("Stream da conta {} aberto para {}", id, user.identity.email);
    Ok(Sse::new(live_events(subscription, user.session, snapshot_event)).keep_alive(KeepAlive::default()))
}

// Termina no logout da sessão ou quando o cliente desconecta (o stream é descartado)
fn live_events(
    subscription: Subscription,
    session: Session,
    render: fn(Snapshot) -> Event,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold((subscription, session), move |(mut subscription, mut session)| async move {
        let snapshot = tokio::select! {
            _ = session.ended() => None,
            snapshot = subscription.next() => snapshot,
        };
        snapshot.map(|snapshot| (Ok::<_, Infallible>(render(snapshot)), (subscription, session)))
    })
}

fn snapshot_event(snapshot: Snapshot) -> Event {
    let Some(doc) = snapshot.into_iter().next() else {
        return Event::default().event("removed").data("null");
    };

    let event = AccountRepository::from_document(doc)
        .map_err(|e| e.to_string())
        .and_then(|account| {
            Event::default()
                .event("snapshot")
                .json_data(&account)
                .map_err(|e| e.to_string())
        });
    event.unwrap_or_else(error_event)
}

fn list_event(snapshot: Snapshot) -> Event {
    let event = snapshot
        .into_iter()
        .map(AccountRepository::from_document)
        .collect::<Result<Vec<Account>, _>>()
        .map_err(|e| e.to_string())
        .and_then(|accounts| {
            Event::default()
                .event("snapshot")
                .json_data(&accounts)
                .map_err(|e| e.to_string())
        });
    event.unwrap_or_else(error_event)
}

fn error_event(message: String) -> Event {
    tracing::warn!("Snapshot ilegível no stream: {}", message);
    Event::default().event("error").data(message)
}
