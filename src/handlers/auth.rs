// src/handlers/auth.rs

use std::convert::Infallible;

use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    Json,
};
use futures_util::{stream, Stream};
use tokio::sync::watch;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::auth::{AuthResponse, Identity, LoginUserPayload, MeResponse, RegisterUserPayload},
};

// POST /api/auth/login
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginUserPayload,
    responses(
        (status = 200, description = "Login efetuado", body = AuthResponse),
        (status = 401, description = "Credenciais inválidas")
    )
)]
pub async fn login(
    State(app_state): State<AppState>,
    Json(payload): Json<LoginUserPayload>,
) -> Result<Json<AuthResponse>, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let (token, identity) = app_state
        .auth_service
        .sign_in(&payload.email, &payload.password)
        .await?;

    Ok(Json(AuthResponse { token, identity }))
}

// POST /api/auth/logout
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    responses(
        (status = 204, description = "Sessão encerrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn logout(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    app_state.auth_service.sign_out(user.sid).await;

    let closed = app_state.draft_service.close_all(user.identity.uid).await;
    if closed > 0 {
        tracing::debug!("{} rascunhos fechados no logout de {}", closed, user.identity.email);
    }

    Ok(StatusCode::NO_CONTENT)
}

// GET /api/auth/me
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Identidade e papel da sessão", body = MeResponse)
    ),
    security(("api_jwt" = []))
)]
pub async fn get_me(AuthenticatedUser(user): AuthenticatedUser) -> Json<MeResponse> {
    Json(MeResponse {
        identity: user.identity,
        role: user.role,
    })
}

// GET /api/auth/session/stream
#[utoipa::path(
    get,
    path = "/api/auth/session/stream",
    tag = "Auth",
    responses(
        (status = 200, description = "Fluxo SSE da identidade da sessão: `identity` e por fim `signed-out`")
    ),
    security(("api_jwt" = []))
)]
pub async fn stream_identity(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let changes = app_state
        .auth_service
        .identity_changes(user.sid)
        .await
        .ok_or(AppError::InvalidToken)?;

    Ok(Sse::new(identity_events(changes)).keep_alive(KeepAlive::default()))
}

// O valor atual sai primeiro; `None` ou o fim do fluxo viram `signed-out` e encerram
fn identity_events(
    changes: watch::Receiver<Option<Identity>>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(Some((changes, true)), |state| async move {
        let (mut changes, first) = state?;
        if !first && changes.changed().await.is_err() {
            return Some((Ok::<_, Infallible>(signed_out_event()), None));
        }

        let identity = changes.borrow_and_update().clone();
        match identity {
            Some(identity) => {
                let event = Event::default()
                    .event("identity")
                    .json_data(&identity)
                    .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()));
                Some((Ok(event), Some((changes, false))))
            }
            None => Some((Ok(signed_out_event()), None)),
        }
    })
}

fn signed_out_event() -> Event {
    Event::default().event("signed-out").data("null")
}

// POST /api/users (admin)
#[utoipa::path(
    post,
    path = "/api/users",
    tag = "Users",
    request_body = RegisterUserPayload,
    responses(
        (status = 201, description = "Usuário cadastrado", body = Identity),
        (status = 403, description = "Apenas admin"),
        (status = 409, description = "E-mail já existe")
    ),
    security(("api_jwt" = []))
)]
pub async fn register_user(
    State(app_state): State<AppState>,
    Json(payload): Json<RegisterUserPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let identity = app_state
        .auth_service
        .register_user(&payload.email, &payload.password, payload.role)
        .await?;

    Ok((StatusCode::CREATED, Json(identity)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use http_body_util::BodyExt;
    use uuid::Uuid;

    async fn render(events: Vec<Event>) -> String {
        let sse = Sse::new(stream::iter(events.into_iter().map(Ok::<_, Infallible>)));
        let bytes = sse.into_response().into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn identity_stream_ends_with_signed_out() {
        let who = Identity {
            uid: Uuid::new_v4(),
            email: "ann@example.com".into(),
        };
        let (tx, rx) = watch::channel(Some(who.clone()));
        let mut events = Box::pin(identity_events(rx));

        let first = events.next().await.unwrap().unwrap();
        let body = render(vec![first]).await;
        assert!(body.starts_with("event: identity\ndata: {"), "{}", body);
        assert!(body.contains("ann@example.com"));

        tx.send(None).unwrap();
        let last = events.next().await.unwrap().unwrap();
        assert_eq!(render(vec![last]).await, "event: signed-out\ndata: null\n\n");
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn dropped_identity_feed_counts_as_signed_out() {
        let (tx, rx) = watch::channel(None::<Identity>);
        drop(tx);
        let events: Vec<_> = identity_events(rx).collect().await;
        assert_eq!(events.len(), 1);
    }
}
