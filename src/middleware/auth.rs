// src/middleware/auth.rs

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::AppState,
    models::auth::{Identity, Role},
    services::session::{Access, Session, SessionState},
};

// Usuário da requisição, resolvido a partir da sessão do token.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub sid: Uuid,
    pub identity: Identity,
    pub role: Option<Role>,
    pub session: Session,
}

// Guarda das rotas autenticadas
pub async fn auth_guard(
    State(app_state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let TypedHeader(Authorization(bearer)) = bearer.ok_or(AppError::InvalidToken)?;
    let claims = app_state.auth_service.validate_token(bearer.token())?;

    // Token de uma sessão já encerrada não vale mais
    let mut session = app_state
        .auth_service
        .session(claims.sid)
        .await
        .ok_or(AppError::InvalidToken)?;

    // Nada é decidido enquanto a sessão está carregando
    match session.ready().await {
        SessionState::Authenticated { identity, role } => {
            request.extensions_mut().insert(CurrentUser {
                sid: claims.sid,
                identity,
                role,
                session,
            });
            Ok(next.run(request).await)
        }
        SessionState::Loading | SessionState::Anonymous => Err(AppError::InvalidToken),
    }
}

// Guarda das rotas de admin (roda depois do auth_guard)
pub async fn admin_guard(request: Request, next: Next) -> Result<Response, AppError> {
    let user = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or(AppError::InvalidToken)?;

    match user.session.current().admin_access() {
        Access::Granted => Ok(next.run(request).await),
        Access::Forbidden => {
            tracing::warn!("Acesso de admin negado para {}", user.identity.email);
            Err(AppError::Forbidden)
        }
        Access::RedirectToLogin | Access::Wait => Err(AppError::InvalidToken),
    }
}

// Extrator para obter o usuário autenticado diretamente nos handlers
pub struct AuthenticatedUser(pub CurrentUser);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .map(AuthenticatedUser)
            .ok_or(AppError::InvalidToken)
    }
}
