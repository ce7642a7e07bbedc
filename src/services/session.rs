// src/services/session.rs

use async_trait::async_trait;
use tokio::sync::watch;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::UserRepository,
    models::auth::{Identity, Role},
};

/// Estado de uma sessão: `Loading` até a primeira identidade (e o papel) ser resolvida.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Loading,
    Authenticated { identity: Identity, role: Option<Role> },
    Anonymous,
}

// Decisão de acesso para um recurso exclusivo de admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Wait,
    RedirectToLogin,
    Forbidden,
    Granted,
}

impl SessionState {
    pub fn admin_access(&self) -> Access {
        match self {
            SessionState::Loading => Access::Wait,
            SessionState::Anonymous => Access::RedirectToLogin,
            SessionState::Authenticated { role: Some(Role::Admin), .. } => Access::Granted,
            SessionState::Authenticated { .. } => Access::Forbidden,
        }
    }
}

// Busca de papel por usuário
#[async_trait]
pub trait RoleLookup: Send + Sync + 'static {
    async fn find_role(&self, uid: Uuid) -> Result<Option<Role>, AppError>;
}

#[async_trait]
impl RoleLookup for UserRepository {
    async fn find_role(&self, uid: Uuid) -> Result<Option<Role>, AppError> {
        UserRepository::find_role(self, uid).await
    }
}

/// Sessão ligada ao fluxo de identidade de um login.
///
/// A cada evento de identidade o papel é consultado de novo. Quando o fluxo
/// entrega `None` (logout) ou termina, a sessão vira `Anonymous` para sempre:
/// ela nunca é recriada implicitamente.
#[derive(Debug, Clone)]
pub struct Session {
    state: watch::Receiver<SessionState>,
}

impl Session {
    pub fn attach<R: RoleLookup>(
        sid: Uuid,
        mut identities: watch::Receiver<Option<Identity>>,
        roles: R,
    ) -> Self {
        let (tx, rx) = watch::channel(SessionState::Loading);

        tokio::spawn(async move {
            loop {
                let identity = identities.borrow_and_update().clone();
                let Some(identity) = identity else {
                    break;
                };

                // Registro de papel ausente é "sem papel", não erro
                let role = match roles.find_role(identity.uid).await {
                    Ok(role) => role,
                    Err(e) => {
                        tracing::warn!("Falha ao buscar papel de {}: {}", identity.email, e);
                        None
                    }
                };
                tracing::debug!("Sessão {} resolvida para {} ({:?})", sid, identity.email, role);
                if tx.send(SessionState::Authenticated { identity, role }).is_err() {
                    return;
                }

                if identities.changed().await.is_err() {
                    break;
                }
            }
            let _ = tx.send(SessionState::Anonymous);
        });

        Self { state: rx }
    }

    pub fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    // Espera sair de `Loading`. Nada dependente de identidade deve ser decidido antes.
    pub async fn ready(&mut self) -> SessionState {
        match self
            .state
            .wait_for(|state| !matches!(state, SessionState::Loading))
            .await
        {
            Ok(state) => state.clone(),
            Err(_) => SessionState::Anonymous,
        }
    }

    // Completa quando a sessão termina (logout).
    pub async fn ended(&mut self) {
        let _ = self
            .state
            .wait_for(|state| matches!(state, SessionState::Anonymous))
            .await;
    }
}
