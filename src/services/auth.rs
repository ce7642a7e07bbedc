// src/services/auth.rs

use std::{collections::HashMap, sync::Arc};

use bcrypt::{hash, verify};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use tokio::sync::{watch, RwLock};
use uuid::Uuid;

use super::session::Session;
use crate::{
    common::error::AppError,
    db::UserRepository,
    models::auth::{Claims, Identity, Role},
};

const TOKEN_TTL_DAYS: i64 = 7;

// Uma entrada por login: o fluxo de identidade e a sessão presa a ele
struct SignedIn {
    uid: Uuid,
    identity: watch::Sender<Option<Identity>>,
    session: Session,
    // Mesmo `exp` do token: depois disso a sessão não serve mais
    expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AuthService {
    user_repo: UserRepository,
    jwt_secret: String,
    bcrypt_cost: u32,
    sessions: Arc<RwLock<HashMap<Uuid, SignedIn>>>,
}

impl AuthService {
    pub fn new(user_repo: UserRepository, jwt_secret: String, bcrypt_cost: u32) -> Self {
        Self {
            user_repo,
            jwt_secret,
            bcrypt_cost,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    // Cadastra um usuário (só admin chega aqui). Sem papel informado, vira membro.
    pub async fn register_user(&self, email: &str, password: &str, role: Option<Role>) -> Result<Identity, AppError> {
        let password_clone = password.to_owned();
        let cost = self.bcrypt_cost;
        let hashed_password = tokio::task::spawn_blocking(move || hash(&password_clone, cost))
            .await
            .map_err(|e| anyhow::anyhow!("Falha na task de hashing: {}", e))??;

        let credentials = self.user_repo.create_credentials(email, &hashed_password).await?;
        let role = role.unwrap_or(Role::Member);
        self.user_repo.set_role(credentials.uid, role).await?;
        tracing::info!("Usuário {} cadastrado como {:?}", credentials.email, role);

        Ok(Identity {
            uid: credentials.uid,
            email: credentials.email,
        })
    }

    // Garante o admin inicial. Não mexe em credenciais que já existem.
    pub async fn bootstrap_admin(&self, email: &str, password: &str) -> Result<(), AppError> {
        if self.user_repo.find_by_email(email).await?.is_some() {
            tracing::debug!("Admin {} já existe", email);
            return Ok(());
        }
        self.register_user(email, password, Some(Role::Admin)).await?;
        Ok(())
    }

    // Login: confere a senha, abre uma sessão nova e devolve o token com o `sid` dela.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(String, Identity), AppError> {
        let credentials = self
            .user_repo
            .find_by_email(email)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let password_clone = password.to_owned();
        let password_hash_clone = credentials.password_hash.clone();

        // Executa a verificação em um thread separado
        let is_password_valid = tokio::task::spawn_blocking(move || verify(&password_clone, &password_hash_clone))
            .await
            .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))??;

        if !is_password_valid {
            return Err(AppError::InvalidCredentials);
        }

        let identity = Identity {
            uid: credentials.uid,
            email: credentials.email,
        };
        let sid = Uuid::new_v4();
        let issued_at = Utc::now();
        let expires_at = issued_at + Duration::days(TOKEN_TTL_DAYS);
        let token = self.create_token(sid, &identity, issued_at, expires_at)?;

        let (tx, rx) = watch::channel(Some(identity.clone()));
        let session = Session::attach(sid, rx, self.user_repo.clone());
        self.sessions.write().await.insert(
            sid,
            SignedIn {
                uid: identity.uid,
                identity: tx,
                session,
                expires_at,
            },
        );

        tracing::info!("Login de {} (sessão {})", identity.email, sid);
        Ok((token, identity))
    }

    // Logout: o fluxo de identidade emite `None` e a sessão é descartada.
    pub async fn sign_out(&self, sid: Uuid) -> bool {
        match self.sessions.write().await.remove(&sid) {
            Some(entry) => {
                let _ = entry.identity.send(None);
                tracing::info!("Sessão {} encerrada", sid);
                true
            }
            None => false,
        }
    }

    /// Descarta as sessões vencidas em `now`, emitindo `None` em cada uma.
    /// Devolve os usuários que ficaram sem nenhuma sessão viva.
    pub async fn prune_expired(&self, now: DateTime<Utc>) -> Vec<Uuid> {
        let mut sessions = self.sessions.write().await;
        let expired: Vec<Uuid> = sessions
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(sid, _)| *sid)
            .collect();

        let mut orphaned = Vec::new();
        for sid in expired {
            if let Some(entry) = sessions.remove(&sid) {
                let _ = entry.identity.send(None);
                if !orphaned.contains(&entry.uid) {
                    orphaned.push(entry.uid);
                }
            }
        }
        orphaned.retain(|uid| !sessions.values().any(|entry| entry.uid == *uid));

        if !orphaned.is_empty() {
            tracing::info!("Sessões expiradas removidas; {} usuários sem sessão", orphaned.len());
        }
        orphaned
    }

    // Fluxo de identidade do login `sid`: valor atual e as mudanças seguintes
    pub async fn identity_changes(&self, sid: Uuid) -> Option<watch::Receiver<Option<Identity>>> {
        self.sessions
            .read()
            .await
            .get(&sid)
            .filter(|entry| entry.expires_at > Utc::now())
            .map(|entry| entry.identity.subscribe())
    }

    pub async fn session(&self, sid: Uuid) -> Option<Session> {
        self.sessions
            .read()
            .await
            .get(&sid)
            .filter(|entry| entry.expires_at > Utc::now())
            .map(|entry| entry.session.clone())
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, AppError> {
        let validation = Validation::default();
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &validation,
        )
        .map_err(|_| AppError::InvalidToken)?;

        Ok(token_data.claims)
    }

    fn create_token(
        &self,
        sid: Uuid,
        identity: &Identity,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let claims = Claims {
            sub: identity.uid,
            sid,
            email: identity.email.clone(),
            exp: expires_at.timestamp() as usize,
            iat: issued_at.timestamp() as usize,
        };

        // Usa '?' para um tratamento de erro mais limpo
        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )?)
    }
}
