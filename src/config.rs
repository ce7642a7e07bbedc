// src/config.rs

use std::{env, sync::Arc, time::Duration};

use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use tokio::task::JoinHandle;

use crate::{
    db::{AccountRepository, DocumentStore, MemoryStore, PgDocumentStore, SettingsRepository, UserRepository},
    services::{
        account_service::AccountService, auth::AuthService, draft_service::DraftService,
        settings_service::SettingsService,
    },
};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_SESSION_SWEEP_SECS: u64 = 300;

// Configuração lida do ambiente (e do `.env`, se existir).
#[derive(Debug, Clone)]
pub struct AppConfig {
    // Sem DATABASE_URL o app roda com o store em memória
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub bcrypt_cost: u32,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    // Intervalo da limpeza de sessões com token expirado
    pub session_sweep_every: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET deve ser definido")?;
        let bcrypt_cost: u32 = match env::var("BCRYPT_COST") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("BCRYPT_COST inválido: {}", raw))?,
            Err(_) => bcrypt::DEFAULT_COST,
        };
        let session_sweep_secs: u64 = match env::var("QUASAR_SESSION_SWEEP_SECS") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("QUASAR_SESSION_SWEEP_SECS inválido: {}", raw))?,
            Err(_) => DEFAULT_SESSION_SWEEP_SECS,
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            jwt_secret,
            bind_addr: env::var("QUASAR_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            bcrypt_cost,
            admin_email: env::var("QUASAR_ADMIN_EMAIL").ok(),
            admin_password: env::var("QUASAR_ADMIN_PASSWORD").ok(),
            session_sweep_every: Duration::from_secs(session_sweep_secs.max(1)),
        })
    }
}

// O estado compartilhado que será acessível em toda a aplicação
#[derive(Clone)]
pub struct AppState {
    pub auth_service: AuthService,
    pub account_service: AccountService,
    pub draft_service: DraftService,
    pub settings_service: SettingsService,
}

impl AppState {
    pub async fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn DocumentStore> = match &config.database_url {
            Some(database_url) => {
                // Conecta ao banco de dados, usando '?' para propagar erros
                let db_pool = PgPoolOptions::new()
                    .max_connections(5)
                    .acquire_timeout(Duration::from_secs(3))
                    .connect(database_url)
                    .await?;
                tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

                sqlx::migrate!().run(&db_pool).await?;
                tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

                // Uma conexão do pool fica reservada para o LISTEN
                Arc::new(PgDocumentStore::connect(db_pool).await?)
            }
            None => {
                tracing::warn!("DATABASE_URL ausente: usando o store em memória (dados não persistem)");
                Arc::new(MemoryStore::new())
            }
        };

        let state = Self::with_store(store, config.jwt_secret.clone(), config.bcrypt_cost);

        if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
            state.auth_service.bootstrap_admin(email, password).await?;
        }

        Ok(state)
    }

    // --- Monta o gráfico de dependências ---
    pub fn with_store(store: Arc<dyn DocumentStore>, jwt_secret: String, bcrypt_cost: u32) -> Self {
        let user_repo = UserRepository::new(store.clone());
        let account_repo = AccountRepository::new(store.clone());
        let settings_repo = SettingsRepository::new(store);

        let auth_service = AuthService::new(user_repo, jwt_secret, bcrypt_cost);
        let draft_service = DraftService::new(account_repo.clone(), settings_repo.clone());
        let account_service = AccountService::new(account_repo, settings_repo.clone(), draft_service.clone());
        let settings_service = SettingsService::new(settings_repo);

        Self {
            auth_service,
            account_service,
            draft_service,
            settings_service,
        }
    }

    // Remove as sessões com token vencido e fecha os rascunhos de quem ficou sem sessão.
    pub async fn sweep_expired_sessions(&self, now: DateTime<Utc>) -> usize {
        let orphaned = self.auth_service.prune_expired(now).await;
        let mut closed = 0;
        for uid in orphaned {
            closed += self.draft_service.close_all(uid).await;
        }
        if closed > 0 {
            tracing::info!("{} rascunhos fechados por sessão expirada", closed);
        }
        closed
    }

    pub fn spawn_session_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let state = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(every).await;
                state.sweep_expired_sessions(Utc::now()).await;
            }
        })
    }
}
