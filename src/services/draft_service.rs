// src/services/draft_service.rs

use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use tokio::{
    sync::{Mutex, MutexGuard},
    task::JoinHandle,
};
use uuid::Uuid;

use super::account_editor::{AccountEditor, DraftView};
use crate::{
    common::error::AppError,
    db::{AccountRepository, SettingsRepository, Subscription},
    models::account::Account,
};

// Rascunho aberto: o editor e a task que consome os snapshots da conta.
pub struct LiveDraft {
    editor: Arc<Mutex<AccountEditor>>,
    consumer: JoinHandle<()>,
}

impl LiveDraft {
    async fn open(repo: &AccountRepository, settings_repo: &SettingsRepository, account_id: &str) -> Result<Self, AppError> {
        let mut subscription = repo.subscribe(account_id).await?;

        // O primeiro snapshot é o estado atual do documento
        let account = match subscription.next().await {
            Some(snapshot) => first_account(snapshot)?,
            None => None,
        }
        .ok_or_else(|| AppError::AccountNotFound(account_id.to_string()))?;

        let settings = settings_repo.get_settings().await?;
        let editor = Arc::new(Mutex::new(AccountEditor::new(account, settings)));
        let consumer = tokio::spawn(consume_snapshots(subscription, editor.clone()));

        Ok(Self { editor, consumer })
    }

    pub async fn lock(&self) -> MutexGuard<'_, AccountEditor> {
        self.editor.lock().await
    }
}

impl Drop for LiveDraft {
    fn drop(&mut self) {
        // Descarta a assinatura junto com a task
        self.consumer.abort();
    }
}

fn first_account(snapshot: Vec<crate::db::Document>) -> Result<Option<Account>, AppError> {
    snapshot
        .into_iter()
        .next()
        .map(AccountRepository::from_document)
        .transpose()
}

async fn consume_snapshots(mut subscription: Subscription, editor: Arc<Mutex<AccountEditor>>) {
    while let Some(snapshot) = subscription.next().await {
        match first_account(snapshot) {
            Ok(Some(account)) => {
                let mut editor = editor.lock().await;
                let account_id = account.id.clone();
                if !editor.apply_snapshot(account) {
                    tracing::debug!("Snapshot de {} ignorado: rascunho em edição", account_id);
                }
            }
            Ok(None) => tracing::warn!("Conta removida enquanto o rascunho estava aberto"),
            Err(e) => tracing::warn!("Snapshot de conta ilegível: {}", e),
        }
    }
}

type DraftKey = (Uuid, String);

/// Rascunhos abertos, um por (usuário, conta).
#[derive(Clone)]
pub struct DraftService {
    drafts: Arc<Mutex<HashMap<DraftKey, Arc<LiveDraft>>>>,
    account_repo: AccountRepository,
    settings_repo: SettingsRepository,
}

impl DraftService {
    pub fn new(account_repo: AccountRepository, settings_repo: SettingsRepository) -> Self {
        Self {
            drafts: Arc::new(Mutex::new(HashMap::new())),
            account_repo,
            settings_repo,
        }
    }

    // Abre (ou reaproveita) o rascunho da conta para o usuário.
    pub async fn open(&self, uid: Uuid, account_id: &str) -> Result<DraftView, AppError> {
        let key = (uid, account_id.to_string());
        let existing = self.drafts.lock().await.get(&key).cloned();
        if let Some(draft) = existing {
            return Ok(draft.lock().await.view());
        }

        let draft = Arc::new(LiveDraft::open(&self.account_repo, &self.settings_repo, account_id).await?);
        let view = draft.lock().await.view();

        // Outra requisição pode ter aberto o mesmo rascunho enquanto esperávamos
        let mut drafts = self.drafts.lock().await;
        if let Some(existing) = drafts.get(&key).cloned() {
            drop(drafts);
            return Ok(existing.lock().await.view());
        }
        drafts.insert(key, draft);
        tracing::info!("Rascunho aberto: conta {} por {}", account_id, uid);
        Ok(view)
    }

    async fn get(&self, uid: Uuid, account_id: &str) -> Result<Arc<LiveDraft>, AppError> {
        self.drafts
            .lock()
            .await
            .get(&(uid, account_id.to_string()))
            .cloned()
            .ok_or_else(|| AppError::DraftNotFound(account_id.to_string()))
    }

    pub async fn view(&self, uid: Uuid, account_id: &str) -> Result<DraftView, AppError> {
        let draft = self.get(uid, account_id).await?;
        let view = draft.lock().await.view();
        Ok(view)
    }

    // Fecha o rascunho. A assinatura é cancelada quando o último `Arc` cai.
    pub async fn close(&self, uid: Uuid, account_id: &str) -> Result<(), AppError> {
        self.drafts
            .lock()
            .await
            .remove(&(uid, account_id.to_string()))
            .map(|_| ())
            .ok_or_else(|| AppError::DraftNotFound(account_id.to_string()))
    }

    // Fecha todos os rascunhos de um usuário (logout).
    pub async fn close_all(&self, uid: Uuid) -> usize {
        let mut drafts = self.drafts.lock().await;
        let before = drafts.len();
        drafts.retain(|(owner, _), _| *owner != uid);
        before - drafts.len()
    }

    pub async fn is_editing(&self, uid: Uuid, account_id: &str) -> bool {
        match self.get(uid, account_id).await {
            Ok(draft) => draft.lock().await.is_editing(),
            Err(_) => false,
        }
    }

    pub async fn begin_edit(&self, uid: Uuid, account_id: &str) -> Result<DraftView, AppError> {
        let draft = self.get(uid, account_id).await?;
        // Listas atualizadas a cada entrada no modo de edição
        let settings = self.settings_repo.get_settings().await?;
        let mut editor = draft.lock().await;
        editor.begin_edit(settings);
        Ok(editor.view())
    }

    pub async fn cancel_edit(&self, uid: Uuid, account_id: &str) -> Result<DraftView, AppError> {
        self.edit(uid, account_id, |editor| {
            editor.cancel_edit();
            Ok(())
        })
        .await
        .map(|(_, view)| view)
    }

    // Aplica uma mutação ao rascunho e devolve o resultado com o estado novo.
    pub async fn edit<T, F>(&self, uid: Uuid, account_id: &str, mutation: F) -> Result<(T, DraftView), AppError>
    where
        F: FnOnce(&mut AccountEditor) -> Result<T, AppError>,
    {
        let draft = self.get(uid, account_id).await?;
        let mut editor = draft.lock().await;
        let output = mutation(&mut editor)?;
        Ok((output, editor.view()))
    }

    /// Salva o rascunho. Em falha de escrita o rascunho e o modo de edição ficam intactos.
    pub async fn save(&self, uid: Uuid, account_id: &str) -> Result<DraftView, AppError> {
        let draft = self.get(uid, account_id).await?;
        // O lock fica com a gente durante a escrita: o eco chega depois de `finish_save`
        let mut editor = draft.lock().await;
        let pending = editor.prepare_save(Utc::now())?;

        if let Err(e) = self
            .account_repo
            .update_fields(account_id, pending.fields.clone())
            .await
        {
            tracing::error!("Falha ao salvar a conta {}: {}", account_id, e);
            return Err(e.into_write_failure());
        }

        if pending.archived_address {
            tracing::info!("Endereço anterior da conta {} arquivado", account_id);
        }
        editor.finish_save(pending);
        Ok(editor.view())
    }
}
