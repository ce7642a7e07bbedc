// src/db/account_repo.rs

use std::sync::Arc;

use serde_json::{Map, Value};

use super::store::{Direction, Document, DocumentStore, LiveQuery, Query, Subscription, CREATED_AT_FIELD};
use crate::{common::error::AppError, models::account::Account};

pub const ACCOUNTS: &str = "accounts";

// O repositório de contas, responsável pela coleção 'accounts'
#[derive(Clone)]
pub struct AccountRepository {
    store: Arc<dyn DocumentStore>,
}

impl AccountRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    // Converte um documento do store numa conta (o id vem de fora do corpo).
    pub fn from_document(doc: Document) -> Result<Account, AppError> {
        let mut account: Account = serde_json::from_value(doc.data)?;
        account.id = doc.id;
        Ok(account)
    }

    // Corpo do documento: sem `id` e sem `createdAt`, que pertencem ao store.
    pub fn to_fields(account: &Account) -> Result<Map<String, Value>, AppError> {
        match serde_json::to_value(account)? {
            Value::Object(mut fields) => {
                fields.remove("id");
                fields.remove(CREATED_AT_FIELD);
                Ok(fields)
            }
            _ => Err(AppError::InternalServerError(anyhow::anyhow!(
                "account did not serialize to an object"
            ))),
        }
    }

    // Busca uma conta pelo seu ID
    pub async fn find_by_id(&self, id: &str) -> Result<Option<Account>, AppError> {
        self.store
            .get_once(ACCOUNTS, id)
            .await?
            .map(Self::from_document)
            .transpose()
    }

    pub async fn create(&self, account: &Account) -> Result<String, AppError> {
        let fields = Self::to_fields(account)?;
        self.store.create(ACCOUNTS, fields).await
    }

    // Escrita parcial: só os campos de primeiro nível que mudaram
    pub async fn update_fields(&self, id: &str, fields: Map<String, Value>) -> Result<(), AppError> {
        self.store
            .update(ACCOUNTS, id, fields)
            .await
            .map_err(|e| match e {
                AppError::DocumentNotFound(_) => AppError::AccountNotFound(id.to_string()),
                other => other,
            })
    }

    pub fn recent_query() -> Query {
        Query::collection(ACCOUNTS).order_by(CREATED_AT_FIELD, Direction::Desc)
    }

    pub fn follow_up_query() -> Query {
        Query::collection(ACCOUNTS)
            .where_not_null("followUpDate")
            .order_by("followUpDate", Direction::Asc)
    }

    pub async fn list(&self, query: &Query) -> Result<Vec<Account>, AppError> {
        self.store
            .query(query)
            .await?
            .into_iter()
            .map(Self::from_document)
            .collect()
    }

    pub async fn subscribe(&self, id: &str) -> Result<Subscription, AppError> {
        self.store.subscribe(LiveQuery::document(ACCOUNTS, id)).await
    }

    // Lista ao vivo: a consulta inteira é reenviada a cada mudança na coleção
    pub async fn subscribe_list(&self, query: Query) -> Result<Subscription, AppError> {
        self.store.subscribe(LiveQuery::Collection(query)).await
    }
}
