// src/db/memory_store.rs

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use super::store::{
    feed_subscription, timestamp_value, Change, Document, DocumentStore, LiveQuery, Query, Snapshot,
    Subscription, CREATED_AT_FIELD,
};
use crate::common::error::AppError;

struct Inner {
    collections: RwLock<HashMap<String, HashMap<String, Value>>>,
    changes: broadcast::Sender<Change>,
    fail_writes: AtomicBool,
}

// Store em memória: usado em desenvolvimento (sem DATABASE_URL) e nos testes.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        let (changes, _rx) = broadcast::channel(256);
        Self {
            inner: Arc::new(Inner {
                collections: RwLock::new(HashMap::new()),
                changes,
                fail_writes: AtomicBool::new(false),
            }),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Simula queda de conexão: toda escrita passa a falhar
    #[cfg(test)]
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        self.inner.changes.receiver_count()
    }

    fn check_writable(&self) -> Result<(), AppError> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::InternalServerError(anyhow::anyhow!(
                "memory store is rejecting writes"
            )));
        }
        Ok(())
    }

    fn notify(&self, collection: &str, id: &str) {
        // Sem assinantes o envio falha, e tudo bem
        let _ = self.inner.changes.send(Change {
            collection: collection.to_string(),
            id: id.to_string(),
        });
    }

    async fn snapshot(&self, live: &LiveQuery) -> Snapshot {
        let collections = self.inner.collections.read().await;
        match live {
            LiveQuery::Document { collection, id } => collections
                .get(collection)
                .and_then(|docs| docs.get(id))
                .map(|data| Document {
                    id: id.clone(),
                    data: data.clone(),
                })
                .into_iter()
                .collect(),
            LiveQuery::Collection(query) => query.apply(Self::documents_of(&collections, &query.collection)),
        }
    }

    fn documents_of(collections: &HashMap<String, HashMap<String, Value>>, collection: &str) -> Vec<Document> {
        collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, data)| Document {
                        id: id.clone(),
                        data: data.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_once(&self, collection: &str, id: &str) -> Result<Option<Document>, AppError> {
        let collections = self.inner.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|data| Document {
                id: id.to_string(),
                data: data.clone(),
            }))
    }

    async fn create(&self, collection: &str, mut data: Map<String, Value>) -> Result<String, AppError> {
        self.check_writable()?;
        let id = Uuid::new_v4().simple().to_string();
        data.insert(CREATED_AT_FIELD.to_string(), timestamp_value(Utc::now()));

        self.inner
            .collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), Value::Object(data));

        self.notify(collection, &id);
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, data: Map<String, Value>) -> Result<(), AppError> {
        self.check_writable()?;
        self.inner
            .collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), Value::Object(data));

        self.notify(collection, id);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Map<String, Value>) -> Result<(), AppError> {
        self.check_writable()?;
        {
            let mut collections = self.inner.collections.write().await;
            let existing = collections
                .get_mut(collection)
                .and_then(|docs| docs.get_mut(id))
                .and_then(|data| data.as_object_mut())
                .ok_or_else(|| AppError::DocumentNotFound(format!("{}/{}", collection, id)))?;

            // Mescla de primeiro nível: o último a escrever vence, campo a campo
            for (key, value) in fields {
                existing.insert(key, value);
            }
        }

        self.notify(collection, id);
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, AppError> {
        let collections = self.inner.collections.read().await;
        Ok(query.apply(Self::documents_of(&collections, &query.collection)))
    }

    async fn subscribe(&self, live: LiveQuery) -> Result<Subscription, AppError> {
        // Assina antes de tirar o snapshot inicial para não perder alterações no meio
        let changes = self.inner.changes.subscribe();
        let initial = self.snapshot(&live).await;
        let store = self.clone();

        Ok(feed_subscription(live, changes, initial, move |live| {
            let store = store.clone();
            async move { Ok(store.snapshot(&live).await) }
        }))
    }
}
