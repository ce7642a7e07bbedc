// src/db/store.rs

use std::{cmp::Ordering, future::Future};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};

use crate::common::{error::AppError, format::format_timestamp};

// Campo preenchido pelo próprio store na criação do documento.
pub const CREATED_AT_FIELD: &str = "createdAt";

// Aviso de escrita: qual documento mudou
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub collection: String,
    pub id: String,
}

// Um documento: id + corpo JSON (sempre um objeto)
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

// Consulta sobre uma coleção: ordenação por um campo + filtro "campo não nulo"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub collection: String,
    pub order_by: Option<(String, Direction)>,
    pub not_null: Option<String>,
}

impl Query {
    pub fn collection(name: &str) -> Self {
        Self {
            collection: name.to_string(),
            order_by: None,
            not_null: None,
        }
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some((field.to_string(), direction));
        self
    }

    pub fn where_not_null(mut self, field: &str) -> Self {
        self.not_null = Some(field.to_string());
        self
    }

    // Aplica filtro e ordenação sobre documentos já carregados.
    pub fn apply(&self, docs: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut result: Vec<Document> = docs
            .into_iter()
            .filter(|doc| match &self.not_null {
                Some(field) => !doc.data.get(field).unwrap_or(&Value::Null).is_null(),
                None => true,
            })
            .collect();

        match &self.order_by {
            Some((field, direction)) => result.sort_by(|a, b| {
                let ord = compare_values(
                    a.data.get(field).unwrap_or(&Value::Null),
                    b.data.get(field).unwrap_or(&Value::Null),
                );
                let ord = match direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                };
                ord.then_with(|| a.id.cmp(&b.id))
            }),
            None => result.sort_by(|a, b| a.id.cmp(&b.id)),
        }

        result
    }
}

// O que uma assinatura acompanha: um documento ou uma consulta
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveQuery {
    Document { collection: String, id: String },
    Collection(Query),
}

impl LiveQuery {
    pub fn document(collection: &str, id: &str) -> Self {
        LiveQuery::Document {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    pub fn collection_name(&self) -> &str {
        match self {
            LiveQuery::Document { collection, .. } => collection,
            LiveQuery::Collection(query) => &query.collection,
        }
    }

    // A alteração em `collection/id` afeta esta assinatura?
    pub fn is_affected_by(&self, collection: &str, id: &str) -> bool {
        match self {
            LiveQuery::Document { collection: c, id: i } => c == collection && i == id,
            LiveQuery::Collection(query) => query.collection == collection,
        }
    }
}

// Resultado completo de uma consulta num instante (0 ou 1 documento para `LiveQuery::Document`)
pub type Snapshot = Vec<Document>;

/// Assinatura de uma consulta ao vivo.
///
/// Ao ser descartada, a task que alimenta o canal é abortada na hora:
/// nenhum callback fica pendurado depois que o dono some.
pub struct Subscription {
    receiver: mpsc::Receiver<Snapshot>,
    feeder: JoinHandle<()>,
}

impl Subscription {
    pub fn new(receiver: mpsc::Receiver<Snapshot>, feeder: JoinHandle<()>) -> Self {
        Self { receiver, feeder }
    }

    // `None` quando a fonte encerrou
    pub async fn next(&mut self) -> Option<Snapshot> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.feeder.abort();
    }
}

/// Alimenta uma assinatura a partir do feed de alterações compartilhado do store.
///
/// Envia `initial` e, a cada alteração que afeta `live`, recarrega o snapshot
/// com `reload`. Todas as assinaturas de um store escutam o mesmo `broadcast`.
pub fn feed_subscription<F, Fut>(
    live: LiveQuery,
    mut changes: broadcast::Receiver<Change>,
    initial: Snapshot,
    reload: F,
) -> Subscription
where
    F: Fn(LiveQuery) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Snapshot, AppError>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(16);

    let feeder = tokio::spawn(async move {
        if tx.send(initial).await.is_err() {
            return;
        }
        loop {
            match changes.recv().await {
                Ok(change) if live.is_affected_by(&change.collection, &change.id) => {}
                Ok(_) => continue,
                // Perdemos notificações: reenviar o estado atual resolve
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Assinatura atrasada, {} notificações descartadas", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }

            match reload(live.clone()).await {
                Ok(snapshot) => {
                    if tx.send(snapshot).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!("Falha ao recarregar snapshot de {}: {}", live.collection_name(), e),
            }
        }
    });

    Subscription::new(rx, feeder)
}

// O contrato do banco de documentos (memória ou Postgres)
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_once(&self, collection: &str, id: &str) -> Result<Option<Document>, AppError>;

    /// Cria com id gerado e `createdAt` atribuído pelo store. Retorna o id.
    async fn create(&self, collection: &str, data: Map<String, Value>) -> Result<String, AppError>;

    /// Escreve o documento inteiro (cria se não existir).
    async fn set(&self, collection: &str, id: &str, data: Map<String, Value>) -> Result<(), AppError>;

    /// Mescla campos de primeiro nível. `DocumentNotFound` se o documento não existe.
    async fn update(&self, collection: &str, id: &str, fields: Map<String, Value>) -> Result<(), AppError>;

    async fn query(&self, query: &Query) -> Result<Vec<Document>, AppError>;

    async fn subscribe(&self, live: LiveQuery) -> Result<Subscription, AppError>;
}

// Formato único de timestamp gravado nos documentos (ordenável como texto)
pub fn timestamp_value(at: DateTime<Utc>) -> Value {
    Value::String(format_timestamp(&at))
}

// null < bool < número < texto < resto
fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            _ => 4,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or_default();
            let y = y.as_f64().unwrap_or_default();
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering as AtomicOrdering},
            Arc,
        },
        time::Duration,
    };

    fn doc(id: &str, data: Value) -> Document {
        Document { id: id.to_string(), data }
    }

    #[test]
    fn orders_descending_and_breaks_ties_by_id() {
        let docs = vec![
            doc("a", json!({"createdAt": "2025-01-01T00:00:00.000000Z"})),
            doc("c", json!({"createdAt": "2025-03-01T00:00:00.000000Z"})),
            doc("b", json!({"createdAt": "2025-03-01T00:00:00.000000Z"})),
        ];
        let ids: Vec<String> = Query::collection("accounts")
            .order_by(CREATED_AT_FIELD, Direction::Desc)
            .apply(docs)
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn not_null_filter_drops_missing_and_null_fields() {
        let docs = vec![
            doc("a", json!({"followUpDate": null})),
            doc("b", json!({})),
            doc("c", json!({"followUpDate": "2025-02-01T00:00:00.000000Z"})),
        ];
        let result = Query::collection("accounts")
            .where_not_null("followUpDate")
            .order_by("followUpDate", Direction::Asc)
            .apply(docs);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "c");
    }

    #[test]
    fn live_document_queries_only_react_to_their_document() {
        let live = LiveQuery::document("accounts", "a1");
        assert!(live.is_affected_by("accounts", "a1"));
        assert!(!live.is_affected_by("accounts", "a2"));
        assert!(!live.is_affected_by("settings", "a1"));

        let list = LiveQuery::Collection(Query::collection("accounts"));
        assert!(list.is_affected_by("accounts", "anything"));
    }

    fn change(collection: &str, id: &str) -> Change {
        Change {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    #[tokio::test]
    async fn many_subscriptions_share_one_change_feed() {
        let (changes, _) = broadcast::channel(16);
        let reloads = Arc::new(AtomicUsize::new(0));

        let mut subscriptions: Vec<Subscription> = (0..8)
            .map(|i| {
                let reloads = reloads.clone();
                let live = LiveQuery::document("accounts", &format!("a{}", i));
                feed_subscription(live, changes.subscribe(), vec![], move |live| {
                    let reloads = reloads.clone();
                    async move {
                        reloads.fetch_add(1, AtomicOrdering::SeqCst);
                        let LiveQuery::Document { id, .. } = live else {
                            return Ok(vec![]);
                        };
                        Ok(vec![doc(&id, json!({"v": 2}))])
                    }
                })
            })
            .collect();
        assert_eq!(changes.receiver_count(), 8);

        for sub in subscriptions.iter_mut() {
            assert!(sub.next().await.unwrap().is_empty());
        }

        changes.send(change("accounts", "a3")).unwrap();
        let snapshot = subscriptions[3].next().await.unwrap();
        assert_eq!(snapshot[0].id, "a3");

        // Só a assinatura afetada recarregou
        let waited = tokio::time::timeout(Duration::from_millis(50), subscriptions[4].next()).await;
        assert!(waited.is_err());
        assert_eq!(reloads.load(AtomicOrdering::SeqCst), 1);

        drop(subscriptions);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(changes.receiver_count(), 0);
    }

    #[tokio::test]
    async fn reload_failures_keep_the_subscription_alive() {
        let (changes, _) = broadcast::channel(16);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut sub = feed_subscription(
            LiveQuery::document("accounts", "a1"),
            changes.subscribe(),
            vec![],
            move |_| {
                let attempt = counter.fetch_add(1, AtomicOrdering::SeqCst);
                async move {
                    if attempt == 0 {
                        Err(AppError::InternalServerError(anyhow::anyhow!("connection reset")))
                    } else {
                        Ok(vec![doc("a1", json!({}))])
                    }
                }
            },
        );
        sub.next().await.unwrap();

        changes.send(change("accounts", "a1")).unwrap();
        changes.send(change("accounts", "a1")).unwrap();
        let snapshot = sub.next().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 2);
    }
}
