// src/db/pg_store.rs

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{postgres::PgListener, PgPool};
use tokio::{sync::broadcast, task::JoinHandle};
use uuid::Uuid;

use super::store::{
    feed_subscription, Change, Direction, Document, DocumentStore, LiveQuery, Query, Snapshot,
    Subscription, CREATED_AT_FIELD,
};
use crate::common::error::AppError;

// Canal do NOTIFY disparado pelo trigger da tabela `documents` (ver migrations/)
const CHANGES_CHANNEL: &str = "document_changes";
const LISTEN_RETRY_DELAY: Duration = Duration::from_secs(1);

// O único LISTEN do store; morre junto com o último clone
struct ChangeRelay(JoinHandle<()>);

impl Drop for ChangeRelay {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Store de documentos sobre uma tabela JSONB do Postgres.
///
/// Uma só conexão fica em LISTEN; as assinaturas filtram o `broadcast`
/// alimentado por ela e recarregam os snapshots pelo pool.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
    changes: broadcast::Sender<Change>,
    _relay: Arc<ChangeRelay>,
}

impl PgDocumentStore {
    pub async fn connect(pool: PgPool) -> Result<Self, AppError> {
        let mut listener = PgListener::connect_with(&pool).await?;
        listener.listen(CHANGES_CHANNEL).await?;

        let (changes, _rx) = broadcast::channel(256);
        let relay = tokio::spawn(relay_notifications(listener, changes.clone()));
        tracing::info!("✅ LISTEN {} ativo", CHANGES_CHANNEL);

        Ok(Self {
            pool,
            changes,
            _relay: Arc::new(ChangeRelay(relay)),
        })
    }

    async fn run_query(pool: &PgPool, query: &Query) -> Result<Vec<Document>, AppError> {
        let mut sql = String::from("SELECT id, data FROM documents WHERE collection = $1");
        let mut binds: Vec<&str> = vec![query.collection.as_str()];

        if let Some(field) = &query.not_null {
            binds.push(field.as_str());
            sql.push_str(&format!(
                " AND COALESCE(data->${}, 'null'::jsonb) <> 'null'::jsonb",
                binds.len()
            ));
        }

        match &query.order_by {
            Some((field, direction)) => {
                binds.push(field.as_str());
                let keyword = match direction {
                    Direction::Asc => "ASC",
                    Direction::Desc => "DESC",
                };
                sql.push_str(&format!(" ORDER BY data->${} {}, id", binds.len(), keyword));
            }
            None => sql.push_str(" ORDER BY id"),
        }

        let mut statement = sqlx::query_as::<_, (String, Value)>(&sql);
        for bind in binds {
            statement = statement.bind(bind);
        }

        let rows = statement.fetch_all(pool).await?;
        Ok(rows.into_iter().map(|(id, data)| Document { id, data }).collect())
    }

    async fn fetch_one(pool: &PgPool, collection: &str, id: &str) -> Result<Option<Document>, AppError> {
        let row = sqlx::query_as::<_, (String, Value)>(
            "SELECT id, data FROM documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(|(id, data)| Document { id, data }))
    }

    async fn snapshot(pool: &PgPool, live: &LiveQuery) -> Result<Snapshot, AppError> {
        match live {
            LiveQuery::Document { collection, id } => {
                Ok(Self::fetch_one(pool, collection, id).await?.into_iter().collect())
            }
            LiveQuery::Collection(query) => Self::run_query(pool, query).await,
        }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get_once(&self, collection: &str, id: &str) -> Result<Option<Document>, AppError> {
        Self::fetch_one(&self.pool, collection, id).await
    }

    async fn create(&self, collection: &str, data: Map<String, Value>) -> Result<String, AppError> {
        let id = Uuid::new_v4().simple().to_string();

        // O createdAt é do servidor: vem do NOW() do banco, no mesmo formato do store em memória
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data)
            VALUES ($1, $2, $3 || jsonb_build_object(
                $4::text,
                to_char(NOW() AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS.US"Z"')
            ))
            "#,
        )
        .bind(collection)
        .bind(&id)
        .bind(Value::Object(data))
        .bind(CREATED_AT_FIELD)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, data: Map<String, Value>) -> Result<(), AppError> {
        // UPSERT (Insert or Update)
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id)
            DO UPDATE SET data = EXCLUDED.data, updated_at = NOW()
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(Value::Object(data))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Map<String, Value>) -> Result<(), AppError> {
        // `||` do jsonb faz exatamente a mescla de primeiro nível
        let result = sqlx::query(
            "UPDATE documents SET data = data || $3, updated_at = NOW() WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .bind(Value::Object(fields))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::DocumentNotFound(format!("{}/{}", collection, id)));
        }
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, AppError> {
        Self::run_query(&self.pool, query).await
    }

    async fn subscribe(&self, live: LiveQuery) -> Result<Subscription, AppError> {
        // Assina o feed antes do snapshot inicial
        let changes = self.changes.subscribe();
        let initial = Self::snapshot(&self.pool, &live).await?;
        let pool = self.pool.clone();

        Ok(feed_subscription(live, changes, initial, move |live| {
            let pool = pool.clone();
            async move { Self::snapshot(&pool, &live).await }
        }))
    }
}

// Cada NOTIFY traz "colecao/id"
fn parse_change(payload: &str) -> Option<Change> {
    let (collection, id) = payload.split_once('/')?;
    if collection.is_empty() || id.is_empty() {
        return None;
    }
    Some(Change {
        collection: collection.to_string(),
        id: id.to_string(),
    })
}

async fn relay_notifications(mut listener: PgListener, changes: broadcast::Sender<Change>) {
    loop {
        match listener.recv().await {
            Ok(notification) => match parse_change(notification.payload()) {
                // Sem assinantes o envio falha, e tudo bem
                Some(change) => {
                    let _ = changes.send(change);
                }
                None => tracing::warn!("NOTIFY ignorado: {:?}", notification.payload()),
            },
            // O PgListener reconecta sozinho na próxima chamada
            Err(e) => {
                tracing::error!("🔥 Falha no LISTEN {}: {:?}", CHANGES_CHANNEL, e);
                tokio::time::sleep(LISTEN_RETRY_DELAY).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_payload_names_collection_and_document() {
        assert_eq!(
            parse_change("accounts/5f2c"),
            Some(Change {
                collection: "accounts".into(),
                id: "5f2c".into()
            })
        );
        // Só a primeira barra separa
        assert_eq!(parse_change("settings/a/b").map(|c| c.id), Some("a/b".to_string()));
        assert_eq!(parse_change("accounts"), None);
        assert_eq!(parse_change("/x"), None);
    }
}
