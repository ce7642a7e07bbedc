use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use super::store::DocumentStore;
use crate::{
    common::error::AppError,
    models::auth::{Credentials, Role, UserRecord},
};

const CREDENTIALS: &str = "credentials";
const USERS: &str = "users";

// O repositório de usuários: credenciais (provedor de identidade) e papéis
#[derive(Clone)]
pub struct UserRepository {
    store: Arc<dyn DocumentStore>,
}

impl UserRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    // O e-mail é a chave do documento de credenciais
    fn credentials_key(email: &str) -> String {
        email.trim().to_lowercase()
    }

    // Busca as credenciais pelo e-mail
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Credentials>, AppError> {
        self.store
            .get_once(CREDENTIALS, &Self::credentials_key(email))
            .await?
            .map(|doc| serde_json::from_value(doc.data).map_err(AppError::from))
            .transpose()
    }

    // Cria as credenciais de um novo usuário
    pub async fn create_credentials(&self, email: &str, password_hash: &str) -> Result<Credentials, AppError> {
        if self.find_by_email(email).await?.is_some() {
            return Err(AppError::EmailAlreadyExists);
        }

        let credentials = Credentials {
            uid: Uuid::new_v4(),
            email: Self::credentials_key(email),
            password_hash: password_hash.to_string(),
        };
        self.store
            .set(CREDENTIALS, &credentials.email, into_object(serde_json::to_value(&credentials)?)?)
            .await?;

        Ok(credentials)
    }

    // Papel do usuário. Registro ausente (ou ilegível) significa "sem papel", não erro.
    pub async fn find_role(&self, uid: Uuid) -> Result<Option<Role>, AppError> {
        let Some(doc) = self.store.get_once(USERS, &uid.to_string()).await? else {
            return Ok(None);
        };
        match serde_json::from_value::<UserRecord>(doc.data) {
            Ok(record) => Ok(Some(record.role)),
            Err(e) => {
                tracing::warn!("Registro de papel ilegível para {}: {}", uid, e);
                Ok(None)
            }
        }
    }

    pub async fn set_role(&self, uid: Uuid, role: Role) -> Result<(), AppError> {
        let record = serde_json::to_value(UserRecord { role })?;
        self.store.set(USERS, &uid.to_string(), into_object(record)?).await
    }
}

fn into_object(value: Value) -> Result<serde_json::Map<String, Value>, AppError> {
    match value {
        Value::Object(fields) => Ok(fields),
        _ => Err(AppError::InternalServerError(anyhow::anyhow!("expected a JSON object"))),
    }
}
