use std::sync::Arc;

use serde_json::Value;

use super::store::DocumentStore;
use crate::{common::error::AppError, models::settings::ServiceAreaSettings};

const SETTINGS: &str = "settings";
const SERVICE_AREA_ID: &str = "serviceArea";

#[derive(Clone)]
pub struct SettingsRepository {
    store: Arc<dyn DocumentStore>,
}

impl SettingsRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn get_settings(&self) -> Result<ServiceAreaSettings, AppError> {
        // Documento ausente é tratado como "vazio"
        match self.store.get_once(SETTINGS, SERVICE_AREA_ID).await? {
            Some(doc) => Ok(serde_json::from_value(doc.data)?),
            None => Ok(ServiceAreaSettings::default()),
        }
    }

    pub async fn save_settings(&self, settings: &ServiceAreaSettings) -> Result<(), AppError> {
        let fields = match serde_json::to_value(settings)? {
            Value::Object(fields) => fields,
            _ => {
                return Err(AppError::InternalServerError(anyhow::anyhow!(
                    "settings did not serialize to an object"
                )))
            }
        };
        self.store.set(SETTINGS, SERVICE_AREA_ID, fields).await
    }
}
