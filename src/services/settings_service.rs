// src/services/settings_service.rs

use crate::{
    common::error::AppError,
    db::SettingsRepository,
    models::settings::{ServiceAreaSettings, SettingsList},
};

#[derive(Clone)]
pub struct SettingsService {
    settings_repo: SettingsRepository,
}

impl SettingsService {
    pub fn new(settings_repo: SettingsRepository) -> Self {
        Self { settings_repo }
    }

    pub async fn get_settings(&self) -> Result<ServiceAreaSettings, AppError> {
        self.settings_repo.get_settings().await
    }

    // Substitui o documento inteiro (listas normalizadas).
    pub async fn replace_settings(&self, settings: ServiceAreaSettings) -> Result<ServiceAreaSettings, AppError> {
        let settings = settings.normalized();
        self.settings_repo
            .save_settings(&settings)
            .await
            .map_err(AppError::into_write_failure)?;
        tracing::info!(
            "Configurações salvas: {} CEPs padrão, {} com taxa, {} origens",
            settings.standard_zips.len(),
            settings.travel_fee_zips.len(),
            settings.customer_sources.len()
        );
        Ok(settings)
    }

    pub async fn add_entry(&self, list: &str, value: &str) -> Result<ServiceAreaSettings, AppError> {
        let list = SettingsList::parse(list)?;
        let mut settings = self.get_settings().await?;
        if settings.add_entry(list, value) {
            self.persist(&settings).await?;
        }
        Ok(settings)
    }

    pub async fn remove_entry(&self, list: &str, value: &str) -> Result<ServiceAreaSettings, AppError> {
        let list = SettingsList::parse(list)?;
        let mut settings = self.get_settings().await?;
        if settings.remove_entry(list, value) {
            self.persist(&settings).await?;
        }
        Ok(settings)
    }

    async fn persist(&self, settings: &ServiceAreaSettings) -> Result<(), AppError> {
        self.settings_repo
            .save_settings(settings)
            .await
            .map_err(AppError::into_write_failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DocumentStore, MemoryStore};
    use std::sync::Arc;

    fn service() -> (MemoryStore, SettingsService) {
        let store = MemoryStore::new();
        let shared: Arc<dyn DocumentStore> = Arc::new(store.clone());
        (store, SettingsService::new(SettingsRepository::new(shared)))
    }

    #[tokio::test]
    async fn missing_document_reads_as_empty_lists() {
        let (_, service) = service();
        assert_eq!(service.get_settings().await.unwrap(), ServiceAreaSettings::default());
    }

    #[tokio::test]
    async fn entries_are_added_sorted_and_removed() {
        let (_, service) = service();
        service.add_entry("standard-zips", "10002").await.unwrap();
        service.add_entry("standard-zips", " 10001 ").await.unwrap();
        let settings = service.add_entry("standard-zips", "10001").await.unwrap();
        assert_eq!(settings.standard_zips, vec!["10001", "10002"]);

        let settings = service.remove_entry("standard-zips", "10002").await.unwrap();
        assert_eq!(settings.standard_zips, vec!["10001"]);
        assert_eq!(service.get_settings().await.unwrap().standard_zips, vec!["10001"]);
    }

    #[tokio::test]
    async fn unknown_list_is_rejected() {
        let (_, service) = service();
        assert!(matches!(
            service.add_entry("colors", "red").await,
            Err(AppError::InvalidSettingsList(_))
        ));
    }

    #[tokio::test]
    async fn replace_normalizes_lists() {
        let (_, service) = service();
        let saved = service
            .replace_settings(ServiceAreaSettings {
                standard_zips: vec!["10002".into(), "10001".into(), "10001".into(), " ".into()],
                travel_fee_zips: vec![],
                customer_sources: vec!["Google".into()],
            })
            .await
            .unwrap();
        assert_eq!(saved.standard_zips, vec!["10001", "10002"]);
        assert_eq!(service.get_settings().await.unwrap(), saved);
    }

    #[tokio::test]
    async fn failed_writes_surface_as_write_failures() {
        let (store, service) = service();
        store.set_fail_writes(true);
        assert!(matches!(
            service.add_entry("customer-sources", "Yelp").await,
            Err(AppError::WriteFailure(_))
        ));
    }
}
