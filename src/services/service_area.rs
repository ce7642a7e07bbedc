// src/services/service_area.rs

use crate::{
    common::error::AppError,
    models::{
        account::{ServiceAreaInfo, ServiceAreaStatus},
        settings::ServiceAreaSettings,
    },
};

/// Classifica um CEP contra as listas do admin.
///
/// Menos de 5 caracteres é `Pristine` (ainda digitando). Um CEP presente nas
/// duas listas resolve como `Standard`, pela ordem de verificação.
pub fn classify_zip<S: AsRef<str>>(zip: &str, standard_zips: &[S], travel_fee_zips: &[S]) -> ServiceAreaStatus {
    if zip.chars().count() < 5 {
        ServiceAreaStatus::Pristine
    } else if standard_zips.iter().any(|z| z.as_ref() == zip) {
        ServiceAreaStatus::Standard
    } else if travel_fee_zips.iter().any(|z| z.as_ref() == zip) {
        ServiceAreaStatus::Travel
    } else {
        ServiceAreaStatus::OutOfArea
    }
}

// Portão de área de atendimento de um rascunho: status derivado + override da sessão.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAreaGate {
    zip: String,
    status: ServiceAreaStatus,
    override_: bool,
}

impl ServiceAreaGate {
    pub fn new(zip: &str, settings: &ServiceAreaSettings) -> Self {
        Self {
            zip: zip.to_string(),
            status: classify_zip(zip, &settings.standard_zips, &settings.travel_fee_zips),
            override_: false,
        }
    }

    // Retoma o portão de um documento salvo: status recalculado, override preservado.
    pub fn resume(zip: &str, settings: &ServiceAreaSettings, persisted: ServiceAreaInfo) -> Self {
        let mut gate = Self::new(zip, settings);
        gate.override_ = persisted.override_;
        gate
    }

    // Qualquer mudança de CEP zera o override.
    pub fn set_zip(&mut self, zip: &str, settings: &ServiceAreaSettings) {
        if zip != self.zip {
            *self = Self::new(zip, settings);
        }
    }

    pub fn set_override(&mut self, value: bool) {
        self.override_ = value;
    }

    pub fn info(&self) -> ServiceAreaInfo {
        ServiceAreaInfo {
            status: self.status,
            override_: self.override_,
        }
    }

    // Só `OutOfArea` sem override bloqueia o salvamento.
    pub fn check_save(&self) -> Result<ServiceAreaInfo, AppError> {
        if self.status == ServiceAreaStatus::OutOfArea && !self.override_ {
            return Err(AppError::OutOfServiceArea(self.zip.clone()));
        }
        Ok(self.info())
    }
}
