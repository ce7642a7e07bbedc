// src/models/settings.rs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::common::error::AppError;

// Documento único `settings/serviceArea`, mantido pelo admin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAreaSettings {
    #[serde(default)]
    #[schema(example = json!(["10001", "10002"]))]
    pub standard_zips: Vec<String>,

    #[serde(default)]
    #[schema(example = json!(["10701"]))]
    pub travel_fee_zips: Vec<String>,

    #[serde(default)]
    #[schema(example = json!(["Referral", "Google"]))]
    pub customer_sources: Vec<String>,
}

// Qual das listas do documento está sendo editada
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsList {
    StandardZips,
    TravelFeeZips,
    CustomerSources,
}

impl SettingsList {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw {
            "standard-zips" => Ok(SettingsList::StandardZips),
            "travel-fee-zips" => Ok(SettingsList::TravelFeeZips),
            "customer-sources" => Ok(SettingsList::CustomerSources),
            other => Err(AppError::InvalidSettingsList(other.to_string())),
        }
    }
}

impl ServiceAreaSettings {
    pub fn list_mut(&mut self, list: SettingsList) -> &mut Vec<String> {
        match list {
            SettingsList::StandardZips => &mut self.standard_zips,
            SettingsList::TravelFeeZips => &mut self.travel_fee_zips,
            SettingsList::CustomerSources => &mut self.customer_sources,
        }
    }

    // Adiciona mantendo a lista ordenada e sem duplicatas. Entrada em branco é ignorada.
    // Retorna `true` quando a lista mudou.
    pub fn add_entry(&mut self, list: SettingsList, value: &str) -> bool {
        let value = value.trim();
        if value.is_empty() {
            return false;
        }
        let entries = self.list_mut(list);
        if entries.iter().any(|entry| entry == value) {
            return false;
        }
        entries.push(value.to_string());
        entries.sort();
        true
    }

    pub fn remove_entry(&mut self, list: SettingsList, value: &str) -> bool {
        let entries = self.list_mut(list);
        let before = entries.len();
        entries.retain(|entry| entry != value);
        entries.len() != before
    }

    // Ordena e remove duplicatas das três listas (usado no PUT completo)
    pub fn normalized(mut self) -> Self {
        for list in [
            SettingsList::StandardZips,
            SettingsList::TravelFeeZips,
            SettingsList::CustomerSources,
        ] {
            let entries = self.list_mut(list);
            entries.retain(|entry| !entry.trim().is_empty());
            for entry in entries.iter_mut() {
                *entry = entry.trim().to_string();
            }
            entries.sort();
            entries.dedup();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_entry_keeps_lists_sorted_and_unique() {
        let mut settings = ServiceAreaSettings::default();
        assert!(settings.add_entry(SettingsList::StandardZips, "10005"));
        assert!(settings.add_entry(SettingsList::StandardZips, "10001"));
        assert!(!settings.add_entry(SettingsList::StandardZips, "10001"));
        assert!(!settings.add_entry(SettingsList::StandardZips, "   "));
        assert_eq!(settings.standard_zips, vec!["10001", "10005"]);
    }

    #[test]
    fn zip_lists_are_not_forced_disjoint() {
        let mut settings = ServiceAreaSettings::default();
        settings.add_entry(SettingsList::StandardZips, "10001");
        settings.add_entry(SettingsList::TravelFeeZips, "10001");
        assert_eq!(settings.travel_fee_zips, vec!["10001"]);
    }

    #[test]
    fn remove_entry_reports_changes() {
        let mut settings = ServiceAreaSettings {
            customer_sources: vec!["Google".into(), "Referral".into()],
            ..Default::default()
        };
        assert!(settings.remove_entry(SettingsList::CustomerSources, "Google"));
        assert!(!settings.remove_entry(SettingsList::CustomerSources, "Yelp"));
        assert_eq!(settings.customer_sources, vec!["Referral"]);
    }

    #[test]
    fn normalized_sorts_and_dedups() {
        let settings = ServiceAreaSettings {
            standard_zips: vec!["10002".into(), " 10001".into(), "10002".into(), "".into()],
            ..Default::default()
        }
        .normalized();
        assert_eq!(settings.standard_zips, vec!["10001", "10002"]);
    }

    #[test]
    fn parses_list_names() {
        assert_eq!(SettingsList::parse("travel-fee-zips").unwrap(), SettingsList::TravelFeeZips);
        assert!(SettingsList::parse("zips").is_err());
    }
}
