// src/services/account_editor.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use utoipa::ToSchema;

use super::{
    address_history::archive_on_save,
    contact_roster::ContactRoster,
    service_area::ServiceAreaGate,
};
use crate::{
    common::{error::AppError, format::capitalize_words},
    db::AccountRepository,
    models::{
        account::{
            validate_state, Account, AccountFieldUpdate, ContactFieldUpdate, FieldStatus,
            PhoneFieldUpdate, ServiceAreaInfo,
        },
        settings::ServiceAreaSettings,
    },
};

// Campos que nunca entram no diff de salvamento
const IMMUTABLE_FIELDS: [&str; 1] = ["accountNumber"];

// Escrita calculada por `prepare_save`, ainda não aplicada no store.
#[derive(Debug, Clone)]
pub struct PendingSave {
    pub fields: Map<String, Value>,
    pub account: Account,
    pub archived_address: bool,
}

// Estado visível de um rascunho
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DraftView {
    pub account_id: String,
    pub editing: bool,
    pub account: Account,
    pub active_contact_index: usize,
    pub email_status: Vec<FieldStatus>,
    pub service_area: ServiceAreaInfo,
}

/// Modelo de edição de uma conta.
///
/// Guarda a última versão persistida e um rascunho desacoplado dela. Snapshots
/// que chegam do store sempre atualizam a versão persistida, mas só substituem
/// o rascunho fora do modo de edição: o eco da nossa própria escrita não pode
/// atropelar uma edição em andamento.
#[derive(Debug, Clone)]
pub struct AccountEditor {
    persisted: Account,
    // Rascunho sem os contatos, que ficam no roster
    draft: Account,
    roster: ContactRoster,
    gate: ServiceAreaGate,
    settings: ServiceAreaSettings,
    editing: bool,
}

impl AccountEditor {
    pub fn new(account: Account, settings: ServiceAreaSettings) -> Self {
        let (draft, roster, gate) = Self::fresh_draft(&account, &settings);
        Self {
            persisted: account,
            draft,
            roster,
            gate,
            settings,
            editing: false,
        }
    }

    fn fresh_draft(
        account: &Account,
        settings: &ServiceAreaSettings,
    ) -> (Account, ContactRoster, ServiceAreaGate) {
        let mut draft = account.clone();
        let roster = ContactRoster::new(std::mem::take(&mut draft.contacts));
        let gate = ServiceAreaGate::resume(&draft.billing_address.zip, settings, account.service_area_info);
        (draft, roster, gate)
    }

    fn reset_draft(&mut self) {
        let (draft, roster, gate) = Self::fresh_draft(&self.persisted, &self.settings);
        self.draft = draft;
        self.roster = roster;
        self.gate = gate;
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    // Rascunho completo (campos + contatos do roster).
    pub fn draft(&self) -> Account {
        let mut account = self.draft.clone();
        account.contacts = self.roster.contacts().to_vec();
        account.service_area_info = self.gate.info();
        account
    }

    pub fn view(&self) -> DraftView {
        DraftView {
            account_id: self.persisted.id.clone(),
            editing: self.editing,
            account: self.draft(),
            active_contact_index: self.roster.active_index(),
            email_status: self.roster.email_status().to_vec(),
            service_area: self.gate.info(),
        }
    }

    // Consumidor de snapshots, com a guarda explícita do modo de edição.
    // Retorna `true` quando o rascunho foi substituído.
    pub fn apply_snapshot(&mut self, account: Account) -> bool {
        self.persisted = account;
        if self.editing {
            return false;
        }
        self.reset_draft();
        true
    }

    pub fn begin_edit(&mut self, settings: ServiceAreaSettings) {
        self.settings = settings;
        self.editing = true;
        self.reset_draft();
    }

    pub fn cancel_edit(&mut self) {
        self.editing = false;
        self.reset_draft();
    }

    fn require_editing(&self) -> Result<(), AppError> {
        if !self.editing {
            return Err(AppError::NotEditing);
        }
        Ok(())
    }

    // --- CONTATOS ---

    pub fn add_contact(&mut self) -> Result<usize, AppError> {
        self.require_editing()?;
        Ok(self.roster.add_contact())
    }

    pub fn select_contact(&mut self, index: usize) -> Result<(), AppError> {
        self.require_editing()?;
        self.roster.select_contact(index)
    }

    pub fn set_default_contact(&mut self, index: usize) -> Result<(), AppError> {
        self.require_editing()?;
        self.roster.set_default_contact(index)
    }

    pub fn archive_contact(&mut self, index: usize) -> Result<(), AppError> {
        self.require_editing()?;
        self.roster.archive_contact(index)
    }

    pub fn restore_contact(&mut self, index: usize) -> Result<(), AppError> {
        self.require_editing()?;
        self.roster.restore_contact(index)
    }

    pub fn add_phone(&mut self, contact_index: usize) -> Result<usize, AppError> {
        self.require_editing()?;
        self.roster.add_phone(contact_index)
    }

    pub fn update_contact_field(&mut self, index: usize, update: ContactFieldUpdate) -> Result<(), AppError> {
        self.require_editing()?;
        self.roster.update_contact_field(index, update)
    }

    pub fn update_phone_field(
        &mut self,
        contact_index: usize,
        phone_index: usize,
        update: PhoneFieldUpdate,
    ) -> Result<(), AppError> {
        self.require_editing()?;
        self.roster.update_phone_field(contact_index, phone_index, update)
    }

    // --- CAMPOS DA CONTA ---

    pub fn update_account_field(&mut self, update: AccountFieldUpdate) -> Result<(), AppError> {
        self.require_editing()?;
        let address = &mut self.draft.billing_address;

        match update {
            AccountFieldUpdate::CompanyName(name) => {
                self.draft.company_name = name.filter(|n| !n.trim().is_empty());
            }
            AccountFieldUpdate::CustomerSource(source) => {
                self.draft.customer_source = source.filter(|s| !s.is_empty());
            }
            AccountFieldUpdate::IsJobsiteSameAsBilling(same) => self.draft.is_jobsite_same_as_billing = same,
            AccountFieldUpdate::FollowUpDate(date) => self.draft.follow_up_date = date,
            AccountFieldUpdate::Street1(street) => address.street1 = capitalize_words(&street),
            AccountFieldUpdate::Street2(street) => {
                address.street2 = street.filter(|s| !s.is_empty()).map(|s| capitalize_words(&s));
            }
            AccountFieldUpdate::City(city) => address.city = capitalize_words(&city),
            AccountFieldUpdate::State(state) => {
                let state = state.trim().to_uppercase();
                if let Err(e) = validate_state(&state) {
                    let mut errors = validator::ValidationErrors::new();
                    errors.add("state", e);
                    return Err(AppError::ValidationError(errors));
                }
                address.state = state;
            }
            AccountFieldUpdate::Zip(zip) => {
                let zip = zip.trim().to_string();
                self.gate.set_zip(&zip, &self.settings);
                self.draft.billing_address.zip = zip;
            }
            AccountFieldUpdate::ServiceAreaOverride(value) => self.gate.set_override(value),
        }
        Ok(())
    }

    // --- SALVAMENTO ---

    /// Calcula a escrita do salvamento: portão de área, diff dos campos
    /// de primeiro nível e arquivamento do endereço substituído.
    pub fn prepare_save(&self, now: DateTime<Utc>) -> Result<PendingSave, AppError> {
        self.require_editing()?;

        // ValidationBlock: nada é escrito
        let service_area_info = self.gate.check_save()?;

        let mut account = self.draft();
        account.service_area_info = service_area_info;
        account.address_history = self.persisted.address_history.clone();

        let archived = archive_on_save(
            &self.persisted.billing_address,
            &account.billing_address,
            &self.persisted.address_history,
            now,
        );
        let archived_address = archived.is_some();
        if let Some(history) = archived {
            account.address_history = history;
        }

        let before = AccountRepository::to_fields(&self.persisted)?;
        let after = AccountRepository::to_fields(&account)?;

        let mut fields = Map::new();
        for (key, value) in &after {
            if IMMUTABLE_FIELDS.contains(&key.as_str()) {
                continue;
            }
            if before.get(key) != Some(value) {
                fields.insert(key.clone(), value.clone());
            }
        }
        // Campos opcionais que sumiram viram null explícito
        for key in before.keys() {
            if !after.contains_key(key) && !IMMUTABLE_FIELDS.contains(&key.as_str()) {
                fields.insert(key.clone(), Value::Null);
            }
        }
        // A classificação do momento do salvamento é sempre gravada
        fields.insert("serviceAreaInfo".to_string(), serde_json::to_value(service_area_info)?);

        Ok(PendingSave {
            fields,
            account,
            archived_address,
        })
    }

    // Escrita confirmada: sai do modo de edição com a nova versão persistida.
    pub fn finish_save(&mut self, pending: PendingSave) {
        let mut account = pending.account;
        account.id = self.persisted.id.clone();
        account.created_at = self.persisted.created_at;
        self.persisted = account;
        self.editing = false;
        self.reset_draft();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::account::{BillingAddress, Contact, ServiceAreaStatus};
    use chrono::TimeZone;

    fn account() -> Account {
        Account {
            id: "acc-1".into(),
            account_number: "ACC-000001-ABC".into(),
            company_name: Some("Acme".into()),
            customer_source: None,
            billing_address: BillingAddress {
                street1: "1 Main St".into(),
                street2: None,
                city: "New York".into(),
                state: "NY".into(),
                zip: "10001".into(),
            },
            is_jobsite_same_as_billing: false,
            contacts: ContactRoster::normalized(vec![
                Contact { name: "Ann".into(), ..Contact::default() },
                Contact { name: "Bob".into(), ..Contact::default() },
            ]),
            address_history: vec![],
            service_area_info: ServiceAreaInfo {
                status: ServiceAreaStatus::Standard,
                override_: false,
            },
            follow_up_date: None,
            created_at: Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()),
        }
    }

    fn settings() -> ServiceAreaSettings {
        ServiceAreaSettings {
            standard_zips: vec!["10001".into()],
            travel_fee_zips: vec!["10701".into()],
            customer_sources: vec![],
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap()
    }

    fn editing() -> AccountEditor {
        let mut editor = AccountEditor::new(account(), settings());
        editor.begin_edit(settings());
        editor
    }

    #[test]
    fn mutations_require_edit_mode() {
        let mut editor = AccountEditor::new(account(), settings());
        assert!(matches!(editor.add_contact(), Err(AppError::NotEditing)));
        assert!(matches!(editor.prepare_save(now()), Err(AppError::NotEditing)));
    }

    #[test]
    fn snapshot_while_editing_keeps_the_draft() {
        let mut editor = editing();
        editor
            .update_contact_field(0, ContactFieldUpdate::Name("annie".into()))
            .unwrap();

        let mut remote = account();
        remote.company_name = Some("Remote Co".into());
        assert!(!editor.apply_snapshot(remote));

        assert_eq!(editor.draft().contacts[0].name, "Annie");
        assert_eq!(editor.persisted.company_name.as_deref(), Some("Remote Co"));
    }

    #[test]
    fn snapshot_while_viewing_replaces_the_draft() {
        let mut editor = AccountEditor::new(account(), settings());
        let mut remote = account();
        remote.company_name = Some("Remote Co".into());

        assert!(editor.apply_snapshot(remote));
        assert_eq!(editor.draft().company_name.as_deref(), Some("Remote Co"));
    }

    #[test]
    fn save_with_same_address_only_writes_changed_fields() {
        let mut editor = editing();
        editor
            .update_account_field(AccountFieldUpdate::IsJobsiteSameAsBilling(true))
            .unwrap();

        let pending = editor.prepare_save(now()).unwrap();
        assert!(!pending.archived_address);
        assert!(pending.fields.contains_key("isJobsiteSameAsBilling"));
        assert!(pending.fields.contains_key("serviceAreaInfo"));
        assert!(!pending.fields.contains_key("addressHistory"));
        assert!(!pending.fields.contains_key("billingAddress"));
        assert!(!pending.fields.contains_key("accountNumber"));
    }

    #[test]
    fn save_with_new_address_archives_the_old_one() {
        let mut editor = editing();
        editor.update_account_field(AccountFieldUpdate::Street1("9 elm st".into())).unwrap();
        editor.update_account_field(AccountFieldUpdate::Zip("10701".into())).unwrap();

        let pending = editor.prepare_save(now()).unwrap();
        assert!(pending.archived_address);
        assert_eq!(pending.account.address_history.len(), 1);
        assert_eq!(pending.account.address_history[0].address, account().billing_address);
        assert_eq!(pending.account.address_history[0].archived_at, now());
        assert_eq!(pending.account.billing_address.street1, "9 Elm St");
        assert_eq!(pending.account.service_area_info.status, ServiceAreaStatus::Travel);
        assert!(pending.fields.contains_key("addressHistory"));
    }

    #[test]
    fn out_of_area_save_is_blocked_until_override() {
        let mut editor = editing();
        editor.update_account_field(AccountFieldUpdate::Zip("99999".into())).unwrap();
        assert!(matches!(editor.prepare_save(now()), Err(AppError::OutOfServiceArea(_))));

        editor
            .update_account_field(AccountFieldUpdate::ServiceAreaOverride(true))
            .unwrap();
        let pending = editor.prepare_save(now()).unwrap();
        assert_eq!(
            pending.fields["serviceAreaInfo"],
            serde_json::json!({"status": "out-of-area", "override": true})
        );
    }

    #[test]
    fn cleared_optional_fields_are_written_as_null() {
        let mut editor = editing();
        editor.update_account_field(AccountFieldUpdate::CompanyName(None)).unwrap();
        let pending = editor.prepare_save(now()).unwrap();
        assert_eq!(pending.fields["companyName"], Value::Null);
    }

    #[test]
    fn finish_save_leaves_edit_mode_with_the_new_version() {
        let mut editor = editing();
        editor.archive_contact(0).unwrap();
        let pending = editor.prepare_save(now()).unwrap();
        editor.finish_save(pending);

        assert!(!editor.is_editing());
        assert!(editor.persisted.contacts[0].is_archived);
        assert!(editor.persisted.contacts[1].is_job_contact);
        assert_eq!(editor.persisted.id, "acc-1");
    }

    #[test]
    fn invalid_state_is_rejected() {
        let mut editor = editing();
        let err = editor.update_account_field(AccountFieldUpdate::State("ZZ".into())).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        editor.update_account_field(AccountFieldUpdate::State("nj".into())).unwrap();
        assert_eq!(editor.draft().billing_address.state, "NJ");
    }

    #[test]
    fn cancel_discards_the_draft() {
        let mut editor = editing();
        editor.add_contact().unwrap();
        editor.cancel_edit();
        assert_eq!(editor.draft().contacts.len(), 2);
        assert!(!editor.is_editing());
    }
}
