// src/services/account_service.rs

use chrono::{DateTime, Utc};
use rand::Rng;
use serde_json::Map;
use uuid::Uuid;

use super::{
    address_history::restore_from_history,
    contact_roster::ContactRoster,
    draft_service::DraftService,
    service_area::{classify_zip, ServiceAreaGate},
};
use crate::{
    common::{error::AppError, format::capitalize_words},
    db::{AccountRepository, SettingsRepository, Subscription},
    models::account::{Account, BillingAddress, CreateAccountPayload, ServiceAreaInfo},
};

const REQUIRED_FIELDS_MESSAGE: &str = "Please fill out at least the first Contact Name and Street Address.";

/// Número de conta legível: `ACC-` + 6 últimos dígitos do relógio + sufixo aleatório.
pub fn generate_account_number<R: Rng>(now: DateTime<Utc>, rng: &mut R) -> String {
    let millis = now.timestamp_millis().rem_euclid(1_000_000);
    // Base 36 uniforme: 0-9 e A-Z com o mesmo peso
    let suffix: String = (0..3)
        .filter_map(|_| char::from_digit(rng.gen_range(0..36), 36))
        .map(|c| c.to_ascii_uppercase())
        .collect();
    format!("ACC-{:06}-{}", millis, suffix)
}

fn normalize_address(address: BillingAddress) -> BillingAddress {
    BillingAddress {
        street1: capitalize_words(address.street1.trim()),
        street2: address
            .street2
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(|s| capitalize_words(&s)),
        city: capitalize_words(address.city.trim()),
        state: address.state.trim().to_uppercase(),
        zip: address.zip.trim().to_string(),
    }
}

#[derive(Clone)]
pub struct AccountService {
    account_repo: AccountRepository,
    settings_repo: SettingsRepository,
    drafts: DraftService,
}

impl AccountService {
    pub fn new(account_repo: AccountRepository, settings_repo: SettingsRepository, drafts: DraftService) -> Self {
        Self {
            account_repo,
            settings_repo,
            drafts,
        }
    }

    // Cria uma conta nova. Exige nome do primeiro contato e rua; o portão
    // de área vale também aqui, com o override vindo no payload.
    pub async fn create_account(&self, payload: CreateAccountPayload) -> Result<Account, AppError> {
        let contacts = ContactRoster::normalized(payload.contacts);
        let billing_address = normalize_address(payload.billing_address);

        let first_name_missing = contacts
            .iter()
            .find(|c| !c.is_archived)
            .is_none_or(|c| c.name.is_empty());
        if first_name_missing || billing_address.street1.is_empty() {
            return Err(AppError::validation("contacts", "required", REQUIRED_FIELDS_MESSAGE));
        }

        let settings = self.settings_repo.get_settings().await?;
        let mut gate = ServiceAreaGate::new(&billing_address.zip, &settings);
        gate.set_override(payload.service_area_override);
        let service_area_info = gate.check_save()?;

        let account = Account {
            id: String::new(),
            account_number: generate_account_number(Utc::now(), &mut rand::thread_rng()),
            company_name: payload
                .company_name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            customer_source: payload.customer_source.filter(|s| !s.is_empty()),
            billing_address,
            is_jobsite_same_as_billing: payload.is_jobsite_same_as_billing,
            contacts,
            address_history: vec![],
            service_area_info,
            follow_up_date: payload.follow_up_date,
            created_at: None,
        };

        let id = self
            .account_repo
            .create(&account)
            .await
            .map_err(AppError::into_write_failure)?;
        tracing::info!("Conta {} criada ({})", account.account_number, id);

        self.get_account(&id).await
    }

    pub async fn get_account(&self, id: &str) -> Result<Account, AppError> {
        self.account_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(id.to_string()))
    }

    pub async fn list_recent(&self) -> Result<Vec<Account>, AppError> {
        self.account_repo.list(&AccountRepository::recent_query()).await
    }

    pub async fn list_follow_ups(&self) -> Result<Vec<Account>, AppError> {
        self.account_repo.list(&AccountRepository::follow_up_query()).await
    }

    // Busca por texto em empresa, contato principal, e-mail, telefone e endereço.
    pub async fn search(&self, term: &str) -> Result<Vec<Account>, AppError> {
        let needle = term.trim().to_lowercase();
        let accounts = self.list_recent().await?;
        if needle.is_empty() {
            return Ok(accounts);
        }
        Ok(accounts
            .into_iter()
            .filter(|account| account.searchable_text().contains(&needle))
            .collect())
    }

    pub async fn subscribe(&self, id: &str) -> Result<Subscription, AppError> {
        // Falha cedo para contas inexistentes
        self.get_account(id).await?;
        self.account_repo.subscribe(id).await
    }

    pub async fn subscribe_recent(&self) -> Result<Subscription, AppError> {
        self.account_repo.subscribe_list(AccountRepository::recent_query()).await
    }

    pub async fn subscribe_follow_ups(&self) -> Result<Subscription, AppError> {
        self.account_repo.subscribe_list(AccountRepository::follow_up_query()).await
    }

    // Restaura um endereço do histórico, gravando direto no store.
    // Recusado enquanto o mesmo usuário edita a conta.
    pub async fn restore_address(&self, uid: Uuid, id: &str, index: usize) -> Result<Account, AppError> {
        if self.drafts.is_editing(uid, id).await {
            return Err(AppError::EditInProgress);
        }

        let account = self.get_account(id).await?;
        let restored = restore_from_history(&account.billing_address, &account.address_history, index, Utc::now())?;

        // Endereço novo: reclassifica e descarta o override anterior
        let settings = self.settings_repo.get_settings().await?;
        let service_area_info = ServiceAreaInfo {
            status: classify_zip(
                &restored.billing_address.zip,
                &settings.standard_zips,
                &settings.travel_fee_zips,
            ),
            override_: false,
        };

        let mut fields = Map::new();
        fields.insert("billingAddress".into(), serde_json::to_value(&restored.billing_address)?);
        fields.insert("addressHistory".into(), serde_json::to_value(&restored.address_history)?);
        fields.insert("serviceAreaInfo".into(), serde_json::to_value(service_area_info)?);

        self.account_repo
            .update_fields(id, fields)
            .await
            .map_err(AppError::into_write_failure)?;
        tracing::info!("Endereço {} do histórico restaurado na conta {}", index, id);

        self.get_account(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{DocumentStore, MemoryStore},
        models::{
            account::{AccountFieldUpdate, Contact, Phone, ServiceAreaStatus},
            settings::ServiceAreaSettings,
        },
    };
    use chrono::TimeZone;
    use rand::{rngs::StdRng, SeedableRng};
    use std::sync::Arc;

    struct Fixture {
        store: MemoryStore,
        service: AccountService,
        drafts: DraftService,
    }

    async fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let shared: Arc<dyn DocumentStore> = Arc::new(store.clone());
        let account_repo = AccountRepository::new(shared.clone());
        let settings_repo = SettingsRepository::new(shared);
        settings_repo
            .save_settings(&ServiceAreaSettings {
                standard_zips: vec!["10001".into()],
                travel_fee_zips: vec!["10701".into()],
                customer_sources: vec!["Referral".into()],
            })
            .await
            .unwrap();
        let drafts = DraftService::new(account_repo.clone(), settings_repo.clone());
        let service = AccountService::new(account_repo, settings_repo, drafts.clone());
        Fixture { store, service, drafts }
    }

    fn payload(name: &str, street: &str, zip: &str) -> CreateAccountPayload {
        CreateAccountPayload {
            company_name: Some("  Acme  ".into()),
            customer_source: None,
            contacts: vec![Contact {
                name: name.into(),
                email: "ann@example.com".into(),
                phones: vec![Phone {
                    number: "5551234567".into(),
                    ..Phone::default()
                }],
                ..Contact::default()
            }],
            billing_address: BillingAddress {
                street1: street.into(),
                street2: None,
                city: "new york".into(),
                state: "ny".into(),
                zip: zip.into(),
            },
            is_jobsite_same_as_billing: false,
            follow_up_date: None,
            service_area_override: false,
        }
    }

    #[test]
    fn account_numbers_have_the_expected_shape() {
        let now = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();
        let number = generate_account_number(now, &mut StdRng::seed_from_u64(7));

        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ACC");
        assert_eq!(parts[1].len(), 6);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 3);
        assert!(parts[2].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn account_number_suffix_is_uniform_base36() {
        let now = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let mut digits = 0usize;
        let mut total = 0usize;
        for _ in 0..4000 {
            let number = generate_account_number(now, &mut rng);
            let suffix = number.rsplit('-').next().unwrap();
            total += suffix.len();
            digits += suffix.chars().filter(|c| c.is_ascii_digit()).count();
        }

        // 10 de 36 símbolos são dígitos (~27,8%); com letras pesando o dobro seria ~16%
        let share = digits as f64 / total as f64;
        assert!((0.25..0.31).contains(&share), "digit share {share}");
    }

    #[tokio::test]
    async fn create_normalizes_and_classifies() {
        let f = fixture().await;
        let account = f.service.create_account(payload("ann lee", "1 main st", "10701")).await.unwrap();

        assert!(!account.id.is_empty());
        assert!(account.created_at.is_some());
        assert_eq!(account.company_name.as_deref(), Some("Acme"));
        assert_eq!(account.contacts[0].name, "Ann Lee");
        assert!(account.contacts[0].is_job_contact);
        assert_eq!(account.contacts[0].phones[0].number, "(555) 123-4567");
        assert_eq!(account.billing_address.street1, "1 Main St");
        assert_eq!(account.billing_address.state, "NY");
        assert_eq!(account.service_area_info.status, ServiceAreaStatus::Travel);
        assert!(account.address_history.is_empty());
    }

    #[tokio::test]
    async fn create_requires_first_contact_name_and_street() {
        let f = fixture().await;
        let err = f.service.create_account(payload("", "1 Main St", "10001")).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let err = f.service.create_account(payload("Ann", "  ", "10001")).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert!(f.service.list_recent().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_out_of_area_needs_override() {
        let f = fixture().await;
        let err = f.service.create_account(payload("Ann", "1 Main St", "99999")).await.unwrap_err();
        assert!(matches!(err, AppError::OutOfServiceArea(_)));

        let mut overridden = payload("Ann", "1 Main St", "99999");
        overridden.service_area_override = true;
        let account = f.service.create_account(overridden).await.unwrap();
        assert_eq!(account.service_area_info.status, ServiceAreaStatus::OutOfArea);
        assert!(account.service_area_info.override_);
    }

    #[tokio::test]
    async fn create_write_failure_is_reported() {
        let f = fixture().await;
        f.store.set_fail_writes(true);
        let err = f.service.create_account(payload("Ann", "1 Main St", "10001")).await.unwrap_err();
        assert!(matches!(err, AppError::WriteFailure(_)));
    }

    #[tokio::test]
    async fn search_matches_contact_and_address_text() {
        let f = fixture().await;
        f.service.create_account(payload("Ann", "1 Main St", "10001")).await.unwrap();
        f.service.create_account(payload("Bob", "9 Elm St", "10001")).await.unwrap();

        let found = f.service.search("9 ELM st").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].contacts[0].name, "Bob");

        assert_eq!(f.service.search("  ").await.unwrap().len(), 2);
        assert!(f.service.search("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn follow_ups_skip_accounts_without_a_date() {
        let f = fixture().await;
        let mut later = payload("Ann", "1 Main St", "10001");
        later.follow_up_date = Some(Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap());
        let mut sooner = payload("Bob", "2 Main St", "10001");
        sooner.follow_up_date = Some(Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0).unwrap());
        f.service.create_account(later).await.unwrap();
        f.service.create_account(sooner).await.unwrap();
        f.service.create_account(payload("Cy", "3 Main St", "10001")).await.unwrap();

        let names: Vec<String> = f
            .service
            .list_follow_ups()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.contacts[0].name.clone())
            .collect();
        assert_eq!(names, vec!["Bob", "Ann"]);
    }

    #[tokio::test]
    async fn restore_swaps_the_address_and_reclassifies() {
        let f = fixture().await;
        let account = f.service.create_account(payload("Ann", "1 Main St", "10001")).await.unwrap();
        let uid = Uuid::new_v4();

        // Troca o endereço por um fora da área, com override
        f.drafts.open(uid, &account.id).await.unwrap();
        f.drafts.begin_edit(uid, &account.id).await.unwrap();
        f.drafts
            .edit(uid, &account.id, |e| {
                e.update_account_field(AccountFieldUpdate::Zip("99999".into()))?;
                e.update_account_field(AccountFieldUpdate::ServiceAreaOverride(true))
            })
            .await
            .unwrap();

        let err = f.service.restore_address(uid, &account.id, 0).await.unwrap_err();
        assert!(matches!(err, AppError::EditInProgress));

        f.drafts.save(uid, &account.id).await.unwrap();
        let restored = f.service.restore_address(uid, &account.id, 0).await.unwrap();

        assert_eq!(restored.billing_address.zip, "10001");
        assert_eq!(restored.address_history.len(), 1);
        assert_eq!(restored.address_history[0].address.zip, "99999");
        assert_eq!(restored.service_area_info.status, ServiceAreaStatus::Standard);
        assert!(!restored.service_area_info.override_);
    }

    #[tokio::test]
    async fn unknown_account_is_not_found() {
        let f = fixture().await;
        assert!(matches!(f.service.get_account("nope").await, Err(AppError::AccountNotFound(_))));
        assert!(matches!(f.service.subscribe("nope").await, Err(AppError::AccountNotFound(_))));
    }
}
