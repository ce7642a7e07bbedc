// src/models/account.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

// --- ENUMS ---

// Classificação do CEP de cobrança em relação à área de atendimento
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceAreaStatus {
    // CEP ainda incompleto (menos de 5 caracteres)
    #[default]
    Pristine,
    Standard,
    Travel,
    OutOfArea,
}

// Status de validação de um campo, usado só para estilização
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldStatus {
    #[default]
    Pristine,
    Valid,
    Invalid,
}

// --- ENDEREÇO ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BillingAddress {
    #[schema(example = "123 Main Street")]
    pub street1: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "Apt 4")]
    pub street2: Option<String>,

    #[schema(example = "Brooklyn")]
    pub city: String,

    #[validate(custom(function = "validate_state"))]
    #[schema(example = "NY")]
    pub state: String,

    #[schema(example = "11201")]
    pub zip: String,
}

// Endereço que deixou de ser o ativo, com o instante em que foi arquivado
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedAddress {
    #[serde(flatten)]
    pub address: BillingAddress,
    #[serde(with = "crate::common::format::timestamp")]
    pub archived_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAreaInfo {
    pub status: ServiceAreaStatus,
    #[serde(rename = "override")]
    pub override_: bool,
}

// --- CONTATOS ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Phone {
    // Categoria livre ("Cell", "Work", "Fax"...)
    #[serde(rename = "type")]
    #[schema(example = "Cell")]
    pub kind: String,

    #[schema(example = "(555) 123-4567")]
    pub number: String,

    #[serde(default)]
    pub sms_ok: bool,
}

impl Default for Phone {
    fn default() -> Self {
        Self {
            kind: "Cell".to_string(),
            number: String::new(),
            sms_ok: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub is_job_contact: bool,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub phones: Vec<Phone>,
}

impl Default for Contact {
    // Um contato novo sempre nasce com um telefone vazio
    fn default() -> Self {
        Self {
            name: String::new(),
            email: String::new(),
            is_job_contact: false,
            is_archived: false,
            phones: vec![Phone::default()],
        }
    }
}

// --- CONTA (O Documento) ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    // Id do documento no store (não é gravado dentro do documento)
    #[serde(default, skip_deserializing)]
    pub id: String,

    #[schema(example = "ACC-123456-X7Q")]
    pub account_number: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_source: Option<String>,

    pub billing_address: BillingAddress,

    #[serde(default)]
    pub is_jobsite_same_as_billing: bool,

    #[serde(default)]
    pub contacts: Vec<Contact>,

    // Mais recente primeiro
    #[serde(default)]
    pub address_history: Vec<ArchivedAddress>,

    #[serde(default)]
    pub service_area_info: ServiceAreaInfo,

    // Gravado com micros fixos: a lista de retornos ordena pelo texto
    #[serde(default, with = "crate::common::format::optional_timestamp")]
    pub follow_up_date: Option<DateTime<Utc>>,

    // Atribuído pelo store na criação
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::common::format::optional_timestamp"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

impl Account {
    // Texto pesquisável da conta, já em minúsculas
    pub fn searchable_text(&self) -> String {
        let mut parts: Vec<&str> = vec![
            &self.account_number,
            &self.billing_address.street1,
            &self.billing_address.city,
            &self.billing_address.zip,
        ];
        for contact in &self.contacts {
            parts.push(&contact.name);
            parts.push(&contact.email);
            for phone in &contact.phones {
                parts.push(&phone.number);
            }
        }
        parts.join(" ").to_lowercase()
    }
}

// --- PAYLOADS ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountPayload {
    pub company_name: Option<String>,
    pub customer_source: Option<String>,

    #[validate(length(min = 1, message = "At least one contact is required."))]
    pub contacts: Vec<Contact>,

    #[validate(nested)]
    pub billing_address: BillingAddress,

    #[serde(default)]
    pub is_jobsite_same_as_billing: bool,

    pub follow_up_date: Option<DateTime<Utc>>,

    // Escape do bloqueio de CEP fora da área
    #[serde(default)]
    pub service_area_override: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

// Atualização de um campo do contato ativo
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum ContactFieldUpdate {
    Name(String),
    Email(String),
}

// Atualização de um campo de telefone
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum PhoneFieldUpdate {
    #[serde(rename = "type")]
    Kind(String),
    Number(String),
    SmsOk(bool),
}

// Atualização de um campo da conta (fora dos contatos)
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum AccountFieldUpdate {
    CompanyName(Option<String>),
    CustomerSource(Option<String>),
    IsJobsiteSameAsBilling(bool),
    FollowUpDate(Option<DateTime<Utc>>),
    Street1(String),
    Street2(Option<String>),
    City(String),
    State(String),
    Zip(String),
    ServiceAreaOverride(bool),
}

pub const US_STATES: [&str; 50] = [
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
    "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ",
    "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT",
    "VA", "WA", "WV", "WI", "WY",
];

pub fn validate_state(state: &str) -> Result<(), validator::ValidationError> {
    if US_STATES.contains(&state) {
        Ok(())
    } else {
        let mut err = validator::ValidationError::new("invalid_state");
        err.message = Some("State must be a two-letter US state code.".into());
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn account_document_uses_camel_case_and_override_key() {
        let account = Account {
            id: "doc-1".into(),
            account_number: "ACC-000001-ABC".into(),
            company_name: None,
            customer_source: None,
            billing_address: BillingAddress {
                street1: "1 Main St".into(),
                street2: None,
                city: "Albany".into(),
                state: "NY".into(),
                zip: "12207".into(),
            },
            is_jobsite_same_as_billing: true,
            contacts: vec![Contact::default()],
            address_history: vec![],
            service_area_info: ServiceAreaInfo {
                status: ServiceAreaStatus::OutOfArea,
                override_: true,
            },
            follow_up_date: None,
            created_at: None,
        };

        let value = serde_json::to_value(&account).unwrap();
        assert_eq!(value["accountNumber"], "ACC-000001-ABC");
        assert_eq!(value["serviceAreaInfo"], json!({"status": "out-of-area", "override": true}));
        assert_eq!(value["contacts"][0]["phones"][0]["type"], "Cell");
        assert!(value.get("street2").is_none());
    }

    #[test]
    fn archived_address_flattens_the_address_fields() {
        let raw = json!({
            "street1": "9 Elm", "city": "Troy", "state": "NY", "zip": "12180",
            "archivedAt": "2025-01-02T03:04:05Z"
        });
        let archived: ArchivedAddress = serde_json::from_value(raw).unwrap();
        assert_eq!(archived.address.street1, "9 Elm");
        assert_eq!(archived.address.street2, None);
    }

    #[test]
    fn field_updates_are_adjacently_tagged() {
        let update: PhoneFieldUpdate =
            serde_json::from_value(json!({"field": "smsOk", "value": true})).unwrap();
        assert!(matches!(update, PhoneFieldUpdate::SmsOk(true)));

        let update: PhoneFieldUpdate =
            serde_json::from_value(json!({"field": "type", "value": "Work"})).unwrap();
        assert!(matches!(update, PhoneFieldUpdate::Kind(ref k) if k == "Work"));

        let update: AccountFieldUpdate =
            serde_json::from_value(json!({"field": "zip", "value": "10001"})).unwrap();
        assert!(matches!(update, AccountFieldUpdate::Zip(ref z) if z == "10001"));
    }

    #[test]
    fn searchable_text_covers_contacts_and_phones() {
        let mut contact = Contact::default();
        contact.name = "Jane Roe".into();
        contact.phones[0].number = "(555) 123-4567".into();
        let account = Account {
            id: String::new(),
            account_number: "ACC-1".into(),
            company_name: None,
            customer_source: None,
            billing_address: BillingAddress::default(),
            is_jobsite_same_as_billing: false,
            contacts: vec![contact],
            address_history: vec![],
            service_area_info: ServiceAreaInfo::default(),
            follow_up_date: None,
            created_at: None,
        };
        let text = account.searchable_text();
        assert!(text.contains("jane roe"));
        assert!(text.contains("123-4567"));
    }

    #[test]
    fn follow_up_dates_are_written_in_sortable_form() {
        use crate::db::store::{Direction, Document, Query};
        use chrono::TimeZone;

        let whole = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        let later = whole + chrono::Duration::milliseconds(500);

        let docs: Vec<Document> = [("later", later), ("whole", whole)]
            .into_iter()
            .map(|(id, at)| {
                let account = Account {
                    id: String::new(),
                    account_number: id.into(),
                    company_name: None,
                    customer_source: None,
                    billing_address: BillingAddress::default(),
                    is_jobsite_same_as_billing: false,
                    contacts: vec![],
                    address_history: vec![],
                    service_area_info: ServiceAreaInfo::default(),
                    follow_up_date: Some(at),
                    created_at: None,
                };
                Document { id: id.into(), data: serde_json::to_value(&account).unwrap() }
            })
            .collect();
        assert_eq!(docs[1].data["followUpDate"], "2025-06-01T09:00:00.000000Z");

        let ids: Vec<String> = Query::collection("accounts")
            .order_by("followUpDate", Direction::Asc)
            .apply(docs)
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["whole", "later"]);

        // E a leitura de volta preserva o instante
        let raw = json!({"accountNumber": "x", "billingAddress": BillingAddress::default(), "followUpDate": "2025-06-01T09:00:00.500000Z"});
        let parsed: Account = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.follow_up_date, Some(later));
    }
}
