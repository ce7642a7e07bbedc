// src/docs.rs

use axum::Json;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::OpenApi;

use crate::handlers;
use crate::models;
use crate::services;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::login,
        handlers::auth::logout,
        handlers::auth::get_me,
        handlers::auth::stream_identity,

        // --- Users ---
        handlers::auth::register_user,

        // --- Accounts ---
        handlers::accounts::create_account,
        handlers::accounts::list_accounts,
        handlers::accounts::search_accounts,
        handlers::accounts::list_follow_ups,
        handlers::accounts::stream_accounts,
        handlers::accounts::stream_follow_ups,
        handlers::accounts::get_account,
        handlers::accounts::stream_account,
        handlers::accounts::restore_address,

        // --- Drafts ---
        handlers::drafts::open_draft,
        handlers::drafts::get_draft,
        handlers::drafts::close_draft,
        handlers::drafts::begin_edit,
        handlers::drafts::cancel_edit,
        handlers::drafts::save_draft,
        handlers::drafts::update_account_field,
        handlers::drafts::add_contact,
        handlers::drafts::update_contact_field,
        handlers::drafts::select_contact,
        handlers::drafts::set_default_contact,
        handlers::drafts::archive_contact,
        handlers::drafts::restore_contact,
        handlers::drafts::add_phone,
        handlers::drafts::update_phone_field,

        // --- Settings ---
        handlers::settings::get_settings,
        handlers::settings::update_settings,
        handlers::settings::add_entry,
        handlers::settings::remove_entry,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::Identity,
            models::auth::Role,
            models::auth::LoginUserPayload,
            models::auth::RegisterUserPayload,
            models::auth::AuthResponse,
            models::auth::MeResponse,

            // --- Accounts ---
            models::account::ServiceAreaStatus,
            models::account::FieldStatus,
            models::account::BillingAddress,
            models::account::ArchivedAddress,
            models::account::ServiceAreaInfo,
            models::account::Phone,
            models::account::Contact,
            models::account::Account,
            models::account::CreateAccountPayload,
            models::account::ContactFieldUpdate,
            models::account::PhoneFieldUpdate,
            models::account::AccountFieldUpdate,

            // --- Drafts ---
            services::account_editor::DraftView,
            handlers::drafts::AddedEntry,

            // --- Settings ---
            models::settings::ServiceAreaSettings,
        )
    ),
    tags(
        (name = "Auth", description = "Login, logout e sessão"),
        (name = "Users", description = "Cadastro de usuários (admin)"),
        (name = "Accounts", description = "Contas de clientes"),
        (name = "Drafts", description = "Edição de contas (rascunhos)"),
        (name = "Settings", description = "Área de atendimento e origens de clientes")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}

// GET /api-docs/openapi.json
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
