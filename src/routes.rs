// src/routes.rs

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};

use crate::{
    config::AppState,
    docs, handlers,
    middleware::auth::{admin_guard, auth_guard},
};

pub fn create_router(app_state: AppState) -> Router {
    // Rotas públicas
    let public_routes = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api-docs/openapi.json", get(docs::openapi_json));

    // Rotas exclusivas de admin (o admin_guard roda depois do auth_guard)
    let admin_routes = Router::new()
        .route("/api/users", post(handlers::auth::register_user))
        .route(
            "/api/settings/{list}/{value}",
            post(handlers::settings::add_entry).delete(handlers::settings::remove_entry),
        )
        .layer(axum_middleware::from_fn(admin_guard));

    let account_routes = Router::new()
        .route(
            "/api/accounts",
            post(handlers::accounts::create_account).get(handlers::accounts::list_accounts),
        )
        .route("/api/accounts/search", get(handlers::accounts::search_accounts))
        .route("/api/accounts/stream", get(handlers::accounts::stream_accounts))
        .route("/api/accounts/follow-ups", get(handlers::accounts::list_follow_ups))
        .route("/api/accounts/follow-ups/stream", get(handlers::accounts::stream_follow_ups))
        .route("/api/accounts/{id}", get(handlers::accounts::get_account))
        .route("/api/accounts/{id}/stream", get(handlers::accounts::stream_account))
        .route(
            "/api/accounts/{id}/address-history/{index}/restore",
            post(handlers::accounts::restore_address),
        );

    let draft_routes = Router::new()
        .route(
            "/api/accounts/{id}/draft",
            post(handlers::drafts::open_draft)
                .get(handlers::drafts::get_draft)
                .delete(handlers::drafts::close_draft)
                .patch(handlers::drafts::update_account_field),
        )
        .route("/api/accounts/{id}/draft/edit", post(handlers::drafts::begin_edit))
        .route("/api/accounts/{id}/draft/cancel", post(handlers::drafts::cancel_edit))
        .route("/api/accounts/{id}/draft/save", post(handlers::drafts::save_draft))
        .route("/api/accounts/{id}/draft/contacts", post(handlers::drafts::add_contact))
        .route(
            "/api/accounts/{id}/draft/contacts/{contact}",
            axum::routing::patch(handlers::drafts::update_contact_field),
        )
        .route(
            "/api/accounts/{id}/draft/contacts/{contact}/select",
            post(handlers::drafts::select_contact),
        )
        .route(
            "/api/accounts/{id}/draft/contacts/{contact}/default",
            post(handlers::drafts::set_default_contact),
        )
        .route(
            "/api/accounts/{id}/draft/contacts/{contact}/archive",
            post(handlers::drafts::archive_contact),
        )
        .route(
            "/api/accounts/{id}/draft/contacts/{contact}/restore",
            post(handlers::drafts::restore_contact),
        )
        .route(
            "/api/accounts/{id}/draft/contacts/{contact}/phones",
            post(handlers::drafts::add_phone),
        )
        .route(
            "/api/accounts/{id}/draft/contacts/{contact}/phones/{phone}",
            axum::routing::patch(handlers::drafts::update_phone_field),
        );

    // Leitura liberada para qualquer sessão; escrita só para admin
    let settings_routes = Router::new().route(
        "/api/settings",
        get(handlers::settings::get_settings).merge(
            put(handlers::settings::update_settings).route_layer(axum_middleware::from_fn(admin_guard)),
        ),
    );

    // Tudo abaixo exige uma sessão válida
    let protected_routes = Router::new()
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/auth/me", get(handlers::auth::get_me))
        .route("/api/auth/session/stream", get(handlers::auth::stream_identity))
        .merge(admin_routes)
        .merge(account_routes)
        .merge(draft_routes)
        .merge(settings_routes)
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(app_state)
}
