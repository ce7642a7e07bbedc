// src/services.rs

pub mod account_editor;
pub mod account_service;
pub mod address_history;
pub mod auth;
pub mod contact_roster;
pub mod draft_service;
pub mod service_area;
pub mod session;
pub mod settings_service;
