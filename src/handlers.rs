// src/handlers.rs

pub mod accounts;
pub mod auth;
pub mod drafts;
pub mod settings;
