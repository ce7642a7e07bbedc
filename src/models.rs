// src/models.rs

pub mod account;
pub mod auth;
pub mod settings;
