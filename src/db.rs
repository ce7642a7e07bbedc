// src/db.rs

pub mod store;
pub use store::{Document, DocumentStore, Snapshot, Subscription};
pub mod memory_store;
pub use memory_store::MemoryStore;
pub mod pg_store;
pub use pg_store::PgDocumentStore;

pub mod account_repo;
pub use account_repo::AccountRepository;
pub mod settings_repo;
pub use settings_repo::SettingsRepository;
pub mod user_repo;
pub use user_repo::UserRepository;
