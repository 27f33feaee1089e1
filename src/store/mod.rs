// apitoken: Store Module
//
// SQLite-backed credential storage. One row per service, holding only the
// Argon2id hash of the service token. Listing never touches the hash column.

mod db;
mod error;
mod models;
mod repository;

pub use db::Database;
pub use error::StoreError;
pub use models::{Credential, CredentialSummary};
pub use repository::{CredentialStore, SqliteCredentialStore};
