// apitoken: Credential Store Repository
//
// Persistence primitives over the `api_tokens` table. No business rules live
// here: emptiness and existence checks belong to the manager. The one rule the
// database itself enforces is service uniqueness, surfaced as
// `StoreError::Duplicate` so concurrent creates cannot both succeed.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{params, params_from_iter, OptionalExtension};
use uuid::Uuid;

use super::db::Database;
use super::models::{Credential, CredentialSummary};
use super::StoreError;

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over credential storage operations.
pub trait CredentialStore: Send + Sync {
    /// Exact, case-sensitive lookup of one service.
    fn find_by_service(&self, service: &str) -> Result<Option<Credential>, StoreError>;

    /// Any one credential whose service is in `services`.
    /// Deterministic: the lowest service name wins.
    fn find_by_services(&self, services: &[String]) -> Result<Option<Credential>, StoreError>;

    /// Every credential whose service is in `services`, ordered by service.
    fn find_all_by_services(&self, services: &[String]) -> Result<Vec<Credential>, StoreError>;

    /// Insert a new row. Fails with `Duplicate` if the service already has one.
    fn insert(&self, service: &str, secret_hash: &str) -> Result<Credential, StoreError>;

    /// Replace the hash in place. Returns false if no row exists.
    fn update_hash(&self, service: &str, secret_hash: &str) -> Result<bool, StoreError>;

    /// Delete the row for `service`. Returns the number of rows removed.
    fn delete_by_service(&self, service: &str) -> Result<usize, StoreError>;

    /// All services in creation order, without hashes.
    fn list_all(&self) -> Result<Vec<CredentialSummary>, StoreError>;
}

// ─── SQLite Implementation ──────────────────────────────────────────────────

const CREDENTIAL_COLUMNS: &str = "id, service, secret_hash, created_at, updated_at";

#[derive(Clone, Debug)]
pub struct SqliteCredentialStore {
    db: Arc<Database>,
}

impl SqliteCredentialStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Parse a full credential row.
    fn row_to_credential(row: &rusqlite::Row<'_>) -> rusqlite::Result<Credential> {
        let id_str: String = row.get(0)?;
        let service: String = row.get(1)?;
        let secret_hash: String = row.get(2)?;
        let created_at_str: String = row.get(3)?;
        let updated_at_str: String = row.get(4)?;

        let id = Uuid::parse_str(&id_str).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(Credential::new(
            id,
            service,
            secret_hash,
            parse_timestamp(3, &created_at_str)?,
            parse_timestamp(4, &updated_at_str)?,
        ))
    }

    /// Parse a listing row (service, created_at).
    fn row_to_summary(row: &rusqlite::Row<'_>) -> rusqlite::Result<CredentialSummary> {
        let service: String = row.get(0)?;
        let created_at_str: String = row.get(1)?;

        Ok(CredentialSummary {
            service,
            created_at: parse_timestamp(1, &created_at_str)?,
        })
    }
}

impl CredentialStore for SqliteCredentialStore {
    fn find_by_service(&self, service: &str) -> Result<Option<Credential>, StoreError> {
        let conn = self.db.conn()?;
        let cred = conn
            .query_row(
                &format!("SELECT {CREDENTIAL_COLUMNS} FROM api_tokens WHERE service = ?1"),
                params![service],
                Self::row_to_credential,
            )
            .optional()?;
        Ok(cred)
    }

    fn find_by_services(&self, services: &[String]) -> Result<Option<Credential>, StoreError> {
        if services.is_empty() {
            return Ok(None);
        }

        let conn = self.db.conn()?;
        let sql = format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM api_tokens
             WHERE service IN ({}) ORDER BY service ASC LIMIT 1",
            placeholders(services.len())
        );
        let cred = conn
            .query_row(&sql, params_from_iter(services.iter()), Self::row_to_credential)
            .optional()?;
        Ok(cred)
    }

    fn find_all_by_services(&self, services: &[String]) -> Result<Vec<Credential>, StoreError> {
        if services.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM api_tokens
             WHERE service IN ({}) ORDER BY service ASC",
            placeholders(services.len())
        ))?;

        let rows = stmt.query_map(params_from_iter(services.iter()), Self::row_to_credential)?;

        let mut creds = Vec::new();
        for row in rows {
            creds.push(row?);
        }

        Ok(creds)
    }

    fn insert(&self, service: &str, secret_hash: &str) -> Result<Credential, StoreError> {
        let id = Uuid::new_v4();
        let now = now();

        let conn = self.db.conn()?;
        conn.execute(
            &format!("INSERT INTO api_tokens ({CREDENTIAL_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
            params![
                id.to_string(),
                service,
                secret_hash,
                format_timestamp(&now),
                format_timestamp(&now),
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Duplicate(service.to_string())
            } else {
                StoreError::Database(e)
            }
        })?;

        tracing::debug!(credential_id = %id, service = %service, "Credential row inserted");

        Ok(Credential::new(
            id,
            service.to_string(),
            secret_hash.to_string(),
            now,
            now,
        ))
    }

    fn update_hash(&self, service: &str, secret_hash: &str) -> Result<bool, StoreError> {
        let conn = self.db.conn()?;
        let affected = conn.execute(
            "UPDATE api_tokens SET secret_hash = ?1, updated_at = ?2 WHERE service = ?3",
            params![secret_hash, format_timestamp(&now()), service],
        )?;

        if affected > 0 {
            tracing::debug!(service = %service, "Credential hash replaced");
        }

        Ok(affected > 0)
    }

    fn delete_by_service(&self, service: &str) -> Result<usize, StoreError> {
        let conn = self.db.conn()?;
        let affected = conn.execute(
            "DELETE FROM api_tokens WHERE service = ?1",
            params![service],
        )?;

        if affected > 0 {
            tracing::debug!(service = %service, "Credential row deleted");
        }

        Ok(affected)
    }

    fn list_all(&self) -> Result<Vec<CredentialSummary>, StoreError> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(
            "SELECT service, created_at FROM api_tokens
             ORDER BY created_at ASC, rowid ASC",
        )?;

        let rows = stmt.query_map([], Self::row_to_summary)?;

        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(row?);
        }

        Ok(summaries)
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// `?1, ?2, ..., ?n`
fn placeholders(n: usize) -> String {
    (1..=n)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Current time at the precision the table stores.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

// Fixed-width RFC 3339 so lexical order matches chronological order.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

// ─── Tests ───────────────────────────────────────────────────────────────────
