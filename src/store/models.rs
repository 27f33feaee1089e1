// apitoken: Credential data models
//
// The `secret_hash` field is private and `Credential` is not serializable.
// Anything that leaves the process (listings, JSON output) goes through
// `CredentialSummary`, which has no hash field at all.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A stored service credential.
pub struct Credential {
    /// Row identity. Preserved across regeneration.
    pub id: Uuid,
    pub service: String,
    secret_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(
        id: Uuid,
        service: String,
        secret_hash: String,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            service,
            secret_hash,
            created_at,
            updated_at,
        }
    }

    /// The Argon2id PHC string for this service's token.
    pub fn secret_hash(&self) -> &str {
        &self.secret_hash
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("service", &self.service)
            .field("secret_hash", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// What `list` returns: the service name and when its token was first created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSummary {
    pub service: String,
    pub created_at: DateTime<Utc>,
}

// ─── Tests ───────────────────────────────────────────────────────────────────
