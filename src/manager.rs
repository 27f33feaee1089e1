// apitoken: Credential Manager
//
// Lifecycle operations for service tokens. The manager owns the business
// rules (non-empty names, one credential per service, existence checks) and
// is the only place raw tokens are minted. A raw token is handed back to the
// caller once and dropped; only its hash reaches the store.

use std::sync::Arc;

use zeroize::Zeroizing;

use crate::codec::TokenCodec;
use crate::error::{ApiTokenError, Result};
use crate::store::{CredentialStore, CredentialSummary, StoreError};

/// Create, regenerate, delete and list service tokens.
#[derive(Clone)]
pub struct CredentialManager {
    store: Arc<dyn CredentialStore>,
    codec: Arc<dyn TokenCodec>,
}

impl CredentialManager {
    pub fn new(store: Arc<dyn CredentialStore>, codec: Arc<dyn TokenCodec>) -> Self {
        Self { store, codec }
    }

    /// Mint a token for a service that has none yet. Returns the raw token.
    pub fn create(&self, service: &str) -> Result<Zeroizing<String>> {
        require_service(service)?;

        if self.store.find_by_service(service)?.is_some() {
            return Err(ApiTokenError::AlreadyExists(service.to_string()));
        }

        let secret = self.codec.generate_secret();
        let hash = self.codec.hash(&secret)?;

        // The unique index settles races that slip past the lookup above.
        self.store.insert(service, &hash).map_err(|e| match e {
            StoreError::Duplicate(s) => ApiTokenError::AlreadyExists(s),
            other => ApiTokenError::StorageFailure(other),
        })?;

        tracing::info!(service = %service, "Token created");
        Ok(secret)
    }

    /// Replace the token of an existing service. The old token stops working.
    pub fn regenerate(&self, service: &str) -> Result<Zeroizing<String>> {
        require_service(service)?;

        if self.store.find_by_service(service)?.is_none() {
            return Err(ApiTokenError::NotFound(service.to_string()));
        }

        let secret = self.codec.generate_secret();
        let hash = self.codec.hash(&secret)?;

        // A concurrent delete can remove the row between lookup and update.
        if !self.store.update_hash(service, &hash)? {
            return Err(ApiTokenError::NotFound(service.to_string()));
        }

        tracing::info!(service = %service, "Token regenerated");
        Ok(secret)
    }

    /// Remove the token of a service.
    pub fn delete(&self, service: &str) -> Result<()> {
        require_service(service)?;

        if self.store.delete_by_service(service)? == 0 {
            return Err(ApiTokenError::NotFound(service.to_string()));
        }

        tracing::info!(service = %service, "Token deleted");
        Ok(())
    }

    /// All services with a token, in creation order. Never includes hashes.
    pub fn list(&self) -> Result<Vec<CredentialSummary>> {
        Ok(self.store.list_all()?)
    }
}

fn require_service(service: &str) -> Result<()> {
    if service.is_empty() {
        return Err(ApiTokenError::InvalidInput(
            "Service name cannot be empty".to_string(),
        ));
    }
    Ok(())
}

// ─── Tests ───────────────────────────────────────────────────────────────────
