// apitoken: Authorization Gate
//
// Decides Allow or Deny for one request from the presented credential and the
// route's acceptable-service set. Each decision is independent and leaves no
// state behind. Every internal fault is a Deny.

use std::str::FromStr;
use std::sync::Arc;

use crate::codec::TokenCodec;
use crate::store::{Credential, CredentialStore};

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }
}

/// How candidates for a multi-service route are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Verify against every stored credential in the acceptable set.
    #[default]
    AnyCandidate,
    /// Verify against a single candidate only (the lowest service name).
    /// A valid token for another listed service is denied.
    FirstCandidate,
}

impl FromStr for MatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "any" => Ok(MatchMode::AnyCandidate),
            "first" => Ok(MatchMode::FirstCandidate),
            other => Err(format!("unknown match mode '{}', use 'any' or 'first'", other)),
        }
    }
}

/// Why a request was denied. Logged, never returned to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DenyReason {
    MissingCredential,
    NoServices,
    NoCandidate,
    Mismatch,
    StoreError,
}

impl DenyReason {
    fn as_str(self) -> &'static str {
        match self {
            DenyReason::MissingCredential => "missing_credential",
            DenyReason::NoServices => "no_services",
            DenyReason::NoCandidate => "no_candidate",
            DenyReason::Mismatch => "mismatch",
            DenyReason::StoreError => "store_error",
        }
    }
}

/// Request authorization against stored service tokens.
#[derive(Clone)]
pub struct Gate {
    store: Arc<dyn CredentialStore>,
    codec: Arc<dyn TokenCodec>,
    mode: MatchMode,
}

impl Gate {
    pub fn new(store: Arc<dyn CredentialStore>, codec: Arc<dyn TokenCodec>) -> Self {
        Self {
            store,
            codec,
            mode: MatchMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Decide whether `credential` grants access to a route that accepts
    /// tokens of any service in `services`.
    pub fn authorize(&self, credential: Option<&str>, services: &[String]) -> Decision {
        match self.evaluate(credential, services) {
            Ok(service) => {
                tracing::debug!(service = %service, "Request authorized");
                Decision::Allow
            }
            Err(reason) => {
                tracing::debug!(reason = reason.as_str(), ?services, "Request denied");
                Decision::Deny
            }
        }
    }

    /// Returns the service whose token matched.
    fn evaluate(&self, credential: Option<&str>, services: &[String]) -> Result<String, DenyReason> {
        let presented = match credential {
            Some(c) if !c.is_empty() => c,
            _ => return Err(DenyReason::MissingCredential),
        };

        if services.is_empty() {
            return Err(DenyReason::NoServices);
        }

        let candidates = self.candidates(services)?;
        if candidates.is_empty() {
            return Err(DenyReason::NoCandidate);
        }

        candidates
            .into_iter()
            .find(|cred| self.codec.verify(presented, cred.secret_hash()))
            .map(|cred| cred.service)
            .ok_or(DenyReason::Mismatch)
    }

    fn candidates(&self, services: &[String]) -> Result<Vec<Credential>, DenyReason> {
        let result = match self.mode {
            MatchMode::AnyCandidate => self.store.find_all_by_services(services),
            MatchMode::FirstCandidate => self
                .store
                .find_by_services(services)
                .map(|found| found.into_iter().collect()),
        };

        result.map_err(|e| {
            tracing::warn!(error = %e, "Credential lookup failed, denying request");
            DenyReason::StoreError
        })
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Argon2Codec, HashParams};
    use crate::manager::CredentialManager;
    use crate::store::{CredentialSummary, Database, SqliteCredentialStore, StoreError};

    fn setup() -> (Gate, CredentialManager) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let store = Arc::new(SqliteCredentialStore::new(db));
        let codec = Arc::new(
            Argon2Codec::new(HashParams {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            })
            .unwrap(),
        );
        let gate = Gate::new(store.clone(), codec.clone());
        let manager = CredentialManager::new(store, codec);
        (gate, manager)
    }

    fn services(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    struct FailingStore;

    impl CredentialStore for FailingStore {
        fn find_by_service(&self, _: &str) -> Result<Option<Credential>, StoreError> {
            Err(StoreError::Poisoned)
        }
        fn find_by_services(&self, _: &[String]) -> Result<Option<Credential>, StoreError> {
            Err(StoreError::Poisoned)
        }
        fn find_all_by_services(&self, _: &[String]) -> Result<Vec<Credential>, StoreError> {
            Err(StoreError::Poisoned)
        }
        fn insert(&self, _: &str, _: &str) -> Result<Credential, StoreError> {
            Err(StoreError::Poisoned)
        }
        fn update_hash(&self, _: &str, _: &str) -> Result<bool, StoreError> {
            Err(StoreError::Poisoned)
        }
        fn delete_by_service(&self, _: &str) -> Result<usize, StoreError> {
            Err(StoreError::Poisoned)
        }
        fn list_all(&self) -> Result<Vec<CredentialSummary>, StoreError> {
            Err(StoreError::Poisoned)
        }
    }

    #[test]
    fn test_valid_token_is_allowed() {
        let (gate, manager) = setup();
        let token = manager.create("test").unwrap();

        let decision = gate.authorize(Some(token.as_str()), &services(&["test"]));
        assert_eq!(decision, Decision::Allow);
        assert!(decision.is_allowed());
    }

    #[test]
    fn test_missing_token_is_denied() {
        let (gate, manager) = setup();
        manager.create("test").unwrap();

        assert_eq!(gate.authorize(None, &services(&["test"])), Decision::Deny);
        assert_eq!(gate.authorize(Some(""), &services(&["test"])), Decision::Deny);
    }

    #[test]
    fn test_invalid_token_is_denied() {
        let (gate, manager) = setup();
        manager.create("test").unwrap();

        assert_eq!(
            gate.authorize(Some("invalidtoken"), &services(&["test"])),
            Decision::Deny
        );
    }

    #[test]
    fn test_empty_service_set_is_denied() {
        let (gate, manager) = setup();
        let token = manager.create("test").unwrap();

        assert_eq!(gate.authorize(Some(token.as_str()), &[]), Decision::Deny);
    }

    #[test]
    fn test_nonexistent_service_is_denied() {
        let (gate, manager) = setup();
        let token = manager.create("test").unwrap();

        assert_eq!(
            gate.authorize(Some(token.as_str()), &services(&["nottest"])),
            Decision::Deny
        );
    }

    #[test]
    fn test_token_of_unlisted_service_is_denied() {
        let (gate, manager) = setup();
        manager.create("test1").unwrap();
        let token3 = manager.create("test3").unwrap();

        assert_eq!(
            gate.authorize(Some(token3.as_str()), &services(&["test1", "test2"])),
            Decision::Deny
        );
    }

    #[test]
    fn test_any_candidate_accepts_every_listed_service() {
        let (gate, manager) = setup();
        let token1 = manager.create("test1").unwrap();
        let token2 = manager.create("test2").unwrap();
        let token3 = manager.create("test3").unwrap();
        let route = services(&["test1", "test2"]);

        assert_eq!(gate.authorize(Some(token1.as_str()), &route), Decision::Allow);
        assert_eq!(gate.authorize(Some(token2.as_str()), &route), Decision::Allow);
        assert_eq!(gate.authorize(Some(token3.as_str()), &route), Decision::Deny);
    }

    #[test]
    fn test_first_candidate_checks_single_row() {
        let (gate, manager) = setup();
        let gate = gate.with_mode(MatchMode::FirstCandidate);
        let token1 = manager.create("test1").unwrap();
        let token2 = manager.create("test2").unwrap();
        let route = services(&["test2", "test1"]);

        // Only the lowest service name ("test1") is consulted.
        assert_eq!(gate.authorize(Some(token1.as_str()), &route), Decision::Allow);
        assert_eq!(gate.authorize(Some(token2.as_str()), &route), Decision::Deny);
    }

    #[test]
    fn test_regenerated_token_replaces_old_one() {
        let (gate, manager) = setup();
        let old = manager.create("billing").unwrap();
        let new = manager.regenerate("billing").unwrap();
        let route = services(&["billing"]);

        assert_eq!(gate.authorize(Some(old.as_str()), &route), Decision::Deny);
        assert_eq!(gate.authorize(Some(new.as_str()), &route), Decision::Allow);
    }

    #[test]
    fn test_store_failure_fails_closed() {
        let codec = Arc::new(Argon2Codec::default());
        let gate = Gate::new(Arc::new(FailingStore), codec);

        assert_eq!(
            gate.authorize(Some("anything"), &services(&["test"])),
            Decision::Deny
        );
    }

    #[test]
    fn test_with_mode_overrides_default() {
        let (gate, _) = setup();
        assert_eq!(gate.mode(), MatchMode::AnyCandidate);
        assert_eq!(
            gate.with_mode(MatchMode::FirstCandidate).mode(),
            MatchMode::FirstCandidate
        );
    }

    #[test]
    fn test_match_mode_from_str() {
        assert_eq!("any".parse::<MatchMode>().unwrap(), MatchMode::AnyCandidate);
        assert_eq!("first".parse::<MatchMode>().unwrap(), MatchMode::FirstCandidate);
        assert!("all".parse::<MatchMode>().is_err());
        assert_eq!(MatchMode::default(), MatchMode::AnyCandidate);
    }
}
