// apitoken: Runtime settings
//
// Everything here is fed from clap flags or their APITOKEN_* environment
// variables. `Settings` turns them into the store and codec handles that the
// manager and gate take explicitly; there is no process-wide state.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::codec::{Argon2Codec, HashParams};
use crate::error::{ApiTokenError, Result};
use crate::gateway::{Gate, MatchMode};
use crate::manager::CredentialManager;
use crate::store::{Database, SqliteCredentialStore};

/// Default listen address for `apitoken serve`.
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";

/// `<data_dir>/apitoken/apitoken.db`, or `./apitoken.db` when the platform
/// has no data directory.
pub fn default_db_path() -> PathBuf {
    dirs_next::data_dir()
        .map(|base| base.join("apitoken").join("apitoken.db"))
        .unwrap_or_else(|| PathBuf::from("apitoken.db"))
}

// ─── Settings ────────────────────────────────────────────────────────────────

/// Resolved settings shared by every subcommand.
#[derive(Debug, Clone)]
pub struct Settings {
    pub db_path: PathBuf,
    pub hash: HashParams,
}

impl Settings {
    pub fn new(db_path: PathBuf, hash: HashParams) -> Self {
        Self { db_path, hash }
    }

    /// Open (creating if needed) the token database.
    pub fn open_database(&self) -> Result<Arc<Database>> {
        let db = Database::open(&self.db_path)?;
        Ok(Arc::new(db))
    }

    /// Build the codec. Rejects cost parameters Argon2 cannot use.
    pub fn codec(&self) -> Result<Argon2Codec> {
        Ok(Argon2Codec::new(self.hash)?)
    }

    /// Manager over the configured database.
    pub fn manager(&self) -> Result<CredentialManager> {
        let store = Arc::new(SqliteCredentialStore::new(self.open_database()?));
        Ok(CredentialManager::new(store, Arc::new(self.codec()?)))
    }

    /// Gate over the configured database.
    pub fn gate(&self, mode: MatchMode) -> Result<Gate> {
        let store = Arc::new(SqliteCredentialStore::new(self.open_database()?));
        Ok(Gate::new(store, Arc::new(self.codec()?)).with_mode(mode))
    }
}

// ─── Routes ──────────────────────────────────────────────────────────────────

/// One protected route: `NAME=svc1,svc2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub name: String,
    pub services: Vec<String>,
}

impl FromStr for RouteEntry {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        let (name, services) = raw
            .split_once('=')
            .ok_or_else(|| format!("expected NAME=service[,service...], got '{}'", raw))?;

        let name = name.trim();
        if name.is_empty() {
            return Err(format!("route name is empty in '{}'", raw));
        }

        let services = services
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            name: name.to_string(),
            services,
        })
    }
}

/// Route name to acceptable-service list.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: BTreeMap<String, Vec<String>>,
}

impl RouteTable {
    /// Build the table, rejecting duplicate route names.
    pub fn from_entries(entries: Vec<RouteEntry>) -> Result<Self> {
        let mut routes = BTreeMap::new();
        for entry in entries {
            if entry.services.is_empty() {
                tracing::warn!(route = %entry.name, "Route lists no services and will deny every request");
            }
            if routes.insert(entry.name.clone(), entry.services).is_some() {
                return Err(ApiTokenError::Config(format!(
                    "route '{}' is defined more than once",
                    entry.name
                )));
            }
        }
        Ok(Self { routes })
    }

    /// Acceptable services for a route. Unknown routes get an empty list.
    pub fn services(&self, name: &str) -> &[String] {
        self.routes.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.routes.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
