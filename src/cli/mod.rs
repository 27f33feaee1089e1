// apitoken: CLI Module
//
// Command-line interface using clap derive macros.
// Subcommands: create, regenerate, delete, list, check, serve.

mod commands;

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::codec::HashParams;
use crate::config::{default_db_path, RouteEntry, Settings, DEFAULT_BIND};
use crate::gateway::MatchMode;

pub use commands::execute;

/// apitoken: service API tokens for guarding HTTP routes.
#[derive(Parser, Debug)]
#[command(name = "apitoken")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// SQLite database holding the token hashes.
    #[arg(long, global = true, env = "APITOKEN_DB", default_value_os_t = default_db_path())]
    pub db: PathBuf,

    /// Argon2id memory cost in KiB.
    #[arg(long, global = true, env = "APITOKEN_HASH_MEMORY_KIB", default_value_t = HashParams::default().memory_kib)]
    pub hash_memory_kib: u32,

    /// Argon2id iteration count.
    #[arg(long, global = true, env = "APITOKEN_HASH_ITERATIONS", default_value_t = HashParams::default().iterations)]
    pub hash_iterations: u32,

    /// Argon2id lane count.
    #[arg(long, global = true, env = "APITOKEN_HASH_PARALLELISM", default_value_t = HashParams::default().parallelism)]
    pub hash_parallelism: u32,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn settings(&self) -> Settings {
        Settings::new(
            self.db.clone(),
            HashParams {
                memory_kib: self.hash_memory_kib,
                iterations: self.hash_iterations,
                parallelism: self.hash_parallelism,
            },
        )
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a token for a service. The token is shown once.
    Create {
        /// Service name (e.g., "billing").
        service: String,
    },

    /// Replace the token of an existing service. The old token stops working.
    Regenerate {
        service: String,
    },

    /// Delete the token of a service.
    Delete {
        service: String,
    },

    /// List services that have a token (never the tokens themselves).
    List {
        /// Print the listing as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Check a token against a set of acceptable services. Exits 1 on deny.
    Check {
        /// Acceptable services for the route being checked.
        #[arg(required = true)]
        services: Vec<String>,

        /// The token to check.
        #[arg(long, env = "APITOKEN_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Candidate matching: "any" checks every listed service, "first" only the lowest name.
        #[arg(long, default_value = "any")]
        match_mode: MatchMode,
    },

    /// Run the forward-auth HTTP server.
    Serve {
        /// Listen address.
        #[arg(long, env = "APITOKEN_BIND", default_value = DEFAULT_BIND)]
        bind: SocketAddr,

        /// Protected route as NAME=service[,service...]. Repeatable.
        #[arg(long = "route", env = "APITOKEN_ROUTES", value_delimiter = ';')]
        routes: Vec<RouteEntry>,

        /// Candidate matching: "any" or "first".
        #[arg(long, default_value = "any")]
        match_mode: MatchMode,

        /// Also accept the token from the `api_token` query parameter.
        #[arg(long)]
        allow_query_token: bool,
    },
}
