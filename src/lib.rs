// apitoken: Library root
//
// Service API tokens: minting and lifecycle (manager), hashed storage
// (store), request authorization (gateway), and the operator CLI.

pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod gateway;
pub mod manager;
pub mod store;

pub use error::{ApiTokenError, Result};
pub use gateway::{Decision, Gate, MatchMode};
pub use manager::CredentialManager;
