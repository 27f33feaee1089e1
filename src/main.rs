// apitoken: Application Entry Point
//
// Parses CLI arguments, initializes structured logging (tokens and hashes are
// never logged at any level), and dispatches to the command handler.
// Uses the tokio runtime for the forward-auth server.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use apitoken::cli::{execute, Cli};

#[tokio::main]
async fn main() {
    // RUST_LOG=apitoken=debug shows why requests are denied.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("apitoken=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = execute(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
