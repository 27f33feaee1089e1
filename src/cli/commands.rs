// apitoken: CLI Command Handlers
//
// Each function handles one CLI subcommand. Handlers write to the `out`
// they are given so the exact operator-facing text is testable; `execute`
// hands them stdout. The `serve` command starts the forward-auth server.

use std::io::{self, Write};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::{RouteEntry, RouteTable, Settings};
use crate::error::{ApiTokenError, Result};
use crate::gateway::{http, Decision, Gate, MatchMode};
use crate::manager::CredentialManager;

use super::{Cli, Commands};

/// Timestamp format of the `list` table.
const LIST_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Execute the parsed CLI command.
pub async fn execute(cli: Cli) -> Result<()> {
    let settings = cli.settings();
    let mut out = io::stdout();

    match cli.command {
        Commands::Create { service } => cmd_create(&settings.manager()?, &service, &mut out),
        Commands::Regenerate { service } => {
            cmd_regenerate(&settings.manager()?, &service, &mut out)
        }
        Commands::Delete { service } => cmd_delete(&settings.manager()?, &service, &mut out),
        Commands::List { json } => cmd_list(&settings.manager()?, json, &mut out),
        Commands::Check {
            services,
            token,
            match_mode,
        } => cmd_check(&settings.gate(match_mode)?, token.as_deref(), &services, &mut out),
        Commands::Serve {
            bind,
            routes,
            match_mode,
            allow_query_token,
        } => cmd_serve(&settings, bind, routes, match_mode, allow_query_token).await,
    }
}

// ─── Create / Regenerate ─────────────────────────────────────────────────────

fn cmd_create(manager: &CredentialManager, service: &str, out: &mut impl Write) -> Result<()> {
    let token = manager.create(service)?;
    write_token(out, "Token created successfully", service, &token)?;
    Ok(())
}

fn cmd_regenerate(manager: &CredentialManager, service: &str, out: &mut impl Write) -> Result<()> {
    let token = manager.regenerate(service)?;
    write_token(out, "Token regenerated successfully", service, &token)?;
    writeln!(out, "The previous token for '{}' no longer works.", service)?;
    Ok(())
}

/// The only place a raw token is ever printed.
fn write_token(out: &mut impl Write, headline: &str, service: &str, token: &str) -> io::Result<()> {
    writeln!(out, "✓ {}", headline)?;
    writeln!(out, "  Service: {}", service)?;
    writeln!(out, "  Token:   {}", token)?;
    writeln!(out)?;
    writeln!(
        out,
        "Use this token in API requests via Authorization: Bearer <token>."
    )?;
    writeln!(out, "It is shown only once; store it somewhere safe.")?;
    Ok(())
}

// ─── Delete ──────────────────────────────────────────────────────────────────

fn cmd_delete(manager: &CredentialManager, service: &str, out: &mut impl Write) -> Result<()> {
    manager.delete(service)?;
    writeln!(out, "Token for service '{}' deleted successfully.", service)?;
    Ok(())
}

// ─── List ────────────────────────────────────────────────────────────────────

fn cmd_list(manager: &CredentialManager, json: bool, out: &mut impl Write) -> Result<()> {
    let summaries = manager.list()?;

    if json {
        serde_json::to_writer_pretty(&mut *out, &summaries).map_err(io::Error::from)?;
        writeln!(out)?;
        return Ok(());
    }

    if summaries.is_empty() {
        writeln!(out, "No API tokens found.")?;
        return Ok(());
    }

    let rows: Vec<Vec<String>> = summaries
        .iter()
        .map(|s| {
            vec![
                s.service.clone(),
                s.created_at.format(LIST_TIME_FORMAT).to_string(),
            ]
        })
        .collect();

    write_table(out, &["Service", "Created At"], &rows)?;
    Ok(())
}

// ─── Check ───────────────────────────────────────────────────────────────────

fn cmd_check(
    gate: &Gate,
    token: Option<&str>,
    services: &[String],
    out: &mut impl Write,
) -> Result<()> {
    match gate.authorize(token, services) {
        Decision::Allow => {
            writeln!(out, "✓ Authorized")?;
            Ok(())
        }
        Decision::Deny => Err(ApiTokenError::Unauthorized),
    }
}

// ─── Serve ───────────────────────────────────────────────────────────────────

async fn cmd_serve(
    settings: &Settings,
    bind: SocketAddr,
    routes: Vec<RouteEntry>,
    match_mode: MatchMode,
    allow_query_token: bool,
) -> Result<()> {
    let routes = RouteTable::from_entries(routes)?;

    if routes.is_empty() {
        tracing::warn!("No routes configured; every /authorize request will be denied");
    }
    for (name, services) in routes.iter() {
        tracing::info!(route = %name, ?services, "Route configured");
    }

    let gate = Arc::new(settings.gate(match_mode)?);
    tracing::info!(
        db = %settings.db_path.display(),
        match_mode = ?gate.mode(),
        "Starting forward-auth server"
    );

    let router = http::forward_auth_router(gate, routes, allow_query_token);
    http::serve(bind, router).await
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Left-aligned columns separated by `│`, with a rule under the header.
fn write_table(out: &mut impl Write, headers: &[&str], rows: &[Vec<String>]) -> io::Result<()> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    writeln!(out, "  {}", render_row(headers.iter().copied(), &widths))?;
    let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
    writeln!(out, "  {}", rule.join("─┼─"))?;
    for row in rows {
        writeln!(out, "  {}", render_row(row.iter().map(String::as_str), &widths))?;
    }
    Ok(())
}

fn render_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect::<Vec<_>>()
        .join(" │ ")
        .trim_end()
        .to_string()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
