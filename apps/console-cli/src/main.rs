//! Operator CLI for the admin console access control module.

mod commands;
mod logging;
mod session_file;

use std::path::PathBuf;
use std::sync::Arc;

use access_control::{AccessControlModule, ConsoleConfig};
use access_control_sdk::PermissionAction;
use anyhow::Context;
use clap::{Parser, Subcommand};
use console_security::SessionContext;

use crate::session_file::FileSessionStorage;

#[derive(Parser)]
#[command(name = "console-cli")]
#[command(about = "Inspect and exercise admin console access control", long_about = None)]
struct Cli {
    /// YAML configuration file; `CONSOLE__*` variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// File holding the persisted session
    #[arg(long, global = true, default_value = ".console-session.json")]
    session_file: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in as an administrator and print the landing route
    Login {
        #[arg(short, long)]
        identifier: String,

        /// Password; read from `CONSOLE_ADMIN_PASSWORD` when omitted
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Destroy the persisted session
    Logout,
    /// Show the signed-in user and role ids
    Whoami,
    /// Check one permission for the signed-in user
    Check {
        module: String,

        #[arg(short, long)]
        sub_module: Option<String>,

        #[arg(short, long, default_value = "can_view")]
        action: PermissionAction,
    },
    /// Guard a navigation to `path`
    Guard { path: String },
    /// Print the sidebar visible to the signed-in user
    Sidebar,
    /// Print the breadcrumb trail for `path`
    Breadcrumbs { path: String },
    /// List declared screens and their requirements
    Routes,
    /// Print the post-login landing route for the signed-in user
    Landing,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ConsoleConfig::load(cli.config.as_deref()).context("failed to load config")?;
    logging::init(&config.logging, cli.verbose);

    let storage = Arc::new(FileSessionStorage::new(cli.session_file));
    tracing::debug!(path = %storage.path().display(), "Using session file");
    let session = Arc::new(
        SessionContext::builder()
            .default_namespace(&config.session.namespace)
            .storage(storage)
            .build(),
    );
    let module = AccessControlModule::with_http_backend(config, session)?;

    let output = match cli.command {
        Command::Login {
            identifier,
            password,
        } => commands::login(&module, &identifier, password).await?,
        Command::Logout => commands::logout(&module)?,
        Command::Whoami => commands::whoami(&module),
        Command::Check {
            module: name,
            sub_module,
            action,
        } => commands::check(&module, &name, sub_module.as_deref(), action).await,
        Command::Guard { path } => commands::guard(&module, &path).await,
        Command::Sidebar => commands::sidebar(&module).await?,
        Command::Breadcrumbs { path } => commands::breadcrumbs(&module, &path)?,
        Command::Routes => commands::routes(&module),
        Command::Landing => commands::landing(&module).await,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
