//! peersync CLI - sync the device list and open tabs of your other devices
//!
//! Fetches the `clients` and `tabs` collections into a local database and
//! lets you browse them or queue tabs for another device.

mod cli;
mod commands;
mod config_profiles;
mod error;

#[cfg(test)]
mod tests;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::clients::run_clients;
use crate::commands::common::resolve_db_path;
use crate::commands::config::run_config;
use crate::commands::reset::run_reset;
use crate::commands::send_tab::run_send_tab;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::commands::tabs::run_tabs;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "peersync=info".parse::<tracing_subscriber::filter::Directive>() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let profile = cli.profile.as_deref();
    let db_path = cli.db_path;

    match cli.command {
        Commands::Sync { json } => run_sync(&resolve_db_path(db_path)?, profile, json).await?,
        Commands::Clients { json } => run_clients(&resolve_db_path(db_path)?, json).await?,
        Commands::Tabs { device, json } => {
            run_tabs(&resolve_db_path(db_path)?, device.as_deref(), json).await?;
        }
        Commands::SendTab { device, url, title } => {
            run_send_tab(&resolve_db_path(db_path)?, profile, &device, &url, title).await?;
        }
        Commands::Status { json } => run_status(&resolve_db_path(db_path)?, profile, json).await?,
        Commands::Reset {
            collection,
            remote,
            yes,
        } => run_reset(&resolve_db_path(db_path)?, profile, collection, remote, yes).await?,
        Commands::Config { command } => run_config(command, profile)?,
    }

    Ok(())
}
