//! CLI entry point for BookiT.
//!
//! This binary provides the `bookit` command: account management, the book
//! catalogue, and the favorites list of the logged-in user.

mod cli;
mod commands;
mod config;
mod helpers;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::error;

use crate::cli::{Cli, Commands};
use crate::commands::App;
use crate::config::BookitConfig;

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is normal.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %format!("{err:#}"), "command failed");
            eprintln!("  Error: {}", helpers::describe_error(&err));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = BookitConfig::load(&cli.config)?;
    helpers::init_tracing(&config.log_level);

    let app = App::open(&config).await?;

    match cli.command {
        Commands::Register {
            name,
            email,
            password,
            confirm_password,
        } => commands::cmd_register(&app, name, email, password, confirm_password).await,
        Commands::Login { email, password } => commands::cmd_login(&app, email, password).await,
        Commands::Logout => commands::cmd_logout(&app).await,
        Commands::Whoami => commands::cmd_whoami(&app),
        Commands::Refresh => commands::cmd_refresh(&app).await,
        Commands::Books { action } => commands::cmd_books(&app, action),
        Commands::Favorites { action } => commands::cmd_favorites(&app, action).await,
        Commands::Profile { action } => commands::cmd_profile(&app, action).await,
    }
}
