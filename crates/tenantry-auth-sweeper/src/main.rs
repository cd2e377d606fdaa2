mod cli;
mod config;
mod observability;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use time::OffsetDateTime;

use tenantry_auth::types::TokenKind;
use tenantry_auth::{AuthorizationStore, ExpirySweeper};
use tenantry_auth_postgres::PostgresAuthStorage;

use cli::{Cli, Commands};
use config::AppConfig;

#[tokio::main]
async fn main() {
    // Load .env file if present; a missing file is not an error
    if let Err(e) = dotenvy::dotenv()
        && !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
    {
        eprintln!("Warning: Failed to load .env file: {e}");
    }

    observability::init_tracing();

    let cli = Cli::parse();

    let cfg = match config::loader::load_config(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };
    observability::apply_logging_level(&cfg.logging.level);

    if let Err(e) = run(cli, cfg).await {
        tracing::error!(error = %format!("{e:#}"), "Command failed");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, cfg: AppConfig) -> Result<()> {
    let storage = PostgresAuthStorage::connect(&cfg.database.url, cfg.database.max_connections)
        .await
        .context("failed to connect to database")?;

    let store = AuthorizationStore::new(
        Arc::new(storage.authorizations()),
        Arc::new(storage.clients()),
    )
    .with_mapper(cfg.auth.mapper());
    let sweeper = ExpirySweeper::for_store(&store, Arc::new(storage.clients()), &cfg.auth.sweeper);

    match cli.command {
        Commands::Migrate => {
            storage.migrate().await.context("migration failed")?;
        }
        Commands::Sweep(args) if args.dry_run => {
            let as_of = OffsetDateTime::now_utc();
            for kind in TokenKind::ALL {
                let expired = sweeper.count_expired(kind, as_of).await?;
                tracing::info!(kind = %kind, expired, "Expired authorizations");
            }
        }
        Commands::Sweep(_) => {
            let deleted = sweeper.run_once().await?;
            tracing::info!(deleted, "Sweep finished");
        }
        Commands::Run => {
            if !cfg.auth.sweeper.enabled {
                tracing::warn!("Sweeper is disabled in configuration; nothing to run");
                return Ok(());
            }
            tracing::info!(
                interval = ?cfg.auth.sweeper.interval,
                "Starting authorization sweeper"
            );
            let handle = Arc::new(sweeper).start();
            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for shutdown signal")?;
            handle.abort();
            tracing::info!("Authorization sweeper stopped");
        }
    }

    Ok(())
}
