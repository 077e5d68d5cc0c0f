use anyhow::Result;
use clap::Parser;
use shared::{get_db_connection, Config};
use std::process::ExitCode;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod exchanges;
mod jobs;
mod services;
mod state;

use crate::cli::{Cli, Commands};
use crate::state::AppState;

/// Receiver that flips to `true` on Ctrl-C. Its sender is dropped when the
/// signal cannot be registered, which listeners also treat as shutdown.
fn shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Ctrl-C received, finishing current work");
                if tx.send(true).is_err() {
                    tracing::debug!("Nothing is waiting for shutdown");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });
    rx
}

async fn run(command: Commands) -> Result<i32> {
    let config = Config::from_env()?;

    if let Commands::Migrate { fresh } = command {
        let db = get_db_connection(&config.database_url).await?;
        return commands::handle_migrate(&db, fresh).await;
    }

    let state = AppState::new(&config).await?;
    match command {
        Commands::BotStart { config_id } => commands::handle_bot_start(&state, config_id).await,
        Commands::BotStop { config_id } => commands::handle_bot_stop(&state, config_id).await,
        Commands::BotStatus => commands::handle_bot_status(&state).await,
        Commands::BotApprove { action_id } => commands::handle_bot_decision(&state, action_id, true).await,
        Commands::BotReject { action_id } => commands::handle_bot_decision(&state, action_id, false).await,
        Commands::MarketSync { asset, fiat } => commands::handle_market_sync(&state, &asset, &fiat).await,
        Commands::EnrichmentCheck => commands::handle_enrichment_check(&state).await,
        Commands::EnrichmentProcess { stop_when_empty, retry_failed, batch_size, sleep } => {
            commands::handle_enrichment_process(
                &state,
                stop_when_empty,
                retry_failed,
                batch_size,
                Duration::from_secs(sleep),
                shutdown_signal(),
            )
            .await
        }
        Commands::TransactionsSyncRecent { minutes } => commands::handle_sync_recent(&state, minutes).await,
        Commands::BinanceSyncTransactions { user, days, start, end, queue } => {
            commands::handle_binance_sync(&state, user, days, start, end, queue).await
        }
        Commands::TestTransactionSync { days } => commands::handle_test_transaction_sync(&state, days).await,
        Commands::QueueWork { queue, tries, sleep, max_time, stop_when_empty } => {
            commands::handle_queue_work(&state, queue, tries, sleep, max_time, stop_when_empty, shutdown_signal()).await
        }
        Commands::CredentialsAdd { user, exchange, api_key, api_secret, passphrase } => {
            commands::handle_credentials_add(&state, user, exchange, &api_key, &api_secret, passphrase.as_deref()).await
        }
        Commands::Migrate { .. } | Commands::Version => Ok(commands::SUCCESS),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    if cli.command == Commands::Version {
        return ExitCode::from(commands::handle_version() as u8);
    }

    match run(cli.command).await {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            let error = format!("{:#}", e);
            tracing::error!(error = %error, "Command failed");
            ExitCode::FAILURE
        }
    }
}
