use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use shared::Exchange;

#[derive(Parser, Debug)]
#[command(name = "ledger", author, version, about = "P2P transaction ledger and pricing bot console", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Activate a bot configuration (or every active one) and queue a strategy run
    #[command(name = "bot:start")]
    BotStart {
        config_id: Option<i64>,
    },

    /// Deactivate one bot configuration, or all of them
    #[command(name = "bot:stop")]
    BotStop {
        config_id: Option<i64>,
    },

    /// Show every bot configuration with its latest action
    #[command(name = "bot:status")]
    BotStatus,

    /// Approve a pending bot action
    #[command(name = "bot:approve")]
    BotApprove {
        action_id: i64,
    },

    /// Reject a pending bot action
    #[command(name = "bot:reject")]
    BotReject {
        action_id: i64,
    },

    /// Queue a P2P marketplace snapshot
    #[command(name = "market:sync")]
    MarketSync {
        #[arg(long, default_value = "USDT")]
        asset: String,
        #[arg(long, default_value = "PEN")]
        fiat: String,
    },

    /// Count transactions per enrichment status
    #[command(name = "enrichment:check")]
    EnrichmentCheck,

    /// Resolve counterparties for pending transactions
    #[command(name = "enrichment:process")]
    EnrichmentProcess {
        #[arg(long)]
        stop_when_empty: bool,
        /// Put transactions that used up their attempts back in the queue first
        #[arg(long)]
        retry_failed: bool,
        #[arg(long)]
        batch_size: Option<u64>,
        /// Seconds to wait between polls when nothing is pending
        #[arg(long, default_value_t = 5)]
        sleep: u64,
    },

    /// Queue a sync of the last few minutes for every active credential
    #[command(name = "transactions:sync-recent")]
    TransactionsSyncRecent {
        #[arg(long, default_value_t = 10)]
        minutes: i64,
    },

    /// Sync Binance P2P history for one or all users
    #[command(name = "binance:sync-transactions")]
    BinanceSyncTransactions {
        #[arg(long)]
        user: Option<i64>,
        #[arg(long, default_value_t = 30)]
        days: i64,
        /// YYYY-MM-DD
        #[arg(long)]
        start: Option<NaiveDate>,
        /// YYYY-MM-DD
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Dispatch one job per credential instead of syncing here
        #[arg(long)]
        queue: bool,
    },

    /// Fetch remote history without writing anything
    #[command(name = "test:transaction-sync")]
    TestTransactionSync {
        #[arg(long, default_value_t = 7)]
        days: i64,
    },

    /// Process queued jobs
    #[command(name = "queue:work")]
    QueueWork {
        #[arg(long)]
        queue: Option<String>,
        #[arg(long, default_value_t = 1)]
        tries: u32,
        #[arg(long, default_value_t = 3)]
        sleep: u64,
        /// Seconds before the worker exits
        #[arg(long)]
        max_time: Option<u64>,
        #[arg(long)]
        stop_when_empty: bool,
    },

    /// Store encrypted exchange API credentials for a user
    #[command(name = "credentials:add")]
    CredentialsAdd {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        exchange: Exchange,
        #[arg(long)]
        api_key: String,
        #[arg(long)]
        api_secret: String,
        #[arg(long)]
        passphrase: Option<String>,
    },

    /// Apply database migrations
    Migrate {
        /// Drop every table and migrate from scratch
        #[arg(long)]
        fresh: bool,
    },

    /// Print build information
    Version,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Commands {
        let mut argv = vec!["ledger"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap().command
    }

    #[test]
    fn test_colon_named_commands() {
        assert_eq!(parse(&["bot:start", "3"]), Commands::BotStart { config_id: Some(3) });
        assert_eq!(parse(&["bot:stop"]), Commands::BotStop { config_id: None });
        assert_eq!(parse(&["bot:status"]), Commands::BotStatus);
        assert_eq!(parse(&["bot:reject", "12"]), Commands::BotReject { action_id: 12 });
        assert_eq!(parse(&["enrichment:check"]), Commands::EnrichmentCheck);
        assert_eq!(
            parse(&["enrichment:process", "--stop-when-empty", "--retry-failed"]),
            Commands::EnrichmentProcess { stop_when_empty: true, retry_failed: true, batch_size: None, sleep: 5 }
        );
    }

    #[test]
    fn test_defaults() {
        assert_eq!(
            parse(&["market:sync"]),
            Commands::MarketSync { asset: "USDT".to_string(), fiat: "PEN".to_string() }
        );
        assert_eq!(parse(&["transactions:sync-recent"]), Commands::TransactionsSyncRecent { minutes: 10 });
        assert_eq!(parse(&["test:transaction-sync"]), Commands::TestTransactionSync { days: 7 });
        assert_eq!(
            parse(&["queue:work"]),
            Commands::QueueWork { queue: None, tries: 1, sleep: 3, max_time: None, stop_when_empty: false }
        );
    }

    #[test]
    fn test_binance_sync_options() {
        assert_eq!(
            parse(&["binance:sync-transactions", "--user", "5", "--start", "2025-03-01", "--end", "2025-03-10", "--queue"]),
            Commands::BinanceSyncTransactions {
                user: Some(5),
                days: 30,
                start: NaiveDate::from_ymd_opt(2025, 3, 1),
                end: NaiveDate::from_ymd_opt(2025, 3, 10),
                queue: true,
            }
        );
        assert!(Cli::try_parse_from(["ledger", "binance:sync-transactions", "--start", "03/01/2025"]).is_err());
    }

    #[test]
    fn test_credentials_exchange_is_parsed() {
        let command = parse(&[
            "credentials:add", "--user", "1", "--exchange", "Bybit", "--api-key", "k", "--api-secret", "s",
        ]);
        match command {
            Commands::CredentialsAdd { exchange, passphrase, .. } => {
                assert_eq!(exchange, Exchange::Bybit);
                assert_eq!(passphrase, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(Cli::try_parse_from(["ledger", "credentials:add", "--user", "1", "--exchange", "kraken", "--api-key", "k", "--api-secret", "s"]).is_err());
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        assert!(Cli::try_parse_from(["ledger", "bot:launch"]).is_err());
    }
}
