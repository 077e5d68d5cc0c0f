use anyhow::{bail, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use crate::exchanges::SyncWindow;

pub mod binance_sync;
pub mod bot;
pub mod credentials;
pub mod enrichment;
pub mod market;
pub mod migrate;
pub mod queue;
pub mod test_sync;
pub mod transactions;
pub mod version;

pub use binance_sync::handle_binance_sync;
pub use bot::{handle_bot_decision, handle_bot_start, handle_bot_status, handle_bot_stop};
pub use credentials::handle_credentials_add;
pub use enrichment::{handle_enrichment_check, handle_enrichment_process};
pub use market::handle_market_sync;
pub use migrate::handle_migrate;
pub use queue::handle_queue_work;
pub use test_sync::handle_test_transaction_sync;
pub use transactions::handle_sync_recent;
pub use version::handle_version;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;

pub(crate) fn info(message: impl AsRef<str>) {
    println!("  INFO  {}", message.as_ref());
}

pub(crate) fn warn(message: impl AsRef<str>) {
    println!("  WARN  {}", message.as_ref());
}

pub(crate) fn error(message: impl AsRef<str>) {
    eprintln!("  ERROR  {}", message.as_ref());
}

/// Sync window from explicit dates (inclusive, whole days) or the last
/// `days` days ending at `now`.
pub fn resolve_window(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    days: i64,
    now: DateTime<Utc>,
) -> Result<SyncWindow> {
    let end_at = match end {
        Some(date) => date.and_time(NaiveTime::MIN).and_utc() + Duration::days(1) - Duration::seconds(1),
        None => now,
    };
    let start_at = match start {
        Some(date) => date.and_time(NaiveTime::MIN).and_utc(),
        None => {
            if days <= 0 {
                bail!("--days must be positive, got {}", days);
            }
            end_at - Duration::days(days)
        }
    };
    if start_at > end_at {
        bail!("Start date {} is after end date {}", start_at.date_naive(), end_at.date_naive());
    }
    Ok(SyncWindow::new(start_at, end_at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::testing::at;

    #[test]
    fn test_window_from_days() {
        let window = resolve_window(None, None, 7, at(20, 12)).unwrap();
        assert_eq!(window.start, at(13, 12));
        assert_eq!(window.end, at(20, 12));
    }

    #[test]
    fn test_window_from_dates_covers_whole_days() {
        let window = resolve_window(
            NaiveDate::from_ymd_opt(2025, 3, 1),
            NaiveDate::from_ymd_opt(2025, 3, 2),
            30,
            at(20, 12),
        )
        .unwrap();
        assert_eq!(window.start, at(1, 0));
        assert_eq!(window.end, at(3, 0) - Duration::seconds(1));
    }

    #[test]
    fn test_window_start_only_runs_until_now() {
        let window = resolve_window(NaiveDate::from_ymd_opt(2025, 3, 5), None, 30, at(20, 12)).unwrap();
        assert_eq!(window.start, at(5, 0));
        assert_eq!(window.end, at(20, 12));
    }

    #[test]
    fn test_window_rejects_inverted_range() {
        assert!(resolve_window(NaiveDate::from_ymd_opt(2025, 3, 9), NaiveDate::from_ymd_opt(2025, 3, 2), 30, at(20, 12)).is_err());
        assert!(resolve_window(None, None, 0, at(20, 12)).is_err());
    }
}
