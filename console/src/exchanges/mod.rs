//! Remote exchange APIs: signed P2P order history and the public ad board.

pub mod binance;
pub mod binance_p2p;
pub mod bybit;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::repositories::{ExchangeCredential, NewP2pAd, NewTransaction};
use shared::{Exchange, TradeSide};
use std::collections::HashMap;
use std::sync::Arc;

pub use binance::BinanceClient;
pub use binance_p2p::BinanceP2pMarket;
pub use bybit::BybitClient;

#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{exchange} API error {code}: {message}")]
    Api {
        exchange: Exchange,
        code: String,
        message: String,
    },
    #[error("unexpected {exchange} payload: {detail}")]
    Decode { exchange: Exchange, detail: String },
    #[error("failed to sign request: {0}")]
    Signing(String),
}

/// Closed time range requested from an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SyncWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }
}

#[async_trait]
pub trait ExchangeClient: Send + Sync {
    fn exchange(&self) -> Exchange;

    /// P2P orders of the credential's owner created inside `window`.
    async fn fetch_p2p_history(
        &self,
        credential: &ExchangeCredential,
        window: &SyncWindow,
    ) -> Result<Vec<NewTransaction>, ExchangeError>;
}

#[async_trait]
pub trait MarketDataSource: Send + Sync {
    fn exchange(&self) -> Exchange;

    /// Ads currently listed by advertisers on `side` for the pair, in
    /// listing order.
    async fn search_ads(&self, asset: &str, fiat: &str, side: TradeSide) -> Result<Vec<NewP2pAd>, ExchangeError>;
}

/// History clients by exchange. Exchanges without one are not synced.
#[derive(Clone, Default)]
pub struct ExchangeRegistry {
    clients: HashMap<Exchange, Arc<dyn ExchangeClient>>,
}

impl ExchangeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, client: Arc<dyn ExchangeClient>) -> Self {
        self.clients.insert(client.exchange(), client);
        self
    }

    pub fn get(&self, exchange: Exchange) -> Option<Arc<dyn ExchangeClient>> {
        self.clients.get(&exchange).cloned()
    }
}

/// Parse a decimal that exchanges send as a JSON string.
pub(crate) fn parse_decimal(exchange: Exchange, field: &str, value: &str) -> Result<rust_decimal::Decimal, ExchangeError> {
    if value.trim().is_empty() {
        return Ok(rust_decimal::Decimal::ZERO);
    }
    value.trim().parse().map_err(|_| ExchangeError::Decode {
        exchange,
        detail: format!("{} is not a decimal: {}", field, value),
    })
}

pub(crate) fn parse_millis(exchange: Exchange, value: i64) -> Result<DateTime<Utc>, ExchangeError> {
    DateTime::<Utc>::from_timestamp_millis(value).ok_or_else(|| ExchangeError::Decode {
        exchange,
        detail: format!("timestamp out of range: {}", value),
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decimal() {
        assert_eq!(
            parse_decimal(Exchange::Binance, "price", "3.751").unwrap(),
            rust_decimal::Decimal::new(3751, 3)
        );
        assert_eq!(parse_decimal(Exchange::Binance, "fee", "").unwrap(), rust_decimal::Decimal::ZERO);
        assert!(parse_decimal(Exchange::Bybit, "price", "abc").is_err());
    }

    #[test]
    fn test_registry_lookup() {
        let registry = ExchangeRegistry::new()
            .register(Arc::new(fakes::FakeExchangeClient::new(Exchange::Bybit)));
        assert!(registry.get(Exchange::Bybit).is_some());
        assert!(registry.get(Exchange::Okx).is_none());
    }
}
