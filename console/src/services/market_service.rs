use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use shared::entity::market_data;
use shared::repositories::{MarketRepository, NewMarketData, NewP2pAd};
use shared::TradeSide;
use std::sync::Arc;
use crate::exchanges::MarketDataSource;

const AVERAGE_DEPTH: usize = 5;

/// Reference prices derived from both sides of the board.
pub fn summarize(exchange: shared::Exchange, asset: &str, fiat: &str, buy_ads: &[NewP2pAd], sell_ads: &[NewP2pAd]) -> NewMarketData {
    let mut buy: Vec<Decimal> = buy_ads.iter().map(|a| a.price).collect();
    let mut sell: Vec<Decimal> = sell_ads.iter().map(|a| a.price).collect();
    buy.sort_by(|a, b| b.cmp(a));
    sell.sort();

    let best_buy = buy.first().copied();
    let best_sell = sell.first().copied();
    let spread = match (best_buy, best_sell) {
        (Some(buy), Some(sell)) => Some(sell - buy),
        _ => None,
    };

    NewMarketData {
        exchange,
        asset: asset.to_string(),
        fiat: fiat.to_string(),
        best_buy_price: best_buy,
        best_sell_price: best_sell,
        average_buy_price: average(&buy),
        average_sell_price: average(&sell),
        spread,
        ads_count: (buy_ads.len() + sell_ads.len()) as i32,
    }
}

fn average(sorted: &[Decimal]) -> Option<Decimal> {
    let top: Vec<Decimal> = sorted.iter().take(AVERAGE_DEPTH).copied().collect();
    if top.is_empty() {
        return None;
    }
    let sum: Decimal = top.iter().sum();
    Some((sum / Decimal::from(top.len())).round_dp(8))
}

pub struct MarketService {
    repo: MarketRepository,
    source: Arc<dyn MarketDataSource>,
}

impl MarketService {
    pub fn new(db: Arc<DatabaseConnection>, source: Arc<dyn MarketDataSource>) -> Self {
        Self {
            repo: MarketRepository::new(db),
            source,
        }
    }

    /// Fetch both sides of the board, store them as one snapshot and derive
    /// the reference prices.
    pub async fn sync(&self, asset: &str, fiat: &str, captured_at: DateTime<Utc>) -> Result<market_data::Model> {
        let buy_ads = self
            .source
            .search_ads(asset, fiat, TradeSide::Buy)
            .await
            .with_context(|| format!("Failed to fetch buy ads for {}/{}", asset, fiat))?;
        let sell_ads = self
            .source
            .search_ads(asset, fiat, TradeSide::Sell)
            .await
            .with_context(|| format!("Failed to fetch sell ads for {}/{}", asset, fiat))?;

        let mut all = buy_ads.clone();
        all.extend(sell_ads.iter().cloned());
        self.repo.store_snapshot(&all, captured_at).await?;

        let summary = summarize(self.source.exchange(), asset, fiat, &buy_ads, &sell_ads);
        let stored = self.repo.store_market_data(&summary, captured_at).await?;
        tracing::info!(
            asset,
            fiat,
            ads = stored.ads_count,
            best_buy = ?stored.best_buy_price,
            best_sell = ?stored.best_sell_price,
            "Market snapshot stored"
        );
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchanges::fakes::FakeMarket;
    use shared::testing::{at, setup_db};
    use shared::Exchange;

    fn ad(side: TradeSide, price: Decimal, rank: i32) -> NewP2pAd {
        NewP2pAd {
            exchange: Exchange::Binance,
            adv_no: format!("{}-{}", side, rank),
            side,
            asset: "USDT".to_string(),
            fiat: "PEN".to_string(),
            price,
            surplus_amount: Decimal::new(500, 0),
            min_amount: Decimal::new(10, 0),
            max_amount: Decimal::new(1000, 0),
            advertiser_nickname: format!("{}-trader-{}", side, rank),
            advertiser_merchant_no: None,
            month_order_count: 1,
            month_finish_rate: Decimal::ONE,
            payment_methods: vec![],
            rank,
        }
    }

    #[test]
    fn test_summary_prices() {
        let buys = vec![ad(TradeSide::Buy, Decimal::new(370, 2), 1), ad(TradeSide::Buy, Decimal::new(372, 2), 2)];
        let sells = vec![ad(TradeSide::Sell, Decimal::new(378, 2), 1), ad(TradeSide::Sell, Decimal::new(376, 2), 2)];
        let summary = summarize(Exchange::Binance, "USDT", "PEN", &buys, &sells);

        assert_eq!(summary.best_buy_price, Some(Decimal::new(372, 2)));
        assert_eq!(summary.best_sell_price, Some(Decimal::new(376, 2)));
        assert_eq!(summary.spread, Some(Decimal::new(4, 2)));
        assert_eq!(summary.average_buy_price, Some(Decimal::new(371, 2)));
        assert_eq!(summary.average_sell_price, Some(Decimal::new(377, 2)));
        assert_eq!(summary.ads_count, 4);
    }

    #[test]
    fn test_summary_with_one_empty_side() {
        let sells = vec![ad(TradeSide::Sell, Decimal::new(378, 2), 1)];
        let summary = summarize(Exchange::Binance, "USDT", "PEN", &[], &sells);
        assert_eq!(summary.best_buy_price, None);
        assert_eq!(summary.spread, None);
        assert_eq!(summary.average_buy_price, None);
    }

    #[test]
    fn test_average_uses_top_five() {
        let prices: Vec<Decimal> = (1..=7).map(|n| Decimal::new(n, 0)).collect();
        assert_eq!(average(&prices), Some(Decimal::new(3, 0)));
    }

    #[tokio::test]
    async fn test_sync_stores_snapshot_and_summary() {
        let db = Arc::new(setup_db().await);
        let mut market = FakeMarket::default();
        market.ads.insert(TradeSide::Buy, vec![ad(TradeSide::Buy, Decimal::new(370, 2), 1)]);
        market.ads.insert(
            TradeSide::Sell,
            vec![ad(TradeSide::Sell, Decimal::new(375, 2), 1), ad(TradeSide::Sell, Decimal::new(377, 2), 2)],
        );
        let service = MarketService::new(db.clone(), Arc::new(market));

        let stored = service.sync("USDT", "PEN", at(9, 9)).await.unwrap();
        assert_eq!(stored.ads_count, 3);
        assert_eq!(stored.spread, Some(Decimal::new(5, 2)));

        let sells = MarketRepository::new(db.clone())
            .latest_snapshot(Exchange::Binance, "USDT", "PEN", TradeSide::Sell)
            .await
            .unwrap();
        assert_eq!(sells.len(), 2);
    }
}
