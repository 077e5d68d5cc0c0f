use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::prelude::*;
use sea_orm::{ActiveValue, QueryOrder, QuerySelect};
use serde_json::Value;
use std::sync::Arc;
use crate::entity::{market_data, p2p_ads};
use crate::models::{Exchange, TradeSide};

/// One competitor advertisement as seen on the marketplace.
#[derive(Debug, Clone, PartialEq)]
pub struct NewP2pAd {
    pub exchange: Exchange,
    pub adv_no: String,
    pub side: TradeSide,
    pub asset: String,
    pub fiat: String,
    pub price: Decimal,
    pub surplus_amount: Decimal,
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    pub advertiser_nickname: String,
    pub advertiser_merchant_no: Option<String>,
    pub month_order_count: i32,
    pub month_finish_rate: Decimal,
    pub payment_methods: Vec<String>,
    pub rank: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMarketData {
    pub exchange: Exchange,
    pub asset: String,
    pub fiat: String,
    pub best_buy_price: Option<Decimal>,
    pub best_sell_price: Option<Decimal>,
    pub average_buy_price: Option<Decimal>,
    pub average_sell_price: Option<Decimal>,
    pub spread: Option<Decimal>,
    pub ads_count: i32,
}

pub struct MarketRepository {
    db: Arc<DatabaseConnection>,
}

impl MarketRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Persist a batch of ads under one `captured_at`. Returns rows written.
    pub async fn store_snapshot(&self, ads: &[NewP2pAd], captured_at: DateTime<Utc>) -> Result<usize> {
        if ads.is_empty() {
            return Ok(0);
        }
        let rows = ads.iter().map(|ad| p2p_ads::ActiveModel {
            exchange: ActiveValue::Set(ad.exchange.to_string()),
            adv_no: ActiveValue::Set(ad.adv_no.clone()),
            trade_type: ActiveValue::Set(ad.side.to_string()),
            asset: ActiveValue::Set(ad.asset.clone()),
            fiat: ActiveValue::Set(ad.fiat.clone()),
            price: ActiveValue::Set(ad.price),
            surplus_amount: ActiveValue::Set(ad.surplus_amount),
            min_amount: ActiveValue::Set(ad.min_amount),
            max_amount: ActiveValue::Set(ad.max_amount),
            advertiser_nickname: ActiveValue::Set(ad.advertiser_nickname.clone()),
            advertiser_merchant_no: ActiveValue::Set(ad.advertiser_merchant_no.clone()),
            month_order_count: ActiveValue::Set(ad.month_order_count),
            month_finish_rate: ActiveValue::Set(ad.month_finish_rate),
            payment_methods: ActiveValue::Set(Some(Value::from(ad.payment_methods.clone()))),
            rank: ActiveValue::Set(ad.rank),
            captured_at: ActiveValue::Set(captured_at),
            ..Default::default()
        });
        p2p_ads::Entity::insert_many(rows)
            .exec(self.db.as_ref())
            .await?;
        Ok(ads.len())
    }

    /// Ads of the newest snapshot for a pair and advertiser side, in listing
    /// order.
    pub async fn latest_snapshot(
        &self,
        exchange: Exchange,
        asset: &str,
        fiat: &str,
        side: TradeSide,
    ) -> Result<Vec<p2p_ads::Model>> {
        let scope = p2p_ads::Entity::find()
            .filter(p2p_ads::Column::Exchange.eq(exchange.as_str()))
            .filter(p2p_ads::Column::Asset.eq(asset))
            .filter(p2p_ads::Column::Fiat.eq(fiat))
            .filter(p2p_ads::Column::TradeType.eq(side.as_str()));

        let newest = scope
            .clone()
            .order_by_desc(p2p_ads::Column::CapturedAt)
            .limit(1)
            .one(self.db.as_ref())
            .await?;
        let captured_at = match newest {
            Some(ad) => ad.captured_at,
            None => return Ok(Vec::new()),
        };

        let ads = scope
            .filter(p2p_ads::Column::CapturedAt.eq(captured_at))
            .order_by_asc(p2p_ads::Column::Rank)
            .all(self.db.as_ref())
            .await?;
        Ok(ads)
    }

    pub async fn store_market_data(&self, data: &NewMarketData, captured_at: DateTime<Utc>) -> Result<market_data::Model> {
        let model = market_data::ActiveModel {
            exchange: ActiveValue::Set(data.exchange.to_string()),
            asset: ActiveValue::Set(data.asset.clone()),
            fiat: ActiveValue::Set(data.fiat.clone()),
            best_buy_price: ActiveValue::Set(data.best_buy_price),
            best_sell_price: ActiveValue::Set(data.best_sell_price),
            average_buy_price: ActiveValue::Set(data.average_buy_price),
            average_sell_price: ActiveValue::Set(data.average_sell_price),
            spread: ActiveValue::Set(data.spread),
            ads_count: ActiveValue::Set(data.ads_count),
            captured_at: ActiveValue::Set(captured_at),
            ..Default::default()
        };
        Ok(model.insert(self.db.as_ref()).await?)
    }

    pub async fn latest_market_data(
        &self,
        exchange: Exchange,
        asset: &str,
        fiat: &str,
    ) -> Result<Option<market_data::Model>> {
        let data = market_data::Entity::find()
            .filter(market_data::Column::Exchange.eq(exchange.as_str()))
            .filter(market_data::Column::Asset.eq(asset))
            .filter(market_data::Column::Fiat.eq(fiat))
            .order_by_desc(market_data::Column::CapturedAt)
            .one(self.db.as_ref())
            .await?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{at, setup_db};

    fn ad(adv_no: &str, side: TradeSide, price: Decimal, rank: i32) -> NewP2pAd {
        NewP2pAd {
            exchange: Exchange::Binance,
            adv_no: adv_no.to_string(),
            side,
            asset: "USDT".to_string(),
            fiat: "PEN".to_string(),
            price,
            surplus_amount: Decimal::new(1000, 0),
            min_amount: Decimal::new(50, 0),
            max_amount: Decimal::new(2000, 0),
            advertiser_nickname: format!("trader-{}", adv_no),
            advertiser_merchant_no: None,
            month_order_count: 120,
            month_finish_rate: Decimal::new(98, 2),
            payment_methods: vec!["BCP".to_string(), "Yape".to_string()],
            rank,
        }
    }

    #[tokio::test]
    async fn test_latest_snapshot_returns_newest_batch_in_rank_order() {
        let db = setup_db().await;
        let repo = MarketRepository::new(Arc::new(db));

        repo.store_snapshot(&[ad("old", TradeSide::Sell, Decimal::new(380, 2), 1)], at(1, 10))
            .await
            .unwrap();
        let written = repo
            .store_snapshot(
                &[
                    ad("second", TradeSide::Sell, Decimal::new(376, 2), 2),
                    ad("first", TradeSide::Sell, Decimal::new(375, 2), 1),
                    ad("buyer", TradeSide::Buy, Decimal::new(370, 2), 1),
                ],
                at(1, 11),
            )
            .await
            .unwrap();
        assert_eq!(written, 3);

        let sells = repo
            .latest_snapshot(Exchange::Binance, "USDT", "PEN", TradeSide::Sell)
            .await
            .unwrap();
        let adv_nos: Vec<&str> = sells.iter().map(|a| a.adv_no.as_str()).collect();
        assert_eq!(adv_nos, vec!["first", "second"]);
        assert_eq!(sells[0].payment_methods, Some(serde_json::json!(["BCP", "Yape"])));

        let none = repo
            .latest_snapshot(Exchange::Binance, "BTC", "PEN", TradeSide::Sell)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_latest_market_data() {
        let db = setup_db().await;
        let repo = MarketRepository::new(Arc::new(db));
        let mut data = NewMarketData {
            exchange: Exchange::Binance,
            asset: "USDT".to_string(),
            fiat: "PEN".to_string(),
            best_buy_price: Some(Decimal::new(370, 2)),
            best_sell_price: Some(Decimal::new(375, 2)),
            average_buy_price: None,
            average_sell_price: None,
            spread: Some(Decimal::new(5, 2)),
            ads_count: 2,
        };
        repo.store_market_data(&data, at(2, 8)).await.unwrap();
        data.ads_count = 7;
        repo.store_market_data(&data, at(2, 9)).await.unwrap();

        let latest = repo
            .latest_market_data(Exchange::Binance, "USDT", "PEN")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.ads_count, 7);
        assert_eq!(latest.spread, Some(Decimal::new(5, 2)));
    }
}
