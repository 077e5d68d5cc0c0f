use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::repositories::NewP2pAd;
use shared::{Exchange, TradeSide};
use super::{parse_decimal, ExchangeError, MarketDataSource};

const SEARCH_PATH: &str = "/bapi/c2c/v2/friendly/c2c/adv/search";
const ROWS: u32 = 20;

/// Public Binance P2P ad board. No credentials needed.
pub struct BinanceP2pMarket {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchItem {
    adv: Adv,
    advertiser: Advertiser,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Adv {
    adv_no: String,
    trade_type: String,
    asset: String,
    fiat_unit: String,
    price: String,
    surplus_amount: String,
    min_single_trans_amount: String,
    max_single_trans_amount: String,
    #[serde(default)]
    trade_methods: Vec<TradeMethod>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TradeMethod {
    #[serde(default)]
    trade_method_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Advertiser {
    #[serde(default)]
    user_no: Option<String>,
    nick_name: String,
    #[serde(default)]
    month_order_count: i32,
    #[serde(default)]
    month_finish_rate: f64,
}

impl BinanceP2pMarket {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

pub(crate) fn to_ad(item: SearchItem, rank: i32) -> Result<NewP2pAd, ExchangeError> {
    let exchange = Exchange::Binance;
    let side = item.adv.trade_type.parse::<TradeSide>().map_err(|e| ExchangeError::Decode {
        exchange,
        detail: e.to_string(),
    })?;
    let finish_rate = Decimal::try_from(item.advertiser.month_finish_rate)
        .unwrap_or(Decimal::ZERO)
        .round_dp(4);

    Ok(NewP2pAd {
        exchange,
        adv_no: item.adv.adv_no,
        side,
        asset: item.adv.asset,
        fiat: item.adv.fiat_unit,
        price: parse_decimal(exchange, "price", &item.adv.price)?,
        surplus_amount: parse_decimal(exchange, "surplusAmount", &item.adv.surplus_amount)?,
        min_amount: parse_decimal(exchange, "minSingleTransAmount", &item.adv.min_single_trans_amount)?,
        max_amount: parse_decimal(exchange, "maxSingleTransAmount", &item.adv.max_single_trans_amount)?,
        advertiser_nickname: item.advertiser.nick_name,
        advertiser_merchant_no: item.advertiser.user_no,
        month_order_count: item.advertiser.month_order_count,
        month_finish_rate: finish_rate,
        payment_methods: item
            .adv
            .trade_methods
            .into_iter()
            .filter_map(|m| m.trade_method_name)
            .collect(),
        rank,
    })
}

#[async_trait]
impl MarketDataSource for BinanceP2pMarket {
    fn exchange(&self) -> Exchange {
        Exchange::Binance
    }

    async fn search_ads(&self, asset: &str, fiat: &str, side: TradeSide) -> Result<Vec<NewP2pAd>, ExchangeError> {
        // The board is keyed by the taker's side: BUY lists sellers' ads.
        let taker_side = side.opposite().as_str().to_uppercase();
        let body = serde_json::json!({
            "asset": asset,
            "fiat": fiat,
            "tradeType": taker_side,
            "page": 1,
            "rows": ROWS,
            "payTypes": [],
            "publisherType": null,
        });

        let response: SearchResponse = self
            .http
            .post(format!("{}{}", self.base_url, SEARCH_PATH))
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if response.code != "000000" {
            return Err(ExchangeError::Api {
                exchange: Exchange::Binance,
                code: response.code,
                message: response.message.unwrap_or_default(),
            });
        }

        response
            .data
            .into_iter()
            .enumerate()
            .map(|(i, item)| to_ad(item, i as i32 + 1))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_item_maps_to_ad() {
        let payload = serde_json::json!({
            "adv": {
                "advNo": "1155",
                "tradeType": "SELL",
                "asset": "USDT",
                "fiatUnit": "PEN",
                "price": "3.752",
                "surplusAmount": "812.5",
                "minSingleTransAmount": "50",
                "maxSingleTransAmount": "3000",
                "tradeMethods": [
                    {"tradeMethodName": "BCP"},
                    {"tradeMethodName": "Yape"},
                    {}
                ]
            },
            "advertiser": {
                "userNo": "s1a2b3",
                "nickName": "PeruCrypto",
                "monthOrderCount": 431,
                "monthFinishRate": 0.9871
            }
        });
        let item: SearchItem = serde_json::from_value(payload).unwrap();
        let ad = to_ad(item, 1).unwrap();

        assert_eq!(ad.side, TradeSide::Sell);
        assert_eq!(ad.price, Decimal::new(3752, 3));
        assert_eq!(ad.max_amount, Decimal::new(3000, 0));
        assert_eq!(ad.payment_methods, vec!["BCP", "Yape"]);
        assert_eq!(ad.month_finish_rate, Decimal::new(9871, 4));
        assert_eq!(ad.advertiser_merchant_no.as_deref(), Some("s1a2b3"));
        assert_eq!(ad.rank, 1);
    }
}
