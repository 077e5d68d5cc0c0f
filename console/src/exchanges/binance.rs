use async_trait::async_trait;
use chrono::Utc;
use hex::encode;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use shared::repositories::{ExchangeCredential, NewTransaction};
use shared::{Exchange, TransactionType};
use super::{parse_decimal, parse_millis, ExchangeClient, ExchangeError, SyncWindow};

type HmacSha256 = Hmac<Sha256>;

const HISTORY_PATH: &str = "/sapi/v1/c2c/orderMatch/listUserOrderHistory";
const PAGE_SIZE: usize = 100;
const RECV_WINDOW: u64 = 5000;

/// Signed client for the Binance C2C order history.
pub struct BinanceClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Vec<BinanceOrder>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BinanceOrder {
    order_number: String,
    trade_type: String,
    asset: String,
    fiat: String,
    amount: String,
    total_price: String,
    unit_price: String,
    order_status: String,
    create_time: i64,
    #[serde(default)]
    commission: Option<String>,
    #[serde(default)]
    counter_part_nick_name: Option<String>,
    #[serde(default)]
    pay_method_name: Option<String>,
}

impl BinanceClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// HMAC-SHA256 of the query string, hex encoded.
    fn sign(secret: &str, query: &str) -> Result<String, ExchangeError> {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| ExchangeError::Signing(e.to_string()))?;
        mac.update(query.as_bytes());
        Ok(encode(mac.finalize().into_bytes()))
    }

    async fn fetch_page(
        &self,
        credential: &ExchangeCredential,
        trade_type: &str,
        window: &SyncWindow,
        page: u32,
    ) -> Result<Vec<BinanceOrder>, ExchangeError> {
        let query = format!(
            "tradeType={}&startTimestamp={}&endTimestamp={}&page={}&rows={}&recvWindow={}&timestamp={}",
            trade_type,
            window.start.timestamp_millis(),
            window.end.timestamp_millis(),
            page,
            PAGE_SIZE,
            RECV_WINDOW,
            Utc::now().timestamp_millis()
        );
        let signature = Self::sign(&credential.api_secret, &query)?;
        let url = format!("{}{}?{}&signature={}", self.base_url, HISTORY_PATH, query, signature);

        let response: HistoryResponse = self
            .http
            .get(url)
            .header("X-MBX-APIKEY", &credential.api_key)
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
        Ok(response.data)
    }
}

pub(crate) fn to_transaction(user_id: i64, order: BinanceOrder) -> Result<NewTransaction, ExchangeError> {
    let exchange = Exchange::Binance;
    let transaction_type = match order.trade_type.to_uppercase().as_str() {
        "BUY" => TransactionType::P2pBuy,
        "SELL" => TransactionType::P2pSell,
        other => {
            return Err(ExchangeError::Decode {
                exchange,
                detail: format!("unknown tradeType {}", other),
            })
        }
    };
    let raw_data = serde_json::json!({
        "orderNumber": order.order_number,
        "tradeType": order.trade_type,
        "orderStatus": order.order_status,
        "createTime": order.create_time,
    });

    Ok(NewTransaction {
        user_id,
        exchange,
        order_number: order.order_number,
        transaction_type,
        asset: order.asset,
        fiat: Some(order.fiat),
        price: parse_decimal(exchange, "unitPrice", &order.unit_price)?,
        quantity: parse_decimal(exchange, "amount", &order.amount)?,
        total_price: parse_decimal(exchange, "totalPrice", &order.total_price)?,
        fee: parse_decimal(exchange, "commission", order.commission.as_deref().unwrap_or(""))?,
        fee_asset: None,
        status: order.order_status.to_lowercase(),
        payment_method: order.pay_method_name,
        counterparty_nickname: order.counter_part_nick_name.filter(|n| !n.trim().is_empty()),
        counterparty_merchant_no: None,
        counterparty_full_name: None,
        counterparty_dni: None,
        raw_data: Some(raw_data),
        transaction_date: parse_millis(exchange, order.create_time)?,
    })
}

#[async_trait]
impl ExchangeClient for BinanceClient {
    fn exchange(&self) -> Exchange {
        Exchange::Binance
    }

    async fn fetch_p2p_history(
        &self,
        credential: &ExchangeCredential,
        window: &SyncWindow,
    ) -> Result<Vec<NewTransaction>, ExchangeError> {
        let mut transactions = Vec::new();
        for trade_type in ["BUY", "SELL"] {
            let mut page = 1;
            loop {
                let orders = self.fetch_page(credential, trade_type, window, page).await?;
                let count = orders.len();
                tracing::debug!(
                    user_id = credential.user_id,
                    trade_type,
                    page,
                    count,
                    "Fetched Binance P2P history page"
                );
                for order in orders {
                    transactions.push(to_transaction(credential.user_id, order)?);
                }
                if count < PAGE_SIZE {
                    break;
                }
                page += 1;
            }
        }
        Ok(transactions)
    }
}
