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

const ORDER_LIST_PATH: &str = "/v5/p2p/order/simplifyList";
const PAGE_SIZE: usize = 30;
const RECV_WINDOW: &str = "5000";

/// Signed client for Bybit P2P orders.
pub struct BybitClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct OrderListResponse {
    ret_code: i64,
    #[serde(default)]
    ret_msg: String,
    #[serde(default)]
    result: Option<OrderListResult>,
}

#[derive(Debug, Deserialize)]
struct OrderListResult {
    #[serde(default)]
    items: Vec<BybitOrder>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BybitOrder {
    id: String,
    side: i32, // 0 buy, 1 sell
    token_id: String,
    currency_id: String,
    price: String,
    quantity: String,
    amount: String,
    #[serde(default)]
    fee: Option<String>,
    status: i32,
    create_date: String,
    #[serde(default)]
    target_nick_name: Option<String>,
    #[serde(default)]
    target_user_id: Option<String>,
}

/// Bybit P2P order status codes.
fn status_label(code: i32) -> &'static str {
    match code {
        50 => "completed",
        40 => "cancelled",
        10 | 20 => "pending",
        30 | 60 | 70 | 80 | 90 | 100 | 110 => "appeal",
        _ => "unknown",
    }
}

impl BybitClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// HMAC-SHA256 of timestamp + api key + recv window + body.
    fn sign(secret: &str, timestamp: &str, api_key: &str, body: &str) -> Result<String, ExchangeError> {
        let message = format!("{}{}{}{}", timestamp, api_key, RECV_WINDOW, body);
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| ExchangeError::Signing(e.to_string()))?;
        mac.update(message.as_bytes());
        Ok(encode(mac.finalize().into_bytes()))
    }

    async fn fetch_page(
        &self,
        credential: &ExchangeCredential,
        window: &SyncWindow,
        page: u32,
    ) -> Result<Vec<BybitOrder>, ExchangeError> {
        let body = serde_json::json!({
            "page": page,
            "size": PAGE_SIZE,
            "beginTime": window.start.timestamp_millis().to_string(),
            "endTime": window.end.timestamp_millis().to_string(),
        })
        .to_string();
        let timestamp = Utc::now().timestamp_millis().to_string();
        let signature = Self::sign(&credential.api_secret, &timestamp, &credential.api_key, &body)?;

        let response: OrderListResponse = self
            .http
            .post(format!("{}{}", self.base_url, ORDER_LIST_PATH))
            .header("X-BAPI-SIGN", signature)
            .header("X-BAPI-API-KEY", &credential.api_key)
            .header("X-BAPI-TIMESTAMP", &timestamp)
            .header("X-BAPI-RECV-WINDOW", RECV_WINDOW)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?
            .json()
            .await?;

        if response.ret_code != 0 {
            return Err(ExchangeError::Api {
                exchange: Exchange::Bybit,
                code: response.ret_code.to_string(),
                message: response.ret_msg,
            });
        }
        Ok(response.result.map(|r| r.items).unwrap_or_default())
    }
}

pub(crate) fn to_transaction(user_id: i64, order: BybitOrder) -> Result<NewTransaction, ExchangeError> {
    let exchange = Exchange::Bybit;
    let transaction_type = match order.side {
        0 => TransactionType::P2pBuy,
        1 => TransactionType::P2pSell,
        other => {
            return Err(ExchangeError::Decode {
                exchange,
                detail: format!("unknown side {}", other),
            })
        }
    };
    let created_ms: i64 = order.create_date.parse().map_err(|_| ExchangeError::Decode {
        exchange,
        detail: format!("createDate is not a timestamp: {}", order.create_date),
    })?;
    let raw_data = serde_json::json!({
        "id": order.id,
        "side": order.side,
        "status": order.status,
        "createDate": order.create_date,
    });

    Ok(NewTransaction {
        user_id,
        exchange,
        order_number: order.id,
        transaction_type,
        asset: order.token_id,
        fiat: Some(order.currency_id),
        price: parse_decimal(exchange, "price", &order.price)?,
        quantity: parse_decimal(exchange, "quantity", &order.quantity)?,
        total_price: parse_decimal(exchange, "amount", &order.amount)?,
        fee: parse_decimal(exchange, "fee", order.fee.as_deref().unwrap_or(""))?,
        fee_asset: None,
        status: status_label(order.status).to_string(),
        payment_method: None,
        counterparty_nickname: order.target_nick_name.filter(|n| !n.trim().is_empty()),
        counterparty_merchant_no: order.target_user_id.filter(|n| !n.trim().is_empty()),
        counterparty_full_name: None,
        counterparty_dni: None,
        raw_data: Some(raw_data),
        transaction_date: parse_millis(exchange, created_ms)?,
    })
}

#[async_trait]
impl ExchangeClient for BybitClient {
    fn exchange(&self) -> Exchange {
        Exchange::Bybit
    }

    async fn fetch_p2p_history(
        &self,
        credential: &ExchangeCredential,
        window: &SyncWindow,
    ) -> Result<Vec<NewTransaction>, ExchangeError> {
        let mut transactions = Vec::new();
        let mut page = 1;
        loop {
            let orders = self.fetch_page(credential, window, page).await?;
            let count = orders.len();
            tracing::debug!(user_id = credential.user_id, page, count, "Fetched Bybit P2P order page");
            for order in orders {
                transactions.push(to_transaction(credential.user_id, order)?);
            }
            if count < PAGE_SIZE {
                break;
            }
            page += 1;
        }
        Ok(transactions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_signature_covers_timestamp_key_and_body() {
        assert_eq!(
            BybitClient::sign("secret", "1700000000000", "key", r#"{"page":1}"#).unwrap(),
            "edb77e70b78e92decac83f211234973cd6706a9889fd8f75ca63938038449a57"
        );
    }

    #[test]
    fn test_order_maps_to_transaction() {
        let payload = serde_json::json!({
            "id": "1899",
            "side": 0,
            "tokenId": "USDT",
            "currencyId": "PEN",
            "price": "3.74",
            "quantity": "50",
            "amount": "187",
            "fee": "0",
            "status": 50,
            "createDate": "1740830400000",
            "targetNickName": "carol",
            "targetUserId": "998877"
        });
        let order: BybitOrder = serde_json::from_value(payload).unwrap();
        let tx = to_transaction(3, order).unwrap();

        assert_eq!(tx.order_number, "1899");
        assert_eq!(tx.transaction_type, TransactionType::P2pBuy);
        assert_eq!(tx.total_price, Decimal::new(187, 0));
        assert_eq!(tx.status, "completed");
        assert_eq!(tx.counterparty_merchant_no.as_deref(), Some("998877"));
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(status_label(50), "completed");
        assert_eq!(status_label(40), "cancelled");
        assert_eq!(status_label(10), "pending");
        assert_eq!(status_label(7), "unknown");
    }
}
