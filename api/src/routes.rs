use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared::entity::{bot_configurations, counter_parties, trade_history, transactions};
use shared::repositories::{
    BotActionRepository, BotConfigurationRepository, CounterPartyRepository, TradeHistoryRepository,
    TransactionFilter, TransactionRepository, UserRepository,
};
use shared::{Exchange, TransactionType};
use std::collections::BTreeMap;
use std::sync::Arc;
use crate::error::ApiError;

const DEFAULT_LIMIT: u64 = 100;
const MAX_LIMIT: u64 = 1000;

#[derive(Clone)]
pub struct ApiState {
    pub db: Arc<DatabaseConnection>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/transactions", get(list_transactions))
        .route("/api/dashboard", get(dashboard))
        .route("/api/bot-configurations", get(list_bot_configurations))
        .route("/api/bot-configurations/:id/activate", post(activate_bot_configuration))
        .route("/api/bot-configurations/:id/deactivate", post(deactivate_bot_configuration))
        .route("/api/counter-parties", get(list_counter_parties))
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
pub struct TransactionQuery {
    pub user_id: Option<i64>,
    pub exchange: Option<String>,
    #[serde(rename = "type")]
    pub transaction_type: Option<String>,
    #[serde(default)]
    pub p2p: bool,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct TransactionView {
    pub id: i64,
    pub user_id: i64,
    pub exchange: String,
    pub order_number: String,
    pub transaction_type: String,
    pub asset: String,
    pub fiat: Option<String>,
    pub price: Decimal,
    pub quantity: Decimal,
    pub total_price: Decimal,
    pub fee: Decimal,
    pub status: String,
    pub payment_method: Option<String>,
    pub counterparty_nickname: Option<String>,
    pub counterparty_full_name: Option<String>,
    pub counter_party_id: Option<i64>,
    pub enrichment_status: String,
    pub transaction_date: DateTime<Utc>,
}

impl From<transactions::Model> for TransactionView {
    fn from(m: transactions::Model) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            exchange: m.exchange,
            order_number: m.order_number,
            transaction_type: m.transaction_type,
            asset: m.asset,
            fiat: m.fiat,
            price: m.price,
            quantity: m.quantity,
            total_price: m.total_price,
            fee: m.fee,
            status: m.status,
            payment_method: m.payment_method,
            counterparty_nickname: m.counterparty_nickname,
            counterparty_full_name: m.counterparty_full_name,
            counter_party_id: m.counter_party_id,
            enrichment_status: m.enrichment_status,
            transaction_date: m.transaction_date,
        }
    }
}

async fn list_transactions(
    State(state): State<ApiState>,
    Query(query): Query<TransactionQuery>,
) -> Result<Json<Vec<TransactionView>>, ApiError> {
    let filter = TransactionFilter {
        user_id: query.user_id,
        exchange: query.exchange.as_deref().map(str::parse::<Exchange>).transpose()?,
        transaction_type: query
            .transaction_type
            .as_deref()
            .map(str::parse::<TransactionType>)
            .transpose()?,
        p2p_only: query.p2p,
        limit: Some(query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)),
        ..Default::default()
    };
    let rows = TransactionRepository::new(state.db.clone()).list(&filter).await?;
    Ok(Json(rows.into_iter().map(TransactionView::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: i64,
}

#[derive(Debug, Serialize)]
pub struct TradeView {
    pub order_number: String,
    pub exchange: String,
    pub trade_type: String,
    pub asset: String,
    pub fiat: String,
    pub price: Decimal,
    pub quantity: Decimal,
    pub total_price: Decimal,
    pub completed_at: DateTime<Utc>,
}

impl From<trade_history::Model> for TradeView {
    fn from(m: trade_history::Model) -> Self {
        Self {
            order_number: m.order_number,
            exchange: m.exchange,
            trade_type: m.trade_type,
            asset: m.asset,
            fiat: m.fiat,
            price: m.price,
            quantity: m.quantity,
            total_price: m.total_price,
            completed_at: m.completed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub user_id: i64,
    pub total_transactions: u64,
    /// Sum of `total_price` per transaction type.
    pub volume: BTreeMap<String, Decimal>,
    /// Counts over all users.
    pub enrichment: BTreeMap<String, u64>,
    pub active_bots: usize,
    pub recent_trades: Vec<TradeView>,
}

async fn dashboard(
    State(state): State<ApiState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Dashboard>, ApiError> {
    let user = UserRepository::new(state.db.clone())
        .find_by_id(query.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {} not found", query.user_id)))?;

    let transactions = TransactionRepository::new(state.db.clone());
    let mut volume = BTreeMap::new();
    for transaction_type in TransactionType::ALL {
        let total = transactions.volume(user.id, *transaction_type).await?;
        volume.insert(transaction_type.to_string(), total);
    }
    let enrichment = transactions
        .count_by_enrichment_status()
        .await?
        .into_iter()
        .map(|(status, count)| (status.to_string(), count))
        .collect();

    let active_bots = BotConfigurationRepository::new(state.db.clone())
        .list(Some(user.id))
        .await?
        .iter()
        .filter(|c| c.is_active)
        .count();
    let recent_trades = TradeHistoryRepository::new(state.db.clone())
        .recent_for_user(user.id, 10)
        .await?
        .into_iter()
        .map(TradeView::from)
        .collect();

    Ok(Json(Dashboard {
        user_id: user.id,
        total_transactions: transactions.count_for_user(user.id).await?,
        volume,
        enrichment,
        active_bots,
        recent_trades,
    }))
}

#[derive(Debug, Serialize)]
pub struct BotConfigurationView {
    pub id: i64,
    pub name: String,
    pub exchange: String,
    pub pair: String,
    pub side: String,
    pub profile: String,
    pub min_price: Decimal,
    pub max_price: Decimal,
    pub price_step: Decimal,
    pub is_active: bool,
    pub requires_approval: bool,
    pub pending_approvals: u64,
}

impl BotConfigurationView {
    fn new(m: bot_configurations::Model, pending_approvals: u64) -> Self {
        Self {
            id: m.id,
            pair: m.pair(),
            name: m.name,
            exchange: m.exchange,
            side: m.trade_type,
            profile: m.profile,
            min_price: m.min_price,
            max_price: m.max_price,
            price_step: m.price_step,
            is_active: m.is_active,
            requires_approval: m.requires_approval,
            pending_approvals,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OptionalUserQuery {
    pub user_id: Option<i64>,
}

async fn list_bot_configurations(
    State(state): State<ApiState>,
    Query(query): Query<OptionalUserQuery>,
) -> Result<Json<Vec<BotConfigurationView>>, ApiError> {
    let configs = BotConfigurationRepository::new(state.db.clone()).list(query.user_id).await?;
    let actions = BotActionRepository::new(state.db.clone());
    let mut views = Vec::with_capacity(configs.len());
    for config in configs {
        let pending = actions.pending_count(config.id).await?;
        views.push(BotConfigurationView::new(config, pending));
    }
    Ok(Json(views))
}

async fn set_bot_active(state: &ApiState, id: i64, active: bool) -> Result<Json<BotConfigurationView>, ApiError> {
    let config = BotConfigurationRepository::new(state.db.clone())
        .set_active(id, active)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Bot configuration {} not found", id)))?;
    tracing::info!(config_id = id, active, "Bot configuration toggled via API");
    let pending = BotActionRepository::new(state.db.clone()).pending_count(id).await?;
    Ok(Json(BotConfigurationView::new(config, pending)))
}

async fn activate_bot_configuration(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<BotConfigurationView>, ApiError> {
    set_bot_active(&state, id, true).await
}

async fn deactivate_bot_configuration(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<BotConfigurationView>, ApiError> {
    set_bot_active(&state, id, false).await
}

#[derive(Debug, Serialize)]
pub struct CounterPartyView {
    pub id: i64,
    pub exchange: String,
    pub nickname: String,
    pub merchant_no: Option<String>,
    pub full_name: Option<String>,
    pub dni: Option<String>,
    pub transactions: u64,
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl CounterPartyView {
    fn new(m: counter_parties::Model, transactions: u64) -> Self {
        Self {
            id: m.id,
            exchange: m.exchange,
            nickname: m.nickname,
            merchant_no: m.merchant_no,
            full_name: m.full_name,
            dni: m.dni,
            transactions,
            last_seen_at: m.last_seen_at,
        }
    }
}

async fn list_counter_parties(
    State(state): State<ApiState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<CounterPartyView>>, ApiError> {
    let repo = CounterPartyRepository::new(state.db.clone());
    let parties = repo.list_for_user(query.user_id).await?;
    let mut views = Vec::with_capacity(parties.len());
    for party in parties {
        let count = repo.transaction_count(party.id).await?;
        views.push(CounterPartyView::new(party, count));
    }
    Ok(Json(views))
}
