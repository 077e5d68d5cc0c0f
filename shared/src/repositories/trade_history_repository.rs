use anyhow::Result;
use chrono::Utc;
use sea_orm::prelude::*;
use sea_orm::{ActiveValue, QueryOrder, QuerySelect, TryIntoModel};
use std::sync::Arc;
use crate::entity::{trade_history, transactions};

pub struct TradeHistoryRepository {
    db: Arc<DatabaseConnection>,
}

impl TradeHistoryRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Mirror a completed P2P transaction into `trade_history`. Returns
    /// `None` for anything that is not a completed P2P order.
    pub async fn upsert_from_transaction(&self, tx: &transactions::Model) -> Result<Option<trade_history::Model>> {
        let side = match tx.transaction_type().ok().filter(|t| t.is_p2p()).and_then(|t| t.side()) {
            Some(side) => side,
            None => return Ok(None),
        };
        if !tx.status.eq_ignore_ascii_case("completed") {
            return Ok(None);
        }

        let existing = trade_history::Entity::find()
            .filter(trade_history::Column::OrderNumber.eq(tx.order_number.as_str()))
            .one(self.db.as_ref())
            .await?;

        let mut model = match existing {
            Some(row) => row.into(),
            None => trade_history::ActiveModel {
                user_id: ActiveValue::Set(tx.user_id),
                order_number: ActiveValue::Set(tx.order_number.clone()),
                created_at: ActiveValue::Set(Some(Utc::now())),
                ..Default::default()
            },
        };
        model.transaction_id = ActiveValue::Set(Some(tx.id));
        model.exchange = ActiveValue::Set(tx.exchange.clone());
        model.trade_type = ActiveValue::Set(side.to_string());
        model.asset = ActiveValue::Set(tx.asset.clone());
        model.fiat = ActiveValue::Set(tx.fiat.clone().unwrap_or_default());
        model.price = ActiveValue::Set(tx.price);
        model.quantity = ActiveValue::Set(tx.quantity);
        model.total_price = ActiveValue::Set(tx.total_price);
        model.fee = ActiveValue::Set(tx.fee);
        model.counter_party_id = ActiveValue::Set(tx.counter_party_id);
        model.completed_at = ActiveValue::Set(tx.transaction_date);

        let saved = model.save(self.db.as_ref()).await?.try_into_model()?;
        Ok(Some(saved))
    }

    pub async fn recent_for_user(&self, user_id: i64, limit: u64) -> Result<Vec<trade_history::Model>> {
        let trades = trade_history::Entity::find()
            .filter(trade_history::Column::UserId.eq(user_id))
            .order_by_desc(trade_history::Column::CompletedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await?;
        Ok(trades)
    }
}
