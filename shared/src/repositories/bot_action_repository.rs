use anyhow::Result;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::prelude::*;
use sea_orm::{ActiveValue, PaginatorTrait, QueryOrder};
use serde_json::Value;
use std::sync::Arc;
use crate::entity::bot_actions_log;
use crate::models::{BotActionStatus, BotActionType};

#[derive(Debug, Clone)]
pub struct NewBotAction {
    pub bot_configuration_id: i64,
    pub user_id: i64,
    pub action_type: BotActionType,
    pub previous_price: Option<Decimal>,
    pub proposed_price: Option<Decimal>,
    pub reason: String,
    pub market_snapshot: Option<Value>,
    pub status: BotActionStatus,
}

/// Result of approving or rejecting a logged action.
#[derive(Debug, Clone, PartialEq)]
pub enum DecisionOutcome {
    Decided(bot_actions_log::Model),
    NotFound,
    NotPending(BotActionStatus),
}

pub struct BotActionRepository {
    db: Arc<DatabaseConnection>,
}

impl BotActionRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn record(&self, action: NewBotAction) -> Result<bot_actions_log::Model> {
        let now = Utc::now();
        let decided_at = match action.status {
            BotActionStatus::PendingApproval => None,
            _ => Some(now),
        };
        let model = bot_actions_log::ActiveModel {
            bot_configuration_id: ActiveValue::Set(action.bot_configuration_id),
            user_id: ActiveValue::Set(action.user_id),
            action_type: ActiveValue::Set(action.action_type.to_string()),
            previous_price: ActiveValue::Set(action.previous_price),
            proposed_price: ActiveValue::Set(action.proposed_price),
            reason: ActiveValue::Set(action.reason),
            market_snapshot: ActiveValue::Set(action.market_snapshot),
            status: ActiveValue::Set(action.status.to_string()),
            decided_at: ActiveValue::Set(decided_at),
            created_at: ActiveValue::Set(Some(now)),
            ..Default::default()
        };
        Ok(model.insert(self.db.as_ref()).await?)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<bot_actions_log::Model>> {
        let action = bot_actions_log::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;
        Ok(action)
    }

    pub async fn latest_for(&self, bot_configuration_id: i64) -> Result<Option<bot_actions_log::Model>> {
        let action = bot_actions_log::Entity::find()
            .filter(bot_actions_log::Column::BotConfigurationId.eq(bot_configuration_id))
            .order_by_desc(bot_actions_log::Column::Id)
            .one(self.db.as_ref())
            .await?;
        Ok(action)
    }

    /// Most recent price the bot has had approved for this configuration.
    pub async fn last_approved_price(&self, bot_configuration_id: i64) -> Result<Option<Decimal>> {
        let action = bot_actions_log::Entity::find()
            .filter(bot_actions_log::Column::BotConfigurationId.eq(bot_configuration_id))
            .filter(bot_actions_log::Column::Status.eq(BotActionStatus::Approved.as_str()))
            .filter(bot_actions_log::Column::ProposedPrice.is_not_null())
            .order_by_desc(bot_actions_log::Column::Id)
            .one(self.db.as_ref())
            .await?;
        Ok(action.and_then(|a| a.proposed_price))
    }

    pub async fn pending_count(&self, bot_configuration_id: i64) -> Result<u64> {
        let count = bot_actions_log::Entity::find()
            .filter(bot_actions_log::Column::BotConfigurationId.eq(bot_configuration_id))
            .filter(bot_actions_log::Column::Status.eq(BotActionStatus::PendingApproval.as_str()))
            .count(self.db.as_ref())
            .await?;
        Ok(count)
    }

    /// Approve or reject an action that is still waiting for a decision.
    pub async fn decide(&self, id: i64, approve: bool) -> Result<DecisionOutcome> {
        let action = match self.find_by_id(id).await? {
            Some(action) => action,
            None => return Ok(DecisionOutcome::NotFound),
        };
        let current: BotActionStatus = action.status.parse()?;
        if current != BotActionStatus::PendingApproval {
            return Ok(DecisionOutcome::NotPending(current));
        }

        let status = if approve {
            BotActionStatus::Approved
        } else {
            BotActionStatus::Rejected
        };
        let mut model: bot_actions_log::ActiveModel = action.into();
        model.status = ActiveValue::Set(status.to_string());
        model.decided_at = ActiveValue::Set(Some(Utc::now()));
        let updated = model.update(self.db.as_ref()).await?;
        Ok(DecisionOutcome::Decided(updated))
    }
}
