use anyhow::Result;
use chrono::Utc;
use sea_orm::prelude::*;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveValue, QueryOrder};
use std::sync::Arc;
use crate::entity::bot_configurations;

pub struct BotConfigurationRepository {
    db: Arc<DatabaseConnection>,
}

impl BotConfigurationRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<bot_configurations::Model>> {
        let config = bot_configurations::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;
        Ok(config)
    }

    pub async fn list(&self, user_id: Option<i64>) -> Result<Vec<bot_configurations::Model>> {
        let mut query = bot_configurations::Entity::find();
        if let Some(user_id) = user_id {
            query = query.filter(bot_configurations::Column::UserId.eq(user_id));
        }
        let configs = query
            .order_by_asc(bot_configurations::Column::Id)
            .all(self.db.as_ref())
            .await?;
        Ok(configs)
    }

    pub async fn list_active(&self) -> Result<Vec<bot_configurations::Model>> {
        let configs = bot_configurations::Entity::find_active()
            .order_by_asc(bot_configurations::Column::Id)
            .all(self.db.as_ref())
            .await?;
        Ok(configs)
    }

    /// Flip the active flag of one configuration. Returns `None` when the id
    /// does not exist.
    pub async fn set_active(&self, id: i64, active: bool) -> Result<Option<bot_configurations::Model>> {
        let config = match self.find_by_id(id).await? {
            Some(config) => config,
            None => return Ok(None),
        };

        let mut model: bot_configurations::ActiveModel = config.into();
        model.is_active = ActiveValue::Set(active);
        model.updated_at = ActiveValue::Set(Some(Utc::now()));
        let updated = model.update(self.db.as_ref()).await?;
        Ok(Some(updated))
    }

    /// Deactivate every active configuration, returning how many changed.
    pub async fn deactivate_all(&self) -> Result<u64> {
        let result = bot_configurations::Entity::update_many()
            .col_expr(bot_configurations::Column::IsActive, Expr::value(false))
            .col_expr(bot_configurations::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(bot_configurations::Column::IsActive.eq(true))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected)
    }
}
