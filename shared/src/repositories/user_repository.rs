use anyhow::Result;
use sea_orm::prelude::*;
use std::sync::Arc;
use crate::entity::users;

pub struct UserRepository {
    db: Arc<DatabaseConnection>,
}

impl UserRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, user_id: i64) -> Result<Option<users::Model>> {
        let user = users::Entity::find_by_id(user_id)
            .one(self.db.as_ref())
            .await?;
        Ok(user)
    }
}
