use anyhow::Result;
use migration::{Migrator, MigratorTrait};
use sea_orm::DatabaseConnection;
use super::{info, SUCCESS};

pub async fn handle_migrate(db: &DatabaseConnection, fresh: bool) -> Result<i32> {
    if fresh {
        tracing::warn!("Dropping all tables before migrating");
        Migrator::fresh(db).await?;
        info("Database rebuilt from scratch");
    } else {
        let pending = Migrator::get_pending_migrations(db).await?.len();
        Migrator::up(db, None).await?;
        info(format!("Applied {} migration(s)", pending));
    }
    Ok(SUCCESS)
}
