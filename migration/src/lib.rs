pub use sea_orm_migration::prelude::*;

mod m20250101_000001_create_users;
mod m20250101_000002_create_counter_parties;
mod m20250101_000003_create_transactions;
mod m20250102_000001_create_bot_tables;
mod m20250103_000001_create_market_tables;
mod m20250104_000001_create_trade_history;
mod m20250105_000001_create_exchange_credentials;

pub struct Migrator;

/// DECIMAL(precision, scale) on MySQL. SQLite gets REAL so integral amounts are
/// not coerced to INTEGER storage.
pub(crate) fn decimal_column<T>(manager: &SchemaManager, name: T, precision: u32, scale: u32) -> ColumnDef
where
    T: IntoIden,
{
    let mut def = ColumnDef::new(name);
    match manager.get_database_backend() {
        sea_orm_migration::sea_orm::DbBackend::Sqlite => def.double(),
        _ => def.decimal_len(precision, scale),
    };
    def
}

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_users::Migration),
            Box::new(m20250101_000002_create_counter_parties::Migration),
            Box::new(m20250101_000003_create_transactions::Migration),
            Box::new(m20250102_000001_create_bot_tables::Migration),
            Box::new(m20250103_000001_create_market_tables::Migration),
            Box::new(m20250104_000001_create_trade_history::Migration),
            Box::new(m20250105_000001_create_exchange_credentials::Migration),
        ]
    }
}
