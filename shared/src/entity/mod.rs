//! `SeaORM` entities, one module per table.

pub mod binance_credentials;
pub mod bot_actions_log;
pub mod bot_configurations;
pub mod bybit_credentials;
pub mod counter_parties;
pub mod market_data;
pub mod okx_credentials;
pub mod p2p_ads;
pub mod trade_history;
pub mod transactions;
pub mod users;
