pub mod bot_action_repository;
pub mod bot_configuration_repository;
pub mod counter_party_repository;
pub mod credential_repository;
pub mod market_repository;
pub mod trade_history_repository;
pub mod transaction_repository;
pub mod user_repository;

pub use bot_action_repository::{BotActionRepository, DecisionOutcome, NewBotAction};
pub use bot_configuration_repository::BotConfigurationRepository;
pub use counter_party_repository::CounterPartyRepository;
pub use credential_repository::{
    ActiveCredentials, CredentialRepository, ExchangeCredential, UnreadableCredential,
};
pub use market_repository::{MarketRepository, NewMarketData, NewP2pAd};
pub use trade_history_repository::TradeHistoryRepository;
pub use transaction_repository::{
    NewTransaction, TransactionFilter, TransactionRepository, UpsertOutcome,
};
pub use user_repository::UserRepository;
