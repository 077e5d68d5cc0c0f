pub mod bot_strategy;
pub mod enrichment_service;
pub mod market_service;
pub mod sync_service;

pub use bot_strategy::BotStrategyService;
pub use enrichment_service::{EnrichmentReport, EnrichmentService};
pub use market_service::MarketService;
pub use sync_service::{BatchReport, SyncReport, SyncService};
