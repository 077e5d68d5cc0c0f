//! Price decisions for a P2P bot configuration.
//!
//! Competitors are the ads on the same side as the bot's own ad in the newest
//! snapshot. The most attractive ad is the cheapest one when selling and the
//! most generous one when buying.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use serde_json::json;
use shared::entity::{bot_actions_log, bot_configurations, p2p_ads};
use shared::repositories::{BotActionRepository, BotConfigurationRepository, MarketRepository, NewBotAction};
use shared::{BotActionStatus, BotActionType, BotProfile, TradeSide};
use std::sync::Arc;

/// Pricing inputs taken from a bot configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingRules {
    pub side: TradeSide,
    pub profile: BotProfile,
    pub min_position: Decimal,
    pub min_price: Decimal,
    pub max_price: Decimal,
    pub price_step: Decimal,
    pub own_nickname: Option<String>,
}

impl PricingRules {
    pub fn from_config(config: &bot_configurations::Model) -> Result<Self> {
        Ok(Self {
            side: config.side()?,
            profile: config.profile()?,
            min_position: config.min_position,
            min_price: config.min_price,
            max_price: config.max_price,
            price_step: config.price_step,
            own_nickname: config.own_nickname.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PriceDecision {
    Update { price: Decimal, reference: Decimal, clamped: bool },
    Hold { reason: String },
}

/// Competitor prices after dropping our own ads and ads too small to matter,
/// most attractive first.
pub fn rank_competitors(ads: &[p2p_ads::Model], rules: &PricingRules) -> Vec<Decimal> {
    let own = rules.own_nickname.as_deref().map(str::trim).filter(|n| !n.is_empty());
    let mut prices: Vec<Decimal> = ads
        .iter()
        .filter(|ad| own.map_or(true, |own| !ad.advertiser_nickname.eq_ignore_ascii_case(own)))
        .filter(|ad| ad.max_amount >= rules.min_position)
        .map(|ad| ad.price)
        .collect();

    match rules.side {
        TradeSide::Sell => prices.sort(),
        TradeSide::Buy => prices.sort_by(|a, b| b.cmp(a)),
    }
    prices
}

/// Choose a price for the bot's ad from the ranked competitor prices.
pub fn decide_price(ranked: &[Decimal], rules: &PricingRules) -> PriceDecision {
    let best = match ranked.first() {
        Some(best) => *best,
        None => {
            return PriceDecision::Hold {
                reason: "No competing ads to price against".to_string(),
            }
        }
    };

    let (reference, target) = match rules.profile {
        BotProfile::Aggressive => {
            let target = match rules.side {
                TradeSide::Sell => best - rules.price_step,
                TradeSide::Buy => best + rules.price_step,
            };
            (best, target)
        }
        BotProfile::Moderate => (best, best),
        BotProfile::Conservative => {
            let third = ranked.get(2).or_else(|| ranked.last()).copied().unwrap_or(best);
            (third, third)
        }
    };

    let price = target.max(rules.min_price).min(rules.max_price);
    PriceDecision::Update {
        price,
        reference,
        clamped: price != target,
    }
}

/// Runs pricing for stored configurations and records the decision.
pub struct BotStrategyService {
    configs: BotConfigurationRepository,
    actions: BotActionRepository,
    market: MarketRepository,
    snapshot_max_age: Duration,
}

impl BotStrategyService {
    pub fn new(db: Arc<DatabaseConnection>, snapshot_max_age_minutes: i64) -> Self {
        Self {
            configs: BotConfigurationRepository::new(db.clone()),
            actions: BotActionRepository::new(db.clone()),
            market: MarketRepository::new(db),
            snapshot_max_age: Duration::minutes(snapshot_max_age_minutes),
        }
    }

    /// Returns `None` when the configuration is missing or inactive.
    pub async fn process(&self, config_id: i64, now: DateTime<Utc>) -> Result<Option<bot_actions_log::Model>> {
        let config = match self.configs.find_by_id(config_id).await? {
            Some(config) => config,
            None => {
                tracing::warn!(config_id, "Bot configuration not found");
                return Ok(None);
            }
        };
        if !config.is_active {
            tracing::info!(config_id, "Bot configuration inactive, skipping");
            return Ok(None);
        }

        let rules = PricingRules::from_config(&config)
            .with_context(|| format!("Invalid bot configuration {}", config.id))?;
        let exchange = config.exchange()?;
        let ads = self
            .market
            .latest_snapshot(exchange, &config.asset, &config.fiat, rules.side)
            .await?;
        let previous_price = self.actions.last_approved_price(config.id).await?;

        let captured_at = ads.first().map(|ad| ad.captured_at);
        let ranked = rank_competitors(&ads, &rules);
        let decision = match captured_at {
            Some(at) if now - at > self.snapshot_max_age => PriceDecision::Hold {
                reason: format!("Market snapshot from {} is stale", at.format("%Y-%m-%d %H:%M:%S UTC")),
            },
            _ => decide_price(&ranked, &rules),
        };

        let snapshot = json!({
            "captured_at": captured_at,
            "ads": ads.len(),
            "competitors": ranked.iter().take(5).map(|p| p.to_string()).collect::<Vec<_>>(),
        });

        let (action_type, proposed_price, reason) = match decision {
            PriceDecision::Update { price, .. } if Some(price) == previous_price => (
                BotActionType::Hold,
                Some(price),
                format!("Price {} already matches the market", price),
            ),
            PriceDecision::Update { price, reference, clamped } => {
                let mut reason = format!(
                    "{} {} ad priced at {} against reference {}",
                    rules.profile, rules.side, price, reference
                );
                if clamped {
                    reason.push_str(&format!(
                        " (clamped to [{}, {}])",
                        rules.min_price, rules.max_price
                    ));
                }
                (BotActionType::UpdatePrice, Some(price), reason)
            }
            PriceDecision::Hold { reason } => (BotActionType::Hold, None, reason),
        };

        let status = if config.requires_approval {
            BotActionStatus::PendingApproval
        } else {
            BotActionStatus::Approved
        };

        let action = self
            .actions
            .record(NewBotAction {
                bot_configuration_id: config.id,
                user_id: config.user_id,
                action_type,
                previous_price,
                proposed_price,
                reason,
                market_snapshot: Some(snapshot),
                status,
            })
            .await?;

        tracing::info!(
            config_id = config.id,
            action = %action_type,
            status = %status,
            price = ?proposed_price,
            "Bot decision recorded"
        );
        Ok(Some(action))
    }
}
