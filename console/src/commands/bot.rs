use anyhow::Result;
use shared::repositories::{BotActionRepository, BotConfigurationRepository, DecisionOutcome};
use crate::jobs::Job;
use crate::state::AppState;
use super::{error, info, warn, FAILURE, SUCCESS};

pub async fn handle_bot_start(state: &AppState, config_id: Option<i64>) -> Result<i32> {
    let configs = BotConfigurationRepository::new(state.db.clone());

    match config_id {
        Some(id) => {
            let config = match configs.set_active(id, true).await? {
                Some(config) => config,
                None => {
                    error(format!("Bot configuration {} not found", id));
                    return Ok(FAILURE);
                }
            };
            tracing::info!(config_id = id, "Bot configuration activated");
            state.dispatch(Job::ProcessBotStrategy { config_id: config.id }).await?;
            info(format!("Bot '{}' ({}) started for {}", config.name, config.id, config.pair()));
        }
        None => {
            let active = configs.list_active().await?;
            if active.is_empty() {
                warn("No active bot configurations found");
                return Ok(SUCCESS);
            }
            for config in &active {
                state.dispatch(Job::ProcessBotStrategy { config_id: config.id }).await?;
                info(format!("Dispatched strategy run for '{}' ({})", config.name, config.id));
            }
            info(format!("Started {} bot configuration(s)", active.len()));
        }
    }
    Ok(SUCCESS)
}

pub async fn handle_bot_stop(state: &AppState, config_id: Option<i64>) -> Result<i32> {
    let configs = BotConfigurationRepository::new(state.db.clone());

    match config_id {
        Some(id) => match configs.set_active(id, false).await? {
            Some(config) => {
                tracing::info!(config_id = id, "Bot configuration deactivated");
                info(format!("Bot '{}' ({}) stopped", config.name, config.id));
            }
            None => {
                error(format!("Bot configuration {} not found", id));
                return Ok(FAILURE);
            }
        },
        None => {
            let stopped = configs.deactivate_all().await?;
            info(format!("Stopped {} bot configuration(s)", stopped));
        }
    }
    Ok(SUCCESS)
}

pub async fn handle_bot_status(state: &AppState) -> Result<i32> {
    let configs = BotConfigurationRepository::new(state.db.clone());
    let actions = BotActionRepository::new(state.db.clone());

    let all = configs.list(None).await?;
    if all.is_empty() {
        warn("No bot configurations found");
        return Ok(SUCCESS);
    }

    println!(
        "{:<5} {:<24} {:<10} {:<5} {:<13} {:<7} {:<28} {:>7}",
        "ID", "Name", "Pair", "Side", "Profile", "Active", "Last action", "Pending"
    );
    for config in &all {
        let last = match actions.latest_for(config.id).await? {
            Some(action) => format!("{} ({})", action.action_type, action.status),
            None => "-".to_string(),
        };
        let pending = actions.pending_count(config.id).await?;
        println!(
            "{:<5} {:<24} {:<10} {:<5} {:<13} {:<7} {:<28} {:>7}",
            config.id,
            config.name,
            config.pair(),
            config.trade_type,
            config.profile,
            if config.is_active { "yes" } else { "no" },
            last,
            pending
        );
    }
    Ok(SUCCESS)
}

pub async fn handle_bot_decision(state: &AppState, action_id: i64, approve: bool) -> Result<i32> {
    let actions = BotActionRepository::new(state.db.clone());
    match actions.decide(action_id, approve).await? {
        DecisionOutcome::Decided(action) => {
            tracing::info!(action_id, status = %action.status, "Bot action decided");
            info(format!("Bot action {} {}", action.id, action.status));
            Ok(SUCCESS)
        }
        DecisionOutcome::NotFound => {
            error(format!("Bot action {} not found", action_id));
            Ok(FAILURE)
        }
        DecisionOutcome::NotPending(status) => {
            error(format!("Bot action {} is already {}", action_id, status));
            Ok(FAILURE)
        }
    }
}
