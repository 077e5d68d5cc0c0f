use anyhow::Result;
use shared::repositories::{CredentialRepository, UserRepository};
use shared::Exchange;
use crate::state::AppState;
use super::{error, info, warn, FAILURE, SUCCESS};

pub async fn handle_credentials_add(
    state: &AppState,
    user_id: i64,
    exchange: Exchange,
    api_key: &str,
    api_secret: &str,
    passphrase: Option<&str>,
) -> Result<i32> {
    if UserRepository::new(state.db.clone()).find_by_id(user_id).await?.is_none() {
        error(format!("User {} not found", user_id));
        return Ok(FAILURE);
    }
    if api_key.trim().is_empty() || api_secret.trim().is_empty() {
        error("API key and secret must not be empty");
        return Ok(FAILURE);
    }
    if exchange == Exchange::Okx && passphrase.is_none() {
        error("OKX credentials need a passphrase");
        return Ok(FAILURE);
    }

    let repo = CredentialRepository::new(state.db.clone(), state.cipher.clone());
    let id = repo
        .upsert(exchange, user_id, api_key.trim(), api_secret.trim(), passphrase)
        .await?;
    info(format!("Stored {} credentials {} for user {}", exchange, id, user_id));
    if state.exchanges.get(exchange).is_none() {
        warn(format!("{} has no P2P history client; these credentials are not synced", exchange));
    }
    Ok(SUCCESS)
}
