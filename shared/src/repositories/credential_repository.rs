use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::prelude::*;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveValue, QueryOrder, TryIntoModel};
use std::fmt;
use std::sync::Arc;
use crate::crypto::CredentialCipher;
use crate::entity::{binance_credentials, bybit_credentials, okx_credentials};
use crate::models::Exchange;

/// Decrypted API credentials for one user on one exchange.
#[derive(Clone)]
pub struct ExchangeCredential {
    pub id: i64,
    pub user_id: i64,
    pub exchange: Exchange,
    pub api_key: String,
    pub api_secret: String,
    pub passphrase: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for ExchangeCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeCredential")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("exchange", &self.exchange)
            .field("api_key", &mask(&self.api_key))
            .field("api_secret", &"***")
            .field("last_synced_at", &self.last_synced_at)
            .finish()
    }
}

/// A stored credential that could not be decrypted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadableCredential {
    pub id: i64,
    pub user_id: i64,
    pub error: String,
}

/// Active credentials of one exchange, split by whether they decrypt.
#[derive(Debug, Default)]
pub struct ActiveCredentials {
    pub usable: Vec<ExchangeCredential>,
    pub unreadable: Vec<UnreadableCredential>,
}

impl ActiveCredentials {
    pub fn is_empty(&self) -> bool {
        self.usable.is_empty() && self.unreadable.is_empty()
    }

    pub fn len(&self) -> usize {
        self.usable.len() + self.unreadable.len()
    }
}

fn mask(value: &str) -> String {
    let visible: String = value.chars().take(4).collect();
    format!("{}***", visible)
}

/// Row shape shared by the three credential tables, still encrypted.
struct StoredCredential {
    id: i64,
    user_id: i64,
    api_key: String,
    api_secret: String,
    passphrase: Option<String>,
    last_synced_at: Option<DateTime<Utc>>,
}

impl From<binance_credentials::Model> for StoredCredential {
    fn from(m: binance_credentials::Model) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            api_key: m.api_key,
            api_secret: m.api_secret,
            passphrase: None,
            last_synced_at: m.last_synced_at,
        }
    }
}

impl From<bybit_credentials::Model> for StoredCredential {
    fn from(m: bybit_credentials::Model) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            api_key: m.api_key,
            api_secret: m.api_secret,
            passphrase: None,
            last_synced_at: m.last_synced_at,
        }
    }
}

impl From<okx_credentials::Model> for StoredCredential {
    fn from(m: okx_credentials::Model) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            api_key: m.api_key,
            api_secret: m.api_secret,
            passphrase: m.passphrase,
            last_synced_at: m.last_synced_at,
        }
    }
}

pub struct CredentialRepository {
    db: Arc<DatabaseConnection>,
    cipher: CredentialCipher,
}

impl CredentialRepository {
    pub fn new(db: Arc<DatabaseConnection>, cipher: CredentialCipher) -> Self {
        Self { db, cipher }
    }

    /// Active credentials for an exchange, optionally limited to one user.
    /// Rows are decrypted one by one; a row that fails lands in
    /// `unreadable` without hiding the others.
    pub async fn list_active(&self, exchange: Exchange, user_id: Option<i64>) -> Result<ActiveCredentials> {
        let rows: Vec<StoredCredential> = match exchange {
            Exchange::Binance => {
                let mut query = binance_credentials::Entity::find()
                    .filter(binance_credentials::Column::IsActive.eq(true));
                if let Some(user_id) = user_id {
                    query = query.filter(binance_credentials::Column::UserId.eq(user_id));
                }
                query
                    .order_by_asc(binance_credentials::Column::UserId)
                    .all(self.db.as_ref())
                    .await?
                    .into_iter()
                    .map(Into::into)
                    .collect()
            }
            Exchange::Bybit => {
                let mut query = bybit_credentials::Entity::find()
                    .filter(bybit_credentials::Column::IsActive.eq(true));
                if let Some(user_id) = user_id {
                    query = query.filter(bybit_credentials::Column::UserId.eq(user_id));
                }
                query
                    .order_by_asc(bybit_credentials::Column::UserId)
                    .all(self.db.as_ref())
                    .await?
                    .into_iter()
                    .map(Into::into)
                    .collect()
            }
            Exchange::Okx => {
                let mut query = okx_credentials::Entity::find()
                    .filter(okx_credentials::Column::IsActive.eq(true));
                if let Some(user_id) = user_id {
                    query = query.filter(okx_credentials::Column::UserId.eq(user_id));
                }
                query
                    .order_by_asc(okx_credentials::Column::UserId)
                    .all(self.db.as_ref())
                    .await?
                    .into_iter()
                    .map(Into::into)
                    .collect()
            }
        };

        let mut active = ActiveCredentials::default();
        for row in rows {
            let (id, owner) = (row.id, row.user_id);
            match self.decrypt(exchange, row) {
                Ok(credential) => active.usable.push(credential),
                Err(e) => {
                    let error = format!("{:#}", e);
                    tracing::warn!(
                        credential_id = id,
                        user_id = owner,
                        exchange = %exchange,
                        error = %error,
                        "Skipping credentials that fail to decrypt"
                    );
                    active.unreadable.push(UnreadableCredential { id, user_id: owner, error });
                }
            }
        }
        Ok(active)
    }

    /// The active credential of one user. Fails when it cannot be decrypted.
    pub async fn find_active(&self, exchange: Exchange, user_id: i64) -> Result<Option<ExchangeCredential>> {
        let mut active = self.list_active(exchange, Some(user_id)).await?;
        if let Some(unreadable) = active.unreadable.pop() {
            anyhow::bail!(unreadable.error);
        }
        Ok(active.usable.into_iter().next())
    }

    /// Encrypt and store credentials, replacing any existing row for the user.
    pub async fn upsert(
        &self,
        exchange: Exchange,
        user_id: i64,
        api_key: &str,
        api_secret: &str,
        passphrase: Option<&str>,
    ) -> Result<i64> {
        let now = Utc::now();
        let api_key = self.cipher.encrypt(api_key)?;
        let api_secret = self.cipher.encrypt(api_secret)?;
        let db = self.db.as_ref();

        let id = match exchange {
            Exchange::Binance => {
                let existing = binance_credentials::Entity::find()
                    .filter(binance_credentials::Column::UserId.eq(user_id))
                    .one(db)
                    .await?;
                let mut model = match existing {
                    Some(row) => row.into(),
                    None => binance_credentials::ActiveModel {
                        user_id: ActiveValue::Set(user_id),
                        created_at: ActiveValue::Set(Some(now)),
                        ..Default::default()
                    },
                };
                model.api_key = ActiveValue::Set(api_key);
                model.api_secret = ActiveValue::Set(api_secret);
                model.is_active = ActiveValue::Set(true);
                model.updated_at = ActiveValue::Set(Some(now));
                model.save(db).await?.try_into_model()?.id
            }
            Exchange::Bybit => {
                let existing = bybit_credentials::Entity::find()
                    .filter(bybit_credentials::Column::UserId.eq(user_id))
                    .one(db)
                    .await?;
                let mut model = match existing {
                    Some(row) => row.into(),
                    None => bybit_credentials::ActiveModel {
                        user_id: ActiveValue::Set(user_id),
                        created_at: ActiveValue::Set(Some(now)),
                        ..Default::default()
                    },
                };
                model.api_key = ActiveValue::Set(api_key);
                model.api_secret = ActiveValue::Set(api_secret);
                model.is_active = ActiveValue::Set(true);
                model.updated_at = ActiveValue::Set(Some(now));
                model.save(db).await?.try_into_model()?.id
            }
            Exchange::Okx => {
                let passphrase = passphrase
                    .map(|p| self.cipher.encrypt(p))
                    .transpose()?;
                let existing = okx_credentials::Entity::find()
                    .filter(okx_credentials::Column::UserId.eq(user_id))
                    .one(db)
                    .await?;
                let mut model = match existing {
                    Some(row) => row.into(),
                    None => okx_credentials::ActiveModel {
                        user_id: ActiveValue::Set(user_id),
                        created_at: ActiveValue::Set(Some(now)),
                        ..Default::default()
                    },
                };
                model.api_key = ActiveValue::Set(api_key);
                model.api_secret = ActiveValue::Set(api_secret);
                model.passphrase = ActiveValue::Set(passphrase);
                model.is_active = ActiveValue::Set(true);
                model.updated_at = ActiveValue::Set(Some(now));
                model.save(db).await?.try_into_model()?.id
            }
        };

        tracing::info!(user_id, exchange = %exchange, "Stored exchange credentials");
        Ok(id)
    }

    pub async fn mark_synced(&self, exchange: Exchange, credential_id: i64, at: DateTime<Utc>) -> Result<()> {
        let db = self.db.as_ref();
        match exchange {
            Exchange::Binance => {
                binance_credentials::Entity::update_many()
                    .col_expr(binance_credentials::Column::LastSyncedAt, Expr::value(at))
                    .filter(binance_credentials::Column::Id.eq(credential_id))
                    .exec(db)
                    .await?;
            }
            Exchange::Bybit => {
                bybit_credentials::Entity::update_many()
                    .col_expr(bybit_credentials::Column::LastSyncedAt, Expr::value(at))
                    .filter(bybit_credentials::Column::Id.eq(credential_id))
                    .exec(db)
                    .await?;
            }
            Exchange::Okx => {
                okx_credentials::Entity::update_many()
                    .col_expr(okx_credentials::Column::LastSyncedAt, Expr::value(at))
                    .filter(okx_credentials::Column::Id.eq(credential_id))
                    .exec(db)
                    .await?;
            }
        }
        Ok(())
    }

    fn decrypt(&self, exchange: Exchange, row: StoredCredential) -> Result<ExchangeCredential> {
        let context = || format!("Failed to decrypt {} credentials of user {}", exchange, row.user_id);
        let api_key = self.cipher.decrypt(&row.api_key).with_context(context)?;
        let api_secret = self.cipher.decrypt(&row.api_secret).with_context(context)?;
        let passphrase = match row.passphrase.as_deref() {
            Some(stored) => Some(self.cipher.decrypt(stored).with_context(context)?),
            None => None,
        };
        Ok(ExchangeCredential {
            id: row.id,
            user_id: row.user_id,
            exchange,
            api_key,
            api_secret,
            passphrase,
            last_synced_at: row.last_synced_at,
        })
    }
}
