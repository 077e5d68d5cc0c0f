pub mod config;
pub mod crypto;
pub mod database;
pub mod entity;
pub mod models;
pub mod redis;
pub mod repositories;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{Config, QueueConnection};
pub use crypto::{CipherError, CredentialCipher};
pub use database::{get_db_connection, mask_password};
pub use models::*;
pub use self::redis::{get_redis_client, queue_key, Redis};
