use anyhow::Result;
use redis::Client;

pub type Redis = Client;

pub fn get_redis_client(redis_url: &str) -> Result<Redis> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Redis list backing a named job queue.
pub fn queue_key(queue: &str) -> String {
    format!("queues:{}", queue)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_key() {
        assert_eq!(queue_key("default"), "queues:default");
    }

    #[test]
    fn test_rejects_malformed_url() {
        assert!(get_redis_client("not a url").is_err());
    }
}
