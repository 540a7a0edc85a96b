//! Redis-backed cache store.

use crate::cache::store::{CacheStore, StoreStats};
use crate::error::CacheError;
use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::Client;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Keys fetched per `SCAN` round trip.
const SCAN_BATCH: usize = 500;

/// Reconnect attempts the connection manager makes before giving up.
const RECONNECT_RETRIES: usize = 1;

pub struct RedisStore {
    client: Client,
    connection: Mutex<Option<ConnectionManager>>,
    timeout: Duration,
}

impl RedisStore {
    /// Validate the URL. No connection is made until `connect`.
    pub fn open(url: &str) -> Result<Self, CacheError> {
        Self::open_with_timeout(url, crate::cache::DEFAULT_OPERATION_TIMEOUT)
    }

    /// Like [`open`](Self::open), with `timeout` bounding connects and replies.
    pub fn open_with_timeout(url: &str, timeout: Duration) -> Result<Self, CacheError> {
        let client = Client::open(url)?;
        Ok(Self {
            client,
            connection: Mutex::new(None),
            timeout,
        })
    }

    fn manager_config(&self) -> ConnectionManagerConfig {
        let config = ConnectionManagerConfig::new().set_number_of_retries(RECONNECT_RETRIES);
        if self.timeout.is_zero() {
            return config;
        }
        config
            .set_connection_timeout(self.timeout)
            .set_response_timeout(self.timeout)
    }

    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        self.connection
            .lock()
            .await
            .clone()
            .ok_or_else(|| CacheError::Connection("redis connection not established".to_string()))
    }

    async fn scan_keys(
        &self,
        conn: &mut ConnectionManager,
        prefix: &str,
    ) -> Result<Vec<String>, CacheError> {
        let pattern = format!("{}*", prefix);
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                return Ok(keys);
            }
            cursor = next;
        }
    }
}

/// Extract `used_memory` from an `INFO memory` reply.
fn parse_used_memory(info: &str) -> usize {
    info.lines()
        .find_map(|line| line.strip_prefix("used_memory:"))
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(0)
}

#[async_trait]
impl CacheStore for RedisStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn connect(&self) -> Result<(), CacheError> {
        let mut guard = self.connection.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let mut manager = self
            .client
            .get_connection_manager_with_config(self.manager_config())
            .await?;
        let pong: String = redis::cmd("PING").query_async(&mut manager).await?;
        debug!("Redis answered {}", pong);

        *guard = Some(manager);
        info!("Connected to Redis translation cache");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), CacheError> {
        if self.connection.lock().await.take().is_some() {
            info!("Disconnected from Redis translation cache");
        }
        Ok(())
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, CacheError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.connection().await?;
        let mut cmd = redis::cmd("MGET");
        for key in keys {
            cmd.arg(key);
        }
        let values: Vec<Option<String>> = cmd.query_async(&mut conn).await?;

        if values.len() != keys.len() {
            return Err(CacheError::Store(format!(
                "MGET returned {} values for {} keys",
                values.len(),
                keys.len()
            )));
        }
        Ok(values)
    }

    async fn set_many(&self, entries: &[(String, String)], ttl: Duration) -> Result<(), CacheError> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut conn = self.connection().await?;
        let mut pipe = redis::pipe();
        for (key, value) in entries {
            if ttl.is_zero() {
                pipe.cmd("SET").arg(key).arg(value).ignore();
            } else {
                pipe.cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("PX")
                    .arg(ttl.as_millis() as u64)
                    .ignore();
            }
        }
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        let mut conn = self.connection().await?;
        let keys = self.scan_keys(&mut conn, prefix).await?;

        let mut deleted = 0;
        for chunk in keys.chunks(SCAN_BATCH) {
            let mut cmd = redis::cmd("DEL");
            for key in chunk {
                cmd.arg(key);
            }
            let removed: usize = cmd.query_async(&mut conn).await?;
            deleted += removed;
        }
        Ok(deleted)
    }

    async fn stats(&self, prefix: &str) -> Result<StoreStats, CacheError> {
        let mut conn = self.connection().await?;
        let entry_count = self.scan_keys(&mut conn, prefix).await?.len();
        let info: String = redis::cmd("INFO").arg("memory").query_async(&mut conn).await?;

        Ok(StoreStats {
            entry_count,
            memory_bytes: parse_used_memory(&info),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_used_memory() {
        let info = "# Memory\r\nused_memory:1048576\r\nused_memory_human:1.00M\r\n";
        assert_eq!(parse_used_memory(info), 1_048_576);
    }

    #[test]
    fn test_parse_used_memory_missing_field() {
        assert_eq!(parse_used_memory("# Memory\r\n"), 0);
    }

    #[test]
    fn test_open_rejects_invalid_url() {
        assert!(RedisStore::open("not a redis url").is_err());
    }

    #[tokio::test]
    async fn test_connect_to_unreachable_server_fails_quickly() {
        let store =
            RedisStore::open_with_timeout("redis://127.0.0.1:1", Duration::from_millis(200)).unwrap();

        let start = std::time::Instant::now();
        let result = store.connect().await;

        assert!(result.is_err());
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_operations_before_connect_fail_with_connection_error() {
        let store = RedisStore::open("redis://127.0.0.1:6379").unwrap();

        let result = store.get_many(&["k".to_string()]).await;

        assert!(matches!(result, Err(CacheError::Connection(_))));
    }
}
