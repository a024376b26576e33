//! Redis adapter for the cache store port.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::{Client, RedisResult, aio::ConnectionManager};
use tokio::time::timeout;
use tracing::{debug, info};

use crate::cache::{CacheStore, CacheStoreError};

use super::error::InfraError;

/// Cache store backed by a Redis server.
///
/// Every command is bounded by `operation_timeout`. Pattern deletes walk the
/// keyspace with `SCAN MATCH` in batches and never issue `KEYS`.
#[derive(Clone)]
pub struct RedisCacheStore {
    connection: ConnectionManager,
    operation_timeout: Duration,
    scan_batch_size: usize,
}

impl RedisCacheStore {
    pub async fn connect(
        url: &str,
        operation_timeout: Duration,
        scan_batch_size: usize,
    ) -> Result<Self, InfraError> {
        let client = Client::open(url)
            .map_err(|err| InfraError::cache(format!("failed to create redis client: {err}")))?;

        let connection = timeout(operation_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| {
                InfraError::cache(format!(
                    "redis connection to {url} timed out after {operation_timeout:?}"
                ))
            })?
            .map_err(|err| InfraError::cache(format!("failed to connect to redis: {err}")))?;

        info!(
            operation_timeout_ms = operation_timeout.as_millis() as u64,
            "Redis cache store connected"
        );

        Ok(Self {
            connection,
            operation_timeout,
            scan_batch_size: scan_batch_size.max(1),
        })
    }

    /// Round-trip a `PING`.
    pub async fn ping(&self) -> Result<(), CacheStoreError> {
        let mut conn = self.connection.clone();
        let reply: String = self
            .bounded("ping", redis::cmd("PING").query_async(&mut conn))
            .await?;
        if reply != "PONG" {
            return Err(CacheStoreError::backend(format!(
                "unexpected PING reply `{reply}`"
            )));
        }
        Ok(())
    }

    async fn bounded<T, F>(&self, op: &'static str, command: F) -> Result<T, CacheStoreError>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match timeout(self.operation_timeout, command).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(CacheStoreError::backend(err)),
            Err(_) => Err(CacheStoreError::Timeout {
                op,
                timeout: self.operation_timeout,
            }),
        }
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheStoreError> {
        let mut conn = self.connection.clone();
        self.bounded("get", redis::cmd("GET").arg(key).query_async(&mut conn))
            .await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheStoreError> {
        let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
        let mut conn = self.connection.clone();
        self.bounded(
            "set",
            redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("PX")
                .arg(millis)
                .query_async::<()>(&mut conn),
        )
        .await
    }

    async fn delete(&self, keys: &[String]) -> Result<(), CacheStoreError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection.clone();
        self.bounded(
            "delete",
            redis::cmd("DEL").arg(keys.to_vec()).query_async::<u64>(&mut conn),
        )
        .await?;
        Ok(())
    }

    async fn delete_by_pattern(&self, pattern: &str) -> Result<u64, CacheStoreError> {
        let mut conn = self.connection.clone();
        let mut cursor: u64 = 0;
        let mut removed = 0u64;

        loop {
            let (next, keys): (u64, Vec<String>) = self
                .bounded(
                    "scan",
                    redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(pattern)
                        .arg("COUNT")
                        .arg(self.scan_batch_size)
                        .query_async(&mut conn),
                )
                .await?;

            if !keys.is_empty() {
                removed += self
                    .bounded(
                        "delete",
                        redis::cmd("DEL").arg(&keys).query_async::<u64>(&mut conn),
                    )
                    .await?;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!(pattern, removed, "Redis pattern delete finished");
        Ok(removed)
    }
}
