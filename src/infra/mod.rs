//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod memory;
pub mod redis_store;
pub mod telemetry;

use std::sync::Arc;

use tracing::info;

use crate::cache::{CacheStore, MemoryCacheStore};
use crate::config::{CacheBackend, CacheSettings};

use self::error::InfraError;
use self::redis_store::RedisCacheStore;

/// Cache store selected by configuration.
#[derive(Clone)]
pub enum ConfiguredStore {
    Memory(Arc<MemoryCacheStore>),
    Redis(Arc<RedisCacheStore>),
}

impl ConfiguredStore {
    pub async fn connect(settings: &CacheSettings) -> Result<Self, InfraError> {
        match settings.backend {
            CacheBackend::Memory => {
                info!(backend = "memory", "Using in-process cache store");
                Ok(Self::Memory(Arc::new(MemoryCacheStore::new())))
            }
            CacheBackend::Redis => {
                let url = settings.redis_url.as_deref().ok_or_else(|| {
                    InfraError::configuration("cache.redis_url is required for redis")
                })?;
                let store = RedisCacheStore::connect(
                    url,
                    settings.operation_timeout,
                    settings.scan_batch_size.get(),
                )
                .await?;
                Ok(Self::Redis(Arc::new(store)))
            }
        }
    }

    pub fn backend(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Redis(_) => "redis",
        }
    }

    pub fn as_store(&self) -> Arc<dyn CacheStore> {
        match self {
            Self::Memory(store) => store.clone(),
            Self::Redis(store) => store.clone(),
        }
    }

    /// Verify the backend answers.
    pub async fn ping(&self) -> Result<(), InfraError> {
        match self {
            Self::Memory(_) => Ok(()),
            Self::Redis(store) => store
                .ping()
                .await
                .map_err(|err| InfraError::cache(err.to_string())),
        }
    }
}
