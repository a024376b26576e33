//! Cache store port and the in-process adapter.
//!
//! The port is the only way the cache layer talks to the key/value service.
//! Every operation is fallible; callers in this crate treat failures as
//! misses (reads) or no-ops (writes) and never surface them.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use globset::{GlobBuilder, GlobMatcher};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheStoreError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache operation `{op}` timed out after {timeout:?}")]
    Timeout { op: &'static str, timeout: Duration },
    #[error("invalid key pattern `{pattern}`: {reason}")]
    Pattern { pattern: String, reason: String },
    #[error("cache backend error: {0}")]
    Backend(String),
}

impl CacheStoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Key/value cache service consumed by the cached repositories.
///
/// Patterns follow redis glob syntax: `*`, `?`, `[...]`, and `\` escapes.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheStoreError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheStoreError>;

    async fn delete(&self, keys: &[String]) -> Result<(), CacheStoreError>;

    /// Delete every key matching `pattern`, returning how many were removed.
    async fn delete_by_pattern(&self, pattern: &str) -> Result<u64, CacheStoreError>;
}

/// Compile a redis-style glob for in-process matching.
pub fn compile_pattern(pattern: &str) -> Result<GlobMatcher, CacheStoreError> {
    GlobBuilder::new(pattern)
        .literal_separator(false)
        .backslash_escape(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|err| CacheStoreError::Pattern {
            pattern: pattern.to_string(),
            reason: err.to_string(),
        })
}

#[derive(Debug, Clone)]
struct StoredEntry {
    value: String,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}

/// In-process store used for single-node deployments and tests.
///
/// Expiry is enforced lazily: an expired entry is dropped when read or
/// when a pattern sweep passes over it.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: DashMap<String, StoredEntry>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| !entry.value().is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(Instant::now()))
    }

    /// Live keys, sorted, for diagnostics and assertions.
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| !entry.value().is_expired(now))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheStoreError> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries
                .remove_if(key, |_, entry| entry.is_expired(Instant::now()));
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheStoreError> {
        let entry = StoredEntry {
            value: value.to_string(),
            expires_at: Instant::now().checked_add(ttl),
        };
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), CacheStoreError> {
        for key in keys {
            self.entries.remove(key);
        }
        Ok(())
    }

    async fn delete_by_pattern(&self, pattern: &str) -> Result<u64, CacheStoreError> {
        let matcher = compile_pattern(pattern)?;
        let now = Instant::now();
        let mut removed = 0u64;
        self.entries.retain(|key, entry| {
            if entry.is_expired(now) {
                return false;
            }
            if matcher.is_match(key.as_str()) {
                removed += 1;
                return false;
            }
            true
        });
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn set_get_delete_roundtrip() {
        let store = MemoryCacheStore::new();
        assert!(store.get("users:1").await.expect("get").is_none());

        store.set("users:1", "payload", TTL).await.expect("set");
        assert_eq!(
            store.get("users:1").await.expect("get").as_deref(),
            Some("payload")
        );

        store
            .delete(&["users:1".to_string(), "users:missing".to_string()])
            .await
            .expect("delete");
        assert!(store.get("users:1").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn expired_entries_read_as_missing() {
        let store = MemoryCacheStore::new();
        store
            .set("users:1", "payload", Duration::ZERO)
            .await
            .expect("set");

        assert!(store.get("users:1").await.expect("get").is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn unrepresentable_ttl_never_expires() {
        let store = MemoryCacheStore::new();
        store
            .set("users:1", "payload", Duration::MAX)
            .await
            .expect("set");

        assert_eq!(
            store.get("users:1").await.expect("get").as_deref(),
            Some("payload")
        );
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn pattern_delete_follows_glob_rules() {
        let store = MemoryCacheStore::new();
        for key in [
            "questions:list:|author_id=1|page=1|",
            "questions:list:|author_id=12|page=1|",
            "questions:list:|order=desc|author_id=1|",
            "questions:1",
        ] {
            store.set(key, "x", TTL).await.expect("set");
        }

        let removed = store
            .delete_by_pattern("questions:list:*|author_id=1|*")
            .await
            .expect("pattern delete");

        assert_eq!(removed, 2);
        assert_eq!(
            store.keys(),
            vec![
                "questions:1".to_string(),
                "questions:list:|author_id=12|page=1|".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn escaped_metacharacters_match_literally() {
        let store = MemoryCacheStore::new();
        store.set("tags:list:|name=c*|", "x", TTL).await.expect("set");
        store.set("tags:list:|name=cx|", "x", TTL).await.expect("set");

        let removed = store
            .delete_by_pattern("tags:list:*|name=c\\*|*")
            .await
            .expect("pattern delete");

        assert_eq!(removed, 1);
        assert!(store.contains_key("tags:list:|name=cx|"));
    }
}
