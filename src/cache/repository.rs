//! Read-through / write-invalidate engine shared by every cached family.
//!
//! The engine never decides *what* an entity family looks like; that comes
//! from the family's [`CacheEntity`] codec and [`InvalidationPolicy`]. It
//! decides *how* the cache is consulted and repaired:
//!
//! 1. Reads try the cache, then fall back to the supplied loader and
//!    repopulate. Not-found results are never cached.
//! 2. Mutations are reported after the source of truth accepted them. The
//!    engine rewrites the entity and index entries, retires index keys the
//!    entity no longer owns, and purges the list scopes named by the policy.
//! 3. Cache failures are logged and counted, never returned.
//!
//! A reader that missed may still write its (older) value after a writer
//! invalidated the same key. That window is closed by the entry's TTL.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, warn};

use crate::application::pagination::{PageQuery, PaginatedResult};
use crate::application::repos::RepoError;

use super::codec::{self, CacheEntity, CodecError};
use super::config::CacheConfig;
use super::keys::{KeyKind, ListParams, entity_key, index_key, list_key};
use super::metric_names::{DECODE_ERROR, HIT, INVALIDATION, MAINTENANCE_MS, MISS, STORE_ERROR};
use super::policy::InvalidationPolicy;
use super::store::{CacheStore, CacheStoreError};

/// Post-write cache work derived from one mutation.
struct Maintenance<T> {
    op: &'static str,
    retire: Vec<String>,
    upsert: Option<T>,
    patterns: Vec<String>,
}

pub struct CachedRepository<T: CacheEntity> {
    store: Arc<dyn CacheStore>,
    policy: Arc<InvalidationPolicy<T>>,
    config: CacheConfig,
}

impl<T: CacheEntity> Clone for CachedRepository<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            policy: Arc::clone(&self.policy),
            config: self.config.clone(),
        }
    }
}

impl<T: CacheEntity> CachedRepository<T> {
    pub fn new(
        store: Arc<dyn CacheStore>,
        policy: InvalidationPolicy<T>,
        config: CacheConfig,
    ) -> Self {
        Self {
            store,
            policy: Arc::new(policy),
            config,
        }
    }

    pub fn entity_key(&self, id: impl Display) -> String {
        entity_key(self.policy.namespace(), id)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Serve `{namespace}:{id}` from cache, or load and populate it.
    pub async fn find_by_id<F>(&self, id: impl Display, load: F) -> Result<Option<T>, RepoError>
    where
        F: Future<Output = Result<Option<T>, RepoError>>,
    {
        if !self.config.enabled {
            return load.await;
        }

        let id = id.to_string();
        let key = self.entity_key(&id);
        if let Some(entity) = self
            .read_entity(&key, KeyKind::Entity, |entity| entity.cache_id() == id)
            .await
        {
            self.hit(&key, KeyKind::Entity);
            return Ok(Some(entity));
        }

        let loaded = load.await?;
        if let Some(entity) = &loaded {
            self.populate(entity).await;
        }
        Ok(loaded)
    }

    /// Serve a secondary-index lookup from cache, or load and populate it.
    pub async fn find_by_index<F>(
        &self,
        index: &'static str,
        value: &str,
        load: F,
    ) -> Result<Option<T>, RepoError>
    where
        F: Future<Output = Result<Option<T>, RepoError>>,
    {
        if !self.config.enabled {
            return load.await;
        }

        let Some(rule) = self.policy.index_rule(index) else {
            warn!(
                family = T::KIND,
                index, "Lookup on undeclared index; bypassing cache"
            );
            return load.await;
        };

        let key = index_key(self.policy.namespace(), index, value);
        let indexed = rule.value;
        if let Some(entity) = self
            .read_entity(&key, KeyKind::Index, |entity| indexed(entity) == value)
            .await
        {
            // A stale index entry still carries the old value, so it is only
            // trusted while the id entry holds the same version.
            if self.peek(&entity.cache_id()).await.as_ref() == Some(&entity) {
                self.hit(&key, KeyKind::Index);
                return Ok(Some(entity));
            }
            self.reject(
                &key,
                KeyKind::Index,
                CodecError::invalid("index entry disagrees with the entity entry"),
            )
            .await;
        }

        let loaded = load.await?;
        if let Some(entity) = &loaded {
            self.populate(entity).await;
        }
        Ok(loaded)
    }

    /// Serve one page of a list scope from cache, or load and cache it whole.
    pub async fn find_page<F>(
        &self,
        scope: &str,
        filter: ListParams,
        page: PageQuery,
        load: F,
    ) -> Result<PaginatedResult<T>, RepoError>
    where
        F: Future<Output = Result<PaginatedResult<T>, RepoError>>,
    {
        if !self.config.enabled {
            return load.await;
        }

        let key = list_key(scope, &filter.paged(page));
        match self.store.get(&key).await {
            Ok(Some(text)) => match codec::decode_page::<T>(&text) {
                Ok(cached) if cached.query() == page => {
                    self.hit(&key, KeyKind::List);
                    return Ok(cached);
                }
                Ok(_) => {
                    self.reject(
                        &key,
                        KeyKind::List,
                        CodecError::invalid("cached page does not match its key"),
                    )
                    .await;
                }
                Err(err) => self.reject(&key, KeyKind::List, err).await,
            },
            Ok(None) => self.miss(&key, KeyKind::List),
            Err(err) => {
                self.store_failed("get", &key, &err);
                self.miss(&key, KeyKind::List);
            }
        }

        let loaded = load.await?;
        match codec::encode_page(&loaded) {
            Ok(text) => self.write(&key, &text, KeyKind::List).await,
            Err(err) => warn!(
                family = T::KIND,
                key = %key,
                error = %err,
                "Failed to encode page for cache"
            ),
        }
        Ok(loaded)
    }

    /// Versions of an entity as they stand before a mutation: the source of
    /// truth's copy plus any differing copy still sitting in the cache.
    ///
    /// A failing loader is logged and treated as absent; the mutation itself
    /// will report the error if the source of truth is really unavailable.
    pub async fn previous_versions<F>(&self, id: impl Display, load: F) -> Vec<T>
    where
        F: Future<Output = Result<Option<T>, RepoError>>,
    {
        if !self.config.enabled {
            return Vec::new();
        }

        let id = id.to_string();
        let mut versions = Vec::with_capacity(2);

        match load.await {
            Ok(Some(entity)) => versions.push(entity),
            Ok(None) => {}
            Err(err) => warn!(
                family = T::KIND,
                id = %id,
                error = %err,
                "Failed to load pre-mutation state"
            ),
        }

        if let Some(cached) = self.peek(&id).await
            && !versions.contains(&cached)
        {
            versions.push(cached);
        }

        versions
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Record a successful create.
    pub async fn created(&self, entity: &T) {
        if !self.config.enabled {
            return;
        }
        let plan = Maintenance {
            op: "create",
            retire: Vec::new(),
            upsert: Some(entity.clone()),
            patterns: self.policy.invalidation_patterns(&[entity]),
        };
        self.dispatch(plan).await;
    }

    /// Record a successful update from `previous` versions to `current`.
    pub async fn updated(&self, previous: &[T], current: &T) {
        if !self.config.enabled {
            return;
        }
        let mut versions: Vec<&T> = previous.iter().collect();
        let retire = self.policy.retired_index_keys(&versions, Some(current));
        versions.push(current);
        let plan = Maintenance {
            op: "update",
            retire,
            upsert: Some(current.clone()),
            patterns: self.policy.invalidation_patterns(&versions),
        };
        self.dispatch(plan).await;
    }

    /// Record a successful delete of `id`, whose last known versions are `previous`.
    pub async fn deleted(&self, id: impl Display, previous: &[T]) {
        if !self.config.enabled {
            return;
        }
        let versions: Vec<&T> = previous.iter().collect();
        let mut retire = vec![self.entity_key(id)];
        retire.extend(self.policy.retired_index_keys(&versions, None));
        let plan = Maintenance {
            op: "delete",
            retire,
            upsert: None,
            patterns: self.policy.invalidation_patterns(&versions),
        };
        self.dispatch(plan).await;
    }

    async fn dispatch(&self, plan: Maintenance<T>) {
        if self.config.background_maintenance
            && let Ok(handle) = tokio::runtime::Handle::try_current()
        {
            let engine = self.clone();
            handle.spawn(async move { engine.apply(plan).await });
            return;
        }
        self.apply(plan).await;
    }

    async fn apply(&self, plan: Maintenance<T>) {
        let started = Instant::now();

        if !plan.retire.is_empty() {
            match self.store.delete(&plan.retire).await {
                Ok(()) => {
                    counter!(INVALIDATION, "family" => T::KIND, "kind" => "key")
                        .increment(plan.retire.len() as u64);
                }
                Err(err) => self.store_failed("delete", &plan.retire.join(","), &err),
            }
        }

        if let Some(entity) = &plan.upsert {
            self.populate(entity).await;
        }

        for pattern in &plan.patterns {
            match self.store.delete_by_pattern(pattern).await {
                Ok(removed) => {
                    counter!(INVALIDATION, "family" => T::KIND, "kind" => "pattern")
                        .increment(1);
                    debug!(
                        family = T::KIND,
                        pattern = %pattern,
                        removed,
                        "Purged list entries"
                    );
                }
                Err(err) => self.store_failed("delete_by_pattern", pattern, &err),
            }
        }

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        histogram!(MAINTENANCE_MS, "family" => T::KIND, "op" => plan.op).record(elapsed_ms);
        debug!(
            family = T::KIND,
            op = plan.op,
            retired = plan.retire.len(),
            patterns = plan.patterns.len(),
            elapsed_ms,
            "Cache maintenance finished"
        );
    }

    // ========================================================================
    // Store access
    // ========================================================================

    /// Write the entity under its id key and every index key it owns.
    async fn populate(&self, entity: &T) {
        let id_key = self.entity_key(entity.cache_id());
        let index_keys = self.policy.index_keys(entity);

        let text = match codec::encode(entity) {
            Ok(text) => text,
            Err(err) => {
                warn!(
                    family = T::KIND,
                    key = %id_key,
                    error = %err,
                    "Failed to encode entity; dropping cached copies"
                );
                let mut keys = vec![id_key];
                keys.extend(index_keys);
                if let Err(err) = self.store.delete(&keys).await {
                    self.store_failed("delete", &keys.join(","), &err);
                }
                return;
            }
        };

        self.write(&id_key, &text, KeyKind::Entity).await;
        for key in index_keys {
            self.write(&key, &text, KeyKind::Index).await;
        }
    }

    /// Set a key; when that fails, make sure no older value survives under it.
    async fn write(&self, key: &str, text: &str, kind: KeyKind) {
        let Err(err) = self.store.set(key, text, self.config.ttl_for(kind)).await else {
            return;
        };
        self.store_failed("set", key, &err);
        if let Err(err) = self.store.delete(&[key.to_string()]).await {
            self.store_failed("delete", key, &err);
        }
    }

    /// Decode the entry at `key`; misses and rejects are accounted here,
    /// hits by the caller.
    async fn read_entity(
        &self,
        key: &str,
        kind: KeyKind,
        accept: impl Fn(&T) -> bool,
    ) -> Option<T> {
        let text = match self.store.get(key).await {
            Ok(Some(text)) => text,
            Ok(None) => {
                self.miss(key, kind);
                return None;
            }
            Err(err) => {
                self.store_failed("get", key, &err);
                self.miss(key, kind);
                return None;
            }
        };

        match codec::decode::<T>(&text) {
            Ok(entity) if accept(&entity) => Some(entity),
            Ok(_) => {
                self.reject(
                    key,
                    kind,
                    CodecError::invalid("cached entity does not match its key"),
                )
                .await;
                None
            }
            Err(err) => {
                self.reject(key, kind, err).await;
                None
            }
        }
    }

    /// Cached copy of an entity without touching hit/miss accounting.
    async fn peek(&self, id: &str) -> Option<T> {
        let key = self.entity_key(id);
        let text = match self.store.get(&key).await {
            Ok(text) => text?,
            Err(err) => {
                self.store_failed("get", &key, &err);
                return None;
            }
        };
        match codec::decode::<T>(&text) {
            Ok(entity) if entity.cache_id() == id => Some(entity),
            Ok(_) => {
                self.reject(
                    &key,
                    KeyKind::Entity,
                    CodecError::invalid("cached entity does not match its key"),
                )
                .await;
                None
            }
            Err(err) => {
                self.reject(&key, KeyKind::Entity, err).await;
                None
            }
        }
    }

    /// Drop an entry that failed decoding and count it as a miss.
    async fn reject(&self, key: &str, kind: KeyKind, err: CodecError) {
        counter!(DECODE_ERROR, "family" => T::KIND, "kind" => kind.as_str()).increment(1);
        warn!(
            family = T::KIND,
            key = %key,
            error = %err,
            "Discarding invalid cache entry"
        );
        if let Err(err) = self.store.delete(&[key.to_string()]).await {
            self.store_failed("delete", key, &err);
        }
        self.miss(key, kind);
    }

    fn hit(&self, key: &str, kind: KeyKind) {
        counter!(HIT, "family" => T::KIND, "kind" => kind.as_str()).increment(1);
        debug!(family = T::KIND, key = %key, "Cache hit");
    }

    fn miss(&self, key: &str, kind: KeyKind) {
        counter!(MISS, "family" => T::KIND, "kind" => kind.as_str()).increment(1);
        debug!(family = T::KIND, key = %key, "Cache miss");
    }

    fn store_failed(&self, op: &'static str, key: &str, err: &CacheStoreError) {
        counter!(STORE_ERROR, "family" => T::KIND, "op" => op).increment(1);
        warn!(
            family = T::KIND,
            op,
            key = %key,
            error = %err,
            "Cache store operation failed"
        );
    }
}
