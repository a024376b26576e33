//! Cache-aside consistency layer.
//!
//! Cached repositories implement the same traits as the persistent ones and
//! sit in front of them:
//!
//! - reads consult the cache store, fall through on a miss or an invalid
//!   entry, and repopulate;
//! - mutations hit the source of truth first, then rewrite the entity and
//!   index entries and purge every list page that may now be stale.
//!
//! The store is injected as `Arc<dyn CacheStore>`. Store failures never reach
//! callers; they are logged and counted.

pub mod codec;
pub mod config;
pub mod families;
pub mod keys;
pub mod policy;
pub mod repository;
pub mod store;

pub use codec::{CACHE_FORMAT_VERSION, CacheEntity, CodecError};
pub use config::CacheConfig;
pub use families::{
    CachedAnswersRepo, CachedAttachmentsRepo, CachedCommentsRepo, CachedQuestionsRepo,
    CachedRepositories, CachedUsersRepo,
};
pub use keys::{KeyKind, ListParams};
pub use policy::InvalidationPolicy;
pub use repository::CachedRepository;
pub use store::{CacheStore, CacheStoreError, MemoryCacheStore};

/// Metric names emitted by the cache layer.
pub mod metric_names {
    pub const HIT: &str = "stoa_cache_hit_total";
    pub const MISS: &str = "stoa_cache_miss_total";
    pub const DECODE_ERROR: &str = "stoa_cache_decode_error_total";
    pub const STORE_ERROR: &str = "stoa_cache_store_error_total";
    pub const INVALIDATION: &str = "stoa_cache_invalidation_total";
    pub const MAINTENANCE_MS: &str = "stoa_cache_maintenance_ms";
}
