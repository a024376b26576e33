//! Cache configuration.
//!
//! Controls whether the cached repositories are active, how long each key
//! class lives, and whether post-write maintenance runs inline.

use std::time::Duration;

use super::keys::KeyKind;

/// Default lifetime of every cache entry: 24 hours.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// When false the cached repositories delegate straight to the source of truth.
    pub enabled: bool,
    /// TTL for `{prefix}:{id}` entries.
    pub entity_ttl: Duration,
    /// TTL for secondary-index entries.
    pub index_ttl: Duration,
    /// TTL for paginated list entries.
    pub list_ttl: Duration,
    /// Spawn post-write population and invalidation instead of awaiting it.
    pub background_maintenance: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            entity_ttl: DEFAULT_TTL,
            index_ttl: DEFAULT_TTL,
            list_ttl: DEFAULT_TTL,
            background_maintenance: false,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            entity_ttl: settings.entity_ttl,
            index_ttl: settings.index_ttl,
            list_ttl: settings.list_ttl,
            background_maintenance: settings.background_maintenance,
        }
    }
}

impl CacheConfig {
    pub fn ttl_for(&self, kind: KeyKind) -> Duration {
        match kind {
            KeyKind::Entity => self.entity_ttl,
            KeyKind::Index => self.index_ttl,
            KeyKind::List => self.list_ttl,
        }
    }
}
