//! Shared fixtures for the cache integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use stoa::application::pagination::PageQuery;
use stoa::application::repos::{CreateQuestionParams, CreateUserParams, QuestionsRepo, UsersRepo};
use stoa::cache::{
    CacheConfig, CacheStore, CacheStoreError, CachedRepositories, MemoryCacheStore,
};
use stoa::domain::entities::{QuestionRecord, UserRecord};
use stoa::domain::types::SortOrder;
use stoa::infra::memory::MemoryRepositories;

/// Memory store whose operations can be switched to fail.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryCacheStore,
    pub fail_all: AtomicBool,
    pub fail_sets: AtomicBool,
    pub fail_deletes: AtomicBool,
}

impl FlakyStore {
    pub fn failing() -> Self {
        let store = Self::default();
        store.fail_all.store(true, Ordering::SeqCst);
        store
    }

    fn check(&self, op: &str) -> Result<(), CacheStoreError> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(CacheStoreError::unavailable(format!("{op} refused")));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheStoreError> {
        self.check("get")?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheStoreError> {
        self.check("set")?;
        if self.fail_sets.load(Ordering::SeqCst) {
            return Err(CacheStoreError::unavailable("set refused"));
        }
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, keys: &[String]) -> Result<(), CacheStoreError> {
        self.check("delete")?;
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(CacheStoreError::unavailable("delete refused"));
        }
        self.inner.delete(keys).await
    }

    async fn delete_by_pattern(&self, pattern: &str) -> Result<u64, CacheStoreError> {
        self.check("delete_by_pattern")?;
        self.inner.delete_by_pattern(pattern).await
    }
}

pub struct Harness<S> {
    pub source: Arc<MemoryRepositories>,
    pub store: Arc<S>,
    pub repos: CachedRepositories,
}

pub fn harness() -> Harness<MemoryCacheStore> {
    harness_with(Arc::new(MemoryCacheStore::new()))
}

pub fn harness_with<S: CacheStore + 'static>(store: Arc<S>) -> Harness<S> {
    let source = Arc::new(MemoryRepositories::new());
    let repos = CachedRepositories::new(source.clone(), store.clone(), CacheConfig::default());
    Harness {
        source,
        store,
        repos,
    }
}

pub fn first_page() -> PageQuery {
    PageQuery::new(1, 10, SortOrder::Desc)
}

pub async fn user(repos: &CachedRepositories, username: &str) -> UserRecord {
    repos
        .users
        .create_user(CreateUserParams {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            display_name: username.to_string(),
        })
        .await
        .expect("create user")
}

pub async fn question(
    repos: &CachedRepositories,
    author: &UserRecord,
    title: &str,
) -> QuestionRecord {
    repos
        .questions
        .create_question(CreateQuestionParams {
            author_id: author.id,
            title: title.to_string(),
            body: format!("{title}?"),
        })
        .await
        .expect("create question")
}
