//! Cached users.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::{PageQuery, PaginatedResult};
use crate::application::repos::{CreateUserParams, RepoError, UpdateUserParams, UsersRepo};
use crate::cache::codec::{
    CacheEntity, CodecError, require_chronology, require_id, require_text, utc,
};
use crate::cache::config::CacheConfig;
use crate::cache::keys::ListParams;
use crate::cache::policy::InvalidationPolicy;
use crate::cache::repository::CachedRepository;
use crate::cache::store::CacheStore;
use crate::domain::entities::UserRecord;

pub const NAMESPACE: &str = "users";
pub const USERNAME_INDEX: &str = "username";
pub const EMAIL_INDEX: &str = "email";

#[derive(Serialize, Deserialize)]
pub struct UserWire {
    id: Uuid,
    username: String,
    email: String,
    display_name: String,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
}

impl CacheEntity for UserRecord {
    const KIND: &'static str = NAMESPACE;
    type Wire = UserWire;

    fn cache_id(&self) -> String {
        self.id.to_string()
    }

    fn to_wire(&self) -> UserWire {
        UserWire {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            created_at: utc(self.created_at),
            updated_at: utc(self.updated_at),
        }
    }

    fn from_wire(wire: UserWire) -> Result<Self, CodecError> {
        require_id("id", wire.id)?;
        require_text("username", &wire.username)?;
        require_text("email", &wire.email)?;
        if !wire.email.contains('@') {
            return Err(CodecError::invalid("email lacks `@`"));
        }
        require_chronology(wire.created_at, wire.updated_at)?;

        Ok(UserRecord {
            id: wire.id,
            username: wire.username,
            email: wire.email,
            display_name: wire.display_name,
            created_at: wire.created_at,
            updated_at: wire.updated_at,
        })
    }
}

/// Users are indexed by username and email. Their own list is unscoped;
/// the by-author lists of other families show author details, so a user
/// change purges those too.
pub fn policy() -> InvalidationPolicy<UserRecord> {
    InvalidationPolicy::<UserRecord>::new(NAMESPACE)
        .index(USERNAME_INDEX, |user| user.username.clone())
        .index(EMAIL_INDEX, |user| user.email.clone())
        .list_all(NAMESPACE)
        .list_by("questions:by_author", "author_id", |user| {
            Some(user.id.to_string())
        })
        .list_by("answers:by_author", "author_id", |user| {
            Some(user.id.to_string())
        })
        .list_by("comments:by_author", "author_id", |user| {
            Some(user.id.to_string())
        })
        .list_by("attachments:by_uploader", "uploader_id", |user| {
            Some(user.id.to_string())
        })
}

pub struct CachedUsersRepo {
    inner: Arc<dyn UsersRepo>,
    cache: CachedRepository<UserRecord>,
}

impl CachedUsersRepo {
    pub fn new(inner: Arc<dyn UsersRepo>, store: Arc<dyn CacheStore>, config: CacheConfig) -> Self {
        Self {
            inner,
            cache: CachedRepository::new(store, policy(), config),
        }
    }
}

#[async_trait]
impl UsersRepo for CachedUsersRepo {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let user = self.inner.create_user(params).await?;
        self.cache.created(&user).await;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        self.cache.find_by_id(id, self.inner.find_by_id(id)).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        self.cache
            .find_by_index(
                USERNAME_INDEX,
                username,
                self.inner.find_by_username(username),
            )
            .await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError> {
        self.cache
            .find_by_index(EMAIL_INDEX, email, self.inner.find_by_email(email))
            .await
    }

    async fn list_users(&self, page: PageQuery) -> Result<PaginatedResult<UserRecord>, RepoError> {
        self.cache
            .find_page(NAMESPACE, ListParams::new(), page, self.inner.list_users(page))
            .await
    }

    async fn update_user(&self, params: UpdateUserParams) -> Result<UserRecord, RepoError> {
        let id = params.id;
        let previous = self
            .cache
            .previous_versions(id, self.inner.find_by_id(id))
            .await;
        let user = self.inner.update_user(params).await?;
        self.cache.updated(&previous, &user).await;
        Ok(user)
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), RepoError> {
        let previous = self
            .cache
            .previous_versions(id, self.inner.find_by_id(id))
            .await;
        self.inner.delete_user(id).await?;
        self.cache.deleted(id, &previous).await;
        Ok(())
    }
}
