//! Cached attachments.
//!
//! Attachments can move between posts. An update lists both the old and the
//! new target as previous/current versions, so pages of both are purged.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::{PageQuery, PaginatedResult};
use crate::application::repos::{
    AttachmentsRepo, CreateAttachmentParams, RepoError, UpdateAttachmentParams,
};
use crate::cache::codec::{CacheEntity, CodecError, require_id, require_text, utc};
use crate::cache::config::CacheConfig;
use crate::cache::keys::ListParams;
use crate::cache::policy::InvalidationPolicy;
use crate::cache::repository::CachedRepository;
use crate::cache::store::CacheStore;
use crate::domain::entities::{AttachmentRecord, PostTarget};

use super::{target_filter, target_from_wire};

pub const NAMESPACE: &str = "attachments";
pub const BY_QUESTION: &str = "attachments:by_question";
pub const BY_ANSWER: &str = "attachments:by_answer";
pub const BY_UPLOADER: &str = "attachments:by_uploader";

#[derive(Serialize, Deserialize)]
pub struct AttachmentWire {
    id: Uuid,
    uploader_id: Uuid,
    question_id: Option<Uuid>,
    answer_id: Option<Uuid>,
    filename: String,
    content_type: String,
    size_bytes: i64,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
}

impl CacheEntity for AttachmentRecord {
    const KIND: &'static str = NAMESPACE;
    type Wire = AttachmentWire;

    fn cache_id(&self) -> String {
        self.id.to_string()
    }

    fn to_wire(&self) -> AttachmentWire {
        AttachmentWire {
            id: self.id,
            uploader_id: self.uploader_id,
            question_id: self.target.question_id(),
            answer_id: self.target.answer_id(),
            filename: self.filename.clone(),
            content_type: self.content_type.clone(),
            size_bytes: self.size_bytes,
            created_at: utc(self.created_at),
        }
    }

    fn from_wire(wire: AttachmentWire) -> Result<Self, CodecError> {
        require_id("id", wire.id)?;
        require_id("uploader_id", wire.uploader_id)?;
        let target = target_from_wire(wire.question_id, wire.answer_id)?;
        require_text("filename", &wire.filename)?;
        require_text("content_type", &wire.content_type)?;
        if wire.size_bytes < 0 {
            return Err(CodecError::invalid("size_bytes is negative"));
        }

        Ok(AttachmentRecord {
            id: wire.id,
            uploader_id: wire.uploader_id,
            target,
            filename: wire.filename,
            content_type: wire.content_type,
            size_bytes: wire.size_bytes,
            created_at: wire.created_at,
        })
    }
}

pub fn policy() -> InvalidationPolicy<AttachmentRecord> {
    InvalidationPolicy::<AttachmentRecord>::new(NAMESPACE)
        .list_by(BY_QUESTION, "question_id", |attachment| {
            attachment.target.question_id().map(|id| id.to_string())
        })
        .list_by(BY_ANSWER, "answer_id", |attachment| {
            attachment.target.answer_id().map(|id| id.to_string())
        })
        .list_by(BY_UPLOADER, "uploader_id", |attachment| {
            Some(attachment.uploader_id.to_string())
        })
}

pub struct CachedAttachmentsRepo {
    inner: Arc<dyn AttachmentsRepo>,
    cache: CachedRepository<AttachmentRecord>,
}

impl CachedAttachmentsRepo {
    pub fn new(
        inner: Arc<dyn AttachmentsRepo>,
        store: Arc<dyn CacheStore>,
        config: CacheConfig,
    ) -> Self {
        Self {
            inner,
            cache: CachedRepository::new(store, policy(), config),
        }
    }
}

#[async_trait]
impl AttachmentsRepo for CachedAttachmentsRepo {
    async fn create_attachment(
        &self,
        params: CreateAttachmentParams,
    ) -> Result<AttachmentRecord, RepoError> {
        let attachment = self.inner.create_attachment(params).await?;
        self.cache.created(&attachment).await;
        Ok(attachment)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AttachmentRecord>, RepoError> {
        self.cache.find_by_id(id, self.inner.find_by_id(id)).await
    }

    async fn list_attachments_for_target(
        &self,
        target: PostTarget,
        page: PageQuery,
    ) -> Result<PaginatedResult<AttachmentRecord>, RepoError> {
        let scope = match target {
            PostTarget::Question(_) => BY_QUESTION,
            PostTarget::Answer(_) => BY_ANSWER,
        };
        self.cache
            .find_page(
                scope,
                target_filter(target),
                page,
                self.inner.list_attachments_for_target(target, page),
            )
            .await
    }

    async fn list_attachments_by_uploader(
        &self,
        uploader_id: Uuid,
        page: PageQuery,
    ) -> Result<PaginatedResult<AttachmentRecord>, RepoError> {
        self.cache
            .find_page(
                BY_UPLOADER,
                ListParams::new().with("uploader_id", uploader_id),
                page,
                self.inner.list_attachments_by_uploader(uploader_id, page),
            )
            .await
    }

    async fn update_attachment(
        &self,
        params: UpdateAttachmentParams,
    ) -> Result<AttachmentRecord, RepoError> {
        let id = params.id;
        let previous = self
            .cache
            .previous_versions(id, self.inner.find_by_id(id))
            .await;
        let attachment = self.inner.update_attachment(params).await?;
        self.cache.updated(&previous, &attachment).await;
        Ok(attachment)
    }

    async fn delete_attachment(&self, id: Uuid) -> Result<(), RepoError> {
        let previous = self
            .cache
            .previous_versions(id, self.inner.find_by_id(id))
            .await;
        self.inner.delete_attachment(id).await?;
        self.cache.deleted(id, &previous).await;
        Ok(())
    }
}
