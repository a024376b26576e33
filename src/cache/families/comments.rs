//! Cached comments.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::{PageQuery, PaginatedResult};
use crate::application::repos::{
    CommentsRepo, CreateCommentParams, RepoError, UpdateCommentParams,
};
use crate::cache::codec::{
    CacheEntity, CodecError, require_chronology, require_id, require_text, utc,
};
use crate::cache::config::CacheConfig;
use crate::cache::keys::ListParams;
use crate::cache::policy::InvalidationPolicy;
use crate::cache::repository::CachedRepository;
use crate::cache::store::CacheStore;
use crate::domain::entities::{CommentRecord, PostTarget};

use super::{target_filter, target_from_wire};

pub const NAMESPACE: &str = "comments";
pub const BY_QUESTION: &str = "comments:by_question";
pub const BY_ANSWER: &str = "comments:by_answer";
pub const BY_AUTHOR: &str = "comments:by_author";

#[derive(Serialize, Deserialize)]
pub struct CommentWire {
    id: Uuid,
    author_id: Uuid,
    question_id: Option<Uuid>,
    answer_id: Option<Uuid>,
    body: String,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
}

impl CacheEntity for CommentRecord {
    const KIND: &'static str = NAMESPACE;
    type Wire = CommentWire;

    fn cache_id(&self) -> String {
        self.id.to_string()
    }

    fn to_wire(&self) -> CommentWire {
        CommentWire {
            id: self.id,
            author_id: self.author_id,
            question_id: self.target.question_id(),
            answer_id: self.target.answer_id(),
            body: self.body.clone(),
            created_at: utc(self.created_at),
            updated_at: utc(self.updated_at),
        }
    }

    fn from_wire(wire: CommentWire) -> Result<Self, CodecError> {
        require_id("id", wire.id)?;
        require_id("author_id", wire.author_id)?;
        let target = target_from_wire(wire.question_id, wire.answer_id)?;
        require_text("body", &wire.body)?;
        require_chronology(wire.created_at, wire.updated_at)?;

        Ok(CommentRecord {
            id: wire.id,
            author_id: wire.author_id,
            target,
            body: wire.body,
            created_at: wire.created_at,
            updated_at: wire.updated_at,
        })
    }
}

pub fn policy() -> InvalidationPolicy<CommentRecord> {
    InvalidationPolicy::<CommentRecord>::new(NAMESPACE)
        .list_by(BY_QUESTION, "question_id", |comment| {
            comment.target.question_id().map(|id| id.to_string())
        })
        .list_by(BY_ANSWER, "answer_id", |comment| {
            comment.target.answer_id().map(|id| id.to_string())
        })
        .list_by(BY_AUTHOR, "author_id", |comment| {
            Some(comment.author_id.to_string())
        })
}

pub struct CachedCommentsRepo {
    inner: Arc<dyn CommentsRepo>,
    cache: CachedRepository<CommentRecord>,
}

impl CachedCommentsRepo {
    pub fn new(
        inner: Arc<dyn CommentsRepo>,
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
impl CommentsRepo for CachedCommentsRepo {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let comment = self.inner.create_comment(params).await?;
        self.cache.created(&comment).await;
        Ok(comment)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CommentRecord>, RepoError> {
        self.cache.find_by_id(id, self.inner.find_by_id(id)).await
    }

    async fn list_comments_for_target(
        &self,
        target: PostTarget,
        page: PageQuery,
    ) -> Result<PaginatedResult<CommentRecord>, RepoError> {
        let scope = match target {
            PostTarget::Question(_) => BY_QUESTION,
            PostTarget::Answer(_) => BY_ANSWER,
        };
        self.cache
            .find_page(
                scope,
                target_filter(target),
                page,
                self.inner.list_comments_for_target(target, page),
            )
            .await
    }

    async fn list_comments_by_author(
        &self,
        author_id: Uuid,
        page: PageQuery,
    ) -> Result<PaginatedResult<CommentRecord>, RepoError> {
        self.cache
            .find_page(
                BY_AUTHOR,
                ListParams::new().with("author_id", author_id),
                page,
                self.inner.list_comments_by_author(author_id, page),
            )
            .await
    }

    async fn update_comment(
        &self,
        params: UpdateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let id = params.id;
        let previous = self
            .cache
            .previous_versions(id, self.inner.find_by_id(id))
            .await;
        let comment = self.inner.update_comment(params).await?;
        self.cache.updated(&previous, &comment).await;
        Ok(comment)
    }

    async fn delete_comment(&self, id: Uuid) -> Result<(), RepoError> {
        let previous = self
            .cache
            .previous_versions(id, self.inner.find_by_id(id))
            .await;
        self.inner.delete_comment(id).await?;
        self.cache.deleted(id, &previous).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::cache::codec::{decode, encode};

    fn comment(target: PostTarget) -> CommentRecord {
        CommentRecord {
            id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            target,
            body: "+1".to_string(),
            created_at: datetime!(2024-07-01 09:00:00 UTC),
            updated_at: datetime!(2024-07-01 09:00:00 UTC),
        }
    }

    #[test]
    fn target_survives_encoding() {
        let on_answer = comment(PostTarget::Answer(Uuid::new_v4()));
        let text = encode(&on_answer).expect("encode");
        assert!(text.contains("\"question_id\":null"));
        assert_eq!(decode::<CommentRecord>(&text).expect("decode"), on_answer);
    }

    #[test]
    fn two_targets_are_invalid() {
        let on_question = comment(PostTarget::Question(Uuid::new_v4()));
        let text = encode(&on_question).expect("encode");
        let doubled = text.replacen(
            "\"answer_id\":null",
            &format!("\"answer_id\":\"{}\"", Uuid::new_v4()),
            1,
        );
        assert!(matches!(
            decode::<CommentRecord>(&doubled),
            Err(CodecError::Invalid(_))
        ));
    }

    #[test]
    fn only_the_matching_target_scope_is_purged() {
        let question_id = Uuid::new_v4();
        let on_question = comment(PostTarget::Question(question_id));
        let patterns = policy().invalidation_patterns(&[&on_question]);
        assert!(patterns.contains(&format!(
            "comments:by_question:list:*|question_id={question_id}|*"
        )));
        assert!(!patterns.iter().any(|p| p.starts_with(BY_ANSWER)));
    }
}
