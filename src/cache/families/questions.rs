//! Cached questions.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::{PageQuery, PaginatedResult};
use crate::application::repos::{
    CreateQuestionParams, QuestionsRepo, RepoError, UpdateQuestionParams,
};
use crate::cache::codec::{
    CacheEntity, CodecError, require_chronology, require_id, require_text, utc,
};
use crate::cache::config::CacheConfig;
use crate::cache::keys::ListParams;
use crate::cache::policy::InvalidationPolicy;
use crate::cache::repository::CachedRepository;
use crate::cache::store::CacheStore;
use crate::domain::entities::QuestionRecord;

pub const NAMESPACE: &str = "questions";
pub const BY_AUTHOR: &str = "questions:by_author";
pub const TITLE_INDEX: &str = "title";
pub const SLUG_INDEX: &str = "slug";

#[derive(Serialize, Deserialize)]
pub struct QuestionWire {
    id: Uuid,
    author_id: Uuid,
    title: String,
    slug: String,
    body: String,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
}

impl CacheEntity for QuestionRecord {
    const KIND: &'static str = NAMESPACE;
    type Wire = QuestionWire;

    fn cache_id(&self) -> String {
        self.id.to_string()
    }

    fn to_wire(&self) -> QuestionWire {
        QuestionWire {
            id: self.id,
            author_id: self.author_id,
            title: self.title.clone(),
            slug: self.slug.clone(),
            body: self.body.clone(),
            created_at: utc(self.created_at),
            updated_at: utc(self.updated_at),
        }
    }

    fn from_wire(wire: QuestionWire) -> Result<Self, CodecError> {
        require_id("id", wire.id)?;
        require_id("author_id", wire.author_id)?;
        require_text("title", &wire.title)?;
        require_text("slug", &wire.slug)?;
        require_chronology(wire.created_at, wire.updated_at)?;

        Ok(QuestionRecord {
            id: wire.id,
            author_id: wire.author_id,
            title: wire.title,
            slug: wire.slug,
            body: wire.body,
            created_at: wire.created_at,
            updated_at: wire.updated_at,
        })
    }
}

fn question_id(question: &QuestionRecord) -> Option<String> {
    Some(question.id.to_string())
}

/// Questions own the title and slug indexes. Pages of answers, comments,
/// and attachments filtered by question are purged with the question.
pub fn policy() -> InvalidationPolicy<QuestionRecord> {
    InvalidationPolicy::<QuestionRecord>::new(NAMESPACE)
        .index(TITLE_INDEX, |question| question.title.clone())
        .index(SLUG_INDEX, |question| question.slug.clone())
        .list_all(NAMESPACE)
        .list_by(BY_AUTHOR, "author_id", |question| {
            Some(question.author_id.to_string())
        })
        .list_by("answers:by_question", "question_id", question_id)
        .list_by("comments:by_question", "question_id", question_id)
        .list_by("attachments:by_question", "question_id", question_id)
}

pub struct CachedQuestionsRepo {
    inner: Arc<dyn QuestionsRepo>,
    cache: CachedRepository<QuestionRecord>,
}

impl CachedQuestionsRepo {
    pub fn new(
        inner: Arc<dyn QuestionsRepo>,
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
impl QuestionsRepo for CachedQuestionsRepo {
    async fn create_question(
        &self,
        params: CreateQuestionParams,
    ) -> Result<QuestionRecord, RepoError> {
        let question = self.inner.create_question(params).await?;
        self.cache.created(&question).await;
        Ok(question)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<QuestionRecord>, RepoError> {
        self.cache.find_by_id(id, self.inner.find_by_id(id)).await
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<QuestionRecord>, RepoError> {
        self.cache
            .find_by_index(SLUG_INDEX, slug, self.inner.find_by_slug(slug))
            .await
    }

    async fn find_by_title(&self, title: &str) -> Result<Option<QuestionRecord>, RepoError> {
        self.cache
            .find_by_index(TITLE_INDEX, title, self.inner.find_by_title(title))
            .await
    }

    async fn list_questions(
        &self,
        page: PageQuery,
    ) -> Result<PaginatedResult<QuestionRecord>, RepoError> {
        self.cache
            .find_page(
                NAMESPACE,
                ListParams::new(),
                page,
                self.inner.list_questions(page),
            )
            .await
    }

    async fn list_questions_by_author(
        &self,
        author_id: Uuid,
        page: PageQuery,
    ) -> Result<PaginatedResult<QuestionRecord>, RepoError> {
        self.cache
            .find_page(
                BY_AUTHOR,
                ListParams::new().with("author_id", author_id),
                page,
                self.inner.list_questions_by_author(author_id, page),
            )
            .await
    }

    async fn update_question(
        &self,
        params: UpdateQuestionParams,
    ) -> Result<QuestionRecord, RepoError> {
        let id = params.id;
        let previous = self
            .cache
            .previous_versions(id, self.inner.find_by_id(id))
            .await;
        let question = self.inner.update_question(params).await?;
        self.cache.updated(&previous, &question).await;
        Ok(question)
    }

    async fn delete_question(&self, id: Uuid) -> Result<(), RepoError> {
        let previous = self
            .cache
            .previous_versions(id, self.inner.find_by_id(id))
            .await;
        self.inner.delete_question(id).await?;
        self.cache.deleted(id, &previous).await;
        Ok(())
    }
}
