//! Cached answers.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::{PageQuery, PaginatedResult};
use crate::application::repos::{
    AnswersRepo, CreateAnswerParams, RepoError, UpdateAnswerParams,
};
use crate::cache::codec::{
    CacheEntity, CodecError, require_chronology, require_id, require_text, utc,
};
use crate::cache::config::CacheConfig;
use crate::cache::keys::ListParams;
use crate::cache::policy::InvalidationPolicy;
use crate::cache::repository::CachedRepository;
use crate::cache::store::CacheStore;
use crate::domain::entities::AnswerRecord;

pub const NAMESPACE: &str = "answers";
pub const BY_QUESTION: &str = "answers:by_question";
pub const BY_AUTHOR: &str = "answers:by_author";

#[derive(Serialize, Deserialize)]
pub struct AnswerWire {
    id: Uuid,
    question_id: Uuid,
    author_id: Uuid,
    body: String,
    accepted: bool,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
}

impl CacheEntity for AnswerRecord {
    const KIND: &'static str = NAMESPACE;
    type Wire = AnswerWire;

    fn cache_id(&self) -> String {
        self.id.to_string()
    }

    fn to_wire(&self) -> AnswerWire {
        AnswerWire {
            id: self.id,
            question_id: self.question_id,
            author_id: self.author_id,
            body: self.body.clone(),
            accepted: self.accepted,
            created_at: utc(self.created_at),
            updated_at: utc(self.updated_at),
        }
    }

    fn from_wire(wire: AnswerWire) -> Result<Self, CodecError> {
        require_id("id", wire.id)?;
        require_id("question_id", wire.question_id)?;
        require_id("author_id", wire.author_id)?;
        require_text("body", &wire.body)?;
        require_chronology(wire.created_at, wire.updated_at)?;

        Ok(AnswerRecord {
            id: wire.id,
            question_id: wire.question_id,
            author_id: wire.author_id,
            body: wire.body,
            accepted: wire.accepted,
            created_at: wire.created_at,
            updated_at: wire.updated_at,
        })
    }
}

fn answer_id(answer: &AnswerRecord) -> Option<String> {
    Some(answer.id.to_string())
}

pub fn policy() -> InvalidationPolicy<AnswerRecord> {
    InvalidationPolicy::<AnswerRecord>::new(NAMESPACE)
        .list_by(BY_QUESTION, "question_id", |answer| {
            Some(answer.question_id.to_string())
        })
        .list_by(BY_AUTHOR, "author_id", |answer| {
            Some(answer.author_id.to_string())
        })
        .list_by("comments:by_answer", "answer_id", answer_id)
        .list_by("attachments:by_answer", "answer_id", answer_id)
}

pub struct CachedAnswersRepo {
    inner: Arc<dyn AnswersRepo>,
    cache: CachedRepository<AnswerRecord>,
}

impl CachedAnswersRepo {
    pub fn new(
        inner: Arc<dyn AnswersRepo>,
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
impl AnswersRepo for CachedAnswersRepo {
    async fn create_answer(&self, params: CreateAnswerParams) -> Result<AnswerRecord, RepoError> {
        let answer = self.inner.create_answer(params).await?;
        self.cache.created(&answer).await;
        Ok(answer)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AnswerRecord>, RepoError> {
        self.cache.find_by_id(id, self.inner.find_by_id(id)).await
    }

    async fn list_answers_by_question(
        &self,
        question_id: Uuid,
        page: PageQuery,
    ) -> Result<PaginatedResult<AnswerRecord>, RepoError> {
        self.cache
            .find_page(
                BY_QUESTION,
                ListParams::new().with("question_id", question_id),
                page,
                self.inner.list_answers_by_question(question_id, page),
            )
            .await
    }

    async fn list_answers_by_author(
        &self,
        author_id: Uuid,
        page: PageQuery,
    ) -> Result<PaginatedResult<AnswerRecord>, RepoError> {
        self.cache
            .find_page(
                BY_AUTHOR,
                ListParams::new().with("author_id", author_id),
                page,
                self.inner.list_answers_by_author(author_id, page),
            )
            .await
    }

    async fn update_answer(&self, params: UpdateAnswerParams) -> Result<AnswerRecord, RepoError> {
        let id = params.id;
        let previous = self
            .cache
            .previous_versions(id, self.inner.find_by_id(id))
            .await;
        let answer = self.inner.update_answer(params).await?;
        self.cache.updated(&previous, &answer).await;
        Ok(answer)
    }

    async fn delete_answer(&self, id: Uuid) -> Result<(), RepoError> {
        let previous = self
            .cache
            .previous_versions(id, self.inner.find_by_id(id))
            .await;
        self.inner.delete_answer(id).await?;
        self.cache.deleted(id, &previous).await;
        Ok(())
    }
}
