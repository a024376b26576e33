//! Repository traits describing persistence adapters.
//!
//! Every family has exactly one trait. Persistent adapters implement it
//! against the source of truth; the cache decorators in [`crate::cache`]
//! implement the same trait so use cases cannot tell them apart.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::application::pagination::{PageQuery, PaginatedResult, PaginationError};
use crate::domain::entities::{
    AnswerRecord, AttachmentRecord, CommentRecord, PostTarget, QuestionRecord, UserRecord,
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
    #[error(transparent)]
    Pagination(#[from] PaginationError),
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn duplicate(constraint: impl Into<String>) -> Self {
        Self::Duplicate {
            constraint: constraint.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity {
            message: message.into(),
        }
    }
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub username: String,
    pub email: String,
    pub display_name: String,
}

/// Partial user update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateUserParams {
    pub id: Uuid,
    pub username: Option<String>,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError>;

    async fn list_users(&self, page: PageQuery) -> Result<PaginatedResult<UserRecord>, RepoError>;

    async fn update_user(&self, params: UpdateUserParams) -> Result<UserRecord, RepoError>;

    async fn delete_user(&self, id: Uuid) -> Result<(), RepoError>;
}

// ============================================================================
// Questions
// ============================================================================

#[derive(Debug, Clone)]
pub struct CreateQuestionParams {
    pub author_id: Uuid,
    pub title: String,
    pub body: String,
}

/// Partial question update. A new title re-derives the slug.
#[derive(Debug, Clone, Default)]
pub struct UpdateQuestionParams {
    pub id: Uuid,
    pub title: Option<String>,
    pub body: Option<String>,
}

#[async_trait]
pub trait QuestionsRepo: Send + Sync {
    async fn create_question(
        &self,
        params: CreateQuestionParams,
    ) -> Result<QuestionRecord, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<QuestionRecord>, RepoError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<QuestionRecord>, RepoError>;

    async fn find_by_title(&self, title: &str) -> Result<Option<QuestionRecord>, RepoError>;

    async fn list_questions(
        &self,
        page: PageQuery,
    ) -> Result<PaginatedResult<QuestionRecord>, RepoError>;

    async fn list_questions_by_author(
        &self,
        author_id: Uuid,
        page: PageQuery,
    ) -> Result<PaginatedResult<QuestionRecord>, RepoError>;

    async fn update_question(
        &self,
        params: UpdateQuestionParams,
    ) -> Result<QuestionRecord, RepoError>;

    async fn delete_question(&self, id: Uuid) -> Result<(), RepoError>;
}

// ============================================================================
// Answers
// ============================================================================

#[derive(Debug, Clone)]
pub struct CreateAnswerParams {
    pub question_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateAnswerParams {
    pub id: Uuid,
    pub body: Option<String>,
    pub accepted: Option<bool>,
}

#[async_trait]
pub trait AnswersRepo: Send + Sync {
    async fn create_answer(&self, params: CreateAnswerParams) -> Result<AnswerRecord, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AnswerRecord>, RepoError>;

    async fn list_answers_by_question(
        &self,
        question_id: Uuid,
        page: PageQuery,
    ) -> Result<PaginatedResult<AnswerRecord>, RepoError>;

    async fn list_answers_by_author(
        &self,
        author_id: Uuid,
        page: PageQuery,
    ) -> Result<PaginatedResult<AnswerRecord>, RepoError>;

    async fn update_answer(&self, params: UpdateAnswerParams) -> Result<AnswerRecord, RepoError>;

    async fn delete_answer(&self, id: Uuid) -> Result<(), RepoError>;
}

// ============================================================================
// Comments
// ============================================================================

#[derive(Debug, Clone)]
pub struct CreateCommentParams {
    pub author_id: Uuid,
    pub target: PostTarget,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct UpdateCommentParams {
    pub id: Uuid,
    pub body: String,
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CommentRecord>, RepoError>;

    async fn list_comments_for_target(
        &self,
        target: PostTarget,
        page: PageQuery,
    ) -> Result<PaginatedResult<CommentRecord>, RepoError>;

    async fn list_comments_by_author(
        &self,
        author_id: Uuid,
        page: PageQuery,
    ) -> Result<PaginatedResult<CommentRecord>, RepoError>;

    async fn update_comment(
        &self,
        params: UpdateCommentParams,
    ) -> Result<CommentRecord, RepoError>;

    async fn delete_comment(&self, id: Uuid) -> Result<(), RepoError>;
}

// ============================================================================
// Attachments
// ============================================================================

#[derive(Debug, Clone)]
pub struct CreateAttachmentParams {
    pub uploader_id: Uuid,
    pub target: PostTarget,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
}

/// Partial attachment update; a new target moves the attachment.
#[derive(Debug, Clone, Default)]
pub struct UpdateAttachmentParams {
    pub id: Uuid,
    pub filename: Option<String>,
    pub target: Option<PostTarget>,
}

#[async_trait]
pub trait AttachmentsRepo: Send + Sync {
    async fn create_attachment(
        &self,
        params: CreateAttachmentParams,
    ) -> Result<AttachmentRecord, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AttachmentRecord>, RepoError>;

    async fn list_attachments_for_target(
        &self,
        target: PostTarget,
        page: PageQuery,
    ) -> Result<PaginatedResult<AttachmentRecord>, RepoError>;

    async fn list_attachments_by_uploader(
        &self,
        uploader_id: Uuid,
        page: PageQuery,
    ) -> Result<PaginatedResult<AttachmentRecord>, RepoError>;

    async fn update_attachment(
        &self,
        params: UpdateAttachmentParams,
    ) -> Result<AttachmentRecord, RepoError>;

    async fn delete_attachment(&self, id: Uuid) -> Result<(), RepoError>;
}
