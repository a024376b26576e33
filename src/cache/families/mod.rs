//! Cached decorators, one per entity family.
//!
//! Each module pairs the family's codec with its invalidation policy and
//! wraps the persistent repository trait with the generic engine.

pub mod answers;
pub mod attachments;
pub mod comments;
pub mod questions;
pub mod users;

use std::sync::Arc;

use uuid::Uuid;

use crate::application::repos::{
    AnswersRepo, AttachmentsRepo, CommentsRepo, QuestionsRepo, UsersRepo,
};
use crate::domain::entities::{
    AnswerRecord, AttachmentRecord, CommentRecord, PostTarget, QuestionRecord, UserRecord,
};

use super::codec::{self, CacheEntity, CodecError};
use super::config::CacheConfig;
use super::keys::{KeyKind, ListParams, namespace_of};
use super::store::CacheStore;

pub use answers::CachedAnswersRepo;
pub use attachments::CachedAttachmentsRepo;
pub use comments::CachedCommentsRepo;
pub use questions::CachedQuestionsRepo;
pub use users::CachedUsersRepo;

/// Namespaces of every cached family.
pub const FAMILIES: [&str; 5] = [
    users::NAMESPACE,
    questions::NAMESPACE,
    answers::NAMESPACE,
    comments::NAMESPACE,
    attachments::NAMESPACE,
];

/// All five decorators over one source of truth and one store.
#[derive(Clone)]
pub struct CachedRepositories {
    pub users: Arc<CachedUsersRepo>,
    pub questions: Arc<CachedQuestionsRepo>,
    pub answers: Arc<CachedAnswersRepo>,
    pub comments: Arc<CachedCommentsRepo>,
    pub attachments: Arc<CachedAttachmentsRepo>,
}

impl CachedRepositories {
    pub fn new<S>(source: Arc<S>, store: Arc<dyn CacheStore>, config: CacheConfig) -> Self
    where
        S: UsersRepo + QuestionsRepo + AnswersRepo + CommentsRepo + AttachmentsRepo + 'static,
    {
        Self {
            users: Arc::new(CachedUsersRepo::new(
                source.clone(),
                store.clone(),
                config.clone(),
            )),
            questions: Arc::new(CachedQuestionsRepo::new(
                source.clone(),
                store.clone(),
                config.clone(),
            )),
            answers: Arc::new(CachedAnswersRepo::new(
                source.clone(),
                store.clone(),
                config.clone(),
            )),
            comments: Arc::new(CachedCommentsRepo::new(
                source.clone(),
                store.clone(),
                config.clone(),
            )),
            attachments: Arc::new(CachedAttachmentsRepo::new(source, store, config)),
        }
    }
}

/// Check a raw cache value against the codec of the family its key names.
///
/// Returns the family and key kind on success.
pub fn validate_entry(key: &str, text: &str) -> Result<(&'static str, KeyKind), CodecError> {
    let kind = KeyKind::of(key)
        .ok_or_else(|| CodecError::invalid(format!("`{key}` is not a cache key")))?;
    match namespace_of(key) {
        users::NAMESPACE => check::<UserRecord>(kind, text),
        questions::NAMESPACE => check::<QuestionRecord>(kind, text),
        answers::NAMESPACE => check::<AnswerRecord>(kind, text),
        comments::NAMESPACE => check::<CommentRecord>(kind, text),
        attachments::NAMESPACE => check::<AttachmentRecord>(kind, text),
        other => Err(CodecError::invalid(format!("unknown family `{other}`"))),
    }
}

fn check<T: CacheEntity>(
    kind: KeyKind,
    text: &str,
) -> Result<(&'static str, KeyKind), CodecError> {
    match kind {
        KeyKind::List => codec::decode_page::<T>(text).map(|_| ()),
        KeyKind::Entity | KeyKind::Index => codec::decode::<T>(text).map(|_| ()),
    }?;
    Ok((T::KIND, kind))
}

/// Rebuild a post target from its two nullable wire columns.
pub(crate) fn target_from_wire(
    question_id: Option<Uuid>,
    answer_id: Option<Uuid>,
) -> Result<PostTarget, CodecError> {
    match (question_id, answer_id) {
        (Some(id), None) if !id.is_nil() => Ok(PostTarget::Question(id)),
        (None, Some(id)) if !id.is_nil() => Ok(PostTarget::Answer(id)),
        (None, None) => Err(CodecError::invalid("target is missing")),
        (Some(_), Some(_)) => Err(CodecError::invalid("target names both a question and an answer")),
        _ => Err(CodecError::invalid("target id is nil")),
    }
}

/// List filter for pages scoped to one post.
pub(crate) fn target_filter(target: PostTarget) -> ListParams {
    match target {
        PostTarget::Question(id) => ListParams::new().with("question_id", id),
        PostTarget::Answer(id) => ListParams::new().with("answer_id", id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_columns_must_name_exactly_one_post() {
        let id = Uuid::new_v4();
        assert_eq!(
            target_from_wire(Some(id), None).expect("question"),
            PostTarget::Question(id)
        );
        assert_eq!(
            target_from_wire(None, Some(id)).expect("answer"),
            PostTarget::Answer(id)
        );
        assert!(target_from_wire(None, None).is_err());
        assert!(target_from_wire(Some(id), Some(id)).is_err());
        assert!(target_from_wire(Some(Uuid::nil()), None).is_err());
    }

    #[test]
    fn validate_entry_dispatches_on_namespace() {
        assert!(validate_entry("widgets:1", "{}").is_err());
        assert!(validate_entry("users", "{}").is_err());
        assert!(matches!(
            validate_entry("users:42", "garbage"),
            Err(CodecError::Malformed(_))
        ));
    }

    #[test]
    fn index_entry_with_list_segment_in_its_value_validates() {
        let now = time::OffsetDateTime::now_utc();
        let question = QuestionRecord {
            id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            title: "a:list:b".to_string(),
            slug: "a-list-b".to_string(),
            body: "body".to_string(),
            created_at: now,
            updated_at: now,
        };
        let text = codec::encode(&question).expect("encode");
        let key = crate::cache::keys::index_key(questions::NAMESPACE, "title", &question.title);

        assert_eq!(
            validate_entry(&key, &text).expect("valid"),
            (questions::NAMESPACE, KeyKind::Index)
        );
    }
}
