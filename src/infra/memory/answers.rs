use async_trait::async_trait;
use uuid::Uuid;

use crate::application::pagination::{PageQuery, PaginatedResult};
use crate::application::repos::{AnswersRepo, CreateAnswerParams, RepoError, UpdateAnswerParams};
use crate::domain::entities::{AnswerRecord, PostTarget};

use super::{MemoryRepositories, paginate, require_text};

fn ordering(answer: &AnswerRecord) -> (time::OffsetDateTime, Uuid) {
    (answer.created_at, answer.id)
}

#[async_trait]
impl AnswersRepo for MemoryRepositories {
    async fn create_answer(&self, params: CreateAnswerParams) -> Result<AnswerRecord, RepoError> {
        require_text("body", &params.body)?;

        self.write("create_answer", |tables| {
            tables.require_user(params.author_id)?;
            tables.require_target(PostTarget::Question(params.question_id))?;

            let now = tables.tick();
            let answer = AnswerRecord {
                id: Uuid::new_v4(),
                question_id: params.question_id,
                author_id: params.author_id,
                body: params.body,
                accepted: false,
                created_at: now,
                updated_at: now,
            };
            tables.answers.insert(answer.id, answer.clone());
            Ok(answer)
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AnswerRecord>, RepoError> {
        Ok(self.read("find_answer_by_id", |tables| {
            tables.answers.get(&id).cloned()
        }))
    }

    async fn list_answers_by_question(
        &self,
        question_id: Uuid,
        page: PageQuery,
    ) -> Result<PaginatedResult<AnswerRecord>, RepoError> {
        self.read("list_answers_by_question", |tables| {
            let rows = tables
                .answers
                .values()
                .filter(|answer| answer.question_id == question_id)
                .cloned();
            paginate(rows, page, ordering)
        })
    }

    async fn list_answers_by_author(
        &self,
        author_id: Uuid,
        page: PageQuery,
    ) -> Result<PaginatedResult<AnswerRecord>, RepoError> {
        self.read("list_answers_by_author", |tables| {
            let rows = tables
                .answers
                .values()
                .filter(|answer| answer.author_id == author_id)
                .cloned();
            paginate(rows, page, ordering)
        })
    }

    async fn update_answer(&self, params: UpdateAnswerParams) -> Result<AnswerRecord, RepoError> {
        if let Some(body) = params.body.as_deref() {
            require_text("body", body)?;
        }

        self.write("update_answer", |tables| {
            let mut updated = tables
                .answers
                .get(&params.id)
                .cloned()
                .ok_or(RepoError::NotFound)?;

            if let Some(body) = params.body {
                updated.body = body;
            }
            if let Some(accepted) = params.accepted {
                updated.accepted = accepted;
            }

            updated.updated_at = tables.tick();
            tables.answers.insert(updated.id, updated.clone());
            Ok(updated)
        })
    }

    async fn delete_answer(&self, id: Uuid) -> Result<(), RepoError> {
        self.write("delete_answer", |tables| {
            if !tables.answers.contains_key(&id) {
                return Err(RepoError::NotFound);
            }
            if tables.post_has_children(PostTarget::Answer(id)) {
                return Err(RepoError::integrity(format!(
                    "answer {id} still has comments or attachments"
                )));
            }
            tables.answers.remove(&id);
            Ok(())
        })
    }
}
