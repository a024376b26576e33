use async_trait::async_trait;
use uuid::Uuid;

use crate::application::pagination::{PageQuery, PaginatedResult};
use crate::application::repos::{
    CreateQuestionParams, QuestionsRepo, RepoError, UpdateQuestionParams,
};
use crate::domain::entities::{PostTarget, QuestionRecord};
use crate::domain::slug::generate_unique_slug;

use super::{MemoryRepositories, Tables, paginate, require_text};

fn ordering(question: &QuestionRecord) -> (time::OffsetDateTime, Uuid) {
    (question.created_at, question.id)
}

fn check_title(tables: &Tables, id: Uuid, title: &str) -> Result<(), RepoError> {
    if tables
        .questions
        .values()
        .any(|question| question.id != id && question.title == title)
    {
        return Err(RepoError::duplicate("questions_title_key"));
    }
    Ok(())
}

fn unique_slug(tables: &Tables, id: Uuid, title: &str) -> Result<String, RepoError> {
    generate_unique_slug(title, |candidate| {
        !tables
            .questions
            .values()
            .any(|question| question.id != id && question.slug == candidate)
    })
    .map_err(|err| RepoError::invalid_input(err.to_string()))
}

#[async_trait]
impl QuestionsRepo for MemoryRepositories {
    async fn create_question(
        &self,
        params: CreateQuestionParams,
    ) -> Result<QuestionRecord, RepoError> {
        require_text("title", &params.title)?;

        self.write("create_question", |tables| {
            tables.require_user(params.author_id)?;
            let id = Uuid::new_v4();
            check_title(tables, id, &params.title)?;
            let slug = unique_slug(tables, id, &params.title)?;

            let now = tables.tick();
            let question = QuestionRecord {
                id,
                author_id: params.author_id,
                title: params.title,
                slug,
                body: params.body,
                created_at: now,
                updated_at: now,
            };
            tables.questions.insert(id, question.clone());
            Ok(question)
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<QuestionRecord>, RepoError> {
        Ok(self.read("find_question_by_id", |tables| {
            tables.questions.get(&id).cloned()
        }))
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<QuestionRecord>, RepoError> {
        Ok(self.read("find_question_by_slug", |tables| {
            tables
                .questions
                .values()
                .find(|question| question.slug == slug)
                .cloned()
        }))
    }

    async fn find_by_title(&self, title: &str) -> Result<Option<QuestionRecord>, RepoError> {
        Ok(self.read("find_question_by_title", |tables| {
            tables
                .questions
                .values()
                .find(|question| question.title == title)
                .cloned()
        }))
    }

    async fn list_questions(
        &self,
        page: PageQuery,
    ) -> Result<PaginatedResult<QuestionRecord>, RepoError> {
        self.read("list_questions", |tables| {
            paginate(tables.questions.values().cloned(), page, ordering)
        })
    }

    async fn list_questions_by_author(
        &self,
        author_id: Uuid,
        page: PageQuery,
    ) -> Result<PaginatedResult<QuestionRecord>, RepoError> {
        self.read("list_questions_by_author", |tables| {
            let rows = tables
                .questions
                .values()
                .filter(|question| question.author_id == author_id)
                .cloned();
            paginate(rows, page, ordering)
        })
    }

    async fn update_question(
        &self,
        params: UpdateQuestionParams,
    ) -> Result<QuestionRecord, RepoError> {
        if let Some(title) = params.title.as_deref() {
            require_text("title", title)?;
        }

        self.write("update_question", |tables| {
            let mut updated = tables
                .questions
                .get(&params.id)
                .cloned()
                .ok_or(RepoError::NotFound)?;

            if let Some(title) = params.title
                && title != updated.title
            {
                check_title(tables, updated.id, &title)?;
                updated.slug = unique_slug(tables, updated.id, &title)?;
                updated.title = title;
            }
            if let Some(body) = params.body {
                updated.body = body;
            }

            updated.updated_at = tables.tick();
            tables.questions.insert(updated.id, updated.clone());
            Ok(updated)
        })
    }

    async fn delete_question(&self, id: Uuid) -> Result<(), RepoError> {
        self.write("delete_question", |tables| {
            if !tables.questions.contains_key(&id) {
                return Err(RepoError::NotFound);
            }
            let has_answers = tables
                .answers
                .values()
                .any(|answer| answer.question_id == id);
            if has_answers || tables.post_has_children(PostTarget::Question(id)) {
                return Err(RepoError::integrity(format!(
                    "question {id} still has answers, comments, or attachments"
                )));
            }
            tables.questions.remove(&id);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::repos::{CreateUserParams, UsersRepo};
    use crate::domain::types::SortOrder;

    async fn author(repo: &MemoryRepositories) -> Uuid {
        repo.create_user(CreateUserParams {
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            display_name: "Ada".to_string(),
        })
        .await
        .expect("user")
        .id
    }

    fn ask(author_id: Uuid, title: &str) -> CreateQuestionParams {
        CreateQuestionParams {
            author_id,
            title: title.to_string(),
            body: "How?".to_string(),
        }
    }

    #[tokio::test]
    async fn slugs_follow_titles() {
        let repo = MemoryRepositories::new();
        let author_id = author(&repo).await;
        let question = repo
            .create_question(ask(author_id, "Intro to X"))
            .await
            .expect("create");
        assert_eq!(question.slug, "intro-to-x");

        let renamed = repo
            .update_question(UpdateQuestionParams {
                id: question.id,
                title: Some("Intro to Y".to_string()),
                body: None,
            })
            .await
            .expect("update");
        assert_eq!(renamed.slug, "intro-to-y");
        assert!(repo.find_by_slug("intro-to-x").await.expect("slug").is_none());
    }

    #[tokio::test]
    async fn colliding_slugs_get_suffixes() {
        let repo = MemoryRepositories::new();
        let author_id = author(&repo).await;
        repo.create_question(ask(author_id, "Intro to X"))
            .await
            .expect("first");
        let second = repo
            .create_question(ask(author_id, "Intro to X!"))
            .await
            .expect("second");
        assert_eq!(second.slug, "intro-to-x-2");
    }

    #[tokio::test]
    async fn duplicate_titles_and_unknown_authors_are_rejected() {
        let repo = MemoryRepositories::new();
        let author_id = author(&repo).await;
        repo.create_question(ask(author_id, "Intro to X"))
            .await
            .expect("first");

        assert!(matches!(
            repo.create_question(ask(author_id, "Intro to X")).await,
            Err(RepoError::Duplicate { .. })
        ));
        assert!(matches!(
            repo.create_question(ask(Uuid::new_v4(), "Orphan")).await,
            Err(RepoError::Integrity { .. })
        ));
    }

    #[tokio::test]
    async fn listing_by_author_filters_and_orders() {
        let repo = MemoryRepositories::new();
        let author_id = author(&repo).await;
        let first = repo
            .create_question(ask(author_id, "First"))
            .await
            .expect("first");
        let second = repo
            .create_question(ask(author_id, "Second"))
            .await
            .expect("second");

        let page = repo
            .list_questions_by_author(author_id, PageQuery::new(1, 10, SortOrder::Asc))
            .await
            .expect("list");
        assert_eq!(page.items, vec![first, second]);

        let none = repo
            .list_questions_by_author(Uuid::new_v4(), PageQuery::default())
            .await
            .expect("list");
        assert_eq!(none.total_items, 0);
    }
}
