use async_trait::async_trait;
use uuid::Uuid;

use crate::application::pagination::{PageQuery, PaginatedResult};
use crate::application::repos::{
    CommentsRepo, CreateCommentParams, RepoError, UpdateCommentParams,
};
use crate::domain::entities::{CommentRecord, PostTarget};

use super::{MemoryRepositories, paginate, require_text};

fn ordering(comment: &CommentRecord) -> (time::OffsetDateTime, Uuid) {
    (comment.created_at, comment.id)
}

#[async_trait]
impl CommentsRepo for MemoryRepositories {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        require_text("body", &params.body)?;

        self.write("create_comment", |tables| {
            tables.require_user(params.author_id)?;
            tables.require_target(params.target)?;

            let now = tables.tick();
            let comment = CommentRecord {
                id: Uuid::new_v4(),
                author_id: params.author_id,
                target: params.target,
                body: params.body,
                created_at: now,
                updated_at: now,
            };
            tables.comments.insert(comment.id, comment.clone());
            Ok(comment)
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CommentRecord>, RepoError> {
        Ok(self.read("find_comment_by_id", |tables| {
            tables.comments.get(&id).cloned()
        }))
    }

    async fn list_comments_for_target(
        &self,
        target: PostTarget,
        page: PageQuery,
    ) -> Result<PaginatedResult<CommentRecord>, RepoError> {
        self.read("list_comments_for_target", |tables| {
            let rows = tables
                .comments
                .values()
                .filter(|comment| comment.target == target)
                .cloned();
            paginate(rows, page, ordering)
        })
    }

    async fn list_comments_by_author(
        &self,
        author_id: Uuid,
        page: PageQuery,
    ) -> Result<PaginatedResult<CommentRecord>, RepoError> {
        self.read("list_comments_by_author", |tables| {
            let rows = tables
                .comments
                .values()
                .filter(|comment| comment.author_id == author_id)
                .cloned();
            paginate(rows, page, ordering)
        })
    }

    async fn update_comment(
        &self,
        params: UpdateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        require_text("body", &params.body)?;

        self.write("update_comment", |tables| {
            let mut updated = tables
                .comments
                .get(&params.id)
                .cloned()
                .ok_or(RepoError::NotFound)?;

            updated.body = params.body;
            updated.updated_at = tables.tick();
            tables.comments.insert(updated.id, updated.clone());
            Ok(updated)
        })
    }

    async fn delete_comment(&self, id: Uuid) -> Result<(), RepoError> {
        self.write("delete_comment", |tables| {
            tables
                .comments
                .remove(&id)
                .map(|_| ())
                .ok_or(RepoError::NotFound)
        })
    }
}
