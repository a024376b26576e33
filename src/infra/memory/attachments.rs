use async_trait::async_trait;
use uuid::Uuid;

use crate::application::pagination::{PageQuery, PaginatedResult};
use crate::application::repos::{
    AttachmentsRepo, CreateAttachmentParams, RepoError, UpdateAttachmentParams,
};
use crate::domain::entities::{AttachmentRecord, PostTarget};

use super::{MemoryRepositories, paginate, require_text};

fn ordering(attachment: &AttachmentRecord) -> (time::OffsetDateTime, Uuid) {
    (attachment.created_at, attachment.id)
}

#[async_trait]
impl AttachmentsRepo for MemoryRepositories {
    async fn create_attachment(
        &self,
        params: CreateAttachmentParams,
    ) -> Result<AttachmentRecord, RepoError> {
        require_text("filename", &params.filename)?;
        require_text("content_type", &params.content_type)?;
        if params.size_bytes < 0 {
            return Err(RepoError::invalid_input("size_bytes must not be negative"));
        }

        self.write("create_attachment", |tables| {
            tables.require_user(params.uploader_id)?;
            tables.require_target(params.target)?;

            let attachment = AttachmentRecord {
                id: Uuid::new_v4(),
                uploader_id: params.uploader_id,
                target: params.target,
                filename: params.filename,
                content_type: params.content_type,
                size_bytes: params.size_bytes,
                created_at: tables.tick(),
            };
            tables.attachments.insert(attachment.id, attachment.clone());
            Ok(attachment)
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AttachmentRecord>, RepoError> {
        Ok(self.read("find_attachment_by_id", |tables| {
            tables.attachments.get(&id).cloned()
        }))
    }

    async fn list_attachments_for_target(
        &self,
        target: PostTarget,
        page: PageQuery,
    ) -> Result<PaginatedResult<AttachmentRecord>, RepoError> {
        self.read("list_attachments_for_target", |tables| {
            let rows = tables
                .attachments
                .values()
                .filter(|attachment| attachment.target == target)
                .cloned();
            paginate(rows, page, ordering)
        })
    }

    async fn list_attachments_by_uploader(
        &self,
        uploader_id: Uuid,
        page: PageQuery,
    ) -> Result<PaginatedResult<AttachmentRecord>, RepoError> {
        self.read("list_attachments_by_uploader", |tables| {
            let rows = tables
                .attachments
                .values()
                .filter(|attachment| attachment.uploader_id == uploader_id)
                .cloned();
            paginate(rows, page, ordering)
        })
    }

    async fn update_attachment(
        &self,
        params: UpdateAttachmentParams,
    ) -> Result<AttachmentRecord, RepoError> {
        if let Some(filename) = params.filename.as_deref() {
            require_text("filename", filename)?;
        }

        self.write("update_attachment", |tables| {
            let mut updated = tables
                .attachments
                .get(&params.id)
                .cloned()
                .ok_or(RepoError::NotFound)?;

            if let Some(target) = params.target {
                tables.require_target(target)?;
                updated.target = target;
            }
            if let Some(filename) = params.filename {
                updated.filename = filename;
            }

            tables.attachments.insert(updated.id, updated.clone());
            Ok(updated)
        })
    }

    async fn delete_attachment(&self, id: Uuid) -> Result<(), RepoError> {
        self.write("delete_attachment", |tables| {
            tables
                .attachments
                .remove(&id)
                .map(|_| ())
                .ok_or(RepoError::NotFound)
        })
    }
}
