//! In-memory reference implementation of every persistent repository trait.
//!
//! Behaves like the relational store the cache layer fronts: unique
//! constraints raise `Duplicate`, dangling references raise `Integrity`
//! (restrict semantics, no cascades), and missing rows on update/delete
//! raise `NotFound`.

mod answers;
mod attachments;
mod comments;
mod lock;
mod questions;
mod users;

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::application::pagination::{PageQuery, PaginatedResult};
use crate::application::repos::RepoError;
use crate::domain::entities::{
    AnswerRecord, AttachmentRecord, CommentRecord, PostTarget, QuestionRecord, UserRecord,
};
use crate::domain::types::SortOrder;

use lock::{rw_read, rw_write};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, UserRecord>,
    questions: HashMap<Uuid, QuestionRecord>,
    answers: HashMap<Uuid, AnswerRecord>,
    comments: HashMap<Uuid, CommentRecord>,
    attachments: HashMap<Uuid, AttachmentRecord>,
    clock: Option<OffsetDateTime>,
}

impl Tables {
    /// Strictly increasing timestamps so listings have a stable order.
    fn tick(&mut self) -> OffsetDateTime {
        let now = OffsetDateTime::now_utc();
        let next = match self.clock {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.clock = Some(next);
        next
    }

    fn require_user(&self, id: Uuid) -> Result<(), RepoError> {
        if self.users.contains_key(&id) {
            Ok(())
        } else {
            Err(RepoError::integrity(format!("user {id} does not exist")))
        }
    }

    fn require_target(&self, target: PostTarget) -> Result<(), RepoError> {
        let exists = match target {
            PostTarget::Question(id) => self.questions.contains_key(&id),
            PostTarget::Answer(id) => self.answers.contains_key(&id),
        };
        if exists {
            Ok(())
        } else {
            Err(RepoError::integrity(format!("{target:?} does not exist")))
        }
    }

    fn post_has_children(&self, target: PostTarget) -> bool {
        self.comments.values().any(|comment| comment.target == target)
            || self
                .attachments
                .values()
                .any(|attachment| attachment.target == target)
    }
}

#[derive(Default)]
pub struct MemoryRepositories {
    tables: RwLock<Tables>,
    reads: AtomicU64,
}

impl MemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of read operations served so far (finders and listings).
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    fn read<R>(&self, op: &'static str, f: impl FnOnce(&Tables) -> R) -> R {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let tables = rw_read(&self.tables, op);
        f(&tables)
    }

    fn write<R>(&self, op: &'static str, f: impl FnOnce(&mut Tables) -> R) -> R {
        let mut tables = rw_write(&self.tables, op);
        f(&mut tables)
    }
}

/// Order rows by creation time and cut out the requested page.
fn paginate<T, I>(
    rows: I,
    page: PageQuery,
    created_at: fn(&T) -> (OffsetDateTime, Uuid),
) -> Result<PaginatedResult<T>, RepoError>
where
    T: Clone,
    I: IntoIterator<Item = T>,
{
    page.validate()?;

    let mut rows: Vec<T> = rows.into_iter().collect();
    rows.sort_by_key(created_at);
    if page.order == SortOrder::Desc {
        rows.reverse();
    }

    let total = rows.len() as u64;
    let items = rows
        .into_iter()
        .skip(page.offset())
        .take(page.page_size as usize)
        .collect();
    Ok(PaginatedResult::new(items, page, total))
}

fn require_text(field: &str, value: &str) -> Result<(), RepoError> {
    if value.trim().is_empty() {
        return Err(RepoError::invalid_input(format!("{field} must not be empty")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Row {
        id: Uuid,
        at: OffsetDateTime,
    }

    fn key(row: &Row) -> (OffsetDateTime, Uuid) {
        (row.at, row.id)
    }

    #[test]
    fn tick_is_strictly_increasing() {
        let mut tables = Tables::default();
        let first = tables.tick();
        let second = tables.tick();
        let third = tables.tick();
        assert!(first < second && second < third);
    }

    #[test]
    fn paginate_orders_and_slices() {
        let mut tables = Tables::default();
        let rows: Vec<Row> = (0..5)
            .map(|_| Row {
                id: Uuid::new_v4(),
                at: tables.tick(),
            })
            .collect();

        let newest = paginate(rows.clone(), PageQuery::new(1, 2, SortOrder::Desc), key)
            .expect("page");
        assert_eq!(newest.items, vec![rows[4].clone(), rows[3].clone()]);
        assert_eq!(newest.total_items, 5);
        assert_eq!(newest.total_pages, 3);

        let last = paginate(rows.clone(), PageQuery::new(3, 2, SortOrder::Asc), key)
            .expect("page");
        assert_eq!(last.items, vec![rows[4].clone()]);

        let beyond = paginate(rows, PageQuery::new(9, 2, SortOrder::Asc), key).expect("page");
        assert!(beyond.items.is_empty());
        assert!(beyond.is_consistent());
    }

    #[test]
    fn paginate_rejects_invalid_queries() {
        let result = paginate(Vec::<Row>::new(), PageQuery::new(0, 10, SortOrder::Asc), key);
        assert!(matches!(result, Err(RepoError::Pagination(_))));
    }
}
