//! Invalidation policy tables.
//!
//! Each entity family declares, once, which secondary indexes it maintains
//! and which list scopes an entity version belongs to. Create, update, and
//! delete all derive their key sets from the same table, so they cannot
//! drift apart.

use std::collections::BTreeSet;

use super::keys::{index_key, list_pattern, list_scope_pattern};

/// Index name reserved for list keys.
const RESERVED_INDEX: &str = "list";

/// A unique, non-id attribute the family can be looked up by.
pub struct IndexRule<T> {
    pub name: &'static str,
    pub value: fn(&T) -> String,
}

/// Filter parameter a list scope is keyed by.
pub struct ListFilter<T> {
    pub param: &'static str,
    pub value: fn(&T) -> Option<String>,
}

/// A list scope whose cached pages may contain entities of this family.
///
/// Without a filter every page in the scope is purged on mutation. With a
/// filter only pages whose `param` equals the entity's value are purged.
pub struct ListRule<T> {
    pub scope: &'static str,
    pub filter: Option<ListFilter<T>>,
}

pub struct InvalidationPolicy<T> {
    namespace: &'static str,
    indexes: Vec<IndexRule<T>>,
    lists: Vec<ListRule<T>>,
}

impl<T> InvalidationPolicy<T> {
    pub fn new(namespace: &'static str) -> Self {
        Self {
            namespace,
            indexes: Vec::new(),
            lists: Vec::new(),
        }
    }

    /// Maintain a secondary index keyed by `value(entity)`.
    pub fn index(mut self, name: &'static str, value: fn(&T) -> String) -> Self {
        assert_ne!(name, RESERVED_INDEX, "`list` is reserved for list keys");
        self.indexes.push(IndexRule { name, value });
        self
    }

    /// Purge every cached page of `scope` on any mutation.
    pub fn list_all(mut self, scope: &'static str) -> Self {
        self.lists.push(ListRule {
            scope,
            filter: None,
        });
        self
    }

    /// Purge the pages of `scope` filtered on `param = value(entity)`.
    pub fn list_by(
        mut self,
        scope: &'static str,
        param: &'static str,
        value: fn(&T) -> Option<String>,
    ) -> Self {
        self.lists.push(ListRule {
            scope,
            filter: Some(ListFilter { param, value }),
        });
        self
    }

    pub fn namespace(&self) -> &'static str {
        self.namespace
    }

    pub fn index_rule(&self, name: &str) -> Option<&IndexRule<T>> {
        self.indexes.iter().find(|rule| rule.name == name)
    }

    /// Index keys derived from the entity's current attribute values.
    pub fn index_keys(&self, entity: &T) -> Vec<String> {
        self.indexes
            .iter()
            .map(|rule| index_key(self.namespace, rule.name, &(rule.value)(entity)))
            .collect()
    }

    /// Index keys held by earlier versions that `current` no longer owns.
    pub fn retired_index_keys(&self, previous: &[&T], current: Option<&T>) -> Vec<String> {
        let live: BTreeSet<String> = current
            .map(|entity| self.index_keys(entity).into_iter().collect())
            .unwrap_or_default();
        let retired: BTreeSet<String> = previous
            .iter()
            .flat_map(|entity| self.index_keys(entity))
            .filter(|key| !live.contains(key))
            .collect();
        retired.into_iter().collect()
    }

    /// List patterns to purge when any of `versions` is created, changed, or
    /// removed. Patterns are de-duplicated and sorted.
    pub fn invalidation_patterns(&self, versions: &[&T]) -> Vec<String> {
        let mut patterns = BTreeSet::new();
        for rule in &self.lists {
            match &rule.filter {
                None => {
                    patterns.insert(list_scope_pattern(rule.scope));
                }
                Some(filter) => {
                    for entity in versions {
                        if let Some(value) = (filter.value)(entity) {
                            patterns.insert(list_pattern(rule.scope, filter.param, &value));
                        }
                    }
                }
            }
        }
        patterns.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct Post {
        id: u32,
        slug: &'static str,
        author: u32,
        thread: Option<u32>,
    }

    fn policy() -> InvalidationPolicy<Post> {
        InvalidationPolicy::<Post>::new("posts")
            .index("slug", |post| post.slug.to_string())
            .list_all("posts")
            .list_by("posts:by_author", "author_id", |post| {
                Some(post.author.to_string())
            })
            .list_by("replies:by_post", "post_id", |post| Some(post.id.to_string()))
            .list_by("posts:by_thread", "thread_id", |post| {
                post.thread.map(|id| id.to_string())
            })
    }

    fn post(slug: &'static str, author: u32) -> Post {
        Post {
            id: 1,
            slug,
            author,
            thread: None,
        }
    }

    #[test]
    fn index_keys_follow_current_values() {
        assert_eq!(
            policy().index_keys(&post("hello", 7)),
            vec!["posts:slug:hello".to_string()]
        );
    }

    #[test]
    fn retired_keys_exclude_unchanged_indexes() {
        let policy = policy();
        let before = post("hello", 7);
        let unchanged = post("hello", 8);
        let renamed = post("goodbye", 7);

        assert!(
            policy
                .retired_index_keys(&[&before], Some(&unchanged))
                .is_empty()
        );
        assert_eq!(
            policy.retired_index_keys(&[&before], Some(&renamed)),
            vec!["posts:slug:hello".to_string()]
        );
        assert_eq!(
            policy.retired_index_keys(&[&before], None),
            vec!["posts:slug:hello".to_string()]
        );
    }

    #[test]
    fn patterns_cover_old_and_new_grouping_values() {
        let policy = policy();
        let before = post("hello", 7);
        let after = post("hello", 9);

        assert_eq!(
            policy.invalidation_patterns(&[&before, &after]),
            vec![
                "posts:by_author:list:*|author_id=7|*".to_string(),
                "posts:by_author:list:*|author_id=9|*".to_string(),
                "posts:list:*".to_string(),
                "replies:by_post:list:*|post_id=1|*".to_string(),
            ]
        );
    }

    #[test]
    fn absent_grouping_values_are_skipped() {
        let mut threaded = post("hello", 7);
        threaded.thread = Some(3);
        let patterns = policy().invalidation_patterns(&[&threaded]);
        assert!(patterns.contains(&"posts:by_thread:list:*|thread_id=3|*".to_string()));

        let patterns = policy().invalidation_patterns(&[&post("hello", 7)]);
        assert!(!patterns.iter().any(|p| p.starts_with("posts:by_thread")));
    }

    #[test]
    #[should_panic(expected = "reserved")]
    fn list_is_not_a_valid_index_name() {
        let _ = InvalidationPolicy::<Post>::new("posts").index("list", |p| p.slug.to_string());
    }
}
