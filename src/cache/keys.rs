//! Cache key scheme.
//!
//! Keys are plain strings so any key/value backend can hold them:
//!
//! - entity: `{prefix}:{id}`
//! - index:  `{prefix}:{index}:{value}`
//! - list:   `{prefix}:list:|{name}={value}|{name}={value}|`
//!
//! List parameters are sorted by name, so the same parameter set always maps
//! to the same key. The parameter section is framed by the delimiter on both
//! ends, which lets a single glob match one `name=value` pair at any position.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::Display;

use crate::application::pagination::PageQuery;

/// Segment separating a list scope from its parameters.
pub const LIST_SEGMENT: &str = "list";
/// Separator between list parameters.
pub const PARAM_DELIMITER: char = '|';

/// Discriminates the three key shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    Entity,
    Index,
    List,
}

impl KeyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            KeyKind::Entity => "entity",
            KeyKind::Index => "index",
            KeyKind::List => "list",
        }
    }

    /// Classify a key produced by this module.
    pub fn of(key: &str) -> Option<Self> {
        let (namespace, rest) = key.split_once(':')?;
        if namespace.is_empty() || rest.is_empty() {
            None
        } else if is_list_key(key) {
            Some(KeyKind::List)
        } else if rest.contains(':') {
            Some(KeyKind::Index)
        } else {
            Some(KeyKind::Entity)
        }
    }
}

/// A list key has the list segment right after its scope (`ns` or
/// `ns:scope`) and a delimiter-framed parameter section. Index values may
/// contain `:list:` anywhere else.
fn is_list_key(key: &str) -> bool {
    let marker = format!(":{LIST_SEGMENT}:");
    let Some(at) = key.find(&marker) else {
        return false;
    };
    let scope = &key[..at];
    let params = &key[at + marker.len()..];
    scope.matches(':').count() <= 1
        && params.starts_with(PARAM_DELIMITER)
        && params.ends_with(PARAM_DELIMITER)
}

/// Namespace (first segment) of a key, e.g. `questions`.
pub fn namespace_of(key: &str) -> &str {
    key.split_once(':').map_or(key, |(namespace, _)| namespace)
}

/// Named parameters of a list query, kept sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    params: BTreeMap<String, String>,
}

impl ListParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters describing one page: `page`, `page_size`, and `order`.
    pub fn for_page(page: PageQuery) -> Self {
        Self::new().paged(page)
    }

    /// Add the page parameters to an existing filter.
    pub fn paged(self, page: PageQuery) -> Self {
        self.with("page", page.page)
            .with("page_size", page.page_size)
            .with("order", page.order.as_str())
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Display) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Display) {
        self.params.insert(name.into(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for ListParams
where
    K: Into<String>,
    V: Display,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (name, value) in iter {
            params.insert(name, value);
        }
        params
    }
}

pub fn entity_key(prefix: &str, id: impl Display) -> String {
    format!("{prefix}:{id}")
}

pub fn index_key(prefix: &str, index_name: &str, value: &str) -> String {
    format!("{prefix}:{index_name}:{value}")
}

pub fn list_key(prefix: &str, params: &ListParams) -> String {
    let mut key = format!("{prefix}:{LIST_SEGMENT}:{PARAM_DELIMITER}");
    for (name, value) in params.iter() {
        key.push_str(name);
        key.push('=');
        key.push_str(&escape_value(value));
        key.push(PARAM_DELIMITER);
    }
    key
}

/// Glob matching every list key of `prefix` that filtered on `name = value`,
/// whatever the other parameters are.
pub fn list_pattern(prefix: &str, param_name: &str, param_value: &str) -> String {
    format!(
        "{}:{LIST_SEGMENT}:*{PARAM_DELIMITER}{}={}{PARAM_DELIMITER}*",
        escape_glob(prefix),
        escape_glob(param_name),
        escape_glob(&escape_value(param_value)),
    )
}

/// Glob matching every list key of `prefix`.
pub fn list_scope_pattern(prefix: &str) -> String {
    format!("{}:{LIST_SEGMENT}:*", escape_glob(prefix))
}

/// Glob matching every key in a namespace, whatever its kind.
pub fn namespace_pattern(namespace: &str) -> String {
    format!("{}:*", escape_glob(namespace))
}

fn escape_value(value: &str) -> Cow<'_, str> {
    if !value.contains(['%', PARAM_DELIMITER]) {
        return Cow::Borrowed(value);
    }
    let mut escaped = String::with_capacity(value.len() + 4);
    for ch in value.chars() {
        match ch {
            '%' => escaped.push_str("%25"),
            PARAM_DELIMITER => escaped.push_str("%7C"),
            other => escaped.push(other),
        }
    }
    Cow::Owned(escaped)
}

fn escape_glob(text: &str) -> Cow<'_, str> {
    const SPECIAL: [char; 7] = ['*', '?', '[', ']', '\\', '{', '}'];
    if !text.contains(SPECIAL) {
        return Cow::Borrowed(text);
    }
    let mut escaped = String::with_capacity(text.len() + 4);
    for ch in text.chars() {
        if SPECIAL.contains(&ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    Cow::Owned(escaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::SortOrder;

    #[test]
    fn entity_and_index_keys() {
        assert_eq!(entity_key("questions", "42"), "questions:42");
        assert_eq!(
            index_key("questions", "title", "Intro to X"),
            "questions:title:Intro to X"
        );
    }

    #[test]
    fn list_key_ignores_parameter_insertion_order() {
        let forward: ListParams = [("page", "1"), ("pageSize", "10"), ("order", "desc")]
            .into_iter()
            .collect();
        let backward: ListParams = [("order", "desc"), ("pageSize", "10"), ("page", "1")]
            .into_iter()
            .collect();

        assert_eq!(list_key("questions", &forward), list_key("questions", &backward));
        assert_eq!(
            list_key("questions", &forward),
            "questions:list:|order=desc|page=1|pageSize=10|"
        );
    }

    #[test]
    fn for_page_matches_manual_params() {
        let page = PageQuery::new(2, 25, SortOrder::Asc);
        let manual = ListParams::new()
            .with("order", "asc")
            .with("page_size", 25)
            .with("page", 2);
        assert_eq!(ListParams::for_page(page), manual);
    }

    #[test]
    fn delimiter_in_value_cannot_forge_a_pair() {
        let params = ListParams::new().with("author_id", "a|page=9");
        let key = list_key("questions:by_author", &params);
        assert_eq!(key, "questions:by_author:list:|author_id=a%7Cpage=9|");
    }

    #[test]
    fn list_pattern_shape() {
        assert_eq!(
            list_pattern("answers:by_question", "question_id", "q1"),
            "answers:by_question:list:*|question_id=q1|*"
        );
        assert_eq!(list_scope_pattern("questions"), "questions:list:*");
        assert_eq!(namespace_pattern("users"), "users:*");
    }

    #[test]
    fn list_pattern_escapes_glob_metacharacters() {
        assert_eq!(
            list_pattern("tags", "name", "c*[x]"),
            "tags:list:*|name=c\\*\\[x\\]|*"
        );
    }

    #[test]
    fn key_kind_classification() {
        assert_eq!(KeyKind::of("questions:42"), Some(KeyKind::Entity));
        assert_eq!(KeyKind::of("questions:slug:intro"), Some(KeyKind::Index));
        assert_eq!(KeyKind::of("questions:list:|page=1|"), Some(KeyKind::List));
        assert_eq!(
            KeyKind::of("answers:by_question:list:|page=1|"),
            Some(KeyKind::List)
        );
        assert_eq!(KeyKind::of("questions"), None);
        assert_eq!(KeyKind::of("questions:"), None);
        assert_eq!(KeyKind::of("questions:list:|"), Some(KeyKind::List));
        assert_eq!(namespace_of("answers:by_question:list:|"), "answers");
    }

    #[test]
    fn index_values_containing_the_list_segment_stay_index_keys() {
        let key = index_key("questions", "title", "a:list:b");
        assert_eq!(KeyKind::of(&key), Some(KeyKind::Index));
        let key = index_key("users", "username", "x:list:|y|");
        assert_eq!(KeyKind::of(&key), Some(KeyKind::Index));
        let key = list_key("questions", &ListParams::new().with("title", "a:list:b"));
        assert_eq!(KeyKind::of(&key), Some(KeyKind::List));
    }
}
