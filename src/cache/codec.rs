//! Entity codecs for cache-stored text.
//!
//! Every cached value is a JSON envelope:
//!
//! ```json
//! {"kind": "questions", "v": 1, "data": { ... }}
//! ```
//!
//! The cache is untrusted storage. Decoding never panics: unparsable text, a
//! foreign kind, an older format version, or a payload that fails the
//! entity's validation all come back as [`CodecError`], which callers treat
//! as a miss.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use time::{OffsetDateTime, UtcOffset};
use uuid::Uuid;

use crate::application::pagination::{PaginatedResult, total_pages};
use crate::domain::types::SortOrder;

/// Bump whenever any wire struct changes shape.
pub const CACHE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode cache payload: {0}")]
    Encode(String),
    #[error("malformed cache payload: {0}")]
    Malformed(String),
    #[error("cache payload kind `{found}` does not match `{expected}`")]
    KindMismatch { expected: String, found: String },
    #[error("cache payload version {found} does not match {expected}")]
    Version { expected: u32, found: u32 },
    #[error("cache payload failed validation: {0}")]
    Invalid(String),
}

impl CodecError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

/// A domain record the cache layer knows how to store.
///
/// Implementations live next to their family's invalidation policy so the
/// wire shape and its validation change together.
pub trait CacheEntity: Clone + PartialEq + Send + Sync + 'static {
    /// Namespace of the family, also used as the envelope kind.
    const KIND: &'static str;

    /// Serialized shape of the record.
    type Wire: Serialize + DeserializeOwned;

    /// Primary identifier rendered into the entity key.
    fn cache_id(&self) -> String;

    fn to_wire(&self) -> Self::Wire;

    /// Rebuild the record, rejecting payloads that violate its invariants.
    fn from_wire(wire: Self::Wire) -> Result<Self, CodecError>;
}

#[derive(Serialize)]
struct EnvelopeRef<'a, D> {
    kind: &'a str,
    v: u32,
    data: D,
}

#[derive(Deserialize)]
struct Envelope {
    kind: String,
    v: u32,
    data: serde_json::Value,
}

#[derive(Serialize, Deserialize)]
struct PageWire<W> {
    items: Vec<W>,
    page: u32,
    page_size: u32,
    total_items: u64,
    total_pages: u64,
    order: SortOrder,
}

pub fn encode<T: CacheEntity>(entity: &T) -> Result<String, CodecError> {
    wrap(T::KIND, entity.to_wire())
}

pub fn decode<T: CacheEntity>(text: &str) -> Result<T, CodecError> {
    let wire: T::Wire = unwrap(T::KIND, text)?;
    T::from_wire(wire)
}

pub fn encode_page<T: CacheEntity>(page: &PaginatedResult<T>) -> Result<String, CodecError> {
    let wire = PageWire {
        items: page.items.iter().map(CacheEntity::to_wire).collect(),
        page: page.page,
        page_size: page.page_size,
        total_items: page.total_items,
        total_pages: page.total_pages,
        order: page.order,
    };
    wrap(&page_kind::<T>(), wire)
}

pub fn decode_page<T: CacheEntity>(text: &str) -> Result<PaginatedResult<T>, CodecError> {
    let wire: PageWire<T::Wire> = unwrap(&page_kind::<T>(), text)?;

    if wire.items.len() > wire.page_size as usize {
        return Err(CodecError::invalid(format!(
            "page holds {} items but page_size is {}",
            wire.items.len(),
            wire.page_size
        )));
    }
    let expected_pages = total_pages(wire.total_items, wire.page_size);
    if wire.total_pages != expected_pages {
        return Err(CodecError::invalid(format!(
            "total_pages {} disagrees with computed {expected_pages}",
            wire.total_pages
        )));
    }

    let items = wire
        .items
        .into_iter()
        .map(T::from_wire)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PaginatedResult {
        items,
        page: wire.page,
        page_size: wire.page_size,
        total_items: wire.total_items,
        total_pages: wire.total_pages,
        order: wire.order,
    })
}

fn page_kind<T: CacheEntity>() -> String {
    format!("{}.page", T::KIND)
}

fn wrap<D: Serialize>(kind: &str, data: D) -> Result<String, CodecError> {
    let envelope = EnvelopeRef {
        kind,
        v: CACHE_FORMAT_VERSION,
        data,
    };
    serde_json::to_string(&envelope).map_err(|err| CodecError::Encode(err.to_string()))
}

fn unwrap<D: DeserializeOwned>(kind: &str, text: &str) -> Result<D, CodecError> {
    let envelope: Envelope =
        serde_json::from_str(text).map_err(|err| CodecError::Malformed(err.to_string()))?;
    if envelope.kind != kind {
        return Err(CodecError::KindMismatch {
            expected: kind.to_string(),
            found: envelope.kind,
        });
    }
    if envelope.v != CACHE_FORMAT_VERSION {
        return Err(CodecError::Version {
            expected: CACHE_FORMAT_VERSION,
            found: envelope.v,
        });
    }
    serde_json::from_value(envelope.data).map_err(|err| CodecError::Malformed(err.to_string()))
}

// ============================================================================
// Validation helpers shared by the family codecs
// ============================================================================

/// Normalise a timestamp to UTC so its RFC 3339 text sorts chronologically.
pub(crate) fn utc(value: OffsetDateTime) -> OffsetDateTime {
    value.to_offset(UtcOffset::UTC)
}

pub(crate) fn require_id(field: &'static str, id: Uuid) -> Result<(), CodecError> {
    if id.is_nil() {
        return Err(CodecError::invalid(format!("{field} is nil")));
    }
    Ok(())
}

pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), CodecError> {
    if value.trim().is_empty() {
        return Err(CodecError::invalid(format!("{field} is empty")));
    }
    Ok(())
}

pub(crate) fn require_chronology(
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
) -> Result<(), CodecError> {
    if updated_at < created_at {
        return Err(CodecError::invalid("updated_at precedes created_at"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::pagination::PageQuery;

    #[derive(Debug, Clone, PartialEq)]
    struct Note {
        id: Uuid,
        text: String,
    }

    #[derive(Serialize, Deserialize)]
    struct NoteWire {
        id: Uuid,
        text: String,
    }

    impl CacheEntity for Note {
        const KIND: &'static str = "notes";
        type Wire = NoteWire;

        fn cache_id(&self) -> String {
            self.id.to_string()
        }

        fn to_wire(&self) -> NoteWire {
            NoteWire {
                id: self.id,
                text: self.text.clone(),
            }
        }

        fn from_wire(wire: NoteWire) -> Result<Self, CodecError> {
            require_id("id", wire.id)?;
            require_text("text", &wire.text)?;
            Ok(Note {
                id: wire.id,
                text: wire.text,
            })
        }
    }

    fn note(text: &str) -> Note {
        Note {
            id: Uuid::new_v4(),
            text: text.to_string(),
        }
    }

    #[test]
    fn entity_survives_encoding() {
        let original = note("hello");
        let text = encode(&original).expect("encode");
        assert!(text.starts_with(r#"{"kind":"notes","v":1,"#));
        assert_eq!(decode::<Note>(&text).expect("decode"), original);
    }

    #[test]
    fn garbage_is_malformed_not_a_panic() {
        for text in ["", "not json", "{\"kind\":\"notes\"}", "[]", "null"] {
            assert!(
                matches!(decode::<Note>(text), Err(CodecError::Malformed(_))),
                "expected malformed for {text:?}"
            );
        }
    }

    #[test]
    fn schema_drift_is_rejected() {
        let id = Uuid::new_v4();
        let renamed = format!(r#"{{"kind":"notes","v":1,"data":{{"id":"{id}","body":"x"}}}}"#);
        assert!(matches!(
            decode::<Note>(&renamed),
            Err(CodecError::Malformed(_))
        ));

        let mistyped = format!(r#"{{"kind":"notes","v":1,"data":{{"id":"{id}","text":7}}}}"#);
        assert!(matches!(
            decode::<Note>(&mistyped),
            Err(CodecError::Malformed(_))
        ));
    }

    #[test]
    fn kind_and_version_are_checked() {
        let text = encode(&note("x")).expect("encode");

        let foreign = text.replacen("\"notes\"", "\"users\"", 1);
        assert!(matches!(
            decode::<Note>(&foreign),
            Err(CodecError::KindMismatch { .. })
        ));

        let stale = text.replacen("\"v\":1", "\"v\":0", 1);
        assert!(matches!(
            decode::<Note>(&stale),
            Err(CodecError::Version {
                expected: 1,
                found: 0
            })
        ));
    }

    #[test]
    fn validation_failures_are_invalid() {
        let text = r#"{"kind":"notes","v":1,"data":{"id":"00000000-0000-0000-0000-000000000000","text":"x"}}"#;
        assert!(matches!(decode::<Note>(text), Err(CodecError::Invalid(_))));
    }

    #[test]
    fn page_survives_encoding() {
        let page = PaginatedResult::new(
            vec![note("a"), note("b")],
            PageQuery::new(1, 10, SortOrder::Desc),
            2,
        );
        let text = encode_page(&page).expect("encode");
        assert_eq!(decode_page::<Note>(&text).expect("decode"), page);
    }

    #[test]
    fn page_invariants_are_enforced() {
        let mut page =
            PaginatedResult::new(vec![note("a")], PageQuery::new(1, 10, SortOrder::Asc), 1);
        page.total_pages = 3;
        let text = encode_page(&page).expect("encode");
        assert!(matches!(
            decode_page::<Note>(&text),
            Err(CodecError::Invalid(_))
        ));

        let mut oversized =
            PaginatedResult::new(vec![note("a")], PageQuery::new(1, 10, SortOrder::Asc), 2);
        oversized.items.push(note("b"));
        oversized.page_size = 1;
        oversized.total_pages = 2;
        let text = encode_page(&oversized).expect("encode");
        assert!(matches!(
            decode_page::<Note>(&text),
            Err(CodecError::Invalid(_))
        ));
    }

    #[test]
    fn entity_payload_is_not_a_page() {
        let text = encode(&note("a")).expect("encode");
        assert!(matches!(
            decode_page::<Note>(&text),
            Err(CodecError::KindMismatch { .. })
        ));
    }
}
