//! Annotation documents and identifier normalization.
//!
//! Stores disagree on whether a document's identifier lives under `id` or
//! `@id`. Every document entering this crate is normalized once into a
//! canonical [`DocumentId`]; both keys are stripped from the remaining
//! fields and the preferred key is written back on encode.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Type discriminator of an annotation page.
pub const ANNOTATION_PAGE_TYPE: &str = "AnnotationPage";

/// JSON-LD context of the W3C Web Annotation model.
pub const WEB_ANNOTATION_CONTEXT: &str = "http://www.w3.org/ns/anno.jsonld";

const TYPE_KEY: &str = "type";
const ITEMS_KEY: &str = "items";
const CREATOR_KEY: &str = "creator";
const CONTEXT_KEY: &str = "@context";

/// A store-assigned document identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Creates a document id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the last non-empty path segment of the id.
    ///
    /// `https://store.example/v1/id/abc` yields `abc`; ids without a `/`
    /// are returned whole.
    pub fn slug(&self) -> &str {
        self.0
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(self.0.as_str())
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for DocumentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Which key carries a document's identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdConvention {
    /// Plain `id` (Web Annotation / IIIF Presentation 3).
    #[default]
    Plain,
    /// JSON-LD `@id` (RERUM and IIIF Presentation 2).
    JsonLd,
}

impl IdConvention {
    /// The key this convention writes.
    pub fn field(&self) -> &'static str {
        match self {
            IdConvention::Plain => "id",
            IdConvention::JsonLd => "@id",
        }
    }

    /// The key accepted as a fallback when reading.
    pub fn alternate(&self) -> &'static str {
        match self {
            IdConvention::Plain => "@id",
            IdConvention::JsonLd => "id",
        }
    }

    /// Parses a convention from its key name.
    pub fn from_field(field: &str) -> Option<Self> {
        match field {
            "id" => Some(IdConvention::Plain),
            "@id" => Some(IdConvention::JsonLd),
            _ => None,
        }
    }

    /// Reads the identifier from a JSON object without modifying it.
    ///
    /// The preferred key wins over the alternate one. Empty strings and
    /// non-string values are not identifiers.
    pub fn resolve(&self, map: &Map<String, Value>) -> Option<DocumentId> {
        [self.field(), self.alternate()]
            .into_iter()
            .filter_map(|key| map.get(key).and_then(Value::as_str))
            .find(|id| !id.is_empty())
            .map(DocumentId::new)
    }

    /// Removes both identifier keys from `map`, returning the canonical id.
    fn take(&self, map: &mut Map<String, Value>) -> Option<DocumentId> {
        let id = self.resolve(map);
        map.remove(self.field());
        map.remove(self.alternate());
        id
    }
}

/// A single Web Annotation.
///
/// Apart from the identifier the body is opaque: every other field is kept
/// verbatim and written back unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    id: Option<DocumentId>,
    fields: Map<String, Value>,
}

impl Annotation {
    /// Creates an unpersisted annotation from its fields.
    ///
    /// Identifier keys present in `fields` are normalized with the plain
    /// convention; use [`Annotation::from_json`] to choose another.
    pub fn new(fields: Map<String, Value>) -> Self {
        let mut fields = fields;
        let id = IdConvention::Plain.take(&mut fields);
        Self { id, fields }
    }

    /// Decodes an annotation, normalizing its identifier.
    pub fn from_json(value: Value, convention: IdConvention) -> ProtocolResult<Self> {
        match value {
            Value::Object(mut fields) => {
                let id = convention.take(&mut fields);
                Ok(Self { id, fields })
            }
            _ => Err(ProtocolError::NotAnObject("annotation")),
        }
    }

    /// Encodes the annotation with its id under the convention's key.
    pub fn to_json(&self, convention: IdConvention) -> Value {
        let mut map = self.fields.clone();
        if let Some(ref id) = self.id {
            map.insert(convention.field().into(), Value::String(id.to_string()));
        }
        Value::Object(map)
    }

    /// Returns the store-assigned id, if persisted.
    pub fn id(&self) -> Option<&DocumentId> {
        self.id.as_ref()
    }

    /// Returns true if the annotation carries a store-assigned id.
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Returns true if this annotation's id equals `id`.
    pub fn matches(&self, id: &DocumentId) -> bool {
        self.id.as_ref() == Some(id)
    }

    /// Returns the body fields (identifier excluded).
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Returns a single body field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Returns a copy with the given id.
    pub fn with_id(mut self, id: impl Into<DocumentId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Returns a copy with `key` set to `value`.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }
}

/// The collection of annotations attached to one canvas.
///
/// Pages are values: every mutation helper returns a new page and leaves
/// `self` untouched, so a page handed out to a caller can never be altered
/// behind its back.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationPage {
    id: Option<DocumentId>,
    target: String,
    items: Vec<Annotation>,
    creator: Option<String>,
    extra: Map<String, Value>,
}

impl AnnotationPage {
    /// Creates an empty, unpersisted page for a canvas.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            id: None,
            target: target.into(),
            items: Vec::new(),
            creator: None,
            extra: Map::new(),
        }
    }

    /// Returns the store-assigned id, if persisted.
    pub fn id(&self) -> Option<&DocumentId> {
        self.id.as_ref()
    }

    /// Returns the canvas this page annotates.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns the annotations in store order.
    pub fn items(&self) -> &[Annotation] {
        &self.items
    }

    /// Returns the provenance tag, if any.
    pub fn creator(&self) -> Option<&str> {
        self.creator.as_deref()
    }

    /// Returns fields the page model does not interpret (e.g. `@context`).
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Returns true if the page carries a store-assigned id.
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Number of annotations.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the page holds no annotations.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Finds the first annotation with the given id.
    pub fn find(&self, id: &DocumentId) -> Option<&Annotation> {
        self.items.iter().find(|item| item.matches(id))
    }

    /// Returns the index of the first annotation with the given id.
    pub fn position(&self, id: &DocumentId) -> Option<usize> {
        self.items.iter().position(|item| item.matches(id))
    }

    /// Returns a copy with `annotation` appended.
    pub fn with_item_appended(&self, annotation: Annotation) -> Self {
        let mut page = self.clone();
        page.items.push(annotation);
        page
    }

    /// Returns a copy with the item at `index` replaced.
    ///
    /// An out-of-range index yields an unchanged copy.
    pub fn with_item_replaced(&self, index: usize, annotation: Annotation) -> Self {
        let mut page = self.clone();
        if let Some(slot) = page.items.get_mut(index) {
            *slot = annotation;
        }
        page
    }

    /// Returns a copy without the item at `index`; the other items keep their order.
    pub fn with_item_removed(&self, index: usize) -> Self {
        let mut page = self.clone();
        if index < page.items.len() {
            page.items.remove(index);
        }
        page
    }

    /// Returns a copy with the given provenance tag.
    pub fn with_creator(&self, creator: impl Into<String>) -> Self {
        let mut page = self.clone();
        page.creator = Some(creator.into());
        page
    }

    /// Returns a copy with the given id.
    pub fn with_id(&self, id: impl Into<DocumentId>) -> Self {
        let mut page = self.clone();
        page.id = Some(id.into());
        page
    }
}

/// How pages and annotations are laid out on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFormat {
    /// Identifier key convention.
    pub id_convention: IdConvention,
    /// Key holding the canvas id on a page (`target` or `forCanvas`).
    pub canvas_field: String,
    /// JSON-LD context stamped on freshly created pages.
    pub context: Option<String>,
}

impl DocumentFormat {
    /// Plain `id`, `target`, no context.
    pub fn new() -> Self {
        Self {
            id_convention: IdConvention::Plain,
            canvas_field: "target".into(),
            context: None,
        }
    }

    /// RERUM conventions: `@id`, `target`, Web Annotation context.
    pub fn rerum() -> Self {
        Self {
            id_convention: IdConvention::JsonLd,
            canvas_field: "target".into(),
            context: Some(WEB_ANNOTATION_CONTEXT.into()),
        }
    }

    /// Sets the identifier convention.
    pub fn with_id_convention(mut self, convention: IdConvention) -> Self {
        self.id_convention = convention;
        self
    }

    /// Sets the canvas field name.
    pub fn with_canvas_field(mut self, field: impl Into<String>) -> Self {
        self.canvas_field = field.into();
        self
    }

    /// Sets the JSON-LD context of new pages.
    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context;
        self
    }

    /// Builds the unpersisted stub used when a canvas has no stored page.
    pub fn empty_page(&self, canvas_id: &str) -> AnnotationPage {
        let mut page = AnnotationPage::new(canvas_id);
        if let Some(ref context) = self.context {
            page.extra
                .insert(CONTEXT_KEY.into(), Value::String(context.clone()));
        }
        page
    }

    /// Decodes an annotation.
    pub fn decode_annotation(&self, value: Value) -> ProtocolResult<Annotation> {
        Annotation::from_json(value, self.id_convention)
    }

    /// Encodes an annotation.
    pub fn encode_annotation(&self, annotation: &Annotation) -> Value {
        annotation.to_json(self.id_convention)
    }

    /// Decodes a page, normalizing the page id and every item id.
    pub fn decode_page(&self, value: Value) -> ProtocolResult<AnnotationPage> {
        let mut map = match value {
            Value::Object(map) => map,
            _ => return Err(ProtocolError::NotAnObject("annotation page")),
        };

        match map.remove(TYPE_KEY) {
            None => {}
            Some(Value::String(ref t)) if t == ANNOTATION_PAGE_TYPE => {}
            Some(other) => {
                return Err(ProtocolError::UnexpectedType {
                    expected: ANNOTATION_PAGE_TYPE,
                    found: match other {
                        Value::String(s) => s,
                        v => v.to_string(),
                    },
                })
            }
        }

        let id = self.id_convention.take(&mut map);

        let target = match map.remove(&self.canvas_field) {
            Some(Value::String(target)) => target,
            Some(_) => {
                return Err(ProtocolError::invalid_field(
                    self.canvas_field.as_str(),
                    "expected a canvas id string",
                ))
            }
            None => return Err(ProtocolError::MissingField(self.canvas_field.clone())),
        };

        let items = match map.remove(ITEMS_KEY) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(values)) => values
                .into_iter()
                .map(|v| self.decode_annotation(v))
                .collect::<ProtocolResult<Vec<_>>>()?,
            Some(_) => return Err(ProtocolError::invalid_field(ITEMS_KEY, "expected an array")),
        };

        let creator = match map.remove(CREATOR_KEY) {
            Some(Value::String(creator)) => Some(creator),
            Some(other) => {
                // Structured creators (agents) are kept as opaque fields.
                map.insert(CREATOR_KEY.into(), other);
                None
            }
            None => None,
        };

        Ok(AnnotationPage {
            id,
            target,
            items,
            creator,
            extra: map,
        })
    }

    /// Encodes a page with ids under the convention's key.
    pub fn encode_page(&self, page: &AnnotationPage) -> Value {
        let mut map = page.extra.clone();
        if let Some(ref id) = page.id {
            map.insert(
                self.id_convention.field().into(),
                Value::String(id.to_string()),
            );
        }
        map.insert(TYPE_KEY.into(), Value::String(ANNOTATION_PAGE_TYPE.into()));
        map.insert(self.canvas_field.clone(), Value::String(page.target.clone()));
        map.insert(
            ITEMS_KEY.into(),
            Value::Array(
                page.items
                    .iter()
                    .map(|item| self.encode_annotation(item))
                    .collect(),
            ),
        );
        if let Some(ref creator) = page.creator {
            map.insert(CREATOR_KEY.into(), Value::String(creator.clone()));
        }
        Value::Object(map)
    }
}

impl Default for DocumentFormat {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn anno(value: Value) -> Annotation {
        Annotation::from_json(value, IdConvention::Plain).unwrap()
    }

    #[test]
    fn slug_extraction() {
        assert_eq!(DocumentId::new("https://store.example/v1/id/abc").slug(), "abc");
        assert_eq!(DocumentId::new("https://store.example/v1/id/abc/").slug(), "abc");
        assert_eq!(DocumentId::new("abc").slug(), "abc");
    }

    #[test]
    fn id_resolution_prefers_convention() {
        let map = json!({"id": "plain", "@id": "jsonld"});
        let map = map.as_object().unwrap();
        assert_eq!(
            IdConvention::Plain.resolve(map),
            Some(DocumentId::new("plain"))
        );
        assert_eq!(
            IdConvention::JsonLd.resolve(map),
            Some(DocumentId::new("jsonld"))
        );
    }

    #[test]
    fn id_resolution_falls_back_to_alternate() {
        let map = json!({"@id": "jsonld"});
        assert_eq!(
            IdConvention::Plain.resolve(map.as_object().unwrap()),
            Some(DocumentId::new("jsonld"))
        );

        let map = json!({"id": "", "@id": 5});
        assert_eq!(IdConvention::Plain.resolve(map.as_object().unwrap()), None);
    }

    #[test]
    fn annotation_rejects_non_objects() {
        assert!(matches!(
            Annotation::from_json(Value::Null, IdConvention::Plain),
            Err(ProtocolError::NotAnObject(_))
        ));
        assert!(Annotation::from_json(json!([1, 2]), IdConvention::Plain).is_err());
    }

    #[test]
    fn annotation_writes_preferred_key() {
        let a = Annotation::from_json(json!({"id": "A1", "body": "x"}), IdConvention::Plain)
            .unwrap();
        let encoded = a.to_json(IdConvention::JsonLd);
        assert_eq!(encoded, json!({"@id": "A1", "body": "x"}));
    }

    #[test]
    fn unpersisted_annotation_has_no_id_key() {
        let a = anno(json!({"text": "hello"}));
        assert!(!a.is_persisted());
        assert_eq!(a.to_json(IdConvention::Plain), json!({"text": "hello"}));
    }

    #[test]
    fn page_decode_normalizes_items() {
        let format = DocumentFormat::new();
        let page = format
            .decode_page(json!({
                "@id": "P1",
                "type": "AnnotationPage",
                "target": "C1",
                "@context": WEB_ANNOTATION_CONTEXT,
                "items": [{"@id": "A1", "text": "one"}, {"id": "A2", "text": "two"}],
                "creator": "tester"
            }))
            .unwrap();

        assert_eq!(page.id(), Some(&DocumentId::new("P1")));
        assert_eq!(page.target(), "C1");
        assert_eq!(page.len(), 2);
        assert_eq!(page.items()[0].id(), Some(&DocumentId::new("A1")));
        assert_eq!(page.items()[1].id(), Some(&DocumentId::new("A2")));
        assert_eq!(page.creator(), Some("tester"));
        assert_eq!(
            page.extra().get("@context"),
            Some(&json!(WEB_ANNOTATION_CONTEXT))
        );
    }

    #[test]
    fn page_decode_rejects_wrong_type() {
        let format = DocumentFormat::new();
        let err = format
            .decode_page(json!({"type": "Annotation", "target": "C1"}))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::UnexpectedType { .. }));
    }

    #[test]
    fn page_decode_requires_canvas_field() {
        let format = DocumentFormat::new().with_canvas_field("forCanvas");
        let err = format
            .decode_page(json!({"type": "AnnotationPage", "target": "C1"}))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::MissingField(ref f) if f == "forCanvas"));

        let page = format
            .decode_page(json!({"type": "AnnotationPage", "forCanvas": "C1"}))
            .unwrap();
        assert_eq!(page.target(), "C1");
        assert!(page.is_empty());
    }

    #[test]
    fn page_encode_uses_format() {
        let format = DocumentFormat::rerum();
        let page = format
            .empty_page("C1")
            .with_item_appended(anno(json!({"id": "A1"})))
            .with_id("P1");

        let encoded = format.encode_page(&page);
        assert_eq!(
            encoded,
            json!({
                "@context": WEB_ANNOTATION_CONTEXT,
                "@id": "P1",
                "type": "AnnotationPage",
                "target": "C1",
                "items": [{"@id": "A1"}]
            })
        );
    }

    #[test]
    fn page_helpers_do_not_alias() {
        let page = AnnotationPage::new("C1")
            .with_item_appended(anno(json!({"id": "A1"})))
            .with_item_appended(anno(json!({"id": "A2"})))
            .with_item_appended(anno(json!({"id": "A3"})));

        let removed = page.with_item_removed(1);
        assert_eq!(page.len(), 3);
        assert_eq!(removed.len(), 2);
        assert_eq!(removed.items()[0].id(), Some(&DocumentId::new("A1")));
        assert_eq!(removed.items()[1].id(), Some(&DocumentId::new("A3")));

        let replaced = page.with_item_replaced(0, anno(json!({"id": "B1"})));
        assert_eq!(replaced.items()[0].id(), Some(&DocumentId::new("B1")));
        assert_eq!(page.items()[0].id(), Some(&DocumentId::new("A1")));

        assert_eq!(page.with_item_removed(7), page);
    }

    #[test]
    fn find_returns_first_match() {
        let page = AnnotationPage::new("C1")
            .with_item_appended(anno(json!({"id": "A1", "n": 1})))
            .with_item_appended(anno(json!({"id": "A1", "n": 2})));
        let id = DocumentId::new("A1");
        assert_eq!(page.position(&id), Some(0));
        assert_eq!(page.find(&id).unwrap().get("n"), Some(&json!(1)));
    }

    proptest! {
        #[test]
        fn normalization_is_stable(
            id in "[a-zA-Z0-9:/._-]{1,40}",
            use_at in any::<bool>(),
            preferred_at in any::<bool>(),
        ) {
            let key = if use_at { "@id" } else { "id" };
            let convention = if preferred_at { IdConvention::JsonLd } else { IdConvention::Plain };
            let mut map = Map::new();
            map.insert(key.into(), Value::String(id.clone()));
            map.insert("body".into(), json!("text"));

            let a = Annotation::from_json(Value::Object(map), convention).unwrap();
            prop_assert_eq!(a.id().map(DocumentId::as_str), Some(id.as_str()));
            prop_assert!(!a.fields().contains_key("id"));
            prop_assert!(!a.fields().contains_key("@id"));

            let again = Annotation::from_json(a.to_json(convention), convention).unwrap();
            prop_assert_eq!(again, a);
        }
    }
}
