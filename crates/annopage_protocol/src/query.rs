//! History-tip queries for the current annotation page.

use crate::document::{DocumentFormat, ANNOTATION_PAGE_TYPE};
use serde_json::{json, Map, Value};

/// Query key of the boolean "has a next version" flag.
pub const HISTORY_NEXT_EXISTS_KEY: &str = "historyNextExists";

/// Query key of RERUM's history successor list.
pub const RERUM_HISTORY_NEXT_KEY: &str = "__rerum.history.next";

/// How a store expresses "this document has not been superseded".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryTip {
    /// `{"historyNextExists": false}`.
    #[default]
    NextExistsFlag,
    /// `{"__rerum.history.next": {"$exists": true, "$size": 0}}`.
    RerumHistory,
}

impl HistoryTip {
    /// The query key this predicate is written under.
    pub fn key(&self) -> &'static str {
        match self {
            HistoryTip::NextExistsFlag => HISTORY_NEXT_EXISTS_KEY,
            HistoryTip::RerumHistory => RERUM_HISTORY_NEXT_KEY,
        }
    }

    /// The predicate value selecting history tips.
    pub fn predicate(&self) -> Value {
        match self {
            HistoryTip::NextExistsFlag => Value::Bool(false),
            HistoryTip::RerumHistory => json!({"$exists": true, "$size": 0}),
        }
    }
}

/// A query selecting the current page of one canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct PageQuery {
    canvas_id: String,
    canvas_field: String,
    tip: HistoryTip,
}

impl PageQuery {
    /// Creates a query for `canvas_id` laid out per `format`.
    pub fn new(canvas_id: impl Into<String>, format: &DocumentFormat, tip: HistoryTip) -> Self {
        Self {
            canvas_id: canvas_id.into(),
            canvas_field: format.canvas_field.clone(),
            tip,
        }
    }

    /// Returns the canvas id being queried.
    pub fn canvas_id(&self) -> &str {
        &self.canvas_id
    }

    /// Builds the JSON query body.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert(self.tip.key().into(), self.tip.predicate());
        map.insert(
            self.canvas_field.clone(),
            Value::String(self.canvas_id.clone()),
        );
        map.insert("type".into(), Value::String(ANNOTATION_PAGE_TYPE.into()));
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_query_body() {
        let query = PageQuery::new("C1", &DocumentFormat::new(), HistoryTip::NextExistsFlag);
        assert_eq!(
            query.to_json(),
            json!({"historyNextExists": false, "target": "C1", "type": "AnnotationPage"})
        );
    }

    #[test]
    fn rerum_query_body() {
        let format = DocumentFormat::rerum().with_canvas_field("forCanvas");
        let query = PageQuery::new("C2", &format, HistoryTip::RerumHistory);
        assert_eq!(query.canvas_id(), "C2");
        assert_eq!(
            query.to_json(),
            json!({
                "__rerum.history.next": {"$exists": true, "$size": 0},
                "forCanvas": "C2",
                "type": "AnnotationPage"
            })
        );
    }
}
