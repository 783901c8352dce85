// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Payload filter grammar: a conjunction of predicates evaluated against a
//! chunk payload. Keys resolve against the fixed payload fields first, then
//! against the free-form metadata object.

use serde_json::Value;

use memoria_core::types::tag_key;

use crate::payload::{ts_to_str, ChunkPayload};

/// A single predicate over one payload key.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Exact equality. Strings compare case-sensitively except for `tags`.
    Equals { key: String, value: Value },
    /// Membership in a fixed set.
    InSet { key: String, values: Vec<Value> },
    /// Inclusive range over numeric or RFC 3339 time fields.
    Range {
        key: String,
        gte: Option<Value>,
        lte: Option<Value>,
    },
    /// Array field contains every listed element (tags compare folded).
    ContainsAll { key: String, values: Vec<String> },
    /// Array field contains at least one listed element.
    ContainsAny { key: String, values: Vec<String> },
    /// Key is present (and not JSON null).
    Exists { key: String },
}

/// Conjunction of predicates. An empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct PayloadFilter {
    predicates: Vec<Predicate>,
}

impl PayloadFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn equals(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.predicates.push(Predicate::Equals {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn in_set(mut self, key: impl Into<String>, values: Vec<Value>) -> Self {
        self.predicates.push(Predicate::InSet {
            key: key.into(),
            values,
        });
        self
    }

    pub fn range(
        mut self,
        key: impl Into<String>,
        gte: Option<Value>,
        lte: Option<Value>,
    ) -> Self {
        self.predicates.push(Predicate::Range {
            key: key.into(),
            gte,
            lte,
        });
        self
    }

    pub fn contains_all(mut self, key: impl Into<String>, values: Vec<String>) -> Self {
        self.predicates.push(Predicate::ContainsAll {
            key: key.into(),
            values,
        });
        self
    }

    pub fn contains_any(mut self, key: impl Into<String>, values: Vec<String>) -> Self {
        self.predicates.push(Predicate::ContainsAny {
            key: key.into(),
            values,
        });
        self
    }

    pub fn exists(mut self, key: impl Into<String>) -> Self {
        self.predicates.push(Predicate::Exists { key: key.into() });
        self
    }

    /// Whether the payload satisfies every predicate.
    pub fn matches(&self, payload: &ChunkPayload) -> bool {
        self.predicates.iter().all(|p| eval(p, payload))
    }
}

/// Resolve a filter key to a JSON value. Fixed payload fields shadow
/// metadata keys of the same name.
fn lookup(payload: &ChunkPayload, key: &str) -> Option<Value> {
    match key {
        "memory_id" => Some(Value::String(payload.memory_id.to_string())),
        "chunk_index" => Some(Value::from(payload.chunk_index)),
        "chunk_count" => Some(Value::from(payload.chunk_count)),
        "content" => Some(Value::String(payload.content.clone())),
        "tags" => Some(Value::Array(
            payload.tags.iter().cloned().map(Value::String).collect(),
        )),
        "importance" => Some(Value::from(payload.importance)),
        "category" => Some(Value::String(payload.category.as_str().to_string())),
        "created_at" => Some(Value::String(ts_to_str(&payload.created_at))),
        "updated_at" => Some(Value::String(ts_to_str(&payload.updated_at))),
        "last_accessed_at" => Some(Value::String(ts_to_str(&payload.last_accessed_at))),
        "access_count" => Some(Value::from(payload.access_count)),
        other => payload.metadata.get(other).cloned(),
    }
}

fn eval(predicate: &Predicate, payload: &ChunkPayload) -> bool {
    match predicate {
        Predicate::Equals { key, value } => match lookup(payload, key) {
            Some(actual) if key == "tags" => array_contains_folded(&actual, value),
            Some(actual) => &actual == value,
            None => false,
        },
        Predicate::InSet { key, values } => match lookup(payload, key) {
            Some(actual) => values.iter().any(|v| v == &actual),
            None => false,
        },
        Predicate::Range { key, gte, lte } => match lookup(payload, key) {
            Some(actual) => {
                gte.as_ref().is_none_or(|min| cmp_ge(&actual, min))
                    && lte.as_ref().is_none_or(|max| cmp_ge(max, &actual))
            }
            None => false,
        },
        Predicate::ContainsAll { key, values } => match lookup(payload, key) {
            Some(actual) => values
                .iter()
                .all(|v| array_contains_folded(&actual, &Value::String(v.clone()))),
            None => false,
        },
        Predicate::ContainsAny { key, values } => match lookup(payload, key) {
            Some(actual) => values
                .iter()
                .any(|v| array_contains_folded(&actual, &Value::String(v.clone()))),
            None => false,
        },
        Predicate::Exists { key } => {
            matches!(lookup(payload, key), Some(v) if !v.is_null())
        }
    }
}

/// `a >= b` for numbers, or lexicographically for strings (RFC 3339
/// timestamps sort correctly as strings).
fn cmp_ge(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x >= y,
        _ => match (a.as_str(), b.as_str()) {
            (Some(x), Some(y)) => x >= y,
            _ => false,
        },
    }
}

/// Array membership with case-insensitive matching for string elements,
/// matching the tag comparison semantics.
fn array_contains_folded(array: &Value, needle: &Value) -> bool {
    let Some(items) = array.as_array() else {
        return false;
    };
    items.iter().any(|item| match (item.as_str(), needle.as_str()) {
        (Some(a), Some(b)) => tag_key(a) == tag_key(b),
        _ => item == needle,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use memoria_core::types::{MemoryCategory, Metadata};
    use serde_json::json;
    use uuid::Uuid;

    fn payload() -> ChunkPayload {
        let mut metadata = Metadata::new();
        metadata.insert("project".into(), json!("memoria"));
        metadata.insert("priority".into(), json!(3));
        ChunkPayload {
            memory_id: Uuid::new_v4(),
            chunk_index: 0,
            chunk_count: 1,
            content: "Deploy runs the release script".into(),
            tags: vec!["Deploy".into(), "ops".into()],
            importance: 0.7,
            category: MemoryCategory::Procedural,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_accessed_at: Utc::now(),
            access_count: 4,
            metadata,
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(PayloadFilter::new().matches(&payload()));
    }

    #[test]
    fn equals_on_fixed_field() {
        assert!(PayloadFilter::new()
            .equals("category", "procedural")
            .matches(&payload()));
        assert!(!PayloadFilter::new()
            .equals("category", "episodic")
            .matches(&payload()));
    }

    #[test]
    fn equals_on_metadata_key() {
        assert!(PayloadFilter::new()
            .equals("project", "memoria")
            .matches(&payload()));
        assert!(!PayloadFilter::new()
            .equals("project", "other")
            .matches(&payload()));
        assert!(!PayloadFilter::new()
            .equals("client", "acme")
            .matches(&payload()));
    }

    #[test]
    fn equals_on_tags_folds_case() {
        assert!(PayloadFilter::new().equals("tags", "deploy").matches(&payload()));
    }

    #[test]
    fn in_set_matches_membership() {
        assert!(PayloadFilter::new()
            .in_set("category", vec![json!("semantic"), json!("procedural")])
            .matches(&payload()));
        assert!(!PayloadFilter::new()
            .in_set("category", vec![json!("semantic")])
            .matches(&payload()));
    }

    #[test]
    fn numeric_range() {
        assert!(PayloadFilter::new()
            .range("importance", Some(json!(0.5)), Some(json!(0.9)))
            .matches(&payload()));
        assert!(!PayloadFilter::new()
            .range("importance", Some(json!(0.8)), None)
            .matches(&payload()));
        assert!(!PayloadFilter::new()
            .range("importance", None, Some(json!(0.5)))
            .matches(&payload()));
    }

    #[test]
    fn time_range_compares_rfc3339_strings() {
        let p = payload();
        let before = ts_to_str(&(p.created_at - chrono::Duration::hours(1)));
        let after = ts_to_str(&(p.created_at + chrono::Duration::hours(1)));
        assert!(PayloadFilter::new()
            .range("created_at", Some(json!(before)), Some(json!(after.clone())))
            .matches(&p));
        assert!(!PayloadFilter::new()
            .range("created_at", Some(json!(after)), None)
            .matches(&p));
    }

    #[test]
    fn contains_all_and_any_on_tags() {
        let p = payload();
        assert!(PayloadFilter::new()
            .contains_all("tags", vec!["deploy".into(), "OPS".into()])
            .matches(&p));
        assert!(!PayloadFilter::new()
            .contains_all("tags", vec!["deploy".into(), "db".into()])
            .matches(&p));
        assert!(PayloadFilter::new()
            .contains_any("tags", vec!["db".into(), "ops".into()])
            .matches(&p));
        assert!(!PayloadFilter::new()
            .contains_any("tags", vec!["db".into(), "net".into()])
            .matches(&p));
    }

    #[test]
    fn exists_checks_presence() {
        let p = payload();
        assert!(PayloadFilter::new().exists("project").matches(&p));
        assert!(PayloadFilter::new().exists("importance").matches(&p));
        assert!(!PayloadFilter::new().exists("client").matches(&p));
    }

    #[test]
    fn conjunction_requires_all_predicates() {
        let p = payload();
        assert!(PayloadFilter::new()
            .equals("project", "memoria")
            .range("importance", Some(json!(0.5)), None)
            .matches(&p));
        assert!(!PayloadFilter::new()
            .equals("project", "memoria")
            .range("importance", Some(json!(0.9)), None)
            .matches(&p));
    }
}
