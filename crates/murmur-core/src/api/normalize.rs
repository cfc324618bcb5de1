//! Response shape normalization.
//!
//! List endpoints answer with a bare array, a DRF page, a search envelope
//! wrapping a page, or an object keyed by `posts` or `data`. Everything is
//! reduced to a plain list here and nowhere else.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::models::Page;

/// Pull the item array out of a list response.
///
/// Priority: bare array, `results`, `results.results`, `posts`, `data`.
/// Any other shape is logged and yields an empty list.
pub fn extract_items(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            if let Some(results) = map.remove("results") {
                match results {
                    Value::Array(items) => return items,
                    Value::Object(mut inner) => {
                        if let Some(Value::Array(items)) = inner.remove("results") {
                            return items;
                        }
                    }
                    _ => {}
                }
            }
            for key in ["posts", "data"] {
                if let Some(Value::Array(items)) = map.remove(key) {
                    return items;
                }
            }
            let keys: Vec<&String> = map.keys().collect();
            warn!(?keys, "Unexpected list response shape, treating as empty");
            Vec::new()
        }
        other => {
            warn!(kind = value_kind(&other), "Unexpected list response shape, treating as empty");
            Vec::new()
        }
    }
}

/// Normalize and deserialize a list response, skipping items that don't fit `T`
pub fn extract_list<T: DeserializeOwned>(value: Value) -> Vec<T> {
    extract_items(value)
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(index, error = %e, "Skipping malformed list item");
                None
            }
        })
        .collect()
}

/// Like `extract_list`, keeping the pagination fields when the envelope has them
pub fn extract_page<T: DeserializeOwned>(value: Value) -> Page<T> {
    let count = envelope_count(&value);
    let next = envelope_link(&value, "next");
    let previous = envelope_link(&value, "previous");
    let results: Vec<T> = extract_list(value);

    Page {
        count: count.unwrap_or(results.len() as u64),
        next,
        previous,
        results,
    }
}

fn envelope_count(value: &Value) -> Option<u64> {
    let object = value.as_object()?;
    object
        .get("count")
        .and_then(Value::as_u64)
        .or_else(|| object.get("results")?.get("count")?.as_u64())
}

fn envelope_link(value: &Value, key: &str) -> Option<String> {
    let object = value.as_object()?;
    object
        .get(key)
        .and_then(Value::as_str)
        .or_else(|| object.get("results")?.get(key)?.as_str())
        .map(str::to_string)
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: i64,
    }

    fn ids(items: Vec<Value>) -> Vec<i64> {
        items.iter().filter_map(|v| v["id"].as_i64()).collect()
    }

    #[test]
    fn test_extract_bare_array() {
        assert_eq!(ids(extract_items(json!([{"id": 1}, {"id": 2}]))), vec![1, 2]);
    }

    #[test]
    fn test_extract_paginated() {
        let value = json!({"count": 2, "next": null, "previous": null, "results": [{"id": 3}]});
        assert_eq!(ids(extract_items(value)), vec![3]);
    }

    #[test]
    fn test_extract_search_envelope() {
        let value = json!({
            "query": "rust",
            "count": 1,
            "results": {"count": 1, "results": [{"id": 9}]}
        });
        assert_eq!(ids(extract_items(value)), vec![9]);
    }

    #[test]
    fn test_extract_posts_and_data_keys() {
        assert_eq!(ids(extract_items(json!({"posts": [{"id": 4}]}))), vec![4]);
        assert_eq!(ids(extract_items(json!({"data": [{"id": 5}]}))), vec![5]);
    }

    #[test]
    fn test_results_wins_over_posts() {
        let value = json!({"results": [{"id": 1}], "posts": [{"id": 2}]});
        assert_eq!(ids(extract_items(value)), vec![1]);
    }

    #[test]
    fn test_unknown_shapes_are_empty() {
        assert!(extract_items(json!({"detail": "nope"})).is_empty());
        assert!(extract_items(json!("text")).is_empty());
        assert!(extract_items(Value::Null).is_empty());
        assert!(extract_items(json!({"results": "oops"})).is_empty());
    }

    #[test]
    fn test_extract_list_skips_malformed_items() {
        let items: Vec<Item> = extract_list(json!([{"id": 1}, {"name": "x"}, {"id": 3}]));
        assert_eq!(items, vec![Item { id: 1 }, Item { id: 3 }]);
    }

    #[test]
    fn test_extract_page_counts() {
        let page: Page<Item> = extract_page(json!({
            "count": 42,
            "next": "http://host/api/posts/?page=2",
            "previous": null,
            "results": [{"id": 1}]
        }));
        assert_eq!(page.count, 42);
        assert_eq!(page.next.as_deref(), Some("http://host/api/posts/?page=2"));
        assert!(page.previous.is_none());
        assert_eq!(page.results.len(), 1);

        let bare: Page<Item> = extract_page(json!([{"id": 1}, {"id": 2}]));
        assert_eq!(bare.count, 2);
        assert!(bare.next.is_none());
    }
}
