//! Dot-path flattening for partial updates.
//!
//! `{"base": {"HP": 35}, "type": ["Fire"]}` flattens to
//! `{"base.HP": 35, "type": ["Fire"]}`. Arrays are leaves and are never
//! exploded into indexed paths, so replacing `type` replaces the whole list.

use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Flat mapping of dot-joined paths to leaf values, in the input's iteration order.
pub type FlatPaths = IndexMap<String, Value>;

/// Flatten a nested mapping into dot-separated paths.
///
/// Scalars, arrays and empty objects are leaves.
pub fn flatten(input: &Map<String, Value>) -> FlatPaths {
    let mut out = FlatPaths::new();
    flatten_into(&mut out, None, input);
    out
}

fn flatten_into(out: &mut FlatPaths, prefix: Option<&str>, map: &Map<String, Value>) {
    for (key, value) in map {
        let path = match prefix {
            Some(p) => format!("{p}.{key}"),
            None => key.clone(),
        };
        match value {
            Value::Object(inner) if !inner.is_empty() => flatten_into(out, Some(&path), inner),
            leaf => {
                out.insert(path, leaf.clone());
            }
        }
    }
}

/// Rebuild a nested mapping from dot-separated paths.
///
/// A later path that descends through an earlier leaf replaces that leaf.
pub fn unflatten(paths: &FlatPaths) -> Map<String, Value> {
    let mut root = Map::new();
    for (path, value) in paths {
        let mut segments = path.split('.').peekable();
        let mut cursor = &mut root;
        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                cursor.insert(segment.to_string(), value.clone());
                break;
            }
            let slot = cursor
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            cursor = match slot {
                Value::Object(inner) => inner,
                _ => unreachable!("slot was just made an object"),
            };
        }
    }
    root
}
