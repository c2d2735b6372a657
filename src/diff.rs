//! Key-level differences between two records.
//!
//! Objects are compared key by key, recursively; nested paths are joined
//! with `.` (`endpoints.PROD`). Anything else, arrays included, is compared
//! as a whole value.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::types::Record;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueChange {
    pub path: String,
    pub old_value: Value,
    pub new_value: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecordDiff {
    pub values_changed: Vec<ValueChange>,
    pub items_added: Vec<String>,
    pub items_removed: Vec<String>,
}

impl RecordDiff {
    pub fn is_empty(&self) -> bool {
        self.values_changed.is_empty() && self.items_added.is_empty() && self.items_removed.is_empty()
    }
}

/// Compare `old` to `new`. Changed and removed paths follow `old`'s order;
/// added paths follow `new`'s.
pub fn diff_records(old: &Record, new: &Record) -> RecordDiff {
    let mut diff = RecordDiff::default();
    diff_maps("", old, new, &mut diff);
    diff
}

fn diff_maps(prefix: &str, old: &Map<String, Value>, new: &Map<String, Value>, diff: &mut RecordDiff) {
    for (key, old_value) in old {
        let path = join(prefix, key);
        match new.get(key) {
            None => diff.items_removed.push(path),
            Some(new_value) => match (old_value, new_value) {
                (Value::Object(a), Value::Object(b)) => diff_maps(&path, a, b, diff),
                (a, b) if a != b => diff.values_changed.push(ValueChange {
                    path,
                    old_value: a.clone(),
                    new_value: b.clone(),
                }),
                _ => {}
            },
        }
    }
    for key in new.keys() {
        if !old.contains_key(key) {
            diff.items_added.push(join(prefix, key));
        }
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}
