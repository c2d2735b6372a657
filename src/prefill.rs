//! Mapping parsed or stored records onto the form's prefill shape.
//!
//! Input is a lenient-parsed record, a stored submission, or an earlier
//! prefill rendered with [`PrefillRecord::to_record`]. The mapping is
//! idempotent: feeding a prefill's record back in yields the same prefill.
//!
//! Only schema fields appear in the output, in schema order.

use serde_json::Value;

use crate::condition::js_string;
use crate::parse::brace_list_items;
use crate::schema::{Field, FieldType, Schema};
use crate::types::{
    EnvMap, Environment, FieldValue, KeyValuePair, PrefillRecord, PrefillValue, Record,
};

/// Build the prefill record for `schema` from `record`.
pub fn map_conf_to_prefill(record: &Record, schema: &Schema) -> PrefillRecord {
    let mut prefill = PrefillRecord::new();
    for field in &schema.fields {
        let value = record.get(&field.key).filter(|v| !v.is_null());
        let mapped = if field.environment_specific {
            PrefillValue::PerEnv(per_environment(field, value))
        } else {
            PrefillValue::Shared(shared(field, value))
        };
        prefill.insert(field.key.clone(), mapped);
    }
    tracing::debug!(fields = prefill.len(), "Mapped record to prefill");
    prefill
}

fn per_environment(field: &Field, value: Option<&Value>) -> EnvMap<FieldValue> {
    let split = value.and_then(env_split);
    EnvMap::from_fn(|env| {
        let scoped = match split {
            Some(map) => map.get(env.as_str()).filter(|v| !v.is_null()),
            None => value,
        };
        shared(field, scoped)
    })
}

/// The object behind an environment-split value, if `value` is one.
fn env_split(value: &Value) -> Option<&serde_json::Map<String, Value>> {
    let map = value.as_object()?;
    Environment::ALL
        .iter()
        .any(|env| map.contains_key(env.as_str()))
        .then_some(map)
}

fn shared(field: &Field, value: Option<&Value>) -> FieldValue {
    match field.field_type {
        FieldType::KeyValue => FieldValue::Pairs(keyvalue_pairs(field, value)),
        FieldType::McqMultiple => FieldValue::Strings(value.map(selections).unwrap_or_default()),
        _ => value
            .cloned()
            .map(FieldValue::Scalar)
            .unwrap_or_else(FieldValue::empty_scalar),
    }
}

/// Entries for a `keyvalue` field: initial keys first (with data values
/// where present), then keys only found in the data.
fn keyvalue_pairs(field: &Field, value: Option<&Value>) -> Vec<KeyValuePair> {
    let found = value.map(|v| pairs_from_value(&field.key, v)).unwrap_or_default();

    let mut merged: Vec<KeyValuePair> = field
        .initial_keys()
        .into_iter()
        .map(|key| {
            found
                .iter()
                .find(|p| p.key == key)
                .cloned()
                .unwrap_or_else(|| KeyValuePair::blank(key))
        })
        .collect();
    for pair in found {
        if !merged.iter().any(|m| m.key == pair.key) {
            merged.push(pair);
        }
    }
    merged
}

fn pairs_from_value(key: &str, value: &Value) -> Vec<KeyValuePair> {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| KeyValuePair::new(k.clone(), pair_text(v)))
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| {
                let entry = item.as_object()?;
                let k = entry.get("key")?.as_str()?;
                Some(KeyValuePair::new(
                    k,
                    entry.get("value").map(pair_text).unwrap_or_default(),
                ))
            })
            .collect(),
        Value::String(s) if s.trim().is_empty() => Vec::new(),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(parsed @ Value::Object(_)) => pairs_from_value(key, &parsed),
            _ => {
                tracing::warn!(key = %key, "keyvalue field is not a JSON object; using initial keys");
                Vec::new()
            }
        },
        _ => Vec::new(),
    }
}

fn pair_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => js_string(other),
    }
}

/// Selections for an `mcq_multiple` field.
fn selections(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().map(js_string).collect(),
        Value::String(s) => brace_list_items(s.trim()).unwrap_or_else(|| {
            s.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect()
        }),
        Value::Object(_) => Vec::new(),
        other => vec![js_string(other)],
    }
}
