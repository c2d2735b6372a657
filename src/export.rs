//! Serializing prefill records back to `.conf` text.
//!
//! Export is single-environment: environment-specific fields contribute the
//! value for the chosen [`Environment`] only. Lines follow schema order.
//!
//! | value | line |
//! |---|---|
//! | key/value pairs | `key={"k1":"v1","k2":"v2"}` |
//! | selections | `key={"a","b"}` |
//! | empty pairs or selections | `key={}` |
//! | null or absent | `key=""` |
//! | anything else | `key="value"` |
//!
//! Every field is exactly one line. Line breaks inside values become
//! spaces, and a selection containing `"` is dropped because the brace
//! list syntax cannot carry it.

use std::borrow::Cow;

use serde_json::Value;

use crate::condition::js_string;
use crate::prefill::map_conf_to_prefill;
use crate::schema::Schema;
use crate::types::{Environment, FieldValue, PrefillRecord, Record};

/// Render `prefill` as `.conf` text for `env`.
///
/// With `include_comments`, each line is preceded by `# <label>`.
pub fn serialize_prefill(
    prefill: &PrefillRecord,
    schema: &Schema,
    env: Environment,
    include_comments: bool,
) -> String {
    let mut lines = Vec::new();
    for field in &schema.fields {
        if include_comments {
            lines.push(format!("# {}", single_line(field.display_label())));
        }
        let rendered = match prefill.get(&field.key) {
            Some(value) => render_value(&field.key, value.for_environment(env)),
            None => "\"\"".to_string(),
        };
        lines.push(format!("{}={}", field.key, rendered));
    }
    lines.into_iter().map(|line| line + "\n").collect()
}

/// Map a stored submission through the prefill mapper, then serialize it.
pub fn export_record(
    record: &Record,
    schema: &Schema,
    env: Environment,
    include_comments: bool,
) -> String {
    let prefill = map_conf_to_prefill(record, schema);
    tracing::debug!(environment = %env, "Exporting record");
    serialize_prefill(&prefill, schema, env, include_comments)
}

fn render_value(key: &str, value: &FieldValue) -> String {
    match value {
        FieldValue::Pairs(pairs) => {
            let object: serde_json::Map<String, Value> = pairs
                .iter()
                .filter(|p| !p.key.is_empty())
                .map(|p| (p.key.clone(), Value::String(p.value.clone())))
                .collect();
            Value::Object(object).to_string()
        }
        FieldValue::Strings(items) => {
            let quoted: Vec<String> = items
                .iter()
                .filter(|item| {
                    let keep = !item.contains('"');
                    if !keep {
                        tracing::warn!(key = %key, item = %item, "Selection contains '\"'; not exported");
                    }
                    keep
                })
                .map(|item| format!("\"{}\"", single_line(item)))
                .collect();
            format!("{{{}}}", quoted.join(","))
        }
        FieldValue::Scalar(Value::Null) => "\"\"".to_string(),
        FieldValue::Scalar(Value::Array(items)) if items.is_empty() => "{}".to_string(),
        FieldValue::Scalar(other) => format!("\"{}\"", single_line(&js_string(other))),
    }
}

/// Replace line breaks with spaces so a value cannot spill onto the next line.
fn single_line(text: &str) -> Cow<'_, str> {
    if text.contains(['\n', '\r']) {
        Cow::Owned(text.replace("\r\n", " ").replace(['\n', '\r'], " "))
    } else {
        Cow::Borrowed(text)
    }
}
