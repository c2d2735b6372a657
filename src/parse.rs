//! Parsing `.conf` text into records.
//!
//! The format is line oriented: `key=value` assignments, with blank lines and
//! lines starting with `#` ignored. Two parsers share that grammar.
//!
//! - [`parse_conf`] is lenient. Quotes are stripped, `{...}` values are
//!   decoded as JSON objects or as brace-quoted string sets (`{"a","b"}`),
//!   and malformed lines are skipped. Import and duplicate flows use it.
//! - [`strict_parse_conf`] keeps every value as the exact text after the
//!   first `=` (trimmed) so the validator can judge quoting and syntax
//!   itself. Problems are collected as line-numbered syntax errors and
//!   parsing continues with the next line.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::schema::Schema;
use crate::types::Record;

static BRACE_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\{\s*("[^"]*"\s*(,\s*"[^"]*")*)\s*\}$"#).expect("brace list pattern")
});

static BRACE_LIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]*)""#).expect("brace list item pattern"));

static KEY_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("key pattern"));

/// Items of a brace-quoted string set such as `{"a","b"}`, or `None` if
/// `value` is not in that syntax.
pub fn brace_list_items(value: &str) -> Option<Vec<String>> {
    if !BRACE_LIST.is_match(value) {
        return None;
    }
    Some(
        BRACE_LIST_ITEM
            .captures_iter(value)
            .map(|c| c[1].to_string())
            .collect(),
    )
}

/// Strip one pair of matching surrounding quotes (double or single).
pub fn unquote(value: &str) -> &str {
    if value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')))
    {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// Split one assignment line into trimmed `(key, value)` at the first `=`.
fn split_assignment(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    Some((key.trim(), value.trim()))
}

fn is_ignored_line(trimmed: &str) -> bool {
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// Lenient parse: best effort, no error reporting.
///
/// Later assignments to the same key replace earlier ones.
pub fn parse_conf(content: &str) -> Record {
    let mut record = Record::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if is_ignored_line(trimmed) {
            continue;
        }
        let Some((key, raw)) = split_assignment(trimmed) else {
            continue;
        };
        record.insert(key.to_string(), decode_lenient_value(unquote(raw)));
    }

    record
}

fn decode_lenient_value(value: &str) -> Value {
    if value.starts_with('{') && value.ends_with('}') {
        if let Ok(parsed) = serde_json::from_str::<Value>(value) {
            return parsed;
        }
        if let Some(items) = brace_list_items(value) {
            return Value::Array(items.into_iter().map(Value::String).collect());
        }
    }
    Value::String(value.to_string())
}

/// How thorough the strict parser's per-line checks are.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LineChecks {
    /// Only missing `=` and unknown keys.
    Basic,
    /// Also key format, duplicate keys and unclosed braces.
    #[default]
    Extended,
}

/// Output of [`strict_parse_conf`]: raw values for known keys plus the
/// syntax problems found along the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrictParse {
    /// Known keys → raw value text (always `Value::String`).
    pub parsed: Record,
    pub syntax_errors: Vec<String>,
    /// Keys the schema does not define, once each in first-seen order.
    pub unknown_keys: Vec<String>,
}

impl StrictParse {
    pub fn is_clean(&self) -> bool {
        self.syntax_errors.is_empty()
    }
}

/// Strict parse with [`LineChecks::Extended`].
pub fn strict_parse_conf(content: &str, schema: &Schema) -> StrictParse {
    strict_parse_conf_with(content, schema, LineChecks::default())
}

/// Strict parse: values stay byte-identical to the source text after the
/// first `=` (trimmed). Only keys defined in `schema` land in `parsed`, and
/// the first assignment of a key wins.
pub fn strict_parse_conf_with(content: &str, schema: &Schema, checks: LineChecks) -> StrictParse {
    let mut out = StrictParse::default();
    let mut seen: HashSet<&str> = HashSet::new();

    for (i, line) in content.lines().enumerate() {
        let line_no = i + 1;
        let trimmed = line.trim();
        if is_ignored_line(trimmed) {
            continue;
        }

        let Some((key, value)) = split_assignment(trimmed) else {
            tracing::debug!(line = line_no, "Line without '='");
            out.syntax_errors
                .push(format!("Line {line_no}: Missing '=' in line."));
            continue;
        };

        if checks == LineChecks::Extended {
            if !KEY_FORMAT.is_match(key) {
                out.syntax_errors.push(format!(
                    "Line {line_no}: Invalid key format '{key}'. Keys should contain only letters, numbers, and underscores."
                ));
            }
            if !seen.insert(key) {
                out.syntax_errors.push(format!(
                    "Line {line_no}: Duplicate field '{key}'. Field already defined earlier in the config."
                ));
            }
        }

        let known = schema.contains_key(key);
        if !known {
            tracing::debug!(line = line_no, key = %key, "Unknown key");
            out.syntax_errors
                .push(format!("Line {line_no}: Unknown key '{key}'."));
            if !out.unknown_keys.iter().any(|k| k == key) {
                out.unknown_keys.push(key.to_string());
            }
        }

        if checks == LineChecks::Extended && value.starts_with('{') && !value.ends_with('}') {
            out.syntax_errors.push(format!(
                "Line {line_no}: Incomplete JSON object for key '{key}'. Missing closing brace."
            ));
        }

        if known && !out.parsed.contains_key(key) {
            out.parsed
                .insert(key.to_string(), Value::String(value.to_string()));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::service_schema;
    use serde_json::json;

    // --- lenient ---

    #[test]
    fn lenient_strips_quotes_and_skips_comments() {
        let record = parse_conf("# header\n\nenv=\"DEV\"\nname='svc'\nbare=plain\n");
        assert_eq!(record.len(), 3);
        assert_eq!(record["env"], json!("DEV"));
        assert_eq!(record["name"], json!("svc"));
        assert_eq!(record["bare"], json!("plain"));
    }

    #[test]
    fn lenient_skips_lines_without_equals() {
        let record = parse_conf("garbage line\nport=\"80\"");
        assert_eq!(record.len(), 1);
        assert_eq!(record["port"], json!("80"));
    }

    #[test]
    fn lenient_handles_crlf() {
        let record = parse_conf("a=\"1\"\r\nb=\"2\"\r\n");
        assert_eq!(record["a"], json!("1"));
        assert_eq!(record["b"], json!("2"));
    }

    #[test]
    fn lenient_decodes_json_objects() {
        let record = parse_conf(r#"labels={"team":"core","tier":"1"}"#);
        assert_eq!(record["labels"], json!({"team": "core", "tier": "1"}));
    }

    #[test]
    fn lenient_decodes_brace_string_sets() {
        let record = parse_conf(r#"tags={"a", "b","c"}"#);
        assert_eq!(record["tags"], json!(["a", "b", "c"]));
    }

    #[test]
    fn lenient_brace_set_items_may_contain_commas() {
        let record = parse_conf(r#"tags={"a,b","c"}"#);
        assert_eq!(record["tags"], json!(["a,b", "c"]));
    }

    #[test]
    fn lenient_empty_object_and_empty_string() {
        let record = parse_conf("obj={}\nempty=\"\"\nnothing=");
        assert_eq!(record["obj"], json!({}));
        assert_eq!(record["empty"], json!(""));
        assert_eq!(record["nothing"], json!(""));
    }

    #[test]
    fn lenient_unparseable_braces_stay_strings() {
        let record = parse_conf("weird={not json}");
        assert_eq!(record["weird"], json!("{not json}"));
    }

    #[test]
    fn lenient_value_keeps_text_after_first_equals() {
        let record = parse_conf("url=\"http://h/?a=b\"");
        assert_eq!(record["url"], json!("http://h/?a=b"));
    }

    #[test]
    fn lenient_preserves_source_order() {
        let record = parse_conf("z=\"1\"\na=\"2\"\nm=\"3\"");
        let keys: Vec<&str> = record.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn lenient_later_assignment_wins() {
        let record = parse_conf("a=\"1\"\na=\"2\"");
        assert_eq!(record["a"], json!("2"));
    }

    // --- strict ---

    #[test]
    fn strict_keeps_raw_values() {
        let schema = service_schema();
        let out = strict_parse_conf("env=\"DEV\"\nport=8080\ntags={\"a\"}\n", &schema);
        assert!(out.is_clean(), "{:?}", out.syntax_errors);
        assert_eq!(out.parsed["env"], json!("\"DEV\""));
        assert_eq!(out.parsed["port"], json!("8080"));
        assert_eq!(out.parsed["tags"], json!("{\"a\"}"));
    }

    #[test]
    fn strict_missing_equals_is_one_error_with_line_number() {
        let schema = service_schema();
        let out = strict_parse_conf("env=\"DEV\"\n# c\nport\n", &schema);
        assert_eq!(out.syntax_errors, vec!["Line 3: Missing '=' in line."]);
        assert!(!out.parsed.contains_key("port"));
    }

    #[test]
    fn strict_reports_unknown_keys() {
        let schema = service_schema();
        let out = strict_parse_conf("bogus=\"x\"\n", &schema);
        assert_eq!(out.syntax_errors, vec!["Line 1: Unknown key 'bogus'."]);
        assert!(out.parsed.is_empty());
        assert_eq!(out.unknown_keys, vec!["bogus"]);
    }

    #[test]
    fn strict_lists_each_unknown_key_once() {
        let schema = service_schema();
        let out = strict_parse_conf_with(
            "legacy=\"1\"\nenv=\"DEV\"\nlegacy=\"2\"\nold_port=\"1\"\n",
            &schema,
            LineChecks::Basic,
        );
        assert_eq!(out.unknown_keys, vec!["legacy", "old_port"]);
        assert_eq!(out.syntax_errors.len(), 3);
        assert_eq!(out.parsed.len(), 1);
    }

    #[test]
    fn strict_value_is_byte_identical_after_trim() {
        let schema = service_schema();
        let out = strict_parse_conf("name =   \"a = b # not a comment\"   \n", &schema);
        assert_eq!(out.parsed["name"], json!("\"a = b # not a comment\""));
    }

    #[test]
    fn strict_duplicate_first_wins_and_is_reported() {
        let schema = service_schema();
        let out = strict_parse_conf("env=\"DEV\"\nenv=\"PROD\"\n", &schema);
        assert_eq!(out.parsed["env"], json!("\"DEV\""));
        assert_eq!(out.syntax_errors.len(), 1);
        assert!(out.syntax_errors[0].starts_with("Line 2: Duplicate field 'env'"));
    }

    #[test]
    fn strict_basic_checks_skip_duplicates() {
        let schema = service_schema();
        let out = strict_parse_conf_with("env=\"DEV\"\nenv=\"PROD\"\n", &schema, LineChecks::Basic);
        assert!(out.is_clean());
        assert_eq!(out.parsed["env"], json!("\"DEV\""));
    }

    #[test]
    fn strict_reports_bad_key_format() {
        let schema = service_schema();
        let out = strict_parse_conf("9lives=\"x\"\n", &schema);
        assert_eq!(out.syntax_errors.len(), 2);
        assert!(out.syntax_errors[0].contains("Invalid key format '9lives'"));
        assert_eq!(out.syntax_errors[1], "Line 1: Unknown key '9lives'.");
    }

    #[test]
    fn strict_reports_unclosed_brace() {
        let schema = service_schema();
        let out = strict_parse_conf("labels={\"a\":\"b\"\n", &schema);
        assert_eq!(out.syntax_errors.len(), 1);
        assert!(out.syntax_errors[0].contains("Incomplete JSON object for key 'labels'"));
    }

    #[test]
    fn strict_continues_after_errors() {
        let schema = service_schema();
        let out = strict_parse_conf("oops\nenv=\"DEV\"\nnope=1\nport=\"1\"", &schema);
        assert_eq!(out.syntax_errors.len(), 2);
        assert_eq!(out.parsed.len(), 2);
    }

    // --- helpers ---

    #[test]
    fn unquote_strips_one_matching_pair() {
        assert_eq!(unquote("\"x\""), "x");
        assert_eq!(unquote("'x'"), "x");
        assert_eq!(unquote("\"x'"), "\"x'");
        assert_eq!(unquote("\""), "\"");
        assert_eq!(unquote("\"\"\"\""), "\"\"");
    }

    #[test]
    fn brace_list_rejects_other_syntax() {
        assert_eq!(brace_list_items("a,b"), None);
        assert_eq!(brace_list_items("{a,b}"), None);
        assert_eq!(brace_list_items("{}"), None);
        assert_eq!(
            brace_list_items(r#"{ "a" , "b" }"#),
            Some(vec!["a".to_string(), "b".to_string()])
        );
    }
}
