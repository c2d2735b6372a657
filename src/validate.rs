//! Validating parsed records against a schema.
//!
//! Two report shapes share one per-field evaluation:
//!
//! - [`validate`]: aggregate `{valid, errors, warnings}` for
//!   upload-and-validate flows.
//! - [`validate_field_results`]: one [`FieldResult`] per schema field (plus
//!   extras) for the interactive validator view.
//!
//! Per field, checks run in order and stop at the first failure: presence,
//! visibility, requiredness, emptiness, editability, quoting, then
//! type-specific checks on the unquoted value.
//!
//! The two shapes are deliberately not equally strict. The aggregate form
//! errors on any key absent from the record regardless of requiredness, and
//! lets an empty optional field pass. The per-field form marks an empty
//! value invalid even when the field is optional.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::condition::{self, Purpose, condition_values, hidden_reason, js_string};
use crate::parse::{self, LineChecks, brace_list_items, unquote};
use crate::schema::{Condition, Field, FieldType, Schema};
use crate::types::Record;

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+(\.\d+)?$").expect("number pattern"));

/// Aggregate validation outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldStatus {
    Valid,
    Missing,
    Invalid,
    Extra,
    Hidden,
    Warning,
}

/// Per-field validation outcome for the validator view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldResult {
    pub key: String,
    pub label: String,
    pub status: FieldStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
}

impl FieldResult {
    fn new(field: &Field, status: FieldStatus, message: impl Into<String>) -> Self {
        FieldResult {
            key: field.key.clone(),
            label: field.display_label().to_string(),
            status,
            message: message.into(),
            error: matches!(
                status,
                FieldStatus::Missing | FieldStatus::Invalid | FieldStatus::Extra
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared evaluation
// ---------------------------------------------------------------------------

/// What the checks found for one field.
#[derive(Debug, Clone, PartialEq)]
enum Assessment {
    Missing,
    Hidden(Option<String>),
    MissingRequired,
    EmptyOptional,
    Present(Checks),
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Checks {
    /// Non-editable field whose value is not its default.
    locked: Option<Locked>,
    issue: Option<Issue>,
    /// The field's regex failed to compile; the pattern check was skipped.
    bad_pattern: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct Locked {
    default: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum Issue {
    Unquoted,
    NumberSpaces(String),
    NotANumber,
    NotBoolean,
    NotAnOption { value: String, allowed: Vec<String> },
    KeyValueBrackets,
    KeyValueFormat,
    KeyValueEmpty,
    McqFormat,
    McqOptions { invalid: Vec<String>, allowed: Vec<String> },
    Pattern,
}

impl Issue {
    fn aggregate_message(&self, label: &str) -> String {
        match self {
            Issue::Unquoted => format!("Field '{label}' must be quoted (e.g. \"value\")."),
            Issue::NumberSpaces(found) => format!(
                "Field '{label}' contains leading or trailing spaces. Numbers should not have spaces: found '{found}'."
            ),
            Issue::NotANumber => format!(
                "Field '{label}' must be a valid number without spaces or special characters."
            ),
            Issue::NotBoolean => {
                format!("Field '{label}' should be a boolean ('true' or 'false').")
            }
            Issue::NotAnOption { value, allowed } => format!(
                "Field '{label}' has invalid value '{value}'. Allowed: {}",
                allowed.join(", ")
            ),
            Issue::KeyValueBrackets => format!(
                "Field '{label}' has invalid format. Use {{\"key1\":\"value1\",\"key2\":\"value2\"}} instead of square brackets."
            ),
            Issue::KeyValueFormat => format!(
                "Field '{label}' must be in format {{\"key1\":\"value1\",\"key2\":\"value2\"}} or {{}}."
            ),
            Issue::KeyValueEmpty => format!("Field '{label}' is required and cannot be empty."),
            Issue::McqFormat => format!("Field '{label}' must be in {{\"a\",\"b\"}} format."),
            Issue::McqOptions { invalid, allowed } => format!(
                "Field '{label}' has invalid options: {}. Allowed: {}",
                invalid.join(", "),
                allowed.join(", ")
            ),
            Issue::Pattern => format!("Field '{label}' does not match required format."),
        }
    }

    fn field_message(&self) -> String {
        match self {
            Issue::Unquoted => "Value must be quoted (e.g. \"value\").".into(),
            Issue::NumberSpaces(found) => format!(
                "Contains leading or trailing spaces. Numbers should not have spaces: found '{found}'."
            ),
            Issue::NotANumber => {
                "Must be a valid number without spaces or special characters.".into()
            }
            Issue::NotBoolean => "Should be a boolean (true or false).".into(),
            Issue::NotAnOption { allowed, .. } => {
                format!("Invalid value. Allowed: {}", allowed.join(", "))
            }
            Issue::KeyValueBrackets => {
                "Invalid format. Use {\"key1\":\"value1\"} instead of square brackets.".into()
            }
            Issue::KeyValueFormat => {
                "Must be in format {\"key1\":\"value1\",\"key2\":\"value2\"} or {}.".into()
            }
            Issue::KeyValueEmpty => "Required and cannot be empty.".into(),
            Issue::McqFormat => "Value must be in {\"a\",\"b\"} format.".into(),
            Issue::McqOptions { invalid, allowed } => format!(
                "Invalid options: {}. Allowed: {}",
                invalid.join(", "),
                allowed.join(", ")
            ),
            Issue::Pattern => "Does not match required format.".into(),
        }
    }
}

fn assess(field: &Field, record: &Record, live: &Record) -> Assessment {
    let Some(value) = record.get(&field.key) else {
        return Assessment::Missing;
    };

    if !condition::is_visible(field, live) {
        return Assessment::Hidden(hidden_reason(field, live));
    }
    let mandatory = condition::is_mandatory(field, live);

    if is_empty_value(value) {
        return if mandatory {
            Assessment::MissingRequired
        } else {
            Assessment::EmptyOptional
        };
    }

    let mut checks = Checks {
        locked: locked_value(field, value),
        ..Checks::default()
    };

    let raw = value.as_str();
    if field.field_type.requires_quoting() && !raw.is_some_and(is_double_quoted) {
        checks.issue = Some(Issue::Unquoted);
        return Assessment::Present(checks);
    }
    let unquoted = raw.map(unquote);

    checks.issue = type_issue(field, value, unquoted, mandatory);
    if checks.issue.is_none()
        && let (Some(pattern), Some(text)) = (field.regex.as_deref(), unquoted)
    {
        match Regex::new(pattern) {
            Ok(re) if !re.is_match(text) => checks.issue = Some(Issue::Pattern),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(key = %field.key, error = %e, "Invalid field pattern; skipping check");
                checks.bad_pattern = true;
            }
        }
    }

    Assessment::Present(checks)
}

fn type_issue(field: &Field, value: &Value, unquoted: Option<&str>, mandatory: bool) -> Option<Issue> {
    match field.field_type {
        FieldType::Number => {
            let text = unquoted?;
            if text != text.trim() {
                Some(Issue::NumberSpaces(text.to_string()))
            } else if !NUMBER.is_match(text) {
                Some(Issue::NotANumber)
            } else {
                None
            }
        }
        FieldType::Boolean => match unquoted {
            Some("true" | "false") => None,
            _ => Some(Issue::NotBoolean),
        },
        FieldType::Dropdown | FieldType::McqSingle => {
            let text = unquoted?;
            let allowed = field.allowed_options();
            if !allowed.is_empty() && !allowed.iter().any(|a| a == text) {
                Some(Issue::NotAnOption {
                    value: text.to_string(),
                    allowed,
                })
            } else {
                None
            }
        }
        FieldType::KeyValue => keyvalue_issue(value, mandatory),
        FieldType::McqMultiple => mcq_multiple_issue(field, value),
        FieldType::Text
        | FieldType::String
        | FieldType::Email
        | FieldType::Timestamp
        | FieldType::Other => None,
    }
}

fn keyvalue_issue(value: &Value, mandatory: bool) -> Option<Issue> {
    let entries = match value {
        Value::String(s) if s.starts_with('[') && s.ends_with(']') => {
            return Some(Issue::KeyValueBrackets);
        }
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) if map.values().all(Value::is_string) => map.len(),
            _ => return Some(Issue::KeyValueFormat),
        },
        Value::Object(map) => map.len(),
        _ => return None,
    };
    (entries == 0 && mandatory).then_some(Issue::KeyValueEmpty)
}

fn mcq_multiple_issue(field: &Field, value: &Value) -> Option<Issue> {
    let selected: Vec<String> = match value {
        Value::String(s) => match brace_list_items(s) {
            Some(items) => items,
            None => return Some(Issue::McqFormat),
        },
        Value::Array(items) => items.iter().map(js_string).collect(),
        _ => return Some(Issue::McqFormat),
    };
    let allowed = field.allowed_options();
    if allowed.is_empty() {
        return None;
    }
    let invalid: Vec<String> = selected
        .into_iter()
        .filter(|s| !allowed.contains(s))
        .collect();
    (!invalid.is_empty()).then_some(Issue::McqOptions { invalid, allowed })
}

fn locked_value(field: &Field, value: &Value) -> Option<Locked> {
    if field.is_user_editable() {
        return None;
    }
    let Some(default) = field.default_value() else {
        return Some(Locked { default: None });
    };
    let expected = js_string(default);
    let matches = match value {
        Value::String(raw) => {
            raw == &expected || unquote(raw) == expected || *raw == format!("\"{expected}\"")
        }
        other => other == default,
    };
    (!matches).then_some(Locked {
        default: Some(expected),
    })
}

fn is_double_quoted(raw: &str) -> bool {
    raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"')
}

/// Whether a value counts as "not filled in".
///
/// Besides null and the empty string this accepts the spellings accumulated
/// from hand-edited files: `null`, `"null"`, `'null'`, `""`, `''` (quotes
/// possibly backslash-escaped), and any run of at most four quote characters.
pub fn is_empty_value(value: &Value) -> bool {
    let raw = match value {
        Value::Null => return true,
        Value::String(s) => s.trim(),
        _ => return false,
    };
    if raw.is_empty() {
        return true;
    }
    let unescaped = raw.replace("\\\"", "\"").replace("\\'", "'");
    if matches!(
        unescaped.as_str(),
        "null" | "\"null\"" | "'null'" | "\"\"" | "''"
    ) {
        return true;
    }
    unescaped.chars().count() <= 4 && unescaped.chars().all(|c| c == '"' || c == '\'')
}

// ---------------------------------------------------------------------------
// Aggregate form
// ---------------------------------------------------------------------------

/// Aggregate validation of `record` against `schema`.
pub fn validate(record: &Record, schema: &Schema) -> ValidationResult {
    let live = condition_values(record);
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for field in &schema.fields {
        let label = field.display_label();
        match assess(field, record, &live) {
            Assessment::Missing => errors.push(format!("Missing field: {label}")),
            Assessment::Hidden(_) | Assessment::EmptyOptional => {}
            Assessment::MissingRequired => {
                errors.push(format!("Missing required field: {label}"));
            }
            Assessment::Present(checks) => {
                if let Some(locked) = checks.locked {
                    warnings.push(match locked.default {
                        Some(d) => format!(
                            "Field '{label}' is not user editable and should keep its default value: {d}"
                        ),
                        None => format!("Field '{label}' is not user editable but has a value."),
                    });
                }
                if let Some(issue) = checks.issue {
                    errors.push(issue.aggregate_message(label));
                } else if checks.bad_pattern {
                    warnings.push(format!(
                        "Field '{label}' has an invalid pattern; format check skipped."
                    ));
                }
            }
        }
    }

    for key in record.keys() {
        if !schema.contains_key(key) {
            warnings.push(extra_warning(schema, key));
        }
    }

    tracing::debug!(errors = errors.len(), warnings = warnings.len(), "Validated record");
    ValidationResult {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

fn extra_warning(schema: &Schema, key: &str) -> String {
    format!("Extra field in config: {}", schema.label_for(key))
}

// ---------------------------------------------------------------------------
// Per-field form
// ---------------------------------------------------------------------------

const EXTRA_MESSAGE: &str =
    "This field is extra in config file and not present in the template schema.";

/// Per-field validation of `record` against `schema`.
///
/// `extra_fields` are reported as extras alongside the record keys the
/// schema does not define; duplicates are dropped.
pub fn validate_field_results(record: &Record, schema: &Schema, extra_fields: &[String]) -> Vec<FieldResult> {
    let live = condition_values(record);
    let mut results: Vec<FieldResult> = schema
        .fields
        .iter()
        .map(|field| field_result(field, record, &live))
        .collect();

    let mut extras: Vec<&str> = Vec::new();
    let candidates = extra_fields
        .iter()
        .map(String::as_str)
        .chain(record.keys().map(String::as_str).filter(|k| !schema.contains_key(k)));
    for key in candidates {
        if !extras.contains(&key) {
            extras.push(key);
        }
    }
    results.extend(extras.into_iter().map(|key| FieldResult {
        key: key.to_string(),
        label: schema.label_for(key).to_string(),
        status: FieldStatus::Extra,
        message: EXTRA_MESSAGE.into(),
        error: true,
    }));

    results
}

fn field_result(field: &Field, record: &Record, live: &Record) -> FieldResult {
    let label = field.display_label();
    match assess(field, record, live) {
        Assessment::Missing => {
            FieldResult::new(field, FieldStatus::Missing, format!("Missing field: {label}"))
        }
        Assessment::Hidden(reason) => FieldResult::new(
            field,
            FieldStatus::Hidden,
            reason.unwrap_or_else(|| "Field not visible due to conditional logic.".into()),
        ),
        Assessment::MissingRequired => FieldResult::new(
            field,
            FieldStatus::Invalid,
            format!("Missing required field: {label}"),
        ),
        Assessment::EmptyOptional => {
            FieldResult::new(field, FieldStatus::Invalid, "This field cannot be empty.")
        }
        Assessment::Present(Checks {
            locked: Some(locked),
            ..
        }) => FieldResult::new(
            field,
            FieldStatus::Invalid,
            match locked.default {
                Some(d) => format!("Field is not user editable and must have default value: {d}"),
                None => "Field is not user editable and must be left empty.".into(),
            },
        ),
        Assessment::Present(Checks {
            issue: Some(issue), ..
        }) => FieldResult::new(field, FieldStatus::Invalid, issue.field_message()),
        Assessment::Present(Checks {
            bad_pattern: true, ..
        }) => FieldResult::new(
            field,
            FieldStatus::Warning,
            "Pattern could not be compiled; format check skipped.",
        ),
        Assessment::Present(_) => FieldResult::new(field, FieldStatus::Valid, "Valid."),
    }
}

// ---------------------------------------------------------------------------
// Upload flow and diagnostics
// ---------------------------------------------------------------------------

/// Everything the validate-on-upload flow shows for one `.conf` text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfReport {
    pub syntax_errors: Vec<String>,
    pub validation: ValidationResult,
    pub field_results: Vec<FieldResult>,
    pub extra_fields: Vec<String>,
    pub missing_fields: Vec<String>,
}

impl ConfReport {
    /// Passes only with neither syntax nor validation errors.
    pub fn is_valid(&self) -> bool {
        self.syntax_errors.is_empty() && self.validation.valid
    }
}

/// Strict-parse `content` and run both validators on the result.
///
/// Keys the schema does not define never reach the parsed record, so they
/// are carried over from the parse: listed in `extra_fields`, warned about
/// in the aggregate result and reported as extras per field.
pub fn check_conf(content: &str, schema: &Schema, checks: LineChecks) -> ConfReport {
    let strict = parse::strict_parse_conf_with(content, schema, checks);
    let record = &strict.parsed;

    let mut validation = validate(record, schema);
    validation.warnings.extend(
        strict
            .unknown_keys
            .iter()
            .map(|key| extra_warning(schema, key)),
    );

    let missing_fields: Vec<String> = schema
        .fields
        .iter()
        .filter(|f| !record.contains_key(&f.key))
        .map(|f| f.key.clone())
        .collect();

    ConfReport {
        validation,
        field_results: validate_field_results(record, schema, &strict.unknown_keys),
        syntax_errors: strict.syntax_errors,
        extra_fields: strict.unknown_keys,
        missing_fields,
    }
}

/// How one field's conditions evaluate against a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityDebug {
    pub key: String,
    pub label: String,
    pub value: Option<Value>,
    pub visible_if: Option<Condition>,
    pub mandatory_if: Option<Condition>,
    pub statically_mandatory: bool,
    pub user_editable: bool,
    pub visible: bool,
    pub visibility_evaluation: String,
    pub mandatory: bool,
    pub mandatory_evaluation: String,
}

/// Explain visibility and requiredness for every schema field.
pub fn debug_field_visibility(record: &Record, schema: &Schema) -> Vec<VisibilityDebug> {
    let live = condition_values(record);
    schema
        .fields
        .iter()
        .map(|field| {
            let (visible, visibility_evaluation) =
                explain(field.visible_if.as_ref(), Purpose::Visibility, &live, true);
            let (mandatory, mandatory_evaluation) = explain(
                field.mandatory_if.as_ref(),
                Purpose::Mandatory,
                &live,
                field.is_statically_mandatory(),
            );
            VisibilityDebug {
                key: field.key.clone(),
                label: field.display_label().to_string(),
                value: record.get(&field.key).cloned(),
                visible_if: field.visible_if.clone(),
                mandatory_if: field.mandatory_if.clone(),
                statically_mandatory: field.is_statically_mandatory(),
                user_editable: field.is_user_editable(),
                visible,
                visibility_evaluation,
                mandatory,
                mandatory_evaluation,
            }
        })
        .collect()
}

fn explain(
    condition: Option<&Condition>,
    purpose: Purpose,
    live: &Record,
    fallback: bool,
) -> (bool, String) {
    let Some(condition) = condition else {
        return (fallback, "no condition".into());
    };
    match condition::evaluate(condition, purpose, live) {
        Ok(Some(result)) => (result, "success".into()),
        Ok(None) => (fallback, "no condition".into()),
        Err(e) => (false, format!("error: {e}")),
    }
}
