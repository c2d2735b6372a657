//! Template schemas: the field definitions every other stage consumes.
//!
//! A [`Schema`] is an immutable snapshot of a template's field list. The
//! parse, validate and prefill stages take it by reference and never modify
//! it; the UI that edits templates produces a new snapshot instead.
//!
//! Schemas arrive as JSON from the template service. Several attributes have
//! two spellings accumulated over the template format's history
//! (`mandatory`/`required`, `userEditable`/`editable`,
//! `defaultValue`/`default`); both are accepted and merged by the accessor
//! methods on [`Field`].
//!
//! Loading goes through `serde_ignored`, so attributes the model does not
//! know are reported back to the caller rather than silently dropped.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfformError;

/// A template schema: metadata plus an ordered field list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Value>,
    #[serde(default)]
    pub fields: Vec<Field>,
}

/// One configuration key's definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub key: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mandatory_if: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_if: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_editable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editable: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(default)]
    pub environment_specific: bool,
    #[serde(default, skip_serializing_if = "StringList::is_empty")]
    pub initial_keys: StringList,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

/// Declared field type. Governs quoting, type checks and prefill shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    #[default]
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "string")]
    String,
    #[serde(rename = "number")]
    Number,
    #[serde(rename = "email")]
    Email,
    #[serde(rename = "timestamp")]
    Timestamp,
    #[serde(rename = "dropdown")]
    Dropdown,
    #[serde(rename = "mcq_single")]
    McqSingle,
    #[serde(rename = "mcq_multiple")]
    McqMultiple,
    #[serde(rename = "boolean")]
    Boolean,
    #[serde(rename = "keyvalue")]
    KeyValue,
    #[serde(other)]
    Other,
}

impl FieldType {
    /// Types whose raw value must be wrapped in double quotes.
    pub fn requires_quoting(self) -> bool {
        matches!(
            self,
            FieldType::String
                | FieldType::Dropdown
                | FieldType::Email
                | FieldType::Text
                | FieldType::Boolean
                | FieldType::Number
                | FieldType::McqSingle
        )
    }
}

/// An allowed choice for dropdown and mcq fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldOption {
    Plain(String),
    Labeled {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
    },
    Other(Value),
}

impl FieldOption {
    /// The string a config value is compared against: label if present,
    /// else value, else the option stringified.
    pub fn allowed_value(&self) -> String {
        match self {
            FieldOption::Plain(s) => s.clone(),
            FieldOption::Labeled { label, value } => {
                if let Some(label) = label.as_deref().filter(|l| !l.is_empty()) {
                    return label.to_string();
                }
                match value {
                    Some(Value::String(s)) if !s.is_empty() => s.clone(),
                    Some(v @ (Value::Number(_) | Value::Bool(true))) => v.to_string(),
                    _ => String::new(),
                }
            }
            FieldOption::Other(Value::String(s)) => s.clone(),
            FieldOption::Other(v) => v.to_string(),
        }
    }
}

/// A list of strings that templates store either as a JSON array or as a
/// single comma-separated string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringList {
    Many(Vec<String>),
    Joined(String),
}

impl Default for StringList {
    fn default() -> Self {
        StringList::Many(Vec::new())
    }
}

impl StringList {
    pub fn is_empty(&self) -> bool {
        self.to_vec().is_empty()
    }

    /// Normalized entries: comma-split, trimmed, blanks dropped.
    pub fn to_vec(&self) -> Vec<String> {
        let split = |s: &str| -> Vec<String> {
            s.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect()
        };
        match self {
            StringList::Many(items) => items
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            StringList::Joined(s) => split(s),
        }
    }
}

impl From<Vec<&str>> for StringList {
    fn from(items: Vec<&str>) -> Self {
        StringList::Many(items.into_iter().map(String::from).collect())
    }
}

/// A `visibleIf` / `mandatoryIf` rule.
///
/// The structured form pairs controlling keys with expected values. The
/// string form is a legacy expression (`"mode == 'advanced'"`) that is
/// parsed into the same AST; see [`crate::condition`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    Rule {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<ConditionKey>,
        #[serde(default)]
        value: Value,
    },
    Expression(String),
}

impl Condition {
    pub fn rule(key: &str, value: impl Into<Value>) -> Self {
        Condition::Rule {
            key: Some(ConditionKey::One(key.to_string())),
            value: value.into(),
        }
    }
}

/// One controlling key, several (comma-joined or as a list).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionKey {
    One(String),
    Many(Vec<String>),
}

impl ConditionKey {
    /// Normalized key list: comma-split, trimmed, blanks dropped.
    pub fn keys(&self) -> Vec<String> {
        match self {
            ConditionKey::One(s) => StringList::Joined(s.clone()).to_vec(),
            ConditionKey::Many(items) => StringList::Many(items.clone()).to_vec(),
        }
    }
}

impl Field {
    pub fn new(key: &str, label: &str, field_type: FieldType) -> Self {
        Field {
            key: key.to_string(),
            label: label.to_string(),
            field_type,
            ..Field::default()
        }
    }

    /// Label for messages; falls back to the key.
    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            &self.key
        } else {
            &self.label
        }
    }

    pub fn is_statically_mandatory(&self) -> bool {
        self.mandatory || self.required
    }

    pub fn is_user_editable(&self) -> bool {
        self.user_editable != Some(false) && self.editable != Some(false)
    }

    /// `defaultValue` wins over `default`.
    pub fn default_value(&self) -> Option<&Value> {
        self.default_value
            .as_ref()
            .or(self.default.as_ref())
            .filter(|v| !v.is_null())
    }

    /// Skeleton keys for `keyvalue` fields. Older templates stored them as
    /// an array-valued `default`.
    pub fn initial_keys(&self) -> Vec<String> {
        let keys = self.initial_keys.to_vec();
        if !keys.is_empty() {
            return keys;
        }
        match &self.default {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn allowed_options(&self) -> Vec<String> {
        self.options.iter().map(FieldOption::allowed_value).collect()
    }
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Schema {
            fields,
            ..Schema::default()
        }
    }

    pub fn field(&self, key: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.field(key).is_some()
    }

    /// Label of the field with `key`, or the key itself.
    pub fn label_for<'a>(&'a self, key: &'a str) -> &'a str {
        self.field(key).map(Field::display_label).unwrap_or(key)
    }

    /// Reject schemas whose field keys are not unique.
    pub fn check_unique_keys(&self) -> Result<(), ConfformError> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.key.as_str()) {
                return Err(ConfformError::DuplicateKey(field.key.clone()));
            }
        }
        Ok(())
    }
}

/// A loaded schema plus the attribute paths the model did not recognize.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaLoad {
    pub schema: Schema,
    pub ignored: Vec<String>,
}

/// Parse schema JSON, collecting unrecognized attributes.
///
/// `path` is only used for error reporting.
pub fn load_schema_str(content: &str, path: &Path) -> Result<SchemaLoad, ConfformError> {
    let mut ignored: Vec<String> = Vec::new();

    let mut deserializer = serde_json::Deserializer::from_str(content);
    let schema: Schema = serde_ignored::deserialize(&mut deserializer, |ignored_path| {
        ignored.push(ignored_path.to_string());
    })
    .and_then(|schema| deserializer.end().map(|()| schema))
    .map_err(|e| ConfformError::SchemaParse {
        path: path.to_path_buf(),
        source: e,
    })?;

    schema.check_unique_keys()?;

    for attr in &ignored {
        tracing::warn!(path = %path.display(), attribute = %attr, "Unknown schema attribute");
    }

    Ok(SchemaLoad { schema, ignored })
}

/// Read and parse a schema JSON file.
pub fn load_schema(path: &Path) -> Result<SchemaLoad, ConfformError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfformError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    load_schema_str(&content, path)
}
