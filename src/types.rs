//! Shared value types.
//!
//! # Records
//!
//! A [`Record`] maps field keys to JSON values. It is what both parse modes
//! produce (strict mode stores only strings), what the validator and the
//! condition evaluator read, and what stored submissions deserialize into.
//! Key order is the order keys first appeared in the source text.
//!
//! # Environments
//!
//! Environment-specific fields carry one value per deployment target. The
//! set of targets is closed: [`Environment::Prod`], [`Environment::Dev`] and
//! [`Environment::Cob`]. [`EnvMap`] holds one `T` for each.
//!
//! # Prefill values
//!
//! [`PrefillRecord`] is what the form binds to. Each field's value is a
//! [`FieldValue`] chosen by the field's declared type, wrapped in
//! [`PrefillValue::PerEnv`] when the field is environment-specific.
//!
//! # Actions
//!
//! [`ConfAction`] describes one operation independent of any CLI framework;
//! the clap adapter converts parsed arguments into it and
//! [`ops::handle`](crate::ops::handle) executes it.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfformError;

/// Field key → value, in source order.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// A deployment target for environment-specific fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Environment {
    Prod,
    Dev,
    Cob,
}

impl Environment {
    pub const ALL: [Environment; 3] = [Environment::Prod, Environment::Dev, Environment::Cob];

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Prod => "PROD",
            Environment::Dev => "DEV",
            Environment::Cob => "COB",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ConfformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PROD" => Ok(Environment::Prod),
            "DEV" => Ok(Environment::Dev),
            "COB" => Ok(Environment::Cob),
            _ => Err(ConfformError::UnknownEnvironment(s.to_string())),
        }
    }
}

/// One value per environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvMap<T> {
    #[serde(rename = "PROD")]
    pub prod: T,
    #[serde(rename = "DEV")]
    pub dev: T,
    #[serde(rename = "COB")]
    pub cob: T,
}

impl<T> EnvMap<T> {
    pub fn from_fn(mut f: impl FnMut(Environment) -> T) -> Self {
        EnvMap {
            prod: f(Environment::Prod),
            dev: f(Environment::Dev),
            cob: f(Environment::Cob),
        }
    }

    pub fn get(&self, env: Environment) -> &T {
        match env {
            Environment::Prod => &self.prod,
            Environment::Dev => &self.dev,
            Environment::Cob => &self.cob,
        }
    }
}

/// One entry of a `keyvalue` field as the form edits it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValuePair {
    pub key: String,
    pub value: String,
}

impl KeyValuePair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        KeyValuePair {
            key: key.into(),
            value: value.into(),
        }
    }

    /// A skeleton entry with an empty value.
    pub fn blank(key: impl Into<String>) -> Self {
        KeyValuePair::new(key, "")
    }
}

/// An operation, independent of any CLI framework.
/// The CLI layer converts parsed clap args into this.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfAction {
    /// Parse a `.conf` file and show the resulting record.
    Parse { conf: PathBuf, strict_schema: Option<PathBuf> },
    /// Aggregate validation of a `.conf` file against a schema.
    Validate { conf: PathBuf, schema: PathBuf },
    /// Per-field validation report.
    Check {
        conf: PathBuf,
        schema: PathBuf,
        extra: Vec<String>,
    },
    /// Map a `.conf` file to the form prefill shape.
    Prefill { conf: PathBuf, schema: PathBuf },
    /// Export a stored submission record (JSON) as `.conf` text.
    Export {
        record: PathBuf,
        schema: PathBuf,
        environment: Option<Environment>,
        output: Option<PathBuf>,
    },
    /// Key-level diff of two `.conf` files.
    Diff { old: PathBuf, new: PathBuf },
    /// Show the resolved engine settings, or the commented template.
    Settings { template: bool },
}

// ---------------------------------------------------------------------------
// Prefill values
// ---------------------------------------------------------------------------

/// A field's value in the form's prefill shape, selected by field type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Anything that is not `keyvalue` or `mcq_multiple`, passed through.
    Scalar(Value),
    /// `keyvalue` entries: initial keys first, then extras in source order.
    Pairs(Vec<KeyValuePair>),
    /// `mcq_multiple` selections.
    Strings(Vec<String>),
}

impl FieldValue {
    pub fn empty_scalar() -> Self {
        FieldValue::Scalar(Value::String(String::new()))
    }

    pub fn to_value(&self) -> Value {
        match self {
            FieldValue::Scalar(v) => v.clone(),
            FieldValue::Pairs(pairs) => Value::Array(
                pairs
                    .iter()
                    .map(|p| serde_json::json!({"key": p.key, "value": p.value}))
                    .collect(),
            ),
            FieldValue::Strings(items) => {
                Value::Array(items.iter().cloned().map(Value::String).collect())
            }
        }
    }
}

/// A field's prefill value: one for all environments, or one per
/// environment for `environmentSpecific` fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PrefillValue {
    Shared(FieldValue),
    PerEnv(EnvMap<FieldValue>),
}

impl PrefillValue {
    /// The value the given environment sees.
    pub fn for_environment(&self, env: Environment) -> &FieldValue {
        match self {
            PrefillValue::Shared(value) => value,
            PrefillValue::PerEnv(map) => map.get(env),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            PrefillValue::Shared(value) => value.to_value(),
            PrefillValue::PerEnv(map) => serde_json::json!({
                "PROD": map.prod.to_value(),
                "DEV": map.dev.to_value(),
                "COB": map.cob.to_value(),
            }),
        }
    }
}

/// Output of the prefill mapper: one entry per schema field, in schema
/// order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrefillRecord {
    entries: Vec<(String, PrefillValue)>,
}

impl PrefillRecord {
    pub fn new() -> Self {
        PrefillRecord::default()
    }

    /// Set `key`, replacing any earlier value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: PrefillValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&PrefillValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PrefillValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The JSON record the form binds to.
    pub fn to_record(&self) -> Record {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.to_value()))
            .collect()
    }

    /// Collapse every per-environment value to `env`.
    pub fn for_environment(&self, env: Environment) -> PrefillRecord {
        PrefillRecord {
            entries: self
                .entries
                .iter()
                .map(|(k, v)| {
                    (
                        k.clone(),
                        PrefillValue::Shared(v.for_environment(env).clone()),
                    )
                })
                .collect(),
        }
    }
}

impl Serialize for PrefillRecord {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
