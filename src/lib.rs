//! Schema-driven tooling for `key=value` configuration templates.
//!
//! A template is a JSON [`Schema`]: an ordered list of fields, each with a
//! type, requiredness rules, allowed options and optional conditions. Config
//! files in the `.conf` text format are parsed into records, validated
//! against the schema, mapped onto the shape a form binds to, and exported
//! back to text.
//!
//! ```ignore
//! let schema = confform::load_schema(Path::new("template.json"))?.schema;
//! let report = confform::check_conf(&text, &schema, LineChecks::Extended);
//! if !report.is_valid() {
//!     for error in &report.validation.errors {
//!         eprintln!("{error}");
//!     }
//! }
//! ```
//!
//! # The `.conf` format
//!
//! One `key=value` per line; blank lines and `#` comments are skipped.
//! Values of most types are double-quoted. `keyvalue` fields hold a JSON
//! object (`{"k":"v"}`), `mcq_multiple` fields a brace-quoted list
//! (`{"a","b"}`).
//!
//! Two parsers read it. [`parse_conf`] is lenient and decodes values for
//! import. [`strict_parse_conf`] keeps the raw text of every value so the
//! validator can judge quoting, and reports line-numbered syntax errors.
//!
//! # Pipeline
//!
//! ```text
//! text ──strict_parse_conf──▶ raw record ──validate / validate_field_results──▶ reports
//! text ──parse_conf─────────▶ record ──map_conf_to_prefill──▶ PrefillRecord
//! PrefillRecord ──serialize_prefill(env)──▶ text
//! ```
//!
//! Every stage takes the schema by reference and never modifies it or its
//! input record.
//!
//! # Conditions
//!
//! Fields may carry `visibleIf` and `mandatoryIf` rules. Both are compiled
//! into a small expression tree (see [`condition`]) and evaluated against
//! the current values on every call. Older templates store rules as string
//! expressions; those are parsed into the same tree and never executed. A
//! rule that cannot be compiled hides the field and makes it optional.
//!
//! # Environments
//!
//! Fields marked `environmentSpecific` carry one value per environment
//! (`PROD`, `DEV`, `COB`) in the prefill shape. The text format has no
//! multi-environment form, so export always picks one environment.
//!
//! # Settings
//!
//! A handful of engine settings ([`Settings`]) are layered with confique
//! from defaults, `confform.toml` files and `CONFFORM__*` environment
//! variables. See [`settings`].
//!
//! # CLI
//!
//! [`ops::handle`] runs a framework-agnostic [`ConfAction`]. With the `clap`
//! feature (on by default), [`ConfArgs`] turns a command line into one.
//!
//! # Errors
//!
//! The core stages never fail; they report problems as data. Only loading
//! files and settings returns [`ConfformError`].

pub mod condition;
pub mod diff;
pub mod error;
pub mod export;
pub mod expr;
pub mod ops;
pub mod parse;
pub mod prefill;
pub mod schema;
pub mod settings;
pub mod types;
pub mod validate;

#[cfg(feature = "clap")]
mod cli;

#[cfg(test)]
mod fixtures;

#[cfg(feature = "clap")]
pub use cli::{ConfArgs, ConfSubcommand};
pub use condition::{is_mandatory, is_visible};
pub use diff::{RecordDiff, diff_records};
pub use error::ConfformError;
pub use export::{export_record, serialize_prefill};
pub use ops::{ConfResult, handle};
pub use parse::{LineChecks, StrictParse, parse_conf, strict_parse_conf, strict_parse_conf_with};
pub use prefill::map_conf_to_prefill;
pub use schema::{Field, FieldType, Schema, SchemaLoad, load_schema, load_schema_str};
pub use settings::{Settings, load_settings};
pub use types::{
    ConfAction, EnvMap, Environment, FieldValue, KeyValuePair, PrefillRecord, PrefillValue,
    Record,
};
pub use validate::{
    ConfReport, FieldResult, FieldStatus, ValidationResult, check_conf, debug_field_visibility,
    validate, validate_field_results,
};
