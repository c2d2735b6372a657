//! Action handling: runs a [`ConfAction`] and returns a [`ConfResult`] for
//! display.
//!
//! This is the only layer that reads or writes files. Records are read from
//! `.json` files as stored submissions and from anything else as `.conf`
//! text.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::diff::{RecordDiff, diff_records};
use crate::error::ConfformError;
use crate::export::export_record;
use crate::parse::{parse_conf, strict_parse_conf_with};
use crate::prefill::map_conf_to_prefill;
use crate::schema::{Schema, load_schema};
use crate::settings::{Settings, settings_template};
use crate::types::{ConfAction, PrefillRecord, Record};
use crate::validate::{ConfReport, FieldResult, FieldStatus, check_conf, validate_field_results};

/// Result of an action. Returned to the caller for display.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfResult {
    /// A parsed record, with syntax errors when parsed strictly.
    Parsed {
        record: Record,
        syntax_errors: Vec<String>,
    },
    /// Upload validation.
    Validation(ConfReport),
    /// Per-field report.
    FieldReport {
        results: Vec<FieldResult>,
        syntax_errors: Vec<String>,
    },
    Prefill(PrefillRecord),
    /// Exported text; `written` is set when it went to a file.
    Exported {
        text: String,
        written: Option<PathBuf>,
    },
    Diff(RecordDiff),
    /// Resolved settings as TOML.
    Settings(String),
    /// Commented settings template.
    Template(String),
}

impl fmt::Display for ConfResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfResult::Parsed {
                record,
                syntax_errors,
            } => {
                write!(f, "{}", pretty_json(record))?;
                for error in syntax_errors {
                    write!(f, "\n{error}")?;
                }
                Ok(())
            }
            ConfResult::Validation(report) => {
                write!(f, "{}", if report.is_valid() { "Valid" } else { "Invalid" })?;
                for error in &report.syntax_errors {
                    write!(f, "\nsyntax: {error}")?;
                }
                for error in &report.validation.errors {
                    write!(f, "\nerror: {error}")?;
                }
                for warning in &report.validation.warnings {
                    write!(f, "\nwarning: {warning}")?;
                }
                Ok(())
            }
            ConfResult::FieldReport {
                results,
                syntax_errors,
            } => {
                for (i, result) in results.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(
                        f,
                        "[{}] {} ({}): {}",
                        status_tag(result.status),
                        result.key,
                        result.label,
                        result.message
                    )?;
                }
                for error in syntax_errors {
                    write!(f, "\nsyntax: {error}")?;
                }
                Ok(())
            }
            ConfResult::Prefill(prefill) => write!(f, "{}", pretty_json(prefill)),
            ConfResult::Exported {
                written: Some(path),
                ..
            } => write!(f, "Exported to {}", path.display()),
            ConfResult::Exported { text, written: None } => write!(f, "{}", text.trim_end()),
            ConfResult::Diff(diff) if diff.is_empty() => write!(f, "No differences"),
            ConfResult::Diff(diff) => {
                let mut lines = Vec::new();
                for change in &diff.values_changed {
                    lines.push(format!(
                        "~ {}: {} -> {}",
                        change.path, change.old_value, change.new_value
                    ));
                }
                lines.extend(diff.items_added.iter().map(|p| format!("+ {p}")));
                lines.extend(diff.items_removed.iter().map(|p| format!("- {p}")));
                write!(f, "{}", lines.join("\n"))
            }
            ConfResult::Settings(text) | ConfResult::Template(text) => {
                write!(f, "{}", text.trim_end())
            }
        }
    }
}

fn status_tag(status: FieldStatus) -> &'static str {
    match status {
        FieldStatus::Valid => "valid",
        FieldStatus::Missing => "missing",
        FieldStatus::Invalid => "invalid",
        FieldStatus::Extra => "extra",
        FieldStatus::Hidden => "hidden",
        FieldStatus::Warning => "warning",
    }
}

fn pretty_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<unserializable: {e}>"))
}

/// Run `action` with `settings`.
pub fn handle(settings: &Settings, action: &ConfAction) -> Result<ConfResult, ConfformError> {
    tracing::debug!(?action, "Handling action");
    match action {
        ConfAction::Parse {
            conf,
            strict_schema: None,
        } => Ok(ConfResult::Parsed {
            record: parse_conf(&read_text(conf)?),
            syntax_errors: Vec::new(),
        }),
        ConfAction::Parse {
            conf,
            strict_schema: Some(schema),
        } => {
            let schema = read_schema(schema)?;
            let strict = strict_parse_conf_with(&read_text(conf)?, &schema, settings.line_checks());
            Ok(ConfResult::Parsed {
                record: strict.parsed,
                syntax_errors: strict.syntax_errors,
            })
        }
        ConfAction::Validate { conf, schema } => {
            let schema = read_schema(schema)?;
            let report = check_conf(&read_text(conf)?, &schema, settings.line_checks());
            Ok(ConfResult::Validation(report))
        }
        ConfAction::Check {
            conf,
            schema,
            extra,
        } => {
            let schema = read_schema(schema)?;
            let strict = strict_parse_conf_with(&read_text(conf)?, &schema, settings.line_checks());
            let extras: Vec<String> = extra
                .iter()
                .chain(&strict.unknown_keys)
                .cloned()
                .collect();
            Ok(ConfResult::FieldReport {
                results: validate_field_results(&strict.parsed, &schema, &extras),
                syntax_errors: strict.syntax_errors,
            })
        }
        ConfAction::Prefill { conf, schema } => {
            let schema = read_schema(schema)?;
            let record = read_record(conf)?;
            Ok(ConfResult::Prefill(map_conf_to_prefill(&record, &schema)))
        }
        ConfAction::Export {
            record,
            schema,
            environment,
            output,
        } => {
            let schema = read_schema(schema)?;
            let record = read_record(record)?;
            let env = environment.unwrap_or(settings.export.environment);
            let text = export_record(&record, &schema, env, settings.export.include_comments);
            if let Some(path) = output {
                std::fs::write(path, &text).map_err(|e| ConfformError::Io {
                    path: path.clone(),
                    source: e,
                })?;
            }
            Ok(ConfResult::Exported {
                text,
                written: output.clone(),
            })
        }
        ConfAction::Diff { old, new } => {
            let old = read_record(old)?;
            let new = read_record(new)?;
            Ok(ConfResult::Diff(diff_records(&old, &new)))
        }
        ConfAction::Settings { template: true } => Ok(ConfResult::Template(settings_template())),
        ConfAction::Settings { template: false } => toml::to_string_pretty(settings)
            .map(ConfResult::Settings)
            .map_err(|e| ConfformError::InvalidSettings(e.to_string())),
    }
}

fn read_text(path: &Path) -> Result<String, ConfformError> {
    std::fs::read_to_string(path).map_err(|e| ConfformError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

fn read_schema(path: &Path) -> Result<Schema, ConfformError> {
    Ok(load_schema(path)?.schema)
}

/// A stored JSON record, or a lenient-parsed `.conf` file.
fn read_record(path: &Path) -> Result<Record, ConfformError> {
    let text = read_text(path)?;
    if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")) {
        serde_json::from_str(&text).map_err(|e| ConfformError::RecordParse {
            path: path.to_path_buf(),
            source: e,
        })
    } else {
        Ok(parse_conf(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Environment;
    use tempfile::TempDir;

    const SCHEMA: &str = r#"{
        "name": "svc",
        "fields": [
            {"key": "env", "label": "Env", "type": "dropdown", "mandatory": true, "options": ["DEV", "PROD"]},
            {"key": "host", "label": "Host", "type": "text", "environmentSpecific": true},
            {"key": "tags", "label": "Tags", "type": "mcq_multiple", "options": ["a", "b"]}
        ]
    }"#;

    struct Fixture {
        dir: TempDir,
        schema: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let schema = dir.path().join("schema.json");
            std::fs::write(&schema, SCHEMA).unwrap();
            Fixture { dir, schema }
        }

        fn file(&self, name: &str, content: &str) -> PathBuf {
            let path = self.dir.path().join(name);
            std::fs::write(&path, content).unwrap();
            path
        }
    }

    fn settings() -> Settings {
        Settings::defaults().unwrap()
    }

    #[test]
    fn parse_lenient_and_strict() {
        let fx = Fixture::new();
        let conf = fx.file("a.conf", "env=\"DEV\"\nbogus=1\n");

        let lenient = handle(
            &settings(),
            &ConfAction::Parse {
                conf: conf.clone(),
                strict_schema: None,
            },
        )
        .unwrap();
        match lenient {
            ConfResult::Parsed {
                record,
                syntax_errors,
            } => {
                assert_eq!(record.len(), 2);
                assert!(syntax_errors.is_empty());
            }
            other => panic!("Expected Parsed, got {other:?}"),
        }

        let strict = handle(
            &settings(),
            &ConfAction::Parse {
                conf,
                strict_schema: Some(fx.schema.clone()),
            },
        )
        .unwrap();
        match strict {
            ConfResult::Parsed {
                record,
                syntax_errors,
            } => {
                assert_eq!(record["env"], serde_json::json!("\"DEV\""));
                assert_eq!(syntax_errors, vec!["Line 2: Unknown key 'bogus'."]);
            }
            other => panic!("Expected Parsed, got {other:?}"),
        }
    }

    #[test]
    fn validate_reports_verdict() {
        let fx = Fixture::new();
        let good = fx.file("good.conf", "env=\"DEV\"\nhost=\"h\"\ntags={\"a\"}\n");
        let bad = fx.file("bad.conf", "env=DEV\nhost=\"h\"\ntags={\"a\"}\n");

        let result = handle(
            &settings(),
            &ConfAction::Validate {
                conf: good,
                schema: fx.schema.clone(),
            },
        )
        .unwrap();
        assert_eq!(result.to_string(), "Valid");

        let result = handle(
            &settings(),
            &ConfAction::Validate {
                conf: bad,
                schema: fx.schema.clone(),
            },
        )
        .unwrap();
        let text = result.to_string();
        assert!(text.starts_with("Invalid"));
        assert!(text.contains("error: Field 'Env' must be quoted"));
    }

    #[test]
    fn check_lists_every_field() {
        let fx = Fixture::new();
        let conf = fx.file("a.conf", "env=\"DEV\"\ntags=a\nlegacy=\"1\"\n");
        let result = handle(
            &settings(),
            &ConfAction::Check {
                conf,
                schema: fx.schema.clone(),
                extra: vec!["retired".into()],
            },
        )
        .unwrap();
        let text = result.to_string();
        assert!(text.contains("[valid] env (Env): Valid."));
        assert!(text.contains("[missing] host (Host): Missing field: Host"));
        assert!(text.contains("[invalid] tags (Tags)"));
        assert!(text.contains("[extra] retired"));
        assert!(text.contains("[extra] legacy (legacy)"));
        assert!(text.contains("syntax: Line 3: Unknown key 'legacy'."));
    }

    #[test]
    fn prefill_from_conf() {
        let fx = Fixture::new();
        let conf = fx.file("a.conf", "env=\"DEV\"\nhost=\"h\"\n");
        let result = handle(
            &settings(),
            &ConfAction::Prefill {
                conf,
                schema: fx.schema.clone(),
            },
        )
        .unwrap();
        match result {
            ConfResult::Prefill(prefill) => {
                let record = prefill.to_record();
                assert_eq!(record["host"]["COB"], serde_json::json!("h"));
                assert_eq!(record["tags"], serde_json::json!([]));
            }
            other => panic!("Expected Prefill, got {other:?}"),
        }
    }

    #[test]
    fn export_uses_settings_environment_unless_overridden() {
        let fx = Fixture::new();
        let record = fx.file(
            "stored.json",
            r#"{"env": "DEV", "host": {"PROD": "p", "DEV": "d", "COB": "c"}, "tags": ["b"]}"#,
        );

        let result = handle(
            &settings(),
            &ConfAction::Export {
                record: record.clone(),
                schema: fx.schema.clone(),
                environment: None,
                output: None,
            },
        )
        .unwrap();
        assert_eq!(result.to_string(), "env=\"DEV\"\nhost=\"p\"\ntags={\"b\"}");

        let out = fx.dir.path().join("out.conf");
        let result = handle(
            &settings(),
            &ConfAction::Export {
                record,
                schema: fx.schema.clone(),
                environment: Some(Environment::Cob),
                output: Some(out.clone()),
            },
        )
        .unwrap();
        assert!(result.to_string().starts_with("Exported to "));
        let written = std::fs::read_to_string(&out).unwrap();
        assert!(written.contains("host=\"c\"\n"));
    }

    #[test]
    fn malformed_json_record_is_record_parse_error() {
        let fx = Fixture::new();
        let record = fx.file("stored.json", "{nope");
        let err = handle(
            &settings(),
            &ConfAction::Export {
                record,
                schema: fx.schema.clone(),
                environment: None,
                output: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, ConfformError::RecordParse { .. }));
    }

    #[test]
    fn diff_two_confs() {
        let fx = Fixture::new();
        let old = fx.file("old.conf", "env=\"DEV\"\nlegacy=\"1\"\n");
        let new = fx.file("new.conf", "env=\"PROD\"\nhost=\"h\"\n");
        let result = handle(&settings(), &ConfAction::Diff { old, new }).unwrap();
        assert_eq!(
            result.to_string(),
            "~ env: \"DEV\" -> \"PROD\"\n+ host\n- legacy"
        );
    }

    #[test]
    fn identical_files_have_no_differences() {
        let fx = Fixture::new();
        let a = fx.file("a.conf", "env=\"DEV\"\n");
        let result = handle(
            &settings(),
            &ConfAction::Diff {
                old: a.clone(),
                new: a,
            },
        )
        .unwrap();
        assert_eq!(result.to_string(), "No differences");
    }

    #[test]
    fn settings_show_and_template() {
        let shown = handle(&settings(), &ConfAction::Settings { template: false }).unwrap();
        let text = shown.to_string();
        assert!(text.contains("[export]"));
        assert!(text.contains("environment = \"PROD\""));

        let template = handle(&settings(), &ConfAction::Settings { template: true }).unwrap();
        assert!(matches!(template, ConfResult::Template(_)));
    }

    #[test]
    fn missing_conf_is_io_error() {
        let fx = Fixture::new();
        let err = handle(
            &settings(),
            &ConfAction::Validate {
                conf: fx.dir.path().join("absent.conf"),
                schema: fx.schema.clone(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, ConfformError::Io { .. }));
        assert!(err.to_string().contains("absent.conf"));
    }
}
