//! Engine settings, layered with confique.
//!
//! Layers, lowest priority first:
//!
//! 1. Compiled defaults (the `#[config(default = ...)]` attributes).
//! 2. `confform.toml` in the platform config directory
//!    (`~/.config/confform/` on Linux).
//! 3. `confform.toml` in the current working directory.
//! 4. `CONFFORM__*` environment variables. `__` separates nesting levels, so
//!    `CONFFORM__EXPORT__ENVIRONMENT=DEV` sets `export.environment`.
//!
//! Files are deep-merged, unknown keys are rejected with their line number,
//! and confique fills whatever no layer set.
//!
//! [`resolve_settings`] does no I/O so the whole pipeline can be tested with
//! synthetic inputs; [`load_settings`] gathers the real files and variables.

use std::path::{Path, PathBuf};

use confique::Config;
use serde::{Deserialize, Serialize};
use toml::{Table, Value};

use crate::error::ConfformError;
use crate::parse::LineChecks;
use crate::types::Environment;

pub const SETTINGS_FILE: &str = "confform.toml";
pub const ENV_PREFIX: &str = "CONFFORM";

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Settings {
    /// `.conf` export.
    #[config(nested)]
    pub export: ExportSettings,

    /// Strict parsing of uploaded `.conf` files.
    #[config(nested)]
    pub parse: ParseSettings,
}

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ExportSettings {
    /// Environment whose values environment-specific fields export
    /// (PROD, DEV or COB).
    #[config(default = "PROD")]
    pub environment: Environment,

    /// Write a `# <label>` comment above every exported key.
    #[config(default = false)]
    pub include_comments: bool,
}

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ParseSettings {
    /// Also report malformed keys, duplicate keys and unclosed braces.
    #[config(default = true)]
    pub extended_line_checks: bool,
}

impl Settings {
    /// Defaults only.
    pub fn defaults() -> Result<Self, ConfformError> {
        Ok(Settings::builder().load()?)
    }

    pub fn line_checks(&self) -> LineChecks {
        if self.parse.extended_line_checks {
            LineChecks::Extended
        } else {
            LineChecks::Basic
        }
    }
}

/// Pre-loaded settings sources.
pub struct SettingsInput {
    /// File contents, lowest priority first.
    pub files: Vec<(PathBuf, String)>,
    /// Raw environment variables; only `CONFFORM__*` ones are read.
    pub env_vars: Vec<(String, String)>,
}

/// Merge pre-loaded sources into [`Settings`].
pub fn resolve_settings(input: SettingsInput) -> Result<Settings, ConfformError> {
    let mut merged = Table::new();
    for (path, content) in &input.files {
        reject_unknown_keys(content, path)?;
        let table: Table = toml::from_str(content).map_err(|e| ConfformError::SettingsParse {
            path: path.clone(),
            source: e,
        })?;
        tracing::debug!(path = %path.display(), "Merging settings file");
        merged = deep_merge(merged, table);
    }

    merged = deep_merge(merged, env_to_table(ENV_PREFIX, input.env_vars));

    let layer: <Settings as Config>::Layer = Value::Table(merged)
        .try_into()
        .map_err(|e: toml::de::Error| ConfformError::InvalidSettings(e.to_string()))?;

    Ok(Settings::builder().preloaded(layer).load()?)
}

/// Where settings files are looked for, lowest priority first.
pub fn settings_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(proj) = directories::ProjectDirs::from("", "", "confform") {
        paths.push(proj.config_dir().join(SETTINGS_FILE));
    }
    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(SETTINGS_FILE));
    }
    paths
}

/// Read the files at `paths` that exist. Missing files are skipped; other
/// I/O errors are returned.
pub fn read_settings_files(paths: &[PathBuf]) -> Result<Vec<(PathBuf, String)>, ConfformError> {
    let mut files = Vec::new();
    for path in paths {
        match std::fs::read_to_string(path) {
            Ok(content) => files.push((path.clone(), content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => {
                return Err(ConfformError::Io {
                    path: path.clone(),
                    source: e,
                });
            }
        }
    }
    Ok(files)
}

/// Load settings from the standard locations and the process environment.
pub fn load_settings() -> Result<Settings, ConfformError> {
    let files = read_settings_files(&settings_paths())?;
    resolve_settings(SettingsInput {
        files,
        env_vars: std::env::vars().collect(),
    })
}

/// A commented `confform.toml` generated from the doc comments above.
pub fn settings_template() -> String {
    confique::toml::template::<Settings>(confique::toml::FormatOptions::default())
}

fn reject_unknown_keys(content: &str, path: &Path) -> Result<(), ConfformError> {
    let mut unknown: Vec<String> = Vec::new();
    let deserializer = toml::Deserializer::new(content);
    let _layer: <Settings as Config>::Layer =
        serde_ignored::deserialize(deserializer, |ignored| unknown.push(ignored.to_string()))
            .map_err(|e| ConfformError::SettingsParse {
                path: path.to_path_buf(),
                source: e,
            })?;

    match unknown.into_iter().next() {
        None => Ok(()),
        Some(key) => Err(ConfformError::UnknownSetting {
            line: find_key_line(content, &key),
            key,
            path: path.to_path_buf(),
        }),
    }
}

/// 1-indexed line of a dotted key, tracking `[section]` headers. 0 if not
/// found.
fn find_key_line(content: &str, dotted_key: &str) -> usize {
    let (section, leaf) = match dotted_key.rsplit_once('.') {
        Some((s, l)) => (s, l),
        None => ("", dotted_key),
    };
    let mut current = String::new();
    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.starts_with('[') {
            current = trimmed.trim_matches(&['[', ']'][..]).trim().to_string();
            continue;
        }
        if current == section
            && let Some((key, _)) = trimmed.split_once('=')
            && key.trim() == leaf
        {
            return i + 1;
        }
    }
    0
}

/// Deep-merge `overlay` onto `base`; tables recurse, anything else is
/// replaced.
fn deep_merge(mut base: Table, overlay: Table) -> Table {
    for (key, value) in overlay {
        match (base.remove(&key), value) {
            (Some(Value::Table(a)), Value::Table(b)) => {
                base.insert(key, Value::Table(deep_merge(a, b)));
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
    base
}

/// Table from `{prefix}__SECTION__KEY` variables. Segments are lowercased;
/// `true`/`false` become booleans, everything else stays a string.
fn env_to_table(prefix: &str, vars: impl IntoIterator<Item = (String, String)>) -> Table {
    let needle = format!("{prefix}__");
    let mut table = Table::new();
    for (key, value) in vars {
        let Some(rest) = key.strip_prefix(&needle) else {
            continue;
        };
        let segments: Vec<String> = rest.split("__").map(str::to_lowercase).collect();
        if segments.iter().any(String::is_empty) {
            continue;
        }
        let parsed = if value.eq_ignore_ascii_case("true") {
            Value::Boolean(true)
        } else if value.eq_ignore_ascii_case("false") {
            Value::Boolean(false)
        } else {
            Value::String(value)
        };
        insert_nested(&mut table, &segments, parsed);
    }
    table
}

fn insert_nested(table: &mut Table, segments: &[String], value: Value) {
    match segments {
        [] => {}
        [leaf] => {
            table.insert(leaf.clone(), value);
        }
        [head, rest @ ..] => {
            if let Value::Table(sub) = table
                .entry(head.clone())
                .or_insert_with(|| Value::Table(Table::new()))
            {
                insert_nested(sub, rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn input(files: &[(&str, &str)], env: &[(&str, &str)]) -> SettingsInput {
        SettingsInput {
            files: files
                .iter()
                .map(|(p, c)| (PathBuf::from(p), c.to_string()))
                .collect(),
            env_vars: env
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn defaults_only() {
        let settings = resolve_settings(input(&[], &[])).unwrap();
        assert_eq!(settings.export.environment, Environment::Prod);
        assert!(!settings.export.include_comments);
        assert!(settings.parse.extended_line_checks);
        assert_eq!(settings.line_checks(), LineChecks::Extended);
        assert_eq!(settings, Settings::defaults().unwrap());
    }

    #[test]
    fn later_file_wins() {
        let settings = resolve_settings(input(
            &[
                ("platform.toml", "[export]\nenvironment = \"DEV\"\ninclude_comments = true\n"),
                ("cwd.toml", "[export]\nenvironment = \"COB\"\n"),
            ],
            &[],
        ))
        .unwrap();
        assert_eq!(settings.export.environment, Environment::Cob);
        assert!(settings.export.include_comments);
    }

    #[test]
    fn env_vars_override_files() {
        let settings = resolve_settings(input(
            &[("cwd.toml", "[parse]\nextended_line_checks = true\n")],
            &[
                ("CONFFORM__PARSE__EXTENDED_LINE_CHECKS", "false"),
                ("CONFFORM__EXPORT__ENVIRONMENT", "DEV"),
                ("OTHER__EXPORT__ENVIRONMENT", "COB"),
            ],
        ))
        .unwrap();
        assert_eq!(settings.line_checks(), LineChecks::Basic);
        assert_eq!(settings.export.environment, Environment::Dev);
    }

    #[test]
    fn unknown_key_is_rejected_with_line() {
        let err = resolve_settings(input(
            &[("cwd.toml", "[export]\nenvironment = \"DEV\"\ncolour = \"red\"\n")],
            &[],
        ))
        .unwrap_err();
        match err {
            ConfformError::UnknownSetting { key, line, .. } => {
                assert_eq!(key, "export.colour");
                assert_eq!(line, 3);
            }
            other => panic!("Expected UnknownSetting, got {other:?}"),
        }
    }

    #[test]
    fn invalid_environment_is_rejected() {
        let result = resolve_settings(input(&[], &[("CONFFORM__EXPORT__ENVIRONMENT", "QA")]));
        assert!(result.is_err());
    }

    #[test]
    fn malformed_toml_reports_path() {
        let err = resolve_settings(input(&[("broken.toml", "[export\n")], &[])).unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn reads_existing_files_only() {
        let dir = TempDir::new().unwrap();
        let present = dir.path().join(SETTINGS_FILE);
        std::fs::write(&present, "[export]\ninclude_comments = true\n").unwrap();
        let missing = dir.path().join("nested").join(SETTINGS_FILE);

        let files = read_settings_files(&[missing, present.clone()]).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].0, present);

        let settings = resolve_settings(SettingsInput {
            files,
            env_vars: vec![],
        })
        .unwrap();
        assert!(settings.export.include_comments);
    }

    #[test]
    fn template_documents_every_key() {
        let template = settings_template();
        assert!(template.contains("[export]"));
        assert!(template.contains("environment"));
        assert!(template.contains("include_comments"));
        assert!(template.contains("extended_line_checks"));
    }

    #[test]
    fn search_paths_end_with_cwd() {
        let paths = settings_paths();
        let cwd = std::env::current_dir().unwrap().join(SETTINGS_FILE);
        assert_eq!(paths.last(), Some(&cwd));
    }

    #[test]
    fn find_key_line_tracks_sections() {
        let content = "[parse]\nenvironment = 1\n[export]\nenvironment = 2\n";
        assert_eq!(find_key_line(content, "export.environment"), 4);
        assert_eq!(find_key_line(content, "export.missing"), 0);
    }
}
