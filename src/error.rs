use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfformError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse schema {path}: {source}")]
    SchemaParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to parse record {path}: {source}")]
    RecordParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to parse settings {path}: {source}")]
    SettingsParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Unknown setting '{key}' in {path} (line {line})")]
    UnknownSetting {
        key: String,
        path: PathBuf,
        line: usize,
    },

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Settings error: {0}")]
    Settings(#[from] confique::Error),

    #[error("Duplicate field key '{0}' in schema")]
    DuplicateKey(String),

    #[error("Unknown environment '{0}', expected one of PROD, DEV, COB")]
    UnknownEnvironment(String),

    #[error("Invalid condition '{expression}': {reason}")]
    InvalidCondition { expression: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_mentions_path() {
        let err = ConfformError::Io {
            path: "/srv/templates/app.conf".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        let msg = err.to_string();
        assert!(msg.contains("app.conf"));
        assert!(msg.contains("gone"));
    }

    #[test]
    fn unknown_setting_formats() {
        let err = ConfformError::UnknownSetting {
            key: "export.colour".into(),
            path: "/home/user/.config/confform/confform.toml".into(),
            line: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("export.colour"));
        assert!(msg.contains("confform.toml"));
        assert!(msg.contains("line 3"));
    }

    #[test]
    fn duplicate_key_formats() {
        let err = ConfformError::DuplicateKey("env".into());
        assert!(err.to_string().contains("'env'"));
    }

    #[test]
    fn unknown_environment_lists_choices() {
        let err = ConfformError::UnknownEnvironment("QA".into());
        let msg = err.to_string();
        assert!(msg.contains("QA"));
        assert!(msg.contains("PROD, DEV, COB"));
    }
}
