//! Clap adapter for confform.
//!
//! This module is the optional integration layer between the
//! framework-agnostic core and [clap](https://docs.rs/clap). It is compiled
//! only when the `clap` Cargo feature is enabled (on by default).
//!
//! [`ConfArgs`] and [`ConfSubcommand`] can be embedded in an application's
//! own `#[derive(Parser)]` struct. The only bridge to the core is
//! [`ConfArgs::into_action()`], which produces a
//! [`ConfAction`](crate::ConfAction) for [`ops::handle`](crate::ops::handle).

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::types::{ConfAction, Environment};

/// Clap-derived args for the `.conf` tooling subcommands.
///
/// ```ignore
/// #[derive(Parser)]
/// struct Cli {
///     #[command(flatten)]
///     conf: ConfArgs,
/// }
/// ```
#[derive(Debug, Args)]
pub struct ConfArgs {
    #[command(subcommand)]
    pub action: ConfSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfSubcommand {
    /// Parse a .conf file and print the record as JSON.
    Parse {
        conf: PathBuf,
        /// Parse strictly against this schema, reporting syntax errors.
        #[arg(long)]
        schema: Option<PathBuf>,
    },
    /// Validate a .conf file against a template schema.
    Validate { conf: PathBuf, schema: PathBuf },
    /// Show one validation status per schema field.
    Check {
        conf: PathBuf,
        schema: PathBuf,
        /// Additional keys to report as extra (repeatable).
        #[arg(long = "extra")]
        extra: Vec<String>,
    },
    /// Map a .conf file or stored JSON record to the form prefill shape.
    Prefill { conf: PathBuf, schema: PathBuf },
    /// Export a stored record as .conf text for one environment.
    Export {
        record: PathBuf,
        schema: PathBuf,
        /// PROD, DEV or COB. Defaults to the `export.environment` setting.
        #[arg(short, long, value_parser = parse_environment)]
        env: Option<Environment>,
        /// Write to a file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Compare two records key by key.
    Diff { old: PathBuf, new: PathBuf },
    /// Show the resolved settings.
    Settings {
        /// Print a commented settings template instead.
        #[arg(long)]
        template: bool,
    },
}

fn parse_environment(s: &str) -> Result<Environment, String> {
    s.parse().map_err(|e: crate::error::ConfformError| e.to_string())
}

impl ConfArgs {
    /// Convert clap-parsed args into a framework-agnostic `ConfAction`.
    pub fn into_action(self) -> ConfAction {
        match self.action {
            ConfSubcommand::Parse { conf, schema } => ConfAction::Parse {
                conf,
                strict_schema: schema,
            },
            ConfSubcommand::Validate { conf, schema } => ConfAction::Validate { conf, schema },
            ConfSubcommand::Check {
                conf,
                schema,
                extra,
            } => ConfAction::Check {
                conf,
                schema,
                extra,
            },
            ConfSubcommand::Prefill { conf, schema } => ConfAction::Prefill { conf, schema },
            ConfSubcommand::Export {
                record,
                schema,
                env,
                output,
            } => ConfAction::Export {
                record,
                schema,
                environment: env,
                output,
            },
            ConfSubcommand::Diff { old, new } => ConfAction::Diff { old, new },
            ConfSubcommand::Settings { template } => ConfAction::Settings { template },
        }
    }
}
