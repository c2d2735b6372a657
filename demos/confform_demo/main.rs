//! # confform demo application
//!
//! A small command-line front end over confform's operations. It exists to
//! exercise the library by hand against real template and `.conf` files.
//!
//! ## Running
//!
//! ```sh
//! cargo run --example confform_demo -- validate service.conf template.json
//! cargo run --example confform_demo -- export record.json template.json --env DEV
//! ```
//!
//! ## Commands
//!
//! | Command    | What it shows                                                  |
//! |------------|----------------------------------------------------------------|
//! | `parse`    | Lenient parse to JSON, or strict parse with `--schema`         |
//! | `validate` | Verdict with syntax errors, errors and warnings                |
//! | `check`    | One status line per schema field                               |
//! | `prefill`  | The form prefill shape, with per-environment values            |
//! | `export`   | `.conf` text for one environment, to stdout or `-o FILE`       |
//! | `diff`     | Changed, added and removed keys between two records            |
//! | `settings` | Resolved settings, or a commented template with `--template`   |
//!
//! Settings come from `confform.toml` (platform config dir, then cwd) and
//! `CONFFORM__SECTION__KEY` variables, e.g.
//! `CONFFORM__EXPORT__INCLUDE_COMMENTS=true`. Set `RUST_LOG=debug` to see
//! what the engine is doing.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use confform::{ConfArgs, ConfResult, FieldStatus, Settings};

/// confform demo: parse, validate and export .conf files against a template.
#[derive(Parser, Debug)]
#[command(name = "confform-demo")]
struct Cli {
    #[command(flatten)]
    conf: ConfArgs,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let settings = match confform::load_settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{e}");
            eprintln!("Falling back to default settings.");
            match Settings::defaults() {
                Ok(settings) => settings,
                Err(e) => {
                    eprintln!("{e}");
                    return ExitCode::FAILURE;
                }
            }
        }
    };

    let action = cli.conf.into_action();
    match confform::handle(&settings, &action) {
        Ok(result) => {
            println!("{result}");
            if failed(&result) {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn failed(result: &ConfResult) -> bool {
    match result {
        ConfResult::Validation(report) => !report.is_valid(),
        ConfResult::FieldReport {
            results,
            syntax_errors,
        } => {
            !syntax_errors.is_empty()
                || results
                    .iter()
                    .any(|r| matches!(r.status, FieldStatus::Missing | FieldStatus::Invalid))
        }
        _ => false,
    }
}
