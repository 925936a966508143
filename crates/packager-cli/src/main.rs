//! Object package tool
//!
//! # Usage
//!
//! ```bash
//! # Nested form of a flat package
//! packager nest car.flat.json -o car.json
//!
//! # Flat form, as YAML
//! packager flatten car.json --format yaml
//!
//! # Structural checks
//! packager validate car.flat.json
//!
//! # Rebuild against an API dump and print the hierarchy
//! packager build car.json --schema api-dump.json
//!
//! # List a class's properties
//! PACKAGER_SCHEMA=api-dump.json packager schema Part
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use packager::{ApiDump, PackagerConfig, PackagerSettings};
use packager_cli::{commands, read_package, write_output, Format};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Settings file (TOML); PACKAGER_REF_LENGTH and PACKAGER_SCHEMA override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// API dump used as the schema (overrides settings)
    #[arg(long, global = true)]
    schema: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Json, global = true)]
    format: Format,

    /// Write output here instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Log lenient skips and other details
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a package to nested form
    Nest { input: PathBuf },

    /// Convert a package to flat form
    Flatten { input: PathBuf },

    /// Check a package for structural problems; exits non-zero when issues are found
    Validate { input: PathBuf },

    /// Rebuild a package in memory and print its hierarchy
    Build {
        input: PathBuf,

        /// Also emit the rebuilt tree packaged again with fresh Refs
        #[arg(long, default_value_t = false)]
        repackage: bool,
    },

    /// List the classes in the schema, or one class's properties
    Schema { class_name: Option<String> },
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "packager=debug,packager_cli=debug"
    } else {
        "packager=info,packager_cli=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = match &args.config {
        Some(path) => PackagerSettings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => PackagerSettings::default()
            .with_env_overrides()
            .context("Invalid settings in environment")?,
    };
    debug!(?settings, "Loaded settings");
    let config = PackagerConfig::from_settings(&settings);

    let schema_path = args.schema.clone().or_else(|| settings.schema_path.clone());
    let load_schema = || -> Result<Option<Arc<ApiDump>>> {
        schema_path
            .as_ref()
            .map(|path| {
                ApiDump::from_path(path)
                    .map(Arc::new)
                    .with_context(|| format!("Failed to load schema from {}", path.display()))
            })
            .transpose()
    };

    let output = args.output.as_deref();
    match &args.command {
        Command::Nest { input } => {
            let package = read_package(input)?;
            let nested = commands::nest(package)?;
            write_output(output, &args.format.render(&nested)?)?;
        }
        Command::Flatten { input } => {
            let package = read_package(input)?;
            let flat = commands::flatten(&package)?;
            write_output(output, &args.format.render(&flat)?)?;
        }
        Command::Validate { input } => {
            let package = read_package(input)?;
            let report = commands::validate(&package)?;
            write_output(output, &args.format.render(&report)?)?;
            if !report.is_valid() {
                warn!(issues = report.issues.len(), "Package has structural issues");
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Build { input, repackage } => {
            let package = read_package(input)?;
            let outcome = commands::build(&package, load_schema()?, &config, *repackage)?;
            match &outcome.package {
                Some(repackaged) => write_output(output, &args.format.render(repackaged)?)?,
                None => write_output(output, outcome.outline.trim_end())?,
            }
        }
        Command::Schema { class_name } => {
            let dump = load_schema()?.context(
                "No schema given (use --schema, PACKAGER_SCHEMA or schema_path in settings)",
            )?;
            let listing = commands::schema(&dump, class_name.as_deref())?;
            write_output(output, &args.format.render(&listing)?)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
