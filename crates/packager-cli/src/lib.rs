//! Command-line front end for object packages
//!
//! File-level wrappers around the packager's pure transforms:
//! - `nest` / `flatten`: convert between the nested and flat package forms
//! - `validate`: structural checks on a package
//! - `build`: rebuild a package into an in-memory runtime
//! - `schema`: inspect classes in an API dump
//!
//! Packages are read as JSON or YAML and written in either format.

pub mod commands;

use std::borrow::Cow;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use packager::{
    from_json_str, from_json_value, FlatPackage, Package, PackageResult, PortablePackage,
};
use serde::Serialize;

/// Key present only in the flat package form
const ROOT_REF_KEY: &str = "RootRef";

/// Output encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    #[default]
    Json,
    Yaml,
}

impl Format {
    /// Pretty-print `value`
    pub fn render<T: Serialize>(self, value: &T) -> Result<String> {
        match self {
            Self::Json => serde_json::to_string_pretty(value).context("Failed to encode JSON"),
            Self::Yaml => serde_yaml::to_string(value).context("Failed to encode YAML"),
        }
    }
}

/// A package file in either form.
///
/// The form is chosen by the `RootRef` key, which only the flat form has. The
/// document is then read as that form directly, so a malformed package reports
/// the field that is wrong.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnyPackage {
    Flat(FlatPackage),
    Nested(Package),
}

impl AnyPackage {
    pub fn from_json(document: serde_json::Value) -> serde_json::Result<Self> {
        if document.get(ROOT_REF_KEY).is_some() {
            from_json_value(document).map(Self::Flat)
        } else {
            from_json_value(document).map(Self::Nested)
        }
    }

    pub fn from_yaml(document: serde_yaml::Value) -> serde_yaml::Result<Self> {
        if document.get(ROOT_REF_KEY).is_some() {
            serde_yaml::from_value(document).map(Self::Flat)
        } else {
            serde_yaml::from_value(document).map(Self::Nested)
        }
    }
}

impl PortablePackage for AnyPackage {
    fn to_flat(&self) -> PackageResult<Cow<'_, FlatPackage>> {
        match self {
            Self::Flat(flat) => flat.to_flat(),
            Self::Nested(nested) => nested.to_flat(),
        }
    }
}

/// Read a package file. `.yaml`/`.yml` files are parsed as YAML, everything
/// else as JSON.
///
/// JSON has no nesting limit. serde_yaml stops at 128 levels, which a nested
/// package reaches at about 60 tree levels; such files are rejected with a
/// hint to use JSON or the flat form.
pub fn read_package(path: &Path) -> Result<AnyPackage> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));

    if is_yaml {
        let document: serde_yaml::Value = match serde_yaml::from_str(&content) {
            Ok(document) => document,
            Err(e) if e.to_string().contains("recursion limit exceeded") => bail!(
                "{} is nested too deeply for YAML; store deep packages as JSON or in flat form",
                path.display()
            ),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to parse YAML from {}", path.display()))
            }
        };
        AnyPackage::from_yaml(document)
            .with_context(|| format!("Invalid package in {}", path.display()))
    } else {
        let document: serde_json::Value = from_json_str(&content)
            .with_context(|| format!("Failed to parse JSON from {}", path.display()))?;
        AnyPackage::from_json(document)
            .with_context(|| format!("Invalid package in {}", path.display()))
    }
}

/// Write `content` to `path`, or to stdout when no path is given
pub fn write_output(path: Option<&Path>, content: &str) -> Result<()> {
    match path {
        Some(path) => fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            println!("{content}");
            Ok(())
        }
    }
}
