//! Subcommand implementations
//!
//! Each command takes parsed inputs and returns a serializable result; reading
//! files and printing are left to the caller.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use packager::{
    build_from_package, convert_to_package, validate_flat, ApiDump, FlatPackage, MemoryRuntime,
    Package, PackagerConfig, Packager, PortablePackage, PropertyDescriptor, SchemaProvider,
    ShortIdGenerator, ValidationReport,
};
use serde::Serialize;
use tracing::info;

use crate::AnyPackage;

/// Nested form of a package
pub fn nest(package: AnyPackage) -> Result<Package> {
    match package {
        AnyPackage::Nested(nested) => Ok(nested),
        AnyPackage::Flat(flat) => convert_to_package(&flat).context("Failed to nest package"),
    }
}

/// Flat form of a package
pub fn flatten(package: &AnyPackage) -> Result<FlatPackage> {
    let flat = package.to_flat().context("Failed to flatten package")?;
    Ok(flat.into_owned())
}

/// Structural report for a package in either form
pub fn validate(package: &AnyPackage) -> Result<ValidationReport> {
    let flat = package.to_flat().context("Failed to flatten package")?;
    Ok(validate_flat(&flat))
}

/// Result of rebuilding a package
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BuildOutcome {
    pub objects: usize,
    /// Indented `Name (Class)` outline of the rebuilt tree
    pub outline: String,
    /// The rebuilt tree packaged again, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<FlatPackage>,
}

/// Rebuild `package` into a fresh in-memory runtime, validated against
/// `schema` when one is given. With `repackage`, the rebuilt tree is packaged
/// again with fresh Refs; that needs a schema.
pub fn build(
    package: &AnyPackage,
    schema: Option<Arc<ApiDump>>,
    config: &PackagerConfig,
    repackage: bool,
) -> Result<BuildOutcome> {
    let mut runtime = match &schema {
        Some(schema) => MemoryRuntime::with_schema(schema.clone()),
        None => MemoryRuntime::new(),
    };

    let root = build_from_package(package, &mut runtime, config).context("Build failed")?;
    let outline = runtime.render_tree(root)?;

    let package = if repackage {
        let Some(schema) = &schema else {
            bail!("--repackage needs a schema (--schema or schema_path in settings)");
        };
        let packager =
            Packager::new(&**schema, ShortIdGenerator::global()).with_config(config.clone());
        Some(packager.create_package_flat(&runtime, root)?)
    } else {
        None
    };

    info!(objects = runtime.len(), "Rebuilt package in memory");
    Ok(BuildOutcome {
        objects: runtime.len(),
        outline,
        package,
    })
}

/// Classes in a dump, or one class's properties
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SchemaListing {
    Classes(Vec<String>),
    Properties(Vec<PropertyDescriptor>),
}

pub fn schema(dump: &ApiDump, class_name: Option<&str>) -> Result<SchemaListing> {
    match class_name {
        None => Ok(SchemaListing::Classes(
            dump.class_names().into_iter().map(str::to_string).collect(),
        )),
        Some(class_name) => {
            if !dump.has_class(class_name) {
                bail!("Unknown class {class_name}");
            }
            Ok(SchemaListing::Properties(dump.class_properties(class_name)))
        }
    }
}
