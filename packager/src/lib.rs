//! Portable packaging of live object trees
//!
//! This library provides:
//! - Packaging of a live object subtree into a portable, Ref-addressed form
//! - Lossless conversion between the flat and nested package forms
//! - Reconstruction of live objects from a package
//!
//! # Packages
//!
//! A flat package (`{Refs, RootRef, Tree}`) maps every Ref to one node and
//! records hierarchy in each node's `Parent` property. A nested package
//! (`{Refs, Tree}`) records hierarchy structurally through `Children`. Both
//! serialize to plain JSON-compatible data.
//!
//! # Capabilities
//!
//! Live objects are reached only through injected traits:
//! - [`SchemaProvider`]: declared class properties and change detection
//! - [`LiveObjectReader`] / [`LiveObjectWriter`]: object reads and writes
//! - [`IdGenerator`]: short unique Ref strings
//!
//! [`ApiDump`] and [`MemoryRuntime`] are ready-made implementations.
//!
//! # Usage
//!
//! ```no_run
//! use packager::{build_from_package, ApiDump, MemoryRuntime, Packager, ShortIdGenerator};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let schema = ApiDump::from_path("api-dump.json")?;
//! let mut runtime = MemoryRuntime::new();
//! let model = runtime.spawn("Model", "Car", None)?;
//! runtime.spawn("Part", "Body", Some(model))?;
//!
//! let packager = Packager::new(&schema, ShortIdGenerator::global());
//! let package = packager.create_package(&runtime, model)?;
//!
//! let mut destination = MemoryRuntime::new();
//! let copy = build_from_package(&package, &mut destination, packager.config())?;
//! # let _ = copy;
//! # Ok(())
//! # }
//! ```

pub mod assembler;
pub mod builder;
pub mod codec;
pub mod config;
pub mod convert;
pub mod error;
pub mod node;
pub mod refs;
pub mod runtime;
pub mod schema;
pub mod types;
pub mod validate;
pub mod value;

pub use assembler::Packager;
pub use builder::build_from_package;
pub use codec::{DefaultDecoder, DefaultEncoder, ValueDecoder, ValueEncoder};
pub use config::{PackagerConfig, PackagerSettings, SettingsError};
pub use convert::{convert_to_package, convert_to_package_flat, PortablePackage};
pub use error::{PackageError, PackageResult};
pub use node::NodeBuilder;
pub use refs::{IdGenerator, RefAllocator, SequentialIdGenerator, ShortIdGenerator};
pub use runtime::{
    EnumNamespace, LiveObjectReader, LiveObjectWriter, MemoryRuntime, RuntimeError,
    RuntimeResult,
};
pub use schema::{ApiDump, PropertyDescriptor, PropertyFilter, SchemaError, SchemaProvider};
pub use types::{
    from_json_str, from_json_value, FlatPackage, FlatTreeNode, NodeTable, ObjectId, Package,
    PropertyValue, Ref, TreeNode,
};
pub use validate::{validate_flat, PackageStats, ValidationReport};
pub use value::{EnumItem, Value};
