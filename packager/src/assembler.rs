//! Package assembly
//!
//! Walks a live tree, assigns every object a Ref, then builds one flat node per
//! object. All Refs are assigned before any node is built so that links to
//! objects visited later still resolve.

use tracing::info;

use crate::config::PackagerConfig;
use crate::convert::convert_to_package;
use crate::error::PackageResult;
use crate::node::NodeBuilder;
use crate::refs::{IdGenerator, RefAllocator};
use crate::runtime::LiveObjectReader;
use crate::schema::SchemaProvider;
use crate::types::{FlatPackage, NodeTable, ObjectId, Package};

/// Packages live object trees
pub struct Packager<'a> {
    schema: &'a dyn SchemaProvider,
    ids: &'a dyn IdGenerator,
    config: PackagerConfig,
}

impl<'a> Packager<'a> {
    pub fn new(schema: &'a dyn SchemaProvider, ids: &'a dyn IdGenerator) -> Self {
        Self {
            schema,
            ids,
            config: PackagerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PackagerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &PackagerConfig {
        &self.config
    }

    /// Package `root` and all of its descendants into a flat, Ref-addressed table
    pub fn create_package_flat(
        &self,
        reader: &dyn LiveObjectReader,
        root: ObjectId,
    ) -> PackageResult<FlatPackage> {
        let mut objects = vec![root];
        objects.extend(reader.descendants(root)?);

        let mut allocator = RefAllocator::new(self.ids, self.config.ref_length());
        let root_ref = allocator.allocate(root)?;
        for object in &objects[1..] {
            allocator.allocate(*object)?;
        }
        let refs = allocator.into_refs();

        let builder = NodeBuilder::new(reader, self.schema, self.config.encoder());
        let mut tree = NodeTable::with_capacity(objects.len());
        for object in &objects {
            let node = builder.build(*object, &refs)?;
            tree.insert(node.reference.clone(), node);
        }

        info!(root = %root_ref, nodes = tree.len(), "Packaged object tree");

        Ok(FlatPackage {
            refs,
            root_ref,
            tree,
        })
    }

    /// Package `root` and all of its descendants into a nested tree
    pub fn create_package(
        &self,
        reader: &dyn LiveObjectReader,
        root: ObjectId,
    ) -> PackageResult<Package> {
        convert_to_package(&self.create_package_flat(reader, root)?)
    }
}
