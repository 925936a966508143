//! Flat node builder
//!
//! Turns one live object into a [`FlatTreeNode`], given the Refs already
//! assigned to every object in the packaged tree.
//!
//! Only properties that differ from the class default and are writable are
//! packaged. Links to other objects become `Ref` values when the target is part of
//! the package and are dropped otherwise, so a package never points outside
//! itself. A property that cannot be read is skipped; it never aborts the rest
//! of the package.

use std::collections::BTreeMap;

use tracing::debug;

use crate::codec::{encode, ValueEncoder};
use crate::error::{PackageError, PackageResult};
use crate::runtime::LiveObjectReader;
use crate::schema::{PropertyFilter, SchemaProvider};
use crate::types::{
    FlatTreeNode, ObjectId, PropertyValue, Ref, INSTANCE_TYPE, NAME_PROPERTY, PARENT_PROPERTY,
};
use crate::value::Value;

/// Builds flat nodes for objects of one live tree
pub struct NodeBuilder<'a> {
    reader: &'a dyn LiveObjectReader,
    schema: &'a dyn SchemaProvider,
    encoder: &'a dyn ValueEncoder,
}

impl<'a> NodeBuilder<'a> {
    pub fn new(
        reader: &'a dyn LiveObjectReader,
        schema: &'a dyn SchemaProvider,
        encoder: &'a dyn ValueEncoder,
    ) -> Self {
        Self {
            reader,
            schema,
            encoder,
        }
    }

    /// Build the node for `object`. `refs` must already hold a Ref for `object`
    /// and for every other object in the package.
    pub fn build(
        &self,
        object: ObjectId,
        refs: &BTreeMap<ObjectId, Ref>,
    ) -> PackageResult<FlatTreeNode> {
        let reference = refs
            .get(&object)
            .cloned()
            .ok_or_else(|| PackageError::corrupt(format!("object {object} has no ref")))?;

        let mut node = FlatTreeNode {
            name: self.reader.name(object)?,
            class_name: self.reader.class_name(object)?,
            reference,
            properties: BTreeMap::new(),
            attributes: BTreeMap::new(),
            tags: Vec::new(),
        };

        for changed in self
            .schema
            .changed_properties(self.reader, object, PropertyFilter::Writable)
        {
            let name = changed.name();
            if name == NAME_PROPERTY || name == PARENT_PROPERTY {
                continue;
            }

            let semantic_type = changed.descriptor.semantic_type();
            if semantic_type == INSTANCE_TYPE {
                if let Some(link) = link_to(&changed.value, refs) {
                    node.properties.insert(name.to_string(), link);
                } else {
                    debug!(%object, property = name, "Dropping link that leaves the package");
                }
                continue;
            }

            node.properties.insert(
                name.to_string(),
                encode(&changed.value, semantic_type, self.encoder),
            );
        }

        match self.reader.parent(object) {
            Ok(parent) => {
                if let Some(link) = link_to(&Value::Object(parent), refs) {
                    node.properties.insert(PARENT_PROPERTY.to_string(), link);
                }
            }
            Err(e) => debug!(%object, error = %e, "Parent unreadable"),
        }

        match self.reader.tags(object) {
            Ok(tags) => node.tags = tags,
            Err(e) => debug!(%object, error = %e, "Tags unreadable"),
        }

        match self.reader.attributes(object) {
            Ok(attributes) => {
                node.attributes = attributes
                    .iter()
                    .map(|(name, value)| {
                        (name.clone(), encode(value, value.type_name(), self.encoder))
                    })
                    .collect();
            }
            Err(e) => debug!(%object, error = %e, "Attributes unreadable"),
        }

        Ok(node)
    }
}

/// `Ref` value for a link whose target is inside the package
fn link_to(value: &Value, refs: &BTreeMap<ObjectId, Ref>) -> Option<PropertyValue> {
    match value {
        Value::Object(Some(target)) => refs.get(target).map(PropertyValue::reference),
        _ => None,
    }
}
