//! Flat/nested package conversion
//!
//! Lossless structural transform between the Ref-addressed flat table, where a
//! node's parent is named by its `Parent` property, and the nested tree, where
//! parenthood is structural. Neither direction touches a live runtime.
//!
//! Nesting indexes children by parent Ref once instead of scanning the whole
//! table per node. Children keep the order they have in the flat table.

use std::borrow::Cow;
use std::collections::HashMap;

use tracing::warn;

use crate::error::{PackageError, PackageResult};
use crate::types::{
    FlatPackage, FlatTreeNode, NodeTable, Package, PropertyValue, Ref, TreeNode, PARENT_PROPERTY,
};

/// Either package form, normalized to the flat form on demand
pub trait PortablePackage {
    fn to_flat(&self) -> PackageResult<Cow<'_, FlatPackage>>;
}

impl PortablePackage for FlatPackage {
    fn to_flat(&self) -> PackageResult<Cow<'_, FlatPackage>> {
        Ok(Cow::Borrowed(self))
    }
}

impl PortablePackage for Package {
    fn to_flat(&self) -> PackageResult<Cow<'_, FlatPackage>> {
        convert_to_package_flat(self).map(Cow::Owned)
    }
}

/// Nest a flat package under its root.
///
/// Nodes that cannot be reached from the root by following parent links are
/// dropped with a warning. A RootRef missing from the table is an error.
pub fn convert_to_package(flat: &FlatPackage) -> PackageResult<Package> {
    let root = flat
        .root()
        .ok_or_else(|| PackageError::missing_root(flat.root_ref.as_str()))?;

    let mut children_of: HashMap<&str, Vec<(&Ref, &FlatTreeNode)>> = HashMap::new();
    for (reference, node) in flat.tree.iter() {
        if *reference == flat.root_ref {
            continue;
        }
        if let Some(parent) = node.parent_ref() {
            children_of.entry(parent).or_default().push((reference, node));
        }
    }

    let mut nested = 0;
    let tree = nest(&flat.root_ref, root, &children_of, &mut nested);

    if nested < flat.tree.len() {
        warn!(
            root = %flat.root_ref,
            dropped = flat.tree.len() - nested,
            "Dropping nodes unreachable from the package root"
        );
    }

    Ok(Package {
        refs: flat.refs.clone(),
        tree,
    })
}

fn nest(
    reference: &Ref,
    node: &FlatTreeNode,
    children_of: &HashMap<&str, Vec<(&Ref, &FlatTreeNode)>>,
    nested: &mut usize,
) -> TreeNode {
    *nested += 1;

    let children = children_of
        .get(reference.as_str())
        .map(|children| {
            children
                .iter()
                .map(|(child_ref, child)| nest(child_ref, child, children_of, nested))
                .collect()
        })
        .unwrap_or_default();

    let mut properties = node.properties.clone();
    properties.remove(PARENT_PROPERTY);

    TreeNode {
        name: node.name.clone(),
        class_name: node.class_name.clone(),
        reference: reference.clone(),
        properties,
        attributes: node.attributes.clone(),
        tags: node.tags.clone(),
        children,
    }
}

/// Flatten a nested package, recording each non-root node's parent in its
/// `Parent` property. Nodes are emitted depth-first, parents before children.
pub fn convert_to_package_flat(package: &Package) -> PackageResult<FlatPackage> {
    let mut tree = NodeTable::with_capacity(package.tree.node_count());
    flatten(&package.tree, None, &mut tree)?;

    Ok(FlatPackage {
        refs: package.refs.clone(),
        root_ref: package.tree.reference.clone(),
        tree,
    })
}

fn flatten(node: &TreeNode, parent: Option<&Ref>, tree: &mut NodeTable) -> PackageResult<()> {
    let mut flat = node.to_flat_node();
    flat.properties.remove(PARENT_PROPERTY);
    if let Some(parent) = parent {
        flat.properties
            .insert(PARENT_PROPERTY.to_string(), PropertyValue::reference(parent));
    }

    if tree.insert(node.reference.clone(), flat).is_some() {
        return Err(PackageError::DuplicateRef {
            reference: node.reference.to_string(),
        });
    }

    for child in &node.children {
        flatten(child, Some(&node.reference), tree)?;
    }
    Ok(())
}
