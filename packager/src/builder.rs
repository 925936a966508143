//! Package reconstruction
//!
//! Recreates live objects from a package in two passes. The first pass
//! constructs and names one object per node; the second assigns properties,
//! attributes and tags. Links between objects can then resolve no matter the
//! order nodes appear in, including siblings that point at each other.
//!
//! Hierarchy is restored through the `Parent` property like any other link. The
//! root carries no `Parent`, so the returned object is left detached.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::codec::decode;
use crate::config::PackagerConfig;
use crate::convert::PortablePackage;
use crate::error::{PackageError, PackageResult};
use crate::runtime::LiveObjectWriter;
use crate::types::{FlatTreeNode, ObjectId, Ref};
use crate::value::Value;

/// Rebuild the objects described by `package` inside `runtime` and return the
/// root object.
///
/// Runtime failures (unknown classes, rejected writes) abort the build and are
/// returned as-is. A `Ref` property whose target is not in the package is
/// skipped.
pub fn build_from_package<P, W>(
    package: &P,
    runtime: &mut W,
    config: &PackagerConfig,
) -> PackageResult<ObjectId>
where
    P: PortablePackage + ?Sized,
    W: LiveObjectWriter,
{
    let flat = package.to_flat()?;
    if flat.root().is_none() {
        return Err(PackageError::missing_root(flat.root_ref.as_str()));
    }

    let mut instances: HashMap<&Ref, ObjectId> = HashMap::with_capacity(flat.tree.len());
    for (reference, node) in flat.tree.iter() {
        let object = runtime.create(&node.class_name)?;
        runtime.set_name(object, &node.name)?;
        instances.insert(reference, object);
    }

    for (reference, node) in flat.tree.iter() {
        if let Some(object) = instances.get(reference) {
            apply_node(runtime, *object, node, &instances, config)?;
        }
    }

    let root = instances
        .get(&flat.root_ref)
        .copied()
        .ok_or_else(|| PackageError::missing_root(flat.root_ref.as_str()))?;

    info!(root = %flat.root_ref, objects = instances.len(), "Built package");
    Ok(root)
}

fn apply_node<W: LiveObjectWriter>(
    runtime: &mut W,
    object: ObjectId,
    node: &FlatTreeNode,
    instances: &HashMap<&Ref, ObjectId>,
    config: &PackagerConfig,
) -> PackageResult<()> {
    for (name, property) in &node.properties {
        let value = if property.is_ref() {
            let target = property
                .ref_target()
                .and_then(|target| instances.get(&Ref::from(target)));
            match target {
                Some(target) => Value::Object(Some(*target)),
                None => {
                    debug!(
                        %object,
                        property = %name,
                        target = %property.value,
                        "Skipping link to an object missing from the package"
                    );
                    continue;
                }
            }
        } else {
            decode(property, config.decoder(), &*runtime)?
        };
        runtime.set_property(object, name, value)?;
    }

    for (name, attribute) in &node.attributes {
        let value = decode(attribute, config.decoder(), &*runtime)?;
        runtime.set_attribute(object, name, value)?;
    }

    for tag in &node.tags {
        runtime.add_tag(object, tag)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{LiveObjectReader, MemoryRuntime, RuntimeError};
    use crate::types::{FlatPackage, NodeTable, PropertyValue, PARENT_PROPERTY};
    use crate::value::EnumItem;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn node(reference: &str, class_name: &str, parent: Option<&str>) -> FlatTreeNode {
        let mut properties = BTreeMap::new();
        if let Some(parent) = parent {
            properties.insert(
                PARENT_PROPERTY.to_string(),
                PropertyValue::reference(&Ref::from(parent)),
            );
        }
        FlatTreeNode {
            name: format!("{class_name}-{reference}"),
            class_name: class_name.to_string(),
            reference: Ref::from(reference),
            properties,
            attributes: BTreeMap::new(),
            tags: Vec::new(),
        }
    }

    fn package(root: &str, nodes: Vec<FlatTreeNode>) -> FlatPackage {
        FlatPackage {
            refs: BTreeMap::new(),
            root_ref: Ref::from(root),
            tree: nodes
                .into_iter()
                .map(|n| (n.reference.clone(), n))
                .collect::<NodeTable>(),
        }
    }

    #[test]
    fn test_hierarchy_is_restored() {
        let flat = package(
            "m",
            vec![
                node("m", "Model", None),
                node("p", "Part", Some("m")),
                node("q", "Part", Some("p")),
            ],
        );
        let mut runtime = MemoryRuntime::new();
        let root = build_from_package(&flat, &mut runtime, &PackagerConfig::default()).unwrap();

        assert_eq!(runtime.parent(root).unwrap(), None);
        assert_eq!(
            runtime.render_tree(root).unwrap(),
            "Model-m (Model)\n  Part-p (Part)\n    Part-q (Part)\n"
        );
    }

    #[test]
    fn test_mutual_links_resolve_in_any_order() {
        for order in [["a", "b"], ["b", "a"]] {
            let mut nodes = vec![node("root", "Folder", None)];
            for reference in order {
                let other = if reference == "a" { "b" } else { "a" };
                let mut sibling = node(reference, "ObjectValue", Some("root"));
                sibling
                    .properties
                    .insert("Value".to_string(), PropertyValue::reference(&Ref::from(other)));
                nodes.push(sibling);
            }
            let flat = package("root", nodes);

            let mut runtime = MemoryRuntime::new();
            let root = build_from_package(&flat, &mut runtime, &PackagerConfig::default()).unwrap();
            let a = runtime.find_child(root, "ObjectValue-a").unwrap();
            let b = runtime.find_child(root, "ObjectValue-b").unwrap();
            assert_eq!(runtime.property(a, "Value").unwrap(), Value::Object(Some(b)));
            assert_eq!(runtime.property(b, "Value").unwrap(), Value::Object(Some(a)));
        }
    }

    #[test]
    fn test_values_attributes_and_tags() {
        let mut part = node("p", "Part", None);
        part.properties
            .insert("Anchored".to_string(), PropertyValue::new("boolean", json!(true)));
        part.properties.insert(
            "Material".to_string(),
            PropertyValue::new("Enum", json!({"Type": "Material", "Value": "Neon"})),
        );
        part.attributes
            .insert("Speed".to_string(), PropertyValue::new("number", json!(12)));
        part.tags = vec!["Hot".to_string(), "Shiny".to_string()];

        let mut runtime = MemoryRuntime::new();
        let flat = package("p", vec![part]);
        let root = build_from_package(&flat, &mut runtime, &PackagerConfig::default()).unwrap();

        assert_eq!(runtime.name(root).unwrap(), "Part-p");
        assert_eq!(runtime.property(root, "Anchored").unwrap(), Value::Bool(true));
        assert_eq!(
            runtime.property(root, "Material").unwrap(),
            Value::Enum(EnumItem::new("Material", "Neon"))
        );
        assert_eq!(runtime.attributes(root).unwrap()["Speed"], Value::Number(12.0));
        assert_eq!(runtime.tags(root).unwrap(), vec!["Hot", "Shiny"]);
    }

    #[test]
    fn test_dangling_ref_is_skipped() {
        let mut pointer = node("v", "ObjectValue", None);
        pointer
            .properties
            .insert("Value".to_string(), PropertyValue::reference(&Ref::from("gone")));
        pointer
            .properties
            .insert("Broken".to_string(), PropertyValue::new("Ref", json!(42)));

        let mut runtime = MemoryRuntime::new();
        let flat = package("v", vec![pointer]);
        let root = build_from_package(&flat, &mut runtime, &PackagerConfig::default()).unwrap();
        assert_eq!(runtime.property(root, "Value").unwrap(), Value::Nil);
        assert_eq!(runtime.property(root, "Broken").unwrap(), Value::Nil);
    }

    #[test]
    fn test_runtime_failures_propagate() {
        let flat = package("x", vec![node("x", "Spaceship", None)]);
        let mut runtime = MemoryRuntime::with_schema(std::sync::Arc::new(
            crate::schema::ApiDump::from_json_str(crate::schema::dump::tests::SAMPLE_DUMP).unwrap(),
        ));
        let err = build_from_package(&flat, &mut runtime, &PackagerConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            PackageError::Runtime(RuntimeError::UnknownClass { .. })
        ));
    }

    #[test]
    fn test_missing_root_fails_before_creating_anything() {
        let flat = package("nope", vec![node("a", "Folder", None)]);
        let mut runtime = MemoryRuntime::new();
        let err = build_from_package(&flat, &mut runtime, &PackagerConfig::default()).unwrap_err();
        assert!(err.is_corrupt_input());
        assert!(runtime.is_empty());
    }

    #[test]
    fn test_custom_decoder() {
        let mut part = node("p", "Part", None);
        part.properties
            .insert("Transparency".to_string(), PropertyValue::new("number", json!(0.25)));
        let config = PackagerConfig::default().with_decoder(
            |_: &PropertyValue, _: &dyn crate::runtime::EnumNamespace| -> PackageResult<Value> {
                Ok(Value::from("decoded"))
            },
        );

        let mut runtime = MemoryRuntime::new();
        let root = build_from_package(&package("p", vec![part]), &mut runtime, &config).unwrap();
        assert_eq!(
            runtime.property(root, "Transparency").unwrap(),
            Value::from("decoded")
        );
    }
}
