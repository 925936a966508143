//! Portable package types
//!
//! These are the only values the packager persists or transmits. Every field
//! holds plain structured data (objects, arrays, strings, numbers, booleans,
//! null), so a package survives any standard structured-data format.
//!
//! Field names follow the wire shape (`Name`, `ClassName`, `Ref`, `Properties`,
//! `Attributes`, `Tags`, `Children`, `Refs`, `RootRef`, `Tree`).

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::de::{DeserializeOwned, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Reserved Type tag for a link to another node in the same package
pub const REF_TYPE: &str = "Ref";

/// Reserved Type tag for an enumerated value
pub const ENUM_TYPE: &str = "Enum";

/// Semantic type of properties that point at other live objects
pub const INSTANCE_TYPE: &str = "Instance";

/// Property carrying the parent link in flat form
pub const PARENT_PROPERTY: &str = "Parent";

/// Property carried by the dedicated `Name` field instead of `Properties`
pub const NAME_PROPERTY: &str = "Name";

/// Opaque identity of a live object inside one runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// Accepts numeric strings too: JSON map keys are always strings, and buffered
// (untagged) deserialization does not convert them back to integers.
impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ObjectIdVisitor;

        impl<'de> Visitor<'de> for ObjectIdVisitor {
            type Value = ObjectId;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a non-negative integer object id")
            }

            fn visit_u64<E: serde::de::Error>(self, value: u64) -> Result<Self::Value, E> {
                Ok(ObjectId(value))
            }

            fn visit_i64<E: serde::de::Error>(self, value: i64) -> Result<Self::Value, E> {
                u64::try_from(value)
                    .map(ObjectId)
                    .map_err(|_| E::custom(format!("negative object id {value}")))
            }

            fn visit_str<E: serde::de::Error>(self, value: &str) -> Result<Self::Value, E> {
                value
                    .parse()
                    .map(ObjectId)
                    .map_err(|_| E::custom(format!("invalid object id '{value}'")))
            }
        }

        deserializer.deserialize_any(ObjectIdVisitor)
    }
}

/// Symbolic reference to one node, unique within a packaging or build session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ref(String);

impl Ref {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Ref {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Ref {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Ref {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Portable `{Type, Value}` encoding of one property or attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyValue {
    #[serde(rename = "Type")]
    pub value_type: String,

    #[serde(rename = "Value", default)]
    pub value: serde_json::Value,
}

impl PropertyValue {
    pub fn new(value_type: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            value_type: value_type.into(),
            value,
        }
    }

    /// A `Ref`-typed value pointing at another node
    pub fn reference(target: &Ref) -> Self {
        Self::new(REF_TYPE, serde_json::Value::String(target.to_string()))
    }

    pub fn is_ref(&self) -> bool {
        self.value_type == REF_TYPE
    }

    /// Target of a `Ref`-typed value, if this is one and it is well formed
    pub fn ref_target(&self) -> Option<&str> {
        if self.is_ref() {
            self.value.as_str()
        } else {
            None
        }
    }
}

/// Nested node: a packaged object with its children inline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TreeNode {
    pub name: String,

    pub class_name: String,

    #[serde(rename = "Ref")]
    pub reference: Ref,

    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, PropertyValue>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Copy of this node's own fields, without children
    pub fn to_flat_node(&self) -> FlatTreeNode {
        FlatTreeNode {
            name: self.name.clone(),
            class_name: self.class_name.clone(),
            reference: self.reference.clone(),
            properties: self.properties.clone(),
            attributes: self.attributes.clone(),
            tags: self.tags.clone(),
        }
    }

    /// Pre-order iterator over this node and all of its descendants
    pub fn iter(&self) -> TreeIter<'_> {
        TreeIter { stack: vec![self] }
    }

    /// Number of nodes in this subtree, including this one
    pub fn node_count(&self) -> usize {
        self.iter().count()
    }
}

/// Pre-order traversal over a nested tree
pub struct TreeIter<'a> {
    stack: Vec<&'a TreeNode>,
}

impl<'a> Iterator for TreeIter<'a> {
    type Item = &'a TreeNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Flat node: parent linkage lives in `Properties["Parent"]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FlatTreeNode {
    pub name: String,

    pub class_name: String,

    #[serde(rename = "Ref")]
    pub reference: Ref,

    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, PropertyValue>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl FlatTreeNode {
    /// Ref of this node's parent, if it carries a well-formed parent link
    pub fn parent_ref(&self) -> Option<&str> {
        self.properties
            .get(PARENT_PROPERTY)
            .and_then(PropertyValue::ref_target)
    }
}

/// Ref-addressed node table that keeps insertion order.
///
/// Order is the packaging traversal order, and it is what sibling order in the
/// nested form is derived from, so it is preserved through serialization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeTable {
    entries: Vec<(Ref, FlatTreeNode)>,
    index: HashMap<Ref, usize>,
}

impl NodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// Insert a node, returning the node it replaced. A replaced node keeps its
    /// original position.
    pub fn insert(&mut self, reference: Ref, node: FlatTreeNode) -> Option<FlatTreeNode> {
        match self.index.get(&reference) {
            Some(&position) => Some(std::mem::replace(&mut self.entries[position].1, node)),
            None => {
                self.index.insert(reference.clone(), self.entries.len());
                self.entries.push((reference, node));
                None
            }
        }
    }

    pub fn get(&self, reference: &str) -> Option<&FlatTreeNode> {
        self.index
            .get(reference)
            .map(|&position| &self.entries[position].1)
    }

    pub fn get_mut(&mut self, reference: &str) -> Option<&mut FlatTreeNode> {
        match self.index.get(reference) {
            Some(&position) => Some(&mut self.entries[position].1),
            None => None,
        }
    }

    pub fn contains_key(&self, reference: &str) -> bool {
        self.index.contains_key(reference)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&Ref, &FlatTreeNode)> {
        self.entries.iter().map(|(reference, node)| (reference, node))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Ref> {
        self.entries.iter().map(|(reference, _)| reference)
    }

    pub fn values(&self) -> impl Iterator<Item = &FlatTreeNode> {
        self.entries.iter().map(|(_, node)| node)
    }
}

impl FromIterator<(Ref, FlatTreeNode)> for NodeTable {
    fn from_iter<I: IntoIterator<Item = (Ref, FlatTreeNode)>>(iter: I) -> Self {
        let mut table = NodeTable::new();
        for (reference, node) in iter {
            table.insert(reference, node);
        }
        table
    }
}

impl Serialize for NodeTable {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(self.iter())
    }
}

impl<'de> Deserialize<'de> for NodeTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct NodeTableVisitor;

        impl<'de> Visitor<'de> for NodeTableVisitor {
            type Value = NodeTable;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map from ref to node")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut table = NodeTable::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((reference, node)) = access.next_entry::<Ref, FlatTreeNode>()? {
                    if table.insert(reference.clone(), node).is_some() {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate ref '{reference}' in node table"
                        )));
                    }
                }
                Ok(table)
            }
        }

        deserializer.deserialize_map(NodeTableVisitor)
    }
}

/// Nested package: exactly one root with children inline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Package {
    /// Object identity to Ref, meaningful only inside the packaging session
    #[serde(default)]
    pub refs: BTreeMap<ObjectId, Ref>,

    pub tree: TreeNode,
}

/// Flat package: a Ref-addressed node table plus the root's Ref
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FlatPackage {
    /// Object identity to Ref, meaningful only inside the packaging session
    #[serde(default)]
    pub refs: BTreeMap<ObjectId, Ref>,

    pub root_ref: Ref,

    pub tree: NodeTable,
}

impl FlatPackage {
    /// The root node, if the table contains it
    pub fn root(&self) -> Option<&FlatTreeNode> {
        self.tree.get(self.root_ref.as_str())
    }
}

/// Parse a JSON document with no nesting limit.
///
/// Each tree level of a nested package adds two levels of JSON nesting, so
/// serde_json's default limit of 128 rejects trees deeper than about 60. The
/// stack grows on demand instead.
pub fn from_json_str<T: DeserializeOwned>(json: &str) -> serde_json::Result<T> {
    let mut deserializer = serde_json::Deserializer::from_str(json);
    deserializer.disable_recursion_limit();
    let value = T::deserialize(serde_stacker::Deserializer::new(&mut deserializer))?;
    deserializer.end()?;
    Ok(value)
}

/// Deserialize an already parsed JSON value, growing the stack for deep trees
pub fn from_json_value<T: DeserializeOwned>(value: serde_json::Value) -> serde_json::Result<T> {
    T::deserialize(serde_stacker::Deserializer::new(value))
}
