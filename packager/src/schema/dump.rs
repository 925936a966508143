//! API dump schema provider
//!
//! Parses an API dump JSON document:
//!
//! ```json
//! {
//!   "Version": 1,
//!   "Classes": [
//!     {
//!       "Name": "Part",
//!       "Superclass": "BasePart",
//!       "Members": [
//!         {
//!           "MemberType": "Property",
//!           "Name": "Shape",
//!           "ValueType": { "Category": "Enum", "Name": "PartType" },
//!           "Tags": [],
//!           "Default": "Block"
//!         }
//!       ]
//!     }
//!   ],
//!   "Enums": [
//!     { "Name": "PartType", "Items": [{ "Name": "Ball", "Value": 0 }, { "Name": "Block", "Value": 1 }] }
//!   ]
//! }
//! ```
//!
//! Only `Property` members are kept. Members tagged `NotScriptable` cannot be
//! read or written by a runtime and are dropped; members tagged `ReadOnly` are
//! read-only.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use super::{PropertyCategory, PropertyDescriptor, SchemaError, SchemaProvider};
use crate::runtime::EnumNamespace;
use crate::value::EnumItem;

const READ_ONLY_TAG: &str = "ReadOnly";
const NOT_SCRIPTABLE_TAG: &str = "NotScriptable";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawDump {
    #[serde(default)]
    version: Option<u64>,
    #[serde(default)]
    classes: Vec<RawClass>,
    #[serde(default)]
    enums: Vec<RawEnum>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawClass {
    name: String,
    #[serde(default)]
    superclass: Option<String>,
    #[serde(default)]
    members: Vec<RawMember>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawMember {
    member_type: String,
    name: String,
    #[serde(default)]
    value_type: Option<RawValueType>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    default: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawValueType {
    category: String,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawEnum {
    name: String,
    #[serde(default)]
    items: Vec<RawEnumItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawEnumItem {
    name: String,
}

#[derive(Debug, Clone)]
struct ClassEntry {
    superclass: Option<String>,
    properties: Vec<PropertyDescriptor>,
}

/// Schema loaded from an API dump
#[derive(Debug, Clone, Default)]
pub struct ApiDump {
    version: Option<u64>,
    classes: HashMap<String, ClassEntry>,
    enums: HashMap<String, Vec<String>>,
}

impl ApiDump {
    pub fn from_json_str(json: &str) -> Result<Self, SchemaError> {
        let raw: RawDump = serde_json::from_str(json)?;
        Ok(Self::from_raw(raw))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let dump = Self::from_json_str(&content)?;
        debug!(
            path = %path.as_ref().display(),
            classes = dump.classes.len(),
            enums = dump.enums.len(),
            "Loaded API dump"
        );
        Ok(dump)
    }

    fn from_raw(raw: RawDump) -> Self {
        let classes = raw
            .classes
            .into_iter()
            .map(|class| {
                let properties = class
                    .members
                    .into_iter()
                    .filter(|m| m.member_type == "Property")
                    .filter(|m| !m.tags.iter().any(|t| t == NOT_SCRIPTABLE_TAG))
                    .filter_map(|m| {
                        let value_type = m.value_type?;
                        Some(PropertyDescriptor {
                            read_only: m.tags.iter().any(|t| t == READ_ONLY_TAG),
                            category: PropertyCategory::from_dump(&value_type.category),
                            value_type: value_type.name,
                            name: m.name,
                            default: m.default,
                        })
                    })
                    .collect();
                let entry = ClassEntry {
                    superclass: class.superclass.filter(|s| !s.is_empty() && s != "<<<ROOT>>>"),
                    properties,
                };
                (class.name, entry)
            })
            .collect();

        let enums = raw
            .enums
            .into_iter()
            .map(|e| (e.name, e.items.into_iter().map(|i| i.name).collect()))
            .collect();

        Self {
            version: raw.version,
            classes,
            enums,
        }
    }

    pub fn version(&self) -> Option<u64> {
        self.version
    }

    pub fn has_class(&self, class_name: &str) -> bool {
        self.classes.contains_key(class_name)
    }

    pub fn superclass(&self, class_name: &str) -> Option<&str> {
        self.classes.get(class_name)?.superclass.as_deref()
    }

    /// Class names in sorted order
    pub fn class_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.classes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Member names of an enum category, in declaration order
    pub fn enum_items(&self, category: &str) -> Option<&[String]> {
        self.enums.get(category).map(Vec::as_slice)
    }

    /// The class followed by its ancestors, stopping at an unknown class or a loop
    fn lineage<'a>(&'a self, class_name: &'a str) -> Vec<&'a ClassEntry> {
        let mut seen = HashSet::new();
        let mut lineage = Vec::new();
        let mut current = Some(class_name);
        while let Some(name) = current {
            if !seen.insert(name) {
                break;
            }
            let Some(entry) = self.classes.get(name) else {
                break;
            };
            lineage.push(entry);
            current = entry.superclass.as_deref();
        }
        lineage
    }
}

impl SchemaProvider for ApiDump {
    fn class_properties(&self, class_name: &str) -> Vec<PropertyDescriptor> {
        let mut properties: Vec<PropertyDescriptor> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        // Base class first so inherited properties lead and subclasses override.
        for entry in self.lineage(class_name).into_iter().rev() {
            for descriptor in &entry.properties {
                match positions.get(&descriptor.name) {
                    Some(&position) => properties[position] = descriptor.clone(),
                    None => {
                        positions.insert(descriptor.name.clone(), properties.len());
                        properties.push(descriptor.clone());
                    }
                }
            }
        }

        properties
    }
}

impl EnumNamespace for ApiDump {
    fn resolve_enum(&self, category: &str, member: &str) -> Option<EnumItem> {
        self.enums
            .get(category)?
            .iter()
            .any(|item| item == member)
            .then(|| EnumItem::new(category, member))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SAMPLE_DUMP: &str = r#"{
        "Version": 1,
        "Classes": [
            {
                "Name": "Instance",
                "Superclass": "<<<ROOT>>>",
                "Members": [
                    {"MemberType": "Property", "Name": "Name",
                     "ValueType": {"Category": "Primitive", "Name": "string"}},
                    {"MemberType": "Property", "Name": "Parent",
                     "ValueType": {"Category": "Class", "Name": "Instance"}},
                    {"MemberType": "Property", "Name": "ClassName",
                     "ValueType": {"Category": "Primitive", "Name": "string"},
                     "Tags": ["ReadOnly"]},
                    {"MemberType": "Property", "Name": "Archivable",
                     "ValueType": {"Category": "Primitive", "Name": "bool"},
                     "Default": true},
                    {"MemberType": "Function", "Name": "Destroy"}
                ]
            },
            {
                "Name": "Model",
                "Superclass": "Instance",
                "Members": [
                    {"MemberType": "Property", "Name": "PrimaryPart",
                     "ValueType": {"Category": "Class", "Name": "BasePart"}},
                    {"MemberType": "Property", "Name": "WorldPivotData",
                     "ValueType": {"Category": "DataType", "Name": "CFrame"},
                     "Tags": ["NotScriptable"]}
                ]
            },
            {
                "Name": "Part",
                "Superclass": "Instance",
                "Members": [
                    {"MemberType": "Property", "Name": "Anchored",
                     "ValueType": {"Category": "Primitive", "Name": "bool"},
                     "Default": false},
                    {"MemberType": "Property", "Name": "Transparency",
                     "ValueType": {"Category": "Primitive", "Name": "float"},
                     "Default": 0},
                    {"MemberType": "Property", "Name": "Material",
                     "ValueType": {"Category": "Enum", "Name": "Material"},
                     "Default": "Plastic"},
                    {"MemberType": "Property", "Name": "Size",
                     "ValueType": {"Category": "DataType", "Name": "Vector3"}},
                    {"MemberType": "Property", "Name": "Mass",
                     "ValueType": {"Category": "Primitive", "Name": "float"},
                     "Tags": ["ReadOnly"]},
                    {"MemberType": "Property", "Name": "Archivable",
                     "ValueType": {"Category": "Primitive", "Name": "bool"},
                     "Default": false}
                ]
            },
            {
                "Name": "ObjectValue",
                "Superclass": "Instance",
                "Members": [
                    {"MemberType": "Property", "Name": "Value",
                     "ValueType": {"Category": "Class", "Name": "Instance"}}
                ]
            },
            {
                "Name": "Folder",
                "Superclass": "Instance",
                "Members": []
            }
        ],
        "Enums": [
            {"Name": "Material", "Items": [
                {"Name": "Plastic", "Value": 256},
                {"Name": "Neon", "Value": 288}
            ]}
        ]
    }"#;

    fn sample() -> ApiDump {
        ApiDump::from_json_str(SAMPLE_DUMP).unwrap()
    }

    fn names(properties: &[PropertyDescriptor]) -> Vec<&str> {
        properties.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn test_parse_classes_and_version() {
        let dump = sample();
        assert_eq!(dump.version(), Some(1));
        assert_eq!(
            dump.class_names(),
            vec!["Folder", "Instance", "Model", "ObjectValue", "Part"]
        );
        assert_eq!(dump.superclass("Part"), Some("Instance"));
        assert_eq!(dump.superclass("Instance"), None);
    }

    #[test]
    fn test_inherited_properties_lead() {
        let dump = sample();
        let properties = dump.class_properties("Model");
        assert_eq!(
            names(&properties),
            vec!["Name", "Parent", "ClassName", "Archivable", "PrimaryPart"]
        );
    }

    #[test]
    fn test_subclass_overrides_in_place() {
        let dump = sample();
        let properties = dump.class_properties("Part");
        let archivable: Vec<_> = properties
            .iter()
            .filter(|p| p.name == "Archivable")
            .collect();
        assert_eq!(archivable.len(), 1);
        assert_eq!(archivable[0].default, Some(serde_json::json!(false)));
        assert_eq!(properties[3].name, "Archivable");
    }

    #[test]
    fn test_tags_and_categories() {
        let dump = sample();
        let properties = dump.class_properties("Part");
        let mass = properties.iter().find(|p| p.name == "Mass").unwrap();
        assert!(mass.read_only);
        let material = properties.iter().find(|p| p.name == "Material").unwrap();
        assert_eq!(material.category, PropertyCategory::Enum);

        let model = dump.class_properties("Model");
        assert!(model.iter().all(|p| p.name != "WorldPivotData"));
        let primary = model.iter().find(|p| p.name == "PrimaryPart").unwrap();
        assert_eq!(primary.category, PropertyCategory::Instance);
    }

    #[test]
    fn test_unknown_class_has_no_properties() {
        assert!(sample().class_properties("Nonexistent").is_empty());
    }

    #[test]
    fn test_superclass_loop_terminates() {
        let dump = ApiDump::from_json_str(
            r#"{"Classes": [
                {"Name": "A", "Superclass": "B", "Members": []},
                {"Name": "B", "Superclass": "A", "Members": [
                    {"MemberType": "Property", "Name": "X",
                     "ValueType": {"Category": "Primitive", "Name": "int"}}
                ]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(names(&dump.class_properties("A")), vec!["X"]);
    }

    #[test]
    fn test_enum_namespace() {
        let dump = sample();
        assert_eq!(
            dump.resolve_enum("Material", "Neon"),
            Some(EnumItem::new("Material", "Neon"))
        );
        assert_eq!(dump.resolve_enum("Material", "Lava"), None);
        assert_eq!(dump.resolve_enum("Shape", "Ball"), None);
        assert_eq!(dump.enum_items("Material").unwrap().len(), 2);
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.json");
        std::fs::write(&path, SAMPLE_DUMP).unwrap();
        let dump = ApiDump::from_path(&path).unwrap();
        assert!(dump.has_class("Model"));

        let missing = ApiDump::from_path(dir.path().join("missing.json"));
        assert!(matches!(missing, Err(SchemaError::Io(_))));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            ApiDump::from_json_str("{not json"),
            Err(SchemaError::Json(_))
        ));
    }
}
