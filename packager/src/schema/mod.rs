//! Class schema capability
//!
//! A [`SchemaProvider`] describes which properties a class declares, their
//! declared types, whether they are read-only and, optionally, their default
//! values. The packager uses it to decide which properties of an object are worth
//! packaging: only those that differ from the class default.
//!
//! [`dump::ApiDump`] implements the provider on top of an API dump document.

pub mod dump;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::codec::canonical_type;
use crate::runtime::LiveObjectReader;
use crate::types::{ObjectId, ENUM_TYPE, INSTANCE_TYPE};
use crate::value::{EnumItem, Value};

pub use dump::ApiDump;

/// Errors loading a schema document
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid schema JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Kind of value a property holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyCategory {
    Primitive,
    /// Pointer to another live object
    Instance,
    Enum,
    DataType,
    Group,
}

impl PropertyCategory {
    /// Map a dump `ValueType.Category` string. Unknown categories are treated as
    /// data types.
    pub fn from_dump(category: &str) -> Self {
        match category {
            "Primitive" => Self::Primitive,
            "Class" | "Instance" => Self::Instance,
            "Enum" => Self::Enum,
            "Group" => Self::Group,
            _ => Self::DataType,
        }
    }
}

/// One declared property of a class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    /// Declared type name (`bool`, `float`, `Vector3`, `Material`, `BasePart`, ...)
    pub value_type: String,
    pub category: PropertyCategory,
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

impl PropertyDescriptor {
    pub fn new(
        name: impl Into<String>,
        value_type: impl Into<String>,
        category: PropertyCategory,
    ) -> Self {
        Self {
            name: name.into(),
            value_type: value_type.into(),
            category,
            read_only: false,
            default: None,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Type name the packager encodes this property under
    pub fn semantic_type(&self) -> &str {
        match self.category {
            PropertyCategory::Instance => INSTANCE_TYPE,
            PropertyCategory::Enum => ENUM_TYPE,
            _ => &self.value_type,
        }
    }

    /// Declared default as a live value, if one is declared and understood
    pub fn default_value(&self) -> Option<Value> {
        let default = self.default.as_ref()?;
        match self.category {
            PropertyCategory::Enum => default
                .as_str()
                .map(|member| Value::Enum(EnumItem::new(&self.value_type, member))),
            PropertyCategory::Instance => default.is_null().then_some(Value::Object(None)),
            _ => Value::from_portable(canonical_type(&self.value_type), default).ok(),
        }
    }

    /// Whether `value` equals the class default for this property.
    ///
    /// Nil (an unset value or empty link) always counts as default, there is
    /// nothing to package for it.
    pub fn is_default(&self, value: &Value) -> bool {
        value.is_nil()
            || self
                .default_value()
                .is_some_and(|default| same_value(&default, value))
    }
}

/// Value equality where numbers inside plain data compare by magnitude, so a
/// default written as `0` matches a value read back as `0.0`.
fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (
            Value::Data {
                type_name: a_type,
                value: a_value,
            },
            Value::Data {
                type_name: b_type,
                value: b_value,
            },
        ) => a_type == b_type && same_plain(a_value, b_value),
        _ => a == b,
    }
}

fn same_plain(a: &serde_json::Value, b: &serde_json::Value) -> bool {
    use serde_json::Value as Plain;
    match (a, b) {
        (Plain::Number(x), Plain::Number(y)) => x.as_f64() == y.as_f64(),
        (Plain::Array(xs), Plain::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| same_plain(x, y))
        }
        (Plain::Object(xs), Plain::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(key, x)| ys.get(key).is_some_and(|y| same_plain(x, y)))
        }
        _ => a == b,
    }
}

/// Which properties a schema query should report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropertyFilter {
    All,
    #[default]
    Writable,
}

impl PropertyFilter {
    pub fn admits(&self, descriptor: &PropertyDescriptor) -> bool {
        match self {
            Self::All => true,
            Self::Writable => !descriptor.read_only,
        }
    }
}

/// A property whose current value differs from the class default
#[derive(Debug, Clone, PartialEq)]
pub struct ChangedProperty {
    pub descriptor: PropertyDescriptor,
    pub value: Value,
}

impl ChangedProperty {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }
}

/// Describes classes and their properties
pub trait SchemaProvider {
    /// Declared properties of a class, inherited ones included. Unknown classes
    /// have no properties.
    fn class_properties(&self, class_name: &str) -> Vec<PropertyDescriptor>;

    /// Properties of `object` that differ from their class defaults.
    ///
    /// Properties that cannot be read are reported as unchanged, as is every
    /// property of an object whose class cannot be read.
    fn changed_properties(
        &self,
        reader: &dyn LiveObjectReader,
        object: ObjectId,
        filter: PropertyFilter,
    ) -> Vec<ChangedProperty> {
        let class_name = match reader.class_name(object) {
            Ok(class_name) => class_name,
            Err(e) => {
                debug!(%object, error = %e, "Class unreadable, no changed properties");
                return Vec::new();
            }
        };

        self.class_properties(&class_name)
            .into_iter()
            .filter(|descriptor| filter.admits(descriptor))
            .filter_map(|descriptor| match reader.property(object, &descriptor.name) {
                Ok(value) if descriptor.is_default(&value) => None,
                Ok(value) => Some(ChangedProperty { descriptor, value }),
                Err(e) => {
                    debug!(
                        %object,
                        property = %descriptor.name,
                        error = %e,
                        "Property unreadable, treating as unchanged"
                    );
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_category_from_dump() {
        assert_eq!(PropertyCategory::from_dump("Class"), PropertyCategory::Instance);
        assert_eq!(PropertyCategory::from_dump("Enum"), PropertyCategory::Enum);
        assert_eq!(
            PropertyCategory::from_dump("Primitive"),
            PropertyCategory::Primitive
        );
        assert_eq!(PropertyCategory::from_dump("Mystery"), PropertyCategory::DataType);
    }

    #[test]
    fn test_semantic_type() {
        let link = PropertyDescriptor::new("PrimaryPart", "BasePart", PropertyCategory::Instance);
        assert_eq!(link.semantic_type(), "Instance");

        let material = PropertyDescriptor::new("Material", "Material", PropertyCategory::Enum);
        assert_eq!(material.semantic_type(), "Enum");

        let size = PropertyDescriptor::new("Size", "Vector3", PropertyCategory::DataType);
        assert_eq!(size.semantic_type(), "Vector3");
    }

    #[test]
    fn test_is_default_without_declared_default() {
        let descriptor = PropertyDescriptor::new("Anchored", "bool", PropertyCategory::Primitive);
        assert!(descriptor.is_default(&Value::Nil));
        assert!(!descriptor.is_default(&Value::Bool(false)));

        let link = PropertyDescriptor::new("PrimaryPart", "BasePart", PropertyCategory::Instance);
        assert!(link.is_default(&Value::Object(None)));
        assert!(!link.is_default(&Value::Object(Some(ObjectId(3)))));
    }

    #[test]
    fn test_is_default_with_declared_default() {
        let anchored = PropertyDescriptor::new("Anchored", "bool", PropertyCategory::Primitive)
            .with_default(json!(false));
        assert!(anchored.is_default(&Value::Bool(false)));
        assert!(anchored.is_default(&Value::Nil));
        assert!(!anchored.is_default(&Value::Bool(true)));

        let material = PropertyDescriptor::new("Material", "Material", PropertyCategory::Enum)
            .with_default(json!("Plastic"));
        assert!(material.is_default(&Value::Enum(EnumItem::new("Material", "Plastic"))));
        assert!(!material.is_default(&Value::Enum(EnumItem::new("Material", "Neon"))));

        let transparency =
            PropertyDescriptor::new("Transparency", "float", PropertyCategory::Primitive)
                .with_default(json!(0));
        assert!(transparency.is_default(&Value::Number(0.0)));
    }

    #[test]
    fn test_data_default_compares_numbers_by_value() {
        let size = PropertyDescriptor::new("Size", "Vector3", PropertyCategory::DataType)
            .with_default(json!({"X": 0, "Y": 1, "Z": 0}));
        assert!(size.is_default(&Value::data("Vector3", json!({"X": 0.0, "Y": 1.0, "Z": 0.0}))));
        assert!(size.is_default(&Value::data("Vector3", json!({"X": 0, "Y": 1, "Z": 0}))));
        assert!(!size.is_default(&Value::data("Vector3", json!({"X": 0.5, "Y": 1, "Z": 0}))));
        assert!(!size.is_default(&Value::data("Vector3", json!({"X": 0, "Y": 1}))));
        assert!(!size.is_default(&Value::data("Vector2", json!({"X": 0, "Y": 1, "Z": 0}))));

        let curve =
            PropertyDescriptor::new("Curve", "NumberSequence", PropertyCategory::DataType)
                .with_default(json!([[0, 1], [1, 1]]));
        let read_back = Value::data("NumberSequence", json!([[0.0, 1.0], [1.0, 1.0]]));
        assert!(curve.is_default(&read_back));
        assert!(!curve.is_default(&Value::data("NumberSequence", json!([[0.0, 1.0]]))));
    }

    #[test]
    fn test_filter() {
        let writable = PropertyDescriptor::new("Size", "Vector3", PropertyCategory::DataType);
        let locked = writable.clone().read_only();
        assert!(PropertyFilter::Writable.admits(&writable));
        assert!(!PropertyFilter::Writable.admits(&locked));
        assert!(PropertyFilter::All.admits(&locked));
    }
}
