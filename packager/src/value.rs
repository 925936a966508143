//! Live runtime values
//!
//! [`Value`] is what a live-object runtime hands out for a property or attribute
//! read, and what it accepts on write. It is the input of the value encoder and
//! the output of the value decoder.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{PackageError, PackageResult};
use crate::types::ObjectId;

/// One member of an enumerated type, identified by category and member name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnumItem {
    pub category: String,
    pub member: String,
}

impl EnumItem {
    pub fn new(category: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            member: member.into(),
        }
    }
}

/// A value read from or written to a live object
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    String(String),
    Enum(EnumItem),
    /// Link to another live object; `None` is an empty link
    Object(Option<ObjectId>),
    /// Structured data type (vectors, colors, ...) carried as plain data
    Data {
        type_name: String,
        value: serde_json::Value,
    },
}

impl Value {
    pub fn data(type_name: impl Into<String>, value: serde_json::Value) -> Self {
        Self::Data {
            type_name: type_name.into(),
            value,
        }
    }

    /// Runtime type name, used as the declared type of attribute values
    pub fn type_name(&self) -> &str {
        match self {
            Self::Nil => "nil",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Enum(_) => "EnumItem",
            Self::Object(_) => "Instance",
            Self::Data { type_name, .. } => type_name,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil | Self::Object(None))
    }

    /// Plain-data form of this value.
    ///
    /// Non-finite numbers have no plain-data form and become `null`. Object links
    /// have no portable form on their own and also become `null`; the packager
    /// rewrites them to refs before they get here.
    pub fn to_portable(&self) -> serde_json::Value {
        match self {
            Self::Nil | Self::Object(_) => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Enum(item) => json!({"Type": item.category, "Value": item.member}),
            Self::Data { value, .. } => value.clone(),
        }
    }

    /// Rebuild a value from its canonical type name and plain-data form.
    ///
    /// Unrecognised type names are kept as [`Value::Data`]. A `null` number
    /// decodes to NaN.
    pub fn from_portable(value_type: &str, value: &serde_json::Value) -> PackageResult<Self> {
        match value_type {
            "nil" => Ok(Self::Nil),
            "boolean" => value
                .as_bool()
                .map(Self::Bool)
                .ok_or_else(|| mismatch(value_type, value)),
            "number" => match value {
                serde_json::Value::Null => Ok(Self::Number(f64::NAN)),
                other => other
                    .as_f64()
                    .map(Self::Number)
                    .ok_or_else(|| mismatch(value_type, other)),
            },
            "string" => value
                .as_str()
                .map(|s| Self::String(s.to_string()))
                .ok_or_else(|| mismatch(value_type, value)),
            other => Ok(Self::data(other, value.clone())),
        }
    }
}

fn mismatch(value_type: &str, value: &serde_json::Value) -> PackageError {
    PackageError::invalid_value(value_type, format!("unexpected plain value {value}"))
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<EnumItem> for Value {
    fn from(value: EnumItem) -> Self {
        Self::Enum(value)
    }
}

impl From<ObjectId> for Value {
    fn from(value: ObjectId) -> Self {
        Self::Object(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Nil.type_name(), "nil");
        assert_eq!(Value::from(true).type_name(), "boolean");
        assert_eq!(Value::from(1.5).type_name(), "number");
        assert_eq!(Value::from("x").type_name(), "string");
        assert_eq!(
            Value::from(EnumItem::new("Material", "Plastic")).type_name(),
            "EnumItem"
        );
        assert_eq!(Value::from(ObjectId(1)).type_name(), "Instance");
        assert_eq!(
            Value::data("Vector3", json!({"X": 1, "Y": 2, "Z": 3})).type_name(),
            "Vector3"
        );
    }

    #[test]
    fn test_portable_primitives() {
        for value in [
            Value::Nil,
            Value::from(false),
            Value::from(12.25),
            Value::from("hello"),
            Value::data("Color3", json!([1.0, 0.5, 0.0])),
        ] {
            let plain = value.to_portable();
            let restored = Value::from_portable(value.type_name(), &plain).unwrap();
            assert_eq!(restored, value);
        }
    }

    #[test]
    fn test_non_finite_number_becomes_null() {
        assert_eq!(Value::from(f64::INFINITY).to_portable(), serde_json::Value::Null);
        match Value::from_portable("number", &serde_json::Value::Null).unwrap() {
            Value::Number(n) => assert!(n.is_nan()),
            other => panic!("expected number, got {other:?}"),
        }
    }

    #[test]
    fn test_from_portable_rejects_mismatched_shape() {
        let err = Value::from_portable("boolean", &json!("yes")).unwrap_err();
        assert!(matches!(err, PackageError::InvalidValue { .. }));
        assert!(Value::from_portable("string", &json!(3)).is_err());
    }

    #[test]
    fn test_enum_plain_shape() {
        let value = Value::from(EnumItem::new("Material", "Neon"));
        assert_eq!(value.to_portable(), json!({"Type": "Material", "Value": "Neon"}));
    }
}
