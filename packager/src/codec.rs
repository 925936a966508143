//! Value codec
//!
//! Converts live [`Value`]s to portable [`PropertyValue`]s and back. Both
//! directions are injectable through [`PackagerConfig`](crate::PackagerConfig):
//! any `Fn(&Value, &str) -> (serde_json::Value, Option<String>)` is a
//! [`ValueEncoder`], and any
//! `Fn(&PropertyValue, &dyn EnumNamespace) -> PackageResult<Value>` is a
//! [`ValueDecoder`].

use serde_json::json;

use crate::error::{PackageError, PackageResult};
use crate::runtime::EnumNamespace;
use crate::types::{PropertyValue, ENUM_TYPE};
use crate::value::Value;

/// Map low-level type names to canonical ones. Other names pass through.
pub fn canonical_type(declared_type: &str) -> &str {
    match declared_type {
        "bool" => "boolean",
        "float" | "double" | "int" | "int64" => "number",
        "void" => "nil",
        "string" => "string",
        other => other,
    }
}

/// Encodes a live value under its declared type.
///
/// Returns the plain-data value and, optionally, the Type tag to record. When no
/// tag is returned the canonical form of the declared type is used.
pub trait ValueEncoder: Send + Sync {
    fn encode(&self, value: &Value, declared_type: &str) -> (serde_json::Value, Option<String>);
}

impl<F> ValueEncoder for F
where
    F: Fn(&Value, &str) -> (serde_json::Value, Option<String>) + Send + Sync,
{
    fn encode(&self, value: &Value, declared_type: &str) -> (serde_json::Value, Option<String>) {
        self(value, declared_type)
    }
}

/// Decodes a portable value back into a live value
pub trait ValueDecoder: Send + Sync {
    fn decode(&self, value: &PropertyValue, enums: &dyn EnumNamespace) -> PackageResult<Value>;
}

impl<F> ValueDecoder for F
where
    F: Fn(&PropertyValue, &dyn EnumNamespace) -> PackageResult<Value> + Send + Sync,
{
    fn decode(&self, value: &PropertyValue, enums: &dyn EnumNamespace) -> PackageResult<Value> {
        self(value, enums)
    }
}

/// Canonical type names, enums as `{Type: category, Value: member}` under `Enum`
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEncoder;

impl ValueEncoder for DefaultEncoder {
    fn encode(&self, value: &Value, declared_type: &str) -> (serde_json::Value, Option<String>) {
        match value {
            Value::Enum(item) => (
                json!({"Type": item.category, "Value": item.member}),
                Some(ENUM_TYPE.to_string()),
            ),
            other => (
                other.to_portable(),
                Some(canonical_type(declared_type).to_string()),
            ),
        }
    }
}

/// Resolves `Enum` values through the target namespace, rebuilds everything
/// else from its Type tag
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDecoder;

impl ValueDecoder for DefaultDecoder {
    fn decode(&self, value: &PropertyValue, enums: &dyn EnumNamespace) -> PackageResult<Value> {
        if value.value_type != ENUM_TYPE {
            return Value::from_portable(&value.value_type, &value.value);
        }

        let field = |key: &str| {
            value.value.get(key).and_then(|v| v.as_str()).ok_or_else(|| {
                PackageError::invalid_value(ENUM_TYPE, format!("missing string field '{key}'"))
            })
        };
        let category = field("Type")?;
        let member = field("Value")?;

        enums
            .resolve_enum(category, member)
            .map(Value::Enum)
            .ok_or_else(|| PackageError::unknown_enum_item(category, member))
    }
}

/// Encode `value` as a [`PropertyValue`]
pub fn encode(value: &Value, declared_type: &str, encoder: &dyn ValueEncoder) -> PropertyValue {
    let (encoded, encoded_type) = encoder.encode(value, declared_type);
    let value_type = encoded_type.unwrap_or_else(|| canonical_type(declared_type).to_string());
    PropertyValue::new(value_type, encoded)
}

/// Decode a [`PropertyValue`] into a live value
pub fn decode(
    value: &PropertyValue,
    decoder: &dyn ValueDecoder,
    enums: &dyn EnumNamespace,
) -> PackageResult<Value> {
    decoder.decode(value, enums)
}
