//! Live-object runtime capabilities
//!
//! The packager never touches live objects directly. It reads them through
//! [`LiveObjectReader`], creates and mutates them through [`LiveObjectWriter`],
//! and resolves enumerated values through [`EnumNamespace`]. Any object model
//! can be packaged by implementing these traits.
//!
//! [`memory::MemoryRuntime`] is an in-memory implementation used for tests and
//! by the command-line tool.

pub mod memory;

use std::collections::BTreeMap;

use thiserror::Error;

use crate::types::ObjectId;
use crate::value::{EnumItem, Value};

pub use memory::MemoryRuntime;

/// Result type alias for runtime capability calls
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Failures raised by a live-object runtime
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("Unknown class: {class_name}")]
    UnknownClass { class_name: String },

    #[error("Unknown object: {object}")]
    UnknownObject { object: ObjectId },

    #[error("{class_name} has no property '{property}'")]
    UnknownProperty { class_name: String, property: String },

    #[error("{class_name}.{property} is read-only")]
    ReadOnlyProperty { class_name: String, property: String },

    #[error("Cannot parent {object}: {message}")]
    InvalidParent { object: ObjectId, message: String },

    #[error("Rejected by runtime: {message}")]
    Rejected { message: String },
}

impl RuntimeError {
    pub fn unknown_class(class_name: impl Into<String>) -> Self {
        Self::UnknownClass {
            class_name: class_name.into(),
        }
    }

    pub fn unknown_property(class_name: impl Into<String>, property: impl Into<String>) -> Self {
        Self::UnknownProperty {
            class_name: class_name.into(),
            property: property.into(),
        }
    }

    pub fn read_only(class_name: impl Into<String>, property: impl Into<String>) -> Self {
        Self::ReadOnlyProperty {
            class_name: class_name.into(),
            property: property.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}

/// Read access to a live object tree
pub trait LiveObjectReader {
    fn name(&self, object: ObjectId) -> RuntimeResult<String>;

    fn class_name(&self, object: ObjectId) -> RuntimeResult<String>;

    fn parent(&self, object: ObjectId) -> RuntimeResult<Option<ObjectId>>;

    /// Current value of a named property
    fn property(&self, object: ObjectId, name: &str) -> RuntimeResult<Value>;

    /// Every descendant of `object` (not including it), parents before children
    fn descendants(&self, object: ObjectId) -> RuntimeResult<Vec<ObjectId>>;

    /// Tags in enumeration order
    fn tags(&self, object: ObjectId) -> RuntimeResult<Vec<String>>;

    fn attributes(&self, object: ObjectId) -> RuntimeResult<BTreeMap<String, Value>>;
}

/// Resolution of `(category, member)` pairs to enumerated values
pub trait EnumNamespace {
    fn resolve_enum(&self, category: &str, member: &str) -> Option<EnumItem>;
}

/// Namespace that accepts every pair as-is
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenEnumNamespace;

impl EnumNamespace for OpenEnumNamespace {
    fn resolve_enum(&self, category: &str, member: &str) -> Option<EnumItem> {
        Some(EnumItem::new(category, member))
    }
}

/// Write access to a live object runtime
pub trait LiveObjectWriter: EnumNamespace {
    /// Construct a new, unparented object of the given class
    fn create(&mut self, class_name: &str) -> RuntimeResult<ObjectId>;

    fn set_name(&mut self, object: ObjectId, name: &str) -> RuntimeResult<()>;

    fn set_property(&mut self, object: ObjectId, name: &str, value: Value) -> RuntimeResult<()>;

    fn add_tag(&mut self, object: ObjectId, tag: &str) -> RuntimeResult<()>;

    fn set_attribute(&mut self, object: ObjectId, name: &str, value: Value) -> RuntimeResult<()>;
}
