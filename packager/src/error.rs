//! Packager error types
//!
//! Failures raised by the packaging engine itself. Failures raised by a live-object
//! capability are carried unchanged in [`PackageError::Runtime`].

use thiserror::Error;

use crate::runtime::RuntimeError;

/// Result type alias for packaging and build operations
pub type PackageResult<T> = Result<T, PackageError>;

/// Errors that can occur while packaging, converting or building
#[derive(Error, Debug)]
pub enum PackageError {
    /// Package shape is inconsistent (bad table keys, cycles, duplicate nodes)
    #[error("Corrupt package: {message}")]
    CorruptPackage { message: String },

    /// RootRef does not name a node in the package table
    #[error("Corrupt package: root ref '{root}' is not present in the node table")]
    MissingRoot { root: String },

    /// The same Ref was assigned to two nodes
    #[error("Corrupt package: ref '{reference}' appears on more than one node")]
    DuplicateRef { reference: String },

    /// The id generator kept producing Refs already issued in this session
    #[error("Could not allocate a fresh ref after {attempts} attempts")]
    RefSpaceExhausted { attempts: u32 },

    /// An Enum-typed value names a member the target namespace does not know
    #[error("Unknown enum item {category}.{member}")]
    UnknownEnumItem { category: String, member: String },

    /// A portable value does not have the shape its Type tag requires
    #[error("Invalid {value_type} value: {message}")]
    InvalidValue { value_type: String, message: String },

    /// Failure raised by the live-object runtime
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PackageError {
    /// Create a corrupt package error
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::CorruptPackage {
            message: message.into(),
        }
    }

    /// Create a missing root error
    pub fn missing_root(root: impl Into<String>) -> Self {
        Self::MissingRoot { root: root.into() }
    }

    /// Create an unknown enum item error
    pub fn unknown_enum_item(category: impl Into<String>, member: impl Into<String>) -> Self {
        Self::UnknownEnumItem {
            category: category.into(),
            member: member.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(value_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            value_type: value_type.into(),
            message: message.into(),
        }
    }

    /// Whether this error describes malformed package input rather than a
    /// runtime or encoding failure
    pub fn is_corrupt_input(&self) -> bool {
        matches!(
            self,
            Self::CorruptPackage { .. } | Self::MissingRoot { .. } | Self::DuplicateRef { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrupt_input_classification() {
        assert!(PackageError::corrupt("bad").is_corrupt_input());
        assert!(PackageError::missing_root("abc").is_corrupt_input());
        assert!(PackageError::DuplicateRef {
            reference: "abc".to_string()
        }
        .is_corrupt_input());
        assert!(!PackageError::unknown_enum_item("Material", "Lava").is_corrupt_input());
        assert!(!PackageError::from(RuntimeError::unknown_class("Nope")).is_corrupt_input());
    }

    #[test]
    fn test_error_messages() {
        let err = PackageError::missing_root("r1");
        assert!(err.to_string().contains("'r1'"));

        let err = PackageError::unknown_enum_item("Material", "Lava");
        assert_eq!(err.to_string(), "Unknown enum item Material.Lava");
    }
}
