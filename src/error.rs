//! Error types for descriptor resolution and compilation

use thiserror::Error;

/// Errors that can occur while registering, resolving or compiling descriptors
#[derive(Error, Debug)]
pub enum WiringError {
    /// A descriptor was rejected at registration time
    #[error("Invalid descriptor \"{id}\": {reason}")]
    InvalidDescriptor { id: String, reason: String },

    /// A descriptor could not be turned into an instance
    #[error("Failed to construct \"{id}\": {reason}")]
    Construction { id: String, reason: String },

    /// A literal that cannot be written out as a statement expression
    #[error("Cannot serialize value of type {type_name}")]
    UnsupportedValueType { type_name: String },

    /// Malformed descriptor document
    #[error("Parse error: {0}")]
    Parse(String),

    /// A descriptor was re-entered while it was still being built
    #[error("Circular reference detected: {}", path.join(" -> "))]
    CircularDependency { path: Vec<String> },

    /// Reference chain deeper than the configured limit
    #[error("Resolution depth {depth} exceeded")]
    DepthExceeded { depth: usize },

    /// A resolved value did not have the shape a binding expected
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// The compiler's output sink failed
    #[error("Failed to write compiled output: {0}")]
    Io(#[from] std::io::Error),
}

impl WiringError {
    /// Create an InvalidDescriptor error
    #[inline]
    pub fn invalid(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Create a Construction error
    #[inline]
    pub fn construction(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Construction {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Create a TypeMismatch error
    #[inline]
    pub fn mismatch(expected: &'static str, found: &'static str) -> Self {
        Self::TypeMismatch { expected, found }
    }

    /// Create an UnsupportedValueType error
    #[inline]
    pub fn unsupported(type_name: impl Into<String>) -> Self {
        Self::UnsupportedValueType {
            type_name: type_name.into(),
        }
    }

    /// Whether this error came out of a nested lookup rather than the
    /// descriptor currently being built.
    pub(crate) fn is_propagated(&self) -> bool {
        matches!(
            self,
            Self::Construction { .. }
                | Self::CircularDependency { .. }
                | Self::DepthExceeded { .. }
                | Self::InvalidDescriptor { .. }
        )
    }
}

/// Result type alias for wiring operations
pub type Result<T> = std::result::Result<T, WiringError>;
