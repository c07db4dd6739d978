//! Error taxonomy for the redefinition engine.
//!
//! All variants are recoverable by the caller: a rejected redefinition leaves
//! the registry untouched, and resolution misses are surfaced as values, not
//! panics. Nothing here terminates the process.

/// Result alias used throughout the engine.
pub type MoltResult<T> = Result<T, MoltError>;

/// Errors produced by the redefinition engine and its dispatch paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoltError {
    /// A proposed version conflicts with live bindings or declared types.
    /// The redefinition was rejected before activation; registry state is
    /// unchanged.
    IncompatibleVersion {
        /// Class being redefined.
        class: String,
        /// Human-readable rejection reason.
        message: String,
    },

    /// A resolution request named a method absent from the active table.
    MethodNotFound {
        /// Class or interface the lookup ran against.
        class: String,
        /// Requested method name.
        method: String,
    },

    /// A field access named a field absent from the active table, or one
    /// removed by the active version.
    FieldNotFound {
        /// Class owning the instance.
        class: String,
        /// Requested field name.
        field: String,
    },

    /// A class id is not registered.
    ClassNotFound {
        /// The unknown id's raw value.
        id: u32,
    },

    /// A version id has no registered definitions.
    VersionNotFound {
        /// The unknown version id.
        version: u32,
    },

    /// A resolved descriptor has no body (abstract interface declaration)
    /// and was invoked directly instead of through a forwarding handler.
    NotInvocable {
        /// Declaring class or interface.
        class: String,
        /// Method name.
        method: String,
    },
}

impl MoltError {
    /// Construct an `IncompatibleVersion` error.
    pub fn incompatible(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self::IncompatibleVersion {
            class: class.into(),
            message: message.into(),
        }
    }

    /// Construct a `MethodNotFound` error.
    pub fn method_not_found(class: impl Into<String>, method: impl Into<String>) -> Self {
        Self::MethodNotFound {
            class: class.into(),
            method: method.into(),
        }
    }

    /// Construct a `FieldNotFound` error.
    pub fn field_not_found(class: impl Into<String>, field: impl Into<String>) -> Self {
        Self::FieldNotFound {
            class: class.into(),
            field: field.into(),
        }
    }

    /// Construct a `NotInvocable` error.
    pub fn not_invocable(class: impl Into<String>, method: impl Into<String>) -> Self {
        Self::NotInvocable {
            class: class.into(),
            method: method.into(),
        }
    }

    /// True for redefinition rejections.
    #[inline]
    pub fn is_incompatible(&self) -> bool {
        matches!(self, Self::IncompatibleVersion { .. })
    }
}

impl std::fmt::Display for MoltError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IncompatibleVersion { class, message } => {
                write!(f, "incompatible version for {}: {}", class, message)
            }
            Self::MethodNotFound { class, method } => {
                write!(f, "method not found: {}.{}", class, method)
            }
            Self::FieldNotFound { class, field } => {
                write!(f, "field not found: {}.{}", class, field)
            }
            Self::ClassNotFound { id } => {
                write!(f, "class not found: id {}", id)
            }
            Self::VersionNotFound { version } => {
                write!(f, "version not found: {}", version)
            }
            Self::NotInvocable { class, method } => {
                write!(f, "{}.{} is abstract and cannot be invoked directly", class, method)
            }
        }
    }
}

impl std::error::Error for MoltError {}
