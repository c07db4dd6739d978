//! Class model: identities, version tables, and the version registry.
//!
//! A *class identity* is the stable token naming a type across all of its
//! redefinitions. A *version table* is one immutable snapshot of that type's
//! methods, interfaces and fields. The registry maps identities to their
//! currently active table and performs the atomic switch.

pub mod identity;
pub mod registry;
pub mod table;

pub use identity::{ClassId, ClassIdentity, ClassKind};
pub use registry::{global_registry, VersionRegistry};
pub use table::{
    FieldDescriptor, MethodDescriptor, MethodFlags, NativeMethod, Signature, TypeTag, VersionTable,
};
