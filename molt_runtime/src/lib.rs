//! Class versioning runtime for molt.
//!
//! This crate provides:
//! - The class model (`ClassIdentity`, `VersionTable`, descriptors)
//! - `VersionRegistry`: process-wide identity map with atomic table switch
//! - `RedefinitionEngine`: validate-then-activate redefinition
//! - `Instance` storage with lazy field migration
//! - Runtime stat counters and engine configuration
//!
//! The dispatch layer (resolver, proxies, version-switch surface) lives in
//! `molt_vm` on top of this crate.

pub mod class;
pub mod config;
pub mod instance;
pub mod migrate;
pub mod redefine;
pub mod stats;

// Re-export commonly used items
pub use class::identity::{ClassId, ClassIdentity, ClassKind};
pub use class::registry::{global_registry, VersionRegistry};
pub use class::table::{
    FieldDescriptor, MethodDescriptor, MethodFlags, NativeMethod, Signature, TypeTag, VersionTable,
};
pub use config::EngineConfig;
pub use instance::Instance;
pub use redefine::{FieldDef, MethodDef, RedefinitionEngine, TableDef};
pub use stats::{global_stats, RuntimeStats};
