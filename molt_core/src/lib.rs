//! Core types for the molt live-redefinition engine.
//!
//! This crate provides:
//! - `Value`: the small copyable value passed into and out of methods
//! - String interning (`intern`, `InternedString`) with pointer-identity
//!   comparison, used for method and field names throughout the engine
//! - The error taxonomy (`MoltError`, `MoltResult`)
//!
//! It has no knowledge of classes, versions or dispatch; those live in
//! `molt_runtime` and `molt_vm`.

pub mod error;
pub mod intern;
pub mod value;

pub use error::{MoltError, MoltResult};
pub use intern::{intern, InternedString};
pub use value::Value;
