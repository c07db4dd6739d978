//! Dispatch layer for the molt redefinition engine.
//!
//! This crate provides:
//! - `DispatchResolver`: method resolution against the *currently* active
//!   table, with a global serial-validated cache
//! - `ProxyAdapter` / `ProxyHandle`: dynamic proxies bound to class
//!   identities, never to table snapshots
//! - `VersionSwitch`: the version-id surface an external harness drives
//!   ("activate version N" / "report active version")
//!
//! The invariant the whole crate enforces: resolution consults
//! `VersionRegistry::current` at the moment of the lookup — never a table
//! captured at call-site, allocation or proxy-creation time.

pub mod dispatch;
pub mod proxy;
pub mod switch;

pub use dispatch::{dispatch_cache, DispatchCache, DispatchResolver};
pub use proxy::{ForwardingHandler, InvocationHandler, ProxyAdapter, ProxyHandle};
pub use switch::{VersionId, VersionSwitch};
