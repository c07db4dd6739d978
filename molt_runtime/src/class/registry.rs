//! Version registry: process-wide map from class identity to active table.
//!
//! Reads are a map lookup plus a lock-free `ArcSwap` load; the registry map
//! itself only takes its write lock during registration, which happens at
//! load time, not on dispatch paths.

use crate::class::identity::{allocate_class_id, ClassId, ClassIdentity, ClassKind};
use crate::class::table::VersionTable;
use molt_core::intern::intern;
use molt_core::{MoltError, MoltResult};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Process-wide class identity registry.
///
/// Instance-based for test isolation; `global_registry()` provides the
/// shared singleton.
pub struct VersionRegistry {
    /// Map from id to identity.
    classes: RwLock<FxHashMap<ClassId, Arc<ClassIdentity>>>,
}

impl VersionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            classes: RwLock::new(FxHashMap::default()),
        }
    }

    /// Register a new class identity.
    ///
    /// The identity starts with the empty serial-0 table active; the first
    /// redefinition installs its real version-0 definition.
    pub fn register(&self, name: &str, kind: ClassKind) -> Arc<ClassIdentity> {
        let identity = ClassIdentity::new(allocate_class_id(), intern(name), kind);
        let mut classes = self.classes.write();
        classes.insert(identity.id(), identity.clone());
        identity
    }

    /// Look up an identity by id.
    #[inline]
    pub fn get(&self, id: ClassId) -> Option<Arc<ClassIdentity>> {
        let classes = self.classes.read();
        classes.get(&id).cloned()
    }

    /// Look up an identity by id, as a result.
    #[inline]
    pub fn identity(&self, id: ClassId) -> MoltResult<Arc<ClassIdentity>> {
        self.get(id).ok_or(MoltError::ClassNotFound { id: id.raw() })
    }

    /// The currently active table for an identity.
    ///
    /// Always consults the live pointer; callers must not cache the result
    /// across operations that are supposed to observe redefinitions.
    #[inline]
    pub fn current(&self, id: ClassId) -> MoltResult<Arc<VersionTable>> {
        Ok(self.identity(id)?.current())
    }

    /// Number of registered identities.
    pub fn len(&self) -> usize {
        self.classes.read().len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for VersionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Global Registry Access
// =============================================================================

use std::sync::OnceLock;

/// Global registry singleton.
static GLOBAL_REGISTRY: OnceLock<Arc<VersionRegistry>> = OnceLock::new();

/// Get the global version registry.
pub fn global_registry() -> &'static Arc<VersionRegistry> {
    GLOBAL_REGISTRY.get_or_init(|| Arc::new(VersionRegistry::new()))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let registry = VersionRegistry::new();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = VersionRegistry::new();
        let ident = registry.register("A", ClassKind::Interface);
        assert_eq!(registry.len(), 1);

        let found = registry.identity(ident.id()).unwrap();
        assert_eq!(found.name().as_str(), "A");
        assert!(found.is_interface());
    }

    #[test]
    fn test_unknown_id_errors() {
        let registry = VersionRegistry::new();
        let err = registry.current(ClassId(u32::MAX)).unwrap_err();
        assert!(matches!(err, MoltError::ClassNotFound { .. }));
    }

    #[test]
    fn test_current_reflects_activation() {
        let registry = VersionRegistry::new();
        let ident = registry.register("B", ClassKind::Class);
        assert_eq!(registry.current(ident.id()).unwrap().serial(), 0);

        let next = Arc::new(VersionTable::new(
            1,
            Vec::new(),
            smallvec::SmallVec::new(),
            Vec::new(),
        ));
        ident.activate(next);
        assert_eq!(registry.current(ident.id()).unwrap().serial(), 1);
    }

    #[test]
    fn test_global_singleton() {
        let a = global_registry();
        let b = global_registry();
        assert!(Arc::ptr_eq(a, b));
    }
}
