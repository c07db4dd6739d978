//! Class identities: the stable tokens types keep across redefinitions.
//!
//! An identity never changes once created; only the table it points at does.
//! The active-table pointer is an `ArcSwap`, so readers take a lock-free
//! acquire load and are guaranteed to see a fully constructed table (the
//! writer's store has release semantics). Writers serialize per identity
//! through the redefine mutex — at most one redefinition is in flight for a
//! given identity at any time, while different identities redefine
//! independently.

use crate::class::table::VersionTable;
use arc_swap::ArcSwap;
use molt_core::intern::InternedString;
use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

// =============================================================================
// Class ID Allocation
// =============================================================================

/// Global counter for class ids.
///
/// Process-wide (not per registry) so ids stay unique across independent
/// registries and can key shared caches.
static NEXT_CLASS_ID: AtomicU32 = AtomicU32::new(ClassId::FIRST);

/// Allocate a fresh class id.
#[inline]
pub fn allocate_class_id() -> ClassId {
    ClassId(NEXT_CLASS_ID.fetch_add(1, Ordering::Relaxed))
}

// =============================================================================
// Class ID
// =============================================================================

/// Unique identifier for a class identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ClassId(pub u32);

impl ClassId {
    /// First id handed out by the allocator; 0 is reserved as invalid.
    pub const FIRST: u32 = 1;

    /// Get raw value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

// =============================================================================
// Class Kind
// =============================================================================

/// Whether an identity names a concrete class or an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    /// Concrete class: methods carry bodies, instances can be allocated.
    Class,
    /// Interface: abstract declarations only; proxies bind to these.
    Interface,
}

// =============================================================================
// Class Identity
// =============================================================================

/// Stable token naming a type across all its versions.
///
/// Holds the only mutable shared state in the engine: the active-table
/// pointer. Everything a table contains is immutable once published.
pub struct ClassIdentity {
    /// Unique id.
    id: ClassId,
    /// Interned type name.
    name: InternedString,
    /// Class or interface.
    kind: ClassKind,
    /// Currently active version table. Atomic pointer replacement with
    /// release ordering on store, acquire on load.
    active: ArcSwap<VersionTable>,
    /// Serializes redefinitions of this identity.
    redefine_lock: Mutex<()>,
    /// Number of live proxy handles bound to this identity.
    proxy_bindings: AtomicU32,
}

impl ClassIdentity {
    /// Create an identity with the empty serial-0 table active.
    pub fn new(id: ClassId, name: InternedString, kind: ClassKind) -> Arc<Self> {
        Arc::new(Self {
            id,
            name,
            kind,
            active: ArcSwap::from_pointee(VersionTable::empty()),
            redefine_lock: Mutex::new(()),
            proxy_bindings: AtomicU32::new(0),
        })
    }

    /// Unique id.
    #[inline]
    pub fn id(&self) -> ClassId {
        self.id
    }

    /// Type name.
    #[inline]
    pub fn name(&self) -> InternedString {
        self.name
    }

    /// Class or interface.
    #[inline]
    pub fn kind(&self) -> ClassKind {
        self.kind
    }

    /// Check for an interface identity.
    #[inline]
    pub fn is_interface(&self) -> bool {
        self.kind == ClassKind::Interface
    }

    /// The currently active table.
    ///
    /// Lock-free; any thread that observes a table observes it fully
    /// constructed.
    #[inline]
    pub fn current(&self) -> Arc<VersionTable> {
        self.active.load_full()
    }

    /// Install a new active table. The previous table becomes superseded the
    /// instant this store completes.
    ///
    /// Callers must hold the redefine lock and have validated the table; the
    /// engine is the only production caller.
    pub(crate) fn activate(&self, table: Arc<VersionTable>) {
        self.active.store(table);
    }

    /// Acquire this identity's redefinition lock.
    pub(crate) fn lock_redefine(&self) -> MutexGuard<'_, ()> {
        self.redefine_lock.lock()
    }

    /// Record a proxy handle binding to this identity.
    #[inline]
    pub fn bind_proxy(&self) {
        self.proxy_bindings.fetch_add(1, Ordering::AcqRel);
    }

    /// Release a proxy handle binding.
    #[inline]
    pub fn unbind_proxy(&self) {
        self.proxy_bindings.fetch_sub(1, Ordering::AcqRel);
    }

    /// Check whether any live proxy handle is bound to this identity.
    #[inline]
    pub fn has_proxy_bindings(&self) -> bool {
        self.proxy_bindings.load(Ordering::Acquire) > 0
    }
}

impl std::fmt::Debug for ClassIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassIdentity")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("serial", &self.current().serial())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use molt_core::intern::intern;
    use smallvec::SmallVec;

    #[test]
    fn test_new_identity_starts_empty() {
        let ident = ClassIdentity::new(allocate_class_id(), intern("A"), ClassKind::Interface);
        assert!(ident.is_interface());
        assert_eq!(ident.current().serial(), 0);
        assert!(ident.current().methods().is_empty());
    }

    #[test]
    fn test_activation_supersedes() {
        let ident = ClassIdentity::new(allocate_class_id(), intern("B"), ClassKind::Class);
        let old = ident.current();
        let next = Arc::new(VersionTable::new(1, Vec::new(), SmallVec::new(), Vec::new()));
        ident.activate(next);
        assert_eq!(ident.current().serial(), 1);
        // The superseded table is still usable by existing holders.
        assert_eq!(old.serial(), 0);
    }

    #[test]
    fn test_proxy_binding_counter() {
        let ident = ClassIdentity::new(allocate_class_id(), intern("C"), ClassKind::Interface);
        assert!(!ident.has_proxy_bindings());
        ident.bind_proxy();
        ident.bind_proxy();
        assert!(ident.has_proxy_bindings());
        ident.unbind_proxy();
        assert!(ident.has_proxy_bindings());
        ident.unbind_proxy();
        assert!(!ident.has_proxy_bindings());
    }

    #[test]
    fn test_id_allocation_unique() {
        let a = allocate_class_id();
        let b = allocate_class_id();
        assert_ne!(a, b);
        assert!(a.raw() >= ClassId::FIRST);
    }
}
