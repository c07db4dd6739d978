//! Instance storage.
//!
//! An instance is a fixed storage region plus a back-reference to its class
//! *identity* — never to a specific version table. Field storage is sized at
//! allocation from the then-active layout and never grows inline; fields a
//! later version adds live in overflow storage, materialized lazily on first
//! write (see `migrate`).
//!
//! # Memory Layout
//!
//! ```text
//! Instance
//! ├── identity: Arc<ClassIdentity>   - back-reference, survives redefinition
//! ├── alloc_table: Arc<VersionTable> - layout active at allocation time
//! ├── slots: RwLock<SmallVec<Value>> - inline field storage, fixed size
//! └── overflow: RwLock<FxHashMap>    - post-allocation fields, lazy
//! ```
//!
//! Object identity is `Arc` pointer identity; a version switch never touches
//! an existing instance.

use crate::class::identity::{ClassId, ClassIdentity};
use crate::class::table::VersionTable;
use crate::migrate::{self, FieldResolution};
use crate::stats::global_stats;
use molt_core::intern::InternedString;
use molt_core::{MoltResult, Value};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::sync::Arc;

/// Number of inline field slots stored without spilling to the heap vector.
pub const INLINE_SLOT_COUNT: usize = 4;

/// An allocated instance of a class identity.
pub struct Instance {
    /// The class identity. Method and field resolution always goes through
    /// this to the *currently* active table.
    identity: Arc<ClassIdentity>,
    /// The table active when this instance was allocated. Keeps the
    /// superseded layout alive for slot mapping; dropped with the instance.
    alloc_table: Arc<VersionTable>,
    /// Inline field storage; one slot per allocation-time field.
    slots: RwLock<SmallVec<[Value; INLINE_SLOT_COUNT]>>,
    /// Fields first materialized after a version switch.
    overflow: RwLock<FxHashMap<InternedString, Value>>,
}

impl Instance {
    /// Allocate an instance under the identity's currently active layout.
    ///
    /// Every slot starts at its field type's default.
    pub fn new(identity: &Arc<ClassIdentity>) -> Arc<Self> {
        let alloc_table = identity.current();
        let slots = alloc_table
            .fields()
            .iter()
            .map(|f| f.ty.default_value())
            .collect();
        global_stats().record_allocation();
        Arc::new(Self {
            identity: identity.clone(),
            alloc_table,
            slots: RwLock::new(slots),
            overflow: RwLock::new(FxHashMap::default()),
        })
    }

    /// The class identity this instance belongs to.
    #[inline]
    pub fn identity(&self) -> &Arc<ClassIdentity> {
        &self.identity
    }

    /// The owning class id.
    #[inline]
    pub fn class_id(&self) -> ClassId {
        self.identity.id()
    }

    /// The owning class name.
    #[inline]
    pub fn class_name(&self) -> InternedString {
        self.identity.name()
    }

    /// The layout this instance was allocated under.
    ///
    /// Exposed for diagnostics; resolution never consults it directly —
    /// field access goes through `migrate::resolve_field` and method lookup
    /// through the active table.
    #[inline]
    pub fn alloc_table(&self) -> &Arc<VersionTable> {
        &self.alloc_table
    }

    /// Read a field under the currently active layout.
    ///
    /// Fields added after allocation read as overflow storage if ever
    /// written, otherwise as the active version's default. Fields absent
    /// from the active layout fail with `FieldNotFound`.
    pub fn get_field(&self, name: InternedString) -> MoltResult<Value> {
        let current = self.identity.current();
        match migrate::resolve_field(&self.alloc_table, &current, self.class_name(), name)? {
            FieldResolution::Stored(slot) => Ok(self.slots.read()[slot]),
            FieldResolution::Synthesized(default) => {
                if let Some(value) = self.overflow.read().get(&name) {
                    return Ok(*value);
                }
                global_stats().record_synthesized_read();
                Ok(default)
            }
        }
    }

    /// Write a field under the currently active layout.
    ///
    /// A first write to a post-allocation field materializes it in overflow
    /// storage; inline storage never grows.
    pub fn set_field(&self, name: InternedString, value: Value) -> MoltResult<()> {
        let current = self.identity.current();
        match migrate::resolve_field(&self.alloc_table, &current, self.class_name(), name)? {
            FieldResolution::Stored(slot) => {
                self.slots.write()[slot] = value;
                Ok(())
            }
            FieldResolution::Synthesized(_) => {
                let mut overflow = self.overflow.write();
                if overflow.insert(name, value).is_none() {
                    global_stats().record_lazy_materialization();
                }
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("class", &self.identity.name())
            .field("alloc_serial", &self.alloc_table.serial())
            .field("inline_slots", &self.slots.read().len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
