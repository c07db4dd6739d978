//! Lazy instance migration.
//!
//! No explicit migration call exists and no heap walk happens on
//! redefinition. Instead, every field access intersects the instance's
//! allocation-time field set with the currently active one:
//!
//! - present in both (same type): the stored inline slot is used
//! - added after allocation: reads synthesize the active version's default
//!   until a write materializes the field in overflow storage
//! - removed by the active version (or never present): the access fails with
//!   `FieldNotFound` — removed fields stay allocated but inert, and are
//!   never read as stale data
//!
//! Cost is paid only by code paths that touch affected instances after a
//! switch.

use crate::class::table::VersionTable;
use molt_core::intern::InternedString;
use molt_core::{MoltError, MoltResult, Value};

/// Outcome of reconciling one field access against two layouts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldResolution {
    /// Field exists in both layouts with a compatible type; use the inline
    /// slot from the allocation-time layout.
    Stored(usize),
    /// Field was added (or retyped) after allocation; absent from inline
    /// storage. Reads fall back to overflow storage, then to this default.
    Synthesized(Value),
}

/// Reconcile a field access for an instance allocated under `alloc` while
/// `current` is the active table.
///
/// `class` is the owning class name, used only for error construction.
pub fn resolve_field(
    alloc: &VersionTable,
    current: &VersionTable,
    class: InternedString,
    name: InternedString,
) -> MoltResult<FieldResolution> {
    let Some(active_field) = current.field(name) else {
        // Absent from the active version: removed fields are inaccessible
        // even if the allocation-time layout still has storage for them.
        return Err(MoltError::field_not_found(class.as_str(), name.as_str()));
    };

    match alloc.field(name) {
        // A type change means the stored bits belong to the old type; never
        // reinterpret them.
        Some(alloc_field) if alloc_field.ty == active_field.ty => {
            Ok(FieldResolution::Stored(alloc_field.slot))
        }
        _ => Ok(FieldResolution::Synthesized(active_field.ty.default_value())),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::table::{FieldDescriptor, TypeTag};
    use molt_core::intern::intern;
    use smallvec::SmallVec;

    fn table(serial: u32, fields: &[(&str, TypeTag)]) -> VersionTable {
        let fields = fields
            .iter()
            .enumerate()
            .map(|(slot, (name, ty))| FieldDescriptor {
                name: intern(name),
                ty: *ty,
                slot,
            })
            .collect();
        VersionTable::new(serial, Vec::new(), SmallVec::new(), fields)
    }

    #[test]
    fn test_field_in_both_uses_storage() {
        let alloc = table(1, &[("count", TypeTag::Int)]);
        let current = table(2, &[("count", TypeTag::Int), ("scale", TypeTag::Float)]);
        let res = resolve_field(&alloc, &current, intern("C"), intern("count")).unwrap();
        assert_eq!(res, FieldResolution::Stored(0));
    }

    #[test]
    fn test_added_field_synthesizes_default() {
        let alloc = table(1, &[("count", TypeTag::Int)]);
        let current = table(2, &[("count", TypeTag::Int), ("scale", TypeTag::Float)]);
        let res = resolve_field(&alloc, &current, intern("C"), intern("scale")).unwrap();
        assert_eq!(res, FieldResolution::Synthesized(Value::float(0.0)));
    }

    #[test]
    fn test_removed_field_is_inaccessible() {
        let alloc = table(1, &[("count", TypeTag::Int)]);
        let current = table(2, &[]);
        let err = resolve_field(&alloc, &current, intern("C"), intern("count")).unwrap_err();
        assert!(matches!(err, MoltError::FieldNotFound { .. }));
    }

    #[test]
    fn test_unknown_field_is_inaccessible() {
        let alloc = table(1, &[]);
        let current = table(2, &[]);
        let err = resolve_field(&alloc, &current, intern("C"), intern("ghost")).unwrap_err();
        assert!(matches!(err, MoltError::FieldNotFound { .. }));
    }

    #[test]
    fn test_retyped_field_never_reads_stale_bits() {
        let alloc = table(1, &[("x", TypeTag::Int)]);
        let current = table(2, &[("x", TypeTag::Float)]);
        let res = resolve_field(&alloc, &current, intern("C"), intern("x")).unwrap();
        assert_eq!(res, FieldResolution::Synthesized(Value::float(0.0)));
    }
}
