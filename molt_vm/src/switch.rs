//! Version-switch surface.
//!
//! An external harness drives the engine through exactly two operations:
//! "activate version N" and "report the active version". A *version program*
//! maps a version id to candidate tables for any number of identities;
//! activating a version proposes every candidate in that program through the
//! redefinition engine as one all-or-nothing switch.
//!
//! Re-activating the already current version is a no-op (no error, no side
//! effects). Switching back to an earlier version id is allowed and builds
//! fresh tables — superseded tables are never reinstalled.

use molt_runtime::class::identity::ClassId;
use molt_runtime::redefine::{RedefinitionEngine, TableDef};
use molt_core::{MoltError, MoltResult};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU32, Ordering};

// =============================================================================
// Version ID
// =============================================================================

/// Identifier for a registered version program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct VersionId(pub u32);

impl VersionId {
    /// Get raw value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for VersionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Version Switch
// =============================================================================

/// Raw sentinel meaning "no version activated yet".
const NO_VERSION: u32 = u32::MAX;

/// The harness-facing switchboard: version programs plus the active id.
pub struct VersionSwitch {
    /// Engine performing the actual switches.
    engine: RedefinitionEngine,
    /// Version id -> candidate tables per identity.
    programs: RwLock<FxHashMap<VersionId, Vec<(ClassId, TableDef)>>>,
    /// Raw id of the last successfully activated version.
    current: AtomicU32,
    /// Serializes whole-program switches.
    switch_lock: Mutex<()>,
}

impl VersionSwitch {
    /// Create a switchboard over an engine.
    pub fn new(engine: RedefinitionEngine) -> Self {
        Self {
            engine,
            programs: RwLock::new(FxHashMap::default()),
            current: AtomicU32::new(NO_VERSION),
            switch_lock: Mutex::new(()),
        }
    }

    /// The engine behind this switchboard.
    #[inline]
    pub fn engine(&self) -> &RedefinitionEngine {
        &self.engine
    }

    /// Register (or extend) the program for a version: under `version`, the
    /// identity `class` is defined by `def`.
    pub fn define(&self, version: VersionId, class: ClassId, def: TableDef) {
        let mut programs = self.programs.write();
        programs.entry(version).or_default().push((class, def));
    }

    /// Activate a version: switch every identity its program defines.
    ///
    /// All-or-nothing — every candidate validates before any activates, so a
    /// rejection leaves the registry exactly as it was. Idempotent when the
    /// target is already current.
    pub fn activate_version(&self, version: VersionId) -> MoltResult<()> {
        let _guard = self.switch_lock.lock();

        if self.current.load(Ordering::Acquire) == version.raw() {
            return Ok(());
        }

        let defs = {
            let programs = self.programs.read();
            programs
                .get(&version)
                .cloned()
                .ok_or(MoltError::VersionNotFound {
                    version: version.raw(),
                })?
        };

        self.engine.propose_all(&defs)?;
        self.current.store(version.raw(), Ordering::Release);
        Ok(())
    }

    /// The version id last successfully activated, if any.
    #[inline]
    pub fn current_version(&self) -> Option<VersionId> {
        match self.current.load(Ordering::Acquire) {
            NO_VERSION => None,
            raw => Some(VersionId(raw)),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use molt_core::{MoltResult, Value};
    use molt_runtime::class::identity::ClassKind;
    use molt_runtime::class::registry::VersionRegistry;
    use molt_runtime::instance::Instance;
    use molt_runtime::redefine::MethodDef;
    use std::sync::Arc;

    fn ret_one(_recv: &Instance, _args: &[Value]) -> MoltResult<Value> {
        Ok(Value::int(1))
    }

    fn ret_two(_recv: &Instance, _args: &[Value]) -> MoltResult<Value> {
        Ok(Value::int(2))
    }

    fn setup() -> (Arc<VersionRegistry>, VersionSwitch, ClassId) {
        let registry = Arc::new(VersionRegistry::new());
        let engine = RedefinitionEngine::new(registry.clone());
        let switch = VersionSwitch::new(engine);
        let class = registry.register("C", ClassKind::Class);

        switch.define(
            VersionId(0),
            class.id(),
            TableDef::new().with_method(MethodDef::native("m", [], ret_one)),
        );
        switch.define(
            VersionId(1),
            class.id(),
            TableDef::new().with_method(MethodDef::native("m", [], ret_two)),
        );
        (registry, switch, class.id())
    }

    #[test]
    fn test_no_version_before_first_activation() {
        let (_registry, switch, _class) = setup();
        assert_eq!(switch.current_version(), None);
    }

    #[test]
    fn test_activation_switches_and_reports() {
        let (registry, switch, class) = setup();
        switch.activate_version(VersionId(0)).unwrap();
        assert_eq!(switch.current_version(), Some(VersionId(0)));
        assert_eq!(registry.current(class).unwrap().serial(), 1);

        switch.activate_version(VersionId(1)).unwrap();
        assert_eq!(switch.current_version(), Some(VersionId(1)));
        assert_eq!(registry.current(class).unwrap().serial(), 2);
    }

    #[test]
    fn test_idempotent_reactivation() {
        let (registry, switch, class) = setup();
        switch.activate_version(VersionId(0)).unwrap();
        let table_before = registry.current(class).unwrap();

        // Second activation of the current version: no error, no new table.
        switch.activate_version(VersionId(0)).unwrap();
        let table_after = registry.current(class).unwrap();
        assert!(Arc::ptr_eq(&table_before, &table_after));
    }

    #[test]
    fn test_switching_back_builds_fresh_table() {
        let (registry, switch, class) = setup();
        switch.activate_version(VersionId(0)).unwrap();
        switch.activate_version(VersionId(1)).unwrap();
        switch.activate_version(VersionId(0)).unwrap();
        // Serial keeps rising; old tables are never reinstalled.
        assert_eq!(registry.current(class).unwrap().serial(), 3);
        assert_eq!(switch.current_version(), Some(VersionId(0)));
    }

    #[test]
    fn test_unknown_version_errors() {
        let (_registry, switch, _class) = setup();
        let err = switch.activate_version(VersionId(9)).unwrap_err();
        assert!(matches!(err, MoltError::VersionNotFound { version: 9 }));
    }

    #[test]
    fn test_failed_switch_leaves_current_version() {
        let (registry, switch, class) = setup();
        switch.activate_version(VersionId(0)).unwrap();

        // Version 2's program is invalid: ambiguous method set.
        switch.define(
            VersionId(2),
            class,
            TableDef::new()
                .with_method(MethodDef::native("m", [], ret_one))
                .with_method(MethodDef::native("m", [], ret_one)),
        );
        assert!(switch.activate_version(VersionId(2)).is_err());
        assert_eq!(switch.current_version(), Some(VersionId(0)));
        assert_eq!(registry.current(class).unwrap().serial(), 1);
    }
}
