//! Redefinition engine: validate a candidate version, then switch atomically.
//!
//! A candidate arrives as a `TableDef` (plain data: method, interface and
//! field definitions). `propose` validates it against the *current* table
//! under the identity's redefine lock, builds the immutable successor table,
//! and installs it. Readers can never observe a validated-but-inactive table
//! as active: until the single pointer store in `activate`, the candidate is
//! reachable only by the engine.
//!
//! # Validation rules
//!
//! - additions of methods, interfaces and fields are always accepted
//! - a candidate with two methods of identical signature (or two fields of
//!   the same name) is rejected — active tables are internally unambiguous
//! - dropping a declared interface while a live proxy handle is bound to
//!   that interface identity is rejected ("interface still bound")
//! - a field keeping its name but changing to an incompatible type is
//!   rejected (int -> float widening is accepted when configured)
//!
//! Rejection leaves the registry exactly as it was.

use crate::class::identity::{ClassIdentity, ClassKind};
use crate::class::registry::VersionRegistry;
use crate::class::table::{
    FieldDescriptor, MethodDescriptor, MethodFlags, NativeMethod, Signature, TypeTag, VersionTable,
};
use crate::class::ClassId;
use crate::config::EngineConfig;
use crate::stats::global_stats;
use molt_core::intern::{intern, InternedString};
use molt_core::{MoltError, MoltResult};
use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use std::sync::Arc;

// =============================================================================
// Candidate Definitions
// =============================================================================

/// One method in a candidate version.
#[derive(Debug, Clone)]
pub struct MethodDef {
    /// Method name.
    pub name: InternedString,
    /// Declared parameter types.
    pub params: SmallVec<[TypeTag; 4]>,
    /// Declaration flags.
    pub flags: MethodFlags,
    /// Implementation; `None` iff abstract.
    pub body: Option<NativeMethod>,
}

impl MethodDef {
    /// A concrete method with a native body.
    pub fn native(
        name: &str,
        params: impl IntoIterator<Item = TypeTag>,
        body: NativeMethod,
    ) -> Self {
        Self {
            name: intern(name),
            params: params.into_iter().collect(),
            flags: MethodFlags::empty(),
            body: Some(body),
        }
    }

    /// An abstract declaration (interface method).
    pub fn abstract_decl(name: &str, params: impl IntoIterator<Item = TypeTag>) -> Self {
        Self {
            name: intern(name),
            params: params.into_iter().collect(),
            flags: MethodFlags::ABSTRACT,
            body: None,
        }
    }

    fn signature(&self) -> Signature {
        Signature {
            name: self.name,
            params: self.params.clone(),
        }
    }
}

/// One field in a candidate version.
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    /// Field name.
    pub name: InternedString,
    /// Field type.
    pub ty: TypeTag,
}

impl FieldDef {
    /// Create a field definition.
    pub fn new(name: &str, ty: TypeTag) -> Self {
        Self {
            name: intern(name),
            ty,
        }
    }
}

/// A complete candidate version for one class identity.
#[derive(Debug, Clone, Default)]
pub struct TableDef {
    /// Methods in declaration order.
    pub methods: Vec<MethodDef>,
    /// Declared interface identities.
    pub interfaces: Vec<ClassId>,
    /// Fields in declaration order.
    pub fields: Vec<FieldDef>,
}

impl TableDef {
    /// An empty candidate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a method.
    pub fn with_method(mut self, method: MethodDef) -> Self {
        self.methods.push(method);
        self
    }

    /// Declare an interface.
    pub fn with_interface(mut self, id: ClassId) -> Self {
        self.interfaces.push(id);
        self
    }

    /// Add a field.
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }
}

// =============================================================================
// Redefinition Engine
// =============================================================================

/// Validates candidate versions and performs the atomic switch.
#[derive(Clone)]
pub struct RedefinitionEngine {
    registry: Arc<VersionRegistry>,
    config: EngineConfig,
}

impl RedefinitionEngine {
    /// Create an engine over a registry with the default configuration.
    pub fn new(registry: Arc<VersionRegistry>) -> Self {
        Self::with_config(registry, EngineConfig::default())
    }

    /// Create an engine with an explicit configuration.
    pub fn with_config(registry: Arc<VersionRegistry>, config: EngineConfig) -> Self {
        Self { registry, config }
    }

    /// The registry this engine redefines.
    #[inline]
    pub fn registry(&self) -> &Arc<VersionRegistry> {
        &self.registry
    }

    /// Validate a candidate and, on success, activate it.
    ///
    /// Serialized per identity; concurrent proposals for different
    /// identities proceed independently. Returns the activated table.
    pub fn propose(&self, id: ClassId, def: &TableDef) -> MoltResult<Arc<VersionTable>> {
        let identity = self.registry.identity(id)?;
        let _guard = identity.lock_redefine();
        let current = identity.current();
        let table = match self.validate(&identity, &current, def) {
            Ok(table) => table,
            Err(e) => {
                global_stats().record_rejection();
                return Err(e);
            }
        };
        identity.activate(table.clone());
        global_stats().record_redefinition();
        Ok(table)
    }

    /// Validate every candidate in a version program, then activate all.
    ///
    /// Two-phase so a rejection anywhere leaves every identity untouched.
    /// Identity locks are taken in id order and held across both phases.
    pub fn propose_all(&self, defs: &[(ClassId, TableDef)]) -> MoltResult<Vec<Arc<VersionTable>>> {
        let mut identities: Vec<Arc<ClassIdentity>> = Vec::with_capacity(defs.len());
        let mut seen: FxHashSet<ClassId> = FxHashSet::default();
        for (id, _) in defs {
            let identity = self.registry.identity(*id)?;
            if !seen.insert(*id) {
                return Err(MoltError::incompatible(
                    identity.name().as_str(),
                    "duplicate definition in version program",
                ));
            }
            identities.push(identity);
        }

        // Lock in id order so concurrent programs cannot deadlock.
        let mut order: Vec<usize> = (0..identities.len()).collect();
        order.sort_by_key(|&i| identities[i].id());
        let _guards: Vec<_> = order.iter().map(|&i| identities[i].lock_redefine()).collect();

        let mut built = Vec::with_capacity(defs.len());
        for (i, (_, def)) in defs.iter().enumerate() {
            let current = identities[i].current();
            match self.validate(&identities[i], &current, def) {
                Ok(table) => built.push(table),
                Err(e) => {
                    global_stats().record_rejection();
                    return Err(e);
                }
            }
        }

        for (i, table) in built.iter().enumerate() {
            identities[i].activate(table.clone());
            global_stats().record_redefinition();
        }
        Ok(built)
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Structural compatibility check; builds the successor table on success.
    fn validate(
        &self,
        identity: &Arc<ClassIdentity>,
        current: &Arc<VersionTable>,
        def: &TableDef,
    ) -> MoltResult<Arc<VersionTable>> {
        let class = identity.name();

        // Method set must be internally unambiguous.
        let mut signatures: FxHashSet<Signature> = FxHashSet::default();
        let mut methods = Vec::with_capacity(def.methods.len());
        for m in &def.methods {
            let signature = m.signature();
            if !signatures.insert(signature.clone()) {
                return Err(MoltError::incompatible(
                    class.as_str(),
                    format!("ambiguous method addition: {}", signature),
                ));
            }
            methods.push(MethodDescriptor {
                signature,
                flags: m.flags,
                body: m.body,
            });
        }

        // Interface references must name registered interface identities.
        let mut interfaces: SmallVec<[ClassId; 2]> = SmallVec::new();
        for &iface_id in &def.interfaces {
            let iface = self.registry.identity(iface_id).map_err(|_| {
                MoltError::incompatible(
                    class.as_str(),
                    format!("unknown interface id {}", iface_id.raw()),
                )
            })?;
            if iface.kind() != ClassKind::Interface {
                return Err(MoltError::incompatible(
                    class.as_str(),
                    format!("not an interface: {}", iface.name()),
                ));
            }
            if !interfaces.contains(&iface_id) {
                interfaces.push(iface_id);
            }
        }

        // Dropping an interface that a live proxy is bound to is rejected.
        for &iface_id in current.interfaces() {
            if interfaces.contains(&iface_id) {
                continue;
            }
            if let Some(iface) = self.registry.get(iface_id) {
                if iface.has_proxy_bindings() {
                    return Err(MoltError::incompatible(
                        class.as_str(),
                        format!("interface still bound: {}", iface.name()),
                    ));
                }
            }
        }

        // Field set must be unambiguous and type-stable.
        let mut field_names: FxHashSet<InternedString> = FxHashSet::default();
        let mut fields = Vec::with_capacity(def.fields.len());
        for (slot, f) in def.fields.iter().enumerate() {
            if !field_names.insert(f.name) {
                return Err(MoltError::incompatible(
                    class.as_str(),
                    format!("duplicate field: {}", f.name),
                ));
            }
            if let Some(existing) = current.field(f.name) {
                if !self.field_types_compatible(existing.ty, f.ty) {
                    return Err(MoltError::incompatible(
                        class.as_str(),
                        format!(
                            "field type conflict: {} ({:?} -> {:?})",
                            f.name, existing.ty, f.ty
                        ),
                    ));
                }
            }
            fields.push(FieldDescriptor {
                name: f.name,
                ty: f.ty,
                slot,
            });
        }

        let table = Arc::new(VersionTable::new(
            current.serial() + 1,
            methods,
            interfaces,
            fields,
        ));
        if self.config.verify_tables && !table.verify() {
            return Err(MoltError::incompatible(
                class.as_str(),
                "table verification failed",
            ));
        }
        Ok(table)
    }

    /// Whether a field may change from `old` to `new` across versions.
    #[inline]
    fn field_types_compatible(&self, old: TypeTag, new: TypeTag) -> bool {
        old == new
            || (self.config.allow_numeric_widening && old == TypeTag::Int && new == TypeTag::Float)
    }
}

// =============================================================================
// Tests
// =============================================================================
