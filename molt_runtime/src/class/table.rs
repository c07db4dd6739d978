//! Immutable version tables and their descriptors.
//!
//! A `VersionTable` is one version's complete view of a type: its method set,
//! declared interfaces, and field layout. Tables are immutable once
//! constructed — a redefinition builds a whole new table and swaps the active
//! pointer, it never mutates in place.
//!
//! # Lifecycle
//!
//! ```text
//! Proposed ──activate──> Active ──next activation──> Superseded ──last Arc dropped──> Retired
//! ```
//!
//! The states are realized through `Arc` ownership rather than an explicit
//! tag: a table is *Proposed* while only the redefinition engine holds it,
//! *Active* while installed in its identity's swap pointer, *Superseded* once
//! replaced (but still referenced by e.g. an instance's allocation-time
//! layout or an in-flight call), and *Retired* when the last reference goes
//! away and the allocation is reclaimed.

use crate::class::identity::ClassId;
use crate::instance::Instance;
use molt_core::{MoltError, MoltResult, Value};
use molt_core::intern::InternedString;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

// =============================================================================
// Type Tags
// =============================================================================

/// Static type of a field or method parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// Boolean.
    Bool,
    /// 64-bit signed integer.
    Int,
    /// 64-bit float.
    Float,
    /// Interned string.
    Str,
    /// Reference to an instance of the named class identity.
    Object(ClassId),
}

impl TypeTag {
    /// Default value synthesized for a field of this type that was added
    /// after an instance's allocation.
    #[inline]
    pub fn default_value(&self) -> Value {
        match self {
            Self::Bool => Value::bool(false),
            Self::Int => Value::int(0),
            Self::Float => Value::float(0.0),
            Self::Str | Self::Object(_) => Value::none(),
        }
    }
}

// =============================================================================
// Signatures
// =============================================================================

/// A method signature: name plus declared parameter types.
///
/// Matching is by name and exact parameter arity/types. Interned names make
/// equality and hashing pointer-cheap.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    /// Method name.
    pub name: InternedString,
    /// Declared parameter types (receiver excluded).
    pub params: SmallVec<[TypeTag; 4]>,
}

impl Signature {
    /// Create a signature.
    pub fn new(name: InternedString, params: impl IntoIterator<Item = TypeTag>) -> Self {
        Self {
            name,
            params: params.into_iter().collect(),
        }
    }

    /// Create a zero-argument signature.
    #[inline]
    pub fn niladic(name: InternedString) -> Self {
        Self {
            name,
            params: SmallVec::new(),
        }
    }

    /// Number of declared parameters.
    #[inline]
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.name, self.params.len())
    }
}

// =============================================================================
// Method Descriptors
// =============================================================================

bitflags::bitflags! {
    /// Flags describing a method declaration.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MethodFlags: u32 {
        /// Declaration without a body (interface method). Invocable only
        /// through a handler that forwards to a concrete implementation.
        const ABSTRACT = 1 << 0;
    }
}

impl Default for MethodFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Native method implementation pointer.
///
/// Receives the instance the call was dispatched on plus the argument values.
pub type NativeMethod = fn(&Instance, &[Value]) -> MoltResult<Value>;

/// One method entry in a version table.
#[derive(Clone)]
pub struct MethodDescriptor {
    /// Name plus parameter types.
    pub signature: Signature,
    /// Declaration flags.
    pub flags: MethodFlags,
    /// Implementation pointer; `None` iff `ABSTRACT` is set.
    pub body: Option<NativeMethod>,
}

impl MethodDescriptor {
    /// Method name.
    #[inline]
    pub fn name(&self) -> InternedString {
        self.signature.name
    }

    /// Check for an abstract declaration.
    #[inline]
    pub fn is_abstract(&self) -> bool {
        self.flags.contains(MethodFlags::ABSTRACT)
    }

    /// Invoke the method body on a receiver.
    ///
    /// Abstract declarations have no body; invoking one directly is an
    /// error — proxies forward them to a concrete target instead.
    pub fn invoke(&self, receiver: &Instance, args: &[Value]) -> MoltResult<Value> {
        match self.body {
            Some(body) => body(receiver, args),
            None => Err(MoltError::not_invocable(
                receiver.class_name().as_str(),
                self.signature.name.as_str(),
            )),
        }
    }
}

impl std::fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("signature", &self.signature)
            .field("flags", &self.flags)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

// =============================================================================
// Field Descriptors
// =============================================================================

/// One field entry in a version table.
///
/// The slot index is the field's position in the inline storage of instances
/// allocated under this table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Field name.
    pub name: InternedString,
    /// Field type.
    pub ty: TypeTag,
    /// Inline slot index (declaration order).
    pub slot: usize,
}

// =============================================================================
// Version Table
// =============================================================================

/// Immutable snapshot of one version's methods, interfaces and fields.
///
/// Construction assumes the entry sets were already validated for uniqueness
/// (the redefinition engine rejects ambiguous candidates before building);
/// the indexes here simply memoize lookups.
#[derive(Debug)]
pub struct VersionTable {
    /// Per-identity serial, incremented on every activation.
    serial: u32,
    /// Methods in declaration order.
    methods: Vec<MethodDescriptor>,
    /// Signature -> method index.
    by_signature: FxHashMap<Signature, usize>,
    /// Declared interface identities.
    interfaces: SmallVec<[ClassId; 2]>,
    /// Fields in declaration order; slot == position.
    fields: Vec<FieldDescriptor>,
    /// Field name -> field index.
    by_field: FxHashMap<InternedString, usize>,
}

impl VersionTable {
    /// Build a table from validated entry sets.
    pub fn new(
        serial: u32,
        methods: Vec<MethodDescriptor>,
        interfaces: SmallVec<[ClassId; 2]>,
        fields: Vec<FieldDescriptor>,
    ) -> Self {
        let by_signature = methods
            .iter()
            .enumerate()
            .map(|(i, m)| (m.signature.clone(), i))
            .collect();
        let by_field = fields.iter().enumerate().map(|(i, f)| (f.name, i)).collect();
        Self {
            serial,
            methods,
            by_signature,
            interfaces,
            fields,
            by_field,
        }
    }

    /// The empty serial-0 table every identity starts with.
    pub fn empty() -> Self {
        Self::new(0, Vec::new(), SmallVec::new(), Vec::new())
    }

    /// Per-identity serial number.
    #[inline]
    pub fn serial(&self) -> u32 {
        self.serial
    }

    /// Look up a method by exact signature.
    #[inline]
    pub fn method(&self, signature: &Signature) -> Option<&MethodDescriptor> {
        self.by_signature.get(signature).map(|&i| &self.methods[i])
    }

    /// Index of a method by exact signature.
    #[inline]
    pub fn method_index(&self, signature: &Signature) -> Option<usize> {
        self.by_signature.get(signature).copied()
    }

    /// First method with the given name, in declaration order.
    ///
    /// This is the reflective name-only lookup; overloads resolve to the
    /// earliest declaration.
    pub fn method_named(&self, name: InternedString) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.signature.name == name)
    }

    /// Index of the first method with the given name.
    pub fn method_index_named(&self, name: InternedString) -> Option<usize> {
        self.methods.iter().position(|m| m.signature.name == name)
    }

    /// Method at a known index.
    #[inline]
    pub fn method_at(&self, index: usize) -> Option<&MethodDescriptor> {
        self.methods.get(index)
    }

    /// All methods in declaration order.
    #[inline]
    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    /// Declared interfaces.
    #[inline]
    pub fn interfaces(&self) -> &[ClassId] {
        &self.interfaces
    }

    /// Check whether an interface is declared.
    #[inline]
    pub fn declares_interface(&self, id: ClassId) -> bool {
        self.interfaces.contains(&id)
    }

    /// Look up a field by name.
    #[inline]
    pub fn field(&self, name: InternedString) -> Option<&FieldDescriptor> {
        self.by_field.get(&name).map(|&i| &self.fields[i])
    }

    /// All fields in slot order.
    #[inline]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Number of inline field slots instances of this version allocate.
    #[inline]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Debug-check index consistency. Used when `EngineConfig::verify_tables`
    /// is set.
    pub fn verify(&self) -> bool {
        self.by_signature.len() == self.methods.len()
            && self.by_field.len() == self.fields.len()
            && self.fields.iter().enumerate().all(|(i, f)| f.slot == i)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use molt_core::intern::intern;

    fn ret_one(_recv: &Instance, _args: &[Value]) -> MoltResult<Value> {
        Ok(Value::int(1))
    }

    fn table_with(methods: Vec<MethodDescriptor>) -> VersionTable {
        VersionTable::new(1, methods, SmallVec::new(), Vec::new())
    }

    fn native(name: &str) -> MethodDescriptor {
        MethodDescriptor {
            signature: Signature::niladic(intern(name)),
            flags: MethodFlags::empty(),
            body: Some(ret_one),
        }
    }

    #[test]
    fn test_empty_table() {
        let t = VersionTable::empty();
        assert_eq!(t.serial(), 0);
        assert!(t.methods().is_empty());
        assert!(t.fields().is_empty());
        assert!(t.verify());
    }

    #[test]
    fn test_signature_lookup() {
        let t = table_with(vec![native("getValue1")]);
        let sig = Signature::niladic(intern("getValue1"));
        assert!(t.method(&sig).is_some());
        assert_eq!(t.method_index(&sig), Some(0));

        let missing = Signature::niladic(intern("getValue2"));
        assert!(t.method(&missing).is_none());
    }

    #[test]
    fn test_named_lookup_declaration_order() {
        let overload = MethodDescriptor {
            signature: Signature::new(intern("m"), [TypeTag::Int]),
            flags: MethodFlags::empty(),
            body: Some(ret_one),
        };
        let niladic = MethodDescriptor {
            signature: Signature::niladic(intern("m")),
            flags: MethodFlags::empty(),
            body: Some(ret_one),
        };
        let t = table_with(vec![overload, niladic]);
        let found = t.method_named(intern("m")).unwrap();
        assert_eq!(found.signature.arity(), 1);
        assert_eq!(t.method_index_named(intern("m")), Some(0));
    }

    #[test]
    fn test_field_lookup() {
        let fields = vec![
            FieldDescriptor {
                name: intern("count"),
                ty: TypeTag::Int,
                slot: 0,
            },
            FieldDescriptor {
                name: intern("scale"),
                ty: TypeTag::Float,
                slot: 1,
            },
        ];
        let t = VersionTable::new(3, Vec::new(), SmallVec::new(), fields);
        assert_eq!(t.field_count(), 2);
        assert_eq!(t.field(intern("scale")).unwrap().slot, 1);
        assert!(t.field(intern("missing")).is_none());
        assert!(t.verify());
    }

    #[test]
    fn test_default_values() {
        assert_eq!(TypeTag::Int.default_value(), Value::int(0));
        assert_eq!(TypeTag::Bool.default_value(), Value::bool(false));
        assert_eq!(TypeTag::Float.default_value(), Value::float(0.0));
        assert!(TypeTag::Str.default_value().is_none());
    }

    #[test]
    fn test_signature_display() {
        let sig = Signature::new(intern("add"), [TypeTag::Int, TypeTag::Int]);
        assert_eq!(sig.to_string(), "add/2");
        assert_eq!(sig.arity(), 2);
    }
}
