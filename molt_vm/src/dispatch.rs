//! Method resolution against the currently active table.
//!
//! This is the crux of redefinition correctness: a method added after an
//! object's construction must become callable on that object — directly and
//! reflectively — without re-allocating or re-wrapping it. The resolver
//! therefore loads the identity's live table on every lookup and never holds
//! a table across operations.
//!
//! # Caching
//!
//! Name-based reflective lookups scan the method list, so they go through a
//! global cache keyed by `(class id, interned name pointer)`. Entries carry
//! the table serial they were resolved against and self-invalidate when the
//! live serial differs — a redefinition needs no cache walk, the next lookup
//! simply misses and repopulates.

use dashmap::DashMap;
use molt_core::intern::InternedString;
use molt_core::{MoltError, MoltResult, Value};
use molt_runtime::class::identity::{ClassId, ClassIdentity};
use molt_runtime::class::registry::VersionRegistry;
use molt_runtime::class::table::{MethodDescriptor, Signature};
use molt_runtime::instance::Instance;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

// =============================================================================
// Dispatch Cache
// =============================================================================

/// Cache key: (class id, interned method name pointer).
type CacheKey = (ClassId, u64);

/// A cached name resolution: the table serial it is valid for plus the
/// method index within that table.
#[derive(Debug, Clone, Copy)]
struct CachedLookup {
    serial: u32,
    index: usize,
}

/// Global name-resolution cache.
///
/// Entries never pin a table: only the serial and index are stored, and the
/// live table is re-loaded on every hit, so superseded tables retire as soon
/// as their last real holder drops them.
pub struct DispatchCache {
    cache: DashMap<CacheKey, CachedLookup>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl DispatchCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a cached index, valid only for the given live serial.
    #[inline]
    fn get(&self, key: CacheKey, live_serial: u32) -> Option<usize> {
        match self.cache.get(&key) {
            Some(entry) if entry.serial == live_serial => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.index)
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Record a resolution.
    #[inline]
    fn insert(&self, key: CacheKey, serial: u32, index: usize) {
        self.cache.insert(key, CachedLookup { serial, index });
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// (hits, misses) so far.
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    /// Number of cached resolutions.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl Default for DispatchCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Global dispatch cache singleton.
static DISPATCH_CACHE: OnceLock<DispatchCache> = OnceLock::new();

/// Get the global dispatch cache.
#[inline]
pub fn dispatch_cache() -> &'static DispatchCache {
    DISPATCH_CACHE.get_or_init(DispatchCache::new)
}

// =============================================================================
// Dispatch Resolver
// =============================================================================

/// Resolves method lookups against live identities.
#[derive(Clone)]
pub struct DispatchResolver {
    registry: Arc<VersionRegistry>,
}

impl DispatchResolver {
    /// Create a resolver over a registry.
    pub fn new(registry: Arc<VersionRegistry>) -> Self {
        Self { registry }
    }

    /// The registry lookups run against.
    #[inline]
    pub fn registry(&self) -> &Arc<VersionRegistry> {
        &self.registry
    }

    /// Resolve an exact signature against an identity's active table.
    pub fn resolve(&self, id: ClassId, signature: &Signature) -> MoltResult<MethodDescriptor> {
        let identity = self.registry.identity(id)?;
        self.resolve_on(&identity, signature)
    }

    /// Resolve an exact signature against a known identity.
    pub fn resolve_on(
        &self,
        identity: &Arc<ClassIdentity>,
        signature: &Signature,
    ) -> MoltResult<MethodDescriptor> {
        let table = identity.current();
        table.method(signature).cloned().ok_or_else(|| {
            MoltError::method_not_found(identity.name().as_str(), signature.name.as_str())
        })
    }

    /// Reflective name-only lookup: first active method with that name, in
    /// declaration order.
    pub fn resolve_named(&self, id: ClassId, name: InternedString) -> MoltResult<MethodDescriptor> {
        let identity = self.registry.identity(id)?;
        self.resolve_named_on(&identity, name)
    }

    /// Reflective name-only lookup against a known identity.
    pub fn resolve_named_on(
        &self,
        identity: &Arc<ClassIdentity>,
        name: InternedString,
    ) -> MoltResult<MethodDescriptor> {
        let table = identity.current();
        let key = (identity.id(), name.ptr_value());
        let live_serial = table.serial();

        if let Some(index) = dispatch_cache().get(key, live_serial) {
            // Guard against index drift on the off chance the entry predates
            // an id collision; the name must still match.
            if let Some(m) = table.method_at(index) {
                if m.name() == name {
                    return Ok(m.clone());
                }
            }
        }

        match table.method_index_named(name) {
            Some(index) => {
                dispatch_cache().insert(key, live_serial, index);
                // Index is valid: we just computed it against this table.
                Ok(table.methods()[index].clone())
            }
            None => Err(MoltError::method_not_found(
                identity.name().as_str(),
                name.as_str(),
            )),
        }
    }

    /// Resolve a signature on an instance's identity.
    #[inline]
    pub fn resolve_instance(
        &self,
        instance: &Instance,
        signature: &Signature,
    ) -> MoltResult<MethodDescriptor> {
        self.resolve_on(instance.identity(), signature)
    }

    /// Name-only lookup on an instance's identity.
    #[inline]
    pub fn resolve_instance_named(
        &self,
        instance: &Instance,
        name: InternedString,
    ) -> MoltResult<MethodDescriptor> {
        self.resolve_named_on(instance.identity(), name)
    }

    /// Resolve by name on an instance and invoke in one step.
    pub fn invoke(
        &self,
        instance: &Instance,
        name: InternedString,
        args: &[Value],
    ) -> MoltResult<Value> {
        let method = self.resolve_instance_named(instance, name)?;
        method.invoke(instance, args)
    }

    /// The full method set of an identity's active table.
    pub fn methods_of(&self, id: ClassId) -> MoltResult<Vec<MethodDescriptor>> {
        let table = self.registry.current(id)?;
        Ok(table.methods().to_vec())
    }

    /// The full active method set for an instance.
    pub fn methods_of_instance(&self, instance: &Instance) -> Vec<MethodDescriptor> {
        instance.identity().current().methods().to_vec()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use molt_core::intern::intern;
    use molt_runtime::class::identity::ClassKind;
    use molt_runtime::redefine::{MethodDef, RedefinitionEngine, TableDef};

    fn ret_one(_recv: &Instance, _args: &[Value]) -> MoltResult<Value> {
        Ok(Value::int(1))
    }

    fn ret_two(_recv: &Instance, _args: &[Value]) -> MoltResult<Value> {
        Ok(Value::int(2))
    }

    fn setup() -> (Arc<VersionRegistry>, RedefinitionEngine, DispatchResolver) {
        let registry = Arc::new(VersionRegistry::new());
        let engine = RedefinitionEngine::new(registry.clone());
        let resolver = DispatchResolver::new(registry.clone());
        (registry, engine, resolver)
    }

    #[test]
    fn test_resolve_against_active_table() {
        let (registry, engine, resolver) = setup();
        let class = registry.register("C", ClassKind::Class);
        engine
            .propose(
                class.id(),
                &TableDef::new().with_method(MethodDef::native("m", [], ret_one)),
            )
            .unwrap();

        let sig = Signature::niladic(intern("m"));
        let method = resolver.resolve(class.id(), &sig).unwrap();
        assert_eq!(method.name().as_str(), "m");
    }

    #[test]
    fn test_missing_method_is_recoverable() {
        let (registry, _engine, resolver) = setup();
        let class = registry.register("D", ClassKind::Class);
        let err = resolver
            .resolve_named(class.id(), intern("absent"))
            .unwrap_err();
        assert!(matches!(err, MoltError::MethodNotFound { .. }));
    }

    #[test]
    fn test_resolution_tracks_redefinition() {
        let (registry, engine, resolver) = setup();
        let class = registry.register("E", ClassKind::Class);
        engine
            .propose(
                class.id(),
                &TableDef::new().with_method(MethodDef::native("m", [], ret_one)),
            )
            .unwrap();

        let inst = Instance::new(&class);
        assert_eq!(
            resolver.invoke(&inst, intern("m"), &[]).unwrap(),
            Value::int(1)
        );

        // Warm the cache, then redefine.
        let _ = resolver.resolve_named(class.id(), intern("m")).unwrap();
        engine
            .propose(
                class.id(),
                &TableDef::new().with_method(MethodDef::native("m", [], ret_two)),
            )
            .unwrap();

        // Same instance, new behavior: the cached serial no longer matches.
        assert_eq!(
            resolver.invoke(&inst, intern("m"), &[]).unwrap(),
            Value::int(2)
        );
    }

    #[test]
    fn test_cache_hit_on_repeat_lookup() {
        let (registry, engine, resolver) = setup();
        let class = registry.register("F", ClassKind::Class);
        engine
            .propose(
                class.id(),
                &TableDef::new().with_method(MethodDef::native("m", [], ret_one)),
            )
            .unwrap();

        let name = intern("m");
        let _ = resolver.resolve_named(class.id(), name).unwrap();
        let (hits_before, _) = dispatch_cache().stats();
        let _ = resolver.resolve_named(class.id(), name).unwrap();
        let (hits_after, _) = dispatch_cache().stats();
        assert!(hits_after > hits_before);
    }

    #[test]
    fn test_methods_of_reflects_active_set() {
        let (registry, engine, resolver) = setup();
        let class = registry.register("G", ClassKind::Class);
        engine
            .propose(
                class.id(),
                &TableDef::new()
                    .with_method(MethodDef::native("a", [], ret_one))
                    .with_method(MethodDef::native("b", [], ret_one)),
            )
            .unwrap();

        let names: Vec<_> = resolver
            .methods_of(class.id())
            .unwrap()
            .iter()
            .map(|m| m.name().as_str())
            .collect();
        assert_eq!(names, vec!["a", "b"]);

        engine
            .propose(
                class.id(),
                &TableDef::new().with_method(MethodDef::native("c", [], ret_one)),
            )
            .unwrap();
        let names: Vec<_> = resolver
            .methods_of(class.id())
            .unwrap()
            .iter()
            .map(|m| m.name().as_str())
            .collect();
        assert_eq!(names, vec!["c"]);
    }
}
