//! Global string interning.
//!
//! Method and field names are compared constantly on dispatch paths, so they
//! are interned once and compared by pointer afterwards. Interned strings
//! live for the process lifetime; the engine's name population is small and
//! bounded by the loaded class definitions.
//!
//! # Thread Safety
//!
//! The interner is a global table behind a `parking_lot::RwLock`. Interning
//! takes the write lock only on first sight of a string; repeat interning of
//! a known string is a read-locked hash lookup.

use parking_lot::RwLock;
use rustc_hash::FxHashSet;
use std::sync::OnceLock;

// =============================================================================
// InternedString
// =============================================================================

/// A string interned in the global table.
///
/// `Copy`, pointer-sized, with O(1) pointer-identity equality and hashing.
/// Two `InternedString`s compare equal iff their contents are equal, because
/// equal contents always intern to the same allocation.
#[derive(Clone, Copy)]
pub struct InternedString(&'static str);

impl InternedString {
    /// The string contents.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        self.0
    }

    /// Stable address of the interned allocation.
    ///
    /// Usable as a cache key (see the dispatch cache in `molt_vm`).
    #[inline]
    pub fn ptr_value(&self) -> u64 {
        self.0.as_ptr() as u64
    }

    /// Length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check for the empty string.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PartialEq for InternedString {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        // Interning guarantees content-equal strings share an allocation.
        std::ptr::eq(self.0.as_ptr(), other.0.as_ptr())
    }
}

impl Eq for InternedString {}

impl std::hash::Hash for InternedString {
    #[inline]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (self.0.as_ptr() as usize).hash(state);
    }
}

impl std::fmt::Debug for InternedString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl std::fmt::Display for InternedString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

impl AsRef<str> for InternedString {
    #[inline]
    fn as_ref(&self) -> &str {
        self.0
    }
}

// =============================================================================
// Global Interner
// =============================================================================

/// Global intern table.
static INTERNER: OnceLock<RwLock<FxHashSet<&'static str>>> = OnceLock::new();

#[inline]
fn table() -> &'static RwLock<FxHashSet<&'static str>> {
    INTERNER.get_or_init(|| RwLock::new(FxHashSet::default()))
}

/// Intern a string, returning its canonical handle.
///
/// The first interning of a given content leaks one allocation; every later
/// call returns the same handle without allocating.
pub fn intern(s: &str) -> InternedString {
    {
        let guard = table().read();
        if let Some(existing) = guard.get(s) {
            return InternedString(existing);
        }
    }

    let mut guard = table().write();
    // Re-check: another thread may have interned between the two locks.
    if let Some(existing) = guard.get(s) {
        return InternedString(existing);
    }
    let leaked: &'static str = Box::leak(s.to_owned().into_boxed_str());
    guard.insert(leaked);
    InternedString(leaked)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_content_same_pointer() {
        let a = intern("getValue1");
        let b = intern(&"getValue1".to_string());
        assert_eq!(a, b);
        assert_eq!(a.ptr_value(), b.ptr_value());
    }

    #[test]
    fn test_different_content_unequal() {
        let a = intern("getValue1");
        let b = intern("getValue2");
        assert_ne!(a, b);
        assert_ne!(a.ptr_value(), b.ptr_value());
    }

    #[test]
    fn test_contents_preserved() {
        let s = intern("fieldName");
        assert_eq!(s.as_str(), "fieldName");
        assert_eq!(s.len(), 9);
        assert!(!s.is_empty());
    }

    #[test]
    fn test_hash_consistency() {
        use rustc_hash::FxHashMap;
        let mut map = FxHashMap::default();
        map.insert(intern("k"), 1);
        assert_eq!(map.get(&intern("k")), Some(&1));
    }

    #[test]
    fn test_concurrent_interning() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| intern("racy")))
            .collect();
        let mut ptrs: Vec<u64> = handles
            .into_iter()
            .map(|h| h.join().unwrap().ptr_value())
            .collect();
        ptrs.dedup();
        assert_eq!(ptrs.len(), 1);
    }
}
