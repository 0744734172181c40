//! Global string interning.
//!
//! Method, constant and class-variable names are interned once and then
//! compared by pointer on the fast path. The intern table is a concurrent
//! map so worker threads can intern without blocking each other.

use dashmap::DashMap;
use rustc_hash::FxBuildHasher;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, OnceLock};

/// An interned string.
///
/// Cheap to clone (a single `Arc` bump). Equality first tries pointer
/// identity, falling back to content comparison for strings interned
/// concurrently before the table converged.
#[derive(Clone, Eq)]
pub struct InternedString(Arc<str>);

impl InternedString {
    /// Get the underlying string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for InternedString {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl std::hash::Hash for InternedString {
    #[inline]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl Deref for InternedString {
    type Target = str;

    #[inline]
    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for InternedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for InternedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Global intern table.
static INTERNER: OnceLock<DashMap<Arc<str>, (), FxBuildHasher>> = OnceLock::new();

fn table() -> &'static DashMap<Arc<str>, (), FxBuildHasher> {
    INTERNER.get_or_init(|| DashMap::with_hasher(FxBuildHasher))
}

/// Intern a string, returning the canonical handle.
pub fn intern(s: &str) -> InternedString {
    let table = table();
    if let Some(entry) = table.get(s) {
        return InternedString(entry.key().clone());
    }
    // Racing threads may briefly hold distinct Arcs for the same content;
    // equality falls back to content comparison so this is benign.
    let arc: Arc<str> = Arc::from(s);
    table.insert(arc.clone(), ());
    InternedString(arc)
}
