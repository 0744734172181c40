//! Version tokens and the invalidation wave.
//!
//! Every module carries one monotonically advancing [`VersionToken`].
//! External inline caches capture an [`Assumption`] at specialization time
//! and re-check it before trusting a cached resolution; no push
//! notification exists. Invalidation walks the dependent graph once per
//! wave: structural dependents unconditionally, lexical dependents only for
//! constant-affecting changes.
//!
//! The token store uses release ordering and the capture check acquire
//! ordering, so a thread that observes a new table/chain write can never
//! still observe the stale token as valid.

use super::arena::ModuleArena;
use rustc_hash::FxHashSet;
use spinel_core::ModuleId;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

// =============================================================================
// Version Token
// =============================================================================

/// Per-module monotone version counter.
#[derive(Debug, Default)]
pub struct VersionToken {
    version: AtomicU64,
}

impl VersionToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current version.
    #[inline]
    pub fn current(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Advance the token, staling every outstanding capture.
    #[inline]
    pub fn invalidate(&self) -> u64 {
        self.version.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Whether a captured version has been invalidated since.
    #[inline]
    pub fn is_stale(&self, captured: u64) -> bool {
        self.current() > captured
    }
}

// =============================================================================
// Assumption
// =============================================================================

/// A capture of a module's version token, held by an external cache.
///
/// Valid until the module (or anything it structurally/lexically depends
/// on, per the wave rules) is mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assumption {
    module: ModuleId,
    captured: u64,
}

impl Assumption {
    pub(crate) fn new(module: ModuleId, captured: u64) -> Self {
        Self { module, captured }
    }

    /// The module this assumption is about.
    #[inline]
    pub fn module(&self) -> ModuleId {
        self.module
    }

    /// Re-check validity. A dead module never validates.
    pub fn is_valid(&self, arena: &ModuleArena) -> bool {
        match arena.get(self.module) {
            Some(fields) => !fields.version_token().is_stale(self.captured),
            None => false,
        }
    }
}

// =============================================================================
// Invalidation Wave
// =============================================================================

/// Propagate "this module changed" through the dependent graph.
///
/// Each module's token advances exactly once per wave; the visited set
/// breaks cycles, which the dependent graph may contain even though
/// ancestry itself is acyclic. Cannot fail: it is a pure walk over already
/// consistent state.
pub(crate) fn invalidate_wave(arena: &ModuleArena, start: ModuleId, lexical: bool) {
    let mut visited = FxHashSet::default();
    invalidate_recursive(arena, start, lexical, &mut visited);
    trace!(
        module = start.raw(),
        lexical,
        touched = visited.len(),
        "invalidation wave"
    );
}

fn invalidate_recursive(
    arena: &ModuleArena,
    module: ModuleId,
    lexical: bool,
    visited: &mut FxHashSet<ModuleId>,
) {
    if !visited.insert(module) {
        return;
    }
    // Dead dependents are skipped; the sets prune them on snapshot.
    let Some(fields) = arena.get(module) else {
        return;
    };

    fields.version_token().invalidate();

    for dependent in fields.dependents_snapshot(arena) {
        invalidate_recursive(arena, dependent, lexical, visited);
    }
    if lexical {
        for dependent in fields.lexical_dependents_snapshot(arena) {
            invalidate_recursive(arena, dependent, lexical, visited);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_starts_valid() {
        let token = VersionToken::new();
        assert_eq!(token.current(), 0);
        assert!(!token.is_stale(0));
    }

    #[test]
    fn test_invalidate_stales_capture() {
        let token = VersionToken::new();
        let captured = token.current();
        token.invalidate();
        assert!(token.is_stale(captured));
        assert!(!token.is_stale(token.current()));
    }

    #[test]
    fn test_invalidate_is_monotone() {
        let token = VersionToken::new();
        for expected in 1..=5 {
            assert_eq!(token.invalidate(), expected);
        }
        assert_eq!(token.current(), 5);
    }

    #[test]
    fn test_concurrent_invalidation_counts_every_wave() {
        let token = std::sync::Arc::new(VersionToken::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let t = token.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        t.invalidate();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(token.current(), 800);
    }
}
