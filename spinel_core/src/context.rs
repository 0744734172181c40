//! Ambient runtime context consumed by the metadata engine.
//!
//! The engine never reads global state: every mutation takes an explicit
//! [`RuntimeContext`] carrying the core-library bootstrap state, the
//! frozen-state query and the `method_added` hook sink. This keeps the
//! engine testable in isolation and the collaborators swappable.

use crate::intern::InternedString;
use crate::value::ModuleId;
use dashmap::DashSet;
use rustc_hash::FxBuildHasher;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

// =============================================================================
// Core Library State
// =============================================================================

/// Bootstrap state of the core library.
///
/// While `Loading`, built-in definitions are registered idempotently:
/// re-registration of an already-present method or constant is silently
/// ignored instead of replacing it. The transition to `Loaded` is one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreLibraryState {
    Loading,
    Loaded,
}

// =============================================================================
// Collaborator Interfaces
// =============================================================================

/// Receives `method_added` notifications.
///
/// The engine fires this after a non-tombstone method definition once the
/// core library has finished loading; how the hook executes is entirely the
/// object-model collaborator's business.
pub trait HookSink: Send + Sync {
    fn method_added(&self, module: ModuleId, name: &InternedString);
}

/// A hook sink that ignores everything.
#[derive(Debug, Default)]
pub struct NullHooks;

impl HookSink for NullHooks {
    fn method_added(&self, _module: ModuleId, _name: &InternedString) {}
}

/// Answers "is this module frozen?".
///
/// The frozen flag is owned by the object-model collaborator; the engine
/// only queries it before mutating.
pub trait FrozenQuery: Send + Sync {
    fn is_frozen(&self, module: ModuleId) -> bool;
}

/// A frozen query under which nothing is ever frozen.
#[derive(Debug, Default)]
pub struct NeverFrozen;

impl FrozenQuery for NeverFrozen {
    fn is_frozen(&self, _module: ModuleId) -> bool {
        false
    }
}

/// Stock [`FrozenQuery`] backed by a concurrent set of frozen modules.
#[derive(Debug, Default)]
pub struct FrozenSet {
    frozen: DashSet<ModuleId, FxBuildHasher>,
}

impl FrozenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a module as frozen. Freezing is permanent.
    pub fn freeze(&self, module: ModuleId) {
        self.frozen.insert(module);
    }
}

impl FrozenQuery for FrozenSet {
    #[inline]
    fn is_frozen(&self, module: ModuleId) -> bool {
        self.frozen.contains(&module)
    }
}

// =============================================================================
// Runtime Context
// =============================================================================

const STATE_LOADING: u8 = 0;
const STATE_LOADED: u8 = 1;

/// Immutable handle passed into every mutation operation.
pub struct RuntimeContext {
    core_state: AtomicU8,
    hooks: Arc<dyn HookSink>,
    frozen: Arc<dyn FrozenQuery>,
}

impl RuntimeContext {
    /// Context for a fully loaded runtime with no hooks and nothing frozen.
    pub fn new() -> Self {
        Self {
            core_state: AtomicU8::new(STATE_LOADED),
            hooks: Arc::new(NullHooks),
            frozen: Arc::new(NeverFrozen),
        }
    }

    /// Context in bootstrap mode: built-in re-registration is idempotent
    /// until [`finish_bootstrap`] is called.
    ///
    /// [`finish_bootstrap`]: RuntimeContext::finish_bootstrap
    pub fn bootstrap() -> Self {
        Self {
            core_state: AtomicU8::new(STATE_LOADING),
            hooks: Arc::new(NullHooks),
            frozen: Arc::new(NeverFrozen),
        }
    }

    /// Replace the hook sink.
    pub fn with_hooks(mut self, hooks: Arc<dyn HookSink>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Replace the frozen-state query.
    pub fn with_frozen(mut self, frozen: Arc<dyn FrozenQuery>) -> Self {
        self.frozen = frozen;
        self
    }

    /// Current bootstrap state.
    #[inline]
    pub fn core_state(&self) -> CoreLibraryState {
        match self.core_state.load(Ordering::Acquire) {
            STATE_LOADING => CoreLibraryState::Loading,
            _ => CoreLibraryState::Loaded,
        }
    }

    /// Whether the core library is still being loaded.
    #[inline]
    pub fn is_loading_core(&self) -> bool {
        self.core_state() == CoreLibraryState::Loading
    }

    /// Whether the core library has finished loading.
    #[inline]
    pub fn is_core_loaded(&self) -> bool {
        self.core_state() == CoreLibraryState::Loaded
    }

    /// One-way transition out of bootstrap mode.
    pub fn finish_bootstrap(&self) {
        self.core_state.store(STATE_LOADED, Ordering::Release);
    }

    /// The `method_added` hook sink.
    #[inline]
    pub fn hooks(&self) -> &dyn HookSink {
        &*self.hooks
    }

    /// Query the external frozen flag for a module.
    #[inline]
    pub fn is_frozen(&self, module: ModuleId) -> bool {
        self.frozen.is_frozen(module)
    }
}

impl Default for RuntimeContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RuntimeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeContext")
            .field("core_state", &self.core_state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_transition_is_one_way() {
        let ctx = RuntimeContext::bootstrap();
        assert!(ctx.is_loading_core());
        ctx.finish_bootstrap();
        assert!(ctx.is_core_loaded());
        ctx.finish_bootstrap();
        assert!(ctx.is_core_loaded());
    }

    #[test]
    fn test_default_context_is_loaded() {
        let ctx = RuntimeContext::new();
        assert_eq!(ctx.core_state(), CoreLibraryState::Loaded);
        assert!(!ctx.is_frozen(ModuleId::from_raw(0)));
    }

    #[test]
    fn test_frozen_set() {
        let frozen = Arc::new(FrozenSet::new());
        let ctx = RuntimeContext::new().with_frozen(frozen.clone());
        let id = ModuleId::from_raw(3);

        assert!(!ctx.is_frozen(id));
        frozen.freeze(id);
        assert!(ctx.is_frozen(id));
    }
}
