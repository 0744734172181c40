//! Read-only resolution over linearized ancestry.
//!
//! These walks are side-effect free and never block; they are the slow
//! path behind the JIT's inline caches. Each takes the arena explicitly so
//! chain nodes can stay non-owning [`ModuleId`]s.

use super::arena::ModuleArena;
use super::constant::ConstantRecord;
use super::method::MethodRecord;
use rustc_hash::FxHashMap;
use spinel_core::{InternedString, ModuleId};

/// Does `module`'s linearized ancestry contain `target`?
///
/// Used symmetrically by `include` and `prepend` for cyclic-composition
/// checks, in either direction.
pub fn includes_module(arena: &ModuleArena, module: ModuleId, target: ModuleId) -> bool {
    match arena.get(module) {
        Some(fields) => fields.ancestors().any(|a| a == target),
        None => false,
    }
}

/// Find the nearest method record for `name` in `module`'s ancestry.
///
/// Returns the first record encountered, tombstones included; callers
/// decide whether a tombstone blocks or hides the name.
pub fn lookup_method(
    arena: &ModuleArena,
    module: ModuleId,
    name: &InternedString,
) -> Option<MethodRecord> {
    let fields = arena.get(module)?;
    for ancestor in fields.ancestors() {
        if let Some(ancestor_fields) = arena.get(ancestor) {
            if let Some(method) = ancestor_fields.get_method(name) {
                return Some(method);
            }
        }
    }
    None
}

/// Find the nearest constant record for `name` in `module`'s ancestry.
pub fn lookup_constant(
    arena: &ModuleArena,
    module: ModuleId,
    name: &InternedString,
) -> Option<ConstantRecord> {
    let fields = arena.get(module)?;
    for ancestor in fields.ancestors() {
        if let Some(ancestor_fields) = arena.get(ancestor) {
            if let Some(constant) = ancestor_fields.get_constant(name) {
                return Some(constant);
            }
        }
    }
    None
}

/// The fully resolved method table across ancestry: for each name, the
/// nearest definition wins. Tombstones are kept so callers can filter.
pub fn all_methods(
    arena: &ModuleArena,
    module: ModuleId,
) -> FxHashMap<InternedString, MethodRecord> {
    let mut resolved = FxHashMap::default();
    let Some(fields) = arena.get(module) else {
        return resolved;
    };
    for ancestor in fields.ancestors() {
        if let Some(ancestor_fields) = arena.get(ancestor) {
            for (name, method) in ancestor_fields.methods_snapshot() {
                resolved.entry(name).or_insert(method);
            }
        }
    }
    resolved
}

/// Whether a method name is private by naming convention alone.
///
/// `initialize`-family methods and `respond_to_missing?` are always
/// private, so an alias under such a name is forced private.
pub fn is_method_private_from_name(name: &str) -> bool {
    name.starts_with("initialize") || name == "respond_to_missing?"
}
