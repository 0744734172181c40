//! Identifier-addressed module storage.
//!
//! Modules form a cyclic mutable graph with shared non-owning references
//! (chain nodes and dependent sets both point back at modules), so the
//! graph edges are plain [`ModuleId`]s and lifetime is governed here: a
//! module is alive while the arena holds it, and weak dependent membership
//! is an id plus a liveness check. The broader object/GC system decides
//! when to [`release`] a module; this engine never destroys one itself.
//!
//! [`release`]: ModuleArena::release

use super::fields::{ModuleFields, ModuleKind};
use dashmap::DashMap;
use rustc_hash::FxBuildHasher;
use spinel_core::ModuleId;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};

/// The module graph.
pub struct ModuleArena {
    modules: DashMap<ModuleId, Arc<ModuleFields>, FxBuildHasher>,
    next_id: AtomicU32,
    /// The root object class, registered at bootstrap. Deep method search
    /// for plain modules falls back to its ancestry.
    object_class: OnceLock<ModuleId>,
}

impl ModuleArena {
    pub fn new() -> Self {
        Self {
            modules: DashMap::with_hasher(FxBuildHasher),
            next_id: AtomicU32::new(0),
            object_class: OnceLock::new(),
        }
    }

    fn allocate(&self) -> ModuleId {
        ModuleId::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Create an empty module (a plain mixin).
    pub fn create_module(
        &self,
        lexical_parent: Option<ModuleId>,
        given_base_name: Option<&str>,
    ) -> ModuleId {
        let id = self.allocate();
        let fields = Arc::new(ModuleFields::new(
            id,
            ModuleKind::Module,
            lexical_parent,
            given_base_name.map(String::from),
        ));
        self.modules.insert(id, fields);
        id
    }

    /// Create an empty class, linking its chain into the superclass's and
    /// registering it as a structural dependent of every inherited
    /// ancestor.
    pub fn create_class(
        &self,
        lexical_parent: Option<ModuleId>,
        given_base_name: Option<&str>,
        superclass: Option<ModuleId>,
    ) -> ModuleId {
        let id = self.allocate();
        let fields = Arc::new(ModuleFields::new(
            id,
            ModuleKind::Class { superclass },
            lexical_parent,
            given_base_name.map(String::from),
        ));
        if let Some(sup) = superclass {
            if let Some(sup_fields) = self.get(sup) {
                fields.origin().set_parent(Some(sup_fields.start().clone()));
            }
        }
        self.modules.insert(id, fields.clone());
        for ancestor in fields.parent_ancestors() {
            if let Some(ancestor_fields) = self.get(ancestor) {
                ancestor_fields.add_dependent(id);
            }
        }
        id
    }

    /// Look up a live module.
    #[inline]
    pub fn get(&self, id: ModuleId) -> Option<Arc<ModuleFields>> {
        self.modules.get(&id).map(|entry| entry.value().clone())
    }

    /// Liveness check backing weak dependent membership.
    #[inline]
    pub fn contains(&self, id: ModuleId) -> bool {
        self.modules.contains_key(&id)
    }

    /// Drop a module. Called by the GC collaborator once nothing else
    /// references it; dangling dependent entries are pruned lazily.
    pub fn release(&self, id: ModuleId) {
        self.modules.remove(&id);
    }

    /// Register the root object class. Returns false if already set.
    pub fn set_object_class(&self, id: ModuleId) -> bool {
        self.object_class.set(id).is_ok()
    }

    /// The root object class, if bootstrap has registered it.
    #[inline]
    pub fn object_class(&self) -> Option<ModuleId> {
        self.object_class.get().copied()
    }

    /// Number of live modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl Default for ModuleArena {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ModuleArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleArena")
            .field("modules", &self.modules.len())
            .field("object_class", &self.object_class.get())
            .finish()
    }
}
