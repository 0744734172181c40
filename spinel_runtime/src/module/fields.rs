//! Per-module metadata: tables, ancestry mutation, naming.
//!
//! `ModuleFields` is the unit of mutation. Every operation that changes a
//! table or the chain funnels through the frozen check and ends in an
//! invalidation wave; lookups go through [`resolve`] and stay read-only.
//!
//! # Thread safety
//!
//! Tables are concurrent maps, so readers never block while a single
//! mutation is in flight. Structural chain mutation (`include`/`prepend`)
//! must be serialized by the caller's redefinition lock; concurrent chain
//! readers then see either the old or the new chain (see [`chain`]).
//!
//! [`resolve`]: super::resolve
//! [`chain`]: super::chain

use super::arena::ModuleArena;
use super::chain::{AncestorIter, ChainNode, IncludedModulesIter};
use super::constant::ConstantRecord;
use super::method::{MethodRecord, Visibility};
use super::resolve;
use super::version::{self, Assumption, VersionToken};
use dashmap::DashMap;
use parking_lot::RwLock;
use rustc_hash::{FxBuildHasher, FxHashMap, FxHashSet};
use smallvec::SmallVec;
use spinel_core::{
    InternedString, ModelError, ModelResult, ModuleId, RuntimeContext, Value,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Whether a module is a plain mixin or a class with a superclass slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Module,
    Class { superclass: Option<ModuleId> },
}

/// A module's metadata: identity, naming, chain head, tables, version
/// token and dependent sets.
pub struct ModuleFields {
    id: ModuleId,
    kind: ModuleKind,
    /// Enclosing module at definition site. Non-owning; used for naming.
    lexical_parent: Option<ModuleId>,
    /// Simple name at definition, absent for anonymous modules.
    given_base_name: Option<String>,

    /// Cached display name. Immutable once a full name is set; adoption is
    /// the only path that sets one.
    name: RwLock<Option<String>>,
    has_full_name: AtomicBool,

    /// Chain head: the prepend marker.
    start: Arc<ChainNode>,
    /// The module's own node in its chain.
    origin: Arc<ChainNode>,

    methods: DashMap<InternedString, MethodRecord, FxBuildHasher>,
    constants: DashMap<InternedString, ConstantRecord, FxBuildHasher>,
    class_variables: DashMap<InternedString, Value, FxBuildHasher>,

    version: VersionToken,
    /// Modules whose ancestry includes this one. Weak: ids plus an arena
    /// liveness check, pruned when a wave snapshots them.
    dependents: RwLock<FxHashSet<ModuleId>>,
    /// Modules lexically nested inside this one.
    lexical_dependents: RwLock<FxHashSet<ModuleId>>,
}

impl ModuleFields {
    pub(crate) fn new(
        id: ModuleId,
        kind: ModuleKind,
        lexical_parent: Option<ModuleId>,
        given_base_name: Option<String>,
    ) -> Self {
        let origin = ChainNode::origin(id);
        let start = ChainNode::marker(origin.clone());
        Self {
            id,
            kind,
            lexical_parent,
            given_base_name,
            name: RwLock::new(None),
            has_full_name: AtomicBool::new(false),
            start,
            origin,
            methods: DashMap::with_hasher(FxBuildHasher),
            constants: DashMap::with_hasher(FxBuildHasher),
            class_variables: DashMap::with_hasher(FxBuildHasher),
            version: VersionToken::new(),
            dependents: RwLock::new(FxHashSet::default()),
            lexical_dependents: RwLock::new(FxHashSet::default()),
        }
    }

    // =========================================================================
    // Identity
    // =========================================================================

    #[inline]
    pub fn id(&self) -> ModuleId {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    #[inline]
    pub fn is_class(&self) -> bool {
        matches!(self.kind, ModuleKind::Class { .. })
    }

    #[inline]
    pub fn superclass(&self) -> Option<ModuleId> {
        match self.kind {
            ModuleKind::Class { superclass } => superclass,
            ModuleKind::Module => None,
        }
    }

    #[inline]
    pub fn lexical_parent(&self) -> Option<ModuleId> {
        self.lexical_parent
    }

    #[inline]
    pub fn given_base_name(&self) -> Option<&str> {
        self.given_base_name.as_deref()
    }

    pub(crate) fn start(&self) -> &Arc<ChainNode> {
        &self.start
    }

    pub(crate) fn origin(&self) -> &Arc<ChainNode> {
        &self.origin
    }

    // =========================================================================
    // Ancestry Queries
    // =========================================================================

    /// Linearized ancestors, this module first.
    pub fn ancestors(&self) -> AncestorIter {
        AncestorIter::new(self.start.clone())
    }

    /// Ancestors without the module itself; superclass-relative search.
    pub fn parent_ancestors(&self) -> impl Iterator<Item = ModuleId> {
        self.ancestors().skip(1)
    }

    /// The modules included or prepended here, superclass lineage excluded.
    pub fn prepended_and_included_modules(&self) -> IncludedModulesIter {
        IncludedModulesIter::new(self.start.clone(), self.origin.clone())
    }

    // =========================================================================
    // Ancestry Mutation
    // =========================================================================

    /// Compose `target`'s ancestors into this module's ancestry, below its
    /// own definitions. Callers hold the redefinition lock.
    pub fn include(
        &self,
        arena: &ModuleArena,
        ctx: &RuntimeContext,
        target: ModuleId,
    ) -> ModelResult<()> {
        self.check_frozen(arena, ctx)?;

        // If the module we want to include already includes us, it is cyclic.
        if resolve::includes_module(arena, target, self.id) {
            return Err(ModelError::CyclicComposition {
                operation: "include",
                module: self.name(arena),
            });
        }
        let Some(target_fields) = arena.get(target) else {
            debug_assert!(false, "include target must be live");
            return Ok(());
        };

        // Walk the target's ancestors, staging the new ones. Ancestors we
        // already have before the superclass boundary relocate the
        // insertion point so diamond histories reuse existing positions
        // instead of duplicating; ones at/after the boundary are already
        // inherited and are skipped.
        let mut inclusion_point = self.origin.clone();
        let mut staged: SmallVec<[ModuleId; 8]> = SmallVec::new();
        for ancestor in target_fields.ancestors() {
            if resolve::includes_module(arena, self.id, ancestor) {
                if let Some(existing) = self.included_node_before_superclass(ancestor) {
                    self.perform_includes(arena, &inclusion_point, &mut staged);
                    inclusion_point = existing;
                }
            } else {
                staged.push(ancestor);
            }
        }
        self.perform_includes(arena, &inclusion_point, &mut staged);

        debug!(
            module = %self.name(arena),
            target = %target_fields.name(arena),
            "include"
        );
        self.new_version(arena);
        Ok(())
    }

    /// Insert the staged modules at `point`, deepest first, and record
    /// this module as a dependent of each.
    fn perform_includes(
        &self,
        arena: &ModuleArena,
        point: &Arc<ChainNode>,
        staged: &mut SmallVec<[ModuleId; 8]>,
    ) {
        while let Some(module) = staged.pop() {
            point.insert_after(module);
            if let Some(fields) = arena.get(module) {
                fields.add_dependent(self.id);
            }
        }
    }

    /// Find `target`'s existing node in the included region, i.e. before
    /// this module's superclass boundary.
    fn included_node_before_superclass(&self, target: ModuleId) -> Option<Arc<ChainNode>> {
        let mut cursor = self.origin.parent();
        while let Some(node) = cursor {
            if !node.is_included() {
                return None;
            }
            if node.module() == Some(target) {
                return Some(node);
            }
            cursor = node.parent();
        }
        None
    }

    /// Compose `target`'s ancestors ahead of this module's own definitions.
    pub fn prepend(
        &self,
        arena: &ModuleArena,
        ctx: &RuntimeContext,
        target: ModuleId,
    ) -> ModelResult<()> {
        self.check_frozen(arena, ctx)?;

        if resolve::includes_module(arena, target, self.id) {
            return Err(ModelError::CyclicComposition {
                operation: "prepend",
                module: self.name(arena),
            });
        }
        let Some(target_fields) = arena.get(target) else {
            debug_assert!(false, "prepend target must be live");
            return Ok(());
        };

        // Walk the target's chain from its own marker, inserting each
        // not-yet-present module right behind our marker and advancing the
        // cursor so the target's internal order is preserved. Stop before
        // crossing into the target's superclass lineage.
        let mut cursor = self.start.clone();
        let mut node = Some(target_fields.start.clone());
        while let Some(current) = node {
            let next = current.parent();
            if let Some(module) = current.module() {
                if current.is_origin()
                    && arena.get(module).map_or(false, |f| f.is_class())
                {
                    break;
                }
                if !resolve::includes_module(arena, self.id, module) {
                    cursor = cursor.insert_after(module);
                    if let Some(fields) = arena.get(module) {
                        fields.add_dependent(self.id);
                    }
                }
            }
            node = next;
        }

        debug!(
            module = %self.name(arena),
            target = %target_fields.name(arena),
            "prepend"
        );
        self.new_version(arena);
        Ok(())
    }

    // =========================================================================
    // Method Table
    // =========================================================================

    /// This module's own record for `name`, tombstones included.
    #[inline]
    pub fn get_method(&self, name: &InternedString) -> Option<MethodRecord> {
        self.methods.get(name).map(|entry| entry.value().clone())
    }

    pub(crate) fn methods_snapshot(&self) -> FxHashMap<InternedString, MethodRecord> {
        self.methods
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Define or redefine a method. Replaces any existing entry under the
    /// name; ownership is reassigned to this module.
    ///
    /// While the core library is loading, re-registration of an existing
    /// name is silently ignored (idempotent bootstrap). After load, a
    /// non-tombstone definition fires the `method_added` hook.
    pub fn add_method(
        &self,
        arena: &ModuleArena,
        ctx: &RuntimeContext,
        method: MethodRecord,
    ) -> ModelResult<()> {
        if ctx.is_loading_core() && self.methods.contains_key(method.name()) {
            return Ok(());
        }
        self.check_frozen(arena, ctx)?;

        let name = method.name().clone();
        let undefined = method.is_undefined();
        self.methods.insert(name.clone(), method.with_owner(self.id));
        self.new_version(arena);

        if ctx.is_core_loaded() && !undefined {
            ctx.hooks().method_added(self.id, &name);
        }
        Ok(())
    }

    /// Delete the entry if present; absence is not an error.
    pub fn remove_method(
        &self,
        arena: &ModuleArena,
        ctx: &RuntimeContext,
        name: &InternedString,
    ) -> ModelResult<()> {
        self.check_frozen(arena, ctx)?;
        self.methods.remove(name);
        self.new_version(arena);
        Ok(())
    }

    /// Register a tombstone so lookup treats `name` as explicitly absent
    /// instead of falling through to ancestors.
    pub fn undef_method(
        &self,
        arena: &ModuleArena,
        ctx: &RuntimeContext,
        name: &InternedString,
    ) -> ModelResult<()> {
        match self.deep_method_search(arena, name) {
            Some(method) => self.add_method(arena, ctx, method.undefined_copy()),
            None => Err(ModelError::UndefinedMethod {
                module: self.name(arena),
                name: name.to_string(),
            }),
        }
    }

    /// Search this module's ancestry; for plain mixins, fall back to the
    /// root object class. A tombstone in the own ancestry blocks.
    pub fn deep_method_search(
        &self,
        arena: &ModuleArena,
        name: &InternedString,
    ) -> Option<MethodRecord> {
        if let Some(found) = resolve::lookup_method(arena, self.id, name) {
            return (!found.is_undefined()).then_some(found);
        }
        if !self.is_class() {
            if let Some(object) = arena.object_class() {
                if let Some(found) = resolve::lookup_method(arena, object, name) {
                    return (!found.is_undefined()).then_some(found);
                }
            }
        }
        None
    }

    /// Store a copy of `old_name`'s implementation under `new_name`, owned
    /// by this module. The copy stays resolvable even if the original is
    /// later removed or redefined.
    pub fn alias_method(
        &self,
        arena: &ModuleArena,
        ctx: &RuntimeContext,
        new_name: &InternedString,
        old_name: &InternedString,
    ) -> ModelResult<()> {
        let method =
            self.deep_method_search(arena, old_name)
                .ok_or_else(|| ModelError::UndefinedMethod {
                    module: self.name(arena),
                    name: old_name.to_string(),
                })?;

        let mut alias = method.with_name(new_name.clone());
        if resolve::is_method_private_from_name(new_name) {
            alias = alias.with_visibility(Visibility::Private);
        }
        self.add_method(arena, ctx, alias)
    }

    /// Names of methods matching `filter`, either from this module's own
    /// table or resolved across ancestry (nearest definition wins).
    /// Tombstones never match.
    pub fn filter_methods<F>(
        &self,
        arena: &ModuleArena,
        include_ancestors: bool,
        filter: F,
    ) -> Vec<InternedString>
    where
        F: Fn(&MethodRecord) -> bool,
    {
        let all = if include_ancestors {
            resolve::all_methods(arena, self.id)
        } else {
            self.methods_snapshot()
        };
        all.into_values()
            .filter(|method| !method.is_undefined() && filter(method))
            .map(|method| method.name().clone())
            .collect()
    }

    // =========================================================================
    // Constant Table
    // =========================================================================

    /// This module's own entry for `name`.
    #[inline]
    pub fn get_constant(&self, name: &InternedString) -> Option<ConstantRecord> {
        self.constants.get(name).map(|entry| entry.value().clone())
    }

    /// Snapshot of the constant table, for enumeration.
    pub fn constants_snapshot(&self) -> Vec<(InternedString, ConstantRecord)> {
        self.constants
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Set a constant, possibly redefining it. Module values go through
    /// lexical adoption instead of a plain store, which also names them if
    /// they are still anonymous.
    pub fn set_constant(
        &self,
        arena: &ModuleArena,
        ctx: &RuntimeContext,
        name: &InternedString,
        value: Value,
    ) -> ModelResult<()> {
        if ctx.is_loading_core() && self.constants.contains_key(name) {
            return Ok(());
        }
        if let Some(module) = value.as_module() {
            if let Some(fields) = arena.get(module) {
                return fields.get_adopted_by_lexical_parent(arena, ctx, self.id, name);
            }
        }
        self.set_constant_internal(arena, ctx, name, value, false)
    }

    /// Register a deferred-load constant; `feature` is the path to load
    /// when the constant is first referenced.
    pub fn set_autoload_constant(
        &self,
        arena: &ModuleArena,
        ctx: &RuntimeContext,
        name: &InternedString,
        feature: InternedString,
    ) -> ModelResult<()> {
        self.set_constant_internal(arena, ctx, name, Value::Str(feature), true)
    }

    /// The raw store. Redefinition preserves the previous entry's private
    /// flag; triggers a lexical invalidation wave.
    pub fn set_constant_internal(
        &self,
        arena: &ModuleArena,
        ctx: &RuntimeContext,
        name: &InternedString,
        value: Value,
        autoload: bool,
    ) -> ModelResult<()> {
        self.check_frozen(arena, ctx)?;
        let is_private = self
            .constants
            .get(name)
            .map_or(false, |previous| previous.is_private());
        self.constants.insert(
            name.clone(),
            ConstantRecord::new(self.id, value, is_private, autoload),
        );
        self.new_lexical_version(arena);
        Ok(())
    }

    /// Remove a constant, returning its record.
    pub fn remove_constant(
        &self,
        arena: &ModuleArena,
        ctx: &RuntimeContext,
        name: &InternedString,
    ) -> ModelResult<ConstantRecord> {
        self.check_frozen(arena, ctx)?;
        match self.constants.remove(name) {
            Some((_, record)) => {
                self.new_lexical_version(arena);
                Ok(record)
            }
            None => Err(ModelError::UninitializedConstant {
                module: self.name(arena),
                name: name.to_string(),
            }),
        }
    }

    /// Make a constant private or public.
    pub fn change_constant_visibility(
        &self,
        arena: &ModuleArena,
        ctx: &RuntimeContext,
        name: &InternedString,
        is_private: bool,
    ) -> ModelResult<()> {
        self.check_frozen(arena, ctx)?;
        {
            let Some(mut record) = self.constants.get_mut(name) else {
                return Err(ModelError::UninitializedConstant {
                    module: self.name(arena),
                    name: name.to_string(),
                });
            };
            record.set_private(is_private);
        }
        self.new_lexical_version(arena);
        Ok(())
    }

    // =========================================================================
    // Class-Variable Table
    // =========================================================================

    #[inline]
    pub fn get_class_variable(&self, name: &InternedString) -> Option<Value> {
        self.class_variables
            .get(name)
            .map(|entry| entry.value().clone())
    }

    pub fn set_class_variable(
        &self,
        arena: &ModuleArena,
        ctx: &RuntimeContext,
        name: &InternedString,
        value: Value,
    ) -> ModelResult<()> {
        self.check_frozen(arena, ctx)?;
        self.class_variables.insert(name.clone(), value);
        Ok(())
    }

    pub fn remove_class_variable(
        &self,
        arena: &ModuleArena,
        ctx: &RuntimeContext,
        name: &InternedString,
    ) -> ModelResult<Value> {
        self.check_frozen(arena, ctx)?;
        match self.class_variables.remove(name) {
            Some((_, value)) => Ok(value),
            None => Err(ModelError::UndefinedClassVariable {
                module: self.name(arena),
                name: name.to_string(),
            }),
        }
    }

    // =========================================================================
    // Copying
    // =========================================================================

    /// `dup`-style initialization from another module: tables are copied,
    /// the chain continues where the source's did (prepended region
    /// included), and this copy depends on every source ancestor. The name
    /// is not copied; a copy is anonymous.
    pub fn init_copy(&self, arena: &ModuleArena, from: ModuleId) {
        let Some(source) = arena.get(from) else {
            return;
        };
        for entry in source.methods.iter() {
            self.methods
                .insert(entry.key().clone(), entry.value().clone());
        }
        for entry in source.constants.iter() {
            self.constants
                .insert(entry.key().clone(), entry.value().clone());
        }
        for entry in source.class_variables.iter() {
            self.class_variables
                .insert(entry.key().clone(), entry.value().clone());
        }

        let parent = match source.start.parent() {
            Some(after_marker) if !Arc::ptr_eq(&after_marker, &source.origin) => {
                Some(after_marker)
            }
            _ => source.origin.parent(),
        };
        self.origin.set_parent(parent);

        for ancestor in source.ancestors() {
            if let Some(fields) = arena.get(ancestor) {
                fields.add_dependent(self.id);
            }
        }
    }

    // =========================================================================
    // Naming
    // =========================================================================

    /// The display name, computed lazily and cached. Anonymous modules get
    /// a synthetic `#<Module:0x…>` form usable only for diagnostics.
    pub fn name(&self, arena: &ModuleArena) -> String {
        if let Some(name) = self.name.read().clone() {
            return name;
        }
        let computed = self.anonymous_name(arena);
        let mut slot = self.name.write();
        slot.get_or_insert_with(|| computed).clone()
    }

    fn anonymous_name(&self, arena: &ModuleArena) -> String {
        if let (Some(base), Some(parent)) = (&self.given_base_name, self.lexical_parent) {
            if let Some(parent_fields) = arena.get(parent) {
                return format!("{}::{}", parent_fields.name(arena), base);
            }
        }
        match self.kind {
            ModuleKind::Class { .. } => format!("#<Class:0x{:08x}>", self.id.raw()),
            ModuleKind::Module => format!("#<Module:0x{:08x}>", self.id.raw()),
        }
    }

    /// Fix the full name. Derived from the lexical parent at naming time;
    /// later reparenting does not change it.
    pub fn set_full_name(&self, name: String) {
        *self.name.write() = Some(name);
        self.has_full_name.store(true, Ordering::Release);
    }

    #[inline]
    pub fn has_full_name(&self) -> bool {
        self.has_full_name.load(Ordering::Acquire)
    }

    /// Whether any non-synthetic name component is known.
    #[inline]
    pub fn has_partial_name(&self) -> bool {
        self.has_full_name() || self.given_base_name.is_some()
    }

    /// Assign this module into a constant slot of `parent`, registering it
    /// as a lexical dependent and deriving its full name if it is still
    /// anonymous. Called by the definition-evaluation collaborator when a
    /// module literal is assigned into a constant.
    pub fn get_adopted_by_lexical_parent(
        &self,
        arena: &ModuleArena,
        ctx: &RuntimeContext,
        parent: ModuleId,
        name: &InternedString,
    ) -> ModelResult<()> {
        let Some(parent_fields) = arena.get(parent) else {
            return Ok(());
        };

        parent_fields.set_constant_internal(arena, ctx, name, Value::Module(self.id), false)?;
        parent_fields.add_lexical_dependent(self.id);

        if !self.has_full_name() {
            if Some(parent) == arena.object_class() {
                self.set_full_name(name.to_string());
                self.update_anonymous_children_modules(arena, ctx)?;
            } else if parent_fields.has_full_name() {
                self.set_full_name(format!("{}::{}", parent_fields.name(arena), name));
                self.update_anonymous_children_modules(arena, ctx)?;
            }
            // Otherwise the parent is itself anonymous and will name us
            // when it gets named, via this same cascade.
        }
        Ok(())
    }

    /// Adoption cascade: retroactively name still-anonymous modules held
    /// in this module's constant table, now that this module has a name.
    pub fn update_anonymous_children_modules(
        &self,
        arena: &ModuleArena,
        ctx: &RuntimeContext,
    ) -> ModelResult<()> {
        // Snapshot first: adoption writes back into this constant table.
        let children: Vec<(InternedString, ModuleId)> = self
            .constants
            .iter()
            .filter_map(|entry| {
                entry
                    .value()
                    .value()
                    .as_module()
                    .map(|module| (entry.key().clone(), module))
            })
            .collect();

        for (name, module) in children {
            if let Some(fields) = arena.get(module) {
                if !fields.has_full_name() {
                    fields.get_adopted_by_lexical_parent(arena, ctx, self.id, &name)?;
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Invalidation
    // =========================================================================

    /// The raw version token.
    #[inline]
    pub fn version_token(&self) -> &VersionToken {
        &self.version
    }

    /// Capture the current version for an external inline cache.
    #[inline]
    pub fn unmodified_assumption(&self) -> Assumption {
        Assumption::new(self.id, self.version.current())
    }

    /// Structural invalidation wave: this module and all structural
    /// dependents, transitively.
    pub fn new_version(&self, arena: &ModuleArena) {
        version::invalidate_wave(arena, self.id, false);
    }

    /// Lexical invalidation wave: additionally reaches lexical dependents.
    pub fn new_lexical_version(&self, arena: &ModuleArena) {
        version::invalidate_wave(arena, self.id, true);
    }

    /// Record a module whose ancestry now includes this one.
    pub fn add_dependent(&self, dependent: ModuleId) {
        if dependent != self.id {
            self.dependents.write().insert(dependent);
        }
    }

    /// Record a module lexically nested inside this one.
    pub fn add_lexical_dependent(&self, dependent: ModuleId) {
        if dependent != self.id {
            self.lexical_dependents.write().insert(dependent);
        }
    }

    pub(crate) fn dependents_snapshot(&self, arena: &ModuleArena) -> Vec<ModuleId> {
        let mut set = self.dependents.write();
        set.retain(|id| arena.contains(*id));
        set.iter().copied().collect()
    }

    pub(crate) fn lexical_dependents_snapshot(&self, arena: &ModuleArena) -> Vec<ModuleId> {
        let mut set = self.lexical_dependents.write();
        set.retain(|id| arena.contains(*id));
        set.iter().copied().collect()
    }

    // =========================================================================
    // Frozen Check
    // =========================================================================

    fn check_frozen(&self, arena: &ModuleArena, ctx: &RuntimeContext) -> ModelResult<()> {
        if ctx.is_frozen(self.id) {
            return Err(ModelError::FrozenModule {
                module: self.name(arena),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for ModuleFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleFields")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("given_base_name", &self.given_base_name)
            .field("methods", &self.methods.len())
            .field("constants", &self.constants.len())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
