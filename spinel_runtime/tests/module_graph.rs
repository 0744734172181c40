//! End-to-end tests over the module graph: composition, resolution,
//! invalidation waves and adoption naming, exercised through the public
//! API the way an interpreter front-end would drive it.

use spinel_core::{intern, CodeRef, ModelError, ModuleId, RuntimeContext, Value};
use spinel_runtime::module::resolve;
use spinel_runtime::{ModuleArena, ModuleFields};
use std::sync::Arc;

fn define(
    arena: &ModuleArena,
    ctx: &RuntimeContext,
    module: ModuleId,
    name: &str,
    body: u64,
) {
    let fields = arena.get(module).unwrap();
    fields
        .add_method(
            arena,
            ctx,
            spinel_runtime::MethodRecord::new(intern(name), module, CodeRef(body)),
        )
        .unwrap();
}

fn ancestry(arena: &ModuleArena, module: ModuleId) -> Vec<ModuleId> {
    arena.get(module).unwrap().ancestors().collect()
}

fn fields(arena: &ModuleArena, module: ModuleId) -> Arc<ModuleFields> {
    arena.get(module).unwrap()
}

// =============================================================================
// Composition
// =============================================================================

#[test]
fn include_pulls_in_ancestors_in_relative_order() {
    let arena = ModuleArena::new();
    let ctx = RuntimeContext::new();
    let m1 = arena.create_module(None, Some("M1"));
    let m2 = arena.create_module(None, Some("M2"));
    let b = arena.create_module(None, Some("B"));
    let a = arena.create_module(None, Some("A"));

    fields(&arena, b).include(&arena, &ctx, m1).unwrap();
    fields(&arena, b).include(&arena, &ctx, m2).unwrap();
    assert_eq!(ancestry(&arena, b), vec![b, m2, m1]);

    fields(&arena, a).include(&arena, &ctx, b).unwrap();
    assert_eq!(ancestry(&arena, a), vec![a, b, m2, m1]);
}

#[test]
fn include_diamond_reuses_existing_position() {
    let arena = ModuleArena::new();
    let ctx = RuntimeContext::new();
    let m1 = arena.create_module(None, Some("M1"));
    let b = arena.create_module(None, Some("B"));
    let a = arena.create_module(None, Some("A"));

    fields(&arena, b).include(&arena, &ctx, m1).unwrap();
    fields(&arena, a).include(&arena, &ctx, m1).unwrap();
    fields(&arena, a).include(&arena, &ctx, b).unwrap();

    // M1 appears once, and B lands ahead of the shared M1 node.
    assert_eq!(ancestry(&arena, a), vec![a, b, m1]);
}

#[test]
fn cyclic_include_fails_and_leaves_ancestries_intact() {
    let arena = ModuleArena::new();
    let ctx = RuntimeContext::new();
    let a = arena.create_module(None, Some("A"));
    let b = arena.create_module(None, Some("B"));

    fields(&arena, a).include(&arena, &ctx, b).unwrap();
    let a_before = ancestry(&arena, a);
    let b_before = ancestry(&arena, b);

    let err = fields(&arena, b).include(&arena, &ctx, a).unwrap_err();
    assert!(matches!(
        err,
        ModelError::CyclicComposition { operation: "include", .. }
    ));
    assert_eq!(ancestry(&arena, a), a_before);
    assert_eq!(ancestry(&arena, b), b_before);
}

#[test]
fn reinclude_is_idempotent() {
    let arena = ModuleArena::new();
    let ctx = RuntimeContext::new();
    let m = arena.create_module(None, Some("M"));
    let a = arena.create_module(None, Some("A"));

    fields(&arena, a).include(&arena, &ctx, m).unwrap();
    let before = ancestry(&arena, a);
    fields(&arena, a).include(&arena, &ctx, m).unwrap();
    assert_eq!(ancestry(&arena, a), before);
}

#[test]
fn prepend_wins_over_own_definition_but_not_superclass_lookup() {
    let arena = ModuleArena::new();
    let ctx = RuntimeContext::new();
    let sup = arena.create_class(None, Some("Base"), None);
    let a = arena.create_class(None, Some("A"), Some(sup));
    let b = arena.create_module(None, Some("B"));

    define(&arena, &ctx, sup, "inherited", 10);
    define(&arena, &ctx, a, "foo", 20);
    define(&arena, &ctx, b, "foo", 30);

    fields(&arena, a).prepend(&arena, &ctx, b).unwrap();
    assert_eq!(ancestry(&arena, a), vec![b, a, sup]);

    let foo = resolve::lookup_method(&arena, a, &intern("foo")).unwrap();
    assert_eq!(foo.owner(), b);
    assert_eq!(foo.body(), CodeRef(30));

    // Superclass methods still resolve through the prepended chain.
    let inherited = resolve::lookup_method(&arena, a, &intern("inherited")).unwrap();
    assert_eq!(inherited.owner(), sup);
}

#[test]
fn cyclic_prepend_fails() {
    let arena = ModuleArena::new();
    let ctx = RuntimeContext::new();
    let a = arena.create_module(None, Some("A"));
    let b = arena.create_module(None, Some("B"));

    fields(&arena, a).include(&arena, &ctx, b).unwrap();
    let err = fields(&arena, b).prepend(&arena, &ctx, a).unwrap_err();
    assert!(matches!(
        err,
        ModelError::CyclicComposition { operation: "prepend", .. }
    ));
}

// =============================================================================
// Resolution
// =============================================================================

#[test]
fn undef_blocks_ancestor_definitions() {
    let arena = ModuleArena::new();
    let ctx = RuntimeContext::new();
    let sup = arena.create_class(None, Some("Base"), None);
    let a = arena.create_class(None, Some("A"), Some(sup));

    define(&arena, &ctx, sup, "greet", 1);
    assert!(fields(&arena, a)
        .deep_method_search(&arena, &intern("greet"))
        .is_some());

    fields(&arena, a)
        .undef_method(&arena, &ctx, &intern("greet"))
        .unwrap();
    assert!(fields(&arena, a)
        .deep_method_search(&arena, &intern("greet"))
        .is_none());

    // The ancestor's own definition is untouched.
    assert!(fields(&arena, sup)
        .deep_method_search(&arena, &intern("greet"))
        .is_some());
}

#[test]
fn alias_copies_rather_than_references() {
    let arena = ModuleArena::new();
    let ctx = RuntimeContext::new();
    let a = arena.create_module(None, Some("A"));

    define(&arena, &ctx, a, "old", 42);
    fields(&arena, a)
        .alias_method(&arena, &ctx, &intern("new"), &intern("old"))
        .unwrap();

    fields(&arena, a)
        .remove_method(&arena, &ctx, &intern("old"))
        .unwrap();
    define(&arena, &ctx, a, "old", 99);

    let aliased = fields(&arena, a)
        .deep_method_search(&arena, &intern("new"))
        .unwrap();
    assert_eq!(aliased.body(), CodeRef(42));
    assert_eq!(aliased.owner(), a);
}

#[test]
fn include_then_remove_scenario() {
    let arena = ModuleArena::new();
    let ctx = RuntimeContext::new();
    let a = arena.create_class(None, Some("A"), None);
    let mixin = arena.create_module(None, Some("Mod"));
    define(&arena, &ctx, mixin, "foo", 1);

    fields(&arena, a).include(&arena, &ctx, mixin).unwrap();
    let found = fields(&arena, a)
        .deep_method_search(&arena, &intern("foo"))
        .unwrap();
    assert_eq!(found.owner(), mixin);

    let assumption = fields(&arena, a).unmodified_assumption();
    fields(&arena, mixin)
        .remove_method(&arena, &ctx, &intern("foo"))
        .unwrap();

    assert!(fields(&arena, a)
        .deep_method_search(&arena, &intern("foo"))
        .is_none());
    assert!(!assumption.is_valid(&arena));
}

#[test]
fn constant_resolution_is_nearest_first() {
    let arena = ModuleArena::new();
    let ctx = RuntimeContext::new();
    let mixin = arena.create_module(None, Some("Mix"));
    let a = arena.create_module(None, Some("A"));
    let name = intern("LIMIT");

    fields(&arena, mixin)
        .set_constant(&arena, &ctx, &name, Value::Int(1))
        .unwrap();
    fields(&arena, a).include(&arena, &ctx, mixin).unwrap();
    assert_eq!(
        resolve::lookup_constant(&arena, a, &name).unwrap().value(),
        &Value::Int(1)
    );

    fields(&arena, a)
        .set_constant(&arena, &ctx, &name, Value::Int(2))
        .unwrap();
    assert_eq!(
        resolve::lookup_constant(&arena, a, &name).unwrap().value(),
        &Value::Int(2)
    );
}

// =============================================================================
// Invalidation
// =============================================================================

#[test]
fn structural_wave_skips_lexical_only_dependents() {
    let arena = ModuleArena::new();
    let ctx = RuntimeContext::new();
    let m = arena.create_module(None, Some("M"));
    let structural = arena.create_module(None, Some("S"));
    let lexical = arena.create_module(None, Some("L"));

    fields(&arena, structural).include(&arena, &ctx, m).unwrap();
    fields(&arena, m).add_lexical_dependent(lexical);

    let s_token = fields(&arena, structural).unmodified_assumption();
    let l_token = fields(&arena, lexical).unmodified_assumption();

    fields(&arena, m).new_version(&arena);
    assert!(!s_token.is_valid(&arena));
    assert!(l_token.is_valid(&arena));

    let l_token = fields(&arena, lexical).unmodified_assumption();
    fields(&arena, m).new_lexical_version(&arena);
    assert!(!l_token.is_valid(&arena));
}

#[test]
fn constant_mutation_reaches_lexical_dependents() {
    let arena = ModuleArena::new();
    let ctx = RuntimeContext::new();
    let outer = arena.create_module(None, Some("Outer"));
    let inner = arena.create_module(Some(outer), Some("Inner"));
    fields(&arena, outer).add_lexical_dependent(inner);

    let token = fields(&arena, inner).unmodified_assumption();
    fields(&arena, outer)
        .set_constant(&arena, &ctx, &intern("K"), Value::Int(1))
        .unwrap();
    assert!(!token.is_valid(&arena));
}

#[test]
fn cyclic_dependent_graph_advances_each_token_once() {
    let arena = ModuleArena::new();
    let m = arena.create_module(None, Some("M"));
    let n = arena.create_module(None, Some("N"));
    fields(&arena, m).add_dependent(n);
    fields(&arena, n).add_dependent(m);

    let m_before = fields(&arena, m).version_token().current();
    let n_before = fields(&arena, n).version_token().current();

    fields(&arena, m).new_version(&arena);

    assert_eq!(fields(&arena, m).version_token().current(), m_before + 1);
    assert_eq!(fields(&arena, n).version_token().current(), n_before + 1);
}

#[test]
fn released_dependents_are_pruned_from_waves() {
    let arena = ModuleArena::new();
    let ctx = RuntimeContext::new();
    let m = arena.create_module(None, Some("M"));
    let dep = arena.create_module(None, Some("Dep"));
    fields(&arena, dep).include(&arena, &ctx, m).unwrap();

    arena.release(dep);
    // The wave must ignore the dead id rather than resurrect or panic.
    fields(&arena, m).new_version(&arena);
    assert!(!arena.contains(dep));
}

// =============================================================================
// Naming
// =============================================================================

#[test]
fn anonymous_module_named_on_constant_assignment() {
    let arena = ModuleArena::new();
    let ctx = RuntimeContext::new();
    let outer = arena.create_module(None, Some("Outer"));
    fields(&arena, outer).set_full_name("Outer".to_string());

    let x = arena.create_module(None, None);
    let synthetic = fields(&arena, x).name(&arena);
    assert!(synthetic.starts_with("#<Module:0x"), "got {synthetic}");

    fields(&arena, outer)
        .set_constant(&arena, &ctx, &intern("Y"), Value::Module(x))
        .unwrap();

    assert!(fields(&arena, x).has_full_name());
    assert_eq!(fields(&arena, x).name(&arena), "Outer::Y");
    assert_eq!(
        resolve::lookup_constant(&arena, outer, &intern("Y"))
            .unwrap()
            .value(),
        &Value::Module(x)
    );
}

#[test]
fn adoption_cascades_to_anonymous_grandchildren() {
    let arena = ModuleArena::new();
    let ctx = RuntimeContext::new();
    let object = arena.create_class(None, Some("Object"), None);
    arena.set_object_class(object);

    // Build Parent::Child bottom-up while both are anonymous, then assign
    // Parent into Object; both names resolve in one cascade.
    let parent = arena.create_module(None, None);
    let child = arena.create_module(None, None);
    fields(&arena, parent)
        .set_constant(&arena, &ctx, &intern("Child"), Value::Module(child))
        .unwrap();
    assert!(!fields(&arena, child).has_full_name());

    fields(&arena, object)
        .set_constant(&arena, &ctx, &intern("Parent"), Value::Module(parent))
        .unwrap();

    assert_eq!(fields(&arena, parent).name(&arena), "Parent");
    assert_eq!(fields(&arena, child).name(&arena), "Parent::Child");
}
