//! Module/class metadata engine for the Spinel runtime.
//!
//! This crate maintains, for every type-like entity, its method table,
//! constant table and class-variable table, plus its position in a mutable
//! multiple-inheritance ancestry graph built from single superclassing and
//! arbitrary `include`/`prepend` composition. It answers "what does lookup
//! of X from module M resolve to" after arbitrary runtime redefinition, and
//! it tells the JIT's inline caches when a cached answer has gone stale.
//!
//! Bytecode generation, the interpreter loop, frames and object layout live
//! elsewhere; they call into this engine for lookups and mutations and hold
//! opaque [`Assumption`] tokens for invalidation.
//!
//! [`Assumption`]: module::Assumption

#![deny(unsafe_op_in_unsafe_fn)]

pub mod module;

pub use module::{
    AncestorIter, Assumption, ChainNode, ConstantRecord, MethodRecord, ModuleArena, ModuleFields,
    ModuleKind, Visibility,
};
