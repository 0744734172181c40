//! Core types shared across the Spinel runtime.
//!
//! This crate provides:
//! - String interning ([`intern`], [`InternedString`])
//! - Stable module identity ([`ModuleId`]) and the opaque executable
//!   handle ([`CodeRef`])
//! - The [`Value`] enum used in constant and class-variable tables
//! - The engine error type ([`ModelError`])
//! - The ambient runtime context ([`RuntimeContext`]) carrying the
//!   core-library bootstrap state, the frozen-state query and the
//!   `method_added` hook sink

#![deny(unsafe_op_in_unsafe_fn)]

pub mod context;
pub mod error;
pub mod intern;
pub mod value;

pub use context::{
    CoreLibraryState, FrozenQuery, FrozenSet, HookSink, NeverFrozen, NullHooks, RuntimeContext,
};
pub use error::{ModelError, ModelResult};
pub use intern::{intern, InternedString};
pub use value::{CodeRef, ModuleId, Value};
