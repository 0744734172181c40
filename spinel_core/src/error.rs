//! Errors raised by the module metadata engine.
//!
//! All errors are synchronous and raised at the offending call, carrying
//! the module and name involved. The engine never retries; propagation to
//! user-visible exceptions is the language layer's concern.

use thiserror::Error;

/// Result alias for engine operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// An error from a module metadata operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// An `include`/`prepend` would create an ancestry cycle.
    #[error("cyclic {operation} detected for {module}")]
    CyclicComposition {
        operation: &'static str,
        module: String,
    },

    /// A mutation was attempted on a frozen module.
    #[error("can't modify frozen module: {module}")]
    FrozenModule { module: String },

    /// `undef_method`/`alias_method` could not find the source method.
    #[error("undefined method `{name}' for {module}")]
    UndefinedMethod { module: String, name: String },

    /// `remove_class_variable` on an absent name.
    #[error("class variable {name} not defined for {module}")]
    UndefinedClassVariable { module: String, name: String },

    /// Constant mutation or visibility change on an absent name.
    #[error("uninitialized constant {module}::{name}")]
    UninitializedConstant { module: String, name: String },
}
