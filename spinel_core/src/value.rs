//! Module identity, opaque executable handles and table values.

use crate::intern::InternedString;
use std::fmt;

/// Stable identity of a module within the runtime's module arena.
///
/// Chain nodes and dependent sets store `ModuleId`s rather than owning
/// references, so cyclic graphs are representationally safe and lifetime
/// stays with the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(u32);

impl ModuleId {
    /// Create from a raw arena index.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw arena index.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module#{}", self.0)
    }
}

/// Opaque handle to an executable method body.
///
/// Supplied by the interpreter/compiler collaborator; the metadata engine
/// stores and copies it but never interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodeRef(pub u64);

/// A value stored in a constant or class-variable table.
///
/// Deliberately small: the engine only needs to distinguish module values
/// (which participate in naming adoption) from everything else.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Str(InternedString),
    /// A module or class, by arena identity.
    Module(ModuleId),
}

impl Value {
    /// Check whether this value is a module reference.
    #[inline]
    pub fn is_module(&self) -> bool {
        matches!(self, Value::Module(_))
    }

    /// Get the module identity if this value is a module.
    #[inline]
    pub fn as_module(&self) -> Option<ModuleId> {
        match self {
            Value::Module(id) => Some(*id),
            _ => None,
        }
    }
}
