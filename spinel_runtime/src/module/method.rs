//! Method records.

use spinel_core::{CodeRef, InternedString, ModuleId};

/// Method visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

/// An entry in a module's method table.
///
/// Records are immutable; redefinition and aliasing store fresh copies
/// produced by the with-er constructors, so an alias keeps resolving to the
/// implementation it captured even after the original is removed.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodRecord {
    name: InternedString,
    owner: ModuleId,
    visibility: Visibility,
    /// Tombstone: the name is explicitly undefined and lookup must not
    /// fall through to ancestors.
    undefined: bool,
    body: CodeRef,
}

impl MethodRecord {
    /// Create a public method record.
    pub fn new(name: InternedString, owner: ModuleId, body: CodeRef) -> Self {
        Self {
            name,
            owner,
            visibility: Visibility::Public,
            undefined: false,
            body,
        }
    }

    #[inline]
    pub fn name(&self) -> &InternedString {
        &self.name
    }

    #[inline]
    pub fn owner(&self) -> ModuleId {
        self.owner
    }

    #[inline]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    #[inline]
    pub fn is_undefined(&self) -> bool {
        self.undefined
    }

    /// The opaque executable handle. Meaningless for tombstones.
    #[inline]
    pub fn body(&self) -> CodeRef {
        self.body
    }

    /// Copy with a different owning module.
    pub fn with_owner(&self, owner: ModuleId) -> Self {
        Self {
            owner,
            ..self.clone()
        }
    }

    /// Copy under a new name.
    pub fn with_name(&self, name: InternedString) -> Self {
        Self {
            name,
            ..self.clone()
        }
    }

    /// Copy with a different visibility.
    pub fn with_visibility(&self, visibility: Visibility) -> Self {
        Self {
            visibility,
            ..self.clone()
        }
    }

    /// Tombstone copy of this record.
    pub fn undefined_copy(&self) -> Self {
        Self {
            undefined: true,
            ..self.clone()
        }
    }
}
