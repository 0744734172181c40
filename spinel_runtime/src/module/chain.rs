//! Ancestry chain nodes and iterators.
//!
//! Every module owns a singly-linked chain:
//!
//! ```text
//! start ──▶ PrependMarker ─▶ [prepended modules] ─▶ Origin(self)
//!                                  ─▶ [included modules] ─▶ superclass start … ─▶ ∅
//! ```
//!
//! The prepend marker is a sentinel separating the prepended region from
//! the module's own method table (the origin node). Included-module nodes
//! are non-owning: they carry a [`ModuleId`], and the same target module
//! may appear in many chains.
//!
//! # Concurrency
//!
//! Structural mutation is externally serialized (callers hold the
//! redefinition lock), but readers walk chains concurrently. Every splice
//! goes through [`ChainNode::insert_after`]: the new node is fully built
//! first and then published with a single write of the predecessor's parent
//! link, so a concurrent walk observes either the pre- or post-mutation
//! chain, never a partially linked one.

use parking_lot::RwLock;
use spinel_core::ModuleId;
use std::sync::Arc;

// =============================================================================
// Chain Nodes
// =============================================================================

/// What a chain node stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainNodeKind {
    /// Sentinel at the head of every chain; carries no module.
    PrependMarker,
    /// The module's own method/constant table. Exactly one per module.
    Origin(ModuleId),
    /// A module inserted by `include`/`prepend`.
    Included(ModuleId),
}

/// A node in an ancestry chain.
#[derive(Debug)]
pub struct ChainNode {
    kind: ChainNodeKind,
    parent: RwLock<Option<Arc<ChainNode>>>,
}

impl ChainNode {
    /// Create a prepend-marker head whose parent is `origin`.
    pub fn marker(origin: Arc<ChainNode>) -> Arc<Self> {
        Arc::new(Self {
            kind: ChainNodeKind::PrependMarker,
            parent: RwLock::new(Some(origin)),
        })
    }

    /// Create a module's origin node with no continuation yet.
    pub fn origin(module: ModuleId) -> Arc<Self> {
        Arc::new(Self {
            kind: ChainNodeKind::Origin(module),
            parent: RwLock::new(None),
        })
    }

    /// The node kind.
    #[inline]
    pub fn kind(&self) -> ChainNodeKind {
        self.kind
    }

    /// The module this node refers to, if any.
    #[inline]
    pub fn module(&self) -> Option<ModuleId> {
        match self.kind {
            ChainNodeKind::PrependMarker => None,
            ChainNodeKind::Origin(id) | ChainNodeKind::Included(id) => Some(id),
        }
    }

    /// Whether this node is an included-module node.
    #[inline]
    pub fn is_included(&self) -> bool {
        matches!(self.kind, ChainNodeKind::Included(_))
    }

    /// Whether this node is an origin node.
    #[inline]
    pub fn is_origin(&self) -> bool {
        matches!(self.kind, ChainNodeKind::Origin(_))
    }

    /// The next node in the chain.
    #[inline]
    pub fn parent(&self) -> Option<Arc<ChainNode>> {
        self.parent.read().clone()
    }

    /// Replace the continuation of this node (superclass linkage, copies).
    pub fn set_parent(&self, parent: Option<Arc<ChainNode>>) {
        *self.parent.write() = parent;
    }

    /// Splice a new included-module node directly after this one, returning
    /// it. The node is fully constructed before the one publishing write.
    pub fn insert_after(&self, module: ModuleId) -> Arc<ChainNode> {
        let mut link = self.parent.write();
        let node = Arc::new(ChainNode {
            kind: ChainNodeKind::Included(module),
            parent: RwLock::new(link.clone()),
        });
        *link = Some(node.clone());
        node
    }
}

// =============================================================================
// Ancestor Iteration
// =============================================================================

/// Lazy, restartable walk over a chain in linearized order.
///
/// Yields each included/origin module and follows superclass links; prepend
/// markers are skipped.
#[derive(Debug, Clone)]
pub struct AncestorIter {
    next: Option<Arc<ChainNode>>,
}

impl AncestorIter {
    /// Start a walk at `head` (usually a module's prepend marker).
    pub fn new(head: Arc<ChainNode>) -> Self {
        Self { next: Some(head) }
    }
}

impl Iterator for AncestorIter {
    type Item = ModuleId;

    fn next(&mut self) -> Option<ModuleId> {
        while let Some(node) = self.next.take() {
            self.next = node.parent();
            if let Some(id) = node.module() {
                return Some(id);
            }
        }
        None
    }
}

/// Walk over the include/prepend region of a chain: everything before the
/// superclass boundary, excluding the module's own origin node.
#[derive(Debug, Clone)]
pub struct IncludedModulesIter {
    next: Option<Arc<ChainNode>>,
    head: Arc<ChainNode>,
    own_origin: Arc<ChainNode>,
}

impl IncludedModulesIter {
    pub fn new(head: Arc<ChainNode>, own_origin: Arc<ChainNode>) -> Self {
        Self {
            next: Some(head.clone()),
            head,
            own_origin,
        }
    }
}

impl Iterator for IncludedModulesIter {
    type Item = ModuleId;

    fn next(&mut self) -> Option<ModuleId> {
        while let Some(node) = self.next.take() {
            // A foreign origin, or a foreign prepend marker, means we
            // crossed into the superclass lineage.
            let foreign_origin = node.is_origin() && !Arc::ptr_eq(&node, &self.own_origin);
            let foreign_marker = node.kind() == ChainNodeKind::PrependMarker
                && !Arc::ptr_eq(&node, &self.head);
            if foreign_origin || foreign_marker {
                return None;
            }
            self.next = node.parent();
            if node.is_included() {
                return node.module();
            }
        }
        None
    }
}

// =============================================================================
// Tests
// =============================================================================
