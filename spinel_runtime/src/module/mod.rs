//! The module metadata model.
//!
//! ```text
//! ModuleArena
//! ├── ModuleId → Arc<ModuleFields>
//! │              ├── chain: PrependMarker → [prepends] → Origin → [includes] → superclass…
//! │              ├── methods / constants / class_variables (concurrent tables)
//! │              ├── name (lazy, cached)
//! │              ├── version token + dependents (weak, by id)
//! │              └── mutation API (include, prepend, add_method, …)
//! └── object class root (deep method search fallback for plain modules)
//! ```

pub mod arena;
pub mod chain;
pub mod constant;
pub mod fields;
pub mod method;
pub mod resolve;
pub mod version;

pub use arena::ModuleArena;
pub use chain::{AncestorIter, ChainNode, ChainNodeKind, IncludedModulesIter};
pub use constant::ConstantRecord;
pub use fields::{ModuleFields, ModuleKind};
pub use method::{MethodRecord, Visibility};
pub use version::{Assumption, VersionToken};
