//! Schema - In-memory schema trees
//!
//! One [`SchemaTree`] per module or submodule file. Trees are arenas of
//! [`SchemaNode`]s; cross-tree references are [`NodeRef`]s.

pub mod node;
pub mod tree;
pub mod visitor;

pub use node::{
    NodeId, NodeOrigin, NodeRef, QName, ReferenceKind, ReferenceTarget, Resolvable, ResolutionStatus,
    SchemaNode, SchemaPath,
};
pub use tree::{BelongsTo, ModuleHeader, ModuleImport, ModuleInclude, SchemaTree, Subtree};
pub use visitor::{SchemaVisitor, TreeStats};
