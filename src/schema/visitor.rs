//! Preorder traversal over the attached nodes of a schema tree

use super::node::{NodeId, SchemaNode};
use super::tree::SchemaTree;
use crate::construct::ConstructKind;
use std::collections::BTreeMap;
use std::convert::Infallible;

/// Callbacks invoked while walking a [`SchemaTree`]
pub trait SchemaVisitor {
    type Error;

    fn enter(&mut self, tree: &SchemaTree, id: NodeId, node: &SchemaNode, depth: usize) -> Result<(), Self::Error>;

    fn leave(&mut self, _tree: &SchemaTree, _id: NodeId, _node: &SchemaNode, _depth: usize) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl SchemaTree {
    /// Walk every attached node from the root; detached `uses`
    /// placeholders are not visited
    pub fn accept<V: SchemaVisitor>(&self, visitor: &mut V) -> Result<(), V::Error> {
        self.accept_from(self.root(), 0, visitor)
    }

    fn accept_from<V: SchemaVisitor>(&self, id: NodeId, depth: usize, visitor: &mut V) -> Result<(), V::Error> {
        let node = self.node(id);
        visitor.enter(self, id, node, depth)?;
        for child in self.children(id) {
            self.accept_from(*child, depth + 1, visitor)?;
        }
        visitor.leave(self, id, node, depth)
    }
}

/// Counts of attached nodes per construct kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub nodes: usize,
    pub max_depth: usize,
    pub by_kind: BTreeMap<ConstructKind, usize>,
    /// Nodes cloned in by uses expansion or augments
    pub cloned: usize,
}

impl TreeStats {
    pub fn collect(tree: &SchemaTree) -> Self {
        let mut stats = Self::default();
        match tree.accept(&mut stats) {
            Ok(()) => stats,
            Err(never) => match never {},
        }
    }

    pub fn count(&self, kind: ConstructKind) -> usize {
        self.by_kind.get(&kind).copied().unwrap_or(0)
    }
}

impl SchemaVisitor for TreeStats {
    type Error = Infallible;

    fn enter(&mut self, _tree: &SchemaTree, _id: NodeId, node: &SchemaNode, depth: usize) -> Result<(), Self::Error> {
        self.nodes += 1;
        self.max_depth = self.max_depth.max(depth);
        *self.by_kind.entry(node.kind).or_insert(0) += 1;
        if node.origin != super::node::NodeOrigin::Declared {
            self.cloned += 1;
        }
        Ok(())
    }
}
