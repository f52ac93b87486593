//! Collision Detector - Sibling identifier uniqueness per namespace family
//!
//! Runs on fully linked trees. For each holder:
//! 1. `uses` statements written under it must name distinct groupings
//!    (expanded placeholders still count)
//! 2. Its final children, including copies from `uses` and augments, must
//!    be unique per (family, identifier)
//!
//! The first collision in tree-name and document order is reported at the
//! location of the second occurrence; a copy made by `uses` occurs at its
//! `uses` statement.

use crate::construct::{ConstructKind, NamespaceFamily};
use crate::linker::SymbolUniverse;
use crate::location::SourceLocation;
use crate::schema::{NodeId, SchemaNode, SchemaTree, SchemaVisitor};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Duplicate identifier within one namespace family of a holder
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CollisionError {
    pub construct: ConstructKind,
    pub identifier: String,
    /// Location of the colliding (second) occurrence
    pub location: SourceLocation,
    /// Location of the occurrence it collides with
    pub first: SourceLocation,
    pub message: String,
}

impl CollisionError {
    fn new(tree: &SchemaTree, second: NodeId, first: NodeId) -> Self {
        let location = tree.site_location(second).clone();
        let second = tree.node(second);
        Self {
            construct: second.kind,
            identifier: second.identifier.clone(),
            message: format!(
                "YANG file error: Identifier collision detected in {} \"{}\" at line {} at position {} in {}",
                second.kind, second.identifier, location.line, location.column, location.file
            ),
            location,
            first: tree.site_location(first).clone(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CollisionDetector;

impl CollisionDetector {
    pub fn new() -> Self {
        Self
    }

    /// Check every tree of the unit, in name order; returns holders checked
    pub fn check_universe(&self, universe: &SymbolUniverse) -> Result<usize, CollisionError> {
        let mut holders = 0;
        for tree in universe.trees() {
            holders += self.check_tree(tree)?;
        }
        debug!("Checked {} holders for collisions", holders);
        Ok(holders)
    }

    pub fn check_tree(&self, tree: &SchemaTree) -> Result<usize, CollisionError> {
        let mut check = HolderCheck {
            uses_sites: tree.uses_sites(),
            holders: 0,
        };
        tree.accept(&mut check)?;
        Ok(check.holders)
    }
}

struct HolderCheck {
    uses_sites: BTreeMap<NodeId, Vec<NodeId>>,
    holders: usize,
}

impl HolderCheck {
    fn check_uses(&self, tree: &SchemaTree, holder: NodeId) -> Result<(), CollisionError> {
        let Some(sites) = self.uses_sites.get(&holder) else {
            return Ok(());
        };
        let mut seen: HashMap<&str, NodeId> = HashMap::new();
        for id in sites {
            let node = tree.node(*id);
            if let Some(first) = seen.insert(node.identifier.as_str(), *id) {
                return Err(CollisionError::new(tree, *id, first));
            }
        }
        Ok(())
    }

    fn check_children(&self, tree: &SchemaTree, holder: NodeId) -> Result<(), CollisionError> {
        let mut seen: HashMap<(NamespaceFamily, &str), NodeId> = HashMap::new();
        for id in tree.children(holder) {
            let node = tree.node(*id);
            let Some(family) = node.kind.family() else {
                continue;
            };
            if family == NamespaceFamily::Uses {
                continue;
            }
            if let Some(first) = seen.get(&(family, node.identifier.as_str())) {
                return Err(CollisionError::new(tree, *id, *first));
            }
            seen.insert((family, node.identifier.as_str()), *id);
        }
        Ok(())
    }
}

impl SchemaVisitor for HolderCheck {
    type Error = CollisionError;

    fn enter(&mut self, tree: &SchemaTree, id: NodeId, node: &SchemaNode, _depth: usize) -> Result<(), CollisionError> {
        if !node.is_holder() {
            return Ok(());
        }
        self.holders += 1;
        self.check_uses(tree, id)?;
        self.check_children(tree, id)
    }
}
