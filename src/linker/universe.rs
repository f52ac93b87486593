//! Symbol universe - Every tree visible to a compilation unit, by name

use super::LinkerError;
use crate::schema::{NodeRef, SchemaNode, SchemaTree};
use std::collections::BTreeMap;

/// Schema trees of a compilation unit keyed by module or submodule name.
///
/// Iteration is always in name order, which keeps linking deterministic.
#[derive(Debug, Clone, Default)]
pub struct SymbolUniverse {
    trees: BTreeMap<String, SchemaTree>,
}

impl SymbolUniverse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tree; names must be unique across the unit
    pub fn insert(&mut self, tree: SchemaTree) -> Result<(), LinkerError> {
        if let Some(existing) = self.trees.get(&tree.name) {
            return Err(LinkerError::DuplicateModule {
                name: tree.name.clone(),
                first: existing.file.clone(),
                location: tree.root_node().location.clone(),
            });
        }
        self.trees.insert(tree.name.clone(), tree);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&SchemaTree> {
        self.trees.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut SchemaTree> {
        self.trees.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.trees.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    pub fn trees(&self) -> impl Iterator<Item = &SchemaTree> {
        self.trees.values()
    }

    pub fn trees_mut(&mut self) -> impl Iterator<Item = &mut SchemaTree> {
        self.trees.values_mut()
    }

    /// Mutable access for parallel passes
    pub(crate) fn tree_map_mut(&mut self) -> &mut BTreeMap<String, SchemaTree> {
        &mut self.trees
    }

    /// Trees being compiled in this unit, in name order
    pub fn translatable(&self) -> impl Iterator<Item = &SchemaTree> {
        self.trees.values().filter(|t| t.translatable)
    }

    /// A module followed by every submodule that belongs to it
    pub fn module_trees<'a>(&'a self, module: &'a str) -> impl Iterator<Item = &'a SchemaTree> + 'a {
        let main = self.trees.get(module).filter(|t| !t.is_submodule());
        let submodules = self
            .trees
            .values()
            .filter(move |t| t.is_submodule() && t.module_name() == module);
        main.into_iter().chain(submodules)
    }

    pub fn node(&self, node: &NodeRef) -> Option<&SchemaNode> {
        self.trees.get(&node.tree).and_then(|t| t.get(node.node))
    }

    pub fn into_trees(self) -> BTreeMap<String, SchemaTree> {
        self.trees
    }
}
