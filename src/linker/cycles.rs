//! Derivation cycle checks over bound typedef and identity references

use super::LinkerError;
use super::universe::SymbolUniverse;
use crate::construct::ConstructKind;
use crate::location::SourceLocation;
use crate::schema::{NodeRef, ReferenceKind};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

struct DerivationGraph<'a> {
    universe: &'a SymbolUniverse,
    kind: ConstructKind,
    reference: ReferenceKind,
    marks: HashMap<NodeRef, Mark>,
    path: Vec<NodeRef>,
}

impl<'a> DerivationGraph<'a> {
    fn new(universe: &'a SymbolUniverse, kind: ConstructKind, reference: ReferenceKind) -> Self {
        Self {
            universe,
            kind,
            reference,
            marks: HashMap::new(),
            path: Vec::new(),
        }
    }

    fn edges(&self, from: &NodeRef) -> Vec<NodeRef> {
        let Some(node) = self.universe.node(from) else {
            return Vec::new();
        };
        node.references
            .iter()
            .filter(|r| r.kind == self.reference)
            .filter_map(|r| r.resolved.clone())
            .filter(|target| self.universe.node(target).is_some_and(|n| n.kind == self.kind))
            .collect()
    }

    fn visit(&mut self, from: NodeRef) -> Result<(), LinkerError> {
        match self.marks.get(&from) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => return Err(self.cycle_error(&from)),
            None => {}
        }

        self.marks.insert(from.clone(), Mark::Visiting);
        self.path.push(from.clone());
        for target in self.edges(&from) {
            self.visit(target)?;
        }
        self.path.pop();
        self.marks.insert(from, Mark::Done);
        Ok(())
    }

    fn describe(&self, node: &NodeRef) -> String {
        match self.universe.node(node) {
            Some(n) => format!("{}:{}", node.tree, n.identifier),
            None => node.to_string(),
        }
    }

    fn cycle_error(&self, repeated: &NodeRef) -> LinkerError {
        let start = self.path.iter().position(|n| n == repeated).unwrap_or(0);
        let mut chain: Vec<String> = self.path[start..].iter().map(|n| self.describe(n)).collect();
        chain.push(self.describe(repeated));

        let location = self
            .universe
            .node(repeated)
            .map(|n| n.location.clone())
            .unwrap_or_else(|| SourceLocation::unknown(repeated.tree.clone()));
        LinkerError::Cycle {
            kind: self.reference,
            chain,
            location,
        }
    }
}

/// Reject typedefs deriving from themselves and identities based on
/// themselves, directly or through a chain
pub(crate) fn check_derivation_cycles(universe: &SymbolUniverse) -> Result<(), LinkerError> {
    for (kind, reference) in [
        (ConstructKind::Typedef, ReferenceKind::Typedef),
        (ConstructKind::Identity, ReferenceKind::Identity),
    ] {
        let mut graph = DerivationGraph::new(universe, kind, reference);
        for tree in universe.translatable() {
            for id in tree.preorder(tree.root()) {
                if tree.node(id).kind == kind {
                    graph.visit(NodeRef::new(tree.name.clone(), id))?;
                }
            }
        }
    }
    Ok(())
}
