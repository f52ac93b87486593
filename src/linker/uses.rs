//! Reference binding and `uses` expansion within one tree
//!
//! A bound `uses` is expanded in place: the grouping's non-definition
//! children are deep-copied, spliced into the holder at the position of the
//! `uses`, and the placeholder is detached. References inside the copies are
//! resolved right away with the grouping pushed onto the active expansion
//! chain, which is how grouping cycles are caught.
//!
//! An `augment` written inside the `uses` refines the copies only: its
//! descendant path is walked from the freshly grafted nodes and its body is
//! appended there, so the grouping itself never changes.

use super::LinkerError;
use super::resolver::NameResolver;
use super::universe::SymbolUniverse;
use crate::construct::ConstructKind;
use crate::schema::{NodeId, NodeOrigin, NodeRef, ReferenceKind, ResolutionStatus, SchemaPath, SchemaTree, Subtree};
use std::collections::BTreeSet;
use tracing::debug;

/// Counters of one pass over one tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassTally {
    /// References bound
    pub bound: usize,
    /// `uses` statements expanded
    pub expansions: usize,
    /// Augments applied to the copies of a `uses`
    pub augments: usize,
    /// Name references still unbound after the pass
    pub pending: usize,
}

impl PassTally {
    pub fn absorb(&mut self, other: PassTally) {
        self.bound += other.bound;
        self.expansions += other.expansions;
        self.augments += other.augments;
        self.pending += other.pending;
    }
}

/// Resolves the name references of one tree, intra-file or against a
/// frozen universe
pub(crate) struct TreeResolver<'u> {
    universe: Option<&'u SymbolUniverse>,
}

impl<'u> TreeResolver<'u> {
    pub fn intra_file() -> Self {
        Self { universe: None }
    }

    /// A miss becomes a [`LinkerError::Unresolved`]
    pub fn cross_unit(universe: &'u SymbolUniverse) -> Self {
        Self {
            universe: Some(universe),
        }
    }

    pub fn resolve_tree(&self, tree: &mut SchemaTree) -> Result<PassTally, LinkerError> {
        let mut tally = PassTally::default();
        for id in visit_order(tree) {
            if tree.node(id).status != ResolutionStatus::Unresolved {
                continue;
            }
            let mut chain = expansion_chain(tree, id);
            self.resolve_node(tree, id, &mut chain, &mut tally)?;
        }

        tally.pending = tree
            .iter()
            .flat_map(|(_, node)| node.references.iter())
            .filter(|r| !r.is_bound() && r.kind.definition_kind().is_some())
            .count();
        Ok(tally)
    }

    fn resolve_node(
        &self,
        tree: &mut SchemaTree,
        id: NodeId,
        chain: &mut Vec<NodeRef>,
        tally: &mut PassTally,
    ) -> Result<(), LinkerError> {
        for index in 0..tree.node(id).references.len() {
            let reference = tree.node(id).references[index].clone();
            if reference.is_bound() || reference.kind.definition_kind().is_none() {
                continue;
            }

            let target = match self.universe {
                Some(universe) => NameResolver::cross_unit(tree, universe).resolve(&reference),
                None => NameResolver::intra_file(tree).resolve(&reference),
            };

            let Some(target) = target else {
                if self.universe.is_some() {
                    let err = LinkerError::unresolved(tree.node(id), &reference);
                    tree.node_mut(id).status = ResolutionStatus::Failed;
                    return Err(err);
                }
                continue;
            };

            tree.node_mut(id).references[index].resolved = Some(target.clone());
            tally.bound += 1;

            if reference.kind == ReferenceKind::Grouping {
                self.expand(tree, id, target, chain, tally)?;
            }
        }

        // Later passes leave promotion to the linker's final step
        let node = tree.node_mut(id);
        if self.universe.is_none() && node.references_bound() {
            node.status = ResolutionStatus::IntraResolved;
        }
        Ok(())
    }

    /// Copies of the grouping's instantiable children
    fn grouping_body(&self, tree: &SchemaTree, grouping: &NodeRef) -> Option<Vec<Subtree>> {
        let source = if grouping.tree == tree.name {
            tree
        } else {
            self.universe?.get(&grouping.tree)?
        };
        source.get(grouping.node)?;

        Some(
            source
                .children(grouping.node)
                .iter()
                .filter(|c| !source.node(**c).kind.is_scoped_definition())
                .map(|c| source.extract(*c))
                .collect(),
        )
    }

    fn expand(
        &self,
        tree: &mut SchemaTree,
        uses: NodeId,
        grouping: NodeRef,
        chain: &mut Vec<NodeRef>,
        tally: &mut PassTally,
    ) -> Result<(), LinkerError> {
        if chain.contains(&grouping) {
            let mut cycle: Vec<String> = chain.iter().map(|r| self.describe(tree, r)).collect();
            cycle.push(self.describe(tree, &grouping));
            let err = LinkerError::Cycle {
                kind: ReferenceKind::Grouping,
                chain: cycle,
                location: tree.node(uses).location.clone(),
            };
            tree.node_mut(uses).status = ResolutionStatus::Failed;
            return Err(err);
        }

        let Some(parent) = tree.parent(uses) else {
            return Ok(());
        };
        let Some(body) = self.grouping_body(tree, &grouping) else {
            let node = tree.node(uses);
            return Err(LinkerError::Unresolved {
                kind: ReferenceKind::Grouping,
                target: grouping.to_string(),
                construct: node.kind,
                identifier: node.identifier.clone(),
                location: node.location.clone(),
            });
        };

        let namespace = tree.node(uses).namespace.clone();
        let origin = NodeOrigin::Expanded {
            uses: NodeRef::new(tree.name.clone(), uses),
            grouping: grouping.clone(),
        };
        let roots: Vec<NodeId> = body
            .into_iter()
            .map(|subtree| {
                tree.graft(parent, subtree, |node| {
                    node.origin = origin.clone();
                    node.namespace.clone_from(&namespace);
                })
            })
            .collect();
        tree.splice_child(parent, uses, &roots);
        tally.expansions += 1;
        debug!(
            "Expanded uses {} at {} ({} nodes)",
            tree.node(uses).identifier,
            tree.path(parent),
            roots.len()
        );

        chain.push(grouping);
        self.resolve_subtrees(tree, &roots, chain, tally)?;
        chain.pop();

        let refinements: Vec<NodeId> = tree
            .children(uses)
            .iter()
            .copied()
            .filter(|c| tree.node(*c).kind == ConstructKind::Augment)
            .collect();
        for augment in refinements {
            let added = self.refine(tree, parent, uses, augment)?;
            tally.augments += 1;
            self.resolve_subtrees(tree, &added, chain, tally)?;
        }
        Ok(())
    }

    fn resolve_subtrees(
        &self,
        tree: &mut SchemaTree,
        roots: &[NodeId],
        chain: &mut Vec<NodeRef>,
        tally: &mut PassTally,
    ) -> Result<(), LinkerError> {
        for root in roots {
            for id in tree.preorder(*root) {
                if tree.node(id).status == ResolutionStatus::Unresolved {
                    self.resolve_node(tree, id, chain, tally)?;
                }
            }
        }
        Ok(())
    }

    /// Append the body of an augment written inside a `uses` to the copy
    /// its descendant path names
    fn refine(
        &self,
        tree: &mut SchemaTree,
        parent: NodeId,
        uses: NodeId,
        augment: NodeId,
    ) -> Result<Vec<NodeId>, LinkerError> {
        let path = tree
            .node(augment)
            .references
            .iter()
            .find(|r| r.kind == ReferenceKind::AugmentTarget)
            .and_then(|r| r.path().cloned());
        let Some(target) = path.as_ref().and_then(|p| locate_in_copies(tree, parent, uses, p)) else {
            let err = LinkerError::MissingAugmentTarget {
                path: path.map(|p| p.to_string()).unwrap_or_default(),
                location: tree.node(augment).location.clone(),
            };
            tree.node_mut(augment).status = ResolutionStatus::Failed;
            return Err(err);
        };

        let target_kind = tree.node(target).kind;
        if !target_kind.accepts_augment() {
            let err = LinkerError::InvalidAugmentTarget {
                path: path.map(|p| p.to_string()).unwrap_or_default(),
                target: target_kind,
                location: tree.node(augment).location.clone(),
            };
            tree.node_mut(augment).status = ResolutionStatus::Failed;
            return Err(err);
        }

        let body: Vec<Subtree> = tree.children(augment).iter().map(|c| tree.extract(*c)).collect();
        let namespace = tree.node(augment).namespace.clone();
        let origin = NodeOrigin::Augmented {
            augment: NodeRef::new(tree.name.clone(), augment),
        };
        let added: Vec<NodeId> = body
            .into_iter()
            .map(|subtree| {
                tree.graft(target, subtree, |node| {
                    node.origin = origin.clone();
                    node.namespace.clone_from(&namespace);
                })
            })
            .collect();
        tree.append_children(target, &added);

        let bound = NodeRef::new(tree.name.clone(), target);
        for reference in tree.node_mut(augment).references.iter_mut() {
            if reference.kind == ReferenceKind::AugmentTarget {
                reference.resolved = Some(bound.clone());
            }
        }
        debug!("Refined {} with {} nodes from its uses", tree.path(target), added.len());
        Ok(added)
    }

    fn describe(&self, tree: &SchemaTree, node: &NodeRef) -> String {
        let found = if node.tree == tree.name {
            tree.get(node.node)
        } else {
            self.universe.and_then(|u| u.node(node))
        };
        match found {
            Some(n) => format!("{}:{}", node.tree, n.identifier),
            None => node.to_string(),
        }
    }
}

/// Attached nodes in document order, then nodes that only survive inside
/// expanded `uses` placeholders, in arena order
fn visit_order(tree: &SchemaTree) -> Vec<NodeId> {
    let mut order = tree.preorder(tree.root());
    let attached: BTreeSet<NodeId> = order.iter().copied().collect();
    order.extend(tree.iter().map(|(id, _)| id).filter(|id| !attached.contains(id)));
    order
}

/// Whether a node was copied into place by `uses`, directly or through a
/// `uses` that was itself a copy
fn expanded_through(tree: &SchemaTree, id: NodeId, uses: NodeId) -> bool {
    let mut current = id;
    for _ in 0..tree.len() {
        match &tree.node(current).origin {
            NodeOrigin::Expanded { uses: by, .. } if by.tree == tree.name => {
                if by.node == uses {
                    return true;
                }
                current = by.node;
            }
            _ => return false,
        }
    }
    false
}

/// Walk a descendant path starting at the nodes `uses` placed under `parent`
fn locate_in_copies(tree: &SchemaTree, parent: NodeId, uses: NodeId, path: &SchemaPath) -> Option<NodeId> {
    let mut segments = path.segments.iter();
    let first = segments.next()?;
    let module = tree.module_for_prefix(first.prefix.as_deref())?;
    let mut current = tree.children(parent).iter().copied().find(|id| {
        let node = tree.node(*id);
        node.kind.is_path_addressable()
            && node.identifier == first.name
            && node.namespace == module
            && expanded_through(tree, *id, uses)
    })?;

    for segment in segments {
        let module = tree.module_for_prefix(segment.prefix.as_deref())?;
        current = tree.find_schema_child(current, &segment.name, Some(module))?;
    }
    Some(current)
}

/// Groupings a node is already being expanded from: enclosing grouping
/// definitions and the groupings its ancestors were copied out of
fn expansion_chain(tree: &SchemaTree, id: NodeId) -> Vec<NodeRef> {
    let mut chain = Vec::new();
    for ancestor in tree.scope_chain(id).into_iter().rev() {
        let node = tree.node(ancestor);
        let grouping = match &node.origin {
            NodeOrigin::Expanded { grouping, .. } => Some(grouping.clone()),
            _ if node.kind == ConstructKind::Grouping => Some(NodeRef::new(tree.name.clone(), ancestor)),
            _ => None,
        };
        if let Some(grouping) = grouping {
            if !chain.contains(&grouping) {
                chain.push(grouping);
            }
        }
    }
    chain
}
