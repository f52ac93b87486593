//! Augment merging and deviation binding
//!
//! Runs once every tree has finished `uses` expansion. Augments are applied
//! in tree-name then document order and retried until no more of them can
//! be placed, so an augment may target nodes that another augment adds.

use super::LinkerError;
use super::resolver::locate_path;
use super::universe::SymbolUniverse;
use crate::construct::ConstructKind;
use crate::location::SourceLocation;
use crate::schema::{NodeId, NodeOrigin, NodeRef, ReferenceKind, ResolutionStatus, SchemaPath, Subtree};
use tracing::debug;

/// Nodes of `kind` in translatable trees whose path reference is unbound
fn pending_statements(universe: &SymbolUniverse, kind: ConstructKind, reference: ReferenceKind) -> Vec<NodeRef> {
    universe
        .translatable()
        .flat_map(|tree| {
            tree.preorder(tree.root())
                .into_iter()
                .filter(move |id| {
                    let node = tree.node(*id);
                    node.kind == kind && node.references.iter().any(|r| r.kind == reference && !r.is_bound())
                })
                .map(move |id| NodeRef::new(tree.name.clone(), id))
        })
        .collect()
}

fn target_path(universe: &SymbolUniverse, statement: &NodeRef, reference: ReferenceKind) -> Option<SchemaPath> {
    universe
        .node(statement)?
        .references
        .iter()
        .find(|r| r.kind == reference)
        .and_then(|r| r.path().cloned())
}

fn locate(universe: &SymbolUniverse, statement: &NodeRef, reference: ReferenceKind) -> Option<NodeRef> {
    let tree = universe.get(&statement.tree)?;
    let path = target_path(universe, statement, reference)?;
    locate_path(universe, tree, &path)
}

fn bind(universe: &mut SymbolUniverse, statement: &NodeRef, reference: ReferenceKind, target: NodeRef) {
    if let Some(node) = universe
        .get_mut(&statement.tree)
        .and_then(|tree| tree.get_mut(statement.node))
    {
        for r in node.references.iter_mut().filter(|r| r.kind == reference) {
            r.resolved = Some(target.clone());
        }
    }
}

fn fail(universe: &mut SymbolUniverse, statement: &NodeRef) {
    if let Some(node) = universe
        .get_mut(&statement.tree)
        .and_then(|tree| tree.get_mut(statement.node))
    {
        node.status = ResolutionStatus::Failed;
    }
}

fn statement_error(
    universe: &SymbolUniverse,
    statement: &NodeRef,
    reference: ReferenceKind,
    make: impl FnOnce(String, SourceLocation) -> LinkerError,
) -> LinkerError {
    let path = target_path(universe, statement, reference)
        .map(|p| p.to_string())
        .unwrap_or_default();
    let location = universe
        .node(statement)
        .map(|n| n.location.clone())
        .unwrap_or_else(|| SourceLocation::unknown(statement.tree.clone()));
    make(path, location)
}

/// Copy the augment's children under the target node
fn merge(universe: &mut SymbolUniverse, augment: &NodeRef, target: NodeRef) -> Result<usize, LinkerError> {
    let target_kind = universe
        .node(&target)
        .map(|n| n.kind)
        .unwrap_or(ConstructKind::Module);
    if !target_kind.accepts_augment() {
        let err = statement_error(universe, augment, ReferenceKind::AugmentTarget, |path, location| {
            LinkerError::InvalidAugmentTarget {
                path,
                target: target_kind,
                location,
            }
        });
        fail(universe, augment);
        return Err(err);
    }

    let (body, namespace): (Vec<Subtree>, String) = match universe.get(&augment.tree) {
        Some(tree) => (
            tree.children(augment.node).iter().map(|c| tree.extract(*c)).collect(),
            tree.node(augment.node).namespace.clone(),
        ),
        None => return Ok(0),
    };

    let origin = NodeOrigin::Augmented {
        augment: augment.clone(),
    };
    let Some(target_tree) = universe.get_mut(&target.tree) else {
        return Ok(0);
    };
    let roots: Vec<NodeId> = body
        .into_iter()
        .map(|subtree| {
            target_tree.graft(target.node, subtree, |node| {
                node.origin = origin.clone();
                node.namespace.clone_from(&namespace);
            })
        })
        .collect();
    target_tree.append_children(target.node, &roots);
    debug!(
        "Augment {} added {} nodes to {} {}",
        augment,
        roots.len(),
        target_tree.name,
        target_tree.path(target.node)
    );

    bind(universe, augment, ReferenceKind::AugmentTarget, target);
    Ok(roots.len())
}

/// Merge every augment of the translatable trees into its target
pub(crate) fn apply_augments(universe: &mut SymbolUniverse) -> Result<usize, LinkerError> {
    let mut pending = pending_statements(universe, ConstructKind::Augment, ReferenceKind::AugmentTarget);
    let mut applied = 0;

    while !pending.is_empty() {
        let before = pending.len();
        let mut waiting = Vec::new();
        for augment in pending {
            match locate(universe, &augment, ReferenceKind::AugmentTarget) {
                Some(target) => {
                    merge(universe, &augment, target)?;
                    applied += 1;
                }
                None => waiting.push(augment),
            }
        }

        if waiting.len() == before {
            let augment = &waiting[0];
            let err = statement_error(universe, augment, ReferenceKind::AugmentTarget, |path, location| {
                LinkerError::MissingAugmentTarget { path, location }
            });
            fail(universe, augment);
            return Err(err);
        }
        pending = waiting;
    }

    Ok(applied)
}

/// Bind deviation targets; deviations never modify their target
pub(crate) fn bind_deviations(universe: &mut SymbolUniverse) -> Result<usize, LinkerError> {
    let pending = pending_statements(universe, ConstructKind::Deviation, ReferenceKind::DeviationTarget);
    let count = pending.len();

    for deviation in pending {
        match locate(universe, &deviation, ReferenceKind::DeviationTarget) {
            Some(target) => bind(universe, &deviation, ReferenceKind::DeviationTarget, target),
            None => {
                let err = statement_error(universe, &deviation, ReferenceKind::DeviationTarget, |path, location| {
                    LinkerError::MissingDeviationTarget { path, location }
                });
                fail(universe, &deviation);
                return Err(err);
            }
        }
    }

    Ok(count)
}
