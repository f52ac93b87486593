//! Linker - Multi-pass reference resolution for a compilation unit
//!
//! Phases, in order:
//! 1. Intra-file pass: every translatable tree in parallel, lookups limited
//!    to the tree itself; misses stay unresolved
//! 2. Barrier: the universe is frozen into a read-only snapshot
//! 3. Cross-unit pass: every translatable tree in parallel against the
//!    snapshot (imports, includes, dependencies); a miss is an error
//! 4. Augments merged to a fixpoint, deviation targets bound
//! 5. Typedef and identity derivation chains checked for cycles
//!
//! Errors of parallel passes are reported for the lowest tree name, so
//! repeated runs report the same failure.

pub mod augment;
pub mod cycles;
pub mod resolver;
pub mod universe;
pub mod uses;

pub use resolver::{NameResolver, locate_path};
pub use universe::SymbolUniverse;
pub use uses::PassTally;

use crate::construct::ConstructKind;
use crate::location::SourceLocation;
use crate::schema::{ReferenceKind, ResolutionStatus, Resolvable, SchemaNode};
use rayon::prelude::*;
use std::fmt;
use tracing::{debug, info, warn};
use uses::TreeResolver;

/// Resolution failure; aborts the compilation unit
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkerError {
    #[error(
        "YANG file error: Unresolved {kind} \"{target}\" referenced by {construct} \"{identifier}\" at line {} at position {} in {}",
        location.line, location.column, location.file
    )]
    Unresolved {
        kind: ReferenceKind,
        target: String,
        construct: ConstructKind,
        identifier: String,
        location: SourceLocation,
    },

    #[error(
        "YANG file error: Cycle detected in {kind} chain {} at line {} at position {} in {}",
        chain.join(" -> "), location.line, location.column, location.file
    )]
    Cycle {
        kind: ReferenceKind,
        chain: Vec<String>,
        location: SourceLocation,
    },

    #[error(
        "YANG file error: Augment target \"{path}\" not found at line {} at position {} in {}",
        location.line, location.column, location.file
    )]
    MissingAugmentTarget { path: String, location: SourceLocation },

    #[error(
        "YANG file error: Augment target \"{path}\" is a {target}, which cannot be augmented, at line {} at position {} in {}",
        location.line, location.column, location.file
    )]
    InvalidAugmentTarget {
        path: String,
        target: ConstructKind,
        location: SourceLocation,
    },

    #[error(
        "YANG file error: Deviation target \"{path}\" not found at line {} at position {} in {}",
        location.line, location.column, location.file
    )]
    MissingDeviationTarget { path: String, location: SourceLocation },

    #[error(
        "YANG file error: Module \"{name}\" is defined more than once (first in {first}) at line {} at position {} in {}",
        location.line, location.column, location.file
    )]
    DuplicateModule {
        name: String,
        first: String,
        location: SourceLocation,
    },
}

impl LinkerError {
    pub(crate) fn unresolved(node: &SchemaNode, reference: &Resolvable) -> Self {
        LinkerError::Unresolved {
            kind: reference.kind,
            target: reference.target.to_string(),
            construct: node.kind,
            identifier: node.identifier.clone(),
            location: node.location.clone(),
        }
    }

    pub fn location(&self) -> &SourceLocation {
        match self {
            LinkerError::Unresolved { location, .. }
            | LinkerError::Cycle { location, .. }
            | LinkerError::MissingAugmentTarget { location, .. }
            | LinkerError::InvalidAugmentTarget { location, .. }
            | LinkerError::MissingDeviationTarget { location, .. }
            | LinkerError::DuplicateModule { location, .. } => location,
        }
    }
}

/// Counters of a complete link
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct LinkReport {
    /// References bound in the intra-file pass
    pub intra_bound: usize,
    /// References bound in the cross-unit pass
    pub cross_bound: usize,
    pub expansions: usize,
    pub augments: usize,
    pub deviations: usize,
}

impl fmt::Display for LinkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Link Report:")?;
        writeln!(f, "  Bound intra-file: {}", self.intra_bound)?;
        writeln!(f, "  Bound cross-unit: {}", self.cross_bound)?;
        writeln!(f, "  Uses expanded: {}", self.expansions)?;
        writeln!(f, "  Augments merged: {}", self.augments)?;
        write!(f, "  Deviations bound: {}", self.deviations)
    }
}

/// Runs the resolution phases over a [`SymbolUniverse`]
#[derive(Debug, Default, Clone, Copy)]
pub struct Linker;

impl Linker {
    pub fn new() -> Self {
        Self
    }

    /// Resolve every reference of the translatable trees.
    ///
    /// Dependency trees are only read, except that augments from this unit
    /// are merged into the unit's copies of them.
    pub fn link(&self, universe: &mut SymbolUniverse) -> Result<LinkReport, LinkerError> {
        let intra = self.intra_file(universe)?;
        info!(
            "Intra-file pass: {} bound, {} expanded, {} pending",
            intra.bound, intra.expansions, intra.pending
        );

        self.warn_missing_imports(universe);
        let snapshot = universe.clone();
        let cross = self.cross_unit(universe, &snapshot)?;
        info!("Cross-unit pass: {} bound, {} expanded", cross.bound, cross.expansions);

        let augments = augment::apply_augments(universe)?;
        let deviations = augment::bind_deviations(universe)?;
        info!("Merged {} augments, bound {} deviations", augments, deviations);

        cycles::check_derivation_cycles(universe)?;
        self.finalize(universe)?;

        Ok(LinkReport {
            intra_bound: intra.bound,
            cross_bound: cross.bound,
            expansions: intra.expansions + cross.expansions,
            augments: intra.augments + cross.augments + augments,
            deviations,
        })
    }

    /// Pass 1: resolve within each file
    pub fn intra_file(&self, universe: &mut SymbolUniverse) -> Result<PassTally, LinkerError> {
        let results: Vec<(String, Result<PassTally, LinkerError>)> = universe
            .tree_map_mut()
            .par_iter_mut()
            .filter(|(_, tree)| tree.translatable)
            .map(|(name, tree)| (name.clone(), TreeResolver::intra_file().resolve_tree(tree)))
            .collect();
        first_error(results)
    }

    /// Pass 2: resolve what remains against the frozen snapshot
    pub fn cross_unit(&self, universe: &mut SymbolUniverse, snapshot: &SymbolUniverse) -> Result<PassTally, LinkerError> {
        let results: Vec<(String, Result<PassTally, LinkerError>)> = universe
            .tree_map_mut()
            .par_iter_mut()
            .filter(|(_, tree)| tree.translatable)
            .map(|(name, tree)| (name.clone(), TreeResolver::cross_unit(snapshot).resolve_tree(tree)))
            .collect();
        first_error(results)
    }

    fn warn_missing_imports(&self, universe: &SymbolUniverse) {
        for tree in universe.translatable() {
            for import in &tree.header.imports {
                if universe.module_trees(&import.module).next().is_none() {
                    warn!("{}: imported module {} is not part of the unit", import.location, import.module);
                }
            }
            for include in &tree.header.includes {
                if !universe.contains(&include.submodule) {
                    warn!("{}: included submodule {} is not part of the unit", include.location, include.submodule);
                }
            }
        }
    }

    /// Promote bound nodes to resolved; anything left unbound is an error.
    /// Nodes bound after the intra-file pass are promoted here directly.
    fn finalize(&self, universe: &mut SymbolUniverse) -> Result<(), LinkerError> {
        for tree in universe.trees_mut() {
            let mut promoted = 0;
            for node in tree.iter_mut() {
                if let Some(reference) = node.references.iter().find(|r| !r.is_bound()) {
                    let err = LinkerError::unresolved(node, reference);
                    node.status = ResolutionStatus::Failed;
                    return Err(err);
                }
                if node.status != ResolutionStatus::Resolved {
                    node.status = ResolutionStatus::Resolved;
                    promoted += 1;
                }
            }
            debug!("{}: {} nodes resolved", tree.name, promoted);
        }
        Ok(())
    }
}

fn first_error(mut results: Vec<(String, Result<PassTally, LinkerError>)>) -> Result<PassTally, LinkerError> {
    results.sort_by(|a, b| a.0.cmp(&b.0));
    let mut total = PassTally::default();
    for (_, result) in results {
        total.absorb(result?);
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_tree;
    use crate::event::EventStreamBuilder;
    use crate::schema::{NodeOrigin, NodeRef, SchemaTree};

    fn build(b: &mut EventStreamBuilder) -> SchemaTree {
        let file = b.file().to_string();
        build_tree(&file, &b.finish()).unwrap()
    }

    fn universe_of(trees: Vec<SchemaTree>) -> SymbolUniverse {
        let mut universe = SymbolUniverse::new();
        for tree in trees {
            universe.insert(tree).unwrap();
        }
        universe
    }

    fn types_module() -> SchemaTree {
        let mut b = EventStreamBuilder::new("types.yang");
        b.enter(ConstructKind::Module, "types")
            .statement(ConstructKind::Prefix, "t")
            .enter(ConstructKind::Typedef, "port")
            .statement(ConstructKind::Type, "uint16")
            .exit()
            .enter(ConstructKind::Grouping, "endpoint")
            .statement(ConstructKind::Leaf, "host")
            .enter(ConstructKind::Leaf, "port")
            .statement(ConstructKind::Type, "port")
            .exit()
            .exit()
            .exit();
        build(&mut b)
    }

    fn client_module() -> SchemaTree {
        let mut b = EventStreamBuilder::new("client.yang");
        b.enter(ConstructKind::Module, "client")
            .statement(ConstructKind::Prefix, "c")
            .enter(ConstructKind::Import, "types")
            .statement(ConstructKind::Prefix, "t")
            .exit()
            .enter(ConstructKind::Container, "server")
            .statement(ConstructKind::Uses, "t:endpoint")
            .enter(ConstructKind::Leaf, "backup-port")
            .statement(ConstructKind::Type, "t:port")
            .exit()
            .exit()
            .exit();
        build(&mut b)
    }

    #[test]
    fn test_cross_module_uses_and_typedef() {
        let mut universe = universe_of(vec![types_module(), client_module()]);
        let report = Linker::new().link(&mut universe).unwrap();
        assert_eq!(report.expansions, 1);
        assert!(report.cross_bound >= 2);

        let client = universe.get("client").unwrap();
        let port = client.find_path("/server/port").unwrap();
        let node = client.node(port);
        assert_eq!(node.namespace, "client");
        assert_eq!(node.status, ResolutionStatus::Resolved);

        // The copied leaf keeps the binding made in the defining module
        let types = universe.get("types").unwrap();
        let typedef = types.find_child(types.root(), ConstructKind::Typedef, "port").unwrap();
        assert_eq!(node.references[0].resolved, Some(NodeRef::new("types", typedef)));

        let backup = client.find_path("/server/backup-port").unwrap();
        assert_eq!(client.node(backup).references[0].resolved, Some(NodeRef::new("types", typedef)));
    }

    #[test]
    fn test_mutual_grouping_cycle_across_modules() {
        let mut a = EventStreamBuilder::new("a.yang");
        a.enter(ConstructKind::Module, "a")
            .statement(ConstructKind::Prefix, "a")
            .enter(ConstructKind::Import, "b")
            .statement(ConstructKind::Prefix, "b")
            .exit()
            .enter(ConstructKind::Grouping, "ga")
            .statement(ConstructKind::Uses, "b:gb")
            .exit()
            .exit();
        let mut b = EventStreamBuilder::new("b.yang");
        b.enter(ConstructKind::Module, "b")
            .statement(ConstructKind::Prefix, "b")
            .enter(ConstructKind::Import, "a")
            .statement(ConstructKind::Prefix, "a")
            .exit()
            .enter(ConstructKind::Grouping, "gb")
            .statement(ConstructKind::Uses, "a:ga")
            .exit()
            .exit();

        let mut universe = universe_of(vec![build(&mut a), build(&mut b)]);
        let err = Linker::new().link(&mut universe).unwrap_err();
        match err {
            LinkerError::Cycle { kind, chain, location } => {
                assert_eq!(kind, ReferenceKind::Grouping);
                assert_eq!(chain, vec!["a:ga", "b:gb", "a:ga"]);
                assert_eq!(location.file, "b.yang");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_typedef_derivation_cycle() {
        let mut b = EventStreamBuilder::new("m.yang");
        b.enter(ConstructKind::Module, "m")
            .enter(ConstructKind::Typedef, "first")
            .statement(ConstructKind::Type, "second")
            .exit()
            .enter(ConstructKind::Typedef, "second")
            .statement(ConstructKind::Type, "first")
            .exit()
            .exit();

        let mut universe = universe_of(vec![build(&mut b)]);
        let err = Linker::new().link(&mut universe).unwrap_err();
        match err {
            LinkerError::Cycle { kind, chain, .. } => {
                assert_eq!(kind, ReferenceKind::Typedef);
                assert_eq!(chain, vec!["m:first", "m:second", "m:first"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_identity_based_on_itself() {
        let mut b = EventStreamBuilder::new("m.yang");
        b.enter(ConstructKind::Module, "m")
            .enter(ConstructKind::Identity, "loop")
            .statement(ConstructKind::Base, "loop")
            .exit()
            .exit();

        let mut universe = universe_of(vec![build(&mut b)]);
        let err = Linker::new().link(&mut universe).unwrap_err();
        assert!(matches!(err, LinkerError::Cycle { kind: ReferenceKind::Identity, .. }));
    }

    #[test]
    fn test_augment_chain_reaches_fixpoint() {
        let mut base = EventStreamBuilder::new("base.yang");
        base.enter(ConstructKind::Module, "base")
            .statement(ConstructKind::Prefix, "base")
            .statement(ConstructKind::Container, "system")
            .exit();

        // The second augment targets a node that only the first one adds;
        // document order puts it first
        let mut ext = EventStreamBuilder::new("ext.yang");
        ext.enter(ConstructKind::Module, "ext")
            .statement(ConstructKind::Prefix, "ext")
            .enter(ConstructKind::Import, "base")
            .statement(ConstructKind::Prefix, "b")
            .exit()
            .enter(ConstructKind::Augment, "/b:system/ext:clock")
            .statement(ConstructKind::Leaf, "timezone")
            .exit()
            .enter(ConstructKind::Augment, "/b:system")
            .statement(ConstructKind::Container, "clock")
            .exit()
            .exit();

        let mut universe = universe_of(vec![build(&mut base), build(&mut ext)]);
        let report = Linker::new().link(&mut universe).unwrap();
        assert_eq!(report.augments, 2);

        let base = universe.get("base").unwrap();
        let timezone = base.find_path("/system/clock/timezone").unwrap();
        let node = base.node(timezone);
        assert_eq!(node.namespace, "ext");
        assert!(matches!(node.origin, NodeOrigin::Augmented { .. }));
    }

    #[test]
    fn test_augment_on_leaf_is_rejected() {
        let mut b = EventStreamBuilder::new("m.yang");
        b.enter(ConstructKind::Module, "m")
            .statement(ConstructKind::Leaf, "flag")
            .enter(ConstructKind::Augment, "/flag")
            .statement(ConstructKind::Leaf, "extra")
            .exit()
            .exit();

        let mut universe = universe_of(vec![build(&mut b)]);
        let err = Linker::new().link(&mut universe).unwrap_err();
        assert!(matches!(err, LinkerError::InvalidAugmentTarget { target: ConstructKind::Leaf, .. }));
        assert_eq!(err.location().line, 3);
    }

    #[test]
    fn test_deviation_bound_without_changes() {
        let mut base = EventStreamBuilder::new("base.yang");
        base.enter(ConstructKind::Module, "base")
            .enter(ConstructKind::Container, "system")
            .statement(ConstructKind::Leaf, "hostname")
            .exit()
            .exit();
        let mut dev = EventStreamBuilder::new("dev.yang");
        dev.enter(ConstructKind::Module, "dev")
            .enter(ConstructKind::Import, "base")
            .statement(ConstructKind::Prefix, "b")
            .exit()
            .statement(ConstructKind::Deviation, "/b:system/b:hostname")
            .statement(ConstructKind::Deviation, "/b:system/b:missing")
            .exit();

        let mut universe = universe_of(vec![build(&mut base), build(&mut dev)]);
        let err = Linker::new().link(&mut universe).unwrap_err();
        match &err {
            LinkerError::MissingDeviationTarget { path, .. } => assert_eq!(path, "/b:system/b:missing"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(universe.get("dev").unwrap().header.deviation_only);
    }

    #[test]
    fn test_submodule_sees_module_definitions() {
        let mut main = EventStreamBuilder::new("main.yang");
        main.enter(ConstructKind::Module, "main")
            .statement(ConstructKind::Prefix, "m")
            .statement(ConstructKind::Include, "main-sub")
            .enter(ConstructKind::Grouping, "common")
            .statement(ConstructKind::Leaf, "id")
            .exit()
            .exit();
        let mut sub = EventStreamBuilder::new("main-sub.yang");
        sub.enter(ConstructKind::Submodule, "main-sub")
            .enter(ConstructKind::BelongsTo, "main")
            .statement(ConstructKind::Prefix, "m")
            .exit()
            .enter(ConstructKind::Container, "entry")
            .statement(ConstructKind::Uses, "m:common")
            .exit()
            .exit();

        let mut universe = universe_of(vec![build(&mut main), build(&mut sub)]);
        Linker::new().link(&mut universe).unwrap();

        let sub = universe.get("main-sub").unwrap();
        let id = sub.find_path("/entry/id").unwrap();
        assert_eq!(sub.node(id).namespace, "main");
    }

    #[test]
    fn test_only_intra_file_bindings_are_marked_intra_resolved() {
        let mut universe = universe_of(vec![types_module(), client_module()]);
        let linker = Linker::new();
        linker.intra_file(&mut universe).unwrap();
        let snapshot = universe.clone();
        linker.cross_unit(&mut universe, &snapshot).unwrap();

        let types = universe.get("types").unwrap();
        let endpoint = types.find_child(types.root(), ConstructKind::Grouping, "endpoint").unwrap();
        let port = types.find_child(endpoint, ConstructKind::Leaf, "port").unwrap();
        assert_eq!(types.node(port).status, ResolutionStatus::IntraResolved);

        let client = universe.get("client").unwrap();
        let backup = client.node(client.find_path("/server/backup-port").unwrap());
        assert!(backup.references_bound());
        assert_eq!(backup.status, ResolutionStatus::Unresolved);
    }

    #[test]
    fn test_augment_bound_after_intra_pass_is_promoted_by_link() {
        let module = || {
            let mut b = EventStreamBuilder::new("m.yang");
            b.enter(ConstructKind::Module, "m")
                .statement(ConstructKind::Container, "c")
                .enter(ConstructKind::Augment, "/c")
                .statement(ConstructKind::Leaf, "x")
                .exit()
                .exit();
            build(&mut b)
        };
        let mut universe = universe_of(vec![module()]);
        let linker = Linker::new();
        linker.intra_file(&mut universe).unwrap();
        let snapshot = universe.clone();
        linker.cross_unit(&mut universe, &snapshot).unwrap();
        augment::apply_augments(&mut universe).unwrap();

        let tree = universe.get("m").unwrap();
        let augment = tree.find_child(tree.root(), ConstructKind::Augment, "/c").unwrap();
        assert!(tree.node(augment).references_bound());
        assert_eq!(tree.node(augment).status, ResolutionStatus::Unresolved);

        let mut universe = universe_of(vec![module()]);
        linker.link(&mut universe).unwrap();
        let tree = universe.get("m").unwrap();
        assert!(tree.iter().all(|(_, n)| n.status == ResolutionStatus::Resolved));
    }
}
