//! Name Resolver - Scoped lookup of groupings, typedefs, identities and paths
//!
//! Resolution order for a name:
//! 1. Unprefixed (or own-prefix) names walk the lexical scope chain from
//!    the reference's context outward, matching definitions among each
//!    scope's direct children (first match wins)
//! 2. With a universe: top-level definitions of the other trees of the same
//!    module (the module itself and its submodules)
//! 3. With a universe: a foreign prefix maps through the context module's
//!    imports to that module's top-level definitions
//!
//! Without a universe (intra-file pass) only step 1 applies.

use super::universe::SymbolUniverse;
use crate::construct::ConstructKind;
use crate::schema::{NodeId, NodeRef, QName, Resolvable, SchemaPath, SchemaTree};
use tracing::trace;

pub struct NameResolver<'a> {
    own: &'a SchemaTree,
    universe: Option<&'a SymbolUniverse>,
}

impl<'a> NameResolver<'a> {
    /// Lookups within `own` only
    pub fn intra_file(own: &'a SchemaTree) -> Self {
        Self { own, universe: None }
    }

    /// Lookups in `own` (live) and the frozen universe
    pub fn cross_unit(own: &'a SchemaTree, universe: &'a SymbolUniverse) -> Self {
        Self {
            own,
            universe: Some(universe),
        }
    }

    /// Tree by name, preferring the live tree being resolved
    fn tree(&self, name: &str) -> Option<&'a SchemaTree> {
        if name == self.own.name {
            Some(self.own)
        } else {
            self.universe.and_then(|u| u.get(name))
        }
    }

    /// Resolve a name reference to its definition
    pub fn resolve(&self, reference: &Resolvable) -> Option<NodeRef> {
        let kind = reference.kind.definition_kind()?;
        let name = reference.name()?;
        let scope_tree = self.tree(&reference.context.tree)?;

        let found = if scope_tree.is_own_prefix(name.prefix.as_deref()) {
            self.lookup_lexical(scope_tree, reference.context.node, kind, &name.name)
                .or_else(|| self.lookup_module(scope_tree.module_name(), Some(scope_tree.name.as_str()), kind, &name.name))
        } else {
            self.lookup_imported(scope_tree, name, kind)
        };

        trace!(
            "lookup {} {} from {} -> {}",
            reference.kind,
            name,
            reference.context,
            found.as_ref().map(|f| f.to_string()).unwrap_or_else(|| "none".to_string())
        );
        found
    }

    fn lookup_lexical(&self, tree: &SchemaTree, start: NodeId, kind: ConstructKind, name: &str) -> Option<NodeRef> {
        tree.get(start)?;
        tree.scope_chain(start)
            .into_iter()
            .find_map(|scope| tree.find_child(scope, kind, name))
            .map(|id| NodeRef::new(tree.name.clone(), id))
    }

    /// Top-level definitions of a module's trees, skipping `exclude`
    fn lookup_module(&self, module: &str, exclude: Option<&str>, kind: ConstructKind, name: &str) -> Option<NodeRef> {
        let universe = self.universe?;
        universe
            .module_trees(module)
            .filter(|t| Some(t.name.as_str()) != exclude)
            .find_map(|t| {
                let tree = self.tree(&t.name).unwrap_or(t);
                tree.find_child(tree.root(), kind, name)
                    .map(|id| NodeRef::new(tree.name.clone(), id))
            })
    }

    fn lookup_imported(&self, scope_tree: &SchemaTree, name: &QName, kind: ConstructKind) -> Option<NodeRef> {
        self.universe?;
        let module = scope_tree.module_for_prefix(name.prefix.as_deref())?;
        self.lookup_module(module, None, kind, &name.name)
    }
}

/// Walk a schema node path from the top of the module its first segment
/// names. Prefixes are interpreted in the context of `context_tree`.
pub fn locate_path(universe: &SymbolUniverse, context_tree: &SchemaTree, path: &SchemaPath) -> Option<NodeRef> {
    let mut segments = path.segments.iter();
    let first = segments.next()?;
    let first_module = context_tree.module_for_prefix(first.prefix.as_deref())?;

    let (tree, mut current) = universe.module_trees(first_module).find_map(|t| {
        t.find_schema_child(t.root(), &first.name, Some(first_module))
            .map(|id| (t, id))
    })?;

    for segment in segments {
        let module = context_tree.module_for_prefix(segment.prefix.as_deref())?;
        current = tree.find_schema_child(current, &segment.name, Some(module))?;
    }

    Some(NodeRef::new(tree.name.clone(), current))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::SourceLocation;
    use crate::schema::{ModuleImport, ReferenceKind, ReferenceTarget, SchemaNode};

    fn loc() -> SourceLocation {
        SourceLocation::new("m.yang", 1, 1)
    }

    fn grouping_ref(tree: &str, context: NodeId, name: &str) -> Resolvable {
        Resolvable::new(
            ReferenceKind::Grouping,
            ReferenceTarget::Name(QName::parse(name)),
            NodeRef::new(tree, context),
        )
    }

    #[test]
    fn test_innermost_scope_wins() {
        let mut tree = SchemaTree::new(ConstructKind::Module, "m", "m.yang", loc());
        let outer = tree.add_child(tree.root(), SchemaNode::new(ConstructKind::Grouping, "g", "m", loc()));
        let c = tree.add_child(tree.root(), SchemaNode::new(ConstructKind::Container, "c", "m", loc()));
        let inner = tree.add_child(c, SchemaNode::new(ConstructKind::Grouping, "g", "m", loc()));
        let d = tree.add_child(c, SchemaNode::new(ConstructKind::Container, "d", "m", loc()));

        let resolver = NameResolver::intra_file(&tree);
        assert_eq!(resolver.resolve(&grouping_ref("m", d, "g")), Some(NodeRef::new("m", inner)));
        assert_eq!(resolver.resolve(&grouping_ref("m", tree.root(), "g")), Some(NodeRef::new("m", outer)));
        assert_eq!(resolver.resolve(&grouping_ref("m", d, "missing")), None);
    }

    #[test]
    fn test_foreign_prefix_needs_universe() {
        let mut a = SchemaTree::new(ConstructKind::Module, "a", "a.yang", loc());
        a.header.prefix = Some("a".to_string());
        a.header.imports.push(ModuleImport {
            module: "b".to_string(),
            prefix: Some("b".to_string()),
            location: loc(),
        });
        let mut b = SchemaTree::new(ConstructKind::Module, "b", "b.yang", loc());
        let g = b.add_child(b.root(), SchemaNode::new(ConstructKind::Grouping, "shared", "b", loc()));

        let reference = grouping_ref("a", a.root(), "b:shared");
        assert_eq!(NameResolver::intra_file(&a).resolve(&reference), None);

        let mut universe = SymbolUniverse::new();
        universe.insert(a.clone()).unwrap();
        universe.insert(b).unwrap();
        let resolver = NameResolver::cross_unit(&a, &universe);
        assert_eq!(resolver.resolve(&reference), Some(NodeRef::new("b", g)));

        let own_prefixed = grouping_ref("a", a.root(), "a:shared");
        assert_eq!(resolver.resolve(&own_prefixed), None);
    }

    #[test]
    fn test_locate_path_checks_namespaces() {
        let mut b = SchemaTree::new(ConstructKind::Module, "b", "b.yang", loc());
        b.header.prefix = Some("b".to_string());
        let system = b.add_child(b.root(), SchemaNode::new(ConstructKind::Container, "system", "b", loc()));
        let ntp = b.add_child(system, SchemaNode::new(ConstructKind::Container, "ntp", "b", loc()));

        let mut a = SchemaTree::new(ConstructKind::Module, "a", "a.yang", loc());
        a.header.imports.push(ModuleImport {
            module: "b".to_string(),
            prefix: Some("bp".to_string()),
            location: loc(),
        });

        let mut universe = SymbolUniverse::new();
        universe.insert(b).unwrap();
        universe.insert(a.clone()).unwrap();

        let path = SchemaPath::parse("/bp:system/bp:ntp").unwrap();
        assert_eq!(locate_path(&universe, &a, &path), Some(NodeRef::new("b", ntp)));

        let unprefixed = SchemaPath::parse("/system/ntp").unwrap();
        assert_eq!(locate_path(&universe, &a, &unprefixed), None);

        let wrong_ns = SchemaPath::parse("/bp:system/ntp").unwrap();
        assert_eq!(locate_path(&universe, &a, &wrong_ns), None);
    }
}
