//! Schema Tree - Arena holding one file's module or submodule
//!
//! Nodes are addressed by [`NodeId`]; a parent exclusively owns the ids in
//! its `children` list and every node keeps a back-reference to its parent.
//! Nodes are never removed: a `uses` placeholder that has been expanded is
//! detached from its parent's children but stays in the arena.

use super::node::{NodeId, NodeOrigin, SchemaNode};
use crate::construct::ConstructKind;
use crate::location::SourceLocation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An `import` statement of a module header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleImport {
    pub module: String,
    pub prefix: Option<String>,
    pub location: SourceLocation,
}

/// An `include` statement of a module header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInclude {
    pub submodule: String,
    pub location: SourceLocation,
}

/// The `belongs-to` statement of a submodule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BelongsTo {
    pub module: String,
    pub prefix: Option<String>,
}

/// Module-level metadata collected from header statements
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleHeader {
    pub prefix: Option<String>,
    /// Namespace URI
    pub namespace: Option<String>,
    pub belongs_to: Option<BelongsTo>,
    #[serde(default)]
    pub imports: Vec<ModuleImport>,
    #[serde(default)]
    pub includes: Vec<ModuleInclude>,
    /// The module declares deviations. Forwarded to code generators, which
    /// skip such modules; the linker does not act on it.
    #[serde(default)]
    pub deviation_only: bool,
}

impl ModuleHeader {
    /// Prefix that refers to this module's own namespace
    pub fn own_prefix(&self) -> Option<&str> {
        self.prefix
            .as_deref()
            .or_else(|| self.belongs_to.as_ref().and_then(|b| b.prefix.as_deref()))
    }

    /// Import declared with the given prefix
    pub fn import_for_prefix(&self, prefix: &str) -> Option<&ModuleImport> {
        self.imports
            .iter()
            .find(|import| import.prefix.as_deref() == Some(prefix))
    }
}

/// A detached copy of a subtree, ready to be grafted into any tree.
///
/// Ids inside are local to the subtree; index 0 is its root.
#[derive(Debug, Clone)]
pub struct Subtree {
    nodes: Vec<SchemaNode>,
}

impl Subtree {
    pub fn root(&self) -> &SchemaNode {
        &self.nodes[0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Schema tree of a single module or submodule file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaTree {
    /// Module or submodule name, unique within a compilation unit
    pub name: String,
    /// Source file the tree was built from
    pub file: String,
    pub header: ModuleHeader,
    /// Part of the unit being compiled (as opposed to a dependency)
    #[serde(skip, default)]
    pub translatable: bool,
    nodes: Vec<SchemaNode>,
}

impl SchemaTree {
    /// Create a tree holding only its root node
    pub fn new(kind: ConstructKind, name: impl Into<String>, file: impl Into<String>, location: SourceLocation) -> Self {
        let name = name.into();
        let root = SchemaNode::new(kind, name.clone(), name.clone(), location);
        Self {
            name,
            file: file.into(),
            header: ModuleHeader::default(),
            translatable: true,
            nodes: vec![root],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId::root()
    }

    pub fn root_node(&self) -> &SchemaNode {
        &self.nodes[0]
    }

    pub fn is_submodule(&self) -> bool {
        self.root_node().kind == ConstructKind::Submodule
    }

    /// Name of the module whose namespace this tree's nodes belong to
    pub fn module_name(&self) -> &str {
        match (&self.header.belongs_to, self.is_submodule()) {
            (Some(belongs_to), true) => &belongs_to.module,
            _ => &self.name,
        }
    }

    /// Whether `prefix` refers to this tree's own module
    pub fn is_own_prefix(&self, prefix: Option<&str>) -> bool {
        match prefix {
            None => true,
            Some(prefix) => self.header.own_prefix() == Some(prefix),
        }
    }

    /// Module a prefix refers to from inside this tree
    pub fn module_for_prefix(&self, prefix: Option<&str>) -> Option<&str> {
        if self.is_own_prefix(prefix) {
            return Some(self.module_name());
        }
        prefix
            .and_then(|p| self.header.import_for_prefix(p))
            .map(|import| import.module.as_str())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&SchemaNode> {
        self.nodes.get(id.index())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut SchemaNode> {
        self.nodes.get_mut(id.index())
    }

    pub fn node(&self, id: NodeId) -> &SchemaNode {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut SchemaNode {
        &mut self.nodes[id.index()]
    }

    /// Every node in the arena, attached or not, in creation order
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SchemaNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeId(i as u32), node))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SchemaNode> {
        self.nodes.iter_mut()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Append a new node as the last child of `parent`
    pub fn add_child(&mut self, parent: NodeId, mut node: SchemaNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        node.parent = Some(parent);
        self.nodes.push(node);
        self.nodes[parent.index()].children.push(id);
        id
    }

    /// Replace `child` in its parent's child list with `replacement`,
    /// keeping the position. The replaced node stays in the arena.
    pub fn splice_child(&mut self, parent: NodeId, child: NodeId, replacement: &[NodeId]) {
        let children = &mut self.nodes[parent.index()].children;
        if let Some(position) = children.iter().position(|c| *c == child) {
            children.splice(position..=position, replacement.iter().copied());
        }
    }

    /// Append already-grafted nodes to `parent`'s children
    pub fn append_children(&mut self, parent: NodeId, ids: &[NodeId]) {
        self.nodes[parent.index()].children.extend_from_slice(ids);
    }

    /// Scope chain from a node up to the root
    pub fn scope_chain(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = vec![id];
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            chain.push(parent);
            current = parent;
        }
        chain
    }

    /// Whether the node is reachable from the root through child lists
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            if !self.children(parent).contains(&current) {
                return false;
            }
            current = parent;
        }
        current == self.root()
    }

    /// Where a node occurs in the source. Copies made by `uses` occur at the
    /// outermost `uses` they were expanded through, not inside the grouping.
    pub fn site_location(&self, id: NodeId) -> &SourceLocation {
        let mut current = id;
        for _ in 0..self.nodes.len() {
            match &self.node(current).origin {
                NodeOrigin::Expanded { uses, .. } if uses.tree == self.name && self.get(uses.node).is_some() => {
                    current = uses.node;
                }
                _ => break,
            }
        }
        &self.node(current).location
    }

    /// Structural consistency of the arena: a module or submodule root at
    /// index 0, in-range ids, and parent links that agree with child lists
    /// and lead back to the root
    pub fn check_arena(&self) -> Result<(), String> {
        let root = self.nodes.first().ok_or_else(|| "tree has no nodes".to_string())?;
        if !root.kind.is_root() || root.parent.is_some() {
            return Err(format!("root of {} is a {} with a parent", self.name, root.kind));
        }
        if root.identifier != self.name {
            return Err(format!("root {} does not match tree {}", root.identifier, self.name));
        }

        let len = self.nodes.len();
        let in_range = |id: NodeId| id.index() < len;
        let mut listed = vec![false; len];
        for (id, node) in self.iter() {
            for child in &node.children {
                if !in_range(*child) || *child == self.root() {
                    return Err(format!("{} lists invalid child {}", id, child));
                }
                if std::mem::replace(&mut listed[child.index()], true) {
                    return Err(format!("{} is listed as a child more than once", child));
                }
                if self.node(*child).parent != Some(id) {
                    return Err(format!("{} lists {} whose parent differs", id, child));
                }
            }
            for target in node.references.iter().flat_map(|r| std::iter::once(&r.context).chain(r.resolved.as_ref())) {
                if target.tree == self.name && !in_range(target.node) {
                    return Err(format!("{} refers to missing node {}", id, target.node));
                }
            }
        }

        for (id, node) in self.iter().skip(1) {
            let mut current = node.parent.ok_or_else(|| format!("{} has no parent", id))?;
            let mut steps = 0;
            while current != self.root() {
                if !in_range(current) || steps == len {
                    return Err(format!("parent chain of {} does not reach the root", id));
                }
                current = self
                    .node(current)
                    .parent
                    .ok_or_else(|| format!("parent chain of {} does not reach the root", id))?;
                steps += 1;
            }
        }
        Ok(())
    }

    /// Direct child of a given kind and identifier
    pub fn find_child(&self, parent: NodeId, kind: ConstructKind, name: &str) -> Option<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|c| {
                let node = self.node(*c);
                node.kind == kind && node.identifier == name
            })
    }

    /// Direct child addressable by a schema path segment. When `namespace`
    /// is given the child must belong to that module.
    pub fn find_schema_child(&self, parent: NodeId, name: &str, namespace: Option<&str>) -> Option<NodeId> {
        self.children(parent).iter().copied().find(|c| {
            let node = self.node(*c);
            node.kind.is_path_addressable()
                && node.identifier == name
                && namespace.is_none_or(|ns| node.namespace == ns)
        })
    }

    /// Look up a node by an unprefixed path like `/interfaces/interface/name`
    pub fn find_path(&self, path: &str) -> Option<NodeId> {
        let mut current = self.root();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let name = segment.rsplit(':').next().unwrap_or(segment);
            current = self.find_schema_child(current, name, None)?;
        }
        Some(current)
    }

    /// Schema path of a node computed through parent back-references
    pub fn path(&self, id: NodeId) -> String {
        let mut segments: Vec<&str> = self
            .scope_chain(id)
            .into_iter()
            .filter(|n| *n != self.root())
            .map(|n| self.node(n).identifier.as_str())
            .collect();
        segments.reverse();
        format!("/{}", segments.join("/"))
    }

    /// Attached nodes below (and including) `from` in document order
    pub fn preorder(&self, from: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            order.push(id);
            for child in self.children(id).iter().rev() {
                stack.push(*child);
            }
        }
        order
    }

    /// `uses` statements written directly under each holder, keyed by holder.
    /// Expanded placeholders are included; clones of `uses` are not.
    pub fn uses_sites(&self) -> BTreeMap<NodeId, Vec<NodeId>> {
        let mut sites: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
        for (id, node) in self.iter() {
            if node.kind != ConstructKind::Uses || node.origin != NodeOrigin::Declared {
                continue;
            }
            if let Some(parent) = node.parent {
                sites.entry(parent).or_default().push(id);
            }
        }
        sites
    }

    /// Copy the subtree rooted at `id` out of this tree
    pub fn extract(&self, id: NodeId) -> Subtree {
        let mut nodes = Vec::new();
        self.extract_into(id, None, &mut nodes);
        Subtree { nodes }
    }

    fn extract_into(&self, id: NodeId, parent: Option<NodeId>, out: &mut Vec<SchemaNode>) -> NodeId {
        let local = NodeId(out.len() as u32);
        let mut copy = self.node(id).clone();
        copy.parent = parent;
        copy.children = Vec::new();
        out.push(copy);

        for child in self.children(id) {
            let child_local = self.extract_into(*child, Some(local), out);
            out[local.index()].children.push(child_local);
        }
        local
    }

    /// Graft a detached subtree under `parent`, assigning fresh ids.
    ///
    /// `adjust` is applied to every grafted node. The returned root is not
    /// yet linked into `parent`'s children; use [`splice_child`](Self::splice_child)
    /// or [`append_children`](Self::append_children).
    pub fn graft(&mut self, parent: NodeId, subtree: Subtree, adjust: impl Fn(&mut SchemaNode)) -> NodeId {
        let offset = self.nodes.len() as u32;
        for mut node in subtree.nodes {
            node.parent = Some(match node.parent {
                Some(local) => NodeId(local.0 + offset),
                None => parent,
            });
            for child in node.children.iter_mut() {
                child.0 += offset;
            }
            adjust(&mut node);
            self.nodes.push(node);
        }
        NodeId(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::node::NodeRef;

    fn loc(line: u32) -> SourceLocation {
        SourceLocation::new("m.yang", line, 1)
    }

    fn sample_tree() -> (SchemaTree, NodeId, NodeId) {
        let mut tree = SchemaTree::new(ConstructKind::Module, "m", "m.yang", loc(1));
        let c = tree.add_child(tree.root(), SchemaNode::new(ConstructKind::Container, "c", "m", loc(2)));
        let x = tree.add_child(c, SchemaNode::new(ConstructKind::Leaf, "x", "m", loc(3)));
        (tree, c, x)
    }

    #[test]
    fn test_paths_follow_parents() {
        let (tree, c, x) = sample_tree();
        assert_eq!(tree.path(x), "/c/x");
        assert_eq!(tree.find_path("/c/x"), Some(x));
        assert_eq!(tree.find_path("/m:c"), Some(c));
        assert_eq!(tree.find_path("/c/y"), None);
        assert_eq!(tree.scope_chain(x), vec![x, c, tree.root()]);
    }

    #[test]
    fn test_extract_and_graft_creates_independent_copy() {
        let (mut tree, c, x) = sample_tree();
        let d = tree.add_child(tree.root(), SchemaNode::new(ConstructKind::Container, "d", "m", loc(4)));

        let subtree = tree.extract(c);
        assert_eq!(subtree.len(), 2);
        let copy = tree.graft(d, subtree, |node| {
            node.origin = NodeOrigin::Augmented {
                augment: NodeRef::new("m", NodeId(99)),
            }
        });
        tree.append_children(d, &[copy]);

        assert_ne!(copy, c);
        assert_eq!(tree.path(copy), "/d/c");
        let copied_leaf = tree.children(copy)[0];
        assert_ne!(copied_leaf, x);
        assert_eq!(tree.path(copied_leaf), "/d/c/x");

        tree.node_mut(copied_leaf).identifier = "renamed".to_string();
        assert_eq!(tree.node(x).identifier, "x");
    }

    #[test]
    fn test_splice_keeps_position_and_detaches() {
        let mut tree = SchemaTree::new(ConstructKind::Module, "m", "m.yang", loc(1));
        let a = tree.add_child(tree.root(), SchemaNode::new(ConstructKind::Leaf, "a", "m", loc(2)));
        let u = tree.add_child(tree.root(), SchemaNode::new(ConstructKind::Uses, "g", "m", loc(3)));
        let z = tree.add_child(tree.root(), SchemaNode::new(ConstructKind::Leaf, "z", "m", loc(4)));

        let subtree = tree.extract(a);
        let clone = tree.graft(tree.root(), subtree, |_| {});
        tree.splice_child(tree.root(), u, &[clone]);

        assert_eq!(tree.children(tree.root()), &[a, clone, z]);
        assert!(!tree.is_attached(u));
        assert!(tree.is_attached(clone));
        assert_eq!(tree.uses_sites().get(&tree.root()), Some(&vec![u]));
    }

    #[test]
    fn test_site_location_follows_outermost_uses() {
        let mut tree = SchemaTree::new(ConstructKind::Module, "m", "m.yang", loc(1));
        let c = tree.add_child(tree.root(), SchemaNode::new(ConstructKind::Container, "c", "m", loc(2)));
        let outer = tree.add_child(c, SchemaNode::new(ConstructKind::Uses, "outer", "m", loc(3)));
        let mut inner = SchemaNode::new(ConstructKind::Uses, "inner", "m", loc(10));
        inner.origin = NodeOrigin::Expanded {
            uses: NodeRef::new("m", outer),
            grouping: NodeRef::new("m", NodeId(50)),
        };
        let inner = tree.add_child(c, inner);
        let mut x = SchemaNode::new(ConstructKind::Leaf, "x", "m", loc(20));
        x.origin = NodeOrigin::Expanded {
            uses: NodeRef::new("m", inner),
            grouping: NodeRef::new("m", NodeId(51)),
        };
        let x = tree.add_child(c, x);

        assert_eq!(tree.site_location(x), &loc(3));
        assert_eq!(tree.site_location(c), &loc(2));
    }

    #[test]
    fn test_check_arena() {
        let (tree, _, x) = sample_tree();
        assert!(tree.check_arena().is_ok());

        let mut empty = tree.clone();
        empty.nodes.clear();
        assert!(empty.check_arena().is_err());

        let mut dangling = tree.clone();
        dangling.nodes[1].children.push(NodeId(40));
        assert!(dangling.check_arena().unwrap_err().contains("invalid child"));

        let mut orphan = tree.clone();
        orphan.nodes[x.index()].parent = Some(NodeId(7));
        assert!(orphan.check_arena().is_err());

        let mut leaf_root = tree;
        leaf_root.nodes[0].kind = ConstructKind::Leaf;
        assert!(leaf_root.check_arena().is_err());
    }

    #[test]
    fn test_prefix_mapping() {
        let mut tree = SchemaTree::new(ConstructKind::Module, "a", "a.yang", loc(1));
        tree.header.prefix = Some("a".to_string());
        tree.header.imports.push(ModuleImport {
            module: "b".to_string(),
            prefix: Some("bp".to_string()),
            location: loc(2),
        });

        assert_eq!(tree.module_for_prefix(None), Some("a"));
        assert_eq!(tree.module_for_prefix(Some("a")), Some("a"));
        assert_eq!(tree.module_for_prefix(Some("bp")), Some("b"));
        assert_eq!(tree.module_for_prefix(Some("zz")), None);
    }
}
