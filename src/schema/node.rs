//! Schema node types
//!
//! A schema node is one variant of [`ConstructKind`] plus the facets that
//! variant carries: ordered children for holders, resolvable references for
//! `uses`, `augment`, `deviation`, derived types and identity bases.

use crate::construct::ConstructKind;
use crate::location::SourceLocation;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a node inside its [`SchemaTree`](super::SchemaTree) arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    /// The module or submodule node of a tree
    pub fn root() -> Self {
        Self(0)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Address of a node anywhere in a compilation unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeRef {
    /// Name of the module or submodule tree
    pub tree: String,
    pub node: NodeId,
}

impl NodeRef {
    pub fn new(tree: impl Into<String>, node: NodeId) -> Self {
        Self {
            tree: tree.into(),
            node,
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.tree, self.node)
    }
}

/// Resolution state of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionStatus {
    Unresolved,
    /// Bound by the intra-file pass
    IntraResolved,
    Resolved,
    Failed,
}

/// Possibly prefixed identifier, `prefix:name` or `name`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QName {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    pub name: String,
}

impl QName {
    pub fn new(prefix: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            prefix: prefix.map(str::to_string),
            name: name.into(),
        }
    }

    /// Split `prefix:name`; text without a colon is an unprefixed name
    pub fn parse(text: &str) -> Self {
        match text.split_once(':') {
            Some((prefix, name)) if !prefix.is_empty() => Self::new(Some(prefix), name),
            _ => Self::new(None, text.trim_start_matches(':')),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "{}:{}", prefix, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Schema node identifier path such as `/if:interfaces/if:interface`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaPath {
    pub absolute: bool,
    pub segments: Vec<QName>,
}

impl SchemaPath {
    pub fn parse(text: &str) -> Result<Self, String> {
        let trimmed = text.trim();
        let absolute = trimmed.starts_with('/');
        let body = trimmed.trim_start_matches('/');
        if body.is_empty() {
            return Err(format!("empty schema path '{}'", text));
        }

        let mut segments = Vec::new();
        for part in body.split('/') {
            let part = part.trim();
            if part.is_empty() {
                return Err(format!("schema path '{}' has an empty segment", text));
            }
            segments.push(QName::parse(part));
        }

        Ok(Self { absolute, segments })
    }
}

impl fmt::Display for SchemaPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .segments
            .iter()
            .map(|segment| segment.to_string())
            .collect::<Vec<_>>()
            .join("/");
        if self.absolute {
            write!(f, "/{}", joined)
        } else {
            write!(f, "{}", joined)
        }
    }
}

/// What a resolvable reference binds to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceKind {
    /// `uses` → grouping
    Grouping,
    /// derived `type` → typedef
    Typedef,
    /// `base` → identity
    Identity,
    /// `augment` → target schema node
    AugmentTarget,
    /// `deviation` → target schema node
    DeviationTarget,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::Grouping => "grouping",
            ReferenceKind::Typedef => "typedef",
            ReferenceKind::Identity => "identity",
            ReferenceKind::AugmentTarget => "augment target",
            ReferenceKind::DeviationTarget => "deviation target",
        }
    }

    /// Construct kind of the definition a name reference binds to
    pub fn definition_kind(&self) -> Option<ConstructKind> {
        match self {
            ReferenceKind::Grouping => Some(ConstructKind::Grouping),
            ReferenceKind::Typedef => Some(ConstructKind::Typedef),
            ReferenceKind::Identity => Some(ConstructKind::Identity),
            ReferenceKind::AugmentTarget | ReferenceKind::DeviationTarget => None,
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceTarget {
    Name(QName),
    Path(SchemaPath),
}

impl fmt::Display for ReferenceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceTarget::Name(name) => write!(f, "{}", name),
            ReferenceTarget::Path(path) => write!(f, "{}", path),
        }
    }
}

/// A reference that binds to a named target elsewhere in the schema universe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolvable {
    pub kind: ReferenceKind,
    pub target: ReferenceTarget,
    /// Lexical scope the lookup starts from. Clones keep the scope of the
    /// original, so names inside an expanded grouping resolve where the
    /// grouping was written.
    pub context: NodeRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved: Option<NodeRef>,
}

impl Resolvable {
    pub fn new(kind: ReferenceKind, target: ReferenceTarget, context: NodeRef) -> Self {
        Self {
            kind,
            target,
            context,
            resolved: None,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.resolved.is_some()
    }

    pub fn name(&self) -> Option<&QName> {
        match &self.target {
            ReferenceTarget::Name(name) => Some(name),
            ReferenceTarget::Path(_) => None,
        }
    }

    pub fn path(&self) -> Option<&SchemaPath> {
        match &self.target {
            ReferenceTarget::Path(path) => Some(path),
            ReferenceTarget::Name(_) => None,
        }
    }
}

/// How a node came to exist in its tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeOrigin {
    /// Written in the source at this position
    Declared,
    /// Clone produced by expanding a `uses`
    Expanded { uses: NodeRef, grouping: NodeRef },
    /// Clone merged into an augment target
    Augmented { augment: NodeRef },
}

/// A node of the schema tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaNode {
    pub kind: ConstructKind,
    pub identifier: String,
    /// Name of the module owning this node's namespace
    pub namespace: String,
    pub location: SourceLocation,
    /// Non-owning back-reference, used for path computation and scoping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,
    /// Owned children in canonical schema order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeId>,
    pub status: ResolutionStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<Resolvable>,
    /// Type statement arguments in declaration order (leaf, leaf-list, typedef)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<QName>,
    pub origin: NodeOrigin,
}

impl SchemaNode {
    pub fn new(
        kind: ConstructKind,
        identifier: impl Into<String>,
        namespace: impl Into<String>,
        location: SourceLocation,
    ) -> Self {
        Self {
            kind,
            identifier: identifier.into(),
            namespace: namespace.into(),
            location,
            parent: None,
            children: Vec::new(),
            status: ResolutionStatus::Resolved,
            references: Vec::new(),
            types: Vec::new(),
            origin: NodeOrigin::Declared,
        }
    }

    /// Attach a reference; the node becomes unresolved until it is bound
    pub fn add_reference(&mut self, reference: Resolvable) {
        self.references.push(reference);
        self.status = ResolutionStatus::Unresolved;
    }

    pub fn is_holder(&self) -> bool {
        self.kind.is_holder()
    }

    pub fn is_resolvable(&self) -> bool {
        !self.references.is_empty()
    }

    /// All references bound to a target
    pub fn references_bound(&self) -> bool {
        self.references.iter().all(Resolvable::is_bound)
    }

    /// Resolved targets of every bound reference
    pub fn resolved_targets(&self) -> impl Iterator<Item = &NodeRef> {
        self.references.iter().filter_map(|r| r.resolved.as_ref())
    }

    /// Short description for display
    pub fn short_description(&self) -> String {
        if self.identifier.is_empty() {
            self.kind.to_string()
        } else {
            format!("{} {}", self.kind, self.identifier)
        }
    }
}
