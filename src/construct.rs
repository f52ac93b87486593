//! Construct kinds - Every YANG statement the compiler understands
//!
//! Constructs fall into three groups:
//! - Schema node variants (`module`, `container`, `leaf`, `uses`, ...) which
//!   become nodes of the per-file schema tree
//! - Reference statements (`type`, `base`) which attach resolvable facets to
//!   their enclosing node
//! - Header statements (`import`, `include`, `prefix`, `belongs-to`,
//!   `namespace`) which become module metadata

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Kind of a construct as reported by the parse-event front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConstructKind {
    Module,
    Submodule,
    Container,
    List,
    Leaf,
    LeafList,
    Choice,
    Case,
    Grouping,
    Typedef,
    Uses,
    Augment,
    Identity,
    Rpc,
    Input,
    Output,
    Notification,
    Deviation,
    Type,
    Base,
    Import,
    Include,
    Prefix,
    BelongsTo,
    Namespace,
}

/// Independent identifier namespaces checked by the collision detector.
///
/// Two siblings only collide when they share both the family and the
/// identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NamespaceFamily {
    /// container, list, leaf, leaf-list
    DataNode,
    Choice,
    Case,
    Grouping,
    Typedef,
    Uses,
    /// rpc and notification share one family
    Rpc,
    Input,
    Output,
    Identity,
}

const BODY_HOLDERS: &[ConstructKind] = &[
    ConstructKind::Module,
    ConstructKind::Submodule,
    ConstructKind::Container,
    ConstructKind::List,
    ConstructKind::Case,
    ConstructKind::Grouping,
    ConstructKind::Input,
    ConstructKind::Output,
    ConstructKind::Notification,
    ConstructKind::Augment,
];

const DATA_HOLDERS: &[ConstructKind] = &[
    ConstructKind::Module,
    ConstructKind::Submodule,
    ConstructKind::Container,
    ConstructKind::List,
    ConstructKind::Choice,
    ConstructKind::Case,
    ConstructKind::Grouping,
    ConstructKind::Input,
    ConstructKind::Output,
    ConstructKind::Notification,
    ConstructKind::Augment,
];

const DEFINITION_HOLDERS: &[ConstructKind] = &[
    ConstructKind::Module,
    ConstructKind::Submodule,
    ConstructKind::Container,
    ConstructKind::List,
    ConstructKind::Grouping,
    ConstructKind::Rpc,
    ConstructKind::Input,
    ConstructKind::Output,
    ConstructKind::Notification,
];

const ROOTS: &[ConstructKind] = &[ConstructKind::Module, ConstructKind::Submodule];

/// Top-level augments, plus augments refining the copy made by a `uses`
const AUGMENT_HOLDERS: &[ConstructKind] = &[ConstructKind::Module, ConstructKind::Submodule, ConstructKind::Uses];

impl ConstructKind {
    /// Human label used in diagnostics
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstructKind::Module => "module",
            ConstructKind::Submodule => "submodule",
            ConstructKind::Container => "container",
            ConstructKind::List => "list",
            ConstructKind::Leaf => "leaf",
            ConstructKind::LeafList => "leaf-list",
            ConstructKind::Choice => "choice",
            ConstructKind::Case => "case",
            ConstructKind::Grouping => "grouping",
            ConstructKind::Typedef => "typedef",
            ConstructKind::Uses => "uses",
            ConstructKind::Augment => "augment",
            ConstructKind::Identity => "identity",
            ConstructKind::Rpc => "rpc",
            ConstructKind::Input => "input",
            ConstructKind::Output => "output",
            ConstructKind::Notification => "notification",
            ConstructKind::Deviation => "deviation",
            ConstructKind::Type => "type",
            ConstructKind::Base => "base",
            ConstructKind::Import => "import",
            ConstructKind::Include => "include",
            ConstructKind::Prefix => "prefix",
            ConstructKind::BelongsTo => "belongs-to",
            ConstructKind::Namespace => "namespace",
        }
    }

    /// Get all construct kinds
    pub fn all() -> &'static [ConstructKind] {
        &[
            ConstructKind::Module,
            ConstructKind::Submodule,
            ConstructKind::Container,
            ConstructKind::List,
            ConstructKind::Leaf,
            ConstructKind::LeafList,
            ConstructKind::Choice,
            ConstructKind::Case,
            ConstructKind::Grouping,
            ConstructKind::Typedef,
            ConstructKind::Uses,
            ConstructKind::Augment,
            ConstructKind::Identity,
            ConstructKind::Rpc,
            ConstructKind::Input,
            ConstructKind::Output,
            ConstructKind::Notification,
            ConstructKind::Deviation,
            ConstructKind::Type,
            ConstructKind::Base,
            ConstructKind::Import,
            ConstructKind::Include,
            ConstructKind::Prefix,
            ConstructKind::BelongsTo,
            ConstructKind::Namespace,
        ]
    }

    /// Module or submodule - the only constructs allowed on an empty stack
    pub fn is_root(&self) -> bool {
        matches!(self, ConstructKind::Module | ConstructKind::Submodule)
    }

    /// Whether the builder turns this construct into a schema node
    pub fn is_schema_node(&self) -> bool {
        !matches!(
            self,
            ConstructKind::Type
                | ConstructKind::Base
                | ConstructKind::Import
                | ConstructKind::Include
                | ConstructKind::Prefix
                | ConstructKind::BelongsTo
                | ConstructKind::Namespace
        )
    }

    /// Whether nodes of this kind may own children
    pub fn is_holder(&self) -> bool {
        matches!(
            self,
            ConstructKind::Module
                | ConstructKind::Submodule
                | ConstructKind::Container
                | ConstructKind::List
                | ConstructKind::Choice
                | ConstructKind::Case
                | ConstructKind::Grouping
                | ConstructKind::Rpc
                | ConstructKind::Input
                | ConstructKind::Output
                | ConstructKind::Notification
                | ConstructKind::Augment
                | ConstructKind::Uses
        )
    }

    /// Data-definition constructs that a choice may hold directly (shorthand case)
    pub fn is_shorthand_case_member(&self) -> bool {
        matches!(
            self,
            ConstructKind::Container | ConstructKind::List | ConstructKind::Leaf | ConstructKind::LeafList
        )
    }

    /// Nodes addressable by a schema path segment (augment/deviation targets)
    pub fn is_path_addressable(&self) -> bool {
        matches!(
            self,
            ConstructKind::Container
                | ConstructKind::List
                | ConstructKind::Leaf
                | ConstructKind::LeafList
                | ConstructKind::Choice
                | ConstructKind::Case
                | ConstructKind::Rpc
                | ConstructKind::Input
                | ConstructKind::Output
                | ConstructKind::Notification
        )
    }

    /// Nodes an augment may add children to
    pub fn accepts_augment(&self) -> bool {
        matches!(
            self,
            ConstructKind::Container
                | ConstructKind::List
                | ConstructKind::Choice
                | ConstructKind::Case
                | ConstructKind::Input
                | ConstructKind::Output
                | ConstructKind::Notification
        )
    }

    /// Scoped definitions that are not instantiated at a uses site
    pub fn is_scoped_definition(&self) -> bool {
        matches!(self, ConstructKind::Grouping | ConstructKind::Typedef)
    }

    /// Identifier namespace this construct lives in, if any
    pub fn family(&self) -> Option<NamespaceFamily> {
        match self {
            ConstructKind::Container
            | ConstructKind::List
            | ConstructKind::Leaf
            | ConstructKind::LeafList => Some(NamespaceFamily::DataNode),
            ConstructKind::Choice => Some(NamespaceFamily::Choice),
            ConstructKind::Case => Some(NamespaceFamily::Case),
            ConstructKind::Grouping => Some(NamespaceFamily::Grouping),
            ConstructKind::Typedef => Some(NamespaceFamily::Typedef),
            ConstructKind::Uses => Some(NamespaceFamily::Uses),
            ConstructKind::Rpc | ConstructKind::Notification => Some(NamespaceFamily::Rpc),
            ConstructKind::Input => Some(NamespaceFamily::Input),
            ConstructKind::Output => Some(NamespaceFamily::Output),
            ConstructKind::Identity => Some(NamespaceFamily::Identity),
            _ => None,
        }
    }

    /// Constructs that may legally enclose this one.
    ///
    /// Empty for roots, which require an empty stack instead.
    pub fn allowed_holders(&self) -> &'static [ConstructKind] {
        match self {
            ConstructKind::Module | ConstructKind::Submodule => &[],
            ConstructKind::Container
            | ConstructKind::List
            | ConstructKind::Leaf
            | ConstructKind::LeafList => DATA_HOLDERS,
            ConstructKind::Choice | ConstructKind::Uses => BODY_HOLDERS,
            ConstructKind::Case => &[ConstructKind::Choice, ConstructKind::Augment],
            ConstructKind::Grouping | ConstructKind::Typedef => DEFINITION_HOLDERS,
            ConstructKind::Augment => AUGMENT_HOLDERS,
            ConstructKind::Identity
            | ConstructKind::Rpc
            | ConstructKind::Deviation
            | ConstructKind::Import
            | ConstructKind::Include => ROOTS,
            ConstructKind::Notification => &[
                ConstructKind::Module,
                ConstructKind::Submodule,
                ConstructKind::Container,
                ConstructKind::List,
                ConstructKind::Augment,
            ],
            ConstructKind::Input | ConstructKind::Output => &[ConstructKind::Rpc],
            ConstructKind::Type => &[
                ConstructKind::Leaf,
                ConstructKind::LeafList,
                ConstructKind::Typedef,
                ConstructKind::Type,
            ],
            ConstructKind::Base => &[ConstructKind::Identity, ConstructKind::Type],
            ConstructKind::Prefix => &[
                ConstructKind::Module,
                ConstructKind::Import,
                ConstructKind::BelongsTo,
            ],
            ConstructKind::BelongsTo => &[ConstructKind::Submodule],
            ConstructKind::Namespace => &[ConstructKind::Module],
        }
    }

    /// Check whether `holder` may enclose this construct
    pub fn may_be_held_by(&self, holder: ConstructKind) -> bool {
        self.allowed_holders().contains(&holder)
    }
}

impl FromStr for ConstructKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "module" => Ok(ConstructKind::Module),
            "submodule" => Ok(ConstructKind::Submodule),
            "container" => Ok(ConstructKind::Container),
            "list" => Ok(ConstructKind::List),
            "leaf" => Ok(ConstructKind::Leaf),
            "leaf-list" | "leaflist" => Ok(ConstructKind::LeafList),
            "choice" => Ok(ConstructKind::Choice),
            "case" => Ok(ConstructKind::Case),
            "grouping" => Ok(ConstructKind::Grouping),
            "typedef" => Ok(ConstructKind::Typedef),
            "uses" => Ok(ConstructKind::Uses),
            "augment" => Ok(ConstructKind::Augment),
            "identity" => Ok(ConstructKind::Identity),
            "rpc" => Ok(ConstructKind::Rpc),
            "input" => Ok(ConstructKind::Input),
            "output" => Ok(ConstructKind::Output),
            "notification" => Ok(ConstructKind::Notification),
            "deviation" => Ok(ConstructKind::Deviation),
            "type" => Ok(ConstructKind::Type),
            "base" => Ok(ConstructKind::Base),
            "import" => Ok(ConstructKind::Import),
            "include" => Ok(ConstructKind::Include),
            "prefix" => Ok(ConstructKind::Prefix),
            "belongs-to" | "belongsto" => Ok(ConstructKind::BelongsTo),
            "namespace" => Ok(ConstructKind::Namespace),
            _ => Err(format!("Unknown construct kind: {}", s)),
        }
    }
}

impl std::fmt::Display for ConstructKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl NamespaceFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            NamespaceFamily::DataNode => "data node",
            NamespaceFamily::Choice => "choice",
            NamespaceFamily::Case => "case",
            NamespaceFamily::Grouping => "grouping",
            NamespaceFamily::Typedef => "typedef",
            NamespaceFamily::Uses => "uses",
            NamespaceFamily::Rpc => "rpc",
            NamespaceFamily::Input => "input",
            NamespaceFamily::Output => "output",
            NamespaceFamily::Identity => "identity",
        }
    }
}

impl std::fmt::Display for NamespaceFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construct_kind_roundtrip() {
        for kind in ConstructKind::all() {
            let parsed: ConstructKind = kind.as_str().parse().unwrap();
            assert_eq!(*kind, parsed);
        }
    }

    #[test]
    fn test_construct_kind_serde_labels() {
        let json = serde_json::to_string(&ConstructKind::LeafList).unwrap();
        assert_eq!(json, "\"leaf-list\"");
        let kind: ConstructKind = serde_json::from_str("\"belongs-to\"").unwrap();
        assert_eq!(kind, ConstructKind::BelongsTo);
    }

    #[test]
    fn test_leaves_are_not_holders() {
        assert!(!ConstructKind::Leaf.is_holder());
        assert!(!ConstructKind::LeafList.is_holder());
        assert!(ConstructKind::Container.is_holder());
        assert!(ConstructKind::Grouping.is_holder());
    }

    #[test]
    fn test_holder_rules() {
        assert!(ConstructKind::Case.may_be_held_by(ConstructKind::Choice));
        assert!(!ConstructKind::Case.may_be_held_by(ConstructKind::Container));
        assert!(ConstructKind::Input.may_be_held_by(ConstructKind::Rpc));
        assert!(!ConstructKind::Input.may_be_held_by(ConstructKind::Module));
        assert!(ConstructKind::Module.allowed_holders().is_empty());
        assert!(ConstructKind::Augment.may_be_held_by(ConstructKind::Uses));
        assert!(!ConstructKind::Augment.may_be_held_by(ConstructKind::Container));
        assert!(!ConstructKind::Leaf.may_be_held_by(ConstructKind::Uses));
    }

    #[test]
    fn test_families_are_independent() {
        assert_eq!(ConstructKind::Leaf.family(), ConstructKind::Container.family());
        assert_ne!(ConstructKind::Typedef.family(), ConstructKind::Grouping.family());
        assert_eq!(ConstructKind::Rpc.family(), ConstructKind::Notification.family());
        assert_eq!(ConstructKind::Augment.family(), None);
    }
}
