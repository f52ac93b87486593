//! Schema Tree Builder - Turns one file's parse events into a schema tree
//!
//! The builder keeps a stack of open constructs. Every event is first handed
//! to the [`ConstructValidator`]; only when it passes does the builder act:
//! - Schema node constructs become nodes under the innermost open node
//! - `type` and `base` attach facets to the node that owns them
//! - Header statements fill the tree's [`ModuleHeader`]
//!
//! The first error stops the build of that file.

pub mod source;

pub use source::{EventSource, JsonEventSource, SourceFile, SourceRegistry, default_registry};

use crate::construct::ConstructKind;
use crate::event::{ParseEvent, Phase};
use crate::location::SourceLocation;
use crate::schema::{
    BelongsTo, ModuleImport, ModuleInclude, NodeId, NodeRef, QName, ReferenceKind, ReferenceTarget,
    Resolvable, SchemaNode, SchemaPath, SchemaTree,
};
use crate::validator::{ConstructValidationError, ConstructValidator, OpenConstruct};
use tracing::{debug, warn};

/// Type names defined by YANG itself; they never refer to a typedef
pub const BUILTIN_TYPES: &[&str] = &[
    "binary",
    "bits",
    "boolean",
    "decimal64",
    "empty",
    "enumeration",
    "identityref",
    "instance-identifier",
    "int8",
    "int16",
    "int32",
    "int64",
    "leafref",
    "string",
    "uint8",
    "uint16",
    "uint32",
    "uint64",
    "union",
];

pub fn is_builtin_type(name: &QName) -> bool {
    name.prefix.is_none() && BUILTIN_TYPES.contains(&name.name.as_str())
}

/// Failure while building a tree from an event stream
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParserError {
    #[error(transparent)]
    Construct(#[from] ConstructValidationError),

    #[error("YANG file error: {message} at line {} at position {} in {}", location.line, location.column, location.file)]
    Malformed { message: String, location: SourceLocation },
}

impl ParserError {
    pub fn malformed(message: impl Into<String>, location: SourceLocation) -> Self {
        ParserError::Malformed {
            message: message.into(),
            location,
        }
    }

    pub fn location(&self) -> &SourceLocation {
        match self {
            ParserError::Construct(err) => &err.location,
            ParserError::Malformed { location, .. } => location,
        }
    }
}

/// An open construct on the builder stack
#[derive(Debug)]
struct Frame {
    kind: ConstructKind,
    name: String,
    /// Schema node created for this construct, if it is one
    node: Option<NodeId>,
}

/// Builds a [`SchemaTree`] from the events of a single file
#[derive(Debug)]
pub struct SchemaTreeBuilder {
    file: String,
    validator: ConstructValidator,
    stack: Vec<Frame>,
    tree: Option<SchemaTree>,
    last_location: SourceLocation,
}

impl SchemaTreeBuilder {
    pub fn new(file: impl Into<String>) -> Self {
        let file = file.into();
        Self {
            last_location: SourceLocation::unknown(file.clone()),
            file,
            validator: ConstructValidator::new(),
            stack: Vec::new(),
            tree: None,
        }
    }

    fn top(&self) -> Option<OpenConstruct<'_>> {
        self.stack.last().map(|frame| OpenConstruct {
            kind: frame.kind,
            name: &frame.name,
        })
    }

    /// Validate and apply one event
    pub fn handle(&mut self, event: &ParseEvent) -> Result<(), ParserError> {
        self.validator.validate(self.top(), event)?;
        self.last_location = event.location.clone();

        match event.phase {
            Phase::Entry => self.enter(event),
            Phase::Exit => {
                self.stack.pop();
                Ok(())
            }
        }
    }

    fn enter(&mut self, event: &ParseEvent) -> Result<(), ParserError> {
        let node = if event.kind.is_root() {
            Some(self.start_tree(event)?)
        } else if event.kind.is_schema_node() {
            Some(self.add_node(event)?)
        } else {
            self.apply_statement(event)?;
            None
        };

        self.stack.push(Frame {
            kind: event.kind,
            name: event.name.clone(),
            node,
        });
        Ok(())
    }

    fn start_tree(&mut self, event: &ParseEvent) -> Result<NodeId, ParserError> {
        if self.tree.is_some() {
            return Err(ParserError::malformed(
                format!("{} \"{}\" follows another module or submodule in the same file", event.kind, event.name),
                event.location.clone(),
            ));
        }
        if event.name.is_empty() {
            return Err(ParserError::malformed(
                format!("{} is missing its name", event.kind),
                event.location.clone(),
            ));
        }

        debug!("Building {} {} from {}", event.kind, event.name, self.file);
        let tree = SchemaTree::new(event.kind, event.name.clone(), self.file.clone(), event.location.clone());
        let root = tree.root();
        self.tree = Some(tree);
        Ok(root)
    }

    fn tree_mut(&mut self, event: &ParseEvent) -> Result<&mut SchemaTree, ParserError> {
        self.tree.as_mut().ok_or_else(|| {
            ParserError::malformed(
                format!("{} appears outside of a module or submodule", event.kind),
                event.location.clone(),
            )
        })
    }

    /// Innermost open schema node
    fn enclosing_node(&self, event: &ParseEvent) -> Result<NodeId, ParserError> {
        self.stack
            .iter()
            .rev()
            .find_map(|frame| frame.node)
            .ok_or_else(|| {
                ParserError::malformed(
                    format!("{} has no enclosing schema node", event.kind),
                    event.location.clone(),
                )
            })
    }

    fn add_node(&mut self, event: &ParseEvent) -> Result<NodeId, ParserError> {
        let identifier = match (event.kind, event.name.is_empty()) {
            (ConstructKind::Input, true) => "input".to_string(),
            (ConstructKind::Output, true) => "output".to_string(),
            (_, true) => {
                return Err(ParserError::malformed(
                    format!("{} is missing its identifier", event.kind),
                    event.location.clone(),
                ));
            }
            (_, false) => event.name.clone(),
        };

        let reference = match event.kind {
            ConstructKind::Uses => Some((ReferenceKind::Grouping, ReferenceTarget::Name(QName::parse(&event.name)))),
            ConstructKind::Augment | ConstructKind::Deviation => {
                let path = SchemaPath::parse(&event.name)
                    .map_err(|message| ParserError::malformed(message, event.location.clone()))?;
                let in_uses = self.stack.last().map(|frame| frame.kind) == Some(ConstructKind::Uses);
                if path.absolute == in_uses {
                    let expected = if in_uses { "a descendant" } else { "an absolute" };
                    return Err(ParserError::malformed(
                        format!("{} \"{}\" needs {} schema path", event.kind, event.name, expected),
                        event.location.clone(),
                    ));
                }
                let kind = if event.kind == ConstructKind::Augment {
                    ReferenceKind::AugmentTarget
                } else {
                    ReferenceKind::DeviationTarget
                };
                Some((kind, ReferenceTarget::Path(path)))
            }
            _ => None,
        };

        let mut parent = self.enclosing_node(event)?;
        let tree = self.tree_mut(event)?;
        let namespace = tree.module_name().to_string();

        if tree.node(parent).kind == ConstructKind::Choice && event.kind.is_shorthand_case_member() {
            let case = SchemaNode::new(ConstructKind::Case, identifier.clone(), namespace.clone(), event.location.clone());
            parent = tree.add_child(parent, case);
        }

        let mut node = SchemaNode::new(event.kind, identifier, namespace, event.location.clone());
        if let Some((kind, target)) = reference {
            node.add_reference(Resolvable::new(kind, target, NodeRef::new(tree.name.clone(), parent)));
        }
        if event.kind == ConstructKind::Deviation {
            tree.header.deviation_only = true;
        }
        Ok(tree.add_child(parent, node))
    }

    fn apply_statement(&mut self, event: &ParseEvent) -> Result<(), ParserError> {
        let holder = self.stack.last().map(|frame| frame.kind);
        match event.kind {
            ConstructKind::Type | ConstructKind::Base => self.attach_facet(event),
            ConstructKind::Import => {
                let tree = self.tree_mut(event)?;
                tree.header.imports.push(ModuleImport {
                    module: event.name.clone(),
                    prefix: None,
                    location: event.location.clone(),
                });
                Ok(())
            }
            ConstructKind::Include => {
                let tree = self.tree_mut(event)?;
                tree.header.includes.push(ModuleInclude {
                    submodule: event.name.clone(),
                    location: event.location.clone(),
                });
                Ok(())
            }
            ConstructKind::BelongsTo => {
                let tree = self.tree_mut(event)?;
                tree.header.belongs_to = Some(BelongsTo {
                    module: event.name.clone(),
                    prefix: None,
                });
                Ok(())
            }
            ConstructKind::Namespace => {
                let tree = self.tree_mut(event)?;
                tree.header.namespace = Some(event.name.clone());
                Ok(())
            }
            ConstructKind::Prefix => {
                let tree = self.tree_mut(event)?;
                let prefix = Some(event.name.clone());
                match holder {
                    Some(ConstructKind::Import) => {
                        if tree.header.import_for_prefix(&event.name).is_some() {
                            warn!(
                                "{}: import prefix '{}' is declared more than once",
                                event.location, event.name
                            );
                        }
                        if let Some(import) = tree.header.imports.last_mut() {
                            import.prefix = prefix;
                        }
                    }
                    Some(ConstructKind::BelongsTo) => {
                        if let Some(belongs_to) = tree.header.belongs_to.as_mut() {
                            belongs_to.prefix = prefix;
                        }
                    }
                    _ => tree.header.prefix = prefix,
                }
                Ok(())
            }
            _ => Err(ParserError::malformed(
                format!("{} is not handled by the tree builder", event.kind),
                event.location.clone(),
            )),
        }
    }

    /// `type` and `base` become facets of the nearest enclosing node
    fn attach_facet(&mut self, event: &ParseEvent) -> Result<(), ParserError> {
        let owner = self.enclosing_node(event)?;
        let tree = self.tree_mut(event)?;
        let scope = tree.parent(owner).unwrap_or(owner);
        let context = NodeRef::new(tree.name.clone(), scope);
        let name = QName::parse(&event.name);

        let node = tree.node_mut(owner);
        if event.kind == ConstructKind::Type {
            node.types.push(name.clone());
            if !is_builtin_type(&name) {
                node.add_reference(Resolvable::new(ReferenceKind::Typedef, ReferenceTarget::Name(name), context));
            }
        } else {
            node.add_reference(Resolvable::new(ReferenceKind::Identity, ReferenceTarget::Name(name), context));
        }
        Ok(())
    }

    /// Close the stream and return the finished tree
    pub fn finish(self) -> Result<SchemaTree, ParserError> {
        self.validator.validate_end(self.top(), &self.last_location)?;

        let Some(mut tree) = self.tree else {
            return Err(ParserError::malformed(
                "event stream contains no module or submodule",
                self.last_location,
            ));
        };

        if tree.is_submodule() && tree.header.belongs_to.is_none() {
            warn!("{}: submodule {} has no belongs-to statement", tree.file, tree.name);
        }

        // Submodule nodes live in the namespace of the module they belong to
        let namespace = tree.module_name().to_string();
        for node in tree.iter_mut() {
            node.namespace.clone_from(&namespace);
        }
        tree.translatable = true;
        Ok(tree)
    }
}

/// Build the schema tree of one file from its complete event stream
pub fn build_tree(file: &str, events: &[ParseEvent]) -> Result<SchemaTree, ParserError> {
    let mut builder = SchemaTreeBuilder::new(file);
    for event in events {
        builder.handle(event)?;
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventStreamBuilder;
    use crate::schema::ResolutionStatus;
    use crate::validator::ValidationErrorKind;

    #[test]
    fn test_builds_nested_nodes() {
        let mut b = EventStreamBuilder::new("m.yang");
        b.enter(ConstructKind::Module, "m")
            .statement(ConstructKind::Namespace, "urn:m")
            .statement(ConstructKind::Prefix, "m")
            .enter(ConstructKind::Container, "c")
            .enter(ConstructKind::Leaf, "x")
            .statement(ConstructKind::Type, "string")
            .exit()
            .exit()
            .exit();

        let tree = build_tree("m.yang", &b.finish()).unwrap();
        assert_eq!(tree.name, "m");
        assert_eq!(tree.header.prefix.as_deref(), Some("m"));
        assert_eq!(tree.header.namespace.as_deref(), Some("urn:m"));

        let x = tree.find_path("/c/x").unwrap();
        let leaf = tree.node(x);
        assert_eq!(leaf.kind, ConstructKind::Leaf);
        assert_eq!(leaf.types, vec![QName::parse("string")]);
        assert!(leaf.references.is_empty());
        assert_eq!(leaf.status, ResolutionStatus::Resolved);
        assert_eq!(leaf.location, SourceLocation::new("m.yang", 5, 5));
        assert!(tree.translatable);
    }

    #[test]
    fn test_derived_type_and_uses_are_unresolved() {
        let mut b = EventStreamBuilder::new("m.yang");
        b.enter(ConstructKind::Module, "m")
            .enter(ConstructKind::Container, "c")
            .statement(ConstructKind::Uses, "g")
            .enter(ConstructKind::Leaf, "port")
            .statement(ConstructKind::Type, "inet:port-number")
            .exit()
            .exit()
            .exit();

        let tree = build_tree("m.yang", &b.finish()).unwrap();
        let c = tree.find_path("/c").unwrap();
        let uses = tree.find_child(c, ConstructKind::Uses, "g").unwrap();
        let reference = &tree.node(uses).references[0];
        assert_eq!(reference.kind, ReferenceKind::Grouping);
        assert_eq!(reference.context, NodeRef::new("m", c));
        assert_eq!(tree.node(uses).status, ResolutionStatus::Unresolved);

        let port = tree.find_path("/c/port").unwrap();
        let reference = &tree.node(port).references[0];
        assert_eq!(reference.kind, ReferenceKind::Typedef);
        assert_eq!(reference.name(), Some(&QName::new(Some("inet"), "port-number")));
    }

    #[test]
    fn test_shorthand_case_is_wrapped() {
        let mut b = EventStreamBuilder::new("m.yang");
        b.enter(ConstructKind::Module, "m")
            .enter(ConstructKind::Choice, "transport")
            .enter(ConstructKind::Leaf, "tcp")
            .statement(ConstructKind::Type, "empty")
            .exit()
            .enter(ConstructKind::Case, "udp")
            .statement(ConstructKind::Leaf, "udp-port")
            .exit()
            .exit()
            .exit();

        let tree = build_tree("m.yang", &b.finish()).unwrap();
        let choice = tree.find_path("/transport").unwrap();
        let cases: Vec<_> = tree.children(choice).iter().map(|c| tree.node(*c).kind).collect();
        assert_eq!(cases, vec![ConstructKind::Case, ConstructKind::Case]);
        assert!(tree.find_path("/transport/tcp/tcp").is_some());
        assert!(tree.find_path("/transport/udp/udp-port").is_some());
    }

    #[test]
    fn test_rpc_input_output_identifiers() {
        let mut b = EventStreamBuilder::new("m.yang");
        b.enter(ConstructKind::Module, "m")
            .enter(ConstructKind::Rpc, "reset")
            .enter(ConstructKind::Input, "")
            .statement(ConstructKind::Leaf, "delay")
            .exit()
            .statement(ConstructKind::Output, "")
            .exit()
            .exit();

        let tree = build_tree("m.yang", &b.finish()).unwrap();
        assert!(tree.find_path("/reset/input/delay").is_some());
        assert!(tree.find_path("/reset/output").is_some());
    }

    #[test]
    fn test_identity_base_and_identityref() {
        let mut b = EventStreamBuilder::new("m.yang");
        b.enter(ConstructKind::Module, "m")
            .statement(ConstructKind::Identity, "crypto")
            .enter(ConstructKind::Identity, "aes")
            .statement(ConstructKind::Base, "crypto")
            .exit()
            .enter(ConstructKind::Leaf, "alg")
            .enter(ConstructKind::Type, "identityref")
            .statement(ConstructKind::Base, "crypto")
            .exit()
            .exit()
            .exit();

        let tree = build_tree("m.yang", &b.finish()).unwrap();
        let root = tree.root();
        let aes = tree.find_child(root, ConstructKind::Identity, "aes").unwrap();
        assert_eq!(tree.node(aes).references[0].kind, ReferenceKind::Identity);

        let alg = tree.find_child(root, ConstructKind::Leaf, "alg").unwrap();
        let kinds: Vec<_> = tree.node(alg).references.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![ReferenceKind::Identity]);
        assert_eq!(tree.node(alg).types, vec![QName::parse("identityref")]);
    }

    #[test]
    fn test_submodule_header_and_namespace() {
        let mut b = EventStreamBuilder::new("sub.yang");
        b.enter(ConstructKind::Submodule, "sub")
            .enter(ConstructKind::BelongsTo, "main")
            .statement(ConstructKind::Prefix, "mn")
            .exit()
            .enter(ConstructKind::Import, "types")
            .statement(ConstructKind::Prefix, "t")
            .exit()
            .statement(ConstructKind::Container, "box")
            .exit();

        let tree = build_tree("sub.yang", &b.finish()).unwrap();
        assert!(tree.is_submodule());
        assert_eq!(tree.module_name(), "main");
        assert_eq!(tree.header.own_prefix(), Some("mn"));
        assert_eq!(tree.module_for_prefix(Some("t")), Some("types"));
        assert_eq!(tree.root_node().namespace, "main");
        let boxed = tree.find_path("/box").unwrap();
        assert_eq!(tree.node(boxed).namespace, "main");
    }

    #[test]
    fn test_deviation_sets_flag() {
        let mut b = EventStreamBuilder::new("dev.yang");
        b.enter(ConstructKind::Module, "dev")
            .statement(ConstructKind::Deviation, "/base:system/base:ntp")
            .exit();

        let tree = build_tree("dev.yang", &b.finish()).unwrap();
        assert!(tree.header.deviation_only);
        let deviation = tree.children(tree.root())[0];
        assert_eq!(tree.node(deviation).references[0].kind, ReferenceKind::DeviationTarget);
    }

    #[test]
    fn test_leaf_cannot_hold_children() {
        let mut b = EventStreamBuilder::new("m.yang");
        b.enter(ConstructKind::Module, "m")
            .enter(ConstructKind::Leaf, "x")
            .statement(ConstructKind::Container, "c")
            .exit()
            .exit();

        let err = build_tree("m.yang", &b.finish()).unwrap_err();
        match err {
            ParserError::Construct(err) => {
                assert_eq!(err.kind, ValidationErrorKind::InvalidHolder);
                assert_eq!(err.location, SourceLocation::new("m.yang", 3, 5));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unterminated_stream() {
        let mut b = EventStreamBuilder::new("m.yang");
        b.enter(ConstructKind::Module, "m").enter(ConstructKind::Grouping, "g");

        let err = build_tree("m.yang", &b.finish()).unwrap_err();
        match err {
            ParserError::Construct(err) => assert_eq!(err.kind, ValidationErrorKind::UnhandledParsedData),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_second_root_is_rejected() {
        let mut b = EventStreamBuilder::new("m.yang");
        b.statement(ConstructKind::Module, "a").statement(ConstructKind::Module, "b");

        let err = build_tree("m.yang", &b.finish()).unwrap_err();
        assert!(matches!(err, ParserError::Malformed { .. }));
        assert_eq!(err.location().line, 2);
    }

    #[test]
    fn test_empty_stream() {
        let err = build_tree("empty.yang", &[]).unwrap_err();
        assert!(err.to_string().contains("no module or submodule"));
    }

    #[test]
    fn test_augment_with_bad_path() {
        let mut b = EventStreamBuilder::new("m.yang");
        b.enter(ConstructKind::Module, "m").statement(ConstructKind::Augment, "/a//b").exit();
        let err = build_tree("m.yang", &b.finish()).unwrap_err();
        assert!(matches!(err, ParserError::Malformed { .. }));
    }

    #[test]
    fn test_augment_inside_uses_takes_descendant_path() {
        let mut b = EventStreamBuilder::new("m.yang");
        b.enter(ConstructKind::Module, "m")
            .enter(ConstructKind::Container, "top")
            .enter(ConstructKind::Uses, "g")
            .enter(ConstructKind::Augment, "inner")
            .statement(ConstructKind::Leaf, "extra")
            .exit()
            .exit()
            .exit()
            .exit();
        let tree = build_tree("m.yang", &b.finish()).unwrap();

        let top = tree.find_path("/top").unwrap();
        let uses = tree.children(top)[0];
        let augment = tree.children(uses)[0];
        assert_eq!(tree.node(augment).kind, ConstructKind::Augment);
        assert!(!tree.node(augment).references[0].path().unwrap().absolute);
        assert_eq!(tree.children(augment).len(), 1);

        let mut b = EventStreamBuilder::new("m.yang");
        b.enter(ConstructKind::Module, "m")
            .enter(ConstructKind::Container, "top")
            .enter(ConstructKind::Uses, "g")
            .statement(ConstructKind::Augment, "/top/inner")
            .exit()
            .exit()
            .exit();
        let err = build_tree("m.yang", &b.finish()).unwrap_err();
        assert!(err.to_string().contains("needs a descendant schema path"));
    }

    #[test]
    fn test_top_level_augment_needs_absolute_path() {
        let mut b = EventStreamBuilder::new("m.yang");
        b.enter(ConstructKind::Module, "m").statement(ConstructKind::Augment, "top/inner").exit();
        let err = build_tree("m.yang", &b.finish()).unwrap_err();
        assert!(err.to_string().contains("needs an absolute schema path"));
    }
}
