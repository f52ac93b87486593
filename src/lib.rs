//! # Yangc - YANG schema compiler core
//!
//! Turns the parse events of a set of YANG files into one linked, validated
//! schema graph per module and freezes it into a persisted artifact.
//!
//! Yangc provides:
//! - Construct validation of the event stream and per-file tree building
//! - Two-pass reference resolution with `uses` expansion and cycle detection
//! - Augment merging and deviation binding across modules
//! - Sibling identifier collision checks per namespace family
//! - A digest-checked artifact format with atomic publication

pub mod location;
pub mod construct;
pub mod event;
pub mod validator;
pub mod schema;
pub mod builder;
pub mod linker;
pub mod collision;
pub mod serializer;
pub mod compiler;
pub mod config;
pub mod sources;
pub mod error;
pub mod ui;

// Re-exports for convenient access
pub use builder::{ParserError, SchemaTreeBuilder, SourceFile, build_tree};
pub use collision::{CollisionDetector, CollisionError};
pub use compiler::{CompilationUnit, CompiledUnit, Compiler};
pub use construct::ConstructKind;
pub use error::{Diagnostic, ToolError};
pub use linker::{LinkReport, Linker, LinkerError, SymbolUniverse};
pub use location::SourceLocation;
pub use schema::{SchemaNode, SchemaTree};
pub use serializer::SchemaSerializer;
pub use validator::{ConstructValidationError, ConstructValidator};

/// Result type alias for Yangc operations
pub type Result<T> = std::result::Result<T, Error>;

/// Any failure that aborts a compilation batch
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ConstructValidationError),

    #[error(transparent)]
    Parser(#[from] ParserError),

    #[error(transparent)]
    Linker(#[from] LinkerError),

    #[error(transparent)]
    Collision(#[from] CollisionError),

    #[error(transparent)]
    Tool(#[from] ToolError),
}

impl Error {
    /// Source position of the failure; tool errors have none
    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            Error::Validation(e) => Some(&e.location),
            Error::Parser(e) => Some(e.location()),
            Error::Linker(e) => Some(e.location()),
            Error::Collision(e) => Some(&e.location),
            Error::Tool(_) => None,
        }
    }

    /// Whether the schema itself is at fault, as opposed to the tooling
    pub fn is_schema_error(&self) -> bool {
        !matches!(self, Error::Tool(_))
    }

    pub fn diagnostic(&self) -> Diagnostic {
        Diagnostic::new(self.to_string(), self.location())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_from_linker_error() {
        let err = Error::from(LinkerError::MissingAugmentTarget {
            path: "/x:a".to_string(),
            location: SourceLocation::new("m.yang", 3, 5),
        });
        assert!(err.is_schema_error());

        let diagnostic = err.diagnostic();
        assert_eq!(diagnostic.file.as_deref(), Some("m.yang"));
        assert_eq!(diagnostic.line, Some(3));
        assert_eq!(diagnostic.column, Some(5));
        assert!(diagnostic.message.starts_with("YANG file error:"));
    }

    #[test]
    fn test_tool_error_has_no_location() {
        let err = Error::from(ToolError::MissingConfiguration("output_dir".to_string()));
        assert!(!err.is_schema_error());
        assert!(err.location().is_none());
        assert!(err.diagnostic().file.is_none());
    }
}
