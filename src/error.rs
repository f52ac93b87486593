//! Tool-level errors and machine-readable diagnostics

use crate::location::SourceLocation;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Failures of the tooling around the compiler core (files, artifacts, settings)
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid artifact {}: {message}", path.display())]
    InvalidArtifact { path: PathBuf, message: String },

    #[error("No event source handles {}", path.display())]
    UnsupportedInput { path: PathBuf },
}

impl ToolError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ToolError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_artifact(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ToolError::InvalidArtifact {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// An error flattened for JSON output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>, location: Option<&SourceLocation>) -> Self {
        let location = location.filter(|l| l.is_known());
        Self {
            message: message.into(),
            file: location.map(|l| l.file.clone()),
            line: location.map(|l| l.line),
            column: location.map(|l| l.column),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_json() {
        let location = SourceLocation::new("a.yang", 7, 3);
        let diagnostic = Diagnostic::new("boom", Some(&location));
        let json = serde_json::to_value(&diagnostic).unwrap();
        assert_eq!(json["file"], "a.yang");
        assert_eq!(json["line"], 7);

        let bare = Diagnostic::new("boom", Some(&SourceLocation::unknown("a.yang")));
        let json = serde_json::to_value(&bare).unwrap();
        assert!(json.get("file").is_none());
    }
}
