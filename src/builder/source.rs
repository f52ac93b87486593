//! Event sources
//!
//! A source turns a file on disk into the parse events of that file. The
//! compiler core never tokenizes YANG itself; grammar front-ends plug in
//! here.

use super::ParserError;
use crate::Result;
use crate::construct::ConstructKind;
use crate::error::ToolError;
use crate::event::{ParseEvent, Phase};
use crate::location::SourceLocation;
use serde::Deserialize;
use std::path::Path;

/// Parse events of one source file
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path used in locations and diagnostics
    pub path: String,
    pub events: Vec<ParseEvent>,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, events: Vec<ParseEvent>) -> Self {
        Self {
            path: path.into(),
            events,
        }
    }
}

/// Trait for event front-ends
pub trait EventSource: Send + Sync {
    /// Format name (for display)
    fn format_name(&self) -> &str;

    /// File extensions this source handles
    fn file_extensions(&self) -> &[&str];

    /// Check if this source can handle a file
    fn can_handle(&self, path: &Path) -> bool {
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            self.file_extensions().contains(&ext)
        } else {
            false
        }
    }

    /// Produce the event stream of a file
    fn read_events(&self, path: &str, content: &str) -> Result<Vec<ParseEvent>>;
}

/// One record of a `.yevents` file
#[derive(Debug, Deserialize)]
struct EventRecord {
    kind: ConstructKind,
    phase: Phase,
    #[serde(default)]
    name: String,
    line: u32,
    #[serde(default = "first_column")]
    column: u32,
}

fn first_column() -> u32 {
    1
}

/// Reads pre-tokenized event streams stored as a JSON array
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonEventSource;

impl JsonEventSource {
    pub fn new() -> Self {
        Self
    }
}

impl EventSource for JsonEventSource {
    fn format_name(&self) -> &str {
        "yang-events"
    }

    fn file_extensions(&self) -> &[&str] {
        &["yevents"]
    }

    fn read_events(&self, path: &str, content: &str) -> Result<Vec<ParseEvent>> {
        let records: Vec<EventRecord> = serde_json::from_str(content).map_err(|e| {
            ParserError::malformed(
                format!("unreadable event stream: {}", e),
                SourceLocation::new(path, e.line() as u32, e.column() as u32),
            )
        })?;

        Ok(records
            .into_iter()
            .map(|record| ParseEvent {
                kind: record.kind,
                phase: record.phase,
                name: record.name,
                location: SourceLocation::new(path, record.line, record.column),
            })
            .collect())
    }
}

/// Registry of event sources
#[derive(Default)]
pub struct SourceRegistry {
    sources: Vec<Box<dyn EventSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, source: impl EventSource + 'static) {
        self.sources.push(Box::new(source));
    }

    /// Find a source for a file
    pub fn find_source(&self, path: &Path) -> Option<&dyn EventSource> {
        self.sources
            .iter()
            .find(|s| s.can_handle(path))
            .map(|s| s.as_ref())
    }

    pub fn sources(&self) -> &[Box<dyn EventSource>] {
        &self.sources
    }

    /// Extensions handled by any registered source
    pub fn extensions(&self) -> Vec<&str> {
        self.sources
            .iter()
            .flat_map(|s| s.file_extensions().iter().copied())
            .collect()
    }

    /// Read a file through the matching source; `None` if no source handles it
    pub fn read_file(&self, path: &Path) -> Result<Option<SourceFile>> {
        let Some(source) = self.find_source(path) else {
            return Ok(None);
        };
        let content = std::fs::read_to_string(path).map_err(|e| ToolError::io(path, e))?;
        let display = path.to_string_lossy();
        let events = source.read_events(&display, &content)?;
        Ok(Some(SourceFile::new(display, events)))
    }
}

/// Create a registry with the built-in sources
pub fn default_registry() -> SourceRegistry {
    let mut registry = SourceRegistry::new();
    registry.register(JsonEventSource::new());
    registry
}
