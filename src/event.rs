//! Parse events - The interface between a grammar front-end and the compiler
//!
//! A front-end reports each construct twice: once on entry (before its
//! substatements are processed) and once on exit (after them). The event
//! stream for a file is expected to be well nested; the construct validator
//! reports where it is not.

use crate::construct::ConstructKind;
use crate::location::SourceLocation;
use serde::{Deserialize, Serialize};

/// Whether a construct is being entered or exited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Entry,
    Exit,
}

impl Phase {
    /// Diagnostic wording for the phase
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Entry => "before processing",
            Phase::Exit => "after processing",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single construct entry or exit reported by the front-end
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseEvent {
    /// Kind of the construct
    pub kind: ConstructKind,
    /// Entry or exit
    pub phase: Phase,
    /// Argument of the statement (identifier, type name, target path...)
    pub name: String,
    /// Where the construct starts
    pub location: SourceLocation,
}

impl ParseEvent {
    pub fn entry(kind: ConstructKind, name: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            kind,
            phase: Phase::Entry,
            name: name.into(),
            location,
        }
    }

    pub fn exit(kind: ConstructKind, name: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            kind,
            phase: Phase::Exit,
            name: name.into(),
            location,
        }
    }
}

/// Builds well-nested event streams programmatically.
///
/// Every call occupies one source line, and the column follows the nesting
/// depth, so locations in the produced stream look like those of an
/// indented source file.
#[derive(Debug)]
pub struct EventStreamBuilder {
    file: String,
    line: u32,
    open: Vec<(ConstructKind, String)>,
    events: Vec<ParseEvent>,
}

impl EventStreamBuilder {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line: 0,
            open: Vec::new(),
            events: Vec::new(),
        }
    }

    fn next_location(&mut self) -> SourceLocation {
        self.line += 1;
        let column = self.open.len() as u32 * 2 + 1;
        SourceLocation::new(&self.file, self.line, column)
    }

    /// Open a construct; it stays open until the matching `exit`
    pub fn enter(&mut self, kind: ConstructKind, name: &str) -> &mut Self {
        let location = self.next_location();
        self.events.push(ParseEvent::entry(kind, name, location));
        self.open.push((kind, name.to_string()));
        self
    }

    /// Close the innermost open construct
    pub fn exit(&mut self) -> &mut Self {
        if let Some((kind, name)) = self.open.pop() {
            let location = self.next_location();
            self.events.push(ParseEvent::exit(kind, name, location));
        }
        self
    }

    /// Open and immediately close a construct on one line
    pub fn statement(&mut self, kind: ConstructKind, name: &str) -> &mut Self {
        let location = self.next_location();
        self.events.push(ParseEvent::entry(kind, name, location.clone()));
        self.events.push(ParseEvent::exit(kind, name, location));
        self
    }

    /// Append an arbitrary event, bypassing nesting bookkeeping
    pub fn raw(&mut self, kind: ConstructKind, phase: Phase, name: &str) -> &mut Self {
        let location = self.next_location();
        self.events.push(ParseEvent {
            kind,
            phase,
            name: name.to_string(),
            location,
        });
        self
    }

    /// Location the next call would be assigned
    pub fn peek_location(&self) -> SourceLocation {
        let column = self.open.len() as u32 * 2 + 1;
        SourceLocation::new(&self.file, self.line + 1, column)
    }

    /// File name events are attributed to
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Return the recorded events; constructs still open stay unterminated
    pub fn finish(&mut self) -> Vec<ParseEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_nesting() {
        let mut b = EventStreamBuilder::new("m.yang");
        b.enter(ConstructKind::Module, "m")
            .statement(ConstructKind::Leaf, "x")
            .exit();
        let events = b.finish();

        assert_eq!(events.len(), 4);
        assert_eq!(events[0].phase, Phase::Entry);
        assert_eq!(events[1].kind, ConstructKind::Leaf);
        assert_eq!(events[1].location, SourceLocation::new("m.yang", 2, 3));
        assert_eq!(events[3].phase, Phase::Exit);
        assert_eq!(events[3].kind, ConstructKind::Module);
        assert_eq!(events[3].name, "m");
    }

    #[test]
    fn test_event_json_shape() {
        let event = ParseEvent::entry(ConstructKind::LeafList, "addr", SourceLocation::new("a.yang", 4, 7));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "leaf-list");
        assert_eq!(json["phase"], "entry");
        assert_eq!(json["location"], "a.yang:4:7");
    }

    #[test]
    fn test_phase_wording() {
        assert_eq!(Phase::Entry.as_str(), "before processing");
        assert_eq!(Phase::Exit.as_str(), "after processing");
    }
}
