//! Source Location - Position of a construct inside a schema source file
//!
//! Format: `<file>:<line>:<column>`
//!
//! Examples:
//! - `models/interfaces.yang:42:5`
//! - `ietf-ip.yevents:7:1`

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

/// Position of a construct in its source file.
///
/// Every diagnostic raised by the compiler carries one of these when the
/// failing construct has a position. Lines and columns are 1-indexed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceLocation {
    /// Source file path as given to the compiler
    pub file: String,
    /// Line number (1-indexed)
    pub line: u32,
    /// Column number (1-indexed)
    pub column: u32,
}

impl SourceLocation {
    /// Create a new location
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    /// Location for constructs synthesized without a source position
    pub fn unknown(file: impl Into<String>) -> Self {
        Self::new(file, 0, 0)
    }

    /// Whether this location points at a real position
    pub fn is_known(&self) -> bool {
        self.line > 0
    }

    /// Parse a location string
    ///
    /// Expected format: `<file>:<line>:<column>`. The file part may itself
    /// contain colons (e.g. Windows drive letters), so the string is split
    /// from the right.
    pub fn parse(location: &str) -> Result<Self, String> {
        let (rest, column) = location
            .rsplit_once(':')
            .ok_or_else(|| format!("location must be <file>:<line>:<column>, got '{}'", location))?;
        let (file, line) = rest
            .rsplit_once(':')
            .ok_or_else(|| format!("location must be <file>:<line>:<column>, got '{}'", location))?;

        if file.is_empty() {
            return Err(format!("location has an empty file part: '{}'", location));
        }

        let line: u32 = line
            .parse()
            .map_err(|_| format!("invalid line number: {}", line))?;
        let column: u32 = column
            .parse()
            .map_err(|_| format!("invalid column number: {}", column))?;

        Ok(Self::new(file, line, column))
    }

    /// Convert to the canonical location string
    pub fn to_location_string(&self) -> String {
        format!("{}:{}:{}", self.file, self.line, self.column)
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_location_string())
    }
}

impl FromStr for SourceLocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for SourceLocation {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_location_string())
    }
}

impl<'de> Deserialize<'de> for SourceLocation {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        SourceLocation::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_string() {
        let location = SourceLocation::new("models/if.yang", 42, 5);
        assert_eq!(location.to_location_string(), "models/if.yang:42:5");
        assert_eq!(SourceLocation::parse("models/if.yang:42:5").unwrap(), location);
    }

    #[test]
    fn test_location_with_colon_in_file() {
        let location = SourceLocation::parse("C:\\schemas\\a.yang:3:9").unwrap();
        assert_eq!(location.file, "C:\\schemas\\a.yang");
        assert_eq!(location.line, 3);
        assert_eq!(location.column, 9);
    }

    #[test]
    fn test_invalid_location() {
        assert!(SourceLocation::parse("a.yang").is_err());
        assert!(SourceLocation::parse("a.yang:x:1").is_err());
        assert!(SourceLocation::parse(":1:1").is_err());
    }

    #[test]
    fn test_location_serde_as_string() {
        let location = SourceLocation::new("m.yang", 3, 1);
        let json = serde_json::to_string(&location).unwrap();
        assert_eq!(json, "\"m.yang:3:1\"");
        let back: SourceLocation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, location);
    }
}
