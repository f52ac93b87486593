//! Fixed message templates for construct validation failures

use crate::construct::ConstructKind;
use crate::event::Phase;
use serde::{Deserialize, Serialize};

const PARSER_ERROR_PREFIX: &str = "Internal parser error detected: ";

/// Category of a construct nesting violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValidationErrorKind {
    /// The enclosing construct may not hold this construct
    InvalidHolder,
    /// The construct requires an enclosing construct but none is open
    MissingHolder,
    /// Constructs are still open where none may be
    UnhandledParsedData,
}

impl ValidationErrorKind {
    fn template(&self) -> &'static str {
        match self {
            ValidationErrorKind::InvalidHolder => "Invalid holder for",
            ValidationErrorKind::MissingHolder => "Missing holder at",
            ValidationErrorKind::UnhandledParsedData => "Unhandled parsed data at",
        }
    }
}

/// Build the message for a validation failure.
///
/// `<prefix><template> <construct>[ "<name>"] <phase>.` followed by the
/// extended text on a second line when present.
pub fn validation_message(
    kind: ValidationErrorKind,
    construct: ConstructKind,
    name: &str,
    phase: Phase,
    extended: Option<&str>,
) -> String {
    let mut message = format!("{}{} {}", PARSER_ERROR_PREFIX, kind.template(), construct.as_str());
    if !name.is_empty() {
        message.push_str(&format!(" \"{}\"", name));
    }
    message.push(' ');
    message.push_str(phase.as_str());
    message.push('.');

    if let Some(extended) = extended.filter(|text| !text.is_empty()) {
        message.push('\n');
        message.push_str(extended);
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_holder_message() {
        let message = validation_message(
            ValidationErrorKind::InvalidHolder,
            ConstructKind::Case,
            "ethernet",
            Phase::Entry,
            None,
        );
        assert_eq!(
            message,
            "Internal parser error detected: Invalid holder for case \"ethernet\" before processing."
        );
    }

    #[test]
    fn test_unnamed_construct_with_extended_text() {
        let message = validation_message(
            ValidationErrorKind::MissingHolder,
            ConstructKind::Input,
            "",
            Phase::Exit,
            Some("no rpc is open"),
        );
        assert_eq!(
            message,
            "Internal parser error detected: Missing holder at input after processing.\nno rpc is open"
        );
    }
}
