//! Construct Validator - Guards tree construction while parse events arrive
//!
//! The validator inspects the stack of currently open constructs before the
//! builder acts on an event:
//! 1. A root (module/submodule) may only be entered on an empty stack
//! 2. Any other construct needs an open holder (`check_stack_is_not_empty`)
//!    of a kind allowed to enclose it (`check_holder`)
//! 3. An exit must close the innermost open construct
//! 4. At end of input nothing may remain open (`check_stack_is_empty`)
//!
//! It never mutates anything; it only raises or does not raise.

pub mod message;

pub use message::{ValidationErrorKind, validation_message};

use crate::construct::ConstructKind;
use crate::event::{ParseEvent, Phase};
use crate::location::SourceLocation;

/// A construct nesting violation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ConstructValidationError {
    pub kind: ValidationErrorKind,
    pub construct: ConstructKind,
    pub name: String,
    pub phase: Phase,
    pub location: SourceLocation,
    pub message: String,
}

impl ConstructValidationError {
    fn new(kind: ValidationErrorKind, event: &ParseEvent, extended: Option<&str>) -> Self {
        Self {
            kind,
            construct: event.kind,
            name: event.name.clone(),
            phase: event.phase,
            location: event.location.clone(),
            message: validation_message(kind, event.kind, &event.name, event.phase, extended),
        }
    }
}

/// View of an open construct as seen by the validator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenConstruct<'a> {
    pub kind: ConstructKind,
    pub name: &'a str,
}

/// Require at least one open construct, returning the innermost one
pub fn check_stack_is_not_empty<'a>(
    top: Option<OpenConstruct<'a>>,
    event: &ParseEvent,
) -> Result<OpenConstruct<'a>, ConstructValidationError> {
    top.ok_or_else(|| {
        let extended = match event.phase {
            Phase::Entry => format!("{} must be declared inside another construct", event.kind),
            Phase::Exit => format!("no open construct to close for {}", event.kind),
        };
        ConstructValidationError::new(ValidationErrorKind::MissingHolder, event, Some(&extended))
    })
}

/// Require the innermost open construct to be a legal holder for the event
pub fn check_holder(holder: OpenConstruct<'_>, event: &ParseEvent) -> Result<(), ConstructValidationError> {
    if event.kind.may_be_held_by(holder.kind) {
        return Ok(());
    }
    let extended = format!("{} cannot be declared inside {}", event.kind, holder.kind);
    Err(ConstructValidationError::new(
        ValidationErrorKind::InvalidHolder,
        event,
        Some(&extended),
    ))
}

/// Require that no construct is open
pub fn check_stack_is_empty(
    top: Option<OpenConstruct<'_>>,
    event: &ParseEvent,
) -> Result<(), ConstructValidationError> {
    match top {
        None => Ok(()),
        Some(open) => {
            let extended = if open.name.is_empty() {
                format!("{} is still open", open.kind)
            } else {
                format!("{} \"{}\" is still open", open.kind, open.name)
            };
            Err(ConstructValidationError::new(
                ValidationErrorKind::UnhandledParsedData,
                event,
                Some(&extended),
            ))
        }
    }
}

/// Stateless nesting validator applied to every event before tree construction
#[derive(Debug, Default, Clone, Copy)]
pub struct ConstructValidator;

impl ConstructValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate an event against the innermost open construct
    pub fn validate(&self, top: Option<OpenConstruct<'_>>, event: &ParseEvent) -> Result<(), ConstructValidationError> {
        match event.phase {
            Phase::Entry => self.validate_entry(top, event),
            Phase::Exit => self.validate_exit(top, event),
        }
    }

    fn validate_entry(&self, top: Option<OpenConstruct<'_>>, event: &ParseEvent) -> Result<(), ConstructValidationError> {
        if event.kind.is_root() {
            return check_stack_is_empty(top, event);
        }
        let holder = check_stack_is_not_empty(top, event)?;
        check_holder(holder, event)
    }

    fn validate_exit(&self, top: Option<OpenConstruct<'_>>, event: &ParseEvent) -> Result<(), ConstructValidationError> {
        let open = check_stack_is_not_empty(top, event)?;
        let name_matches = event.name.is_empty() || event.name == open.name;
        if open.kind == event.kind && name_matches {
            return Ok(());
        }
        let extended = if open.name.is_empty() {
            format!("expected the end of {}", open.kind)
        } else {
            format!("expected the end of {} \"{}\"", open.kind, open.name)
        };
        Err(ConstructValidationError::new(
            ValidationErrorKind::InvalidHolder,
            event,
            Some(&extended),
        ))
    }

    /// Validate end of input: every construct must have been closed
    pub fn validate_end(&self, top: Option<OpenConstruct<'_>>, top_location: &SourceLocation) -> Result<(), ConstructValidationError> {
        match top {
            None => Ok(()),
            Some(open) => {
                let event = ParseEvent::exit(open.kind, open.name, top_location.clone());
                check_stack_is_empty(Some(open), &event)
            }
        }
    }
}
