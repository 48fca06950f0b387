use crate::syntax::Location;
use std::fmt;
use thiserror::Error;

/// A diagnostic for the first semantic violation found. Analysis does not
/// recover; one error is all a run ever produces.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("{kind} at {location}")]
pub struct SemanticError {
    pub location: Location,
    pub kind: SemanticErrorKind,
}

impl SemanticError {
    pub fn new(location: Location, kind: SemanticErrorKind) -> Self {
        Self { location, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemanticErrorKind {
    /// A name not bound in the relevant environment at its use site.
    UndefinedSymbol(String),
    /// A name resolved to the wrong category of thing, or an expression
    /// of the wrong shape was used where a record, array, or function
    /// was required.
    KindMismatch {
        expected: String,
        found: String,
    },
    /// Operand, argument, initializer, or branch type incompatible with
    /// what the context requires; also wrong arity and wrong field counts.
    TypeMismatch {
        expected: String,
        found: String,
    },
    /// A repeated name in a record type, a parameter list, or a mutually
    /// recursive declaration group.
    DuplicateName(String),
    /// A second binding for a name already bound in the current scope.
    Redeclaration(String),
    /// `var x := nil` without an explicit type annotation.
    MissingAnnotation(String),
    /// The source of an assignment produces no value.
    UnitAssignment,
    BreakOutsideLoop,
    /// A type name whose definition is missing or never reaches a
    /// concrete type.
    IncompleteType(String),
    /// An invariant violation inside the analyzer. Not a program error.
    Internal(String),
}

impl fmt::Display for SemanticErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemanticErrorKind::UndefinedSymbol(name) => {
                write!(f, "Undefined symbol '{}'", name)
            }
            SemanticErrorKind::KindMismatch { expected, found } => {
                write!(f, "Expected {}, but found {}", expected, found)
            }
            SemanticErrorKind::TypeMismatch { expected, found } => {
                write!(f, "Mismatched types: expected {}, found {}", expected, found)
            }
            SemanticErrorKind::DuplicateName(name) => {
                write!(f, "Duplicate name '{}'", name)
            }
            SemanticErrorKind::Redeclaration(name) => {
                write!(f, "'{}' is already declared in this scope", name)
            }
            SemanticErrorKind::MissingAnnotation(name) => {
                write!(
                    f,
                    "Cannot infer a type for '{}' from nil, a type annotation is required",
                    name
                )
            }
            SemanticErrorKind::UnitAssignment => {
                write!(f, "Expression produces no value")
            }
            SemanticErrorKind::BreakOutsideLoop => {
                write!(f, "break is outside of any enclosing loop")
            }
            SemanticErrorKind::IncompleteType(name) => {
                write!(f, "Incomplete type '{}'", name)
            }
            SemanticErrorKind::Internal(message) => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}
