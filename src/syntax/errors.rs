use super::tokenizer::{Location, Token};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("{kind} at {location}")]
pub struct ParseError {
    pub location: Location,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn syntax_error<S: Into<String>>(location: Location, message: S) -> Self {
        Self {
            location,
            kind: ParseErrorKind::SyntaxError(message.into()),
        }
    }

    pub fn mismatch_token<S: AsRef<str>>(token: &Token, expected: S) -> Self {
        Self::syntax_error(
            token.loc,
            format!("Expected {}, but found {}", expected.as_ref(), token.kind),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    SyntaxError(String),
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::SyntaxError(message) => write!(f, "Syntax error: {}", message),
        }
    }
}
