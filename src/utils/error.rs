//! Error types for the Brio frontend and runtime
//!
//! Static type diagnostics are not errors in the `Err` sense: the checker
//! collects them as values and keeps going (see `frontend::diagnostics`).
//! The enums here are the fatal regimes: a parse failure stops translation,
//! a runtime failure unwinds the current evaluation.

use crate::utils::Loc;
use thiserror::Error;

/// Result type alias for parsing
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// A fatal error while turning source text into an AST
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unexpected token at {loc}: expected {expected}, got {got}")]
    UnexpectedToken {
        expected: String,
        got: String,
        loc: Loc,
    },

    #[error("Unexpected character '{0}' at {1}")]
    UnexpectedChar(char, Loc),

    #[error("Unterminated string literal at {0}")]
    UnterminatedString(Loc),

    #[error("Integer literal {0} out of range at {1}")]
    IntegerOutOfRange(String, Loc),

    #[error("Unexpected end of input")]
    UnexpectedEof,
}

/// A fatal error raised during evaluation.
///
/// `Internal` marks invariant violations in the checker/evaluator pair
/// (for example a call site the checker left unresolved, or an overload
/// set with zero or several applicable variants after checking passed).
/// It is never a user-facing diagnostic.
#[derive(Error, Debug, Clone)]
pub enum RuntimeError {
    #[error("Unknown identifier: {0}")]
    UnknownIdentifier(String),

    #[error("Expected {expected} value, got {got}")]
    ValueKind { expected: &'static str, got: String },

    #[error("No field {field} on {type_name}")]
    MissingField { field: String, type_name: String },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Integer overflow")]
    IntegerOverflow,

    #[error("IO error: {0}")]
    Io(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
