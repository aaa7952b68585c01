//! Static diagnostics
//!
//! Non-fatal, batched findings produced by the type checker. Checking
//! continues past each of these with a `Nothing` fallback so later
//! findings stay meaningful.

use crate::types::Type;
use crate::utils::Loc;
use serde::Serialize;
use std::fmt;

/// One finding from the type checker
#[derive(Debug, Clone, PartialEq)]
pub enum TypeError {
    IncompatibleType { expected: Type, actual: Type, loc: Loc },
    UnknownIdentifier { name: String, loc: Loc },
    UndeclaredType { name: String, loc: Loc },
    UndeclaredField { field: String, on: Type, loc: Loc },
    UninitializedField { field: String, on: Type, loc: Loc },
}

impl TypeError {
    pub fn loc(&self) -> Loc {
        match self {
            TypeError::IncompatibleType { loc, .. }
            | TypeError::UnknownIdentifier { loc, .. }
            | TypeError::UndeclaredType { loc, .. }
            | TypeError::UndeclaredField { loc, .. }
            | TypeError::UninitializedField { loc, .. } => *loc,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            TypeError::IncompatibleType { .. } => "incompatible-type",
            TypeError::UnknownIdentifier { .. } => "unknown-identifier",
            TypeError::UndeclaredType { .. } => "undeclared-type",
            TypeError::UndeclaredField { .. } => "undeclared-field",
            TypeError::UninitializedField { .. } => "uninitialized-field",
        }
    }

    /// The machine-readable form emitted by `--emit-diagnostics-json`
    pub fn report(&self) -> DiagnosticReport {
        DiagnosticReport {
            kind: self.kind(),
            message: self.to_string(),
            loc: self.loc(),
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeError::IncompatibleType { expected, actual, loc } => {
                write!(f, "Incompatible types at {loc}, expected: {expected}, actual: {actual}")
            }
            TypeError::UnknownIdentifier { name, loc } => {
                write!(f, "Unknown identifier {name} at {loc}")
            }
            TypeError::UndeclaredType { name, loc } => {
                write!(f, "Undeclared type {name} at {loc}")
            }
            TypeError::UndeclaredField { field, on, loc } => {
                write!(f, "Undeclared field {field} of type {on} at {loc}")
            }
            TypeError::UninitializedField { field, on, loc } => {
                write!(f, "Uninitialized field {field} of type {on} at {loc}")
            }
        }
    }
}

/// Serializable view of one diagnostic
#[derive(Debug, Serialize)]
pub struct DiagnosticReport {
    pub kind: &'static str,
    pub message: String,
    pub loc: Loc,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn renders_messages() {
        let err = TypeError::IncompatibleType {
            expected: Type::BOOLEAN,
            actual: Type::INTEGER,
            loc: Loc::new(1, 0, 1, 7),
        };
        assert_eq!(
            err.to_string(),
            "Incompatible types at 1:0-1:7, expected: Boolean, actual: Integer"
        );

        let err = TypeError::UnknownIdentifier { name: "y".into(), loc: Loc::new(2, 4, 2, 5) };
        assert_eq!(err.to_string(), "Unknown identifier y at 2:4-2:5");
    }

    #[test]
    fn report_carries_kind_and_loc() {
        let err = TypeError::UndeclaredType { name: "Ghost".into(), loc: Loc::new(1, 0, 1, 5) };
        let report = err.report();
        assert_eq!(report.kind, "undeclared-type");
        assert_eq!(report.loc, Loc::new(1, 0, 1, 5));
    }
}
