//! Utility module

mod error;
mod span;

pub use error::{ParseError, ParseResult, RuntimeError};
pub use span::Loc;
