//! Frontend: lexing, parsing, diagnostics and type checking

pub mod ast;
pub mod checker;
pub mod diagnostics;
pub mod lexer;
pub mod parser;
pub mod token;

pub use checker::TypeChecker;
pub use diagnostics::{DiagnosticReport, TypeError};
pub use parser::{parse_expression, parse_source};

use ast::SourceFile;
use std::collections::HashMap;
use std::rc::Rc;

/// Parsed source files keyed by dotted import path. The checker and the
/// evaluator both resolve `import a.b.c.{x}` against this table; loading
/// and parsing the files happens up front, before checking starts.
#[derive(Debug, Default)]
pub struct Sources {
    files: HashMap<String, Rc<SourceFile>>,
}

impl Sources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, path: impl Into<String>, file: Rc<SourceFile>) {
        self.files.insert(path.into(), file);
    }

    pub fn get(&self, path: &str) -> Option<Rc<SourceFile>> {
        self.files.get(path).cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }
}
