//! Abstract syntax tree for Brio
//!
//! Closed variant types consumed by both the type checker and the
//! evaluator. Call and constructor nodes carry annotation slots the
//! checker fills in (resolved target, per-argument interface wrapping);
//! the evaluator only ever reads them.

use crate::types::{DataType, Function, InterfaceType};
use crate::utils::Loc;
use std::cell::RefCell;
use std::rc::Rc;

/// One parsed source file
#[derive(Debug)]
pub struct SourceFile {
    pub imports: Vec<ImportDecl>,
    pub types: Vec<TypeDecl>,
    pub functions: Vec<Rc<FunctionDecl>>,
    pub statements: Vec<Stmt>,
    pub loc: Loc,
}

/// `import a.b.c.{x, y}` - selective re-export from another file
#[derive(Debug)]
pub struct ImportDecl {
    /// Dotted path, the key under which the file's AST is registered
    pub path: String,
    pub names: Vec<String>,
    pub loc: Loc,
}

/// A `data`, `enum` or `interface` declaration
#[derive(Debug)]
pub enum TypeDecl {
    Data(DataDecl),
    Enum(EnumDecl),
    Interface(InterfaceDecl),
}

impl TypeDecl {
    pub fn loc(&self) -> Loc {
        match self {
            TypeDecl::Data(d) => d.loc,
            TypeDecl::Enum(e) => e.loc,
            TypeDecl::Interface(i) => i.loc,
        }
    }
}

#[derive(Debug)]
pub struct DataDecl {
    pub name: String,
    pub fields: Vec<(String, TypeAnnotation)>,
    pub loc: Loc,
}

/// `enum Name<T> { Member, 'Symbol, ... }`
#[derive(Debug)]
pub struct EnumDecl {
    pub name: String,
    pub generic: Option<String>,
    pub members: Vec<TypeAnnotation>,
    pub symbols: Vec<String>,
    pub loc: Loc,
}

#[derive(Debug)]
pub struct InterfaceDecl {
    pub name: String,
    pub signatures: Vec<FunctionSig>,
    pub loc: Loc,
    /// Method stubs built during checking; the evaluator captures their
    /// declaration-time layer and registers them as callables.
    pub stubs: RefCell<Vec<Rc<Function>>>,
}

/// Name, parameters and return type of a function, body not included
#[derive(Debug)]
pub struct FunctionSig {
    pub name: String,
    pub params: Vec<(String, TypeAnnotation)>,
    pub return_type: TypeAnnotation,
    pub loc: Loc,
}

/// `function name(params): Ret { statements... tail }`
#[derive(Debug)]
pub struct FunctionDecl {
    pub signature: FunctionSig,
    pub statements: Vec<Stmt>,
    pub tail: Expr,
    pub loc: Loc,
    /// The callable built from this declaration, filled in by the checker
    pub function: RefCell<Option<Rc<Function>>>,
}

/// A reference to a type by name, optionally applied to a generic
/// argument: `Integer`, `Option<Integer>`
#[derive(Debug, Clone)]
pub struct TypeAnnotation {
    pub name: String,
    pub generic: Option<String>,
    pub loc: Loc,
}

/// A statement
#[derive(Debug)]
pub enum Stmt {
    /// `let name (: Type)? (= value)?;`
    Let {
        name: String,
        annotation: Option<TypeAnnotation>,
        value: Option<Expr>,
        loc: Loc,
    },
    /// `name = value;`
    Assign { name: String, value: Expr, loc: Loc },
    Expr(Expr),
    /// `for var in from..to { body }` - inclusive at both ends
    For {
        var: String,
        from: Expr,
        to: Expr,
        body: Vec<Stmt>,
        loc: Loc,
    },
    /// `while cond { body }`
    While { cond: Expr, body: Vec<Stmt>, loc: Loc },
}

impl Stmt {
    pub fn loc(&self) -> Loc {
        match self {
            Stmt::Let { loc, .. } | Stmt::Assign { loc, .. } | Stmt::For { loc, .. } | Stmt::While { loc, .. } => *loc,
            Stmt::Expr(e) => e.loc,
        }
    }
}

/// An expression with its source location
#[derive(Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub loc: Loc,
}

impl Expr {
    pub fn new(kind: ExprKind, loc: Loc) -> Self {
        Self { kind, loc }
    }
}

#[derive(Debug)]
pub enum ExprKind {
    Int(i64),
    Str(String),
    Bool(bool),
    /// `'Label` - the label without the quote
    Symbol(String),
    Ident(String),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// `!e`
    Not(Box<Expr>),
    /// `-e`
    Neg(Box<Expr>),
    /// `{ statements... tail }`
    Block(Box<Block>),
    If(Box<IfExpr>),
    Match(Box<MatchExpr>),
    Call(Box<CallExpr>),
    /// Field access or method-style dot-access: `x.name`
    Dot(Box<DotExpr>),
    /// `TypeName { field: e, ... }`
    Construct(Box<ConstructExpr>),
    /// `e as Type`
    Cast(Box<CastExpr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

/// An expression block: statements plus a mandatory tail expression
#[derive(Debug)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub tail: Expr,
}

#[derive(Debug)]
pub struct IfExpr {
    pub cond: Expr,
    pub then: Block,
    /// Either a block or a chained `if`
    pub otherwise: Expr,
}

#[derive(Debug)]
pub struct MatchExpr {
    pub value: Expr,
    pub arms: Vec<(Expr, Expr)>,
    /// The mandatory `else:` arm
    pub fallback: Expr,
}

#[derive(Debug)]
pub struct CallExpr {
    pub target: Expr,
    pub args: Vec<Expr>,
    /// Filled in by the checker, read (never recomputed) by the evaluator
    pub resolved: RefCell<Option<ResolvedCall>>,
}

/// The checker's verdict for one call site
#[derive(Debug, Clone)]
pub struct ResolvedCall {
    pub function: Rc<Function>,
    /// Whether the dot-access receiver is the implicit first argument
    pub with_receiver: bool,
    /// For each argument position, the interface to wrap the value into
    /// at evaluation time, if any
    pub wrap: Vec<Option<Rc<InterfaceType>>>,
}

#[derive(Debug)]
pub struct DotExpr {
    pub target: Expr,
    pub name: String,
}

#[derive(Debug)]
pub struct ConstructExpr {
    pub type_name: String,
    pub fields: Vec<(String, Expr)>,
    /// Filled in by the checker
    pub resolved: RefCell<Option<Rc<DataType>>>,
}

#[derive(Debug)]
pub struct CastExpr {
    pub value: Expr,
    pub annotation: TypeAnnotation,
}
