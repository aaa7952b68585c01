//! Parser for Brio
//!
//! Recursive descent with precedence-layered expression parsing.
//! Constructor calls are told apart from blocks by the uppercase-initial
//! type-name rule: `Cat {}` constructs, `x` followed by `{` does not.

use crate::frontend::ast::*;
use crate::frontend::lexer::Lexer;
use crate::frontend::token::{Token, TokenKind};
use crate::utils::{Loc, ParseError, ParseResult};
use std::cell::RefCell;
use std::rc::Rc;

/// Parse one source file
pub fn parse_source(source: &str) -> ParseResult<SourceFile> {
    Parser::new(source)?.parse_source_file()
}

/// Parse a single expression (used by the checker/evaluator tests)
pub fn parse_expression(source: &str) -> ParseResult<Expr> {
    let mut parser = Parser::new(source)?;
    let expr = parser.parse_expr()?;
    parser.expect(TokenKind::Eof)?;
    Ok(expr)
}

/// The parser
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(source: &str) -> ParseResult<Self> {
        Ok(Self { tokens: Lexer::new(source).tokenize()?, pos: 0 })
    }

    // ==================== Helper Methods ====================

    fn current(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or_else(|| {
            self.tokens.last().expect("tokens end with Eof")
        })
    }

    fn current_kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos + 1).map(|t| &t.kind)
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.current_kind()) == std::mem::discriminant(kind)
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current_kind(), TokenKind::Eof)
    }

    fn expect(&mut self, expected: TokenKind) -> ParseResult<Token> {
        if self.check(&expected) {
            Ok(self.advance())
        } else {
            Err(ParseError::UnexpectedToken {
                expected: format!("{:?}", expected),
                got: format!("{:?}", self.current_kind()),
                loc: self.current().loc,
            })
        }
    }

    fn consume(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_ident(&mut self) -> ParseResult<(String, Loc)> {
        match self.current_kind().clone() {
            TokenKind::Ident(name) => {
                let loc = self.advance().loc;
                Ok((name, loc))
            }
            got => Err(ParseError::UnexpectedToken {
                expected: "identifier".into(),
                got: format!("{got:?}"),
                loc: self.current().loc,
            }),
        }
    }

    fn prev_loc(&self) -> Loc {
        self.tokens[self.pos.saturating_sub(1)].loc
    }

    // ==================== Declarations ====================

    /// Parse a whole source file into its declaration buckets
    pub fn parse_source_file(&mut self) -> ParseResult<SourceFile> {
        let start = self.current().loc;
        let mut imports = Vec::new();
        let mut types = Vec::new();
        let mut functions = Vec::new();
        let mut statements = Vec::new();

        while !self.is_at_end() {
            match self.current_kind() {
                TokenKind::Import => imports.push(self.parse_import()?),
                TokenKind::Data => types.push(TypeDecl::Data(self.parse_data()?)),
                TokenKind::Enum => types.push(TypeDecl::Enum(self.parse_enum()?)),
                TokenKind::Interface => types.push(TypeDecl::Interface(self.parse_interface()?)),
                TokenKind::Function => functions.push(Rc::new(self.parse_function()?)),
                _ => statements.push(self.parse_statement()?),
            }
        }

        let loc = start.merge(&self.prev_loc());
        Ok(SourceFile { imports, types, functions, statements, loc })
    }

    fn parse_import(&mut self) -> ParseResult<ImportDecl> {
        let start = self.expect(TokenKind::Import)?.loc;
        let (first, _) = self.expect_ident()?;
        let mut segments = vec![first];
        let mut names = Vec::new();
        loop {
            self.expect(TokenKind::Dot)?;
            if self.consume(&TokenKind::LBrace) {
                loop {
                    let (name, _) = self.expect_ident()?;
                    names.push(name);
                    if !self.consume(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBrace)?;
                break;
            }
            let (segment, _) = self.expect_ident()?;
            segments.push(segment);
        }
        self.consume(&TokenKind::Semi);
        let loc = start.merge(&self.prev_loc());
        Ok(ImportDecl { path: segments.join("."), names, loc })
    }

    fn parse_data(&mut self) -> ParseResult<DataDecl> {
        let start = self.expect(TokenKind::Data)?.loc;
        let (name, _) = self.expect_ident()?;
        self.expect(TokenKind::LBrace)?;
        let mut fields = Vec::new();
        if !self.check(&TokenKind::RBrace) {
            loop {
                let (field, _) = self.expect_ident()?;
                self.expect(TokenKind::Colon)?;
                fields.push((field, self.parse_type_annotation()?));
                if !self.consume(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RBrace)?;
        let loc = start.merge(&self.prev_loc());
        Ok(DataDecl { name, fields, loc })
    }

    fn parse_enum(&mut self) -> ParseResult<EnumDecl> {
        let start = self.expect(TokenKind::Enum)?.loc;
        let (name, _) = self.expect_ident()?;
        let generic = if self.consume(&TokenKind::Lt) {
            let (param, _) = self.expect_ident()?;
            self.expect(TokenKind::Gt)?;
            Some(param)
        } else {
            None
        };
        self.expect(TokenKind::LBrace)?;
        let mut members = Vec::new();
        let mut symbols = Vec::new();
        if !self.check(&TokenKind::RBrace) {
            loop {
                if let TokenKind::Symbol(label) = self.current_kind().clone() {
                    self.advance();
                    symbols.push(label);
                } else {
                    members.push(self.parse_type_annotation()?);
                }
                if !self.consume(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RBrace)?;
        let loc = start.merge(&self.prev_loc());
        Ok(EnumDecl { name, generic, members, symbols, loc })
    }

    fn parse_interface(&mut self) -> ParseResult<InterfaceDecl> {
        let start = self.expect(TokenKind::Interface)?.loc;
        let (name, _) = self.expect_ident()?;
        self.expect(TokenKind::LBrace)?;
        let mut signatures = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            signatures.push(self.parse_signature()?);
        }
        self.expect(TokenKind::RBrace)?;
        let loc = start.merge(&self.prev_loc());
        Ok(InterfaceDecl { name, signatures, loc, stubs: RefCell::new(Vec::new()) })
    }

    fn parse_signature(&mut self) -> ParseResult<FunctionSig> {
        let (name, start) = self.expect_ident()?;
        self.expect(TokenKind::LParen)?;
        let params = self.parse_params()?;
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::Colon)?;
        let return_type = self.parse_type_annotation()?;
        let loc = start.merge(&self.prev_loc());
        Ok(FunctionSig { name, params, return_type, loc })
    }

    fn parse_function(&mut self) -> ParseResult<FunctionDecl> {
        let start = self.expect(TokenKind::Function)?.loc;
        let (name, name_loc) = self.expect_ident()?;
        self.expect(TokenKind::LParen)?;
        let params = self.parse_params()?;
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::Colon)?;
        let return_type = self.parse_type_annotation()?;
        let sig_loc = name_loc.merge(&self.prev_loc());
        let signature = FunctionSig { name, params, return_type, loc: sig_loc };
        let block = self.parse_expr_block()?;
        let loc = start.merge(&self.prev_loc());
        Ok(FunctionDecl {
            signature,
            statements: block.statements,
            tail: block.tail,
            loc,
            function: RefCell::new(None),
        })
    }

    fn parse_params(&mut self) -> ParseResult<Vec<(String, TypeAnnotation)>> {
        let mut params = Vec::new();
        if self.check(&TokenKind::RParen) {
            return Ok(params);
        }
        loop {
            let (name, _) = self.expect_ident()?;
            self.expect(TokenKind::Colon)?;
            params.push((name, self.parse_type_annotation()?));
            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }
        Ok(params)
    }

    fn parse_type_annotation(&mut self) -> ParseResult<TypeAnnotation> {
        let (name, start) = self.expect_ident()?;
        let generic = if self.consume(&TokenKind::Lt) {
            let (param, _) = self.expect_ident()?;
            self.expect(TokenKind::Gt)?;
            Some(param)
        } else {
            None
        };
        let loc = start.merge(&self.prev_loc());
        Ok(TypeAnnotation { name, generic, loc })
    }

    // ==================== Statements ====================

    fn parse_statement(&mut self) -> ParseResult<Stmt> {
        match self.current_kind() {
            TokenKind::Let => self.parse_let(),
            TokenKind::For => self.parse_for(),
            TokenKind::While => self.parse_while(),
            TokenKind::Ident(_) if self.peek_kind() == Some(&TokenKind::Assign) => {
                self.parse_assignment()
            }
            _ => {
                let expr = self.parse_expr()?;
                self.expect(TokenKind::Semi)?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn parse_let(&mut self) -> ParseResult<Stmt> {
        let start = self.expect(TokenKind::Let)?.loc;
        let (name, _) = self.expect_ident()?;
        let annotation = if self.consume(&TokenKind::Colon) {
            Some(self.parse_type_annotation()?)
        } else {
            None
        };
        let value = if self.consume(&TokenKind::Assign) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect(TokenKind::Semi)?;
        let loc = start.merge(&self.prev_loc());
        Ok(Stmt::Let { name, annotation, value, loc })
    }

    fn parse_assignment(&mut self) -> ParseResult<Stmt> {
        let (name, start) = self.expect_ident()?;
        self.expect(TokenKind::Assign)?;
        let value = self.parse_expr()?;
        self.expect(TokenKind::Semi)?;
        let loc = start.merge(&self.prev_loc());
        Ok(Stmt::Assign { name, value, loc })
    }

    fn parse_for(&mut self) -> ParseResult<Stmt> {
        let start = self.expect(TokenKind::For)?.loc;
        let (var, _) = self.expect_ident()?;
        self.expect(TokenKind::In)?;
        let from = self.parse_expr()?;
        self.expect(TokenKind::DotDot)?;
        let to = self.parse_expr()?;
        let body = self.parse_stmt_block()?;
        let loc = start.merge(&self.prev_loc());
        Ok(Stmt::For { var, from, to, body, loc })
    }

    fn parse_while(&mut self) -> ParseResult<Stmt> {
        let start = self.expect(TokenKind::While)?.loc;
        let cond = self.parse_expr()?;
        let body = self.parse_stmt_block()?;
        let loc = start.merge(&self.prev_loc());
        Ok(Stmt::While { cond, body, loc })
    }

    /// A statement-only block, as used by loop bodies
    fn parse_stmt_block(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect(TokenKind::LBrace)?;
        let mut statements = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            statements.push(self.parse_statement()?);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(statements)
    }

    /// An expression block: statements followed by a mandatory tail
    /// expression, `{ let x = 1; x + 1 }`
    fn parse_expr_block(&mut self) -> ParseResult<Block> {
        self.expect(TokenKind::LBrace)?;
        let mut statements = Vec::new();
        let tail;
        loop {
            match self.current_kind() {
                TokenKind::Let | TokenKind::For | TokenKind::While => {
                    statements.push(self.parse_statement()?);
                }
                TokenKind::Ident(_) if self.peek_kind() == Some(&TokenKind::Assign) => {
                    statements.push(self.parse_assignment()?);
                }
                TokenKind::RBrace => {
                    return Err(ParseError::UnexpectedToken {
                        expected: "expression".into(),
                        got: "RBrace".into(),
                        loc: self.current().loc,
                    });
                }
                _ => {
                    let expr = self.parse_expr()?;
                    if self.check(&TokenKind::RBrace) {
                        tail = expr;
                        break;
                    }
                    self.expect(TokenKind::Semi)?;
                    statements.push(Stmt::Expr(expr));
                }
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(Block { statements, tail })
    }

    // ==================== Expressions ====================

    pub fn parse_expr(&mut self) -> ParseResult<Expr> {
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.current_kind() {
                TokenKind::EqEq => BinOp::Eq,
                TokenKind::NotEq => BinOp::Ne,
                TokenKind::Lt => BinOp::Lt,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::Le => BinOp::Le,
                TokenKind::Ge => BinOp::Ge,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            let loc = left.loc.merge(&right.loc);
            left = Expr::new(ExprKind::Binary(op, Box::new(left), Box::new(right)), loc);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current_kind() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            let loc = left.loc.merge(&right.loc);
            left = Expr::new(ExprKind::Binary(op, Box::new(left), Box::new(right)), loc);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current_kind() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            let loc = left.loc.merge(&right.loc);
            left = Expr::new(ExprKind::Binary(op, Box::new(left), Box::new(right)), loc);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        match self.current_kind() {
            TokenKind::Bang => {
                let start = self.advance().loc;
                let inner = self.parse_unary()?;
                let loc = start.merge(&inner.loc);
                Ok(Expr::new(ExprKind::Not(Box::new(inner)), loc))
            }
            TokenKind::Minus => {
                let start = self.advance().loc;
                let inner = self.parse_unary()?;
                let loc = start.merge(&inner.loc);
                Ok(Expr::new(ExprKind::Neg(Box::new(inner)), loc))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.current_kind() {
                TokenKind::LParen => {
                    self.advance();
                    let mut args = Vec::new();
                    if !self.check(&TokenKind::RParen) {
                        loop {
                            args.push(self.parse_expr()?);
                            if !self.consume(&TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(TokenKind::RParen)?;
                    let loc = expr.loc.merge(&self.prev_loc());
                    expr = Expr::new(
                        ExprKind::Call(Box::new(CallExpr {
                            target: expr,
                            args,
                            resolved: RefCell::new(None),
                        })),
                        loc,
                    );
                }
                TokenKind::Dot => {
                    self.advance();
                    let (name, name_loc) = self.expect_ident()?;
                    let loc = expr.loc.merge(&name_loc);
                    expr = Expr::new(ExprKind::Dot(Box::new(DotExpr { target: expr, name })), loc);
                }
                TokenKind::As => {
                    self.advance();
                    let annotation = self.parse_type_annotation()?;
                    let loc = expr.loc.merge(&annotation.loc);
                    expr = Expr::new(
                        ExprKind::Cast(Box::new(CastExpr { value: expr, annotation })),
                        loc,
                    );
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let loc = self.current().loc;
        match self.current_kind().clone() {
            TokenKind::Int(value) => {
                self.advance();
                Ok(Expr::new(ExprKind::Int(value), loc))
            }
            TokenKind::Str(text) => {
                self.advance();
                Ok(Expr::new(ExprKind::Str(text), loc))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::new(ExprKind::Bool(true), loc))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::new(ExprKind::Bool(false), loc))
            }
            TokenKind::Symbol(label) => {
                self.advance();
                Ok(Expr::new(ExprKind::Symbol(label), loc))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                let loc = loc.merge(&self.prev_loc());
                Ok(Expr::new(inner.kind, loc))
            }
            TokenKind::LBrace => {
                let block = self.parse_expr_block()?;
                let loc = loc.merge(&self.prev_loc());
                Ok(Expr::new(ExprKind::Block(Box::new(block)), loc))
            }
            TokenKind::If => self.parse_if(),
            TokenKind::Match => self.parse_match(),
            TokenKind::Ident(name) => {
                if name.chars().next().is_some_and(char::is_uppercase)
                    && self.peek_kind() == Some(&TokenKind::LBrace)
                {
                    self.parse_construct()
                } else {
                    self.advance();
                    Ok(Expr::new(ExprKind::Ident(name), loc))
                }
            }
            got => Err(ParseError::UnexpectedToken {
                expected: "expression".into(),
                got: format!("{got:?}"),
                loc,
            }),
        }
    }

    fn parse_if(&mut self) -> ParseResult<Expr> {
        let start = self.expect(TokenKind::If)?.loc;
        let cond = self.parse_expr()?;
        let then = self.parse_expr_block()?;
        self.expect(TokenKind::Else)?;
        let otherwise = if self.check(&TokenKind::If) {
            self.parse_if()?
        } else {
            let else_start = self.current().loc;
            let block = self.parse_expr_block()?;
            let loc = else_start.merge(&self.prev_loc());
            Expr::new(ExprKind::Block(Box::new(block)), loc)
        };
        let loc = start.merge(&self.prev_loc());
        Ok(Expr::new(ExprKind::If(Box::new(IfExpr { cond, then, otherwise })), loc))
    }

    fn parse_match(&mut self) -> ParseResult<Expr> {
        let start = self.expect(TokenKind::Match)?.loc;
        let value = self.parse_expr()?;
        self.expect(TokenKind::LBrace)?;
        let mut arms = Vec::new();
        let fallback;
        loop {
            if self.consume(&TokenKind::Else) {
                self.expect(TokenKind::Colon)?;
                fallback = self.parse_expr()?;
                self.consume(&TokenKind::Comma);
                break;
            }
            if self.check(&TokenKind::RBrace) {
                return Err(ParseError::UnexpectedToken {
                    expected: "else arm".into(),
                    got: "RBrace".into(),
                    loc: self.current().loc,
                });
            }
            let pattern = self.parse_expr()?;
            self.expect(TokenKind::Colon)?;
            let result = self.parse_expr()?;
            arms.push((pattern, result));
            self.consume(&TokenKind::Comma);
        }
        self.expect(TokenKind::RBrace)?;
        let loc = start.merge(&self.prev_loc());
        Ok(Expr::new(
            ExprKind::Match(Box::new(MatchExpr { value, arms, fallback })),
            loc,
        ))
    }

    fn parse_construct(&mut self) -> ParseResult<Expr> {
        let (type_name, start) = self.expect_ident()?;
        self.expect(TokenKind::LBrace)?;
        let mut fields = Vec::new();
        if !self.check(&TokenKind::RBrace) {
            loop {
                let (field, _) = self.expect_ident()?;
                self.expect(TokenKind::Colon)?;
                fields.push((field, self.parse_expr()?));
                if !self.consume(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RBrace)?;
        let loc = start.merge(&self.prev_loc());
        Ok(Expr::new(
            ExprKind::Construct(Box::new(ConstructExpr {
                type_name,
                fields,
                resolved: RefCell::new(None),
            })),
            loc,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_declaration_buckets() {
        let file = parse_source(
            r#"
            import lib.text.{upper}
            data Cat { name: String }
            enum Opt<T> { T, 'None }
            interface Animal { speak(): String }
            function speak(c: Cat): String { "meow" }
            let pet = Cat { name: "Luna" };
            "#,
        )
        .unwrap();
        assert_eq!(file.imports.len(), 1);
        assert_eq!(file.imports[0].path, "lib.text");
        assert_eq!(file.imports[0].names, vec!["upper"]);
        assert_eq!(file.types.len(), 3);
        assert_eq!(file.functions.len(), 1);
        assert_eq!(file.statements.len(), 1);
    }

    #[test]
    fn parses_precedence() {
        let expr = parse_expression("1 + 2 * 2 + 1").unwrap();
        // ((1 + (2 * 2)) + 1)
        let ExprKind::Binary(BinOp::Add, left, right) = expr.kind else {
            panic!("expected addition at the top");
        };
        assert!(matches!(right.kind, ExprKind::Int(1)));
        let ExprKind::Binary(BinOp::Add, _, inner_right) = left.kind else {
            panic!("expected nested addition");
        };
        assert!(matches!(inner_right.kind, ExprKind::Binary(BinOp::Mul, _, _)));
    }

    #[test]
    fn comparison_binds_loosest() {
        let expr = parse_expression("3 + 2 > 3 + 1").unwrap();
        assert!(matches!(expr.kind, ExprKind::Binary(BinOp::Gt, _, _)));
    }

    #[test]
    fn parses_if_else_chain() {
        let expr = parse_expression("if 1 > 2 { 1 } else if 2 > 3 { 2 } else { 3 }").unwrap();
        let ExprKind::If(if_expr) = expr.kind else { panic!("expected if") };
        assert!(matches!(if_expr.otherwise.kind, ExprKind::If(_)));
    }

    #[test]
    fn parses_dot_call_chain() {
        let expr = parse_expression("r.my.introDeep()").unwrap();
        let ExprKind::Call(call) = expr.kind else { panic!("expected call") };
        assert!(call.args.is_empty());
        assert!(matches!(call.target.kind, ExprKind::Dot(_)));
    }

    #[test]
    fn uppercase_brace_is_constructor() {
        let expr = parse_expression("Cat {}").unwrap();
        assert!(matches!(expr.kind, ExprKind::Construct(_)));
        let expr = parse_expression("{ x }");
        assert!(expr.is_ok());
    }

    #[test]
    fn block_requires_tail_expression() {
        assert!(parse_expression("{ let x = 5; }").is_err());
        assert!(parse_expression("{ let x = 5; x }").is_ok());
    }

    #[test]
    fn match_requires_else_arm() {
        assert!(parse_expression("match 3 { 3: \"three\" }").is_err());
        assert!(parse_expression("match 3 { 3: \"three\", else: \"dunno\" }").is_ok());
    }

    #[test]
    fn loop_bodies_are_statement_blocks() {
        let file = parse_source("for i in 1..5 { x = x + i; }").unwrap();
        assert_eq!(file.statements.len(), 1);
        assert!(matches!(&file.statements[0], Stmt::For { body, .. } if body.len() == 1));
        assert!(parse_source("while x < 10 { x = x + 1; }").is_ok());
    }
}
