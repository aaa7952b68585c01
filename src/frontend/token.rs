//! Token definitions for Brio

use crate::utils::Loc;

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub loc: Loc,
}

impl Token {
    pub fn new(kind: TokenKind, loc: Loc) -> Self {
        Self { kind, loc }
    }
}

/// Token kinds
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // ============ Keywords ============
    /// function
    Function,
    /// let
    Let,
    /// data
    Data,
    /// enum
    Enum,
    /// interface
    Interface,
    /// import
    Import,
    /// if
    If,
    /// else
    Else,
    /// match
    Match,
    /// for
    For,
    /// in
    In,
    /// while
    While,
    /// true
    True,
    /// false
    False,
    /// as (cast)
    As,

    // ============ Literals ============
    Ident(String),
    Int(i64),
    Str(String),
    /// 'Label
    Symbol(String),

    // ============ Punctuation ============
    LBrace,
    RBrace,
    LParen,
    RParen,
    Colon,
    Semi,
    Comma,
    Dot,
    /// .. (range in for headers)
    DotDot,
    Assign,
    EqEq,
    NotEq,
    Lt,
    Gt,
    Le,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,

    Eof,
}

impl TokenKind {
    /// Keyword lookup for identifiers
    pub fn keyword(word: &str) -> Option<TokenKind> {
        Some(match word {
            "function" => TokenKind::Function,
            "let" => TokenKind::Let,
            "data" => TokenKind::Data,
            "enum" => TokenKind::Enum,
            "interface" => TokenKind::Interface,
            "import" => TokenKind::Import,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "match" => TokenKind::Match,
            "for" => TokenKind::For,
            "in" => TokenKind::In,
            "while" => TokenKind::While,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "as" => TokenKind::As,
            _ => return None,
        })
    }
}
