//! Lexer for Brio
//!
//! Converts source text into a stream of line/column-located tokens.

use crate::frontend::token::{Token, TokenKind};
use crate::utils::{Loc, ParseError, ParseResult};

/// The lexer state
pub struct Lexer {
    source: Vec<char>,
    pos: usize,
    line: u32,
    col: u32,
    start_line: u32,
    start_col: u32,
}

impl Lexer {
    /// Create a new lexer for the given source code
    pub fn new(source: &str) -> Self {
        Self {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 0,
            start_line: 1,
            start_col: 0,
        }
    }

    /// Tokenize the whole input, ending with an Eof token
    pub fn tokenize(mut self) -> ParseResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let at_end = token.kind == TokenKind::Eof;
            tokens.push(token);
            if at_end {
                break;
            }
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek();
        if let Some(c) = c {
            self.pos += 1;
            if c == '\n' {
                self.line += 1;
                self.col = 0;
            } else {
                self.col += 1;
            }
        }
        c
    }

    fn here(&self) -> Loc {
        Loc::new(self.line, self.col, self.line, self.col)
    }

    /// Location from the start of the current token to the current position
    fn make_loc(&self) -> Loc {
        Loc::new(self.start_line, self.start_col, self.line, self.col)
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.make_loc())
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_next() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> ParseResult<Token> {
        self.skip_trivia();
        self.start_line = self.line;
        self.start_col = self.col;

        let c = match self.advance() {
            Some(c) => c,
            None => return Ok(self.make_token(TokenKind::Eof)),
        };

        let kind = match c {
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semi,
            ',' => TokenKind::Comma,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '.' => {
                if self.peek() == Some('.') {
                    self.advance();
                    TokenKind::DotDot
                } else {
                    TokenKind::Dot
                }
            }
            '=' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::EqEq
                } else {
                    TokenKind::Assign
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::NotEq
                } else {
                    TokenKind::Bang
                }
            }
            '<' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::Le
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            '"' => return self.string(),
            '\'' => return self.symbol(),
            c if c.is_ascii_digit() => return self.number(c),
            c if c.is_alphabetic() || c == '_' => return Ok(self.ident(c)),
            other => return Err(ParseError::UnexpectedChar(other, self.here())),
        };
        Ok(self.make_token(kind))
    }

    fn string(&mut self) -> ParseResult<Token> {
        let mut text = String::new();
        loop {
            match self.advance() {
                None => return Err(ParseError::UnterminatedString(self.make_loc())),
                Some('"') => break,
                Some('\\') => match self.advance() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('"') => text.push('"'),
                    Some('\\') => text.push('\\'),
                    Some(other) => return Err(ParseError::UnexpectedChar(other, self.here())),
                    None => return Err(ParseError::UnterminatedString(self.make_loc())),
                },
                Some(c) => text.push(c),
            }
        }
        Ok(self.make_token(TokenKind::Str(text)))
    }

    fn symbol(&mut self) -> ParseResult<Token> {
        let mut label = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                label.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if label.is_empty() {
            return Err(ParseError::UnexpectedChar('\'', self.here()));
        }
        Ok(self.make_token(TokenKind::Symbol(label)))
    }

    fn number(&mut self, first: char) -> ParseResult<Token> {
        let mut text = String::from(first);
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        let value = text
            .parse::<i64>()
            .map_err(|_| ParseError::IntegerOutOfRange(text.clone(), self.make_loc()))?;
        Ok(self.make_token(TokenKind::Int(value)))
    }

    fn ident(&mut self, first: char) -> Token {
        let mut word = String::from(first);
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                word.push(c);
                self.advance();
            } else {
                break;
            }
        }
        match TokenKind::keyword(&word) {
            Some(kind) => self.make_token(kind),
            None => self.make_token(TokenKind::Ident(word)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn scans_statement() {
        assert_eq!(
            kinds("let x = 5;"),
            vec![
                TokenKind::Let,
                TokenKind::Ident("x".into()),
                TokenKind::Assign,
                TokenKind::Int(5),
                TokenKind::Semi,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn scans_operators_and_ranges() {
        assert_eq!(
            kinds("1..5 <= >= == != ."),
            vec![
                TokenKind::Int(1),
                TokenKind::DotDot,
                TokenKind::Int(5),
                TokenKind::Le,
                TokenKind::Ge,
                TokenKind::EqEq,
                TokenKind::NotEq,
                TokenKind::Dot,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn scans_symbols_and_strings() {
        assert_eq!(
            kinds("'None \"wo\\nrd\""),
            vec![
                TokenKind::Symbol("None".into()),
                TokenKind::Str("wo\nrd".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn skips_line_comments() {
        assert_eq!(
            kinds("5 // ignored\n6"),
            vec![TokenKind::Int(5), TokenKind::Int(6), TokenKind::Eof]
        );
    }

    #[test]
    fn rejects_overlong_integer_literal() {
        let err = Lexer::new("99999999999999999999").tokenize().unwrap_err();
        assert!(matches!(
            err,
            ParseError::IntegerOutOfRange(text, _) if text == "99999999999999999999"
        ));
        // the maximum value itself still scans
        assert_eq!(
            kinds("9223372036854775807"),
            vec![TokenKind::Int(i64::MAX), TokenKind::Eof]
        );
    }

    #[test]
    fn tracks_locations() {
        let tokens = Lexer::new("let x\n= 5").tokenize().unwrap();
        assert_eq!(tokens[0].loc, Loc::new(1, 0, 1, 3));
        assert_eq!(tokens[1].loc, Loc::new(1, 4, 1, 5));
        assert_eq!(tokens[2].loc, Loc::new(2, 0, 2, 1));
        assert_eq!(tokens[3].loc, Loc::new(2, 2, 2, 3));
    }
}
