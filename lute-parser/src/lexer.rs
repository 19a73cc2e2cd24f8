// lute-parser - Scanner for the Lute programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Scanner (tokeniser) for Lute source code.
//!
//! Tokens are produced lazily, one `next_token` call at a time, and borrow
//! their lexemes straight from the source string. The scanner keeps no
//! lookahead buffer; the compiler drives it on demand.

use crate::token::{Token, TokenKind};

/// The scanner converts source code into tokens.
#[derive(Debug)]
pub struct Scanner<'src> {
    source: &'src str,
    /// Byte offset of the first character of the token being scanned.
    start: usize,
    /// Byte offset of the next character to consume.
    current: usize,
    /// Source line number (1-indexed).
    line: u32,
}

impl<'src> Scanner<'src> {
    /// Create a new scanner for the given source code.
    pub fn new(source: &'src str) -> Self {
        Scanner {
            source,
            start: 0,
            current: 0,
            line: 1,
        }
    }

    /// Scan and return the next token.
    ///
    /// Returns an `Eof` token forever once the source is exhausted.
    pub fn next_token(&mut self) -> Token<'src> {
        self.skip_whitespace_and_comments();
        self.start = self.current;

        if self.is_at_end() {
            return self.make(TokenKind::Eof);
        }

        let c = self.advance();
        match c {
            b'(' => self.make(TokenKind::LeftParen),
            b')' => self.make(TokenKind::RightParen),
            b'{' => self.make(TokenKind::LeftBrace),
            b'}' => self.make(TokenKind::RightBrace),
            b',' => self.make(TokenKind::Comma),
            b'.' => self.make(TokenKind::Dot),
            b';' => self.make(TokenKind::Semicolon),
            b'-' => self.make(TokenKind::Minus),
            b'+' => self.make(TokenKind::Plus),
            b'/' => self.make(TokenKind::Slash),
            b'*' => self.make(TokenKind::Star),
            b'!' => self.make_two(b'=', TokenKind::BangEqual, TokenKind::Bang),
            b'=' => self.make_two(b'=', TokenKind::EqualEqual, TokenKind::Equal),
            b'>' => self.make_two(b'=', TokenKind::GreaterEqual, TokenKind::Greater),
            b'<' => self.make_two(b'=', TokenKind::LessEqual, TokenKind::Less),
            b'"' => self.string(),
            b'0'..=b'9' => self.number(),
            c if is_identifier_start(c) => self.identifier(),
            _ => {
                // Keep the lexeme on a character boundary for multi-byte input.
                while !self.is_at_end() && self.peek() & 0b1100_0000 == 0b1000_0000 {
                    self.current += 1;
                }
                self.error_token("Unexpected character.")
            }
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            if self.is_at_end() {
                return;
            }
            match self.peek() {
                b' ' | b'\r' | b'\t' => {
                    self.current += 1;
                }
                b'\n' => {
                    self.line += 1;
                    self.current += 1;
                }
                b'/' if self.peek_next() == Some(b'/') => {
                    while !self.is_at_end() && self.peek() != b'\n' {
                        self.current += 1;
                    }
                }
                _ => return,
            }
        }
    }

    fn string(&mut self) -> Token<'src> {
        while !self.is_at_end() && self.peek() != b'"' {
            if self.peek() == b'\n' {
                self.line += 1;
            }
            self.current += 1;
        }

        if self.is_at_end() {
            return self.error_token("Unterminated string.");
        }

        // The closing quote.
        self.current += 1;
        self.make(TokenKind::String)
    }

    fn number(&mut self) -> Token<'src> {
        while !self.is_at_end() && self.peek().is_ascii_digit() {
            self.current += 1;
        }

        // A fractional part needs a digit after the dot.
        if !self.is_at_end()
            && self.peek() == b'.'
            && self.peek_next().is_some_and(|c| c.is_ascii_digit())
        {
            self.current += 1;
            while !self.is_at_end() && self.peek().is_ascii_digit() {
                self.current += 1;
            }
        }

        self.make(TokenKind::Number)
    }

    fn identifier(&mut self) -> Token<'src> {
        while !self.is_at_end() && is_identifier_part(self.peek()) {
            self.current += 1;
        }
        self.make(self.identifier_kind())
    }

    /// Resolve an identifier lexeme to a keyword, branching on its first one
    /// or two characters before confirming the full spelling.
    fn identifier_kind(&self) -> TokenKind {
        let lexeme = &self.source[self.start..self.current];
        let bytes = lexeme.as_bytes();
        match bytes[0] {
            b'a' => keyword(lexeme, "and", TokenKind::And),
            b'c' => keyword(lexeme, "class", TokenKind::Class),
            b'e' => keyword(lexeme, "else", TokenKind::Else),
            b'f' => match bytes.get(1) {
                Some(b'a') => keyword(lexeme, "false", TokenKind::False),
                Some(b'o') => keyword(lexeme, "for", TokenKind::For),
                Some(b'u') => keyword(lexeme, "fun", TokenKind::Fun),
                _ => TokenKind::Identifier,
            },
            b'i' => keyword(lexeme, "if", TokenKind::If),
            b'n' => keyword(lexeme, "nil", TokenKind::Nil),
            b'o' => keyword(lexeme, "or", TokenKind::Or),
            b'p' => keyword(lexeme, "print", TokenKind::Print),
            b'r' => keyword(lexeme, "return", TokenKind::Return),
            b's' => keyword(lexeme, "super", TokenKind::Super),
            b't' => match bytes.get(1) {
                Some(b'h') => keyword(lexeme, "this", TokenKind::This),
                Some(b'r') => keyword(lexeme, "true", TokenKind::True),
                _ => TokenKind::Identifier,
            },
            b'v' => keyword(lexeme, "var", TokenKind::Var),
            b'w' => keyword(lexeme, "while", TokenKind::While),
            _ => TokenKind::Identifier,
        }
    }

    fn make(&self, kind: TokenKind) -> Token<'src> {
        Token {
            kind,
            lexeme: &self.source[self.start..self.current],
            line: self.line,
        }
    }

    fn make_two(&mut self, second: u8, long: TokenKind, short: TokenKind) -> Token<'src> {
        if !self.is_at_end() && self.peek() == second {
            self.current += 1;
            self.make(long)
        } else {
            self.make(short)
        }
    }

    fn error_token(&self, message: &'static str) -> Token<'src> {
        Token {
            kind: TokenKind::Error,
            lexeme: message,
            line: self.line,
        }
    }

    fn advance(&mut self) -> u8 {
        let c = self.source.as_bytes()[self.current];
        self.current += 1;
        c
    }

    fn peek(&self) -> u8 {
        self.source.as_bytes()[self.current]
    }

    fn peek_next(&self) -> Option<u8> {
        self.source.as_bytes().get(self.current + 1).copied()
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }
}

fn is_identifier_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_identifier_part(c: u8) -> bool {
    is_identifier_start(c) || c.is_ascii_digit()
}

fn keyword(lexeme: &str, word: &str, kind: TokenKind) -> TokenKind {
    if lexeme == word {
        kind
    } else {
        TokenKind::Identifier
    }
}
