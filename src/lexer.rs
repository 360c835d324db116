// Copyright (c) The tiespath contributors.
// Licensed under the Apache License, Version 2.0.

//! Lexer for single path fragments.
//!
//! A fragment is one alternative of a target or scope filter, e.g.
//! `/GNBDUFunction/attributes[@gNBId=1]` or `/NRCellDU/attributes(nCI,nRTAC)`.
//! Tokens carry their 0-based column so syntax errors are positional.

use core::iter::Peekable;
use core::str::CharIndices;

use crate::errors::{Result, TiesPathError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Slash,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    At,
    /// A comparative operator: `=`, `>`, `<`, `>=`, `<=`, `!=`.
    CompOp(String),
    Ident(String),
    Str(String),
    Int(i64),
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// 0-based column of the token's first character.
    pub col: u32,
}

impl Token {
    /// Token text as it would appear in the fragment, for error messages.
    pub fn text(&self) -> String {
        match &self.kind {
            TokenKind::Slash => "/".into(),
            TokenKind::LBracket => "[".into(),
            TokenKind::RBracket => "]".into(),
            TokenKind::LParen => "(".into(),
            TokenKind::RParen => ")".into(),
            TokenKind::Comma => ",".into(),
            TokenKind::At => "@".into(),
            TokenKind::CompOp(op) => op.clone(),
            TokenKind::Ident(s) => s.clone(),
            TokenKind::Str(s) => format!("'{s}'"),
            TokenKind::Int(n) => n.to_string(),
            TokenKind::Eof => "<EOF>".into(),
        }
    }
}

pub struct Lexer<'source> {
    iter: Peekable<CharIndices<'source>>,
    len: u32,
}

impl<'source> Lexer<'source> {
    pub fn new(fragment: &'source str) -> Self {
        Self {
            iter: fragment.char_indices().peekable(),
            len: fragment.len() as u32,
        }
    }

    // Columns are byte offsets, matching the indices `peek` yields.
    fn peek(&mut self) -> (u32, char) {
        match self.iter.peek() {
            Some((i, c)) => (*i as u32, *c),
            None => (self.len, '\x00'),
        }
    }

    fn read_ident(&mut self) -> Token {
        let (col, _) = self.peek();
        let mut text = String::new();
        loop {
            let (_, ch) = self.peek();
            // Names may carry module prefixes and dashes, e.g. `module-x:location`.
            if ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | ':' | '.') {
                text.push(ch);
                self.iter.next();
            } else {
                break;
            }
        }
        Token {
            kind: TokenKind::Ident(text),
            col,
        }
    }

    fn read_integer(&mut self) -> Result<Token> {
        let (col, ch) = self.peek();
        let mut text = String::new();
        if ch == '-' {
            text.push(ch);
            self.iter.next();
        }
        while self.peek().1.is_ascii_digit() {
            text.push(self.peek().1);
            self.iter.next();
        }
        let value = text.parse::<i64>().map_err(|_| {
            TiesPathError::grammar(format!("Invalid integer literal '{text}' at line 1:{col}"))
        })?;
        Ok(Token {
            kind: TokenKind::Int(value),
            col,
        })
    }

    /// Reads a quoted string. Doubling the quote character escapes it, the
    /// same convention the normalized path uses.
    fn read_string(&mut self, quote: char) -> Result<Token> {
        let (col, _) = self.peek();
        self.iter.next();
        let mut text = String::new();
        loop {
            let (_, ch) = self.peek();
            if ch == '\x00' {
                return Err(TiesPathError::grammar(format!(
                    "Unterminated string literal at line 1:{col}"
                )));
            }
            self.iter.next();
            if ch == quote {
                if self.peek().1 == quote {
                    text.push(quote);
                    self.iter.next();
                } else {
                    break;
                }
            } else {
                text.push(ch);
            }
        }
        Ok(Token {
            kind: TokenKind::Str(text),
            col,
        })
    }

    fn read_comp_op(&mut self) -> Token {
        let (col, ch) = self.peek();
        let mut op = String::from(ch);
        self.iter.next();
        if matches!(ch, '>' | '<' | '!') && self.peek().1 == '=' {
            op.push('=');
            self.iter.next();
        }
        Token {
            kind: TokenKind::CompOp(op),
            col,
        }
    }

    pub fn next_token(&mut self) -> Result<Token> {
        while self.peek().1 == ' ' {
            self.iter.next();
        }
        let (col, ch) = self.peek();
        let single = |kind: TokenKind| Token { kind, col };
        match ch {
            '\x00' => Ok(single(TokenKind::Eof)),
            '/' => {
                self.iter.next();
                Ok(single(TokenKind::Slash))
            }
            '[' => {
                self.iter.next();
                Ok(single(TokenKind::LBracket))
            }
            ']' => {
                self.iter.next();
                Ok(single(TokenKind::RBracket))
            }
            '(' => {
                self.iter.next();
                Ok(single(TokenKind::LParen))
            }
            ')' => {
                self.iter.next();
                Ok(single(TokenKind::RParen))
            }
            ',' => {
                self.iter.next();
                Ok(single(TokenKind::Comma))
            }
            '@' => {
                self.iter.next();
                Ok(single(TokenKind::At))
            }
            '=' | '>' | '<' | '!' => Ok(self.read_comp_op()),
            '\'' | '"' => self.read_string(ch),
            '-' | '0'..='9' => self.read_integer(),
            c if c.is_ascii_alphabetic() || c == '_' => Ok(self.read_ident()),
            c => Err(TiesPathError::grammar(format!(
                "Unexpected character '{c}' at line 1:{col}"
            ))),
        }
    }
}
