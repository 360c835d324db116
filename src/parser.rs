// Copyright (c) The tiespath contributors.
// Licensed under the Apache License, Version 2.0.

//! Parser for single path fragments.
//!
//! Produces a [`TiesPathQuery`] per fragment: the container-name sequence,
//! projection parameters, leaf comparisons and the normalized path string.
//! Only `=` comparisons and the `and` boolean operator are accepted; anything
//! else is a positional grammar error.

use crate::ast::Literal;
use crate::errors::{Result, TiesPathError};
use crate::lexer::{Lexer, Token, TokenKind};

/// One `@leaf=literal` comparison inside a fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct DataLeaf {
    pub name: String,
    pub value: Literal,
}

/// Tokenizer output for one path fragment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TiesPathQuery {
    /// The fragment rebuilt in canonical form: containers joined by `/`,
    /// conditions bracketed with quoted literals (single quotes doubled).
    pub normalized_path: String,
    /// Ordered container names; depth limits are enforced by the resolvers.
    pub container_names: Vec<String>,
    /// Projection parameters from a trailing `(a,b,...)` list.
    pub attribute_names: Vec<String>,
    /// Leaf comparisons from the last condition block.
    pub leaves_data: Vec<DataLeaf>,
    /// Boolean operators between conditions; only `and` survives parsing.
    pub boolean_operators: Vec<String>,
    /// Comparative operators; only `=` survives parsing.
    pub comparative_operators: Vec<String>,
    /// Leaf name and literal of a `contains(@leaf,"text")` condition.
    pub contains_condition: Option<(String, String)>,
}

impl TiesPathQuery {
    pub fn has_leaf_conditions(&self) -> bool {
        !self.leaves_data.is_empty()
    }

    pub fn has_contains_condition(&self) -> bool {
        self.contains_condition.is_some()
    }
}

/// Parses one path fragment.
pub fn parse_fragment(fragment: &str) -> Result<TiesPathQuery> {
    PathParser::new(fragment)?.parse()
}

pub struct PathParser<'source> {
    lexer: Lexer<'source>,
    tok: Token,
    query: TiesPathQuery,
}

impl<'source> PathParser<'source> {
    pub fn new(fragment: &'source str) -> Result<Self> {
        let mut lexer = Lexer::new(fragment);
        let tok = lexer.next_token()?;
        Ok(Self {
            lexer,
            tok,
            query: TiesPathQuery::default(),
        })
    }

    fn next_token(&mut self) -> Result<()> {
        self.tok = self.lexer.next_token()?;
        Ok(())
    }

    fn no_viable_alternative(&self) -> TiesPathError {
        TiesPathError::grammar(format!(
            "no viable alternative at input '{}' at line 1:{}",
            self.tok.text(),
            self.tok.col
        ))
    }

    fn read_ident(&mut self) -> Result<String> {
        match &self.tok.kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.next_token()?;
                Ok(name)
            }
            _ => Err(self.no_viable_alternative()),
        }
    }

    pub fn parse(mut self) -> Result<TiesPathQuery> {
        if self.tok.kind != TokenKind::Slash {
            return Err(self.no_viable_alternative());
        }
        loop {
            self.next_token()?;
            if self.tok.kind == TokenKind::Slash {
                return Err(TiesPathError::grammar(
                    "Path can only start with one slash (/)".to_string(),
                ));
            }
            let container = self.read_ident()?;
            self.query.normalized_path.push('/');
            self.query.normalized_path.push_str(&container);
            self.query.container_names.push(container);

            if self.tok.kind == TokenKind::LBracket {
                self.parse_conditions()?;
            }
            match self.tok.kind {
                TokenKind::Slash => continue,
                TokenKind::LParen => {
                    self.parse_attribute_list()?;
                    break;
                }
                TokenKind::Eof => break,
                _ => return Err(self.no_viable_alternative()),
            }
        }
        if self.tok.kind != TokenKind::Eof {
            return Err(self.no_viable_alternative());
        }
        Ok(self.query)
    }

    /// `[@leaf=literal and @leaf2=literal2]` or `[contains(@leaf,"text")]`.
    fn parse_conditions(&mut self) -> Result<()> {
        self.next_token()?;
        self.query.normalized_path.push('[');
        self.query.leaves_data.clear();
        self.query.boolean_operators.clear();
        self.query.comparative_operators.clear();
        loop {
            match self.tok.kind.clone() {
                TokenKind::At => self.parse_leaf_condition()?,
                TokenKind::Ident(name) if name == "contains" => self.parse_contains_condition()?,
                _ => return Err(self.no_viable_alternative()),
            }
            match self.tok.kind.clone() {
                TokenKind::RBracket => break,
                TokenKind::Ident(op) if op == "and" => {
                    self.query.boolean_operators.push(op);
                    self.next_token()?;
                }
                TokenKind::Ident(op) if op == "or" => {
                    return Err(TiesPathError::grammar(format!(
                        "Boolean operator 'or' is not supported, at {}",
                        self.tok.col
                    )));
                }
                _ => return Err(self.no_viable_alternative()),
            }
        }
        self.query.normalized_path.push(']');
        self.next_token()?;
        Ok(())
    }

    fn parse_leaf_condition(&mut self) -> Result<()> {
        self.next_token()?;
        let leaf = self.read_ident()?;
        match self.tok.kind.clone() {
            TokenKind::CompOp(op) if op == "=" => {
                self.query.comparative_operators.push(op);
                self.next_token()?;
            }
            TokenKind::CompOp(op) => {
                return Err(TiesPathError::grammar(format!(
                    "Comparative operator '{op}' is not supported, at {}",
                    self.tok.col
                )));
            }
            _ => return Err(self.no_viable_alternative()),
        }
        let value = match self.tok.kind.clone() {
            TokenKind::Int(n) => Literal::Int(n),
            TokenKind::Str(s) => Literal::Text(s),
            _ => {
                return Err(TiesPathError::grammar(format!(
                    "Unsupported comparison value encountered in expression at line 1:{}",
                    self.tok.col
                )))
            }
        };
        self.next_token()?;
        self.append_condition(&leaf, &value);
        self.query.leaves_data.push(DataLeaf { name: leaf, value });
        Ok(())
    }

    fn parse_contains_condition(&mut self) -> Result<()> {
        self.next_token()?;
        self.expect(TokenKind::LParen)?;
        self.expect(TokenKind::At)?;
        let leaf = self.read_ident()?;
        self.expect(TokenKind::Comma)?;
        let value = match self.tok.kind.clone() {
            TokenKind::Str(s) => s,
            _ => return Err(self.no_viable_alternative()),
        };
        self.next_token()?;
        self.expect(TokenKind::RParen)?;
        self.query.contains_condition = Some((leaf, value));
        Ok(())
    }

    fn parse_attribute_list(&mut self) -> Result<()> {
        self.next_token()?;
        let mut names = vec![self.read_ident()?];
        while self.tok.kind == TokenKind::Comma {
            self.next_token()?;
            names.push(self.read_ident()?);
        }
        self.expect(TokenKind::RParen)?;
        self.query.attribute_names = names;
        Ok(())
    }

    fn expect(&mut self, kind: TokenKind) -> Result<()> {
        if self.tok.kind == kind {
            self.next_token()
        } else {
            Err(self.no_viable_alternative())
        }
    }

    /// Appends `@leaf='value'` to the normalized path, joining consecutive
    /// conditions with the boolean operator. Single quotes inside the literal
    /// are doubled so the literal round-trips between path text and compiled
    /// predicate.
    fn append_condition(&mut self, name: &str, value: &Literal) {
        let path = &mut self.query.normalized_path;
        if !path.ends_with('[') {
            path.push(' ');
            path.push_str(self.query.boolean_operators.last().map_or("and", |op| op));
            path.push(' ');
        }
        path.push('@');
        path.push_str(name);
        path.push_str(self.query.comparative_operators.last().map_or("=", |op| op));
        path.push('\'');
        path.push_str(&value.to_text().replace('\'', "''"));
        path.push('\'');
    }
}
