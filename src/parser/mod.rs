//! Parser module for Gibbon.
//!
//! A Pratt parser over the token stream. Unlike the bytecode compiler, which
//! aborts on its first error, the parser keeps going after a bad statement
//! and reports everything it found.

mod expressions;
mod precedence;

#[cfg(test)]
mod tests;

use crate::ast::{Block, Program, Stmt, StmtKind};
use crate::error::ParserError;
use crate::lexer::{Token, TokenKind};
use crate::span::Span;

pub type ParseResult<T> = Result<T, ParserError>;

/// The parser for Gibbon.
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0 }
    }

    /// Parse a complete program, collecting every statement-level error.
    pub fn parse(&mut self) -> Result<Program, Vec<ParserError>> {
        let mut statements = Vec::new();
        let mut errors = Vec::new();

        while !self.is_at_end() {
            match self.statement() {
                Ok(stmt) => statements.push(stmt),
                Err(err) => {
                    errors.push(err);
                    self.synchronize();
                }
            }
        }

        if errors.is_empty() {
            Ok(Program { statements })
        } else {
            Err(errors)
        }
    }

    // ===== Statements =====

    pub(crate) fn statement(&mut self) -> ParseResult<Stmt> {
        match self.peek().kind {
            TokenKind::Let => self.let_statement(),
            TokenKind::Return => self.return_statement(),
            _ => self.expression_statement(),
        }
    }

    fn let_statement(&mut self) -> ParseResult<Stmt> {
        let span = self.current_span();
        self.advance(); // let
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::Assign)?;
        let value = self.expression()?;
        self.match_token(&TokenKind::Semicolon);
        Ok(Stmt::new(StmtKind::Let { name, value }, span))
    }

    fn return_statement(&mut self) -> ParseResult<Stmt> {
        let span = self.current_span();
        self.advance(); // return
        let value = self.expression()?;
        self.match_token(&TokenKind::Semicolon);
        Ok(Stmt::new(StmtKind::Return(value), span))
    }

    fn expression_statement(&mut self) -> ParseResult<Stmt> {
        let span = self.current_span();
        let expr = self.expression()?;
        self.match_token(&TokenKind::Semicolon);
        Ok(Stmt::new(StmtKind::Expression(expr), span))
    }

    /// Parse a braced block of statements.
    pub(crate) fn block(&mut self) -> ParseResult<Block> {
        let span = self.expect(&TokenKind::LeftBrace)?.span;
        let mut statements = Vec::new();

        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            statements.push(self.statement()?);
        }

        self.expect(&TokenKind::RightBrace)?;
        Ok(Block { statements, span })
    }

    /// Skip forward to a statement boundary after an error.
    fn synchronize(&mut self) {
        while !self.is_at_end() {
            if self.advance().kind == TokenKind::Semicolon {
                return;
            }
            match self.peek().kind {
                TokenKind::Let | TokenKind::Return => return,
                _ => {}
            }
        }
    }

    // ===== Token manipulation =====

    pub(crate) fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.tokens[self.current - 1].clone()
    }

    pub(crate) fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    pub(crate) fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, kind: &TokenKind) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(ParserError::unexpected_token(
                kind.describe(),
                self.peek().kind.describe(),
                self.current_span(),
            ))
        }
    }

    pub(crate) fn expect_identifier(&mut self) -> ParseResult<String> {
        match &self.peek().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(ParserError::unexpected_token(
                "identifier",
                self.peek().kind.describe(),
                self.current_span(),
            )),
        }
    }

    pub(crate) fn current_span(&self) -> Span {
        self.peek().span
    }
}
