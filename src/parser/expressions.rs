//! Expression parsing using Pratt precedence.

use crate::ast::{BinaryOp, Expr, ExprKind, UnaryOp};
use crate::error::ParserError;
use crate::lexer::TokenKind;

use super::precedence::{get_precedence, Precedence};
use super::{ParseResult, Parser};

impl Parser {
    pub(crate) fn expression(&mut self) -> ParseResult<Expr> {
        self.parse_precedence(Precedence::Equality)
    }

    pub(crate) fn parse_precedence(&mut self, min_precedence: Precedence) -> ParseResult<Expr> {
        let mut left = self.parse_prefix()?;

        while !self.is_at_end() {
            let precedence = get_precedence(&self.peek().kind);
            if precedence < min_precedence {
                break;
            }

            left = self.parse_infix(left, precedence)?;
        }

        Ok(left)
    }

    fn parse_prefix(&mut self) -> ParseResult<Expr> {
        let token = self.advance();
        let span = token.span;

        match &token.kind {
            TokenKind::Int(n) => Ok(Expr::new(ExprKind::IntLiteral(*n), span)),
            TokenKind::Str(s) => Ok(Expr::new(ExprKind::StringLiteral(s.clone()), span)),
            TokenKind::True => Ok(Expr::new(ExprKind::BoolLiteral(true), span)),
            TokenKind::False => Ok(Expr::new(ExprKind::BoolLiteral(false), span)),
            TokenKind::Identifier(name) => Ok(Expr::new(ExprKind::Identifier(name.clone()), span)),

            TokenKind::Minus => self.unary(UnaryOp::Neg, span),
            TokenKind::Bang => self.unary(UnaryOp::Not, span),

            TokenKind::LeftParen => {
                let expr = self.expression()?;
                self.expect(&TokenKind::RightParen)?;
                Ok(expr)
            }

            TokenKind::LeftBracket => self.array(span),
            TokenKind::LeftBrace => self.hash(span),
            TokenKind::If => self.if_expression(span),
            TokenKind::Fn => self.function_literal(span),

            TokenKind::Eof => Err(ParserError::UnexpectedEof(span)),
            kind => Err(ParserError::NoPrefixRule(kind.describe(), span)),
        }
    }

    fn parse_infix(&mut self, left: Expr, precedence: Precedence) -> ParseResult<Expr> {
        let token = self.advance();
        let span = token.span;

        let operator = match &token.kind {
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Sub,
            TokenKind::Star => BinaryOp::Mul,
            TokenKind::Slash => BinaryOp::Div,
            TokenKind::Less => BinaryOp::Less,
            TokenKind::Greater => BinaryOp::Greater,
            TokenKind::EqualEqual => BinaryOp::Equal,
            TokenKind::BangEqual => BinaryOp::NotEqual,

            TokenKind::LeftParen => return self.call(left, span),
            TokenKind::LeftBracket => {
                let index = self.expression()?;
                self.expect(&TokenKind::RightBracket)?;
                return Ok(Expr::new(
                    ExprKind::Index {
                        left: Box::new(left),
                        index: Box::new(index),
                    },
                    span,
                ));
            }

            kind => {
                return Err(ParserError::unexpected_token(
                    "operator",
                    kind.describe(),
                    span,
                ))
            }
        };

        let right = self.parse_precedence(precedence.next())?;
        Ok(Expr::new(
            ExprKind::Infix {
                left: Box::new(left),
                operator,
                right: Box::new(right),
            },
            span,
        ))
    }

    fn unary(&mut self, operator: UnaryOp, span: crate::span::Span) -> ParseResult<Expr> {
        let right = self.parse_precedence(Precedence::Unary)?;
        Ok(Expr::new(
            ExprKind::Prefix {
                operator,
                right: Box::new(right),
            },
            span,
        ))
    }

    fn call(&mut self, function: Expr, span: crate::span::Span) -> ParseResult<Expr> {
        let arguments = self.expression_list(&TokenKind::RightParen)?;
        Ok(Expr::new(
            ExprKind::Call {
                function: Box::new(function),
                arguments,
            },
            span,
        ))
    }

    fn array(&mut self, span: crate::span::Span) -> ParseResult<Expr> {
        let elements = self.expression_list(&TokenKind::RightBracket)?;
        Ok(Expr::new(ExprKind::Array(elements), span))
    }

    fn hash(&mut self, span: crate::span::Span) -> ParseResult<Expr> {
        let mut pairs = Vec::new();

        while !self.check(&TokenKind::RightBrace) {
            let key = self.expression()?;
            self.expect(&TokenKind::Colon)?;
            let value = self.expression()?;
            pairs.push((key, value));

            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        self.expect(&TokenKind::RightBrace)?;
        Ok(Expr::new(ExprKind::Hash(pairs), span))
    }

    fn if_expression(&mut self, span: crate::span::Span) -> ParseResult<Expr> {
        self.expect(&TokenKind::LeftParen)?;
        let condition = self.expression()?;
        self.expect(&TokenKind::RightParen)?;
        let consequence = self.block()?;

        let alternative = if self.match_token(&TokenKind::Else) {
            Some(self.block()?)
        } else {
            None
        };

        Ok(Expr::new(
            ExprKind::If {
                condition: Box::new(condition),
                consequence,
                alternative,
            },
            span,
        ))
    }

    fn function_literal(&mut self, span: crate::span::Span) -> ParseResult<Expr> {
        self.expect(&TokenKind::LeftParen)?;
        let mut parameters = Vec::new();

        while !self.check(&TokenKind::RightParen) {
            parameters.push(self.expect_identifier()?);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        self.expect(&TokenKind::RightParen)?;
        let body = self.block()?;

        Ok(Expr::new(ExprKind::Function { parameters, body }, span))
    }

    /// Parse a comma-separated expression list up to (and including) `end`.
    fn expression_list(&mut self, end: &TokenKind) -> ParseResult<Vec<Expr>> {
        let mut items = Vec::new();

        while !self.check(end) {
            items.push(self.expression()?);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        self.expect(end)?;
        Ok(items)
    }
}
