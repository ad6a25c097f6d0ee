//! Error types for all phases.
//!
//! Failure handling is three-tiered: lexer/parser/compile errors abort the
//! phase that produced them, runtime errors abort the current `run`, and
//! builtin misuse is not an error at this level at all - builtins return an
//! in-language `Value::Error` the running program can observe.

use crate::span::Span;
use thiserror::Error;

/// Lexer errors.
#[derive(Debug, Error)]
pub enum LexerError {
    #[error("Unexpected character '{0}' at {1}")]
    UnexpectedChar(char, Span),

    #[error("Unterminated string at {0}")]
    UnterminatedString(Span),
}

impl LexerError {
    pub fn span(&self) -> Span {
        match self {
            Self::UnexpectedChar(_, span) => *span,
            Self::UnterminatedString(span) => *span,
        }
    }
}

/// Parser errors. The parser collects several of these per parse instead of
/// stopping at the first one.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("Unexpected token '{found}', expected {expected} at {span}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("Unexpected end of input at {0}")]
    UnexpectedEof(Span),

    #[error("No parse rule for token '{0}' at {1}")]
    NoPrefixRule(String, Span),
}

impl ParserError {
    pub fn unexpected_token(
        expected: impl Into<String>,
        found: impl Into<String>,
        span: Span,
    ) -> Self {
        Self::UnexpectedToken {
            expected: expected.into(),
            found: found.into(),
            span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::UnexpectedToken { span, .. } => *span,
            Self::UnexpectedEof(span) => *span,
            Self::NoPrefixRule(_, span) => *span,
        }
    }
}

/// Bytecode compilation errors. Compilation aborts on the first one.
/// Unknown operators cannot reach the compiler - the AST's operator enums
/// are closed - so the only way to fail here is an unresolved name.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Variable '{0}' is undefined")]
    UndefinedVariable(String),
}

/// Runtime errors, from either engine. One of these halts the run; the VM
/// instance that produced it cannot be resumed.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("stack overflow")]
    StackOverflow,

    #[error("frame overflow: maximum call depth exceeded")]
    FrameOverflow,

    #[error("undefined opcode: {0}")]
    UnknownOpcode(u8),

    #[error("unsupported types for binary operation: {left} {right}")]
    UnsupportedBinary { left: String, right: String },

    #[error("unknown operator: {operator} ({left} {right})")]
    UnknownInfixOperator {
        operator: String,
        left: String,
        right: String,
    },

    #[error("unsupported type for negation: {0}")]
    UnsupportedNegation(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("calling non-function: {0}")]
    NotCallable(String),

    #[error("not a function: {0}")]
    NotAFunction(String),

    #[error("wrong number of arguments: want={want}, got={got}")]
    WrongArity { want: usize, got: usize },

    #[error("unusable as hash key: {0}")]
    UnusableHashKey(String),

    #[error("index operator not supported: {0}")]
    NotIndexable(String),

    #[error("identifier not found: {0}")]
    IdentifierNotFound(String),
}

/// A unified error type for the CLI and REPL layers.
#[derive(Debug, Error)]
pub enum GibbonError {
    #[error("Lexer error: {0}")]
    Lexer(#[from] LexerError),

    #[error("Parse error: {0}")]
    Parser(#[from] ParserError),

    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}
