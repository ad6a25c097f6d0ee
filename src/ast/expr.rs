//! Expression AST nodes.
//!
//! `Display` renders every node back to source-like text. The bytecode
//! compiler relies on this rendering to order hash-literal pairs
//! deterministically, so changes here change emitted bytecode.

use std::fmt;

use crate::ast::stmt::Block;
use crate::span::Span;

/// An expression in the AST.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// All expression variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Integer literal: 42
    IntLiteral(i64),
    /// String literal: "hello"
    StringLiteral(String),
    /// Boolean literal: true, false
    BoolLiteral(bool),

    /// Variable reference: foo
    Identifier(String),

    /// Prefix operation: -x, !x
    Prefix { operator: UnaryOp, right: Box<Expr> },

    /// Infix operation: a + b
    Infix {
        left: Box<Expr>,
        operator: BinaryOp,
        right: Box<Expr>,
    },

    /// If expression: if (cond) { ... } else { ... }
    /// Evaluates to the chosen branch's value, or null when the condition is
    /// falsy and there is no else branch.
    If {
        condition: Box<Expr>,
        consequence: Block,
        alternative: Option<Block>,
    },

    /// Function literal: fn(a, b) { ... }
    Function { parameters: Vec<String>, body: Block },

    /// Function call: foo(a, b)
    Call {
        function: Box<Expr>,
        arguments: Vec<Expr>,
    },

    /// Array literal: [1, 2, 3]
    Array(Vec<Expr>),

    /// Hash literal: {"key": value, ...}
    Hash(Vec<(Expr, Expr)>),

    /// Index access: arr[0], hash["key"]
    Index { left: Box<Expr>, index: Box<Expr> },
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Less,
    Greater,
    Equal,
    NotEqual,
}

impl BinaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Less => "<",
            BinaryOp::Greater => ">",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::IntLiteral(value) => write!(f, "{}", value),
            ExprKind::StringLiteral(value) => write!(f, "\"{}\"", value),
            ExprKind::BoolLiteral(value) => write!(f, "{}", value),
            ExprKind::Identifier(name) => f.write_str(name),
            ExprKind::Prefix { operator, right } => write!(f, "({}{})", operator, right),
            ExprKind::Infix {
                left,
                operator,
                right,
            } => write!(f, "({} {} {})", left, operator, right),
            ExprKind::If {
                condition,
                consequence,
                alternative,
            } => {
                write!(f, "if {} {}", condition, consequence)?;
                if let Some(alternative) = alternative {
                    write!(f, " else {}", alternative)?;
                }
                Ok(())
            }
            ExprKind::Function { parameters, body } => {
                write!(f, "fn({}) {}", parameters.join(", "), body)
            }
            ExprKind::Call {
                function,
                arguments,
            } => {
                let args: Vec<String> = arguments.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", function, args.join(", "))
            }
            ExprKind::Array(elements) => {
                let elems: Vec<String> = elements.iter().map(|e| e.to_string()).collect();
                write!(f, "[{}]", elems.join(", "))
            }
            ExprKind::Hash(pairs) => {
                let pairs: Vec<String> = pairs
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v))
                    .collect();
                write!(f, "{{{}}}", pairs.join(", "))
            }
            ExprKind::Index { left, index } => write!(f, "({}[{}])", left, index),
        }
    }
}
