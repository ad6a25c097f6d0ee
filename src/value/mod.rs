//! Runtime values shared by both execution engines.
//!
//! One closed `Value` enum serves the tree-walking interpreter and the
//! bytecode VM alike; compiled functions and closures are ordinary values so
//! they can live in a constant pool next to integers and strings. `Display`
//! is the user-facing `inspect` rendering the REPL prints.

pub mod builtins;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::Block;
use crate::interpreter::Environment;

pub use builtins::{Builtin, BuiltinFn, BUILTINS};

/// A runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Str(Rc<String>),
    Bool(bool),
    Null,
    /// Immutable-by-convention array; `push` returns a new one.
    Array(Rc<Vec<Value>>),
    /// Hash with insertion-ordered pairs; keys compare by content.
    Hash(Rc<IndexMap<HashKey, Value>>),
    /// An interpreter function literal with its captured environment.
    Function(Rc<Function>),
    /// A host-provided function from the fixed registry.
    Builtin(&'static Builtin),
    /// Compiled bytecode for one function literal.
    CompiledFunction(Rc<CompiledFunction>),
    /// A compiled function plus the free variables captured at creation.
    Closure(Rc<Closure>),
    /// An in-language error value, observable by the running program.
    Error(Rc<String>),
}

/// A function value in the tree-walking engine. Captures its defining
/// environment by reference, so later rebindings in that environment are
/// visible inside the body - unlike VM closures, which copy their free
/// variables when the closure is created.
#[derive(Clone)]
pub struct Function {
    pub parameters: Vec<String>,
    pub body: Block,
    pub env: Rc<RefCell<Environment>>,
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The environment is omitted: closures routinely point back at the
        // environment that stores them.
        f.debug_struct("Function")
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// The compiled form of a function literal: its own instruction stream plus
/// the frame layout the VM must reserve for it.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFunction {
    pub instructions: Vec<u8>,
    pub num_locals: usize,
    pub num_parameters: usize,
}

/// A runtime closure: compiled function + captured free variables.
#[derive(Debug, Clone)]
pub struct Closure {
    pub function: Rc<CompiledFunction>,
    pub free: Vec<Value>,
}

/// A hashable key. Only integers, booleans and strings can key a hash;
/// equal-content values are the same key even when they are distinct
/// instances.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashKey {
    Int(i64),
    Str(String),
    Bool(bool),
}

impl fmt::Display for HashKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashKey::Int(n) => write!(f, "{}", n),
            HashKey::Str(s) => f.write_str(s),
            HashKey::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl Value {
    /// The value's type tag, as used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "INTEGER",
            Value::Str(_) => "STRING",
            Value::Bool(_) => "BOOLEAN",
            Value::Null => "NULL",
            Value::Array(_) => "ARRAY",
            Value::Hash(_) => "HASH",
            Value::Function(_) => "FUNCTION",
            Value::Builtin(_) => "BUILTIN",
            Value::CompiledFunction(_) => "COMPILED_FUNCTION",
            Value::Closure(_) => "CLOSURE",
            Value::Error(_) => "ERROR",
        }
    }

    /// Only `false` and `null` are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Bool(false) | Value::Null)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// The key this value contributes to a hash, if it is hashable.
    pub fn hash_key(&self) -> Option<HashKey> {
        match self {
            Value::Int(n) => Some(HashKey::Int(*n)),
            Value::Str(s) => Some(HashKey::Str(s.as_ref().clone())),
            Value::Bool(b) => Some(HashKey::Bool(*b)),
            _ => None,
        }
    }

    /// Equality as the language's `==` sees it: integers, booleans, strings
    /// and null compare by content; arrays, hashes and function-like values
    /// compare by identity. Both engines share this definition.
    pub fn language_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Hash(a), Value::Hash(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::CompiledFunction(a), Value::CompiledFunction(b)) => Rc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => std::ptr::eq(*a, *b),
            (Value::Error(a), Value::Error(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Structural equality for tests and collections. Distinct from
/// [`Value::language_eq`], which compares containers by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Hash(a), Value::Hash(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::CompiledFunction(a), Value::CompiledFunction(b)) => a == b,
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => std::ptr::eq(*a, *b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Str(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Null => f.write_str("null"),
            Value::Array(elements) => {
                write!(f, "[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", element)?;
                }
                write!(f, "]")
            }
            Value::Hash(pairs) => {
                write!(f, "{{")?;
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            Value::Function(function) => {
                write!(f, "<fn({})>", function.parameters.join(", "))
            }
            Value::Builtin(builtin) => write!(f, "<builtin {}>", builtin.name),
            Value::CompiledFunction(_) => f.write_str("<compiled fn>"),
            Value::Closure(_) => f.write_str("<closure>"),
            Value::Error(message) => write!(f, "ERROR: {}", message),
        }
    }
}
