//! Bytecode module for the Gibbon VM.
//!
//! This module is the compile-and-execute engine: a single-pass compiler
//! turns the AST into byte-encoded instructions plus a constant pool, and a
//! stack-based virtual machine executes them. The tree-walking interpreter
//! in `crate::interpreter` is the independent alternative engine.
//!
//! # Architecture
//!
//! - `instruction`: opcode definitions and operand encoding/decoding
//! - `disassembler`: debug output for instruction streams
//! - `symbols`: scope-aware symbol tables with free-variable capture
//! - `compiler`: transforms AST into bytecode
//! - `frame`: per-invocation call frames
//! - `vm`: the stack machine executing bytecode

pub mod compiler;
pub mod disassembler;
pub mod frame;
pub mod instruction;
pub mod symbols;
pub mod vm;

pub use compiler::{Bytecode, Compiler, CompilerState};
pub use disassembler::disassemble;
pub use instruction::OpCode;
pub use symbols::{Symbol, SymbolScope, SymbolTable};
pub use vm::{new_globals, Globals, Vm};
