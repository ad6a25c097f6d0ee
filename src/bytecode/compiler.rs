//! Bytecode compiler: transforms AST into bytecode.
//!
//! A single pass over the AST. Forward references (jump targets) are handled
//! by emitting a placeholder operand and overwriting it in place once the
//! target offset is known. Each function literal compiles in its own scope
//! with its own instruction buffer and symbol table; the buffers of finished
//! functions end up in the constant pool as `CompiledFunction` values.

use std::mem;
use std::rc::Rc;

use crate::ast::{BinaryOp, Block, Expr, ExprKind, Program, Stmt, StmtKind, UnaryOp};
use crate::bytecode::instruction::{make, OpCode};
use crate::bytecode::symbols::{Symbol, SymbolScope, SymbolTable};
use crate::error::CompileError;
use crate::value::{builtins, CompiledFunction, Value};

/// Result type for compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// Placeholder operand for jumps that have not been backpatched yet.
const PLACEHOLDER: usize = 0xFFFF;

/// The compiler's output: an instruction stream plus the constant pool it
/// references. Constant indices are stable once emitted.
#[derive(Debug, Clone)]
pub struct Bytecode {
    pub instructions: Vec<u8>,
    pub constants: Vec<Value>,
}

/// The opcode and byte position of an emitted instruction.
#[derive(Debug, Clone, Copy)]
struct EmittedInstruction {
    opcode: OpCode,
    position: usize,
}

/// Compilation context for one function nesting level.
#[derive(Debug, Default)]
struct CompilationScope {
    instructions: Vec<u8>,
    /// The last emitted instruction and the one before it. Needed to remove
    /// or rewrite a trailing `Pop` after a branch or function body.
    last: Option<EmittedInstruction>,
    previous: Option<EmittedInstruction>,
}

/// Symbol table and constant pool threaded across REPL lines, so successive
/// compilations accumulate one shared state.
#[derive(Debug)]
pub struct CompilerState {
    symbols: SymbolTable,
    constants: Vec<Value>,
}

impl CompilerState {
    pub fn new() -> Self {
        let mut symbols = SymbolTable::new();
        for (index, builtin) in builtins::BUILTINS.iter().enumerate() {
            symbols.define_builtin(index, builtin.name);
        }
        Self {
            symbols,
            constants: Vec::new(),
        }
    }
}

impl Default for CompilerState {
    fn default() -> Self {
        Self::new()
    }
}

/// The bytecode compiler.
pub struct Compiler {
    constants: Vec<Value>,
    symbols: SymbolTable,
    /// One entry per function nesting level; index 0 is the main program.
    scopes: Vec<CompilationScope>,
}

impl Compiler {
    /// Create a compiler with fresh state.
    pub fn new() -> Self {
        Self::with_state(CompilerState::new())
    }

    /// Create a compiler that continues from accumulated REPL state.
    pub fn with_state(state: CompilerState) -> Self {
        Self {
            constants: state.constants,
            symbols: state.symbols,
            scopes: vec![CompilationScope::default()],
        }
    }

    /// Compile a program, leaving the result retrievable via [`bytecode`].
    /// The first error aborts compilation.
    ///
    /// [`bytecode`]: Compiler::bytecode
    pub fn compile(&mut self, program: &Program) -> CompileResult<()> {
        for stmt in &program.statements {
            self.compile_statement(stmt)?;
        }
        Ok(())
    }

    /// The instructions and constants compiled so far.
    pub fn bytecode(&self) -> Bytecode {
        Bytecode {
            instructions: self.current_scope().instructions.clone(),
            constants: self.constants.clone(),
        }
    }

    /// Surrender the symbol table and constant pool for the next REPL line.
    pub fn into_state(self) -> CompilerState {
        CompilerState {
            symbols: self.symbols,
            constants: self.constants,
        }
    }

    // ===== Statements =====

    fn compile_statement(&mut self, stmt: &Stmt) -> CompileResult<()> {
        match &stmt.kind {
            StmtKind::Expression(expr) => {
                self.compile_expression(expr)?;
                self.emit(OpCode::Pop, &[]);
            }

            StmtKind::Let { name, value } => {
                // Defined before the value compiles so a global function can
                // refer to itself by name in its own body.
                let symbol = self.symbols.define(name);
                self.compile_expression(value)?;
                match symbol.scope {
                    SymbolScope::Global => self.emit(OpCode::SetGlobal, &[symbol.index]),
                    _ => self.emit(OpCode::SetLocal, &[symbol.index]),
                };
            }

            StmtKind::Return(value) => {
                self.compile_expression(value)?;
                self.emit(OpCode::ReturnValue, &[]);
            }
        }
        Ok(())
    }

    fn compile_block(&mut self, block: &Block) -> CompileResult<()> {
        for stmt in &block.statements {
            self.compile_statement(stmt)?;
        }
        Ok(())
    }

    // ===== Expressions =====

    fn compile_expression(&mut self, expr: &Expr) -> CompileResult<()> {
        match &expr.kind {
            ExprKind::IntLiteral(value) => {
                let index = self.add_constant(Value::Int(*value));
                self.emit(OpCode::Constant, &[index]);
            }

            ExprKind::StringLiteral(value) => {
                let index = self.add_constant(Value::Str(Rc::new(value.clone())));
                self.emit(OpCode::Constant, &[index]);
            }

            ExprKind::BoolLiteral(value) => {
                if *value {
                    self.emit(OpCode::True, &[]);
                } else {
                    self.emit(OpCode::False, &[]);
                }
            }

            ExprKind::Identifier(name) => {
                let symbol = self
                    .symbols
                    .resolve(name)
                    .ok_or_else(|| CompileError::UndefinedVariable(name.clone()))?;
                self.load_symbol(&symbol);
            }

            ExprKind::Prefix { operator, right } => {
                self.compile_expression(right)?;
                match operator {
                    UnaryOp::Not => self.emit(OpCode::Bang, &[]),
                    UnaryOp::Neg => self.emit(OpCode::Minus, &[]),
                };
            }

            ExprKind::Infix {
                left,
                operator,
                right,
            } => self.compile_infix(left, *operator, right)?,

            ExprKind::If {
                condition,
                consequence,
                alternative,
            } => self.compile_if(condition, consequence, alternative.as_ref())?,

            ExprKind::Function { parameters, body } => {
                self.compile_function(parameters, body)?;
            }

            ExprKind::Call {
                function,
                arguments,
            } => {
                self.compile_expression(function)?;
                for argument in arguments {
                    self.compile_expression(argument)?;
                }
                self.emit(OpCode::Call, &[arguments.len()]);
            }

            ExprKind::Array(elements) => {
                for element in elements {
                    self.compile_expression(element)?;
                }
                self.emit(OpCode::Array, &[elements.len()]);
            }

            ExprKind::Hash(pairs) => {
                // Pairs compile in the textual order of their keys so the
                // same literal always produces the same bytecode.
                let mut pairs: Vec<&(Expr, Expr)> = pairs.iter().collect();
                pairs.sort_by_key(|(key, _)| key.to_string());
                for (key, value) in &pairs {
                    self.compile_expression(key)?;
                    self.compile_expression(value)?;
                }
                self.emit(OpCode::Hash, &[pairs.len() * 2]);
            }

            ExprKind::Index { left, index } => {
                self.compile_expression(left)?;
                self.compile_expression(index)?;
                self.emit(OpCode::Index, &[]);
            }
        }
        Ok(())
    }

    fn compile_infix(&mut self, left: &Expr, operator: BinaryOp, right: &Expr) -> CompileResult<()> {
        // `<` compiles as `>` with the operands swapped; there is no
        // LessThan opcode.
        if operator == BinaryOp::Less {
            self.compile_expression(right)?;
            self.compile_expression(left)?;
            self.emit(OpCode::GreaterThan, &[]);
            return Ok(());
        }

        self.compile_expression(left)?;
        self.compile_expression(right)?;

        match operator {
            BinaryOp::Add => self.emit(OpCode::Add, &[]),
            BinaryOp::Sub => self.emit(OpCode::Sub, &[]),
            BinaryOp::Mul => self.emit(OpCode::Mul, &[]),
            BinaryOp::Div => self.emit(OpCode::Div, &[]),
            BinaryOp::Greater => self.emit(OpCode::GreaterThan, &[]),
            BinaryOp::Equal => self.emit(OpCode::Equal, &[]),
            BinaryOp::NotEqual => self.emit(OpCode::NotEqual, &[]),
            BinaryOp::Less => unreachable!("handled above"),
        };
        Ok(())
    }

    fn compile_if(
        &mut self,
        condition: &Expr,
        consequence: &Block,
        alternative: Option<&Block>,
    ) -> CompileResult<()> {
        self.compile_expression(condition)?;

        let jump_not_truthy = self.emit(OpCode::JumpNotTruthy, &[PLACEHOLDER]);

        self.compile_branch(consequence)?;

        let jump = self.emit(OpCode::Jump, &[PLACEHOLDER]);

        let after_consequence = self.current_scope().instructions.len();
        self.change_operand(jump_not_truthy, after_consequence);

        match alternative {
            // `if` without `else` evaluates to null when the condition fails.
            None => {
                self.emit(OpCode::Null, &[]);
            }
            Some(alternative) => self.compile_branch(alternative)?,
        }

        let after_alternative = self.current_scope().instructions.len();
        self.change_operand(jump, after_alternative);
        Ok(())
    }

    /// Compile one if-branch. If expressions are expressions: the branch
    /// value must stay on the stack instead of being discarded by the
    /// statement-level Pop, and a branch that bound or did nothing still
    /// has to leave a value for the surrounding expression.
    fn compile_branch(&mut self, block: &Block) -> CompileResult<()> {
        self.compile_block(block)?;
        if self.last_instruction_is(OpCode::Pop) {
            self.remove_last_pop();
        } else if !self.last_instruction_is(OpCode::ReturnValue) {
            self.emit(OpCode::Null, &[]);
        }
        Ok(())
    }

    fn compile_function(&mut self, parameters: &[String], body: &Block) -> CompileResult<()> {
        self.enter_scope();

        for parameter in parameters {
            self.symbols.define(parameter);
        }

        self.compile_block(body)?;

        // A trailing Pop means the body ended in an expression statement:
        // its value becomes the implicit return value.
        if self.last_instruction_is(OpCode::Pop) {
            self.replace_last_pop_with_return();
        }
        if !self.last_instruction_is(OpCode::ReturnValue) {
            self.emit(OpCode::Return, &[]);
        }

        // Read before the scope's symbol table is discarded.
        let free = mem::take(&mut self.symbols.free);
        let num_locals = self.symbols.definition_count;
        let instructions = self.leave_scope();

        // Push the captured values in the enclosing scope; Closure pops them.
        for symbol in &free {
            self.load_symbol(symbol);
        }

        let function = CompiledFunction {
            instructions,
            num_locals,
            num_parameters: parameters.len(),
        };
        let index = self.add_constant(Value::CompiledFunction(Rc::new(function)));
        self.emit(OpCode::Closure, &[index, free.len()]);
        Ok(())
    }

    fn load_symbol(&mut self, symbol: &Symbol) {
        match symbol.scope {
            SymbolScope::Global => self.emit(OpCode::GetGlobal, &[symbol.index]),
            SymbolScope::Local => self.emit(OpCode::GetLocal, &[symbol.index]),
            SymbolScope::Builtin => self.emit(OpCode::GetBuiltin, &[symbol.index]),
            SymbolScope::Free => self.emit(OpCode::GetFree, &[symbol.index]),
        };
    }

    // ===== Scope management =====

    fn enter_scope(&mut self) {
        self.scopes.push(CompilationScope::default());
        let outer = mem::take(&mut self.symbols);
        self.symbols = SymbolTable::enclosed(outer);
    }

    fn leave_scope(&mut self) -> Vec<u8> {
        let scope = self.scopes.pop().unwrap_or_default();
        let table = mem::take(&mut self.symbols);
        self.symbols = table.into_outer().unwrap_or_default();
        scope.instructions
    }

    fn current_scope(&self) -> &CompilationScope {
        self.scopes.last().expect("scope stack is never empty")
    }

    fn current_scope_mut(&mut self) -> &mut CompilationScope {
        self.scopes.last_mut().expect("scope stack is never empty")
    }

    // ===== Bytecode emission =====

    /// Add a constant to the pool and return its index.
    fn add_constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }

    /// Emit an instruction into the current scope; returns its byte position.
    fn emit(&mut self, op: OpCode, operands: &[usize]) -> usize {
        let instruction = make(op, operands);
        let scope = self.current_scope_mut();
        let position = scope.instructions.len();
        scope.instructions.extend_from_slice(&instruction);
        scope.previous = scope.last;
        scope.last = Some(EmittedInstruction {
            opcode: op,
            position,
        });
        position
    }

    fn last_instruction_is(&self, op: OpCode) -> bool {
        matches!(self.current_scope().last, Some(last) if last.opcode == op)
    }

    /// Drop the last emitted instruction and roll the tracking back one.
    fn remove_last_pop(&mut self) {
        let scope = self.current_scope_mut();
        if let Some(last) = scope.last {
            scope.instructions.truncate(last.position);
            scope.last = scope.previous;
            scope.previous = None;
        }
    }

    /// Rewrite the trailing Pop into ReturnValue in place (both are
    /// single-byte instructions).
    fn replace_last_pop_with_return(&mut self) {
        let scope = self.current_scope_mut();
        if let Some(last) = &mut scope.last {
            scope.instructions[last.position] = OpCode::ReturnValue as u8;
            last.opcode = OpCode::ReturnValue;
        }
    }

    /// Backpatch the operand of the instruction at `position`.
    fn change_operand(&mut self, position: usize, operand: usize) {
        let scope = self.current_scope_mut();
        let op = OpCode::from_u8(scope.instructions[position])
            .expect("patching an instruction the compiler did not emit");
        let instruction = make(op, &[operand]);
        scope.instructions[position..position + instruction.len()]
            .copy_from_slice(&instruction);
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}
