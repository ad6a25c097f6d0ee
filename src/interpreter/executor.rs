//! Tree-walking interpreter for Gibbon.
//!
//! The alternate execution engine: it walks the AST directly, with no
//! compile step. `return` is modeled as an interrupt riding the error
//! channel, so `?` unwinds it to the nearest call boundary the same way a
//! runtime error unwinds to the caller.

use std::cell::RefCell;
use std::mem;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::{BinaryOp, Block, Expr, ExprKind, Program, Stmt, StmtKind, UnaryOp};
use crate::error::RuntimeError;
use crate::interpreter::environment::Environment;
use crate::value::{builtins, Function, Value};

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Why evaluation stopped early: a `return` unwinding to its call boundary,
/// or a genuine runtime error.
enum Interrupt {
    Return(Value),
    Error(RuntimeError),
}

impl From<RuntimeError> for Interrupt {
    fn from(err: RuntimeError) -> Self {
        Interrupt::Error(err)
    }
}

type EvalResult = Result<Value, Interrupt>;

/// The Gibbon tree-walking interpreter.
pub struct Interpreter {
    environment: Rc<RefCell<Environment>>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            environment: Rc::new(RefCell::new(Environment::new())),
        }
    }

    /// Evaluate a program and return the value of its last statement.
    pub fn interpret(&mut self, program: &Program) -> RuntimeResult<Value> {
        let mut result = Value::Null;
        for stmt in &program.statements {
            match self.execute_statement(stmt) {
                Ok(value) => result = value,
                // A top-level `return` halts the program with its value.
                Err(Interrupt::Return(value)) => return Ok(value),
                Err(Interrupt::Error(err)) => return Err(err),
            }
        }
        Ok(result)
    }

    fn execute_statement(&mut self, stmt: &Stmt) -> EvalResult {
        match &stmt.kind {
            StmtKind::Expression(expr) => self.eval_expression(expr),

            StmtKind::Let { name, value } => {
                let value = self.eval_expression(value)?;
                self.environment.borrow_mut().define(name.clone(), value);
                // A binding is not an expression: blocks and function bodies
                // ending in `let` yield null, as they do under the VM.
                Ok(Value::Null)
            }

            StmtKind::Return(value) => {
                let value = self.eval_expression(value)?;
                Err(Interrupt::Return(value))
            }
        }
    }

    fn execute_block(&mut self, block: &Block) -> EvalResult {
        let mut result = Value::Null;
        for stmt in &block.statements {
            result = self.execute_statement(stmt)?;
        }
        Ok(result)
    }

    fn eval_expression(&mut self, expr: &Expr) -> EvalResult {
        match &expr.kind {
            ExprKind::IntLiteral(value) => Ok(Value::Int(*value)),
            ExprKind::StringLiteral(value) => Ok(Value::Str(Rc::new(value.clone()))),
            ExprKind::BoolLiteral(value) => Ok(Value::Bool(*value)),

            ExprKind::Identifier(name) => self.resolve_identifier(name),

            ExprKind::Prefix { operator, right } => {
                let right = self.eval_expression(right)?;
                self.eval_prefix(*operator, right)
            }

            ExprKind::Infix {
                left,
                operator,
                right,
            } => {
                let left = self.eval_expression(left)?;
                let right = self.eval_expression(right)?;
                self.eval_infix(*operator, left, right)
            }

            ExprKind::If {
                condition,
                consequence,
                alternative,
            } => {
                let condition = self.eval_expression(condition)?;
                if condition.is_truthy() {
                    self.execute_block(consequence)
                } else if let Some(alternative) = alternative {
                    self.execute_block(alternative)
                } else {
                    Ok(Value::Null)
                }
            }

            ExprKind::Function { parameters, body } => Ok(Value::Function(Rc::new(Function {
                parameters: parameters.clone(),
                body: body.clone(),
                env: self.environment.clone(),
            }))),

            ExprKind::Call {
                function,
                arguments,
            } => {
                let callee = self.eval_expression(function)?;
                let mut args = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    args.push(self.eval_expression(argument)?);
                }
                self.call(callee, args)
            }

            ExprKind::Array(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.eval_expression(element)?);
                }
                Ok(Value::Array(Rc::new(values)))
            }

            ExprKind::Hash(pairs) => {
                let mut hash = IndexMap::with_capacity(pairs.len());
                for (key, value) in pairs {
                    let key = self.eval_expression(key)?;
                    let hash_key = key.hash_key().ok_or_else(|| {
                        RuntimeError::UnusableHashKey(key.type_name().to_string())
                    })?;
                    let value = self.eval_expression(value)?;
                    hash.insert(hash_key, value);
                }
                Ok(Value::Hash(Rc::new(hash)))
            }

            ExprKind::Index { left, index } => {
                let left = self.eval_expression(left)?;
                let index = self.eval_expression(index)?;
                self.eval_index(left, index)
            }
        }
    }

    fn resolve_identifier(&self, name: &str) -> EvalResult {
        if let Some(value) = self.environment.borrow().get(name) {
            return Ok(value);
        }
        if let Some(builtin) = builtins::lookup(name) {
            return Ok(Value::Builtin(builtin));
        }
        Err(RuntimeError::IdentifierNotFound(name.to_string()).into())
    }

    fn eval_prefix(&self, operator: UnaryOp, right: Value) -> EvalResult {
        match operator {
            UnaryOp::Not => Ok(Value::Bool(!right.is_truthy())),
            UnaryOp::Neg => match right {
                Value::Int(n) => Ok(Value::Int(-n)),
                other => {
                    Err(RuntimeError::UnsupportedNegation(other.type_name().to_string()).into())
                }
            },
        }
    }

    fn eval_infix(&self, operator: BinaryOp, left: Value, right: Value) -> EvalResult {
        match operator {
            BinaryOp::Equal => return Ok(Value::Bool(left.language_eq(&right))),
            BinaryOp::NotEqual => return Ok(Value::Bool(!left.language_eq(&right))),
            _ => {}
        }

        match (&left, &right) {
            (Value::Int(a), Value::Int(b)) => Self::integer_infix(operator, *a, *b),
            (Value::Str(a), Value::Str(b)) => {
                if operator == BinaryOp::Add {
                    Ok(Value::Str(Rc::new(format!("{}{}", a, b))))
                } else {
                    Err(RuntimeError::UnknownInfixOperator {
                        operator: operator.as_str().to_string(),
                        left: left.type_name().to_string(),
                        right: right.type_name().to_string(),
                    }
                    .into())
                }
            }
            _ => Err(RuntimeError::UnsupportedBinary {
                left: left.type_name().to_string(),
                right: right.type_name().to_string(),
            }
            .into()),
        }
    }

    fn integer_infix(operator: BinaryOp, a: i64, b: i64) -> EvalResult {
        let result = match operator {
            BinaryOp::Add => Value::Int(a + b),
            BinaryOp::Sub => Value::Int(a - b),
            BinaryOp::Mul => Value::Int(a * b),
            BinaryOp::Div => {
                if b == 0 {
                    return Err(RuntimeError::DivisionByZero.into());
                }
                Value::Int(a / b)
            }
            BinaryOp::Less => Value::Bool(a < b),
            BinaryOp::Greater => Value::Bool(a > b),
            BinaryOp::Equal | BinaryOp::NotEqual => unreachable!("handled before dispatch"),
        };
        Ok(result)
    }

    fn eval_index(&self, left: Value, index: Value) -> EvalResult {
        match (&left, &index) {
            (Value::Array(elements), Value::Int(i)) => {
                if *i < 0 || *i as usize >= elements.len() {
                    Ok(Value::Null)
                } else {
                    Ok(elements[*i as usize].clone())
                }
            }
            (Value::Hash(pairs), key) => {
                let key = key
                    .hash_key()
                    .ok_or_else(|| RuntimeError::UnusableHashKey(key.type_name().to_string()))?;
                Ok(pairs.get(&key).cloned().unwrap_or(Value::Null))
            }
            _ => Err(RuntimeError::NotIndexable(left.type_name().to_string()).into()),
        }
    }

    fn call(&mut self, callee: Value, args: Vec<Value>) -> EvalResult {
        match callee {
            Value::Function(function) => {
                if args.len() != function.parameters.len() {
                    return Err(RuntimeError::WrongArity {
                        want: function.parameters.len(),
                        got: args.len(),
                    }
                    .into());
                }

                let mut env = Environment::with_enclosing(function.env.clone());
                for (parameter, arg) in function.parameters.iter().zip(args) {
                    env.define(parameter.clone(), arg);
                }

                let previous =
                    mem::replace(&mut self.environment, Rc::new(RefCell::new(env)));
                let result = self.execute_block(&function.body);
                self.environment = previous;

                match result {
                    // A `return` unwinds no further than its function.
                    Err(Interrupt::Return(value)) => Ok(value),
                    other => other,
                }
            }

            Value::Builtin(builtin) => Ok((builtin.func)(&args)),

            other => Err(RuntimeError::NotCallable(other.type_name().to_string()).into()),
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Scanner;
    use crate::parser::Parser;

    fn run(source: &str) -> Value {
        let tokens = Scanner::new(source).scan_tokens().expect("lexer error");
        let program = Parser::new(tokens).parse().expect("parser error");
        Interpreter::new()
            .interpret(&program)
            .expect("runtime error")
    }

    fn run_err(source: &str) -> RuntimeError {
        let tokens = Scanner::new(source).scan_tokens().expect("lexer error");
        let program = Parser::new(tokens).parse().expect("parser error");
        Interpreter::new()
            .interpret(&program)
            .expect_err("expected runtime error")
    }

    fn int(n: i64) -> Value {
        Value::Int(n)
    }

    #[test]
    fn arithmetic_and_comparison() {
        assert_eq!(run("5 + 5 + 5 + 5 - 10"), int(10));
        assert_eq!(run("2 * (5 + 10)"), int(30));
        assert_eq!(run("(5 + 10 * 2 + 15 / 3) * 2 + -10"), int(50));
        assert_eq!(run("1 < 2"), Value::Bool(true));
        assert_eq!(run("1 != 2"), Value::Bool(true));
        assert_eq!(run("!!true"), Value::Bool(true));
    }

    #[test]
    fn conditionals() {
        assert_eq!(run("if (true) { 10 }"), int(10));
        assert_eq!(run("if (false) { 10 }"), Value::Null);
        assert_eq!(run("if (1 < 2) { 10 } else { 20 }"), int(10));
    }

    #[test]
    fn return_statements_unwind_nested_blocks() {
        assert_eq!(run("return 10; 9;"), int(10));
        assert_eq!(
            run("let f = fn() { if (true) { if (true) { return 10; } return 1; } }; f()"),
            int(10)
        );
    }

    #[test]
    fn let_bindings_and_functions() {
        assert_eq!(run("let a = 5; let b = a; a + b"), int(10));
        assert_eq!(run("let double = fn(x) { x * 2 }; double(5)"), int(10));
        assert_eq!(run("fn(x) { x }(5)"), int(5));
    }

    #[test]
    fn closures_share_their_defining_environment() {
        assert_eq!(
            run("let newAdder = fn(a) { fn(b) { a + b } }; newAdder(2)(3)"),
            int(5)
        );
        // A binding defined after the closure is still visible through the
        // shared environment chain - by-reference capture, unlike the VM.
        assert_eq!(
            run("let f = fn() { g() }; let g = fn() { 42 }; f()"),
            int(42)
        );
    }

    #[test]
    fn local_recursion_resolves_through_shared_environments() {
        assert_eq!(
            run("let wrap = fn() { let g = fn(x) { if (x == 0) { 0 } else { g(x - 1) } }; g(3) }; wrap()"),
            int(0)
        );
    }

    #[test]
    fn strings_arrays_and_hashes() {
        assert_eq!(
            run(r#""Hello" + " " + "World!""#),
            Value::Str(Rc::new("Hello World!".to_string()))
        );
        assert_eq!(run("[1, 2 * 2, 3 + 3][2]"), int(6));
        assert_eq!(run(r#"let h = {"a": 1, 2: true}; h["a"]"#), int(1));
        assert_eq!(run("{1: 1}[2]"), Value::Null);
    }

    #[test]
    fn builtin_functions() {
        assert_eq!(run(r#"len("hello")"#), int(5));
        assert_eq!(run("head([3, 2, 1])"), int(3));
        assert_eq!(
            run("len(1)"),
            Value::Error(Rc::new(
                "argument to 'len' not supported, got INTEGER".to_string()
            ))
        );
    }

    #[test]
    fn runtime_errors() {
        assert_eq!(
            run_err("5 + true").to_string(),
            "unsupported types for binary operation: INTEGER BOOLEAN"
        );
        assert_eq!(
            run_err("foobar").to_string(),
            "identifier not found: foobar"
        );
        assert_eq!(run_err("1 / 0").to_string(), "division by zero");
        assert_eq!(
            run_err("let f = fn(a) { a }; f()").to_string(),
            "wrong number of arguments: want=1, got=0"
        );
    }
}
