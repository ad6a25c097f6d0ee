//! Stack-based virtual machine for executing bytecode.
//!
//! The fetch-decode-execute loop runs relative to the topmost call frame;
//! calls and returns are the only way the instruction pointer moves between
//! instruction streams. One operand stack is shared by every frame: a
//! frame's locals live in the stack slots starting at its base pointer.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::bytecode::compiler::Bytecode;
use crate::bytecode::frame::Frame;
use crate::bytecode::instruction::{self, OpCode};
use crate::error::RuntimeError;
use crate::value::{builtins, Builtin, Closure, CompiledFunction, Value};

/// Maximum operand stack depth.
pub const STACK_SIZE: usize = 2048;
/// Capacity of the globals array.
pub const GLOBALS_SIZE: usize = 65536;
/// Maximum call depth.
pub const MAX_FRAMES: usize = 1024;

const TRUE: Value = Value::Bool(true);
const FALSE: Value = Value::Bool(false);
const NULL: Value = Value::Null;

/// Result type for VM operations.
pub type VmResult<T> = Result<T, RuntimeError>;

/// The globals array, shareable across successive VM instances so a REPL
/// can keep `let` bindings alive between lines. Callers must serialize
/// `run` calls; the VM is single-threaded by design.
pub type Globals = Rc<RefCell<Vec<Value>>>;

/// A fresh globals array of the fixed capacity.
pub fn new_globals() -> Globals {
    Rc::new(RefCell::new(vec![Value::Null; GLOBALS_SIZE]))
}

/// Fixed-capacity operand stack. `pop` moves the pointer without clearing
/// the slot; `last_popped` reads the slot just above the pointer, which is
/// how the VM's final result is fetched after the program's trailing Pop.
#[derive(Debug)]
struct Stack {
    items: Vec<Value>,
    sp: usize,
}

impl Stack {
    fn new() -> Self {
        Self {
            items: vec![Value::Null; STACK_SIZE],
            sp: 0,
        }
    }

    fn push(&mut self, value: Value) -> VmResult<()> {
        if self.sp >= STACK_SIZE {
            return Err(RuntimeError::StackOverflow);
        }
        self.items[self.sp] = value;
        self.sp += 1;
        Ok(())
    }

    fn top(&self) -> &Value {
        &self.items[self.sp - 1]
    }

    fn pop(&mut self) -> Value {
        let value = self.top().clone();
        self.sp -= 1;
        value
    }

    /// The value most recently popped off the stack.
    fn last_popped(&self) -> Value {
        self.items[self.sp].clone()
    }

    fn get(&self, index: usize) -> Value {
        self.items[index].clone()
    }

    fn set(&mut self, index: usize, value: Value) {
        self.items[index] = value;
    }

    fn slice(&self, start: usize, end: usize) -> &[Value] {
        &self.items[start..end]
    }

    fn sp(&self) -> usize {
        self.sp
    }

    fn set_sp(&mut self, sp: usize) {
        self.sp = sp;
    }
}

/// The bytecode virtual machine.
pub struct Vm {
    constants: Vec<Value>,
    stack: Stack,
    globals: Globals,
    frames: Vec<Frame>,
}

impl Vm {
    /// Create a VM with its own fresh globals array.
    pub fn new(bytecode: Bytecode) -> Self {
        Self::with_globals(bytecode, new_globals())
    }

    /// Create a VM over a shared globals array (REPL binding persistence).
    pub fn with_globals(bytecode: Bytecode, globals: Globals) -> Self {
        let main_function = Rc::new(CompiledFunction {
            instructions: bytecode.instructions,
            num_locals: 0,
            num_parameters: 0,
        });
        let main_closure = Rc::new(Closure {
            function: main_function,
            free: Vec::new(),
        });

        let mut frames = Vec::with_capacity(MAX_FRAMES);
        frames.push(Frame::new(main_closure, 0));

        Self {
            constants: bytecode.constants,
            stack: Stack::new(),
            globals,
            frames,
        }
    }

    /// The last value popped off the stack: the externally observable result
    /// of the program or REPL line that just ran.
    pub fn result(&self) -> Value {
        self.stack.last_popped()
    }

    /// Execute until the outermost frame's instruction stream is exhausted.
    /// An error aborts execution; the instance cannot be resumed afterwards.
    pub fn run(&mut self) -> VmResult<()> {
        while self.current_frame().ip < self.current_frame().instructions().len() {
            let byte = self.read_byte();
            let op = OpCode::from_u8(byte).ok_or(RuntimeError::UnknownOpcode(byte))?;

            match op {
                OpCode::Pop => {
                    self.stack.pop();
                }

                OpCode::Constant => {
                    let index = self.read_u16_operand();
                    let constant = self.constants[index].clone();
                    self.stack.push(constant)?;
                }

                OpCode::True => self.stack.push(TRUE)?,
                OpCode::False => self.stack.push(FALSE)?,
                OpCode::Null => self.stack.push(NULL)?,

                OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div => {
                    self.execute_binary(op)?;
                }

                OpCode::Equal | OpCode::NotEqual | OpCode::GreaterThan => {
                    self.execute_comparison(op)?;
                }

                OpCode::Minus => {
                    let operand = self.stack.pop();
                    match operand {
                        Value::Int(n) => self.stack.push(Value::Int(-n))?,
                        other => {
                            return Err(RuntimeError::UnsupportedNegation(
                                other.type_name().to_string(),
                            ))
                        }
                    }
                }

                OpCode::Bang => {
                    let operand = self.stack.pop();
                    self.stack
                        .push(if operand.is_truthy() { FALSE } else { TRUE })?;
                }

                OpCode::Jump => {
                    let target = self.read_u16_operand();
                    self.current_frame_mut().ip = target;
                }

                OpCode::JumpNotTruthy => {
                    let target = self.read_u16_operand();
                    let condition = self.stack.pop();
                    if !condition.is_truthy() {
                        self.current_frame_mut().ip = target;
                    }
                }

                OpCode::SetGlobal => {
                    let index = self.read_u16_operand();
                    let value = self.stack.pop();
                    self.globals.borrow_mut()[index] = value;
                }

                OpCode::GetGlobal => {
                    let index = self.read_u16_operand();
                    let value = self.globals.borrow()[index].clone();
                    self.stack.push(value)?;
                }

                OpCode::SetLocal => {
                    let slot = self.read_u8_operand();
                    let base_pointer = self.current_frame().base_pointer;
                    let value = self.stack.pop();
                    self.stack.set(base_pointer + slot, value);
                }

                OpCode::GetLocal => {
                    let slot = self.read_u8_operand();
                    let base_pointer = self.current_frame().base_pointer;
                    let value = self.stack.get(base_pointer + slot);
                    self.stack.push(value)?;
                }

                OpCode::GetFree => {
                    let index = self.read_u8_operand();
                    let value = self.current_frame().closure.free[index].clone();
                    self.stack.push(value)?;
                }

                OpCode::GetBuiltin => {
                    let index = self.read_u8_operand();
                    self.stack.push(Value::Builtin(&builtins::BUILTINS[index]))?;
                }

                OpCode::Array => {
                    let count = self.read_u16_operand();
                    let sp = self.stack.sp();
                    let elements = self.stack.slice(sp - count, sp).to_vec();
                    self.stack.set_sp(sp - count);
                    self.stack.push(Value::Array(Rc::new(elements)))?;
                }

                OpCode::Hash => {
                    let count = self.read_u16_operand();
                    let hash = self.build_hash(count)?;
                    self.stack.push(hash)?;
                }

                OpCode::Index => self.execute_index()?,

                OpCode::Call => {
                    let arg_count = self.read_u8_operand();
                    self.execute_call(arg_count)?;
                }

                OpCode::ReturnValue => {
                    let return_value = self.stack.pop();
                    if self.return_from_frame(return_value)? {
                        return Ok(());
                    }
                }

                OpCode::Return => {
                    if self.return_from_frame(NULL)? {
                        return Ok(());
                    }
                }

                OpCode::Closure => {
                    let const_index = self.read_u16_operand();
                    let free_count = self.read_u8_operand();
                    self.push_closure(const_index, free_count)?;
                }
            }
        }
        Ok(())
    }

    // ===== Frames =====

    fn current_frame(&self) -> &Frame {
        self.frames.last().expect("frame stack is never empty")
    }

    fn current_frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("frame stack is never empty")
    }

    /// Pop the current frame and push `return_value` in the caller's stack
    /// region. Returns true when the outermost frame returned, which halts
    /// the program with `return_value` as its result.
    fn return_from_frame(&mut self, return_value: Value) -> VmResult<bool> {
        let frame = self.frames.pop().expect("frame stack is never empty");

        if self.frames.is_empty() {
            // Top-level `return`: leave the value as the last popped slot.
            self.stack.set_sp(frame.base_pointer);
            self.stack.push(return_value)?;
            self.stack.pop();
            return Ok(true);
        }

        // Discard the callee and all of its locals in one step.
        self.stack.set_sp(frame.base_pointer - 1);
        self.stack.push(return_value)?;
        Ok(false)
    }

    // ===== Instruction decoding =====

    fn read_byte(&mut self) -> u8 {
        let frame = self.current_frame_mut();
        let byte = frame.closure.function.instructions[frame.ip];
        frame.ip += 1;
        byte
    }

    fn read_u16_operand(&mut self) -> usize {
        let frame = self.current_frame_mut();
        let value = instruction::read_u16(&frame.closure.function.instructions[frame.ip..]);
        frame.ip += 2;
        value as usize
    }

    fn read_u8_operand(&mut self) -> usize {
        let frame = self.current_frame_mut();
        let value = instruction::read_u8(&frame.closure.function.instructions[frame.ip..]);
        frame.ip += 1;
        value as usize
    }

    // ===== Operators =====

    fn execute_binary(&mut self, op: OpCode) -> VmResult<()> {
        let right = self.stack.pop();
        let left = self.stack.pop();

        let result = match (&left, &right) {
            (Value::Int(a), Value::Int(b)) => Self::integer_binary(op, *a, *b)?,
            (Value::Str(a), Value::Str(b)) => {
                if op == OpCode::Add {
                    Value::Str(Rc::new(format!("{}{}", a, b)))
                } else {
                    return Err(RuntimeError::UnknownInfixOperator {
                        operator: op.mnemonic().to_string(),
                        left: left.type_name().to_string(),
                        right: right.type_name().to_string(),
                    });
                }
            }
            _ => {
                return Err(RuntimeError::UnsupportedBinary {
                    left: left.type_name().to_string(),
                    right: right.type_name().to_string(),
                })
            }
        };

        self.stack.push(result)
    }

    fn integer_binary(op: OpCode, a: i64, b: i64) -> VmResult<Value> {
        let result = match op {
            OpCode::Add => a + b,
            OpCode::Sub => a - b,
            OpCode::Mul => a * b,
            OpCode::Div => {
                if b == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                a / b
            }
            _ => unreachable!("not a binary opcode: {:?}", op),
        };
        Ok(Value::Int(result))
    }

    fn execute_comparison(&mut self, op: OpCode) -> VmResult<()> {
        let right = self.stack.pop();
        let left = self.stack.pop();

        let result = match op {
            OpCode::Equal => left.language_eq(&right),
            OpCode::NotEqual => !left.language_eq(&right),
            OpCode::GreaterThan => match (&left, &right) {
                (Value::Int(a), Value::Int(b)) => a > b,
                _ => {
                    return Err(RuntimeError::UnsupportedBinary {
                        left: left.type_name().to_string(),
                        right: right.type_name().to_string(),
                    })
                }
            },
            _ => unreachable!("not a comparison opcode: {:?}", op),
        };

        self.stack.push(if result { TRUE } else { FALSE })
    }

    // ===== Collections =====

    fn build_hash(&mut self, count: usize) -> VmResult<Value> {
        let sp = self.stack.sp();
        let mut pairs = IndexMap::with_capacity(count / 2);

        for pair in self.stack.slice(sp - count, sp).chunks(2) {
            let key = pair[0]
                .hash_key()
                .ok_or_else(|| RuntimeError::UnusableHashKey(pair[0].type_name().to_string()))?;
            pairs.insert(key, pair[1].clone());
        }

        self.stack.set_sp(sp - count);
        Ok(Value::Hash(Rc::new(pairs)))
    }

    fn execute_index(&mut self) -> VmResult<()> {
        let index = self.stack.pop();
        let left = self.stack.pop();

        let result = match (&left, &index) {
            (Value::Array(elements), Value::Int(i)) => {
                if *i < 0 || *i as usize >= elements.len() {
                    NULL
                } else {
                    elements[*i as usize].clone()
                }
            }
            (Value::Hash(pairs), key) => {
                let key = key
                    .hash_key()
                    .ok_or_else(|| RuntimeError::UnusableHashKey(key.type_name().to_string()))?;
                pairs.get(&key).cloned().unwrap_or(NULL)
            }
            _ => return Err(RuntimeError::NotIndexable(left.type_name().to_string())),
        };

        self.stack.push(result)
    }

    // ===== Calls =====

    fn execute_call(&mut self, arg_count: usize) -> VmResult<()> {
        let callee = self.stack.get(self.stack.sp() - 1 - arg_count);
        match callee {
            Value::Closure(closure) => self.call_closure(closure, arg_count),
            Value::Builtin(builtin) => self.call_builtin(builtin, arg_count),
            other => Err(RuntimeError::NotCallable(other.type_name().to_string())),
        }
    }

    fn call_closure(&mut self, closure: Rc<Closure>, arg_count: usize) -> VmResult<()> {
        if arg_count != closure.function.num_parameters {
            return Err(RuntimeError::WrongArity {
                want: closure.function.num_parameters,
                got: arg_count,
            });
        }
        if self.frames.len() >= MAX_FRAMES {
            return Err(RuntimeError::FrameOverflow);
        }

        let base_pointer = self.stack.sp() - arg_count;
        let frame_top = base_pointer + closure.function.num_locals;
        if frame_top > STACK_SIZE {
            return Err(RuntimeError::StackOverflow);
        }

        // The arguments already occupy the first parameter slots; the
        // remaining reserved local slots start out null.
        for slot in (base_pointer + arg_count)..frame_top {
            self.stack.set(slot, NULL);
        }
        self.stack.set_sp(frame_top);

        self.frames.push(Frame::new(closure, base_pointer));
        Ok(())
    }

    fn call_builtin(&mut self, builtin: &'static Builtin, arg_count: usize) -> VmResult<()> {
        let sp = self.stack.sp();
        let result = (builtin.func)(self.stack.slice(sp - arg_count, sp));

        // Collapse the callee and arguments, then push the result - which
        // may be an in-language Error value the program can inspect.
        self.stack.set_sp(sp - arg_count - 1);
        self.stack.push(result)
    }

    fn push_closure(&mut self, const_index: usize, free_count: usize) -> VmResult<()> {
        let function = match self.constants[const_index].clone() {
            Value::CompiledFunction(function) => function,
            other => return Err(RuntimeError::NotAFunction(other.type_name().to_string())),
        };

        // The free variables were pushed just before this instruction; they
        // are copied into the closure here, at creation time, and never
        // updated afterwards.
        let sp = self.stack.sp();
        let free = self.stack.slice(sp - free_count, sp).to_vec();
        self.stack.set_sp(sp - free_count);

        self.stack
            .push(Value::Closure(Rc::new(Closure { function, free })))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ast::Program;
    use crate::bytecode::compiler::{Compiler, CompilerState};
    use crate::lexer::Scanner;
    use crate::parser::Parser;

    fn parse(source: &str) -> Program {
        let tokens = Scanner::new(source).scan_tokens().expect("lexer error");
        Parser::new(tokens).parse().expect("parser error")
    }

    fn run(source: &str) -> Value {
        let mut compiler = Compiler::new();
        compiler.compile(&parse(source)).expect("compile error");
        let mut vm = Vm::new(compiler.bytecode());
        vm.run().expect("runtime error");
        vm.result()
    }

    fn run_err(source: &str) -> RuntimeError {
        let mut compiler = Compiler::new();
        compiler.compile(&parse(source)).expect("compile error");
        let mut vm = Vm::new(compiler.bytecode());
        vm.run().expect_err("expected runtime error")
    }

    fn int(n: i64) -> Value {
        Value::Int(n)
    }

    fn string(s: &str) -> Value {
        Value::Str(Rc::new(s.to_string()))
    }

    fn int_array(values: &[i64]) -> Value {
        Value::Array(Rc::new(values.iter().map(|&n| Value::Int(n)).collect()))
    }

    #[test]
    fn integer_arithmetic() {
        let cases = [
            ("1", 1),
            ("2", 2),
            ("1 + 2", 3),
            ("1 - 2", -1),
            ("4 / 2", 2),
            ("50 / 2 * 2 + 10 - 5", 55),
            ("5 * (2 + 10)", 60),
            ("-5", -5),
            ("-10 + 100 + -50", 40),
            ("(5 + 10 * 2 + 15 / 3) * 2 + -10", 50),
        ];
        for (source, expected) in cases {
            assert_eq!(run(source), int(expected), "source: {}", source);
        }
    }

    #[test]
    fn boolean_expressions() {
        let cases = [
            ("true", true),
            ("false", false),
            ("1 < 2", true),
            ("1 > 2", false),
            ("1 == 1", true),
            ("1 != 1", false),
            ("true == true", true),
            ("true != false", true),
            ("(1 < 2) == true", true),
            ("(1 > 2) == true", false),
            ("!true", false),
            ("!5", false),
            ("!!5", true),
            ("!(if (false) { 5 })", true),
        ];
        for (source, expected) in cases {
            assert_eq!(run(source), Value::Bool(expected), "source: {}", source);
        }
    }

    #[test]
    fn conditionals() {
        assert_eq!(run("if (true) { 10 }"), int(10));
        assert_eq!(run("if (1 < 2) { 10 } else { 20 }"), int(10));
        assert_eq!(run("if (1 > 2) { 10 } else { 20 }"), int(20));
        // Falsy condition with no else evaluates to null...
        assert_eq!(run("if (false) { 10 }"), Value::Null);
        // ...which is itself falsy when used as another condition.
        assert_eq!(run("if ((if (false) { 10 })) { 10 } else { 20 }"), int(20));
        // A taken branch with no value behaves like the null fallback.
        assert_eq!(run("if (true) { }"), Value::Null);
    }

    #[test]
    fn global_let_statements() {
        assert_eq!(run("let one = 1; one"), int(1));
        assert_eq!(run("let one = 1; let two = 2; one + two"), int(3));
        assert_eq!(run("let one = 1; let two = one + one; one + two"), int(3));
    }

    #[test]
    fn string_expressions() {
        assert_eq!(run(r#""gibbon""#), string("gibbon"));
        assert_eq!(run(r#""gib" + "bon""#), string("gibbon"));
        // Strings compare by content, matching the hash-key contract.
        assert_eq!(run(r#""a" + "b" == "ab""#), Value::Bool(true));
    }

    #[test]
    fn array_literals_and_indexing() {
        assert_eq!(run("[]"), int_array(&[]));
        assert_eq!(run("[1 + 2, 3 * 4]"), int_array(&[3, 12]));
        assert_eq!(run("[1, 2, 3][1]"), int(2));
        assert_eq!(run("[[1, 1, 1]][0][0]"), int(1));
        assert_eq!(run("[1, 2, 3][99]"), Value::Null);
        assert_eq!(run("[1][-1]"), Value::Null);
    }

    #[test]
    fn hash_literals_and_indexing() {
        assert_eq!(run("{1: 1, 2: 2}[2]"), int(2));
        assert_eq!(run(r#"{"one": 1}["one"]"#), int(1));
        // Equal-content keys are the same key even as distinct instances.
        assert_eq!(run(r#"{"a" + "b": 1}["ab"]"#), int(1));
        assert_eq!(run("{}[0]"), Value::Null);
        assert_eq!(run("{1: 1}[2]"), Value::Null);
    }

    #[test]
    fn functions_and_calls() {
        assert_eq!(run("let f = fn() { 5 + 10 }; f()"), int(15));
        assert_eq!(run("fn() { 1 }() + fn() { 2 }()"), int(3));
        assert_eq!(run("let f = fn() { return 99; 100; }; f()"), int(99));
        assert_eq!(run("let f = fn() { }; f()"), Value::Null);
        // Functions are first-class values.
        assert_eq!(
            run("let a = fn() { 1 }; let b = fn() { a }; b()()"),
            int(1)
        );
    }

    #[test]
    fn local_bindings() {
        assert_eq!(run("let f = fn() { let x = 1; x }; f()"), int(1));
        assert_eq!(
            run("let f = fn() { let a = 1; let b = 2; a + b }; f()"),
            int(3)
        );
        // Each invocation gets fresh slots.
        assert_eq!(
            run("let f = fn() { let a = 1; a }; let g = fn() { let a = 2; a }; f() + g()"),
            int(3)
        );
        // Globals stay reachable from function scopes.
        assert_eq!(
            run("let g = 10; let f = fn() { let a = 1; a + g }; f()"),
            int(11)
        );
    }

    #[test]
    fn call_arguments_bind_as_locals() {
        assert_eq!(run("let identity = fn(a) { a }; identity(4)"), int(4));
        assert_eq!(run("let sum = fn(a, b) { a + b }; sum(1, 2)"), int(3));
        assert_eq!(
            run("let sum = fn(a, b) { let c = a + b; c }; sum(1, 2) + sum(3, 4)"),
            int(10)
        );
    }

    #[test]
    fn wrong_argument_count_is_a_host_error() {
        let err = run_err("fn() { 1 }(1)");
        assert_eq!(
            err.to_string(),
            "wrong number of arguments: want=0, got=1"
        );
        let err = run_err("let sum = fn(a, b) { a + b }; sum(1)");
        assert_eq!(
            err.to_string(),
            "wrong number of arguments: want=2, got=1"
        );
    }

    #[test]
    fn builtin_functions() {
        assert_eq!(run(r#"len("")"#), int(0));
        assert_eq!(run(r#"len("four")"#), int(4));
        assert_eq!(run("len([1, 2, 3])"), int(3));
        assert_eq!(run("head([1, 2, 3])"), int(1));
        assert_eq!(run("last([1, 2, 3])"), int(3));
        assert_eq!(run("tail([1, 2, 3])"), int_array(&[2, 3]));
        assert_eq!(run("push([], 1)"), int_array(&[1]));
        assert_eq!(run("head([])"), Value::Null);
    }

    #[test]
    fn builtin_misuse_yields_error_values_not_host_errors() {
        // `run` itself succeeds; the result is an in-language Error value.
        let result = run("len(1)");
        assert_eq!(
            result,
            Value::Error(Rc::new(
                "argument to 'len' not supported, got INTEGER".to_string()
            ))
        );

        let result = run(r#"len("a", "b")"#);
        assert_eq!(
            result,
            Value::Error(Rc::new(
                "wrong number of arguments. got=2, want=1".to_string()
            ))
        );
    }

    #[test]
    fn closures_capture_their_environment() {
        assert_eq!(
            run("let newClosure = fn(a) { fn() { a } }; newClosure(99)()"),
            int(99)
        );
        assert_eq!(
            run("let newAdder = fn(a, b) { fn(c) { a + b + c } }; newAdder(1, 2)(8)"),
            int(11)
        );
        assert_eq!(
            run(
                "let newAdderOuter = fn(a, b) { let c = a + b; fn(d) { let e = d + c; fn(f) { e + f } } };
                 let newAdderInner = newAdderOuter(1, 2);
                 let adder = newAdderInner(3);
                 adder(8)"
            ),
            int(14)
        );
    }

    #[test]
    fn closures_capture_by_value_at_creation() {
        // The closure copies the slot's value when Closure executes; the
        // later shadowing definition writes a different slot and the
        // captured value never changes.
        assert_eq!(
            run("let f = fn() { let x = 1; let g = fn() { x }; let x = 2; g() }; f()"),
            int(1)
        );
    }

    #[test]
    fn recursive_functions() {
        assert_eq!(
            run("let countDown = fn(x) { if (x == 0) { return 0; } else { countDown(x - 1); } }; countDown(3)"),
            int(0)
        );

        let fibonacci = "
            let fibonacci = fn(x) {
                if (x == 0) {
                    0
                } else {
                    if (x == 1) {
                        return 1;
                    } else {
                        fibonacci(x - 1) + fibonacci(x - 2);
                    }
                }
            };
            fibonacci(10);
        ";
        assert_eq!(run(fibonacci), int(55));
    }

    #[test]
    fn top_level_return_halts_the_program() {
        assert_eq!(run("return 5; 10;"), int(5));
    }

    #[test]
    fn runtime_type_errors() {
        assert_eq!(
            run_err("true + false").to_string(),
            "unsupported types for binary operation: BOOLEAN BOOLEAN"
        );
        assert_eq!(
            run_err("5 + true; 5;").to_string(),
            "unsupported types for binary operation: INTEGER BOOLEAN"
        );
        assert_eq!(
            run_err(r#""a" - "b""#).to_string(),
            "unknown operator: Sub (STRING STRING)"
        );
        assert_eq!(run_err("-true").to_string(), "unsupported type for negation: BOOLEAN");
        assert_eq!(run_err("1 / 0").to_string(), "division by zero");
        assert_eq!(
            run_err("let x = 1; x()").to_string(),
            "calling non-function: INTEGER"
        );
        assert_eq!(
            run_err("5[0]").to_string(),
            "index operator not supported: INTEGER"
        );
        assert_eq!(
            run_err("{[1]: 2}").to_string(),
            "unusable as hash key: ARRAY"
        );
        assert_eq!(
            run_err("{1: 1}[[]]").to_string(),
            "unusable as hash key: ARRAY"
        );
    }

    #[test]
    fn deep_recursion_overflows_the_frame_stack() {
        let err = run_err("let f = fn() { f() }; f()");
        assert!(matches!(err, RuntimeError::FrameOverflow), "got {:?}", err);
    }

    #[test]
    fn pushing_past_capacity_overflows_the_stack() {
        // More literals in one expression than the stack has slots.
        let source = format!("[{}]", vec!["1"; STACK_SIZE + 1].join(", "));
        let err = run_err(&source);
        assert!(matches!(err, RuntimeError::StackOverflow), "got {:?}", err);
    }

    #[test]
    fn undefined_opcode_bytes_are_a_host_error() {
        let bytecode = Bytecode {
            instructions: vec![255],
            constants: Vec::new(),
        };
        let mut vm = Vm::new(bytecode);
        let err = vm.run().expect_err("expected runtime error");
        assert!(matches!(err, RuntimeError::UnknownOpcode(255)), "got {:?}", err);
    }

    #[test]
    fn globals_persist_across_vm_instances() {
        // The REPL protocol: one globals array and one compiler state thread
        // through every line; each line gets a fresh compiler and VM.
        let globals = new_globals();
        let mut state = CompilerState::new();

        for (line, expected) in [
            ("let one = 1;", int(1)),
            ("let two = one + one;", int(2)),
            ("one + two", int(3)),
        ] {
            let mut compiler = Compiler::with_state(state);
            compiler.compile(&parse(line)).expect("compile error");
            let bytecode = compiler.bytecode();
            state = compiler.into_state();

            let mut vm = Vm::with_globals(bytecode, globals.clone());
            vm.run().expect("runtime error");
            assert_eq!(vm.result(), expected, "line: {}", line);
        }
    }

    #[test]
    fn both_engines_agree() {
        use crate::interpreter::Interpreter;

        let programs = [
            "let fibonacci = fn(x) { if (x == 0) { 0 } else { if (x == 1) { return 1; } else { fibonacci(x - 1) + fibonacci(x - 2); } } }; fibonacci(10);",
            "let double = fn(x) { x * 2 }; double(5) + double(10)",
            "let newAdder = fn(a) { fn(b) { a + b } }; newAdder(2)(3)",
            "let map = fn(arr, f) { if (len(arr) == 0) { [] } else { push(map(tail(arr), f), 0) } }; len(map([1, 2, 3], fn(x) { x }))",
            "if (1 < 2) { 10 } else { 20 }",
            "push(tail([1, 2, 3]), len(\"four\"))",
            "{1: 2, 3: 4}[3]",
        ];

        for source in programs {
            let vm_result = run(source);
            let mut interpreter = Interpreter::new();
            let eval_result = interpreter
                .interpret(&parse(source))
                .expect("interpreter error");
            assert_eq!(vm_result, eval_result, "source: {}", source);
        }
    }
}
