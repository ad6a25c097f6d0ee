//! Interactive REPL with persistent session state.
//!
//! Each line compiles and runs in a fresh compiler and VM, but three pieces
//! of state thread through the whole session: the symbol table, the constant
//! pool, and the globals array. That is what keeps `let` bindings alive
//! across lines. The tree-walking engine keeps one interpreter instead.

use std::path::PathBuf;

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::ast::Program;
use crate::bytecode::{disassemble, new_globals, Compiler, CompilerState, Globals, Vm};
use crate::interpreter::Interpreter;
use crate::lexer::Scanner;
use crate::parser::Parser;

const HISTORY_FILE: &str = ".gibbon_history";
const PROMPT: &str = ">> ";

/// Which engine executes REPL input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Vm,
    Eval,
}

pub struct Repl {
    engine: Engine,
    show_bytecode: bool,
    /// Accumulated symbol table + constant pool (VM engine).
    compiler_state: CompilerState,
    /// Globals array shared across every VM instance of this session.
    globals: Globals,
    /// Persistent interpreter (eval engine).
    interpreter: Interpreter,
    history_file: PathBuf,
}

impl Repl {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            show_bytecode: false,
            compiler_state: CompilerState::new(),
            globals: new_globals(),
            interpreter: Interpreter::new(),
            history_file: history_path(),
        }
    }

    pub fn run(&mut self) {
        println!("Gibbon {} ({} engine)", env!("CARGO_PKG_VERSION"), self.engine_name());
        println!("Type \".help\" for available commands.\n");

        let Ok(mut editor) = DefaultEditor::new() else {
            eprintln!("{}", "Could not initialize line editor".red());
            return;
        };
        let _ = editor.load_history(&self.history_file);

        loop {
            match editor.readline(PROMPT) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = editor.add_history_entry(line);

                    if line.starts_with('.') {
                        if self.handle_command(line) {
                            break;
                        }
                    } else {
                        self.execute_line(line);
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("{} {}", "Input error:".red(), err);
                    break;
                }
            }
        }

        let _ = editor.save_history(&self.history_file);
        println!("Goodbye!");
    }

    /// Returns true when the REPL should exit.
    fn handle_command(&mut self, line: &str) -> bool {
        match line {
            ".exit" | ".quit" => return true,
            ".help" => {
                println!(".help          show this help");
                println!(".engine <vm|eval>  switch execution engine");
                println!(".bytecode      toggle disassembly of each line (vm engine)");
                println!(".exit          leave the REPL");
            }
            ".bytecode" => {
                self.show_bytecode = !self.show_bytecode;
                println!(
                    "bytecode display {}",
                    if self.show_bytecode { "on" } else { "off" }
                );
            }
            ".engine vm" => {
                self.engine = Engine::Vm;
                println!("switched to vm engine");
            }
            ".engine eval" => {
                self.engine = Engine::Eval;
                println!("switched to eval engine");
            }
            other => println!("unknown command: {}", other),
        }
        false
    }

    fn execute_line(&mut self, line: &str) {
        let Some(program) = self.parse_line(line) else {
            return;
        };

        match self.engine {
            Engine::Vm => self.execute_vm(&program),
            Engine::Eval => self.execute_eval(&program),
        }
    }

    fn parse_line(&self, line: &str) -> Option<Program> {
        let tokens = match Scanner::new(line).scan_tokens() {
            Ok(tokens) => tokens,
            Err(err) => {
                eprintln!("{} {}", "Lexer error:".red(), err);
                return None;
            }
        };

        match Parser::new(tokens).parse() {
            Ok(program) => Some(program),
            Err(errors) => {
                eprintln!("{}", "Input could not be parsed:".red());
                for err in errors {
                    eprintln!("  {}", err);
                }
                None
            }
        }
    }

    fn execute_vm(&mut self, program: &Program) {
        let state = std::mem::replace(&mut self.compiler_state, CompilerState::new());
        let mut compiler = Compiler::with_state(state);
        let compiled = compiler.compile(program);
        let bytecode = compiled.map(|()| compiler.bytecode());
        // The session keeps the mutated state even when compilation failed.
        self.compiler_state = compiler.into_state();

        let bytecode = match bytecode {
            Ok(bytecode) => bytecode,
            Err(err) => {
                eprintln!("{} {}", "Compile error:".red(), err);
                return;
            }
        };

        if self.show_bytecode {
            print!("{}", disassemble(&bytecode.instructions));
        }

        let mut vm = Vm::with_globals(bytecode, self.globals.clone());
        match vm.run() {
            Ok(()) => print_result(&vm.result()),
            Err(err) => eprintln!("{} {}", "Runtime error:".red(), err),
        }
    }

    fn execute_eval(&mut self, program: &Program) {
        match self.interpreter.interpret(program) {
            Ok(result) => print_result(&result),
            Err(err) => eprintln!("{} {}", "Runtime error:".red(), err),
        }
    }

    fn engine_name(&self) -> &'static str {
        match self.engine {
            Engine::Vm => "vm",
            Engine::Eval => "eval",
        }
    }
}

/// Print a result; in-language Error values render in red.
fn print_result(result: &crate::value::Value) {
    if result.is_error() {
        println!("{}", result.to_string().red());
    } else {
        println!("{}", result);
    }
}

fn history_path() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(HISTORY_FILE),
        None => PathBuf::from(HISTORY_FILE),
    }
}
