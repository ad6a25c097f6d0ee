//! Gibbon CLI: execute files, evaluate one-liners, or run the REPL.

use std::env;
use std::fs;
use std::process;

use colored::Colorize;
use mimalloc::MiMalloc;

use gibbon::bytecode::{Compiler, Vm};
use gibbon::interpreter::Interpreter;
use gibbon::lexer::Scanner;
use gibbon::parser::Parser;
use gibbon::repl::{Engine, Repl};
use gibbon::value::Value;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// CLI command to execute.
enum Command {
    /// Run a script file
    Run { file: String, engine: Engine },
    /// Evaluate a string and print its result
    Eval { code: String, engine: Engine },
    /// Start the REPL
    Repl { engine: Engine },
}

fn main() {
    match parse_args() {
        Command::Run { file, engine } => {
            let source = fs::read_to_string(&file).unwrap_or_else(|err| {
                eprintln!("{} could not read {}: {}", "Error:".red(), file, err);
                process::exit(1);
            });
            execute(&source, engine);
        }
        Command::Eval { code, engine } => {
            let result = execute(&code, engine);
            println!("{}", result);
        }
        Command::Repl { engine } => Repl::new(engine).run(),
    }
}

fn parse_args() -> Command {
    let mut engine = Engine::Vm;
    let mut positional = Vec::new();

    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--engine=vm" => engine = Engine::Vm,
            "--engine=eval" => engine = Engine::Eval,
            "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            "-v" | "--version" => {
                println!("gibbon {}", VERSION);
                process::exit(0);
            }
            other if other.starts_with('-') => {
                eprintln!("{} unknown option: {}", "Error:".red(), other);
                print_usage();
                process::exit(1);
            }
            _ => positional.push(arg),
        }
    }

    match positional.split_first() {
        None => Command::Repl { engine },
        Some((command, rest)) => match (command.as_str(), rest) {
            ("repl", []) => Command::Repl { engine },
            ("run", [file]) => Command::Run {
                file: file.clone(),
                engine,
            },
            ("eval", [code]) => Command::Eval {
                code: code.clone(),
                engine,
            },
            ("repl" | "run" | "eval", _) => {
                print_usage();
                process::exit(1);
            }
            // `gibbon script.gb` is shorthand for `gibbon run script.gb`.
            (file, []) => Command::Run {
                file: file.to_string(),
                engine,
            },
            _ => {
                print_usage();
                process::exit(1);
            }
        },
    }
}

fn print_usage() {
    println!("Usage: gibbon [command] [options]");
    println!();
    println!("Commands:");
    println!("  repl               start the interactive REPL (default)");
    println!("  run <file>         execute a script file");
    println!("  eval <code>        evaluate a string and print the result");
    println!();
    println!("Options:");
    println!("  --engine=vm|eval   choose the execution engine (default: vm)");
    println!("  -h, --help         show this help");
    println!("  -v, --version      show the version");
}

/// Lex, parse and execute a source string, exiting with status 1 on any
/// error. Returns the program's result value.
fn execute(source: &str, engine: Engine) -> Value {
    let tokens = Scanner::new(source).scan_tokens().unwrap_or_else(|err| {
        eprintln!("{} {}", "Lexer error:".red(), err);
        process::exit(1);
    });

    let program = Parser::new(tokens).parse().unwrap_or_else(|errors| {
        eprintln!("{}", "Input could not be parsed:".red());
        for err in errors {
            eprintln!("  {}", err);
        }
        process::exit(1);
    });

    match engine {
        Engine::Vm => {
            let mut compiler = Compiler::new();
            if let Err(err) = compiler.compile(&program) {
                eprintln!("{} {}", "Compile error:".red(), err);
                process::exit(1);
            }
            let mut vm = Vm::new(compiler.bytecode());
            if let Err(err) = vm.run() {
                eprintln!("{} {}", "Runtime error:".red(), err);
                process::exit(1);
            }
            vm.result()
        }
        Engine::Eval => {
            let mut interpreter = Interpreter::new();
            match interpreter.interpret(&program) {
                Ok(result) => result,
                Err(err) => {
                    eprintln!("{} {}", "Runtime error:".red(), err);
                    process::exit(1);
                }
            }
        }
    }
}
