//! Benchmarks comparing the tree-walking interpreter and the bytecode VM.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gibbon::ast::Program;
use gibbon::bytecode::{Compiler, Vm};
use gibbon::interpreter::Interpreter;
use gibbon::lexer::Scanner;
use gibbon::parser::Parser;

const FIB_RECURSIVE: &str = "
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
    fibonacci(18);
";

const ARRAY_FOLD: &str = "
    let fold = fn(arr, acc, f) {
        if (len(arr) == 0) {
            acc
        } else {
            fold(tail(arr), f(acc, head(arr)), f)
        }
    };
    let sum = fn(arr) { fold(arr, 0, fn(acc, x) { acc + x }) };
    sum([1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
";

/// Parse source into an AST.
fn parse(source: &str) -> Program {
    let tokens = Scanner::new(source).scan_tokens().expect("lexer error");
    Parser::new(tokens).parse().expect("parser error")
}

/// Run via tree-walking interpreter.
fn run_treewalk(source: &str) {
    let program = parse(source);
    let mut interpreter = Interpreter::new();
    interpreter.interpret(&program).expect("runtime error");
}

/// Run via bytecode VM (compile + execute).
fn run_vm(source: &str) {
    let program = parse(source);
    let mut compiler = Compiler::new();
    compiler.compile(&program).expect("compile error");
    let mut vm = Vm::new(compiler.bytecode());
    vm.run().expect("runtime error");
}

fn fibonacci_comparison(c: &mut Criterion) {
    let mut group = c.benchmark_group("fib_recursive_comparison");

    group.bench_function("treewalk", |b| {
        b.iter(|| run_treewalk(black_box(FIB_RECURSIVE)))
    });
    group.bench_function("vm", |b| b.iter(|| run_vm(black_box(FIB_RECURSIVE))));

    group.finish();
}

fn array_fold_comparison(c: &mut Criterion) {
    let mut group = c.benchmark_group("array_fold_comparison");

    group.bench_function("treewalk", |b| {
        b.iter(|| run_treewalk(black_box(ARRAY_FOLD)))
    });
    group.bench_function("vm", |b| b.iter(|| run_vm(black_box(ARRAY_FOLD))));

    group.finish();
}

criterion_group!(benches, fibonacci_comparison, array_fold_comparison);
criterion_main!(benches);
