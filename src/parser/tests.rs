//! Parser tests.

use crate::ast::{ExprKind, StmtKind};
use crate::lexer::Scanner;
use crate::parser::Parser;

fn parse(source: &str) -> crate::ast::Program {
    let tokens = Scanner::new(source).scan_tokens().expect("lexer error");
    Parser::new(tokens).parse().expect("parser error")
}

/// Parse and render back to text; precedence mistakes show up immediately.
fn render(source: &str) -> String {
    parse(source).to_string().trim_end().to_string()
}

#[test]
fn parses_let_statements() {
    let program = parse("let x = 5; let y = true; let foo = y;");
    assert_eq!(program.statements.len(), 3);

    let names: Vec<&str> = program
        .statements
        .iter()
        .map(|s| match &s.kind {
            StmtKind::Let { name, .. } => name.as_str(),
            other => panic!("expected let statement, got {:?}", other),
        })
        .collect();
    assert_eq!(names, vec!["x", "y", "foo"]);
}

#[test]
fn parses_return_statements() {
    let program = parse("return 5; return fn(x) { x };");
    assert_eq!(program.statements.len(), 2);
    for stmt in &program.statements {
        assert!(matches!(stmt.kind, StmtKind::Return(_)));
    }
}

#[test]
fn operator_precedence() {
    let cases = [
        ("-a * b", "((-a) * b)"),
        ("!-a", "(!(-a))"),
        ("a + b + c", "((a + b) + c)"),
        ("a + b * c", "(a + (b * c))"),
        ("a * b / c", "((a * b) / c)"),
        ("3 + 4 * 5 == 3 * 1 + 4 * 5", "((3 + (4 * 5)) == ((3 * 1) + (4 * 5)))"),
        ("5 < 4 != 3 > 4", "((5 < 4) != (3 > 4))"),
        ("(5 + 5) * 2", "((5 + 5) * 2)"),
        ("-(5 + 5)", "(-(5 + 5))"),
        ("a + add(b * c) + d", "((a + add((b * c))) + d)"),
        ("a * [1, 2][1]", "(a * ([1, 2][1]))"),
    ];

    for (source, expected) in cases {
        assert_eq!(render(source), expected, "source: {}", source);
    }
}

#[test]
fn parses_if_else_expression() {
    let program = parse("if (x < y) { x } else { y }");
    let StmtKind::Expression(expr) = &program.statements[0].kind else {
        panic!("expected expression statement");
    };
    let ExprKind::If {
        consequence,
        alternative,
        ..
    } = &expr.kind
    else {
        panic!("expected if expression");
    };
    assert_eq!(consequence.statements.len(), 1);
    assert!(alternative.is_some());
}

#[test]
fn parses_function_literal_with_parameters() {
    let program = parse("fn(x, y) { x + y; }");
    let StmtKind::Expression(expr) = &program.statements[0].kind else {
        panic!("expected expression statement");
    };
    let ExprKind::Function { parameters, body } = &expr.kind else {
        panic!("expected function literal");
    };
    assert_eq!(parameters, &vec!["x".to_string(), "y".to_string()]);
    assert_eq!(body.statements.len(), 1);
}

#[test]
fn parses_call_arguments() {
    assert_eq!(render("add(1, 2 * 3, 4 + 5)"), "add(1, (2 * 3), (4 + 5))");
}

#[test]
fn parses_array_and_index() {
    assert_eq!(render("myArray[1 + 1]"), "(myArray[(1 + 1)])");
    assert_eq!(render("[1, 2 * 2, 3 + 3]"), "[1, (2 * 2), (3 + 3)]");
}

#[test]
fn parses_hash_literals() {
    let program = parse(r#"{"one": 1, "two": 2, "three": 3}"#);
    let StmtKind::Expression(expr) = &program.statements[0].kind else {
        panic!("expected expression statement");
    };
    let ExprKind::Hash(pairs) = &expr.kind else {
        panic!("expected hash literal");
    };
    assert_eq!(pairs.len(), 3);

    let program = parse("{}");
    let StmtKind::Expression(expr) = &program.statements[0].kind else {
        panic!("expected expression statement");
    };
    assert!(matches!(&expr.kind, ExprKind::Hash(pairs) if pairs.is_empty()));
}

#[test]
fn collects_multiple_errors() {
    let tokens = Scanner::new("let = 5; let y 10; let z = 3;")
        .scan_tokens()
        .expect("lexer error");
    let errors = Parser::new(tokens).parse().expect_err("expected errors");
    assert!(errors.len() >= 2, "got {:?}", errors);
}
