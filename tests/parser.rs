use std::rc::Rc;

use fiffiscript::{
    ast::Expr,
    diagnostics::{Diagnostic, DiagnosticKind},
    native::TypeTag,
    parser::{ReplInput, parse_program, parse_repl_line},
    value::{Callable, ValueKind},
};

fn parse_error(source: &str) -> Diagnostic {
    match parse_program(source) {
        Ok(program) => panic!(
            "expected parse error, got {} definitions",
            program.definitions().len()
        ),
        Err(diag) => diag,
    }
}

fn expression(source: &str) -> Rc<Expr> {
    match parse_repl_line(source).expect("line parses") {
        ReplInput::Expression(expr) => expr,
        ReplInput::Definition(def) => panic!("expected expression, got definition {}", def.name),
    }
}

fn constant_int(expr: &Expr) -> i64 {
    match expr {
        Expr::Constant(value) => match value.0.as_ref() {
            ValueKind::Int(n) => *n,
            _ => panic!("expected Int constant, found {}", value.type_name()),
        },
        other => panic!("expected constant, found {other:?}"),
    }
}

#[test]
fn definitions_keep_source_order() {
    let program = parse_program("a = 1; b = a; main = fun() { b };").expect("parses");
    let names: Vec<&str> = program
        .definitions()
        .iter()
        .map(|def| def.name.as_str())
        .collect();
    assert_eq!(names, ["a", "b", "main"]);
}

#[test]
fn numeric_literals() {
    assert_eq!(constant_int(&expression("42")), 42);
    assert_eq!(constant_int(&expression("-17")), -17);
    assert_eq!(constant_int(&expression("1_000")), 1000);
    assert_eq!(
        constant_int(&expression("-9223372036854775808")),
        i64::MIN
    );
    match &*expression("-2.5e1") {
        Expr::Constant(value) => assert_eq!(value.to_double().expect("float"), -25.0),
        other => panic!("expected constant, found {other:?}"),
    }
}

#[test]
fn string_escapes_and_comments() {
    let expr = expression("/* block /* nested */ */ \"a\\tb\\n\\\"c\\\"\" // trailing");
    match &*expr {
        Expr::Constant(value) => assert_eq!(value.to_text().expect("text"), b"a\tb\n\"c\""),
        other => panic!("expected constant, found {other:?}"),
    }
}

#[test]
fn calls_chain_and_keep_argument_order() {
    match &*expression("f(1, 2)(3)") {
        Expr::FunctionCall {
            function,
            arguments,
        } => {
            assert_eq!(arguments.len(), 1);
            assert_eq!(constant_int(&arguments[0]), 3);
            match &**function {
                Expr::FunctionCall { arguments, .. } => {
                    let values: Vec<i64> = arguments.iter().map(|a| constant_int(a)).collect();
                    assert_eq!(values, [1, 2]);
                }
                other => panic!("expected inner call, found {other:?}"),
            }
        }
        other => panic!("expected call, found {other:?}"),
    }
}

#[test]
fn bound_functions_take_the_definition_name() {
    let program = parse_program("twice = fun(a, b) { a; b };").expect("parses");
    match &*program.definitions()[0].body {
        Expr::Constant(value) => match value.0.as_ref() {
            ValueKind::Callable(Callable::User(function)) => {
                assert_eq!(function.name.as_deref(), Some("twice"));
                assert_eq!(function.params, ["a", "b"]);
                assert_eq!(function.body.len(), 2);
            }
            _ => panic!("expected user function"),
        },
        other => panic!("expected constant, found {other:?}"),
    }
}

#[test]
fn repl_lines_distinguish_definitions() {
    assert!(matches!(
        parse_repl_line("x = 1").expect("parses"),
        ReplInput::Definition(_)
    ));
    assert!(matches!(
        parse_repl_line("x").expect("parses"),
        ReplInput::Expression(_)
    ));
    let err = parse_repl_line("x y").expect_err("trailing input");
    assert_eq!(err.kind, DiagnosticKind::Parser);
}

#[cfg(unix)]
#[test]
fn extern_declarations_record_their_signature() {
    let program = parse_program(
        "llabs = extern llabs(long long) -> long long; srand = extern srand(int);",
    )
    .expect("parses");
    let signatures: Vec<(Vec<TypeTag>, TypeTag)> = program
        .definitions()
        .iter()
        .map(|def| match &*def.body {
            Expr::Constant(value) => match value.0.as_ref() {
                ValueKind::Callable(Callable::Native(function)) => (
                    function.signature().parameters.clone(),
                    function.signature().return_type,
                ),
                _ => panic!("expected native function"),
            },
            other => panic!("expected constant, found {other:?}"),
        })
        .collect();
    assert_eq!(
        signatures,
        [
            (vec![TypeTag::LongLong], TypeTag::LongLong),
            (vec![TypeTag::Int], TypeTag::Void),
        ]
    );
}

#[test]
fn missing_semicolon_is_a_parse_error() {
    let diag = parse_error("a = 1 b = 2;");
    assert_eq!(diag.kind, DiagnosticKind::Parser);
    assert_eq!(diag.message, "expected `;` after definition");
}

#[test]
fn unterminated_strings_are_lexer_errors() {
    let diag = parse_error("a = \"open;");
    assert_eq!(diag.kind, DiagnosticKind::Lexer);
}

#[test]
fn unknown_native_types_are_rejected() {
    let diag = parse_error("f = extern abs(pointer) -> int;");
    assert_eq!(diag.kind, DiagnosticKind::Parser);
    assert_eq!(diag.message, "unknown native type `pointer`");
}

#[test]
fn bad_libraries_become_declaration_diagnostics() {
    let source = "main = fun() {};\nf = extern \"/nonexistent/libnope.so\" f() -> int;";
    let diag = parse_error(source);
    assert_eq!(diag.kind, DiagnosticKind::Declaration);
    assert_eq!(
        diag.message,
        "error opening library /nonexistent/libnope.so"
    );
    let rendered = diag.render("script.fi", source);
    assert!(
        rendered.starts_with("script.fi:2:5: error opening library"),
        "unexpected rendering: {rendered}"
    );
}

#[cfg(unix)]
#[test]
fn void_parameters_fail_at_declaration() {
    let diag = parse_error("f = extern abs(void) -> int;");
    assert_eq!(diag.kind, DiagnosticKind::Declaration);
    assert!(
        diag.message
            .starts_with("error initializing call signature for abs"),
        "unexpected message: {}",
        diag.message
    );
}

#[test]
fn stray_punctuation_is_rejected() {
    let diag = parse_error("a = :;");
    assert_eq!(diag.kind, DiagnosticKind::Parser);
    assert_eq!(diag.message, "unexpected token `:`");
}

#[test]
fn diagnostics_render_line_and_column() {
    let source = "x = 1;\ny = ;";
    let diag = parse_error(source);
    assert_eq!(
        diag.render("script.fi", source),
        "script.fi:2:5: unexpected token `;`"
    );
}
