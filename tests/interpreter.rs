use fiffiscript::{
    ast::{Expr, Program},
    diagnostics::{FiffiError, RuntimeError},
    runtime::{Interpreter, run_source},
    value::{UserFunction, Value, ValueKind},
};

fn session(lines: &[&str]) -> Interpreter {
    let mut interpreter = Interpreter::new();
    for line in lines {
        interpreter
            .eval_line(line)
            .unwrap_or_else(|err| panic!("`{line}` failed: {err}"));
    }
    interpreter
}

fn eval(interpreter: &mut Interpreter, source: &str) -> Value {
    match interpreter.eval_line(source) {
        Ok(Some(value)) => value,
        Ok(None) => panic!("`{source}` is a definition, not an expression"),
        Err(err) => panic!("`{source}` failed: {err}"),
    }
}

fn eval_error(interpreter: &mut Interpreter, source: &str) -> RuntimeError {
    match interpreter.eval_line(source) {
        Ok(value) => panic!("expected error, received {value:?}"),
        Err(FiffiError::Runtime(err)) => err,
        Err(other) => panic!("expected runtime error, received {other}"),
    }
}

fn run_error(source: &str) -> RuntimeError {
    match run_source(source) {
        Ok(()) => panic!("expected program to fail"),
        Err(FiffiError::Runtime(err)) => err,
        Err(other) => panic!("expected runtime error, received {other}"),
    }
}

fn expect_int(value: &Value) -> i64 {
    match value.0.as_ref() {
        ValueKind::Int(n) => *n,
        _ => panic!("expected Int, found {}", value.type_name()),
    }
}

#[test]
fn main_with_constant_body_runs() {
    let body = vec![
        Expr::constant(Value::int(1)),
        Expr::constant(Value::int(2)),
        Expr::constant(Value::int(3)),
    ];
    let mut program = Program::new();
    program.add_definition(
        "main",
        Expr::constant(Value::function(UserFunction::new(Vec::new(), body))),
    );
    program.run().expect("program runs");
}

#[test]
fn missing_main_is_reported() {
    let err = run_error("x = 1;");
    assert!(matches!(err, RuntimeError::MainNotFound));
    assert_eq!(err.to_string(), "function main() not found");
}

#[test]
fn main_must_be_callable_without_arguments() {
    let err = run_error("main = fun(argv) { argv };");
    assert!(matches!(
        err,
        RuntimeError::Arity {
            expected: 1,
            actual: 0,
            ..
        }
    ));
}

#[test]
fn empty_body_yields_zero() {
    let mut interpreter = session(&["nothing = fun() {};"]);
    assert_eq!(expect_int(&eval(&mut interpreter, "nothing()")), 0);
}

#[test]
fn call_yields_last_body_expression() {
    let mut interpreter = session(&["f = fun() { 1; 2; 3 };"]);
    assert_eq!(expect_int(&eval(&mut interpreter, "f()")), 3);
}

#[test]
fn parameters_shadow_and_then_disappear() {
    let mut interpreter = session(&["x = 10;", "id = fun(x) { x };"]);
    assert_eq!(expect_int(&eval(&mut interpreter, "id(5)")), 5);
    assert_eq!(expect_int(&eval(&mut interpreter, "x")), 10);
    assert!(matches!(
        eval_error(&mut interpreter, "fun(y) { y }(1)(2)"),
        RuntimeError::NotCallable { type_name: "Int" }
    ));
}

#[test]
fn callee_sees_the_callers_scopes() {
    let mut interpreter = session(&["peek = fun() { y };", "outer = fun(y) { peek() };"]);
    assert_eq!(expect_int(&eval(&mut interpreter, "outer(3)")), 3);
    assert!(matches!(
        eval_error(&mut interpreter, "peek()"),
        RuntimeError::Undefined { .. }
    ));
}

#[test]
fn undefined_names_are_reported() {
    let mut interpreter = Interpreter::new();
    let err = eval_error(&mut interpreter, "nowhere");
    assert_eq!(err.to_string(), "undefined function or variable: nowhere");
}

#[test]
fn arguments_evaluate_left_to_right() {
    let mut interpreter = session(&["f = fun(a, b) { b };"]);
    match eval_error(&mut interpreter, "f(first_missing, second_missing)") {
        RuntimeError::Undefined { name } => assert_eq!(name, "first_missing"),
        other => panic!("expected undefined error, got {other}"),
    }
}

#[test]
fn user_arity_errors_name_the_function() {
    let mut interpreter = session(&["pair = fun(a, b) { a };"]);
    let err = eval_error(&mut interpreter, "pair(1)");
    assert_eq!(
        err.to_string(),
        "wrong number of arguments to pair; expected: 2, but got: 1"
    );
}

#[test]
fn scope_is_popped_when_the_body_fails() {
    let mut interpreter = session(&["broken = fun(a) { a; missing };"]);
    let _ = eval_error(&mut interpreter, "broken(1)");
    assert_eq!(interpreter.environment().depth(), 1);
    assert!(matches!(
        eval_error(&mut interpreter, "a"),
        RuntimeError::Undefined { .. }
    ));
}

#[test]
fn later_definitions_overwrite_earlier_ones() {
    let mut interpreter = session(&["a = 1;", "a = 2;"]);
    assert_eq!(expect_int(&eval(&mut interpreter, "a")), 2);
}

#[test]
fn definitions_see_only_earlier_bindings() {
    let err = run_error("b = a; a = 1; main = fun() {};");
    match err {
        RuntimeError::Undefined { name } => assert_eq!(name, "a"),
        other => panic!("expected undefined error, got {other}"),
    }
}

#[test]
fn functions_are_first_class() {
    let mut interpreter = session(&["apply = fun(f, x) { f(x) };", "id = fun(x) { x };"]);
    assert_eq!(expect_int(&eval(&mut interpreter, "apply(id, 7)")), 7);
}

#[test]
fn definitions_bind_call_results() {
    let mut interpreter = session(&["seven = fun() { 7 };", "x = seven();"]);
    assert_eq!(expect_int(&eval(&mut interpreter, "x")), 7);
}

#[cfg(unix)]
#[test]
fn scripts_call_native_functions() {
    let mut interpreter = session(&[
        "strlen = extern strlen(string) -> long;",
        "labs = extern labs(long) -> long;",
        "measure = fun(s) { labs(strlen(s)) };",
    ]);
    assert_eq!(expect_int(&eval(&mut interpreter, "measure(\"four\")")), 4);
    let text = eval(&mut interpreter, "extern strdup(string) -> string(\"hi\")");
    assert_eq!(text.to_text().expect("text"), b"hi");

    run_source(
        "strlen = extern strlen(string) -> long; main = fun() { strlen(\"abc\") };",
    )
    .expect("program runs");
}

#[cfg(unix)]
#[test]
fn native_arity_errors_surface_from_scripts() {
    let err = run_error(
        "strcmp = extern strcmp(string, string) -> int; main = fun() { strcmp(\"a\") };",
    );
    assert!(matches!(
        err,
        RuntimeError::Arity {
            expected: 2,
            actual: 1,
            ..
        }
    ));
}
