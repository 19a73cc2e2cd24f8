// lute-vm - Runtime error path tests
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Tests for runtime error paths:
//! - Type errors from operators
//! - Undefined variable reads and assignments
//! - Arity mismatches and non-callable values
//! - Call stack exhaustion and stack traces

use lute_vm::Vm;

fn run_source(source: &str) -> Result<String, String> {
    let mut vm = Vm::new();
    let mut out = Vec::new();
    match vm.interpret_with(source, &mut out) {
        Ok(()) => Ok(String::from_utf8(out).expect("output is valid UTF-8")),
        Err(e) => Err(e.to_string()),
    }
}

fn expect_error(source: &str, expected: &str) {
    match run_source(source) {
        Err(e) => assert!(
            e.contains(expected),
            "error '{}' should contain '{}' for source: {}",
            e,
            expected,
            source
        ),
        Ok(output) => panic!(
            "expected error containing '{}', but got success with output '{}' for source: {}",
            expected, output, source
        ),
    }
}

// =============================================================================
// Operator type errors
// =============================================================================

#[test]
fn add_rejects_mixed_operands() {
    expect_error("print 1 + true;", "Operands must be two numbers or two strings.");
    expect_error("print \"a\" + 1;", "Operands must be two numbers or two strings.");
    expect_error("print nil + nil;", "Operands must be two numbers or two strings.");
}

#[test]
fn arithmetic_rejects_non_numbers() {
    expect_error("print 1 - \"a\";", "Operands must be numbers.");
    expect_error("print true * 2;", "Operands must be numbers.");
    expect_error("print nil / 2;", "Operands must be numbers.");
}

#[test]
fn comparison_rejects_non_numbers() {
    expect_error("print 1 < true;", "Operands must be numbers.");
    expect_error("print \"a\" > \"b\";", "Operands must be numbers.");
}

#[test]
fn negate_rejects_non_numbers() {
    expect_error("print -true;", "Operand must be a number.");
    expect_error("print -\"a\";", "Operand must be a number.");
}

// =============================================================================
// Undefined variables
// =============================================================================

#[test]
fn reading_an_undefined_global() {
    expect_error("print undefined;", "Undefined variable 'undefined'.");
}

#[test]
fn assigning_an_undefined_global() {
    // Assignment must not create the variable...
    expect_error("missing = 1;", "Undefined variable 'missing'.");
    // ...and must not leave it defined afterwards.
    let mut vm = Vm::new();
    let mut out = Vec::new();
    assert!(vm.interpret_with("missing = 1;", &mut out).is_err());
    assert!(vm.interpret_with("print missing;", &mut out).is_err());
}

// =============================================================================
// Calls
// =============================================================================

#[test]
fn arity_mismatch() {
    expect_error(
        "fun f(a, b) { return a; } print f(1);",
        "Expected 2 arguments but got 1.",
    );
    expect_error(
        "fun f() { return 1; } f(1, 2);",
        "Expected 0 arguments but got 2.",
    );
}

#[test]
fn calling_a_non_callable() {
    expect_error("var x = 3; x();", "Can only call functions and classes.");
    expect_error("\"text\"();", "Can only call functions and classes.");
    expect_error("nil();", "Can only call functions and classes.");
}

#[test]
fn unbounded_recursion_overflows() {
    expect_error("fun f() { f(); } f();", "Stack overflow.");
}

// =============================================================================
// Stack traces
// =============================================================================

#[test]
fn top_level_error_names_the_script() {
    expect_error("print undefined;", "[line 1] in script");
}

#[test]
fn trace_walks_frames_innermost_first() {
    let source = "fun inner() { return 1 + nil; }\nfun outer() { return inner(); }\nouter();";
    let e = run_source(source).expect_err("should fail");
    let inner_at = e.find("[line 1] in inner()").expect("inner frame in trace");
    let outer_at = e.find("[line 2] in outer()").expect("outer frame in trace");
    let script_at = e.find("[line 3] in script").expect("script frame in trace");
    assert!(inner_at < outer_at && outer_at < script_at, "trace order: {}", e);
}

#[test]
fn error_reports_the_failing_line() {
    expect_error("var a = 1;\nvar b = 2;\nprint a + nil;", "[line 3] in script");
}

// =============================================================================
// The session survives a runtime error
// =============================================================================

#[test]
fn vm_is_usable_after_an_error() {
    let mut vm = Vm::new();
    let mut out = Vec::new();
    assert!(vm.interpret_with("print undefined;", &mut out).is_err());
    assert!(vm.interpret_with("print 1 + 1;", &mut out).is_ok());
    assert_eq!(String::from_utf8(out).expect("utf-8"), "2\n");
}
