//! Tests for runtime errors, timeouts and call depth

use std::time::Duration;

use super::helpers::{error_name, run_err};
use crate::executor::{Bindings, EvalError, Evaluator, NoopObserver, ScriptEvaluator};

#[test]
fn test_reference_error_for_unknown_identifier() {
    let err = run_err("missing + 1");
    assert_eq!(err.to_string(), "ReferenceError: missing is not defined");
}

#[test]
fn test_const_reassignment_is_type_error() {
    let err = run_err("const a = 1\na = 2");
    assert_eq!(error_name(&err), "TypeError");
}

#[test]
fn test_reading_property_of_undefined() {
    let err = run_err("const user = undefined\nuser.name");
    assert_eq!(
        err.to_string(),
        "TypeError: Cannot read properties of undefined (reading 'name')"
    );
}

#[test]
fn test_calling_non_function_names_callee() {
    let err = run_err("const api = {}\napi.fetch()");
    assert_eq!(err.to_string(), "TypeError: api.fetch is not a function");
}

#[test]
fn test_thrown_object_is_described() {
    let err = run_err("throw { name: 'Custom', message: 'details' }");
    match err {
        EvalError::Thrown { info, .. } => {
            assert_eq!(info.name, "Custom");
            assert_eq!(info.message, "details");
        }
        other => panic!("Expected thrown error, got {:?}", other),
    }
}

#[test]
fn test_syntax_error_is_parse_failure() {
    let err = run_err("const = 1");
    assert!(matches!(err, EvalError::Parse(_)));
}

#[test]
fn test_timeout_is_not_catchable() {
    let evaluator = ScriptEvaluator::with_timeout(Duration::from_millis(50));
    let source = "try { while (true) {} } catch (e) { 'swallowed' }";
    let err = evaluator
        .run(source, &Bindings::new(), &mut NoopObserver)
        .unwrap_err();
    assert!(err.is_timeout());
    assert!(!err.is_assertion());
}

#[test]
fn test_runaway_recursion_is_range_error() {
    // Deep interpreter recursion needs more than the default test stack
    let handle = std::thread::Builder::new()
        .stack_size(256 * 1024 * 1024)
        .spawn(|| run_err("function f() { return f() }\nf()"))
        .unwrap();
    let err = handle.join().unwrap();
    assert_eq!(err.to_string(), "RangeError: Maximum call stack size exceeded");
}
