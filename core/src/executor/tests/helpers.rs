//! Test helpers for executor tests
//!
//! Common utilities for running fragments and recording statement boundaries

use crate::executor::{
    Bindings, EvalError, Evaluator, ExecutionObserver, ScriptEvaluator, Stmt, Val,
};

/// Run a fragment with no extra bindings and return its value
///
/// Panics with the script error when the fragment throws.
pub fn run(source: &str) -> Val {
    run_with(source, Bindings::new()).unwrap_or_else(|e| panic!("Fragment failed: {}", e))
}

/// Run a fragment with the given free-identifier bindings
pub fn run_with(source: &str, bindings: Bindings) -> Result<Val, EvalError> {
    ScriptEvaluator::new().run(source, &bindings, &mut crate::executor::NoopObserver)
}

/// Run a fragment expected to throw and return the error
pub fn run_err(source: &str) -> EvalError {
    match run_with(source, Bindings::new()) {
        Ok(value) => panic!("Expected fragment to throw, got {:?}", value),
        Err(err) => err,
    }
}

/// Name of the thrown error (`TypeError`, `ReferenceError`, ...)
pub fn error_name(err: &EvalError) -> String {
    match err {
        EvalError::Thrown { info, .. } => info.name.clone(),
        EvalError::Parse(_) => "SyntaxError".to_string(),
    }
}

pub fn num(val: Val) -> f64 {
    match val {
        Val::Num(n) => n,
        other => panic!("Expected number, got {:?}", other),
    }
}

pub fn string(val: Val) -> String {
    match val {
        Val::Str(s) => s,
        other => panic!("Expected string, got {:?}", other),
    }
}

/// Observer recording `(first line, completed value)` of top-level statements
#[derive(Default)]
pub struct Recorder {
    pub started: Vec<usize>,
    pub completed: Vec<(usize, Val)>,
}

impl ExecutionObserver for Recorder {
    fn statement_started(&mut self, stmt: &Stmt) {
        self.started.push(stmt.span().start_line);
    }

    fn statement_completed(&mut self, stmt: &Stmt, value: &Val) {
        self.completed.push((stmt.span().start_line, value.clone()));
    }
}
