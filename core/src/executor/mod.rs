//! # Executor - tree-walking interpreter for documentation fragments
//!
//! ## Core Principles
//!
//! 1. **Injected capability**: callers depend on [`Evaluator`], not on how
//!    source text becomes behaviour
//! 2. **Free identifiers are bindings**: the context's names are declared in a
//!    scope wrapping the fragment, so examples need no imports
//! 3. **Exceptions are values**: a script `throw` travels as [`Thrown`], never
//!    as a Rust panic
//! 4. **Top-level observation**: each top-level statement is reported to an
//!    [`ExecutionObserver`] so results can be attributed to source lines
//!
//! Host calls complete synchronously, so `await` simply yields the value it
//! is given and a fragment always runs to completion on the calling thread.

pub mod errors;
pub mod expressions;
pub mod scope;
pub mod statements;
pub mod stdlib;
pub mod types;
pub mod values;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::{Duration, Instant};

use indexmap::IndexMap;

use crate::parser::{self, ParseError};

// Re-export commonly used items
pub use errors::ErrorInfo;
pub use scope::Scope;
pub use types::ast::{Expr, Program, Span, Stmt};
pub use values::{EvalResult, HostObject, Thrown, Val};

/// Names and values visible to a fragment as free identifiers
pub type Bindings = IndexMap<String, Val>;

/// Nested calls allowed before a `RangeError`
const MAX_CALL_DEPTH: usize = 200;

/* ===================== Control Flow ===================== */

/// Non-exceptional control flow leaving a statement
#[derive(Debug, Clone)]
pub enum Control {
    None,
    Break,
    Continue,
    Return(Val),
}

/* ===================== Evaluator capability ===================== */

/// Receives top-level statement boundaries while a fragment runs
pub trait ExecutionObserver {
    fn statement_started(&mut self, _stmt: &Stmt) {}

    /// `value` is the expression's value for expression statements, the
    /// returned value for `return`, and `undefined` otherwise
    fn statement_completed(&mut self, _stmt: &Stmt, _value: &Val) {}
}

/// Observer that ignores every notification
pub struct NoopObserver;

impl ExecutionObserver for NoopObserver {}

#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("{0}")]
    Parse(#[from] ParseError),

    #[error("{info}")]
    Thrown { info: ErrorInfo, value: Val },
}

impl EvalError {
    pub fn is_assertion(&self) -> bool {
        matches!(self, EvalError::Thrown { info, .. } if info.is_assertion())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, EvalError::Thrown { info, .. } if info.is_timeout())
    }
}

impl From<Thrown> for EvalError {
    fn from(thrown: Thrown) -> Self {
        EvalError::Thrown {
            info: thrown.describe(),
            value: thrown.0,
        }
    }
}

/// Runs fragment source against a set of bindings
pub trait Evaluator: Send + Sync {
    fn run(
        &self,
        source: &str,
        bindings: &Bindings,
        observer: &mut dyn ExecutionObserver,
    ) -> Result<Val, EvalError>;
}

/// The embedded interpreter behind [`Evaluator`]
#[derive(Debug, Clone, Default)]
pub struct ScriptEvaluator {
    timeout: Option<Duration>,
}

impl ScriptEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

impl Evaluator for ScriptEvaluator {
    fn run(
        &self,
        source: &str,
        bindings: &Bindings,
        observer: &mut dyn ExecutionObserver,
    ) -> Result<Val, EvalError> {
        let program = parser::parse_program(source)?;
        let mut interp = Interpreter::new(self.timeout);

        let scope = Scope::child(interp.globals());
        for (name, value) in bindings {
            scope.declare(name, value.clone(), true);
        }

        Ok(interp.run_program(&program, &scope, observer)?)
    }
}

/* ===================== Interpreter ===================== */

pub struct Interpreter {
    globals: Arc<Scope>,
    deadline: Option<Instant>,
    timeout: Option<Duration>,
    depth: usize,
}

impl Interpreter {
    pub fn new(timeout: Option<Duration>) -> Self {
        let globals = Scope::root();
        stdlib::inject_stdlib(&globals);
        Self {
            globals,
            deadline: timeout.map(|t| Instant::now() + t),
            timeout,
            depth: 0,
        }
    }

    pub fn globals(&self) -> &Arc<Scope> {
        &self.globals
    }

    /// Throw `TimeoutError` once the deadline has passed
    pub fn check_deadline(&self) -> Result<(), Thrown> {
        match (self.deadline, self.timeout) {
            (Some(deadline), Some(timeout)) if Instant::now() >= deadline => {
                Err(ErrorInfo::new(
                    errors::TIMEOUT_ERROR,
                    format!("Execution timed out after {}ms", timeout.as_millis()),
                )
                .into())
            }
            _ => Ok(()),
        }
    }

    /// Execute a program's top-level statements in `scope`, reporting each
    /// one to the observer. The value of a top-level `return` (or of the last
    /// expression statement) is the program's value.
    pub fn run_program(
        &mut self,
        program: &Program,
        scope: &Arc<Scope>,
        observer: &mut dyn ExecutionObserver,
    ) -> EvalResult {
        self.hoist_functions(&program.body, scope);
        let mut last = Val::Undefined;

        for stmt in &program.body {
            observer.statement_started(stmt);
            self.check_deadline()?;

            match stmt {
                Stmt::Expr { expr, .. } => {
                    let value = self.eval(expr, scope)?;
                    observer.statement_completed(stmt, &value);
                    last = value;
                }
                _ => match self.exec_stmt(stmt, scope)? {
                    Control::Return(value) => {
                        observer.statement_completed(stmt, &value);
                        return Ok(value);
                    }
                    Control::Break | Control::Continue => {
                        return Err(ErrorInfo::new(
                            errors::SYNTAX_ERROR,
                            "Illegal break or continue outside a loop",
                        )
                        .into())
                    }
                    Control::None => observer.statement_completed(stmt, &Val::Undefined),
                },
            }
        }

        Ok(last)
    }

    pub(crate) fn enter_call(&mut self) -> Result<(), Thrown> {
        self.check_deadline()?;
        if self.depth >= MAX_CALL_DEPTH {
            return Err(ErrorInfo::range_error("Maximum call stack size exceeded").into());
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn exit_call(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}
