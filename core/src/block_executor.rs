//! BlockExecutor - run one fragment and collect what it produced
//!
//! A run goes: language check, statement indexing (doc blocks only), type
//! stripping for TypeScript, then evaluation with the console redirected
//! into the block's capture log. Captures are attributed to the top-level
//! statement executing at the time and land on that statement's last line.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, debug_span, warn};

use crate::console::{render_args, ConsoleInterceptor, ConsoleLevel, ConsoleSink};
use crate::context::{ExecutionContextFactory, SharedState, VerdictSink};
use crate::executor::{EvalError, Evaluator, ExecutionObserver, Stmt, Val};
use crate::formatter::{format_value, FormatOptions};
use crate::indexer::StatementIndexer;
use crate::transpile::{strip_types, Language};
use crate::types::{CapturedStatement, CodeBlock, ConsoleOutput, ExecutionResult, Statement};

/// Where captures for the running statement are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Target {
    line: usize,
    column: usize,
}

impl Default for Target {
    fn default() -> Self {
        Self { line: 1, column: 1 }
    }
}

#[derive(Debug, Default)]
struct CaptureLog {
    current: Target,
    captures: Vec<CapturedStatement>,
    console: Vec<ConsoleOutput>,
}

type SharedLog = Arc<Mutex<CaptureLog>>;

/// Tracks statement boundaries and records result captures
struct CaptureObserver {
    log: SharedLog,
    capture_results: bool,
    format: FormatOptions,
}

impl ExecutionObserver for CaptureObserver {
    fn statement_started(&mut self, stmt: &Stmt) {
        let span = stmt.span();
        // Multi-line statements are annotated after their closing line
        self.log.lock().current = Target {
            line: span.end_line + 1,
            column: span.start_col + 1,
        };
    }

    fn statement_completed(&mut self, stmt: &Stmt, value: &Val) {
        if !self.capture_results {
            return;
        }
        let wanted = match stmt {
            Stmt::Expr { .. } => !matches!(value, Val::Undefined),
            Stmt::Return { .. } => true,
            _ => false,
        };
        if wanted {
            let output = format_value(value, &self.format);
            let mut log = self.log.lock();
            let target = log.current;
            log.captures
                .push(CapturedStatement::result(target.line, target.column, output));
        }
    }
}

pub struct BlockExecutor {
    evaluator: Arc<dyn Evaluator>,
    indexer: Arc<dyn StatementIndexer>,
    contexts: ExecutionContextFactory,
    format: FormatOptions,
}

impl BlockExecutor {
    pub fn new(
        evaluator: Arc<dyn Evaluator>,
        indexer: Arc<dyn StatementIndexer>,
        contexts: ExecutionContextFactory,
    ) -> Self {
        Self {
            evaluator,
            indexer,
            contexts,
            format: FormatOptions::default(),
        }
    }

    pub fn with_format(mut self, format: FormatOptions) -> Self {
        self.format = format;
        self
    }

    /// Run `block` against the document's shared state
    pub fn execute(&self, block: &CodeBlock, state: &SharedState) -> ExecutionResult {
        let started = Instant::now();
        let mut result = self.execute_inner(block, state);
        result.duration = started.elapsed();
        result
    }

    fn execute_inner(&self, block: &CodeBlock, state: &SharedState) -> ExecutionResult {
        let Some(language) = Language::from_tag(&block.language) else {
            return ExecutionResult::failure(format!("Unsupported language: {}", block.language));
        };
        let tags = block.tags();
        let _span = debug_span!("block", language = %block.language, doc = tags.doc).entered();

        let statements: Vec<Statement> = if tags.doc {
            self.indexer.index(&block.value)
        } else {
            Vec::new()
        };
        debug!(statements = statements.len(), "indexed fragment");

        let source = if language.needs_stripping() {
            match strip_types(&block.value) {
                Ok(source) => source,
                Err(e) => return ExecutionResult::failure(e.to_string()),
            }
        } else {
            block.value.clone()
        };

        let log: SharedLog = Arc::new(Mutex::new(CaptureLog::default()));
        let bindings = self
            .contexts
            .build(state, tags.context.as_deref(), verdict_sink(&log));
        let mut observer = CaptureObserver {
            log: log.clone(),
            capture_results: tags.doc,
            format: self.format.clone(),
        };

        let outcome = {
            let _console = match ConsoleInterceptor::install(console_sink(&log, tags.doc)) {
                Ok(guard) => guard,
                Err(e) => return ExecutionResult::failure(e.to_string()),
            };
            self.evaluator.run(&source, &bindings, &mut observer)
        };

        let mut log = std::mem::take(&mut *log.lock());
        match outcome {
            Ok(value) => ExecutionResult {
                success: true,
                result: (!matches!(value, Val::Undefined)).then(|| format_value(&value, &self.format)),
                error: None,
                duration: Default::default(),
                console_outputs: log.console,
                statement_captures: log.captures,
            },
            Err(err) => {
                warn!(error = %err, "fragment failed");
                if !err.is_assertion() {
                    let target = match &err {
                        EvalError::Parse(parse) => parse
                            .span()
                            .map(|span| Target {
                                line: span.start_line + 1,
                                column: span.start_col + 1,
                            })
                            .unwrap_or_default(),
                        EvalError::Thrown { .. } => log.current,
                    };
                    log.captures.push(CapturedStatement::error(
                        target.line,
                        target.column,
                        error_output(&err),
                    ));
                }
                ExecutionResult {
                    success: false,
                    result: None,
                    error: Some(err.to_string()),
                    duration: Default::default(),
                    console_outputs: log.console,
                    statement_captures: log.captures,
                }
            }
        }
    }
}

fn verdict_sink(log: &SharedLog) -> VerdictSink {
    let log = log.clone();
    Arc::new(move |passed: bool, message: &str| {
        let mut log = log.lock();
        let target = log.current;
        log.captures.push(CapturedStatement::assertion(
            target.line,
            target.column,
            passed,
            message,
        ));
    })
}

fn console_sink(log: &SharedLog, capture: bool) -> ConsoleSink {
    let log = log.clone();
    Arc::new(move |level: ConsoleLevel, args: &[Val]| {
        let text = render_args(args);
        let mut log = log.lock();
        if capture {
            let target = log.current;
            log.captures
                .push(CapturedStatement::result(target.line, target.column, text.clone()));
        }
        log.console.push(ConsoleOutput {
            level: level.as_str().to_string(),
            text,
        });
    })
}

/// Text after `Error:` in an error annotation
fn error_output(err: &EvalError) -> String {
    match err {
        EvalError::Thrown { info, .. } if info.name == crate::executor::errors::ERROR => info.message.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StubClient;
    use crate::executor::ScriptEvaluator;
    use crate::indexer::AstIndexer;
    use crate::types::CaptureKind;

    fn executor() -> BlockExecutor {
        BlockExecutor::new(
            Arc::new(ScriptEvaluator::new()),
            Arc::new(AstIndexer),
            ExecutionContextFactory::new(Arc::new(StubClient)),
        )
    }

    fn run(language: &str, meta: &str, source: &str) -> ExecutionResult {
        executor().execute(&CodeBlock::new(language, source, meta), &SharedState::new())
    }

    fn lines_of(result: &ExecutionResult, kind: CaptureKind) -> Vec<(usize, String)> {
        result
            .statement_captures
            .iter()
            .filter(|c| c.kind == kind)
            .map(|c| (c.line, c.output.clone()))
            .collect()
    }

    #[test]
    fn test_unsupported_language() {
        let result = run("python", "doc", "print(1)");
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Unsupported language: python"));
    }

    #[test]
    fn test_console_capture_lands_on_statement_line() {
        let result = run("js", "doc", "const x = 5; console.log(x * 2)");
        assert!(result.success);
        assert_eq!(lines_of(&result, CaptureKind::Result), vec![(1, "10".to_string())]);
        assert_eq!(result.console_outputs[0].text, "10");
        assert_eq!(result.console_outputs[0].level, "log");
    }

    #[test]
    fn test_expression_results_in_doc_blocks() {
        let source = "const items = [1, 2, 3]\nitems.length\nitems\n  .map(n => n * 2)\nlet unused";
        let result = run("js", "doc", source);
        assert_eq!(
            lines_of(&result, CaptureKind::Result),
            vec![(2, "3".to_string()), (4, "[2, 4, 6]".to_string())]
        );
        assert_eq!(result.result.as_deref(), Some("[2, 4, 6]"));
    }

    #[test]
    fn test_assert_blocks_do_not_capture_results() {
        let result = run("js", "assert", "1 + 1\nexpect(2).toBe(2)\nconsole.log('hi')");
        assert!(result.success);
        assert!(lines_of(&result, CaptureKind::Result).is_empty());
        assert_eq!(result.assertions().count(), 1);
        assert_eq!(result.console_outputs.len(), 1);
    }

    #[test]
    fn test_assertion_failure_keeps_earlier_captures() {
        let source = "const a = 2\na * 2\nexpect(a).toBe(3)\na * 3";
        let result = run("js", "doc", source);

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("AssertionError: expected 2 to be 3"));
        assert_eq!(lines_of(&result, CaptureKind::Result), vec![(2, "4".to_string())]);
        let assertion = result.assertions().next().unwrap();
        assert_eq!(assertion.line, 3);
        assert_eq!(assertion.assertion_passed, Some(false));
        assert!(lines_of(&result, CaptureKind::Error).is_empty());
    }

    #[test]
    fn test_thrown_error_becomes_error_capture() {
        let result = run("js", "doc", "1\nthrow new Error('boom')\n2");
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Error: boom"));
        assert_eq!(lines_of(&result, CaptureKind::Error), vec![(2, "boom".to_string())]);
        assert_eq!(lines_of(&result, CaptureKind::Result), vec![(1, "1".to_string())]);
    }

    #[test]
    fn test_typescript_is_stripped_before_running() {
        let source = "interface P { x: number }\nconst p: P = { x: 2 }\np.x as number";
        let result = run("ts", "doc", source);
        assert!(result.success, "{:?}", result.error);
        assert_eq!(lines_of(&result, CaptureKind::Result), vec![(3, "2".to_string())]);
    }

    #[test]
    fn test_syntax_error_is_failure_with_capture() {
        let result = run("js", "doc", "const ok = 1\nconst = 2");
        assert!(!result.success);
        assert!(result.error.as_deref().is_some_and(|e| e.starts_with("SyntaxError")));
        assert_eq!(result.statement_captures.len(), 1);
        assert_eq!(result.statement_captures[0].kind, CaptureKind::Error);
    }

    #[test]
    fn test_statements_sharing_a_line_keep_their_own_end_line() {
        let result = run("js", "doc", "1 + 1; [1, 2]\n  .map(n => n)");
        assert_eq!(
            lines_of(&result, CaptureKind::Result),
            vec![(1, "2".to_string()), (2, "[1, 2]".to_string())]
        );
    }

    #[test]
    fn test_timed_out_block_releases_console() {
        let executor = BlockExecutor::new(
            Arc::new(ScriptEvaluator::with_timeout(std::time::Duration::from_millis(50))),
            Arc::new(AstIndexer),
            ExecutionContextFactory::new(Arc::new(StubClient)),
        );
        let state = SharedState::new();

        let looping = CodeBlock::new("js", "console.log('start')\nwhile (true) {}", "doc");
        let result = executor.execute(&looping, &state);
        assert!(!result.success);
        assert!(result.error.as_deref().is_some_and(|e| e.starts_with("TimeoutError")));
        assert_eq!(result.console_outputs.len(), 1);

        // A leaked guard would make this thread's next install fail
        let guard = ConsoleInterceptor::install(Arc::new(|_: ConsoleLevel, _: &[Val]| {}));
        assert!(guard.is_ok());
        drop(guard);

        let following = CodeBlock::new("js", "console.log('next')\n1 + 1", "doc");
        let next = executor.execute(&following, &state);
        assert!(next.success);
        assert_eq!(next.result.as_deref(), Some("2"));
        assert_eq!(next.console_outputs[0].text, "next");
    }

    #[test]
    fn test_console_is_released_after_failure() {
        let _ = run("js", "doc", "throw new Error('x')");
        // Installing again on this thread would be rejected if the guard leaked
        let result = run("js", "doc", "console.log('again')");
        assert_eq!(result.console_outputs.len(), 1);
    }
}
