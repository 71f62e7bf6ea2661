use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One fenced code block handed over by the document parser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlock {
    pub language: String,
    pub value: String,
    pub meta: String,
}

impl CodeBlock {
    pub fn new(language: impl Into<String>, value: impl Into<String>, meta: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            value: value.into(),
            meta: meta.into(),
        }
    }

    /// Tags parsed from the info string after the language
    pub fn tags(&self) -> BlockTags {
        BlockTags::parse(&self.meta)
    }
}

/// Meta words that change how a block runs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockTags {
    /// Index statements and capture results
    pub doc: bool,
    /// Run for assertions only
    pub assert: bool,
    /// Execution-context profile (`context=<name>`)
    pub context: Option<String>,
}

impl BlockTags {
    pub fn parse(meta: &str) -> Self {
        let mut tags = BlockTags::default();
        for word in meta.split_whitespace() {
            match word {
                "doc" => tags.doc = true,
                "assert" => tags.assert = true,
                _ => {
                    if let Some(name) = word.strip_prefix("context=") {
                        if !name.is_empty() {
                            tags.context = Some(name.to_string());
                        }
                    }
                }
            }
        }
        tags
    }

    /// Whether the runner executes the block at all
    pub fn is_tested(&self) -> bool {
        self.doc || self.assert
    }
}

/// Position of a top-level statement, 1-indexed relative to the block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statement {
    pub line: usize,
    pub column: usize,
    /// Last line of the statement; annotations go after it
    pub end_line: usize,
    pub kind: StatementKind,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    Expression,
    Declaration,
    Return,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureKind {
    Result,
    Assertion,
    Error,
}

/// A value or verdict recorded while a block ran
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedStatement {
    pub line: usize,
    pub column: usize,
    pub output: String,
    pub kind: CaptureKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertion_passed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertion_message: Option<String>,
}

impl CapturedStatement {
    pub fn result(line: usize, column: usize, output: impl Into<String>) -> Self {
        Self {
            line,
            column,
            output: output.into(),
            kind: CaptureKind::Result,
            assertion_passed: None,
            assertion_message: None,
        }
    }

    pub fn assertion(line: usize, column: usize, passed: bool, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            line,
            column,
            output: message.clone(),
            kind: CaptureKind::Assertion,
            assertion_passed: Some(passed),
            assertion_message: Some(message),
        }
    }

    pub fn error(line: usize, column: usize, output: impl Into<String>) -> Self {
        Self {
            line,
            column,
            output: output.into(),
            kind: CaptureKind::Error,
            assertion_passed: None,
            assertion_message: None,
        }
    }
}

/// One `console.*` call made by a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleOutput {
    pub level: String,
    pub text: String,
}

/// Outcome of running one block
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    /// Formatted value of the block, when it produced one
    pub result: Option<String>,
    pub error: Option<String>,
    pub duration: Duration,
    pub console_outputs: Vec<ConsoleOutput>,
    pub statement_captures: Vec<CapturedStatement>,
}

impl ExecutionResult {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn assertions(&self) -> impl Iterator<Item = &CapturedStatement> {
        self.statement_captures
            .iter()
            .filter(|c| c.kind == CaptureKind::Assertion)
    }
}

/// Block and assertion counts for one document, or a whole run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSummary {
    pub block_count: usize,
    pub passed: usize,
    pub failed: usize,
    pub assertion_count: usize,
    pub assertions_passed: usize,
    pub assertions_failed: usize,
}

impl TestSummary {
    pub fn record(&mut self, result: &ExecutionResult) {
        self.block_count += 1;
        if result.success {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        for assertion in result.assertions() {
            self.assertion_count += 1;
            if assertion.assertion_passed == Some(true) {
                self.assertions_passed += 1;
            } else {
                self.assertions_failed += 1;
            }
        }
    }

    pub fn merge(&mut self, other: &TestSummary) {
        self.block_count += other.block_count;
        self.passed += other.passed;
        self.failed += other.failed;
        self.assertion_count += other.assertion_count;
        self.assertions_passed += other.assertions_passed;
        self.assertions_failed += other.assertions_failed;
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.assertions_failed > 0
    }
}
