//! DocumentTestRunner - run every tested block of every document
//!
//! Blocks of one document run strictly in order, one at a time, sharing the
//! document's state. A failing block is counted and the next one still
//! runs, so each document always yields a complete summary. In update mode
//! the annotated bodies are spliced back and the document is persisted.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::annotate::{strip_annotations, AnnotationInjector};
use crate::block_executor::BlockExecutor;
use crate::context::{SharedState, StateRegistry};
use crate::markdown::{extract_blocks, splice_blocks};
use crate::store::DocumentStore;
use crate::types::{CodeBlock, ExecutionResult, TestSummary};

/// Outcome of one block within a document
#[derive(Debug, Clone, Serialize)]
pub struct BlockReport {
    /// 1-based position among the document's code blocks
    pub index: usize,
    /// Document line of the opening fence, when known
    pub line: Option<usize>,
    pub language: String,
    pub result: ExecutionResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    pub id: String,
    pub summary: TestSummary,
    pub blocks: Vec<BlockReport>,
    /// Whether update mode rewrote the document
    pub updated: bool,
    /// Set when the document could not be read or written
    pub error: Option<String>,
}

impl DocumentReport {
    pub fn has_failures(&self) -> bool {
        self.error.is_some() || self.summary.has_failures()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub documents: Vec<DocumentReport>,
    pub total: TestSummary,
}

impl RunReport {
    pub fn has_failures(&self) -> bool {
        self.documents.iter().any(DocumentReport::has_failures)
    }

    /// 0 when every block and assertion passed, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        if self.has_failures() {
            1
        } else {
            0
        }
    }

    /// Per-document text report followed by the run totals
    pub fn render(&self, verbose: bool) -> String {
        let mut out = String::new();
        for doc in &self.documents {
            let mark = if doc.has_failures() { "✗" } else { "✓" };
            let _ = writeln!(out, "{} {}: {}", mark, doc.id, describe(&doc.summary));
            if let Some(error) = &doc.error {
                let _ = writeln!(out, "    error: {}", error);
            }
            for block in &doc.blocks {
                let failed = !block.result.success;
                if !failed && !verbose {
                    continue;
                }
                let location = match block.line {
                    Some(line) => format!("block {} (line {}, {})", block.index, line, block.language),
                    None => format!("block {} ({})", block.index, block.language),
                };
                if failed {
                    let error = block.result.error.as_deref().unwrap_or("failed");
                    let _ = writeln!(out, "    ✗ {}: {}", location, error);
                } else {
                    let _ = writeln!(
                        out,
                        "    ✓ {} in {}ms",
                        location,
                        block.result.duration.as_millis()
                    );
                }
                if verbose {
                    for output in &block.result.console_outputs {
                        let _ = writeln!(out, "        [{}] {}", output.level, output.text);
                    }
                }
            }
        }
        let _ = writeln!(out, "\nTotal: {} document(s), {}", self.documents.len(), describe(&self.total));
        out
    }
}

fn describe(summary: &TestSummary) -> String {
    format!(
        "{} blocks ({} passed, {} failed), {} assertions ({} passed, {} failed)",
        summary.block_count,
        summary.passed,
        summary.failed,
        summary.assertion_count,
        summary.assertions_passed,
        summary.assertions_failed
    )
}

/* ===================== Runner ===================== */

pub struct DocumentTestRunner {
    executor: Arc<BlockExecutor>,
    store: Arc<dyn DocumentStore>,
    states: StateRegistry,
    injector: AnnotationInjector,
    update: bool,
}

impl DocumentTestRunner {
    pub fn new(executor: BlockExecutor, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            executor: Arc::new(executor),
            store,
            states: StateRegistry::new(),
            injector: AnnotationInjector::default(),
            update: false,
        }
    }

    /// Write annotated blocks back to their documents
    pub fn with_update(mut self, update: bool) -> Self {
        self.update = update;
        self
    }

    pub fn with_injector(mut self, injector: AnnotationInjector) -> Self {
        self.injector = injector;
        self
    }

    pub async fn run(&self, documents: &[PathBuf]) -> RunReport {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", run_id = %run_id, documents = documents.len());

        async {
            let mut report = RunReport {
                run_id,
                documents: Vec::with_capacity(documents.len()),
                total: TestSummary::default(),
            };
            for path in documents {
                let doc = self.run_document(path).await;
                report.total.merge(&doc.summary);
                report.documents.push(doc);
            }
            info!(
                blocks = report.total.block_count,
                failed = report.total.failed,
                assertions_failed = report.total.assertions_failed,
                "run finished"
            );
            report
        }
        .instrument(span)
        .await
    }

    /// Read, run and (in update mode) rewrite one document
    pub async fn run_document(&self, path: &Path) -> DocumentReport {
        let id = path.display().to_string();
        let span = info_span!("document", id = %id);

        async {
            let mut report = DocumentReport {
                id: id.clone(),
                summary: TestSummary::default(),
                blocks: Vec::new(),
                updated: false,
                error: None,
            };

            let text = match self.store.read(path) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "document unreadable");
                    report.error = Some(e.to_string());
                    return report;
                }
            };

            let extracted = extract_blocks(&text);
            let tested: Vec<(usize, &crate::markdown::ExtractedBlock)> = extracted
                .iter()
                .enumerate()
                .filter(|(_, e)| e.block.tags().is_tested())
                .map(|(i, e)| (i + 1, e))
                .collect();

            let blocks: Vec<CodeBlock> = tested.iter().map(|(_, e)| e.block.clone()).collect();
            let (summary, results) = self.run_blocks(&id, &blocks).await;
            report.summary = summary;

            let mut updates = Vec::new();
            for ((index, extracted), result) in tested.iter().zip(results) {
                if self.update {
                    if let Some(range) = &extracted.range {
                        let stripped = strip_annotations(&extracted.block.value);
                        let body = self.injector.inject(&stripped, &result.statement_captures);
                        if body != extracted.block.value {
                            updates.push((range.clone(), body));
                        }
                    }
                }
                report.blocks.push(BlockReport {
                    index: *index,
                    line: extracted.range.as_ref().map(|r| fence_line(&text, r.start)),
                    language: extracted.block.language.clone(),
                    result,
                });
            }

            if !updates.is_empty() {
                let updated = splice_blocks(&text, &updates);
                match self.store.write(path, &updated) {
                    Ok(()) => {
                        info!(blocks = updates.len(), "document updated");
                        report.updated = true;
                    }
                    Err(e) => {
                        warn!(error = %e, "document not written");
                        report.error = Some(e.to_string());
                    }
                }
            }

            report
        }
        .instrument(span)
        .await
    }

    /// Run blocks of one document in order against its shared state
    ///
    /// Untested blocks are skipped. Previously injected annotations are
    /// removed before a block runs, so captured lines match the text that
    /// update mode annotates.
    pub async fn run_blocks(
        &self,
        document: &str,
        blocks: &[CodeBlock],
    ) -> (TestSummary, Vec<ExecutionResult>) {
        let state = self.states.for_document(document);
        let mut summary = TestSummary::default();
        let mut results = Vec::new();

        for block in blocks.iter().filter(|b| b.tags().is_tested()) {
            let result = self.run_block(block, &state).await;
            if !result.success {
                warn!(
                    document,
                    language = %block.language,
                    error = result.error.as_deref().unwrap_or_default(),
                    "block failed"
                );
            }
            summary.record(&result);
            results.push(result);
        }

        self.states.discard(document);
        (summary, results)
    }

    async fn run_block(&self, block: &CodeBlock, state: &SharedState) -> ExecutionResult {
        let executor = self.executor.clone();
        let state = state.clone();
        let block = CodeBlock {
            value: strip_annotations(&block.value),
            ..block.clone()
        };

        // The interpreter is synchronous; keep it off the async workers
        match tokio::task::spawn_blocking(move || executor.execute(&block, &state)).await {
            Ok(result) => result,
            Err(e) => ExecutionResult::failure(format!("Block execution aborted: {}", e)),
        }
    }
}

/// 1-based line of the fence opening the block whose body starts at `offset`
fn fence_line(text: &str, offset: usize) -> usize {
    let body_line = text[..offset.min(text.len())].matches('\n').count() + 1;
    body_line.saturating_sub(1).max(1)
}

#[cfg(test)]
mod tests;
