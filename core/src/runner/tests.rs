use std::sync::Arc;

use super::*;
use crate::context::{ExecutionContextFactory, StubClient};
use crate::executor::ScriptEvaluator;
use crate::indexer::AstIndexer;
use crate::store::FileStore;

fn runner() -> DocumentTestRunner {
    let executor = BlockExecutor::new(
        Arc::new(ScriptEvaluator::new()),
        Arc::new(AstIndexer),
        ExecutionContextFactory::new(Arc::new(StubClient)),
    );
    DocumentTestRunner::new(executor, Arc::new(FileStore))
}

fn js(source: &str, meta: &str) -> CodeBlock {
    CodeBlock::new("js", source, meta)
}

fn write_doc(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[tokio::test]
async fn test_single_assertion_summary() {
    let (summary, results) = runner()
        .run_blocks("guide.md", &[js("expect(1 + 1).toBe(2)", "assert")])
        .await;

    assert_eq!(
        summary,
        TestSummary {
            block_count: 1,
            passed: 1,
            failed: 0,
            assertion_count: 1,
            assertions_passed: 1,
            assertions_failed: 0,
        }
    );
    assert!(results[0].success);
}

#[tokio::test]
async fn test_state_flows_between_blocks_of_a_document() {
    let blocks = vec![
        js("export('x', 42)", "doc"),
        js("const x = import('x')\nexpect(x).toBe(42)", "assert"),
    ];
    let (summary, _) = runner().run_blocks("guide.md", &blocks).await;
    assert_eq!(summary.passed, 2);
    assert_eq!(summary.assertions_passed, 1);
}

#[tokio::test]
async fn test_state_does_not_leak_between_documents() {
    let runner = runner();
    runner.run_blocks("a.md", &[js("export('x', 1)", "doc")]).await;
    let (summary, results) = runner.run_blocks("b.md", &[js("import('x')", "doc")]).await;

    assert_eq!(summary.failed, 1);
    assert!(results[0]
        .error
        .as_deref()
        .is_some_and(|e| e.starts_with("ReferenceError")));
}

#[tokio::test]
async fn test_failure_does_not_stop_later_blocks() {
    let blocks = vec![
        js("1 + 1", "doc"),
        js("throw new Error('second')", "doc"),
        js("3 + 3", "doc"),
    ];
    let (summary, results) = runner().run_blocks("guide.md", &blocks).await;

    assert_eq!(results.len(), 3);
    assert!(results[0].success);
    assert!(!results[1].success);
    assert!(results[2].success);
    assert_eq!(results[2].result.as_deref(), Some("6"));
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.passed, 2);
}

#[tokio::test]
async fn test_untagged_blocks_are_skipped() {
    let blocks = vec![js("throw new Error('never')", ""), js("1", "doc")];
    let (summary, results) = runner().run_blocks("guide.md", &blocks).await;
    assert_eq!(summary.block_count, 1);
    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn test_update_mode_annotates_document() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_doc(
        &dir,
        "guide.md",
        "# Guide\n\n```js doc\nconst x = 5; console.log(x*2)\n```\n\nDone.\n",
    );

    let report = runner().with_update(true).run(&[path.clone()]).await;

    assert!(!report.has_failures());
    assert!(report.documents[0].updated);
    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        text,
        "# Guide\n\n```js doc\nconst x = 5; console.log(x*2)\n  // => 10\n```\n\nDone.\n"
    );
}

#[tokio::test]
async fn test_update_mode_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_doc(
        &dir,
        "guide.md",
        "```js doc\nconst items = ['a', 'b']\nitems.length\nexpect(items).toContain('a')\n```\n",
    );

    runner().with_update(true).run(&[path.clone()]).await;
    let first = std::fs::read_to_string(&path).unwrap();
    let second_report = runner().with_update(true).run(&[path.clone()]).await;
    let second = std::fs::read_to_string(&path).unwrap();

    assert_eq!(first, second);
    assert!(!second_report.documents[0].updated);
    assert!(first.contains("items.length\n  // => 2\n"));
    assert!(first.contains("  // ✅ expected [\"a\", \"b\"] to contain \"a\"\n"));
}

#[tokio::test]
async fn test_without_update_documents_are_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let original = "```js doc\n1 + 1\n```\n";
    let path = write_doc(&dir, "guide.md", original);

    runner().run(&[path.clone()]).await;
    assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
}

#[tokio::test]
async fn test_report_covers_every_document() {
    let dir = tempfile::tempdir().unwrap();
    let passing = write_doc(&dir, "pass.md", "```js assert\nexpect(1).toBe(1)\n```\n");
    let failing = write_doc(&dir, "fail.md", "```js assert\nexpect(1).toBe(2)\n```\n");

    let report = runner().run(&[passing, failing]).await;

    assert_eq!(report.exit_code(), 1);
    assert_eq!(report.total.block_count, 2);
    assert_eq!(report.total.assertions_failed, 1);

    let text = report.render(false);
    assert!(text.contains("✓ "));
    assert!(text.contains("pass.md: 1 blocks (1 passed, 0 failed)"));
    assert!(text.contains("✗ "));
    assert!(text.contains("AssertionError: expected 1 to be 2"));
    assert!(text.contains("Total: 2 document(s)"));
}

#[tokio::test]
async fn test_missing_document_is_reported() {
    let report = runner().run(&[PathBuf::from("/no/such/guide.md")]).await;
    assert_eq!(report.exit_code(), 1);
    assert!(report.documents[0].error.is_some());
}

#[tokio::test]
async fn test_timed_out_block_does_not_stop_the_document() {
    let executor = BlockExecutor::new(
        Arc::new(ScriptEvaluator::with_timeout(std::time::Duration::from_millis(50))),
        Arc::new(AstIndexer),
        ExecutionContextFactory::new(Arc::new(StubClient)),
    );
    let runner = DocumentTestRunner::new(executor, Arc::new(FileStore));
    let blocks = vec![
        js("while (true) {}", "doc"),
        js("console.log('after')\nexpect(1).toBe(1)", "assert"),
    ];

    let (summary, results) = runner.run_blocks("guide.md", &blocks).await;

    assert!(results[0]
        .error
        .as_deref()
        .is_some_and(|e| e.starts_with("TimeoutError")));
    assert!(results[1].success);
    assert_eq!(results[1].console_outputs[0].text, "after");
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.assertions_passed, 1);
}
