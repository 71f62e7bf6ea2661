//! StatementIndexer - positions of the top-level statements in a fragment
//!
//! Indexing parses with the full grammar instead of running anything, so
//! type syntax is fine and side effects are impossible. It is best effort:
//! source that does not parse yields no statements and execution goes on
//! without annotations.

use tracing::debug;

use crate::executor::Stmt;
use crate::parser;
use crate::types::{Statement, StatementKind};

pub trait StatementIndexer: Send + Sync {
    /// Ordered statement positions, 1-indexed relative to `source`
    fn index(&self, source: &str) -> Vec<Statement>;
}

/// Indexer backed by the script parser
#[derive(Debug, Clone, Copy, Default)]
pub struct AstIndexer;

impl StatementIndexer for AstIndexer {
    fn index(&self, source: &str) -> Vec<Statement> {
        let program = match parser::parse_program(source) {
            Ok(program) => program,
            Err(e) => {
                debug!(error = %e, "statement indexing skipped");
                return Vec::new();
            }
        };

        program
            .body
            .iter()
            .filter_map(|stmt| {
                let kind = match stmt {
                    Stmt::Expr { .. } => StatementKind::Expression,
                    Stmt::Declare { .. } => StatementKind::Declaration,
                    Stmt::Return { .. } => StatementKind::Return,
                    _ => return None,
                };
                let span = stmt.span();
                Some(Statement {
                    line: span.start_line + 1,
                    column: span.start_col + 1,
                    end_line: span.end_line + 1,
                    kind,
                    text: source.get(span.start..span.end).unwrap_or_default().to_string(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexes_top_level_statements_only() {
        let source = "const a = 1\nfunction f() {\n  return a\n}\nf()\nif (a) { a }\nreturn a";
        let statements = AstIndexer.index(source);

        let positions: Vec<(usize, StatementKind)> =
            statements.iter().map(|s| (s.line, s.kind)).collect();
        assert_eq!(
            positions,
            vec![
                (1, StatementKind::Declaration),
                (5, StatementKind::Expression),
                (7, StatementKind::Return),
            ]
        );
        assert_eq!(statements[0].text, "const a = 1");
        assert_eq!(statements[1].text, "f()");
    }

    #[test]
    fn test_columns_and_end_lines() {
        let source = "  const total = [1, 2]\n    .map(n => n * 2)\n  total";
        let statements = AstIndexer.index(source);

        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].line, 1);
        assert_eq!(statements[0].column, 3);
        assert_eq!(statements[0].end_line, 2);
        assert_eq!(statements[1].line, 3);
        assert_eq!(statements[1].end_line, 3);
    }

    #[test]
    fn test_type_syntax_does_not_break_indexing() {
        let source = "interface User { name: string }\nconst u: User = { name: 'a' }\nu.name as string";
        let lines: Vec<usize> = AstIndexer.index(source).iter().map(|s| s.line).collect();
        assert_eq!(lines, vec![2, 3]);
    }

    #[test]
    fn test_unparsable_source_yields_nothing() {
        assert!(AstIndexer.index("const = = 1").is_empty());
    }
}
