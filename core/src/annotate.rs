//! AnnotationInjector - splice captured values back into fragment source
//!
//! Injection is a pure text operation over 1-indexed line numbers. Nothing
//! is re-parsed, so the positions handed in must already be exact.
//!
//! Annotation lines written here are the only ones [`strip_annotations`]
//! removes, which keeps repeated update runs from stacking annotations.

use std::collections::BTreeMap;

use crate::types::{CaptureKind, CapturedStatement};

pub const RESULT_MARKER: &str = "// =>";
pub const PASS_MARKER: &str = "// ✅";
pub const FAIL_MARKER: &str = "// ❌";

/// Prefix of continuation lines under a bare `// =>` header
const CONTINUATION: &str = "//   ";

#[derive(Debug, Clone)]
pub struct AnnotationInjector {
    /// Added to the annotated line's own indentation
    indent: String,
}

impl Default for AnnotationInjector {
    fn default() -> Self {
        Self::new("  ")
    }
}

impl AnnotationInjector {
    pub fn new(indent: impl Into<String>) -> Self {
        Self {
            indent: indent.into(),
        }
    }

    /// Insert annotation lines after every captured line
    pub fn inject(&self, source: &str, captures: &[CapturedStatement]) -> String {
        if captures.is_empty() {
            return source.to_string();
        }

        // Captures for a line keep their recorded order
        let mut by_line: BTreeMap<usize, Vec<&CapturedStatement>> = BTreeMap::new();
        for capture in captures {
            by_line.entry(capture.line.max(1)).or_default().push(capture);
        }

        let lines: Vec<&str> = source.lines().collect();
        let mut out: Vec<String> = Vec::with_capacity(lines.len() + captures.len());

        for (i, line) in lines.iter().enumerate() {
            out.push((*line).to_string());
            if let Some(line_captures) = by_line.remove(&(i + 1)) {
                let indent = format!("{}{}", leading_whitespace(line), self.indent);
                for capture in line_captures {
                    out.extend(render(capture, &indent));
                }
            }
        }

        // Positions past the end attach to the last line
        let last_indent = lines
            .last()
            .map(|line| format!("{}{}", leading_whitespace(line), self.indent))
            .unwrap_or_else(|| self.indent.clone());
        for capture in by_line.into_values().flatten() {
            out.extend(render(capture, &last_indent));
        }

        let newline = line_ending(source);
        let mut text = out.join(newline);
        if source.ends_with('\n') {
            text.push_str(newline);
        }
        text
    }
}

/// `"\r\n"` for fragments written with CRLF endings, `"\n"` otherwise
fn line_ending(source: &str) -> &'static str {
    if source.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}

fn leading_whitespace(line: &str) -> &str {
    let trimmed = line.trim_start();
    &line[..line.len() - trimmed.len()]
}

fn render(capture: &CapturedStatement, indent: &str) -> Vec<String> {
    match capture.kind {
        CaptureKind::Result => {
            let mut lines = capture.output.lines();
            match (lines.next(), capture.output.contains('\n')) {
                (Some(first), false) => vec![format!("{}{} {}", indent, RESULT_MARKER, first)],
                _ => {
                    let mut rendered = vec![format!("{}{}", indent, RESULT_MARKER)];
                    rendered.extend(
                        capture
                            .output
                            .lines()
                            .map(|l| format!("{}{}{}", indent, CONTINUATION, l)),
                    );
                    rendered
                }
            }
        }
        CaptureKind::Assertion => {
            let marker = if capture.assertion_passed == Some(true) {
                PASS_MARKER
            } else {
                FAIL_MARKER
            };
            let message = capture
                .assertion_message
                .as_deref()
                .unwrap_or(&capture.output);
            vec![format!("{}{} {}", indent, marker, single_line(message))]
        }
        CaptureKind::Error => vec![format!(
            "{}{} Error: {}",
            indent,
            FAIL_MARKER,
            single_line(&capture.output)
        )],
    }
}

fn single_line(text: &str) -> String {
    text.lines().map(str::trim).collect::<Vec<_>>().join(" ")
}

/// Remove annotation lines left by an earlier injection
pub fn strip_annotations(source: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut in_continuation = false;

    for line in source.lines() {
        let trimmed = line.trim_start();
        if in_continuation && trimmed.starts_with(CONTINUATION) {
            continue;
        }
        in_continuation = trimmed == RESULT_MARKER;
        if in_continuation || is_annotation(trimmed) {
            continue;
        }
        out.push(line);
    }

    let newline = line_ending(source);
    let mut text = out.join(newline);
    if source.ends_with('\n') && !text.is_empty() {
        text.push_str(newline);
    }
    text
}

fn is_annotation(trimmed: &str) -> bool {
    trimmed.starts_with(&format!("{} ", RESULT_MARKER))
        || trimmed.starts_with(PASS_MARKER)
        || trimmed.starts_with(FAIL_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inject(source: &str, captures: &[CapturedStatement]) -> String {
        AnnotationInjector::default().inject(source, captures)
    }

    #[test]
    fn test_single_capture_adds_one_indented_line() {
        let source = "const x = 5\n  x * 2\nx";
        let out = inject(source, &[CapturedStatement::result(2, 3, "10")]);
        assert_eq!(out, "const x = 5\n  x * 2\n    // => 10\nx");
        assert_eq!(out.lines().count(), source.lines().count() + 1);
    }

    #[test]
    fn test_captures_on_one_line_keep_order() {
        let captures = vec![
            CapturedStatement::result(1, 1, "\"first\""),
            CapturedStatement::assertion(1, 1, true, "expected 2 to be 2"),
            CapturedStatement::assertion(1, 1, false, "expected 3 to be 2"),
        ];
        let out = inject("check()", &captures);
        assert_eq!(
            out,
            "check()\n  // => \"first\"\n  // ✅ expected 2 to be 2\n  // ❌ expected 3 to be 2"
        );
    }

    #[test]
    fn test_error_capture() {
        let out = inject("boom()\n", &[CapturedStatement::error(1, 1, "TypeError: nope")]);
        assert_eq!(out, "boom()\n  // ❌ Error: TypeError: nope\n");
    }

    #[test]
    fn test_multiline_result_uses_header_and_continuation() {
        let out = inject("obj", &[CapturedStatement::result(1, 1, "{\n  \"a\": 1\n}")]);
        assert_eq!(out, "obj\n  // =>\n  //   {\n  //     \"a\": 1\n  //   }");
    }

    #[test]
    fn test_capture_past_end_attaches_to_last_line() {
        let out = inject("a\nb", &[CapturedStatement::result(9, 1, "1")]);
        assert_eq!(out, "a\nb\n  // => 1");
    }

    #[test]
    fn test_strip_removes_injected_lines_only() {
        let source = "const x = 5\n// a normal comment\nx * 2";
        let captures = vec![
            CapturedStatement::result(3, 1, "10"),
            CapturedStatement::result(1, 1, "{\n  \"a\": 1\n}"),
            CapturedStatement::assertion(3, 1, false, "bad"),
        ];
        let injected = inject(source, &captures);
        assert_eq!(strip_annotations(&injected), source);
    }

    #[test]
    fn test_crlf_fragments_keep_their_line_endings() {
        let source = "const x = 5\r\nx * 2\r\n";
        let out = inject(source, &[CapturedStatement::result(2, 1, "10")]);
        assert_eq!(out, "const x = 5\r\nx * 2\r\n  // => 10\r\n");
        assert_eq!(strip_annotations(&out), source);
    }

    #[test]
    fn test_inject_after_strip_is_stable() {
        let source = "const x = 5\nx * 2\n";
        let captures = vec![CapturedStatement::result(2, 1, "10")];
        let once = inject(source, &captures);
        let twice = inject(&strip_annotations(&once), &captures);
        assert_eq!(once, twice);
    }
}
