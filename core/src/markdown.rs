//! Fenced code block extraction and write-back
//!
//! Blocks are found with pulldown-cmark's offset iterator so each block
//! remembers the byte range of its body in the document. Updated bodies are
//! spliced back into those ranges and nothing else in the document changes.

use std::ops::Range;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use tracing::debug;

use crate::types::CodeBlock;

/// A fenced block and where its body sits in the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedBlock {
    pub block: CodeBlock,
    /// Byte range of the body; `None` when the body is not a verbatim slice
    /// of the document (indented fences) and cannot be written back
    pub range: Option<Range<usize>>,
}

/// Ordered fenced code blocks of `markdown`
pub fn extract_blocks(markdown: &str) -> Vec<ExtractedBlock> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    let parser = Parser::new_ext(markdown, options).into_offset_iter();

    let mut blocks = Vec::new();
    let mut current: Option<(String, String, String, Option<Range<usize>>)> = None;

    for (event, range) in parser {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                let info = info.trim();
                let (language, meta) = match info.split_once(char::is_whitespace) {
                    Some((language, meta)) => (language.to_string(), meta.trim().to_string()),
                    None => (info.to_string(), String::new()),
                };
                current = Some((language, meta, String::new(), None));
            }
            Event::Text(text) => {
                if let Some((_, _, body, body_range)) = current.as_mut() {
                    body.push_str(&text);
                    *body_range = Some(match body_range.take() {
                        Some(existing) => existing.start..range.end,
                        None => range,
                    });
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some((language, meta, body, body_range)) = current.take() {
                    let range = body_range.filter(|r| markdown.get(r.clone()) == Some(body.as_str()));
                    if range.is_none() && !body.is_empty() {
                        debug!(language = %language, "code block body is not contiguous, it will not be updated");
                    }
                    blocks.push(ExtractedBlock {
                        block: CodeBlock::new(language, body, meta),
                        range,
                    });
                }
            }
            _ => {}
        }
    }

    blocks
}

/// Replace block bodies; ranges must come from [`extract_blocks`] on the
/// same text and must not overlap
pub fn splice_blocks(markdown: &str, updates: &[(Range<usize>, String)]) -> String {
    let mut updates: Vec<&(Range<usize>, String)> = updates.iter().collect();
    updates.sort_by_key(|(range, _)| range.start);

    let mut out = String::with_capacity(markdown.len());
    let mut cursor = 0;
    for (range, body) in updates {
        if range.start < cursor || range.end > markdown.len() {
            continue;
        }
        out.push_str(&markdown[cursor..range.start]);
        out.push_str(body);
        cursor = range.end;
    }
    out.push_str(&markdown[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "# Title\n\nSome text.\n\n```js doc\nconst x = 5\nx * 2\n```\n\n```ts assert context=staging\nexpect(1).toBe(1)\n```\n\n```\nplain\n```\n";

    #[test]
    fn test_extracts_language_meta_and_body() {
        let blocks = extract_blocks(DOC);
        assert_eq!(blocks.len(), 3);

        assert_eq!(blocks[0].block, CodeBlock::new("js", "const x = 5\nx * 2\n", "doc"));
        assert_eq!(blocks[1].block.language, "ts");
        assert_eq!(blocks[1].block.meta, "assert context=staging");
        assert_eq!(blocks[2].block.language, "");
    }

    #[test]
    fn test_ranges_point_at_bodies() {
        for extracted in extract_blocks(DOC) {
            let range = extracted.range.unwrap();
            assert_eq!(&DOC[range], extracted.block.value);
        }
    }

    #[test]
    fn test_splice_replaces_only_bodies() {
        let blocks = extract_blocks(DOC);
        let first = blocks[0].range.clone().unwrap();
        let second = blocks[1].range.clone().unwrap();
        let updated = splice_blocks(
            DOC,
            &[
                (second, "expect(2).toBe(2)\n".to_string()),
                (first, "const x = 5\nx * 2\n  // => 10\n".to_string()),
            ],
        );

        assert!(updated.starts_with("# Title\n\nSome text.\n\n```js doc\nconst x = 5\nx * 2\n  // => 10\n```"));
        assert!(updated.contains("```ts assert context=staging\nexpect(2).toBe(2)\n```"));
        assert!(updated.ends_with("```\nplain\n```\n"));
    }

    #[test]
    fn test_no_blocks() {
        assert!(extract_blocks("just prose\n").is_empty());
        assert_eq!(splice_blocks("text", &[]), "text");
    }
}
