//! Type stripping for TypeScript fragments
//!
//! Type-only syntax is overwritten with spaces rather than removed, so every
//! remaining token keeps its line and column. Captured positions computed
//! against the original fragment stay valid for the stripped one.

use crate::parser::{self, ParseError};

/// Languages accepted by the block executor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    JavaScript,
    TypeScript,
}

impl Language {
    pub fn from_tag(tag: &str) -> Option<Language> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "js" | "javascript" | "mjs" => Some(Language::JavaScript),
            "ts" | "typescript" => Some(Language::TypeScript),
            _ => None,
        }
    }

    pub fn needs_stripping(&self) -> bool {
        matches!(self, Language::TypeScript)
    }
}

/// Blank out type syntax, preserving line count and columns
pub fn strip_types(source: &str) -> Result<String, ParseError> {
    let mut ranges = parser::type_syntax_ranges(source)?;
    if ranges.is_empty() {
        return Ok(source.to_string());
    }
    ranges.sort_by_key(|r| r.start);

    let mut out = String::with_capacity(source.len());
    let mut ranges = ranges.into_iter().peekable();
    let mut erase_until = 0;

    for (offset, ch) in source.char_indices() {
        while let Some(range) = ranges.peek() {
            if range.start > offset {
                break;
            }
            erase_until = erase_until.max(range.end);
            ranges.next();
        }
        if offset < erase_until && ch != '\n' && ch != '\r' {
            // One space per char keeps columns, which count chars
            out.push(' ');
        } else {
            out.push(ch);
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_tags() {
        assert_eq!(Language::from_tag("ts"), Some(Language::TypeScript));
        assert_eq!(Language::from_tag("JavaScript"), Some(Language::JavaScript));
        assert_eq!(Language::from_tag("python"), None);
        assert!(!Language::JavaScript.needs_stripping());
    }

    #[test]
    fn test_annotations_become_spaces() {
        let stripped = strip_types("const n: number = 1").unwrap();
        assert_eq!(stripped, "const n         = 1");
    }

    #[test]
    fn test_line_count_is_preserved() {
        let source = "interface User {\n  name: string\n  age: number\n}\nconst u: User = { name: 'a', age: 1 }\nfunction id<T>(x: T): T {\n  return x\n}\nid<number>(u.age) as number";
        let stripped = strip_types(source).unwrap();

        assert_eq!(stripped.lines().count(), source.lines().count());
        for (original, out) in source.lines().zip(stripped.lines()) {
            assert_eq!(original.chars().count(), out.chars().count());
        }
        assert!(!stripped.contains("interface"));
        assert!(stripped.contains("const u       = { name: 'a', age: 1 }"));
    }

    #[test]
    fn test_stripped_source_parses_as_plain_script() {
        let source = "type Id = string\nconst ids: Id[] = ['a']\nids.length satisfies number";
        let stripped = strip_types(source).unwrap();
        assert!(parser::parse_program(&stripped).is_ok());
        assert!(!stripped.contains("satisfies"));
    }

    #[test]
    fn test_plain_javascript_is_untouched() {
        let source = "const a = { b: 1 }\na.b ? 1 : 2";
        assert_eq!(strip_types(source).unwrap(), source);
    }

    #[test]
    fn test_invalid_source_is_an_error() {
        assert!(strip_types("const : = ").is_err());
    }
}
