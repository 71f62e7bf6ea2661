//! OutputFormatter - compact, stable rendering of runtime values
//!
//! Pure and deterministic: the same value and options always produce the
//! same string, which is what keeps repeated update runs stable.

use serde::{Deserialize, Serialize};

use crate::executor::stdlib::json::{to_string_indented, val_to_json};
use crate::executor::values::{number_to_string, to_js_string};
use crate::executor::Val;

/// Rendered in place of any callable value
pub const FUNCTION_PLACEHOLDER: &str = "[Function]";

/// Nesting depth rendered in compact previews before collapsing
const MAX_PREVIEW_DEPTH: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    /// Strings longer than this many characters are truncated
    pub max_string_length: usize,
    /// Preview arrays/objects on one line instead of full JSON
    pub compact: bool,
    /// Elements or keys shown before the "+N more" suffix
    pub preview_items: usize,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            max_string_length: 60,
            compact: true,
            preview_items: 3,
        }
    }
}

/// Render a value for an annotation
pub fn format_value(val: &Val, options: &FormatOptions) -> String {
    match val {
        Val::List(_) | Val::Obj(_) if !options.compact => match val_to_json(val) {
            Some(json) => to_string_indented(&json, "  "),
            None => "undefined".to_string(),
        },
        _ => format_at(val, options, 0),
    }
}

fn format_at(val: &Val, options: &FormatOptions, depth: usize) -> String {
    match val {
        Val::Undefined => "undefined".to_string(),
        Val::Null => "null".to_string(),
        Val::Bool(b) => b.to_string(),
        Val::Num(n) => number_to_string(*n),
        Val::Str(s) => quote(s, options.max_string_length),
        Val::Date(_) | Val::Regex(_) | Val::Error(_) => to_js_string(val),
        Val::Func(_) | Val::NativeFunc(_) | Val::Method { .. } => FUNCTION_PLACEHOLDER.to_string(),
        Val::Host(host) if host.is_callable() => FUNCTION_PLACEHOLDER.to_string(),
        Val::Host(host) => format!("[{}]", host.name()),
        Val::List(items) => {
            if depth >= MAX_PREVIEW_DEPTH {
                return "[Array]".to_string();
            }
            let items = items.lock().clone();
            if items.is_empty() {
                return "[]".to_string();
            }
            let mut parts: Vec<String> = items
                .iter()
                .take(options.preview_items)
                .map(|item| format_at(item, options, depth + 1))
                .collect();
            if items.len() > options.preview_items {
                parts.push(format!("+{} more", items.len() - options.preview_items));
            }
            format!("[{}]", parts.join(", "))
        }
        Val::Obj(map) => {
            if depth >= MAX_PREVIEW_DEPTH {
                return "[Object]".to_string();
            }
            let map = map.lock().clone();
            if map.is_empty() {
                return "{}".to_string();
            }
            let mut parts: Vec<String> = map
                .iter()
                .take(options.preview_items)
                .map(|(k, v)| format!("{}: {}", format_key(k), format_at(v, options, depth + 1)))
                .collect();
            if map.len() > options.preview_items {
                parts.push(format!("+{} more", map.len() - options.preview_items));
            }
            format!("{{ {} }}", parts.join(", "))
        }
    }
}

/// Quote a string, truncating with an ellipsis inside the closing quote
fn quote(s: &str, max_len: usize) -> String {
    let body: String = if s.chars().count() > max_len {
        let mut truncated: String = s.chars().take(max_len).collect();
        truncated.push('…');
        truncated
    } else {
        s.to_string()
    };
    serde_json::to_string(&body).unwrap_or_else(|_| format!("\"{}\"", body))
}

/// Object keys print bare when they are identifiers
fn format_key(key: &str) -> String {
    let mut chars = key.chars();
    let is_ident = chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$');
    if is_ident {
        key.to_string()
    } else {
        quote(key, usize::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::errors::ErrorInfo;
    use indexmap::IndexMap;

    fn fmt(val: &Val) -> String {
        format_value(val, &FormatOptions::default())
    }

    fn obj(pairs: &[(&str, Val)]) -> Val {
        let map: IndexMap<String, Val> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Val::obj(map)
    }

    #[test]
    fn test_primitives() {
        assert_eq!(fmt(&Val::Undefined), "undefined");
        assert_eq!(fmt(&Val::Null), "null");
        assert_eq!(fmt(&Val::Num(10.0)), "10");
        assert_eq!(fmt(&Val::Num(0.5)), "0.5");
        assert_eq!(fmt(&Val::Bool(true)), "true");
        assert_eq!(fmt(&Val::str("hi")), "\"hi\"");
    }

    #[test]
    fn test_long_string_truncates_inside_quote() {
        let options = FormatOptions {
            max_string_length: 5,
            ..FormatOptions::default()
        };
        assert_eq!(format_value(&Val::str("abcdefgh"), &options), "\"abcde…\"");
    }

    #[test]
    fn test_array_preview_has_more_suffix() {
        let list = Val::list((1..=5).map(|n| Val::Num(n as f64)).collect());
        assert_eq!(fmt(&list), "[1, 2, 3, +2 more]");
        assert_eq!(fmt(&Val::list(vec![])), "[]");
    }

    #[test]
    fn test_object_preview() {
        let value = obj(&[
            ("a", Val::Num(1.0)),
            ("b", Val::str("x")),
            ("c", Val::Null),
            ("d", Val::Bool(false)),
        ]);
        assert_eq!(fmt(&value), "{ a: 1, b: \"x\", c: null, +1 more }");
    }

    #[test]
    fn test_nested_values_collapse() {
        let inner = Val::list(vec![Val::list(vec![Val::Num(1.0)])]);
        let value = obj(&[("deep", inner)]);
        assert_eq!(fmt(&value), "{ deep: [[Array]] }");
    }

    #[test]
    fn test_full_json_when_not_compact() {
        let options = FormatOptions {
            compact: false,
            ..FormatOptions::default()
        };
        let value = obj(&[("a", Val::Num(1.0))]);
        assert_eq!(format_value(&value, &options), "{\n  \"a\": 1\n}");
    }

    #[test]
    fn test_errors_and_dates() {
        assert_eq!(fmt(&Val::Error(ErrorInfo::error("boom"))), "Error: boom");
        let date = chrono::DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        assert_eq!(fmt(&Val::Date(date)), "2024-01-02T03:04:05.000Z");
    }

    #[test]
    fn test_same_input_same_output() {
        let value = obj(&[("list", Val::list(vec![Val::str("a"), Val::Num(2.0)]))]);
        let options = FormatOptions::default();
        assert_eq!(format_value(&value, &options), format_value(&value, &options));
    }
}
