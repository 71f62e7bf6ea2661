//! `String.prototype` and `RegExp.prototype` methods

use super::arg;
use crate::executor::values::{to_js_string, to_number, EvalResult, JsRegex, Val};

pub const METHODS: &[&str] = &[
    "toUpperCase",
    "toLowerCase",
    "trim",
    "trimStart",
    "trimEnd",
    "split",
    "includes",
    "startsWith",
    "endsWith",
    "indexOf",
    "lastIndexOf",
    "slice",
    "substring",
    "charAt",
    "charCodeAt",
    "replace",
    "replaceAll",
    "repeat",
    "padStart",
    "padEnd",
    "at",
    "concat",
    "match",
    "localeCompare",
    "toString",
];

/// Clamp a possibly negative character index into `0..=len`
fn relative(val: &Val, len: usize, default: usize) -> usize {
    if matches!(val, Val::Undefined) {
        return default;
    }
    let n = to_number(val);
    let n = if n.is_nan() { 0.0 } else { n.trunc() };
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}

fn char_slice(chars: &[char], start: usize, end: usize) -> String {
    if start >= end {
        return String::new();
    }
    chars[start..end].iter().collect()
}

fn pad(s: &str, args: &[Val], at_start: bool) -> String {
    let target = to_number(&arg(args, 0)).max(0.0) as usize;
    let filler = match arg(args, 1) {
        Val::Undefined => " ".to_string(),
        other => to_js_string(&other),
    };
    let len = s.chars().count();
    if target <= len || filler.is_empty() {
        return s.to_string();
    }
    let padding: String = filler.chars().cycle().take(target - len).collect();
    if at_start {
        format!("{}{}", padding, s)
    } else {
        format!("{}{}", s, padding)
    }
}

/// Invoke a `String.prototype` method
pub fn call(s: &str, name: &str, args: &[Val]) -> EvalResult {
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len();
    let text_arg = |i: usize| to_js_string(&arg(args, i));

    let value = match name {
        "toUpperCase" => Val::Str(s.to_uppercase()),
        "toLowerCase" => Val::Str(s.to_lowercase()),
        "trim" => Val::str(s.trim()),
        "trimStart" => Val::str(s.trim_start()),
        "trimEnd" => Val::str(s.trim_end()),
        "split" => {
            let limit = match arg(args, 1) {
                Val::Undefined => usize::MAX,
                other => to_number(&other).max(0.0) as usize,
            };
            let parts: Vec<Val> = match arg(args, 0) {
                Val::Undefined => vec![Val::str(s)],
                Val::Regex(re) => re.regex.split(s).map(Val::str).collect(),
                sep => {
                    let sep = to_js_string(&sep);
                    if sep.is_empty() {
                        chars.iter().map(|c| Val::Str(c.to_string())).collect()
                    } else {
                        s.split(sep.as_str()).map(Val::str).collect()
                    }
                }
            };
            Val::list(parts.into_iter().take(limit).collect())
        }
        "includes" => Val::Bool(s.contains(text_arg(0).as_str())),
        "startsWith" => Val::Bool(s.starts_with(text_arg(0).as_str())),
        "endsWith" => Val::Bool(s.ends_with(text_arg(0).as_str())),
        "indexOf" | "lastIndexOf" => {
            let needle = text_arg(0);
            let byte_pos = if name == "indexOf" {
                s.find(needle.as_str())
            } else {
                s.rfind(needle.as_str())
            };
            Val::Num(
                byte_pos
                    .map(|b| s[..b].chars().count() as f64)
                    .unwrap_or(-1.0),
            )
        }
        "slice" => {
            let start = relative(&arg(args, 0), len, 0);
            let end = relative(&arg(args, 1), len, len);
            Val::Str(char_slice(&chars, start, end))
        }
        "substring" => {
            let clamp = |v: Val, default: usize| match v {
                Val::Undefined => default,
                other => {
                    let n = to_number(&other);
                    if n.is_nan() {
                        0
                    } else {
                        n.clamp(0.0, len as f64) as usize
                    }
                }
            };
            let a = clamp(arg(args, 0), 0);
            let b = clamp(arg(args, 1), len);
            Val::Str(char_slice(&chars, a.min(b), a.max(b)))
        }
        "charAt" => {
            let i = to_number(&arg(args, 0));
            let i = if i.is_nan() { 0.0 } else { i };
            Val::Str(
                if i >= 0.0 {
                    chars.get(i as usize).map(|c| c.to_string())
                } else {
                    None
                }
                .unwrap_or_default(),
            )
        }
        "charCodeAt" => {
            let i = to_number(&arg(args, 0));
            let i = if i.is_nan() { 0.0 } else { i };
            Val::Num(
                chars
                    .get(i.max(0.0) as usize)
                    .filter(|_| i >= 0.0)
                    .map(|c| *c as u32 as f64)
                    .unwrap_or(f64::NAN),
            )
        }
        "replace" | "replaceAll" => {
            let replacement = text_arg(1);
            match arg(args, 0) {
                Val::Regex(re) => {
                    let template = js_replacement(&replacement);
                    if re.is_global() || name == "replaceAll" {
                        Val::Str(re.regex.replace_all(s, template.as_str()).into_owned())
                    } else {
                        Val::Str(re.regex.replace(s, template.as_str()).into_owned())
                    }
                }
                pattern => {
                    let pattern = to_js_string(&pattern);
                    if name == "replaceAll" {
                        Val::Str(s.replace(pattern.as_str(), &replacement))
                    } else {
                        Val::Str(s.replacen(pattern.as_str(), &replacement, 1))
                    }
                }
            }
        }
        "repeat" => {
            let n = to_number(&arg(args, 0));
            if n < 0.0 || n.is_infinite() {
                return Err(crate::executor::errors::ErrorInfo::range_error(format!(
                    "Invalid count value: {}",
                    to_js_string(&Val::Num(n))
                ))
                .into());
            }
            Val::Str(s.repeat(if n.is_nan() { 0 } else { n as usize }))
        }
        "padStart" => Val::Str(pad(s, args, true)),
        "padEnd" => Val::Str(pad(s, args, false)),
        "at" => {
            let n = to_number(&arg(args, 0));
            let n = if n.is_nan() { 0.0 } else { n.trunc() };
            let index = if n < 0.0 { len as f64 + n } else { n };
            if index < 0.0 {
                Val::Undefined
            } else {
                chars
                    .get(index as usize)
                    .map(|c| Val::Str(c.to_string()))
                    .unwrap_or(Val::Undefined)
            }
        }
        "concat" => {
            let mut out = s.to_string();
            for extra in args {
                out.push_str(&to_js_string(extra));
            }
            Val::Str(out)
        }
        "match" => match arg(args, 0) {
            Val::Regex(re) => match_regex(&re, s),
            other => {
                let re = JsRegex::compile(&regex::escape(&to_js_string(&other)), "")?;
                match_regex(&re, s)
            }
        },
        "localeCompare" => {
            let other = text_arg(0);
            Val::Num(match s.cmp(other.as_str()) {
                std::cmp::Ordering::Less => -1.0,
                std::cmp::Ordering::Equal => 0.0,
                std::cmp::Ordering::Greater => 1.0,
            })
        }
        _ => Val::str(s),
    };
    Ok(value)
}

/// `$1`/`$<name>` style replacement strings use the same syntax in the
/// regex crate, except that `$&` (whole match) is `${0}`
fn js_replacement(replacement: &str) -> String {
    replacement.replace("$&", "${0}")
}

fn match_regex(re: &JsRegex, s: &str) -> Val {
    if re.is_global() {
        let all: Vec<Val> = re.regex.find_iter(s).map(|m| Val::str(m.as_str())).collect();
        if all.is_empty() {
            Val::Null
        } else {
            Val::list(all)
        }
    } else {
        exec(re, s)
    }
}

/// `re.exec(s)`: match and capture groups, or null
fn exec(re: &JsRegex, s: &str) -> Val {
    match re.regex.captures(s) {
        Some(caps) => Val::list(
            caps.iter()
                .map(|m| m.map(|m| Val::str(m.as_str())).unwrap_or(Val::Undefined))
                .collect(),
        ),
        None => Val::Null,
    }
}

/// Invoke a `RegExp.prototype` method
pub fn call_regex(re: &JsRegex, name: &str, args: &[Val]) -> EvalResult {
    let input = to_js_string(&arg(args, 0));
    match name {
        "test" => Ok(Val::Bool(re.regex.is_match(&input))),
        "exec" => Ok(exec(re, &input)),
        _ => Ok(Val::Str(re.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call_str(s: &str, name: &str, args: &[Val]) -> String {
        to_js_string(&call(s, name, args).unwrap())
    }

    #[test]
    fn test_slice_with_negative_indexes() {
        assert_eq!(call_str("hello", "slice", &[Val::Num(-3.0)]), "llo");
        assert_eq!(call_str("hello", "slice", &[Val::Num(1.0), Val::Num(-1.0)]), "ell");
    }

    #[test]
    fn test_split_and_join_back() {
        let parts = call("a,b,c", "split", &[Val::str(",")]).unwrap();
        assert_eq!(to_js_string(&parts), "a,b,c");
        let Val::List(items) = parts else {
            panic!("expected list")
        };
        assert_eq!(items.lock().len(), 3);
    }

    #[test]
    fn test_replace_first_vs_all() {
        assert_eq!(call_str("a-a-a", "replace", &[Val::str("-"), Val::str("+")]), "a+a-a");
        assert_eq!(call_str("a-a-a", "replaceAll", &[Val::str("-"), Val::str("+")]), "a+a+a");
    }

    #[test]
    fn test_regex_replace_global() {
        let re = std::sync::Arc::new(JsRegex::compile("\\d", "g").unwrap());
        assert_eq!(
            call_str("a1b2", "replace", &[Val::Regex(re), Val::str("#")]),
            "a#b#"
        );
    }

    #[test]
    fn test_pad_start() {
        assert_eq!(call_str("7", "padStart", &[Val::Num(3.0), Val::str("0")]), "007");
    }

    #[test]
    fn test_index_of_counts_chars() {
        let idx = call("héllo", "indexOf", &[Val::str("l")]).unwrap();
        assert!(matches!(idx, Val::Num(n) if n == 2.0));
    }
}
