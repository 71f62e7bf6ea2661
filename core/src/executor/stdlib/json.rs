//! JSON stdlib functions and `Val` <-> `serde_json::Value` conversion

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value as JsonValue;

use super::arg;
use crate::executor::errors::{ErrorInfo, SYNTAX_ERROR};
use crate::executor::values::{to_js_string, EvalResult, Val};

/// Largest integer a double represents exactly
const MAX_SAFE_INTEGER: f64 = 9007199254740991.0;

/// Convert a number so integral values serialize without a fraction
pub fn number_to_json(n: f64) -> JsonValue {
    if !n.is_finite() {
        JsonValue::Null
    } else if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        JsonValue::from(n as i64)
    } else {
        JsonValue::from(n)
    }
}

/// JSON form of a value; `None` for values JSON skips (undefined, functions)
pub fn val_to_json(val: &Val) -> Option<JsonValue> {
    val_to_json_at(val, 0)
}

fn val_to_json_at(val: &Val, depth: usize) -> Option<JsonValue> {
    if depth > 64 {
        return Some(JsonValue::Null);
    }
    match val {
        Val::Undefined
        | Val::Func(_)
        | Val::NativeFunc(_)
        | Val::Method { .. }
        | Val::Host(_) => None,
        Val::Null => Some(JsonValue::Null),
        Val::Bool(b) => Some(JsonValue::Bool(*b)),
        Val::Num(n) => Some(number_to_json(*n)),
        Val::Str(s) => Some(JsonValue::String(s.clone())),
        Val::Date(_) => Some(JsonValue::String(to_js_string(val))),
        Val::List(items) => {
            let items = items.lock().clone();
            Some(JsonValue::Array(
                items
                    .iter()
                    .map(|item| val_to_json_at(item, depth + 1).unwrap_or(JsonValue::Null))
                    .collect(),
            ))
        }
        Val::Obj(map) => {
            let map = map.lock().clone();
            Some(JsonValue::Object(
                map.iter()
                    .filter_map(|(k, v)| val_to_json_at(v, depth + 1).map(|j| (k.clone(), j)))
                    .collect(),
            ))
        }
        Val::Regex(_) | Val::Error(_) => Some(JsonValue::Object(Default::default())),
    }
}

/// Script value for parsed JSON
pub fn json_to_val(json: &JsonValue) -> Val {
    match json {
        JsonValue::Null => Val::Null,
        JsonValue::Bool(b) => Val::Bool(*b),
        JsonValue::Number(n) => Val::Num(n.as_f64().unwrap_or(f64::NAN)),
        JsonValue::String(s) => Val::Str(s.clone()),
        JsonValue::Array(items) => Val::list(items.iter().map(json_to_val).collect()),
        JsonValue::Object(map) => {
            let map: IndexMap<String, Val> = map
                .iter()
                .map(|(k, v)| (k.clone(), json_to_val(v)))
                .collect();
            Val::obj(map)
        }
    }
}

/// Serialize with an explicit indent string
pub fn to_string_indented(json: &JsonValue, indent: &str) -> String {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    match json.serialize(&mut ser) {
        Ok(()) => String::from_utf8(out).unwrap_or_default(),
        Err(_) => json.to_string(),
    }
}

/// JSON.stringify(value, replacer?, indent?)
pub fn stringify(args: &[Val]) -> EvalResult {
    let Some(json) = val_to_json(&arg(args, 0)) else {
        return Ok(Val::Undefined);
    };
    let indent = match arg(args, 2) {
        Val::Num(n) if n >= 1.0 => " ".repeat(n.min(10.0) as usize),
        Val::Str(s) if !s.is_empty() => s.chars().take(10).collect(),
        _ => String::new(),
    };
    if indent.is_empty() {
        Ok(Val::Str(json.to_string()))
    } else {
        Ok(Val::Str(to_string_indented(&json, &indent)))
    }
}

/// JSON.parse(text)
pub fn parse(args: &[Val]) -> EvalResult {
    let text = to_js_string(&arg(args, 0));
    match serde_json::from_str::<JsonValue>(&text) {
        Ok(json) => Ok(json_to_val(&json)),
        Err(e) => Err(ErrorInfo::new(
            SYNTAX_ERROR,
            format!("Unexpected token in JSON at line {} column {}", e.line(), e.column()),
        )
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integral_numbers_have_no_fraction() {
        assert_eq!(number_to_json(3.0).to_string(), "3");
        assert_eq!(number_to_json(1.5).to_string(), "1.5");
        assert_eq!(number_to_json(f64::NAN), JsonValue::Null);
    }

    #[test]
    fn test_undefined_properties_are_skipped() {
        let mut map = IndexMap::new();
        map.insert("a".to_string(), Val::Num(1.0));
        map.insert("b".to_string(), Val::Undefined);
        let json = val_to_json(&Val::obj(map)).unwrap();
        assert_eq!(json, json!({"a": 1}));
    }

    #[test]
    fn test_stringify_with_indent() {
        let value = json_to_val(&json!({"a": [1, 2]}));
        let out = stringify(&[value, Val::Null, Val::Num(2.0)]).unwrap();
        assert_eq!(
            out.as_str().unwrap(),
            "{\n  \"a\": [\n    1,\n    2\n  ]\n}"
        );
    }

    #[test]
    fn test_parse_error_is_syntax_error() {
        let err = parse(&[Val::str("{oops")]).unwrap_err();
        assert_eq!(err.describe().name, "SyntaxError");
    }
}
