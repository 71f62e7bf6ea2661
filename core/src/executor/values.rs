//! Runtime value types

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::Mutex;

use super::errors::ErrorInfo;
use super::scope::Scope;
use super::stdlib::StdlibFunc;
use super::types::ast::FunctionDef;
use super::Interpreter;

pub type ListRef = Arc<Mutex<Vec<Val>>>;
pub type ObjRef = Arc<Mutex<IndexMap<String, Val>>>;

/// Runtime value type
///
/// Lists and objects have reference semantics, like their JavaScript
/// counterparts. Every variant is `Send` so values can live in per-document
/// state shared across fragments.
#[derive(Debug, Clone)]
pub enum Val {
    Undefined,
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    List(ListRef),
    Obj(ObjRef),
    Func(Arc<Closure>),
    NativeFunc(StdlibFunc),
    /// Built-in method bound to its receiver (`"abc".toUpperCase`)
    Method { receiver: Box<Val>, name: String },
    Host(Arc<dyn HostObject>),
    Date(DateTime<Utc>),
    Regex(Arc<JsRegex>),
    /// Error value with name and message
    Error(ErrorInfo),
}

/// A compiled regular expression literal or `new RegExp(...)`
#[derive(Debug)]
pub struct JsRegex {
    pub source: String,
    pub flags: String,
    pub regex: regex::Regex,
}

impl JsRegex {
    pub fn compile(source: &str, flags: &str) -> Result<JsRegex, ErrorInfo> {
        let mut prefix = String::new();
        for flag in flags.chars() {
            match flag {
                'i' | 'm' | 's' => prefix.push(flag),
                'g' | 'u' | 'y' | 'd' => {}
                other => {
                    return Err(ErrorInfo::new(
                        super::errors::SYNTAX_ERROR,
                        format!("Invalid regular expression flags '{}'", other),
                    ))
                }
            }
        }
        let pattern = if prefix.is_empty() {
            source.to_string()
        } else {
            format!("(?{}){}", prefix, source)
        };
        let regex = regex::Regex::new(&pattern).map_err(|e| {
            ErrorInfo::new(
                super::errors::SYNTAX_ERROR,
                format!("Invalid regular expression: /{}/: {}", source, e),
            )
        })?;
        Ok(JsRegex {
            source: source.to_string(),
            flags: flags.to_string(),
            regex,
        })
    }

    pub fn is_global(&self) -> bool {
        self.flags.contains('g')
    }
}

impl fmt::Display for JsRegex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.source, self.flags)
    }
}

/// A user-defined function closed over its defining scope
pub struct Closure {
    pub def: Arc<FunctionDef>,
    pub env: Arc<Scope>,
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Closure({})", self.def.name.as_deref().unwrap_or("anonymous"))
    }
}

/// A value implemented by the embedding application rather than by script code
///
/// Host objects back the SDK verbs, the assertion helper and the state
/// primitives. They may be callable, expose properties, or both.
pub trait HostObject: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn call(&self, _interp: &mut Interpreter, _this: &Val, _args: Vec<Val>) -> EvalResult {
        Err(ErrorInfo::type_error(format!("{} is not a function", self.name())).into())
    }

    fn get(&self, _key: &str) -> Option<Val> {
        None
    }

    fn is_callable(&self) -> bool {
        true
    }
}

/// A thrown script value unwinding the Rust stack
#[derive(Debug, Clone)]
pub struct Thrown(pub Val);

impl From<ErrorInfo> for Thrown {
    fn from(info: ErrorInfo) -> Self {
        Thrown(Val::Error(info))
    }
}

impl Thrown {
    /// Name and message as a script would see them in a catch block
    pub fn describe(&self) -> ErrorInfo {
        match &self.0 {
            Val::Error(info) => info.clone(),
            Val::Obj(map) => {
                let map = map.lock();
                let name = map.get("name").map(to_js_string).unwrap_or_else(|| "Error".into());
                let message = map.get("message").map(to_js_string).unwrap_or_default();
                ErrorInfo::new(name, message)
            }
            other => ErrorInfo::new("Uncaught", to_js_string(other)),
        }
    }
}

pub type EvalResult = Result<Val, Thrown>;

impl Val {
    pub fn str(s: impl Into<String>) -> Val {
        Val::Str(s.into())
    }

    pub fn list(items: Vec<Val>) -> Val {
        Val::List(Arc::new(Mutex::new(items)))
    }

    pub fn obj(map: IndexMap<String, Val>) -> Val {
        Val::Obj(Arc::new(Mutex::new(map)))
    }

    /// Check if value is truthy (for conditionals)
    pub fn is_truthy(&self) -> bool {
        match self {
            Val::Undefined | Val::Null => false,
            Val::Bool(b) => *b,
            Val::Num(n) => *n != 0.0 && !n.is_nan(),
            Val::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Val::Undefined | Val::Null)
    }

    pub fn is_callable(&self) -> bool {
        match self {
            Val::Func(_) | Val::NativeFunc(_) | Val::Method { .. } => true,
            Val::Host(host) => host.is_callable(),
            _ => false,
        }
    }

    /// `typeof` result
    pub fn type_of(&self) -> &'static str {
        match self {
            Val::Undefined => "undefined",
            Val::Bool(_) => "boolean",
            Val::Num(_) => "number",
            Val::Str(_) => "string",
            Val::Func(_) | Val::NativeFunc(_) | Val::Method { .. } => "function",
            Val::Host(host) if host.is_callable() => "function",
            _ => "object",
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Val::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Val::Str(s) => Some(s),
            _ => None,
        }
    }
}

/* ===================== Conversions ===================== */

/// Number to string the way JavaScript prints it
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{:.0}", n)
    } else {
        format!("{}", n)
    }
}

/// `String(value)`
pub fn to_js_string(val: &Val) -> String {
    to_js_string_in(val, &mut Vec::new())
}

/// `list.join(sep)`; a list reached again while it is being joined renders as `""`
pub fn join_list(list: &ListRef, sep: &str) -> String {
    join_list_in(list, sep, &mut Vec::new())
}

fn join_list_in(list: &ListRef, sep: &str, active: &mut Vec<ListRef>) -> String {
    if active.iter().any(|seen| Arc::ptr_eq(seen, list)) {
        return String::new();
    }
    active.push(list.clone());
    let items = list.lock().clone();
    let joined = items
        .iter()
        .map(|item| match item {
            Val::Undefined | Val::Null => String::new(),
            other => to_js_string_in(other, active),
        })
        .collect::<Vec<_>>()
        .join(sep);
    active.pop();
    joined
}

fn to_js_string_in(val: &Val, active: &mut Vec<ListRef>) -> String {
    match val {
        Val::Undefined => "undefined".to_string(),
        Val::Null => "null".to_string(),
        Val::Bool(b) => b.to_string(),
        Val::Num(n) => number_to_string(*n),
        Val::Str(s) => s.clone(),
        Val::List(items) => join_list_in(items, ",", active),
        Val::Obj(_) => "[object Object]".to_string(),
        Val::Func(closure) => format!(
            "function {}() {{ [code] }}",
            closure.def.name.as_deref().unwrap_or("")
        ),
        Val::NativeFunc(func) => format!("function {}() {{ [native code] }}", func.name()),
        Val::Method { name, .. } => format!("function {}() {{ [native code] }}", name),
        Val::Host(host) => format!("function {}() {{ [native code] }}", host.name()),
        Val::Date(dt) => dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        Val::Regex(re) => re.to_string(),
        Val::Error(info) => info.to_string(),
    }
}

/// `Number(value)`
pub fn to_number(val: &Val) -> f64 {
    match val {
        Val::Undefined => f64::NAN,
        Val::Null => 0.0,
        Val::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Val::Num(n) => *n,
        Val::Str(s) => string_to_number(s),
        Val::Date(dt) => dt.timestamp_millis() as f64,
        Val::List(items) => {
            let items = items.lock().clone();
            match items.as_slice() {
                [] => 0.0,
                [single] => to_number(single),
                _ => f64::NAN,
            }
        }
        _ => f64::NAN,
    }
}

pub fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        return u64::from_str_radix(hex, 16)
            .map(|n| n as f64)
            .unwrap_or(f64::NAN);
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if trimmed.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => f64::NAN,
        _ => trimmed.parse::<f64>().unwrap_or(f64::NAN),
    }
}

/// Property key for a computed member access
pub fn to_property_key(val: &Val) -> String {
    to_js_string(val)
}

/// Array index for a numeric-looking key
pub fn as_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    key.parse::<usize>().ok()
}

/* ===================== Equality ===================== */

/// `===`
pub fn strict_equals(a: &Val, b: &Val) -> bool {
    match (a, b) {
        (Val::Undefined, Val::Undefined) | (Val::Null, Val::Null) => true,
        (Val::Bool(x), Val::Bool(y)) => x == y,
        (Val::Num(x), Val::Num(y)) => x == y,
        (Val::Str(x), Val::Str(y)) => x == y,
        (Val::List(x), Val::List(y)) => Arc::ptr_eq(x, y),
        (Val::Obj(x), Val::Obj(y)) => Arc::ptr_eq(x, y),
        (Val::Func(x), Val::Func(y)) => Arc::ptr_eq(x, y),
        (Val::NativeFunc(x), Val::NativeFunc(y)) => x == y,
        (Val::Host(x), Val::Host(y)) => Arc::ptr_eq(x, y),
        (Val::Date(x), Val::Date(y)) => x == y,
        (Val::Regex(x), Val::Regex(y)) => Arc::ptr_eq(x, y),
        _ => false,
    }
}

/// `==`
pub fn loose_equals(a: &Val, b: &Val) -> bool {
    match (a, b) {
        (x, y) if x.is_nullish() && y.is_nullish() => true,
        (x, y) if x.is_nullish() || y.is_nullish() => false,
        (Val::Num(_), Val::Str(_))
        | (Val::Str(_), Val::Num(_))
        | (Val::Bool(_), _)
        | (_, Val::Bool(_)) => to_number(a) == to_number(b),
        _ => strict_equals(a, b),
    }
}

/// Structural equality used by `toEqual`; `strict` also compares
/// `undefined` properties and array holes the way `toStrictEqual` does.
pub fn deep_equals(a: &Val, b: &Val, strict: bool) -> bool {
    deep_equals_at(a, b, strict, 0)
}

fn deep_equals_at(a: &Val, b: &Val, strict: bool, depth: usize) -> bool {
    if depth > 64 {
        return false;
    }
    match (a, b) {
        (Val::Num(x), Val::Num(y)) => x == y || (x.is_nan() && y.is_nan()),
        (Val::List(x), Val::List(y)) => {
            if Arc::ptr_eq(x, y) {
                return true;
            }
            let (x, y) = (x.lock().clone(), y.lock().clone());
            x.len() == y.len()
                && x.iter()
                    .zip(y.iter())
                    .all(|(l, r)| deep_equals_at(l, r, strict, depth + 1))
        }
        (Val::Obj(x), Val::Obj(y)) => {
            if Arc::ptr_eq(x, y) {
                return true;
            }
            let (x, y) = (x.lock().clone(), y.lock().clone());
            let keys = |map: &IndexMap<String, Val>| -> Vec<String> {
                let mut keys: Vec<String> = map
                    .iter()
                    .filter(|(_, v)| strict || !matches!(v, Val::Undefined))
                    .map(|(k, _)| k.clone())
                    .collect();
                keys.sort();
                keys
            };
            let (kx, ky) = (keys(&x), keys(&y));
            kx == ky
                && kx.iter().all(|k| {
                    let l = x.get(k).cloned().unwrap_or(Val::Undefined);
                    let r = y.get(k).cloned().unwrap_or(Val::Undefined);
                    deep_equals_at(&l, &r, strict, depth + 1)
                })
        }
        (Val::Error(x), Val::Error(y)) => x == y,
        (Val::Regex(x), Val::Regex(y)) => x.source == y.source && x.flags == y.flags,
        _ => strict_equals(a, b),
    }
}

/* ===================== Iteration ===================== */

/// Values produced by `for...of` and spread
pub fn iterate(val: &Val) -> Result<Vec<Val>, ErrorInfo> {
    match val {
        Val::List(items) => Ok(items.lock().clone()),
        Val::Str(s) => Ok(s.chars().map(|c| Val::Str(c.to_string())).collect()),
        Val::Obj(_) => Err(ErrorInfo::type_error("object is not iterable")),
        other => Err(ErrorInfo::type_error(format!(
            "{} is not iterable",
            to_js_string(other)
        ))),
    }
}
