//! Standard library function implementations
//!
//! Globals (`Math`, `JSON`, `Object`, ...) are injected into the root scope,
//! and built-in methods of primitives (`"a".toUpperCase()`, `[1].map(...)`)
//! are resolved here by receiver type.

pub mod array;
pub mod date;
pub mod json;
pub mod math;
pub mod number;
pub mod object;
pub mod promise;
pub mod string;

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::errors::{self, ErrorInfo};
use super::scope::Scope;
use super::values::{to_js_string, EvalResult, JsRegex, Thrown, Val};
use super::Interpreter;
use crate::console::{self, ConsoleLevel};

/* ===================== Standard Library Function Types ===================== */

/// Standard library function identifiers
///
/// Each variant represents a specific stdlib function.
/// Constructors double as namespaces for their static members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StdlibFunc {
    ConsoleLog,
    ConsoleInfo,
    ConsoleWarn,
    ConsoleError,
    ConsoleDebug,

    MathFloor,
    MathCeil,
    MathAbs,
    MathRound,
    MathTrunc,
    MathSign,
    MathSqrt,
    MathPow,
    MathMin,
    MathMax,
    MathRandom,

    JsonStringify,
    JsonParse,

    ObjectCtor,
    ObjectKeys,
    ObjectValues,
    ObjectEntries,
    ObjectAssign,
    ObjectFromEntries,
    ObjectFreeze,

    ArrayCtor,
    ArrayIsArray,
    ArrayFrom,
    ArrayOf,

    NumberCtor,
    NumberIsInteger,
    NumberIsFinite,
    NumberIsNaN,
    StringCtor,
    BooleanCtor,
    ParseInt,
    ParseFloat,
    IsNaN,
    IsFinite,

    DateCtor,
    DateNow,

    PromiseCtor,
    PromiseResolve,
    PromiseReject,
    PromiseAll,

    ErrorCtor,
    TypeErrorCtor,
    RangeErrorCtor,
    RegExpCtor,

    SetTimeout,
}

impl StdlibFunc {
    pub fn name(&self) -> &'static str {
        match self {
            StdlibFunc::ConsoleLog => "log",
            StdlibFunc::ConsoleInfo => "info",
            StdlibFunc::ConsoleWarn => "warn",
            StdlibFunc::ConsoleError => "error",
            StdlibFunc::ConsoleDebug => "debug",
            StdlibFunc::MathFloor => "floor",
            StdlibFunc::MathCeil => "ceil",
            StdlibFunc::MathAbs => "abs",
            StdlibFunc::MathRound => "round",
            StdlibFunc::MathTrunc => "trunc",
            StdlibFunc::MathSign => "sign",
            StdlibFunc::MathSqrt => "sqrt",
            StdlibFunc::MathPow => "pow",
            StdlibFunc::MathMin => "min",
            StdlibFunc::MathMax => "max",
            StdlibFunc::MathRandom => "random",
            StdlibFunc::JsonStringify => "stringify",
            StdlibFunc::JsonParse => "parse",
            StdlibFunc::ObjectCtor => "Object",
            StdlibFunc::ObjectKeys => "keys",
            StdlibFunc::ObjectValues => "values",
            StdlibFunc::ObjectEntries => "entries",
            StdlibFunc::ObjectAssign => "assign",
            StdlibFunc::ObjectFromEntries => "fromEntries",
            StdlibFunc::ObjectFreeze => "freeze",
            StdlibFunc::ArrayCtor => "Array",
            StdlibFunc::ArrayIsArray => "isArray",
            StdlibFunc::ArrayFrom => "from",
            StdlibFunc::ArrayOf => "of",
            StdlibFunc::NumberCtor => "Number",
            StdlibFunc::NumberIsInteger => "isInteger",
            StdlibFunc::NumberIsFinite | StdlibFunc::IsFinite => "isFinite",
            StdlibFunc::NumberIsNaN | StdlibFunc::IsNaN => "isNaN",
            StdlibFunc::StringCtor => "String",
            StdlibFunc::BooleanCtor => "Boolean",
            StdlibFunc::ParseInt => "parseInt",
            StdlibFunc::ParseFloat => "parseFloat",
            StdlibFunc::DateCtor => "Date",
            StdlibFunc::DateNow => "now",
            StdlibFunc::PromiseCtor => "Promise",
            StdlibFunc::PromiseResolve => "resolve",
            StdlibFunc::PromiseReject => "reject",
            StdlibFunc::PromiseAll => "all",
            StdlibFunc::ErrorCtor => errors::ERROR,
            StdlibFunc::TypeErrorCtor => errors::TYPE_ERROR,
            StdlibFunc::RangeErrorCtor => errors::RANGE_ERROR,
            StdlibFunc::RegExpCtor => "RegExp",
            StdlibFunc::SetTimeout => "setTimeout",
        }
    }
}

/* ===================== Stdlib Dispatcher ===================== */

/// Call a standard library function with arguments
pub fn call_stdlib_func(interp: &mut Interpreter, func: &StdlibFunc, args: Vec<Val>) -> EvalResult {
    match func {
        StdlibFunc::ConsoleLog => log(ConsoleLevel::Log, &args),
        StdlibFunc::ConsoleInfo => log(ConsoleLevel::Info, &args),
        StdlibFunc::ConsoleWarn => log(ConsoleLevel::Warn, &args),
        StdlibFunc::ConsoleError => log(ConsoleLevel::Error, &args),
        StdlibFunc::ConsoleDebug => log(ConsoleLevel::Debug, &args),

        StdlibFunc::MathFloor => math::floor(&args),
        StdlibFunc::MathCeil => math::ceil(&args),
        StdlibFunc::MathAbs => math::abs(&args),
        StdlibFunc::MathRound => math::round(&args),
        StdlibFunc::MathTrunc => math::trunc(&args),
        StdlibFunc::MathSign => math::sign(&args),
        StdlibFunc::MathSqrt => math::sqrt(&args),
        StdlibFunc::MathPow => math::pow(&args),
        StdlibFunc::MathMin => math::min(&args),
        StdlibFunc::MathMax => math::max(&args),
        StdlibFunc::MathRandom => math::random(&args),

        StdlibFunc::JsonStringify => json::stringify(&args),
        StdlibFunc::JsonParse => json::parse(&args),

        StdlibFunc::ObjectCtor => object::construct(&args),
        StdlibFunc::ObjectKeys => object::keys(&args),
        StdlibFunc::ObjectValues => object::values(&args),
        StdlibFunc::ObjectEntries => object::entries(&args),
        StdlibFunc::ObjectAssign => object::assign(&args),
        StdlibFunc::ObjectFromEntries => object::from_entries(&args),
        StdlibFunc::ObjectFreeze => Ok(arg(&args, 0)),

        StdlibFunc::ArrayCtor => array::construct(&args),
        StdlibFunc::ArrayIsArray => Ok(Val::Bool(matches!(arg(&args, 0), Val::List(_)))),
        StdlibFunc::ArrayFrom => array::from(interp, &args),
        StdlibFunc::ArrayOf => Ok(Val::list(args)),

        StdlibFunc::NumberCtor => number::construct(&args),
        StdlibFunc::NumberIsInteger => number::is_integer(&args),
        StdlibFunc::NumberIsFinite => number::is_finite_strict(&args),
        StdlibFunc::NumberIsNaN => number::is_nan_strict(&args),
        StdlibFunc::IsFinite => number::is_finite(&args),
        StdlibFunc::IsNaN => number::is_nan(&args),
        StdlibFunc::ParseInt => number::parse_int(&args),
        StdlibFunc::ParseFloat => number::parse_float(&args),
        StdlibFunc::StringCtor => Ok(Val::Str(to_js_string(&arg(&args, 0)))),
        StdlibFunc::BooleanCtor => Ok(Val::Bool(arg(&args, 0).is_truthy())),

        StdlibFunc::DateCtor => Ok(Val::Str(date::now_string())),
        StdlibFunc::DateNow => Ok(Val::Num(chrono::Utc::now().timestamp_millis() as f64)),

        StdlibFunc::PromiseCtor => Err(ErrorInfo::type_error(
            "Promise constructor cannot be invoked without 'new'",
        )
        .into()),
        StdlibFunc::PromiseResolve => Ok(arg(&args, 0)),
        StdlibFunc::PromiseReject => Err(Thrown(arg(&args, 0))),
        StdlibFunc::PromiseAll => promise::all(&args),

        StdlibFunc::ErrorCtor | StdlibFunc::TypeErrorCtor | StdlibFunc::RangeErrorCtor => {
            construct(interp, func, args)
        }
        StdlibFunc::RegExpCtor => construct(interp, func, args),

        StdlibFunc::SetTimeout => {
            // Timers fire immediately; there is no event loop to defer to.
            let callback = arg(&args, 0);
            if callback.is_callable() {
                let extra = args.get(2..).unwrap_or_default().to_vec();
                interp.call_value(&callback, Val::Undefined, extra)?;
            }
            Ok(Val::Num(1.0))
        }
    }
}

/// `new Func(...args)` for built-in constructors
pub fn construct(interp: &mut Interpreter, func: &StdlibFunc, args: Vec<Val>) -> EvalResult {
    match func {
        StdlibFunc::DateCtor => date::construct(&args),
        StdlibFunc::PromiseCtor => promise::construct(interp, &args),
        StdlibFunc::ErrorCtor | StdlibFunc::TypeErrorCtor | StdlibFunc::RangeErrorCtor => {
            let message = match arg(&args, 0) {
                Val::Undefined => String::new(),
                other => to_js_string(&other),
            };
            Ok(Val::Error(ErrorInfo::new(func.name(), message)))
        }
        StdlibFunc::RegExpCtor => {
            let (source, flags) = match arg(&args, 0) {
                Val::Regex(re) => (re.source.clone(), re.flags.clone()),
                other => (to_js_string(&other), String::new()),
            };
            let flags = match arg(&args, 1) {
                Val::Undefined => flags,
                other => to_js_string(&other),
            };
            Ok(Val::Regex(Arc::new(JsRegex::compile(&source, &flags)?)))
        }
        StdlibFunc::ObjectCtor
        | StdlibFunc::ArrayCtor
        | StdlibFunc::NumberCtor
        | StdlibFunc::StringCtor
        | StdlibFunc::BooleanCtor => call_stdlib_func(interp, func, args),
        other => Err(ErrorInfo::type_error(format!("{} is not a constructor", other.name())).into()),
    }
}

/// Static members of built-in constructors (`Object.keys`, `Date.now`)
pub fn static_member(func: &StdlibFunc, key: &str) -> Option<Val> {
    let member = match (func, key) {
        (_, "name") => return Some(Val::str(func.name())),
        (StdlibFunc::ObjectCtor, "keys") => StdlibFunc::ObjectKeys,
        (StdlibFunc::ObjectCtor, "values") => StdlibFunc::ObjectValues,
        (StdlibFunc::ObjectCtor, "entries") => StdlibFunc::ObjectEntries,
        (StdlibFunc::ObjectCtor, "assign") => StdlibFunc::ObjectAssign,
        (StdlibFunc::ObjectCtor, "fromEntries") => StdlibFunc::ObjectFromEntries,
        (StdlibFunc::ObjectCtor, "freeze") => StdlibFunc::ObjectFreeze,
        (StdlibFunc::ArrayCtor, "isArray") => StdlibFunc::ArrayIsArray,
        (StdlibFunc::ArrayCtor, "from") => StdlibFunc::ArrayFrom,
        (StdlibFunc::ArrayCtor, "of") => StdlibFunc::ArrayOf,
        (StdlibFunc::NumberCtor, "isInteger") => StdlibFunc::NumberIsInteger,
        (StdlibFunc::NumberCtor, "isFinite") => StdlibFunc::NumberIsFinite,
        (StdlibFunc::NumberCtor, "isNaN") => StdlibFunc::NumberIsNaN,
        (StdlibFunc::NumberCtor, "parseInt") => StdlibFunc::ParseInt,
        (StdlibFunc::NumberCtor, "parseFloat") => StdlibFunc::ParseFloat,
        (StdlibFunc::NumberCtor, "MAX_SAFE_INTEGER") => return Some(Val::Num(9007199254740991.0)),
        (StdlibFunc::NumberCtor, "MIN_SAFE_INTEGER") => return Some(Val::Num(-9007199254740991.0)),
        (StdlibFunc::NumberCtor, "EPSILON") => return Some(Val::Num(f64::EPSILON)),
        (StdlibFunc::DateCtor, "now") => StdlibFunc::DateNow,
        (StdlibFunc::PromiseCtor, "resolve") => StdlibFunc::PromiseResolve,
        (StdlibFunc::PromiseCtor, "reject") => StdlibFunc::PromiseReject,
        (StdlibFunc::PromiseCtor, "all") => StdlibFunc::PromiseAll,
        _ => return None,
    };
    Some(Val::NativeFunc(member))
}

/// Built-in method of a receiver, bound to it
pub fn lookup_method(receiver: &Val, key: &str) -> Option<Val> {
    let known = match receiver {
        Val::List(_) => array::METHODS.contains(&key),
        Val::Str(_) => string::METHODS.contains(&key),
        Val::Num(_) => number::METHODS.contains(&key),
        Val::Date(_) => date::METHODS.contains(&key),
        Val::Obj(_) => object::METHODS.contains(&key),
        Val::Regex(_) => matches!(key, "test" | "exec" | "toString"),
        Val::Bool(_) | Val::Error(_) => key == "toString",
        Val::Func(_) | Val::NativeFunc(_) => matches!(key, "call" | "apply"),
        _ => false,
    };
    known.then(|| Val::Method {
        receiver: Box::new(receiver.clone()),
        name: key.to_string(),
    })
}

/// Invoke a built-in method on its receiver
pub fn call_method(interp: &mut Interpreter, receiver: &Val, name: &str, args: Vec<Val>) -> EvalResult {
    match receiver {
        Val::List(items) => array::call(interp, items, name, args),
        Val::Str(s) => string::call(s, name, &args),
        Val::Num(n) => number::call(*n, name, &args),
        Val::Date(dt) => date::call(dt, name),
        Val::Obj(map) => object::call(map, name, &args),
        Val::Regex(re) => string::call_regex(re, name, &args),
        Val::Func(_) | Val::NativeFunc(_) => {
            let mut args = args.into_iter();
            let this = args.next().unwrap_or(Val::Undefined);
            let rest = match name {
                "apply" => match args.next() {
                    Some(Val::List(list)) => list.lock().clone(),
                    _ => Vec::new(),
                },
                _ => args.collect(),
            };
            interp.call_value(receiver, this, rest)
        }
        other if name == "toString" => Ok(Val::Str(to_js_string(other))),
        other => Err(ErrorInfo::type_error(format!(
            "{}.{} is not a function",
            to_js_string(other),
            name
        ))
        .into()),
    }
}

/// `value instanceof ctor`
pub fn instance_of(value: &Val, ctor: &Val) -> bool {
    let Val::NativeFunc(func) = ctor else {
        return false;
    };
    match func {
        StdlibFunc::ArrayCtor => matches!(value, Val::List(_)),
        StdlibFunc::DateCtor => matches!(value, Val::Date(_)),
        StdlibFunc::RegExpCtor => matches!(value, Val::Regex(_)),
        StdlibFunc::ErrorCtor => matches!(value, Val::Error(_)),
        StdlibFunc::TypeErrorCtor | StdlibFunc::RangeErrorCtor => {
            matches!(value, Val::Error(info) if info.name == func.name())
        }
        StdlibFunc::ObjectCtor => matches!(
            value,
            Val::Obj(_) | Val::List(_) | Val::Date(_) | Val::Regex(_) | Val::Error(_) | Val::Func(_)
        ),
        _ => false,
    }
}

/// Argument `i`, or `undefined` when absent
pub(crate) fn arg(args: &[Val], i: usize) -> Val {
    args.get(i).cloned().unwrap_or(Val::Undefined)
}

fn log(level: ConsoleLevel, args: &[Val]) -> EvalResult {
    console::emit(level, args);
    Ok(Val::Undefined)
}

/* ===================== Environment Injection ===================== */

fn namespace(members: &[StdlibFunc]) -> Val {
    let map: IndexMap<String, Val> = members
        .iter()
        .map(|f| (f.name().to_string(), Val::NativeFunc(f.clone())))
        .collect();
    Val::obj(map)
}

/// Inject standard library objects into the root scope
pub fn inject_stdlib(scope: &Arc<Scope>) {
    scope.declare(
        "console",
        namespace(&[
            StdlibFunc::ConsoleLog,
            StdlibFunc::ConsoleInfo,
            StdlibFunc::ConsoleWarn,
            StdlibFunc::ConsoleError,
            StdlibFunc::ConsoleDebug,
        ]),
        false,
    );

    let math = namespace(&[
        StdlibFunc::MathFloor,
        StdlibFunc::MathCeil,
        StdlibFunc::MathAbs,
        StdlibFunc::MathRound,
        StdlibFunc::MathTrunc,
        StdlibFunc::MathSign,
        StdlibFunc::MathSqrt,
        StdlibFunc::MathPow,
        StdlibFunc::MathMin,
        StdlibFunc::MathMax,
        StdlibFunc::MathRandom,
    ]);
    if let Val::Obj(map) = &math {
        let mut map = map.lock();
        map.insert("PI".to_string(), Val::Num(std::f64::consts::PI));
        map.insert("E".to_string(), Val::Num(std::f64::consts::E));
    }
    scope.declare("Math", math, false);

    scope.declare(
        "JSON",
        namespace(&[StdlibFunc::JsonStringify, StdlibFunc::JsonParse]),
        false,
    );

    for ctor in [
        StdlibFunc::ObjectCtor,
        StdlibFunc::ArrayCtor,
        StdlibFunc::NumberCtor,
        StdlibFunc::StringCtor,
        StdlibFunc::BooleanCtor,
        StdlibFunc::DateCtor,
        StdlibFunc::PromiseCtor,
        StdlibFunc::ErrorCtor,
        StdlibFunc::TypeErrorCtor,
        StdlibFunc::RangeErrorCtor,
        StdlibFunc::RegExpCtor,
        StdlibFunc::ParseInt,
        StdlibFunc::ParseFloat,
        StdlibFunc::IsNaN,
        StdlibFunc::IsFinite,
        StdlibFunc::SetTimeout,
    ] {
        scope.declare(ctor.name(), Val::NativeFunc(ctor), false);
    }

    scope.declare("NaN", Val::Num(f64::NAN), false);
    scope.declare("Infinity", Val::Num(f64::INFINITY), false);
    scope.declare("globalThis", Val::obj(IndexMap::new()), false);
}
