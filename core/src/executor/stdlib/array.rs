//! Array stdlib functions and `Array.prototype` methods
//!
//! Callbacks may mutate the receiver, so the list lock is never held while
//! script code runs: methods work on a snapshot and write back afterwards.

use std::cmp::Ordering;

use super::arg;
use crate::executor::errors::ErrorInfo;
use crate::executor::values::{
    iterate, join_list, strict_equals, to_js_string, to_number, EvalResult, ListRef, Thrown, Val,
};
use crate::executor::Interpreter;

pub const METHODS: &[&str] = &[
    "push",
    "pop",
    "shift",
    "unshift",
    "slice",
    "splice",
    "concat",
    "join",
    "reverse",
    "indexOf",
    "lastIndexOf",
    "includes",
    "find",
    "findIndex",
    "findLast",
    "filter",
    "map",
    "forEach",
    "reduce",
    "some",
    "every",
    "sort",
    "flat",
    "flatMap",
    "at",
    "fill",
    "keys",
    "entries",
    "toString",
];

/// Array(n) / Array(a, b, ...)
pub fn construct(args: &[Val]) -> EvalResult {
    match args {
        [Val::Num(n)] => {
            if *n < 0.0 || n.fract() != 0.0 {
                return Err(ErrorInfo::range_error("Invalid array length").into());
            }
            Ok(Val::list(vec![Val::Undefined; *n as usize]))
        }
        _ => Ok(Val::list(args.to_vec())),
    }
}

/// Array.from(iterable, mapFn?)
pub fn from(interp: &mut Interpreter, args: &[Val]) -> EvalResult {
    let source = arg(args, 0);
    let items = match &source {
        // Array.from({ length: n })
        Val::Obj(map) => {
            let len = map.lock().get("length").map(to_number).unwrap_or(0.0);
            vec![Val::Undefined; len.max(0.0) as usize]
        }
        other => iterate(other)?,
    };
    let map_fn = arg(args, 1);
    if !map_fn.is_callable() {
        return Ok(Val::list(items));
    }
    let mut mapped = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        mapped.push(interp.call_value(&map_fn, Val::Undefined, vec![item, Val::Num(i as f64)])?);
    }
    Ok(Val::list(mapped))
}

/// Relative index as used by slice/splice/at
fn relative_index(val: &Val, len: usize, default: usize) -> usize {
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

fn callback(args: &[Val], method: &str) -> Result<Val, Thrown> {
    let cb = arg(args, 0);
    if !cb.is_callable() {
        return Err(ErrorInfo::type_error(format!(
            "{} is not a function (in Array.{})",
            to_js_string(&cb),
            method
        ))
        .into());
    }
    Ok(cb)
}

/// Call `cb(item, index, list)` for each element until `f` says stop
fn each(
    interp: &mut Interpreter,
    list: &ListRef,
    cb: &Val,
    mut f: impl FnMut(usize, &Val, Val) -> bool,
) -> Result<(), Thrown> {
    let snapshot = list.lock().clone();
    for (i, item) in snapshot.into_iter().enumerate() {
        let result = interp.call_value(
            cb,
            Val::Undefined,
            vec![item.clone(), Val::Num(i as f64), Val::List(list.clone())],
        )?;
        if !f(i, &item, result) {
            break;
        }
    }
    Ok(())
}

fn flatten(items: Vec<Val>, depth: f64, out: &mut Vec<Val>) {
    for item in items {
        match item {
            Val::List(inner) if depth >= 1.0 => {
                let inner = inner.lock().clone();
                flatten(inner, depth - 1.0, out);
            }
            other => out.push(other),
        }
    }
}

/// Default sort order: by string form, `undefined` last
fn default_order(a: &Val, b: &Val) -> Ordering {
    match (a, b) {
        (Val::Undefined, Val::Undefined) => Ordering::Equal,
        (Val::Undefined, _) => Ordering::Greater,
        (_, Val::Undefined) => Ordering::Less,
        _ => to_js_string(a).cmp(&to_js_string(b)),
    }
}

/// Stable sort with a comparator that may throw; an inconsistent script
/// comparator yields some permutation rather than a panic
fn merge_sort<F>(items: Vec<Val>, cmp: &mut F) -> Result<Vec<Val>, Thrown>
where
    F: FnMut(&Val, &Val) -> Result<Ordering, Thrown>,
{
    if items.len() <= 1 {
        return Ok(items);
    }
    let mut left = items;
    let right = left.split_off(left.len() / 2);
    let left = merge_sort(left, cmp)?;
    let right = merge_sort(right, cmp)?;

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut right = right.into_iter().peekable();
    for item in left {
        while let Some(next) = right.peek() {
            if cmp(next, &item)? == Ordering::Less {
                merged.extend(right.next());
            } else {
                break;
            }
        }
        merged.push(item);
    }
    merged.extend(right);
    Ok(merged)
}

/// Invoke an `Array.prototype` method
pub fn call(interp: &mut Interpreter, list: &ListRef, name: &str, args: Vec<Val>) -> EvalResult {
    match name {
        "push" => {
            let mut items = list.lock();
            items.extend(args);
            Ok(Val::Num(items.len() as f64))
        }
        "pop" => Ok(list.lock().pop().unwrap_or(Val::Undefined)),
        "shift" => {
            let mut items = list.lock();
            if items.is_empty() {
                Ok(Val::Undefined)
            } else {
                Ok(items.remove(0))
            }
        }
        "unshift" => {
            let mut items = list.lock();
            items.splice(0..0, args);
            Ok(Val::Num(items.len() as f64))
        }
        "slice" => {
            let items = list.lock().clone();
            let start = relative_index(&arg(&args, 0), items.len(), 0);
            let end = relative_index(&arg(&args, 1), items.len(), items.len());
            Ok(Val::list(items.get(start..end.max(start)).unwrap_or_default().to_vec()))
        }
        "splice" => {
            let mut items = list.lock();
            let len = items.len();
            let start = relative_index(&arg(&args, 0), len, 0);
            let count = match args.get(1) {
                None => len - start,
                Some(n) => (to_number(n).max(0.0) as usize).min(len - start),
            };
            let inserted = args.into_iter().skip(2);
            let removed: Vec<Val> = items.splice(start..start + count, inserted).collect();
            Ok(Val::list(removed))
        }
        "concat" => {
            let mut items = list.lock().clone();
            for extra in args {
                match extra {
                    Val::List(other) => items.extend(other.lock().clone()),
                    other => items.push(other),
                }
            }
            Ok(Val::list(items))
        }
        "join" => {
            let sep = match arg(&args, 0) {
                Val::Undefined => ",".to_string(),
                other => to_js_string(&other),
            };
            Ok(Val::Str(join_list(list, &sep)))
        }
        "reverse" => {
            list.lock().reverse();
            Ok(Val::List(list.clone()))
        }
        "indexOf" | "lastIndexOf" | "includes" => {
            let needle = arg(&args, 0);
            let items = list.lock().clone();
            let matches = |item: &Val| match (item, &needle) {
                // includes finds NaN, indexOf does not
                (Val::Num(a), Val::Num(b)) if name == "includes" && a.is_nan() && b.is_nan() => true,
                _ => strict_equals(item, &needle),
            };
            let found = if name == "lastIndexOf" {
                items.iter().rposition(matches)
            } else {
                items.iter().position(matches)
            };
            if name == "includes" {
                Ok(Val::Bool(found.is_some()))
            } else {
                Ok(Val::Num(found.map(|i| i as f64).unwrap_or(-1.0)))
            }
        }
        "find" | "findIndex" => {
            let cb = callback(&args, name)?;
            let mut hit = None;
            each(interp, list, &cb, |i, item, result| {
                if result.is_truthy() {
                    hit = Some((i, item.clone()));
                    false
                } else {
                    true
                }
            })?;
            Ok(match (name, hit) {
                ("find", Some((_, item))) => item,
                ("find", None) => Val::Undefined,
                (_, Some((i, _))) => Val::Num(i as f64),
                (_, None) => Val::Num(-1.0),
            })
        }
        "findLast" => {
            let cb = callback(&args, name)?;
            let snapshot = list.lock().clone();
            for (i, item) in snapshot.into_iter().enumerate().rev() {
                let result = interp.call_value(
                    &cb,
                    Val::Undefined,
                    vec![item.clone(), Val::Num(i as f64), Val::List(list.clone())],
                )?;
                if result.is_truthy() {
                    return Ok(item);
                }
            }
            Ok(Val::Undefined)
        }
        "filter" => {
            let cb = callback(&args, name)?;
            let mut kept = Vec::new();
            each(interp, list, &cb, |_, item, result| {
                if result.is_truthy() {
                    kept.push(item.clone());
                }
                true
            })?;
            Ok(Val::list(kept))
        }
        "map" => {
            let cb = callback(&args, name)?;
            let mut mapped = Vec::new();
            each(interp, list, &cb, |_, _, result| {
                mapped.push(result);
                true
            })?;
            Ok(Val::list(mapped))
        }
        "forEach" => {
            let cb = callback(&args, name)?;
            each(interp, list, &cb, |_, _, _| true)?;
            Ok(Val::Undefined)
        }
        "some" => {
            let cb = callback(&args, name)?;
            let mut any = false;
            each(interp, list, &cb, |_, _, result| {
                any = result.is_truthy();
                !any
            })?;
            Ok(Val::Bool(any))
        }
        "every" => {
            let cb = callback(&args, name)?;
            let mut all = true;
            each(interp, list, &cb, |_, _, result| {
                all = result.is_truthy();
                all
            })?;
            Ok(Val::Bool(all))
        }
        "reduce" => {
            let cb = callback(&args, name)?;
            let snapshot = list.lock().clone();
            let mut iter = snapshot.into_iter().enumerate();
            let mut acc = match args.get(1) {
                Some(initial) => initial.clone(),
                None => match iter.next() {
                    Some((_, first)) => first,
                    None => {
                        return Err(ErrorInfo::type_error(
                            "Reduce of empty array with no initial value",
                        )
                        .into())
                    }
                },
            };
            for (i, item) in iter {
                acc = interp.call_value(
                    &cb,
                    Val::Undefined,
                    vec![acc, item, Val::Num(i as f64), Val::List(list.clone())],
                )?;
            }
            Ok(acc)
        }
        "sort" => {
            let comparator = arg(&args, 0);
            let items = list.lock().clone();
            let items = if comparator.is_callable() {
                merge_sort(items, &mut |a, b| {
                    let v = interp.call_value(&comparator, Val::Undefined, vec![a.clone(), b.clone()])?;
                    Ok(to_number(&v).partial_cmp(&0.0).unwrap_or(Ordering::Equal))
                })?
            } else {
                merge_sort(items, &mut |a, b| Ok(default_order(a, b)))?
            };
            *list.lock() = items;
            Ok(Val::List(list.clone()))
        }
        "flat" => {
            let depth = match arg(&args, 0) {
                Val::Undefined => 1.0,
                other => to_number(&other),
            };
            let items = list.lock().clone();
            let mut out = Vec::new();
            flatten(items, depth, &mut out);
            Ok(Val::list(out))
        }
        "flatMap" => {
            let cb = callback(&args, name)?;
            let mut mapped = Vec::new();
            each(interp, list, &cb, |_, _, result| {
                mapped.push(result);
                true
            })?;
            let mut out = Vec::new();
            flatten(mapped, 1.0, &mut out);
            Ok(Val::list(out))
        }
        "at" => {
            let items = list.lock();
            let n = to_number(&arg(&args, 0)).trunc();
            let index = if n < 0.0 { items.len() as f64 + n } else { n };
            let found = if index < 0.0 {
                Val::Undefined
            } else {
                items.get(index as usize).cloned().unwrap_or(Val::Undefined)
            };
            Ok(found)
        }
        "fill" => {
            let mut items = list.lock();
            let len = items.len();
            let value = arg(&args, 0);
            let start = relative_index(&arg(&args, 1), len, 0);
            let end = relative_index(&arg(&args, 2), len, len);
            for slot in items.iter_mut().take(end).skip(start) {
                *slot = value.clone();
            }
            Ok(Val::List(list.clone()))
        }
        "keys" => {
            let len = list.lock().len();
            Ok(Val::list((0..len).map(|i| Val::Num(i as f64)).collect()))
        }
        "entries" => {
            let items = list.lock().clone();
            Ok(Val::list(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| Val::list(vec![Val::Num(i as f64), v]))
                    .collect(),
            ))
        }
        _ => Ok(Val::Str(to_js_string(&Val::List(list.clone())))),
    }
}
