//! Object stdlib functions

use indexmap::IndexMap;

use super::arg;
use crate::executor::errors::ErrorInfo;
use crate::executor::values::{iterate, to_js_string, to_property_key, EvalResult, ObjRef, Val};

/// Methods every plain object responds to
pub const METHODS: &[&str] = &["hasOwnProperty", "toString"];

/// Own enumerable entries of any value, in insertion order
pub fn own_entries(val: &Val) -> Vec<(String, Val)> {
    match val {
        Val::Obj(map) => map
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        Val::List(items) => items
            .lock()
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v.clone()))
            .collect(),
        Val::Str(s) => s
            .chars()
            .enumerate()
            .map(|(i, c)| (i.to_string(), Val::Str(c.to_string())))
            .collect(),
        _ => Vec::new(),
    }
}

/// Object(value)
pub fn construct(args: &[Val]) -> EvalResult {
    match arg(args, 0) {
        Val::Undefined | Val::Null => Ok(Val::obj(IndexMap::new())),
        other => Ok(other),
    }
}

/// Object.keys(obj)
pub fn keys(args: &[Val]) -> EvalResult {
    let target = arg(args, 0);
    require_object(&target, "keys")?;
    Ok(Val::list(
        own_entries(&target)
            .into_iter()
            .map(|(k, _)| Val::Str(k))
            .collect(),
    ))
}

/// Object.values(obj)
pub fn values(args: &[Val]) -> EvalResult {
    let target = arg(args, 0);
    require_object(&target, "values")?;
    Ok(Val::list(
        own_entries(&target).into_iter().map(|(_, v)| v).collect(),
    ))
}

/// Object.entries(obj)
pub fn entries(args: &[Val]) -> EvalResult {
    let target = arg(args, 0);
    require_object(&target, "entries")?;
    Ok(Val::list(
        own_entries(&target)
            .into_iter()
            .map(|(k, v)| Val::list(vec![Val::Str(k), v]))
            .collect(),
    ))
}

/// Object.assign(target, ...sources)
pub fn assign(args: &[Val]) -> EvalResult {
    let target = arg(args, 0);
    let Val::Obj(map) = &target else {
        return Err(ErrorInfo::type_error("Object.assign target must be an object").into());
    };
    for source in args.iter().skip(1) {
        let entries = own_entries(source);
        map.lock().extend(entries);
    }
    Ok(target)
}

/// Object.fromEntries(pairs)
pub fn from_entries(args: &[Val]) -> EvalResult {
    let mut map = IndexMap::new();
    for pair in iterate(&arg(args, 0))? {
        let pair = iterate(&pair)?;
        let key = pair.first().map(to_property_key).unwrap_or_default();
        let value = pair.get(1).cloned().unwrap_or(Val::Undefined);
        map.insert(key, value);
    }
    Ok(Val::obj(map))
}

/// Methods on plain objects
pub fn call(map: &ObjRef, name: &str, args: &[Val]) -> EvalResult {
    match name {
        "hasOwnProperty" => {
            let key = to_property_key(&arg(args, 0));
            Ok(Val::Bool(map.lock().contains_key(&key)))
        }
        _ => Ok(Val::Str(to_js_string(&Val::Obj(map.clone())))),
    }
}

fn require_object(target: &Val, fn_name: &str) -> Result<(), ErrorInfo> {
    if target.is_nullish() {
        return Err(ErrorInfo::type_error(format!(
            "Object.{} called on {}",
            fn_name,
            to_js_string(target)
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::hashmap;

    #[test]
    fn test_keys_preserve_insertion_order() {
        let mut map = IndexMap::new();
        map.insert("b".to_string(), Val::Num(1.0));
        map.insert("a".to_string(), Val::Num(2.0));
        let keys = keys(&[Val::obj(map)]).unwrap();
        let Val::List(items) = keys else {
            panic!("expected list")
        };
        let names: Vec<String> = items.lock().iter().map(to_js_string).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_assign_merges_sources() {
        let target = Val::obj(IndexMap::new());
        let source: IndexMap<String, Val> = hashmap! { "x".to_string() => Val::Num(1.0) }
            .into_iter()
            .collect();
        assign(&[target.clone(), Val::obj(source)]).unwrap();
        let Val::Obj(map) = target else {
            panic!("expected object")
        };
        assert!(map.lock().contains_key("x"));
    }

    #[test]
    fn test_keys_of_null_is_type_error() {
        let err = keys(&[Val::Null]).unwrap_err();
        assert_eq!(err.describe().name, "TypeError");
    }
}
