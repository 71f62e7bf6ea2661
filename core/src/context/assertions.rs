//! `expect(...)` and `assert(...)`
//!
//! Every check reports a verdict to the block's capture log before
//! returning. A failing check then throws `AssertionError`, which stops the
//! fragment on the failing line while earlier captures stay recorded.

use std::sync::Arc;

use crate::executor::errors::ASSERTION_ERROR;
use crate::executor::stdlib::arg;
use crate::executor::values::{deep_equals, strict_equals, to_js_string, to_number};
use crate::executor::{ErrorInfo, EvalResult, HostObject, Interpreter, Thrown, Val};
use crate::formatter::{format_value, FormatOptions};

/// Receives `(passed, message)` for every check
pub type VerdictSink = Arc<dyn Fn(bool, &str) + Send + Sync>;

/// `expect(actual)`
pub struct ExpectFn {
    sink: VerdictSink,
}

impl ExpectFn {
    pub fn new(sink: VerdictSink) -> Self {
        Self { sink }
    }
}

impl std::fmt::Debug for ExpectFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ExpectFn")
    }
}

impl HostObject for ExpectFn {
    fn name(&self) -> &str {
        "expect"
    }

    fn call(&self, _interp: &mut Interpreter, _this: &Val, args: Vec<Val>) -> EvalResult {
        Ok(Val::Host(Arc::new(Expectation {
            actual: arg(&args, 0),
            negated: false,
            sink: self.sink.clone(),
        })))
    }
}

/// The object returned by `expect`; matchers are its properties
#[derive(Clone)]
struct Expectation {
    actual: Val,
    negated: bool,
    sink: VerdictSink,
}

impl std::fmt::Debug for Expectation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Expectation")
            .field("actual", &self.actual)
            .field("negated", &self.negated)
            .finish()
    }
}

const MATCHERS: &[&str] = &[
    "toBe",
    "toEqual",
    "toStrictEqual",
    "toBeTruthy",
    "toBeFalsy",
    "toBeNull",
    "toBeUndefined",
    "toBeDefined",
    "toContain",
    "toHaveLength",
    "toHaveProperty",
    "toBeGreaterThan",
    "toBeGreaterThanOrEqual",
    "toBeLessThan",
    "toBeLessThanOrEqual",
    "toMatch",
    "toThrow",
];

impl HostObject for Expectation {
    fn name(&self) -> &str {
        "Expectation"
    }

    fn is_callable(&self) -> bool {
        false
    }

    fn get(&self, key: &str) -> Option<Val> {
        if key == "not" {
            let mut negated = self.clone();
            negated.negated = !self.negated;
            return Some(Val::Host(Arc::new(negated)));
        }
        MATCHERS.iter().copied().find(|m| *m == key).map(|matcher| {
            Val::Host(Arc::new(Matcher {
                expectation: self.clone(),
                matcher,
            }))
        })
    }
}

#[derive(Debug)]
struct Matcher {
    expectation: Expectation,
    matcher: &'static str,
}

impl HostObject for Matcher {
    fn name(&self) -> &str {
        self.matcher
    }

    fn call(&self, interp: &mut Interpreter, _this: &Val, args: Vec<Val>) -> EvalResult {
        let actual = &self.expectation.actual;
        let expected = arg(&args, 0);

        let (pass, phrase) = match self.matcher {
            "toBe" => (same_value(actual, &expected), format!("to be {}", show(&expected))),
            "toEqual" => (
                deep_equals(actual, &expected, false),
                format!("to equal {}", show(&expected)),
            ),
            "toStrictEqual" => (
                deep_equals(actual, &expected, true),
                format!("to strictly equal {}", show(&expected)),
            ),
            "toBeTruthy" => (actual.is_truthy(), "to be truthy".to_string()),
            "toBeFalsy" => (!actual.is_truthy(), "to be falsy".to_string()),
            "toBeNull" => (matches!(actual, Val::Null), "to be null".to_string()),
            "toBeUndefined" => (matches!(actual, Val::Undefined), "to be undefined".to_string()),
            "toBeDefined" => (!matches!(actual, Val::Undefined), "to be defined".to_string()),
            "toContain" => (contains(actual, &expected), format!("to contain {}", show(&expected))),
            "toHaveLength" => (
                length_of(actual).is_some_and(|len| len as f64 == to_number(&expected)),
                format!("to have length {}", show(&expected)),
            ),
            "toHaveProperty" => {
                let path = to_js_string(&expected);
                let found = property_at(actual, &path);
                match args.get(1) {
                    Some(value) => (
                        found.is_some_and(|v| deep_equals(&v, value, false)),
                        format!("to have property '{}' equal to {}", path, show(value)),
                    ),
                    None => (found.is_some(), format!("to have property '{}'", path)),
                }
            }
            "toBeGreaterThan" => compare(actual, &expected, "greater than", |a, b| a > b),
            "toBeGreaterThanOrEqual" => {
                compare(actual, &expected, "greater than or equal to", |a, b| a >= b)
            }
            "toBeLessThan" => compare(actual, &expected, "less than", |a, b| a < b),
            "toBeLessThanOrEqual" => {
                compare(actual, &expected, "less than or equal to", |a, b| a <= b)
            }
            "toMatch" => (matches_pattern(actual, &expected), format!("to match {}", show(&expected))),
            "toThrow" => return self.check_throw(interp, &expected, args.is_empty()),
            other => return Err(ErrorInfo::type_error(format!("{} is not a matcher", other)).into()),
        };

        self.settle(pass, &phrase)
    }
}

impl Matcher {
    fn settle(&self, pass: bool, phrase: &str) -> EvalResult {
        let expectation = &self.expectation;
        let not = if expectation.negated { "not " } else { "" };
        let message = format!("expected {} {}{}", show(&expectation.actual), not, phrase);
        verdict(&expectation.sink, pass != expectation.negated, message)
    }

    fn check_throw(&self, interp: &mut Interpreter, expected: &Val, any: bool) -> EvalResult {
        let func = &self.expectation.actual;
        if !func.is_callable() {
            return Err(ErrorInfo::type_error("toThrow() expects a function").into());
        }

        let thrown = match interp.call_value(func, Val::Undefined, Vec::new()) {
            Ok(_) => None,
            Err(thrown) => {
                if matches!(&thrown.0, Val::Error(info) if info.is_timeout()) {
                    return Err(thrown);
                }
                Some(thrown.describe())
            }
        };

        let (pass, phrase) = match (&thrown, any) {
            (None, _) => (false, "to throw".to_string()),
            (Some(_), true) => (true, "to throw".to_string()),
            (Some(info), false) => match expected {
                Val::Regex(re) => (
                    re.regex.is_match(&info.message),
                    format!("to throw matching {}", re),
                ),
                Val::NativeFunc(ctor) => (
                    info.name == ctor.name(),
                    format!("to throw {}", ctor.name()),
                ),
                other => {
                    let text = to_js_string(other);
                    (info.message.contains(&text), format!("to throw {:?}", text))
                }
            },
        };

        let expectation = &self.expectation;
        let not = if expectation.negated { "not " } else { "" };
        let message = format!("expected function {}{}", not, phrase);
        verdict(&expectation.sink, pass != expectation.negated, message)
    }
}

/* ===================== assert ===================== */

/// `assert(condition, message?)`
pub struct AssertFn {
    sink: VerdictSink,
}

impl AssertFn {
    pub fn new(sink: VerdictSink) -> Self {
        Self { sink }
    }
}

impl std::fmt::Debug for AssertFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AssertFn")
    }
}

impl HostObject for AssertFn {
    fn name(&self) -> &str {
        "assert"
    }

    fn call(&self, _interp: &mut Interpreter, _this: &Val, args: Vec<Val>) -> EvalResult {
        let condition = arg(&args, 0);
        let message = match args.get(1) {
            Some(message) if !message.is_nullish() => to_js_string(message),
            _ => format!("assert({})", show(&condition)),
        };
        verdict(&self.sink, condition.is_truthy(), message)
    }
}

/* ===================== Helpers ===================== */

/// Report the verdict, then throw when it failed
fn verdict(sink: &VerdictSink, pass: bool, message: String) -> EvalResult {
    sink(pass, &message);
    if pass {
        Ok(Val::Undefined)
    } else {
        Err(Thrown::from(ErrorInfo::new(ASSERTION_ERROR, message)))
    }
}

fn show(val: &Val) -> String {
    format_value(val, &FormatOptions::default())
}

/// `Object.is` for the value kinds we have
fn same_value(a: &Val, b: &Val) -> bool {
    match (a, b) {
        (Val::Num(x), Val::Num(y)) if x.is_nan() && y.is_nan() => true,
        _ => strict_equals(a, b),
    }
}

fn contains(haystack: &Val, needle: &Val) -> bool {
    match haystack {
        Val::List(items) => {
            let items = items.lock().clone();
            items.iter().any(|item| strict_equals(item, needle))
        }
        Val::Str(s) => s.contains(&to_js_string(needle)),
        _ => false,
    }
}

fn length_of(val: &Val) -> Option<usize> {
    match val {
        Val::List(items) => Some(items.lock().len()),
        Val::Str(s) => Some(s.chars().count()),
        Val::Obj(map) => map.lock().get("length").and_then(Val::as_f64).map(|n| n as usize),
        _ => None,
    }
}

/// Follow a dotted path through objects and arrays
fn property_at(val: &Val, path: &str) -> Option<Val> {
    let mut current = val.clone();
    for key in path.split('.') {
        let next = match &current {
            Val::Obj(map) => map.lock().get(key).cloned(),
            Val::List(items) => key.parse::<usize>().ok().and_then(|i| items.lock().get(i).cloned()),
            _ => None,
        };
        current = next?;
    }
    Some(current)
}

fn compare(actual: &Val, expected: &Val, relation: &str, op: fn(f64, f64) -> bool) -> (bool, String) {
    (
        op(to_number(actual), to_number(expected)),
        format!("to be {} {}", relation, show(expected)),
    )
}

fn matches_pattern(actual: &Val, pattern: &Val) -> bool {
    let text = match actual {
        Val::Str(s) => s.clone(),
        _ => return false,
    };
    match pattern {
        Val::Regex(re) => re.regex.is_match(&text),
        other => text.contains(&to_js_string(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{Bindings, EvalError, Evaluator, NoopObserver, ScriptEvaluator};
    use parking_lot::Mutex;

    type Verdicts = Arc<Mutex<Vec<(bool, String)>>>;

    fn run(source: &str) -> (Result<Val, EvalError>, Vec<(bool, String)>) {
        let verdicts: Verdicts = Arc::new(Mutex::new(Vec::new()));
        let recorded = verdicts.clone();
        let sink: VerdictSink = Arc::new(move |pass: bool, message: &str| {
            recorded.lock().push((pass, message.to_string()));
        });

        let mut bindings = Bindings::new();
        bindings.insert("expect".to_string(), Val::Host(Arc::new(ExpectFn::new(sink.clone()))));
        bindings.insert("assert".to_string(), Val::Host(Arc::new(AssertFn::new(sink))));

        let result = ScriptEvaluator::new().run(source, &bindings, &mut NoopObserver);
        let verdicts = verdicts.lock().clone();
        (result, verdicts)
    }

    #[test]
    fn test_passing_matchers() {
        let source = r#"
            expect(1 + 1).toBe(2)
            expect({ a: [1, 2] }).toEqual({ a: [1, 2] })
            expect([1, 2, 3]).toContain(2)
            expect('hello').toHaveLength(5)
            expect({ user: { name: 'ada' } }).toHaveProperty('user.name', 'ada')
            expect(3).toBeGreaterThan(2)
            expect(2).toBeLessThanOrEqual(2)
            expect('abc123').toMatch(/\d+/)
            expect(null).toBeNull()
            expect(undefined).toBeUndefined()
            expect(0).toBeFalsy()
            expect(NaN).toBe(NaN)
            expect(() => { throw new TypeError('bad input') }).toThrow('bad')
            expect(() => { throw new TypeError('x') }).toThrow(TypeError)
            expect(() => 1).not.toThrow()
            expect(1).not.toBe(2)
            assert(true, 'works')
        "#;
        let (result, verdicts) = run(source);
        assert!(result.is_ok(), "{:?}", result);
        assert_eq!(verdicts.len(), 17);
        assert!(verdicts.iter().all(|(pass, _)| *pass));
        assert_eq!(verdicts[0].1, "expected 2 to be 2");
        assert_eq!(verdicts[15].1, "expected 1 not to be 2");
        assert_eq!(verdicts[16].1, "works");
    }

    #[test]
    fn test_failure_records_then_throws() {
        let (result, verdicts) = run("expect(1).toBe(1)\nexpect(3).toBe(2)\nexpect(4).toBe(4)");
        let err = result.unwrap_err();
        assert!(err.is_assertion());
        assert_eq!(err.to_string(), "AssertionError: expected 3 to be 2");
        assert_eq!(
            verdicts,
            vec![
                (true, "expected 1 to be 1".to_string()),
                (false, "expected 3 to be 2".to_string()),
            ]
        );
    }

    #[test]
    fn test_to_equal_ignores_identity() {
        let (result, _) = run("expect([1, 2]).toBe([1, 2])");
        assert!(result.unwrap_err().is_assertion());
        let (result, _) = run("expect([1, 2]).toEqual([1, 2])");
        assert!(result.is_ok());
    }

    #[test]
    fn test_strict_equal_sees_undefined_properties() {
        let (result, _) = run("expect({ a: 1, b: undefined }).toEqual({ a: 1 })");
        assert!(result.is_ok());
        let (result, _) = run("expect({ a: 1, b: undefined }).toStrictEqual({ a: 1 })");
        assert!(result.unwrap_err().is_assertion());
    }

    #[test]
    fn test_assertion_can_be_caught_by_script() {
        let (result, verdicts) = run("try { assert(false) } catch (e) { e.name }");
        assert_eq!(result.unwrap().as_str(), Some("AssertionError"));
        assert_eq!(verdicts, vec![(false, "assert(false)".to_string())]);
    }

    #[test]
    fn test_unknown_matcher_is_not_a_function() {
        let (result, verdicts) = run("expect(1).toBeAwesome()");
        assert!(!result.unwrap_err().is_assertion());
        assert!(verdicts.is_empty());
    }
}
