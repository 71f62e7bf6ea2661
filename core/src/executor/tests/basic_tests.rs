//! Tests for expressions, bindings, closures and the observer hooks

use super::helpers::{num, run, run_with, string, Recorder};
use crate::executor::{Bindings, Evaluator, ScriptEvaluator, Val};

/* ===================== Arithmetic & Strings ===================== */

#[test]
fn test_arithmetic_precedence() {
    assert_eq!(num(run("2 + 3 * 4")), 14.0);
    assert_eq!(num(run("(2 + 3) * 4")), 20.0);
    assert_eq!(num(run("2 ** 3 ** 2")), 512.0);
    assert_eq!(num(run("7 % 4")), 3.0);
}

#[test]
fn test_string_concatenation() {
    assert_eq!(string(run("'a' + 1")), "a1");
    assert_eq!(string(run("1 + 2 + 'x'")), "3x");
    assert_eq!(string(run("const n = 3; `n=${n}, doubled=${n * 2}`")), "n=3, doubled=6");
}

#[test]
fn test_equality_rules() {
    assert!(matches!(run("1 == '1'"), Val::Bool(true)));
    assert!(matches!(run("1 === '1'"), Val::Bool(false)));
    assert!(matches!(run("null == undefined"), Val::Bool(true)));
    assert!(matches!(run("null === undefined"), Val::Bool(false)));
    assert!(matches!(run("[1] === [1]"), Val::Bool(false)));
    assert!(matches!(run("const a = [1]; a === a"), Val::Bool(true)));
}

#[test]
fn test_typeof() {
    assert_eq!(string(run("typeof 1")), "number");
    assert_eq!(string(run("typeof 'x'")), "string");
    assert_eq!(string(run("typeof (() => 1)")), "function");
    assert_eq!(string(run("typeof null")), "object");
    assert_eq!(string(run("typeof notDeclared")), "undefined");
}

/* ===================== Bindings & Scopes ===================== */

#[test]
fn test_free_identifiers_resolve_to_bindings() {
    let mut bindings = Bindings::new();
    bindings.insert("greeting".to_string(), Val::str("hello"));
    let value = run_with("greeting + ', world'", bindings).unwrap();
    assert_eq!(string(value), "hello, world");
}

#[test]
fn test_closures_capture_variables() {
    let source = r#"
        function makeCounter() {
            let n = 0
            return () => ++n
        }
        const counter = makeCounter()
        counter()
        counter()
    "#;
    assert_eq!(num(run(source)), 2.0);
}

#[test]
fn test_function_declarations_are_hoisted() {
    let source = r#"
        greet('Ada')
        function greet(name) { return 'hi ' + name }
    "#;
    assert_eq!(string(run(source)), "hi Ada");
}

#[test]
fn test_block_scoping() {
    let source = r#"
        let x = 1
        { let x = 2 }
        x
    "#;
    assert_eq!(num(run(source)), 1.0);
}

#[test]
fn test_destructuring() {
    let source = r#"
        const { a, b: [x, y = 5], ...rest } = { a: 1, b: [2], c: 3, d: 4 }
        a + x + y + Object.keys(rest).length
    "#;
    assert_eq!(num(run(source)), 10.0);
}

#[test]
fn test_default_and_rest_parameters() {
    let source = r#"
        const sum = (first, second = 10, ...others) => first + second + others.length
        sum(1) + sum(1, 2, 3, 4)
    "#;
    assert_eq!(num(run(source)), 11.0 + 5.0);
}

#[test]
fn test_spread_in_calls_and_literals() {
    let source = r#"
        const xs = [1, 2]
        const ys = [...xs, 3]
        const merged = { ...{ a: 1 }, b: 2 }
        Math.max(...ys) + merged.a + merged.b
    "#;
    assert_eq!(num(run(source)), 6.0);
}

#[test]
fn test_method_this_binding() {
    let source = r#"
        const box = { n: 2, double() { return this.n * 2 } }
        box.double()
    "#;
    assert_eq!(num(run(source)), 4.0);
}

#[test]
fn test_objects_have_reference_semantics() {
    let source = r#"
        const a = { count: 1 }
        const b = a
        b.count += 1
        a.count
    "#;
    assert_eq!(num(run(source)), 2.0);
}

#[test]
fn test_optional_chaining_and_nullish() {
    assert_eq!(string(run("const u = null; u?.name ?? 'anon'")), "anon");
    assert!(matches!(run("const u = {}; u.profile?.name"), Val::Undefined));
    assert!(matches!(run("const f = undefined; f?.()"), Val::Undefined));
}

#[test]
fn test_logical_assignment() {
    let source = r#"
        const config = { retries: 0 }
        config.retries ||= 3
        config.timeout ??= 100
        config.retries + config.timeout
    "#;
    assert_eq!(num(run(source)), 103.0);
}

#[test]
fn test_await_yields_plain_values() {
    assert_eq!(num(run("const v = await Promise.resolve(5); v")), 5.0);
    let source = r#"
        const done = await new Promise(resolve => setTimeout(() => resolve('done'), 10))
        done
    "#;
    assert_eq!(string(run(source)), "done");
}

#[test]
fn test_top_level_return_is_program_value() {
    assert_eq!(num(run("return 5\n6")), 5.0);
}

#[test]
fn test_typescript_annotations_are_ignored() {
    let source = r#"
        interface Point { x: number; y: number }
        const p: Point = { x: 1, y: 2 }
        function len(pt: Point): number { return pt.x + pt.y }
        len(p) as number
    "#;
    assert_eq!(num(run(source)), 3.0);
}

/* ===================== Observer ===================== */

#[test]
fn test_observer_sees_top_level_statements_only() {
    let source = "const a = 1\nfunction f() { return a }\nf() + 1\nlet b";
    let mut recorder = Recorder::default();
    ScriptEvaluator::new()
        .run(source, &Bindings::new(), &mut recorder)
        .unwrap();

    assert_eq!(recorder.started, vec![0, 1, 2, 3]);
    let values: Vec<(usize, Option<f64>)> = recorder
        .completed
        .iter()
        .map(|(line, value)| (*line, value.as_f64()))
        .collect();
    assert_eq!(values, vec![(0, None), (1, None), (2, Some(2.0)), (3, None)]);
}

#[test]
fn test_observer_stops_at_throwing_statement() {
    let source = "const a = 1\nthrow new Error('stop')\na";
    let mut recorder = Recorder::default();
    let result = ScriptEvaluator::new().run(source, &Bindings::new(), &mut recorder);

    assert!(result.is_err());
    assert_eq!(recorder.started, vec![0, 1]);
    assert_eq!(recorder.completed.len(), 1);
}
