//! Parser tests - verify parsing and AST structure
//!
//! These tests do NOT execute code; that is covered by the executor tests.

use crate::executor::types::ast::{
    AssignOp, BinaryOp, Expr, FunctionBody, LogicalOp, Pattern, Property, Stmt, VarKind,
};
use crate::parser::{parse_program, type_syntax_ranges};

fn single(source: &str) -> Stmt {
    let mut program = parse_program(source).expect("Should parse");
    assert_eq!(program.body.len(), 1, "expected one statement: {:?}", program.body);
    program.body.remove(0)
}

fn single_expr(source: &str) -> Expr {
    match single(source) {
        Stmt::Expr { expr, .. } => expr,
        other => panic!("Expected expression statement, got {:?}", other),
    }
}

/* ===================== Basic Parsing Tests ===================== */

#[test]
fn test_parse_return_number() {
    match single("return 42") {
        Stmt::Return {
            value: Some(Expr::LitNum { v, .. }),
            ..
        } => assert_eq!(v, 42.0),
        other => panic!("Expected Return with LitNum, got {:?}", other),
    }
}

#[test]
fn test_parse_number_forms() {
    for (source, expected) in [("0xff", 255.0), ("1_000", 1000.0), (".5", 0.5), ("2e3", 2000.0)] {
        match single_expr(source) {
            Expr::LitNum { v, .. } => assert_eq!(v, expected, "source: {}", source),
            other => panic!("Expected LitNum for {}, got {:?}", source, other),
        }
    }
}

#[test]
fn test_parse_string_escapes() {
    match single_expr(r#"'it\'s\nA'"#) {
        Expr::LitStr { v, .. } => assert_eq!(v, "it's\nA"),
        other => panic!("Expected LitStr, got {:?}", other),
    }
}

#[test]
fn test_parse_with_comments() {
    let program = parse_program("// leading\nconst a = 1 /* inline */\n/* block */ a").unwrap();
    assert_eq!(program.body.len(), 2);
}

/* ===================== Declarations ===================== */

#[test]
fn test_parse_const_declaration() {
    match single("const answer = 6 * 7;") {
        Stmt::Declare {
            var_kind,
            declarators,
            ..
        } => {
            assert_eq!(var_kind, VarKind::Const);
            assert_eq!(declarators.len(), 1);
            assert!(matches!(&declarators[0].target, Pattern::Ident { name, .. } if name == "answer"));
            assert!(matches!(
                declarators[0].init,
                Some(Expr::Binary { op: BinaryOp::Mul, .. })
            ));
        }
        other => panic!("Expected Declare, got {:?}", other),
    }
}

#[test]
fn test_parse_destructuring_with_defaults_and_rest() {
    match single("const { a, b: renamed = 2, ...others } = obj") {
        Stmt::Declare { declarators, .. } => match &declarators[0].target {
            Pattern::Object { props, rest, .. } => {
                assert_eq!(props.len(), 2);
                assert_eq!(props[1].key, "b");
                assert!(matches!(&props[1].value, Pattern::Ident { name, .. } if name == "renamed"));
                assert!(props[1].default.is_some());
                assert!(matches!(rest.as_deref(), Some(Pattern::Ident { name, .. }) if name == "others"));
            }
            other => panic!("Expected object pattern, got {:?}", other),
        },
        other => panic!("Expected Declare, got {:?}", other),
    }

    match single("let [first, third = 3, ...tail] = list") {
        Stmt::Declare { declarators, .. } => {
            assert!(matches!(&declarators[0].target, Pattern::Array { rest: Some(_), .. }));
        }
        other => panic!("Expected Declare, got {:?}", other),
    }
}

#[test]
fn test_parse_function_declaration() {
    match single("async function greet(name, punctuation = '!') { return name + punctuation }") {
        Stmt::Function { def, .. } => {
            assert_eq!(def.name.as_deref(), Some("greet"));
            assert!(def.is_async);
            assert_eq!(def.params.len(), 2);
            assert!(def.params[1].default.is_some());
        }
        other => panic!("Expected Function, got {:?}", other),
    }
}

/* ===================== Expressions ===================== */

#[test]
fn test_parse_arrow_functions() {
    match single_expr("items.map(x => x * 2)") {
        Expr::Call { args, .. } => match &args[0] {
            Expr::Function { def, .. } => {
                assert!(def.is_arrow);
                assert_eq!(def.params.len(), 1);
                assert!(matches!(def.body, FunctionBody::Expr { .. }));
            }
            other => panic!("Expected arrow, got {:?}", other),
        },
        other => panic!("Expected Call, got {:?}", other),
    }

    match single_expr("async (a, ...rest) => { return rest }") {
        Expr::Function { def, .. } => {
            assert!(def.is_async);
            assert!(def.params[1].rest);
            assert!(matches!(def.body, FunctionBody::Block { .. }));
        }
        other => panic!("Expected arrow, got {:?}", other),
    }
}

#[test]
fn test_parse_precedence() {
    // 1 + 2 * 3 parses as 1 + (2 * 3)
    match single_expr("1 + 2 * 3") {
        Expr::Binary {
            op: BinaryOp::Add,
            right,
            ..
        } => assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. })),
        other => panic!("Expected Add at the root, got {:?}", other),
    }

    match single_expr("a ?? b || c") {
        Expr::Logical {
            op: LogicalOp::Nullish,
            right,
            ..
        } => assert!(matches!(*right, Expr::Logical { op: LogicalOp::Or, .. })),
        other => panic!("Expected ?? at the root, got {:?}", other),
    }
}

#[test]
fn test_parse_optional_chaining() {
    match single_expr("user?.profile.name") {
        Expr::Member {
            property, object, ..
        } => {
            assert_eq!(property, "name");
            assert!(matches!(*object, Expr::Member { optional: true, .. }));
        }
        other => panic!("Expected Member, got {:?}", other),
    }

    assert!(matches!(
        single_expr("callback?.(1)"),
        Expr::Call { optional: true, .. }
    ));
}

#[test]
fn test_parse_object_literal_forms() {
    match single_expr("({ a, 'b-c': 2, [key]: 3, ...rest, greet() { return 1 } })") {
        Expr::LitObj { properties, .. } => {
            assert_eq!(properties.len(), 5);
            assert!(matches!(properties[3], Property::Spread { .. }));
        }
        other => panic!("Expected LitObj, got {:?}", other),
    }
}

#[test]
fn test_parse_template_literal() {
    match single_expr("`total: ${a + b} items`") {
        Expr::Template { quasis, exprs, .. } => {
            assert_eq!(quasis, vec!["total: ".to_string(), " items".to_string()]);
            assert_eq!(exprs.len(), 1);
        }
        other => panic!("Expected Template, got {:?}", other),
    }
}

#[test]
fn test_parse_compound_assignment() {
    assert!(matches!(
        single_expr("count += 1"),
        Expr::Assign { op: AssignOp::Add, .. }
    ));
    assert!(matches!(
        single_expr("config.retries ??= 3"),
        Expr::Assign { op: AssignOp::Nullish, .. }
    ));
}

#[test]
fn test_parse_invalid_assignment_target() {
    assert!(parse_program("1 = 2").is_err());
}

#[test]
fn test_state_primitives_are_plain_calls() {
    // `export(...)` and `import(...)` are calls, not module syntax
    match single_expr("export('x', 42)") {
        Expr::Call { callee, args, .. } => {
            assert!(matches!(*callee, Expr::Ident { ref name, .. } if name == "export"));
            assert_eq!(args.len(), 2);
        }
        other => panic!("Expected Call, got {:?}", other),
    }
    assert!(matches!(single("import { ai } from 'sdk'"), Stmt::Import { .. }));
}

/* ===================== Statements ===================== */

#[test]
fn test_parse_control_flow() {
    let source = r#"
        for (const item of items) { if (item > 2) break }
        for (let i = 0; i < 3; i++) { continue }
        while (false) {}
        try { risky() } catch (e) { handle(e) } finally { done() }
    "#;
    let program = parse_program(source).unwrap();
    assert!(matches!(program.body[0], Stmt::ForLoop { .. }));
    assert!(matches!(program.body[1], Stmt::For { .. }));
    assert!(matches!(program.body[2], Stmt::While { .. }));
    assert!(matches!(
        program.body[3],
        Stmt::Try {
            catch_param: Some(_),
            finally_body: Some(_),
            ..
        }
    ));
}

/* ===================== Spans ===================== */

#[test]
fn test_statement_spans_are_zero_indexed() {
    let program = parse_program("const x = 5\n\n  console.log(x)").unwrap();
    let second = program.body[1].span();
    assert_eq!(second.start_line, 2);
    assert_eq!(second.start_col, 2);
}

#[test]
fn test_span_excludes_trailing_comment() {
    let program = parse_program("const x = 5 // five\n\nx").unwrap();
    let first = program.body[0].span();
    assert_eq!(first.end_line, 0);
    assert_eq!(first.end_col, 11);
}

#[test]
fn test_multiline_statement_end_line() {
    let source = "const user = {\n  name: 'Ada',\n}\nuser";
    let program = parse_program(source).unwrap();
    let span = program.body[0].span();
    assert_eq!(span.start_line, 0);
    assert_eq!(span.end_line, 2);
}

/* ===================== TypeScript ===================== */

#[test]
fn test_parse_typescript_syntax() {
    let source = r#"
        interface User { name: string; age?: number }
        type Id = string | number
        const u: User = { name: 'a' } as User
        function id<T>(value: T, label?: string): T { return value }
        const n = list!.length
    "#;
    let program = parse_program(source).unwrap();
    assert!(matches!(program.body[0], Stmt::TypeDecl { .. }));
    assert!(matches!(program.body[1], Stmt::TypeDecl { .. }));
    assert!(matches!(program.body[3], Stmt::Function { .. }));
    assert_eq!(program.body.len(), 5);
}

#[test]
fn test_type_syntax_ranges_cover_annotations() {
    let source = "const n: number = 1";
    let ranges = type_syntax_ranges(source).unwrap();
    let erased: Vec<&str> = ranges.iter().map(|r| source[r.clone()].trim()).collect();
    assert!(erased.contains(&": number"), "ranges: {:?}", erased);
}

#[test]
fn test_parse_error_has_position() {
    let err = parse_program("const = 1").unwrap_err();
    assert!(err.span().is_some());
    assert!(err.to_string().starts_with("SyntaxError"));
}
