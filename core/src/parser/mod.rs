//! PEST-based parser for the JavaScript/TypeScript subset found in documentation examples
//!
//! Produces the executor AST with span information for statement attribution.

use std::ops::Range;
use std::sync::Arc;

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use crate::executor::types::ast::{
    AssignOp, BinaryOp, Declarator, Expr, ForLoopKind, FunctionBody, FunctionDef, LogicalOp,
    Param, Pattern, PatternElem, PatternProp, Program, PropKey, Property, Span, Stmt, UnaryOp,
    UpdateOp, VarKind,
};

#[cfg(test)]
mod tests;

/* ===================== PEST Parser ===================== */

#[derive(Parser)]
#[grammar = "parser/script.pest"]
struct ScriptParser;

/* ===================== Error Types ===================== */

#[derive(Debug, Clone)]
pub enum ParseError {
    PestError(String, Option<Span>),
    BuildError(String, Option<Span>),
}

impl ParseError {
    pub fn span(&self) -> Option<Span> {
        match self {
            ParseError::PestError(_, span) => *span,
            ParseError::BuildError(_, span) => *span,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ParseError::PestError(msg, _) => msg,
            ParseError::BuildError(msg, _) => msg,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::PestError(msg, _) => write!(f, "SyntaxError: {}", msg),
            ParseError::BuildError(msg, _) => write!(f, "SyntaxError: {}", msg),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<pest::error::Error<Rule>> for ParseError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        let span = match err.line_col {
            pest::error::LineColLocation::Pos((line, col)) => Some(Span {
                start: 0,
                end: 0,
                start_line: line.saturating_sub(1),
                start_col: col.saturating_sub(1),
                end_line: line.saturating_sub(1),
                end_col: col,
            }),
            pest::error::LineColLocation::Span((start_line, start_col), (end_line, end_col)) => {
                Some(Span {
                    start: 0,
                    end: 0,
                    start_line: start_line.saturating_sub(1),
                    start_col: start_col.saturating_sub(1),
                    end_line: end_line.saturating_sub(1),
                    end_col: end_col.saturating_sub(1),
                })
            }
        };
        let (line, col) = match err.line_col {
            pest::error::LineColLocation::Pos(pos) => pos,
            pest::error::LineColLocation::Span(start, _) => start,
        };
        ParseError::PestError(format!("unexpected token at {}:{}", line, col), span)
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/* ===================== Span Helpers ===================== */

/// Convert a PEST pair's span to our Span type
///
/// A rule ending in an optional element keeps the whitespace and comments
/// skipped before that element; the span stops at the last real token.
fn pair_to_span(pair: &Pair<Rule>, source: &str) -> Span {
    let pest_span = pair.as_span();
    let start = pest_span.start();
    let end = start + significant_len(pest_span.as_str());

    let (start_line, start_col) = offset_to_line_col(source, start);
    let (end_line, end_col) = offset_to_line_col(source, end);

    Span::new(start, end, start_line, start_col, end_line, end_col)
}

/// Byte length of `text` without trailing whitespace and comments
fn significant_len(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut i = 0;
    let mut end = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = match text[i + 2..].find("*/") {
                    Some(pos) => i + 2 + pos + 2,
                    None => bytes.len(),
                };
            }
            quote @ (b'"' | b'\'' | b'`') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i = (i + 1).min(bytes.len());
                end = i;
            }
            b'\\' => {
                i = (i + 2).min(bytes.len());
                end = i;
            }
            c if c.is_ascii_whitespace() => i += 1,
            _ => {
                i += 1;
                end = i;
            }
        }
    }

    end
}

/// Convert byte offset to (line, column) - 0-indexed, columns counted in chars
fn offset_to_line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 0;
    let mut col = 0;
    let mut current_offset = 0;

    for ch in source.chars() {
        if current_offset >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 0;
        } else {
            col += 1;
        }
        current_offset += ch.len_utf8();
    }

    (line, col)
}

/// Keyword tokens carry no information once the enclosing rule matched
fn is_keyword(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::kw_as
            | Rule::kw_async
            | Rule::kw_await
            | Rule::kw_break
            | Rule::kw_catch
            | Rule::kw_continue
            | Rule::kw_do
            | Rule::kw_else
            | Rule::kw_export
            | Rule::kw_extends
            | Rule::kw_finally
            | Rule::kw_for
            | Rule::kw_from
            | Rule::kw_function
            | Rule::kw_if
            | Rule::kw_import
            | Rule::kw_in
            | Rule::kw_instanceof
            | Rule::kw_interface
            | Rule::kw_keyof
            | Rule::kw_new
            | Rule::kw_of
            | Rule::kw_readonly
            | Rule::kw_return
            | Rule::kw_satisfies
            | Rule::kw_throw
            | Rule::kw_try
            | Rule::kw_type
            | Rule::kw_typeof
            | Rule::kw_while
    )
}

/// Inner pairs with keyword tokens removed
fn significant(pair: Pair<Rule>) -> Vec<Pair<Rule>> {
    pair.into_inner()
        .filter(|p| !is_keyword(p.as_rule()))
        .collect()
}

fn take<'a, I>(inner: &mut I, what: &str, span: Span) -> ParseResult<Pair<'a, Rule>>
where
    I: Iterator<Item = Pair<'a, Rule>>,
{
    inner
        .next()
        .ok_or_else(|| ParseError::BuildError(format!("Missing {}", what), Some(span)))
}

/* ===================== Public API ===================== */

/// Parse a fragment into a program
pub fn parse_program(source: &str) -> ParseResult<Program> {
    let mut pairs = ScriptParser::parse(Rule::program, source)?;
    let program = pairs
        .next()
        .ok_or_else(|| ParseError::BuildError("Empty parse result".to_string(), None))?;
    let span = pair_to_span(&program, source);

    let mut body = Vec::new();
    for pair in program.into_inner() {
        if pair.as_rule() == Rule::EOI {
            continue;
        }
        body.push(build_statement(pair, source)?);
    }

    Ok(Program { body, span })
}

/// Byte ranges covering TypeScript-only syntax: annotations, generics, casts,
/// non-null and optional marks, `interface`/`type` declarations and `import type`.
pub fn type_syntax_ranges(source: &str) -> ParseResult<Vec<Range<usize>>> {
    let pairs = ScriptParser::parse(Rule::program, source)?;
    let mut ranges = Vec::new();

    for pair in pairs.flatten() {
        let erase = match pair.as_rule() {
            Rule::type_annotation
            | Rule::type_params
            | Rule::type_args
            | Rule::type_cast
            | Rule::non_null
            | Rule::optional_mark
            | Rule::definite_mark
            | Rule::interface_decl
            | Rule::type_alias => true,
            Rule::import_decl => pair
                .clone()
                .into_inner()
                .any(|p| p.as_rule() == Rule::kw_type),
            Rule::export_decl => pair
                .clone()
                .into_inner()
                .any(|p| matches!(p.as_rule(), Rule::interface_decl | Rule::type_alias)),
            _ => false,
        };
        if erase {
            let span = pair.as_span();
            ranges.push(span.start()..span.end());
        }
    }

    Ok(ranges)
}

/* ===================== Statements ===================== */

fn build_statement(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);

    match pair.as_rule() {
        Rule::empty_stmt => Ok(Stmt::Empty { span }),
        Rule::block => Ok(Stmt::Block {
            body: build_body(pair, source)?,
            span,
        }),
        Rule::import_decl => {
            let module = pair
                .into_inner()
                .find(|p| p.as_rule() == Rule::string)
                .map(string_value)
                .unwrap_or_default();
            Ok(Stmt::Import {
                source: module,
                span,
            })
        }
        Rule::export_decl => {
            let mut inner = significant(pair).into_iter();
            let decl = take(&mut inner, "exported declaration", span)?;
            build_statement(decl, source)
        }
        Rule::interface_decl | Rule::type_alias => Ok(Stmt::TypeDecl { span }),
        Rule::var_decl | Rule::var_decl_head => build_var_decl(pair, source),
        Rule::function_decl => {
            let def = build_function(pair, source)?;
            Ok(Stmt::Function {
                def: Arc::new(def),
                span,
            })
        }
        Rule::if_stmt => build_if_stmt(pair, source),
        Rule::for_of_stmt | Rule::for_in_stmt => build_for_loop_stmt(pair, source),
        Rule::for_stmt => build_for_stmt(pair, source),
        Rule::while_stmt => {
            let mut inner = significant(pair).into_iter();
            let test = build_expression(take(&mut inner, "loop condition", span)?, source)?;
            let body = build_statement(take(&mut inner, "loop body", span)?, source)?;
            Ok(Stmt::While {
                test,
                body: Box::new(body),
                span,
            })
        }
        Rule::do_while_stmt => {
            let mut inner = significant(pair).into_iter();
            let body = build_statement(take(&mut inner, "loop body", span)?, source)?;
            let test = build_expression(take(&mut inner, "loop condition", span)?, source)?;
            Ok(Stmt::DoWhile {
                body: Box::new(body),
                test,
                span,
            })
        }
        Rule::try_stmt => build_try_stmt(pair, source),
        Rule::throw_stmt => {
            let mut inner = significant(pair).into_iter();
            let value = build_expression(take(&mut inner, "thrown value", span)?, source)?;
            Ok(Stmt::Throw { value, span })
        }
        Rule::return_stmt => {
            let value = match significant(pair).into_iter().next() {
                Some(expr_pair) => Some(build_expression(expr_pair, source)?),
                None => None,
            };
            Ok(Stmt::Return { value, span })
        }
        Rule::break_stmt => Ok(Stmt::Break { span }),
        Rule::continue_stmt => Ok(Stmt::Continue { span }),
        Rule::expr_stmt => {
            let mut inner = pair.into_inner();
            let expr = build_expression(take(&mut inner, "expression", span)?, source)?;
            Ok(Stmt::Expr { expr, span })
        }
        _ => Err(ParseError::BuildError(
            format!("Unexpected statement rule: {:?}", pair.as_rule()),
            Some(span),
        )),
    }
}

fn build_body(pair: Pair<Rule>, source: &str) -> ParseResult<Vec<Stmt>> {
    pair.into_inner()
        .map(|stmt_pair| build_statement(stmt_pair, source))
        .collect()
}

fn build_var_kind(pair: &Pair<Rule>, source: &str) -> ParseResult<VarKind> {
    match pair.as_str() {
        "let" => Ok(VarKind::Let),
        "const" => Ok(VarKind::Const),
        "var" => Ok(VarKind::Var),
        other => Err(ParseError::BuildError(
            format!("Expected 'let', 'const' or 'var', got: {}", other),
            Some(pair_to_span(pair, source)),
        )),
    }
}

fn build_var_decl(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();

    let kind_pair = take(&mut inner, "declaration kind", span)?;
    let var_kind = build_var_kind(&kind_pair, source)?;

    let declarators = inner
        .map(|decl_pair| build_declarator(decl_pair, source))
        .collect::<ParseResult<Vec<_>>>()?;

    for decl in &declarators {
        if decl.init.is_none() && !matches!(decl.target, Pattern::Ident { .. }) {
            return Err(ParseError::BuildError(
                "Destructuring declaration requires an initializer".to_string(),
                Some(decl.span),
            ));
        }
        if decl.init.is_none() && var_kind == VarKind::Const {
            return Err(ParseError::BuildError(
                "Missing initializer in const declaration".to_string(),
                Some(decl.span),
            ));
        }
    }

    Ok(Stmt::Declare {
        var_kind,
        declarators,
        span,
    })
}

fn build_declarator(pair: Pair<Rule>, source: &str) -> ParseResult<Declarator> {
    let span = pair_to_span(&pair, source);
    let mut target = None;
    let mut init = None;

    for child in pair.into_inner() {
        match child.as_rule() {
            Rule::identifier | Rule::object_pattern | Rule::array_pattern => {
                target = Some(build_pattern(child, source)?);
            }
            Rule::initializer => init = Some(build_initializer(child, source)?),
            _ => {}
        }
    }

    let target = target.ok_or_else(|| {
        ParseError::BuildError("Missing binding target".to_string(), Some(span))
    })?;
    Ok(Declarator { target, init, span })
}

fn build_initializer(pair: Pair<Rule>, source: &str) -> ParseResult<Expr> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();
    build_expression(take(&mut inner, "initializer", span)?, source)
}

fn build_pattern(pair: Pair<Rule>, source: &str) -> ParseResult<Pattern> {
    let span = pair_to_span(&pair, source);

    match pair.as_rule() {
        Rule::identifier => Ok(Pattern::Ident {
            name: pair.as_str().to_string(),
            span,
        }),
        Rule::object_pattern => {
            let mut props = Vec::new();
            let mut rest = None;
            for child in pair.into_inner() {
                let child_span = pair_to_span(&child, source);
                match child.as_rule() {
                    Rule::rest_element => {
                        let mut inner = child.into_inner();
                        let target = take(&mut inner, "rest target", child_span)?;
                        rest = Some(Box::new(build_pattern(target, source)?));
                    }
                    Rule::pattern_renamed => {
                        let mut inner = child.into_inner();
                        let key = take(&mut inner, "property name", child_span)?
                            .as_str()
                            .to_string();
                        let value = build_pattern(take(&mut inner, "binding", child_span)?, source)?;
                        let default = match inner.next() {
                            Some(init) => Some(build_initializer(init, source)?),
                            None => None,
                        };
                        props.push(PatternProp {
                            key,
                            value,
                            default,
                        });
                    }
                    Rule::pattern_shorthand => {
                        let mut inner = child.into_inner();
                        let ident = take(&mut inner, "binding name", child_span)?;
                        let key = ident.as_str().to_string();
                        let value = Pattern::Ident {
                            name: key.clone(),
                            span: pair_to_span(&ident, source),
                        };
                        let default = match inner.next() {
                            Some(init) => Some(build_initializer(init, source)?),
                            None => None,
                        };
                        props.push(PatternProp {
                            key,
                            value,
                            default,
                        });
                    }
                    other => {
                        return Err(ParseError::BuildError(
                            format!("Unexpected object pattern rule: {:?}", other),
                            Some(child_span),
                        ))
                    }
                }
            }
            Ok(Pattern::Object { props, rest, span })
        }
        Rule::array_pattern => {
            let mut elements = Vec::new();
            let mut rest = None;
            for child in pair.into_inner() {
                let child_span = pair_to_span(&child, source);
                let rule = child.as_rule();
                let mut inner = child.into_inner();
                let target = build_pattern(take(&mut inner, "binding", child_span)?, source)?;
                if rule == Rule::rest_element {
                    rest = Some(Box::new(target));
                } else {
                    let default = match inner.next() {
                        Some(init) => Some(build_initializer(init, source)?),
                        None => None,
                    };
                    elements.push(PatternElem { target, default });
                }
            }
            Ok(Pattern::Array {
                elements,
                rest,
                span,
            })
        }
        other => Err(ParseError::BuildError(
            format!("Unexpected binding rule: {:?}", other),
            Some(span),
        )),
    }
}

fn build_if_stmt(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let mut inner = significant(pair).into_iter();

    let test = build_expression(take(&mut inner, "if condition", span)?, source)?;
    let then_s = build_statement(take(&mut inner, "if body", span)?, source)?;
    let else_s = match inner.next() {
        Some(else_pair) => Some(Box::new(build_statement(else_pair, source)?)),
        None => None,
    };

    Ok(Stmt::If {
        test,
        then_s: Box::new(then_s),
        else_s,
        span,
    })
}

fn build_for_loop_stmt(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let kind = if pair.as_rule() == Rule::for_of_stmt {
        ForLoopKind::Of
    } else {
        ForLoopKind::In
    };
    let mut inner = significant(pair).into_iter();

    let kind_pair = take(&mut inner, "declaration kind", span)?;
    let var_kind = build_var_kind(&kind_pair, source)?;
    let binding = build_pattern(take(&mut inner, "loop binding", span)?, source)?;
    let iterable = build_expression(take(&mut inner, "iterable", span)?, source)?;
    let body = build_statement(take(&mut inner, "loop body", span)?, source)?;

    Ok(Stmt::ForLoop {
        kind,
        var_kind,
        binding,
        iterable,
        body: Box::new(body),
        span,
    })
}

fn build_for_stmt(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let mut init = None;
    let mut test = None;
    let mut update = Vec::new();
    let mut body = None;

    for child in significant(pair) {
        let child_span = pair_to_span(&child, source);
        match child.as_rule() {
            Rule::for_init => {
                let mut inner = child.into_inner();
                let first = take(&mut inner, "loop initializer", child_span)?;
                let stmt = if first.as_rule() == Rule::var_decl_head {
                    build_var_decl(first, source)?
                } else {
                    Stmt::Expr {
                        expr: build_expression(first, source)?,
                        span: child_span,
                    }
                };
                init = Some(Box::new(stmt));
            }
            Rule::for_test => {
                let mut inner = child.into_inner();
                test = Some(build_expression(
                    take(&mut inner, "loop condition", child_span)?,
                    source,
                )?);
            }
            Rule::for_update => {
                for expr_pair in child.into_inner() {
                    update.push(build_expression(expr_pair, source)?);
                }
            }
            _ => body = Some(build_statement(child, source)?),
        }
    }

    let body = body
        .ok_or_else(|| ParseError::BuildError("Missing loop body".to_string(), Some(span)))?;
    Ok(Stmt::For {
        init,
        test,
        update,
        body: Box::new(body),
        span,
    })
}

fn build_try_stmt(pair: Pair<Rule>, source: &str) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let mut body = Vec::new();
    let mut catch_param = None;
    let mut catch_body = None;
    let mut finally_body = None;

    for child in significant(pair) {
        match child.as_rule() {
            Rule::block => body = build_body(child, source)?,
            Rule::catch_clause => {
                for part in significant(child) {
                    match part.as_rule() {
                        Rule::block => catch_body = Some(build_body(part, source)?),
                        Rule::type_annotation => {}
                        _ => catch_param = Some(build_pattern(part, source)?),
                    }
                }
            }
            Rule::finally_clause => {
                let child_span = pair_to_span(&child, source);
                let mut inner = significant(child).into_iter();
                finally_body = Some(build_body(take(&mut inner, "finally block", child_span)?, source)?);
            }
            _ => {}
        }
    }

    if catch_body.is_none() && finally_body.is_none() {
        return Err(ParseError::BuildError(
            "Missing catch or finally after try".to_string(),
            Some(span),
        ));
    }

    Ok(Stmt::Try {
        body,
        catch_param,
        catch_body,
        finally_body,
        span,
    })
}

/* ===================== Functions ===================== */

fn build_function(pair: Pair<Rule>, source: &str) -> ParseResult<FunctionDef> {
    let span = pair_to_span(&pair, source);
    let mut name = None;
    let mut is_async = false;
    let mut params = Vec::new();
    let mut body = None;

    for child in pair.into_inner() {
        match child.as_rule() {
            Rule::kw_async => is_async = true,
            Rule::identifier => name = Some(child.as_str().to_string()),
            Rule::params => params = build_params(child, source)?,
            Rule::block => body = Some(build_body(child, source)?),
            _ => {}
        }
    }

    let body = body
        .ok_or_else(|| ParseError::BuildError("Missing function body".to_string(), Some(span)))?;
    Ok(FunctionDef {
        name,
        params,
        body: FunctionBody::Block { body },
        is_async,
        is_arrow: false,
        span,
    })
}

fn build_arrow(pair: Pair<Rule>, source: &str) -> ParseResult<FunctionDef> {
    let span = pair_to_span(&pair, source);
    let mut is_async = false;
    let mut params = Vec::new();
    let mut body = None;

    for child in pair.into_inner() {
        match child.as_rule() {
            Rule::kw_async => is_async = true,
            Rule::identifier => params.push(Param {
                pattern: Pattern::Ident {
                    name: child.as_str().to_string(),
                    span: pair_to_span(&child, source),
                },
                default: None,
                rest: false,
            }),
            Rule::params => params = build_params(child, source)?,
            Rule::block => {
                body = Some(FunctionBody::Block {
                    body: build_body(child, source)?,
                })
            }
            Rule::expression => {
                body = Some(FunctionBody::Expr {
                    expr: Box::new(build_expression(child, source)?),
                })
            }
            _ => {}
        }
    }

    let body = body
        .ok_or_else(|| ParseError::BuildError("Missing arrow body".to_string(), Some(span)))?;
    Ok(FunctionDef {
        name: None,
        params,
        body,
        is_async,
        is_arrow: true,
        span,
    })
}

fn build_params(pair: Pair<Rule>, source: &str) -> ParseResult<Vec<Param>> {
    let mut params = Vec::new();

    for child in pair.into_inner() {
        let child_span = pair_to_span(&child, source);
        let rest = child.as_rule() == Rule::rest_param;
        let mut pattern = None;
        let mut default = None;

        for part in child.into_inner() {
            match part.as_rule() {
                Rule::identifier | Rule::object_pattern | Rule::array_pattern => {
                    pattern = Some(build_pattern(part, source)?);
                }
                Rule::initializer => default = Some(build_initializer(part, source)?),
                _ => {}
            }
        }

        let pattern = pattern.ok_or_else(|| {
            ParseError::BuildError("Missing parameter name".to_string(), Some(child_span))
        })?;
        params.push(Param {
            pattern,
            default,
            rest,
        });
    }

    Ok(params)
}

/* ===================== Expressions ===================== */

fn build_expression(pair: Pair<Rule>, source: &str) -> ParseResult<Expr> {
    let span = pair_to_span(&pair, source);

    match pair.as_rule() {
        Rule::expression => {
            let mut inner = pair.into_inner();
            let target = build_expression(take(&mut inner, "expression", span)?, source)?;
            let Some(op_pair) = inner.next() else {
                return Ok(target);
            };
            let op = match op_pair.as_str() {
                "=" => AssignOp::Assign,
                "+=" => AssignOp::Add,
                "-=" => AssignOp::Sub,
                "*=" => AssignOp::Mul,
                "/=" => AssignOp::Div,
                "%=" => AssignOp::Rem,
                "??=" => AssignOp::Nullish,
                "||=" => AssignOp::Or,
                "&&=" => AssignOp::And,
                other => {
                    return Err(ParseError::BuildError(
                        format!("Unknown assignment operator: {}", other),
                        Some(span),
                    ))
                }
            };
            if !target.is_assignable() {
                return Err(ParseError::BuildError(
                    "Invalid left-hand side in assignment".to_string(),
                    Some(target.span()),
                ));
            }
            let value = build_expression(take(&mut inner, "assigned value", span)?, source)?;
            Ok(Expr::Assign {
                op,
                target: Box::new(target),
                value: Box::new(value),
                span,
            })
        }
        Rule::conditional => {
            let mut inner = pair.into_inner();
            let condition = build_expression(take(&mut inner, "condition", span)?, source)?;

            if let Some(consequent_pair) = inner.next() {
                let consequent = build_expression(consequent_pair, source)?;
                let alternate =
                    build_expression(take(&mut inner, "alternate branch", span)?, source)?;
                Ok(Expr::Ternary {
                    condition: Box::new(condition),
                    consequent: Box::new(consequent),
                    alternate: Box::new(alternate),
                    span,
                })
            } else {
                Ok(condition)
            }
        }
        Rule::coalesce
        | Rule::logical_or
        | Rule::logical_and
        | Rule::equality
        | Rule::relational
        | Rule::additive
        | Rule::multiplicative => build_binary_expr(pair, source),
        Rule::exponent => {
            let mut inner = pair.into_inner();
            let base = build_expression(take(&mut inner, "operand", span)?, source)?;
            match inner.next() {
                Some(_op) => {
                    let power = build_expression(take(&mut inner, "exponent", span)?, source)?;
                    Ok(Expr::Binary {
                        op: BinaryOp::Pow,
                        left: Box::new(base),
                        right: Box::new(power),
                        span,
                    })
                }
                None => Ok(base),
            }
        }
        Rule::unary => {
            let mut inner = pair.into_inner();
            let first = take(&mut inner, "operand", span)?;
            if first.as_rule() != Rule::prefix_op {
                return build_expression(first, source);
            }
            let operand = build_expression(take(&mut inner, "operand", span)?, source)?;
            build_prefix(first.as_str(), operand, span)
        }
        Rule::postfix => {
            let mut inner = pair.into_inner();
            let expr = build_expression(take(&mut inner, "operand", span)?, source)?;
            match inner.find(|p| p.as_rule() == Rule::op_update) {
                Some(op_pair) => {
                    if !expr.is_assignable() {
                        return Err(ParseError::BuildError(
                            "Invalid left-hand side expression in postfix operation".to_string(),
                            Some(span),
                        ));
                    }
                    let op = if op_pair.as_str() == "++" {
                        UpdateOp::Increment
                    } else {
                        UpdateOp::Decrement
                    };
                    Ok(Expr::Update {
                        op,
                        prefix: false,
                        target: Box::new(expr),
                        span,
                    })
                }
                None => Ok(expr),
            }
        }
        Rule::call_expr => build_call_expr(pair, source),
        Rule::new_expr => {
            let mut inner = significant(pair).into_iter();
            let mut callee = build_expression(take(&mut inner, "constructor", span)?, source)?;
            let mut args = Vec::new();
            for child in inner {
                match child.as_rule() {
                    Rule::member_access => {
                        callee = build_member(callee, child, source, false)?;
                    }
                    Rule::arguments => args = build_arguments(child, source)?,
                    _ => {}
                }
            }
            Ok(Expr::New {
                callee: Box::new(callee),
                args,
                span,
            })
        }
        Rule::paren_expr => {
            let mut inner = pair.into_inner();
            build_expression(take(&mut inner, "expression", span)?, source)
        }
        Rule::arrow_fn => {
            let def = build_arrow(pair, source)?;
            Ok(Expr::Function {
                def: Arc::new(def),
                span,
            })
        }
        Rule::function_expr => {
            let def = build_function(pair, source)?;
            Ok(Expr::Function {
                def: Arc::new(def),
                span,
            })
        }
        Rule::identifier => Ok(Expr::Ident {
            name: pair.as_str().to_string(),
            span,
        }),
        Rule::this_expr => Ok(Expr::This { span }),
        Rule::number => Ok(Expr::LitNum {
            v: parse_number(pair.as_str(), span)?,
            span,
        }),
        Rule::boolean => Ok(Expr::LitBool {
            v: pair.as_str() == "true",
            span,
        }),
        Rule::string => Ok(Expr::LitStr {
            v: string_value(pair),
            span,
        }),
        Rule::null_lit => Ok(Expr::LitNull { span }),
        Rule::undefined_lit => Ok(Expr::LitUndefined { span }),
        Rule::template => {
            let (quasis, exprs) = build_template(pair, source)?;
            Ok(Expr::Template {
                quasis,
                exprs,
                span,
            })
        }
        Rule::regex_lit => {
            let mut inner = pair.into_inner();
            let pattern = take(&mut inner, "regex body", span)?.as_str().to_string();
            let flags = inner.next().map(|p| p.as_str().to_string()).unwrap_or_default();
            Ok(Expr::Regex {
                pattern,
                flags,
                span,
            })
        }
        Rule::spread => {
            let mut inner = pair.into_inner();
            let value = build_expression(take(&mut inner, "spread operand", span)?, source)?;
            Ok(Expr::Spread {
                inner: Box::new(value),
                span,
            })
        }
        Rule::array_lit => {
            let elements = pair
                .into_inner()
                .map(|element| build_expression(element, source))
                .collect::<ParseResult<Vec<_>>>()?;
            Ok(Expr::LitList { elements, span })
        }
        Rule::object_lit => build_object_literal(pair, source),
        _ => Err(ParseError::BuildError(
            format!("Unexpected expression rule: {:?}", pair.as_rule()),
            Some(span),
        )),
    }
}

fn build_prefix(op: &str, operand: Expr, span: Span) -> ParseResult<Expr> {
    let unary_op = match op {
        "++" | "--" => {
            if !operand.is_assignable() {
                return Err(ParseError::BuildError(
                    "Invalid left-hand side expression in prefix operation".to_string(),
                    Some(span),
                ));
            }
            let op = if op == "++" {
                UpdateOp::Increment
            } else {
                UpdateOp::Decrement
            };
            return Ok(Expr::Update {
                op,
                prefix: true,
                target: Box::new(operand),
                span,
            });
        }
        "await" => {
            return Ok(Expr::Await {
                inner: Box::new(operand),
                span,
            })
        }
        "!" => UnaryOp::Not,
        "-" => UnaryOp::Neg,
        "+" => UnaryOp::Plus,
        "typeof" => UnaryOp::TypeOf,
        "void" => UnaryOp::Void,
        "delete" => UnaryOp::Delete,
        other => {
            return Err(ParseError::BuildError(
                format!("Unknown prefix operator: {}", other),
                Some(span),
            ))
        }
    };
    Ok(Expr::Unary {
        op: unary_op,
        operand: Box::new(operand),
        span,
    })
}

fn build_binary_expr(pair: Pair<Rule>, source: &str) -> ParseResult<Expr> {
    let span = pair_to_span(&pair, source);
    let inner_pairs: Vec<_> = pair.into_inner().collect();

    if inner_pairs.is_empty() {
        return Err(ParseError::BuildError(
            "Empty binary expression".to_string(),
            Some(span),
        ));
    }

    let mut left = build_expression(inner_pairs[0].clone(), source)?;

    let mut i = 1;
    while i < inner_pairs.len() {
        let op_pair = &inner_pairs[i];

        i += 1;
        if i >= inner_pairs.len() {
            return Err(ParseError::BuildError(
                "Missing right operand after operator".to_string(),
                Some(span),
            ));
        }

        let right = build_expression(inner_pairs[i].clone(), source)?;
        let new_span = left.span().merge(&right.span());

        let logical = match op_pair.as_rule() {
            Rule::op_and => Some(LogicalOp::And),
            Rule::op_or => Some(LogicalOp::Or),
            Rule::op_coalesce => Some(LogicalOp::Nullish),
            _ => None,
        };

        left = match logical {
            Some(op) => Expr::Logical {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span: new_span,
            },
            None => {
                let op = match (op_pair.as_rule(), op_pair.as_str()) {
                    (Rule::kw_instanceof, _) => BinaryOp::InstanceOf,
                    (Rule::kw_in, _) => BinaryOp::In,
                    (_, "===") => BinaryOp::StrictEq,
                    (_, "!==") => BinaryOp::StrictNotEq,
                    (_, "==") => BinaryOp::Eq,
                    (_, "!=") => BinaryOp::NotEq,
                    (_, "<") => BinaryOp::Lt,
                    (_, "<=") => BinaryOp::LtEq,
                    (_, ">") => BinaryOp::Gt,
                    (_, ">=") => BinaryOp::GtEq,
                    (_, "+") => BinaryOp::Add,
                    (_, "-") => BinaryOp::Sub,
                    (_, "*") => BinaryOp::Mul,
                    (_, "/") => BinaryOp::Div,
                    (_, "%") => BinaryOp::Rem,
                    (rule, text) => {
                        return Err(ParseError::BuildError(
                            format!("Expected operator, got {:?} '{}'", rule, text),
                            Some(span),
                        ))
                    }
                };
                Expr::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                    span: new_span,
                }
            }
        };

        i += 1;
    }

    Ok(left)
}

fn build_call_expr(pair: Pair<Rule>, source: &str) -> ParseResult<Expr> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();
    let mut expr = build_expression(take(&mut inner, "callee", span)?, source)?;

    for postfix_pair in inner {
        let postfix_span = pair_to_span(&postfix_pair, source);
        let new_span = expr.span().merge(&postfix_span);

        expr = match postfix_pair.as_rule() {
            Rule::arguments => Expr::Call {
                callee: Box::new(expr),
                args: build_arguments(postfix_pair, source)?,
                optional: false,
                span: new_span,
            },
            Rule::optional_call => {
                let mut parts = postfix_pair.into_inner();
                let args = build_arguments(take(&mut parts, "arguments", postfix_span)?, source)?;
                Expr::Call {
                    callee: Box::new(expr),
                    args,
                    optional: true,
                    span: new_span,
                }
            }
            Rule::member_access => build_member(expr, postfix_pair, source, false)?,
            Rule::optional_member => build_member(expr, postfix_pair, source, true)?,
            Rule::index_access | Rule::optional_index => {
                let optional = postfix_pair.as_rule() == Rule::optional_index;
                let mut parts = postfix_pair.into_inner();
                let index = build_expression(take(&mut parts, "index", postfix_span)?, source)?;
                Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                    optional,
                    span: new_span,
                }
            }
            Rule::tagged_template => {
                let mut parts = postfix_pair.into_inner();
                let template = take(&mut parts, "template", postfix_span)?;
                let (quasis, exprs) = build_template(template, source)?;
                Expr::TaggedTemplate {
                    tag: Box::new(expr),
                    quasis,
                    exprs,
                    span: new_span,
                }
            }
            // type arguments and non-null assertions vanish at runtime
            Rule::type_args | Rule::non_null => expr,
            other => {
                return Err(ParseError::BuildError(
                    format!("Unexpected postfix rule: {:?}", other),
                    Some(postfix_span),
                ))
            }
        };
    }

    Ok(expr)
}

fn build_member(object: Expr, pair: Pair<Rule>, source: &str, optional: bool) -> ParseResult<Expr> {
    let span = object.span().merge(&pair_to_span(&pair, source));
    let pair_span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();
    let prop_pair = take(&mut inner, "property name", pair_span)?;
    Ok(Expr::Member {
        object: Box::new(object),
        property: prop_pair.as_str().to_string(),
        property_span: pair_to_span(&prop_pair, source),
        optional,
        span,
    })
}

fn build_arguments(pair: Pair<Rule>, source: &str) -> ParseResult<Vec<Expr>> {
    pair.into_inner()
        .map(|arg| build_expression(arg, source))
        .collect()
}

fn build_object_literal(pair: Pair<Rule>, source: &str) -> ParseResult<Expr> {
    let span = pair_to_span(&pair, source);
    let mut properties = Vec::new();

    for member in pair.into_inner() {
        let member_span = pair_to_span(&member, source);
        match member.as_rule() {
            Rule::spread => {
                let mut inner = member.into_inner();
                let expr = build_expression(take(&mut inner, "spread operand", member_span)?, source)?;
                properties.push(Property::Spread { expr });
            }
            Rule::property_assign => {
                let mut inner = member.into_inner();
                let key = build_prop_key(take(&mut inner, "property key", member_span)?, source)?;
                let value =
                    build_expression(take(&mut inner, "property value", member_span)?, source)?;
                properties.push(Property::KeyValue { key, value });
            }
            Rule::property_shorthand => {
                let name = member.as_str().trim().to_string();
                properties.push(Property::KeyValue {
                    key: PropKey::Static { name: name.clone() },
                    value: Expr::Ident {
                        name,
                        span: member_span,
                    },
                });
            }
            Rule::method_def => {
                let mut key = None;
                let mut is_async = false;
                let mut params = Vec::new();
                let mut body = None;
                for part in member.into_inner() {
                    match part.as_rule() {
                        Rule::kw_async => is_async = true,
                        Rule::params => params = build_params(part, source)?,
                        Rule::block => body = Some(build_body(part, source)?),
                        Rule::type_annotation => {}
                        _ => key = Some(build_prop_key(part, source)?),
                    }
                }
                let (Some(key), Some(body)) = (key, body) else {
                    return Err(ParseError::BuildError(
                        "Malformed method definition".to_string(),
                        Some(member_span),
                    ));
                };
                let name = match &key {
                    PropKey::Static { name } => Some(name.clone()),
                    PropKey::Computed { .. } => None,
                };
                let def = FunctionDef {
                    name,
                    params,
                    body: FunctionBody::Block { body },
                    is_async,
                    is_arrow: false,
                    span: member_span,
                };
                properties.push(Property::KeyValue {
                    key,
                    value: Expr::Function {
                        def: Arc::new(def),
                        span: member_span,
                    },
                });
            }
            other => {
                return Err(ParseError::BuildError(
                    format!("Unexpected property rule: {:?}", other),
                    Some(member_span),
                ))
            }
        }
    }

    Ok(Expr::LitObj { properties, span })
}

fn build_prop_key(pair: Pair<Rule>, source: &str) -> ParseResult<PropKey> {
    let span = pair_to_span(&pair, source);
    match pair.as_rule() {
        Rule::property_name => Ok(PropKey::Static {
            name: pair.as_str().to_string(),
        }),
        Rule::string => Ok(PropKey::Static {
            name: string_value(pair),
        }),
        Rule::number => {
            let v = parse_number(pair.as_str(), span)?;
            Ok(PropKey::Static {
                name: crate::executor::values::number_to_string(v),
            })
        }
        Rule::computed_key => {
            let mut inner = pair.into_inner();
            let expr = build_expression(take(&mut inner, "computed key", span)?, source)?;
            Ok(PropKey::Computed {
                expr: Box::new(expr),
            })
        }
        other => Err(ParseError::BuildError(
            format!("Unexpected property key rule: {:?}", other),
            Some(span),
        )),
    }
}

fn build_template(pair: Pair<Rule>, source: &str) -> ParseResult<(Vec<String>, Vec<Expr>)> {
    let mut quasis = Vec::new();
    let mut exprs = Vec::new();
    let mut current = String::new();

    for part in pair.into_inner() {
        let part_span = pair_to_span(&part, source);
        match part.as_rule() {
            Rule::template_chars => current.push_str(&unescape(part.as_str())),
            Rule::template_sub => {
                quasis.push(std::mem::take(&mut current));
                let mut inner = part.into_inner();
                exprs.push(build_expression(
                    take(&mut inner, "template expression", part_span)?,
                    source,
                )?);
            }
            _ => {}
        }
    }
    quasis.push(current);

    Ok((quasis, exprs))
}

/* ===================== Literals ===================== */

fn parse_number(text: &str, span: Span) -> ParseResult<f64> {
    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    let parsed = if let Some(hex) = cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16).map(|n| n as f64).ok()
    } else {
        cleaned.parse::<f64>().ok()
    };
    parsed.ok_or_else(|| {
        ParseError::BuildError(format!("Failed to parse number '{}'", text), Some(span))
    })
}

/// Contents of a quoted string literal with escapes resolved
fn string_value(pair: Pair<Rule>) -> String {
    pair.into_inner()
        .next()
        .map(|content| unescape(content.as_str()))
        .unwrap_or_default()
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('v') => out.push('\u{b}'),
            Some('0') => out.push('\0'),
            Some('\n') => {}
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(c) => out.push(c),
                    None => out.push_str(&hex),
                }
            }
            Some('u') => {
                let hex: String = if chars.peek() == Some(&'{') {
                    chars.next();
                    chars.by_ref().take_while(|c| *c != '}').collect()
                } else {
                    chars.by_ref().take(4).collect()
                };
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(c) => out.push(c),
                    None => out.push('\u{FFFD}'),
                }
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }

    out
}
