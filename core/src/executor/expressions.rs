//! Expression evaluation

use std::sync::Arc;

use super::errors::{ErrorInfo, SYNTAX_ERROR};
use super::scope::Scope;
use super::stdlib;
use super::types::ast::{
    AssignOp, BinaryOp, Expr, FunctionBody, LogicalOp, PropKey, Property, UnaryOp, UpdateOp,
};
use super::values::{
    as_index, iterate, loose_equals, strict_equals, to_js_string, to_number, to_property_key,
    Closure, EvalResult, JsRegex, Thrown, Val,
};
use super::{Control, Interpreter};

impl Interpreter {
    /// Evaluate an expression to a value
    pub fn eval(&mut self, expr: &Expr, scope: &Arc<Scope>) -> EvalResult {
        match expr {
            Expr::LitUndefined { .. } => Ok(Val::Undefined),
            Expr::LitNull { .. } => Ok(Val::Null),
            Expr::LitBool { v, .. } => Ok(Val::Bool(*v)),
            Expr::LitNum { v, .. } => Ok(Val::Num(*v)),
            Expr::LitStr { v, .. } => Ok(Val::Str(v.clone())),

            Expr::Template { quasis, exprs, .. } => {
                let values = self.eval_list(exprs, scope)?;
                Ok(Val::Str(interpolate(quasis, &values)))
            }

            Expr::Regex { pattern, flags, .. } => {
                Ok(Val::Regex(Arc::new(JsRegex::compile(pattern, flags)?)))
            }

            Expr::LitList { elements, .. } => Ok(Val::list(self.eval_args(elements, scope)?)),

            Expr::LitObj { properties, .. } => self.eval_object(properties, scope),

            Expr::Spread { .. } => {
                Err(ErrorInfo::new(SYNTAX_ERROR, "Unexpected spread element").into())
            }

            Expr::Ident { name, .. } => scope
                .lookup(name)
                .ok_or_else(|| ErrorInfo::reference_error(format!("{} is not defined", name)).into()),

            Expr::This { .. } => Ok(scope.lookup("this").unwrap_or(Val::Undefined)),

            Expr::Function { def, .. } => Ok(Val::Func(Arc::new(Closure {
                def: Arc::clone(def),
                env: Arc::clone(scope),
            }))),

            Expr::Member { .. } | Expr::Index { .. } | Expr::Call { .. } => {
                Ok(self.eval_chain(expr, scope)?.unwrap_or(Val::Undefined))
            }

            Expr::New { callee, args, .. } => {
                let ctor = self.eval(callee, scope)?;
                let args = self.eval_args(args, scope)?;
                self.construct(&ctor, callee, args)
            }

            Expr::TaggedTemplate {
                tag, quasis, exprs, ..
            } => {
                let (this, func) = self
                    .eval_callee(tag, scope)?
                    .unwrap_or((Val::Undefined, Val::Undefined));
                let values = self.eval_list(exprs, scope)?;
                let args = match &func {
                    Val::Host(_) => vec![Val::Str(interpolate(quasis, &values))],
                    _ => {
                        let strings = quasis.iter().map(|q| Val::Str(q.clone())).collect();
                        std::iter::once(Val::list(strings)).chain(values).collect()
                    }
                };
                self.call_expr_value(&func, tag, this, args)
            }

            Expr::Await { inner, .. } => self.eval(inner, scope),

            Expr::Unary { op, operand, .. } => self.eval_unary(*op, operand, scope),

            Expr::Update {
                op, prefix, target, ..
            } => {
                let old = to_number(&self.eval(target, scope)?);
                let new = match op {
                    UpdateOp::Increment => old + 1.0,
                    UpdateOp::Decrement => old - 1.0,
                };
                self.assign_to(target, Val::Num(new), scope)?;
                Ok(Val::Num(if *prefix { new } else { old }))
            }

            Expr::Binary {
                op, left, right, ..
            } => {
                let l = self.eval(left, scope)?;
                let r = self.eval(right, scope)?;
                binary_op(*op, &l, &r)
            }

            Expr::Logical {
                op, left, right, ..
            } => {
                let l = self.eval(left, scope)?;
                let short_circuit = match op {
                    LogicalOp::And => !l.is_truthy(),
                    LogicalOp::Or => l.is_truthy(),
                    LogicalOp::Nullish => !l.is_nullish(),
                };
                if short_circuit {
                    Ok(l)
                } else {
                    self.eval(right, scope)
                }
            }

            Expr::Ternary {
                condition,
                consequent,
                alternate,
                ..
            } => {
                if self.eval(condition, scope)?.is_truthy() {
                    self.eval(consequent, scope)
                } else {
                    self.eval(alternate, scope)
                }
            }

            Expr::Assign {
                op, target, value, ..
            } => self.eval_assign(*op, target, value, scope),
        }
    }

    /// Evaluate a member/index/call chain. `None` means an optional link
    /// (`?.`) met a nullish value and the rest of the chain was skipped.
    fn eval_chain(&mut self, expr: &Expr, scope: &Arc<Scope>) -> Result<Option<Val>, Thrown> {
        match expr {
            Expr::Member {
                object,
                property,
                optional,
                ..
            } => {
                let Some(obj) = self.eval_chain(object, scope)? else {
                    return Ok(None);
                };
                if *optional && obj.is_nullish() {
                    return Ok(None);
                }
                self.get_member(&obj, property).map(Some)
            }

            Expr::Index {
                object,
                index,
                optional,
                ..
            } => {
                let Some(obj) = self.eval_chain(object, scope)? else {
                    return Ok(None);
                };
                if *optional && obj.is_nullish() {
                    return Ok(None);
                }
                let key = to_property_key(&self.eval(index, scope)?);
                self.get_member(&obj, &key).map(Some)
            }

            Expr::Call {
                callee,
                args,
                optional,
                ..
            } => {
                let Some((this, func)) = self.eval_callee(callee, scope)? else {
                    return Ok(None);
                };
                if *optional && func.is_nullish() {
                    return Ok(None);
                }
                let args = self.eval_args(args, scope)?;
                self.call_expr_value(&func, callee, this, args).map(Some)
            }

            _ => self.eval(expr, scope).map(Some),
        }
    }

    /// Resolve a callee to `(this, function)`
    fn eval_callee(
        &mut self,
        callee: &Expr,
        scope: &Arc<Scope>,
    ) -> Result<Option<(Val, Val)>, Thrown> {
        match callee {
            Expr::Member {
                object,
                property,
                optional,
                ..
            } => {
                let Some(obj) = self.eval_chain(object, scope)? else {
                    return Ok(None);
                };
                if *optional && obj.is_nullish() {
                    return Ok(None);
                }
                let func = self.get_member(&obj, property)?;
                Ok(Some((obj, func)))
            }
            Expr::Index {
                object,
                index,
                optional,
                ..
            } => {
                let Some(obj) = self.eval_chain(object, scope)? else {
                    return Ok(None);
                };
                if *optional && obj.is_nullish() {
                    return Ok(None);
                }
                let key = to_property_key(&self.eval(index, scope)?);
                let func = self.get_member(&obj, &key)?;
                Ok(Some((obj, func)))
            }
            _ => Ok(self
                .eval_chain(callee, scope)?
                .map(|func| (Val::Undefined, func))),
        }
    }

    /// Evaluate call arguments or list elements, expanding spreads
    pub(crate) fn eval_args(&mut self, args: &[Expr], scope: &Arc<Scope>) -> Result<Vec<Val>, Thrown> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                Expr::Spread { inner, .. } => {
                    let spread = self.eval(inner, scope)?;
                    values.extend(iterate(&spread)?);
                }
                other => values.push(self.eval(other, scope)?),
            }
        }
        Ok(values)
    }

    fn eval_list(&mut self, exprs: &[Expr], scope: &Arc<Scope>) -> Result<Vec<Val>, Thrown> {
        exprs.iter().map(|e| self.eval(e, scope)).collect()
    }

    fn eval_object(&mut self, properties: &[Property], scope: &Arc<Scope>) -> EvalResult {
        let mut map = indexmap::IndexMap::new();
        for prop in properties {
            match prop {
                Property::KeyValue { key, value } => {
                    let key = match key {
                        PropKey::Static { name } => name.clone(),
                        PropKey::Computed { expr } => to_property_key(&self.eval(expr, scope)?),
                    };
                    let value = self.eval(value, scope)?;
                    map.insert(key, value);
                }
                Property::Spread { expr } => match self.eval(expr, scope)? {
                    Val::Obj(source) => {
                        let source = source.lock().clone();
                        map.extend(source);
                    }
                    Val::List(items) => {
                        let items = items.lock().clone();
                        for (i, item) in items.into_iter().enumerate() {
                            map.insert(i.to_string(), item);
                        }
                    }
                    Val::Str(s) => {
                        for (i, c) in s.chars().enumerate() {
                            map.insert(i.to_string(), Val::Str(c.to_string()));
                        }
                    }
                    _ => {}
                },
            }
        }
        Ok(Val::obj(map))
    }

    fn eval_unary(&mut self, op: UnaryOp, operand: &Expr, scope: &Arc<Scope>) -> EvalResult {
        match op {
            // `typeof undeclared` is not an error
            UnaryOp::TypeOf => {
                if let Expr::Ident { name, .. } = operand {
                    if scope.lookup(name).is_none() {
                        return Ok(Val::str("undefined"));
                    }
                }
                Ok(Val::str(self.eval(operand, scope)?.type_of()))
            }
            UnaryOp::Delete => {
                match operand {
                    Expr::Member {
                        object, property, ..
                    } => {
                        let obj = self.eval(object, scope)?;
                        delete_member(&obj, property);
                    }
                    Expr::Index { object, index, .. } => {
                        let obj = self.eval(object, scope)?;
                        let key = to_property_key(&self.eval(index, scope)?);
                        delete_member(&obj, &key);
                    }
                    _ => {}
                }
                Ok(Val::Bool(true))
            }
            UnaryOp::Not => Ok(Val::Bool(!self.eval(operand, scope)?.is_truthy())),
            UnaryOp::Neg => Ok(Val::Num(-to_number(&self.eval(operand, scope)?))),
            UnaryOp::Plus => Ok(Val::Num(to_number(&self.eval(operand, scope)?))),
            UnaryOp::Void => {
                self.eval(operand, scope)?;
                Ok(Val::Undefined)
            }
        }
    }

    fn eval_assign(
        &mut self,
        op: AssignOp,
        target: &Expr,
        value: &Expr,
        scope: &Arc<Scope>,
    ) -> EvalResult {
        let new_value = match op {
            AssignOp::Assign => self.eval(value, scope)?,
            AssignOp::Nullish | AssignOp::Or | AssignOp::And => {
                let current = self.eval(target, scope)?;
                let keep = match op {
                    AssignOp::Nullish => !current.is_nullish(),
                    AssignOp::Or => current.is_truthy(),
                    _ => !current.is_truthy(),
                };
                if keep {
                    return Ok(current);
                }
                self.eval(value, scope)?
            }
            arithmetic => {
                let current = self.eval(target, scope)?;
                let rhs = self.eval(value, scope)?;
                let bin = match arithmetic {
                    AssignOp::Add => BinaryOp::Add,
                    AssignOp::Sub => BinaryOp::Sub,
                    AssignOp::Mul => BinaryOp::Mul,
                    AssignOp::Div => BinaryOp::Div,
                    _ => BinaryOp::Rem,
                };
                binary_op(bin, &current, &rhs)?
            }
        };
        self.assign_to(target, new_value.clone(), scope)?;
        Ok(new_value)
    }

    /// Write `value` to an assignable expression
    pub(crate) fn assign_to(&mut self, target: &Expr, value: Val, scope: &Arc<Scope>) -> Result<(), Thrown> {
        match target {
            Expr::Ident { name, .. } => Ok(scope.assign(name, value)?),
            Expr::Member {
                object, property, ..
            } => {
                let obj = self.eval(object, scope)?;
                set_member(&obj, property, value)
            }
            Expr::Index { object, index, .. } => {
                let obj = self.eval(object, scope)?;
                let key = to_property_key(&self.eval(index, scope)?);
                set_member(&obj, &key, value)
            }
            _ => Err(ErrorInfo::new(SYNTAX_ERROR, "Invalid left-hand side in assignment").into()),
        }
    }

    /// Property read, including built-in methods on primitives
    pub fn get_member(&mut self, obj: &Val, key: &str) -> EvalResult {
        let found = match obj {
            Val::Undefined | Val::Null => {
                return Err(ErrorInfo::type_error(format!(
                    "Cannot read properties of {} (reading '{}')",
                    to_js_string(obj),
                    key
                ))
                .into())
            }
            Val::Obj(map) => map.lock().get(key).cloned(),
            Val::List(items) => {
                let items = items.lock();
                let found = match key {
                    "length" => Some(Val::Num(items.len() as f64)),
                    _ => as_index(key).map(|i| items.get(i).cloned().unwrap_or(Val::Undefined)),
                };
                found
            }
            Val::Str(s) => match key {
                "length" => Some(Val::Num(s.chars().count() as f64)),
                _ => as_index(key).map(|i| {
                    s.chars()
                        .nth(i)
                        .map(|c| Val::Str(c.to_string()))
                        .unwrap_or(Val::Undefined)
                }),
            },
            Val::Host(host) => host.get(key),
            Val::NativeFunc(func) => stdlib::static_member(func, key),
            Val::Func(closure) => match key {
                "name" => Some(Val::str(closure.def.name.clone().unwrap_or_default())),
                "length" => Some(Val::Num(
                    closure.def.params.iter().filter(|p| !p.rest && p.default.is_none()).count() as f64,
                )),
                _ => None,
            },
            Val::Error(info) => match key {
                "name" => Some(Val::str(info.name.clone())),
                "message" => Some(Val::str(info.message.clone())),
                "stack" => Some(Val::str(info.to_string())),
                _ => None,
            },
            Val::Regex(re) => match key {
                "source" => Some(Val::str(re.source.clone())),
                "flags" => Some(Val::str(re.flags.clone())),
                "global" => Some(Val::Bool(re.is_global())),
                _ => None,
            },
            _ => None,
        };

        Ok(found
            .or_else(|| stdlib::lookup_method(obj, key))
            .unwrap_or(Val::Undefined))
    }

    /// Call `func` on behalf of the expression `callee`, naming it in the
    /// error when it is not callable
    fn call_expr_value(&mut self, func: &Val, callee: &Expr, this: Val, args: Vec<Val>) -> EvalResult {
        if !func.is_callable() {
            return Err(ErrorInfo::type_error(format!(
                "{} is not a function",
                describe_callee(callee)
            ))
            .into());
        }
        self.call_value(func, this, args)
    }

    /// Invoke any callable value
    pub fn call_value(&mut self, func: &Val, this: Val, args: Vec<Val>) -> EvalResult {
        match func {
            Val::Func(closure) => self.call_closure(closure, this, args),
            Val::NativeFunc(native) => {
                self.enter_call()?;
                let result = stdlib::call_stdlib_func(self, native, args);
                self.exit_call();
                result
            }
            Val::Method { receiver, name } => {
                self.enter_call()?;
                let result = stdlib::call_method(self, receiver, name, args);
                self.exit_call();
                result
            }
            Val::Host(host) => {
                self.enter_call()?;
                let result = host.call(self, &this, args);
                self.exit_call();
                result
            }
            other => Err(ErrorInfo::type_error(format!(
                "{} is not a function",
                to_js_string(other)
            ))
            .into()),
        }
    }

    pub(crate) fn call_closure(&mut self, closure: &Arc<Closure>, this: Val, args: Vec<Val>) -> EvalResult {
        self.enter_call()?;
        let result = self.invoke_closure(closure, this, args);
        self.exit_call();
        result
    }

    fn invoke_closure(&mut self, closure: &Arc<Closure>, this: Val, args: Vec<Val>) -> EvalResult {
        let def = &closure.def;
        let fn_scope = Scope::child(&closure.env);

        if !def.is_arrow {
            if let Some(name) = &def.name {
                fn_scope.declare(name, Val::Func(Arc::clone(closure)), true);
            }
            fn_scope.declare("this", this, false);
            fn_scope.declare("arguments", Val::list(args.clone()), true);
        }

        for (i, param) in def.params.iter().enumerate() {
            let mut value = if param.rest {
                Val::list(args.get(i..).unwrap_or_default().to_vec())
            } else {
                args.get(i).cloned().unwrap_or(Val::Undefined)
            };
            if matches!(value, Val::Undefined) {
                if let Some(default) = &param.default {
                    value = self.eval(default, &fn_scope)?;
                }
            }
            self.bind_pattern(&param.pattern, value, &fn_scope, true)?;
        }

        match &def.body {
            FunctionBody::Expr { expr } => self.eval(expr, &fn_scope),
            FunctionBody::Block { body } => match self.exec_body(body, &fn_scope)? {
                Control::Return(value) => Ok(value),
                _ => Ok(Val::Undefined),
            },
        }
    }

    /// `new callee(...args)`
    fn construct(&mut self, ctor: &Val, callee: &Expr, args: Vec<Val>) -> EvalResult {
        match ctor {
            Val::NativeFunc(func) => stdlib::construct(self, func, args),
            Val::Func(closure) if !closure.def.is_arrow => {
                let instance = Val::obj(Default::default());
                match self.call_closure(closure, instance.clone(), args)? {
                    returned @ (Val::Obj(_) | Val::List(_)) => Ok(returned),
                    _ => Ok(instance),
                }
            }
            Val::Host(host) if host.is_callable() => host.call(self, &Val::Undefined, args),
            _ => Err(ErrorInfo::type_error(format!(
                "{} is not a constructor",
                describe_callee(callee)
            ))
            .into()),
        }
    }
}

/* ===================== Helpers ===================== */

/// Property write; writes to primitives are ignored
pub fn set_member(obj: &Val, key: &str, value: Val) -> Result<(), Thrown> {
    match obj {
        Val::Undefined | Val::Null => Err(ErrorInfo::type_error(format!(
            "Cannot set properties of {} (setting '{}')",
            to_js_string(obj),
            key
        ))
        .into()),
        Val::Obj(map) => {
            map.lock().insert(key.to_string(), value);
            Ok(())
        }
        Val::List(items) => {
            let mut items = items.lock();
            if key == "length" {
                let len = to_number(&value);
                if len < 0.0 || len.fract() != 0.0 {
                    return Err(ErrorInfo::range_error("Invalid array length").into());
                }
                items.resize(len as usize, Val::Undefined);
            } else if let Some(i) = as_index(key) {
                if i >= items.len() {
                    items.resize(i + 1, Val::Undefined);
                }
                items[i] = value;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn delete_member(obj: &Val, key: &str) {
    match obj {
        Val::Obj(map) => {
            map.lock().shift_remove(key);
        }
        Val::List(items) => {
            if let Some(i) = as_index(key) {
                if let Some(slot) = items.lock().get_mut(i) {
                    *slot = Val::Undefined;
                }
            }
        }
        _ => {}
    }
}

fn interpolate(quasis: &[String], values: &[Val]) -> String {
    let mut out = String::new();
    for (i, quasi) in quasis.iter().enumerate() {
        out.push_str(quasi);
        if let Some(value) = values.get(i) {
            out.push_str(&to_js_string(value));
        }
    }
    out
}

/// Source-like name of a callee for error messages
fn describe_callee(expr: &Expr) -> String {
    match expr {
        Expr::Ident { name, .. } => name.clone(),
        Expr::This { .. } => "this".to_string(),
        Expr::Member {
            object, property, ..
        } => format!("{}.{}", describe_callee(object), property),
        Expr::Index { object, .. } => format!("{}[...]", describe_callee(object)),
        Expr::Call { callee, .. } => format!("{}(...)", describe_callee(callee)),
        _ => "expression".to_string(),
    }
}

fn is_numeric_operand(val: &Val) -> bool {
    matches!(
        val,
        Val::Num(_) | Val::Bool(_) | Val::Null | Val::Undefined
    )
}

/// Apply an eagerly evaluated binary operator
pub fn binary_op(op: BinaryOp, l: &Val, r: &Val) -> EvalResult {
    let value = match op {
        BinaryOp::Add => {
            if is_numeric_operand(l) && is_numeric_operand(r) {
                Val::Num(to_number(l) + to_number(r))
            } else {
                Val::Str(format!("{}{}", to_js_string(l), to_js_string(r)))
            }
        }
        BinaryOp::Sub => Val::Num(to_number(l) - to_number(r)),
        BinaryOp::Mul => Val::Num(to_number(l) * to_number(r)),
        BinaryOp::Div => Val::Num(to_number(l) / to_number(r)),
        BinaryOp::Rem => Val::Num(to_number(l) % to_number(r)),
        BinaryOp::Pow => Val::Num(to_number(l).powf(to_number(r))),
        BinaryOp::Eq => Val::Bool(loose_equals(l, r)),
        BinaryOp::NotEq => Val::Bool(!loose_equals(l, r)),
        BinaryOp::StrictEq => Val::Bool(strict_equals(l, r)),
        BinaryOp::StrictNotEq => Val::Bool(!strict_equals(l, r)),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            Val::Bool(compare(op, l, r))
        }
        BinaryOp::In => {
            let key = to_property_key(l);
            match r {
                Val::Obj(map) => Val::Bool(map.lock().contains_key(&key)),
                Val::List(items) => Val::Bool(
                    key == "length" || as_index(&key).is_some_and(|i| i < items.lock().len()),
                ),
                Val::Host(host) => Val::Bool(host.get(&key).is_some()),
                other => {
                    return Err(ErrorInfo::type_error(format!(
                        "Cannot use 'in' operator to search for '{}' in {}",
                        key,
                        to_js_string(other)
                    ))
                    .into())
                }
            }
        }
        BinaryOp::InstanceOf => Val::Bool(stdlib::instance_of(l, r)),
    };
    Ok(value)
}

fn compare(op: BinaryOp, l: &Val, r: &Val) -> bool {
    if let (Val::Str(a), Val::Str(b)) = (l, r) {
        return match op {
            BinaryOp::Lt => a < b,
            BinaryOp::LtEq => a <= b,
            BinaryOp::Gt => a > b,
            _ => a >= b,
        };
    }
    let (a, b) = (to_number(l), to_number(r));
    match op {
        BinaryOp::Lt => a < b,
        BinaryOp::LtEq => a <= b,
        BinaryOp::Gt => a > b,
        _ => a >= b,
    }
}
