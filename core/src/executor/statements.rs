//! Statement execution

use std::sync::Arc;

use super::errors::ErrorInfo;
use super::scope::Scope;
use super::types::ast::{ForLoopKind, Pattern, Stmt};
use super::values::{iterate, Closure, Thrown, Val};
use super::{Control, Interpreter};

impl Interpreter {
    /// Declare every function statement of a block before running it
    pub(crate) fn hoist_functions(&mut self, body: &[Stmt], scope: &Arc<Scope>) {
        for stmt in body {
            if let Stmt::Function { def, .. } = stmt {
                if let Some(name) = &def.name {
                    let closure = Closure {
                        def: Arc::clone(def),
                        env: Arc::clone(scope),
                    };
                    scope.declare(name, Val::Func(Arc::new(closure)), true);
                }
            }
        }
    }

    /// Run statements in a fresh child scope
    pub(crate) fn exec_block(&mut self, body: &[Stmt], scope: &Arc<Scope>) -> Result<Control, Thrown> {
        let block_scope = Scope::child(scope);
        self.exec_body(body, &block_scope)
    }

    /// Run statements directly in `scope`
    pub(crate) fn exec_body(&mut self, body: &[Stmt], scope: &Arc<Scope>) -> Result<Control, Thrown> {
        self.hoist_functions(body, scope);
        for stmt in body {
            match self.exec_stmt(stmt, scope)? {
                Control::None => {}
                other => return Ok(other),
            }
        }
        Ok(Control::None)
    }

    pub(crate) fn exec_stmt(&mut self, stmt: &Stmt, scope: &Arc<Scope>) -> Result<Control, Thrown> {
        self.check_deadline()?;

        match stmt {
            Stmt::Empty { .. } | Stmt::Import { .. } | Stmt::TypeDecl { .. } => Ok(Control::None),

            Stmt::Block { body, .. } => self.exec_block(body, scope),

            Stmt::Declare {
                var_kind,
                declarators,
                ..
            } => {
                for decl in declarators {
                    let value = match &decl.init {
                        Some(init) => self.eval(init, scope)?,
                        None => Val::Undefined,
                    };
                    self.bind_pattern(&decl.target, value, scope, var_kind.is_mutable())?;
                }
                Ok(Control::None)
            }

            Stmt::Function { def, .. } => {
                // Already hoisted when it sits directly in a block; a function
                // that is the sole body of an `if` is declared here.
                if let Some(name) = &def.name {
                    if !scope.has_own(name) {
                        let closure = Closure {
                            def: Arc::clone(def),
                            env: Arc::clone(scope),
                        };
                        scope.declare(name, Val::Func(Arc::new(closure)), true);
                    }
                }
                Ok(Control::None)
            }

            Stmt::If {
                test,
                then_s,
                else_s,
                ..
            } => {
                if self.eval(test, scope)?.is_truthy() {
                    self.exec_stmt(then_s, scope)
                } else if let Some(else_s) = else_s {
                    self.exec_stmt(else_s, scope)
                } else {
                    Ok(Control::None)
                }
            }

            Stmt::While { test, body, .. } => {
                loop {
                    self.check_deadline()?;
                    if !self.eval(test, scope)?.is_truthy() {
                        break;
                    }
                    match self.exec_stmt(body, scope)? {
                        Control::Break => break,
                        Control::Return(v) => return Ok(Control::Return(v)),
                        Control::None | Control::Continue => {}
                    }
                }
                Ok(Control::None)
            }

            Stmt::DoWhile { body, test, .. } => {
                loop {
                    self.check_deadline()?;
                    match self.exec_stmt(body, scope)? {
                        Control::Break => break,
                        Control::Return(v) => return Ok(Control::Return(v)),
                        Control::None | Control::Continue => {}
                    }
                    if !self.eval(test, scope)?.is_truthy() {
                        break;
                    }
                }
                Ok(Control::None)
            }

            Stmt::For {
                init,
                test,
                update,
                body,
                ..
            } => {
                let loop_scope = Scope::child(scope);
                if let Some(init) = init {
                    self.exec_stmt(init, &loop_scope)?;
                }
                loop {
                    self.check_deadline()?;
                    if let Some(test) = test {
                        if !self.eval(test, &loop_scope)?.is_truthy() {
                            break;
                        }
                    }
                    match self.exec_stmt(body, &loop_scope)? {
                        Control::Break => break,
                        Control::Return(v) => return Ok(Control::Return(v)),
                        Control::None | Control::Continue => {}
                    }
                    for expr in update {
                        self.eval(expr, &loop_scope)?;
                    }
                }
                Ok(Control::None)
            }

            Stmt::ForLoop {
                kind,
                var_kind,
                binding,
                iterable,
                body,
                ..
            } => {
                let source = self.eval(iterable, scope)?;
                let items = match kind {
                    ForLoopKind::Of => iterate(&source)?,
                    ForLoopKind::In => for_in_keys(&source),
                };

                for item in items {
                    self.check_deadline()?;
                    let iter_scope = Scope::child(scope);
                    self.bind_pattern(binding, item, &iter_scope, var_kind.is_mutable())?;
                    match self.exec_stmt(body, &iter_scope)? {
                        Control::Break => break,
                        Control::Return(v) => return Ok(Control::Return(v)),
                        Control::None | Control::Continue => {}
                    }
                }
                Ok(Control::None)
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.eval(expr, scope)?,
                    None => Val::Undefined,
                };
                Ok(Control::Return(value))
            }

            Stmt::Throw { value, .. } => {
                let value = self.eval(value, scope)?;
                Err(Thrown(value))
            }

            Stmt::Try {
                body,
                catch_param,
                catch_body,
                finally_body,
                ..
            } => {
                let mut outcome = self.exec_block(body, scope);

                // Timeouts are not catchable; the fragment must stop.
                let caught = match &outcome {
                    Err(thrown) if !matches!(&thrown.0, Val::Error(info) if info.is_timeout()) => {
                        Some(thrown.clone())
                    }
                    _ => None,
                };
                if let (Some(thrown), Some(catch_body)) = (caught, catch_body) {
                    let catch_scope = Scope::child(scope);
                    if let Some(param) = catch_param {
                        self.bind_pattern(param, thrown.0, &catch_scope, true)?;
                    }
                    outcome = self.exec_body(catch_body, &catch_scope);
                }

                if let Some(finally_body) = finally_body {
                    match self.exec_block(finally_body, scope)? {
                        Control::None => {}
                        other => return Ok(other),
                    }
                }

                outcome
            }

            Stmt::Expr { expr, .. } => {
                self.eval(expr, scope)?;
                Ok(Control::None)
            }

            Stmt::Break { .. } => Ok(Control::Break),
            Stmt::Continue { .. } => Ok(Control::Continue),
        }
    }

    /// Bind a declaration/parameter pattern to a value in `scope`
    pub(crate) fn bind_pattern(
        &mut self,
        pattern: &Pattern,
        value: Val,
        scope: &Arc<Scope>,
        mutable: bool,
    ) -> Result<(), Thrown> {
        match pattern {
            Pattern::Ident { name, .. } => {
                scope.declare(name, value, mutable);
                Ok(())
            }
            Pattern::Object { props, rest, .. } => {
                if value.is_nullish() {
                    return Err(ErrorInfo::type_error(format!(
                        "Cannot destructure '{}' as it is {}.",
                        super::values::to_js_string(&value),
                        super::values::to_js_string(&value)
                    ))
                    .into());
                }
                for prop in props {
                    let mut field = self.get_member(&value, &prop.key)?;
                    if matches!(field, Val::Undefined) {
                        if let Some(default) = &prop.default {
                            field = self.eval(default, scope)?;
                        }
                    }
                    self.bind_pattern(&prop.value, field, scope, mutable)?;
                }
                if let Some(rest) = rest {
                    let remaining = match &value {
                        Val::Obj(map) => map
                            .lock()
                            .iter()
                            .filter(|(k, _)| !props.iter().any(|p| &p.key == *k))
                            .map(|(k, v)| (k.clone(), v.clone()))
                            .collect(),
                        _ => Default::default(),
                    };
                    self.bind_pattern(rest, Val::obj(remaining), scope, mutable)?;
                }
                Ok(())
            }
            Pattern::Array { elements, rest, .. } => {
                let items = iterate(&value)?;
                for (i, element) in elements.iter().enumerate() {
                    let mut item = items.get(i).cloned().unwrap_or(Val::Undefined);
                    if matches!(item, Val::Undefined) {
                        if let Some(default) = &element.default {
                            item = self.eval(default, scope)?;
                        }
                    }
                    self.bind_pattern(&element.target, item, scope, mutable)?;
                }
                if let Some(rest) = rest {
                    let tail = items.get(elements.len()..).unwrap_or_default().to_vec();
                    self.bind_pattern(rest, Val::list(tail), scope, mutable)?;
                }
                Ok(())
            }
        }
    }
}

/// Keys visited by `for...in`
fn for_in_keys(source: &Val) -> Vec<Val> {
    match source {
        Val::Obj(map) => map.lock().keys().map(|k| Val::Str(k.clone())).collect(),
        Val::List(items) => (0..items.lock().len())
            .map(|i| Val::Str(i.to_string()))
            .collect(),
        Val::Str(s) => (0..s.chars().count()).map(|i| Val::Str(i.to_string())).collect(),
        _ => Vec::new(),
    }
}
