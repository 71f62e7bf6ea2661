//! Lexical scopes
//!
//! A scope is a frame of bindings with a link to its parent. Closures hold an
//! `Arc<Scope>` so they observe later writes to captured variables.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::errors::ErrorInfo;
use super::values::Val;

#[derive(Debug)]
struct Binding {
    value: Val,
    mutable: bool,
}

#[derive(Debug, Default)]
pub struct Scope {
    vars: Mutex<HashMap<String, Binding>>,
    parent: Option<Arc<Scope>>,
}

impl Scope {
    pub fn root() -> Arc<Scope> {
        Arc::new(Scope::default())
    }

    pub fn child(parent: &Arc<Scope>) -> Arc<Scope> {
        Arc::new(Scope {
            vars: Mutex::new(HashMap::new()),
            parent: Some(Arc::clone(parent)),
        })
    }

    /// Bind a name in this frame, shadowing any outer binding
    pub fn declare(&self, name: &str, value: Val, mutable: bool) {
        self.vars
            .lock()
            .insert(name.to_string(), Binding { value, mutable });
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.vars.lock().contains_key(name)
    }

    pub fn lookup(&self, name: &str) -> Option<Val> {
        if let Some(binding) = self.vars.lock().get(name) {
            return Some(binding.value.clone());
        }
        let mut current = self.parent.clone();
        while let Some(scope) = current {
            if let Some(binding) = scope.vars.lock().get(name) {
                return Some(binding.value.clone());
            }
            current = scope.parent.clone();
        }
        None
    }

    /// Write to the nearest existing binding
    pub fn assign(&self, name: &str, value: Val) -> Result<(), ErrorInfo> {
        if let Some(binding) = self.vars.lock().get_mut(name) {
            return write_binding(name, binding, value);
        }
        let mut current = self.parent.clone();
        while let Some(scope) = current {
            if let Some(binding) = scope.vars.lock().get_mut(name) {
                return write_binding(name, binding, value);
            }
            current = scope.parent.clone();
        }
        Err(ErrorInfo::reference_error(format!("{} is not defined", name)))
    }
}

fn write_binding(name: &str, binding: &mut Binding, value: Val) -> Result<(), ErrorInfo> {
    if !binding.mutable {
        return Err(ErrorInfo::type_error(format!(
            "Assignment to constant variable '{}'",
            name
        )));
    }
    binding.value = value;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_sees_parent_bindings() {
        let root = Scope::root();
        root.declare("x", Val::Num(1.0), true);
        let child = Scope::child(&root);
        assert!(matches!(child.lookup("x"), Some(Val::Num(n)) if n == 1.0));
        assert!(child.lookup("y").is_none());
    }

    #[test]
    fn test_assign_writes_through_to_declaring_scope() {
        let root = Scope::root();
        root.declare("x", Val::Num(1.0), true);
        let child = Scope::child(&root);
        child.assign("x", Val::Num(2.0)).unwrap();
        assert!(matches!(root.lookup("x"), Some(Val::Num(n)) if n == 2.0));
    }

    #[test]
    fn test_const_assignment_is_type_error() {
        let root = Scope::root();
        root.declare("x", Val::Num(1.0), false);
        let err = root.assign("x", Val::Num(2.0)).unwrap_err();
        assert_eq!(err.name, "TypeError");
    }

    #[test]
    fn test_undeclared_assignment_is_reference_error() {
        let root = Scope::root();
        let err = root.assign("missing", Val::Null).unwrap_err();
        assert_eq!(err.name, "ReferenceError");
        assert_eq!(err.message, "missing is not defined");
    }
}
