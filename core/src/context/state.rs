//! Per-document shared state
//!
//! `export(key, value)` and `import(key)` are the only way one fragment can
//! hand something to a later fragment. Each document identity gets its own
//! store, created on first use and dropped when the document is finished.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::executor::stdlib::arg;
use crate::executor::values::to_js_string;
use crate::executor::{ErrorInfo, EvalResult, HostObject, Interpreter, Val};

/// Key/value store for the fragments of one document
#[derive(Debug, Clone, Default)]
pub struct SharedState {
    values: Arc<Mutex<IndexMap<String, Val>>>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: impl Into<String>, value: Val) {
        self.values.lock().insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<Val> {
        self.values.lock().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.values.lock().keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }
}

/// Hands out one [`SharedState`] per document identity
#[derive(Debug, Default)]
pub struct StateRegistry {
    documents: Mutex<HashMap<String, SharedState>>,
}

impl StateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_document(&self, document: &str) -> SharedState {
        self.documents
            .lock()
            .entry(document.to_string())
            .or_default()
            .clone()
    }

    /// Forget a document's state once its last fragment has run
    pub fn discard(&self, document: &str) {
        self.documents.lock().remove(document);
    }
}

/* ===================== Script bindings ===================== */

/// `export(key, value)`
#[derive(Debug)]
pub struct ExportFn {
    state: SharedState,
}

impl ExportFn {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }
}

impl HostObject for ExportFn {
    fn name(&self) -> &str {
        "export"
    }

    fn call(&self, _interp: &mut Interpreter, _this: &Val, args: Vec<Val>) -> EvalResult {
        let key = state_key(&args, "export")?;
        let value = arg(&args, 1);
        self.state.set(key, value.clone());
        Ok(value)
    }
}

/// `import(key, fallback?)`
#[derive(Debug)]
pub struct ImportFn {
    state: SharedState,
}

impl ImportFn {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }
}

impl HostObject for ImportFn {
    fn name(&self) -> &str {
        "import"
    }

    fn call(&self, _interp: &mut Interpreter, _this: &Val, args: Vec<Val>) -> EvalResult {
        let key = state_key(&args, "import")?;
        match self.state.get(&key) {
            Some(value) => Ok(value),
            None if args.len() > 1 => Ok(arg(&args, 1)),
            None => Err(ErrorInfo::reference_error(format!(
                "'{}' has not been exported by an earlier example",
                key
            ))
            .into()),
        }
    }
}

fn state_key(args: &[Val], verb: &str) -> Result<String, ErrorInfo> {
    match args.first() {
        Some(Val::Str(key)) => Ok(key.clone()),
        Some(other) if !other.is_nullish() => Ok(to_js_string(other)),
        _ => Err(ErrorInfo::type_error(format!("{}() requires a key", verb))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{Bindings, Evaluator, NoopObserver, ScriptEvaluator};

    fn bindings(state: &SharedState) -> Bindings {
        let mut bindings = Bindings::new();
        bindings.insert("export".to_string(), Val::Host(Arc::new(ExportFn::new(state.clone()))));
        bindings.insert("import".to_string(), Val::Host(Arc::new(ImportFn::new(state.clone()))));
        bindings
    }

    fn run(source: &str, state: &SharedState) -> Result<Val, crate::executor::EvalError> {
        ScriptEvaluator::new().run(source, &bindings(state), &mut NoopObserver)
    }

    #[test]
    fn test_export_then_import_across_fragments() {
        let state = SharedState::new();
        run("export('x', 40 + 2)", &state).unwrap();
        let value = run("import('x')", &state).unwrap();
        assert_eq!(value.as_f64(), Some(42.0));
    }

    #[test]
    fn test_exported_objects_keep_identity() {
        let state = SharedState::new();
        run("export('cart', { items: [] })", &state).unwrap();
        run("import('cart').items.push('apple')", &state).unwrap();
        let count = run("import('cart').items.length", &state).unwrap();
        assert_eq!(count.as_f64(), Some(1.0));
    }

    #[test]
    fn test_missing_key_throws_unless_defaulted() {
        let state = SharedState::new();
        let err = run("import('nope')", &state).unwrap_err();
        assert!(err.to_string().starts_with("ReferenceError"));
        let value = run("import('nope', 'fallback')", &state).unwrap();
        assert_eq!(value.as_str(), Some("fallback"));
    }

    #[test]
    fn test_registry_isolates_documents() {
        let registry = StateRegistry::new();
        registry.for_document("a.md").set("x", Val::Num(1.0));

        assert!(registry.for_document("a.md").get("x").is_some());
        assert!(registry.for_document("b.md").get("x").is_none());

        registry.discard("a.md");
        assert!(registry.for_document("a.md").is_empty());
    }
}
