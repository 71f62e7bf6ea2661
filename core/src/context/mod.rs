//! # Execution context - the names a fragment can use without importing them
//!
//! Each fragment gets a fresh set of bindings:
//!
//! - SDK verbs (`ai`, `db`, `on`, `send`, `list`, `research`, `extract`)
//! - `env` and `process.env`, a snapshot chosen by a named profile
//! - `expect` and `assert`, reporting verdicts to the caller's sink
//! - `export` and `import`, backed by the document's [`SharedState`]
//!
//! Shared state is the only thing that outlives a fragment.

pub mod assertions;
pub mod sdk;
pub mod state;

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::warn;

use crate::config::ContextProfile;
use crate::executor::{Bindings, Val};

pub use assertions::VerdictSink;
pub use sdk::{LazyClient, SdkClient, SdkError, StubClient};
pub use state::{SharedState, StateRegistry};

use assertions::{AssertFn, ExpectFn};
use sdk::{SdkVerb, SDK_VERBS};
use state::{ExportFn, ImportFn};

/// Builds the bindings for one fragment
#[derive(Clone)]
pub struct ExecutionContextFactory {
    sdk: Arc<dyn SdkClient>,
    profiles: HashMap<String, ContextProfile>,
    default_profile: String,
}

impl std::fmt::Debug for ExecutionContextFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContextFactory")
            .field("sdk", &self.sdk)
            .field("profiles", &self.profiles.keys().collect::<Vec<_>>())
            .field("default_profile", &self.default_profile)
            .finish()
    }
}

impl ExecutionContextFactory {
    pub fn new(sdk: Arc<dyn SdkClient>) -> Self {
        Self {
            sdk,
            profiles: HashMap::new(),
            default_profile: "default".to_string(),
        }
    }

    pub fn with_profiles(mut self, profiles: HashMap<String, ContextProfile>) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn with_default_profile(mut self, name: impl Into<String>) -> Self {
        self.default_profile = name.into();
        self
    }

    /// Bindings for a fragment of the document owning `state`
    pub fn build(&self, state: &SharedState, profile: Option<&str>, verdicts: VerdictSink) -> Bindings {
        let mut bindings = Bindings::new();

        for verb in SDK_VERBS {
            bindings.insert(
                verb.to_string(),
                Val::Host(Arc::new(SdkVerb::root(self.sdk.clone(), verb))),
            );
        }

        let env = self.env_snapshot(profile.unwrap_or(&self.default_profile));
        let mut process = IndexMap::new();
        process.insert("env".to_string(), env.clone());
        bindings.insert("env".to_string(), env);
        bindings.insert("process".to_string(), Val::obj(process));

        bindings.insert("expect".to_string(), Val::Host(Arc::new(ExpectFn::new(verdicts.clone()))));
        bindings.insert("assert".to_string(), Val::Host(Arc::new(AssertFn::new(verdicts))));

        bindings.insert("export".to_string(), Val::Host(Arc::new(ExportFn::new(state.clone()))));
        bindings.insert("import".to_string(), Val::Host(Arc::new(ImportFn::new(state.clone()))));

        bindings
    }

    fn env_snapshot(&self, name: &str) -> Val {
        let vars: Vec<(String, String)> = std::env::vars().collect();
        let snapshot = match self.profiles.get(name) {
            Some(profile) => snapshot(profile, &vars),
            None => {
                if name != self.default_profile {
                    warn!(profile = name, "unknown execution context profile");
                }
                IndexMap::new()
            }
        };
        Val::obj(snapshot.into_iter().map(|(k, v)| (k, Val::Str(v))).collect())
    }
}

/// Variables selected by `profile` from `vars`, then its fixed values
fn snapshot(profile: &ContextProfile, vars: &[(String, String)]) -> IndexMap<String, String> {
    let mut selected = IndexMap::new();
    for pattern in &profile.include {
        match pattern.strip_suffix('*') {
            Some(prefix) => {
                let mut matching: Vec<&(String, String)> =
                    vars.iter().filter(|(k, _)| k.starts_with(prefix)).collect();
                matching.sort();
                for (k, v) in matching {
                    selected.insert(k.clone(), v.clone());
                }
            }
            None => {
                if let Some((k, v)) = vars.iter().find(|(k, _)| k == pattern) {
                    selected.insert(k.clone(), v.clone());
                }
            }
        }
    }
    for (k, v) in &profile.set {
        selected.insert(k.clone(), v.clone());
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{Evaluator, NoopObserver, ScriptEvaluator};
    use maplit::{btreemap, hashmap};

    fn ignore_verdicts() -> VerdictSink {
        Arc::new(|_: bool, _: &str| {})
    }

    fn factory() -> ExecutionContextFactory {
        ExecutionContextFactory::new(Arc::new(StubClient)).with_profiles(hashmap! {
            "staging".to_string() => ContextProfile {
                include: vec![],
                set: btreemap! { "REGION".to_string() => "eu".to_string() },
            },
        })
    }

    #[test]
    fn test_snapshot_matches_names_and_prefixes() {
        let vars = vec![
            ("API_URL".to_string(), "u".to_string()),
            ("API_KEY".to_string(), "k".to_string()),
            ("HOME".to_string(), "/root".to_string()),
            ("SECRET".to_string(), "s".to_string()),
        ];
        let profile = ContextProfile {
            include: vec!["API_*".to_string(), "HOME".to_string(), "MISSING".to_string()],
            set: btreemap! { "HOME".to_string() => "/docs".to_string() },
        };
        let selected = snapshot(&profile, &vars);

        let keys: Vec<&str> = selected.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["API_KEY", "API_URL", "HOME"]);
        assert_eq!(selected["HOME"], "/docs");
    }

    #[test]
    fn test_bindings_expose_env_and_process_env() {
        let bindings = factory().build(&SharedState::new(), Some("staging"), ignore_verdicts());
        let value = ScriptEvaluator::new()
            .run("env.REGION + process.env.REGION", &bindings, &mut NoopObserver)
            .unwrap();
        assert_eq!(value.as_str(), Some("eueu"));
    }

    #[test]
    fn test_unknown_profile_is_empty() {
        let bindings = factory().build(&SharedState::new(), Some("prod"), ignore_verdicts());
        let value = ScriptEvaluator::new()
            .run("Object.keys(env).length", &bindings, &mut NoopObserver)
            .unwrap();
        assert_eq!(value.as_f64(), Some(0.0));
    }

    #[test]
    fn test_every_name_is_bound() {
        let bindings = factory().build(&SharedState::new(), None, ignore_verdicts());
        for name in SDK_VERBS
            .iter()
            .copied()
            .chain(["env", "process", "expect", "assert", "export", "import"])
        {
            assert!(bindings.contains_key(name), "{} missing", name);
        }
    }

    #[test]
    fn test_state_flows_between_builds() {
        let state = SharedState::new();
        let factory = factory();
        let evaluator = ScriptEvaluator::new();

        let first = factory.build(&state, None, ignore_verdicts());
        evaluator.run("export('x', 42)", &first, &mut NoopObserver).unwrap();

        let second = factory.build(&state, None, ignore_verdicts());
        let value = evaluator.run("import('x')", &second, &mut NoopObserver).unwrap();
        assert_eq!(value.as_f64(), Some(42.0));
    }
}
