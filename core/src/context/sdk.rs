//! SDK verbs bound into every fragment
//!
//! `ai`, `db`, `on`, `send`, `list`, `research` and `extract` are proxies:
//! reading a property extends the call path and calling one sends the whole
//! path plus JSON arguments to an [`SdkClient`]. The real client sits behind
//! [`LazyClient`] and is only built on the first call; without credentials
//! (or with `--skip-auth`) the deterministic [`StubClient`] answers instead.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::config::SdkSettings;
use crate::executor::stdlib::json::{json_to_val, val_to_json};
use crate::executor::{ErrorInfo, EvalResult, HostObject, Interpreter, Val};

/// Root names bound into every fragment
pub const SDK_VERBS: &[&str] = &["ai", "db", "on", "send", "list", "research", "extract"];

/// Prefix carried by every synthetic output
pub const STUB_PREFIX: &str = "[STUB]";

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("SDK request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SDK returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("SDK client unavailable: {0}")]
    Unavailable(String),
}

pub trait SdkClient: Send + Sync + fmt::Debug {
    /// Invoke a verb path such as `["db", "users", "find"]`
    fn call(&self, path: &[String], args: &[JsonValue]) -> Result<JsonValue, SdkError>;

    fn is_stub(&self) -> bool {
        false
    }
}

/* ===================== Stub ===================== */

/// Offline client with the same call shapes and stable, synthetic outputs
#[derive(Debug, Clone, Copy, Default)]
pub struct StubClient;

impl SdkClient for StubClient {
    fn call(&self, path: &[String], args: &[JsonValue]) -> Result<JsonValue, SdkError> {
        let signature = format!(
            "{}({})",
            path.join("."),
            args.iter().map(JsonValue::to_string).collect::<Vec<_>>().join(", ")
        );
        let output = format!("{} {}", STUB_PREFIX, signature);

        let value = match path.first().map(String::as_str) {
            Some("list") => JsonValue::Array(
                (1..=3)
                    .map(|n| JsonValue::String(format!("{} {} #{}", STUB_PREFIX, path.join("."), n)))
                    .collect(),
            ),
            Some("db" | "send" | "on") => json!({
                "id": format!("stub_{}", &stable_hash(&signature)[..12]),
                "output": output,
            }),
            _ => JsonValue::String(output),
        };
        Ok(value)
    }

    fn is_stub(&self) -> bool {
        true
    }
}

fn stable_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/* ===================== HTTP client ===================== */

#[derive(Debug, Serialize)]
struct CallRequest<'a> {
    path: String,
    args: &'a [JsonValue],
}

#[derive(Debug, Deserialize)]
struct CallResponse {
    #[serde(default)]
    result: JsonValue,
}

/// Client for the hosted SDK endpoint
///
/// Fragments run on blocking threads, so each call drives the async request
/// to completion on the runtime handle captured at construction.
#[derive(Debug)]
pub struct HttpSdkClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    handle: Handle,
}

impl HttpSdkClient {
    pub fn new(settings: &SdkSettings, handle: Handle) -> Result<Self, SdkError> {
        let (base_url, api_key) = match (&settings.api_url, &settings.api_key) {
            (Some(url), Some(key)) => (url.trim_end_matches('/').to_string(), key.clone()),
            _ => return Err(SdkError::Unavailable("missing api_url or api_key".to_string())),
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            base_url,
            api_key,
            client,
            handle,
        })
    }

    async fn post(&self, path: &[String], args: &[JsonValue]) -> Result<JsonValue, SdkError> {
        let url = format!("{}/call", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&CallRequest {
                path: path.join("."),
                args,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SdkError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: CallResponse = response.json().await?;
        Ok(body.result)
    }
}

impl SdkClient for HttpSdkClient {
    fn call(&self, path: &[String], args: &[JsonValue]) -> Result<JsonValue, SdkError> {
        self.handle.block_on(self.post(path, args))
    }
}

/* ===================== Lazy resolution ===================== */

/// Picks the real client or the stub on first use
pub struct LazyClient {
    settings: SdkSettings,
    skip_auth: bool,
    handle: Option<Handle>,
    resolved: OnceLock<Arc<dyn SdkClient>>,
}

impl LazyClient {
    pub fn new(settings: SdkSettings, skip_auth: bool, handle: Option<Handle>) -> Self {
        Self {
            settings,
            skip_auth,
            handle,
            resolved: OnceLock::new(),
        }
    }

    /// A client that always answers from the stub
    pub fn stub() -> Self {
        Self::new(SdkSettings::default(), true, None)
    }

    fn resolve(&self) -> &Arc<dyn SdkClient> {
        self.resolved.get_or_init(|| {
            if self.skip_auth {
                debug!("SDK auth skipped, using stub client");
                return Arc::new(StubClient);
            }
            if !self.settings.has_credentials() {
                debug!("no SDK credentials configured, using stub client");
                return Arc::new(StubClient);
            }
            let Some(handle) = self.handle.clone() else {
                warn!("no async runtime for the SDK client, using stub client");
                return Arc::new(StubClient);
            };
            match HttpSdkClient::new(&self.settings, handle) {
                Ok(client) => Arc::new(client),
                Err(e) => {
                    warn!(error = %e, "SDK client unavailable, using stub client");
                    Arc::new(StubClient)
                }
            }
        })
    }
}

impl fmt::Debug for LazyClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyClient")
            .field("skip_auth", &self.skip_auth)
            .field("resolved", &self.resolved.get().is_some())
            .finish()
    }
}

impl SdkClient for LazyClient {
    fn call(&self, path: &[String], args: &[JsonValue]) -> Result<JsonValue, SdkError> {
        self.resolve().call(path, args)
    }

    fn is_stub(&self) -> bool {
        self.resolve().is_stub()
    }
}

/* ===================== Script proxy ===================== */

/// A verb, or a path below one, as seen by scripts
#[derive(Debug)]
pub struct SdkVerb {
    client: Arc<dyn SdkClient>,
    path: Vec<String>,
}

impl SdkVerb {
    pub fn root(client: Arc<dyn SdkClient>, verb: &str) -> Self {
        Self {
            client,
            path: vec![verb.to_string()],
        }
    }
}

impl HostObject for SdkVerb {
    fn name(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or("sdk")
    }

    fn get(&self, key: &str) -> Option<Val> {
        let mut path = self.path.clone();
        path.push(key.to_string());
        Some(Val::Host(Arc::new(SdkVerb {
            client: self.client.clone(),
            path,
        })))
    }

    fn call(&self, _interp: &mut Interpreter, _this: &Val, args: Vec<Val>) -> EvalResult {
        let args: Vec<JsonValue> = args
            .iter()
            .map(|arg| val_to_json(arg).unwrap_or(JsonValue::Null))
            .collect();
        match self.client.call(&self.path, &args) {
            Ok(value) => Ok(json_to_val(&value)),
            Err(e) => Err(ErrorInfo::new("SdkError", format!("{}: {}", self.path.join("."), e)).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{Bindings, Evaluator, NoopObserver, ScriptEvaluator};

    fn run(source: &str) -> Val {
        let client: Arc<dyn SdkClient> = Arc::new(LazyClient::stub());
        let mut bindings = Bindings::new();
        for verb in SDK_VERBS {
            bindings.insert(verb.to_string(), Val::Host(Arc::new(SdkVerb::root(client.clone(), verb))));
        }
        ScriptEvaluator::new()
            .run(source, &bindings, &mut NoopObserver)
            .unwrap()
    }

    #[test]
    fn test_stub_outputs_are_tagged() {
        let value = run("await ai.summarize('hello')");
        assert_eq!(value.as_str(), Some("[STUB] ai.summarize(\"hello\")"));
    }

    #[test]
    fn test_nested_paths_and_stable_ids() {
        let first = run("db.users.find({ id: 1 }).id");
        let second = run("db.users.find({ id: 1 }).id");
        let other = run("db.users.find({ id: 2 }).id");
        assert_eq!(first.as_str(), second.as_str());
        assert_ne!(first.as_str(), other.as_str());
        assert!(first.as_str().is_some_and(|id| id.starts_with("stub_") && id.len() == 17));
    }

    #[test]
    fn test_list_returns_array() {
        let value = run("list.topics().length");
        assert_eq!(value.as_f64(), Some(3.0));
    }

    #[test]
    fn test_lazy_client_falls_back_without_credentials() {
        let client = LazyClient::new(SdkSettings::default(), false, None);
        assert!(client.is_stub());
    }

    #[test]
    fn test_verbs_are_functions() {
        assert_eq!(run("typeof send").as_str(), Some("function"));
    }
}
