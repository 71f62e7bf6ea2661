//! Process-wide console interception
//!
//! Script `console.*` calls go to a single, process-wide surface. While a
//! fragment runs, a [`ConsoleInterceptor`] redirects that surface into a sink
//! so output can be captured; dropping the interceptor restores the default
//! (stdout/stderr) on every exit path, including unwinding.
//!
//! Only one interceptor may be installed at a time across the whole process.
//! Installing a second one from another thread blocks until the first is
//! dropped; installing one from the thread that already holds it is an error
//! rather than a deadlock.

use std::cell::Cell;
use std::sync::Arc;

use parking_lot::{const_mutex, const_rwlock, Mutex, MutexGuard, RwLock};
use thiserror::Error;
use tracing::debug;

use crate::executor::Val;
use crate::formatter::{format_value, FormatOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleLevel {
    Log,
    Info,
    Warn,
    Error,
    Debug,
}

impl ConsoleLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsoleLevel::Log => "log",
            ConsoleLevel::Info => "info",
            ConsoleLevel::Warn => "warn",
            ConsoleLevel::Error => "error",
            ConsoleLevel::Debug => "debug",
        }
    }
}

/// Receives console calls while an interceptor is installed
pub type ConsoleSink = Arc<dyn Fn(ConsoleLevel, &[Val]) + Send + Sync>;

#[derive(Debug, Error)]
pub enum InterceptError {
    #[error("console is already intercepted by this thread")]
    Reentrant,
}

static INTERCEPT_LOCK: Mutex<()> = const_mutex(());
static SINK: RwLock<Option<ConsoleSink>> = const_rwlock(None);

thread_local! {
    static INTERCEPTING: Cell<bool> = const { Cell::new(false) };
}

/// Scope guard owning the console surface
pub struct ConsoleInterceptor {
    _lock: MutexGuard<'static, ()>,
}

impl ConsoleInterceptor {
    /// Redirect console output into `sink` until the guard is dropped
    pub fn install(sink: ConsoleSink) -> Result<Self, InterceptError> {
        if INTERCEPTING.with(Cell::get) {
            return Err(InterceptError::Reentrant);
        }
        let lock = INTERCEPT_LOCK.lock();
        INTERCEPTING.with(|flag| flag.set(true));
        *SINK.write() = Some(sink);
        debug!("console interception installed");
        Ok(Self { _lock: lock })
    }
}

impl Drop for ConsoleInterceptor {
    fn drop(&mut self) {
        *SINK.write() = None;
        INTERCEPTING.with(|flag| flag.set(false));
        debug!("console interception restored");
        // `_lock` is released after this body runs
    }
}

/// Whether an interceptor is currently installed anywhere in the process
pub fn is_intercepted() -> bool {
    SINK.read().is_some()
}

/// Route one console call to the active sink, or to stdout/stderr
pub fn emit(level: ConsoleLevel, args: &[Val]) {
    let sink = SINK.read().clone();
    match sink {
        Some(sink) => sink(level, args),
        None => {
            let line = render_args(args);
            match level {
                ConsoleLevel::Warn | ConsoleLevel::Error => eprintln!("{}", line),
                _ => println!("{}", line),
            }
        }
    }
}

/// Text of one console call: strings verbatim, other values formatted
pub fn render_args(args: &[Val]) -> String {
    let options = FormatOptions::default();
    args.iter()
        .map(|arg| match arg {
            Val::Str(s) => s.clone(),
            other => format_value(other, &options),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
