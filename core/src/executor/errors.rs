//! Script-level error values
//!
//! Errors thrown inside a fragment are ordinary values; these helpers build
//! the ones raised by the runtime itself.

use serde::{Deserialize, Serialize};

pub const ERROR: &str = "Error";
pub const TYPE_ERROR: &str = "TypeError";
pub const REFERENCE_ERROR: &str = "ReferenceError";
pub const RANGE_ERROR: &str = "RangeError";
pub const SYNTAX_ERROR: &str = "SyntaxError";
/// Raised by `expect`/`assert`; counted separately from execution failures
pub const ASSERTION_ERROR: &str = "AssertionError";
pub const TIMEOUT_ERROR: &str = "TimeoutError";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub name: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ERROR, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(TYPE_ERROR, message)
    }

    pub fn reference_error(message: impl Into<String>) -> Self {
        Self::new(REFERENCE_ERROR, message)
    }

    pub fn range_error(message: impl Into<String>) -> Self {
        Self::new(RANGE_ERROR, message)
    }

    pub fn is_assertion(&self) -> bool {
        self.name == ASSERTION_ERROR
    }

    pub fn is_timeout(&self) -> bool {
        self.name == TIMEOUT_ERROR
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}: {}", self.name, self.message)
        }
    }
}
