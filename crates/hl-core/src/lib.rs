//! Shared primitives used across Hintline crates.

use core::fmt;

/// Result alias used across the workspace.
pub type HintResult<T> = Result<T, HintError>;

/// Workspace error: a stable dotted code plus a human readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HintError {
    pub code: &'static str,
    pub message: String,
}

impl HintError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Returns true when the code belongs to `family` (`"parse"` matches `parse.*`).
    pub fn is_in(&self, family: &str) -> bool {
        self.code
            .split_once('.')
            .is_some_and(|(prefix, _)| prefix == family)
    }
}

impl fmt::Display for HintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for HintError {}
