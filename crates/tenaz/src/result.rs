//! Result and error types for Tenaz.
//!
//! The taxonomy mirrors how callers branch: `NotFound`, `Ambiguous`,
//! `StateMismatch` and `AllTiersExhausted` are the resolution/interaction
//! outcomes that mutating operations surface. Read-only operations never
//! return them; they collapse to `false`/`None` at the [`crate::Session`]
//! boundary.

use thiserror::Error;

/// Result type for Tenaz operations
pub type TenazResult<T> = Result<T, TenazError>;

/// Errors that can occur in Tenaz
#[derive(Debug, Error)]
pub enum TenazError {
    /// No candidate of a locator spec resolved to an actionable element
    #[error("No element found for '{target}' ({action}) after {attempts} attempt(s); candidates: {candidates}")]
    NotFound {
        /// Operation that needed the element
        action: String,
        /// Logical target description
        target: String,
        /// Rendered candidate list
        candidates: String,
        /// Number of full resolution passes
        attempts: u32,
    },

    /// Something matched, but ownership could not be decided
    #[error("Ambiguous match for '{target}': {reason}")]
    Ambiguous {
        /// Logical target description
        target: String,
        /// Why disambiguation failed
        reason: String,
    },

    /// An action was applied but the expected state was never observed
    #[error(
        "'{action}' on '{target}' did not reach {expected} within {timeout_ms}ms; \
         resolved by {resolved}; candidates: {candidates}"
    )]
    StateMismatch {
        /// Attempted action
        action: String,
        /// Logical target description
        target: String,
        /// Expected post-condition
        expected: String,
        /// Verification timeout in milliseconds
        timeout_ms: u64,
        /// Which candidate resolved the target, and after how many passes
        resolved: String,
        /// Rendered candidate list
        candidates: String,
    },

    /// Every escalation tier failed for an action
    #[error(
        "All tiers exhausted for '{action}' on '{target}': {failures}; \
         resolved by {resolved}; candidates: {candidates}"
    )]
    AllTiersExhausted {
        /// Attempted action
        action: String,
        /// Logical target description
        target: String,
        /// Which candidate resolved the target, and after how many passes
        resolved: String,
        /// Rendered candidate list
        candidates: String,
        /// Rendered per-tier failures
        failures: String,
    },

    /// Operation called in the wrong state (e.g. on a closed overlay)
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// Locator could not be built
    #[error("Invalid locator: {message}")]
    InvalidLocator {
        /// Error message
        message: String,
    },

    /// Remote page reported a failure
    #[error("Page error: {message}")]
    Page {
        /// Error message
        message: String,
    },

    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Configuration could not be loaded
    #[error("Config error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TenazError {
    /// Shorthand for a remote page failure
    pub fn page(message: impl Into<String>) -> Self {
        Self::Page {
            message: message.into(),
        }
    }

    /// Whether this error means "the thing is not there" rather than "it broke"
    #[must_use]
    pub const fn is_absence(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Ambiguous { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_carries_context() {
        let err = TenazError::NotFound {
            action: "click".into(),
            target: "save button".into(),
            candidates: "[0] role=button name~\"Save\"".into(),
            attempts: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("save button"));
        assert!(msg.contains("3 attempt"));
        assert!(msg.contains("role=button"));
        assert!(msg.contains("(click)"));
    }

    #[test]
    fn test_state_mismatch_message() {
        let err = TenazError::StateMismatch {
            action: "fill".into(),
            target: "coupon code".into(),
            expected: "value = \"SAVE10\"".into(),
            timeout_ms: 3000,
            resolved: "candidate [1] after 2 attempt(s)".into(),
            candidates: "[0] css=#code; [1] role=textbox".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("3000ms"));
        assert!(msg.contains("candidate [1] after 2 attempt(s)"));
        assert!(msg.contains("[1] role=textbox"));
    }

    #[test]
    fn test_is_absence() {
        assert!(TenazError::Ambiguous {
            target: "t".into(),
            reason: "r".into()
        }
        .is_absence());
        assert!(!TenazError::page("boom").is_absence());
    }
}
