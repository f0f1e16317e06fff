//! The stable failure shape returned to callers.
//!
//! Every failure path in the engine converges on [`ActionFailure`]: a JSON
//! object with `status` and `error` fields. Nothing downstream of the
//! dispatcher boundary should ever surface as a panic or an unstructured
//! error string.

use serde::{Deserialize, Serialize};

/// Discriminates user-correctable failures from processing failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStatus {
    /// Nothing resolves for the request (404-equivalent). Not retried.
    NotFound,
    /// User-correctable input or configuration problem (400-equivalent).
    Validation,
    /// Engine or collaborator fault (500-equivalent).
    Processing,
}

impl FailureStatus {
    /// Wire string representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Validation => "validation",
            Self::Processing => "processing",
        }
    }
}

impl std::fmt::Display for FailureStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure result returned to the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionFailure {
    /// Failure class.
    pub status: FailureStatus,
    /// Human-readable description. For validation failures this carries the
    /// full violation list, never a partial report.
    pub error: String,
}

impl ActionFailure {
    /// A 404-equivalent failure.
    pub fn not_found(error: impl Into<String>) -> Self {
        Self {
            status: FailureStatus::NotFound,
            error: error.into(),
        }
    }

    /// A user-correctable failure.
    pub fn validation(error: impl Into<String>) -> Self {
        Self {
            status: FailureStatus::Validation,
            error: error.into(),
        }
    }

    /// A processing failure.
    pub fn processing(error: impl Into<String>) -> Self {
        Self {
            status: FailureStatus::Processing,
            error: error.into(),
        }
    }
}
