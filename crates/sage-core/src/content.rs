//! Content-provider contract.
//!
//! The course system is an external collaborator: the engine only needs a
//! narrow `fetch_content` call that returns JSON-serializable structured
//! content. Truncation to a caller-supplied character budget is the
//! provider's job and must be reported via the `truncated` flag.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Structured content extracted for one course location.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredContent {
    /// Content kind ("text", "video", "problem", ...).
    pub content_type: String,
    /// Human-readable title of the unit.
    pub display_name: String,
    /// Extracted body, JSON-serializable.
    pub body: Value,
    /// Whether the body was truncated to fit a character budget.
    #[serde(default)]
    pub truncated: bool,
}

/// Errors from the content provider.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    /// The (course, location) pair does not exist.
    #[error("content not found: course={course_id} location={location_id}")]
    NotFound {
        /// Course identifier.
        course_id: String,
        /// Location identifier.
        location_id: String,
    },

    /// The caller is not allowed to read this content, or the extraction
    /// backend failed.
    #[error("content access error: {0}")]
    Access(String),
}

impl ContentError {
    /// Error category string for event emission.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Access(_) => "access",
        }
    }
}

/// Narrow interface to the course content system.
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Fetch structured content for a location.
    ///
    /// `max_chars`, when given, asks the provider to truncate the body and
    /// set [`StructuredContent::truncated`].
    async fn fetch_content(
        &self,
        course_id: &str,
        location_id: &str,
        max_chars: Option<usize>,
    ) -> Result<StructuredContent, ContentError>;
}
