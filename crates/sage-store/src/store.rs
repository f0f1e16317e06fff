//! The [`SubmissionStore`] trait — the single persistence contract the
//! runtime depends on.
//!
//! Methods are synchronous: both backends complete in-process or against a
//! local `SQLite` file, and the runtime calls them between suspension
//! points.

use sage_core::ChatMessage;
use serde_json::Value;

use crate::errors::Result;
use crate::types::{SessionRow, SubmissionRow};

/// Persistence contract for sessions and the submission chain.
pub trait SubmissionStore: Send + Sync {
    /// Find the session for a (user, scope, profile) triple.
    fn find_session(
        &self,
        user_id: &str,
        scope_id: &str,
        profile_slug: &str,
    ) -> Result<Option<SessionRow>>;

    /// Find or lazily create the session for a triple.
    fn get_or_create_session(
        &self,
        user_id: &str,
        scope_id: &str,
        profile_slug: &str,
    ) -> Result<SessionRow>;

    /// Load a session by id.
    fn get_session(&self, session_id: &str) -> Result<SessionRow>;

    /// Delete a session and its submissions.
    fn delete_session(&self, session_id: &str) -> Result<()>;

    /// Replace the session's metadata map as a whole (last writer wins).
    fn update_metadata(&self, session_id: &str, metadata: &Value) -> Result<()>;

    /// Record the provider-side conversation id.
    fn set_remote_thread(&self, session_id: &str, remote_thread_id: &str) -> Result<()>;

    /// Append an immutable submission and advance the session's chain head.
    fn append_submission(
        &self,
        session_id: &str,
        messages: &[ChatMessage],
    ) -> Result<SubmissionRow>;

    /// Load one submission.
    fn get_submission(&self, submission_id: &str) -> Result<SubmissionRow>;

    /// Load several submissions, preserving the requested order. Ids that no
    /// longer exist are skipped (the chain tolerates pruned history).
    fn get_submissions(&self, submission_ids: &[String]) -> Result<Vec<SubmissionRow>>;
}
