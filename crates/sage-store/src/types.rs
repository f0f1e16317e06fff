//! Row types persisted by the store.

use sage_core::ChatMessage;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One conversation session.
///
/// Uniqueness invariant: at most one session exists per
/// (`user_id`, `scope_id`, `profile_slug`) triple. The metadata map is the
/// side channel for async run status and artifact locations; it is
/// read-modify-written as a whole (last writer wins).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRow {
    /// Unique session id (UUID v7).
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Scope the session was created under.
    pub scope_id: String,
    /// Profile the session was created under.
    pub profile_slug: String,
    /// Latest locally-persisted submission, head of the chain.
    pub latest_submission_id: Option<String>,
    /// Latest provider-side conversation id, for providers with native
    /// threading.
    pub remote_thread_id: Option<String>,
    /// Free-form metadata map (async task status, side-channel results).
    pub metadata: Value,
    /// ISO 8601 creation timestamp.
    pub created_at: String,
    /// ISO 8601 last-mutation timestamp.
    pub updated_at: String,
}

/// One immutable, chained chunk of a conversation transcript.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRow {
    /// Unique submission id (UUID v7).
    pub id: String,
    /// Session this submission belongs to.
    pub session_id: String,
    /// Role-tagged messages, including the trailing chain marker.
    pub messages: Vec<ChatMessage>,
    /// ISO 8601 creation timestamp.
    pub created_at: String,
}
