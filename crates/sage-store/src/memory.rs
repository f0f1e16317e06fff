//! In-memory [`SubmissionStore`] backend for tests and ephemeral use.
//!
//! A single mutex guards all maps so `get_or_create_session` stays atomic
//! with respect to the uniqueness invariant.

use std::collections::HashMap;

use parking_lot::Mutex;
use sage_core::ChatMessage;
use serde_json::Value;

use crate::errors::{Result, StoreError};
use crate::store::SubmissionStore;
use crate::types::{SessionRow, SubmissionRow};

#[derive(Default)]
struct Inner {
    sessions: HashMap<String, SessionRow>,
    /// (user, scope, profile) → session id.
    by_identity: HashMap<(String, String, String), String>,
    submissions: HashMap<String, SubmissionRow>,
}

/// In-memory store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored submissions (test helper).
    pub fn submission_count(&self) -> usize {
        self.inner.lock().submissions.len()
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl SubmissionStore for MemoryStore {
    fn find_session(
        &self,
        user_id: &str,
        scope_id: &str,
        profile_slug: &str,
    ) -> Result<Option<SessionRow>> {
        let inner = self.inner.lock();
        let key = (
            user_id.to_string(),
            scope_id.to_string(),
            profile_slug.to_string(),
        );
        Ok(inner
            .by_identity
            .get(&key)
            .and_then(|id| inner.sessions.get(id))
            .cloned())
    }

    fn get_or_create_session(
        &self,
        user_id: &str,
        scope_id: &str,
        profile_slug: &str,
    ) -> Result<SessionRow> {
        let mut inner = self.inner.lock();
        let key = (
            user_id.to_string(),
            scope_id.to_string(),
            profile_slug.to_string(),
        );
        if let Some(id) = inner.by_identity.get(&key) {
            let id = id.clone();
            return inner
                .sessions
                .get(&id)
                .cloned()
                .ok_or_else(|| StoreError::SessionNotFound(id));
        }

        let timestamp = now();
        let session = SessionRow {
            id: uuid::Uuid::now_v7().to_string(),
            user_id: user_id.to_string(),
            scope_id: scope_id.to_string(),
            profile_slug: profile_slug.to_string(),
            latest_submission_id: None,
            remote_thread_id: None,
            metadata: Value::Object(serde_json::Map::new()),
            created_at: timestamp.clone(),
            updated_at: timestamp,
        };
        let _ = inner.by_identity.insert(key, session.id.clone());
        let _ = inner.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    fn get_session(&self, session_id: &str) -> Result<SessionRow> {
        self.inner
            .lock()
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))
    }

    fn delete_session(&self, session_id: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        let Some(session) = inner.sessions.remove(session_id) else {
            return Err(StoreError::SessionNotFound(session_id.to_string()));
        };
        let _ = inner.by_identity.remove(&(
            session.user_id.clone(),
            session.scope_id.clone(),
            session.profile_slug.clone(),
        ));
        inner.submissions.retain(|_, s| s.session_id != session_id);
        Ok(())
    }

    fn update_metadata(&self, session_id: &str, metadata: &Value) -> Result<()> {
        let mut inner = self.inner.lock();
        let session = inner
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))?;
        session.metadata = metadata.clone();
        session.updated_at = now();
        Ok(())
    }

    fn set_remote_thread(&self, session_id: &str, remote_thread_id: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        let session = inner
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))?;
        session.remote_thread_id = Some(remote_thread_id.to_string());
        session.updated_at = now();
        Ok(())
    }

    fn append_submission(
        &self,
        session_id: &str,
        messages: &[ChatMessage],
    ) -> Result<SubmissionRow> {
        let mut inner = self.inner.lock();
        if !inner.sessions.contains_key(session_id) {
            return Err(StoreError::SessionNotFound(session_id.to_string()));
        }
        let submission = SubmissionRow {
            id: uuid::Uuid::now_v7().to_string(),
            session_id: session_id.to_string(),
            messages: messages.to_vec(),
            created_at: now(),
        };
        let _ = inner
            .submissions
            .insert(submission.id.clone(), submission.clone());
        if let Some(session) = inner.sessions.get_mut(session_id) {
            session.latest_submission_id = Some(submission.id.clone());
            session.updated_at = now();
        }
        Ok(submission)
    }

    fn get_submission(&self, submission_id: &str) -> Result<SubmissionRow> {
        self.inner
            .lock()
            .submissions
            .get(submission_id)
            .cloned()
            .ok_or_else(|| StoreError::SubmissionNotFound(submission_id.to_string()))
    }

    fn get_submissions(&self, submission_ids: &[String]) -> Result<Vec<SubmissionRow>> {
        let inner = self.inner.lock();
        Ok(submission_ids
            .iter()
            .filter_map(|id| inner.submissions.get(id).cloned())
            .collect())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn get_or_create_is_idempotent_per_triple() {
        let store = MemoryStore::new();
        let a = store.get_or_create_session("u", "s", "p").unwrap();
        let b = store.get_or_create_session("u", "s", "p").unwrap();
        assert_eq!(a.id, b.id);

        let c = store.get_or_create_session("u", "s", "other").unwrap();
        assert_ne!(a.id, c.id);
    }

    #[test]
    fn append_advances_chain_head() {
        let store = MemoryStore::new();
        let session = store.get_or_create_session("u", "s", "p").unwrap();
        let sub = store
            .append_submission(&session.id, &[ChatMessage::user("hi")])
            .unwrap();
        let reloaded = store.get_session(&session.id).unwrap();
        assert_eq!(reloaded.latest_submission_id.as_deref(), Some(sub.id.as_str()));
    }

    #[test]
    fn delete_removes_session_and_submissions() {
        let store = MemoryStore::new();
        let session = store.get_or_create_session("u", "s", "p").unwrap();
        let sub = store
            .append_submission(&session.id, &[ChatMessage::user("hi")])
            .unwrap();

        store.delete_session(&session.id).unwrap();
        assert_matches!(
            store.get_session(&session.id),
            Err(StoreError::SessionNotFound(_))
        );
        assert_matches!(
            store.get_submission(&sub.id),
            Err(StoreError::SubmissionNotFound(_))
        );
        // The triple is free again.
        let fresh = store.get_or_create_session("u", "s", "p").unwrap();
        assert_ne!(fresh.id, session.id);
    }

    #[test]
    fn metadata_is_replaced_whole() {
        let store = MemoryStore::new();
        let session = store.get_or_create_session("u", "s", "p").unwrap();
        store
            .update_metadata(&session.id, &serde_json::json!({"runStatus": "processing"}))
            .unwrap();
        store
            .update_metadata(&session.id, &serde_json::json!({"runStatus": "completed"}))
            .unwrap();
        let reloaded = store.get_session(&session.id).unwrap();
        assert_eq!(reloaded.metadata["runStatus"], "completed");
    }

    #[test]
    fn missing_submissions_are_skipped() {
        let store = MemoryStore::new();
        let session = store.get_or_create_session("u", "s", "p").unwrap();
        let sub = store
            .append_submission(&session.id, &[ChatMessage::user("hi")])
            .unwrap();
        let found = store
            .get_submissions(&[sub.id.clone(), "gone".to_string()])
            .unwrap();
        assert_eq!(found.len(), 1);
    }
}
