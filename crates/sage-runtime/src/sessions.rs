//! Session transcript management over the submission chain.
//!
//! A conversation is stored as immutable submissions. Each submission ends
//! with a chain-marker message listing all prior submission ids, so the
//! whole chain is reconstructable from the head in one batched read.
//! Reconstruction strips system messages (prompts are re-injected per turn,
//! never replayed) and drops exact duplicates within a submission.

use std::collections::HashSet;
use std::sync::Arc;

use sage_core::{ChatMessage, Role, normalize_content};
use sage_store::{Result as StoreResult, SessionRow, StoreError, SubmissionRow, SubmissionStore};
use tracing::{debug, warn};

use crate::types::HistoryPage;

/// Reconstructs, pages, and appends session transcripts.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SubmissionStore>,
    max_context_messages: usize,
}

impl SessionManager {
    /// Create a manager with the given pagination window.
    pub fn new(store: Arc<dyn SubmissionStore>, max_context_messages: usize) -> Self {
        Self {
            store,
            max_context_messages,
        }
    }

    /// Find the session for a (user, scope, profile) triple, if one exists.
    pub fn find(
        &self,
        user_id: &str,
        scope_id: &str,
        profile_slug: &str,
    ) -> StoreResult<Option<SessionRow>> {
        self.store.find_session(user_id, scope_id, profile_slug)
    }

    /// Find or lazily create the session for a triple.
    pub fn get_or_create(
        &self,
        user_id: &str,
        scope_id: &str,
        profile_slug: &str,
    ) -> StoreResult<SessionRow> {
        self.store
            .get_or_create_session(user_id, scope_id, profile_slug)
    }

    /// Delete a session and its transcript.
    pub fn clear(&self, session_id: &str) -> StoreResult<()> {
        debug!(session_id, "clearing session");
        self.store.delete_session(session_id)
    }

    /// Rebuild the full conversation transcript, chronological order.
    ///
    /// System messages (including chain markers) are stripped; duplicates
    /// within a single submission are dropped.
    pub fn reconstruct(&self, session: &SessionRow) -> StoreResult<Vec<ChatMessage>> {
        let Some(latest_id) = session.latest_submission_id.as_deref() else {
            return Ok(Vec::new());
        };
        let latest = match self.store.get_submission(latest_id) {
            Ok(row) => row,
            Err(StoreError::SubmissionNotFound(_)) => {
                // Pruned head; the transcript is effectively empty.
                warn!(session_id = %session.id, latest_id, "chain head missing");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let prior_ids = chain_ids_of(&latest).unwrap_or_default();
        let mut chain = self.store.get_submissions(&prior_ids)?;
        chain.push(latest);

        let mut transcript = Vec::new();
        for submission in &chain {
            let mut seen = HashSet::with_capacity(submission.messages.len());
            for message in &submission.messages {
                if message.role == Role::System {
                    continue;
                }
                let key = (message.role, message.content.to_string());
                if seen.insert(key) {
                    transcript.push(message.clone());
                }
            }
        }
        Ok(transcript)
    }

    /// The most recent window of the transcript.
    pub fn initial_history(&self, session: &SessionRow) -> StoreResult<HistoryPage> {
        let full = self.reconstruct(session)?;
        let start = full.len().saturating_sub(self.max_context_messages);
        Ok(HistoryPage {
            messages: full[start..].to_vec(),
            has_more: start > 0,
        })
    }

    /// The window immediately preceding the `already_shown` most recent
    /// messages. Exhausted history yields an empty page with
    /// `has_more = false`.
    pub fn older_messages(
        &self,
        session: &SessionRow,
        already_shown: usize,
    ) -> StoreResult<HistoryPage> {
        let full = self.reconstruct(session)?;
        if already_shown >= full.len() {
            return Ok(HistoryPage {
                messages: Vec::new(),
                has_more: false,
            });
        }
        let end = full.len() - already_shown;
        let start = end.saturating_sub(self.max_context_messages);
        Ok(HistoryPage {
            messages: full[start..end].to_vec(),
            has_more: start > 0,
        })
    }

    /// Append one turn as a new submission: contents normalized, chain
    /// marker (all prior submission ids plus the current head) trailing.
    pub fn append_turn(
        &self,
        session: &SessionRow,
        messages: Vec<ChatMessage>,
    ) -> StoreResult<SubmissionRow> {
        let prior_ids = self.accumulated_ids(session)?;
        let mut persisted: Vec<ChatMessage> = messages
            .into_iter()
            .map(|m| ChatMessage {
                role: m.role,
                content: normalize_content(&m.content),
            })
            .collect();
        persisted.push(ChatMessage::chain_marker(&prior_ids));
        self.store.append_submission(&session.id, &persisted)
    }

    /// All prior submission ids for the next marker: the current head's
    /// marker ids plus the head itself.
    fn accumulated_ids(&self, session: &SessionRow) -> StoreResult<Vec<String>> {
        let Some(latest_id) = session.latest_submission_id.clone() else {
            return Ok(Vec::new());
        };
        match self.store.get_submission(&latest_id) {
            Ok(latest) => {
                let mut ids = chain_ids_of(&latest).unwrap_or_default();
                ids.push(latest_id);
                Ok(ids)
            }
            Err(StoreError::SubmissionNotFound(_)) => {
                warn!(session_id = %session.id, latest_id = %latest_id, "chain head missing, starting fresh marker");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}

/// The marker ids of a submission, read from its trailing message.
fn chain_ids_of(submission: &SubmissionRow) -> Option<Vec<String>> {
    submission
        .messages
        .iter()
        .rev()
        .find_map(ChatMessage::chain_ids)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use sage_store::MemoryStore;
    use serde_json::json;

    fn manager(window: usize) -> (SessionManager, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (
            SessionManager::new(Arc::clone(&store) as Arc<dyn SubmissionStore>, window),
            store,
        )
    }

    fn turn(n: usize) -> Vec<ChatMessage> {
        vec![
            ChatMessage::user(format!("question {n}")),
            ChatMessage::assistant(format!("answer {n}")),
        ]
    }

    #[test]
    fn empty_session_reconstructs_empty() {
        let (manager, _) = manager(10);
        let session = manager.get_or_create("u", "s", "p").unwrap();
        assert!(manager.reconstruct(&session).unwrap().is_empty());
        let page = manager.initial_history(&session).unwrap();
        assert!(page.messages.is_empty());
        assert!(!page.has_more);
    }

    #[test]
    fn append_then_reconstruct_round_trips() {
        let (manager, _) = manager(10);
        let mut session = manager.get_or_create("u", "s", "p").unwrap();
        for n in 0..3 {
            let _ = manager.append_turn(&session, turn(n)).unwrap();
            session = manager.get_or_create("u", "s", "p").unwrap();
        }

        let transcript = manager.reconstruct(&session).unwrap();
        assert_eq!(transcript.len(), 6);
        assert_eq!(transcript[0].text(), "question 0");
        assert_eq!(transcript[5].text(), "answer 2");
        // Markers and system messages never surface.
        assert!(transcript.iter().all(|m| m.role != Role::System));
    }

    #[test]
    fn marker_accumulates_all_prior_ids() {
        let (manager, store) = manager(10);
        let mut session = manager.get_or_create("u", "s", "p").unwrap();
        let mut ids = Vec::new();
        for n in 0..3 {
            let submission = manager.append_turn(&session, turn(n)).unwrap();
            ids.push(submission.id.clone());
            session = manager.get_or_create("u", "s", "p").unwrap();
        }

        let head = store.get_submission(&ids[2]).unwrap();
        assert_eq!(chain_ids_of(&head), Some(ids[..2].to_vec()));
    }

    #[test]
    fn repeated_message_across_turns_survives() {
        let (manager, _) = manager(10);
        let mut session = manager.get_or_create("u", "s", "p").unwrap();
        let repeat = || {
            vec![
                ChatMessage::user("again"),
                ChatMessage::assistant("same answer"),
            ]
        };
        let _ = manager.append_turn(&session, repeat()).unwrap();
        session = manager.get_or_create("u", "s", "p").unwrap();
        let _ = manager.append_turn(&session, repeat()).unwrap();
        session = manager.get_or_create("u", "s", "p").unwrap();

        // Dedupe applies within a submission, not across the chain.
        assert_eq!(manager.reconstruct(&session).unwrap().len(), 4);
    }

    #[test]
    fn duplicate_within_a_turn_is_dropped() {
        let (manager, _) = manager(10);
        let mut session = manager.get_or_create("u", "s", "p").unwrap();
        let _ = manager
            .append_turn(
                &session,
                vec![
                    ChatMessage::user("echo"),
                    ChatMessage::user("echo"),
                    ChatMessage::assistant("reply"),
                ],
            )
            .unwrap();
        session = manager.get_or_create("u", "s", "p").unwrap();
        assert_eq!(manager.reconstruct(&session).unwrap().len(), 2);
    }

    #[test]
    fn append_normalizes_content() {
        let (manager, store) = manager(10);
        let session = manager.get_or_create("u", "s", "p").unwrap();
        let submission = manager
            .append_turn(
                &session,
                vec![ChatMessage {
                    role: Role::User,
                    content: json!({"not": "a string"}),
                }],
            )
            .unwrap();
        let stored = store.get_submission(&submission.id).unwrap();
        assert!(stored.messages[0].content.is_string());
    }

    #[test]
    fn pagination_walks_a_25_message_transcript_in_tens() {
        let (manager, _) = manager(10);
        let mut session = manager.get_or_create("u", "s", "p").unwrap();
        // 12 turns of 2 plus one lone user message = 25 messages.
        for n in 0..12 {
            let _ = manager.append_turn(&session, turn(n)).unwrap();
            session = manager.get_or_create("u", "s", "p").unwrap();
        }
        let _ = manager
            .append_turn(&session, vec![ChatMessage::user("trailing")])
            .unwrap();
        session = manager.get_or_create("u", "s", "p").unwrap();

        let full = manager.reconstruct(&session).unwrap();
        assert_eq!(full.len(), 25);

        let first = manager.initial_history(&session).unwrap();
        assert_eq!(first.messages, full[15..].to_vec());
        assert!(first.has_more);

        let second = manager.older_messages(&session, 10).unwrap();
        assert_eq!(second.messages, full[5..15].to_vec());
        assert!(second.has_more);

        let third = manager.older_messages(&session, 20).unwrap();
        assert_eq!(third.messages, full[..5].to_vec());
        assert!(!third.has_more);

        let exhausted = manager.older_messages(&session, 25).unwrap();
        assert!(exhausted.messages.is_empty());
        assert!(!exhausted.has_more);
    }

    #[test]
    fn clear_forgets_the_transcript() {
        let (manager, _) = manager(10);
        let mut session = manager.get_or_create("u", "s", "p").unwrap();
        let _ = manager.append_turn(&session, turn(0)).unwrap();
        session = manager.get_or_create("u", "s", "p").unwrap();
        assert!(session.latest_submission_id.is_some());

        manager.clear(&session.id).unwrap();
        let fresh = manager.get_or_create("u", "s", "p").unwrap();
        assert_ne!(fresh.id, session.id);
        assert!(fresh.latest_submission_id.is_none());
    }
}
