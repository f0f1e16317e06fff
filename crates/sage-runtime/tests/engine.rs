//! End-to-end engine tests: catalog + templates + registry + collaborators
//! wired the way a deployment would wire them, driven through the
//! dispatcher boundary only.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use sage_config::{
    ConfigResolver, Profile, Scope, ServiceVariant, TemplateRoots, WorkflowCatalog,
};
use sage_core::{
    ContentError, ContentProvider, EventEmitter, FailureStatus, StructuredContent,
};
use sage_llm::ScriptedProvider;
use sage_store::{MemoryStore, SubmissionStore};
use sage_runtime::{
    DispatchRequest, Dispatcher, ExecutionContext, OrchestratorRegistry, RunOutcome,
    RuntimeSettings, TokioTaskQueue,
};
use serde_json::{Value, json};

struct CourseContent;

#[async_trait]
impl ContentProvider for CourseContent {
    async fn fetch_content(
        &self,
        course_id: &str,
        location_id: &str,
        max_chars: Option<usize>,
    ) -> Result<StructuredContent, ContentError> {
        if location_id.contains("missing") {
            return Err(ContentError::NotFound {
                course_id: course_id.to_string(),
                location_id: location_id.to_string(),
            });
        }
        let body = "Mitochondria are the powerhouse of the cell.";
        let truncated = max_chars.is_some_and(|n| body.len() > n);
        Ok(StructuredContent {
            content_type: "text".into(),
            display_name: format!("Unit {location_id}"),
            body: json!(body),
            truncated,
        })
    }
}

struct Harness {
    dispatcher: Dispatcher,
    store: Arc<MemoryStore>,
    emitter: Arc<EventEmitter>,
    _templates: tempfile::TempDir,
}

fn harness(provider: Arc<ScriptedProvider>) -> Harness {
    let templates = tempfile::tempdir().unwrap();
    std::fs::write(
        templates.path().join("summary.json"),
        r#"{
            // stateless summarization flow
            "orchestrator_class": "summary",
            "processor_config": {
                "summary": {"prompt": "Summarize this unit.", "model": "scripted-1"}
            }
        }"#,
    )
    .unwrap();
    std::fs::write(
        templates.path().join("stream_summary.json"),
        r#"{
            "orchestrator_class": "stream_summary",
            "processor_config": {"summary": {}}
        }"#,
    )
    .unwrap();
    std::fs::write(
        templates.path().join("chat.json"),
        r#"{
            "orchestrator_class": "chat",
            "processor_config": {"chat": {"prompt": "Help the learner."}}
        }"#,
    )
    .unwrap();
    std::fs::write(
        templates.path().join("async_chat.json"),
        r#"{
            "orchestrator_class": "async_chat",
            "processor_config": {"chat": {}}
        }"#,
    )
    .unwrap();
    std::fs::write(
        templates.path().join("unregistered.json"),
        r#"{"orchestrator_class": "mystery", "processor_config": {"x": {}}}"#,
    )
    .unwrap();

    let mut catalog = WorkflowCatalog::new();
    for (slug, template) in [
        ("global-summary", "summary.json"),
        ("streamy", "stream_summary.json"),
        ("tutor", "chat.json"),
        ("deferred", "async_chat.json"),
        ("mystery", "unregistered.json"),
    ] {
        catalog.add_profile(Profile {
            slug: slug.into(),
            description: String::new(),
            base_filepath: template.into(),
            content_patch: json!({}),
        });
    }
    // Global default plus course- and location-specific scopes.
    catalog.add_scope(scope("s-global", None, None, "global-summary"));
    catalog.add_scope(scope(
        "s-stream",
        Some("stream_unit"),
        Some("course-bio"),
        "streamy",
    ));
    catalog.add_scope(scope("s-chat", Some("chat_unit"), Some("course-bio"), "tutor"));
    catalog.add_scope(scope(
        "s-async",
        Some("async_unit"),
        Some("course-bio"),
        "deferred",
    ));
    catalog.add_scope(scope(
        "s-mystery",
        Some("mystery_unit"),
        Some("course-bio"),
        "mystery",
    ));

    let store = Arc::new(MemoryStore::new());
    let emitter = Arc::new(EventEmitter::new());
    let queue = Arc::new(TokioTaskQueue::new(
        Arc::clone(&store) as Arc<dyn SubmissionStore>,
        Duration::from_secs(5),
    ));
    let ctx = Arc::new(ExecutionContext::new(
        Arc::new(CourseContent),
        provider,
        Arc::clone(&store) as Arc<dyn SubmissionStore>,
        queue,
        Arc::clone(&emitter),
        RuntimeSettings {
            max_context_messages: 10,
            ..RuntimeSettings::default()
        },
    ));
    let dispatcher = Dispatcher::new(
        catalog,
        ConfigResolver::new(TemplateRoots::single(templates.path())),
        OrchestratorRegistry::with_builtins().unwrap(),
        ctx,
    );
    Harness {
        dispatcher,
        store,
        emitter,
        _templates: templates,
    }
}

fn scope(id: &str, pattern: Option<&str>, course: Option<&str>, profile: &str) -> Scope {
    Scope {
        id: id.into(),
        location_regex: pattern.map(String::from),
        course_id: course.map(String::from),
        service_variant: ServiceVariant::Primary,
        profile: profile.into(),
        enabled: true,
    }
}

fn request(course: &str, location: &str, action: &str, input: Option<&str>) -> DispatchRequest {
    DispatchRequest {
        user_id: "learner-1".into(),
        service_variant: ServiceVariant::Primary,
        course_id: course.into(),
        location_id: location.into(),
        action: action.into(),
        input: input.map(String::from),
        params: json!({}),
    }
}

#[tokio::test]
async fn global_default_fallback_summarizes_any_course() {
    let h = harness(ScriptedProvider::new(["the unit explains mitochondria"]));
    let mut events = h.emitter.subscribe();

    let outcome = h
        .dispatcher
        .dispatch(request("course-unknown", "any_unit", "summarize", None))
        .await;
    let result = outcome.as_completed().expect("summary should complete");
    assert_eq!(result.status, "completed");
    assert!(!result.response.as_deref().unwrap().is_empty());
    assert!(result.tokens_used.unwrap() > 0);

    let resolved = events.recv().await.unwrap();
    assert_eq!(resolved.name, "workflow.resolved");
    assert_eq!(resolved.profile_name.as_deref(), Some("global-summary"));
    let finished = events.recv().await.unwrap();
    assert_eq!(finished.name, "run.completed");
}

#[tokio::test]
async fn unmatched_variant_is_not_found() {
    let h = harness(ScriptedProvider::new(["unused"]));
    let mut req = request("course-bio", "unit", "summarize", None);
    req.service_variant = ServiceVariant::Authoring;

    let outcome = h.dispatcher.dispatch(req).await;
    let failure = outcome.as_failed().expect("no authoring scope configured");
    assert_eq!(failure.status, FailureStatus::NotFound);
}

#[tokio::test]
async fn missing_content_is_a_validation_failure() {
    let h = harness(ScriptedProvider::new(["unused"]));
    let outcome = h
        .dispatcher
        .dispatch(request("course-bio", "missing_unit", "summarize", None))
        .await;
    let failure = outcome.as_failed().unwrap();
    assert_eq!(failure.status, FailureStatus::Validation);
    assert!(failure.error.contains("missing_unit"));
}

#[tokio::test]
async fn unregistered_class_is_a_processing_failure() {
    let h = harness(ScriptedProvider::new(["unused"]));
    let outcome = h
        .dispatcher
        .dispatch(request("course-bio", "mystery_unit", "run", None))
        .await;
    let failure = outcome.as_failed().unwrap();
    assert_eq!(failure.status, FailureStatus::Processing);
    assert!(failure.error.contains("mystery"));
}

#[tokio::test]
async fn streaming_summary_emits_deltas_then_done() {
    let h = harness(ScriptedProvider::new(["a streamed biology summary"]));
    let outcome = h
        .dispatcher
        .dispatch(request("course-bio", "stream_unit_1", "summarize", None))
        .await;
    let RunOutcome::Streaming(stream) = outcome else {
        panic!("expected a stream");
    };
    let chunks: Vec<_> = stream.collect().await;
    assert!(chunks.len() > 1);
    let text: String = chunks
        .iter()
        .filter_map(|c| c.as_ref().ok().and_then(|c| c.delta_text()))
        .collect();
    assert_eq!(text, "a streamed biology summary");
    assert!(chunks.last().unwrap().as_ref().unwrap().is_done());
}

#[tokio::test]
async fn undrained_stream_holds_the_session_slot() {
    let h = harness(ScriptedProvider::new(["one", "two"]));
    let held = h
        .dispatcher
        .dispatch(request("course-bio", "stream_unit_1", "summarize", None))
        .await;
    assert!(matches!(held, RunOutcome::Streaming(_)));

    let busy = h
        .dispatcher
        .dispatch(request("course-bio", "stream_unit_1", "summarize", None))
        .await;
    let failure = busy.as_failed().expect("second run should be rejected");
    assert_eq!(failure.status, FailureStatus::Validation);
    assert!(failure.error.contains("busy"));

    // Dropping the stream releases the slot.
    drop(held);
    let retry = h
        .dispatcher
        .dispatch(request("course-bio", "stream_unit_1", "summarize", None))
        .await;
    assert!(matches!(retry, RunOutcome::Streaming(_)));
}

#[tokio::test]
async fn chat_round_trip_and_history_walk() {
    let replies: Vec<String> = (0..13).map(|n| format!("reply {n}")).collect();
    let h = harness(ScriptedProvider::new(replies));

    // 12 turns of 2 messages each, then a no-input read: 24 persisted.
    for n in 0..12 {
        let outcome = h
            .dispatcher
            .dispatch(request(
                "course-bio",
                "chat_unit_1",
                "chat",
                Some(&format!("question {n}")),
            ))
            .await;
        assert!(outcome.as_completed().is_some(), "turn {n} failed");
    }

    let first = h
        .dispatcher
        .dispatch(request("course-bio", "chat_unit_1", "chat_history", None))
        .await;
    let page = first
        .as_completed()
        .unwrap()
        .history
        .clone()
        .unwrap();
    assert_eq!(page.messages.len(), 10);
    assert!(page.has_more);
    assert_eq!(page.messages.last().unwrap().text(), "reply 11");

    let mut older = request("course-bio", "chat_unit_1", "chat_history", None);
    older.params = json!({"alreadyShown": 10});
    let second = h.dispatcher.dispatch(older).await;
    let page = second
        .as_completed()
        .unwrap()
        .history
        .clone()
        .unwrap();
    assert_eq!(page.messages.len(), 10);
    assert!(page.has_more);

    let mut last = request("course-bio", "chat_unit_1", "chat_history", None);
    last.params = json!({"alreadyShown": 20});
    let third = h.dispatcher.dispatch(last).await;
    let page = third.as_completed().unwrap().history.clone().unwrap();
    assert_eq!(page.messages.len(), 4);
    assert!(!page.has_more);
}

#[tokio::test]
async fn clear_session_resets_the_transcript() {
    let h = harness(ScriptedProvider::new(["a reply"]));
    let _ = h
        .dispatcher
        .dispatch(request("course-bio", "chat_unit_1", "chat", Some("hello")))
        .await;
    assert_eq!(h.store.submission_count(), 1);

    let cleared = h
        .dispatcher
        .dispatch(request("course-bio", "chat_unit_1", "clear_session", None))
        .await;
    assert_eq!(cleared.as_completed().unwrap().status, "cleared");

    let history = h
        .dispatcher
        .dispatch(request("course-bio", "chat_unit_1", "chat_history", None))
        .await;
    let page = history
        .as_completed()
        .unwrap()
        .history
        .clone()
        .unwrap();
    assert!(page.messages.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn deferred_chat_settles_through_run_status() {
    let h = harness(ScriptedProvider::new(["deferred biology answer"]));
    let outcome = h
        .dispatcher
        .dispatch(request("course-bio", "async_unit_1", "chat", Some("explain")))
        .await;
    let ack = outcome.as_completed().unwrap();
    assert_eq!(ack.status, "processing");
    assert!(ack.task_id.is_some());

    let mut settled = None;
    for _ in 0..200 {
        let status = h
            .dispatcher
            .dispatch(request("course-bio", "async_unit_1", "run_status", None))
            .await;
        let view = status
            .as_completed()
            .unwrap()
            .run_status
            .clone()
            .unwrap();
        if view["runStatus"] != json!("processing") && view["runStatus"] != json!("idle") {
            settled = Some(view);
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let view: Value = settled.expect("deferred run never settled");
    assert_eq!(view["runStatus"], json!("completed"));
    assert_eq!(view["result"]["response"], json!("deferred biology answer"));
}
