//! End-to-end turn pipeline tests: the full triage flow plus the
//! governance properties (contract enforcement, idempotence, ordering,
//! degraded classification, loop detection).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use mesa_application::handlers::build_handler_map;
use mesa_application::{BasicNormalizer, TurnPipeline, TurnResponse};
use mesa_core::audit::detect_loop;
use mesa_core::config::FlowConfig;
use mesa_core::contract::tokens;
use mesa_core::event::InboundMessage;
use mesa_core::intent::{IntentClassifier, IntentContext, IntentResult};
use mesa_core::stage::Stage;
use mesa_core::turn::{Severity, ViolationCode};
use mesa_infrastructure::{FlowAuditStream, SessionStore};

use mesa_application::intent_adapter::KeywordClassifier;

struct TestRig {
    pipeline: TurnPipeline,
    store: Arc<SessionStore>,
    audit: Arc<FlowAuditStream>,
}

fn test_config() -> FlowConfig {
    FlowConfig {
        intent_timeout_ms: 200,
        debug_responses: true,
        ..FlowConfig::default()
    }
}

fn rig_with(classifier: Arc<dyn IntentClassifier>, config: FlowConfig) -> TestRig {
    let store = Arc::new(SessionStore::in_memory());
    let audit = Arc::new(FlowAuditStream::new(None, 16));
    let pipeline = TurnPipeline::new(
        config,
        store.clone(),
        audit.clone(),
        build_handler_map(),
        classifier,
        Arc::new(BasicNormalizer),
    )
    .unwrap();
    TestRig {
        pipeline,
        store,
        audit,
    }
}

fn rig() -> TestRig {
    rig_with(Arc::new(KeywordClassifier), test_config())
}

fn text_msg(session_id: &str, text: &str) -> InboundMessage {
    InboundMessage {
        session_id: session_id.to_string(),
        text: Some(text.to_string()),
        ..InboundMessage::default()
    }
}

fn button_msg(session_id: &str, token: &str) -> InboundMessage {
    InboundMessage {
        session_id: session_id.to_string(),
        button_id: Some(token.to_string()),
        ..InboundMessage::default()
    }
}

fn button_tokens(response: &TurnResponse) -> Vec<&str> {
    response.buttons.iter().map(|b| b.token.as_str()).collect()
}

#[tokio::test]
async fn test_full_flow_to_ticket() {
    let rig = rig();

    let greeting = rig.pipeline.start_session().await;
    let sid = greeting.session_id.clone();
    assert_eq!(greeting.stage, Stage::AskLanguage);
    assert_eq!(
        button_tokens(&greeting),
        vec![tokens::LANG_ES_AR, tokens::LANG_ES_ES, tokens::LANG_EN]
    );

    let r = rig
        .pipeline
        .handle_message(button_msg(&sid, tokens::LANG_ES_AR))
        .await;
    assert!(r.ok);
    assert_eq!(r.stage, Stage::AskName);
    assert!(r.buttons.is_empty());

    let r = rig.pipeline.handle_message(text_msg(&sid, "Valeria")).await;
    assert_eq!(r.stage, Stage::AskNeed);
    assert!(r.reply.contains("Valeria"));
    assert_eq!(button_tokens(&r), vec![tokens::HELP, tokens::TASK]);

    let r = rig
        .pipeline
        .handle_message(button_msg(&sid, tokens::HELP))
        .await;
    assert_eq!(r.stage, Stage::AskProblem);
    assert!(r.buttons.is_empty());

    let r = rig
        .pipeline
        .handle_message(text_msg(&sid, "tu notebook no enciende"))
        .await;
    assert_eq!(r.stage, Stage::AskDevice);

    let r = rig
        .pipeline
        .handle_message(text_msg(&sid, "Dell Inspiron 15"))
        .await;
    assert_eq!(r.stage, Stage::BasicTests);
    assert_eq!(
        button_tokens(&r),
        vec![tokens::TESTS_DONE, tokens::TESTS_FAIL, tokens::SOLVED]
    );

    let r = rig
        .pipeline
        .handle_message(button_msg(&sid, tokens::TESTS_FAIL))
        .await;
    assert_eq!(r.stage, Stage::Escalate);
    assert_eq!(button_tokens(&r), vec![tokens::YES, tokens::NO]);

    let r = rig
        .pipeline
        .handle_message(button_msg(&sid, tokens::YES))
        .await;
    assert_eq!(r.stage, Stage::CollectEmail);

    let r = rig
        .pipeline
        .handle_message(text_msg(&sid, "valeria@email.com"))
        .await;
    assert_eq!(r.stage, Stage::CollectPhone);

    let r = rig
        .pipeline
        .handle_message(text_msg(&sid, "+54 9 11 1234-5678"))
        .await;
    assert_eq!(r.stage, Stage::TicketCreated);
    assert!(r.reply.contains("TCK-"));
    assert!(r.buttons.is_empty());

    // Profile collected along the way.
    let session = rig.store.get(&sid).await.unwrap();
    assert_eq!(session.profile.display_name.as_deref(), Some("Valeria"));
    assert_eq!(
        session.profile.problem.as_deref(),
        Some("tu notebook no enciende")
    );
    assert_eq!(session.profile.device.as_deref(), Some("Dell Inspiron 15"));
    assert!(session.profile.ticket_id.is_some());
    // Greeting + 9 messages, each applied exactly once.
    assert_eq!(session.turn_seq, 10);
}

#[tokio::test]
async fn test_declining_ticket_regresses_to_advanced_tests() {
    let rig = rig();
    let sid = rig.pipeline.start_session().await.session_id;

    rig.pipeline
        .handle_message(button_msg(&sid, tokens::LANG_EN))
        .await;
    rig.pipeline.handle_message(text_msg(&sid, "Heber")).await;
    rig.pipeline
        .handle_message(button_msg(&sid, tokens::HELP))
        .await;
    rig.pipeline
        .handle_message(text_msg(&sid, "wan setup on a mikrotik"))
        .await;
    rig.pipeline
        .handle_message(text_msg(&sid, "MikroTik RB750Gr3"))
        .await;
    rig.pipeline
        .handle_message(button_msg(&sid, tokens::TESTS_DONE))
        .await;

    let r = rig
        .pipeline
        .handle_message(button_msg(&sid, tokens::NO))
        .await;
    assert_eq!(r.stage, Stage::AdvancedTests);

    // Solving from the advanced round closes the conversation.
    let r = rig
        .pipeline
        .handle_message(button_msg(&sid, tokens::SOLVED))
        .await;
    assert_eq!(r.stage, Stage::Closed);
    assert!(r.buttons.is_empty());
}

#[tokio::test]
async fn test_button_in_text_only_stage_is_rejected_with_empty_buttons() {
    // Scenario A: ask_name (text-only, empty token set) receives BTN_SOLVED.
    let rig = rig();
    let sid = rig.pipeline.start_session().await.session_id;
    rig.pipeline
        .handle_message(button_msg(&sid, tokens::LANG_ES_AR))
        .await;

    let r = rig
        .pipeline
        .handle_message(button_msg(&sid, tokens::SOLVED))
        .await;

    assert!(!r.ok);
    assert_eq!(r.stage, Stage::AskName);
    assert!(r.buttons.is_empty());
    let debug = r.debug.unwrap();
    assert_eq!(debug.violations.len(), 1);
    assert_eq!(debug.violations[0].code, ViolationCode::ButtonNotAllowed);
    assert_eq!(debug.violations[0].severity, Severity::Warning);

    // The session did not move.
    let session = rig.store.get(&sid).await.unwrap();
    assert_eq!(session.stage, Stage::AskName);
}

#[tokio::test]
async fn test_text_in_button_only_stage_reshows_defaults() {
    // Scenario B: ask_language (button-only) receives "hola".
    let rig = rig();
    let sid = rig.pipeline.start_session().await.session_id;

    let r = rig.pipeline.handle_message(text_msg(&sid, "hola")).await;

    assert!(!r.ok);
    assert_eq!(r.stage, Stage::AskLanguage);
    assert_eq!(
        button_tokens(&r),
        vec![tokens::LANG_ES_AR, tokens::LANG_ES_ES, tokens::LANG_EN]
    );
    let debug = r.debug.unwrap();
    assert_eq!(debug.violations[0].code, ViolationCode::TextNotAllowed);
}

#[tokio::test]
async fn test_malformed_request_rejected_without_moving() {
    let rig = rig();
    let sid = rig.pipeline.start_session().await.session_id;

    let msg = InboundMessage {
        session_id: sid.clone(),
        text: Some("hola".to_string()),
        button_id: Some(tokens::LANG_EN.to_string()),
        ..InboundMessage::default()
    };
    let r = rig.pipeline.handle_message(msg).await;

    assert!(!r.ok);
    assert_eq!(r.stage, Stage::AskLanguage);
    let debug = r.debug.unwrap();
    assert_eq!(debug.violations[0].code, ViolationCode::MalformedEvent);
}

#[tokio::test]
async fn test_concurrent_duplicate_applies_exactly_once() {
    // Scenario C: same session, same idempotency key, concurrent arrival.
    let rig = rig();
    let sid = rig.pipeline.start_session().await.session_id;
    rig.pipeline
        .handle_message(button_msg(&sid, tokens::LANG_ES_AR))
        .await;

    let seq_before = rig.store.get(&sid).await.unwrap().turn_seq;

    let mut msg = text_msg(&sid, "Roberto");
    msg.idempotency_key = Some("req-42".to_string());

    let (r1, r2) = tokio::join!(
        rig.pipeline.handle_message(msg.clone()),
        rig.pipeline.handle_message(msg.clone())
    );

    // Exactly one state transition.
    let session = rig.store.get(&sid).await.unwrap();
    assert_eq!(session.turn_seq, seq_before + 1);
    assert_eq!(session.stage, Stage::AskNeed);
    assert_eq!(session.profile.display_name.as_deref(), Some("Roberto"));

    // Both callers get an equivalent answer.
    assert_eq!(r1.stage, r2.stage);
    assert!(r1.ok && r2.ok);
}

#[tokio::test]
async fn test_sequential_duplicate_returns_cached_response() {
    let rig = rig();
    let sid = rig.pipeline.start_session().await.session_id;
    rig.pipeline
        .handle_message(button_msg(&sid, tokens::LANG_ES_AR))
        .await;

    let mut msg = text_msg(&sid, "Roberto");
    msg.idempotency_key = Some("req-7".to_string());

    let first = rig.pipeline.handle_message(msg.clone()).await;
    let seq_after_first = rig.store.get(&sid).await.unwrap().turn_seq;

    let second = rig.pipeline.handle_message(msg).await;

    assert_eq!(first, second);
    assert_eq!(rig.store.get(&sid).await.unwrap().turn_seq, seq_after_first);
}

#[tokio::test]
async fn test_turn_seq_increases_by_exactly_one() {
    let rig = rig();
    let sid = rig.pipeline.start_session().await.session_id;

    rig.pipeline
        .handle_message(button_msg(&sid, tokens::LANG_EN))
        .await;
    rig.pipeline.handle_message(text_msg(&sid, "Ana")).await;
    // A rejected turn also counts.
    rig.pipeline.handle_message(text_msg(&sid, "help me")).await;

    let session = rig.store.get(&sid).await.unwrap();
    let seqs: Vec<u64> = session.transcript.iter().map(|t| t.seq).collect();
    assert_eq!(seqs, vec![1, 2, 3, 4]);
}

/// Classifier that never answers within any reasonable deadline.
struct StuckClassifier;

#[async_trait]
impl IntentClassifier for StuckClassifier {
    async fn classify(&self, _text: &str, _ctx: &IntentContext) -> IntentResult {
        tokio::time::sleep(Duration::from_secs(60)).await;
        IntentResult::Skipped
    }
}

#[tokio::test]
async fn test_stuck_classifier_degrades_and_turn_completes() {
    // Scenario D: the oracle times out; the turn still terminates with a
    // logged degradation and a fallback-path reply.
    let rig = rig_with(Arc::new(StuckClassifier), test_config());
    let sid = rig.pipeline.start_session().await.session_id;
    rig.pipeline
        .handle_message(button_msg(&sid, tokens::LANG_ES_AR))
        .await;

    let started = std::time::Instant::now();
    let r = rig.pipeline.handle_message(text_msg(&sid, "Roberto")).await;

    // Completed within timeout + epsilon, not after 60s.
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(r.ok);
    assert_eq!(r.stage, Stage::AskNeed);

    let debug = r.debug.unwrap();
    assert!(
        debug
            .violations
            .iter()
            .any(|v| v.code == ViolationCode::AdapterDegraded)
    );
}

#[tokio::test]
async fn test_repeated_rejections_show_up_as_a_loop() {
    let rig = rig();
    let sid = rig.pipeline.start_session().await.session_id;
    rig.pipeline
        .handle_message(button_msg(&sid, tokens::LANG_ES_AR))
        .await;

    // Three illegal button presses in ask_name, all rejected in place.
    for _ in 0..3 {
        let r = rig
            .pipeline
            .handle_message(button_msg(&sid, tokens::SOLVED))
            .await;
        assert!(!r.ok);
    }

    let tail = rig.audit.recent(&sid, 3).await;
    let report = detect_loop(&tail, 3).unwrap();
    assert_eq!(report.stage, Stage::AskName);
}

#[tokio::test]
async fn test_default_composition_persists_sessions_and_audit_rows() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = FlowConfig {
        data_dir: Some(dir.path().to_path_buf()),
        debug_responses: true,
        ..FlowConfig::default()
    };
    let pipeline = TurnPipeline::with_defaults(config).await.unwrap();

    let sid = pipeline.start_session().await.session_id;
    pipeline
        .handle_message(button_msg(&sid, tokens::LANG_EN))
        .await;

    // Session landed on disk.
    let stored: Vec<_> = std::fs::read_dir(dir.path().join("sessions"))
        .unwrap()
        .collect();
    assert_eq!(stored.len(), 1);

    // The CSV mirror is eventually ordered; give the writer a moment.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let csv = std::fs::read_to_string(dir.path().join("logs").join("flow-audit.csv")).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert!(lines.len() >= 3);
    assert!(lines[0].starts_with("seq,timestamp,session,"));
}

#[tokio::test]
async fn test_terminal_stage_keeps_answering_without_looping() {
    let rig = rig();
    let sid = rig.pipeline.start_session().await.session_id;

    // Shortest path to closed: language → name → need → problem → device →
    // solved.
    rig.pipeline
        .handle_message(button_msg(&sid, tokens::LANG_EN))
        .await;
    rig.pipeline.handle_message(text_msg(&sid, "Sam")).await;
    rig.pipeline
        .handle_message(button_msg(&sid, tokens::TASK))
        .await;
    rig.pipeline
        .handle_message(text_msg(&sid, "install an app on my tv stick"))
        .await;
    rig.pipeline
        .handle_message(text_msg(&sid, "fire tv stick"))
        .await;
    rig.pipeline
        .handle_message(button_msg(&sid, tokens::SOLVED))
        .await;

    // Terminal stage answers politely and stays put.
    for _ in 0..3 {
        let r = rig.pipeline.handle_message(text_msg(&sid, "thanks!")).await;
        assert!(r.ok);
        assert_eq!(r.stage, Stage::Closed);
        assert!(r.buttons.is_empty());
    }

    // Three identical terminal-stage turns are not a loop.
    let tail = rig.audit.recent(&sid, 3).await;
    assert!(detect_loop(&tail, 3).is_none());
}
