//! The turn pipeline.
//!
//! One inbound request runs load → parse → enforce → classify → handle →
//! sanitize → save → log → respond, serialized per session key so the
//! whole sequence is one atomic unit for that session. Every failure mode
//! terminates with a TurnLog and a response — the pipeline never hangs and
//! never surfaces an error to the transport layer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use mesa_core::config::FlowConfig;
use mesa_core::contract::{SanitizeOutcome, contract_for, sanitize_outgoing_buttons};
use mesa_core::enforce::{Enforcement, Rejection, enforce};
use mesa_core::error::MesaError;
use mesa_core::event::{InboundMessage, TextNormalizer, UserEvent, parse_event};
use mesa_core::handler::HandlerMap;
use mesa_core::intent::{DegradedReason, IntentClassifier, IntentContext, IntentResult};
use mesa_core::session::{Language, Session};
use mesa_core::stage::Stage;
use mesa_core::turn::{
    FlowLogEntry, TransitionReason, TurnLog, TurnLogParams, Violation, ViolationCode,
};
use mesa_infrastructure::{ClaimOutcome, DirSessionBackend, FlowAuditStream, SessionStore};

use crate::handlers::build_handler_map;
use crate::intent_adapter::KeywordClassifier;
use crate::messages;
use crate::normalize::BasicNormalizer;
use crate::response::{TurnResponse, ViewModel};

/// How many session locks may accumulate before idle ones are pruned.
const LOCK_MAP_PRUNE_THRESHOLD: usize = 1024;

struct CachedResponse {
    response: TurnResponse,
    expires_at: DateTime<Utc>,
}

/// The conversation governance pipeline.
pub struct TurnPipeline {
    config: FlowConfig,
    store: Arc<SessionStore>,
    audit: Arc<FlowAuditStream>,
    handlers: HandlerMap,
    classifier: Arc<dyn IntentClassifier>,
    normalizer: Arc<dyn TextNormalizer>,
    /// Per-session mutual exclusion: "load → enforce → handle → save" is
    /// one atomic unit per session key.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    /// Responses kept for duplicate submissions inside the claim TTL.
    response_cache: Mutex<HashMap<String, CachedResponse>>,
}

impl TurnPipeline {
    /// Wires the pipeline. Fails fast when a stage has no handler — that is
    /// a startup defect, not a runtime case.
    pub fn new(
        config: FlowConfig,
        store: Arc<SessionStore>,
        audit: Arc<FlowAuditStream>,
        handlers: HandlerMap,
        classifier: Arc<dyn IntentClassifier>,
        normalizer: Arc<dyn TextNormalizer>,
    ) -> Result<Self, MesaError> {
        if !handlers.is_complete() {
            return Err(MesaError::config("handler map does not cover every stage"));
        }

        Ok(Self {
            config,
            store,
            audit,
            handlers,
            classifier,
            normalizer,
            locks: Mutex::new(HashMap::new()),
            response_cache: Mutex::new(HashMap::new()),
        })
    }

    /// Composition root for the standard deployment: directory-backed
    /// durable store, CSV flow audit under `<data_dir>/logs/`, the full
    /// handler set, and the keyword classifier.
    pub async fn with_defaults(config: FlowConfig) -> Result<Self, MesaError> {
        let backend = match &config.data_dir {
            Some(dir) => DirSessionBackend::new(dir).await,
            None => DirSessionBackend::default_location().await,
        }
        .map_err(|err| MesaError::data_access(format!("{err:#}")))?;

        let csv_path = config
            .data_dir
            .as_ref()
            .map(|dir| dir.join("logs").join("flow-audit.csv"));
        let audit = Arc::new(FlowAuditStream::new(csv_path, config.audit_tail_cap));

        Self::new(
            config,
            Arc::new(SessionStore::new(Arc::new(backend))),
            audit,
            build_handler_map(),
            Arc::new(KeywordClassifier),
            Arc::new(BasicNormalizer),
        )
    }

    /// Bootstraps a fresh session: greeting reply, language buttons, and a
    /// logged turn, exactly like any other.
    pub async fn start_session(&self) -> TurnResponse {
        let started = Instant::now();
        let now = Utc::now();
        let session_key = Uuid::new_v4().to_string();
        let session = Session::new(&session_key, now);

        let lock = self.session_lock(&session_key).await;
        let _guard = lock.lock().await;

        let sanitized = sanitize_outgoing_buttons(
            Stage::initial(),
            &contract_for(Stage::initial()).default_button_list(),
        );

        let turn = TurnLog::new(TurnLogParams {
            seq: session.next_seq(),
            session_key,
            stage_before: Stage::initial(),
            event: UserEvent::text("[INICIO]", "[inicio]", now),
            intent: None,
            reply: messages::greeting(),
            stage_after: Stage::initial(),
            buttons_shown: sanitized.buttons,
            reason: TransitionReason::Started,
            violations: Vec::new(),
            duration_ms: started.elapsed().as_millis() as u64,
        });

        self.commit(session, turn).await
    }

    /// Processes one inbound message end to end.
    pub async fn handle_message(&self, msg: InboundMessage) -> TurnResponse {
        let started = Instant::now();

        let lock = self.session_lock(&msg.session_id).await;
        let _guard = lock.lock().await;

        // Dedup: an already-claimed (session, idempotency key) pair is
        // answered without touching session state again.
        if let Some(idem) = msg.idempotency_key.as_deref() {
            let cache_key = format!("{}:{}", msg.session_id, idem);
            if let Some(cached) = self.cached_response(&cache_key).await {
                return cached;
            }
            if self
                .store
                .try_claim(&msg.session_id, idem, self.config.dedup_ttl())
                .await
                == ClaimOutcome::AlreadyClaimed
            {
                return self.duplicate_ack(&msg.session_id).await;
            }
        }

        let now = Utc::now();
        let session = match self.store.get(&msg.session_id).await {
            Some(session) => session,
            // First event for an unseen key creates the session.
            None => Session::new(&msg.session_id, now),
        };

        let response = match parse_event(&msg, self.normalizer.as_ref(), now) {
            Ok(event) => match enforce(&session, &event) {
                Enforcement::Accept => self.run_accepted(session, event, started).await,
                Enforcement::Reject(rejection) => {
                    self.finish_rejected(session, event, rejection, started).await
                }
            },
            Err(err) => self.finish_malformed(session, err, now, started).await,
        };

        if let Some(idem) = msg.idempotency_key.as_deref() {
            let cache_key = format!("{}:{}", msg.session_id, idem);
            self.cache_response(cache_key, response.clone()).await;
        }

        response
    }

    /// The accepted path: classify, dispatch, sanitize, commit.
    async fn run_accepted(
        &self,
        session: Session,
        event: UserEvent,
        started: Instant,
    ) -> TurnResponse {
        let intent = self.classify(&session, &event).await;

        let mut violations = Vec::new();
        if let IntentResult::Degraded { reason, detail } = &intent {
            violations.push(Violation::warning(
                ViolationCode::AdapterDegraded,
                format!("{reason}: {detail}"),
            ));
        }

        let handler = match self.handlers.get(session.stage) {
            Ok(handler) => handler,
            Err(err) => {
                return self
                    .finish_fault(session, event, &intent, err, violations, started)
                    .await;
            }
        };

        let outcome = match handler.handle(session.clone(), &event, &intent) {
            Ok(outcome) => outcome,
            Err(err) => {
                return self
                    .finish_fault(session, event, &intent, err, violations, started)
                    .await;
            }
        };

        let stage_before = session.stage;
        let stage_after = outcome.session.stage;

        // Independent output check against the contract of the stage the
        // buttons will actually be shown in.
        let sanitized = sanitize_outgoing_buttons(stage_after, &outcome.proposed_buttons);
        if sanitized.altered() {
            violations.push(sanitize_violation(stage_after, &sanitized));
        }

        let turn = TurnLog::new(TurnLogParams {
            seq: outcome.session.next_seq(),
            session_key: outcome.session.key.clone(),
            stage_before,
            event,
            intent: intent.summary(),
            reply: outcome.reply,
            stage_after,
            buttons_shown: sanitized.buttons,
            reason: outcome.reason,
            violations,
            duration_ms: started.elapsed().as_millis() as u64,
        });

        self.commit(outcome.session, turn).await
    }

    /// Contract violation: answer with the stage's own defaults, stage
    /// unchanged, turn logged and counted.
    async fn finish_rejected(
        &self,
        session: Session,
        event: UserEvent,
        rejection: Rejection,
        started: Instant,
    ) -> TurnResponse {
        let language = session.profile.language_or_default();
        let reply = messages::rejection_reply(language, &rejection.violation);

        // The enforcer already picked the stage's own defaults; the output
        // check still runs so the empty-contract invariant cannot depend on
        // the enforcer being right.
        let sanitized = sanitize_outgoing_buttons(session.stage, &rejection.corrected_buttons);

        let turn = TurnLog::new(TurnLogParams {
            seq: session.next_seq(),
            session_key: session.key.clone(),
            stage_before: session.stage,
            event,
            intent: None,
            reply,
            stage_after: session.stage,
            buttons_shown: sanitized.buttons,
            reason: TransitionReason::Rejected,
            violations: vec![rejection.violation],
            duration_ms: started.elapsed().as_millis() as u64,
        });

        self.commit(session, turn).await
    }

    /// Unparseable request: rejected with the current stage's defaults.
    async fn finish_malformed(
        &self,
        session: Session,
        err: MesaError,
        now: DateTime<Utc>,
        started: Instant,
    ) -> TurnResponse {
        let language = session.profile.language_or_default();
        let sanitized = sanitize_outgoing_buttons(
            session.stage,
            &contract_for(session.stage).default_button_list(),
        );

        let turn = TurnLog::new(TurnLogParams {
            seq: session.next_seq(),
            session_key: session.key.clone(),
            stage_before: session.stage,
            event: UserEvent::text("[malformed request]", "[malformed request]", now),
            intent: None,
            reply: messages::malformed_reply(language),
            stage_after: session.stage,
            buttons_shown: sanitized.buttons,
            reason: TransitionReason::Rejected,
            violations: vec![Violation::warning(
                ViolationCode::MalformedEvent,
                err.to_string(),
            )],
            duration_ms: started.elapsed().as_millis() as u64,
        });

        self.commit(session, turn).await
    }

    /// Handler fault: fatal for this turn only. The session is left
    /// unmodified — no partial save — but the turn is still logged to the
    /// audit stream and answered.
    async fn finish_fault(
        &self,
        session: Session,
        event: UserEvent,
        intent: &IntentResult,
        err: MesaError,
        mut violations: Vec<Violation>,
        started: Instant,
    ) -> TurnResponse {
        tracing::error!(
            target: "turn_pipeline",
            "Handler fault in stage {} for session {}: {err}",
            session.stage,
            session.key
        );
        violations.push(Violation::fatal(ViolationCode::HandlerFault, err.to_string()));

        let language = session.profile.language_or_default();
        let sanitized = sanitize_outgoing_buttons(
            session.stage,
            &contract_for(session.stage).default_button_list(),
        );

        let turn = TurnLog::new(TurnLogParams {
            seq: session.next_seq(),
            session_key: session.key.clone(),
            stage_before: session.stage,
            event,
            intent: intent.summary(),
            reply: messages::fault_reply(language),
            stage_after: session.stage,
            buttons_shown: sanitized.buttons,
            reason: TransitionReason::Fault,
            violations,
            duration_ms: started.elapsed().as_millis() as u64,
        });

        self.mirror_to_audit(&turn).await;
        TurnResponse::from_turn(&turn, self.config.debug_responses)
    }

    /// Classifies text events under the hard timeout; button presses skip
    /// the oracle entirely.
    async fn classify(&self, session: &Session, event: &UserEvent) -> IntentResult {
        let Some(text) = event.normalized_text() else {
            return IntentResult::Skipped;
        };

        let ctx = IntentContext {
            stage: session.stage,
            language: session.profile.language,
        };

        match tokio::time::timeout(
            self.config.intent_timeout(),
            self.classifier.classify(text, &ctx),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => IntentResult::degraded(
                DegradedReason::Timeout,
                format!("{}ms elapsed", self.config.intent_timeout_ms),
            ),
        }
    }

    /// Commits one applied turn: session-local transcript append and save
    /// complete before the response; the audit mirror is fire-and-forget.
    async fn commit(&self, mut session: Session, turn: TurnLog) -> TurnResponse {
        session.record_turn(turn.clone(), self.config.transcript_cap);
        self.store.put(&session, self.config.session_ttl()).await;
        self.mirror_to_audit(&turn).await;
        TurnResponse::from_turn(&turn, self.config.debug_responses)
    }

    async fn mirror_to_audit(&self, turn: &TurnLog) {
        let entry = FlowLogEntry::from_turn(
            turn,
            self.audit.next_seq(),
            self.config.input_preview_chars,
            self.config.reply_preview_chars,
        );
        self.audit.append(entry).await;
    }

    /// Neutral acknowledgment for a duplicate whose original response is no
    /// longer cached: current stage, current affordances, no state change.
    async fn duplicate_ack(&self, session_key: &str) -> TurnResponse {
        let (stage, language) = match self.store.get(session_key).await {
            Some(session) => (session.stage, session.profile.language_or_default()),
            None => (Stage::initial(), Language::EsAr),
        };
        let sanitized =
            sanitize_outgoing_buttons(stage, &contract_for(stage).default_button_list());

        TurnResponse {
            ok: true,
            session_id: session_key.to_string(),
            stage,
            reply: messages::duplicate_ack(language),
            buttons: sanitized.buttons,
            view_model: ViewModel::for_stage(stage),
            debug: None,
        }
    }

    async fn session_lock(&self, session_key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        if locks.len() > LOCK_MAP_PRUNE_THRESHOLD {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        locks
            .entry(session_key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn cached_response(&self, cache_key: &str) -> Option<TurnResponse> {
        let now = Utc::now();
        let mut cache = self.response_cache.lock().await;
        match cache.get(cache_key) {
            Some(cached) if cached.expires_at > now => Some(cached.response.clone()),
            Some(_) => {
                cache.remove(cache_key);
                None
            }
            None => None,
        }
    }

    async fn cache_response(&self, cache_key: String, response: TurnResponse) {
        let now = Utc::now();
        let mut cache = self.response_cache.lock().await;
        cache.retain(|_, cached| cached.expires_at > now);
        cache.insert(
            cache_key,
            CachedResponse {
                response,
                expires_at: now
                    + chrono::Duration::seconds(self.config.dedup_ttl_secs as i64),
            },
        );
    }
}

fn sanitize_violation(stage: Stage, sanitized: &SanitizeOutcome) -> Violation {
    Violation::info(
        ViolationCode::ButtonsSanitized,
        format!(
            "stage {stage}: dropped {:?}, truncated {}",
            sanitized.dropped_tokens, sanitized.truncated
        ),
    )
}
