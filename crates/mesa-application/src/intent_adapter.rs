//! Intent oracle adapters.
//!
//! Two implementations of the core's `IntentClassifier` boundary: a remote
//! HTTP oracle and a local keyword heuristic. The heuristic doubles as the
//! degraded-path classifier — the pipeline never talks to the network
//! without it as a backstop.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use mesa_core::intent::{
    DegradedReason, Intent, IntentClassifier, IntentContext, IntentResult,
};
use mesa_core::session::Language;
use mesa_core::stage::Stage;

const SOLVED_WORDS: &[&str] = &["solucionado", "resuelto", "arreglado", "solved", "fixed"];
const AFFIRM_WORDS: &[&str] = &["si", "sí", "yes", "dale", "ok", "claro", "sure", "yep"];
const DENY_WORDS: &[&str] = &["no", "nope", "nah", "negativo"];
const SKIP_NAME_WORDS: &[&str] = &["anonimo", "prefiero no", "skip", "sin nombre", "no name"];
const PROBLEM_WORDS: &[&str] = &[
    "no enciende",
    "no funciona",
    "no anda",
    "no prende",
    "error",
    "falla",
    "problema",
    "ayuda",
    "help",
    "instalar",
    "configurar",
    "conectar",
    "install",
    "setup",
    "wifi",
    "internet",
    "asistencia",
];
const DEVICE_WORDS: &[&str] = &[
    "notebook",
    "laptop",
    "pc",
    "computadora",
    "compu",
    "router",
    "mikrotik",
    "microtik",
    "impresora",
    "printer",
    "stick",
    "celular",
    "telefono",
    "phone",
    "modem",
    "tablet",
    "monitor",
];

fn contains_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

fn is_exactly_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text == *w)
}

fn digit_count(text: &str) -> usize {
    text.chars().filter(|c| c.is_ascii_digit()).count()
}

/// Local heuristic classifier. Fast, deterministic, and always available;
/// confidence reflects how specific the matched signal was.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    fn classify_sync(text: &str, ctx: &IntentContext) -> IntentResult {
        // Signals that mean the same thing in any stage.
        if contains_any(text, SOLVED_WORDS) {
            return IntentResult::classified(Intent::Solved, 0.75);
        }
        if is_exactly_any(text, AFFIRM_WORDS) {
            return IntentResult::classified(Intent::Affirm, 0.85);
        }
        if is_exactly_any(text, DENY_WORDS) {
            return IntentResult::classified(Intent::Deny, 0.85);
        }
        if text.contains('@') {
            return IntentResult::classified(Intent::ProvideContact, 0.9);
        }

        // Stage-biased interpretation of free text.
        match ctx.stage {
            Stage::AskName if contains_any(text, SKIP_NAME_WORDS) => {
                IntentResult::classified(Intent::SkipName, 0.8)
            }
            Stage::AskName => IntentResult::classified(Intent::ProvideName, 0.6),
            Stage::AskDevice if contains_any(text, DEVICE_WORDS) => {
                IntentResult::classified(Intent::DescribeDevice, 0.8)
            }
            Stage::AskDevice => IntentResult::classified(Intent::DescribeDevice, 0.5),
            Stage::AskProblem if contains_any(text, PROBLEM_WORDS) => {
                IntentResult::classified(Intent::DescribeProblem, 0.75)
            }
            Stage::AskProblem => IntentResult::classified(Intent::DescribeProblem, 0.5),
            Stage::CollectEmail | Stage::CollectPhone if digit_count(text) >= 6 => {
                IntentResult::classified(Intent::ProvideContact, 0.7)
            }
            Stage::CollectEmail | Stage::CollectPhone => {
                IntentResult::classified(Intent::ProvideContact, 0.4)
            }
            _ if contains_any(text, PROBLEM_WORDS) => {
                IntentResult::classified(Intent::DescribeProblem, 0.6)
            }
            _ if contains_any(text, DEVICE_WORDS) => {
                IntentResult::classified(Intent::DescribeDevice, 0.6)
            }
            _ => IntentResult::classified(Intent::Unknown, 0.3),
        }
    }
}

#[async_trait]
impl IntentClassifier for KeywordClassifier {
    async fn classify(&self, normalized_text: &str, ctx: &IntentContext) -> IntentResult {
        Self::classify_sync(normalized_text, ctx)
    }
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    text: &'a str,
    stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<Language>,
}

#[derive(Deserialize)]
struct ClassifyResponse {
    intent: Intent,
    confidence: f32,
    #[serde(default)]
    fields: HashMap<String, String>,
}

/// Remote intent oracle over a JSON endpoint.
///
/// Every failure mode maps to `IntentResult::Degraded` — this adapter never
/// errors and never panics. The pipeline enforces its own hard timeout on
/// top of the client-level one.
#[derive(Clone)]
pub struct HttpIntentClassifier {
    client: Client,
    endpoint: String,
}

impl HttpIntentClassifier {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }

    /// Overrides the HTTP client, e.g. to set a connect timeout.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Convenience: a client with a request-level timeout.
    pub fn with_request_timeout(self, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        self.with_client(client)
    }
}

#[async_trait]
impl IntentClassifier for HttpIntentClassifier {
    async fn classify(&self, normalized_text: &str, ctx: &IntentContext) -> IntentResult {
        let request = ClassifyRequest {
            text: normalized_text,
            stage: ctx.stage,
            language: ctx.language,
        };

        let response = match self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                return IntentResult::degraded(DegradedReason::Unavailable, err.to_string());
            }
        };

        if !response.status().is_success() {
            return IntentResult::degraded(
                DegradedReason::Unavailable,
                format!("oracle returned {}", response.status()),
            );
        }

        match response.json::<ClassifyResponse>().await {
            Ok(parsed) => IntentResult::Classified {
                intent: parsed.intent,
                confidence: parsed.confidence,
                fields: parsed.fields,
            },
            Err(err) => IntentResult::degraded(DegradedReason::MalformedResponse, err.to_string()),
        }
    }
}
