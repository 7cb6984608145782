//! Inbound user events.
//!
//! `parse_event` classifies a raw request strictly from the presence of a
//! button token vs. free text. A request carrying both is malformed and is
//! rejected at parse time, never silently prioritized.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MesaError, Result};

/// The raw inbound wire shape, as posted by the client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    pub session_id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub button_id: Option<String>,
    #[serde(default)]
    pub button_label: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

/// Upstream text-cleaning collaborator. Pure and synchronous from the
/// core's perspective; its output is treated as opaque normalized text.
pub trait TextNormalizer: Send + Sync {
    fn normalize(&self, raw: &str) -> String;
}

/// The parsed payload of one inbound request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    Text {
        raw: String,
        /// Produced by the external `TextNormalizer`; opaque here.
        normalized: String,
    },
    Button {
        token: String,
        label: String,
    },
}

/// The parsed form of one inbound request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEvent {
    #[serde(flatten)]
    pub payload: EventPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl UserEvent {
    /// Builds a text event directly. Used by the pipeline for synthetic
    /// bootstrap turns and by tests.
    pub fn text(
        raw: impl Into<String>,
        normalized: impl Into<String>,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            payload: EventPayload::Text {
                raw: raw.into(),
                normalized: normalized.into(),
            },
            idempotency_key: None,
            received_at,
        }
    }

    /// Builds a button event directly.
    pub fn button(
        token: impl Into<String>,
        label: impl Into<String>,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            payload: EventPayload::Button {
                token: token.into(),
                label: label.into(),
            },
            idempotency_key: None,
            received_at,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self.payload, EventPayload::Text { .. })
    }

    pub fn is_button(&self) -> bool {
        matches!(self.payload, EventPayload::Button { .. })
    }

    pub fn button_token(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::Button { token, .. } => Some(token),
            EventPayload::Text { .. } => None,
        }
    }

    pub fn normalized_text(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::Text { normalized, .. } => Some(normalized),
            EventPayload::Button { .. } => None,
        }
    }

    /// Human-readable rendering of the input for audit rows, truncated to
    /// `max_chars` on a character boundary.
    pub fn input_preview(&self, max_chars: usize) -> String {
        let full = match &self.payload {
            EventPayload::Text { raw, .. } => raw.clone(),
            EventPayload::Button { token, .. } => format!("[BUTTON: {token}]"),
        };
        truncate_chars(&full, max_chars)
    }
}

/// Character-boundary truncation with an ellipsis marker.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Parses an inbound message into a `UserEvent`.
///
/// Exactly one modality must be present: non-empty text, or a button id.
/// Unknown button tokens are *not* a parse error; the enforcer decides
/// their legality against the current stage's contract.
pub fn parse_event(
    msg: &InboundMessage,
    normalizer: &dyn TextNormalizer,
    now: DateTime<Utc>,
) -> Result<UserEvent> {
    let text = msg
        .text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());
    let button = msg
        .button_id
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty());

    let payload = match (text, button) {
        (Some(_), Some(_)) => {
            return Err(MesaError::malformed(
                "request carries both text and a button token",
            ));
        }
        (None, None) => {
            return Err(MesaError::malformed("request carries no text and no button"));
        }
        (Some(raw), None) => EventPayload::Text {
            raw: raw.to_string(),
            normalized: normalizer.normalize(raw),
        },
        (None, Some(token)) => EventPayload::Button {
            token: token.to_string(),
            label: msg
                .button_label
                .clone()
                .unwrap_or_else(|| token.to_string()),
        },
    };

    Ok(UserEvent {
        payload,
        idempotency_key: msg.idempotency_key.clone(),
        received_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Identity;

    impl TextNormalizer for Identity {
        fn normalize(&self, raw: &str) -> String {
            raw.to_lowercase()
        }
    }

    fn msg(text: Option<&str>, button: Option<&str>) -> InboundMessage {
        InboundMessage {
            session_id: "s1".into(),
            text: text.map(String::from),
            button_id: button.map(String::from),
            button_label: None,
            idempotency_key: None,
        }
    }

    #[test]
    fn test_parse_text_event_normalizes() {
        let event = parse_event(&msg(Some("  Mi Compu NO enciende "), None), &Identity, Utc::now())
            .unwrap();
        assert!(event.is_text());
        assert_eq!(event.normalized_text(), Some("mi compu no enciende"));
    }

    #[test]
    fn test_parse_button_event_defaults_label_to_token() {
        let event = parse_event(&msg(None, Some("BTN_YES")), &Identity, Utc::now()).unwrap();
        assert_eq!(event.button_token(), Some("BTN_YES"));
        match &event.payload {
            EventPayload::Button { label, .. } => assert_eq!(label, "BTN_YES"),
            _ => panic!("expected button payload"),
        }
    }

    #[test]
    fn test_parse_rejects_both_modalities() {
        let err = parse_event(&msg(Some("hola"), Some("BTN_YES")), &Identity, Utc::now())
            .unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_parse_rejects_empty_request() {
        assert!(parse_event(&msg(None, None), &Identity, Utc::now())
            .unwrap_err()
            .is_malformed());
        // Whitespace-only text counts as absent.
        assert!(parse_event(&msg(Some("   "), None), &Identity, Utc::now())
            .unwrap_err()
            .is_malformed());
    }

    #[test]
    fn test_input_preview_truncates_on_char_boundary() {
        let event = UserEvent::text("ñandú ñandú ñandú", "x", Utc::now());
        let preview = event.input_preview(8);
        assert_eq!(preview.chars().count(), 8);
        assert!(preview.ends_with('…'));

        let button = UserEvent::button("BTN_HELP", "Ayuda", Utc::now());
        assert_eq!(button.input_preview(80), "[BUTTON: BTN_HELP]");
    }
}
