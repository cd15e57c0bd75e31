use std::sync::Arc;

use serde::Deserialize;
use tracing::warn;

use permitdesk_core::{AgentPersona, ClassificationResult, EnrichedContext, Intent};

use crate::backend::AssistantBackend;

/// Raw structured-output shape requested from the backend. Lenient on
/// purpose: anything missing or malformed falls back field by field.
#[derive(Debug, Deserialize)]
struct RawClassification {
    intent: Option<String>,
    confidence: Option<f64>,
    suggested_agent: Option<String>,
    reasoning: Option<String>,
    requires_human_review: Option<bool>,
}

/// Routes a message to an intent category and assistant persona via a
/// single lightweight classification call. Never aborts the conversation:
/// every failure path lands on the deterministic degraded default.
pub struct IntentClassifier {
    backend: Arc<dyn AssistantBackend>,
    model: String,
}

impl IntentClassifier {
    pub fn new(backend: Arc<dyn AssistantBackend>, model: impl Into<String>) -> Self {
        Self { backend, model: model.into() }
    }

    pub async fn classify(&self, text: &str, context: &EnrichedContext) -> ClassificationResult {
        // Only the redacted digest crosses the wire; raw ids, searches, and
        // filter values never do.
        let digest = context.redacted_digest();

        let raw = match self.backend.classify(&self.model, text, &digest).await {
            Ok(raw) => raw,
            Err(error) => {
                warn!(
                    event_name = "chat.classifier.degraded",
                    error = %error,
                    "classification call failed, using default routing"
                );
                return ClassificationResult::degraded_default();
            }
        };

        match serde_json::from_str::<RawClassification>(&raw) {
            Ok(parsed) => Self::resolve(parsed),
            Err(error) => {
                warn!(
                    event_name = "chat.classifier.parse_degraded",
                    error = %error,
                    "classification output unparseable, using default routing"
                );
                ClassificationResult::degraded_default()
            }
        }
    }

    fn resolve(raw: RawClassification) -> ClassificationResult {
        let intent = raw
            .intent
            .as_deref()
            .map(Intent::parse_lenient)
            .unwrap_or(Intent::Unknown);
        let suggested_agent = raw
            .suggested_agent
            .as_deref()
            .map(AgentPersona::parse_lenient)
            .unwrap_or_else(|| AgentPersona::for_intent(intent));

        ClassificationResult {
            intent,
            confidence: raw.confidence.unwrap_or(0.5),
            suggested_agent,
            reasoning: raw.reasoning.unwrap_or_default(),
            requires_human_review: raw.requires_human_review.unwrap_or(false),
        }
        .clamp_confidence()
    }
}
