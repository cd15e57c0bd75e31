use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::RegexSet;
use thiserror::Error;
use tracing::warn;

use permitdesk_core::config::GuardrailConfig;
use permitdesk_core::{GuardrailCategory, GuardrailResult};

#[derive(Clone, Debug, PartialEq)]
pub struct ModerationVerdict {
    pub flagged: bool,
    pub category_scores: BTreeMap<String, f64>,
}

impl ModerationVerdict {
    pub fn max_score(&self) -> f64 {
        self.category_scores.values().copied().fold(0.0_f64, f64::max)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ModerationError {
    #[error("moderation service unavailable: {0}")]
    Unavailable(String),
}

/// External content-moderation capability.
#[async_trait]
pub trait ModerationClient: Send + Sync {
    async fn moderate(&self, text: &str) -> Result<ModerationVerdict, ModerationError>;
}

/// Known prompt-injection phrasings. Matching any of these blocks locally,
/// before any network call.
const JAILBREAK_PATTERNS: &[&str] = &[
    r"(?i)ignore\s+(all\s+|any\s+)?(previous|prior|above)\s+(instructions|prompts|rules)",
    r"(?i)disregard\s+(all\s+|any\s+)?(previous|prior|above)\s+(instructions|prompts|rules)",
    r"(?i)forget\s+(all\s+|any\s+)?(your|previous|prior)\s+(instructions|rules|training)",
    r"(?i)reveal\s+(your\s+)?(system\s+)?prompt",
    r"(?i)(show|print|repeat)\s+(me\s+)?(your\s+)?(system\s+)?(prompt|instructions)",
    r"(?i)you\s+are\s+now\s+(dan|in\s+developer\s+mode)",
    r"(?i)pretend\s+(you\s+have|there\s+are)\s+no\s+(rules|restrictions|guidelines)",
    r"(?i)act\s+as\s+if\s+you\s+(have\s+no|are\s+not\s+bound\s+by)\s+(rules|restrictions)",
];

fn jailbreak_set() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| {
        RegexSet::new(JAILBREAK_PATTERNS).unwrap_or_else(|_| {
            RegexSet::new::<_, &str>([]).expect("empty regex set always compiles")
        })
    })
}

const JAILBREAK_CONFIDENCE: f64 = 0.9;

/// Screens raw user input before any expensive processing. Tier one is a
/// local pattern match; tier two delegates to the moderation collaborator.
pub struct GuardrailGate {
    config: GuardrailConfig,
    moderation: Arc<dyn ModerationClient>,
}

impl GuardrailGate {
    pub fn new(config: GuardrailConfig, moderation: Arc<dyn ModerationClient>) -> Self {
        Self { config, moderation }
    }

    pub async fn check(&self, text: &str) -> GuardrailResult {
        if !self.config.enabled {
            return GuardrailResult::pass();
        }

        if jailbreak_set().is_match(text) {
            return GuardrailResult::blocked(
                GuardrailCategory::Jailbreak,
                "prompt-injection pattern matched",
                JAILBREAK_CONFIDENCE,
            );
        }

        if !self.config.moderation_enabled {
            return GuardrailResult::pass();
        }

        match self.moderation.moderate(text).await {
            Ok(verdict) if verdict.flagged => GuardrailResult::blocked(
                GuardrailCategory::Inappropriate,
                "flagged by content moderation",
                verdict.max_score(),
            ),
            Ok(_) => GuardrailResult::pass(),
            Err(error) if self.config.fail_open => {
                warn!(
                    event_name = "chat.guardrail.moderation_degraded",
                    error = %error,
                    "moderation unavailable, failing open"
                );
                GuardrailResult::pass()
            }
            Err(error) => {
                warn!(
                    event_name = "chat.guardrail.moderation_blocked_closed",
                    error = %error,
                    "moderation unavailable, failing closed"
                );
                GuardrailResult::blocked(
                    GuardrailCategory::Inappropriate,
                    "moderation unavailable",
                    0.0,
                )
            }
        }
    }
}
