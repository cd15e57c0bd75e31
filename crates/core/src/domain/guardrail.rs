use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailCategory {
    Jailbreak,
    Inappropriate,
}

/// Transient outcome of the input gate, produced once per message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GuardrailResult {
    pub passed: bool,
    pub flagged: bool,
    pub reason: Option<String>,
    pub category: Option<GuardrailCategory>,
    pub confidence: f64,
}

impl GuardrailResult {
    pub fn pass() -> Self {
        Self { passed: true, flagged: false, reason: None, category: None, confidence: 1.0 }
    }

    pub fn blocked(
        category: GuardrailCategory,
        reason: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            passed: false,
            flagged: true,
            reason: Some(reason.into()),
            category: Some(category),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}
