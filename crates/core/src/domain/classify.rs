use serde::{Deserialize, Serialize};

/// Closed intent set. Anything the classifier returns outside this set maps
/// to `Unknown`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    DocumentQuery,
    TechnicalIssue,
    WorkflowHelp,
    GeneralInquiry,
    Navigation,
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DocumentQuery => "document_query",
            Self::TechnicalIssue => "technical_issue",
            Self::WorkflowHelp => "workflow_help",
            Self::GeneralInquiry => "general_inquiry",
            Self::Navigation => "navigation",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "document_query" => Self::DocumentQuery,
            "technical_issue" => Self::TechnicalIssue,
            "workflow_help" => Self::WorkflowHelp,
            "general_inquiry" => Self::GeneralInquiry,
            "navigation" => Self::Navigation,
            _ => Self::Unknown,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentPersona {
    GeneralSupport,
    DocumentSupport,
    TechnicalSupport,
    NavigationGuide,
}

impl AgentPersona {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GeneralSupport => "general_support",
            Self::DocumentSupport => "document_support",
            Self::TechnicalSupport => "technical_support",
            Self::NavigationGuide => "navigation_guide",
        }
    }

    /// Unknown persona strings fall back to general support rather than
    /// failing the turn.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "document_support" => Self::DocumentSupport,
            "technical_support" => Self::TechnicalSupport,
            "navigation_guide" => Self::NavigationGuide,
            _ => Self::GeneralSupport,
        }
    }

    pub fn for_intent(intent: Intent) -> Self {
        match intent {
            Intent::DocumentQuery => Self::DocumentSupport,
            Intent::TechnicalIssue => Self::TechnicalSupport,
            Intent::Navigation => Self::NavigationGuide,
            Intent::WorkflowHelp | Intent::GeneralInquiry | Intent::Unknown => Self::GeneralSupport,
        }
    }
}

/// Transient per-message routing decision. Never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub intent: Intent,
    pub confidence: f64,
    pub suggested_agent: AgentPersona,
    pub reasoning: String,
    pub requires_human_review: bool,
}

impl ClassificationResult {
    /// The deterministic fallback used whenever classification fails or
    /// produces unparseable output. Degrades routing precision, never the
    /// conversation.
    pub fn degraded_default() -> Self {
        Self {
            intent: Intent::GeneralInquiry,
            confidence: 0.5,
            suggested_agent: AgentPersona::GeneralSupport,
            reasoning: "classification unavailable; defaulted to general inquiry".to_owned(),
            requires_human_review: false,
        }
    }

    pub fn clamp_confidence(mut self) -> Self {
        self.confidence = self.confidence.clamp(0.0, 1.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{AgentPersona, ClassificationResult, Intent};

    #[test]
    fn unknown_intent_strings_map_to_unknown() {
        assert_eq!(Intent::parse_lenient("document_query"), Intent::DocumentQuery);
        assert_eq!(Intent::parse_lenient("DOCUMENT_QUERY"), Intent::DocumentQuery);
        assert_eq!(Intent::parse_lenient("billing"), Intent::Unknown);
        assert_eq!(Intent::parse_lenient(""), Intent::Unknown);
    }

    #[test]
    fn unknown_persona_strings_fall_back_to_general_support() {
        assert_eq!(AgentPersona::parse_lenient("document_support"), AgentPersona::DocumentSupport);
        assert_eq!(AgentPersona::parse_lenient("wizard"), AgentPersona::GeneralSupport);
    }

    #[test]
    fn degraded_default_matches_contract() {
        let result = ClassificationResult::degraded_default();
        assert_eq!(result.intent, Intent::GeneralInquiry);
        assert_eq!(result.suggested_agent, AgentPersona::GeneralSupport);
        assert!((result.confidence - 0.5).abs() < f64::EPSILON);
        assert!(!result.requires_human_review);
    }

    #[test]
    fn clamp_confidence_bounds_out_of_range_values() {
        let mut result = ClassificationResult::degraded_default();
        result.confidence = 1.7;
        assert!((result.clamp_confidence().confidence - 1.0).abs() < f64::EPSILON);
    }
}
