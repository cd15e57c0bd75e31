use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::approval::ToolApproval;
use crate::domain::classify::Intent;
use crate::domain::record::{KnowledgeEntry, RecordSummary};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Success,
    Error,
    PendingApproval,
}

/// Interactive payloads attached to a reply. Tagged union with a fixed
/// schema per tag; the UI layer consumes these by `type`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Widget {
    PermitStatus { ticket: String, record: RecordSummary },
    List { title: String, items: Vec<KnowledgeEntry> },
    ApprovalRequest { approvals: Vec<ToolApproval> },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub widgets: Vec<Widget>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl AssistantMessage {
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: MessageRole::Assistant,
            content: content.into(),
            widgets: Vec::new(),
            intent: None,
            confidence: None,
        }
    }

    pub fn with_widget(mut self, widget: Widget) -> Self {
        self.widgets.push(widget);
        self
    }

    pub fn with_intent(mut self, intent: Intent, confidence: f64) -> Self {
        self.intent = Some(intent);
        self.confidence = Some(confidence);
        self
    }
}

/// Exactly one of these is returned per incoming user message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: AssistantMessage,
    pub status: ResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub requires_approval: bool,
}

impl ChatResponse {
    pub fn success(message: AssistantMessage) -> Self {
        Self {
            message,
            status: ResponseStatus::Success,
            error: None,
            error_code: None,
            requires_approval: false,
        }
    }

    pub fn pending_approval(message: AssistantMessage) -> Self {
        Self {
            message,
            status: ResponseStatus::PendingApproval,
            error: None,
            error_code: None,
            requires_approval: true,
        }
    }

    pub fn error(
        user_message: impl Into<String>,
        error_code: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            message: AssistantMessage::assistant(user_message),
            status: ResponseStatus::Error,
            error: Some(error.into()),
            error_code: Some(error_code.into()),
            requires_approval: false,
        }
    }
}
