use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use permitdesk_core::{AgentPersona, ThreadId};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

/// Metadata attached to a newly created conversation thread.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadMetadata {
    pub session_id: String,
    pub user_role: String,
}

/// A tool call proposed by the persona during a run. Execution happens on
/// the backend once an outcome is submitted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProposedAction {
    pub action_id: String,
    pub tool_name: String,
    pub parameters: serde_json::Value,
    pub reasoning: String,
}

/// Decision signal fed back into a paused run so the persona can react.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub action_id: String,
    pub approved: bool,
    pub message: String,
}

impl ActionOutcome {
    pub fn approved(action_id: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            approved: true,
            message: "approved".to_owned(),
        }
    }

    pub fn rejected(action_id: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            approved: false,
            message: "rejected by the user".to_owned(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RunState {
    InProgress,
    Completed { output: String },
    RequiresAction { actions: Vec<ProposedAction> },
    Failed { message: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("backend transport failure: {0}")]
    Transport(String),
    #[error("backend returned an unexpected payload: {0}")]
    Protocol(String),
}

/// The language-model backend, treated as an opaque capability: threads are
/// ordered append-only histories it owns, runs are persona turns against a
/// thread, and classification is a single constrained-output call.
#[async_trait]
pub trait AssistantBackend: Send + Sync {
    async fn create_thread(&self, metadata: &ThreadMetadata) -> Result<ThreadId, BackendError>;

    async fn append_message(&self, thread: &ThreadId, text: &str) -> Result<(), BackendError>;

    async fn start_run(
        &self,
        thread: &ThreadId,
        persona: AgentPersona,
        instructions: &str,
    ) -> Result<RunId, BackendError>;

    async fn run_state(&self, thread: &ThreadId, run: &RunId) -> Result<RunState, BackendError>;

    async fn submit_action_outcomes(
        &self,
        thread: &ThreadId,
        run: &RunId,
        outcomes: &[ActionOutcome],
    ) -> Result<(), BackendError>;

    /// Classify a message; returns the raw structured-output JSON. Parsing
    /// and all fallback behavior live in the classifier, not here.
    async fn classify(
        &self,
        model: &str,
        text: &str,
        context_digest: &str,
    ) -> Result<String, BackendError>;
}
