//! JSON API surface for the in-app support assistant.
//!
//! Endpoints:
//! - `POST /api/chat`            — one conversation turn
//! - `POST /api/chat/approvals`  — resolve a pending tool approval
//! - `POST /api/copilot/events`  — record cross-page navigation activity
//! - `GET  /health`              — liveness probe

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use permitdesk_assist::backend::RunId;
use permitdesk_assist::orchestrator::ConversationOrchestrator;
use permitdesk_core::{AssistError, ChatResponse, SessionContext, SessionId, ThreadId, ToolApprovalId};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ConversationOrchestrator>,
}

pub fn router(orchestrator: Arc<ConversationOrchestrator>) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/chat/approvals", post(submit_approval))
        .route("/api/copilot/events", post(copilot_event))
        .route("/health", get(crate::health::health))
        .with_state(AppState { orchestrator })
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub context: ChatContext,
}

/// Caller-owned slice of the session context. The thread handle and copilot
/// lists are server-owned and cannot be set from here.
#[derive(Debug, Deserialize)]
pub struct ChatContext {
    pub session_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub user_role: String,
    #[serde(default)]
    pub current_page: String,
    #[serde(default)]
    pub page_context: BTreeMap<String, String>,
}

impl ChatContext {
    fn into_session_context(self) -> SessionContext {
        let mut context = SessionContext::new(self.session_id, self.user_role);
        context.user_id = self.user_id;
        context.current_page = self.current_page;
        context.page_context = self.page_context;
        context
    }
}

pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Json<ChatResponse> {
    let response = state
        .orchestrator
        .process(&request.message, request.context.into_session_context())
        .await;
    // Failures are encoded in the envelope, so the transport status stays 200
    // and clients branch on `status`/`error_code`.
    Json(response)
}

#[derive(Debug, Deserialize)]
pub struct ApprovalDecisionRequest {
    pub thread_id: String,
    pub run_id: String,
    pub approval_id: String,
    pub approved: bool,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub error_code: String,
}

pub async fn submit_approval(
    State(state): State<AppState>,
    Json(request): Json<ApprovalDecisionRequest>,
) -> axum::response::Response {
    let result = state
        .orchestrator
        .submit_approval(
            &ThreadId(request.thread_id),
            &RunId(request.run_id),
            &ToolApprovalId(request.approval_id),
            request.approved,
        )
        .await;

    match result {
        Ok(response) => Json(response).into_response(),
        Err(err) => {
            let status = match err {
                AssistError::ApprovalNotFound(_) => StatusCode::NOT_FOUND,
                AssistError::ApprovalAlreadyResolved(_) => StatusCode::CONFLICT,
                _ => StatusCode::BAD_GATEWAY,
            };
            let body = ApiError {
                error: err.user_message().to_owned(),
                error_code: err.error_code().to_owned(),
            };
            (status, Json(body)).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CopilotEventRequest {
    pub session_id: String,
    #[serde(flatten)]
    pub event: CopilotEvent,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum CopilotEvent {
    RecordViewed { record_id: String },
    SearchPerformed { query: String },
    FiltersChanged { filters: BTreeMap<String, String> },
    SummaryUpdated { summary: String },
}

#[derive(Debug, Serialize)]
pub struct CopilotEventResponse {
    pub recorded: bool,
}

pub async fn copilot_event(
    State(state): State<AppState>,
    Json(request): Json<CopilotEventRequest>,
) -> axum::response::Response {
    let sessions = state.orchestrator.sessions();
    let session_id = SessionId(request.session_id);

    if sessions.get(&session_id).await.is_none() {
        let body = ApiError {
            error: "Session not found or expired.".to_owned(),
            error_code: "session_not_found".to_owned(),
        };
        return (StatusCode::NOT_FOUND, Json(body)).into_response();
    }

    match request.event {
        CopilotEvent::RecordViewed { record_id } => {
            sessions.add_recent_record(&session_id, record_id).await;
        }
        CopilotEvent::SearchPerformed { query } => {
            sessions.add_recent_search(&session_id, query).await;
        }
        CopilotEvent::FiltersChanged { filters } => {
            sessions.set_filters(&session_id, filters).await;
        }
        CopilotEvent::SummaryUpdated { summary } => {
            sessions.set_summary(&session_id, summary).await;
        }
    }

    Json(CopilotEventResponse { recorded: true }).into_response()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::extract::State;
    use axum::Json;

    use permitdesk_assist::backend::{
        ActionOutcome, AssistantBackend, BackendError, RunId, RunState, ThreadMetadata,
    };
    use permitdesk_assist::guardrails::{ModerationClient, ModerationError, ModerationVerdict};
    use permitdesk_assist::lookup::{InMemoryKnowledgeBase, NoopRecordDirectory};
    use permitdesk_assist::orchestrator::ConversationOrchestrator;
    use permitdesk_assist::session::SessionStore;
    use permitdesk_core::config::AppConfig;
    use permitdesk_core::{AgentPersona, SessionContext, ThreadId};

    use super::{copilot_event, AppState, CopilotEvent, CopilotEventRequest};

    struct IdleBackend;

    #[async_trait]
    impl AssistantBackend for IdleBackend {
        async fn create_thread(
            &self,
            _metadata: &ThreadMetadata,
        ) -> Result<ThreadId, BackendError> {
            unimplemented!("not used by route tests")
        }

        async fn append_message(
            &self,
            _thread: &ThreadId,
            _text: &str,
        ) -> Result<(), BackendError> {
            unimplemented!("not used by route tests")
        }

        async fn start_run(
            &self,
            _thread: &ThreadId,
            _persona: AgentPersona,
            _instructions: &str,
        ) -> Result<RunId, BackendError> {
            unimplemented!("not used by route tests")
        }

        async fn run_state(
            &self,
            _thread: &ThreadId,
            _run: &RunId,
        ) -> Result<RunState, BackendError> {
            unimplemented!("not used by route tests")
        }

        async fn submit_action_outcomes(
            &self,
            _thread: &ThreadId,
            _run: &RunId,
            _outcomes: &[ActionOutcome],
        ) -> Result<(), BackendError> {
            unimplemented!("not used by route tests")
        }

        async fn classify(
            &self,
            _model: &str,
            _text: &str,
            _context_digest: &str,
        ) -> Result<String, BackendError> {
            unimplemented!("not used by route tests")
        }
    }

    struct IdleModeration;

    #[async_trait]
    impl ModerationClient for IdleModeration {
        async fn moderate(&self, _text: &str) -> Result<ModerationVerdict, ModerationError> {
            Ok(ModerationVerdict { flagged: false, category_scores: BTreeMap::new() })
        }
    }

    fn state() -> AppState {
        let config = AppConfig::default();
        let orchestrator = ConversationOrchestrator::new(
            &config,
            Arc::new(IdleBackend),
            Arc::new(IdleModeration),
            Arc::new(NoopRecordDirectory),
            Arc::new(InMemoryKnowledgeBase::default()),
            SessionStore::new(&config.sessions),
        );
        AppState { orchestrator: Arc::new(orchestrator) }
    }

    #[tokio::test]
    async fn copilot_event_for_unknown_session_is_not_found() {
        let state = state();
        let response = copilot_event(
            State(state),
            Json(CopilotEventRequest {
                session_id: "never-seen".to_owned(),
                event: CopilotEvent::RecordViewed { record_id: "PRM-2026-0001".to_owned() },
            }),
        )
        .await;

        assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn copilot_event_updates_the_live_session() {
        let state = state();
        state
            .orchestrator
            .sessions()
            .upsert(SessionContext::new("sess-route", "clerk"))
            .await;

        let response = copilot_event(
            State(state.clone()),
            Json(CopilotEventRequest {
                session_id: "sess-route".to_owned(),
                event: CopilotEvent::SearchPerformed { query: "lopez paving".to_owned() },
            }),
        )
        .await;
        assert_eq!(response.status(), axum::http::StatusCode::OK);

        let enriched = state
            .orchestrator
            .sessions()
            .enriched_context(&permitdesk_core::SessionId("sess-route".to_owned()))
            .await
            .expect("session is live");
        assert_eq!(enriched.copilot.recent_searches, vec!["lopez paving".to_owned()]);
    }

    #[test]
    fn copilot_events_deserialize_from_tagged_json() {
        let request: CopilotEventRequest = serde_json::from_str(
            r#"{"session_id": "sess-1", "event": "filters-changed", "filters": {"status": "open"}}"#,
        )
        .expect("event deserializes");
        assert!(matches!(request.event, CopilotEvent::FiltersChanged { ref filters }
            if filters.get("status").map(String::as_str) == Some("open")));
    }
}
