use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{error, info};
use uuid::Uuid;

use permitdesk_core::config::AppConfig;
use permitdesk_core::{
    AssistError, AssistantMessage, ChatResponse, ClassificationResult, CopilotState,
    EnrichedContext, SessionContext, SessionId, ThreadId, ToolApprovalId, Widget,
};

use crate::approvals::{ApprovalRegistry, PendingRun, SensitivePolicy};
use crate::backend::{ActionOutcome, AssistantBackend, ProposedAction, RunId, ThreadMetadata};
use crate::classifier::IntentClassifier;
use crate::fastpath::FastPathResolver;
use crate::guardrails::{GuardrailGate, ModerationClient};
use crate::lookup::{KnowledgeBase, RecordDirectory};
use crate::session::SessionStore;

/// Top-level pipeline: gate, classify, fast path, then a conversation turn
/// against the language-model backend. One sequential pipeline per call;
/// many sessions run concurrently and independently.
pub struct ConversationOrchestrator {
    backend: Arc<dyn AssistantBackend>,
    gate: GuardrailGate,
    classifier: IntentClassifier,
    fastpath: FastPathResolver,
    sessions: SessionStore,
    approvals: ApprovalRegistry,
    policy: SensitivePolicy,
    human_in_the_loop: bool,
    poll_interval: Duration,
    run_timeout: Duration,
}

impl ConversationOrchestrator {
    pub fn new(
        config: &AppConfig,
        backend: Arc<dyn AssistantBackend>,
        moderation: Arc<dyn ModerationClient>,
        directory: Arc<dyn RecordDirectory>,
        knowledge: Arc<dyn KnowledgeBase>,
        sessions: SessionStore,
    ) -> Self {
        Self {
            gate: GuardrailGate::new(config.guardrails.clone(), moderation),
            classifier: IntentClassifier::new(
                backend.clone(),
                config.assistant.classifier_model.clone(),
            ),
            fastpath: FastPathResolver::new(directory, knowledge),
            sessions,
            approvals: ApprovalRegistry::new(),
            policy: SensitivePolicy::new(&config.approvals),
            human_in_the_loop: config.approvals.human_in_the_loop,
            poll_interval: Duration::from_millis(config.assistant.poll_interval_ms),
            run_timeout: Duration::from_secs(config.assistant.run_timeout_secs),
            backend,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn approvals(&self) -> &ApprovalRegistry {
        &self.approvals
    }

    /// Handle one user message. Always returns exactly one response; every
    /// failure mode is encoded in it, nothing is thrown past this point.
    pub async fn process(&self, text: &str, context: SessionContext) -> ChatResponse {
        let correlation_id = Uuid::new_v4().to_string();
        let session_id = context.session_id.clone();

        self.sessions.upsert(context.clone()).await;
        let enriched = self
            .sessions
            .enriched_context(&session_id)
            .await
            .unwrap_or_else(|| EnrichedContext {
                session: context.clone(),
                copilot: CopilotState::default(),
            });

        // Step 1: guardrail gate. The refusal never echoes blocked content
        // or reveals which rule matched.
        let guardrail = self.gate.check(text).await;
        if !guardrail.passed {
            info!(
                event_name = "chat.guardrail.blocked",
                correlation_id = %correlation_id,
                session_id = %session_id.0,
                category = ?guardrail.category,
                confidence = guardrail.confidence,
                "message blocked at the gate"
            );
            return error_response(&AssistError::GuardrailBlocked);
        }

        // Step 2: classification always runs, even when a fast path could
        // answer, so intent/confidence telemetry is present on every turn.
        let classification = self.classifier.classify(text, &enriched).await;
        info!(
            event_name = "chat.classified",
            correlation_id = %correlation_id,
            session_id = %session_id.0,
            intent = classification.intent.as_str(),
            confidence = classification.confidence,
            persona = classification.suggested_agent.as_str(),
            "message classified"
        );

        // Step 3: deterministic fast path. A hit answers immediately and
        // never creates or touches a thread.
        if let Some(resolution) = self.fastpath.try_resolve(text).await {
            info!(
                event_name = "chat.fastpath.hit",
                correlation_id = %correlation_id,
                session_id = %session_id.0,
                "fast path resolved the message"
            );
            let message = AssistantMessage::assistant(resolution.text)
                .with_widget(resolution.widget)
                .with_intent(classification.intent, classification.confidence);
            return ChatResponse::success(message);
        }

        // Steps 4-8: the conversation turn proper.
        match self.converse(text, &context, &enriched, &classification, &correlation_id).await {
            Ok(response) => response,
            Err(err) => {
                error!(
                    event_name = "chat.turn_failed",
                    correlation_id = %correlation_id,
                    session_id = %session_id.0,
                    error_code = err.error_code(),
                    error = %err,
                    "conversation turn terminated"
                );
                error_response(&err)
            }
        }
    }

    async fn converse(
        &self,
        text: &str,
        context: &SessionContext,
        enriched: &EnrichedContext,
        classification: &ClassificationResult,
        correlation_id: &str,
    ) -> Result<ChatResponse, AssistError> {
        let session_id = &context.session_id;

        // Step 4: at most one active thread per session. Prefer the stored
        // handle; a caller-supplied one only seeds a fresh session.
        let thread = match self.sessions.thread(session_id).await.or(context.thread_id.clone()) {
            Some(thread) => thread,
            None => {
                let metadata = ThreadMetadata {
                    session_id: session_id.0.clone(),
                    user_role: context.user_role.clone(),
                };
                let thread = self
                    .backend
                    .create_thread(&metadata)
                    .await
                    .map_err(|err| AssistError::ThreadCreationFailed(err.to_string()))?;
                self.sessions.set_thread(session_id, thread.clone()).await;
                info!(
                    event_name = "chat.thread.created",
                    correlation_id = %correlation_id,
                    session_id = %session_id.0,
                    thread_id = %thread.0,
                    "conversation thread opened"
                );
                thread
            }
        };

        // Step 5: append is its own failure domain; a retry by the caller is
        // safe because the thread is append-only.
        self.backend
            .append_message(&thread, text)
            .await
            .map_err(|err| AssistError::AddMessageFailed(err.to_string()))?;

        // Step 6: run the selected persona with context-derived instructions.
        // Only the redacted digest crosses the wire.
        let instructions = format!(
            "You are the {} assistant for a municipal permit and document portal. \
             User context: {}.",
            classification.suggested_agent.as_str(),
            enriched.redacted_digest(),
        );
        let run = self
            .backend
            .start_run(&thread, classification.suggested_agent, &instructions)
            .await
            .map_err(|err| AssistError::AssistantRunFailed(err.to_string()))?;

        self.drive_run(session_id, &thread, &run, Some(classification), correlation_id).await
    }

    /// Bounded poll loop over a run: completes, pauses on sensitive actions,
    /// or surfaces a terminal error. Never polls past the overall deadline.
    async fn drive_run(
        &self,
        session_id: &SessionId,
        thread: &ThreadId,
        run: &RunId,
        classification: Option<&ClassificationResult>,
        correlation_id: &str,
    ) -> Result<ChatResponse, AssistError> {
        let deadline = Instant::now() + self.run_timeout;

        loop {
            let state = self
                .backend
                .run_state(thread, run)
                .await
                .map_err(|err| AssistError::AssistantRunFailed(err.to_string()))?;

            match state {
                crate::backend::RunState::Completed { output } => {
                    let mut message = AssistantMessage::assistant(output);
                    if let Some(classification) = classification {
                        message = message
                            .with_intent(classification.intent, classification.confidence);
                    }
                    return Ok(ChatResponse::success(message));
                }
                crate::backend::RunState::Failed { message } => {
                    return Err(AssistError::AssistantRunFailed(message));
                }
                crate::backend::RunState::RequiresAction { actions } => {
                    if let Some(response) = self
                        .handle_proposed_actions(session_id, thread, run, actions, correlation_id)
                        .await?
                    {
                        return Ok(response);
                    }
                    // Outcomes submitted; fall through to keep polling.
                }
                crate::backend::RunState::InProgress => {}
            }

            if Instant::now() >= deadline {
                info!(
                    event_name = "chat.run.timeout",
                    correlation_id = %correlation_id,
                    session_id = %session_id.0,
                    thread_id = %thread.0,
                    timeout_secs = self.run_timeout.as_secs(),
                    "assistant run exceeded the overall deadline"
                );
                return Err(AssistError::RunTimedOut { timeout_secs: self.run_timeout.as_secs() });
            }
            sleep(self.poll_interval).await;
        }
    }

    /// Returns `Some(response)` when the turn must pause for human
    /// decisions, `None` when every outcome was submitted and polling can
    /// continue.
    async fn handle_proposed_actions(
        &self,
        session_id: &SessionId,
        thread: &ThreadId,
        run: &RunId,
        actions: Vec<ProposedAction>,
        correlation_id: &str,
    ) -> Result<Option<ChatResponse>, AssistError> {
        let (sensitive, routine): (Vec<_>, Vec<_>) = actions
            .into_iter()
            .partition(|action| self.human_in_the_loop && self.policy.is_sensitive(&action.tool_name));

        if !routine.is_empty() {
            let outcomes = routine
                .iter()
                .map(|action| ActionOutcome::approved(action.action_id.clone()))
                .collect::<Vec<_>>();
            self.backend
                .submit_action_outcomes(thread, run, &outcomes)
                .await
                .map_err(|err| AssistError::AssistantRunFailed(err.to_string()))?;
        }

        if sensitive.is_empty() {
            return Ok(None);
        }

        let pending_run = PendingRun {
            session_id: session_id.clone(),
            thread_id: thread.clone(),
            run_id: run.clone(),
        };
        let approvals = sensitive
            .iter()
            .map(|action| {
                self.approvals.register(
                    pending_run.clone(),
                    action,
                    self.policy.risk_level(&action.tool_name),
                )
            })
            .collect::<Vec<_>>();

        info!(
            event_name = "chat.approval.pending",
            correlation_id = %correlation_id,
            session_id = %session_id.0,
            thread_id = %thread.0,
            count = approvals.len(),
            "turn paused awaiting human decisions"
        );

        let message = AssistantMessage::assistant(
            "Before I proceed, the following actions need your explicit approval.",
        )
        .with_widget(Widget::ApprovalRequest { approvals });
        Ok(Some(ChatResponse::pending_approval(message)))
    }

    /// Resolve a pending approval and resume the paused run. An id that is
    /// unknown (or expired with its session) is a terminal not-found error.
    ///
    /// The approval only becomes terminal after its outcome reaches the
    /// backend: a mismatched route or a delivery failure leaves the decision
    /// pending so the caller can retry it.
    pub async fn submit_approval(
        &self,
        thread_id: &ThreadId,
        run_id: &RunId,
        approval_id: &ToolApprovalId,
        approved: bool,
    ) -> Result<ChatResponse, AssistError> {
        let correlation_id = Uuid::new_v4().to_string();
        let pending = self.approvals.lookup_pending(approval_id)?;

        // A decision routed at the wrong thread or run resolves nothing.
        if &pending.run.thread_id != thread_id || &pending.run.run_id != run_id {
            return Err(AssistError::ApprovalNotFound(approval_id.clone()));
        }

        // An approval whose session has expired can no longer resume
        // anything; drop its whole cohort along with it.
        if self.sessions.get(&pending.run.session_id).await.is_none() {
            self.approvals.discard_session(&pending.run.session_id);
            return Err(AssistError::ApprovalNotFound(approval_id.clone()));
        }

        let outcome = if approved {
            ActionOutcome::approved(pending.action_id.clone())
        } else {
            ActionOutcome::rejected(pending.action_id.clone())
        };
        self.backend
            .submit_action_outcomes(thread_id, run_id, &[outcome])
            .await
            .map_err(|err| AssistError::AssistantRunFailed(err.to_string()))?;
        self.approvals.resolve(approval_id, approved)?;

        let remaining = self.approvals.pending_for_run(run_id);
        if remaining > 0 {
            let message = AssistantMessage::assistant(format!(
                "Decision recorded. {remaining} more action{} still awaiting your approval.",
                if remaining == 1 { "" } else { "s" },
            ));
            return Ok(ChatResponse::pending_approval(message));
        }

        self.drive_run(&pending.run.session_id, thread_id, run_id, None, &correlation_id).await
    }

    /// Evict idle sessions and drop the approvals they left behind. Keeps
    /// registry retention bounded by the session TTL.
    pub async fn sweep_expired(&self) -> usize {
        let evicted = self.sessions.sweep().await;
        for session_id in &evicted {
            let discarded = self.approvals.discard_session(session_id);
            if discarded > 0 {
                info!(
                    event_name = "chat.approval.discarded",
                    session_id = %session_id.0,
                    count = discarded,
                    "approvals dropped with their expired session"
                );
            }
        }
        evicted.len()
    }

    /// Background maintenance task: periodic TTL sweep plus approval
    /// cleanup, regardless of access pattern.
    pub fn spawn_maintenance(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(orchestrator.sessions.sweep_interval());
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; skip it so a fresh store is
            // not swept before it has any sessions.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                orchestrator.sweep_expired().await;
            }
        })
    }
}

fn error_response(err: &AssistError) -> ChatResponse {
    ChatResponse::error(err.user_message(), err.error_code(), err.user_message())
}
