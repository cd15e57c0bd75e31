use thiserror::Error;

use crate::domain::approval::ToolApprovalId;

/// Failures of the conversation pipeline. Required-stage failures terminate
/// the current turn with a wire `error_code`; optional stages (moderation,
/// knowledge lookup, classification) degrade in place and never produce one
/// of these.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AssistError {
    #[error("message blocked by guardrails")]
    GuardrailBlocked,
    #[error("conversation thread creation failed: {0}")]
    ThreadCreationFailed(String),
    #[error("appending message to thread failed: {0}")]
    AddMessageFailed(String),
    #[error("assistant run failed: {0}")]
    AssistantRunFailed(String),
    #[error("assistant run did not complete within {timeout_secs}s")]
    RunTimedOut { timeout_secs: u64 },
    #[error("session `{0}` not found or expired")]
    SessionNotFound(String),
    #[error("approval `{}` not found or expired", .0 .0)]
    ApprovalNotFound(ToolApprovalId),
    #[error("approval `{}` was already resolved", .0 .0)]
    ApprovalAlreadyResolved(ToolApprovalId),
    #[error("backend failure: {0}")]
    Backend(String),
}

impl AssistError {
    /// Stable machine-readable code carried on error responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::GuardrailBlocked => "guardrail_blocked",
            Self::ThreadCreationFailed(_) => "thread_creation_failed",
            Self::AddMessageFailed(_) => "add_message_failed",
            Self::AssistantRunFailed(_) | Self::RunTimedOut { .. } => "assistant_run_failed",
            Self::SessionNotFound(_) => "session_not_found",
            Self::ApprovalNotFound(_) => "approval_not_found",
            Self::ApprovalAlreadyResolved(_) => "approval_already_resolved",
            Self::Backend(_) => "backend_failure",
        }
    }

    /// Generic, non-technical text shown to the user. Internal detail is
    /// logged, never echoed to the caller.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::GuardrailBlocked => {
                "I can't help with that request. If you need assistance with permits or \
                 documents, please rephrase your question."
            }
            Self::ThreadCreationFailed(_) => {
                "I couldn't start a conversation just now. Please try sending your message again."
            }
            Self::AddMessageFailed(_) => {
                "Your message didn't go through. Please try sending it again."
            }
            Self::AssistantRunFailed(_) | Self::RunTimedOut { .. } => {
                "I ran into a problem answering that. Please try again in a moment."
            }
            Self::SessionNotFound(_) => {
                "Your session has expired. Please refresh the page to start a new conversation."
            }
            Self::ApprovalNotFound(_) => {
                "That approval request is no longer available. It may have expired with your \
                 session."
            }
            Self::ApprovalAlreadyResolved(_) => "That request has already been decided.",
            Self::Backend(_) => "The assistant is temporarily unavailable. Please retry shortly.",
        }
    }

    /// Backend-connectivity class errors are safe for the caller to retry by
    /// resubmitting the same message; thread operations are append-only.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ThreadCreationFailed(_)
                | Self::AddMessageFailed(_)
                | Self::AssistantRunFailed(_)
                | Self::RunTimedOut { .. }
                | Self::Backend(_)
        )
    }
}
