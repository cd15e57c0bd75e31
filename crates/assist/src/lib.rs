//! Support Assist - conversational orchestration core
//!
//! This crate is the "brain" of the permitdesk support chat: it receives a
//! free-text user message plus page/session context, decides how to handle
//! it safely, and produces a structured response (text plus optional
//! interactive widgets).
//!
//! # Architecture
//!
//! One sequential pipeline per message:
//! 1. **Guardrail Gate** (`guardrails`) - screen raw input before anything
//!    expensive runs
//! 2. **Intent Classification** (`classifier`) - route to an assistant
//!    persona; failures degrade, never abort
//! 3. **Fast Path** (`fastpath`) - deterministic, model-free shortcuts
//!    (ticket lookups, FAQ search)
//! 4. **Conversation Turn** (`orchestrator`) - thread management against the
//!    language-model backend, with a bounded poll loop
//! 5. **Approval Workflow** (`approvals`) - human confirmation before any
//!    sensitive action executes
//!
//! # Key Types
//!
//! - `ConversationOrchestrator` - top-level pipeline (see `orchestrator`)
//! - `AssistantBackend` - pluggable trait for the language-model backend
//! - `SessionStore` - TTL-bounded per-session conversational state
//!
//! # Safety Principle
//!
//! The language model never executes a sensitive action on its own. Every
//! proposed tool call on the sensitive list pauses the turn until a human
//! submits an explicit decision.

pub mod approvals;
pub mod backend;
pub mod classifier;
pub mod fastpath;
pub mod guardrails;
pub mod lookup;
pub mod orchestrator;
pub mod session;
