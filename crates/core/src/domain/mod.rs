pub mod approval;
pub mod chat;
pub mod classify;
pub mod guardrail;
pub mod record;
pub mod session;
