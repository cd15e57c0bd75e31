pub mod config;
pub mod domain;
pub mod errors;

pub use domain::approval::{ApprovalStatus, RiskLevel, ToolApproval, ToolApprovalId};
pub use domain::chat::{AssistantMessage, ChatResponse, MessageRole, ResponseStatus, Widget};
pub use domain::classify::{AgentPersona, ClassificationResult, Intent};
pub use domain::guardrail::{GuardrailCategory, GuardrailResult};
pub use domain::record::{KnowledgeEntry, RecordKind, RecordSummary};
pub use domain::session::{CopilotState, EnrichedContext, SessionContext, SessionId, ThreadId};
pub use errors::AssistError;
