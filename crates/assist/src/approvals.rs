use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::info;

use permitdesk_core::config::ApprovalConfig;
use permitdesk_core::{
    ApprovalStatus, AssistError, RiskLevel, SessionId, ThreadId, ToolApproval, ToolApprovalId,
};

use crate::backend::{ProposedAction, RunId};

/// Decides which proposed tools require a human decision, and how risky
/// each one is. The allow-list is fixed configuration, not model output.
#[derive(Clone, Debug)]
pub struct SensitivePolicy {
    sensitive_tools: Vec<String>,
}

impl SensitivePolicy {
    pub fn new(config: &ApprovalConfig) -> Self {
        Self { sensitive_tools: config.sensitive_tools.clone() }
    }

    pub fn is_sensitive(&self, tool_name: &str) -> bool {
        self.sensitive_tools.iter().any(|tool| tool == tool_name)
    }

    pub fn risk_level(&self, tool_name: &str) -> RiskLevel {
        let name = tool_name.to_ascii_lowercase();
        if name.contains("delete") || name.contains("bulk") {
            RiskLevel::High
        } else if name.contains("modify") || name.contains("update") || name.contains("export") {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Where a paused run lives, so a later decision can resume it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingRun {
    pub session_id: SessionId,
    pub thread_id: ThreadId,
    pub run_id: RunId,
}

#[derive(Clone, Debug)]
struct ApprovalEntry {
    approval: ToolApproval,
    action_id: String,
    run: PendingRun,
}

/// Resolved decision handed back to the orchestrator for resumption.
#[derive(Clone, Debug)]
pub struct ResolvedApproval {
    pub approval: ToolApproval,
    pub action_id: String,
    pub run: PendingRun,
    pub approved: bool,
}

/// Still-pending decision looked up before any side effect is taken on it.
#[derive(Clone, Debug)]
pub struct PendingDecision {
    pub action_id: String,
    pub run: PendingRun,
}

/// Tiny per-action state machine: `pending -> {approved, rejected}`, both
/// terminal. Entries (terminal ones included) are retained until their
/// session is discarded, so a double submission is distinguishable from an
/// unknown id; durable auditing belongs to an external collaborator.
#[derive(Clone, Default)]
pub struct ApprovalRegistry {
    entries: Arc<Mutex<HashMap<ToolApprovalId, ApprovalEntry>>>,
}

impl ApprovalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pending approval for a proposed sensitive action.
    pub fn register(
        &self,
        run: PendingRun,
        action: &ProposedAction,
        risk_level: RiskLevel,
    ) -> ToolApproval {
        let approval = ToolApproval::pending(
            action.tool_name.clone(),
            action.parameters.clone(),
            action.reasoning.clone(),
            risk_level,
        );

        info!(
            event_name = "chat.approval.registered",
            approval_id = %approval.id.0,
            tool_name = %approval.tool_name,
            session_id = %run.session_id.0,
            thread_id = %run.thread_id.0,
            "sensitive action awaiting human decision"
        );

        let entry = ApprovalEntry {
            approval: approval.clone(),
            action_id: action.action_id.clone(),
            run,
        };
        match self.entries.lock() {
            Ok(mut entries) => entries.insert(approval.id.clone(), entry),
            Err(poisoned) => poisoned.into_inner().insert(approval.id.clone(), entry),
        };

        approval
    }

    /// Look up a decision without changing its state. An unknown id
    /// (including one that expired with its session) is terminal not-found;
    /// an already-decided one is a deterministic error.
    pub fn lookup_pending(
        &self,
        approval_id: &ToolApprovalId,
    ) -> Result<PendingDecision, AssistError> {
        let entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };

        let entry = entries
            .get(approval_id)
            .ok_or_else(|| AssistError::ApprovalNotFound(approval_id.clone()))?;
        if entry.approval.status.is_terminal() {
            return Err(AssistError::ApprovalAlreadyResolved(approval_id.clone()));
        }

        Ok(PendingDecision { action_id: entry.action_id.clone(), run: entry.run.clone() })
    }

    /// Apply a decision. A second resolve on the same approval is a
    /// deterministic error, never a silent state change; an unknown id
    /// (including one that expired with its session) is terminal not-found.
    pub fn resolve(
        &self,
        approval_id: &ToolApprovalId,
        approved: bool,
    ) -> Result<ResolvedApproval, AssistError> {
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };

        let entry = entries
            .get_mut(approval_id)
            .ok_or_else(|| AssistError::ApprovalNotFound(approval_id.clone()))?;
        if entry.approval.status.is_terminal() {
            // Terminal entries stay in the map until the session is
            // discarded, so double submission is distinguishable from an
            // unknown id.
            return Err(AssistError::ApprovalAlreadyResolved(approval_id.clone()));
        }

        entry.approval.status =
            if approved { ApprovalStatus::Approved } else { ApprovalStatus::Rejected };
        let entry = entry.clone();

        info!(
            event_name = "chat.approval.resolved",
            approval_id = %approval_id.0,
            approved,
            tool_name = %entry.approval.tool_name,
            "approval decision recorded"
        );

        Ok(ResolvedApproval {
            approval: entry.approval,
            action_id: entry.action_id,
            run: entry.run,
            approved,
        })
    }

    pub fn pending_count(&self) -> usize {
        match self.entries.lock() {
            Ok(entries) => entries.values().filter(|e| !e.approval.status.is_terminal()).count(),
            Err(poisoned) => {
                poisoned.into_inner().values().filter(|e| !e.approval.status.is_terminal()).count()
            }
        }
    }

    /// How many decisions a paused run is still waiting on.
    pub fn pending_for_run(&self, run_id: &RunId) -> usize {
        let entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries
            .values()
            .filter(|entry| &entry.run.run_id == run_id && !entry.approval.status.is_terminal())
            .count()
    }

    /// Drop pending approvals belonging to a session, e.g. when it expires.
    pub fn discard_session(&self, session_id: &SessionId) -> usize {
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = entries.len();
        entries.retain(|_, entry| &entry.run.session_id != session_id);
        before - entries.len()
    }
}

#[cfg(test)]
mod tests {
    use permitdesk_core::config::ApprovalConfig;
    use permitdesk_core::{ApprovalStatus, AssistError, RiskLevel, SessionId, ThreadId, ToolApprovalId};

    use super::{ApprovalRegistry, PendingRun, SensitivePolicy};
    use crate::backend::{ProposedAction, RunId};

    fn policy() -> SensitivePolicy {
        SensitivePolicy::new(&ApprovalConfig {
            human_in_the_loop: true,
            sensitive_tools: vec![
                "delete_record".to_owned(),
                "modify_record".to_owned(),
                "bulk_update_records".to_owned(),
                "export_records".to_owned(),
            ],
        })
    }

    fn run_fixture() -> PendingRun {
        PendingRun {
            session_id: SessionId("sess-1".to_owned()),
            thread_id: ThreadId("thread-1".to_owned()),
            run_id: RunId("run-1".to_owned()),
        }
    }

    fn action_fixture(tool: &str) -> ProposedAction {
        ProposedAction {
            action_id: "action-1".to_owned(),
            tool_name: tool.to_owned(),
            parameters: serde_json::json!({"ticket": "PRM-2026-0001"}),
            reasoning: "user asked for it".to_owned(),
        }
    }

    #[test]
    fn allow_list_membership_decides_sensitivity() {
        let policy = policy();
        assert!(policy.is_sensitive("delete_record"));
        assert!(policy.is_sensitive("bulk_update_records"));
        assert!(!policy.is_sensitive("lookup_record"));
    }

    #[test]
    fn risk_derives_from_tool_name() {
        let policy = policy();
        assert_eq!(policy.risk_level("delete_record"), RiskLevel::High);
        assert_eq!(policy.risk_level("bulk_update_records"), RiskLevel::High);
        assert_eq!(policy.risk_level("modify_record"), RiskLevel::Medium);
        assert_eq!(policy.risk_level("export_records"), RiskLevel::Medium);
        assert_eq!(policy.risk_level("lookup_record"), RiskLevel::Low);
    }

    #[test]
    fn approval_resolves_exactly_once() {
        let registry = ApprovalRegistry::new();
        let approval =
            registry.register(run_fixture(), &action_fixture("delete_record"), RiskLevel::High);
        assert_eq!(approval.status, ApprovalStatus::Pending);

        let resolved = registry.resolve(&approval.id, true).expect("first resolve succeeds");
        assert_eq!(resolved.approval.status, ApprovalStatus::Approved);
        assert!(resolved.approved);

        let second = registry.resolve(&approval.id, false);
        assert!(matches!(second, Err(AssistError::ApprovalAlreadyResolved(id)) if id == approval.id));
    }

    #[test]
    fn rejection_is_terminal_too() {
        let registry = ApprovalRegistry::new();
        let approval =
            registry.register(run_fixture(), &action_fixture("modify_record"), RiskLevel::Medium);

        let resolved = registry.resolve(&approval.id, false).expect("resolve succeeds");
        assert_eq!(resolved.approval.status, ApprovalStatus::Rejected);
        assert_eq!(registry.pending_count(), 0);
    }

    #[test]
    fn lookup_leaves_the_decision_pending() {
        let registry = ApprovalRegistry::new();
        let approval =
            registry.register(run_fixture(), &action_fixture("delete_record"), RiskLevel::High);

        let first = registry.lookup_pending(&approval.id).expect("pending lookup succeeds");
        assert_eq!(first.action_id, "action-1");
        assert_eq!(first.run, run_fixture());

        // Repeated lookups see the same pending decision; only resolve
        // makes it terminal.
        registry.lookup_pending(&approval.id).expect("still pending after a lookup");
        registry.resolve(&approval.id, true).expect("resolve succeeds");
        assert!(matches!(
            registry.lookup_pending(&approval.id),
            Err(AssistError::ApprovalAlreadyResolved(id)) if id == approval.id
        ));
    }

    #[test]
    fn unknown_approval_id_is_terminal_not_found() {
        let registry = ApprovalRegistry::new();
        let missing = ToolApprovalId("no-such-approval".to_owned());
        assert!(matches!(
            registry.resolve(&missing, true),
            Err(AssistError::ApprovalNotFound(id)) if id == missing
        ));
    }

    #[test]
    fn session_expiry_discards_its_pending_approvals() {
        let registry = ApprovalRegistry::new();
        registry.register(run_fixture(), &action_fixture("delete_record"), RiskLevel::High);

        let discarded = registry.discard_session(&SessionId("sess-1".to_owned()));
        assert_eq!(discarded, 1);
        assert_eq!(registry.pending_count(), 0);
    }
}
