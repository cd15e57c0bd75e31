use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolApprovalId(pub String);

impl ToolApprovalId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// A sensitive action proposed by the assistant persona, awaiting an
/// explicit human decision. Lives only in process memory for the lifetime
/// of its session; durable auditing is an external concern.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolApproval {
    pub id: ToolApprovalId,
    pub tool_name: String,
    pub parameters: serde_json::Value,
    pub reasoning: String,
    pub risk_level: RiskLevel,
    pub status: ApprovalStatus,
    pub created_at: DateTime<Utc>,
}

impl ToolApproval {
    pub fn pending(
        tool_name: impl Into<String>,
        parameters: serde_json::Value,
        reasoning: impl Into<String>,
        risk_level: RiskLevel,
    ) -> Self {
        Self {
            id: ToolApprovalId::generate(),
            tool_name: tool_name.into(),
            parameters,
            reasoning: reasoning.into(),
            risk_level,
            status: ApprovalStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ApprovalStatus, RiskLevel, ToolApproval};

    #[test]
    fn pending_approval_starts_non_terminal() {
        let approval = ToolApproval::pending(
            "delete_record",
            serde_json::json!({"ticket": "PRM-2026-0001"}),
            "user asked to remove a duplicate permit",
            RiskLevel::High,
        );
        assert_eq!(approval.status, ApprovalStatus::Pending);
        assert!(!approval.status.is_terminal());
    }

    #[test]
    fn resolved_statuses_are_terminal() {
        assert!(ApprovalStatus::Approved.is_terminal());
        assert!(ApprovalStatus::Rejected.is_terminal());
    }
}
